use async_trait::async_trait;
use bulwark_async_utils::OrCancelExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Transport;
use crate::error::TransportError;
use crate::types::CallRequest;
use crate::types::RawResponse;

/// Path segment under which hosted admin functions are exposed.
pub const DEFAULT_FUNCTIONS_PATH: &str = "functions/v1";

/// Calls hosted admin functions over HTTP.
///
/// Each call is a `POST {base_url}/{functions_path}/{operation}` with the
/// params as the JSON body. JSON bodies are returned as-is regardless of
/// status so application error markers reach the classifier; a non-JSON
/// body on an error status becomes [`TransportError::Status`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    functions_path: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(TransportError::Config("base URL is empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            functions_path: DEFAULT_FUNCTIONS_PATH.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_functions_path(mut self, path: impl Into<String>) -> Self {
        self.functions_path = path.into().trim_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url_for(&self, operation: &str) -> String {
        if self.functions_path.is_empty() {
            format!("{}/{operation}", self.base_url)
        } else {
            format!("{}/{}/{operation}", self.base_url, self.functions_path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.operation);
        let mut builder = self.client.post(&url).json(&request.params);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(api_key) = &self.api_key {
            builder = builder.header("apikey", api_key.as_str());
        }

        debug!(operation = %request.operation, %url, "sending admin function request");

        let response = builder
            .send()
            .or_cancel(cancel)
            .await
            .map_err(|_| TransportError::Cancelled)??;
        let status = response.status().as_u16();
        let text = response
            .text()
            .or_cancel(cancel)
            .await
            .map_err(|_| TransportError::Cancelled)??;

        if text.trim().is_empty() {
            return Ok(RawResponse::with_status(status, Value::Null));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(RawResponse::with_status(status, body)),
            Err(_) if (200..300).contains(&status) => {
                Ok(RawResponse::with_status(status, Value::String(text)))
            }
            Err(_) => Err(TransportError::Status {
                status,
                message: text,
            }),
        }
    }
}
