//! Scripted transports for deterministic invoker tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use bulwark_resilience::CallRequest;
use bulwark_resilience::RawResponse;
use bulwark_resilience::Transport;
use bulwark_resilience::TransportError;
use serde_json::Value;
use serde_json::json;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One scripted transport reaction.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(RawResponse),
    Fail(TransportError),
    /// Never answers; resolves only when the attempt is cancelled.
    Hang,
}

pub fn ok(body: Value) -> Step {
    Step::Respond(RawResponse::ok(body))
}

pub fn network_down() -> Step {
    Step::Fail(TransportError::Network("connection reset".to_string()))
}

pub fn status(code: u16, message: &str) -> Step {
    Step::Fail(TransportError::Status {
        status: code,
        message: message.to_string(),
    })
}

pub fn validation(message: &str) -> Step {
    Step::Respond(RawResponse::ok(json!({
        "success": false,
        "error": "validation failed",
        "errors": [{ "message": message }]
    })))
}

#[derive(Debug, Clone)]
pub struct SeenCall {
    pub at: Instant,
    pub operation: String,
    pub authorization: Option<String>,
    pub params: Value,
}

/// Replays steps in order, then repeats `fallback` forever.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    seen: Mutex<Vec<SeenCall>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Self::with_fallback(
            steps,
            Step::Fail(TransportError::Network("script exhausted".to_string())),
        )
    }

    pub fn repeating(step: Step) -> Arc<Self> {
        Self::with_fallback([], step)
    }

    pub fn with_fallback(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<SeenCall> {
        self.seen.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<String> {
        self.seen()
            .into_iter()
            .filter_map(|call| call.authorization)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(SeenCall {
            at: Instant::now(),
            operation: request.operation.clone(),
            authorization: request.headers.get("Authorization").cloned(),
            params: request.params.clone(),
        });
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                cancel.cancelled().await;
                Err(TransportError::Cancelled)
            }
        }
    }
}

/// Dispatches to a separate script per operation name.
#[derive(Debug, Default)]
pub struct RoutingTransport {
    routes: HashMap<String, Arc<ScriptedTransport>>,
}

impl RoutingTransport {
    pub fn route(mut self, operation: &str, transport: Arc<ScriptedTransport>) -> Self {
        self.routes.insert(operation.to_string(), transport);
        self
    }
}

#[async_trait]
impl Transport for RoutingTransport {
    async fn call(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        match self.routes.get(&request.operation) {
            Some(route) => route.call(request, cancel).await,
            None => Err(TransportError::Status {
                status: 404,
                message: format!("no route for {}", request.operation),
            }),
        }
    }
}
