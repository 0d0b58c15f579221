//! Remote call transports.

mod http;

pub use http::DEFAULT_FUNCTIONS_PATH;
pub use http::HttpTransport;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::types::CallRequest;
use crate::types::RawResponse;

/// Issues one call to the backend.
///
/// Implementations should stop work promptly once `cancel` fires; the
/// invoker also drops the returned future when the attempt deadline passes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}
