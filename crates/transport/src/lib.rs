//! Retrying HTTP transport.
//!
//! One logical exchange per call: the caller hands over a URI and a payload
//! builder, and always gets a [`Reply`] back. Transient failures (transport
//! errors, 429/500/502, caller-declared extra statuses) are retried with
//! per-condition delays until the attempt budget runs out, at which point a
//! synthesized 500-equivalent reply is returned instead of an error.

mod client;
mod retry;

pub use client::{Reply, RetryingClient, post_json_once};
pub use retry::RetryPolicy;

/// Errors from constructing the transport. Sending never fails — see
/// [`RetryingClient::send`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("access token is not a valid header value")]
    InvalidToken,
}
