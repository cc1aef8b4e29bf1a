//! Error types for sluice-client.

use thiserror::Error;

/// Terminal errors of a pipeline run.
///
/// Cache-layer failures are deliberately absent: a failed store read or
/// write degrades to "no cache contribution" and never surfaces here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection-level failure (DNS, timeout, TLS). Not retried here;
    /// retry policy belongs to the caller.
    #[error("transport failure: {0}")]
    Transport(String),

    /// 2xx status but the body does not decode into the expected shape.
    #[error("response does not match the expected shape: {0}")]
    InvalidShape(String),

    /// Non-2xx status with no recognized domain error body.
    #[error("unrecognized HTTP status {0}")]
    UnknownStatus(u16),

    /// Non-2xx status carrying a recognized domain error body, surfaced
    /// verbatim for domain-specific handling.
    #[error("domain error {code}")]
    Domain {
        code: String,
        payload: serde_json::Value,
    },
}
