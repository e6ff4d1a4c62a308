//! Error and outcome types for asset transport.

use thiserror::Error;

/// Errors from a single asset download, after retries are exhausted.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error on the final attempt.
    #[error("network error downloading {key}: {source}")]
    Network {
        /// Remote asset key.
        key: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The final attempt exceeded the per-attempt timeout.
    #[error("timeout downloading {key} after {attempts} attempts")]
    Timeout {
        /// Remote asset key.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The asset host returned a non-success status on the final attempt.
    #[error("HTTP {status} downloading {key}")]
    HttpStatus {
        /// Remote asset key.
        key: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The asset host returned a success status with no payload.
    #[error("empty response body for {key}")]
    EmptyBody {
        /// Remote asset key.
        key: String,
    },

    /// The request URL could not be constructed.
    #[error("invalid asset URL for key {key}")]
    InvalidUrl {
        /// Remote asset key.
        key: String,
    },

    /// The request was cancelled, either by the session-wide cancel or
    /// by a connection reset aborting in-flight work.
    #[error("download of {key} was cancelled")]
    Cancelled {
        /// Remote asset key.
        key: String,
    },
}

impl TransportError {
    /// Returns true when this error came from cancellation rather than
    /// a transport fault.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A successfully downloaded asset.
#[derive(Debug, Clone)]
pub struct AssetDownload {
    /// Storage id, `{chapter_hid}-{b2key}`.
    pub image_id: String,
    /// Raw image payload.
    pub bytes: Vec<u8>,
}

/// A failed asset, kept for reporting and resume bookkeeping.
#[derive(Debug)]
pub struct AssetFailure {
    /// Storage id of the asset that failed.
    pub image_id: String,
    /// The terminal transport error.
    pub error: TransportError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_carries_key() {
        let error = TransportError::Timeout {
            key: "page-3.jpg".into(),
            attempts: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains("page-3.jpg"), "Expected key in: {msg}");
        assert!(msg.contains('3'), "Expected attempt count in: {msg}");
    }

    #[test]
    fn test_empty_body_is_a_transport_fault() {
        let error = TransportError::EmptyBody { key: "p1.jpg".into() };
        assert!(!error.is_cancelled());
        assert!(error.to_string().contains("p1.jpg"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(TransportError::Cancelled { key: "k".into() }.is_cancelled());
        assert!(!TransportError::InvalidUrl { key: "k".into() }.is_cancelled());
    }
}
