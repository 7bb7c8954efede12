//! Error types for message framing and response correlation.

use std::io;
use thiserror::Error;

/// Result type alias for framing operations.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors that can occur while delimiting or correlating a message.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream is desynchronized (bad sync bytes, resync exhausted,
    /// impossible length field).
    #[error("Framing error: {reason}")]
    Framing {
        /// Description of the framing failure.
        reason: String,
    },

    /// The descriptor kept asking for more header bytes.
    #[error("Header never resolved after {attempts} attempts")]
    HeaderUnresolved {
        /// Number of body-length computations performed.
        attempts: usize,
    },

    /// The overall message deadline expired.
    #[error("Communication timeout")]
    Timeout,

    /// A complete frame failed its checksum, CRC or BCC check.
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum computed over the frame.
        expected: u32,
        /// Checksum carried by the frame.
        actual: u32,
    },

    /// The received frame is not the answer to the pending request and the
    /// protocol has no way to keep waiting.
    #[error("Correlation rejected: expected {expected:?}, received {received:?}")]
    CorrelationRejected {
        /// Correlation id of the request, when the protocol has one.
        expected: Option<u32>,
        /// Correlation id of the received frame.
        received: Option<u32>,
    },

    /// The receive was cancelled through a [`CancelToken`](crate::CancelToken).
    #[error("Receive cancelled")]
    Cancelled,

    /// The byte source reported end of stream.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Creates a new `Framing` error.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::FrameError;
    ///
    /// let err = FrameError::framing("TPKT version must be 0x03");
    /// assert!(err.is_framing());
    /// ```
    pub fn framing(reason: impl Into<String>) -> Self {
        Self::Framing {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `ChecksumMismatch` error.
    pub fn checksum_mismatch(expected: u32, actual: u32) -> Self {
        Self::ChecksumMismatch { expected, actual }
    }

    /// Creates a new `CorrelationRejected` error.
    pub fn correlation_rejected(expected: Option<u32>, received: Option<u32>) -> Self {
        Self::CorrelationRejected { expected, received }
    }

    /// Returns whether this error means the stream lost synchronization.
    ///
    /// Checksum failures are framing errors: the bytes on the wire cannot
    /// be trusted to delimit the next frame.
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::Framing { .. } | Self::ChecksumMismatch { .. })
    }

    /// Returns whether the caller may simply re-issue the request on the
    /// same connection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns whether the connection should be closed and reopened before
    /// it is used again.
    ///
    /// # Example
    ///
    /// ```
    /// use plc_framing::FrameError;
    ///
    /// assert!(FrameError::HeaderUnresolved { attempts: 16 }.requires_reconnect());
    /// assert!(!FrameError::Timeout.requires_reconnect());
    /// ```
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::Framing { .. }
                | Self::ChecksumMismatch { .. }
                | Self::HeaderUnresolved { .. }
                | Self::ConnectionClosed
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_display() {
        let err = FrameError::framing("bad magic");
        assert_eq!(err.to_string(), "Framing error: bad magic");
    }

    #[test]
    fn test_header_unresolved_display() {
        let err = FrameError::HeaderUnresolved { attempts: 16 };
        assert_eq!(err.to_string(), "Header never resolved after 16 attempts");
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = FrameError::checksum_mismatch(0x0A84, 0x1234);
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: expected 0x0A84, received 0x1234"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = FrameError::Timeout;
        assert_eq!(err.to_string(), "Communication timeout");
    }

    #[test]
    fn test_classification() {
        assert!(FrameError::checksum_mismatch(1, 2).is_framing());
        assert!(!FrameError::Timeout.is_framing());
        assert!(FrameError::Timeout.is_retryable());
        assert!(!FrameError::Cancelled.is_retryable());
        assert!(FrameError::ConnectionClosed.requires_reconnect());
        assert!(!FrameError::correlation_rejected(Some(1), Some(2)).requires_reconnect());
    }
}
