//! Error handling for the gateway crate.
//!
//! Every fallible operation in this crate returns [`GatewayResult`]. The error
//! enum distinguishes the layers a failure can come from: the serial line
//! itself (I/O, timeouts), the Modbus framing (frame shape, CRC, exception
//! replies) and the gateway's own argument/state validation. Classification
//! helpers ([`GatewayError::is_recoverable`],
//! [`GatewayError::is_transport_error`], [`GatewayError::is_protocol_error`])
//! let callers pick a retry or give-up strategy without matching every
//! variant.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// All error conditions the gateway can report.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Low-level I/O failure (serial port read/write, port open).
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A caller-supplied argument was rejected before any I/O happened.
    ///
    /// Covers out-of-range unit indexes, zero register counts and payloads
    /// that do not fit in an RTU frame.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// An operation was attempted on a component that is not ready for it,
    /// e.g. a transport that was never opened.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// A deadline expired before the operation completed.
    #[error("timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A received frame did not match the request it answers.
    ///
    /// Slave id, function code, byte count or write echo mismatches all land
    /// here.
    #[error("frame error: {message}")]
    Frame { message: String },

    /// CRC trailer of a received frame did not match the payload.
    #[error("CRC mismatch: expected={expected:04X}, actual={actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// The slave answered with a Modbus exception frame.
    #[error("modbus exception: function={function:02X}, code={code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// The operation targeted a unit slot that discovery did not mark present.
    #[error("unit {index} is not present")]
    UnitNotFound { index: u8 },

    /// An error propagated from a register I/O implementation the gateway
    /// does not know the internals of.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl GatewayError {
    /// Create a new I/O error.
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new invalid-state error.
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a new frame error.
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u16, actual: u16) -> Self {
        Self::CrcMismatch { expected, actual }
    }

    /// Create a Modbus exception error with the standard code description.
    pub fn exception(function: u8, code: u8) -> Self {
        let message = match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
        .to_string();

        Self::Exception {
            function,
            code,
            message,
        }
    }

    /// Create a unit-not-found error.
    pub fn unit_not_found(index: u8) -> Self {
        Self::UnitNotFound { index }
    }

    /// Create a transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation could plausibly succeed.
    ///
    /// Timeouts and line-level failures are transient on a half-duplex bus;
    /// argument and framing errors are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Timeout { .. } => true,
            Self::Transport { .. } => true,
            Self::Exception { code, .. } => {
                // Acknowledge / Busy mean "ask again later".
                matches!(code, 0x05 | 0x06)
            }
            _ => false,
        }
    }

    /// Whether the error originates below the Modbus framing layer.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::Transport { .. }
        )
    }

    /// Whether the error is a Modbus protocol violation.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Frame { .. } | Self::CrcMismatch { .. } | Self::Exception { .. }
        )
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<tokio_serial::Error> for GatewayError {
    fn from(err: tokio_serial::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("operation timeout", 0)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = GatewayError::timeout("receive reply", 1200);
        assert!(err.is_recoverable());
        assert!(err.is_transport_error());
        assert!(!err.is_protocol_error());

        let err = GatewayError::crc_mismatch(0x1234, 0x5678);
        assert!(!err.is_recoverable());
        assert!(err.is_protocol_error());

        let err = GatewayError::exception(0x04, 0x06);
        assert!(err.is_recoverable());
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::crc_mismatch(0x1234, 0x5678);
        let msg = format!("{err}");
        assert!(msg.contains("CRC mismatch"));
        assert!(msg.contains("1234"));
        assert!(msg.contains("5678"));

        let err = GatewayError::unit_not_found(7);
        assert_eq!(format!("{err}"), "unit 7 is not present");
    }
}
