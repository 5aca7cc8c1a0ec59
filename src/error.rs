//! Error types for DPD capture and actuator operations.
//!
//! Every public operation returns [`Result<T>`]. Range failures are detected before
//! any hardware access; device and transport failures are decoded and surfaced
//! without retry. Recovery (typically a chip reset) is the caller's responsibility.

use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Result type alias for DPD operations.
pub type Result<T> = std::result::Result<T, DpdError>;

/// Errors that can occur when driving the DPD subsystem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DpdError {
    /// A field failed its range check
    #[error("Invalid {field} ({value}): {message}")]
    InvalidParameter {
        field: &'static str,
        value: String,
        message: String,
    },

    /// Required input data was empty
    #[error("Missing input: {field} is empty")]
    NullInput { field: &'static str },

    /// A shared hardware resource is owned elsewhere or cannot be claimed
    #[error("Resource conflict on GPIO{pin:02}: {message}")]
    ResourceConflict { pin: u8, message: String },

    /// The co-processor rejected a mailbox command
    #[error(
        "Device command error (opcode 0x{opcode:02X}, object 0x{object_id:02X}, status 0x{status:02X}): {code}"
    )]
    DeviceCommand {
        opcode: u8,
        object_id: u8,
        status: u8,
        code: DeviceErrorCode,
    },

    /// A status wait or poll loop ran out of budget
    #[error("Timeout after {timeout_us} us waiting for {operation}")]
    Timeout {
        operation: &'static str,
        timeout_us: u64,
    },

    /// The transport signalled that only a chip reset can recover
    #[error("Hardware reset required: {reason}")]
    HardwareResetRequired { reason: String },

    /// The capture state machine refuses the operation
    #[error("Cannot {operation} while capture state is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Opaque bus failure from the transport
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl DpdError {
    /// Build an [`DpdError::InvalidParameter`] from any displayable value.
    pub(crate) fn invalid(
        field: &'static str,
        value: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            field,
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a range-check failure.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::NullInput { .. })
    }

    /// Check if this is a GPIO/shared-resource conflict.
    pub fn is_resource_conflict(&self) -> bool {
        matches!(self, Self::ResourceConflict { .. })
    }

    /// Check if the co-processor reported the failure.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceCommand { .. })
    }

    /// Check if recovery needs a chip reset.
    pub fn requires_reset(&self) -> bool {
        matches!(self, Self::HardwareResetRequired { .. })
    }

    /// Check if the failure came from the device or the bus rather than
    /// from argument validation.
    pub fn is_hardware_failure(&self) -> bool {
        matches!(
            self,
            Self::DeviceCommand { .. }
                | Self::Timeout { .. }
                | Self::HardwareResetRequired { .. }
                | Self::Transport { .. }
        )
    }
}

impl From<TransportError> for DpdError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout {
                operation,
                timeout_us,
            } => Self::Timeout {
                operation,
                timeout_us,
            },
            TransportError::Device {
                opcode,
                object_id,
                code,
            } => Self::DeviceCommand {
                opcode,
                object_id,
                status: 0,
                code: DeviceErrorCode::from_raw(code),
            },
            TransportError::ResetRequired { reason } => Self::HardwareResetRequired { reason },
            TransportError::Bus { message } => Self::Transport { message },
        }
    }
}

/// Firmware error codes reported by the external-DPD tracking calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeviceErrorCode {
    /// No error
    NoError,
    /// DPD hardware is in use by another calibration
    HwInUse,
    /// Stream processor error
    StreamError,
    /// Capture failed to complete
    CaptureError,
    /// Code outside the decode table, passed through unchanged
    Other(u32),
}

impl DeviceErrorCode {
    /// Decode a raw firmware error code.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0000 => Self::NoError,
            0x1401 => Self::HwInUse,
            0x1402 => Self::StreamError,
            0x1403 => Self::CaptureError,
            other => Self::Other(other),
        }
    }

    /// Raw firmware value.
    pub fn raw(self) -> u32 {
        match self {
            Self::NoError => 0x0000,
            Self::HwInUse => 0x1401,
            Self::StreamError => 0x1402,
            Self::CaptureError => 0x1403,
            Self::Other(raw) => raw,
        }
    }

    /// Pack a failing mailbox status into an opaque code.
    pub fn from_command_status(opcode: u8, object_id: u8, status: u8) -> Self {
        Self::from_raw((u32::from(opcode) << 16) | (u32::from(object_id) << 8) | u32::from(status))
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "no error"),
            Self::HwInUse => write!(f, "DPD hardware in use"),
            Self::StreamError => write!(f, "stream error"),
            Self::CaptureError => write!(f, "capture error"),
            Self::Other(raw) => write!(f, "device error 0x{:06X}", raw),
        }
    }
}
