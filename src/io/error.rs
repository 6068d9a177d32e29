// src/io/error.rs
//
// Typed errors returned synchronously by session operations.
// Each variant carries a stable code string for callers that forward errors
// across a process or language boundary.

use thiserror::Error;

/// Errors returned directly from `ConnectionSession` operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A selector field was empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session is already connected")]
    AlreadyConnected,

    /// No enumerated device matched the (name, vendor id, product id) selector.
    #[error("No matching serial device found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied opening {device}: {detail}")]
    PermissionDenied { device: String, detail: String },

    #[error("Failed to open {device}: {detail}")]
    TransportOpenFailure { device: String, detail: String },

    /// The device was found but exposes no serial port.
    #[error("Device {0} has no serial port")]
    NoSerialPort(String),

    /// The transport opened but could not be configured.
    #[error("Failed to connect to {device}: {detail}")]
    ConnectionFailed { device: String, detail: String },

    #[error("Failed to disconnect: {0}")]
    DisconnectionFailed(String),

    #[error("Failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),
}

impl SessionError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidArgument(_) => "INVALID_ARGUMENT",
            SessionError::AlreadyConnected => "ALREADY_CONNECTED",
            SessionError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            SessionError::PermissionDenied { .. } => "PERMISSION_DENIED",
            SessionError::TransportOpenFailure { .. } => "TRANSPORT_OPEN_FAILURE",
            SessionError::NoSerialPort(_) => "NO_SERIAL_PORT",
            SessionError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            SessionError::DisconnectionFailed(_) => "DISCONNECTION_FAILED",
            SessionError::Enumeration(_) => "ENUMERATION_FAILED",
            SessionError::NotConnected => "NOT_CONNECTED",
            SessionError::Write(_) => "WRITE_FAILED",
        }
    }
}

/// Why a transport could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Failed(String),
}
