// src/io/types.rs
//
// Shared types for device selection and session events.

use serde::{Deserialize, Serialize};

use super::serial::Frame;

// ============================================================================
// Device Identity
// ============================================================================

/// Identity triple used to select a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub name: String,
    pub vendor_id: String,
    pub product_id: String,
}

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        vendor_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor_id: vendor_id.into(),
            product_id: product_id.into(),
        }
    }

    /// `"vendorId:productId"`, as reported by `get_devices`.
    pub fn id_pair(&self) -> String {
        format!("{}:{}", self.vendor_id, self.product_id)
    }
}

/// A device as enumerated by a `DeviceCatalog`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEntry {
    pub descriptor: DeviceDescriptor,
    /// Path of the serial port to open, `None` when the device exposes no port
    pub port_path: Option<String>,
}

// ============================================================================
// Sink Events
// ============================================================================

/// Asynchronous error codes delivered after a session is streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamErrorCode {
    /// The transport signalled a graceful close
    ConnectionLost,
    /// Any other transport fault
    TransportError,
}

impl StreamErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamErrorCode::ConnectionLost => "CONNECTION_LOST",
            StreamErrorCode::TransportError => "TRANSPORT_ERROR",
        }
    }
}

/// Event delivered to the session's sink, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Frame(Frame),
    Error {
        code: StreamErrorCode,
        message: String,
    },
}

/// Sending half of a session sink.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of a session sink.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<SessionEvent>;
