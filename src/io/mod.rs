// src/io/mod.rs
//
// Device IO for the scale link: shared types, errors and the serial driver.

mod error;
pub mod serial;
mod types;

pub use error::{OpenError, SessionError};
pub use types::{
    DeviceDescriptor, DeviceEntry, EventReceiver, EventSender, SessionEvent, StreamErrorCode,
};
