// src/io/serial/mod.rs
//
// USB-serial scale link.
// Recovers fixed 16-byte frames from a noisy serial byte stream.
//
// Features:
// - Ring buffer with drop-oldest overflow
// - Header-based frame resynchronization (SOH, STX)
// - Connection session with a background reader and ordered frame delivery

pub mod framer;
mod reader;
pub mod ring;
pub mod session;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use framer::{Frame, FrameSynchronizer, FRAME_SIZE, SOH, STX};
pub use ring::RingBuffer;
pub use session::{ConnectionSession, SessionState};
pub use transport::{DeviceCatalog, SystemSerial, Transport, TransportOpener};
pub use utils::{LineSettings, Parity, SCALE_LINE_SETTINGS};
