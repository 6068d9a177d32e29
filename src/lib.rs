//! # scalelink
//!
//! Connects to a USB-serial weight scale and recovers its fixed-size frames
//! from a continuous, noise-prone byte stream.
//!
//! Every frame is 16 bytes: `0x01` (SOH), `0x02` (STX), then 14 payload bytes
//! that are passed through uninterpreted. A [`ConnectionSession`] owns the
//! transport and a ring buffer; a background reader feeds raw bytes in and
//! frames come out, in stream order, on the channel returned by
//! [`ConnectionSession::subscribe`].
//!
//! ```ignore
//! use scalelink::{ConnectionSession, DeviceDescriptor, SessionEvent, SessionSettings};
//!
//! let mut session = ConnectionSession::system(SessionSettings::default());
//! let mut events = session.subscribe();
//! session.connect(&DeviceDescriptor::new("/dev/ttyUSB0", "1027", "24577"))?;
//!
//! while let Some(event) = events.blocking_recv() {
//!     match event {
//!         SessionEvent::Frame(frame) => println!("{}", frame.to_hex()),
//!         SessionEvent::Error { code, message } => eprintln!("{:?}: {}", code, message),
//!     }
//! }
//! ```

#[macro_use]
pub mod logging;

pub mod io;
pub mod settings;

pub use io::serial::{
    ConnectionSession, Frame, FrameSynchronizer, RingBuffer, SessionState, FRAME_SIZE,
};
pub use io::{DeviceDescriptor, SessionError, SessionEvent, StreamErrorCode};
pub use settings::SessionSettings;
