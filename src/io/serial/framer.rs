// src/io/serial/framer.rs
//
// Frame synchronizer for the scale's fixed-size framing.
// Every frame is 16 bytes: SOH, STX, then 14 opaque payload bytes. There is no
// length field or checksum, so the two header bytes are the only validation.

use serde::Serialize;

use super::ring::RingBuffer;

// =============================================================================
// Framing Constants
// =============================================================================

/// Start-of-header marker, first byte of every frame
pub const SOH: u8 = 0x01;
/// Start-of-text marker, second byte of every frame
pub const STX: u8 = 0x02;
/// Total frame length including the two header bytes
pub const FRAME_SIZE: usize = 16;

// =============================================================================
// Types
// =============================================================================

/// A complete frame extracted from the serial stream.
/// Header bytes are included; the payload is not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    bytes: [u8; FRAME_SIZE],
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    /// The 14 bytes following the header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = ();

    /// Accepts exactly 16 bytes starting with SOH, STX.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; FRAME_SIZE] = bytes.try_into().map_err(|_| ())?;
        if bytes[0] == SOH && bytes[1] == STX {
            Ok(Frame { bytes })
        } else {
            Err(())
        }
    }
}

// =============================================================================
// Frame Synchronizer
// =============================================================================

/// Locates frames in a `RingBuffer`, discarding garbage and false headers.
///
/// Holds no state; everything lives in the buffer it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSynchronizer;

impl FrameSynchronizer {
    pub fn new() -> Self {
        FrameSynchronizer
    }

    /// Extract at most one frame from the head of `buffer`.
    ///
    /// Returns `None` when no complete frame is available. Bytes before the
    /// first SOH are discarded, a buffer with no SOH at all is cleared, and an
    /// SOH not followed by STX is dropped one byte at a time. A partial frame
    /// starting with SOH is left in place to accumulate more bytes.
    pub fn try_extract_frame(&self, buffer: &mut RingBuffer) -> Option<Frame> {
        // Each pass either returns or consumes at least one byte
        while !buffer.is_empty() {
            let offset = match buffer.index_of(SOH) {
                Some(offset) => offset,
                None => {
                    tlog!("[framer] No header in {} buffered bytes, flushing", buffer.size());
                    buffer.clear();
                    return None;
                }
            };

            if offset > 0 {
                buffer.consume(offset);
            }

            if buffer.size() < FRAME_SIZE {
                return None;
            }

            let candidate = buffer.peek(FRAME_SIZE);
            match Frame::try_from(candidate.as_slice()) {
                Ok(frame) => {
                    buffer.consume(FRAME_SIZE);
                    return Some(frame);
                }
                Err(()) => {
                    tlog!(
                        "[framer] Invalid frame candidate {}, dropping header byte",
                        hex::encode(&candidate)
                    );
                    buffer.consume(1);
                }
            }
        }

        None
    }

    /// Extract every complete frame currently in `buffer`, in order.
    pub fn drain(&self, buffer: &mut RingBuffer) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_extract_frame(buffer)).collect()
    }
}
