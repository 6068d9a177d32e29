// src/io/serial/reader.rs
//
// Background reader for a streaming session.
// Performs blocking, timeout-bounded reads and hands each chunk to the
// session's shared state, which owns the buffer and the sink.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::session::{lock_or_recover, SessionShared, SharedTransport};
use crate::io::types::StreamErrorCode;

/// Everything the reader thread needs, moved into it at spawn time.
pub(crate) struct ReaderContext {
    pub shared: Arc<SessionShared>,
    pub transport: SharedTransport,
    pub cancel: Arc<AtomicBool>,
    pub read_timeout: Duration,
    pub chunk_size: usize,
    pub port: String,
}

/// Handle kept by the session to stop and join the reader.
pub(crate) struct ReaderHandle {
    pub cancel: Arc<AtomicBool>,
    pub handle: JoinHandle<()>,
}

impl ReaderHandle {
    /// Signal the reader and wait for it. Returns `false` if it panicked.
    pub fn stop(self) -> bool {
        self.cancel.store(true, Ordering::SeqCst);
        self.handle.join().is_ok()
    }
}

pub(crate) fn spawn_reader(ctx: ReaderContext) -> io::Result<ReaderHandle> {
    let cancel = ctx.cancel.clone();
    let handle = std::thread::Builder::new()
        .name(format!("scalelink-reader {}", ctx.port))
        .spawn(move || run_reader_blocking(ctx))?;
    Ok(ReaderHandle { cancel, handle })
}

/// Classify a transport fault. A closed stream is a lost connection; anything
/// else is an unexpected transport error.
pub(crate) fn classify_fault(e: &io::Error) -> StreamErrorCode {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => StreamErrorCode::ConnectionLost,
        _ if e.to_string().contains("Connection closed") => StreamErrorCode::ConnectionLost,
        _ => StreamErrorCode::TransportError,
    }
}

fn run_reader_blocking(ctx: ReaderContext) {
    let mut buf = vec![0u8; ctx.chunk_size.max(1)];
    let mut total_bytes_read: u64 = 0;

    tlog!(
        "[reader:{}] Starting read loop (timeout: {:?}, chunk: {} bytes)",
        ctx.port,
        ctx.read_timeout,
        buf.len()
    );

    let stop_reason = loop {
        if ctx.cancel.load(Ordering::SeqCst) {
            break "stopped";
        }

        let read_result = {
            let mut guard = lock_or_recover(&ctx.transport, "transport");
            match guard.as_mut() {
                Some(transport) => transport.read(&mut buf, ctx.read_timeout),
                None => break "released",
            }
        };

        match read_result {
            Ok(0) => {
                // EOF - port closed/disconnected
                ctx.shared.on_transport_error(
                    &ctx.cancel,
                    StreamErrorCode::ConnectionLost,
                    "Connection closed".to_string(),
                    &ctx.transport,
                );
                break "disconnected";
            }
            Ok(n) => {
                total_bytes_read += n as u64;
                ctx.shared.on_bytes_received(&ctx.cancel, &buf[..n]);
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                ) =>
            {
                // Timeout is expected for serial reads
            }
            Err(e) => {
                ctx.shared.on_transport_error(
                    &ctx.cancel,
                    classify_fault(&e),
                    format!("Read error: {}", e),
                    &ctx.transport,
                );
                break "error";
            }
        }
    };

    tlog!(
        "[reader:{}] Read loop ended ({}), {} bytes read",
        ctx.port,
        stop_reason,
        total_bytes_read
    );
}
