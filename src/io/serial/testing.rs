// src/io/serial/testing.rs
//
// In-memory catalog and transport for exercising sessions without hardware.
// Tests push reads through a `ScriptHandle`; the transport replays them from
// the reader thread.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::transport::{DeviceCatalog, Transport, TransportOpener};
use super::utils::LineSettings;
use crate::io::error::OpenError;
use crate::io::types::{DeviceDescriptor, DeviceEntry};

/// One scripted outcome of `Transport::read`.
pub enum ReadStep {
    Bytes(Vec<u8>),
    Error(io::ErrorKind, String),
    Eof,
}

/// How the scripted opener responds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenBehavior {
    Succeed,
    PermissionDenied,
    Fail,
    /// Open succeeds but applying line settings fails
    ConfigureFails,
    /// Close reports an error, but still counts as a close
    CloseFails,
}

/// Shared view of what the session did with the transport.
#[derive(Clone, Default)]
pub struct TransportLog {
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub configured: Arc<Mutex<Vec<LineSettings>>>,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl TransportLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Test side of the scripted stream.
#[derive(Clone)]
pub struct ScriptHandle {
    tx: Arc<Mutex<Option<std_mpsc::Sender<ReadStep>>>>,
}

impl ScriptHandle {
    pub fn push(&self, step: ReadStep) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(step);
        }
    }

    pub fn bytes(&self, bytes: &[u8]) {
        self.push(ReadStep::Bytes(bytes.to_vec()));
    }
}

/// Catalog with fixed entries whose opener hands out scripted transports.
pub struct ScriptedSerial {
    entries: Vec<DeviceEntry>,
    behavior: OpenBehavior,
    log: TransportLog,
    script: ScriptHandle,
    steps: Mutex<Option<std_mpsc::Receiver<ReadStep>>>,
}

impl ScriptedSerial {
    pub fn new(entries: Vec<DeviceEntry>, behavior: OpenBehavior) -> Self {
        let (tx, rx) = std_mpsc::channel();
        ScriptedSerial {
            entries,
            behavior,
            log: TransportLog::default(),
            script: ScriptHandle {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            steps: Mutex::new(Some(rx)),
        }
    }

    /// A single USB scale at `/dev/ttyUSB0` with ids 1027:24577.
    pub fn single_scale(behavior: OpenBehavior) -> Self {
        Self::new(vec![scale_entry()], behavior)
    }

    pub fn script(&self) -> ScriptHandle {
        self.script.clone()
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }
}

pub fn scale_descriptor() -> DeviceDescriptor {
    DeviceDescriptor::new("/dev/ttyUSB0", "1027", "24577")
}

pub fn scale_entry() -> DeviceEntry {
    DeviceEntry {
        descriptor: scale_descriptor(),
        port_path: Some("/dev/ttyUSB0".to_string()),
    }
}

impl DeviceCatalog for ScriptedSerial {
    fn devices(&self) -> io::Result<Vec<DeviceEntry>> {
        Ok(self.entries.clone())
    }
}

impl TransportOpener for ScriptedSerial {
    fn open(&self, port_path: &str) -> Result<Box<dyn Transport>, OpenError> {
        match self.behavior {
            OpenBehavior::PermissionDenied => {
                return Err(OpenError::PermissionDenied(format!("{}: EACCES", port_path)))
            }
            OpenBehavior::Fail => return Err(OpenError::Failed(format!("{}: busy", port_path))),
            _ => {}
        }

        // The first open owns the script; later opens get an idle stream
        let steps = self.steps.lock().unwrap().take().unwrap_or_else(|| {
            let (tx, rx) = std_mpsc::channel();
            *self.script.tx.lock().unwrap() = Some(tx);
            rx
        });

        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTransport {
            steps,
            pending: Vec::new(),
            fail_configure: self.behavior == OpenBehavior::ConfigureFails,
            fail_close: self.behavior == OpenBehavior::CloseFails,
            log: self.log.clone(),
        }))
    }
}

struct ScriptedTransport {
    steps: std_mpsc::Receiver<ReadStep>,
    /// Bytes from a step larger than the caller's buffer
    pending: Vec<u8>,
    fail_configure: bool,
    fail_close: bool,
    log: TransportLog,
}

impl Transport for ScriptedTransport {
    fn configure(&mut self, settings: &LineSettings) -> io::Result<()> {
        if self.fail_configure {
            return Err(io::Error::new(io::ErrorKind::Other, "set parameters failed"));
        }
        self.log.configured.lock().unwrap().push(*settings);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            return Ok(n);
        }

        match self.steps.recv_timeout(timeout) {
            Ok(ReadStep::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                self.pending.extend_from_slice(&bytes[n..]);
                Ok(n)
            }
            Ok(ReadStep::Error(kind, message)) => Err(io::Error::new(kind, message)),
            Ok(ReadStep::Eof) => Ok(0),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.log.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}
