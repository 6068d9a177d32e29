// src/io/serial/session.rs
//
// Connection session for a USB-serial scale.
// Owns the transport, the ring buffer and the sink binding. A background
// reader pushes raw chunks in; frames are extracted and delivered under one
// lock, so delivery is serialized and stops the moment `disconnect` runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::framer::{FrameSynchronizer, FRAME_SIZE};
use super::reader::{spawn_reader, ReaderContext, ReaderHandle};
use super::ring::RingBuffer;
use super::transport::{DeviceCatalog, SystemSerial, Transport, TransportOpener};
use super::utils::SCALE_LINE_SETTINGS;
use crate::io::error::{OpenError, SessionError};
use crate::io::types::{
    DeviceDescriptor, DeviceEntry, EventReceiver, EventSender, SessionEvent, StreamErrorCode,
};
use crate::settings::SessionSettings;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    /// The transport closed gracefully
    Closed,
    /// The transport failed
    Faulted,
}

/// Transport slot shared between the session (write, close) and the reader.
pub(crate) type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

struct SessionCore {
    state: SessionState,
    device: Option<DeviceDescriptor>,
    buffer: RingBuffer,
    sink: Option<EventSender>,
}

/// State shared with the reader thread. Every buffer mutation and every sink
/// delivery happens while holding `core`.
pub(crate) struct SessionShared {
    core: Mutex<SessionCore>,
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tlog!("[session] {} mutex poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

/// Take the transport out of its slot and close it. Only the caller that
/// takes it closes it, so a transport is closed at most once.
pub(crate) fn release_transport(slot: &SharedTransport) {
    let taken = lock_or_recover(slot, "transport").take();
    if let Some(mut transport) = taken {
        if let Err(e) = transport.close() {
            tlog!("[session] Transport close failed: {}", e);
        }
    }
}

impl SessionShared {
    fn new(capacity: usize) -> Self {
        SessionShared {
            core: Mutex::new(SessionCore {
                state: SessionState::Idle,
                device: None,
                buffer: RingBuffer::new(capacity),
                sink: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        lock_or_recover(&self.core, "session")
    }

    /// Buffer a received chunk and deliver every frame it completes.
    ///
    /// The chunk is written in windows no larger than the buffer's free
    /// space, draining frames between windows, so a partial frame is never
    /// evicted by the chunk that completes it.
    pub(crate) fn on_bytes_received(&self, cancel: &AtomicBool, data: &[u8]) {
        let mut core = self.lock();
        if cancel.load(Ordering::SeqCst) || core.state != SessionState::Streaming {
            return;
        }

        let SessionCore { buffer, sink, .. } = &mut *core;
        let sync = FrameSynchronizer::new();
        let mut rest = data;
        while !rest.is_empty() {
            // A drained buffer holds less than one frame, so free() >= 1
            let n = buffer.free().clamp(1, rest.len());
            buffer.write(&rest[..n]);
            rest = &rest[n..];

            while let Some(frame) = sync.try_extract_frame(buffer) {
                tlog!("[session] Frame {}", frame.to_hex());
                deliver(sink, SessionEvent::Frame(frame));
            }
        }
    }

    /// Tear down after a transport fault and notify the sink.
    pub(crate) fn on_transport_error(
        &self,
        cancel: &AtomicBool,
        code: StreamErrorCode,
        message: String,
        transport: &SharedTransport,
    ) {
        let mut core = self.lock();
        if cancel.load(Ordering::SeqCst) || core.state != SessionState::Streaming {
            return;
        }

        core.state = match code {
            StreamErrorCode::ConnectionLost => {
                tlog!("[session] Connection closed normally: {}", message);
                SessionState::Closed
            }
            StreamErrorCode::TransportError => {
                tlog!("[session] Reader stopped due to an error: {}", message);
                SessionState::Faulted
            }
        };
        core.buffer.clear();
        release_transport(transport);
        deliver(&mut core.sink, SessionEvent::Error { code, message });
    }
}

fn deliver(sink: &mut Option<EventSender>, event: SessionEvent) {
    if let Some(tx) = sink {
        if tx.send(event).is_err() {
            tlog!("[session] Event receiver dropped, unbinding sink");
            *sink = None;
        }
    }
}

// ============================================================================
// Connection Session
// ============================================================================

/// A caller-owned connection to one scale.
///
/// `connect` and `disconnect` are synchronous and return their outcome
/// directly. Frames and asynchronous errors go to the sink bound with
/// [`ConnectionSession::subscribe`], in the order they complete in the byte
/// stream.
pub struct ConnectionSession {
    catalog: Arc<dyn DeviceCatalog>,
    opener: Arc<dyn TransportOpener>,
    settings: SessionSettings,
    shared: Arc<SessionShared>,
    transport: SharedTransport,
    reader: Option<ReaderHandle>,
}

impl ConnectionSession {
    /// Session backed by one value that both enumerates and opens devices.
    pub fn new<B>(backend: B, settings: SessionSettings) -> Self
    where
        B: DeviceCatalog + TransportOpener + 'static,
    {
        let backend = Arc::new(backend);
        Self::with_parts(backend.clone(), backend, settings)
    }

    pub fn with_parts(
        catalog: Arc<dyn DeviceCatalog>,
        opener: Arc<dyn TransportOpener>,
        settings: SessionSettings,
    ) -> Self {
        let capacity = settings.buffer_capacity.max(FRAME_SIZE);
        // A zero timeout would turn the reader into a busy loop
        let settings = SessionSettings {
            buffer_capacity: capacity,
            read_timeout_ms: settings.read_timeout_ms.max(1),
            read_chunk_size: settings.read_chunk_size.max(1),
        };
        Self {
            catalog,
            opener,
            settings,
            shared: Arc::new(SessionShared::new(capacity)),
            transport: Arc::new(Mutex::new(None)),
            reader: None,
        }
    }

    /// Session over the host's serial ports.
    pub fn system(settings: SessionSettings) -> Self {
        Self::new(SystemSerial, settings)
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Identity of the connected device, kept until the next disconnect.
    pub fn device(&self) -> Option<DeviceDescriptor> {
        self.shared.lock().device.clone()
    }

    /// Bind a new sink and return its receiving half.
    /// Replaces any existing binding.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.shared.lock().sink = Some(tx);
        rx
    }

    /// Drop the sink binding. Events are discarded until the next `subscribe`.
    pub fn unsubscribe(&self) {
        self.shared.lock().sink = None;
    }

    /// Enumerated devices as `name -> "vendorId:productId"`.
    pub fn get_devices(&self) -> Result<BTreeMap<String, String>, SessionError> {
        let devices = self
            .catalog
            .devices()
            .map_err(|e| SessionError::Enumeration(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|entry| (entry.descriptor.name.clone(), entry.descriptor.id_pair()))
            .collect())
    }

    pub fn connect(&mut self, selector: &DeviceDescriptor) -> Result<String, SessionError> {
        for (field, value) in [
            ("name", &selector.name),
            ("vendorId", &selector.vendor_id),
            ("productId", &selector.product_id),
        ] {
            if value.is_empty() {
                return Err(SessionError::InvalidArgument(format!("{} is required", field)));
            }
        }

        {
            let mut core = self.shared.lock();
            match core.state {
                SessionState::Idle | SessionState::Closed | SessionState::Faulted => {}
                SessionState::Connecting | SessionState::Streaming => {
                    return Err(SessionError::AlreadyConnected);
                }
            }
            core.state = SessionState::Connecting;
        }

        // A reader that ended on a fault may not have been joined yet
        if let Some(reader) = self.reader.take() {
            if !reader.stop() {
                tlog!("[session] Previous reader panicked");
            }
        }
        release_transport(&self.transport);

        match self.open_device(selector) {
            Ok((entry, transport)) => self.start_streaming(entry, transport),
            Err(e) => {
                tlog!("[session] Connect to {} failed: {}", selector.name, e);
                let mut core = self.shared.lock();
                core.state = SessionState::Idle;
                core.device = None;
                Err(e)
            }
        }
    }

    /// Resolve, open and configure the selected device.
    fn open_device(
        &self,
        selector: &DeviceDescriptor,
    ) -> Result<(DeviceEntry, Box<dyn Transport>), SessionError> {
        let devices = self
            .catalog
            .devices()
            .map_err(|e| SessionError::Enumeration(e.to_string()))?;

        let entry = devices
            .into_iter()
            .find(|entry| entry.descriptor == *selector)
            .ok_or_else(|| {
                SessionError::DeviceNotFound(format!("{} ({})", selector.name, selector.id_pair()))
            })?;

        let port_path = entry
            .port_path
            .clone()
            .ok_or_else(|| SessionError::NoSerialPort(entry.descriptor.name.clone()))?;

        let mut transport = self.opener.open(&port_path).map_err(|e| match e {
            OpenError::PermissionDenied(detail) => SessionError::PermissionDenied {
                device: port_path.clone(),
                detail,
            },
            OpenError::Failed(detail) => SessionError::TransportOpenFailure {
                device: port_path.clone(),
                detail,
            },
        })?;

        if let Err(e) = transport.configure(&SCALE_LINE_SETTINGS) {
            if let Err(close_err) = transport.close() {
                tlog!("[session] Close after failed configure: {}", close_err);
            }
            return Err(SessionError::ConnectionFailed {
                device: port_path,
                detail: e.to_string(),
            });
        }

        tlog!("[session] Opened {} at {}", port_path, SCALE_LINE_SETTINGS);
        Ok((entry, transport))
    }

    fn start_streaming(
        &mut self,
        entry: DeviceEntry,
        transport: Box<dyn Transport>,
    ) -> Result<String, SessionError> {
        let port = entry
            .port_path
            .clone()
            .unwrap_or_else(|| entry.descriptor.name.clone());

        *lock_or_recover(&self.transport, "transport") = Some(transport);
        {
            let mut core = self.shared.lock();
            core.buffer.clear();
            core.device = Some(entry.descriptor);
            core.state = SessionState::Streaming;
        }

        let ctx = ReaderContext {
            shared: self.shared.clone(),
            transport: self.transport.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            read_timeout: self.settings.read_timeout(),
            chunk_size: self.settings.read_chunk_size,
            port: port.clone(),
        };

        match spawn_reader(ctx) {
            Ok(handle) => {
                self.reader = Some(handle);
                tlog!("[session] Connected to {}", port);
                Ok("Connected to weight scale".to_string())
            }
            Err(e) => {
                {
                    let mut core = self.shared.lock();
                    core.state = SessionState::Idle;
                    core.device = None;
                }
                release_transport(&self.transport);
                Err(SessionError::ConnectionFailed {
                    device: port,
                    detail: format!("failed to start reader: {}", e),
                })
            }
        }
    }

    /// Stop the reader, close the transport, clear the buffer and release the
    /// sink. Safe to call in any state.
    ///
    /// No frame or error event is delivered after this returns.
    pub fn disconnect(&mut self) -> Result<String, SessionError> {
        let reader = self.reader.take();
        if let Some(ref reader) = reader {
            reader.cancel.store(true, Ordering::SeqCst);
        }

        let previous = {
            let mut core = self.shared.lock();
            let previous = core.state;
            core.state = SessionState::Idle;
            core.buffer.clear();
            core.device = None;
            core.sink = None;
            previous
        };

        let reader_ok = reader.map(ReaderHandle::stop).unwrap_or(true);
        release_transport(&self.transport);

        tlog!("[session] Disconnected (was {:?})", previous);

        if reader_ok {
            Ok("Disconnected and stopped reading".to_string())
        } else {
            Err(SessionError::DisconnectionFailed(
                "reader thread panicked".to_string(),
            ))
        }
    }

    /// Write raw bytes to the device.
    pub fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        if self.state() != SessionState::Streaming {
            return Err(SessionError::NotConnected);
        }

        let mut guard = lock_or_recover(&self.transport, "transport");
        let transport = guard.as_mut().ok_or(SessionError::NotConnected)?;
        transport.write(data)?;
        Ok(())
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        if self.reader.is_some() || self.state() != SessionState::Idle {
            if let Err(e) = self.disconnect() {
                tlog!("[session] Disconnect on drop failed: {}", e);
            }
        }
    }
}
