// src/io/serial/transport.rs
//
// Seams between the session and the platform's serial layer: device
// enumeration, opening, and the byte-stream transport itself.
// `SystemSerial` implements them over the serialport crate.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use super::utils::{
    to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits, LineSettings,
    SCALE_LINE_SETTINGS,
};
use crate::io::error::OpenError;
use crate::io::types::{DeviceDescriptor, DeviceEntry};

// ============================================================================
// Traits
// ============================================================================

/// Byte-stream connection to an opened device.
pub trait Transport: Send {
    /// Apply line parameters. Called once, right after opening.
    fn configure(&mut self, settings: &LineSettings) -> io::Result<()>;

    /// Blocking read bounded by `timeout`.
    ///
    /// `Ok(0)` means the device closed the stream. An elapsed timeout is
    /// reported as `ErrorKind::TimedOut`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}

/// Enumerates candidate devices.
pub trait DeviceCatalog: Send + Sync {
    fn devices(&self) -> io::Result<Vec<DeviceEntry>>;
}

/// Opens a transport on a serial port path.
pub trait TransportOpener: Send + Sync {
    fn open(&self, port_path: &str) -> Result<Box<dyn Transport>, OpenError>;
}

// ============================================================================
// serialport Backend
// ============================================================================

/// Device catalog and opener backed by the host's serial ports.
///
/// Only USB ports are listed, since only they carry a vendor/product identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl DeviceCatalog for SystemSerial {
    fn devices(&self) -> io::Result<Vec<DeviceEntry>> {
        let ports = serialport::available_ports().map_err(io::Error::from)?;

        Ok(ports
            .into_iter()
            // On macOS, only show /dev/cu.* (calling unit) devices
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .filter_map(|p| match p.port_type {
                serialport::SerialPortType::UsbPort(info) => Some(DeviceEntry {
                    descriptor: DeviceDescriptor::new(
                        p.port_name.clone(),
                        info.vid.to_string(),
                        info.pid.to_string(),
                    ),
                    port_path: Some(p.port_name),
                }),
                _ => None,
            })
            .collect())
    }
}

impl TransportOpener for SystemSerial {
    fn open(&self, port_path: &str) -> Result<Box<dyn Transport>, OpenError> {
        let timeout = Duration::from_millis(100);
        let port = serialport::new(port_path, SCALE_LINE_SETTINGS.baud_rate)
            .timeout(timeout)
            .open()
            .map_err(classify_open_error)?;

        Ok(Box::new(SerialTransport {
            port: Some(port),
            timeout,
        }))
    }
}

/// Permission failures get their own error so callers can prompt for access.
fn classify_open_error(e: serialport::Error) -> OpenError {
    match e.kind() {
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            OpenError::PermissionDenied(e.to_string())
        }
        _ => OpenError::Failed(e.to_string()),
    }
}

/// Opened serial port. Dropping the port closes it.
struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl SerialTransport {
    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Connection closed"))
    }
}

impl Transport for SerialTransport {
    fn configure(&mut self, settings: &LineSettings) -> io::Result<()> {
        let port = self.port()?;
        port.set_baud_rate(settings.baud_rate)?;
        port.set_data_bits(to_serialport_data_bits(settings.data_bits))?;
        port.set_stop_bits(to_serialport_stop_bits(settings.stop_bits))?;
        port.set_parity(to_serialport_parity(settings.parity))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if timeout != self.timeout {
            self.port()?.set_timeout(timeout)?;
            self.timeout = timeout;
        }
        self.port()?.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.port.take();
        Ok(())
    }
}
