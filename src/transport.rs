//! Byte-level conduits to instruments.
//!
//! A [`ResourceManager`] enumerates and opens resource strings; the [`Transport`]
//! it hands back moves raw bytes. Everything above this layer speaks SCPI through
//! [`crate::session::Session`].
//!
//! [`NativeResourceManager`] needs no VISA runtime: it opens `ASRL…::INSTR`
//! resources through `serialport` and `TCPIP…::<port>::SOCKET` resources through a
//! plain TCP socket. VISA-only resources (`TCPIP::<ip>::INSTR`, `USB…`) need the
//! `instrument_visa` feature.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Line settings used for serial-attached instruments (8N1, no flow control).
pub const SERIAL_BAUD_RATE: u32 = 115_200;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No data from the instrument within {0:?}")]
    Timeout(Duration),

    #[error("Resource '{0}' is not supported by this resource manager")]
    UnsupportedResource(String),

    #[error("VISA error: {0}")]
    Visa(String),
}

impl TransportError {
    fn from_io(error: std::io::Error, timeout: Duration) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout(timeout),
            _ => Self::Io(error),
        }
    }
}

/// One open byte conduit. Implementations are used by a single owner at a time.
pub trait Transport: Send {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Fill `buf` completely or fail with [`TransportError::Timeout`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Read one message up to and including the `\n` terminator. The terminator
    /// (and a preceding `\r`) is stripped.
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.read_exact(&mut byte)?;
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Enumerates and opens resource strings.
pub trait ResourceManager {
    fn list_resources(&self) -> Result<Vec<String>, TransportError>;

    fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Transport>, TransportError>;
}

/// The three ways an instrument can be addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// Ethernet by IP address, `TCPIP::<ip>::INSTR`.
    Tcpip(String),
    /// Serial port name such as `COM3` or `/dev/ttyUSB0`, `ASRL<port>::INSTR`.
    Serial(String),
    /// A resource string used verbatim.
    Resource(String),
}

impl ResourceAddress {
    pub fn resource_string(&self) -> String {
        match self {
            Self::Tcpip(ip) => format!("TCPIP::{ip}::INSTR"),
            Self::Serial(port) => format!("ASRL{port}::INSTR"),
            Self::Resource(name) => name.clone(),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_string())
    }
}

/// Serial port name for an `ASRL<port>::INSTR` resource.
fn serial_port_name(resource: &str) -> Option<String> {
    let upper = resource.to_ascii_uppercase();
    if !upper.starts_with("ASRL") || !upper.ends_with("::INSTR") {
        return None;
    }
    let body = &resource[4..resource.len() - "::INSTR".len()];
    if body.is_empty() {
        return None;
    }
    if body.chars().all(|c| c.is_ascii_digit()) {
        // Bare VISA board numbers
        if cfg!(windows) {
            return Some(format!("COM{body}"));
        }
        return Some(format!("/dev/ttyS{body}"));
    }
    Some(body.to_string())
}

/// Host and port for a `TCPIP[n]::<host>::<port>::SOCKET` resource.
fn socket_address(resource: &str) -> Option<(String, u16)> {
    let parts: Vec<&str> = resource.split("::").collect();
    match parts.as_slice() {
        [board, host, port, kind]
            if board.to_ascii_uppercase().starts_with("TCPIP")
                && kind.eq_ignore_ascii_case("SOCKET") =>
        {
            Some(((*host).to_string(), port.parse().ok()?))
        }
        _ => None,
    }
}

pub struct SerialTransport {
    serial: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialTransport {
    pub fn new(port: &str, timeout: Duration) -> Result<Self, TransportError> {
        let serial = serialport::new(port, SERIAL_BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        log::debug!("Opened serial port {port} at {SERIAL_BAUD_RATE} baud");

        let mut transport = Self { serial, timeout };
        transport.flush()?;
        Ok(transport)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.serial
            .write_all(data)
            .map_err(|e| TransportError::from_io(e, self.timeout))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.serial
            .read_exact(buf)
            .map_err(|e| TransportError::from_io(e, self.timeout))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.flush()
    }
}

pub struct SocketTransport {
    reader: BufReader<TcpStream>,
    timeout: Duration,
}

impl SocketTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let address = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{host} did not resolve"),
            ))
        })?;
        let stream = TcpStream::connect_timeout(&address, timeout)
            .map_err(|e| TransportError::from_io(e, timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        log::debug!("Connected socket to {address}");

        Ok(Self {
            reader: BufReader::new(stream),
            timeout,
        })
    }
}

impl Transport for SocketTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.reader
            .get_mut()
            .write_all(data)
            .map_err(|e| TransportError::from_io(e, self.timeout))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.reader
            .read_exact(buf)
            .map_err(|e| TransportError::from_io(e, self.timeout))
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut line)
            .map_err(|e| TransportError::from_io(e, self.timeout))?;
        if read == 0 || line.last() != Some(&b'\n') {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by instrument",
            )));
        }
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.reader.get_ref().shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }
}

/// Resource manager backed by `serialport` and raw TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeResourceManager;

impl ResourceManager for NativeResourceManager {
    /// Lists every serial port as an `ASRL…::INSTR` resource. Socket resources
    /// cannot be enumerated and must be addressed explicitly.
    fn list_resources(&self) -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|port| format!("ASRL{}::INSTR", port.port_name))
            .collect())
    }

    fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Transport>, TransportError> {
        if let Some(port) = serial_port_name(resource) {
            return Ok(Box::new(SerialTransport::new(&port, timeout)?));
        }
        if let Some((host, port)) = socket_address(resource) {
            return Ok(Box::new(SocketTransport::connect(&host, port, timeout)?));
        }
        Err(TransportError::UnsupportedResource(resource.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_address_strings() {
        assert_eq!(
            ResourceAddress::Tcpip("192.168.1.100".into()).resource_string(),
            "TCPIP::192.168.1.100::INSTR"
        );
        assert_eq!(
            ResourceAddress::Serial("COM3".into()).resource_string(),
            "ASRLCOM3::INSTR"
        );
        assert_eq!(
            ResourceAddress::Resource("USB0::0x0699::0x0527::C047272::INSTR".into()).to_string(),
            "USB0::0x0699::0x0527::C047272::INSTR"
        );
    }

    #[test]
    fn test_serial_port_name() {
        assert_eq!(
            serial_port_name("ASRL/dev/ttyUSB0::INSTR").as_deref(),
            Some("/dev/ttyUSB0")
        );
        assert_eq!(serial_port_name("ASRLCOM4::INSTR").as_deref(), Some("COM4"));
        assert!(serial_port_name("TCPIP::10.0.0.2::INSTR").is_none());
        assert!(serial_port_name("ASRL::INSTR").is_none());
    }

    #[test]
    fn test_socket_address() {
        assert_eq!(
            socket_address("TCPIP0::10.0.0.2::4000::SOCKET"),
            Some(("10.0.0.2".to_string(), 4000))
        );
        assert_eq!(socket_address("TCPIP::10.0.0.2::INSTR"), None);
        assert_eq!(socket_address("TCPIP0::10.0.0.2::notaport::SOCKET"), None);
    }

    #[test]
    fn test_unsupported_resource() {
        let result = NativeResourceManager.open("USB0::0x0699::0x0527::C1::INSTR", Duration::from_millis(10));
        assert!(matches!(result, Err(TransportError::UnsupportedResource(_))));
    }
}
