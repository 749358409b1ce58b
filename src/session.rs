//! One exclusive SCPI conversation with one instrument.
//!
//! A [`Session`] is not synchronised. Every operation takes `&mut self`, so a
//! session can only be driven by its single owner; sharing one between threads
//! needs an external lock. Dropping the session closes it.

use crate::error::{InstrumentError, Result};
use crate::transport::{ResourceManager, Transport, TransportError};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Session {
    resource: String,
    timeout: Duration,
    identity: Option<String>,
    transport: Option<Box<dyn Transport>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.resource)
            .field("timeout", &self.timeout)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Session {
    /// Open `resource` and check that `*IDN?` mentions `expected_family`.
    pub fn open(
        manager: &dyn ResourceManager,
        resource: &str,
        timeout: Duration,
        expected_family: &str,
    ) -> Result<Self> {
        let mut session = Self::open_unchecked(manager, resource, timeout)?;

        let identity = match session.send_query("*IDN?") {
            Ok(identity) => identity,
            Err(e) => {
                return Err(InstrumentError::Connection {
                    resource: resource.to_string(),
                    reason: format!("identification query failed: {e}"),
                })
            }
        };
        log::debug!("{resource} identifies as {identity}");

        if !identity.contains(expected_family) {
            return Err(InstrumentError::Connection {
                resource: resource.to_string(),
                reason: format!("expected a {expected_family} but found '{identity}'"),
            });
        }
        session.identity = Some(identity);
        Ok(session)
    }

    /// Open `resource` without identifying it.
    pub fn open_unchecked(
        manager: &dyn ResourceManager,
        resource: &str,
        timeout: Duration,
    ) -> Result<Self> {
        log::debug!("Opening {resource} with a {timeout:?} timeout");
        let transport = manager
            .open(resource, timeout)
            .map_err(|e| InstrumentError::Connection {
                resource: resource.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_transport(resource, transport, timeout))
    }

    pub fn with_transport(resource: &str, transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            resource: resource.to_string(),
            timeout,
            identity: None,
            transport: Some(transport),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `*IDN?` response recorded when the session was opened with [`Session::open`].
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>> {
        let resource = &self.resource;
        self.transport
            .as_mut()
            .ok_or_else(|| InstrumentError::SessionClosed(resource.clone()))
    }

    fn map_error(&self, command: &str, error: TransportError) -> InstrumentError {
        match error {
            TransportError::Timeout(_) => InstrumentError::Timeout {
                command: command.to_string(),
                timeout_ms: self.timeout.as_millis(),
            },
            other => InstrumentError::Communication(other),
        }
    }

    fn write_command(&mut self, command: &str) -> Result<()> {
        log::debug!("-> {command}");
        let line = format!("{command}\n");
        let result = self.transport()?.write_all(line.as_bytes());
        result.map_err(|e| self.map_error(command, e))
    }

    /// Send a command that produces no response.
    pub fn send(&mut self, command: &str) -> Result<()> {
        self.write_command(command)
    }

    /// Send a query and read one response line.
    pub fn send_query(&mut self, command: &str) -> Result<String> {
        self.write_command(command)?;
        let result = self.transport()?.read_line();
        let line = result.map_err(|e| self.map_error(command, e))?;
        let response = String::from_utf8_lossy(&line).trim().to_string();
        log::debug!("<- {response}");
        Ok(response)
    }

    /// Send a query and parse the response with [`FromStr`].
    pub fn query_parse<T: FromStr>(&mut self, command: &str) -> Result<T> {
        let response = self.send_query(command)?;
        response
            .parse()
            .map_err(|_| InstrumentError::unexpected(command, &response))
    }

    /// Send a query answered with an IEEE 488.2 definite-length block
    /// (`#<n><length><payload><LF>`) and return the payload.
    ///
    /// A header declaring more than `max_len` bytes is rejected before the
    /// payload is read.
    pub fn query_block(&mut self, command: &str, max_len: usize) -> Result<Vec<u8>> {
        self.write_command(command)?;

        let mut marker = [0u8; 2];
        self.read_exact(command, &mut marker)?;
        if marker[0] != b'#' {
            // Resynchronise on the rest of the line before reporting.
            let _ = self.transport()?.read_line();
            return Err(InstrumentError::DataIntegrity(format!(
                "expected a binary block after '{command}' but got {:?}",
                String::from_utf8_lossy(&marker)
            )));
        }

        let digits = match marker[1] {
            b'1'..=b'9' => usize::from(marker[1] - b'0'),
            b'0' => {
                return Err(InstrumentError::DataIntegrity(
                    "indefinite-length blocks are not supported".to_string(),
                ))
            }
            other => {
                return Err(InstrumentError::DataIntegrity(format!(
                    "invalid block header digit count {:?}",
                    char::from(other)
                )))
            }
        };

        let mut length_field = vec![0u8; digits];
        self.read_exact(command, &mut length_field)?;
        let length: usize = std::str::from_utf8(&length_field)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                InstrumentError::DataIntegrity(format!(
                    "invalid block length field {:?}",
                    String::from_utf8_lossy(&length_field)
                ))
            })?;

        if length > max_len {
            // Drain what the instrument sends so the next query starts clean.
            self.discard_pending();
            return Err(InstrumentError::DataIntegrity(format!(
                "block declared {length} bytes but at most {max_len} were expected"
            )));
        }

        let mut payload = vec![0u8; length];
        match self.read_exact(command, &mut payload) {
            Ok(()) => {}
            Err(InstrumentError::Timeout { .. }) => {
                return Err(InstrumentError::DataIntegrity(format!(
                    "block declared {length} bytes but the payload was incomplete"
                )))
            }
            Err(e) => return Err(e),
        }

        let mut terminator = [0u8; 1];
        self.read_exact(command, &mut terminator)?;
        if terminator[0] == b'\r' {
            self.read_exact(command, &mut terminator)?;
        }
        if terminator[0] != b'\n' {
            return Err(InstrumentError::DataIntegrity(format!(
                "block of {length} bytes is not followed by a line terminator"
            )));
        }
        log::debug!("<- block of {length} bytes");
        Ok(payload)
    }

    fn discard_pending(&mut self) {
        if let Ok(transport) = self.transport() {
            let mut byte = [0u8; 1];
            while transport.read_exact(&mut byte).is_ok() {}
        }
    }

    fn read_exact(&mut self, command: &str, buf: &mut [u8]) -> Result<()> {
        let result = self.transport()?.read_exact(buf);
        result.map_err(|e| self.map_error(command, e))
    }

    /// Release the conduit. Closing an already closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            log::debug!("Closing {}", self.resource);
            transport
                .close()
                .map_err(InstrumentError::Communication)?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close {}: {e}", self.resource);
        }
    }
}
