//! VISA-backed resources through the `visa-rs` bindings.
//!
//! Requires a VISA runtime (NI-VISA, Keysight IO Libraries, R&S VISA) installed
//! on the host. The per-read timeout is the runtime's `VI_ATTR_TMO_VALUE`; the
//! timeout passed to [`ResourceManager::open`] bounds opening the resource.

use crate::transport::{ResourceManager, Transport, TransportError};
use std::ffi::CString;
use std::io::{Read, Write};
use std::time::Duration;
use visa_rs::prelude::*;

const INSTRUMENT_EXPRESSION: &str = "?*INSTR";

fn visa_error(error: impl std::fmt::Display) -> TransportError {
    TransportError::Visa(error.to_string())
}

fn io_error(error: std::io::Error, timeout: Duration) -> TransportError {
    let message = error.to_string();
    if error.kind() == std::io::ErrorKind::TimedOut || message.contains("TMO") {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Io(error)
    }
}

/// Opens resources through the system VISA library.
///
/// The timeout given to [`ResourceManager::open`] only bounds opening the
/// resource. Reads and writes wait for the resource's own `VI_ATTR_TMO_VALUE`
/// (2 s unless the VISA configuration says otherwise), not the session timeout.
/// A VISA timeout is still reported as [`TransportError::Timeout`] carrying the
/// session timeout.
pub struct VisaResourceManager {
    rm: DefaultRM,
}

impl VisaResourceManager {
    pub fn new() -> Result<Self, TransportError> {
        let rm = DefaultRM::new().map_err(visa_error)?;
        Ok(Self { rm })
    }
}

impl ResourceManager for VisaResourceManager {
    fn list_resources(&self) -> Result<Vec<String>, TransportError> {
        let expression = CString::new(INSTRUMENT_EXPRESSION).map_err(visa_error)?;
        let mut list = match self.rm.find_res_list(&expression.into()) {
            Ok(list) => list,
            // VI_ERROR_RSRC_NFOUND: nothing attached
            Err(e) => {
                log::debug!("VISA resource search returned no resources: {e}");
                return Ok(Vec::new());
            }
        };

        let mut resources = Vec::new();
        while let Some(resource) = list.find_next().map_err(visa_error)? {
            resources.push(resource.to_string());
        }
        Ok(resources)
    }

    fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Transport>, TransportError> {
        let name = CString::new(resource).map_err(visa_error)?;
        let instrument = self
            .rm
            .open(&name.into(), AccessMode::NO_LOCK, timeout)
            .map_err(visa_error)?;
        log::debug!("Opened VISA resource {resource}");
        Ok(Box::new(VisaTransport {
            instrument,
            timeout,
        }))
    }
}

pub struct VisaTransport {
    instrument: Instrument,
    timeout: Duration,
}

impl Transport for VisaTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.instrument
            .write_all(data)
            .map_err(|e| io_error(e, self.timeout))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.instrument
            .read_exact(buf)
            .map_err(|e| io_error(e, self.timeout))
    }
}
