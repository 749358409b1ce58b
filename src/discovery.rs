//! Finding instruments by asking every reachable resource who it is.

use crate::session::Session;
use crate::transport::{ResourceManager, TransportError};
use std::time::Duration;

/// A resource that answered `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    pub resource: String,
    pub identity: String,
}

/// Open `resource` just long enough to read its identity.
fn identify(manager: &dyn ResourceManager, resource: &str, timeout: Duration) -> Option<String> {
    let mut session = match Session::open_unchecked(manager, resource, timeout) {
        Ok(session) => session,
        Err(e) => {
            log::debug!("Skipping {resource}: {e}");
            return None;
        }
    };
    let identity = match session.send_query("*IDN?") {
        Ok(identity) => identity,
        Err(e) => {
            log::debug!("Skipping {resource}: {e}");
            return None;
        }
    };
    if let Err(e) = session.close() {
        log::debug!("Failed to close {resource} after identifying it: {e}");
    }
    Some(identity)
}

/// Every instrument whose identity contains `filter`. Resources that fail to
/// open or answer within `timeout` are skipped.
pub fn list_instruments(
    manager: &dyn ResourceManager,
    filter: &str,
    timeout: Duration,
) -> Result<Vec<InstrumentDescriptor>, TransportError> {
    let resources = manager.list_resources()?;
    log::debug!("Probing {} resources for '{filter}'", resources.len());

    let instruments = resources
        .into_iter()
        .filter_map(|resource| {
            let identity = identify(manager, &resource, timeout)?;
            identity.contains(filter).then_some(InstrumentDescriptor { resource, identity })
        })
        .collect();
    Ok(instruments)
}

/// The first instrument whose identity contains `filter`. Stops probing as
/// soon as one is found.
pub fn discover_one(
    manager: &dyn ResourceManager,
    filter: &str,
    timeout: Duration,
) -> Result<Option<InstrumentDescriptor>, TransportError> {
    let found = manager.list_resources()?.into_iter().find_map(|resource| {
        let identity = identify(manager, &resource, timeout)?;
        identity.contains(filter).then_some(InstrumentDescriptor { resource, identity })
    });
    if let Some(descriptor) = &found {
        log::info!("Found {} at {}", descriptor.identity, descriptor.resource);
    }
    Ok(found)
}
