//! Point-in-time record of the instrument configuration behind a capture.
//!
//! Collection never fails as a whole. Whatever cannot be read is left out and
//! described in [`MetadataSnapshot::warnings`].

use crate::error::Result;
use crate::oscilloscope::Oscilloscope;
use crate::scope_settings::{AcquisitionMode, Coupling};
use crate::trigger_config::EdgeTrigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The four comma-separated fields of an `*IDN?` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentIdentity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl InstrumentIdentity {
    /// Missing fields are left empty.
    pub fn parse(response: &str) -> Self {
        let mut fields = response.splitn(4, ',').map(|field| field.trim().to_string());
        Self {
            vendor: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial: fields.next().unwrap_or_default(),
            firmware: fields.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    pub sample_rate: f64,
    pub record_length: usize,
    pub mode: AcquisitionMode,
    pub horizontal_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub scale: f64,
    pub offset: f64,
    pub position: f64,
    pub coupling: Coupling,
    pub bandwidth: f64,
    pub termination: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub captured_at: DateTime<Utc>,
    pub resource: String,
    pub identity: Option<InstrumentIdentity>,
    pub acquisition: Option<AcquisitionSettings>,
    /// Keyed by channel label (`CH1`, `CH2`, ...).
    pub channels: BTreeMap<String, ChannelSettings>,
    pub trigger: Option<EdgeTrigger>,
    pub warnings: Vec<String>,
}

fn note(warnings: &mut Vec<String>, message: String) {
    log::warn!("{message}");
    warnings.push(message);
}

impl Oscilloscope {
    /// Snapshot identity, trigger and the settings of `channels`, plus the
    /// acquisition settings when `include_global` is set.
    pub fn collect_metadata(&mut self, channels: &[u8], include_global: bool) -> MetadataSnapshot {
        let mut warnings = Vec::new();
        let captured_at = Utc::now();

        let identity = match self.identify() {
            Ok(response) => Some(InstrumentIdentity::parse(&response)),
            Err(e) => {
                note(&mut warnings, format!("identity unavailable: {e}"));
                None
            }
        };

        let acquisition = if include_global {
            match self.acquisition_settings() {
                Ok(settings) => Some(settings),
                Err(e) => {
                    note(&mut warnings, format!("acquisition settings unavailable: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let mut settings = BTreeMap::new();
        for &channel in channels {
            match self.channel_settings(channel) {
                Ok(channel_settings) => {
                    settings.insert(format!("CH{channel}"), channel_settings);
                }
                Err(e) => note(&mut warnings, format!("CH{channel} settings unavailable: {e}")),
            }
        }

        let trigger = match self.trigger() {
            Ok(trigger) => Some(trigger),
            Err(e) => {
                note(&mut warnings, format!("trigger settings unavailable: {e}"));
                None
            }
        };

        MetadataSnapshot {
            captured_at,
            resource: self.session().resource().to_string(),
            identity,
            acquisition,
            channels: settings,
            trigger,
            warnings,
        }
    }

    fn acquisition_settings(&mut self) -> Result<AcquisitionSettings> {
        Ok(AcquisitionSettings {
            sample_rate: self.sample_rate()?,
            record_length: self.record_length()?,
            mode: self.acquisition_mode()?,
            horizontal_scale: self.time_scale()?,
        })
    }

    pub fn channel_settings(&mut self, channel: u8) -> Result<ChannelSettings> {
        Ok(ChannelSettings {
            enabled: self.channel_enabled(channel)?,
            scale: self.channel_scale(channel)?,
            offset: self.channel_offset(channel)?,
            position: self.channel_position(channel)?,
            coupling: self.coupling(channel)?,
            bandwidth: self.channel_bandwidth(channel)?,
            termination: self.channel_termination(channel)?,
        })
    }
}
