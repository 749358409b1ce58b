//! Channel and acquisition settings, and the per-model profile they are checked
//! against.

use crate::error::ValidationError;
use crate::mnemonic::scpi_matches;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    Dc,
    Ac,
    Ground,
}

impl Coupling {
    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Dc => "DC",
            Self::Ac => "AC",
            Self::Ground => "GND",
        }
    }
}

impl FromStr for Coupling {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DC" => Ok(Self::Dc),
            "AC" => Ok(Self::Ac),
            "GND" | "GROUND" => Ok(Self::Ground),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "coupling",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    Sample,
    PeakDetect,
    /// Oversampled and boxcar-averaged for extra vertical resolution.
    HiRes,
    Average,
    Envelope,
}

impl AcquisitionMode {
    const ALL: [Self; 5] = [
        Self::Sample,
        Self::PeakDetect,
        Self::HiRes,
        Self::Average,
        Self::Envelope,
    ];

    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Sample => "SAMple",
            Self::PeakDetect => "PEAKdetect",
            Self::HiRes => "HIRes",
            Self::Average => "AVErage",
            Self::Envelope => "ENVelope",
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| scpi_matches(s, mode.as_scpi()))
            .ok_or_else(|| ValidationError::UnrecognizedToken {
                kind: "acquisition mode",
                value: s.to_string(),
            })
    }
}

/// What `ACQuire:STATE` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCommand {
    Run,
    Stop,
    /// One triggered record, then stop.
    Single,
}

impl FromStr for RunCommand {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUN" => Ok(Self::Run),
            "STOP" => Ok(Self::Stop),
            "SINGLE" | "SEQUENCE" | "SEQ" => Ok(Self::Single),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "acquisition state",
                value: s.to_string(),
            }),
        }
    }
}

/// Read back from `ACQuire:STATE?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    Running,
    Stopped,
}

impl FromStr for AcquisitionState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1" | "ON" | "RUN" => Ok(Self::Running),
            "0" | "OFF" | "STOP" => Ok(Self::Stopped),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "acquisition state",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Digitizing level that maps to the channel's voltage offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroCode {
    /// Read `WFMOutpre:YOFf?` alongside every transfer.
    Reported,
    /// Assume a fixed code, validated against known-good captures.
    Fixed(i32),
}

/// How binary curves are requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryEncoding {
    pub byte_width: u8,
    pub byte_order: ByteOrder,
    pub zero_code: ZeroCode,
}

impl BinaryEncoding {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.byte_width {
            1 | 2 => Ok(()),
            other => Err(ValidationError::ByteWidth(other)),
        }
    }
}

impl Default for BinaryEncoding {
    /// Signed 16-bit, most significant byte first (`RIBinary`, `BYT_Nr 2`).
    fn default() -> Self {
        Self {
            byte_width: 2,
            byte_order: ByteOrder::BigEndian,
            zero_code: ZeroCode::Reported,
        }
    }
}

/// Model-specific limits every setter and transfer is validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeProfile {
    /// Substring the `*IDN?` response must contain.
    pub family: String,
    pub channels: u8,
    pub min_record_length: usize,
    pub max_record_length: usize,
    #[serde(default)]
    pub encoding: BinaryEncoding,
}

impl ScopeProfile {
    const MIN_RECORD_LENGTH: usize = 1_000;
    const MAX_RECORD_LENGTH: usize = 50_000_000;
    /// Vertical divisions either side of centre screen.
    pub const HALF_SCREEN_DIVISIONS: f64 = 5.0;

    fn mso4(channels: u8) -> Self {
        Self {
            family: "MSO4".to_string(),
            channels,
            min_record_length: Self::MIN_RECORD_LENGTH,
            max_record_length: Self::MAX_RECORD_LENGTH,
            encoding: BinaryEncoding::default(),
        }
    }

    pub fn mso44b() -> Self {
        Self::mso4(4)
    }

    pub fn mso46b() -> Self {
        Self::mso4(6)
    }

    pub fn validate_channel(&self, channel: u8) -> Result<u8, ValidationError> {
        if (1..=self.channels).contains(&channel) {
            Ok(channel)
        } else {
            Err(ValidationError::ChannelOutOfRange {
                channel,
                max: self.channels,
            })
        }
    }

    pub fn validate_record_length(&self, length: usize) -> Result<usize, ValidationError> {
        if (self.min_record_length..=self.max_record_length).contains(&length) {
            Ok(length)
        } else {
            Err(ValidationError::RecordLength {
                value: length,
                min: self.min_record_length,
                max: self.max_record_length,
            })
        }
    }
}

impl Default for ScopeProfile {
    fn default() -> Self {
        Self::mso44b()
    }
}

/// Reject zero, negative, and non-finite values.
pub(crate) fn require_positive(what: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::NotPositive { what, value })
    }
}
