use crate::error::ValidationError;
use crate::mnemonic::scpi_matches;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSlope {
    Rising,
    Falling,
}

impl TriggerSlope {
    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Rising => "RISe",
            Self::Falling => "FALL",
        }
    }
}

impl FromStr for TriggerSlope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if scpi_matches(s, "RISe") || s.trim().eq_ignore_ascii_case("RISING") {
            Ok(Self::Rising)
        } else if scpi_matches(s, "FALL") || s.trim().eq_ignore_ascii_case("FALLING") {
            Ok(Self::Falling)
        } else {
            Err(ValidationError::UnrecognizedToken {
                kind: "trigger slope",
                value: s.to_string(),
            })
        }
    }
}

impl fmt::Display for TriggerSlope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rising => f.write_str("rising"),
            Self::Falling => f.write_str("falling"),
        }
    }
}

/// State reported by `TRIGger:STATE?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    /// Acquiring pretrigger data.
    Armed,
    /// Running without a trigger in auto mode.
    Auto,
    /// Pretrigger data acquired, waiting for the trigger.
    Ready,
    /// Acquisition stopped, the record is complete.
    Save,
    /// Triggered, acquiring post-trigger data.
    Trigger,
}

impl TriggerState {
    /// A trigger event has occurred and the record can be read.
    pub fn has_fired(&self) -> bool {
        matches!(self, Self::Trigger | Self::Save)
    }
}

impl FromStr for TriggerState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ARMED" | "ARM" => Ok(Self::Armed),
            "AUTO" => Ok(Self::Auto),
            "READY" | "REA" => Ok(Self::Ready),
            "SAVE" | "SAV" => Ok(Self::Save),
            "TRIGGER" | "TRIG" => Ok(Self::Trigger),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "trigger state",
                value: s.to_string(),
            }),
        }
    }
}

/// Edge trigger on one analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeTrigger {
    pub source: u8,
    pub level: f64,
    pub slope: TriggerSlope,
}

impl EdgeTrigger {
    pub fn new(source: u8, level: f64, slope: TriggerSlope) -> Self {
        Self {
            source,
            level,
            slope,
        }
    }

    /// Start building a trigger on `source` at `level` volts.
    pub fn start_capturing_when(source: u8, level: f64) -> EdgeTriggerBuilder {
        EdgeTriggerBuilder { source, level }
    }
}

#[derive(Debug)]
pub struct EdgeTriggerBuilder {
    source: u8,
    level: f64,
}

impl EdgeTriggerBuilder {
    pub fn rising_edge(self) -> EdgeTrigger {
        EdgeTrigger::new(self.source, self.level, TriggerSlope::Rising)
    }

    pub fn falling_edge(self) -> EdgeTrigger {
        EdgeTrigger::new(self.source, self.level, TriggerSlope::Falling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_normalisation() {
        for token in ["RISE", "rise", "RIS", "Rising", " RISING "] {
            assert_eq!(token.parse::<TriggerSlope>().unwrap(), TriggerSlope::Rising);
        }
        for token in ["FALL", "falling"] {
            assert_eq!(token.parse::<TriggerSlope>().unwrap(), TriggerSlope::Falling);
        }
        assert!("EITHER".parse::<TriggerSlope>().is_err());
    }

    #[test]
    fn test_trigger_state() {
        assert!("TRIGGER".parse::<TriggerState>().unwrap().has_fired());
        assert!("SAVE".parse::<TriggerState>().unwrap().has_fired());
        assert!(!"READY".parse::<TriggerState>().unwrap().has_fired());
        assert!("BUSY".parse::<TriggerState>().is_err());
    }

    #[test]
    fn test_builder() {
        let trigger = EdgeTrigger::start_capturing_when(2, 0.25).falling_edge();
        assert_eq!(trigger, EdgeTrigger::new(2, 0.25, TriggerSlope::Falling));
    }
}
