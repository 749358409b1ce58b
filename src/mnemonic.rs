//! Normalisation of SCPI keyword tokens.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Whether `token` names `mnemonic` in either its short form (the upper-case
/// prefix, `SAM` for `SAMple`) or its long form, ignoring case.
pub fn scpi_matches(token: &str, mnemonic: &str) -> bool {
    let short: String = mnemonic
        .chars()
        .take_while(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '*')
        .collect();
    let token = token.trim();
    token.eq_ignore_ascii_case(&short) || token.eq_ignore_ascii_case(mnemonic)
}

/// Boolean instrument switch. Parses `ON`/`OFF`, `1`/`0` and `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn as_scpi(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl From<Switch> for bool {
    fn from(switch: Switch) -> Self {
        switch.is_on()
    }
}

impl FromStr for Switch {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON" | "1" | "TRUE" => Ok(Self::On),
            "OFF" | "0" | "FALSE" => Ok(Self::Off),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "switch state",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}
