//! Curve wire formats and the per-transfer scaling snapshot.

use crate::calibration;
use crate::error::{InstrumentError, Result, ValidationError};
use crate::mnemonic::scpi_matches;
use crate::scope_settings::{BinaryEncoding, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Ascii,
    Binary,
}

impl FromStr for WireFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASCII" | "ASC" | "TEXT" => Ok(Self::Ascii),
            "BINARY" | "BIN" => Ok(Self::Binary),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "wire format",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// `DATa:ENCdg` values this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Ascii,
    /// Signed integers, most significant byte first.
    RiBinary,
    /// Signed integers, least significant byte first.
    SriBinary,
}

impl DataEncoding {
    pub fn for_request(format: WireFormat, binary: &BinaryEncoding) -> Self {
        match (format, binary.byte_order) {
            (WireFormat::Ascii, _) => Self::Ascii,
            (WireFormat::Binary, ByteOrder::BigEndian) => Self::RiBinary,
            (WireFormat::Binary, ByteOrder::LittleEndian) => Self::SriBinary,
        }
    }

    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Ascii => "ASCii",
            Self::RiBinary => "RIBinary",
            Self::SriBinary => "SRIbinary",
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        match self {
            Self::Ascii => WireFormat::Ascii,
            Self::RiBinary | Self::SriBinary => WireFormat::Binary,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        match self {
            Self::SriBinary => ByteOrder::LittleEndian,
            Self::Ascii | Self::RiBinary => ByteOrder::BigEndian,
        }
    }

    /// Parse a `DATa:ENCdg?` response.
    pub fn from_response(response: &str) -> Option<Self> {
        [Self::Ascii, Self::RiBinary, Self::SriBinary]
            .into_iter()
            .find(|encoding| scpi_matches(response, encoding.as_scpi()))
    }
}

/// Converts digitizing levels to volts: `(code - zero_code) * y_mult + y_zero`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageScaling {
    /// Volts per digitizing level (`WFMOutpre:YMUlt`).
    pub y_mult: f64,
    /// Volts added after scaling (`WFMOutpre:YZEro`).
    pub y_zero: f64,
    /// Level that corresponds to `y_zero` volts.
    pub zero_code: f64,
}

/// Sample clock of one record: `t[i] = x_zero + i * x_incr`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Seconds between samples (`WFMOutpre:XINcr`).
    pub x_incr: f64,
    /// Time of the first sample relative to the trigger (`WFMOutpre:XZEro`).
    pub x_zero: f64,
}

/// Scaling read in the same call as the curve it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    pub voltage: VoltageScaling,
    pub timing: Timing,
}

/// Raw result of one channel transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub channel: u8,
    pub raw: Vec<i32>,
    pub scaling: ScalingParams,
    pub format: WireFormat,
}

impl Transfer {
    pub fn to_waveform(&self) -> Waveform {
        Waveform {
            voltages: calibration::to_voltage(&self.raw, &self.scaling.voltage),
            format: self.format,
        }
    }
}

/// Calibrated samples of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub voltages: Vec<f64>,
    pub format: WireFormat,
}

/// Parse a comma- or whitespace-separated list of integer codes.
pub fn parse_ascii_curve(text: &str) -> Result<Vec<i32>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(index, token)| {
            token.parse().map_err(|_| InstrumentError::DataParse {
                index,
                token: token.to_string(),
            })
        })
        .collect()
}

/// Decode a binary block payload of signed `width`-byte integers.
pub fn decode_binary(payload: &[u8], width: u8, order: ByteOrder) -> Result<Vec<i32>> {
    let codes: Vec<i32> = match width {
        1 => payload.iter().map(|&b| i32::from(i8::from_be_bytes([b]))).collect(),
        2 => {
            if payload.len() % 2 != 0 {
                return Err(InstrumentError::DataIntegrity(format!(
                    "block of {} bytes is not a whole number of 2-byte samples",
                    payload.len()
                )));
            }
            payload
                .chunks_exact(2)
                .map(|pair| {
                    let bytes = [pair[0], pair[1]];
                    i32::from(match order {
                        ByteOrder::BigEndian => i16::from_be_bytes(bytes),
                        ByteOrder::LittleEndian => i16::from_le_bytes(bytes),
                    })
                })
                .collect()
        }
        other => return Err(ValidationError::ByteWidth(other).into()),
    };
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ascii_curve() {
        assert_eq!(parse_ascii_curve("1,-2,3").unwrap(), vec![1, -2, 3]);
        assert_eq!(parse_ascii_curve(" 4, 5 ,6\n").unwrap(), vec![4, 5, 6]);
        assert_eq!(parse_ascii_curve("7 8\t9").unwrap(), vec![7, 8, 9]);
        assert!(parse_ascii_curve("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ascii_curve_rejects_bad_token() {
        match parse_ascii_curve("1,2,x3,4") {
            Err(InstrumentError::DataParse { index, token }) => {
                assert_eq!(index, 2);
                assert_eq!(token, "x3");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(parse_ascii_curve("1,2.5").is_err());
    }

    #[test]
    fn test_decode_binary() {
        assert_eq!(
            decode_binary(&[0x00, 0x7f, 0x80, 0xff], 1, ByteOrder::BigEndian).unwrap(),
            vec![0, 127, -128, -1]
        );
        assert_eq!(
            decode_binary(&[0x01, 0x00, 0xff, 0xfe], 2, ByteOrder::BigEndian).unwrap(),
            vec![256, -2]
        );
        assert_eq!(
            decode_binary(&[0x01, 0x00, 0xff, 0xfe], 2, ByteOrder::LittleEndian).unwrap(),
            vec![1, -257]
        );
    }

    #[test]
    fn test_decode_binary_rejects_partial_sample() {
        let err = decode_binary(&[0x01, 0x02, 0x03], 2, ByteOrder::BigEndian).unwrap_err();
        assert!(matches!(err, InstrumentError::DataIntegrity(_)));
        let err = decode_binary(&[0x01], 3, ByteOrder::BigEndian).unwrap_err();
        assert!(matches!(err, InstrumentError::Validation(ValidationError::ByteWidth(3))));
    }

    #[test]
    fn test_encoding_from_response() {
        assert_eq!(DataEncoding::from_response("ASCII"), Some(DataEncoding::Ascii));
        assert_eq!(DataEncoding::from_response("RIB"), Some(DataEncoding::RiBinary));
        assert_eq!(DataEncoding::from_response("SRIBINARY"), Some(DataEncoding::SriBinary));
        assert_eq!(DataEncoding::from_response("FPBINARY"), None);
    }

    #[test]
    fn test_wire_format_parsing() {
        assert_eq!("ascii".parse::<WireFormat>().unwrap(), WireFormat::Ascii);
        assert_eq!("BINARY".parse::<WireFormat>().unwrap(), WireFormat::Binary);
        assert!("hex".parse::<WireFormat>().is_err());
    }
}
