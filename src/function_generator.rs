//! Tektronix AFG31000-series arbitrary function generator.

use crate::error::{InstrumentError, Result, ValidationError};
use crate::mnemonic::{scpi_matches, Switch};
use crate::scope_settings::require_positive;
use crate::session::Session;
use crate::transport::{ResourceAddress, ResourceManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorProfile {
    pub family: String,
    pub channels: u8,
}

impl GeneratorProfile {
    pub fn afg31000() -> Self {
        Self {
            family: "AFG31".to_string(),
            channels: 2,
        }
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
}

impl Default for GeneratorProfile {
    fn default() -> Self {
        Self::afg31000()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformShape {
    Sinusoid,
    Square,
    Pulse,
    Ramp,
    PrNoise,
    Dc,
    Sinc,
    Gaussian,
    Lorentz,
    ExpRise,
    ExpDecay,
    Haversine,
}

impl WaveformShape {
    const ALL: [Self; 12] = [
        Self::Sinusoid,
        Self::Square,
        Self::Pulse,
        Self::Ramp,
        Self::PrNoise,
        Self::Dc,
        Self::Sinc,
        Self::Gaussian,
        Self::Lorentz,
        Self::ExpRise,
        Self::ExpDecay,
        Self::Haversine,
    ];

    pub fn as_scpi(&self) -> &'static str {
        match self {
            Self::Sinusoid => "SINusoid",
            Self::Square => "SQUare",
            Self::Pulse => "PULSe",
            Self::Ramp => "RAMP",
            Self::PrNoise => "PRNoise",
            Self::Dc => "DC",
            Self::Sinc => "SINC",
            Self::Gaussian => "GAUSsian",
            Self::Lorentz => "LORentz",
            Self::ExpRise => "EXPRise",
            Self::ExpDecay => "EXPDecay",
            Self::Haversine => "HAVersine",
        }
    }
}

impl FromStr for WaveformShape {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("SINE") {
            return Ok(Self::Sinusoid);
        }
        Self::ALL
            .into_iter()
            .find(|shape| scpi_matches(s, shape.as_scpi()))
            .ok_or_else(|| ValidationError::UnrecognizedToken {
                kind: "waveform shape",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for WaveformShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

/// Load impedance the output amplitude is calibrated for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLoad {
    Ohms(f64),
    HighZ,
}

impl OutputLoad {
    /// Queries report an open output as 9.9E37.
    const HIGH_Z_THRESHOLD: f64 = 1e37;

    fn as_scpi(&self) -> String {
        match self {
            Self::Ohms(ohms) => ohms.to_string(),
            Self::HighZ => "INFinity".to_string(),
        }
    }
}

impl FromStr for OutputLoad {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if scpi_matches(s, "INFinity") {
            return Ok(Self::HighZ);
        }
        match s.trim().parse::<f64>() {
            Ok(ohms) if ohms >= Self::HIGH_Z_THRESHOLD => Ok(Self::HighZ),
            Ok(ohms) if ohms > 0.0 => Ok(Self::Ohms(ohms)),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "output load",
                value: s.to_string(),
            }),
        }
    }
}

pub struct FunctionGenerator {
    session: Session,
    profile: GeneratorProfile,
}

impl FunctionGenerator {
    const MAX_PHASE_DEGREES: f64 = 360.0;

    pub fn connect(
        manager: &dyn ResourceManager,
        address: &ResourceAddress,
        timeout: Duration,
    ) -> Result<Self> {
        let profile = GeneratorProfile::default();
        let session = Session::open(manager, &address.resource_string(), timeout, &profile.family)?;
        log::info!("Connected to function generator at {address}");
        Ok(Self { session, profile })
    }

    pub fn from_session(session: Session, profile: GeneratorProfile) -> Self {
        Self { session, profile }
    }

    pub fn profile(&self) -> &GeneratorProfile {
        &self.profile
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    pub fn identify(&mut self) -> Result<String> {
        self.session.send_query("*IDN?")
    }

    pub fn reset(&mut self) -> Result<()> {
        self.session.send("*RST")
    }

    fn query_token<T: FromStr>(&mut self, command: &str) -> Result<T> {
        let response = self.session.send_query(command)?;
        response
            .parse()
            .map_err(|_| InstrumentError::unexpected(command, &response))
    }

    pub fn set_waveform_shape(&mut self, channel: u8, shape: WaveformShape) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        self.session
            .send(&format!("SOURce{channel}:FUNCtion:SHAPe {}", shape.as_scpi()))
    }

    pub fn waveform_shape(&mut self, channel: u8) -> Result<WaveformShape> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_token(&format!("SOURce{channel}:FUNCtion:SHAPe?"))
    }

    pub fn set_frequency(&mut self, channel: u8, hertz: f64) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        let hertz = require_positive("frequency", hertz)?;
        self.session
            .send(&format!("SOURce{channel}:FREQuency {hertz}"))
    }

    pub fn frequency(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.session
            .query_parse(&format!("SOURce{channel}:FREQuency?"))
    }

    /// Peak-to-peak amplitude in volts.
    pub fn set_amplitude(&mut self, channel: u8, volts: f64) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        if !volts.is_finite() || volts < 0.0 {
            return Err(ValidationError::Negative {
                what: "amplitude",
                value: volts,
            }
            .into());
        }
        self.session.send(&format!(
            "SOURce{channel}:VOLTage:LEVel:IMMediate:AMPLitude {volts}"
        ))
    }

    pub fn amplitude(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.session
            .query_parse(&format!("SOURce{channel}:VOLTage:LEVel:IMMediate:AMPLitude?"))
    }

    pub fn set_offset(&mut self, channel: u8, volts: f64) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        if !volts.is_finite() {
            return Err(ValidationError::OutOfRange {
                what: "offset",
                value: volts,
                min: f64::MIN,
                max: f64::MAX,
            }
            .into());
        }
        self.session.send(&format!(
            "SOURce{channel}:VOLTage:LEVel:IMMediate:OFFSet {volts}"
        ))
    }

    pub fn offset(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.session
            .query_parse(&format!("SOURce{channel}:VOLTage:LEVel:IMMediate:OFFSet?"))
    }

    pub fn set_load(&mut self, channel: u8, load: OutputLoad) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        if let OutputLoad::Ohms(ohms) = load {
            require_positive("load impedance", ohms)?;
        }
        self.session
            .send(&format!("OUTPut{channel}:LOAD {}", load.as_scpi()))
    }

    pub fn load(&mut self, channel: u8) -> Result<OutputLoad> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_token(&format!("OUTPut{channel}:LOAD?"))
    }

    pub fn set_output(&mut self, channel: u8, state: impl Into<Switch>) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        let state = state.into();
        self.session
            .send(&format!("OUTPut{channel}:STATe {}", state.as_scpi()))
    }

    pub fn output(&mut self, channel: u8) -> Result<bool> {
        let channel = self.profile.validate_channel(channel)?;
        let state: Switch = self.query_token(&format!("OUTPut{channel}:STATe?"))?;
        Ok(state.is_on())
    }

    /// Keep both channels at the same frequency.
    pub fn set_frequency_lock(&mut self, state: impl Into<Switch>) -> Result<()> {
        let state = state.into();
        self.session
            .send(&format!("SOURce:FREQuency:CONCurrent {}", state.as_scpi()))
    }

    pub fn frequency_lock(&mut self) -> Result<bool> {
        let state: Switch = self.query_token("SOURce:FREQuency:CONCurrent?")?;
        Ok(state.is_on())
    }

    pub fn set_phase(&mut self, channel: u8, degrees: f64) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        let max = Self::MAX_PHASE_DEGREES;
        if !degrees.is_finite() || !(-max..=max).contains(&degrees) {
            return Err(ValidationError::OutOfRange {
                what: "phase",
                value: degrees,
                min: -max,
                max,
            }
            .into());
        }
        self.session
            .send(&format!("SOURce{channel}:PHASe:ADJust {degrees}DEG"))
    }

    /// Phase in degrees. The instrument reports radians.
    pub fn phase(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        let radians: f64 = self
            .session
            .query_parse(&format!("SOURce{channel}:PHASe:ADJust?"))?;
        Ok(radians.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DEFAULT_TIMEOUT;
    use crate::sim::SimulatedBus;

    fn connect(bus: &SimulatedBus) -> FunctionGenerator {
        let address = ResourceAddress::Resource(SimulatedBus::GENERATOR_RESOURCE.to_string());
        FunctionGenerator::connect(bus, &address, DEFAULT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_shape_parsing() {
        assert_eq!("SIN".parse::<WaveformShape>().unwrap(), WaveformShape::Sinusoid);
        assert_eq!("sine".parse::<WaveformShape>().unwrap(), WaveformShape::Sinusoid);
        assert_eq!("PRN".parse::<WaveformShape>().unwrap(), WaveformShape::PrNoise);
        assert_eq!("sinc".parse::<WaveformShape>().unwrap(), WaveformShape::Sinc);
        assert_eq!("EXPD".parse::<WaveformShape>().unwrap(), WaveformShape::ExpDecay);
        assert!("TRIANGLE".parse::<WaveformShape>().is_err());
    }

    #[test]
    fn test_load_parsing() {
        assert_eq!("50".parse::<OutputLoad>().unwrap(), OutputLoad::Ohms(50.0));
        assert_eq!("9.9E37".parse::<OutputLoad>().unwrap(), OutputLoad::HighZ);
        assert_eq!("INF".parse::<OutputLoad>().unwrap(), OutputLoad::HighZ);
        assert!("-1".parse::<OutputLoad>().is_err());
    }

    #[test]
    fn test_connect_rejects_scope() {
        let bus = SimulatedBus::new();
        let address = ResourceAddress::Tcpip("192.168.1.100".to_string());
        let result = FunctionGenerator::connect(&bus, &address, DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(InstrumentError::Connection { .. })));
    }

    #[test]
    fn test_channel_settings_round_trip() {
        let bus = SimulatedBus::new();
        let mut generator = connect(&bus);

        generator.set_waveform_shape(2, WaveformShape::Ramp).unwrap();
        assert_eq!(generator.waveform_shape(2).unwrap(), WaveformShape::Ramp);

        generator.set_frequency(1, 2.5e3).unwrap();
        assert_eq!(generator.frequency(1).unwrap(), 2500.0);

        generator.set_amplitude(1, 0.0).unwrap();
        assert_eq!(generator.amplitude(1).unwrap(), 0.0);

        generator.set_offset(2, -0.25).unwrap();
        assert_eq!(generator.offset(2).unwrap(), -0.25);

        generator.set_load(1, OutputLoad::HighZ).unwrap();
        assert_eq!(generator.load(1).unwrap(), OutputLoad::HighZ);
        generator.set_load(1, OutputLoad::Ohms(50.0)).unwrap();
        assert_eq!(generator.load(1).unwrap(), OutputLoad::Ohms(50.0));

        assert!(!generator.output(1).unwrap());
        generator.set_output(1, true).unwrap();
        assert!(generator.output(1).unwrap());

        generator.set_frequency_lock(Switch::On).unwrap();
        assert!(generator.frequency_lock().unwrap());
    }

    #[test]
    fn test_phase_is_reported_in_degrees() {
        let bus = SimulatedBus::new();
        let mut generator = connect(&bus);
        generator.set_phase(1, 90.0).unwrap();
        assert!(bus.commands().contains(&"SOURce1:PHASe:ADJust 90DEG".to_string()));
        assert!((generator.phase(1).unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_arguments_send_nothing() {
        let bus = SimulatedBus::new();
        let mut generator = connect(&bus);
        bus.clear_commands();

        assert!(generator.set_frequency(3, 1e3).is_err());
        assert!(generator.set_frequency(1, 0.0).is_err());
        assert!(generator.set_frequency(1, -5.0).is_err());
        assert!(generator.set_amplitude(1, -0.1).is_err());
        assert!(generator.set_offset(1, f64::NAN).is_err());
        assert!(generator.set_load(1, OutputLoad::Ohms(0.0)).is_err());
        assert!(matches!(
            generator.set_phase(1, 400.0),
            Err(InstrumentError::Validation(ValidationError::OutOfRange { what: "phase", .. }))
        ));
        assert!(generator.set_output(0, true).is_err());
        assert!(bus.commands().is_empty());
    }
}
