//! Tektronix MSO4-series driver.
//!
//! Every setter validates its arguments against the [`ScopeProfile`] before a
//! single byte is sent, so a rejected call leaves the instrument untouched.
//! Getters always ask the instrument; nothing is cached.

use crate::discovery;
use crate::error::{InstrumentError, Result, ValidationError};
use crate::mnemonic::Switch;
use crate::scope_settings::{
    require_positive, AcquisitionMode, AcquisitionState, Coupling, RunCommand, ScopeProfile,
    ZeroCode,
};
use crate::session::Session;
use crate::transport::{ResourceAddress, ResourceManager};
use crate::trigger_config::{EdgeTrigger, TriggerSlope, TriggerState};
use crate::waveform::{
    decode_binary, parse_ascii_curve, DataEncoding, ScalingParams, Timing, Transfer,
    VoltageScaling, WireFormat,
};
use std::thread;
use std::time::{Duration, Instant};

pub struct Oscilloscope {
    session: Session,
    profile: ScopeProfile,
}

impl Oscilloscope {
    const TRIGGER_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Connect to the scope at `address`. A six-channel profile is picked when
    /// the identity names an MSO46.
    pub fn connect(
        manager: &dyn ResourceManager,
        address: &ResourceAddress,
        timeout: Duration,
    ) -> Result<Self> {
        let session = Session::open(manager, &address.resource_string(), timeout, "MSO4")?;
        let profile = match session.identity() {
            Some(identity) if identity.contains("MSO46") => ScopeProfile::mso46b(),
            _ => ScopeProfile::mso44b(),
        };
        log::info!(
            "Connected to {} ({} channels)",
            address,
            profile.channels
        );
        Ok(Self { session, profile })
    }

    pub fn connect_with_profile(
        manager: &dyn ResourceManager,
        address: &ResourceAddress,
        timeout: Duration,
        profile: ScopeProfile,
    ) -> Result<Self> {
        let session = Session::open(manager, &address.resource_string(), timeout, &profile.family)?;
        Ok(Self { session, profile })
    }

    /// Connect to the first MSO4-series scope `manager` can find.
    pub fn discover(manager: &dyn ResourceManager, timeout: Duration) -> Result<Self> {
        let found = discovery::discover_one(manager, "MSO4", timeout)
            .map_err(InstrumentError::Communication)?;
        match found {
            Some(descriptor) => Self::connect(
                manager,
                &ResourceAddress::Resource(descriptor.resource),
                timeout,
            ),
            None => Err(InstrumentError::Connection {
                resource: "*".to_string(),
                reason: "no MSO4-series oscilloscope found".to_string(),
            }),
        }
    }

    pub fn from_session(session: Session, profile: ScopeProfile) -> Self {
        Self { session, profile }
    }

    pub fn profile(&self) -> &ScopeProfile {
        &self.profile
    }

    /// Raw access for commands this driver does not wrap.
    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    pub fn identify(&mut self) -> Result<String> {
        self.session.send_query("*IDN?")
    }

    /// Restore factory defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.session.send("*RST")
    }

    pub fn clear_status(&mut self) -> Result<()> {
        self.session.send("*CLS")
    }

    /// Blocks until pending operations finish, then reports whether they did.
    pub fn is_complete(&mut self) -> Result<bool> {
        let response = self.session.send_query("*OPC?")?;
        Ok(response == "1")
    }

    fn query_f64(&mut self, command: &str) -> Result<f64> {
        self.session.query_parse(command)
    }

    fn query_token<T>(&mut self, command: &str) -> Result<T>
    where
        T: std::str::FromStr,
    {
        let response = self.session.send_query(command)?;
        response
            .parse()
            .map_err(|_| InstrumentError::unexpected(command, &response))
    }

    // Vertical

    pub fn set_channel_scale(&mut self, channel: u8, volts_per_division: f64) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        let scale = require_positive("vertical scale", volts_per_division)?;
        self.session.send(&format!("CH{channel}:SCAle {scale}"))
    }

    pub fn channel_scale(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_f64(&format!("CH{channel}:SCAle?"))
    }

    pub fn set_coupling(&mut self, channel: u8, coupling: Coupling) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        self.session
            .send(&format!("CH{channel}:COUPling {}", coupling.as_scpi()))
    }

    pub fn coupling(&mut self, channel: u8) -> Result<Coupling> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_token(&format!("CH{channel}:COUPling?"))
    }

    pub fn set_channel_enabled(&mut self, channel: u8, state: impl Into<Switch>) -> Result<()> {
        let channel = self.profile.validate_channel(channel)?;
        let state = state.into();
        self.session
            .send(&format!("CH{channel}:STATE {}", state.as_scpi()))
    }

    pub fn channel_enabled(&mut self, channel: u8) -> Result<bool> {
        let channel = self.profile.validate_channel(channel)?;
        let state: Switch = self.query_token(&format!("CH{channel}:STATE?"))?;
        Ok(state.is_on())
    }

    /// Channels currently displayed, in ascending order.
    pub fn active_channels(&mut self) -> Result<Vec<u8>> {
        let mut active = Vec::new();
        for channel in 1..=self.profile.channels {
            if self.channel_enabled(channel)? {
                active.push(channel);
            }
        }
        Ok(active)
    }

    pub fn channel_position(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_f64(&format!("CH{channel}:POSition?"))
    }

    pub fn channel_offset(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_f64(&format!("CH{channel}:OFFSet?"))
    }

    pub fn channel_bandwidth(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_f64(&format!("CH{channel}:BANdwidth?"))
    }

    pub fn channel_termination(&mut self, channel: u8) -> Result<f64> {
        let channel = self.profile.validate_channel(channel)?;
        self.query_f64(&format!("CH{channel}:TERmination?"))
    }

    // Horizontal and acquisition

    pub fn set_time_scale(&mut self, seconds_per_division: f64) -> Result<()> {
        let scale = require_positive("horizontal scale", seconds_per_division)?;
        self.session.send(&format!("HORizontal:SCAle {scale}"))
    }

    pub fn time_scale(&mut self) -> Result<f64> {
        self.query_f64("HORizontal:SCAle?")
    }

    pub fn set_record_length(&mut self, samples: usize) -> Result<()> {
        let samples = self.profile.validate_record_length(samples)?;
        self.session.send(&format!("HORizontal:RECOrdlength {samples}"))
    }

    pub fn record_length(&mut self) -> Result<usize> {
        self.session.query_parse("HORizontal:RECOrdlength?")
    }

    pub fn set_sample_rate(&mut self, samples_per_second: f64) -> Result<()> {
        let rate = require_positive("sample rate", samples_per_second)?;
        self.session.send(&format!("HORizontal:SAMPLERate {rate}"))
    }

    pub fn sample_rate(&mut self) -> Result<f64> {
        self.query_f64("HORizontal:SAMPLERate?")
    }

    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<()> {
        self.session.send(&format!("ACQuire:MODe {}", mode.as_scpi()))
    }

    pub fn acquisition_mode(&mut self) -> Result<AcquisitionMode> {
        self.query_token("ACQuire:MODe?")
    }

    pub fn set_acquisition_state(&mut self, command: RunCommand) -> Result<()> {
        match command {
            RunCommand::Run => {
                self.session.send("ACQuire:STOPAfter RUNSTop")?;
                self.session.send("ACQuire:STATE RUN")
            }
            RunCommand::Stop => self.session.send("ACQuire:STATE STOP"),
            RunCommand::Single => {
                self.session.send("ACQuire:STOPAfter SEQuence")?;
                self.session.send("ACQuire:STATE RUN")
            }
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.set_acquisition_state(RunCommand::Run)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_acquisition_state(RunCommand::Stop)
    }

    /// Arm one triggered acquisition.
    pub fn single(&mut self) -> Result<()> {
        self.set_acquisition_state(RunCommand::Single)
    }

    pub fn acquisition_state(&mut self) -> Result<AcquisitionState> {
        self.query_token("ACQuire:STATE?")
    }

    // Trigger

    /// Configure an edge trigger. The level must lie on screen, within five
    /// divisions of the source channel's offset.
    pub fn set_trigger(&mut self, trigger: &EdgeTrigger) -> Result<()> {
        let source = self.profile.validate_channel(trigger.source)?;
        let scale = self.channel_scale(source)?;
        let offset = self.channel_offset(source)?;
        let half_range = ScopeProfile::HALF_SCREEN_DIVISIONS * scale;
        let (min, max) = (offset - half_range, offset + half_range);
        if !trigger.level.is_finite() || trigger.level < min || trigger.level > max {
            return Err(ValidationError::OutOfRange {
                what: "trigger level",
                value: trigger.level,
                min,
                max,
            }
            .into());
        }

        self.session
            .send(&format!("TRIGger:A:EDGE:SOUrce CH{source}"))?;
        self.session
            .send(&format!("TRIGger:A:LEVel:CH{source} {}", trigger.level))?;
        self.session
            .send(&format!("TRIGger:A:EDGE:SLOpe {}", trigger.slope.as_scpi()))
    }

    pub fn trigger(&mut self) -> Result<EdgeTrigger> {
        let command = "TRIGger:A:EDGE:SOUrce?";
        let response = self.session.send_query(command)?;
        let source: u8 = response
            .trim()
            .to_ascii_uppercase()
            .strip_prefix("CH")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| InstrumentError::unexpected(command, &response))?;
        let level = self.query_f64(&format!("TRIGger:A:LEVel:CH{source}?"))?;
        let slope: TriggerSlope = self.query_token("TRIGger:A:EDGE:SLOpe?")?;
        Ok(EdgeTrigger::new(source, level, slope))
    }

    pub fn trigger_state(&mut self) -> Result<TriggerState> {
        self.query_token("TRIGger:STATE?")
    }

    /// Poll `TRIGger:STATE?` until a trigger has fired or `timeout` elapses.
    pub fn wait_for_trigger(&mut self, timeout: Duration) -> Result<TriggerState> {
        let started = Instant::now();
        loop {
            let state = self.trigger_state()?;
            if state.has_fired() {
                log::debug!("Triggered after {:?}", started.elapsed());
                return Ok(state);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                log::warn!("No trigger within {timeout:?}, last state {state:?}");
                return Err(InstrumentError::Timeout {
                    command: "TRIGger:STATE?".to_string(),
                    timeout_ms: timeout.as_millis(),
                });
            }
            thread::sleep(Self::TRIGGER_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    // Transfer

    /// Transfer the current record of `channel` together with the scaling that
    /// applies to it.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn read_channel(&mut self, channel: u8, format: WireFormat) -> Result<Transfer> {
        let channel = self.profile.validate_channel(channel)?;
        let binary = self.profile.encoding;
        binary.validate()?;

        let requested = DataEncoding::for_request(format, &binary);
        self.session.send(&format!("DATa:SOUrce CH{channel}"))?;
        self.session
            .send(&format!("DATa:ENCdg {}", requested.as_scpi()))?;
        if format == WireFormat::Binary {
            self.session
                .send(&format!("WFMOutpre:BYT_Nr {}", binary.byte_width))?;
        }

        let command = "DATa:ENCdg?";
        let response = self.session.send_query(command)?;
        let used = DataEncoding::from_response(&response)
            .ok_or_else(|| InstrumentError::unexpected(command, &response))?;
        if used != requested {
            log::warn!(
                "CH{channel}: requested {} but the instrument uses {}",
                requested.as_scpi(),
                used.as_scpi()
            );
        }

        let raw = match used {
            DataEncoding::Ascii => {
                let text = self.session.send_query("CURVe?")?;
                parse_ascii_curve(&text)?
            }
            DataEncoding::RiBinary | DataEncoding::SriBinary => {
                let width: u8 = self.session.query_parse("WFMOutpre:BYT_Nr?")?;
                let max_len = self.profile.max_record_length * usize::from(width);
                let payload = self.session.query_block("CURVe?", max_len)?;
                decode_binary(&payload, width, used.byte_order())?
            }
        };

        let (scaling, points) = self.read_scaling()?;
        if raw.len() != points {
            return Err(InstrumentError::DataIntegrity(format!(
                "CH{channel}: received {} samples but the preamble reports {points}",
                raw.len()
            )));
        }
        log::debug!("CH{channel}: {} samples as {}", raw.len(), used.as_scpi());

        Ok(Transfer {
            channel,
            raw,
            scaling,
            format: used.wire_format(),
        })
    }

    fn read_scaling(&mut self) -> Result<(ScalingParams, usize)> {
        let y_mult = self.query_f64("WFMOutpre:YMUlt?")?;
        let y_zero = self.query_f64("WFMOutpre:YZEro?")?;
        let zero_code = match self.profile.encoding.zero_code {
            ZeroCode::Reported => self.query_f64("WFMOutpre:YOFf?")?,
            ZeroCode::Fixed(code) => f64::from(code),
        };
        let x_incr = self.query_f64("WFMOutpre:XINcr?")?;
        let x_zero = self.query_f64("WFMOutpre:XZEro?")?;
        let points: usize = self.session.query_parse("WFMOutpre:NR_Pt?")?;

        let scaling = ScalingParams {
            voltage: VoltageScaling {
                y_mult,
                y_zero,
                zero_code,
            },
            timing: Timing { x_incr, x_zero },
        };
        Ok((scaling, points))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::DEFAULT_TIMEOUT;
    use crate::sim::SimulatedBus;

    pub(crate) fn connect(bus: &SimulatedBus) -> Oscilloscope {
        let address = ResourceAddress::Resource(SimulatedBus::SCOPE_RESOURCE.to_string());
        Oscilloscope::connect(bus, &address, DEFAULT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_connect_picks_profile() {
        let bus = SimulatedBus::new();
        assert_eq!(connect(&bus).profile().channels, 4);

        bus.add_scope("TCPIP::10.0.0.6::INSTR", "MSO46B", 6);
        let address = ResourceAddress::Tcpip("10.0.0.6".to_string());
        let scope = Oscilloscope::connect(&bus, &address, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(scope.profile().channels, 6);
    }

    #[test]
    fn test_connect_rejects_generator() {
        let bus = SimulatedBus::new();
        let address = ResourceAddress::Resource(SimulatedBus::GENERATOR_RESOURCE.to_string());
        let result = Oscilloscope::connect(&bus, &address, DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(InstrumentError::Connection { .. })));
    }

    #[test]
    fn test_discover() {
        let bus = SimulatedBus::new();
        let scope = Oscilloscope::discover(&bus, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(scope.profile().family, "MSO4");

        let result = Oscilloscope::discover(&SimulatedBus::empty(), DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(InstrumentError::Connection { .. })));
    }

    #[test]
    fn test_channel_scale_round_trip() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        scope.set_channel_scale(2, 0.5).unwrap();
        assert!(bus.commands().contains(&"CH2:SCAle 0.5".to_string()));
        assert_eq!(scope.channel_scale(2).unwrap(), 0.5);
    }

    #[test]
    fn test_invalid_arguments_send_nothing() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.clear_commands();

        assert!(matches!(
            scope.set_channel_scale(5, 0.5),
            Err(InstrumentError::Validation(ValidationError::ChannelOutOfRange { channel: 5, max: 4 }))
        ));
        assert!(scope.set_channel_scale(0, 0.5).is_err());
        assert!(scope.set_channel_scale(1, -0.5).is_err());
        assert!(scope.set_time_scale(0.0).is_err());
        assert!(scope.set_sample_rate(f64::INFINITY).is_err());
        assert!(scope.set_record_length(10).is_err());
        assert!(scope.read_channel(7, WireFormat::Ascii).is_err());
        assert!(scope.channel_enabled(9).is_err());
        assert!(bus.commands().is_empty());
    }

    #[test]
    fn test_coupling_and_enable() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        scope.set_coupling(3, Coupling::Ac).unwrap();
        assert_eq!(scope.coupling(3).unwrap(), Coupling::Ac);

        assert_eq!(scope.active_channels().unwrap(), vec![1]);
        scope.set_channel_enabled(3, true).unwrap();
        scope.set_channel_enabled(1, Switch::Off).unwrap();
        assert!(scope.channel_enabled(3).unwrap());
        assert_eq!(scope.active_channels().unwrap(), vec![3]);
    }

    #[test]
    fn test_horizontal_settings() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        scope.set_record_length(20_000).unwrap();
        assert_eq!(scope.record_length().unwrap(), 20_000);

        scope.set_time_scale(2e-6).unwrap();
        assert_eq!(scope.time_scale().unwrap(), 2e-6);

        scope.set_sample_rate(2.5e9).unwrap();
        let rate = scope.sample_rate().unwrap();
        assert!((rate - 2.5e9).abs() / 2.5e9 < 1e-9);

        scope.set_acquisition_mode(AcquisitionMode::HiRes).unwrap();
        assert_eq!(scope.acquisition_mode().unwrap(), AcquisitionMode::HiRes);
    }

    #[test]
    fn test_run_stop_single() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        scope.single().unwrap();
        assert_eq!(scope.acquisition_state().unwrap(), AcquisitionState::Stopped);
        assert_eq!(scope.wait_for_trigger(DEFAULT_TIMEOUT).unwrap(), TriggerState::Save);

        scope.run().unwrap();
        assert_eq!(scope.acquisition_state().unwrap(), AcquisitionState::Running);
        scope.stop().unwrap();
        assert_eq!(scope.acquisition_state().unwrap(), AcquisitionState::Stopped);
        assert!(scope.is_complete().unwrap());
    }

    #[test]
    fn test_wait_for_trigger_times_out() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.never_trigger(true);
        scope.single().unwrap();
        let started = Instant::now();
        let err = scope.wait_for_trigger(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, InstrumentError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_trigger_round_trip() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let trigger = EdgeTrigger::start_capturing_when(2, 0.2).falling_edge();
        scope.set_trigger(&trigger).unwrap();
        assert_eq!(scope.trigger().unwrap(), trigger);
    }

    #[test]
    fn test_trigger_level_off_screen() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.clear_commands();
        let trigger = EdgeTrigger::start_capturing_when(1, 0.75).rising_edge();
        let err = scope.set_trigger(&trigger).unwrap_err();
        assert!(matches!(
            err,
            InstrumentError::Validation(ValidationError::OutOfRange { what: "trigger level", .. })
        ));
        assert!(bus.commands().iter().all(|c| c.ends_with('?')));
    }

    #[test]
    fn test_read_channel_ascii() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let transfer = scope.read_channel(1, WireFormat::Ascii).unwrap();
        assert_eq!(transfer.format, WireFormat::Ascii);
        assert_eq!(transfer.raw.len(), 10_000);
        // 100 * sin(pi / 4)
        assert_eq!(transfer.raw[0], 71);
        assert!((transfer.scaling.voltage.y_mult - 0.004).abs() < 1e-12);
        assert!((transfer.scaling.timing.x_incr - 1e-9).abs() < 1e-18);
    }

    #[test]
    fn test_read_channel_binary_matches_ascii() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let ascii = scope.read_channel(2, WireFormat::Ascii).unwrap().to_waveform();
        let binary = scope.read_channel(2, WireFormat::Binary).unwrap();
        assert_eq!(binary.format, WireFormat::Binary);
        assert!(bus.commands().contains(&"DATa:ENCdg RIBinary".to_string()));

        let binary = binary.to_waveform();
        let lsb = 0.1 / 25.0;
        for (a, b) in ascii.voltages.iter().zip(&binary.voltages) {
            assert!((a - b).abs() <= lsb);
        }
    }

    #[test]
    fn test_read_channel_follows_reported_encoding() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.force_encoding(Some("ASCII"));
        let transfer = scope.read_channel(1, WireFormat::Binary).unwrap();
        assert_eq!(transfer.format, WireFormat::Ascii);
        assert_eq!(transfer.raw.len(), 10_000);
    }

    #[test]
    fn test_read_channel_faults() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);

        bus.truncate_curve(3);
        assert!(matches!(
            scope.read_channel(1, WireFormat::Binary),
            Err(InstrumentError::DataIntegrity(_))
        ));
        assert!(matches!(
            scope.read_channel(1, WireFormat::Ascii),
            Err(InstrumentError::DataIntegrity(_))
        ));
        bus.truncate_curve(0);

        bus.corrupt_curve(true);
        assert!(matches!(
            scope.read_channel(1, WireFormat::Ascii),
            Err(InstrumentError::DataParse { index: 5000, .. })
        ));
        bus.corrupt_curve(false);

        bus.declare_block_length(Some(999_999_999));
        assert!(matches!(
            scope.read_channel(1, WireFormat::Binary),
            Err(InstrumentError::DataIntegrity(_))
        ));
        bus.declare_block_length(None);
        assert_eq!(scope.read_channel(1, WireFormat::Binary).unwrap().raw.len(), 10_000);

        bus.fail_channel(3);
        assert!(matches!(
            scope.read_channel(3, WireFormat::Ascii),
            Err(InstrumentError::Timeout { .. })
        ));
    }

    #[test]
    fn test_fixed_zero_code_skips_query() {
        let bus = SimulatedBus::new();
        let mut profile = ScopeProfile::mso44b();
        profile.encoding.zero_code = ZeroCode::Fixed(0);
        let address = ResourceAddress::Resource(SimulatedBus::SCOPE_RESOURCE.to_string());
        let mut scope =
            Oscilloscope::connect_with_profile(&bus, &address, DEFAULT_TIMEOUT, profile).unwrap();
        let transfer = scope.read_channel(1, WireFormat::Binary).unwrap();
        assert_eq!(transfer.scaling.voltage.zero_code, 0.0);
        assert!(!bus.commands().iter().any(|c| c.starts_with("WFMOutpre:YOFf")));
    }

    #[test]
    fn test_reported_zero_code_is_applied() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.set_zero_code(10);
        let transfer = scope.read_channel(1, WireFormat::Ascii).unwrap();
        assert_eq!(transfer.scaling.voltage.zero_code, 10.0);
        let waveform = transfer.to_waveform();
        let expected = f64::from(transfer.raw[0] - 10) * transfer.scaling.voltage.y_mult;
        assert!((waveform.voltages[0] - expected).abs() < 1e-12);
    }
}
