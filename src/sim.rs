//! Simulated instruments on an in-process bus.
//!
//! [`SimulatedBus`] is a [`ResourceManager`] whose resources answer the SCPI
//! subset this crate speaks: an MSO4-style oscilloscope producing deterministic
//! sine waves and an AFG31000-style generator that stores whatever it is told.
//! Every command written to any resource is recorded so tests can assert on
//! exactly what crossed the wire. Fault knobs make responses go missing or come
//! back damaged.

use crate::transport::{ResourceManager, Transport, TransportError};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const SAMPLES_PER_PERIOD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstrumentKind {
    Scope,
    Generator,
    /// Opens but never answers.
    Silent,
    /// Listed but cannot be opened.
    Offline,
}

#[derive(Debug)]
struct SimInstrument {
    kind: InstrumentKind,
    identity: String,
    channels: u8,
    settings: HashMap<String, String>,
}

impl SimInstrument {
    fn scope(model: &str, channels: u8) -> Self {
        let mut instrument = Self {
            kind: InstrumentKind::Scope,
            identity: format!("TEKTRONIX,{model},C047272,CF:91.1CT FV:2.4.3.1063"),
            channels,
            settings: HashMap::new(),
        };
        instrument.reset();
        instrument
    }

    fn generator() -> Self {
        let mut instrument = Self {
            kind: InstrumentKind::Generator,
            identity: "TEKTRONIX,AFG31052,C019451,SCPI:99.0 FV:1.5.2".to_string(),
            channels: 2,
            settings: HashMap::new(),
        };
        instrument.reset();
        instrument
    }

    fn blank(kind: InstrumentKind) -> Self {
        Self {
            kind,
            identity: String::new(),
            channels: 0,
            settings: HashMap::new(),
        }
    }

    fn set(&mut self, header: &str, value: &str) {
        self.settings.insert(header.to_string(), value.to_string());
    }

    fn get(&self, header: &str) -> Option<&str> {
        self.settings.get(header).map(String::as_str)
    }

    fn get_f64(&self, header: &str) -> f64 {
        self.get(header).and_then(|v| v.parse().ok()).unwrap_or(0.0)
    }

    fn get_usize(&self, header: &str) -> usize {
        self.get(header).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    fn reset(&mut self) {
        self.settings.clear();
        match self.kind {
            InstrumentKind::Scope => {
                for ch in 1..=self.channels {
                    self.set(&format!("CH{ch}:SCALE"), "0.1");
                    self.set(&format!("CH{ch}:COUPLING"), "DC");
                    self.set(&format!("CH{ch}:STATE"), if ch == 1 { "1" } else { "0" });
                    self.set(&format!("CH{ch}:POSITION"), "0");
                    self.set(&format!("CH{ch}:OFFSET"), "0");
                    self.set(&format!("CH{ch}:BANDWIDTH"), "500000000");
                    self.set(&format!("CH{ch}:TERMINATION"), "1000000");
                    self.set(&format!("TRIGGER:A:LEVEL:CH{ch}"), "0");
                }
                self.set("HORIZONTAL:SCALE", "0.000001");
                self.set("HORIZONTAL:RECORDLENGTH", "10000");
                self.set("ACQUIRE:MODE", "SAMPLE");
                self.set("ACQUIRE:STATE", "1");
                self.set("ACQUIRE:STOPAFTER", "RUNSTOP");
                self.set("TRIGGER:A:EDGE:SOURCE", "CH1");
                self.set("TRIGGER:A:EDGE:SLOPE", "RISE");
                self.set("TRIGGER:STATE", "TRIGGER");
                self.set("DATA:SOURCE", "CH1");
                self.set("DATA:ENCDG", "ASCII");
                self.set("DATA:START", "1");
                self.set("DATA:STOP", "10000");
                self.set("WFMOUTPRE:BYT_NR", "1");
            }
            InstrumentKind::Generator => {
                for ch in 1..=self.channels {
                    self.set(&format!("SOURCE{ch}:FUNCTION:SHAPE"), "SIN");
                    self.set(&format!("SOURCE{ch}:FREQUENCY"), "1000000");
                    self.set(&format!("SOURCE{ch}:VOLTAGE:LEVEL:IMMEDIATE:AMPLITUDE"), "1");
                    self.set(&format!("SOURCE{ch}:VOLTAGE:LEVEL:IMMEDIATE:OFFSET"), "0");
                    self.set(&format!("SOURCE{ch}:PHASE:ADJUST"), "0");
                    self.set(&format!("OUTPUT{ch}:LOAD"), "50");
                    self.set(&format!("OUTPUT{ch}:STATE"), "0");
                }
                self.set("SOURCE:FREQUENCY:CONCURRENT", "0");
            }
            InstrumentKind::Silent | InstrumentKind::Offline => {}
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    silent: bool,
    failed_channels: BTreeSet<u8>,
    truncate_curve: usize,
    corrupt_curve: bool,
    skewed_channels: BTreeMap<u8, f64>,
    forced_encoding: Option<String>,
    never_trigger: bool,
    zero_code: i32,
    declared_block_length: Option<usize>,
}

#[derive(Debug, Default)]
struct BusState {
    instruments: Vec<(String, SimInstrument)>,
    commands: Vec<String>,
    open_sessions: usize,
    faults: Faults,
}

/// First `CH<n>` mentioned in `text`.
fn mentioned_channel(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(position) = text[start..].find("CH") {
        let digits_at = start + position + 2;
        let digits: String = bytes[digits_at..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .map(|b| char::from(*b))
            .collect();
        if let Ok(channel) = digits.parse() {
            return Some(channel);
        }
        start = digits_at;
    }
    None
}

fn sample_code(channel: u8, index: usize, width: usize) -> i32 {
    let amplitude = if width == 1 { 100.0 } else { 25_600.0 };
    let phase = f64::from(channel) * FRAC_PI_4;
    let angle = 2.0 * PI * (index % SAMPLES_PER_PERIOD) as f64 / SAMPLES_PER_PERIOD as f64 + phase;
    (amplitude * angle.sin()).round() as i32
}

fn line(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

impl BusState {
    fn instrument_mut(&mut self, resource: &str) -> Option<&mut SimInstrument> {
        self.instruments
            .iter_mut()
            .find(|(name, _)| name == resource)
            .map(|(_, instrument)| instrument)
    }

    fn handle(&mut self, resource: &str, command: &str) -> Option<Vec<u8>> {
        self.commands.push(command.to_string());
        if self.faults.silent {
            return None;
        }
        let faults = &self.faults;
        let instrument = self
            .instruments
            .iter_mut()
            .find(|(name, _)| name == resource)
            .map(|(_, instrument)| instrument)?;

        let (header, argument) = match command.split_once(' ') {
            Some((header, argument)) => (header.to_ascii_uppercase(), Some(argument.trim())),
            None => (command.trim().to_ascii_uppercase(), None),
        };

        match instrument.kind {
            InstrumentKind::Scope => respond_scope(instrument, faults, &header, argument),
            InstrumentKind::Generator => respond_generic(instrument, &header, argument),
            InstrumentKind::Silent | InstrumentKind::Offline => None,
        }
    }
}

fn respond_common(instrument: &mut SimInstrument, header: &str) -> Option<Option<Vec<u8>>> {
    match header {
        "*IDN?" => Some(Some(line(&instrument.identity))),
        "*OPC?" => Some(Some(line("1"))),
        "*RST" => {
            instrument.reset();
            Some(None)
        }
        "*CLS" => Some(None),
        _ => None,
    }
}

fn respond_generic(
    instrument: &mut SimInstrument,
    header: &str,
    argument: Option<&str>,
) -> Option<Vec<u8>> {
    if let Some(response) = respond_common(instrument, header) {
        return response;
    }
    if let Some(query) = header.strip_suffix('?') {
        return instrument.get(query).map(line);
    }
    let value = argument.unwrap_or_default().to_ascii_uppercase();
    let value = match value.strip_suffix("DEG") {
        Some(degrees) => degrees
            .trim()
            .parse::<f64>()
            .map_or(value.clone(), |d| d.to_radians().to_string()),
        None => value,
    };
    instrument.set(header, &value);
    None
}

fn respond_scope(
    instrument: &mut SimInstrument,
    faults: &Faults,
    header: &str,
    argument: Option<&str>,
) -> Option<Vec<u8>> {
    if let Some(response) = respond_common(instrument, header) {
        return response;
    }
    if let Some(channel) = mentioned_channel(header) {
        if channel == 0 || channel > instrument.channels || faults.failed_channels.contains(&channel) {
            return None;
        }
    }

    let source = instrument
        .get("DATA:SOURCE")
        .and_then(mentioned_channel)
        .unwrap_or(1);
    let width = instrument.get_usize("WFMOUTPRE:BYT_NR").clamp(1, 2);
    let record = instrument.get_usize("HORIZONTAL:RECORDLENGTH");
    let horizontal_scale = instrument.get_f64("HORIZONTAL:SCALE");
    let start = instrument.get_usize("DATA:START").max(1);
    let stop = instrument.get_usize("DATA:STOP").min(record);
    let points = (stop + 1).saturating_sub(start);
    let x_incr = 10.0 * horizontal_scale / record.max(1) as f64;

    match header {
        "CURVE?" => {
            if faults.failed_channels.contains(&source) {
                return None;
            }
            let mut codes: Vec<i32> = (start - 1..start - 1 + points)
                .map(|i| sample_code(source, i, width))
                .collect();
            codes.truncate(codes.len().saturating_sub(faults.truncate_curve));
            let encoding = faults
                .forced_encoding
                .clone()
                .or_else(|| instrument.get("DATA:ENCDG").map(str::to_string))
                .unwrap_or_default();
            let mut block = encode_curve(&codes, width, &encoding, faults.corrupt_curve);
            let is_block = block.first() == Some(&b'#');
            if let Some(declared) = faults.declared_block_length.filter(|_| is_block) {
                let digits = usize::from(block[1] - b'0');
                let length = declared.to_string();
                let mut announced = format!("#{}{}", length.len(), length).into_bytes();
                announced.extend_from_slice(&block[2 + digits..]);
                block = announced;
            }
            Some(block)
        }
        "DATA:ENCDG?" => faults
            .forced_encoding
            .clone()
            .or_else(|| instrument.get("DATA:ENCDG").map(str::to_string))
            .map(|encoding| line(&encoding)),
        "WFMOUTPRE:YMULT?" => {
            let scale = instrument.get_f64(&format!("CH{source}:SCALE"));
            let levels_per_division = if width == 1 { 25.0 } else { 6400.0 };
            Some(line(&(scale / levels_per_division).to_string()))
        }
        "WFMOUTPRE:YZERO?" => Some(line(&instrument.get_f64(&format!("CH{source}:OFFSET")).to_string())),
        "WFMOUTPRE:YOFF?" => Some(line(&faults.zero_code.to_string())),
        "WFMOUTPRE:XINCR?" => Some(line(&x_incr.to_string())),
        "WFMOUTPRE:XZERO?" => {
            let skew = faults.skewed_channels.get(&source).copied().unwrap_or(0.0);
            Some(line(&(-5.0 * horizontal_scale + skew).to_string()))
        }
        "WFMOUTPRE:NR_PT?" => Some(line(&points.to_string())),
        "HORIZONTAL:SAMPLERATE?" => Some(line(&(1.0 / x_incr).to_string())),
        "HORIZONTAL:SAMPLERATE" => {
            let rate: f64 = argument.and_then(|a| a.parse().ok()).unwrap_or(0.0);
            if rate > 0.0 {
                instrument.set("HORIZONTAL:SCALE", &(record as f64 / rate / 10.0).to_string());
            }
            None
        }
        "HORIZONTAL:RECORDLENGTH" => {
            let value = argument.unwrap_or_default();
            instrument.set("HORIZONTAL:RECORDLENGTH", value);
            instrument.set("DATA:STOP", value);
            None
        }
        "ACQUIRE:STATE" => {
            let value = argument.unwrap_or_default().to_ascii_uppercase();
            let run = matches!(value.as_str(), "RUN" | "ON" | "1");
            let single = instrument.get("ACQUIRE:STOPAFTER") == Some("SEQUENCE");
            let (state, trigger) = match (run, single, faults.never_trigger) {
                (true, _, true) => ("1", "READY"),
                (true, true, false) => ("0", "SAVE"),
                (true, false, false) => ("1", "TRIGGER"),
                (false, _, _) => ("0", "SAVE"),
            };
            instrument.set("ACQUIRE:STATE", state);
            instrument.set("TRIGGER:STATE", trigger);
            None
        }
        _ => respond_generic(instrument, header, argument),
    }
}

fn encode_curve(codes: &[i32], width: usize, encoding: &str, corrupt: bool) -> Vec<u8> {
    match encoding {
        "RIBINARY" | "RIB" | "SRIBINARY" | "SRI" => {
            let little_endian = encoding.starts_with("SRI");
            let mut payload = Vec::with_capacity(codes.len() * width);
            for &code in codes {
                if width == 1 {
                    payload.push((code as i8).to_be_bytes()[0]);
                } else if little_endian {
                    payload.extend_from_slice(&(code as i16).to_le_bytes());
                } else {
                    payload.extend_from_slice(&(code as i16).to_be_bytes());
                }
            }
            let length = payload.len().to_string();
            let mut block = format!("#{}{}", length.len(), length).into_bytes();
            block.extend_from_slice(&payload);
            block.push(b'\n');
            block
        }
        _ => {
            let mut tokens: Vec<String> = codes.iter().map(ToString::to_string).collect();
            if corrupt && !tokens.is_empty() {
                let middle = tokens.len() / 2;
                tokens[middle] = "1O".to_string();
            }
            line(&tokens.join(","))
        }
    }
}

/// In-process bus of simulated instruments.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    pub const SCOPE_RESOURCE: &'static str = "TCPIP::192.168.1.100::INSTR";
    pub const GENERATOR_RESOURCE: &'static str = "USB0::0x0699::0x035E::C019451::INSTR";

    /// A bus with one four-channel MSO44B and one AFG31052.
    pub fn new() -> Self {
        let bus = Self::empty();
        bus.add_scope(Self::SCOPE_RESOURCE, "MSO44B", 4);
        bus.add_generator(Self::GENERATOR_RESOURCE);
        bus
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, resource: &str, instrument: SimInstrument) {
        self.lock().instruments.push((resource.to_string(), instrument));
    }

    pub fn add_scope(&self, resource: &str, model: &str, channels: u8) {
        self.add(resource, SimInstrument::scope(model, channels));
    }

    pub fn add_generator(&self, resource: &str) {
        self.add(resource, SimInstrument::generator());
    }

    /// A resource that opens but never answers.
    pub fn add_silent(&self, resource: &str) {
        self.add(resource, SimInstrument::blank(InstrumentKind::Silent));
    }

    /// A resource that is enumerated but refuses to open.
    pub fn add_offline(&self, resource: &str) {
        self.add(resource, SimInstrument::blank(InstrumentKind::Offline));
    }

    /// Every command written so far, across all resources, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Current value of a stored setting, by upper-case header.
    pub fn setting(&self, resource: &str, header: &str) -> Option<String> {
        self.lock()
            .instrument_mut(resource)
            .and_then(|instrument| instrument.get(&header.to_ascii_uppercase()).map(str::to_string))
    }

    /// Stop answering anything.
    pub fn set_silent(&self, silent: bool) {
        self.lock().faults.silent = silent;
    }

    /// Queries touching this scope channel go unanswered.
    pub fn fail_channel(&self, channel: u8) {
        self.lock().faults.failed_channels.insert(channel);
    }

    /// Drop the last `samples` codes from every curve transfer.
    pub fn truncate_curve(&self, samples: usize) {
        self.lock().faults.truncate_curve = samples;
    }

    /// Replace one token of ASCII curves with garbage.
    pub fn corrupt_curve(&self, corrupt: bool) {
        self.lock().faults.corrupt_curve = corrupt;
    }

    /// Shift the reported time origin of one channel.
    pub fn skew_channel(&self, channel: u8, seconds: f64) {
        self.lock().faults.skewed_channels.insert(channel, seconds);
    }

    /// Ignore requested encodings and always answer with `encoding`.
    pub fn force_encoding(&self, encoding: Option<&str>) {
        self.lock().faults.forced_encoding = encoding.map(str::to_ascii_uppercase);
    }

    pub fn never_trigger(&self, never: bool) {
        self.lock().faults.never_trigger = never;
    }

    /// Binary curve headers announce `length` bytes whatever the payload size.
    pub fn declare_block_length(&self, length: Option<usize>) {
        self.lock().faults.declared_block_length = length;
    }

    /// Digitizing level reported by `WFMOutpre:YOFf?`.
    pub fn set_zero_code(&self, code: i32) {
        self.lock().faults.zero_code = code;
    }
}

impl ResourceManager for SimulatedBus {
    fn list_resources(&self) -> Result<Vec<String>, TransportError> {
        Ok(self
            .lock()
            .instruments
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.lock();
        let kind = state.instrument_mut(resource).map(|instrument| instrument.kind);
        match kind {
            None => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no simulated instrument at {resource}"),
            ))),
            Some(InstrumentKind::Offline) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{resource} refused the connection"),
            ))),
            Some(_) => {
                state.open_sessions += 1;
                Ok(Box::new(SimulatedTransport {
                    bus: self.clone(),
                    resource: resource.to_string(),
                    output: VecDeque::new(),
                    timeout,
                    open: true,
                }))
            }
        }
    }
}

struct SimulatedTransport {
    bus: SimulatedBus,
    resource: String,
    output: VecDeque<u8>,
    timeout: Duration,
    open: bool,
}

impl Transport for SimulatedTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(data);
        let mut state = self.bus.lock();
        for command in text.split('\n').map(str::trim).filter(|c| !c.is_empty()) {
            if let Some(response) = state.handle(&self.resource, command) {
                self.output.extend(response);
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if self.output.len() < buf.len() {
            self.output.clear();
            return Err(TransportError::Timeout(self.timeout));
        }
        let wanted = buf.len();
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..wanted)) {
            *slot = byte;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if std::mem::take(&mut self.open) {
            let mut state = self.bus.lock();
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        Ok(())
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
