//! Multi-channel captures and their export.
//!
//! A capture either returns every requested channel, each with exactly the
//! requested number of samples on one shared time axis, or it fails. Partial
//! results are never handed out.

use crate::calibration::generate_time_axis;
use crate::error::{InstrumentError, Result, ValidationError};
use crate::metadata::MetadataSnapshot;
use crate::oscilloscope::Oscilloscope;
use crate::scope_settings::ScopeProfile;
use crate::waveform::{ScalingParams, Timing, WireFormat};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const TIME_COLUMN_NAME: &str = "Time";

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub channels: Vec<u8>,
    pub sample_count: usize,
    pub format: WireFormat,
    pub include_metadata: bool,
    /// Arm a single acquisition and wait this long for it before reading.
    /// `None` reads whatever record the instrument currently holds.
    pub acquire_within: Option<Duration>,
}

impl CaptureRequest {
    /// Binary transfer, no metadata, current record.
    pub fn new(channels: &[u8], sample_count: usize) -> Self {
        Self {
            channels: channels.to_vec(),
            sample_count,
            format: WireFormat::Binary,
            include_metadata: false,
            acquire_within: None,
        }
    }

    pub fn format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.include_metadata = true;
        self
    }

    pub fn acquire_within(mut self, timeout: Duration) -> Self {
        self.acquire_within = Some(timeout);
        self
    }

    pub fn validate(&self, profile: &ScopeProfile) -> Result<(), ValidationError> {
        if self.channels.is_empty() {
            return Err(ValidationError::NoChannels);
        }
        for (i, &channel) in self.channels.iter().enumerate() {
            profile.validate_channel(channel)?;
            if self.channels[..i].contains(&channel) {
                return Err(ValidationError::DuplicateChannel(channel));
            }
        }
        profile.validate_record_length(self.sample_count)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrace {
    pub channel: u8,
    pub label: String,
    pub voltages: Vec<f64>,
    pub format: WireFormat,
    pub scaling: ScalingParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub time: Vec<f64>,
    /// In request order.
    pub traces: Vec<ChannelTrace>,
    pub sample_count: usize,
    pub metadata: Option<MetadataSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ValidationError::UnrecognizedToken {
                kind: "export format",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WaveformSection<'a> {
    pub sample_count: usize,
    pub time: &'a [f64],
    #[serde(flatten)]
    pub channels: BTreeMap<&'a str, &'a [f64]>,
}

/// JSON layout of a capture: metadata, scaling, and the waveforms themselves.
#[derive(Debug, Serialize)]
pub struct CaptureDocument<'a> {
    pub metadata: Option<&'a MetadataSnapshot>,
    pub scaling: BTreeMap<&'a str, &'a ScalingParams>,
    pub waveforms: WaveformSection<'a>,
}

impl CaptureResult {
    pub fn trace(&self, label: &str) -> Option<&ChannelTrace> {
        self.traces.iter().find(|trace| trace.label == label)
    }

    pub fn voltages(&self, label: &str) -> Option<&[f64]> {
        self.trace(label).map(|trace| trace.voltages.as_slice())
    }

    /// `Time` followed by one column per channel.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.traces.len() + 1);
        columns.push(Series::new(TIME_COLUMN_NAME.into(), self.time.as_slice()).into());
        for trace in &self.traces {
            columns.push(Series::new(trace.label.as_str().into(), trace.voltages.as_slice()).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    /// One row with the minimum, maximum, mean and standard deviation of
    /// every channel, as `<label>_min`, `<label>_max`, ...
    pub fn statistics(&self) -> Result<DataFrame> {
        let exprs: Vec<Expr> = self
            .traces
            .iter()
            .flat_map(|trace| {
                let label = trace.label.as_str();
                [
                    col(label).min().alias(format!("{label}_min")),
                    col(label).max().alias(format!("{label}_max")),
                    col(label).mean().alias(format!("{label}_mean")),
                    col(label).std(1).alias(format!("{label}_std")),
                ]
            })
            .collect();
        Ok(self.to_dataframe()?.lazy().select(exprs).collect()?)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(())
    }

    pub fn to_document(&self) -> CaptureDocument<'_> {
        CaptureDocument {
            metadata: self.metadata.as_ref(),
            scaling: self
                .traces
                .iter()
                .map(|trace| (trace.label.as_str(), &trace.scaling))
                .collect(),
            waveforms: WaveformSection {
                sample_count: self.sample_count,
                time: &self.time,
                channels: self
                    .traces
                    .iter()
                    .map(|trace| (trace.label.as_str(), trace.voltages.as_slice()))
                    .collect(),
            },
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, &self.to_document())?;
        Ok(())
    }

    /// Write to `<base_name>.<extension>` and return that path.
    pub fn save(&self, base_name: impl AsRef<Path>, format: ExportFormat) -> Result<PathBuf> {
        let mut path = base_name.as_ref().as_os_str().to_owned();
        path.push(".");
        path.push(format.extension());
        let path = PathBuf::from(path);
        match format {
            ExportFormat::Csv => self.write_csv(&path)?,
            ExportFormat::Json => self.write_json(&path)?,
        }
        log::info!("Saved {} samples to {}", self.sample_count, path.display());
        Ok(path)
    }
}

impl Oscilloscope {
    /// Capture `request.channels` with `request.sample_count` samples each.
    #[tracing::instrument(skip(self, request), fields(channels = ?request.channels, samples = request.sample_count))]
    pub fn capture(&mut self, request: &CaptureRequest) -> Result<CaptureResult> {
        request.validate(self.profile())?;
        let samples = request.sample_count;

        let current = self.record_length()?;
        if current != samples {
            log::info!("Changing record length from {current} to {samples}");
            self.set_record_length(samples)?;
        }
        self.session().send("DATa:STARt 1")?;
        self.session().send(&format!("DATa:STOP {samples}"))?;

        if let Some(timeout) = request.acquire_within {
            self.single()?;
            self.wait_for_trigger(timeout)?;
        }

        let mut traces = Vec::with_capacity(request.channels.len());
        let mut timebase: Option<Timing> = None;
        for &channel in &request.channels {
            let transfer = self.read_channel(channel, request.format)?;
            let label = format!("CH{channel}");
            if transfer.raw.len() != samples {
                return Err(InstrumentError::DataIntegrity(format!(
                    "{label}: expected {samples} samples, received {}",
                    transfer.raw.len()
                )));
            }

            let timing = transfer.scaling.timing;
            match timebase {
                None => timebase = Some(timing),
                Some(first) if first != timing => {
                    return Err(InstrumentError::TimebaseMismatch {
                        label,
                        x_incr: timing.x_incr,
                        x_zero: timing.x_zero,
                        expected_incr: first.x_incr,
                        expected_zero: first.x_zero,
                    })
                }
                Some(_) => {}
            }

            let waveform = transfer.to_waveform();
            traces.push(ChannelTrace {
                channel,
                label,
                voltages: waveform.voltages,
                format: waveform.format,
                scaling: transfer.scaling,
            });
        }

        let timebase = timebase.ok_or(ValidationError::NoChannels)?;
        let metadata = request
            .include_metadata
            .then(|| self.collect_metadata(&request.channels, true));

        Ok(CaptureResult {
            time: generate_time_axis(samples, &timebase),
            traces,
            sample_count: samples,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oscilloscope::tests::connect;
    use crate::sim::SimulatedBus;

    #[test]
    fn test_request_validation() {
        let profile = ScopeProfile::mso44b();
        assert!(CaptureRequest::new(&[1, 2], 1000).validate(&profile).is_ok());
        assert_eq!(
            CaptureRequest::new(&[], 1000).validate(&profile),
            Err(ValidationError::NoChannels)
        );
        assert_eq!(
            CaptureRequest::new(&[1, 2, 1], 1000).validate(&profile),
            Err(ValidationError::DuplicateChannel(1))
        );
        assert!(CaptureRequest::new(&[5], 1000).validate(&profile).is_err());
        assert!(CaptureRequest::new(&[1], 10).validate(&profile).is_err());
    }

    #[test]
    fn test_invalid_request_sends_nothing() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.clear_commands();
        assert!(scope.capture(&CaptureRequest::new(&[1, 6], 1000)).is_err());
        assert!(bus.commands().is_empty());
    }

    #[test]
    fn test_capture_two_channels() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let result = scope
            .capture(&CaptureRequest::new(&[1, 2], 1000).format(WireFormat::Ascii))
            .unwrap();

        assert_eq!(result.sample_count, 1000);
        assert_eq!(result.time.len(), 1000);
        assert_eq!(result.traces.len(), 2);
        assert_eq!(result.traces[0].label, "CH1");
        assert_eq!(result.traces[1].label, "CH2");
        assert!(result.traces.iter().all(|t| t.voltages.len() == 1000));
        assert!(result.metadata.is_none());
        assert_eq!(bus.setting(SimulatedBus::SCOPE_RESOURCE, "HORIZONTAL:RECORDLENGTH").unwrap(), "1000");

        // -5 divisions of 1 us, 10 ns apart
        assert!((result.time[0] + 5e-6).abs() < 1e-15);
        assert!((result.time[1] - result.time[0] - 1e-8).abs() < 1e-15);
    }

    #[test]
    fn test_capture_keeps_record_length_when_unchanged() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.clear_commands();
        scope.capture(&CaptureRequest::new(&[1], 10_000)).unwrap();
        assert!(!bus.commands().iter().any(|c| c.starts_with("HORizontal:RECOrdlength ")));
    }

    #[test]
    fn test_capture_with_acquisition_and_metadata() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let request = CaptureRequest::new(&[3], 2000)
            .with_metadata()
            .acquire_within(Duration::from_secs(1));
        let result = scope.capture(&request).unwrap();
        let metadata = result.metadata.unwrap();
        assert!(metadata.channels.contains_key("CH3"));
        assert_eq!(metadata.acquisition.unwrap().record_length, 2000);
        assert!(bus.commands().contains(&"ACQuire:STOPAfter SEQuence".to_string()));
    }

    #[test]
    fn test_capture_without_trigger_fails() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.never_trigger(true);
        let request = CaptureRequest::new(&[1], 1000).acquire_within(Duration::from_millis(20));
        assert!(matches!(scope.capture(&request), Err(InstrumentError::Timeout { .. })));
    }

    #[test]
    fn test_one_failed_channel_fails_the_capture() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.fail_channel(2);
        let result = scope.capture(&CaptureRequest::new(&[1, 2, 3], 1000));
        assert!(matches!(result, Err(InstrumentError::Timeout { .. })));
    }

    #[test]
    fn test_timebase_mismatch() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        bus.skew_channel(2, 1e-6);
        match scope.capture(&CaptureRequest::new(&[1, 2], 1000)) {
            Err(InstrumentError::TimebaseMismatch { label, .. }) => assert_eq!(label, "CH2"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_dataframe_and_statistics() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let result = scope.capture(&CaptureRequest::new(&[1, 4], 1000)).unwrap();

        let df = result.to_dataframe().unwrap();
        assert_eq!(df.shape(), (1000, 3));
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["Time", "CH1", "CH4"]);

        let stats = result.statistics().unwrap();
        assert_eq!(stats.height(), 1);
        let max = stats.column("CH1_max").unwrap().f64().unwrap().get(0).unwrap();
        // 25600 levels at 0.1 V / 6400 levels
        assert!((max - 0.4).abs() < 1e-3);
        assert!(stats.column("CH4_std").is_ok());
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_save_appends_extension() {
        let bus = SimulatedBus::new();
        let mut scope = connect(&bus);
        let result = scope.capture(&CaptureRequest::new(&[1], 1000)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.v2");
        let csv = result.save(&base, ExportFormat::Csv).unwrap();
        assert_eq!(csv, dir.path().join("run.v2.csv"));
        let text = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(text.lines().next().unwrap(), "Time,CH1");
        assert_eq!(text.lines().count(), 1001);

        let json = result.save(&base, ExportFormat::Json).unwrap();
        let document: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(document["waveforms"]["CH1"].as_array().unwrap().len(), 1000);
        assert_eq!(document["waveforms"]["time"].as_array().unwrap().len(), 1000);
        assert!(document["metadata"].is_null());
    }
}
