use crate::transport::TransportError;

/// Input rejected before anything was sent to the instrument.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Channel {channel} is out of range (this instrument has channels 1 to {max})")]
    ChannelOutOfRange { channel: u8, max: u8 },

    #[error("Channel {0} was requested more than once")]
    DuplicateChannel(u8),

    #[error("At least one channel must be requested")]
    NoChannels,

    #[error("{what} must be greater than zero, got {value}")]
    NotPositive { what: &'static str, value: f64 },

    #[error("{what} must not be negative, got {value}")]
    Negative { what: &'static str, value: f64 },

    #[error("{what} must be between {min} and {max}, got {value}")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Record length {value} outside the supported range {min}..={max}")]
    RecordLength { value: usize, min: usize, max: usize },

    #[error("Unrecognized {kind} '{value}'")]
    UnrecognizedToken { kind: &'static str, value: String },

    #[error("Unsupported byte width {0} (expected 1 or 2)")]
    ByteWidth(u8),
}

/// Errors raised while talking to an instrument.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Could not connect to {resource}: {reason}")]
    Connection { resource: String, reason: String },

    #[error("No response to '{command}' within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u128 },

    #[error("Communication failure: {0}")]
    Communication(TransportError),

    #[error("Session to {0} is closed")]
    SessionClosed(String),

    #[error("Malformed waveform data: token {index} ('{token}') is not an integer")]
    DataParse { index: usize, token: String },

    #[error("Waveform data integrity check failed: {0}")]
    DataIntegrity(String),

    #[error("'{command}' returned an unexpected response '{response}'")]
    UnexpectedResponse { command: String, response: String },

    #[error(
        "Channel {label} timing (dt={x_incr}, t0={x_zero}) differs from the first channel \
         (dt={expected_incr}, t0={expected_zero})"
    )]
    TimebaseMismatch {
        label: String,
        x_incr: f64,
        x_zero: f64,
        expected_incr: f64,
        expected_zero: f64,
    },

    #[error("Export failed: {0}")]
    Export(#[from] polars::prelude::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstrumentError {
    pub(crate) fn unexpected(command: &str, response: &str) -> Self {
        Self::UnexpectedResponse {
            command: command.to_string(),
            response: response.to_string(),
        }
    }

    /// Whether the caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T, E = InstrumentError> = std::result::Result<T, E>;
