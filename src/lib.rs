//! # scopectl-rs
//!
//! A Rust library for driving Tektronix MSO44B/MSO46B oscilloscopes and
//! AFG31000 function generators over SCPI.
//!
//! The library covers the path from a resource string to calibrated,
//! time-aligned waveforms on disk: opening an exclusive session, validating
//! settings before they are sent, transferring curves in ASCII or binary, and
//! converting digitizing levels to volts with the scaling read in the same call.
//!
//! ## Features
//!
//! - **Transports**: raw TCP sockets and serial ports out of the box, any VISA
//!   resource with the `instrument_visa` feature
//! - **Validated settings**: out-of-range channels, scales and record lengths are
//!   rejected before anything crosses the wire
//! - **All-or-nothing captures**: every requested channel or an error, never a
//!   partial result
//! - **DataFrame output**: uses `polars` for CSV export and per-channel statistics
//! - **Simulation**: [`sim::SimulatedBus`] answers like real instruments, for tests
//!   and dry runs
//!
//! ## Examples
//!
//! ### Capturing two channels
//!
//! ```rust,no_run
//! use scopectl_rs::{CaptureRequest, ExportFormat, NativeResourceManager, Oscilloscope, ResourceAddress, WireFormat};
//! use std::time::Duration;
//!
//! let manager = NativeResourceManager;
//! let address = ResourceAddress::Resource("TCPIP::192.168.1.100::4000::SOCKET".to_string());
//! let mut scope = Oscilloscope::connect(&manager, &address, Duration::from_secs(5))?;
//!
//! let request = CaptureRequest::new(&[1, 2], 10_000)
//!     .format(WireFormat::Binary)
//!     .with_metadata();
//! let capture = scope.capture(&request)?;
//! capture.save("capture", ExportFormat::Csv)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Configuring a trigger
//!
//! ```rust
//! use scopectl_rs::sim::SimulatedBus;
//! use scopectl_rs::{EdgeTrigger, Oscilloscope, ResourceAddress};
//! use std::time::Duration;
//!
//! let bus = SimulatedBus::new();
//! let address = ResourceAddress::Tcpip("192.168.1.100".to_string());
//! let mut scope = Oscilloscope::connect(&bus, &address, Duration::from_secs(1))?;
//!
//! let trigger = EdgeTrigger::start_capturing_when(1, 0.2).rising_edge();
//! scope.set_trigger(&trigger)?;
//! assert_eq!(scope.trigger()?, trigger);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Function generator
//!
//! ```rust
//! use scopectl_rs::sim::SimulatedBus;
//! use scopectl_rs::{FunctionGenerator, ResourceAddress, WaveformShape};
//! use std::time::Duration;
//!
//! let bus = SimulatedBus::new();
//! let address = ResourceAddress::Resource(SimulatedBus::GENERATOR_RESOURCE.to_string());
//! let mut generator = FunctionGenerator::connect(&bus, &address, Duration::from_secs(1))?;
//!
//! generator.set_waveform_shape(1, WaveformShape::Square)?;
//! generator.set_frequency(1, 10e3)?;
//! generator.set_output(1, true)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod calibration;
pub mod capture;
pub mod discovery;
pub mod error;
pub mod function_generator;
pub mod metadata;
pub mod mnemonic;
pub mod oscilloscope;
pub mod scope_settings;
pub mod session;
pub mod sim;
pub mod transport;
pub mod trigger_config;
#[cfg(feature = "instrument_visa")]
pub mod visa_transport;
pub mod waveform;

// Re-export the main types for convenience
pub use capture::{CaptureRequest, CaptureResult, ChannelTrace, ExportFormat};
pub use discovery::{discover_one, list_instruments, InstrumentDescriptor};
pub use error::{InstrumentError, ValidationError};
pub use function_generator::{FunctionGenerator, GeneratorProfile, OutputLoad, WaveformShape};
pub use metadata::MetadataSnapshot;
pub use mnemonic::Switch;
pub use oscilloscope::Oscilloscope;
pub use scope_settings::{AcquisitionMode, BinaryEncoding, Coupling, RunCommand, ScopeProfile};
pub use session::{Session, DEFAULT_TIMEOUT};
pub use transport::{NativeResourceManager, ResourceAddress, ResourceManager, Transport, TransportError};
pub use trigger_config::{EdgeTrigger, TriggerSlope, TriggerState};
#[cfg(feature = "instrument_visa")]
pub use visa_transport::VisaResourceManager;
pub use waveform::WireFormat;
