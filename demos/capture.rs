// Command-line capture tool
//
// Captures one or more channels and saves them as CSV or JSON.
//
//   cargo run --example capture -- --ip 192.168.1.100 --channels 1,2 --samples 10000
//   cargo run --example capture -- --simulate --format ascii --metadata --export json

use clap::Parser;
use scopectl_rs::sim::SimulatedBus;
use scopectl_rs::{
    CaptureRequest, ExportFormat, NativeResourceManager, Oscilloscope, ResourceAddress,
    ResourceManager, WireFormat,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Capture waveforms from an MSO4-series oscilloscope")]
struct Args {
    /// Instrument IP address, addressed as TCPIP::<ip>::INSTR
    #[arg(long, conflicts_with_all = ["resource", "simulate"])]
    ip: Option<String>,

    /// Full resource string, e.g. TCPIP0::192.168.1.100::4000::SOCKET
    #[arg(long, conflicts_with = "simulate")]
    resource: Option<String>,

    /// Use the in-process simulated oscilloscope
    #[arg(long)]
    simulate: bool,

    /// Channels to capture
    #[arg(short, long, value_delimiter = ',', default_value = "1")]
    channels: Vec<u8>,

    /// Samples per channel
    #[arg(short, long, default_value_t = 10_000)]
    samples: usize,

    /// Transfer format: ascii or binary
    #[arg(short, long, default_value = "binary")]
    format: WireFormat,

    /// Include an instrument settings snapshot
    #[arg(long)]
    metadata: bool,

    /// Arm a single acquisition and wait this many seconds for a trigger
    #[arg(long)]
    single: Option<f64>,

    /// Output file without extension
    #[arg(short, long, default_value = "capture")]
    output: PathBuf,

    /// Export format: csv or json
    #[arg(short, long, default_value = "csv")]
    export: ExportFormat,

    /// I/O timeout in seconds
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (manager, address): (Box<dyn ResourceManager>, ResourceAddress) = if args.simulate {
        (
            Box::new(SimulatedBus::new()),
            ResourceAddress::Resource(SimulatedBus::SCOPE_RESOURCE.to_string()),
        )
    } else if let Some(ip) = args.ip {
        (Box::new(NativeResourceManager), ResourceAddress::Tcpip(ip))
    } else if let Some(resource) = args.resource {
        (Box::new(NativeResourceManager), ResourceAddress::Resource(resource))
    } else {
        return Err("one of --ip, --resource or --simulate is required".into());
    };

    let timeout = Duration::try_from_secs_f64(args.timeout)?;
    let mut scope = Oscilloscope::connect(manager.as_ref(), &address, timeout)?;

    let mut request = CaptureRequest::new(&args.channels, args.samples).format(args.format);
    if args.metadata {
        request = request.with_metadata();
    }
    if let Some(seconds) = args.single {
        request = request.acquire_within(Duration::try_from_secs_f64(seconds)?);
    }

    let capture = scope.capture(&request)?;
    if let Some(metadata) = &capture.metadata {
        for warning in &metadata.warnings {
            eprintln!("warning: {warning}");
        }
    }

    let path = capture.save(&args.output, args.export)?;
    println!(
        "Saved {} channel(s) x {} samples to {}",
        capture.traces.len(),
        capture.sample_count,
        path.display()
    );
    scope.close()?;
    Ok(())
}
