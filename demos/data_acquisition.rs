// Data acquisition with an edge trigger
//
// Configures two channels and a rising-edge trigger, arms a single
// acquisition, and prints a summary of each transferred channel.
// Pass --simulate to run against the in-process simulated bus.

use scopectl_rs::sim::SimulatedBus;
use scopectl_rs::{
    AcquisitionMode, CaptureRequest, Coupling, EdgeTrigger, NativeResourceManager, Oscilloscope,
    ResourceAddress, ResourceManager, WireFormat,
};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let simulate = std::env::args().any(|a| a == "--simulate");
    let manager: Box<dyn ResourceManager> = if simulate {
        Box::new(SimulatedBus::new())
    } else {
        Box::new(NativeResourceManager)
    };
    let address = ResourceAddress::Resource(if simulate {
        SimulatedBus::SCOPE_RESOURCE.to_string()
    } else {
        "TCPIP0::192.168.1.100::4000::SOCKET".to_string()
    });

    println!("Data Acquisition Example");
    println!("========================\n");

    let mut scope = Oscilloscope::connect(manager.as_ref(), &address, Duration::from_secs(5))?;
    println!("Connected to {address}\n");

    println!("1. Vertical and horizontal setup");
    for channel in [1, 2] {
        scope.set_channel_enabled(channel, true)?;
        scope.set_channel_scale(channel, 0.5)?;
        scope.set_coupling(channel, Coupling::Dc)?;
    }
    scope.set_time_scale(100e-6)?;
    scope.set_acquisition_mode(AcquisitionMode::HiRes)?;
    println!("   CH1/CH2 at 0.5 V/div, 100 us/div, high resolution");

    println!("\n2. Rising edge trigger at 0.25 V on CH1");
    let trigger = EdgeTrigger::start_capturing_when(1, 0.25).rising_edge();
    scope.set_trigger(&trigger)?;

    println!("\n3. Single acquisition, binary transfer");
    let request = CaptureRequest::new(&[1, 2], 10_000)
        .format(WireFormat::Binary)
        .acquire_within(Duration::from_secs(10));
    let capture = scope.capture(&request)?;
    println!(
        "   Captured {} samples per channel spanning {:.3e} s",
        capture.sample_count,
        capture.time.last().copied().unwrap_or_default() - capture.time.first().copied().unwrap_or_default()
    );

    for trace in &capture.traces {
        print_trace_summary(&trace.label, &trace.voltages);
    }

    println!("\n4. Per-channel statistics");
    println!("{}", capture.statistics()?);

    println!("\nData acquisition example completed!");
    Ok(())
}

// Helper function to print basic statistics about one channel
fn print_trace_summary(label: &str, voltages: &[f64]) {
    if voltages.is_empty() {
        return;
    }
    let min = voltages.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = voltages.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let mean = voltages.iter().sum::<f64>() / voltages.len() as f64;
    println!("   {label}: {min:.3}V to {max:.3}V (mean: {mean:.3}V)");
}
