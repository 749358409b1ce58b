// Basic instrument discovery and connection example
//
// Lists every instrument that answers *IDN?, then connects to the first
// MSO4-series oscilloscope and prints its vertical setup.
// Pass --simulate to run against the in-process simulated bus.

use scopectl_rs::sim::SimulatedBus;
use scopectl_rs::{list_instruments, NativeResourceManager, Oscilloscope, ResourceManager};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    let manager: Box<dyn ResourceManager> = if std::env::args().any(|a| a == "--simulate") {
        Box::new(SimulatedBus::new())
    } else {
        Box::new(NativeResourceManager)
    };

    println!("Instrument Discovery Example");
    println!("============================\n");

    println!("1. Probing available resources...");
    let instruments = list_instruments(manager.as_ref(), "", Duration::from_secs(1))?;
    if instruments.is_empty() {
        println!("No instruments answered. Check the connection and try again.");
        return Ok(());
    }
    for (i, instrument) in instruments.iter().enumerate() {
        println!("  {}. {} at {}", i + 1, instrument.identity, instrument.resource);
    }

    println!("\n2. Connecting to the first oscilloscope...");
    let mut scope = Oscilloscope::discover(manager.as_ref(), Duration::from_secs(5))?;
    println!("Connected: {}", scope.identify()?);

    println!("\n3. Vertical setup:");
    let active = scope.active_channels()?;
    for channel in 1..=scope.profile().channels {
        let scale = scope.channel_scale(channel)?;
        let coupling = scope.coupling(channel)?;
        let state = if active.contains(&channel) { "on" } else { "off" };
        println!("  CH{channel}: {scale} V/div, {coupling}, {state}");
    }

    println!("\n4. Horizontal setup:");
    println!("  {} samples at {:.3e} S/s", scope.record_length()?, scope.sample_rate()?);

    scope.close()?;
    println!("\nConnection test completed successfully!");
    Ok(())
}
