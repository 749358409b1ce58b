// Function generator example
//
// Sets up two phase-locked sine outputs on an AFG31000.
// Pass --simulate to run against the in-process simulated bus.

use scopectl_rs::sim::SimulatedBus;
use scopectl_rs::{
    FunctionGenerator, NativeResourceManager, OutputLoad, ResourceAddress, ResourceManager,
    WaveformShape,
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
        SimulatedBus::GENERATOR_RESOURCE.to_string()
    } else {
        "TCPIP0::192.168.1.101::5025::SOCKET".to_string()
    });

    let mut generator = FunctionGenerator::connect(manager.as_ref(), &address, Duration::from_secs(5))?;
    println!("Connected: {}", generator.identify()?);

    generator.set_frequency_lock(true)?;
    for channel in [1, 2] {
        generator.set_waveform_shape(channel, WaveformShape::Sinusoid)?;
        generator.set_frequency(channel, 10e3)?;
        generator.set_amplitude(channel, 1.0)?;
        generator.set_offset(channel, 0.0)?;
        generator.set_load(channel, OutputLoad::HighZ)?;
    }
    generator.set_phase(2, 90.0)?;

    for channel in [1, 2] {
        generator.set_output(channel, true)?;
        println!(
            "CH{channel}: {} {} Hz, {} Vpp, phase {:.1} deg",
            generator.waveform_shape(channel)?,
            generator.frequency(channel)?,
            generator.amplitude(channel)?,
            generator.phase(channel)?
        );
    }

    generator.close()?;
    Ok(())
}
