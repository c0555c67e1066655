mod fan_in;
mod hotspot_amplifier;

pub use fan_in::FanInDetector;
pub use hotspot_amplifier::HotspotAmplifierDetector;
