//! Measurement sequencing for a four-transducer ultrasonic anemometer.
//!
//! [`MeasurementSequencer`] routes the analog switch, fires pulses and
//! streams converter samples over any [`HardwareContext`]. It returns raw
//! samples only.

pub mod anemometer;
pub mod config;
pub mod error;
pub mod hardware;
pub mod registry;
pub mod station;

pub use anemometer::{
    Activity, Direction, MeasurementSequencer, PowerState, PulseWaveform, SampleBuffer,
};
pub use config::{PeripheralConfig, SequencerConfig};
pub use error::{Channel, ConfigError, HardwareError, SequencerError};
pub use hardware::HardwareContext;
