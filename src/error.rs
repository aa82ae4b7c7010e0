use std::fmt;

use thiserror::Error;

/// The two asynchronous transfer channels of the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Pulse,
    Sample,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Pulse => write!(f, "pulse"),
            Channel::Sample => write!(f, "sample"),
        }
    }
}

/// Errors raised by the hardware backends.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("pwm: {0}")]
    Pwm(#[from] rppal::pwm::Error),
    #[error("spi: {0}")]
    Spi(#[from] rppal::spi::Error),
    /// A transfer was requested on a peripheral that was never initialized.
    #[error("{0} is not initialized")]
    NotReady(&'static str),
    /// Fault injected by the simulated backend.
    #[error("{0} did not reach ready state")]
    Simulated(&'static str),
}

/// Rejected peripheral configurations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pulse frequency must be non-zero")]
    ZeroFrequency,
    #[error("pulse frequency {frequency} Hz is too high for a {core_clock} Hz core clock")]
    FrequencyTooHigh { frequency: u32, core_clock: u32 },
    #[error("pulse frequency {frequency} Hz needs prescaler {prescaler}, above the 16-bit limit")]
    PrescalerOverflow { frequency: u32, prescaler: u32 },
    #[error("unsupported converter resolution of {0} bits")]
    Resolution(u8),
    #[error("converter supports exactly one regular channel, got {0}")]
    ChannelCount(u8),
    #[error("a pulse waveform needs at least one sample")]
    EmptyWaveform,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseDirectionError {
    #[error("unknown direction `{0}`")]
    Name(String),
    #[error("direction index {0} is out of range 0..=3")]
    Index(u8),
}

/// Errors returned by every sequencing operation.
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("{0} channel is busy")]
    Busy(Channel),
    #[error("sample buffer is still lent to an acquisition")]
    BufferLent,
    #[error("requested {requested} samples but the buffer holds {capacity}")]
    InvalidLength { requested: usize, capacity: usize },
    #[error("peripherals are powered off")]
    PoweredOff,
    #[error("invalid peripheral configuration: {0}")]
    Config(#[from] ConfigError),
    /// Fatal: the peripheral group has already been reset when this is returned.
    #[error("failed to initialize {peripheral}: {source}")]
    Initialization {
        peripheral: &'static str,
        #[source]
        source: HardwareError,
    },
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid key `{0}`")]
    InvalidKey(String),
    #[error("key `{0}` is already registered")]
    Duplicate(String),
    #[error("unknown data name `{0}`")]
    Unknown(String),
}
