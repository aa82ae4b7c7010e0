use clap::{self, Parser, ValueEnum};

use ultrasonic_anemometer::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Sample the receiver across the axis without transmitting
    Listen,
    /// Transmit a burst and sample its arrival
    Measure,
}

#[derive(Debug, Parser)]
#[command(long_about = None)]
pub struct Cli {
    /// Pulse generator frequency in Hz
    #[arg(short, long, default_value_t = 40_000)]
    pub frequency: u32,
    #[arg(short, long, value_enum, default_value_t = Mode::Measure)]
    pub mode: Mode,
    #[arg(short, long, value_delimiter = ',', default_value = "north,east,south,west")]
    pub directions: Vec<Direction>,
    /// Samples per acquisition
    #[arg(short = 'n', long, default_value_t = 256)]
    pub samples: usize,
    /// Carrier periods per transmitted burst
    #[arg(short, long, default_value_t = 8)]
    pub pulses: usize,
    /// Rounds over all directions, 0 runs until interrupted
    #[arg(short, long, default_value_t = 1)]
    pub cycles: u32,
    /// Pause between rounds in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    pub interval_ms: u64,
    /// Analog settle time after power-up in milliseconds
    #[arg(long, default_value_t = 100)]
    pub settle_ms: u64,
    /// Run against simulated hardware
    #[arg(long)]
    pub simulate: bool,
    /// Registry entries printed per measurement
    #[arg(
        long,
        default_value = "pressure,temperature,samples_min,samples_max,measurements"
    )]
    pub header: String,
}
