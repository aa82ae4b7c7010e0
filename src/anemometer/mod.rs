pub mod acquirer;
pub mod buffer;
pub mod emitter;
pub mod mux;
pub mod power;
pub mod sequencer;

use std::fmt;
use std::str::FromStr;

use rppal::gpio::Level;

use crate::error::ParseDirectionError;

pub use acquirer::SampleAcquirer;
pub use buffer::{BufferLease, PulseWaveform, SampleBuffer};
pub use emitter::PulseEmitter;
pub use mux::ChannelMux;
pub use power::PowerSequencer;
pub use sequencer::MeasurementSequencer;

/// One of the four transducers of the cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// The transducer across the same axis.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Levels of the switch select lines (A, B) for this transducer.
    pub fn switch_lines(self) -> (Level, Level) {
        match self {
            Direction::North => (Level::Low, Level::Low),
            Direction::East => (Level::High, Level::Low),
            Direction::South => (Level::Low, Level::High),
            Direction::West => (Level::High, Level::High),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Direction::North),
            "e" | "east" => Ok(Direction::East),
            "s" | "south" => Ok(Direction::South),
            "w" | "west" => Ok(Direction::West),
            _ => Err(ParseDirectionError::Name(s.to_owned())),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = ParseDirectionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(ParseDirectionError::Index(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    PoweredOff,
    PoweredOn,
}

/// What the transfer channels are doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    Idle,
    TransmitBusy,
    SampleBusy,
    TransmitAndSampleBusy,
}

impl Activity {
    pub fn from_flags(transmitting: bool, sampling: bool) -> Activity {
        match (transmitting, sampling) {
            (false, false) => Activity::Idle,
            (true, false) => Activity::TransmitBusy,
            (false, true) => Activity::SampleBusy,
            (true, true) => Activity::TransmitAndSampleBusy,
        }
    }
}
