//! Hardware capabilities the measurement sequencer drives.
//!
//! A backend implements the five capability traits; the blanket
//! [`HardwareContext`] impl bundles them. Transfers are started here and
//! finished from the backend's interrupt context through a
//! [`CompletionSignal`].

pub mod rpi;
pub mod simulated;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rppal::gpio::Level;

use crate::anemometer::{BufferLease, PulseWaveform};
use crate::config::{ConverterConfig, PulseTimerConfig};
use crate::error::HardwareError;

/// Peripheral bring-up and tear-down, called in the order the power
/// sequencer defines.
pub trait PowerRail {
    fn enable_clocks(&mut self) -> Result<(), HardwareError>;
    fn init_converter(&mut self, config: &ConverterConfig) -> Result<(), HardwareError>;
    fn calibrate_converter(&mut self) -> Result<(), HardwareError>;
    fn init_pulse_timer(&mut self, config: &PulseTimerConfig) -> Result<(), HardwareError>;
    /// Stops the converter, aborting any fill in flight.
    fn deinit_converter(&mut self);
    /// Stops the pulse timer, aborting any playback in flight.
    fn deinit_pulse_timer(&mut self);
}

/// The analog switch: one enable line and two select lines.
pub trait Mux {
    fn set_switch_enabled(&mut self, enabled: bool);
    fn set_lines(&mut self, a: Level, b: Level);
}

pub trait PulseChannel {
    /// Starts one-shot playback and returns immediately. The backend must
    /// call `done.complete()` once the last sample has been played.
    fn start_pulse(
        &mut self,
        waveform: PulseWaveform,
        done: CompletionSignal,
    ) -> Result<(), HardwareError>;
}

pub trait SampleChannel {
    /// Starts filling `lease.len()` samples and returns immediately. The
    /// backend fills the lease, then calls `done.complete()`.
    fn start_sampling(
        &mut self,
        lease: BufferLease,
        done: CompletionSignal,
    ) -> Result<(), HardwareError>;
}

/// Host scheduler primitives.
pub trait Scheduler {
    fn delay_ticks(&mut self, ticks: u32);

    /// Runs `f` without preemption or interrupt reordering.
    fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        critical_section::with(|_| f(self))
    }
}

pub trait HardwareContext: PowerRail + Mux + PulseChannel + SampleChannel + Scheduler {}

impl<T> HardwareContext for T where T: PowerRail + Mux + PulseChannel + SampleChannel + Scheduler {}

/// Busy indicator owned by a transfer channel.
///
/// Every `arm` creates a fresh flag, so a signal left over from an aborted
/// transfer can never clear the busy state of a later one.
#[derive(Debug, Default)]
pub struct Completion {
    flag: Option<Arc<AtomicBool>>,
}

impl Completion {
    pub fn arm(&mut self) -> CompletionSignal {
        let flag = Arc::new(AtomicBool::new(true));
        self.flag = Some(flag.clone());
        CompletionSignal { flag }
    }

    pub fn is_busy(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    pub fn reset(&mut self) {
        self.flag = None;
    }
}

/// Interrupt-side half of a [`Completion`]. Never blocks.
#[derive(Clone, Debug)]
pub struct CompletionSignal {
    flag: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn complete(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
