//! A hardware context that records every call instead of touching pins.
//!
//! Transfers stay pending until [`SimulatedContext::complete_pulse`] or
//! [`SimulatedContext::complete_sampling`] fires the matching interrupt, so
//! callers can observe the busy window. With auto-completion enabled, any
//! delay lets pending transfers finish as real hardware would.

use rppal::gpio::Level;

use super::{CompletionSignal, Mux, PowerRail, PulseChannel, SampleChannel, Scheduler};
use crate::anemometer::{BufferLease, PulseWaveform};
use crate::config::{ConverterConfig, PulseTimerConfig};
use crate::error::HardwareError;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ClocksEnabled,
    ConverterInit,
    ConverterCalibrated,
    PulseTimerInit { prescaler: u16 },
    ConverterDeinit,
    PulseTimerDeinit,
    SwitchEnabled(bool),
    Lines(Level, Level),
    Delay(u32),
    CriticalEnter,
    CriticalExit,
    PulseStart { len: usize },
    SampleStart { len: usize },
    PulseComplete,
    SampleComplete,
}

/// Peripheral that refuses to come up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Clocks,
    Converter,
    Calibration,
    PulseTimer,
}

type SampleSource = Box<dyn FnMut(usize) -> u16 + Send>;

pub struct SimulatedContext {
    events: Vec<Event>,
    lines: (Level, Level),
    switch_enabled: bool,
    converter: Option<ConverterConfig>,
    pulse_timer: Option<PulseTimerConfig>,
    pending_pulse: Option<(PulseWaveform, CompletionSignal)>,
    pending_sample: Option<(BufferLease, CompletionSignal)>,
    source: SampleSource,
    fault: Option<Fault>,
    auto_complete: bool,
    elapsed_ticks: u64,
}

impl SimulatedContext {
    pub fn new() -> SimulatedContext {
        SimulatedContext {
            events: Vec::new(),
            lines: (Level::Low, Level::Low),
            switch_enabled: false,
            converter: None,
            pulse_timer: None,
            pending_pulse: None,
            pending_sample: None,
            // mid-scale of a 12-bit converter
            source: Box::new(|_| 2048),
            fault: None,
            auto_complete: false,
            elapsed_ticks: 0,
        }
    }

    /// Pending transfers complete on the next delay.
    pub fn with_auto_complete(mut self) -> SimulatedContext {
        self.auto_complete = true;
        self
    }

    pub fn set_sample_source(&mut self, source: impl FnMut(usize) -> u16 + Send + 'static) {
        self.source = Box::new(source);
    }

    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn lines(&self) -> (Level, Level) {
        self.lines
    }

    pub fn switch_enabled(&self) -> bool {
        self.switch_enabled
    }

    pub fn converter_ready(&self) -> bool {
        self.converter.is_some()
    }

    pub fn pulse_timer_ready(&self) -> bool {
        self.pulse_timer.is_some()
    }

    pub fn pulse_pending(&self) -> bool {
        self.pending_pulse.is_some()
    }

    pub fn sampling_pending(&self) -> bool {
        self.pending_sample.is_some()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    /// Fires the pulse-finished interrupt. Returns false if nothing was playing.
    pub fn complete_pulse(&mut self) -> bool {
        match self.pending_pulse.take() {
            Some((_, done)) => {
                done.complete();
                self.events.push(Event::PulseComplete);
                true
            }
            None => false,
        }
    }

    /// Fills the pending buffer from the sample source and fires the
    /// conversion-complete interrupt. Returns false if nothing was sampling.
    pub fn complete_sampling(&mut self) -> bool {
        match self.pending_sample.take() {
            Some((lease, done)) => {
                let samples: Vec<u16> = (0..lease.len()).map(&mut self.source).collect();
                lease.fill(&samples);
                done.complete();
                self.events.push(Event::SampleComplete);
                true
            }
            None => false,
        }
    }

    pub fn complete_all(&mut self) {
        self.complete_pulse();
        self.complete_sampling();
    }

    fn check(&self, fault: Fault, name: &'static str) -> Result<(), HardwareError> {
        if self.fault == Some(fault) {
            return Err(HardwareError::Simulated(name));
        }
        Ok(())
    }
}

impl Default for SimulatedContext {
    fn default() -> Self {
        SimulatedContext::new()
    }
}

impl PowerRail for SimulatedContext {
    fn enable_clocks(&mut self) -> Result<(), HardwareError> {
        self.check(Fault::Clocks, "peripheral clocks")?;
        self.events.push(Event::ClocksEnabled);
        Ok(())
    }

    fn init_converter(&mut self, config: &ConverterConfig) -> Result<(), HardwareError> {
        self.check(Fault::Converter, "converter")?;
        self.converter = Some(*config);
        self.events.push(Event::ConverterInit);
        Ok(())
    }

    fn calibrate_converter(&mut self) -> Result<(), HardwareError> {
        if self.converter.is_none() {
            return Err(HardwareError::NotReady("converter"));
        }
        self.check(Fault::Calibration, "converter calibration")?;
        self.events.push(Event::ConverterCalibrated);
        Ok(())
    }

    fn init_pulse_timer(&mut self, config: &PulseTimerConfig) -> Result<(), HardwareError> {
        self.check(Fault::PulseTimer, "pulse timer")?;
        self.pulse_timer = Some(*config);
        self.events.push(Event::PulseTimerInit {
            prescaler: config.prescaler(),
        });
        Ok(())
    }

    fn deinit_converter(&mut self) {
        self.converter = None;
        // aborting drops the lease, which releases the buffer empty
        if let Some((_, done)) = self.pending_sample.take() {
            done.complete();
        }
        self.events.push(Event::ConverterDeinit);
    }

    fn deinit_pulse_timer(&mut self) {
        self.pulse_timer = None;
        if let Some((_, done)) = self.pending_pulse.take() {
            done.complete();
        }
        self.events.push(Event::PulseTimerDeinit);
    }
}

impl Mux for SimulatedContext {
    fn set_switch_enabled(&mut self, enabled: bool) {
        self.switch_enabled = enabled;
        self.events.push(Event::SwitchEnabled(enabled));
    }

    fn set_lines(&mut self, a: Level, b: Level) {
        self.lines = (a, b);
        self.events.push(Event::Lines(a, b));
    }
}

impl PulseChannel for SimulatedContext {
    fn start_pulse(
        &mut self,
        waveform: PulseWaveform,
        done: CompletionSignal,
    ) -> Result<(), HardwareError> {
        if self.pulse_timer.is_none() {
            return Err(HardwareError::NotReady("pulse timer"));
        }
        self.events.push(Event::PulseStart {
            len: waveform.len(),
        });
        self.pending_pulse = Some((waveform, done));
        Ok(())
    }
}

impl SampleChannel for SimulatedContext {
    fn start_sampling(
        &mut self,
        lease: BufferLease,
        done: CompletionSignal,
    ) -> Result<(), HardwareError> {
        if self.converter.is_none() {
            return Err(HardwareError::NotReady("converter"));
        }
        self.events.push(Event::SampleStart { len: lease.len() });
        self.pending_sample = Some((lease, done));
        Ok(())
    }
}

impl Scheduler for SimulatedContext {
    fn delay_ticks(&mut self, ticks: u32) {
        self.elapsed_ticks += u64::from(ticks);
        self.events.push(Event::Delay(ticks));
        if self.auto_complete && ticks > 0 {
            self.complete_all();
        }
    }

    fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        critical_section::with(|_| {
            self.events.push(Event::CriticalEnter);
            let result = f(self);
            self.events.push(Event::CriticalExit);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anemometer::SampleBuffer;
    use crate::hardware::Completion;

    #[test]
    fn transfers_need_initialized_peripherals() {
        let mut hw = SimulatedContext::new();
        let mut completion = Completion::default();
        let buffer = SampleBuffer::with_capacity(4);

        let lease = buffer.lend(4).unwrap();
        assert!(matches!(
            hw.start_sampling(lease, completion.arm()),
            Err(HardwareError::NotReady("converter"))
        ));
        // the rejected lease was dropped
        assert!(!buffer.is_lent());
    }

    #[test]
    fn sampling_fills_from_source() {
        let mut hw = SimulatedContext::new();
        hw.init_converter(&ConverterConfig::default()).unwrap();
        hw.set_sample_source(|i| i as u16 * 10);

        let mut completion = Completion::default();
        let buffer = SampleBuffer::with_capacity(4);
        hw.start_sampling(buffer.lend(3).unwrap(), completion.arm())
            .unwrap();
        assert!(completion.is_busy());
        assert!(hw.complete_sampling());
        assert!(!completion.is_busy());
        assert_eq!(buffer.samples().unwrap(), vec![0, 10, 20]);
        assert!(!hw.complete_sampling());
    }

    #[test]
    fn deinit_aborts_pending_fill() {
        let mut hw = SimulatedContext::new();
        hw.init_converter(&ConverterConfig::default()).unwrap();

        let mut completion = Completion::default();
        let buffer = SampleBuffer::with_capacity(4);
        hw.start_sampling(buffer.lend(4).unwrap(), completion.arm())
            .unwrap();
        hw.deinit_converter();

        assert!(!completion.is_busy());
        assert!(!buffer.is_lent());
        assert!(buffer.is_empty());
    }
}
