use log::debug;

use super::{
    Activity, ChannelMux, Direction, PowerSequencer, PowerState, PulseEmitter, PulseWaveform,
    SampleAcquirer, SampleBuffer,
};
use crate::config::{PeripheralConfig, SequencerConfig};
use crate::error::SequencerError;
use crate::hardware::HardwareContext;

/// Drives the switch, the pulse emitter and the sample acquirer through
/// listen-only and full transmit/receive measurements.
///
/// The sequencer owns its hardware context and assumes a single caller
/// thread. Transfers finish in the backend's interrupt context; callers
/// observe completion through [`is_busy`](Self::is_busy).
pub struct MeasurementSequencer<H: HardwareContext> {
    hw: H,
    config: SequencerConfig,
    power: PowerSequencer,
    mux: ChannelMux,
    emitter: PulseEmitter,
    acquirer: SampleAcquirer,
}

impl<H: HardwareContext> MeasurementSequencer<H> {
    pub fn new(hw: H, config: SequencerConfig) -> MeasurementSequencer<H> {
        MeasurementSequencer {
            hw,
            power: PowerSequencer::new(config.core_clock_hz),
            config,
            mux: ChannelMux::new(),
            emitter: PulseEmitter::new(),
            acquirer: SampleAcquirer::new(),
        }
    }

    pub fn power_enable(&mut self, frequency: u32) -> Result<PeripheralConfig, SequencerError> {
        let result = self.power.enable(&mut self.hw, frequency);
        // a rejected config never reaches the hardware, transfers keep running
        if !matches!(result, Err(SequencerError::Config(_))) {
            self.forget_transfers();
        }
        result
    }

    pub fn power_disable(&mut self) {
        self.power.disable(&mut self.hw);
        self.forget_transfers();
    }

    pub fn select_direction(&mut self, direction: Direction) {
        self.mux.select(&mut self.hw, direction);
    }

    /// Samples the receiver across the axis of `direction` without
    /// transmitting: the opposite transducer is routed, then after the
    /// settle delay `length` samples are streamed into `buffer`.
    pub fn listen(
        &mut self,
        direction: Direction,
        buffer: &SampleBuffer,
        length: usize,
    ) -> Result<(), SequencerError> {
        self.ensure_powered()?;
        // rerouting under a playing pulse would move it to another transducer
        self.emitter.ensure_idle()?;
        self.acquirer.ensure_ready(buffer, length)?;

        let routed = direction.opposite();
        debug!("listen {direction}: routing {routed}");
        self.mux.select(&mut self.hw, routed);
        self.hw.delay_ticks(self.config.settle_ticks);

        self.acquirer.start(&mut self.hw, buffer, length)
    }

    /// Transmits `waveform` from `direction` and samples `length` entries
    /// into `buffer`. Both transfers start inside one critical section.
    ///
    /// Does not wait for completion: allow
    /// [`post_measure_ticks`](SequencerConfig::post_measure_ticks) or poll
    /// [`is_busy`](Self::is_busy) before reading `buffer`.
    ///
    /// If the sample channel fails to start after the pulse did, the error is
    /// returned while the pulse plays to its end; the emitter stays busy until
    /// its completion fires.
    pub fn measure(
        &mut self,
        direction: Direction,
        waveform: &PulseWaveform,
        buffer: &SampleBuffer,
        length: usize,
    ) -> Result<(), SequencerError> {
        self.ensure_powered()?;
        self.emitter.ensure_idle()?;
        self.acquirer.ensure_ready(buffer, length)?;

        debug!("measure {direction}");
        self.mux.select(&mut self.hw, direction);
        self.hw.delay_ticks(self.config.settle_ticks);

        let emitter = &mut self.emitter;
        let acquirer = &mut self.acquirer;
        self.hw.critical(|hw| {
            emitter.transmit(hw, waveform)?;
            acquirer.start(hw, buffer, length)
        })
    }

    /// True while a pulse or a sample fill is in flight.
    pub fn is_busy(&self) -> bool {
        self.emitter.busy() || self.acquirer.busy()
    }

    pub fn activity(&self) -> Activity {
        Activity::from_flags(self.emitter.busy(), self.acquirer.busy())
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn active_direction(&self) -> Option<Direction> {
        self.mux.active()
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn peripheral_config(&self) -> Option<&PeripheralConfig> {
        self.power.config()
    }

    pub fn wait_ticks(&mut self, ticks: u32) {
        self.hw.delay_ticks(ticks);
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn into_hardware(self) -> H {
        self.hw
    }

    fn ensure_powered(&self) -> Result<(), SequencerError> {
        match self.power.state() {
            PowerState::PoweredOn => Ok(()),
            PowerState::PoweredOff => Err(SequencerError::PoweredOff),
        }
    }

    fn forget_transfers(&mut self) {
        self.mux.clear();
        self.emitter.reset();
        self.acquirer.reset();
    }
}
