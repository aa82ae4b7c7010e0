use log::{debug, error, info};
use rppal::gpio::Level;

use super::PowerState;
use crate::config::PeripheralConfig;
use crate::error::{HardwareError, SequencerError};
use crate::hardware::{Mux, PowerRail};

/// Brings the converter, the pulse generator and the analog switch up and
/// down in a fixed order.
///
/// Callers must let the analog front end settle after [`enable`] before the
/// first measurement; nothing here waits for it.
///
/// [`enable`]: PowerSequencer::enable
#[derive(Debug)]
pub struct PowerSequencer {
    state: PowerState,
    config: Option<PeripheralConfig>,
    core_clock: u32,
}

impl PowerSequencer {
    pub fn new(core_clock: u32) -> PowerSequencer {
        PowerSequencer {
            state: PowerState::PoweredOff,
            config: None,
            core_clock,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn config(&self) -> Option<&PeripheralConfig> {
        self.config.as_ref()
    }

    /// Powers the peripheral group up for pulses at `frequency` Hz.
    ///
    /// An invalid frequency is rejected before any pin moves. If a peripheral
    /// fails to come up, the whole group is reset before the error returns.
    pub fn enable<H>(&mut self, hw: &mut H, frequency: u32) -> Result<PeripheralConfig, SequencerError>
    where
        H: PowerRail + Mux,
    {
        let config = PeripheralConfig::new(frequency, self.core_clock)?;

        if self.state == PowerState::PoweredOn {
            debug!("re-enabling powered peripherals, resetting first");
            self.disable(hw);
        }

        if let Err(err) = power_up(hw, &config) {
            error!("{err}, resetting peripherals");
            self.disable(hw);
            return Err(err);
        }

        self.state = PowerState::PoweredOn;
        self.config = Some(config);
        info!(
            "peripherals powered on: pulse {} Hz (prescaler {}, carrier {:.1} Hz)",
            frequency,
            config.pulse_timer.prescaler(),
            config.pulse_timer.carrier_hz()
        );
        Ok(config)
    }

    /// Deinitializes both peripherals and returns the switch to reset. Safe to
    /// call in any state.
    pub fn disable<H>(&mut self, hw: &mut H)
    where
        H: PowerRail + Mux,
    {
        hw.deinit_converter();
        hw.deinit_pulse_timer();
        hw.set_switch_enabled(false);
        hw.set_lines(Level::Low, Level::Low);

        if self.state == PowerState::PoweredOn {
            info!("peripherals powered off");
        }
        self.state = PowerState::PoweredOff;
        self.config = None;
    }
}

fn power_up<H>(hw: &mut H, config: &PeripheralConfig) -> Result<(), SequencerError>
where
    H: PowerRail + Mux,
{
    hw.enable_clocks().map_err(failed("peripheral clocks"))?;

    // pulse the switch enable to reset it
    hw.set_switch_enabled(false);
    hw.set_switch_enabled(true);

    hw.init_converter(&config.converter)
        .map_err(failed("converter"))?;
    hw.calibrate_converter()
        .map_err(failed("converter calibration"))?;
    hw.init_pulse_timer(&config.pulse_timer)
        .map_err(failed("pulse timer"))?;

    hw.set_switch_enabled(true);
    hw.set_lines(Level::Low, Level::Low);
    Ok(())
}

fn failed(peripheral: &'static str) -> impl Fn(HardwareError) -> SequencerError {
    move |source| SequencerError::Initialization { peripheral, source }
}
