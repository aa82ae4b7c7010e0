//! Raspberry Pi backend.
//!
//! The analog switch hangs off three GPIO outputs, the pulse generator is
//! hardware PWM0 and the converter is an MCP3202 on SPI0. Transfers run on
//! worker threads, which play the role of the interrupt context: they fill
//! the lease and fire the completion signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use rppal::gpio::{Gpio, Level, OutputPin};
use rppal::pwm::{self, Pwm};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use super::{CompletionSignal, Mux, PowerRail, PulseChannel, SampleChannel, Scheduler};
use crate::anemometer::{BufferLease, PulseWaveform};
use crate::config::{ConverterConfig, Polarity, PulseTimerConfig};
use crate::error::HardwareError;

const SPI_CLOCK_HZ: u32 = 1_000_000;
const MCP3202_BITS: u8 = 12;

#[derive(Clone, Copy, Debug)]
enum SwitchPin {
    EN = 17,
    A = 27,
    B = 22,
}

/// MCP3202 in single-ended mode.
struct SpiConverter {
    spi: Spi,
    command: [u8; 3],
    shift: u8,
}

impl SpiConverter {
    fn open(config: &ConverterConfig) -> Result<SpiConverter, HardwareError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)?;
        // start bit, then SGL=1, ODD=channel, MSBF=1
        let select = 0x80 | ((config.channel() & 0x01) << 6) | 0x20;
        Ok(SpiConverter {
            spi,
            command: [0x01, select, 0x00],
            shift: MCP3202_BITS.saturating_sub(config.resolution_bits()),
        })
    }

    fn convert(&mut self) -> Result<u16, rppal::spi::Error> {
        let mut read = [0u8; 3];
        self.spi.transfer(&mut read, &self.command)?;
        let raw = (u16::from(read[1] & 0x0F) << 8) | u16::from(read[2]);
        Ok(raw >> self.shift)
    }
}

struct PulseTimer {
    pwm: Pwm,
    config: PulseTimerConfig,
}

pub struct RaspberryPiContext {
    enable_pin: OutputPin,
    line_a: OutputPin,
    line_b: OutputPin,
    converter: Option<Arc<Mutex<SpiConverter>>>,
    pulse_timer: Option<Arc<Mutex<PulseTimer>>>,
    workers: Vec<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
    tick: Duration,
}

impl RaspberryPiContext {
    pub fn new(tick: Duration) -> Result<RaspberryPiContext, HardwareError> {
        let gpio = Gpio::new()?;

        // the switch enable is active low, keep it off until power-up
        let enable_pin = gpio.get(SwitchPin::EN as u8)?.into_output_high();
        let line_a = gpio.get(SwitchPin::A as u8)?.into_output_low();
        let line_b = gpio.get(SwitchPin::B as u8)?.into_output_low();

        Ok(RaspberryPiContext {
            enable_pin,
            line_a,
            line_b,
            converter: None,
            pulse_timer: None,
            workers: Vec::new(),
            abort: Arc::new(AtomicBool::new(false)),
            tick,
        })
    }

    fn spawn(&mut self, worker: impl FnOnce() + Send + 'static) {
        self.workers.retain(|handle| !handle.is_finished());
        self.workers.push(thread::spawn(worker));
    }

    /// Stops every worker and waits for it, so no completion fires after
    /// the peripherals are gone.
    fn stop_workers(&mut self) {
        self.abort.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("transfer worker panicked");
            }
        }
        self.abort = Arc::new(AtomicBool::new(false));
    }
}

impl Drop for RaspberryPiContext {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

impl PowerRail for RaspberryPiContext {
    fn enable_clocks(&mut self) -> Result<(), HardwareError> {
        // the kernel drivers gate the SPI and PWM clocks themselves
        debug!("peripheral clocks managed by the kernel");
        Ok(())
    }

    fn init_converter(&mut self, config: &ConverterConfig) -> Result<(), HardwareError> {
        let converter = SpiConverter::open(config)?;
        self.converter = Some(Arc::new(Mutex::new(converter)));
        Ok(())
    }

    fn calibrate_converter(&mut self) -> Result<(), HardwareError> {
        // no self-calibration on the MCP3202, discard the first conversion
        let converter = self
            .converter
            .as_ref()
            .ok_or(HardwareError::NotReady("converter"))?;
        let mut converter = converter.lock().unwrap_or_else(PoisonError::into_inner);
        converter.convert()?;
        Ok(())
    }

    fn init_pulse_timer(&mut self, config: &PulseTimerConfig) -> Result<(), HardwareError> {
        let polarity = match config.polarity() {
            Polarity::ActiveHigh => pwm::Polarity::Normal,
            Polarity::ActiveLow => pwm::Polarity::Inverse,
        };
        let pwm = Pwm::with_frequency(pwm::Channel::Pwm0, config.carrier_hz(), 0.0, polarity, true)?;
        self.pulse_timer = Some(Arc::new(Mutex::new(PulseTimer {
            pwm,
            config: *config,
        })));
        Ok(())
    }

    fn deinit_converter(&mut self) {
        self.stop_workers();
        self.converter = None;
    }

    fn deinit_pulse_timer(&mut self) {
        self.stop_workers();
        if let Some(timer) = self.pulse_timer.take() {
            let timer = timer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = timer.pwm.disable() {
                warn!("failed to disable pwm: {err}");
            }
        }
    }
}

impl Mux for RaspberryPiContext {
    fn set_switch_enabled(&mut self, enabled: bool) {
        self.enable_pin.write(if enabled { Level::Low } else { Level::High });
    }

    fn set_lines(&mut self, a: Level, b: Level) {
        self.line_a.write(a);
        self.line_b.write(b);
    }
}

impl PulseChannel for RaspberryPiContext {
    fn start_pulse(
        &mut self,
        waveform: PulseWaveform,
        done: CompletionSignal,
    ) -> Result<(), HardwareError> {
        let timer = self
            .pulse_timer
            .clone()
            .ok_or(HardwareError::NotReady("pulse timer"))?;
        let abort = self.abort.clone();
        self.spawn(move || pulse_loop(timer, waveform, done, abort));
        Ok(())
    }
}

impl SampleChannel for RaspberryPiContext {
    fn start_sampling(
        &mut self,
        lease: BufferLease,
        done: CompletionSignal,
    ) -> Result<(), HardwareError> {
        let converter = self
            .converter
            .clone()
            .ok_or(HardwareError::NotReady("converter"))?;
        let abort = self.abort.clone();
        self.spawn(move || sample_loop(converter, lease, done, abort));
        Ok(())
    }
}

impl Scheduler for RaspberryPiContext {
    fn delay_ticks(&mut self, ticks: u32) {
        thread::sleep(self.tick * ticks);
    }
}

fn pulse_loop(
    timer: Arc<Mutex<PulseTimer>>,
    waveform: PulseWaveform,
    done: CompletionSignal,
    abort: Arc<AtomicBool>,
) {
    let timer = timer.lock().unwrap_or_else(PoisonError::into_inner);
    let period = timer.config.sample_period();
    let full_scale = f64::from(timer.config.period());

    let mut deadline = Instant::now();
    for &compare in waveform.samples() {
        if abort.load(Ordering::Acquire) {
            break;
        }
        let duty = (f64::from(compare) / full_scale).min(1.0);
        if let Err(err) = timer.pwm.set_duty_cycle(duty) {
            error!("pulse playback stopped: {err}");
            break;
        }
        //busy-wait, sleep granularity is far coarser than one carrier period
        deadline += period;
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    // auto-stop: park the output low
    if let Err(err) = timer.pwm.set_duty_cycle(0.0) {
        warn!("failed to park pwm output: {err}");
    }
    done.complete();
}

fn sample_loop(
    converter: Arc<Mutex<SpiConverter>>,
    lease: BufferLease,
    done: CompletionSignal,
    abort: Arc<AtomicBool>,
) {
    let mut converter = converter.lock().unwrap_or_else(PoisonError::into_inner);
    let mut samples = Vec::with_capacity(lease.len());

    while samples.len() < lease.len() {
        if abort.load(Ordering::Acquire) {
            // dropping the lease releases the buffer empty
            done.complete();
            return;
        }
        match converter.convert() {
            Ok(sample) => samples.push(sample),
            Err(err) => {
                error!("sampling stopped after {} samples: {err}", samples.len());
                break;
            }
        }
    }

    lease.fill(&samples);
    done.complete();
}
