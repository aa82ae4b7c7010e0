use std::time::Duration;

use crate::error::ConfigError;

/// Counter period of the pulse timer. The counter runs `0..=PULSE_PERIOD`.
pub const PULSE_PERIOD: u16 = 100;

/// Core clock of the reference board.
pub const DEFAULT_CORE_CLOCK_HZ: u32 = 80_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

/// Pulse generator timer setup, validated once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseTimerConfig {
    frequency: u32,
    core_clock: u32,
    prescaler: u16,
    period: u16,
    compare: u16,
    polarity: Polarity,
    fast_output: bool,
}

impl PulseTimerConfig {
    pub fn new(frequency: u32, core_clock: u32) -> Result<PulseTimerConfig, ConfigError> {
        if frequency == 0 {
            return Err(ConfigError::ZeroFrequency);
        }

        let divider = core_clock / frequency / u32::from(PULSE_PERIOD);
        if divider == 0 {
            return Err(ConfigError::FrequencyTooHigh {
                frequency,
                core_clock,
            });
        }

        let prescaler = divider - 1;
        let prescaler = u16::try_from(prescaler)
            .map_err(|_| ConfigError::PrescalerOverflow { frequency, prescaler })?;

        Ok(PulseTimerConfig {
            frequency,
            core_clock,
            prescaler,
            period: PULSE_PERIOD,
            compare: PULSE_PERIOD,
            // the transducer driver stage expects an active-high output
            polarity: Polarity::ActiveHigh,
            fast_output: true,
        })
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn prescaler(&self) -> u16 {
        self.prescaler
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn compare(&self) -> u16 {
        self.compare
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn fast_output(&self) -> bool {
        self.fast_output
    }

    /// Frequency the timer actually produces after prescaler truncation.
    pub fn carrier_hz(&self) -> f64 {
        let counts = f64::from(self.period) + 1.0;
        f64::from(self.core_clock) / (f64::from(self.prescaler) + 1.0) / counts
    }

    /// Duration of one waveform sample, i.e. one timer period.
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.carrier_hz())
    }
}

/// Sample converter setup: one channel converted continuously and streamed
/// to memory in the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConverterConfig {
    resolution_bits: u8,
    channel: u8,
    channel_count: u8,
    continuous: bool,
    continuous_requests: bool,
    overwrite_on_overrun: bool,
    single_ended: bool,
    /// Sampling time in half ADC clock cycles (25 = 12.5 cycles).
    sampling_half_cycles: u16,
}

impl ConverterConfig {
    pub fn new(resolution_bits: u8, channel_count: u8) -> Result<ConverterConfig, ConfigError> {
        if !matches!(resolution_bits, 6 | 8 | 10 | 12) {
            return Err(ConfigError::Resolution(resolution_bits));
        }
        if channel_count != 1 {
            return Err(ConfigError::ChannelCount(channel_count));
        }

        Ok(ConverterConfig {
            resolution_bits,
            channel: 1,
            channel_count,
            continuous: true,
            continuous_requests: true,
            overwrite_on_overrun: true,
            single_ended: true,
            sampling_half_cycles: 25,
        })
    }

    pub fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    pub fn continuous_requests(&self) -> bool {
        self.continuous_requests
    }

    pub fn overwrite_on_overrun(&self) -> bool {
        self.overwrite_on_overrun
    }

    pub fn single_ended(&self) -> bool {
        self.single_ended
    }

    pub fn sampling_half_cycles(&self) -> u16 {
        self.sampling_half_cycles
    }

    /// Largest value a conversion can produce.
    pub fn full_scale(&self) -> u16 {
        (1u16 << self.resolution_bits) - 1
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            resolution_bits: 12,
            channel: 1,
            channel_count: 1,
            continuous: true,
            continuous_requests: true,
            overwrite_on_overrun: true,
            single_ended: true,
            sampling_half_cycles: 25,
        }
    }
}

/// Everything the power sequencer programs into the peripherals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeripheralConfig {
    pub converter: ConverterConfig,
    pub pulse_timer: PulseTimerConfig,
}

impl PeripheralConfig {
    pub fn new(frequency: u32, core_clock: u32) -> Result<PeripheralConfig, ConfigError> {
        Ok(PeripheralConfig {
            converter: ConverterConfig::default(),
            pulse_timer: PulseTimerConfig::new(frequency, core_clock)?,
        })
    }
}

/// Timing parameters of the measurement sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Wait after committing a direction before any transfer starts.
    pub settle_ticks: u32,
    /// Wait callers should allow after a full measurement before polling.
    pub post_measure_ticks: u32,
    pub core_clock_hz: u32,
    /// Length of one scheduler tick.
    pub tick: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            settle_ticks: 10,
            post_measure_ticks: 2,
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
            tick: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_follows_core_clock() {
        let config = PulseTimerConfig::new(40_000, DEFAULT_CORE_CLOCK_HZ).unwrap();
        assert_eq!(config.prescaler(), 19);
        assert_eq!(config.period(), 100);
        assert_eq!(config.compare(), 100);
        assert_eq!(config.polarity(), Polarity::ActiveHigh);
        assert!(config.fast_output());
    }

    #[test]
    fn carrier_accounts_for_full_counter_range() {
        let config = PulseTimerConfig::new(40_000, DEFAULT_CORE_CLOCK_HZ).unwrap();
        let expected = 80_000_000.0 / 20.0 / 101.0;
        assert!((config.carrier_hz() - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_unreachable_frequencies() {
        assert_eq!(
            PulseTimerConfig::new(0, DEFAULT_CORE_CLOCK_HZ),
            Err(ConfigError::ZeroFrequency)
        );
        assert!(matches!(
            PulseTimerConfig::new(1_000_000, DEFAULT_CORE_CLOCK_HZ),
            Err(ConfigError::FrequencyTooHigh { .. })
        ));
        assert!(matches!(
            PulseTimerConfig::new(1, DEFAULT_CORE_CLOCK_HZ),
            Err(ConfigError::PrescalerOverflow { .. })
        ));
    }

    #[test]
    fn converter_defaults() {
        let config = ConverterConfig::default();
        assert_eq!(ConverterConfig::new(12, 1).unwrap(), config);
        assert_eq!(config.full_scale(), 4095);
        assert_eq!(config.sampling_half_cycles(), 25);
        assert_eq!(ConverterConfig::new(11, 1), Err(ConfigError::Resolution(11)));
        assert_eq!(ConverterConfig::new(12, 2), Err(ConfigError::ChannelCount(2)));
    }
}
