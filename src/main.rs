mod cli;

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use bmp280::{Bmp280, Bmp280Builder};
use clap::Parser;
use cli::{Cli, Mode};
use log::{error, info, warn};
use ultrasonic_anemometer::config::{SequencerConfig, PULSE_PERIOD};
use ultrasonic_anemometer::hardware::rpi::RaspberryPiContext;
use ultrasonic_anemometer::hardware::simulated::SimulatedContext;
use ultrasonic_anemometer::station::{AirData, Station};
use ultrasonic_anemometer::{
    Direction, HardwareContext, MeasurementSequencer, PulseWaveform, SampleBuffer, SequencerError,
};

/// Ticks a transfer may take before the peripherals are power cycled.
const STUCK_TIMEOUT_TICKS: u32 = 1000;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = SequencerConfig::default();
    let mut station = Station::new(&cli.header)?;

    if cli.simulate {
        let mut hw = SimulatedContext::new().with_auto_complete();
        hw.set_sample_source(|i| 2048 + (i % 16) as u16);
        station.record_air(
            AirData {
                pressure: 1013.25,
                temperature: 20.0,
            },
            Instant::now(),
        );
        info!("running against simulated hardware");
        return run_station(MeasurementSequencer::new(hw, config), cli, &mut station, None);
    }

    let hw = RaspberryPiContext::new(config.tick)?;
    let bmp280 = Bmp280Builder::new()
        .path("/dev/i2c-1")
        .address(0x76)
        .build()?;
    run_station(
        MeasurementSequencer::new(hw, config),
        cli,
        &mut station,
        Some(bmp280),
    )
}

fn run_station<H: HardwareContext>(
    mut sequencer: MeasurementSequencer<H>,
    cli: &Cli,
    station: &mut Station,
    mut bmp280: Option<Bmp280>,
) -> Result<(), Box<dyn Error>> {
    sequencer.power_enable(cli.frequency)?;
    //the analog supplies need time before readings are valid
    thread::sleep(Duration::from_millis(cli.settle_ms));

    let result = measure_rounds(&mut sequencer, cli, station, &mut bmp280);

    //always leave the switch and peripherals in reset
    sequencer.power_disable();
    result
}

fn measure_rounds<H: HardwareContext>(
    sequencer: &mut MeasurementSequencer<H>,
    cli: &Cli,
    station: &mut Station,
    bmp280: &mut Option<Bmp280>,
) -> Result<(), Box<dyn Error>> {
    let waveform = PulseWaveform::burst(cli.pulses, PULSE_PERIOD / 2)?;
    let buffer = SampleBuffer::with_capacity(cli.samples);
    let interval = Duration::from_millis(cli.interval_ms);

    println!("direction,{}", station.header());

    let mut cycle = 0;
    loop {
        let round_start = Instant::now();

        if let Some(bmp280) = bmp280.as_mut() {
            read_air(bmp280, station);
        }

        for &direction in &cli.directions {
            acquire(sequencer, cli.mode, direction, &waveform, &buffer)?;

            if !wait_idle(sequencer) {
                //no cancellation exists, a power cycle is the only way out
                warn!("{direction}: transfer did not complete, power cycling");
                sequencer.power_disable();
                sequencer.power_enable(cli.frequency)?;
                thread::sleep(Duration::from_millis(cli.settle_ms));
                continue;
            }

            let samples = buffer.samples()?;
            station.record_samples(&samples, Instant::now());
            println!("{direction},{}", station.row());
        }

        cycle += 1;
        if cli.cycles != 0 && cycle >= cli.cycles {
            break;
        }

        if let Some(rest) = interval.checked_sub(round_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    Ok(())
}

fn acquire<H: HardwareContext>(
    sequencer: &mut MeasurementSequencer<H>,
    mode: Mode,
    direction: Direction,
    waveform: &PulseWaveform,
    buffer: &SampleBuffer,
) -> Result<(), SequencerError> {
    let length = buffer.capacity();
    match mode {
        Mode::Listen => sequencer.listen(direction, buffer, length),
        Mode::Measure => sequencer.measure(direction, waveform, buffer, length),
    }
}

/// Polls until both transfers are done. False if they never finish.
fn wait_idle<H: HardwareContext>(sequencer: &mut MeasurementSequencer<H>) -> bool {
    let mut waited = sequencer.config().post_measure_ticks;
    sequencer.wait_ticks(waited);

    while sequencer.is_busy() {
        if waited >= STUCK_TIMEOUT_TICKS {
            return false;
        }
        sequencer.wait_ticks(1);
        waited += 1;
    }
    true
}

fn read_air(bmp280: &mut Bmp280, station: &mut Station) {
    let pressure = match bmp280.pressure_kpa() {
        Ok(kpa) => kpa * 10.0, //hPa
        Err(_) => {
            warn!("bmp280 pressure read failed");
            return;
        }
    };
    let temperature = match bmp280.temperature_celsius() {
        Ok(celsius) => celsius,
        Err(_) => {
            warn!("bmp280 temperature read failed");
            return;
        }
    };

    station.record_air(
        AirData {
            pressure,
            temperature,
        },
        Instant::now(),
    );
}
