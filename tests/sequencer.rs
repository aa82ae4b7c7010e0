use rppal::gpio::Level::{self, High, Low};
use ultrasonic_anemometer::hardware::simulated::{Event, SimulatedContext};
use ultrasonic_anemometer::hardware::PowerRail;
use ultrasonic_anemometer::*;

const FREQUENCY: u32 = 40_000;

fn powered() -> MeasurementSequencer<SimulatedContext> {
    let mut sequencer = MeasurementSequencer::new(SimulatedContext::new(), SequencerConfig::default());
    sequencer.power_enable(FREQUENCY).unwrap();
    sequencer.hardware_mut().clear_events();
    sequencer
}

fn waveform(len: usize) -> PulseWaveform {
    PulseWaveform::new(vec![50; len]).unwrap()
}

#[rstest::rstest]
#[case(Direction::North, (Low, Low))]
#[case(Direction::East, (High, Low))]
#[case(Direction::South, (Low, High))]
#[case(Direction::West, (High, High))]
fn select_sets_switch_lines(#[case] direction: Direction, #[case] lines: (Level, Level)) {
    let mut sequencer = powered();

    sequencer.select_direction(direction);
    assert_eq!(sequencer.hardware().lines(), lines);
    assert_eq!(sequencer.active_direction(), Some(direction));

    sequencer.select_direction(direction);
    assert_eq!(sequencer.hardware().lines(), lines);
    assert_eq!(
        sequencer.hardware().events(),
        &[Event::Lines(lines.0, lines.1), Event::Lines(lines.0, lines.1)]
    );
}

#[test]
fn listen_routes_opposite_then_samples() {
    let mut sequencer = powered();
    sequencer
        .hardware_mut()
        .set_sample_source(|i| 1000 + i as u16);
    let buffer = SampleBuffer::with_capacity(64);

    sequencer.listen(Direction::North, &buffer, 64).unwrap();

    assert_eq!(
        sequencer.hardware().events(),
        &[
            Event::Lines(Low, High),
            Event::Delay(10),
            Event::SampleStart { len: 64 },
        ]
    );
    assert_eq!(sequencer.active_direction(), Some(Direction::South));
    assert!(sequencer.is_busy());
    assert_eq!(sequencer.activity(), Activity::SampleBusy);
    assert!(buffer.is_lent());
    assert!(matches!(buffer.samples(), Err(SequencerError::BufferLent)));

    assert!(sequencer.hardware_mut().complete_sampling());
    assert!(!sequencer.is_busy());

    let samples = buffer.samples().unwrap();
    assert_eq!(samples.len(), 64);
    assert_eq!(samples[0], 1000);
    assert_eq!(samples[63], 1063);
}

#[rstest::rstest]
#[case(Direction::North, Direction::South)]
#[case(Direction::East, Direction::West)]
#[case(Direction::South, Direction::North)]
#[case(Direction::West, Direction::East)]
fn listen_inverts_every_direction(#[case] direction: Direction, #[case] routed: Direction) {
    let mut sequencer = powered();
    let buffer = SampleBuffer::with_capacity(16);

    sequencer.listen(direction, &buffer, 16).unwrap();
    assert_eq!(sequencer.hardware().lines(), routed.switch_lines());
}

#[test]
fn measure_starts_both_transfers_atomically() {
    let mut sequencer = powered();
    let buffer = SampleBuffer::with_capacity(64);

    sequencer
        .measure(Direction::East, &waveform(50), &buffer, 64)
        .unwrap();

    assert_eq!(
        sequencer.hardware().events(),
        &[
            Event::Lines(High, Low),
            Event::Delay(10),
            Event::CriticalEnter,
            Event::PulseStart { len: 50 },
            Event::SampleStart { len: 64 },
            Event::CriticalExit,
        ]
    );
    assert_eq!(sequencer.activity(), Activity::TransmitAndSampleBusy);

    let hw = sequencer.hardware_mut();
    assert!(hw.complete_pulse());
    assert_eq!(sequencer.activity(), Activity::SampleBusy);
    assert!(sequencer.is_busy());

    sequencer.hardware_mut().complete_sampling();
    assert_eq!(sequencer.activity(), Activity::Idle);
    assert_eq!(buffer.len(), 64);
}

#[test]
fn second_measure_in_flight_is_busy() {
    let mut sequencer = powered();
    let first = SampleBuffer::with_capacity(64);
    let second = SampleBuffer::with_capacity(64);

    sequencer
        .measure(Direction::East, &waveform(50), &first, 64)
        .unwrap();
    sequencer.hardware_mut().clear_events();

    let err = sequencer
        .measure(Direction::West, &waveform(50), &second, 64)
        .unwrap_err();
    assert!(matches!(err, SequencerError::Busy(Channel::Pulse)));

    // rejected before anything moved
    assert!(sequencer.hardware().events().is_empty());
    assert_eq!(sequencer.active_direction(), Some(Direction::East));
    assert!(!second.is_lent());

    // once the pulse is done the fill still blocks a new measurement
    sequencer.hardware_mut().complete_pulse();
    let err = sequencer
        .measure(Direction::West, &waveform(50), &second, 64)
        .unwrap_err();
    assert!(matches!(err, SequencerError::Busy(Channel::Sample)));

    sequencer.hardware_mut().complete_sampling();
    sequencer
        .measure(Direction::West, &waveform(50), &second, 64)
        .unwrap();
}

#[test]
fn listen_while_sampling_is_busy() {
    let mut sequencer = powered();
    let buffer = SampleBuffer::with_capacity(32);

    sequencer.listen(Direction::East, &buffer, 32).unwrap();
    assert!(matches!(
        sequencer.listen(Direction::North, &SampleBuffer::with_capacity(32), 32),
        Err(SequencerError::Busy(Channel::Sample))
    ));
    assert_eq!(sequencer.active_direction(), Some(Direction::West));
}

#[test]
fn listen_waits_for_pulse_to_finish() {
    let mut sequencer = powered();
    let measured = SampleBuffer::with_capacity(8);
    let listened = SampleBuffer::with_capacity(8);

    // a short fill completes while the long pulse is still playing
    sequencer
        .measure(Direction::East, &waveform(50), &measured, 8)
        .unwrap();
    sequencer.hardware_mut().complete_sampling();
    assert_eq!(sequencer.activity(), Activity::TransmitBusy);
    sequencer.hardware_mut().clear_events();

    assert!(matches!(
        sequencer.listen(Direction::North, &listened, 8),
        Err(SequencerError::Busy(Channel::Pulse))
    ));
    assert!(sequencer.hardware().events().is_empty());
    assert_eq!(sequencer.hardware().lines(), (High, Low));
    assert!(!listened.is_lent());
    assert!(sequencer.hardware().pulse_pending());

    sequencer.hardware_mut().complete_pulse();
    sequencer.listen(Direction::North, &listened, 8).unwrap();
    assert_eq!(sequencer.hardware().lines(), (Low, High));
}

#[test]
fn sampling_start_failure_lets_pulse_finish() {
    let mut sequencer = powered();
    let buffer = SampleBuffer::with_capacity(16);
    sequencer.hardware_mut().deinit_converter();

    let err = sequencer
        .measure(Direction::South, &waveform(8), &buffer, 16)
        .unwrap_err();
    assert!(matches!(
        err,
        SequencerError::Hardware(HardwareError::NotReady("converter"))
    ));

    // the pulse already started and plays to its end
    assert_eq!(sequencer.activity(), Activity::TransmitBusy);
    assert!(sequencer.hardware().pulse_pending());
    assert!(!sequencer.hardware().sampling_pending());
    assert!(!buffer.is_lent());

    assert!(sequencer.hardware_mut().complete_pulse());
    assert_eq!(sequencer.activity(), Activity::Idle);
}

#[test]
fn lent_buffer_cannot_be_reused() {
    let mut a = powered();
    let mut b = powered();
    let shared = SampleBuffer::with_capacity(32);

    a.listen(Direction::North, &shared, 32).unwrap();
    assert!(matches!(
        b.listen(Direction::North, &shared, 32),
        Err(SequencerError::BufferLent)
    ));
    assert!(b.hardware().events().is_empty());

    a.hardware_mut().complete_sampling();
    b.listen(Direction::North, &shared, 32).unwrap();
}

#[rstest::rstest]
#[case(0)]
#[case(65)]
fn invalid_length_is_rejected(#[case] length: usize) {
    let mut sequencer = powered();
    let buffer = SampleBuffer::with_capacity(64);

    assert!(matches!(
        sequencer.listen(Direction::North, &buffer, length),
        Err(SequencerError::InvalidLength { capacity: 64, .. })
    ));
    assert!(matches!(
        sequencer.measure(Direction::North, &waveform(4), &buffer, length),
        Err(SequencerError::InvalidLength { capacity: 64, .. })
    ));
    assert!(sequencer.hardware().events().is_empty());
    assert!(!sequencer.is_busy());
}

#[test]
fn sequencing_requires_power() {
    let mut sequencer = MeasurementSequencer::new(SimulatedContext::new(), SequencerConfig::default());
    let buffer = SampleBuffer::with_capacity(8);

    assert!(matches!(
        sequencer.listen(Direction::North, &buffer, 8),
        Err(SequencerError::PoweredOff)
    ));
    assert!(matches!(
        sequencer.measure(Direction::North, &waveform(4), &buffer, 8),
        Err(SequencerError::PoweredOff)
    ));
    assert!(sequencer.hardware().events().is_empty());
}

#[test]
fn settle_delay_follows_config() {
    let config = SequencerConfig {
        settle_ticks: 25,
        ..SequencerConfig::default()
    };
    let mut sequencer = MeasurementSequencer::new(SimulatedContext::new(), config);
    sequencer.power_enable(FREQUENCY).unwrap();
    sequencer.hardware_mut().clear_events();

    let buffer = SampleBuffer::with_capacity(8);
    sequencer.listen(Direction::West, &buffer, 8).unwrap();
    assert_eq!(sequencer.hardware().events()[1], Event::Delay(25));
}

#[test]
fn auto_completion_after_post_measure_wait() {
    let hw = SimulatedContext::new().with_auto_complete();
    let mut sequencer = MeasurementSequencer::new(hw, SequencerConfig::default());
    sequencer.power_enable(FREQUENCY).unwrap();

    let buffer = SampleBuffer::with_capacity(16);
    sequencer
        .measure(Direction::South, &waveform(8), &buffer, 16)
        .unwrap();
    // the settle delay ran before the transfers started
    assert!(sequencer.is_busy());

    let ticks = sequencer.config().post_measure_ticks;
    sequencer.wait_ticks(ticks);
    assert!(!sequencer.is_busy());
    assert_eq!(buffer.samples().unwrap(), vec![2048; 16]);
}
