mod support;

use stim_core::engagement::EngagementThresholds;
use stim_core::engine::PulseEngine;
use stim_core::feedback::raw_for_current;
use stim_core::resolver::{PulseSequenceConfig, resolve};
use stim_core::schedule::{Stimulator, TickOutcome};

use support::{RecordingActuator, RecordingHold, ScriptedSensor, Trace, TraceLog, trace_log};

type TestStimulator = Stimulator<RecordingActuator, ScriptedSensor, RecordingHold>;

fn build(log: &TraceLog, actuator: RecordingActuator, script: &[u16]) -> TestStimulator {
    let engine = PulseEngine::new(
        actuator,
        ScriptedSensor::new(log.clone(), script.iter().copied()),
        RecordingHold::new(log.clone()),
    );
    log.borrow_mut().clear();
    Stimulator::new(engine, EngagementThresholds::default())
}

fn full_scale_run(cfg: &PulseSequenceConfig, raw: u16) -> Vec<Trace> {
    let delays = cfg.delays();
    let mut trace = vec![
        Trace::Commit(64),
        Trace::Hold(delays.hold_before.count()),
        Trace::Commit(127),
        Trace::Sample(raw),
        Trace::Hold(delays.phase1.count()),
        Trace::Commit(64),
        Trace::Hold(delays.phase2.count()),
    ];
    if !delays.phase3.is_zero() {
        trace.push(Trace::Commit(1));
        trace.push(Trace::Hold(delays.phase3.count()));
    }
    trace.push(Trace::Commit(64));
    trace
}

#[test]
fn divider_of_three_pulses_on_every_third_tick() {
    let log = trace_log();
    let cfg = resolve(1, 2, 3, 3300).expect("valid selection");
    let mut stim = build(&log, RecordingActuator::new(log.clone()), &[1500]);

    let mut executed_on = Vec::new();
    for tick in 1..=9 {
        let before = log.borrow().len();
        let outcome = stim.on_tick(&cfg);
        if outcome.is_executed() {
            executed_on.push(tick);
        } else {
            assert_eq!(outcome, TickOutcome::Skipped);
            assert_eq!(log.borrow().len(), before, "skipped tick {tick} touched hardware");
        }
    }

    assert_eq!(executed_on, vec![3, 6, 9]);
    let samples = log
        .borrow()
        .iter()
        .filter(|entry| matches!(entry, Trace::Sample(_)))
        .count();
    assert_eq!(samples, 3);
}

#[test]
fn double_pulse_reports_second_readout() {
    let log = trace_log();
    let cfg = resolve(2, 2, 3, 3300).expect("valid selection");
    let first = raw_for_current(5);
    let second = raw_for_current(30);
    let mut stim = build(&log, RecordingActuator::new(log.clone()), &[first, second]);

    stim.on_tick(&cfg);
    stim.on_tick(&cfg);
    log.borrow_mut().clear();

    let outcome = stim.on_tick(&cfg);
    let TickOutcome::Executed { readout, pulses, .. } = outcome else {
        panic!("third tick must execute: {outcome:?}");
    };
    assert_eq!(pulses, 2);
    assert_eq!(readout.current(), 30);
    assert_eq!(stim.readout().current(), 30);

    let mut expected = full_scale_run(&cfg, first);
    expected.push(Trace::Commit(64));
    expected.push(Trace::Hold(cfg.gap().count()));
    expected.extend(full_scale_run(&cfg, second));
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn monophasic_profile_never_drives_negative() {
    for frequency in 1..=3 {
        for peak in 1..=3 {
            for battery in [1, 2500, 3300, 4200] {
                let log = trace_log();
                let cfg = resolve(frequency, 1, peak, battery).expect("valid selection");
                let mut stim = build(&log, RecordingActuator::new(log.clone()), &[2000]);
                for _ in 0..12 {
                    stim.on_tick(&cfg);
                }
                let negative = log
                    .borrow()
                    .iter()
                    .any(|entry| matches!(entry, Trace::Commit(word) if *word < 64));
                assert!(
                    !negative,
                    "profile 1 went negative at freq {frequency} peak {peak} battery {battery}"
                );
            }
        }
    }
}

#[test]
fn dropped_write_is_healed_by_next_phase() {
    let log = trace_log();
    let cfg = resolve(3, 4, 3, 3300).expect("valid selection");
    // Write 5 is the first negative phase; write 10 the second.
    let actuator = RecordingActuator::dropping_every(log.clone(), 5);
    let mut stim = build(&log, actuator, &[raw_for_current(12)]);

    for _ in 0..2 {
        let outcome = stim.on_tick(&cfg);
        assert!(outcome.is_executed());
        assert_eq!(stim.engine().actuator().applied, 64);
    }
    assert_eq!(stim.readout().current(), 12);

    let commits = log
        .borrow()
        .iter()
        .filter(|entry| matches!(entry, Trace::Commit(_)))
        .count();
    assert_eq!(commits, 10);
}
