#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use stim_core::encoder::{ControlWord, OutputActuator};
use stim_core::engine::{DelayUnits, Hold};
use stim_core::feedback::CurrentSensor;

/// Everything the output channel did, in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    Commit(u8),
    Sample(u16),
    Hold(u32),
}

pub type TraceLog = Rc<RefCell<Vec<Trace>>>;

pub fn trace_log() -> TraceLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Actuator that logs each committed word; can drop selected writes.
pub struct RecordingActuator {
    log: TraceLog,
    drop_every: Option<usize>,
    writes: usize,
    /// Word the actuator actually holds after dropped writes.
    pub applied: u8,
}

impl RecordingActuator {
    pub fn new(log: TraceLog) -> Self {
        Self {
            log,
            drop_every: None,
            writes: 0,
            applied: 0,
        }
    }

    /// Every `n`th write is lost on the wire and leaves `applied` unchanged.
    pub fn dropping_every(log: TraceLog, n: usize) -> Self {
        Self {
            drop_every: Some(n),
            ..Self::new(log)
        }
    }
}

impl OutputActuator for RecordingActuator {
    fn commit(&mut self, word: ControlWord) {
        self.writes += 1;
        self.log.borrow_mut().push(Trace::Commit(word.value()));
        let dropped = self.drop_every.is_some_and(|n| self.writes % n == 0);
        if !dropped {
            self.applied = word.value();
        }
    }
}

/// Sensor that replays scripted raw samples, repeating the last one.
pub struct ScriptedSensor {
    log: TraceLog,
    script: VecDeque<u16>,
    last: u16,
}

impl ScriptedSensor {
    pub fn new(log: TraceLog, script: impl IntoIterator<Item = u16>) -> Self {
        Self {
            log,
            script: script.into_iter().collect(),
            last: 0,
        }
    }
}

impl CurrentSensor for ScriptedSensor {
    fn sample(&mut self) -> u16 {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.log.borrow_mut().push(Trace::Sample(self.last));
        self.last
    }
}

pub struct RecordingHold {
    log: TraceLog,
}

impl RecordingHold {
    pub fn new(log: TraceLog) -> Self {
        Self { log }
    }
}

impl Hold for RecordingHold {
    fn hold(&mut self, units: DelayUnits) {
        self.log.borrow_mut().push(Trace::Hold(units.count()));
    }
}
