use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crossterm::style::{StyledContent, Stylize};
use stim_core::encoder::NoopActuator;
use stim_core::engagement::{EngagementState, EngagementThresholds, Transition};
use stim_core::engine::{NoopHold, PulseEngine};
use stim_core::feedback::RampFeedback;
use stim_core::resolver::{NOMINAL_BATTERY_MV, PulseSequenceConfig};
use stim_core::schedule::{Stimulator, TICK_RATE_HZ, TickOutcome};
use stim_core::settings::{MemorySettingsStore, SettingKey, Settings, SettingsStore};
use stim_core::status::StatusSnapshot;
use stim_core::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};

const TICK_PERIOD_MICROS: u32 = 1_000_000 / TICK_RATE_HZ;
/// Upper bound for a single `run` so a typo cannot stall the prompt.
const MAX_RUN_TICKS: u32 = 10 * TICK_RATE_HZ * 60;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "status",
        "status                          - show engagement, feedback and config",
    ),
    (
        "set",
        "set <frequency|sequence|peak> <n> - change a selection (0 restores default)",
    ),
    (
        "battery",
        "battery <mV>                    - set the simulated battery voltage",
    ),
    (
        "run",
        "run <ticks>                     - advance the tick clock",
    ),
    (
        "events",
        "events                          - list recorded telemetry",
    ),
    (
        "help",
        "help [topic]                    - show help for a command",
    ),
];

/// Simulated time in microseconds since the session started.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub fn as_millis_f32(self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let micros = self.0 as f32;
        micros / 1000.0
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

type SimStimulator = Stimulator<NoopActuator, RampFeedback, NoopHold>;

pub struct Session {
    stimulator: SimStimulator,
    store: MemorySettingsStore,
    battery_mv: u16,
    config: Option<PulseSequenceConfig>,
    telemetry: TelemetryRecorder<SimInstant>,
    now: SimInstant,
}

impl Session {
    pub fn new() -> Self {
        let thresholds = EngagementThresholds::default();
        let engine = PulseEngine::new(NoopActuator::new(), RampFeedback::new(thresholds.run), NoopHold);
        let mut session = Self {
            stimulator: Stimulator::new(engine, thresholds),
            store: MemorySettingsStore::new(),
            battery_mv: NOMINAL_BATTERY_MV,
            config: None,
            telemetry: TelemetryRecorder::new(),
            now: SimInstant::default(),
        };
        session.apply_settings();
        session
    }

    /// Serves commands line by line until `exit`, `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> io::Result<()> {
        writeln!(
            output,
            "STiM32 emulator, simulated feedback at {TICK_RATE_HZ} Hz ticks. `help` lists commands."
        )?;

        let mut line = String::new();
        loop {
            output.write_all(b"> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return writeln!(output);
            }
            let command = line.trim();
            if matches!(command.to_ascii_lowercase().as_str(), "exit" | "quit") {
                return writeln!(output, "Session closed.");
            }
            for response in self.handle_command(command) {
                writeln!(output, "{response}")?;
            }
        }
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Vec::new();
        };
        let args: Vec<&str> = words.collect();

        match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("help", []) => help_lines(None),
            ("help", [topic]) => help_lines(Some(*topic)),
            ("status", []) => vec![self.status_line()],
            ("set", [key, value]) => self.handle_set(key, value),
            ("battery", [value]) => self.handle_battery(value),
            ("run", [ticks]) => self.handle_run(ticks),
            ("events", []) => self.event_lines(),
            _ => vec![format!("ERR unknown command `{line}`; type `help`")],
        }
    }

    pub fn state(&self) -> EngagementState {
        self.stimulator.state()
    }

    pub fn config(&self) -> Option<&PulseSequenceConfig> {
        self.config.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<SimInstant> {
        &self.telemetry
    }

    fn status_line(&self) -> String {
        let snapshot = StatusSnapshot::new(
            self.stimulator.state(),
            self.stimulator.readout(),
            self.config.as_ref(),
            self.battery_mv,
        );
        format!("{} {snapshot}", state_badge(snapshot.state))
    }

    fn handle_set(&mut self, key: &str, value: &str) -> Vec<String> {
        let Some(key) = parse_key(key) else {
            return vec![format!("ERR unknown setting `{key}`")];
        };
        let Ok(value) = value.parse::<u8>() else {
            return vec![format!("ERR `{value}` is not a number")];
        };
        if let Err(err) = self.store.set(key, value) {
            return vec![format!("ERR {err}")];
        }
        vec![self.apply_settings()]
    }

    fn handle_battery(&mut self, value: &str) -> Vec<String> {
        let Ok(battery_mv) = value.parse::<u16>() else {
            return vec![format!("ERR `{value}` is not a voltage in mV")];
        };
        self.battery_mv = battery_mv;
        vec![self.apply_settings()]
    }

    fn handle_run(&mut self, ticks: &str) -> Vec<String> {
        let ticks = match ticks.parse::<u32>() {
            Ok(ticks) if ticks <= MAX_RUN_TICKS => ticks,
            _ => return vec![format!("ERR tick count must be 0..={MAX_RUN_TICKS}")],
        };

        let mut lines = Vec::new();
        let mut executed = 0u32;
        let mut pulses = 0u32;
        for _ in 0..ticks {
            self.now = SimInstant(self.now.0 + u64::from(TICK_PERIOD_MICROS));
            let Some(cfg) = self.config else {
                continue;
            };
            let outcome = self.stimulator.on_tick(&cfg);
            self.telemetry.observe_tick(&outcome, self.now);
            if let TickOutcome::Executed {
                pulses: count,
                transition,
                ..
            } = outcome
            {
                executed += 1;
                pulses += u32::from(count);
                if let Some(transition) = transition {
                    lines.push(transition_line(transition, self.now));
                }
            }
        }

        let mut summary = format!("ran {ticks} ticks: {executed} executed, {pulses} pulses");
        if self.config.is_none() {
            summary.push_str(" (no config, output parked)");
        }
        lines.push(summary);
        lines.push(self.status_line());
        lines
    }

    fn event_lines(&self) -> Vec<String> {
        if self.telemetry.is_empty() {
            return vec!["no events recorded".to_string()];
        }
        self.telemetry
            .oldest_first()
            .map(|record| {
                let mut line = format!(
                    "#{:<4} +{:>10.3} ms  {}",
                    record.id,
                    record.timestamp.as_millis_f32(),
                    record.event
                );
                if let Some(dwell) = record.dwell {
                    let _ = write!(line, " (after {dwell:?})");
                }
                line
            })
            .collect()
    }

    /// Resolves the stored selection against the battery and publishes it.
    /// A rejected selection leaves the previous config live.
    fn apply_settings(&mut self) -> String {
        let settings = Settings::load(&self.store);
        match settings.resolve(self.battery_mv) {
            Ok(cfg) => {
                self.config = Some(cfg);
                self.telemetry
                    .record(TelemetryEventKind::ConfigApplied(cfg.selection()), self.now);
                format!(
                    "OK {} scale={} divider={}",
                    cfg.selection(),
                    cfg.scale(),
                    cfg.divider()
                )
            }
            Err(err) => {
                self.telemetry
                    .record(TelemetryEventKind::ConfigRejected(err), self.now);
                let kept = if self.config.is_some() {
                    "keeping previous config"
                } else {
                    "output stays parked"
                };
                format!("ERR {err}; {kept}")
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_key(word: &str) -> Option<SettingKey> {
    SettingKey::ALL
        .iter()
        .copied()
        .find(|key| key.as_str().eq_ignore_ascii_case(word))
}

/// Colours a state the way the board LEDs show it.
fn styled_state(state: EngagementState) -> StyledContent<&'static str> {
    let label = state.as_str();
    match state.indicator() {
        Some(indicator) if indicator.green => label.green(),
        Some(_) => label.red(),
        None => label.yellow(),
    }
}

fn state_badge(state: EngagementState) -> String {
    format!("[{}]", styled_state(state))
}

fn transition_line(transition: Transition, at: SimInstant) -> String {
    format!(
        "+{:.3} ms  {} -> {}",
        at.as_millis_f32(),
        styled_state(transition.from),
        styled_state(transition.to)
    )
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => {
            let mut lines = vec!["Commands:".to_string()];
            lines.extend(HELP_TOPICS.iter().map(|(_, usage)| format!("  {usage}")));
            lines.push("  exit                            - leave the emulator".to_string());
            lines
        }
        Some(topic) => HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(topic))
            .map_or_else(
                || vec![format!("ERR no help for `{topic}`")],
                |(_, usage)| vec![(*usage).to_string()],
            ),
    }
}
