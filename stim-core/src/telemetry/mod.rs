//! Telemetry ring shared by firmware and host targets.
//!
//! The tick path reports what happened as values; this module turns those
//! into timestamped records in a fixed-size history. Only the newest
//! [`TELEMETRY_RING_CAPACITY`] records are kept.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::engagement::EngagementState;
use crate::resolver::{ResolveError, Selection};
use crate::schedule::TickOutcome;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    EngagementChanged {
        from: EngagementState,
        to: EngagementState,
    },
    OverloadAsserted,
    OverloadCleared,
    ConfigApplied(Selection),
    ConfigRejected(ResolveError),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::EngagementChanged { from, to } => {
                write!(f, "engagement {from} -> {to}")
            }
            TelemetryEventKind::OverloadAsserted => f.write_str("overload-asserted"),
            TelemetryEventKind::OverloadCleared => f.write_str("overload-cleared"),
            TelemetryEventKind::ConfigApplied(selection) => write!(f, "config-applied {selection}"),
            TelemetryEventKind::ConfigRejected(error) => write!(f, "config-rejected: {error}"),
        }
    }
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    /// Time spent in the previous engagement state, for engagement changes
    /// after the first.
    pub dwell: Option<Duration>,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    overload_active: bool,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            overload_active: false,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn overload_active(&self) -> bool {
        self.overload_active
    }

    /// Records the transition and overload edge carried by one tick.
    ///
    /// Skipped ticks record nothing. Returns the number of records written.
    pub fn observe_tick(&mut self, outcome: &TickOutcome, timestamp: TInstant) -> usize {
        let TickOutcome::Executed {
            readout, transition, ..
        } = *outcome
        else {
            return 0;
        };

        let mut written = 0;
        if readout.overload() != self.overload_active {
            self.overload_active = readout.overload();
            let event = if self.overload_active {
                TelemetryEventKind::OverloadAsserted
            } else {
                TelemetryEventKind::OverloadCleared
            };
            self.record(event, timestamp);
            written += 1;
        }

        if let Some(transition) = transition {
            self.record_engagement(transition.from, transition.to, timestamp);
            written += 1;
        }
        written
    }

    /// Records an engagement change with the dwell time in the previous state.
    pub fn record_engagement(
        &mut self,
        from: EngagementState,
        to: EngagementState,
        timestamp: TInstant,
    ) -> EventId {
        let dwell = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);
        self.push(
            TelemetryEventKind::EngagementChanged { from, to },
            dwell,
            timestamp,
        )
    }

    /// Records an event that carries no dwell time.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        self.push(event, None, timestamp)
    }

    fn push(
        &mut self,
        event: TelemetryEventKind,
        dwell: Option<Duration>,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            dwell,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
