//! Countdown timer state machine used by the Countdown screen.
//!
//! `idle --start--> running --pause--> paused --start--> running`, and `stop`
//! from anywhere cancels the periodic timer. Each timer firing consumes one slot
//! of the precomputed tick schedule; slot 0 is never used.

use std::fmt;
use std::time::{Duration, Instant};

use crate::registry::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Big,
    Little,
}

impl TickKind {
    /// Base tone as (Hz, ms).
    pub fn tone(self) -> (u32, u64) {
        match self {
            TickKind::Big => (1720, 100),
            TickKind::Little => (880, 100),
        }
    }

    pub fn symbol(slot: Option<TickKind>) -> char {
        match slot {
            Some(TickKind::Big) => 'b',
            Some(TickKind::Little) => 'l',
            None => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
        })
    }
}

/// Longest schedule a `reset` may ask for; every slot is drawn each frame.
pub const MAX_TICKS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownConfig {
    pub total_ticks: u32,
    pub big_tick_every: u32,
    pub tick_interval_secs: u32,
    pub final_stretch: u32,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            total_ticks: 60,
            big_tick_every: 5,
            tick_interval_secs: 1,
            final_stretch: 10,
        }
    }
}

impl CountdownConfig {
    /// The final stretch defaults to two big-tick periods.
    pub fn new(
        total_ticks: u32,
        big_tick_every: u32,
        tick_interval_secs: u32,
        final_stretch: Option<u32>,
    ) -> Result<Self, CommandError> {
        for (name, value) in [
            ("total_ticks", total_ticks),
            ("big_tick_every", big_tick_every),
            ("tick_interval_secs", tick_interval_secs),
        ] {
            if value == 0 {
                return Err(CommandError::InvalidArgument {
                    name,
                    value: value.to_string(),
                    reason: "must be at least 1".into(),
                });
            }
        }
        if total_ticks > MAX_TICKS {
            return Err(CommandError::InvalidArgument {
                name: "total_ticks",
                value: total_ticks.to_string(),
                reason: format!("at most {MAX_TICKS} ticks"),
            });
        }
        Ok(Self {
            total_ticks,
            big_tick_every,
            tick_interval_secs,
            final_stretch: final_stretch.unwrap_or(big_tick_every.saturating_mul(2)),
        })
    }

    pub fn schedule(&self) -> Vec<Option<TickKind>> {
        std::iter::once(None)
            .chain((1..=self.total_ticks).map(|index| {
                Some(if index % self.big_tick_every == 0 {
                    TickKind::Big
                } else {
                    TickKind::Little
                })
            }))
            .collect()
    }

    pub fn in_final_stretch(&self, index: u32) -> bool {
        i64::from(index) > i64::from(self.total_ticks) - i64::from(self.final_stretch)
    }

    /// Tone for a slot, pitched up in the second half and more so at the end.
    pub fn tone_for(&self, kind: TickKind, index: u32) -> (u32, u64) {
        let (frequency, millis) = kind.tone();
        let factor = if self.in_final_stretch(index) {
            1.1
        } else if index > self.total_ticks / 2 {
            1.05
        } else {
            1.0
        };
        ((f64::from(frequency) * factor) as u32, millis)
    }
}

/// Fires at a fixed interval once armed, like a repeating OS timer.
#[derive(Debug, Clone, Default)]
pub struct PeriodicTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PeriodicTimer {
    pub fn arm(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.next_due = Some(now + interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// True once per elapsed interval. A loop that fell far behind gets one
    /// firing, not a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let next = due + self.interval;
                self.next_due = Some(if next > now { next } else { now + self.interval });
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, or already past the last slot.
    Ignored,
    Advanced { tone: Option<(u32, u64)> },
    /// The last slot was consumed; the caller must stop and then finish.
    Finished { tone: Option<(u32, u64)> },
}

/// Read-only view of the tick state for renderers and queries.
#[derive(Debug, Clone, Copy)]
pub struct TickState<'a> {
    pub config: CountdownConfig,
    pub current_tick: u32,
    pub schedule: &'a [Option<TickKind>],
    pub state: RunState,
}

impl TickState<'_> {
    /// Unconsumed slots left.
    pub fn remaining(&self) -> u32 {
        (self.config.total_ticks + 1).saturating_sub(self.current_tick)
    }

    pub fn current(&self) -> Option<TickKind> {
        self.schedule.get(self.current_tick as usize).copied().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct CountdownEngine {
    config: CountdownConfig,
    current_tick: u32,
    schedule: Vec<Option<TickKind>>,
    state: RunState,
    timer: PeriodicTimer,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new(CountdownConfig::default())
    }
}

impl CountdownEngine {
    pub fn new(config: CountdownConfig) -> Self {
        Self {
            config,
            current_tick: 1,
            schedule: config.schedule(),
            state: RunState::Idle,
            timer: PeriodicTimer::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_tick > self.config.total_ticks
    }

    pub fn ticks(&self) -> TickState<'_> {
        TickState {
            config: self.config,
            current_tick: self.current_tick,
            schedule: &self.schedule,
            state: self.state,
        }
    }

    /// Rebuilds the schedule and returns to idle, cancelling any timer.
    pub fn reset(&mut self, config: CountdownConfig) {
        *self = Self::new(config);
    }

    /// Returns false when there is nothing left to count.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.state = RunState::Running;
        let interval = Duration::from_secs(u64::from(self.config.tick_interval_secs));
        self.timer.arm(interval, now);
        true
    }

    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
        self.state = RunState::Stopped;
    }

    pub fn timer_due(&mut self, now: Instant) -> bool {
        self.timer.poll(now)
    }

    #[cfg(test)]
    pub fn timer_armed(&self) -> bool {
        self.timer.next_due.is_some()
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() || self.is_exhausted() {
            return TickOutcome::Ignored;
        }
        let index = self.current_tick;
        let tone = self
            .schedule
            .get_mut(index as usize)
            .and_then(Option::take)
            .map(|kind| self.config.tone_for(kind, index));
        self.current_tick += 1;
        if self.is_exhausted() {
            TickOutcome::Finished { tone }
        } else {
            TickOutcome::Advanced { tone }
        }
    }
}
