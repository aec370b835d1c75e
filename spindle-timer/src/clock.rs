use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A clock for tracking time.
///
/// Time inside the timer driver is measured in millisecond ticks since the
/// clock was created.
#[derive(Debug, Clone)]
pub struct Clock {
    start: Instant,
    time: TimeSource,
}

impl Clock {
    /// Create a new system clock.
    ///
    /// The system clock will start with the current system time.
    pub fn system() -> Self {
        Self {
            start: Instant::now(),
            time: TimeSource::System,
        }
    }

    /// Create a new simulated clock.
    ///
    /// The simulated clock will start with frozen time.
    /// Time can be advanced by calling [`Clock::advance`].
    pub fn simulated() -> Self {
        Self {
            start: Instant::now(),
            time: TimeSource::Simulated {
                offset: Rc::new(Cell::new(Duration::from_secs(0))),
            },
        }
    }

    /// Returns true if this clock was created with [`Clock::simulated`].
    pub fn is_simulated(&self) -> bool {
        matches!(self.time, TimeSource::Simulated { .. })
    }

    /// Convert the provided instant to a tick which can be used inside the time driver.
    fn instant_to_tick(&self, t: Instant) -> u64 {
        let dur: Duration = t
            .checked_duration_since(self.start)
            .unwrap_or_else(|| Duration::from_secs(0));
        Self::saturating_millis(dur)
    }

    fn saturating_millis(dur: Duration) -> u64 {
        dur.as_millis().try_into().unwrap_or(u64::MAX)
    }

    /// Convert a tick to a duration value.
    pub(crate) fn tick_to_duration(&self, t: u64) -> Duration {
        Duration::from_millis(t)
    }

    /// Convert a duration to ticks, rounding up to the next whole tick.
    pub(crate) fn duration_to_ticks(&self, d: Duration) -> u64 {
        let ticks = Self::saturating_millis(d);
        if Duration::from_millis(ticks) < d {
            ticks.saturating_add(1)
        } else {
            ticks
        }
    }

    /// Return the current tick.
    pub(crate) fn tick(&self) -> u64 {
        match &self.time {
            TimeSource::System => self.instant_to_tick(Instant::now()),
            TimeSource::Simulated { offset } => Self::saturating_millis(offset.get()),
        }
    }

    /// Return the base tick and the tick count a timer for `after` is
    /// registered with.
    ///
    /// A partially elapsed tick counts as a whole one, so the deadline
    /// `base + ticks` is never reached before `after` has passed.
    /// [`Clock::tick`] rounds down and is what the driver advances with.
    /// Zero durations use the rounded down tick and fire on the next advance.
    pub(crate) fn registration(&self, after: Duration) -> (u64, u64) {
        let ticks = self.duration_to_ticks(after);
        if ticks == 0 {
            return (self.tick(), 0);
        }
        let elapsed = match &self.time {
            TimeSource::System => Instant::now()
                .checked_duration_since(self.start)
                .unwrap_or(Duration::ZERO),
            TimeSource::Simulated { offset } => offset.get(),
        };
        (self.duration_to_ticks(elapsed), ticks)
    }

    /// Return the current instant.
    pub fn now(&self) -> Instant {
        match &self.time {
            TimeSource::System => Instant::now(),
            TimeSource::Simulated { offset } => {
                let offset = offset.get();
                self.start + offset
            }
        }
    }

    /// Advance simulated time.
    ///
    /// ### Panics
    /// Panics if called on a system clock created with [`Clock::system`].
    pub fn advance(&self, duration: Duration) {
        match &self.time {
            TimeSource::System => panic!("Cannot advance system clock"),
            TimeSource::Simulated { offset } => {
                offset.set(offset.get() + duration);
            }
        }
    }
}

#[derive(Debug, Clone)]
enum TimeSource {
    System,
    Simulated { offset: Rc<Cell<Duration>> },
}
