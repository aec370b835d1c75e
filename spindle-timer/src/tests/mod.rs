mod smoke;

use spindle_executor::park::{Park, ParkMode, Unpark};

use crate::Clock;

/// A [`Park`] that fast-forwards a simulated clock instead of sleeping.
///
/// Timeouts advance the clock by `step(timeout)`, so tests exercise both
/// exact and partial advances.
pub(crate) struct FastPark {
    clock: Clock,
    step: fn(std::time::Duration) -> std::time::Duration,
}

impl FastPark {
    pub(crate) fn halving(clock: Clock) -> Self {
        Self {
            clock,
            step: |d| d / 2,
        }
    }

    pub(crate) fn exact(clock: Clock) -> Self {
        Self { clock, step: |d| d }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Unparker;

impl Unpark for Unparker {
    fn unpark(&self) {}
}

impl Park for FastPark {
    type Unparker = Unparker;

    type Guard = ();

    fn park(&mut self, mode: ParkMode) -> Result<(), std::io::Error> {
        match mode {
            ParkMode::NoPark | ParkMode::NextCompletion => Ok(()),
            ParkMode::Timeout(duration) => {
                self.clock.advance((self.step)(duration));
                Ok(())
            }
        }
    }

    fn enter(&self) -> Self::Guard {}

    fn unparker(&self) -> Self::Unparker {
        Unparker
    }

    fn needs_park(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}
