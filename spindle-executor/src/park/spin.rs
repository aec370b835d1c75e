use std::io;

use super::{Park, ParkMode, Unpark};

/// A [`Park`] which never blocks.
///
/// Every park returns immediately, turning the reactor into a busy loop.
/// Useful for tests and for stacking under layers that own all the work.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinPark;

impl Unpark for SpinPark {
    fn unpark(&self) {}
}

impl Park for SpinPark {
    type Unparker = SpinPark;
    type Guard = ();

    fn park(&mut self, _: ParkMode) -> Result<(), io::Error> {
        std::hint::spin_loop();
        Ok(())
    }

    fn enter(&self) -> Self::Guard {}

    fn unparker(&self) -> Self::Unparker {
        SpinPark
    }

    fn needs_park(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}
