//! Storage types.
//!
//! The pieces shared between the writer and the things it drives: the sector
//! layout of a device, the capability interface onto the flash controller, and
//! the handful of errors these can produce.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod devices;
mod map;

pub use map::{uniform_ends, SectorMap};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The address does not fall in any sector of the map.
    OutOfBounds,
    /// Read back data did not match what was programmed.
    Mismatch,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Two-word sequence that unlocks the flash controller.
pub const UNLOCK_KEYS: [u32; 2] = [0x4567_0123, 0xCDEF_89AB];

/// Errors the controller reports through its status flags.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramError {
    Alignment,
    Protection,
    Parallelism,
    Sequence,
}

/// Operating mode of the controller between operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Idle,
    /// Half-word programming.
    Program,
}

/// Raw access to a flash program/erase controller.
///
/// Each method maps onto a register access on the real device.  Sequencing
/// (unlocking, waiting for the busy flag, checking for errors) is left to the
/// caller.
pub trait FlashController {
    fn is_locked(&self) -> bool;
    /// Write one word of the unlock sequence.
    fn write_key(&mut self, key: u32);
    /// Reset the configuration and lock the controller.
    fn lock(&mut self);
    /// Clear the end-of-operation and error flags.
    fn clear_status(&mut self);
    /// Clear only the end-of-operation flag, leaving any error flags set.
    fn clear_end_of_operation(&mut self);
    fn set_mode(&mut self, mode: Mode);

    fn is_busy(&mut self) -> bool;
    /// Return, and clear, the first pending error flag.
    fn take_error(&mut self) -> Option<ProgramError>;

    /// Start erasing the sector with the given index.
    fn erase_sector(&mut self, index: usize);
    /// Start programming one half-word.  The controller must be in
    /// [`Mode::Program`].
    fn program_halfword(&mut self, address: usize, value: u16);

    fn read(&mut self, address: usize, bytes: &mut [u8]) -> Result<()>;
}

/// Conditions after which the controller can no longer be trusted.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fatal {
    Program(ProgramError),
    BusyTimeout,
}

/// Halt.  The flash is in an unknown state, and carrying on with an upgrade
/// could leave a device that cannot boot.
#[cold]
#[inline(never)]
pub fn fatal(reason: Fatal) -> ! {
    panic!("flash controller failure: {:?}", reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "BusyTimeout")]
    fn fatal_panics() {
        fatal(Fatal::BusyTimeout);
    }
}
