//! Firmware image storage for the bootloader.
//!
//! The bootloader receives a new application in pieces, in order, from
//! whichever transport is in use.  This crate puts those pieces into flash:
//! [`SequentialRomWriter`] erases each sector the first time it is reached,
//! programs the data and verifies it, and [`RomBackend`] adapts it to the
//! offset-based interface the bootloader controller speaks.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod log;

mod backend;
mod unlock;
mod writer;

pub use backend::{Partition, RomBackend};
pub use unlock::{wait_ready, Unlocked};
pub use writer::{AutoErase, SequentialRomWriter, DEFAULT_BUSY_POLL_LIMIT};

type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Flash(storage::Error),
    /// An earlier append failed; the session must be restarted.
    Aborted,
    /// No upgrade is in progress.
    NoSession,
    /// A write was requested behind data that has already been written.
    NotSequential,
}

/// Convert the storage error into our error type.
impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Error::Flash(e)
    }
}
