//! ROM backend
//!
//! The bootloader controller talks about the application image in terms of
//! offsets from the start of the image, and may request writes past the end of
//! flash, or with gaps.  This translates those requests into a session of the
//! sequential writer, one session per upgrade.

use core::cell::RefCell;

use storage::{FlashController, SectorMap};

use crate::log::{debug, info, warn};
use crate::writer::{AutoErase, SequentialRomWriter, DEFAULT_BUSY_POLL_LIMIT};
use crate::{Error, Result};

/// The region of flash the application lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Partition {
    /// Absolute address of the start of the application.
    pub application: usize,
    /// One past the last usable address of flash.
    pub end: usize,
}

impl Partition {
    /// The application at `offset` into the device, running up to the end of
    /// flash.
    pub fn from_map(map: &SectorMap, offset: usize) -> Partition {
        Partition {
            application: map.base() + offset,
            end: map.end(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.end.saturating_sub(self.application)
    }

    /// Turn an image offset into an address, and clip the length to what
    /// fits before the end of flash.
    fn translate(&self, offset: usize, length: usize) -> Result<(usize, usize)> {
        let address = self
            .application
            .checked_add(offset)
            .ok_or(storage::Error::OutOfBounds)?;
        if address >= self.end {
            return Err(storage::Error::OutOfBounds.into());
        }
        Ok((address, length.min(self.end - address)))
    }
}

pub struct RomBackend<'f, C> {
    flash: &'f RefCell<C>,
    map: &'f SectorMap,
    partition: Partition,
    busy_limit: u32,
    writer: Option<SequentialRomWriter<'f, C>>,
}

impl<'f, C: FlashController> RomBackend<'f, C> {
    pub fn new(flash: &'f RefCell<C>, map: &'f SectorMap, partition: Partition) -> Self {
        assert!(
            partition.application % 2 == 0,
            "application must be half-word aligned"
        );
        RomBackend {
            flash,
            map,
            partition,
            busy_limit: DEFAULT_BUSY_POLL_LIMIT,
            writer: None,
        }
    }

    pub fn with_busy_limit(mut self, polls: u32) -> Self {
        self.busy_limit = polls;
        self
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn is_upgrading(&self) -> bool {
        self.writer.is_some()
    }

    /// Start a new upgrade, discarding any session in progress.
    pub fn begin_upgrade(&mut self) {
        info!("Upgrade started @{:x}", self.partition.application);
        let writer = SequentialRomWriter::new(
            self.flash,
            self.map,
            self.partition.application,
            AutoErase::Enabled,
        );
        self.writer = Some(writer.with_busy_limit(self.busy_limit));
    }

    pub fn end_upgrade(&mut self, success: bool) {
        if let Some(writer) = self.writer.take() {
            info!("Upgrade finished, ok: {}, end @{:x}", success, writer.address());
        }
    }

    /// Write image data at `offset`.  Returns how many bytes were written,
    /// which is less than requested when the data runs past the end of flash.
    ///
    /// Writes must move forward through the image.  A write beyond the end of
    /// the previous one leaves the gap untouched.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(Error::NoSession)?;
        let (address, length) = self.partition.translate(offset, data.len())?;

        let cursor = writer.address();
        if address < cursor {
            warn!("Non-sequential write: {:x} < {:x}", address, cursor);
            return Err(Error::NotSequential);
        }
        if address > cursor {
            debug!("Skipping {} bytes @{:x}", address - cursor, cursor);
            writer.skip(address - cursor);
        }

        writer.append(&data[..length])?;
        Ok(length)
    }

    /// Read back image data at `offset`.  Returns how many bytes were read.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let (address, length) = self.partition.translate(offset, buf.len())?;
        self.flash.borrow_mut().read(address, &mut buf[..length])?;
        Ok(length)
    }
}
