//! Sequential ROM writer
//!
//! Firmware images arrive in order, a piece at a time.  The writer keeps a
//! cursor into flash and appends each piece at the cursor.  Before a piece is
//! programmed, every sector it lands in that has not yet been erased in this
//! session is erased.  Sectors are only ever erased on first entry, so a
//! sector that already holds earlier pieces of the image is never wiped.
//!
//! Programming is done a half-word at a time, and every piece is read back and
//! compared once written.

use core::cell::RefCell;

use storage::{FlashController, Mode, SectorMap};

use crate::log::{info, warn};
use crate::unlock::Unlocked;
use crate::{Error, Result};

/// How many times to poll a busy controller before giving up on it.  This is
/// well over the worst case for a 128K sector erase on an STM32F4 at full
/// clock.
pub const DEFAULT_BUSY_POLL_LIMIT: u32 = 1 << 26;

/// Value programmed into the padding byte of an odd length write.
const PAD: u8 = 0xff;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AutoErase {
    /// Erase sectors as the cursor enters them.
    Enabled,
    /// Never erase.  The destination must already be erased.
    Disabled,
}

/// One session of sequential writes into flash.
pub struct SequentialRomWriter<'f, C> {
    flash: &'f RefCell<C>,
    map: &'f SectorMap,
    /// Where the next append goes.
    address: usize,
    /// Sectors below this have been erased during this session.
    next_sector_to_erase: usize,
    busy_limit: u32,
    failed: bool,
}

impl<'f, C: FlashController> SequentialRomWriter<'f, C> {
    /// Start a session at `address`, which must be half-word aligned.
    pub fn new(
        flash: &'f RefCell<C>,
        map: &'f SectorMap,
        address: usize,
        auto_erase: AutoErase,
    ) -> Self {
        assert!(address % 2 == 0, "start address must be half-word aligned");

        let next_sector_to_erase = match auto_erase {
            AutoErase::Enabled => 0,
            AutoErase::Disabled => usize::MAX,
        };

        SequentialRomWriter {
            flash,
            map,
            address,
            next_sector_to_erase,
            busy_limit: DEFAULT_BUSY_POLL_LIMIT,
            failed: false,
        }
    }

    pub fn with_busy_limit(mut self, polls: u32) -> Self {
        self.busy_limit = polls;
        self
    }

    /// The address the next append will be written to.
    pub fn address(&self) -> usize {
        self.address
    }

    /// Move the cursor forward without writing anything.
    pub fn skip(&mut self, length: usize) {
        self.address = self.address.saturating_add(length);
    }

    /// Write `data` at the cursor, erasing as needed, and verify it.
    ///
    /// Both the data and the cursor must be half-word aligned.  A failure ends
    /// the session: every later append returns [`Error::Aborted`].
    ///
    /// Once the range has been checked against the sector map, the cursor
    /// moves past it, even if programming or verification then fails.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        // An empty slice may have any dangling pointer.
        if data.is_empty() {
            return if self.failed { Err(Error::Aborted) } else { Ok(()) };
        }
        assert!(
            data.as_ptr() as usize % 2 == 0,
            "source must be half-word aligned"
        );
        assert!(self.address % 2 == 0, "destination must be half-word aligned");

        if self.failed {
            return Err(Error::Aborted);
        }

        let result = self.write(data);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let start = self.address;

        let sectors = match self.map.span(start, data.len()) {
            Ok(sectors) => sectors,
            Err(e) => {
                warn!("Write of {} bytes @{:x} is outside flash", data.len(), start);
                return Err(e.into());
            }
        };
        // The span check covers the whole range, so this cannot overflow.
        self.address = start + data.len();

        // One critical section per sector erased.
        for index in sectors {
            if index >= self.next_sector_to_erase {
                self.erase(index);
                self.next_sector_to_erase = index + 1;
            }
        }

        self.program(start, data);
        self.verify(start, data)
    }

    fn erase(&self, index: usize) {
        info!("Erasing sector {}", index);

        let mut cell = self.flash.borrow_mut();
        let mut flash = Unlocked::new(&mut *cell, self.busy_limit);
        flash.erase_sector(index);
        flash.wait_ready();
    }

    fn program(&self, address: usize, data: &[u8]) {
        let mut cell = self.flash.borrow_mut();
        let mut flash = Unlocked::new(&mut *cell, self.busy_limit);

        // The whole piece is programmed in one critical section.
        flash.set_mode(Mode::Program);
        for (i, pair) in data.chunks(2).enumerate() {
            let high = pair.get(1).copied().unwrap_or(PAD);
            let value = u16::from_le_bytes([pair[0], high]);
            flash.program_halfword(address + 2 * i, value);
            flash.wait_ready();
        }
        flash.wait_ready();
        flash.set_mode(Mode::Idle);
    }

    fn verify(&self, address: usize, data: &[u8]) -> Result<()> {
        let mut flash = self.flash.borrow_mut();
        let mut buf = [0u8; 32];

        for (i, chunk) in data.chunks(buf.len()).enumerate() {
            let pos = address + i * buf.len();
            let back = &mut buf[..chunk.len()];
            flash.read(pos, back)?;
            if *back != *chunk {
                warn!("Verify failed in {} bytes @{:x}", chunk.len(), pos);
                return Err(storage::Error::Mismatch.into());
            }
        }
        Ok(())
    }
}
