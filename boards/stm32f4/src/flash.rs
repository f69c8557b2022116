//! STM32F4 flash driver.
//!
//! Register level access to the flash program/erase controller (FPEC),
//! implementing `storage::FlashController`.  This does no sequencing of its
//! own; the writer in the `boot` crate takes care of unlocking, waiting and
//! error checks.
//!
//! To use this driver, take the FLASH peripheral from the PAC:
//!
//!     let dp = pac::Peripherals::take().unwrap();
//!     let flash = RefCell::new(flash::Stm32f4Flash::new(dp.FLASH, &STM32F4_512K));
//!
//! The HSI oscillator must be running, otherwise the FPEC may misbehave.  Any
//! such misbehavior is caught by the verification after each write.

use core::ptr;

use hal::pac::FLASH;
use storage::{Error, FlashController, Mode, ProgramError, SectorMap};
use stm32f4xx_hal as hal;

type Result<T> = storage::Result<T>;

// FLASH_SR
const SR_EOP: u32 = 1 << 0;
const SR_OPERR: u32 = 1 << 1;
const SR_WRPERR: u32 = 1 << 4;
const SR_PGAERR: u32 = 1 << 5;
const SR_PGPERR: u32 = 1 << 6;
const SR_PGSERR: u32 = 1 << 7;
const SR_BSY: u32 = 1 << 16;
const SR_ERRORS: u32 = SR_OPERR | SR_WRPERR | SR_PGAERR | SR_PGPERR | SR_PGSERR;

// FLASH_CR
const CR_PG: u32 = 1 << 0;
const CR_SER: u32 = 1 << 1;
const CR_SNB_SHIFT: u32 = 3;
const CR_SNB_MASK: u32 = 0x1f;
const CR_PSIZE_X16: u32 = 0b01 << 8;
const CR_STRT: u32 = 1 << 16;
const CR_LOCK: u32 = 1 << 31;

pub struct Stm32f4Flash {
    raw: FLASH,
    map: &'static SectorMap,
}

impl Stm32f4Flash {
    pub fn new(raw: FLASH, map: &'static SectorMap) -> Stm32f4Flash {
        Stm32f4Flash { raw, map }
    }

    /// Give the peripheral back.
    pub fn release(self) -> FLASH {
        self.raw
    }

    fn status(&self) -> u32 {
        self.raw.sr.read().bits()
    }

    fn valid_bound(&self, address: usize, length: usize) -> bool {
        match address.checked_add(length) {
            Some(end) => address >= self.map.base() && end <= self.map.end(),
            None => false,
        }
    }
}

impl FlashController for Stm32f4Flash {
    fn is_locked(&self) -> bool {
        self.raw.cr.read().bits() & CR_LOCK != 0
    }

    fn write_key(&mut self, key: u32) {
        self.raw.keyr.write(|w| unsafe { w.bits(key) });
    }

    fn lock(&mut self) {
        // Resets the configuration as well.
        self.raw.cr.write(|w| unsafe { w.bits(CR_LOCK) });
    }

    fn clear_status(&mut self) {
        // Write one to clear.
        self.raw.sr.write(|w| unsafe { w.bits(SR_EOP | SR_ERRORS) });
    }

    fn clear_end_of_operation(&mut self) {
        self.raw.sr.write(|w| unsafe { w.bits(SR_EOP) });
    }

    fn set_mode(&mut self, mode: Mode) {
        let bits = match mode {
            Mode::Idle => 0,
            Mode::Program => CR_PG | CR_PSIZE_X16,
        };
        self.raw.cr.write(|w| unsafe { w.bits(bits) });
    }

    fn is_busy(&mut self) -> bool {
        self.status() & SR_BSY != 0
    }

    fn take_error(&mut self) -> Option<ProgramError> {
        let sr = self.status();
        let (bit, err) = if sr & SR_WRPERR != 0 {
            (SR_WRPERR, ProgramError::Protection)
        } else if sr & SR_PGAERR != 0 {
            (SR_PGAERR, ProgramError::Alignment)
        } else if sr & SR_PGPERR != 0 {
            (SR_PGPERR, ProgramError::Parallelism)
        } else if sr & (SR_PGSERR | SR_OPERR) != 0 {
            (SR_PGSERR | SR_OPERR, ProgramError::Sequence)
        } else {
            return None;
        };
        self.raw.sr.write(|w| unsafe { w.bits(bit) });
        Some(err)
    }

    fn erase_sector(&mut self, index: usize) {
        let snb = (index as u32 & CR_SNB_MASK) << CR_SNB_SHIFT;
        self.raw.cr.write(|w| unsafe { w.bits(CR_SER | snb) });
        self.raw.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_STRT) });
    }

    fn program_halfword(&mut self, address: usize, value: u16) {
        // Address validity is checked by the controller, which flags a
        // protection or alignment error.
        unsafe { ptr::write_volatile(address as *mut u16, value) };
    }

    fn read(&mut self, address: usize, bytes: &mut [u8]) -> Result<()> {
        if !self.valid_bound(address, bytes.len()) {
            return Err(Error::OutOfBounds);
        }

        // Flash is memory mapped.  Reads must not be merged with anything the
        // controller just did, so go through volatile reads.
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = unsafe { ptr::read_volatile((address + i) as *const u8) };
        }
        Ok(())
    }
}
