//! Board support for STM32F4 based nodes.
//!
//! Provides the flash controller driver and the flash layout of the part: the
//! bootloader occupies the first two 16K sectors, and the application runs
//! from there to the end of flash.

#![no_std]

pub mod flash;

pub use flash::Stm32f4Flash;

use boot::Partition;
use storage::devices::{FLASH_BASE, STM32F4_1M, STM32F4_512K};
use storage::SectorMap;

/// Offset of the application from the start of flash.
pub const APPLICATION_OFFSET: usize = 0x8000;

/// Address of the flash size register, in KiB.
const FLASH_SIZE_REG: usize = 0x1FFF_7A22;

/// The flash size of this particular part, in bytes.
pub fn flash_size() -> usize {
    let kib = unsafe { core::ptr::read_volatile(FLASH_SIZE_REG as *const u16) };
    let size = kib as usize * 1024;

    assert!(size >= 128 * 1024);
    assert!(size <= 2048 * 1024);
    size
}

/// Pick the sector map matching the size of this part.
pub fn sector_map() -> Option<&'static SectorMap> {
    match flash_size() {
        s if s == STM32F4_512K.end() - FLASH_BASE => Some(&STM32F4_512K),
        s if s == STM32F4_1M.end() - FLASH_BASE => Some(&STM32F4_1M),
        _ => None,
    }
}

/// Where the application goes on this part.
pub fn partition(map: &SectorMap) -> Partition {
    Partition {
        application: FLASH_BASE + APPLICATION_OFFSET,
        end: FLASH_BASE + flash_size().min(map.end() - FLASH_BASE),
    }
}
