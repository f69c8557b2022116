//! Sector maps of the supported parts.

use crate::map::{uniform_ends, SectorMap};

/// Base of on-chip flash on STM32 parts.
pub const FLASH_BASE: usize = 0x0800_0000;

const K: usize = 1024;

const F4_512K_ENDS: [usize; 8] = [
    // 16K
    FLASH_BASE + 16 * K,
    FLASH_BASE + 32 * K,
    FLASH_BASE + 48 * K,
    FLASH_BASE + 64 * K,
    // 64K
    FLASH_BASE + 128 * K,
    // 128K
    FLASH_BASE + 256 * K,
    FLASH_BASE + 384 * K,
    FLASH_BASE + 512 * K,
];

const F4_1M_ENDS: [usize; 12] = [
    FLASH_BASE + 16 * K,
    FLASH_BASE + 32 * K,
    FLASH_BASE + 48 * K,
    FLASH_BASE + 64 * K,
    FLASH_BASE + 128 * K,
    FLASH_BASE + 256 * K,
    FLASH_BASE + 384 * K,
    FLASH_BASE + 512 * K,
    FLASH_BASE + 640 * K,
    FLASH_BASE + 768 * K,
    FLASH_BASE + 896 * K,
    FLASH_BASE + 1024 * K,
];

const L4_PAGES: usize = 256;
const L4_ENDS: [usize; L4_PAGES] = uniform_ends(FLASH_BASE, 2 * K);

/// STM32F446 and other 512K STM32F4 parts.
pub static STM32F4_512K: SectorMap = SectorMap::new(FLASH_BASE, &F4_512K_ENDS);

/// Single bank 1M STM32F4 parts (F405/F407).
pub static STM32F4_1M: SectorMap = SectorMap::new(FLASH_BASE, &F4_1M_ENDS);

/// First bank of an STM32L4, 2K pages.
pub static STM32L4_BANK1: SectorMap = SectorMap::new(FLASH_BASE, &L4_ENDS);
