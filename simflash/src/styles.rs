//! Flash styles
//!
//! The microcontrollers this bootloader runs on lay out their flash in quite
//! different ways.  Each style pairs a sector map with the region the
//! application image lives in, so tests can be run against every layout.

use storage::devices::{FLASH_BASE, STM32F4_1M, STM32F4_512K, STM32L4_BANK1};
use storage::SectorMap;

use crate::SimFlash;

/// A device layout, and where the application goes on it.
pub struct Style {
    pub name: &'static str,
    pub map: &'static SectorMap,
    /// Offset of the application from the start of flash.  The bootloader
    /// lives below it.
    pub application_offset: usize,
    /// Operation latency, in status polls.
    pub latency: u32,
}

impl Style {
    pub fn build(&self) -> SimFlash {
        let mut flash = SimFlash::new(self.map);
        flash.set_latency(self.latency);
        flash
    }

    /// Absolute address of the application.
    pub fn application(&self) -> usize {
        FLASH_BASE + self.application_offset
    }
}

/// STM32F446.  Four 16K sectors, a 64K one and three of 128K.  The bootloader
/// occupies the first two small sectors.
pub static STM32F446: Style = Style {
    name: "stm32f446",
    map: &STM32F4_512K,
    application_offset: 0x8000,
    latency: 2,
};

/// STM32F405/F407.  As above but with seven 128K sectors.
pub static STM32F407: Style = Style {
    name: "stm32f407",
    map: &STM32F4_1M,
    application_offset: 0x8000,
    latency: 1,
};

/// STM32L4.  Small uniform pages, which means many erases per image.
pub static STM32L4: Style = Style {
    name: "stm32l4",
    map: &STM32L4_BANK1,
    application_offset: 0x8000,
    latency: 0,
};

pub static ALL_STYLES: [&Style; 3] = [&STM32F446, &STM32F407, &STM32L4];

/// Each style, along with a fresh flash built from it.
pub fn all_flashes() -> impl Iterator<Item = (&'static Style, SimFlash)> {
    ALL_STYLES.iter().map(|style| (*style, style.build()))
}
