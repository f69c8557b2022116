//! Sector maps
//!
//! Flash on these parts is divided into sectors that must be erased as a unit.
//! The sizes are not uniform: the STM32F4 has a few small sectors at the start
//! of flash, one medium one, and then large ones.  The layout is described as
//! data so that a device variant only needs to supply a different table.

use core::ops::Range;

use crate::{Error, Result};

/// The sectors of one flash device.
///
/// Sectors are contiguous, starting at `base`.  `ends[i]` is the address one
/// past the last byte of sector `i`, so the table must be strictly
/// increasing.
#[derive(Debug, Clone, Copy)]
pub struct SectorMap {
    base: usize,
    ends: &'static [usize],
}

impl SectorMap {
    pub const fn new(base: usize, ends: &'static [usize]) -> SectorMap {
        let mut prev = base;
        let mut i = 0;
        while i < ends.len() {
            assert!(ends[i] > prev, "sector ends must increase");
            prev = ends[i];
            i += 1;
        }
        SectorMap { base, ends }
    }

    /// First address covered by the map.
    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last address covered by the map.
    pub fn end(&self) -> usize {
        self.ends.last().copied().unwrap_or(self.base)
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Map an address onto the index of the sector holding it.
    pub fn index_of(&self, address: usize) -> Option<usize> {
        if address < self.base {
            return None;
        }
        let index = self.ends.partition_point(|&end| end <= address);
        if index < self.ends.len() {
            Some(index)
        } else {
            None
        }
    }

    /// The address range of a sector.
    pub fn sector(&self, index: usize) -> Option<Range<usize>> {
        let end = *self.ends.get(index)?;
        let start = match index {
            0 => self.base,
            n => self.ends[n - 1],
        };
        Some(start..end)
    }

    /// The indices of the sectors touched by `length` bytes at `address`.
    /// Every byte of the range must be covered.  An empty range touches no
    /// sectors.
    pub fn span(&self, address: usize, length: usize) -> Result<Range<usize>> {
        if length == 0 {
            return Ok(0..0);
        }
        let last = address.checked_add(length - 1).ok_or(Error::OutOfBounds)?;
        let first = self.index_of(address).ok_or(Error::OutOfBounds)?;
        // The sectors are contiguous, so covering both ends covers everything
        // in between.
        let last = self.index_of(last).ok_or(Error::OutOfBounds)?;
        Ok(first..last + 1)
    }
}

/// Build the end table for `N` sectors of `size` bytes each, starting at
/// `base`.  Used for devices with uniform pages.
pub const fn uniform_ends<const N: usize>(base: usize, size: usize) -> [usize; N] {
    let mut ends = [0; N];
    let mut i = 0;
    while i < N {
        ends[i] = base + (i + 1) * size;
        i += 1;
    }
    ends
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: usize = 1024;
    const F446_ENDS: [usize; 8] = [
        0x0800_4000,
        0x0800_8000,
        0x0800_C000,
        0x0801_0000,
        0x0802_0000,
        0x0804_0000,
        0x0806_0000,
        0x0808_0000,
    ];
    static F446: SectorMap = SectorMap::new(0x0800_0000, &F446_ENDS);

    #[test]
    fn lookup_boundaries() {
        assert_eq!(F446.index_of(0x07FF_FFFF), None);
        assert_eq!(F446.index_of(0x0800_0000), Some(0));
        assert_eq!(F446.index_of(0x0800_3FFF), Some(0));
        assert_eq!(F446.index_of(0x0800_4000), Some(1));
        assert_eq!(F446.index_of(0x0801_0000), Some(4));
        assert_eq!(F446.index_of(0x0801_FFFF), Some(4));
        assert_eq!(F446.index_of(0x0802_0000), Some(5));
        assert_eq!(F446.index_of(0x0807_FFFF), Some(7));
        assert_eq!(F446.index_of(0x0808_0000), None);
        assert_eq!(F446.index_of(usize::MAX), None);
    }

    #[test]
    fn sector_ranges() {
        assert_eq!(F446.sector(0), Some(0x0800_0000..0x0800_4000));
        assert_eq!(F446.sector(4), Some(0x0801_0000..0x0802_0000));
        assert_eq!(F446.sector(4).map(|r| r.len()), Some(64 * K));
        assert_eq!(F446.sector(8), None);
        assert_eq!(F446.end(), 0x0808_0000);
        assert_eq!(F446.len(), 8);
    }

    #[test]
    fn spans() {
        assert_eq!(F446.span(0x0800_3FFE, 4), Ok(0..2));
        assert_eq!(F446.span(0x0800_0000, 2), Ok(0..1));
        assert_eq!(F446.span(0x0800_0000, 0), Ok(0..0));
        assert_eq!(F446.span(0x0807_FFFE, 2), Ok(7..8));
        assert_eq!(F446.span(0x0807_FFFE, 4), Err(Error::OutOfBounds));
        assert_eq!(F446.span(usize::MAX, 2), Err(Error::OutOfBounds));
    }

    #[test]
    fn uniform() {
        static ENDS: [usize; 4] = uniform_ends(0x1000, 0x800);
        let map = SectorMap::new(0x1000, &ENDS);
        assert_eq!(ENDS, [0x1800, 0x2000, 0x2800, 0x3000]);
        assert_eq!(map.index_of(0x27FF), Some(2));
        assert_eq!(map.sector(3), Some(0x2800..0x3000));
    }
}
