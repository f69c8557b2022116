//! Simulated flash
//!
//! A model of an STM32-style flash program/erase controller backed by a byte
//! array, for testing the writer on a host.
//!
//! The model follows the parts of the hardware that the writer depends on:
//!
//! - The controller starts out locked, and only the exact two-word key
//!   sequence unlocks it.  A wrong key locks it up until it is reset.
//! - Erase sets a whole sector to 0xff.  Programming can only clear bits, so
//!   programming over data that has not been erased gives a corrupted result
//!   rather than an error, as on the real device.
//! - Each operation keeps the controller busy for a configurable number of
//!   status polls.
//! - Misuse (programming outside program mode, while locked, at an odd
//!   address, or in a protected sector) sets an error flag.
//!
//! On top of this, failures can be injected: forced programming errors,
//! silently flipped bits and a controller that never stops being busy.
//! Every erase and program is logged so tests can see exactly what happened.

pub mod gen;
pub mod styles;

use std::collections::{BTreeMap, BTreeSet};

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use storage::{Error, FlashController, Mode, ProgramError, SectorMap, UNLOCK_KEYS};

type Result<T> = storage::Result<T>;

/// Value of erased flash.
pub const ERASED: u8 = 0xff;

/// Progress through the unlock sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum KeyState {
    Locked,
    FirstKey,
    Unlocked,
    /// A bad key was written.  Stays locked until reset.
    Jammed,
}

pub struct SimFlash {
    map: &'static SectorMap,
    data: Vec<u8>,
    keys: KeyState,
    mode: Mode,

    /// Polls remaining before the current operation finishes.
    busy: u32,
    /// Polls each operation takes.
    latency: u32,
    stuck: bool,

    errors: Vec<ProgramError>,
    protected: BTreeSet<usize>,
    /// Injected errors, by address.
    fail_at: BTreeMap<usize, ProgramError>,
    /// Bits to flip after programming, by address.
    corrupt_at: BTreeMap<usize, u8>,

    erases: Vec<usize>,
    programs: Vec<usize>,
    locks: usize,
}

impl SimFlash {
    /// Build a simulated flash covering the whole map, fully erased.
    pub fn new(map: &'static SectorMap) -> SimFlash {
        let size = map.end() - map.base();
        SimFlash {
            map,
            data: vec![ERASED; size],
            keys: KeyState::Locked,
            mode: Mode::Idle,
            busy: 0,
            latency: 0,
            stuck: false,
            errors: Vec::new(),
            protected: BTreeSet::new(),
            fail_at: BTreeMap::new(),
            corrupt_at: BTreeMap::new(),
            erases: Vec::new(),
            programs: Vec::new(),
            locks: 0,
        }
    }

    /// Build a flash that still holds old contents, so that any missing erase
    /// shows up when verifying.
    pub fn new_dirty(map: &'static SectorMap, seed: u64) -> SimFlash {
        let mut flash = SimFlash::new(map);
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        rng.fill_bytes(&mut flash.data);
        flash
    }

    pub fn map(&self) -> &'static SectorMap {
        self.map
    }

    /// Number of status polls every erase or program stays busy for.
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// The controller will report busy forever once an operation starts.
    pub fn set_stuck(&mut self) {
        self.stuck = true;
    }

    /// Write protect a sector.
    pub fn protect(&mut self, index: usize) {
        self.protected.insert(index);
    }

    /// Report `err` when the half-word at `address` is programmed.
    pub fn fail_at(&mut self, address: usize, err: ProgramError) {
        self.fail_at.insert(address, err);
    }

    /// Flip the bits in `mask` of the byte at `address` whenever it is
    /// programmed, without reporting anything.
    pub fn corrupt_at(&mut self, address: usize, mask: u8) {
        self.corrupt_at.insert(address, mask);
    }

    /// Copy data directly into the flash, bypassing the controller.
    pub fn install(&mut self, data: &[u8], address: usize) -> anyhow::Result<()> {
        let offset = self.offset(address, data.len()).map_err(|e| {
            anyhow::anyhow!("Unable to install {} bytes @{:x}: {:?}", data.len(), address, e)
        })?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// View the raw contents of a range.
    pub fn contents(&self, address: usize, length: usize) -> &[u8] {
        let offset = address - self.map.base();
        &self.data[offset..offset + length]
    }

    /// Sector indices in the order they were erased.
    pub fn erases(&self) -> &[usize] {
        &self.erases
    }

    /// Addresses of every programmed half-word, in order.
    pub fn programs(&self) -> &[usize] {
        &self.programs
    }

    /// How many times the controller has been locked.
    pub fn locks(&self) -> usize {
        self.locks
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Simulate a reset of the controller.  Flash contents survive.
    pub fn reset(&mut self) {
        self.keys = KeyState::Locked;
        self.mode = Mode::Idle;
        self.busy = 0;
        self.errors.clear();
    }

    fn offset(&self, address: usize, length: usize) -> Result<usize> {
        let end = address.checked_add(length).ok_or(Error::OutOfBounds)?;
        if address < self.map.base() || end > self.map.end() {
            return Err(Error::OutOfBounds);
        }
        Ok(address - self.map.base())
    }

    fn flag(&mut self, err: ProgramError) {
        self.errors.push(err);
    }

    fn start(&mut self) {
        self.busy = self.latency;
    }
}

impl FlashController for SimFlash {
    fn is_locked(&self) -> bool {
        self.keys != KeyState::Unlocked
    }

    fn write_key(&mut self, key: u32) {
        self.keys = match (self.keys, key) {
            (KeyState::Locked, k) if k == UNLOCK_KEYS[0] => KeyState::FirstKey,
            (KeyState::FirstKey, k) if k == UNLOCK_KEYS[1] => KeyState::Unlocked,
            _ => KeyState::Jammed,
        };
    }

    fn lock(&mut self) {
        self.mode = Mode::Idle;
        if self.keys != KeyState::Jammed {
            self.keys = KeyState::Locked;
        }
        self.locks += 1;
    }

    fn clear_status(&mut self) {
        self.errors.clear();
    }

    fn clear_end_of_operation(&mut self) {
        // No end-of-operation flag is modelled.
    }

    fn set_mode(&mut self, mode: Mode) {
        // Configuration writes are ignored while locked.
        if !self.is_locked() {
            self.mode = mode;
        }
    }

    fn is_busy(&mut self) -> bool {
        if self.busy == 0 {
            return false;
        }
        if !self.stuck {
            self.busy -= 1;
        }
        true
    }

    fn take_error(&mut self) -> Option<ProgramError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.remove(0))
        }
    }

    fn erase_sector(&mut self, index: usize) {
        if self.is_locked() || self.mode != Mode::Idle || self.busy != 0 {
            self.flag(ProgramError::Sequence);
            return;
        }
        if self.protected.contains(&index) {
            self.flag(ProgramError::Protection);
            return;
        }
        let Some(range) = self.map.sector(index) else {
            self.flag(ProgramError::Sequence);
            return;
        };
        let base = self.map.base();
        self.data[range.start - base..range.end - base].fill(ERASED);
        self.erases.push(index);
        self.start();
    }

    fn program_halfword(&mut self, address: usize, value: u16) {
        if self.is_locked() || self.mode != Mode::Program || self.busy != 0 {
            self.flag(ProgramError::Sequence);
            return;
        }
        if address % 2 != 0 {
            self.flag(ProgramError::Alignment);
            return;
        }
        let offset = match self.offset(address, 2) {
            Ok(offset) => offset,
            Err(_) => {
                self.flag(ProgramError::Protection);
                return;
            }
        };
        if let Some(index) = self.map.index_of(address) {
            if self.protected.contains(&index) {
                self.flag(ProgramError::Protection);
                return;
            }
        }
        if let Some(&err) = self.fail_at.get(&address) {
            self.flag(err);
            return;
        }

        // NOR flash can only clear bits.
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            let mut byte = self.data[offset + i] & byte;
            if let Some(mask) = self.corrupt_at.get(&(address + i)) {
                byte ^= mask;
            }
            self.data[offset + i] = byte;
        }
        self.programs.push(address);
        self.start();
    }

    fn read(&mut self, address: usize, bytes: &mut [u8]) -> Result<()> {
        let offset = self.offset(address, bytes.len())?;
        bytes.copy_from_slice(&self.data[offset..offset + bytes.len()]);
        Ok(())
    }
}
