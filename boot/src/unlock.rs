//! Exclusive, unlocked access to the flash controller.

use core::ops::{Deref, DerefMut};

use critical_section::RestoreState;
use storage::{fatal, Fatal, FlashController, Mode, UNLOCK_KEYS};

/// Wait for the controller to finish the current operation.
///
/// Any error the controller reports along the way, or when the operation
/// finishes, is fatal, as is the controller staying busy for more than
/// `limit` polls.
pub fn wait_ready<C: FlashController>(flash: &mut C, limit: u32) {
    let mut polls = 0u32;
    loop {
        if let Some(err) = flash.take_error() {
            fatal(Fatal::Program(err));
        }
        if !flash.is_busy() {
            break;
        }
        polls += 1;
        if polls > limit {
            fatal(Fatal::BusyTimeout);
        }
    }
    // Errors can be raised as busy drops.
    if let Some(err) = flash.take_error() {
        fatal(Fatal::Program(err));
    }
    flash.clear_end_of_operation();
}

/// The flash controller, unlocked, inside a critical section.
///
/// Creating this enters the critical section, waits for any outstanding
/// operation, unlocks the controller and resets its status and mode.
/// Dropping it locks the controller again and leaves the critical section,
/// whichever way the enclosing scope is left.
pub struct Unlocked<'a, C: FlashController> {
    flash: &'a mut C,
    limit: u32,
    restore: RestoreState,
}

impl<'a, C: FlashController> Unlocked<'a, C> {
    pub fn new(flash: &'a mut C, limit: u32) -> Self {
        // Safety: released exactly once, in drop.
        let restore = unsafe { critical_section::acquire() };
        let this = Unlocked { flash, limit, restore };

        wait_ready(&mut *this.flash, limit);
        if this.flash.is_locked() {
            for key in UNLOCK_KEYS {
                this.flash.write_key(key);
            }
        }
        this.flash.clear_status();
        this.flash.set_mode(Mode::Idle);
        this
    }

    /// Wait for the current operation, with this guard's poll limit.
    pub fn wait_ready(&mut self) {
        wait_ready(&mut *self.flash, self.limit);
    }
}

impl<'a, C: FlashController> Deref for Unlocked<'a, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.flash
    }
}

impl<'a, C: FlashController> DerefMut for Unlocked<'a, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.flash
    }
}

impl<'a, C: FlashController> Drop for Unlocked<'a, C> {
    fn drop(&mut self) {
        self.flash.lock();
        // Safety: paired with the acquire in new.
        unsafe { critical_section::release(self.restore) };
    }
}
