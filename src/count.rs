// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counting policies for control blocks.
//!
//! Every control block carries two counters, one for strong references and one for weak
//! references. A [`RefCount`] decides how those counters are updated:
//!
//! * [`Local`] is a plain `Cell<usize>`. Updates are ordinary read-modify-write operations,
//!   and handles using it are neither `Send` nor `Sync`. This is the policy behind
//!   [`SharedPtr`] and [`WeakPtr`].
//! * [`Atomic`] is an `AtomicUsize`. It is only used by the handles in the
//!   [`sync`](crate::sync) module, and is never picked implicitly.
//!
//! [`SharedPtr`]: crate::SharedPtr
//! [`WeakPtr`]: crate::WeakPtr

use core::{
    cell::Cell,
    fmt,
    sync::atomic::{self, AtomicUsize, Ordering},
};

mod private {
    pub trait Sealed {}
}

/// A counter stored inside a control block.
///
/// This trait is sealed, and is implemented by [`Local`] and [`Atomic`] only.
pub trait RefCount: private::Sealed + Sized + 'static {
    /// Creates a counter starting at `value`.
    fn new(value: usize) -> Self;

    /// Reads the current value of the counter.
    fn get(&self) -> usize;

    /// Adds one to the counter.
    ///
    /// # Panics
    ///
    /// Panics if the counter would exceed `isize::MAX`.
    fn increment(&self);

    /// Subtracts one from the counter and returns the new value.
    ///
    /// When the returned value is `0`, all writes made through other references
    /// happen-before the return of this call.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already `0`.
    fn decrement(&self) -> usize;

    /// Adds one to the counter, unless the counter is `0`.
    ///
    /// Returns `true` if the counter was incremented.
    fn increment_if_nonzero(&self) -> bool;
}

const MAX_REFCOUNT: usize = isize::MAX as usize;

/// A non-atomic counter.
///
/// Handles using this policy must stay on one thread.
#[derive(Debug)]
#[repr(transparent)]
pub struct Local(Cell<usize>);

impl private::Sealed for Local {}

impl RefCount for Local {
    #[inline]
    fn new(value: usize) -> Self {
        Local(Cell::new(value))
    }

    #[inline]
    fn get(&self) -> usize {
        self.0.get()
    }

    #[track_caller]
    #[inline]
    fn increment(&self) {
        let count = self.0.get();
        if count >= MAX_REFCOUNT {
            modify_refcount_failed("refcount overflow");
        }

        self.0.set(count + 1);
    }

    #[track_caller]
    #[inline]
    fn decrement(&self) -> usize {
        let new_count = match self.0.get().checked_sub(1) {
            Some(value) => value,
            None => modify_refcount_failed("refcount underflow"),
        };

        self.0.set(new_count);
        new_count
    }

    #[track_caller]
    #[inline]
    fn increment_if_nonzero(&self) -> bool {
        if self.0.get() == 0 {
            return false;
        }

        self.increment();
        true
    }
}

/// An atomic counter, for handles which are shared between threads.
#[repr(transparent)]
pub struct Atomic(AtomicUsize);

impl private::Sealed for Atomic {}

impl RefCount for Atomic {
    #[inline]
    fn new(value: usize) -> Self {
        Atomic(AtomicUsize::new(value))
    }

    #[inline]
    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    #[track_caller]
    #[inline]
    fn increment(&self) {
        // A new reference can only be made from an existing one, so no
        // synchronization is needed here.
        let old_count = self.0.fetch_add(1, Ordering::Relaxed);
        if old_count >= MAX_REFCOUNT {
            modify_refcount_failed("refcount overflow");
        }
    }

    #[track_caller]
    #[inline]
    fn decrement(&self) -> usize {
        let old_count = self.0.fetch_sub(1, Ordering::Release);
        match old_count {
            0 => modify_refcount_failed("refcount underflow"),
            1 => {
                atomic::fence(Ordering::Acquire);
                0
            }
            _ => old_count - 1,
        }
    }

    #[track_caller]
    #[inline]
    fn increment_if_nonzero(&self) -> bool {
        let mut count = self.0.load(Ordering::Relaxed);
        loop {
            if count == 0 {
                return false;
            }

            if count >= MAX_REFCOUNT {
                modify_refcount_failed("refcount overflow");
            }

            match self.0.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }
}

impl fmt::Debug for Atomic {
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmtr.debug_tuple("Atomic").field(&self.get()).finish()
    }
}

#[track_caller]
#[cold]
#[inline(never)]
const fn modify_refcount_failed(message: &str) -> ! {
    panic!("{}", message);
}
