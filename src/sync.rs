// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread-safe shared and weak pointers.
//!
//! The pointers in this module are the same [`Shared`] and [`Weak`] types as the crate root,
//! with the [`Atomic`] counting policy. Their control blocks are updated with atomic
//! operations, so they may be sent and shared between threads when the managed object
//! allows it.
//!
//! Deleters and allocators given to these pointers must be `Send`, since the last pointer
//! to be dropped may be on any thread.
//!
//! # Examples
//!
//! ```
//! use counted::sync::SharedPtr;
//! use std::thread;
//!
//! let shared = SharedPtr::new(vec![1, 2, 3]);
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let shared = SharedPtr::clone(&shared);
//!         thread::spawn(move || shared.iter().sum::<i32>())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), 6);
//! }
//!
//! assert_eq!(SharedPtr::use_count(&shared), 1);
//! ```

use crate::{
    alloc_api::{AllocError, Allocator, Global},
    count::Atomic,
    shared_ptr::Shared,
    weak_ptr::Weak,
};
use core::ptr::NonNull;

/// A thread-safe reference-counted owning pointer.
pub type SharedPtr<T> = Shared<T, Atomic>;

/// A thread-safe weak pointer.
pub type WeakPtr<T> = Weak<T, Atomic>;

/// Creates a new thread-safe [`SharedPtr`] holding `value`, using a single allocation for
/// the control block and the value.
#[track_caller]
#[must_use]
#[inline]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Send for Weak<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Weak<T, Atomic> {}

impl<T> Shared<T, Atomic> {
    /// Creates a new `SharedPtr` which holds `value` inside its control block.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::sync::SharedPtr;
    ///
    /// let shared = SharedPtr::new(25);
    /// assert_eq!(*shared, 25);
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn new(value: T) -> Self {
        Self::make_in(|| value, Global)
    }

    /// Creates a new `SharedPtr`, constructing the value with `f` directly inside the
    /// control block.
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn new_with<F: FnOnce() -> T>(f: F) -> Self {
        Self::make_in(f, Global)
    }

    /// Creates a new `SharedPtr` holding `value`, with the control block allocated
    /// from `alloc`.
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn new_in<A: Allocator + Send + 'static>(value: T, alloc: A) -> Self {
        Self::make_in(|| value, alloc)
    }

    /// Tries to create a new `SharedPtr` holding `value`, with the control block allocated
    /// from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns `AllocError` if the control block cannot be allocated.
    #[inline]
    pub fn try_new_in<A: Allocator + Send + 'static>(
        value: T,
        alloc: A,
    ) -> Result<Self, AllocError> {
        Self::try_make_in(|| value, alloc)
    }

    /// Tries to create a new `SharedPtr` from the return value of `f`, with the control
    /// block allocated from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns `AllocError` if the control block cannot be allocated.
    #[inline]
    pub fn try_new_with_in<F: FnOnce() -> T, A: Allocator + Send + 'static>(
        f: F,
        alloc: A,
    ) -> Result<Self, AllocError> {
        Self::try_make_in(f, alloc)
    }
}

impl<T: ?Sized> Shared<T, Atomic> {
    /// Takes ownership of a boxed value.
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn from_box(value: alloc::boxed::Box<T>) -> Self {
        Self::from(value)
    }

    /// Takes ownership of a pointer which was produced by `Box::into_raw()`.
    ///
    /// # Safety
    ///
    /// See [`crate::SharedPtr::from_raw()`].
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let mut this = Self::empty();
        unsafe { Self::reset_raw(&mut this, ptr) };
        this
    }

    /// Takes ownership of `ptr`, which will be released by calling `deleter` on whichever
    /// thread drops the last `SharedPtr`.
    ///
    /// # Safety
    ///
    /// See [`crate::SharedPtr::from_raw_with()`].
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw_with<D: FnOnce(NonNull<T>) + Send + 'static>(
        ptr: NonNull<T>,
        deleter: D,
    ) -> Self {
        unsafe { Self::adopt_in(ptr, deleter, Global) }
    }

    /// Takes ownership of `ptr` with the given `deleter`, with the control block allocated
    /// from `alloc`.
    ///
    /// # Safety
    ///
    /// See [`crate::SharedPtr::from_raw_with()`].
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw_with_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Self
    where
        D: FnOnce(NonNull<T>) + Send + 'static,
        A: Allocator + Send + 'static,
    {
        unsafe { Self::adopt_in(ptr, deleter, alloc) }
    }

    /// Tries to take ownership of `ptr` with the given `deleter`, with the control block
    /// allocated from `alloc`.
    ///
    /// # Errors
    ///
    /// If the control block cannot be allocated, `deleter` is called on `ptr` and then
    /// `AllocError` is returned.
    ///
    /// # Safety
    ///
    /// See [`crate::SharedPtr::from_raw_with()`].
    #[inline]
    pub unsafe fn try_from_raw_with_in<D, A>(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<Self, AllocError>
    where
        D: FnOnce(NonNull<T>) + Send + 'static,
        A: Allocator + Send + 'static,
    {
        unsafe { Self::try_adopt_in(ptr, deleter, alloc) }
    }

    /// Returns a shared pointer to a part of the managed object, which keeps the whole
    /// object alive.
    ///
    /// The whole object must be `Send + Sync`, because the projected pointer can be sent
    /// to another thread and be the last one dropped there:
    ///
    /// ```compile_fail
    /// use counted::sync::SharedPtr;
    /// use std::rc::Rc;
    ///
    /// let owner = SharedPtr::new((Rc::new(()), 5u8));
    /// let byte = SharedPtr::project(&owner, |pair| &pair.1);
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::sync::SharedPtr;
    ///
    /// let owner = SharedPtr::new((String::from("name"), 5u8));
    /// let name = SharedPtr::project(&owner, |pair| &pair.0);
    ///
    /// drop(owner);
    /// assert_eq!(name.as_str(), "name");
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(this: &Self, f: F) -> SharedPtr<U>
    where
        T: Send + Sync + 'static,
    {
        Self::map_parts(this.clone(), f)
    }

    /// Converts this shared pointer into one pointing at a part of the managed object.
    ///
    /// As with [`SharedPtr::project()`], the whole object must be `Send + Sync`.
    #[must_use]
    #[inline]
    pub fn map<U: ?Sized, F: FnOnce(&T) -> &U>(this: Self, f: F) -> SharedPtr<U>
    where
        T: Send + Sync + 'static,
    {
        Self::map_parts(this, f)
    }

    /// Replaces the managed pointer with `ptr`, released by `deleter`.
    ///
    /// # Safety
    ///
    /// See [`crate::SharedPtr::from_raw_with()`].
    #[track_caller]
    #[inline]
    pub unsafe fn reset_raw_with<D: FnOnce(NonNull<T>) + Send + 'static>(
        this: &mut Self,
        ptr: NonNull<T>,
        deleter: D,
    ) {
        *this = unsafe { Self::from_raw_with(ptr, deleter) };
    }
}

impl<T: ?Sized> Weak<T, Atomic> {
    /// Returns a weak pointer to a part of the observed object, or an empty weak pointer if
    /// the object has been destroyed.
    ///
    /// The whole object must be `Send + Sync`, as for [`SharedPtr::project()`].
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(&self, f: F) -> WeakPtr<U>
    where
        T: Send + Sync + 'static,
    {
        match self.upgrade() {
            Some(shared) => SharedPtr::downgrade(&SharedPtr::map(shared, f)),
            None => Weak::new(),
        }
    }
}
