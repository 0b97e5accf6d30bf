// SPDX-License-Identifier: MIT OR Apache-2.0

//! The observing half of the pointer pair.
//!
//! A [`Weak`] holds a weak reference to a control block. It keeps the control block
//! allocated, but not the managed object, so it can always tell whether the object is
//! still alive, and [`Weak::lock()`] it into a [`Shared`] if it is.

use crate::{
    SharedPtr,
    control_block::{Header, Parts},
    count::{Local, RefCount},
    shared_ptr::Shared,
};
use core::{fmt, marker::PhantomData, mem, ptr};

/// A weak, non-owning pointer, generic over its counting policy.
///
/// Most code names this type through the [`WeakPtr`](crate::WeakPtr) alias.
pub struct Weak<T: ?Sized, C: RefCount = Local> {
    parts: Option<Parts<T, C>>,
    _boo: PhantomData<T>,
}

impl<T: ?Sized, C: RefCount> Weak<T, C> {
    /// Constructs an empty `WeakPtr`, which observes nothing. Locking it always gives an
    /// empty shared pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::{SharedPtr, WeakPtr};
    ///
    /// let weak: WeakPtr<i32> = WeakPtr::new();
    /// assert!(SharedPtr::is_null(&weak.lock()));
    /// assert!(!weak.is_alive());
    /// ```
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            parts: None,
            _boo: PhantomData,
        }
    }

    /// Returns a shared pointer to the observed object, or an empty shared pointer if the
    /// object has been destroyed.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new(25);
    /// let weak = SharedPtr::downgrade(&shared);
    ///
    /// assert_eq!(*weak.lock(), 25);
    ///
    /// drop(shared);
    /// assert!(SharedPtr::is_null(&weak.lock()));
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn lock(&self) -> Shared<T, C> {
        self.upgrade().unwrap_or_default()
    }

    /// Attempts to upgrade to a shared pointer, returning `None` if the observed object has
    /// been destroyed.
    ///
    /// # Panics
    ///
    /// Panics if the strong count would overflow `isize::MAX`.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::{SharedPtr, WeakPtr};
    ///
    /// let weak;
    ///
    /// {
    ///     let shared = SharedPtr::new("value");
    ///     weak = SharedPtr::downgrade(&shared);
    ///
    ///     let shared_2 = weak.upgrade().unwrap();
    ///     assert_eq!(SharedPtr::use_count(&shared_2), 2);
    /// }
    ///
    /// assert!(WeakPtr::upgrade(&weak).is_none());
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn upgrade(&self) -> Option<Shared<T, C>> {
        let parts = self.parts?;
        if unsafe { Header::try_add_strong(parts.block) } {
            unsafe { Some(Shared::from_parts_owned(parts)) }
        } else {
            None
        }
    }

    /// Returns the number of strong references to the observed object, or `0` if it has
    /// been destroyed or this pointer is empty.
    #[must_use]
    #[inline]
    pub fn use_count(&self) -> usize {
        match self.parts {
            Some(parts) => unsafe { Header::strong_count(parts.block) },
            None => 0,
        }
    }

    /// Returns the number of `WeakPtr`s observing the same object, including this one.
    ///
    /// Returns `0` if this pointer is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new(0u8);
    /// let weak = SharedPtr::downgrade(&shared);
    /// let weak_2 = weak.clone();
    ///
    /// assert_eq!(weak.weak_count(), 2);
    /// drop(shared);
    /// assert_eq!(weak_2.weak_count(), 2);
    /// ```
    #[must_use]
    #[inline]
    pub fn weak_count(&self) -> usize {
        match self.parts {
            Some(parts) => unsafe {
                let implicit = usize::from(Header::strong_count(parts.block) > 0);
                Header::weak_count(parts.block) - implicit
            },
            None => 0,
        }
    }

    /// Returns `true` if the observed object is still alive.
    ///
    /// An empty `WeakPtr` is never alive.
    #[must_use]
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.use_count() > 0
    }

    /// Returns `true` if this pointer observes nothing.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.parts.is_none()
    }

    /// Releases this pointer's weak reference, leaving it empty.
    #[inline]
    pub fn reset(&mut self) {
        drop(mem::take(self));
    }

    /// Swaps the contents of two weak pointers. No counts change.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns `true` if both pointers have the same access pointer.
    #[must_use]
    #[inline]
    pub fn ptr_eq<U: ?Sized>(&self, other: &Weak<U, C>) -> bool {
        match (self.parts, other.parts) {
            (Some(lhs), Some(rhs)) => ptr::addr_eq(lhs.ptr.as_ptr(), rhs.ptr.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns `true` if both pointers observe the same control block.
    #[must_use]
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &Weak<U, C>) -> bool {
        match (self.parts, other.parts) {
            (Some(lhs), Some(rhs)) => lhs.block == rhs.block,
            (None, None) => true,
            _ => false,
        }
    }

    /// Builds a weak pointer which registers a new weak reference.
    ///
    /// # Safety
    ///
    /// `parts.block` must be live.
    #[track_caller]
    #[must_use]
    #[inline]
    pub(crate) unsafe fn from_parts_acquire(parts: Parts<T, C>) -> Self {
        unsafe { Header::add_weak(parts.block) };
        Self {
            parts: Some(parts),
            _boo: PhantomData,
        }
    }
}

impl<T: ?Sized> Weak<T, Local> {
    /// Returns a weak pointer to a part of the observed object, or an empty weak pointer if
    /// the object has been destroyed.
    ///
    /// The result observes the same control block as `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let pair = SharedPtr::new((1u8, String::from("second")));
    /// let weak = SharedPtr::downgrade(&pair);
    ///
    /// let second = weak.project(|p| &p.1);
    /// assert!(second.owner_eq(&weak));
    /// assert_eq!(second.lock().as_str(), "second");
    ///
    /// drop(pair);
    /// assert!(weak.project(|p| &p.0).is_empty());
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(&self, f: F) -> Weak<U, Local>
    where
        T: 'static,
    {
        match self.upgrade() {
            Some(shared) => SharedPtr::downgrade(&SharedPtr::map(shared, f)),
            None => Weak::new(),
        }
    }
}

impl<T: ?Sized, C: RefCount> Clone for Weak<T, C> {
    #[track_caller]
    #[inline]
    fn clone(&self) -> Self {
        match self.parts {
            Some(parts) => unsafe { Self::from_parts_acquire(parts) },
            None => Self::new(),
        }
    }

    #[track_caller]
    #[inline]
    fn clone_from(&mut self, source: &Self) {
        let same = match (&self.parts, &source.parts) {
            (Some(lhs), Some(rhs)) => lhs.same_as(rhs),
            (None, None) => true,
            _ => false,
        };

        if !same {
            let mut copy = source.clone();
            self.swap(&mut copy);
        }
    }
}

impl<T: ?Sized, C: RefCount> Default for Weak<T, C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'h, T: ?Sized, C: RefCount> From<&'h Shared<T, C>> for Weak<T, C> {
    #[track_caller]
    #[inline]
    fn from(value: &'h Shared<T, C>) -> Self {
        Shared::downgrade(value)
    }
}

impl<T: ?Sized + fmt::Debug, C: RefCount> fmt::Debug for Weak<T, C> {
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(shared) = self.upgrade() {
            return fmtr.debug_tuple("WeakPtr").field(&&*shared).finish();
        }

        let payload: &'_ dyn fmt::Debug = if self.is_empty() {
            struct Empty;
            impl fmt::Debug for Empty {
                #[inline]
                fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmtr.write_str("<empty>")
                }
            }

            &Empty
        } else {
            struct Destroyed;
            impl fmt::Debug for Destroyed {
                #[inline]
                fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmtr.write_str("<destroyed>")
                }
            }

            &Destroyed
        };

        fmtr.debug_tuple("WeakPtr").field(payload).finish()
    }
}

impl<T: ?Sized, C: RefCount> fmt::Pointer for Weak<T, C> {
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts {
            Some(parts) => fmt::Pointer::fmt(&parts.ptr, fmtr),
            None => fmt::Pointer::fmt(&ptr::null::<()>(), fmtr),
        }
    }
}

impl<T: ?Sized, C: RefCount> Drop for Weak<T, C> {
    #[track_caller]
    #[inline]
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { Header::del_weak(parts.block) };
        }
    }
}
