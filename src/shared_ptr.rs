// SPDX-License-Identifier: MIT OR Apache-2.0

//! The owning half of the pointer pair.
//!
//! A [`Shared`] is a `(control block, access pointer)` pair. Cloning it adds a strong
//! reference to the control block, dropping it removes one, and when the last strong
//! reference goes away the managed object is destroyed. The control block itself stays
//! alive until the last [`Weak`] observing it is dropped too.
//!
//! Most code names this type through the [`SharedPtr`] alias (single-threaded counting)
//! or [`sync::SharedPtr`] (atomic counting).
//!
//! [`SharedPtr`]: crate::SharedPtr
//! [`sync::SharedPtr`]: crate::sync::SharedPtr

use crate::{
    SharedPtr,
    alloc_api::{AllocError, Allocator, Global, handle_alloc_error},
    control_block::{DeleterBlock, Header, InplaceBlock, Parts},
    count::{Local, RefCount},
    weak_ptr::Weak,
};
use alloc::boxed::Box;
use core::{
    any::Any,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};
#[cfg(feature = "serde")]
use serde_core::ser::{Serialize, Serializer};

/// A reference-counted owning pointer, generic over its counting policy.
///
/// See the [module documentation](index.html) for more information.
pub struct Shared<T: ?Sized, C: RefCount = Local> {
    parts: Option<Parts<T, C>>,
    _boo: PhantomData<T>,
}

/// Creates a new [`SharedPtr`] holding `value`, using a single allocation for the
/// control block and the value.
///
/// # Examples
///
/// ```
/// use counted::{SharedPtr, make_shared};
///
/// let shared = make_shared((42, "x"));
/// assert_eq!(shared.0, 42);
/// assert_eq!(shared.1, "x");
/// assert_eq!(SharedPtr::use_count(&shared), 1);
/// ```
#[track_caller]
#[must_use]
#[inline]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

impl<T> Shared<T, Local> {
    /// Creates a new `SharedPtr` which holds `value` inside its control block.
    ///
    /// # Panics
    ///
    /// Calls [`handle_alloc_error()`] if the control block cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new(25);
    /// assert_eq!(*shared, 25);
    /// ```
    ///
    /// [`handle_alloc_error()`]: https://doc.rust-lang.org/stable/alloc/alloc/fn.handle_alloc_error.html
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn new(value: T) -> Self {
        Self::make_in(|| value, Global)
    }

    /// Creates a new `SharedPtr`, constructing the value with `f` directly inside the
    /// control block.
    ///
    /// The control block is allocated before `f` is called.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new_with(|| String::from("Hello!"));
    /// assert_eq!(shared.as_str(), "Hello!");
    /// ```
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
    pub fn new_in<A: Allocator + 'static>(value: T, alloc: A) -> Self {
        Self::make_in(|| value, alloc)
    }

    /// Tries to create a new `SharedPtr` holding `value`, with the control block allocated
    /// from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns `AllocError` if the control block cannot be allocated. `value` is dropped
    /// before returning.
    #[inline]
    pub fn try_new_in<A: Allocator + 'static>(value: T, alloc: A) -> Result<Self, AllocError> {
        Self::try_make_in(|| value, alloc)
    }

    /// Tries to create a new `SharedPtr` from the return value of `f`, with the control
    /// block allocated from `alloc`. `f` is not called if allocation fails.
    ///
    /// # Errors
    ///
    /// Returns `AllocError` if the control block cannot be allocated.
    #[inline]
    pub fn try_new_with_in<F: FnOnce() -> T, A: Allocator + 'static>(
        f: F,
        alloc: A,
    ) -> Result<Self, AllocError> {
        Self::try_make_in(f, alloc)
    }
}

impl<T: ?Sized> Shared<T, Local> {
    /// Takes ownership of a boxed value. The box is freed when the last `SharedPtr` to it
    /// is dropped.
    ///
    /// This allocates a control block separately from the value.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let boxed: Box<[i32]> = Box::new([1, 2, 3]);
    /// let shared = SharedPtr::from_box(boxed);
    /// assert_eq!(&*shared, &[1, 2, 3]);
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn from_box(value: Box<T>) -> Self {
        Self::adopt_box(value)
    }

    /// Takes ownership of a pointer which was produced by [`Box::into_raw()`].
    ///
    /// A null `ptr` yields an empty `SharedPtr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or have been returned by `Box::into_raw()` and not be owned by
    /// anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let raw = Box::into_raw(Box::new(7u8));
    /// let shared = unsafe { SharedPtr::from_raw(raw) };
    /// assert_eq!(*shared, 7);
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => unsafe { Self::adopt_box(Box::from_raw(ptr.as_ptr())) },
            None => Self::empty(),
        }
    }

    /// Takes ownership of `ptr`, which will be released by calling `deleter` once the last
    /// `SharedPtr` is dropped.
    ///
    /// If the control block cannot be allocated, `deleter` is called on `ptr` before
    /// [`handle_alloc_error()`].
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes for as long as `deleter` has not been called,
    /// and it must not be accessed through any other pointer while a `SharedPtr` to it is
    /// live. [`SharedPtr::get_mut()`] writes through `ptr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::{cell::Cell, ptr::NonNull};
    /// use counted::SharedPtr;
    ///
    /// thread_local!(static RELEASED: Cell<bool> = const { Cell::new(false) });
    ///
    /// let ptr = NonNull::from(Box::leak(Box::new(99u32)));
    /// let shared = unsafe {
    ///     SharedPtr::from_raw_with(ptr, |ptr: NonNull<u32>| {
    ///         drop(Box::from_raw(ptr.as_ptr()));
    ///         RELEASED.set(true);
    ///     })
    /// };
    ///
    /// assert_eq!(*shared, 99);
    /// drop(shared);
    /// assert!(RELEASED.get());
    /// ```
    ///
    /// [`handle_alloc_error()`]: https://doc.rust-lang.org/stable/alloc/alloc/fn.handle_alloc_error.html
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw_with<D: FnOnce(NonNull<T>) + 'static>(
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
    /// See [`SharedPtr::from_raw_with()`].
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn from_raw_with_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Self
    where
        D: FnOnce(NonNull<T>) + 'static,
        A: Allocator + 'static,
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
    /// See [`SharedPtr::from_raw_with()`].
    #[inline]
    pub unsafe fn try_from_raw_with_in<D, A>(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<Self, AllocError>
    where
        D: FnOnce(NonNull<T>) + 'static,
        A: Allocator + 'static,
    {
        unsafe { Self::try_adopt_in(ptr, deleter, alloc) }
    }

    /// Replaces the managed pointer with `ptr`, released by `deleter`.
    ///
    /// The new control block is created before the old strong reference is released.
    ///
    /// # Safety
    ///
    /// See [`SharedPtr::from_raw_with()`].
    #[track_caller]
    #[inline]
    pub unsafe fn reset_raw_with<D: FnOnce(NonNull<T>) + 'static>(
        this: &mut Self,
        ptr: NonNull<T>,
        deleter: D,
    ) {
        *this = unsafe { Self::from_raw_with(ptr, deleter) };
    }
}

impl<T: ?Sized> Shared<T, Local> {
    /// Returns a shared pointer to a part of the managed object, which keeps the whole
    /// object alive.
    ///
    /// The returned pointer only gives shared access to that part.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// struct Point { x: i32, y: i32 }
    ///
    /// let point = SharedPtr::new(Point { x: 3, y: 4 });
    /// let y = SharedPtr::project(&point, |p| &p.y);
    ///
    /// assert_eq!(*y, 4);
    /// assert_eq!(SharedPtr::use_count(&y), 2);
    /// assert_ne!(point.x, *y);
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(this: &Self, f: F) -> SharedPtr<U>
    where
        T: 'static,
    {
        Self::map_parts(this.clone(), f)
    }

    /// Converts this shared pointer into one pointing at a part of the managed object.
    ///
    /// This is also how a `SharedPtr` is type-erased, for example to `dyn Any` or to a
    /// trait object.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::any::Any;
    /// use counted::SharedPtr;
    ///
    /// let value = SharedPtr::new(5u64);
    /// let erased: SharedPtr<dyn Any> = SharedPtr::map(value, |v| v as &dyn Any);
    ///
    /// assert!(erased.is::<u64>());
    /// ```
    #[must_use]
    #[inline]
    pub fn map<U: ?Sized, F: FnOnce(&T) -> &U>(this: Self, f: F) -> SharedPtr<U>
    where
        T: 'static,
    {
        Self::map_parts(this, f)
    }
}

impl<T, C: RefCount> Shared<T, C> {
    #[track_caller]
    #[must_use]
    #[inline]
    pub(crate) fn make_in<F: FnOnce() -> T, A: Allocator>(f: F, alloc: A) -> Self {
        match Self::try_make_in(f, alloc) {
            Ok(this) => this,
            Err(_) => handle_alloc_error(InplaceBlock::<T, C, A>::LAYOUT),
        }
    }

    #[inline]
    pub(crate) fn try_make_in<F: FnOnce() -> T, A: Allocator>(
        f: F,
        alloc: A,
    ) -> Result<Self, AllocError> {
        let parts = InplaceBlock::<T, C, A>::try_alloc_with(f, alloc)?;
        unsafe { Ok(Self::from_parts_acquire(parts)) }
    }
}

impl<T: ?Sized, C: RefCount> Shared<T, C> {
    /// Creates an empty shared pointer, which owns nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let empty = SharedPtr::<i32>::empty();
    /// assert!(SharedPtr::is_null(&empty));
    /// assert_eq!(SharedPtr::use_count(&empty), 0);
    /// ```
    #[must_use]
    #[inline]
    pub const fn empty() -> Self {
        Self {
            parts: None,
            _boo: PhantomData,
        }
    }

    /// Creates a shared pointer which shares ownership with `owner`, but points at `ptr`.
    ///
    /// The object managed by `owner` is kept alive while the returned pointer exists.
    /// If `owner` is empty, the result is empty too.
    ///
    /// The returned pointer never gives mutable access, so [`SharedPtr::get_mut()`] on it
    /// returns `None`.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for reads for as long as the object managed by `owner` is
    /// alive. For the [`Atomic`](crate::Atomic) policy, if the returned pointer is sent to
    /// another thread, the object managed by `owner` must be `Send + Sync`, since the last
    /// pointer to be dropped destroys it.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::ptr::NonNull;
    /// use counted::SharedPtr;
    ///
    /// let pair = SharedPtr::new((1u8, String::from("inner")));
    /// let inner: SharedPtr<String> = unsafe { SharedPtr::alias(&pair, NonNull::from(&pair.1)) };
    ///
    /// assert_eq!(SharedPtr::use_count(&pair), 2);
    /// drop(pair);
    /// assert_eq!(inner.as_str(), "inner");
    /// ```
    #[track_caller]
    #[must_use]
    #[inline]
    pub unsafe fn alias<U: ?Sized>(owner: &Shared<U, C>, ptr: NonNull<T>) -> Self {
        match owner.parts {
            Some(parts) => unsafe { Self::from_parts_acquire(parts.with_ptr(ptr)) },
            None => Self::empty(),
        }
    }

    /// Returns a reference to the managed object, or `None` if this pointer is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new('a');
    /// assert_eq!(SharedPtr::get(&shared), Some(&'a'));
    ///
    /// let empty = SharedPtr::<char>::empty();
    /// assert_eq!(SharedPtr::get(&empty), None);
    /// ```
    #[must_use]
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.parts.as_ref().map(|parts| unsafe { parts.ptr.as_ref() })
    }

    /// Returns the access pointer, or `None` if this pointer is empty.
    #[must_use]
    #[inline]
    pub const fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        match this.parts {
            Some(parts) => Some(parts.ptr),
            None => None,
        }
    }

    /// Returns a mutable reference to the managed object, if this is the only strong
    /// reference and there are no weak references.
    ///
    /// Pointers made by [`SharedPtr::alias()`], [`SharedPtr::project()`] or
    /// [`SharedPtr::map()`] only give shared access, and always return `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let mut shared = SharedPtr::new(25);
    ///
    /// if let Some(inner) = SharedPtr::get_mut(&mut shared) {
    ///     *inner = 42;
    /// }
    /// assert_eq!(*shared, 42);
    ///
    /// let weak = SharedPtr::downgrade(&shared);
    /// assert!(SharedPtr::get_mut(&mut shared).is_none());
    /// # drop(weak);
    /// ```
    #[must_use]
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let parts = this.parts?;
        let is_unique = parts.owns_object
            && unsafe {
                Header::strong_count(parts.block) == 1 && Header::weak_count(parts.block) == 1
            };

        if is_unique {
            let mut ptr = parts.ptr;
            unsafe { Some(ptr.as_mut()) }
        } else {
            None
        }
    }

    /// Returns `true` if this pointer is empty.
    #[must_use]
    #[inline]
    pub const fn is_null(this: &Self) -> bool {
        this.parts.is_none()
    }

    /// Returns the number of strong references to the managed object, or `0` if this
    /// pointer is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new(());
    /// assert_eq!(SharedPtr::use_count(&shared), 1);
    ///
    /// let shared_2 = SharedPtr::clone(&shared);
    /// assert_eq!(SharedPtr::use_count(&shared), 2);
    /// # drop(shared_2);
    /// ```
    #[must_use]
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        match this.parts {
            Some(parts) => unsafe { Header::strong_count(parts.block) },
            None => 0,
        }
    }

    /// Returns the number of [`Weak`] pointers observing the managed object.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let shared = SharedPtr::new(1);
    /// let weak = SharedPtr::downgrade(&shared);
    ///
    /// assert_eq!(SharedPtr::weak_count(&shared), 1);
    /// # drop(weak);
    /// ```
    #[must_use]
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        match this.parts {
            // The strong references share one weak reference between them.
            Some(parts) => unsafe { Header::weak_count(parts.block) - 1 },
            None => 0,
        }
    }

    /// Creates a new [`Weak`] pointer observing the same object.
    ///
    /// Downgrading an empty pointer gives an empty `Weak`.
    #[track_caller]
    #[must_use]
    #[inline]
    pub fn downgrade(this: &Self) -> Weak<T, C> {
        match this.parts {
            Some(parts) => unsafe { Weak::from_parts_acquire(parts) },
            None => Weak::new(),
        }
    }

    /// Releases this pointer's strong reference, leaving it empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let mut shared = SharedPtr::new(10);
    /// let weak = SharedPtr::downgrade(&shared);
    ///
    /// SharedPtr::reset(&mut shared);
    ///
    /// assert!(SharedPtr::is_null(&shared));
    /// assert!(!weak.is_alive());
    /// ```
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(Self::take(this));
    }

    /// Replaces the managed object with a boxed value.
    ///
    /// The new control block is created before the old strong reference is released.
    #[track_caller]
    #[inline]
    pub fn reset_box(this: &mut Self, value: Box<T>) {
        *this = Self::adopt_box(value);
    }

    /// Replaces the managed object with a pointer produced by [`Box::into_raw()`].
    ///
    /// # Safety
    ///
    /// See [`SharedPtr::from_raw()`].
    #[track_caller]
    #[inline]
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        *this = match NonNull::new(ptr) {
            Some(ptr) => unsafe { Self::adopt_box(Box::from_raw(ptr.as_ptr())) },
            None => Self::empty(),
        };
    }

    /// Moves the contents out of `this`, leaving it empty. No counts change.
    #[must_use]
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::replace(this, Self::empty())
    }

    /// Swaps the contents of two shared pointers. No counts change.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    /// Returns `true` if both pointers have the same access pointer.
    ///
    /// This is the same comparison as `==`.
    #[must_use]
    #[inline]
    pub fn ptr_eq<U: ?Sized, C2: RefCount>(this: &Self, other: &Shared<U, C2>) -> bool {
        Self::addr(this) == Shared::addr(other)
    }

    /// Returns `true` if both pointers share a control block.
    ///
    /// Unlike [`SharedPtr::ptr_eq()`], this is `true` for a pointer and the pointers
    /// aliased or projected from it.
    ///
    /// # Examples
    ///
    /// ```
    /// use counted::SharedPtr;
    ///
    /// let pair = SharedPtr::new((1, 2));
    /// let second = SharedPtr::project(&pair, |p| &p.1);
    ///
    /// assert!(!SharedPtr::ptr_eq(&pair, &second));
    /// assert!(SharedPtr::owner_eq(&pair, &second));
    /// ```
    #[must_use]
    #[inline]
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &Shared<U, C>) -> bool {
        match (this.parts, other.parts) {
            (Some(lhs), Some(rhs)) => lhs.block == rhs.block,
            (None, None) => true,
            _ => false,
        }
    }

    /// Hashes the access pointer into the given `hasher`.
    #[inline]
    pub fn ptr_hash<H: Hasher>(this: &Self, hasher: &mut H) {
        Self::addr(this).hash(hasher);
    }

    #[must_use]
    #[inline]
    fn addr(this: &Self) -> usize {
        match this.parts {
            Some(parts) => parts.ptr.as_ptr().cast::<()>().addr(),
            None => 0,
        }
    }

    #[track_caller]
    #[must_use]
    #[inline]
    fn adopt_box(value: Box<T>) -> Self {
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(value)) };
        unsafe { Self::adopt_in(ptr, drop_box::<T>, Global) }
    }

    #[must_use]
    #[inline]
    pub(crate) fn map_parts<U: ?Sized, F: FnOnce(&T) -> &U>(mut this: Self, f: F) -> Shared<U, C> {
        let Some(parts) = this.parts else {
            return Shared::empty();
        };

        let ptr = NonNull::from(f(unsafe { parts.ptr.as_ref() }));
        this.parts = None;

        unsafe { Shared::from_parts_owned(parts.with_ptr(ptr)) }
    }

    #[track_caller]
    #[must_use]
    #[inline]
    pub(crate) unsafe fn adopt_in<D: FnOnce(NonNull<T>), A: Allocator>(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Self {
        match unsafe { Self::try_adopt_in(ptr, deleter, alloc) } {
            Ok(this) => this,
            Err(_) => handle_alloc_error(DeleterBlock::<T, D, C, A>::LAYOUT),
        }
    }

    #[inline]
    pub(crate) unsafe fn try_adopt_in<D: FnOnce(NonNull<T>), A: Allocator>(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<Self, AllocError> {
        match DeleterBlock::<T, D, C, A>::try_alloc(ptr, deleter, alloc) {
            Ok(block) => unsafe { Ok(Self::from_parts_acquire(Parts::for_object(block, ptr))) },
            Err((deleter, e)) => {
                log::debug!("control block allocation failed, releasing adopted pointer {ptr:p}");
                deleter(ptr);
                Err(e)
            }
        }
    }

    /// Builds a handle which registers a new strong reference.
    ///
    /// # Safety
    ///
    /// `parts.block` must be live, and `parts.ptr` valid while the managed object is alive.
    #[track_caller]
    #[must_use]
    #[inline]
    pub(crate) unsafe fn from_parts_acquire(parts: Parts<T, C>) -> Self {
        unsafe { Header::add_strong(parts.block) };
        unsafe { Self::from_parts_owned(parts) }
    }

    /// Builds a handle which takes over a strong reference the caller already holds.
    ///
    /// # Safety
    ///
    /// The caller must own one strong reference to `parts.block`.
    #[must_use]
    #[inline]
    pub(crate) const unsafe fn from_parts_owned(parts: Parts<T, C>) -> Self {
        Self {
            parts: Some(parts),
            _boo: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn raw_counts(this: &Self) -> Option<(usize, usize)> {
        this.parts.map(|parts| unsafe {
            (
                Header::strong_count(parts.block),
                Header::weak_count(parts.block),
            )
        })
    }
}

impl<C: RefCount> Shared<dyn Any, C> {
    /// Attempts to downcast the type-erased pointer to a concrete type.
    ///
    /// # Errors
    ///
    /// Returns the original pointer if it is empty, or if the object is not a `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::any::Any;
    /// use counted::SharedPtr;
    ///
    /// let erased: SharedPtr<dyn Any> = SharedPtr::map(SharedPtr::new(8i16), |v| v as &dyn Any);
    ///
    /// let erased = SharedPtr::<dyn Any>::downcast::<u8>(erased).unwrap_err();
    /// let value = SharedPtr::<dyn Any>::downcast::<i16>(erased).unwrap();
    /// assert_eq!(*value, 8);
    /// ```
    #[inline]
    pub fn downcast<T: Any>(mut this: Self) -> Result<Shared<T, C>, Self> {
        match this.parts {
            Some(parts) if unsafe { parts.ptr.as_ref() }.is::<T>() => {
                this.parts = None;
                unsafe { Ok(Shared::from_parts_owned(parts.cast::<T>())) }
            }
            _ => Err(this),
        }
    }
}

impl<C: RefCount> Shared<dyn Any + Send + Sync, C> {
    /// Attempts to downcast the type-erased pointer to a concrete type.
    ///
    /// # Errors
    ///
    /// Returns the original pointer if it is empty, or if the object is not a `T`.
    #[inline]
    pub fn downcast<T: Any + Send + Sync>(mut this: Self) -> Result<Shared<T, C>, Self> {
        match this.parts {
            Some(parts) if unsafe { parts.ptr.as_ref() }.is::<T>() => {
                this.parts = None;
                unsafe { Ok(Shared::from_parts_owned(parts.cast::<T>())) }
            }
            _ => Err(this),
        }
    }
}

fn drop_box<T: ?Sized>(ptr: NonNull<T>) {
    drop(unsafe { Box::from_raw(ptr.as_ptr()) });
}

#[track_caller]
#[cold]
#[inline(never)]
fn deref_empty() -> ! {
    panic!("dereferenced an empty shared pointer");
}

impl<T: ?Sized, C: RefCount> Deref for Shared<T, C> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pointer is empty.
    #[track_caller]
    #[inline]
    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(value) => value,
            None => deref_empty(),
        }
    }
}

impl<T: ?Sized, C: RefCount> AsRef<T> for Shared<T, C> {
    #[track_caller]
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized, C: RefCount> Clone for Shared<T, C> {
    /// Adds a strong reference and returns a new pointer to the same object.
    ///
    /// # Panics
    ///
    /// Panics if the strong count would overflow `isize::MAX`.
    #[track_caller]
    #[inline]
    fn clone(&self) -> Self {
        match self.parts {
            Some(parts) => unsafe { Self::from_parts_acquire(parts) },
            None => Self::empty(),
        }
    }

    /// Makes `self` a copy of `source`.
    ///
    /// The copy is made before `self`'s old strong reference is released, and assigning a
    /// pointer to itself changes nothing.
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
            Self::swap(self, &mut copy);
        }
    }
}

impl<T: ?Sized, C: RefCount> Default for Shared<T, C> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, C: RefCount> From<Box<T>> for Shared<T, C> {
    #[track_caller]
    #[inline]
    fn from(value: Box<T>) -> Self {
        Self::adopt_box(value)
    }
}

impl<T: ?Sized, U: ?Sized, C: RefCount, C2: RefCount> PartialEq<Shared<U, C2>> for Shared<T, C> {
    #[inline]
    fn eq(&self, other: &Shared<U, C2>) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized, C: RefCount> Eq for Shared<T, C> {}

impl<T: ?Sized, C: RefCount> Hash for Shared<T, C> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::ptr_hash(self, state);
    }
}

impl<T: ?Sized + fmt::Debug, C: RefCount> fmt::Debug for Shared<T, C> {
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Debug::fmt(value, fmtr),
            None => fmtr.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized + fmt::Display, C: RefCount> fmt::Display for Shared<T, C> {
    /// # Panics
    ///
    /// Panics if the pointer is empty.
    #[track_caller]
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_ref(), fmtr)
    }
}

impl<T: ?Sized, C: RefCount> fmt::Pointer for Shared<T, C> {
    #[inline]
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts {
            Some(parts) => fmt::Pointer::fmt(&parts.ptr, fmtr),
            None => fmt::Pointer::fmt(&ptr::null::<()>(), fmtr),
        }
    }
}

#[cfg(feature = "serde")]
impl<T: ?Sized + Serialize, C: RefCount> Serialize for Shared<T, C> {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match Self::get(self) {
            Some(value) => serializer.serialize_some(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<T: ?Sized, C: RefCount> Drop for Shared<T, C> {
    #[track_caller]
    #[inline]
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            unsafe { Header::del_strong(parts.block) };
        }
    }
}
