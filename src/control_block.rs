// SPDX-License-Identifier: MIT OR Apache-2.0

//! Type-erased control blocks.
//!
//! A control block is a single allocation which starts with a [`Header`]. The header holds
//! the strong and weak counters, and a vtable which knows how to destroy the managed object
//! and how to free the block. The concrete block type is only known at construction; after
//! that every handle sees a `NonNull<Header<C>>`.

use crate::{
    alloc_api::{AllocError, Allocator, Layout},
    count::RefCount,
};
use core::{
    cell::{Cell, UnsafeCell},
    mem::{self, ManuallyDrop, MaybeUninit},
    ptr::{self, NonNull},
};

/// The pair stored by every non-empty handle.
///
/// `ptr` is the access pointer, which may point anywhere inside the lifetime of the object
/// managed by `block`. `owns_object` is set only while `ptr` is the managed object itself,
/// with the write access it was created with.
pub(crate) struct Parts<T: ?Sized, C: RefCount> {
    pub(crate) block: NonNull<Header<C>>,
    pub(crate) ptr: NonNull<T>,
    pub(crate) owns_object: bool,
}

impl<T: ?Sized, C: RefCount> Parts<T, C> {
    #[must_use]
    #[inline]
    pub(crate) const fn for_object(block: NonNull<Header<C>>, ptr: NonNull<T>) -> Self {
        Self {
            block,
            ptr,
            owns_object: true,
        }
    }

    /// Points at something other than the managed object. The result never grants
    /// mutable access.
    #[must_use]
    #[inline]
    pub(crate) const fn with_ptr<U: ?Sized>(self, ptr: NonNull<U>) -> Parts<U, C> {
        Parts {
            block: self.block,
            ptr,
            owns_object: false,
        }
    }

    /// Reinterprets the access pointer as a `U` at the same address, keeping ownership of
    /// the managed object if this pointer had it.
    ///
    /// # Safety
    ///
    /// The pointee must really be a `U`.
    #[must_use]
    #[inline]
    pub(crate) const unsafe fn cast<U>(self) -> Parts<U, C> {
        Parts {
            block: self.block,
            ptr: self.ptr.cast::<U>(),
            owns_object: self.owns_object,
        }
    }

    #[must_use]
    #[inline]
    pub(crate) fn same_as<U: ?Sized>(&self, other: &Parts<U, C>) -> bool {
        self.block == other.block && ptr::addr_eq(self.ptr.as_ptr(), other.ptr.as_ptr())
    }
}

impl<T: ?Sized, C: RefCount> Clone for Parts<T, C> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized, C: RefCount> Copy for Parts<T, C> {}

pub(crate) struct BlockVTable<C: RefCount> {
    delete_object: unsafe fn(NonNull<Header<C>>),
    deallocate: unsafe fn(NonNull<Header<C>>),
}

#[repr(C)]
pub(crate) struct Header<C: RefCount> {
    strong: C,
    weak: C,
    vtable: &'static BlockVTable<C>,
}

impl<C: RefCount> Header<C> {
    #[must_use]
    #[inline]
    fn new(vtable: &'static BlockVTable<C>) -> Self {
        Self {
            strong: C::new(0),
            weak: C::new(0),
            vtable,
        }
    }

    /// Registers a strong reference. The first strong reference also holds one weak
    /// reference, which is released after the managed object is destroyed.
    ///
    /// # Safety
    ///
    /// `this` must point to a live control block. If the strong count is `0`, the caller
    /// must be the only party with access to the block.
    #[track_caller]
    #[inline]
    pub(crate) unsafe fn add_strong(this: NonNull<Self>) {
        let header = unsafe { this.as_ref() };
        if header.strong.get() == 0 {
            header.weak.increment();
        }

        header.strong.increment();
    }

    /// Registers a strong reference if the managed object is still alive.
    ///
    /// # Safety
    ///
    /// `this` must point to a live control block.
    #[track_caller]
    #[must_use]
    #[inline]
    pub(crate) unsafe fn try_add_strong(this: NonNull<Self>) -> bool {
        unsafe { this.as_ref().strong.increment_if_nonzero() }
    }

    /// # Safety
    ///
    /// `this` must point to a live control block.
    #[track_caller]
    #[inline]
    pub(crate) unsafe fn add_weak(this: NonNull<Self>) {
        unsafe { this.as_ref().weak.increment() }
    }

    /// Releases a strong reference, destroying the managed object if it was the last.
    ///
    /// # Safety
    ///
    /// `this` must point to a live control block, and the caller must own one of its
    /// strong references. The block may be freed by this call.
    #[track_caller]
    #[inline]
    pub(crate) unsafe fn del_strong(this: NonNull<Self>) {
        let (remaining, vtable) = {
            let header = unsafe { this.as_ref() };
            (header.strong.decrement(), header.vtable)
        };

        if remaining == 0 {
            unsafe { (vtable.delete_object)(this) };
            log::trace!("destroyed object managed by control block {this:p}");

            unsafe { Self::del_weak(this) };
        }
    }

    /// Releases a weak reference, freeing the block if it was the last.
    ///
    /// # Safety
    ///
    /// `this` must point to a live control block, and the caller must own one of its
    /// weak references. The block may be freed by this call.
    #[track_caller]
    #[inline]
    pub(crate) unsafe fn del_weak(this: NonNull<Self>) {
        let (remaining, vtable) = {
            let header = unsafe { this.as_ref() };
            (header.weak.decrement(), header.vtable)
        };

        if remaining == 0 {
            unsafe { (vtable.deallocate)(this) };
            log::trace!("freed control block {this:p}");
        }
    }

    /// # Safety
    ///
    /// `this` must point to a live control block.
    #[must_use]
    #[inline]
    pub(crate) unsafe fn strong_count(this: NonNull<Self>) -> usize {
        unsafe { this.as_ref().strong.get() }
    }

    /// The raw weak count, including the weak reference held on behalf of the strong ones.
    ///
    /// # Safety
    ///
    /// `this` must point to a live control block.
    #[must_use]
    #[inline]
    pub(crate) unsafe fn weak_count(this: NonNull<Self>) -> usize {
        unsafe { this.as_ref().weak.get() }
    }
}

/// A control block which owns an external pointer, and destroys it with a deleter.
#[repr(C)]
pub(crate) struct DeleterBlock<T: ?Sized, D, C: RefCount, A: Allocator> {
    header: Header<C>,
    ptr: Cell<Option<NonNull<T>>>,
    deleter: UnsafeCell<ManuallyDrop<D>>,
    alloc: ManuallyDrop<A>,
}

impl<T: ?Sized, D: FnOnce(NonNull<T>), C: RefCount, A: Allocator> DeleterBlock<T, D, C, A> {
    const VTABLE: &'static BlockVTable<C> = &BlockVTable {
        delete_object: Self::delete_object,
        deallocate: Self::deallocate,
    };

    pub(crate) const LAYOUT: Layout = Layout::new::<Self>();

    /// Allocates a block owning `ptr`. Both counters start at `0`.
    ///
    /// On failure the deleter is handed back unused, so the caller can release `ptr`.
    #[inline]
    pub(crate) fn try_alloc(
        ptr: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<NonNull<Header<C>>, (D, AllocError)> {
        let block = match alloc.allocate(Self::LAYOUT) {
            Ok(block) => block.cast::<Self>(),
            Err(e) => return Err((deleter, e)),
        };

        unsafe {
            block.write(Self {
                header: Header::new(Self::VTABLE),
                ptr: Cell::new(Some(ptr)),
                deleter: UnsafeCell::new(ManuallyDrop::new(deleter)),
                alloc: ManuallyDrop::new(alloc),
            });
        }

        Ok(block.cast::<Header<C>>())
    }

    unsafe fn delete_object(header: NonNull<Header<C>>) {
        let this = unsafe { header.cast::<Self>().as_ref() };
        if let Some(ptr) = this.ptr.take() {
            let deleter = unsafe { ManuallyDrop::take(&mut *this.deleter.get()) };
            deleter(ptr);
        }
    }

    unsafe fn deallocate(header: NonNull<Header<C>>) {
        let block = header.cast::<Self>();
        unsafe {
            debug_assert!(block.as_ref().ptr.get().is_none());

            let alloc = ManuallyDrop::into_inner(ptr::read(&raw const (*block.as_ptr()).alloc));
            alloc.deallocate(block.cast::<u8>(), Self::LAYOUT);
        }
    }
}

/// A control block which stores the managed object inline, after the header.
#[repr(C)]
pub(crate) struct InplaceBlock<T, C: RefCount, A: Allocator> {
    header: Header<C>,
    alloc: ManuallyDrop<A>,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T, C: RefCount, A: Allocator> InplaceBlock<T, C, A> {
    const VTABLE: &'static BlockVTable<C> = &BlockVTable {
        delete_object: Self::delete_object,
        deallocate: Self::deallocate,
    };

    pub(crate) const LAYOUT: Layout = Layout::new::<Self>();

    /// Allocates a block, then constructs the value returned by `f` inside it. Both counters
    /// start at `0`.
    ///
    /// If `f` panics, the block is freed before unwinding continues.
    #[inline]
    pub(crate) fn try_alloc_with<F: FnOnce() -> T>(
        f: F,
        alloc: A,
    ) -> Result<Parts<T, C>, AllocError> {
        struct Guard<'a, A: Allocator> {
            alloc: &'a A,
            block: NonNull<u8>,
            layout: Layout,
        }

        impl<'a, A: Allocator> Drop for Guard<'a, A> {
            #[inline]
            fn drop(&mut self) {
                unsafe { self.alloc.deallocate(self.block, self.layout) };
            }
        }

        let block = alloc.allocate(Self::LAYOUT)?.cast::<Self>();

        let value = unsafe { UnsafeCell::raw_get(&raw const (*block.as_ptr()).value).cast::<T>() };

        let guard = Guard {
            alloc: &alloc,
            block: block.cast::<u8>(),
            layout: Self::LAYOUT,
        };

        unsafe { value.write(f()) };
        mem::forget(guard);

        unsafe {
            (&raw mut (*block.as_ptr()).header).write(Header::new(Self::VTABLE));
            (&raw mut (*block.as_ptr()).alloc).write(ManuallyDrop::new(alloc));

            Ok(Parts::for_object(
                block.cast::<Header<C>>(),
                NonNull::new_unchecked(value),
            ))
        }
    }

    unsafe fn delete_object(header: NonNull<Header<C>>) {
        let block = header.cast::<Self>();
        unsafe {
            let value = UnsafeCell::raw_get(&raw const (*block.as_ptr()).value).cast::<T>();
            ptr::drop_in_place(value);
        }
    }

    unsafe fn deallocate(header: NonNull<Header<C>>) {
        let block = header.cast::<Self>();
        unsafe {
            let alloc = ManuallyDrop::into_inner(ptr::read(&raw const (*block.as_ptr()).alloc));
            alloc.deallocate(block.cast::<u8>(), Self::LAYOUT);
        }
    }
}
