// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_std]
#![cfg_attr(feature = "nightly", feature(allocator_api))]
#![warn(
    missing_docs,
    clippy::empty_line_after_doc_comments,
    clippy::missing_safety_doc
)]
#![deny(unsafe_attr_outside_unsafe, unsafe_op_in_unsafe_fn)]

//! Reference-counted shared and weak pointers built on a type-erased control block.
//!
#![doc = include_str!("../Readme.md")]
//!
//! # Control blocks
//!
//! Every non-empty pointer refers to a control block, which holds a strong count, a weak
//! count, and the strategy used to destroy the managed object. While the strong count is
//! non-zero, the strong references collectively hold one weak reference. This means that:
//!
//! * the managed object is destroyed exactly once, when the strong count drops to `0`;
//! * the control block is freed exactly once, when the weak count drops to `0`, which
//!   cannot happen before the managed object is destroyed.
//!
//! A control block either owns an external pointer and a deleter (see
//! [`SharedPtr::from_raw_with()`]), or stores the managed object inline (see
//! [`SharedPtr::new()`]), in which case the pointer needs only one allocation.
//!
//! # Threads
//!
//! [`SharedPtr`] and [`WeakPtr`] use plain, non-atomic counters, and cannot be sent between
//! threads. The [`sync`] module has the same pointers with atomic counters.

#[cfg(not(any(feature = "allocator-api2", feature = "nightly")))]
compile_error!("An allocator must be provided, either through `nightly` or `allocator-api2`");

extern crate alloc;

#[cfg(test)]
extern crate std;

#[cfg(feature = "nightly")]
pub(crate) use alloc::alloc as alloc_api;

#[cfg(all(feature = "allocator-api2", not(feature = "nightly")))]
pub(crate) use allocator_api2::alloc as alloc_api;

pub mod count;
pub mod shared_ptr;
pub mod sync;
pub mod weak_ptr;

mod control_block;
#[cfg(test)]
mod tests;

pub use crate::{
    count::{Atomic, Local, RefCount},
    shared_ptr::{Shared, make_shared},
    weak_ptr::Weak,
};

/// A single-threaded reference-counted owning pointer.
///
/// See the [`shared_ptr`] module for more information.
pub type SharedPtr<T> = Shared<T, Local>;

/// A single-threaded weak pointer.
///
/// See the [`weak_ptr`] module for more information.
pub type WeakPtr<T> = Weak<T, Local>;
