use crate::{
    SharedPtr, WeakPtr,
    alloc_api::{AllocError, Allocator, Global, Layout},
    count::{Atomic, Local, RefCount},
    make_shared, sync,
};
use core::{any::Any, cell::Cell, panic::AssertUnwindSafe, ptr::NonNull};
use std::{
    boxed::Box,
    collections::HashSet,
    format, panic,
    rc::Rc,
    string::String,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering as AtomicOrdering},
    },
    thread,
    vec::Vec,
};

#[derive(Clone, Default)]
struct CountingAlloc {
    allocs: Rc<Cell<usize>>,
    deallocs: Rc<Cell<usize>>,
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        self.allocs.set(self.allocs.get() + 1);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocs.set(self.deallocs.get() + 1);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

struct FailingAlloc;

unsafe impl Allocator for FailingAlloc {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("nothing was allocated");
    }
}

struct DropCount(Rc<Cell<u32>>);

impl Drop for DropCount {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn box_deleter(calls: Rc<Cell<u32>>) -> impl FnOnce(NonNull<i32>) + 'static {
    move |ptr| {
        calls.set(calls.get() + 1);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

#[test]
fn test_empty() {
    let shared = SharedPtr::<i32>::empty();
    assert!(SharedPtr::is_null(&shared));
    assert_eq!(SharedPtr::use_count(&shared), 0);
    assert_eq!(SharedPtr::weak_count(&shared), 0);
    assert_eq!(SharedPtr::get(&shared), None);
    assert_eq!(SharedPtr::as_ptr(&shared), None);
    assert_eq!(shared, SharedPtr::<u8>::default());

    let weak = SharedPtr::downgrade(&shared);
    assert!(weak.is_empty());
    assert!(!weak.is_alive());
    assert_eq!(weak.use_count(), 0);
    assert_eq!(weak.weak_count(), 0);
    assert!(SharedPtr::is_null(&weak.lock()));

    let weak: WeakPtr<str> = WeakPtr::default();
    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_make_shared_fields_and_destructor() {
    static DROP_COUNT: AtomicU32 = AtomicU32::new(0);

    struct Record {
        id: i32,
        name: &'static str,
    }

    impl Drop for Record {
        fn drop(&mut self) {
            DROP_COUNT.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    let record = make_shared(Record { id: 42, name: "x" });
    assert_eq!(record.id, 42);
    assert_eq!(record.name, "x");
    assert_eq!(SharedPtr::use_count(&record), 1);
    assert_eq!(DROP_COUNT.load(AtomicOrdering::SeqCst), 0);

    drop(record);
    assert_eq!(DROP_COUNT.load(AtomicOrdering::SeqCst), 1);
}

#[test]
fn test_use_count_follows_live_handles() {
    let first = SharedPtr::new(String::from("counted"));
    assert_eq!(SharedPtr::use_count(&first), 1);

    let second = SharedPtr::clone(&first);
    let third = second.clone();
    assert_eq!(SharedPtr::use_count(&first), 3);

    // A move does not touch the count.
    let moved = third;
    assert_eq!(SharedPtr::use_count(&moved), 3);

    let mut slot: SharedPtr<String> = SharedPtr::empty();
    slot.clone_from(&moved);
    assert_eq!(SharedPtr::use_count(&first), 4);

    let taken = SharedPtr::take(&mut slot);
    assert!(SharedPtr::is_null(&slot));
    assert_eq!(SharedPtr::use_count(&first), 4);

    drop(taken);
    drop(second);
    assert_eq!(SharedPtr::use_count(&first), 2);

    drop(moved);
    assert_eq!(SharedPtr::use_count(&first), 1);
    assert_eq!(first.as_str(), "counted");
}

#[test]
fn test_deleter_runs_once_after_last_copy() {
    let calls = Rc::new(Cell::new(0));
    let raw = NonNull::from(Box::leak(Box::new(17)));

    let original = unsafe { SharedPtr::from_raw_with(raw, box_deleter(Rc::clone(&calls))) };
    let copies = [
        SharedPtr::clone(&original),
        SharedPtr::clone(&original),
        SharedPtr::clone(&original),
    ];
    assert_eq!(SharedPtr::use_count(&original), 4);

    let [a, b, c] = copies;
    drop(original);
    drop(a);
    drop(b);
    assert_eq!(SharedPtr::use_count(&c), 1);
    assert_eq!(calls.get(), 0);
    assert_eq!(*c, 17);

    drop(c);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_lock_after_owner_dropped() {
    let owner = SharedPtr::new(5);
    let weak = SharedPtr::downgrade(&owner);
    assert!(weak.is_alive());
    assert_eq!(weak.use_count(), 1);

    drop(owner);

    assert!(SharedPtr::is_null(&weak.lock()));
    assert_eq!(weak.use_count(), 0);
    assert!(!weak.is_alive());
    assert!(!weak.is_empty());
}

#[test]
fn test_lock_dead_with_many_observers() {
    let owner = SharedPtr::new([0u8; 16]);
    let observers: Vec<WeakPtr<[u8; 16]>> = (0..5).map(|_| SharedPtr::downgrade(&owner)).collect();
    assert_eq!(SharedPtr::weak_count(&owner), 5);

    let locked = observers[2].lock();
    assert_eq!(SharedPtr::use_count(&owner), 2);
    drop(locked);

    drop(owner);

    for weak in &observers {
        assert!(weak.upgrade().is_none());
        assert!(SharedPtr::is_null(&weak.lock()));
        assert_eq!(weak.weak_count(), 5);
    }
}

#[test]
fn test_block_freed_once_strong_dropped_first() {
    let drops = Rc::new(Cell::new(0));
    let alloc = CountingAlloc::default();

    let shared = SharedPtr::new_in(DropCount(Rc::clone(&drops)), alloc.clone());
    let weak = SharedPtr::downgrade(&shared);
    assert_eq!(alloc.allocs.get(), 1);

    drop(shared);
    assert_eq!(drops.get(), 1);
    assert_eq!(alloc.deallocs.get(), 0);

    drop(weak);
    assert_eq!(drops.get(), 1);
    assert_eq!(alloc.deallocs.get(), 1);
    assert_eq!(alloc.allocs.get(), 1);
}

#[test]
fn test_block_freed_once_weak_dropped_first() {
    let drops = Rc::new(Cell::new(0));
    let alloc = CountingAlloc::default();

    let shared = SharedPtr::new_in(DropCount(Rc::clone(&drops)), alloc.clone());
    let weak = SharedPtr::downgrade(&shared);
    let weak_2 = weak.clone();

    drop(weak);
    drop(weak_2);
    assert_eq!(drops.get(), 0);
    assert_eq!(alloc.deallocs.get(), 0);
    assert_eq!(SharedPtr::raw_counts(&shared), Some((1, 1)));

    drop(shared);
    assert_eq!(drops.get(), 1);
    assert_eq!(alloc.deallocs.get(), 1);
}

#[test]
fn test_inplace_uses_one_allocation() {
    let alloc = CountingAlloc::default();

    let shared = SharedPtr::new_in((42u64, String::from("x")), alloc.clone());
    assert_eq!(alloc.allocs.get(), 1);

    let clones: Vec<_> = (0..10).map(|_| SharedPtr::clone(&shared)).collect();
    let weak = SharedPtr::downgrade(&shared);
    assert_eq!(alloc.allocs.get(), 1);

    drop(clones);
    drop(shared);
    drop(weak);
    assert_eq!(alloc.allocs.get(), 1);
    assert_eq!(alloc.deallocs.get(), 1);
}

#[test]
fn test_raw_pointer_block_uses_given_allocator() {
    let calls = Rc::new(Cell::new(0));
    let alloc = CountingAlloc::default();
    let raw = NonNull::from(Box::leak(Box::new(3)));

    let shared =
        unsafe { SharedPtr::from_raw_with_in(raw, box_deleter(Rc::clone(&calls)), alloc.clone()) };
    assert_eq!(alloc.allocs.get(), 1);
    assert_eq!(SharedPtr::as_ptr(&shared), Some(raw));

    drop(shared);
    assert_eq!(calls.get(), 1);
    assert_eq!(alloc.deallocs.get(), 1);
}

#[test]
fn test_allocation_failure_releases_adopted_pointer() {
    let calls = Rc::new(Cell::new(0));
    let raw = NonNull::from(Box::leak(Box::new(8)));

    let result =
        unsafe { SharedPtr::try_from_raw_with_in(raw, box_deleter(Rc::clone(&calls)), FailingAlloc) };

    assert!(matches!(result, Err(AllocError)));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_allocation_failure_inplace() {
    let drops = Rc::new(Cell::new(0));

    let result = SharedPtr::try_new_in(DropCount(Rc::clone(&drops)), FailingAlloc);
    assert!(result.is_err());
    assert_eq!(drops.get(), 1);

    let called = Cell::new(false);
    let result = SharedPtr::try_new_with_in(
        || {
            called.set(true);
            0
        },
        FailingAlloc,
    );
    assert!(result.is_err());
    assert!(!called.get());
}

#[test]
fn test_panicking_constructor_frees_block() {
    let alloc = CountingAlloc::default();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        SharedPtr::<u32>::try_new_with_in(|| panic!("constructor failed"), alloc.clone())
    }));

    assert!(result.is_err());
    assert_eq!(alloc.allocs.get(), 1);
    assert_eq!(alloc.deallocs.get(), 1);
}

#[test]
fn test_aliasing_keeps_owner_alive() {
    struct Outer {
        inner: (u32, &'static str),
        _drops: DropCount,
    }

    let drops = Rc::new(Cell::new(0));
    let outer = SharedPtr::new(Outer {
        inner: (7, "sub-object"),
        _drops: DropCount(Rc::clone(&drops)),
    });

    let inner = SharedPtr::project(&outer, |o| &o.inner);
    assert_eq!(SharedPtr::use_count(&outer), 2);
    assert_eq!(SharedPtr::use_count(&inner), 2);
    assert!(SharedPtr::owner_eq(&outer, &inner));
    assert!(outer != inner);

    drop(outer);
    assert_eq!(drops.get(), 0);
    assert_eq!(SharedPtr::use_count(&inner), 1);
    assert_eq!(*inner, (7, "sub-object"));

    let name: SharedPtr<str> = unsafe { SharedPtr::alias(&inner, NonNull::from(inner.1)) };
    assert_eq!(&*name, "sub-object");
    assert_eq!(SharedPtr::use_count(&name), 2);

    drop(inner);
    assert_eq!(drops.get(), 0);

    drop(name);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_alias_of_empty_is_empty() {
    let value = 10u8;
    let empty = SharedPtr::<u16>::empty();

    let alias: SharedPtr<u8> = unsafe { SharedPtr::alias(&empty, NonNull::from(&value)) };
    assert!(SharedPtr::is_null(&alias));

    let mapped = SharedPtr::map(SharedPtr::<(u8, u8)>::empty(), |pair| &pair.0);
    assert!(SharedPtr::is_null(&mapped));
}

#[test]
fn test_reset() {
    let drops = Rc::new(Cell::new(0));

    let mut shared = SharedPtr::new(DropCount(Rc::clone(&drops)));
    let weak = SharedPtr::downgrade(&shared);

    SharedPtr::reset(&mut shared);
    assert!(SharedPtr::is_null(&shared));
    assert_eq!(drops.get(), 1);
    assert!(!weak.is_alive());

    SharedPtr::reset_box(&mut shared, Box::new(DropCount(Rc::clone(&drops))));
    assert_eq!(SharedPtr::use_count(&shared), 1);

    let other = SharedPtr::clone(&shared);
    SharedPtr::reset_box(&mut shared, Box::new(DropCount(Rc::clone(&drops))));
    assert_eq!(drops.get(), 1);
    assert_eq!(SharedPtr::use_count(&other), 1);
    assert!(!SharedPtr::ptr_eq(&shared, &other));

    unsafe { SharedPtr::reset_raw(&mut shared, core::ptr::null_mut()) };
    assert!(SharedPtr::is_null(&shared));
    assert_eq!(drops.get(), 2);

    drop(other);
    assert_eq!(drops.get(), 3);
}

#[test]
fn test_reset_raw_with() {
    let calls = Rc::new(Cell::new(0));
    let mut shared = SharedPtr::new(1);

    let raw = NonNull::from(Box::leak(Box::new(2)));
    unsafe { SharedPtr::reset_raw_with(&mut shared, raw, box_deleter(Rc::clone(&calls))) };
    assert_eq!(*shared, 2);

    let raw = NonNull::from(Box::leak(Box::new(3)));
    unsafe { SharedPtr::reset_raw_with(&mut shared, raw, box_deleter(Rc::clone(&calls))) };
    assert_eq!(*shared, 3);
    assert_eq!(calls.get(), 1);

    SharedPtr::reset(&mut shared);
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_clone_from() {
    let a = SharedPtr::new(1);
    let mut b = SharedPtr::clone(&a);

    b.clone_from(&a);
    assert_eq!(SharedPtr::raw_counts(&a), Some((2, 1)));

    let c = SharedPtr::new(2);
    b.clone_from(&c);
    assert_eq!(SharedPtr::use_count(&a), 1);
    assert_eq!(SharedPtr::use_count(&c), 2);
    assert_eq!(*b, 2);

    let weak_a = SharedPtr::downgrade(&a);
    let mut weak_b = weak_a.clone();
    weak_b.clone_from(&weak_a);
    assert_eq!(weak_a.weak_count(), 2);

    weak_b.clone_from(&SharedPtr::downgrade(&c));
    assert_eq!(weak_a.weak_count(), 1);
    assert!(weak_b.ptr_eq(&SharedPtr::downgrade(&c)));
}

#[test]
fn test_swap() {
    let mut a = SharedPtr::new('a');
    let mut b = SharedPtr::new('b');
    SharedPtr::swap(&mut a, &mut b);
    assert_eq!((*a, *b), ('b', 'a'));
    assert_eq!(SharedPtr::use_count(&a), 1);

    let mut weak_a = SharedPtr::downgrade(&a);
    let mut weak_b = WeakPtr::new();
    weak_a.swap(&mut weak_b);
    assert!(weak_a.is_empty());
    assert_eq!(*weak_b.lock(), 'b');

    weak_b.reset();
    assert!(weak_b.is_empty());
    assert_eq!(SharedPtr::weak_count(&a), 0);
}

#[test]
fn test_counts_hold_implicit_weak() {
    let shared = SharedPtr::new(0u8);
    assert_eq!(SharedPtr::raw_counts(&shared), Some((1, 1)));

    let weak = SharedPtr::downgrade(&shared);
    assert_eq!(SharedPtr::raw_counts(&shared), Some((1, 2)));
    assert_eq!(SharedPtr::weak_count(&shared), 1);
    assert_eq!(weak.weak_count(), 1);

    let shared_2 = weak.upgrade().unwrap();
    assert_eq!(SharedPtr::raw_counts(&shared), Some((2, 2)));

    drop(shared);
    drop(shared_2);
    assert_eq!(weak.use_count(), 0);
    assert_eq!(weak.weak_count(), 1);
}

#[test]
fn test_equality_uses_access_pointer() {
    let a = SharedPtr::new(1);
    let b = SharedPtr::new(1);
    let a_2 = SharedPtr::clone(&a);

    assert_ne!(a, b);
    assert_eq!(a, a_2);
    assert_eq!(*a, *b);
    assert_eq!(SharedPtr::<i32>::empty(), SharedPtr::<i32>::empty());
    assert_ne!(a, SharedPtr::<i32>::empty());

    let mut set = HashSet::new();
    set.insert(SharedPtr::clone(&a));
    set.insert(a_2);
    set.insert(b);
    assert_eq!(set.len(), 2);
    assert!(set.contains(&a));
}

#[test]
fn test_get_mut() {
    let mut shared = SharedPtr::new(String::from("one"));

    SharedPtr::get_mut(&mut shared).unwrap().push_str(" two");
    assert_eq!(shared.as_str(), "one two");

    let other = SharedPtr::clone(&shared);
    assert!(SharedPtr::get_mut(&mut shared).is_none());
    drop(other);

    let weak = SharedPtr::downgrade(&shared);
    assert!(SharedPtr::get_mut(&mut shared).is_none());
    drop(weak);

    assert!(SharedPtr::get_mut(&mut shared).is_some());
    assert!(SharedPtr::get_mut(&mut SharedPtr::<String>::empty()).is_none());
}

#[test]
fn test_get_mut_needs_managed_object() {
    static ANSWER: u32 = 42;

    let mut mapped = SharedPtr::map(SharedPtr::new(0u8), |_| &ANSWER);
    assert_eq!(SharedPtr::use_count(&mapped), 1);
    assert!(SharedPtr::get_mut(&mut mapped).is_none());
    assert_eq!(*mapped, 42);

    let pair = SharedPtr::new((1u8, 2u8));
    let mut second = SharedPtr::project(&pair, |p| &p.1);
    drop(pair);
    assert_eq!(SharedPtr::use_count(&second), 1);
    assert!(SharedPtr::get_mut(&mut second).is_none());

    let value = SharedPtr::new(5i64);
    let mut aliased: SharedPtr<i64> = unsafe { SharedPtr::alias(&value, NonNull::from(&*value)) };
    drop(value);
    assert!(SharedPtr::get_mut(&mut aliased).is_none());

    // An upgraded weak pointer keeps the access it was downgraded with.
    let weak = SharedPtr::downgrade(&aliased);
    let mut upgraded = weak.lock();
    drop(weak);
    drop(aliased);
    assert!(SharedPtr::get_mut(&mut upgraded).is_none());
}

#[test]
fn test_get_mut_after_downcast() {
    let boxed: Box<dyn Any> = Box::new(3u16);
    let erased = SharedPtr::from_box(boxed);
    let mut value = SharedPtr::<dyn Any>::downcast::<u16>(erased).unwrap();

    *SharedPtr::get_mut(&mut value).unwrap() += 1;
    assert_eq!(*value, 4);

    let erased: SharedPtr<dyn Any> = SharedPtr::map(value, |v| v as &(dyn Any + 'static));
    let mut value = SharedPtr::<dyn Any>::downcast::<u16>(erased).unwrap();
    assert!(SharedPtr::get_mut(&mut value).is_none());
}

#[test]
fn test_weak_project() {
    let pair = SharedPtr::new((7u32, String::from("seven")));
    let weak = SharedPtr::downgrade(&pair);

    let name = weak.project(|p| &p.1);
    assert!(name.owner_eq(&weak));
    assert_eq!(weak.weak_count(), 2);
    assert_eq!(name.lock().as_str(), "seven");

    drop(pair);
    assert!(!name.is_alive());
    assert!(weak.project(|p| &p.0).is_empty());
}

#[test]
#[should_panic(expected = "dereferenced an empty shared pointer")]
fn test_deref_empty_panics() {
    let empty = SharedPtr::<i32>::empty();
    let value: i32 = *empty;
    let _ = value;
}

#[test]
fn test_type_erasure() {
    trait Shape {
        fn area(&self) -> f64;
    }

    struct Square(f64);

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.0 * self.0
        }
    }

    let square = SharedPtr::new(Square(2.0));
    let shape: SharedPtr<dyn Shape> =
        SharedPtr::project(&square, |s| s as &(dyn Shape + 'static));
    assert_eq!(shape.area(), 4.0);
    assert!(SharedPtr::ptr_eq(&square, &shape));

    let boxed: Box<dyn Shape> = Box::new(Square(3.0));
    let shape = SharedPtr::from_box(boxed);
    assert_eq!(shape.area(), 9.0);

    let erased: SharedPtr<dyn Any> = SharedPtr::map(square, |s| s as &(dyn Any + 'static));
    let erased = SharedPtr::<dyn Any>::downcast::<u8>(erased).unwrap_err();
    let square = SharedPtr::<dyn Any>::downcast::<Square>(erased).unwrap_or_else(|_| unreachable!());
    assert_eq!(square.0, 2.0);

    assert!(SharedPtr::<dyn Any>::downcast::<u8>(SharedPtr::<dyn Any>::empty()).is_err());
}

#[test]
fn test_debug() {
    let shared = SharedPtr::new(5);
    assert_eq!(format!("{shared:?}"), "5");
    assert_eq!(format!("{:?}", SharedPtr::<i32>::empty()), "<empty>");
    assert_eq!(format!("{shared}"), "5");

    let weak = SharedPtr::downgrade(&shared);
    assert_eq!(format!("{weak:?}"), "WeakPtr(5)");

    drop(shared);
    assert_eq!(format!("{weak:?}"), "WeakPtr(<destroyed>)");
    assert_eq!(format!("{:?}", WeakPtr::<i32>::new()), "WeakPtr(<empty>)");
}

#[test]
fn test_weak_owner_eq() {
    let pair = SharedPtr::new((1u8, 2u8));
    let first = SharedPtr::project(&pair, |p| &p.0);
    let second = SharedPtr::project(&pair, |p| &p.1);

    let weak_first = SharedPtr::downgrade(&first);
    let weak_second = WeakPtr::from(&second);

    assert!(weak_first.owner_eq(&weak_second));
    assert!(!weak_first.ptr_eq(&weak_second));
    assert!(weak_first.ptr_eq(&SharedPtr::downgrade(&pair)));
}

#[test]
#[should_panic(expected = "refcount underflow")]
fn test_local_underflow() {
    let count = Local::new(0);
    let _ = count.decrement();
}

#[test]
fn test_atomic_counter() {
    let count = Atomic::new(0);
    assert!(!count.increment_if_nonzero());
    assert_eq!(count.get(), 0);

    count.increment();
    assert!(count.increment_if_nonzero());
    assert_eq!(count.get(), 2);
    assert_eq!(count.decrement(), 1);
    assert_eq!(count.decrement(), 0);
}

#[test]
fn test_sync_concurrent_clone_and_drop() {
    static DROP_COUNT: AtomicU32 = AtomicU32::new(0);

    struct CountDrops;

    impl Drop for CountDrops {
        fn drop(&mut self) {
            DROP_COUNT.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    let shared = sync::SharedPtr::new(CountDrops);

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let shared = sync::SharedPtr::clone(&shared);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let local = sync::SharedPtr::clone(&shared);
                    let weak = sync::SharedPtr::downgrade(&local);
                    assert!(weak.is_alive());
                    drop(local);
                }
            })
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(sync::SharedPtr::use_count(&shared), 1);
    assert_eq!(sync::SharedPtr::weak_count(&shared), 0);
    assert_eq!(DROP_COUNT.load(AtomicOrdering::SeqCst), 0);

    drop(shared);
    assert_eq!(DROP_COUNT.load(AtomicOrdering::SeqCst), 1);
}

#[test]
fn test_sync_lock_races_last_drop() {
    let shared = sync::make_shared(5u64);
    let weak = sync::SharedPtr::downgrade(&shared);

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let weak = weak.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    if let Some(value) = weak.upgrade() {
                        assert_eq!(*value, 5);
                    }
                }
            })
        })
        .collect();

    drop(shared);

    for thread in threads {
        thread.join().unwrap();
    }

    assert!(weak.upgrade().is_none());
    assert_eq!(weak.use_count(), 0);
    assert_eq!(weak.weak_count(), 1);
}

#[test]
fn test_sync_project_across_threads() {
    let owner = sync::SharedPtr::new((String::from("payload"), 9u8));
    let byte = sync::SharedPtr::project(&owner, |p| &p.1);
    let weak_name = sync::SharedPtr::downgrade(&owner).project(|p| &p.0);
    drop(owner);

    let thread = thread::spawn(move || {
        assert_eq!(*byte, 9);
        assert_eq!(weak_name.lock().as_str(), "payload");
        drop(byte);
        weak_name
    });

    let weak_name = thread.join().unwrap();
    assert!(!weak_name.is_alive());
}

#[cfg(feature = "serde")]
#[test]
fn test_serialize() {
    let shared = SharedPtr::new(String::from("value"));
    assert_eq!(serde_json::to_string(&shared).unwrap(), r#""value""#);

    let pair = SharedPtr::new((1u8, [2u8, 3]));
    let array = SharedPtr::project(&pair, |p| &p.1);
    assert_eq!(serde_json::to_string(&array).unwrap(), "[2,3]");

    let empty = SharedPtr::<String>::empty();
    assert_eq!(serde_json::to_string(&empty).unwrap(), "null");

    let list = [sync::SharedPtr::new(1), sync::SharedPtr::empty(), sync::make_shared(3)];
    assert_eq!(serde_json::to_string(&list).unwrap(), "[1,null,3]");
}

#[test]
fn test_sync_deleter_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let raw = NonNull::from(Box::leak(Box::new(11u32)));

    let deleter = {
        let calls = Arc::clone(&calls);
        move |ptr: NonNull<u32>| {
            calls.fetch_add(1, AtomicOrdering::SeqCst);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    };

    let shared = unsafe { sync::SharedPtr::from_raw_with(raw, deleter) };

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let shared = sync::SharedPtr::clone(&shared);
            thread::spawn(move || assert_eq!(*shared, 11))
        })
        .collect();

    drop(shared);

    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
}
