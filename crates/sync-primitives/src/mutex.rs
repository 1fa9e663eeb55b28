//! Reader/writer mutex over a single 32-bit state word.
//!
//! State layout (futex backend):
//!
//! ```text
//! bit 31      EXCLUSIVE_HELD       an exclusive holder is active
//! bit 30      EXCLUSIVE_REQUESTED  an exclusive waiter is parked
//! bits 0..30  shared holder count
//! ```
//!
//! `EXCLUSIVE_HELD` with a zero count and a nonzero count are mutually
//! exclusive; the request bit may accompany either while a writer waits.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

#[cfg(any(target_os = "linux", feature = "loom"))]
mod raw {
    use crate::futex;
    use crate::sync::{AtomicU32, Ordering};

    const EXCLUSIVE_HELD: u32 = 1 << 31;
    const EXCLUSIVE_REQUESTED: u32 = 1 << 30;
    const SHARED_COUNT_MASK: u32 = EXCLUSIVE_REQUESTED - 1;

    pub(super) struct RawRwMutex {
        state: AtomicU32,
    }

    impl RawRwMutex {
        pub(super) fn new() -> Self {
            RawRwMutex {
                state: AtomicU32::new(0),
            }
        }

        pub(super) fn lock_exclusive(&self) {
            loop {
                match self
                    .state
                    .compare_exchange(0, EXCLUSIVE_HELD, Ordering::Acquire, Ordering::Relaxed)
                {
                    Ok(_) => return,
                    Err(mut state) => {
                        // Contended. Make sure the request bit is up before
                        // parking so unlockers know to wake us.
                        if state & EXCLUSIVE_REQUESTED == 0 {
                            if self
                                .state
                                .compare_exchange(
                                    state,
                                    state | EXCLUSIVE_REQUESTED,
                                    Ordering::Relaxed,
                                    Ordering::Relaxed,
                                )
                                .is_err()
                            {
                                // State moved under us; start over.
                                continue;
                            }
                            state |= EXCLUSIVE_REQUESTED;
                        }
                        futex::wait(&self.state, state);
                    }
                }
            }
        }

        pub(super) fn lock_shared(&self) {
            // Join the shared count up front; even if an exclusive holder is
            // active we stay counted and merely wait for the bit to clear.
            // This is what makes the lock reader-friendly: a pending
            // exclusive *request* does not stop us.
            let mut state = self.state.fetch_add(1, Ordering::Acquire) + 1;
            while state & EXCLUSIVE_HELD != 0 {
                futex::wait(&self.state, state);
                state = self.state.load(Ordering::Acquire);
            }
        }

        pub(super) fn unlock_exclusive(&self) {
            let old = self.state.fetch_and(
                !(EXCLUSIVE_HELD | EXCLUSIVE_REQUESTED),
                Ordering::Release,
            );
            debug_assert!(old & EXCLUSIVE_HELD != 0, "unlocked a mutex that was not locked");

            if old & !EXCLUSIVE_HELD != 0 {
                // Shared waiters now collectively hold the lock; exclusive
                // waiters must run to re-assert the request bit we cleared.
                futex::wake_all(&self.state);
            }
        }

        pub(super) fn unlock_shared(&self) {
            let state = self.state.fetch_sub(1, Ordering::Release) - 1;
            debug_assert!(
                state.wrapping_add(1) & SHARED_COUNT_MASK != 0,
                "unshared a mutex that was not shared"
            );

            // Only an exclusive waiter can be parked at this point, and only
            // the last shared holder out should wake it.
            if state == EXCLUSIVE_REQUESTED
                && self
                    .state
                    .compare_exchange(state, 0, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                // All of them: one claims the lock, the rest re-assert the
                // request bit.
                futex::wake_all(&self.state);
            }
        }

        pub(super) fn assert_locked_exclusive(&self) {
            assert!(
                self.state.load(Ordering::Relaxed) & EXCLUSIVE_HELD != 0,
                "tried to access a value as already locked, but the lock is not held exclusively"
            );
        }

        pub(super) fn assert_locked_shared(&self) {
            assert!(
                self.state.load(Ordering::Relaxed) & SHARED_COUNT_MASK != 0,
                "tried to access a value as already locked, but the lock is not held in shared mode"
            );
        }
    }
}

#[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
mod raw {
    use parking_lot::lock_api::RawRwLock as _;

    pub(super) struct RawRwMutex {
        lock: parking_lot::RawRwLock,
    }

    impl RawRwMutex {
        pub(super) fn new() -> Self {
            RawRwMutex {
                lock: parking_lot::RawRwLock::INIT,
            }
        }

        pub(super) fn lock_exclusive(&self) {
            self.lock.lock_exclusive();
        }

        pub(super) fn lock_shared(&self) {
            self.lock.lock_shared();
        }

        pub(super) fn unlock_exclusive(&self) {
            unsafe { self.lock.unlock_exclusive() }
        }

        pub(super) fn unlock_shared(&self) {
            unsafe { self.lock.unlock_shared() }
        }

        pub(super) fn assert_locked_exclusive(&self) {
            // A successful shared try-lock proves nobody holds the lock
            // exclusively, which is exactly the failure case.
            if self.lock.try_lock_shared() {
                unsafe { self.lock.unlock_shared() };
                panic!("tried to access a value as already locked, but the lock is not held exclusively");
            }
        }

        pub(super) fn assert_locked_shared(&self) {
            if self.lock.try_lock_exclusive() {
                unsafe { self.lock.unlock_exclusive() };
                panic!("tried to access a value as already locked, but the lock is not held in shared mode");
            }
        }
    }
}

/// Reader/writer mutex guarding a value.
///
/// [`lock_exclusive`](Self::lock_exclusive) grants a mutable view to one
/// thread at a time; [`lock_shared`](Self::lock_shared) grants shared
/// read-only views. Both block indefinitely; timeouts, when needed, belong
/// to the caller. The lock is not reentrant: a thread holding an exclusive
/// guard deadlocks if it acquires again.
pub struct RwMutex<T> {
    raw: raw::RawRwMutex,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwMutex<T> {}
unsafe impl<T: Send + Sync> Sync for RwMutex<T> {}

impl<T> RwMutex<T> {
    pub fn new(value: T) -> Self {
        RwMutex {
            raw: raw::RawRwMutex::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Block until this thread is the only holder, then return a mutable
    /// guard.
    pub fn lock_exclusive(&self) -> ExclusiveGuard<'_, T> {
        self.raw.lock_exclusive();
        ExclusiveGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Block until no exclusive holder is active, then return a shared
    /// guard.
    pub fn lock_shared(&self) -> SharedGuard<'_, T> {
        self.raw.lock_shared();
        SharedGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Panic unless *some* thread currently holds the lock exclusively.
    ///
    /// Cannot distinguish the calling thread from another holder; it is a
    /// sanity check for code paths that are only reachable under the lock.
    pub fn assert_locked_exclusive(&self) {
        self.raw.assert_locked_exclusive();
    }

    /// Panic unless the lock currently has at least one shared holder.
    pub fn assert_locked_shared(&self) {
        self.raw.assert_locked_shared();
    }

    /// Access the value without locking; `&mut self` proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> fmt::Debug for RwMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwMutex").finish_non_exhaustive()
    }
}

/// RAII guard for an exclusive acquisition; unlocks on drop.
pub struct ExclusiveGuard<'a, T> {
    mutex: &'a RwMutex<T>,
    _not_send: PhantomData<*mut ()>,
}

impl<T> Deref for ExclusiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for ExclusiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for ExclusiveGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock_exclusive();
    }
}

/// RAII guard for a shared acquisition; unlocks on drop.
pub struct SharedGuard<'a, T> {
    mutex: &'a RwMutex<T>,
    _not_send: PhantomData<*mut ()>,
}

impl<T> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> Drop for SharedGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock_shared();
    }
}
