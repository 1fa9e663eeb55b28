//! One-shot initialization latch.

use crate::sync::{AtomicU32, Ordering};

#[cfg(any(target_os = "linux", feature = "loom"))]
use crate::futex;

const UNINITIALIZED: u32 = 0;
const INITIALIZING: u32 = 1;
const INITIALIZING_WITH_WAITERS: u32 = 2;
const INITIALIZED: u32 = 3;
const DISABLED: u32 = 4;

/// Coordinates first-caller-wins initialization across threads.
///
/// The first thread through [`run_once`](Self::run_once) runs the
/// initializer while the rest park until it finishes. A panicking
/// initializer rolls the latch back to uninitialized and releases the
/// waiters, which then race to initialize in its place; a failed attempt
/// does not poison the latch.
///
/// [`reset`](Self::reset) re-arms an initialized latch and
/// [`disable`](Self::disable) retires it permanently; both are for teardown
/// and test scaffolding, and it is the caller's job to ensure no consumer
/// still relies on the previously initialized state.
pub struct OnceLatch {
    state: AtomicU32,
    #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
    mutex: parking_lot::Mutex<()>,
}

impl OnceLatch {
    pub fn new() -> Self {
        OnceLatch {
            state: AtomicU32::new(UNINITIALIZED),
            #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
            mutex: parking_lot::Mutex::new(()),
        }
    }

    /// Run `init` if the latch has never been initialized, or wait for the
    /// in-flight initializer to finish.
    ///
    /// Returns with the latch initialized, unless it was (or becomes)
    /// disabled. Calling `run_once` from inside `init` on the same latch
    /// deadlocks.
    pub fn run_once(&self, init: impl FnOnce()) {
        #[cfg(any(target_os = "linux", feature = "loom"))]
        self.run_once_futex(init);
        #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
        self.run_once_fallback(init);
    }

    /// Whether a completed initialization is visible to this thread.
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == INITIALIZED
    }

    /// Move an initialized latch back to uninitialized so the next
    /// [`run_once`](Self::run_once) reinitializes.
    ///
    /// A disabled latch stays disabled, silently. Panics if the latch is in
    /// any other state: resetting mid-initialization (or before the first
    /// one) is a caller bug.
    pub fn reset(&self) {
        if let Err(state) =
            self.state
                .compare_exchange(INITIALIZED, UNINITIALIZED, Ordering::Release, Ordering::Relaxed)
        {
            assert!(state == DISABLED, "reset() called while not initialized");
        }
    }

    /// Permanently retire the latch: present and future
    /// [`run_once`](Self::run_once) calls return without initializing.
    ///
    /// If an initializer is mid-flight, waits for it to finish (or fail)
    /// first, so no initialization can still be running once `disable`
    /// returns.
    pub fn disable(&self) {
        #[cfg(any(target_os = "linux", feature = "loom"))]
        self.disable_futex();
        #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
        self.disable_fallback();
    }

    #[cfg(any(target_os = "linux", feature = "loom"))]
    fn run_once_futex(&self, init: impl FnOnce()) {
        'start_over: loop {
            match self.state.compare_exchange(
                UNINITIALIZED,
                INITIALIZING,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // We own the initialization. If `init` unwinds, the
                    // rollback guard reverts the state and frees the waiters
                    // to try again.
                    let rollback = Rollback { latch: self };
                    init();
                    core::mem::forget(rollback);

                    if self.state.swap(INITIALIZED, Ordering::Release)
                        == INITIALIZING_WITH_WAITERS
                    {
                        futex::wake_all(&self.state);
                    }
                    return;
                }
                Err(mut state) => loop {
                    if state == INITIALIZED || state == DISABLED {
                        return;
                    } else if state == INITIALIZING {
                        // Flag that someone is waiting before parking.
                        match self.state.compare_exchange_weak(
                            state,
                            INITIALIZING_WITH_WAITERS,
                            Ordering::Acquire,
                            Ordering::Acquire,
                        ) {
                            Ok(_) => {}
                            Err(actual) => {
                                state = actual;
                                continue;
                            }
                        }
                    } else {
                        debug_assert_eq!(state, INITIALIZING_WITH_WAITERS);
                    }

                    futex::wait(&self.state, INITIALIZING_WITH_WAITERS);
                    state = self.state.load(Ordering::Acquire);

                    if state == UNINITIALIZED {
                        // The initializer gave up; race to take its place.
                        continue 'start_over;
                    }
                },
            }
        }
    }

    #[cfg(any(target_os = "linux", feature = "loom"))]
    fn disable_futex(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            match state {
                DISABLED => return,
                UNINITIALIZED | INITIALIZED => {
                    match self.state.compare_exchange_weak(
                        state,
                        DISABLED,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return,
                        Err(actual) => state = actual,
                    }
                }
                INITIALIZING => {
                    match self.state.compare_exchange_weak(
                        state,
                        INITIALIZING_WITH_WAITERS,
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            futex::wait(&self.state, INITIALIZING_WITH_WAITERS);
                            state = self.state.load(Ordering::Acquire);
                        }
                        Err(actual) => state = actual,
                    }
                }
                _ => {
                    debug_assert_eq!(state, INITIALIZING_WITH_WAITERS);
                    futex::wait(&self.state, INITIALIZING_WITH_WAITERS);
                    state = self.state.load(Ordering::Acquire);
                }
            }
        }
    }

    #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
    fn run_once_fallback(&self, init: impl FnOnce()) {
        let _guard = self.mutex.lock();
        if self.state.load(Ordering::Relaxed) != UNINITIALIZED {
            return;
        }
        // A panic in `init` unwinds through the mutex guard with the state
        // still UNINITIALIZED, which is exactly the rollback we need.
        init();
        self.state.store(INITIALIZED, Ordering::Release);
    }

    #[cfg(all(not(target_os = "linux"), not(feature = "loom")))]
    fn disable_fallback(&self) {
        let _guard = self.mutex.lock();
        self.state.store(DISABLED, Ordering::Relaxed);
    }
}

impl Default for OnceLatch {
    fn default() -> Self {
        OnceLatch::new()
    }
}

/// Reverts a failed initialization and releases waiters.
#[cfg(any(target_os = "linux", feature = "loom"))]
struct Rollback<'a> {
    latch: &'a OnceLatch,
}

#[cfg(any(target_os = "linux", feature = "loom"))]
impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.latch.state.swap(UNINITIALIZED, Ordering::Release) == INITIALIZING_WITH_WAITERS {
            futex::wake_all(&self.latch.state);
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicU32 as StdAtomicU32, Ordering as StdOrdering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn initializes_exactly_once() {
        let latch = Arc::new(OnceLatch::new());
        let runs = Arc::new(StdAtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let latch = latch.clone();
            let runs = runs.clone();
            handles.push(thread::spawn(move || {
                latch.run_once(|| {
                    runs.fetch_add(1, StdOrdering::SeqCst);
                });
                assert!(latch.is_initialized());
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(runs.load(StdOrdering::SeqCst), 1);

        latch.run_once(|| {
            runs.fetch_add(1, StdOrdering::SeqCst);
        });
        assert_eq!(runs.load(StdOrdering::SeqCst), 1);
    }

    #[test]
    fn waiters_block_until_initialized() {
        let latch = Arc::new(OnceLatch::new());
        let started = Arc::new(StdAtomicU32::new(0));
        let value = Arc::new(StdAtomicU32::new(0));

        let handle = {
            let latch = latch.clone();
            let started = started.clone();
            let value = value.clone();
            thread::spawn(move || {
                latch.run_once(|| {
                    started.store(1, StdOrdering::Relaxed);
                    thread::sleep(Duration::from_millis(20));
                    value.store(123, StdOrdering::Relaxed);
                });
            })
        };

        // Enter run_once only after the initializer is underway, so this
        // call takes the waiter path.
        while started.load(StdOrdering::Relaxed) == 0 {
            thread::yield_now();
        }
        latch.run_once(|| value.store(456, StdOrdering::Relaxed));
        assert_eq!(value.load(StdOrdering::Relaxed), 123);
        handle.join().unwrap();
    }

    #[test]
    fn panicking_initializer_does_not_poison() {
        let latch = OnceLatch::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            latch.run_once(|| panic!("init failed"));
        }));
        assert!(result.is_err());
        assert!(!latch.is_initialized());

        let mut ran = false;
        latch.run_once(|| ran = true);
        assert!(ran);
        assert!(latch.is_initialized());
    }

    #[test]
    fn reset_rearms_the_latch() {
        let latch = OnceLatch::new();
        let runs = StdAtomicU32::new(0);

        latch.run_once(|| {
            runs.fetch_add(1, StdOrdering::SeqCst);
        });
        latch.reset();
        assert!(!latch.is_initialized());
        latch.run_once(|| {
            runs.fetch_add(1, StdOrdering::SeqCst);
        });
        assert_eq!(runs.load(StdOrdering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "reset() called while not initialized")]
    fn reset_before_initialization_panics() {
        let latch = OnceLatch::new();
        latch.reset();
    }

    #[test]
    fn disable_retires_the_latch() {
        let latch = OnceLatch::new();
        latch.disable();

        let mut ran = false;
        latch.run_once(|| ran = true);
        assert!(!ran);
        assert!(!latch.is_initialized());

        // reset is a silent no-op on a disabled latch; disable is terminal.
        latch.reset();
        latch.disable();
        let mut ran = false;
        latch.run_once(|| ran = true);
        assert!(!ran);
    }

    #[test]
    fn disable_waits_for_inflight_initializer() {
        let latch = Arc::new(OnceLatch::new());
        let started = Arc::new(StdAtomicU32::new(0));
        let finished = Arc::new(StdAtomicU32::new(0));

        let handle = {
            let latch = latch.clone();
            let started = started.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                latch.run_once(|| {
                    started.store(1, StdOrdering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    finished.store(1, StdOrdering::SeqCst);
                });
            })
        };

        while started.load(StdOrdering::SeqCst) == 0 {
            thread::yield_now();
        }
        latch.disable();
        // The initializer ran to completion before disable returned.
        assert_eq!(finished.load(StdOrdering::SeqCst), 1);
        handle.join().unwrap();
    }
}
