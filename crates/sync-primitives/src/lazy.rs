//! Lazily-initialized value on top of [`OnceLatch`].

use core::cell::UnsafeCell;
use core::fmt;

use crate::once::OnceLatch;

/// A value initialized by the first caller of [`get`](Self::get).
///
/// Later callers (and concurrent ones, which block while the first
/// initializer runs) all see the same value. If the initializer panics the
/// latch rolls back, and the next `get` runs its own initializer: the same
/// no-poisoning policy as [`OnceLatch`].
///
/// `Lazy` deliberately exposes neither `reset` nor `disable`: handed-out
/// `&T` borrows must stay valid for the lifetime of the `Lazy`.
pub struct Lazy<T> {
    latch: OnceLatch,
    value: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send> Send for Lazy<T> {}
unsafe impl<T: Send + Sync> Sync for Lazy<T> {}

impl<T> Lazy<T> {
    pub fn new() -> Self {
        Lazy {
            latch: OnceLatch::new(),
            value: UnsafeCell::new(None),
        }
    }

    /// The value, running `init` to produce it if no call got there first.
    pub fn get(&self, init: impl FnOnce() -> T) -> &T {
        self.latch.run_once(|| {
            let value = init();
            // Sole initializer: everyone else is parked in run_once, and
            // readers only dereference after the latch flips to initialized.
            unsafe { *self.value.get() = Some(value) };
        });
        let value = unsafe { &*self.value.get() };
        value
            .as_ref()
            .expect("latch initialized without storing a value")
    }

    /// The value, if some initializer already completed.
    pub fn get_if_initialized(&self) -> Option<&T> {
        if !self.latch.is_initialized() {
            return None;
        }
        unsafe { (*self.value.get()).as_ref() }
    }
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Lazy::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get_if_initialized() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<uninitialized>)"),
        }
    }
}
