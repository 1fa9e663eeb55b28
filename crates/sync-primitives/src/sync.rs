//! Atomics used by the state machines, swapped for loom's instrumented
//! versions when model checking.

#[cfg(not(feature = "loom"))]
pub use core::sync::atomic::{AtomicU32, Ordering};
#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "loom")]
pub use loom::thread;
