//! Low-level blocking primitives: a reader/writer mutex and a one-shot
//! initialization latch, both driven by a single atomic state word.
//!
//! # Primitives
//!
//! - [`RwMutex`]: reader/writer mutex guarding a value, with RAII guards for
//!   exclusive and shared acquisition.
//! - [`OnceLatch`]: one-shot initializer with waiter wakeup, rollback on a
//!   panicking initializer, `reset`, and `disable`.
//! - [`Lazy`]: a lazily-initialized value built on [`OnceLatch`].
//!
//! # Backends
//!
//! On Linux the state word doubles as a futex and contended paths park with
//! `FUTEX_WAIT_PRIVATE`. Elsewhere the same public contracts are backed by
//! `parking_lot`. The futex mutex is reader-friendly: shared lockers that
//! arrive while an exclusive request is pending may still join as long as no
//! exclusive holder is active, so a thread can nest shared acquisitions
//! without deadlocking against a waiting writer.
//!
//! # Loom Testing
//!
//! Enable the `loom` feature to run the state machines under the loom model
//! checker; parking becomes a yield (futexes permit spurious wakeups, so
//! every real interleaving is still explored).
//!
//! ```text
//! cargo test -p sync-primitives --features loom
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]

#[cfg(any(target_os = "linux", feature = "loom"))]
mod futex;
mod lazy;
mod mutex;
mod once;
pub mod sync;

pub use lazy::Lazy;
pub use mutex::{ExclusiveGuard, RwMutex, SharedGuard};
pub use once::OnceLatch;
