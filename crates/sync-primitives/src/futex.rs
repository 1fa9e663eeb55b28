//! Park/wake on an atomic word.
//!
//! Thin wrapper over the Linux futex syscall. Under loom, parking is a
//! yield: a futex wait may return spuriously anyway, so every caller
//! re-checks the word in a loop, and the yield lets the model checker
//! explore exactly those interleavings.

use crate::sync::AtomicU32;

/// Park the calling thread while `*word == expected`.
///
/// May return spuriously, or immediately if the word already changed
/// (EAGAIN) or a signal arrived (EINTR); callers always re-check in a loop,
/// so the result is ignored.
#[cfg(all(target_os = "linux", not(feature = "loom")))]
pub(crate) fn wait(word: &AtomicU32, expected: u32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
            core::ptr::null_mut::<u32>(),
            0u32,
        );
    }
}

/// Wake every thread parked on `word`.
///
/// Waking all is deliberate: a mix of shared and exclusive waiters must all
/// re-evaluate the word, and waking a subset could strand the rest.
#[cfg(all(target_os = "linux", not(feature = "loom")))]
pub(crate) fn wake_all(word: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            i32::MAX,
            core::ptr::null::<libc::timespec>(),
            core::ptr::null_mut::<u32>(),
            0u32,
        );
    }
}

#[cfg(feature = "loom")]
pub(crate) fn wait(_word: &AtomicU32, _expected: u32) {
    loom::thread::yield_now();
}

#[cfg(feature = "loom")]
pub(crate) fn wake_all(_word: &AtomicU32) {}
