//! Linux futex-based counting semaphore
//!
//! The futex word is the unit count itself:
//! - waiters FUTEX_WAIT on the word while it reads 0
//! - `post()` increments the word, then FUTEX_WAKEs one waiter
//!
//! A post landing between a failed `try_wait()` and the FUTEX_WAIT makes
//! the kernel see a non-zero word, so the wait returns EAGAIN and the
//! waiter retries instead of sleeping through it.

use super::CountingSignal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

pub struct FutexSemaphore {
    /// Futex word: available units
    count: AtomicU32,

    /// Threads inside FUTEX_WAIT (skip the wake syscall when 0)
    waiters: AtomicU32,
}

impl FutexSemaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            waiters: AtomicU32::new(0),
        }
    }

    fn futex_wait(&self, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Sleep only while the word still reads 0. ETIMEDOUT, EAGAIN and
        // EINTR all send the caller back to its retry loop.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.count.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake_one(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.count.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl CountingSignal for FutexSemaphore {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        // A deadline past what `Instant` can hold waits without one.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            if self.try_wait() {
                return true;
            }

            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return false;
                    }
                    Some(d - now)
                }
                None => None,
            };

            self.waiters.fetch_add(1, Ordering::SeqCst);
            self.futex_wait(remaining);
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn try_wait(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn post(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) > 0 {
            self.futex_wake_one();
        }
    }

    fn value(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

// Safety: FutexSemaphore only contains atomics
unsafe impl Send for FutexSemaphore {}
unsafe impl Sync for FutexSemaphore {}
