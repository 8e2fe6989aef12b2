//! Fallback counting semaphore using std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::CountingSignal;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub struct CondvarSemaphore {
    /// Available units
    count: Mutex<u32>,

    /// Signalled on every post
    condvar: Condvar,
}

impl CondvarSemaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }
}

impl CountingSignal for CondvarSemaphore {
    fn wait(&self, timeout: Option<Duration>) -> bool {
        // A deadline past what `Instant` can hold waits without one.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *guard == 0 {
            match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return false;
                    }
                    let (g, _) = self
                        .condvar
                        .wait_timeout(guard, d - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard = g;
                }
                None => {
                    guard = self
                        .condvar
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        *guard -= 1;
        true
    }

    fn try_wait(&self) -> bool {
        let mut guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard == 0 {
            return false;
        }
        *guard -= 1;
        true
    }

    fn post(&self) {
        {
            let mut guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
            *guard += 1;
        }
        self.condvar.notify_one();
    }

    fn value(&self) -> u32 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
