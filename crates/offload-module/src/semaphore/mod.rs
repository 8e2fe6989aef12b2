//! Counting signals for the flow-control gate
//!
//! A counting signal is a classic semaphore: `post()` adds one unit,
//! `wait()` blocks the calling OS thread until a unit is available and
//! takes it. Units posted while nobody waits are kept, so a post that
//! races ahead of the matching wait is never lost.

use std::time::Duration;

/// Platform-specific counting signal
pub trait CountingSignal: Send + Sync {
    /// Take one unit, blocking until available or until `timeout` elapses.
    ///
    /// Returns `true` if a unit was taken, `false` on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool;

    /// Take one unit if available, without blocking.
    fn try_wait(&self) -> bool;

    /// Add one unit, waking one waiter if any.
    fn post(&self);

    /// Units currently available (hint, may be stale).
    fn value(&self) -> u32;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexSemaphore as Semaphore;
    } else {
        mod fallback;
        pub use fallback::CondvarSemaphore as Semaphore;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_initial_units() {
        let sem = Semaphore::new(2);
        assert_eq!(sem.value(), 2);
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.post();
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn test_wait_timeout() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(!sem.wait(Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_post_before_wait_is_kept() {
        let sem = Semaphore::new(0);
        sem.post();
        assert!(sem.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || sem2.wait(Some(Duration::MAX)));

        thread::sleep(Duration::from_millis(20));
        sem.post();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_post_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || sem2.wait(Some(Duration::from_secs(10))));

        thread::sleep(Duration::from_millis(30));
        sem.post();

        assert!(handle.join().unwrap());
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn test_units_are_conserved() {
        let sem = Arc::new(Semaphore::new(0));
        let mut handles = vec![];
        for _ in 0..4 {
            let sem = Arc::clone(&sem);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    assert!(sem.wait(Some(Duration::from_secs(10))));
                }
            }));
        }
        for _ in 0..1000 {
            sem.post();
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sem.value(), 0);
    }
}
