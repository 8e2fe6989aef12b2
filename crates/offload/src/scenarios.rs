//! End-to-end scenarios: coordinator + poll driver + simulated hardware.

use crate::{
    AcquirePolicy, AsyncOp, Carrier, Coordinator, CoordinatorConfig, Job, OffloadError, OffloadRequest,
    SimAccelerator, SubmitStatus, TaskType, ThreadJob, YieldJob, ERR_HW_FATAL,
};
use offload_module::FlowGate;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Doubles its input on the simulated accelerator.
struct DoubleRequest {
    sim: Arc<SimAccelerator>,
    input: u64,
    hw_out: Arc<AtomicU64>,
}

impl DoubleRequest {
    fn new(sim: &Arc<SimAccelerator>, input: u64) -> Self {
        Self {
            sim: Arc::clone(sim),
            input,
            hw_out: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl OffloadRequest for DoubleRequest {
    fn task_type(&self) -> TaskType {
        self.sim.task_type()
    }

    fn submit_sync(&mut self) -> i32 {
        let input = self.input;
        let out = &self.hw_out;
        self.sim.submit_sync(|| {
            out.store(input * 2, Ordering::Release);
            0
        })
    }

    fn submit_async(&mut self, carrier: Carrier) -> SubmitStatus {
        let input = self.input;
        let out = Arc::clone(&self.hw_out);
        self.sim.submit_async(carrier, move || {
            out.store(input * 2, Ordering::Release);
            0
        })
    }
}

fn thread_op() -> Arc<AsyncOp> {
    AsyncOp::with_job(Arc::new(ThreadJob::new()))
}

fn coordinator(config: CoordinatorConfig, sims: &[Arc<SimAccelerator>]) -> Coordinator {
    let mut builder = Coordinator::builder(config.poll_idle(Duration::from_millis(2)));
    for sim in sims {
        builder = builder.register_drain(sim.task_type(), sim.clone());
    }
    builder.start().unwrap()
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

/// xorshift64, enough to scatter delays
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[test]
fn test_happy_path() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Cipher, 16));
    let coord = Arc::new(coordinator(CoordinatorConfig::new().capacity(4), &[sim.clone()]));
    sim.hold();

    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let coord = Arc::clone(&coord);
            let sim = Arc::clone(&sim);
            thread::spawn(move || {
                let op = thread_op();
                let mut req = DoubleRequest::new(&sim, i);
                let r = coord.execute(&op, &mut req);
                (r, op.is_done(), req.hw_out.load(Ordering::Acquire))
            })
        })
        .collect();

    wait_until("4 queued", || sim.queued() == 4);
    assert_eq!(coord.occupied(), 4);
    sim.release();

    let mut outputs: Vec<u64> = handles
        .into_iter()
        .map(|h| {
            let (r, done, out) = h.join().unwrap();
            assert_eq!(r, Ok(()));
            assert!(done);
            out
        })
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec![0, 2, 4, 6]);
    assert_eq!(coord.occupied(), 0);
    assert_eq!(coord.stats().completed, 4);
}

#[test]
fn test_exhaustion_blocks_third_submitter() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 16));
    let config = CoordinatorConfig::new().capacity(2).acquire(AcquirePolicy::Block);
    let coord = Arc::new(coordinator(config, &[sim.clone()]));
    sim.hold();

    let finished = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..3u64)
        .map(|i| {
            let coord = Arc::clone(&coord);
            let sim = Arc::clone(&sim);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let op = thread_op();
                let r = coord.execute(&op, &mut DoubleRequest::new(&sim, i));
                finished.fetch_add(1, Ordering::AcqRel);
                r
            })
        })
        .collect();

    wait_until("2 queued", || sim.queued() == 2);
    thread::sleep(Duration::from_millis(50));
    // Two made it to the hardware; the third waits on the gate.
    assert_eq!(sim.queued(), 2);
    assert_eq!(coord.occupied(), 2);
    assert_eq!(finished.load(Ordering::Acquire), 0);

    sim.release();
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(()));
    }
    assert_eq!(finished.load(Ordering::Acquire), 3);
    assert!(sim.high_water() <= 2);
    assert_eq!(coord.occupied(), 0);
}

#[test]
fn test_exhaustion_fail_fast() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 16));
    let coord = Arc::new(coordinator(CoordinatorConfig::new().capacity(1).fail_fast(), &[sim.clone()]));
    sim.hold();

    let c = Arc::clone(&coord);
    let s = Arc::clone(&sim);
    let first = thread::spawn(move || c.execute(&thread_op(), &mut DoubleRequest::new(&s, 1)));
    wait_until("first queued", || sim.queued() == 1);

    let mut req = DoubleRequest::new(&sim, 21);
    let out = coord.execute_or_else(
        &thread_op(),
        &mut req,
        |r| r.hw_out.load(Ordering::Acquire),
        |r| r.input * 2,
    );
    assert_eq!(out, 42);
    assert_eq!(coord.stats().exhausted, 1);
    assert_eq!(coord.stats().fallbacks, 1);

    sim.release();
    assert_eq!(first.join().unwrap(), Ok(()));
}

#[test]
fn test_fatal_drain_resolves_type() {
    let rsa = Arc::new(SimAccelerator::new(TaskType::Rsa, 16));
    let cipher = Arc::new(SimAccelerator::new(TaskType::Cipher, 16));
    let coord = Arc::new(coordinator(
        CoordinatorConfig::new().capacity(8),
        &[rsa.clone(), cipher.clone()],
    ));
    rsa.hold();
    rsa.inject_fatal_after(1, ERR_HW_FATAL);

    let handles: Vec<_> = (0..3u64)
        .map(|i| {
            let coord = Arc::clone(&coord);
            let rsa = Arc::clone(&rsa);
            thread::spawn(move || coord.execute(&thread_op(), &mut DoubleRequest::new(&rsa, i)))
        })
        .collect();
    wait_until("3 queued", || rsa.queued() == 3);
    rsa.release();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| **r == Err(OffloadError::Hardware(ERR_HW_FATAL)))
            .count(),
        2
    );
    assert_eq!(coord.occupied(), 0);

    // The failed type is refused before it reaches the hardware.
    let mut req = DoubleRequest::new(&rsa, 4);
    assert_eq!(
        coord.execute(&thread_op(), &mut req),
        Err(OffloadError::Hardware(ERR_HW_FATAL))
    );
    assert_eq!(rsa.queued(), 0);
    assert_eq!(coord.occupied(), 0);

    // The driver keeps serving other task types.
    let mut req = DoubleRequest::new(&cipher, 5);
    assert_eq!(coord.execute(&thread_op(), &mut req), Ok(()));
    assert_eq!(req.hw_out.load(Ordering::Acquire), 10);
}

#[test]
fn test_bounded_concurrency() {
    const CAPACITY: usize = 3;
    let sim = Arc::new(SimAccelerator::new(TaskType::Dh, 64));
    let coord = Arc::new(coordinator(CoordinatorConfig::new().capacity(CAPACITY), &[sim.clone()]));

    let max_seen = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let monitor = {
        let coord = Arc::clone(&coord);
        let max_seen = Arc::clone(&max_seen);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while done.load(Ordering::Acquire) < 10 {
                max_seen.fetch_max(coord.occupied(), Ordering::AcqRel);
                thread::yield_now();
            }
        })
    };

    let handles: Vec<_> = (0..10u64)
        .map(|i| {
            let coord = Arc::clone(&coord);
            let sim = Arc::clone(&sim);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for j in 0..20 {
                    let r = coord.execute(&thread_op(), &mut DoubleRequest::new(&sim, i * 100 + j));
                    assert_eq!(r, Ok(()));
                }
                done.fetch_add(1, Ordering::AcqRel);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    monitor.join().unwrap();

    assert!(max_seen.load(Ordering::Acquire) <= CAPACITY);
    assert!(sim.high_water() <= CAPACITY);
    assert_eq!(coord.occupied(), 0);
    assert_eq!(coord.stats().completed, 200);
}

#[test]
fn test_no_lost_wakeup_under_random_delays() {
    const ROUNDS: usize = 2000;
    let gate = Arc::new(FlowGate::new(1));

    let producer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
            for _ in 0..ROUNDS {
                let d = rng.next() % 50;
                if d > 40 {
                    thread::sleep(Duration::from_micros(d));
                } else {
                    for _ in 0..d {
                        std::hint::spin_loop();
                    }
                }
                gate.signal_task_ready();
            }
        })
    };

    let mut rng = XorShift(0xD1B5_4A32_D192_ED03);
    for i in 0..ROUNDS {
        if rng.next() % 4 == 0 {
            thread::yield_now();
        }
        assert!(
            gate.wait_for_work(Some(Duration::from_secs(10))),
            "wakeup {} lost",
            i
        );
    }
    producer.join().unwrap();
    assert_eq!(gate.pending_work(), 0);
}

#[test]
fn test_stress_random_completion_order() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Ecc, 32));
    let coord = Arc::new(coordinator(CoordinatorConfig::new().capacity(8), &[sim.clone()]));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let coord = Arc::clone(&coord);
            let sim = Arc::clone(&sim);
            thread::spawn(move || {
                let mut rng = XorShift(t + 1);
                for i in 0..100 {
                    if rng.next() % 8 == 0 {
                        thread::sleep(Duration::from_micros(rng.next() % 200));
                    }
                    // Mix parking styles: condvar jobs and yield jobs.
                    let op = if i % 2 == 0 {
                        thread_op()
                    } else {
                        AsyncOp::with_job(Arc::new(YieldJob::new()))
                    };
                    let mut req = DoubleRequest::new(&sim, i);
                    assert_eq!(coord.execute(&op, &mut req), Ok(()));
                    assert_eq!(req.hw_out.load(Ordering::Acquire), i * 2);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(coord.occupied(), 0);
    assert_eq!(coord.stats().completed, 400);
}

#[test]
fn test_fallback_on_rejected_submit() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 4));
    let coord = coordinator(CoordinatorConfig::new().capacity(4), &[sim.clone()]);

    let before = coord.occupied();
    sim.inject_reject(-22);
    let op = thread_op();
    let mut req = DoubleRequest::new(&sim, 8);
    // Returns without parking: a ThreadJob would hang if it were parked.
    assert_eq!(coord.execute(&op, &mut req), Err(OffloadError::Hardware(-22)));
    assert_eq!(coord.occupied(), before);
    assert!(!op.is_done());
    assert_eq!(req.hw_out.load(Ordering::Acquire), 0);
    assert_eq!(coord.stats().rejected, 1);
}

#[test]
fn test_fallback_on_persistent_busy() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 4));
    let coord = coordinator(CoordinatorConfig::new().capacity(4).submit_retries(3), &[sim.clone()]);

    sim.inject_busy(10);
    let mut req = DoubleRequest::new(&sim, 4);
    let out = coord.execute_or_else(
        &thread_op(),
        &mut req,
        |r| r.hw_out.load(Ordering::Acquire),
        |r| r.input + r.input,
    );
    assert_eq!(out, 8);
    let stats = coord.stats();
    assert_eq!(stats.busy_retries, 3);
    assert_eq!(stats.busy_giveups, 1);
    assert_eq!(coord.occupied(), 0);

    // Busy responses within the retry bound are absorbed.
    let mut req = DoubleRequest::new(&sim, 4);
    sim.inject_busy(2);
    assert_eq!(coord.execute(&thread_op(), &mut req), Ok(()));
    assert_eq!(req.hw_out.load(Ordering::Acquire), 8);
}

#[test]
fn test_not_running_falls_back() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Digest, 4));
    let mut coord = coordinator(CoordinatorConfig::new().capacity(4), &[sim.clone()]);
    coord.stop();

    let op = thread_op();
    let mut req = DoubleRequest::new(&sim, 3);
    assert_eq!(coord.execute(&op, &mut req), Err(OffloadError::NotRunning));
    let out = coord.execute_or_else(&thread_op(), &mut req, |_| 0, |r| r.input * 2);
    assert_eq!(out, 6);
}

#[test]
fn test_stop_fails_parked_callers() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 4));
    let mut coord = coordinator(CoordinatorConfig::new().capacity(4), &[sim.clone()]);
    sim.hold();

    let op = thread_op();
    let waiter = {
        let op = Arc::clone(&op);
        let job = op.job().cloned();
        thread::spawn(move || {
            // Stand-in for the parked caller: wait on the same job.
            if let Some(job) = job {
                while !op.is_done() {
                    job.suspend_current();
                }
            }
            op.result()
        })
    };

    let slot = coord.get_free_slot().unwrap();
    let carrier = coord.shared().attach(&op, slot, TaskType::Rsa).unwrap();
    assert_eq!(sim.submit_async(carrier, || 0), SubmitStatus::Accepted);
    coord.shared().publish(&op).unwrap();

    coord.stop();
    assert_eq!(waiter.join().unwrap(), Some(crate::ERR_SHUTDOWN));
    assert_eq!(coord.occupied(), 0);
    sim.discard();
}

#[test]
fn test_sync_mode_skips_slots() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Cipher, 4));
    let coord = coordinator(CoordinatorConfig::new().capacity(1), &[sim.clone()]);

    let op = AsyncOp::synchronous();
    for i in 0..3 {
        let mut req = DoubleRequest::new(&sim, i);
        assert_eq!(coord.execute(&op, &mut req), Ok(()));
        assert_eq!(req.hw_out.load(Ordering::Acquire), i * 2);
    }
    assert_eq!(coord.stats().sync_submitted, 3);
    assert_eq!(coord.stats().async_submitted, 0);
    assert_eq!(sim.high_water(), 0);
}

#[test]
fn test_context_single_use() {
    let sim = Arc::new(SimAccelerator::new(TaskType::Cipher, 4));
    let coord = coordinator(CoordinatorConfig::new().capacity(2), &[sim.clone()]);

    let op = thread_op();
    assert_eq!(coord.execute(&op, &mut DoubleRequest::new(&sim, 1)), Ok(()));
    assert_eq!(
        coord.execute(&op, &mut DoubleRequest::new(&sim, 1)),
        Err(OffloadError::ContextReused)
    );
}

#[cfg(target_os = "linux")]
#[test]
fn test_eventfd_signalled_on_completion() {
    use crate::{EventFdNotifier, Notifier};

    let sim = Arc::new(SimAccelerator::new(TaskType::Rsa, 4));
    let coord = coordinator(CoordinatorConfig::new().capacity(2), &[sim.clone()]);

    let notifier = Arc::new(EventFdNotifier::create().unwrap());
    notifier.notify().unwrap();
    let op = AsyncOp::with_notifier(Arc::new(ThreadJob::new()), notifier.clone());
    assert_eq!(coord.execute(&op, &mut DoubleRequest::new(&sim, 2)), Ok(()));
    // Stale signal cleared by prepare, fresh one written by completion.
    assert!(notifier.is_signalled().unwrap());

    // A rejected submission leaves nothing pending.
    let op = AsyncOp::with_notifier(Arc::new(ThreadJob::new()), notifier.clone());
    sim.inject_reject(-1);
    assert!(coord.execute(&op, &mut DoubleRequest::new(&sim, 2)).is_err());
    assert!(!notifier.is_signalled().unwrap());
}
