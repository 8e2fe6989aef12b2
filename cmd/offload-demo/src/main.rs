//! Offload coordinator demo
//!
//! Several submitter threads compute `base^exp mod m` ("RSA-like" private
//! key operations) on a simulated accelerator. Every few requests the
//! accelerator is told to reject or stall, and the coordinator falls back
//! to the software path. Each result is checked against software.
//!
//! # Environment Variables
//!
//! - `OFFLOAD_LOG_LEVEL=info` - Log level (off, error, warn, info, debug, trace)
//! - `OFFLOAD_CAPACITY=8` - Slot pool size
//! - `OFFLOAD_FAIL_FAST=1` - Fall back instead of waiting for a slot
//! - `DEMO_THREADS=4`, `DEMO_REQUESTS=250` - Load shape
//!
//! Run: OFFLOAD_LOG_LEVEL=info cargo run -p offload-demo

use offload::{
    kinfo, kwarn, AsyncOp, Carrier, Coordinator, CoordinatorConfig, OffloadRequest, SimAccelerator,
    SubmitStatus, TaskType, ThreadJob,
};
use offload_core::env::env_get;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Square-and-multiply modular exponentiation.
fn mod_exp(base: u64, exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let m = modulus as u128;
    let mut result: u128 = 1;
    let mut b = base as u128 % m;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        e >>= 1;
    }
    result as u64
}

/// One modexp request. The hardware writes into `hw_out`; the caller
/// only reads it after a successful completion.
struct ModExpRequest {
    accel: Arc<SimAccelerator>,
    base: u64,
    exp: u64,
    modulus: u64,
    hw_out: Arc<AtomicU64>,
}

impl ModExpRequest {
    fn new(accel: &Arc<SimAccelerator>, base: u64, exp: u64, modulus: u64) -> Self {
        Self {
            accel: Arc::clone(accel),
            base,
            exp,
            modulus,
            hw_out: Arc::new(AtomicU64::new(0)),
        }
    }

    fn software(&self) -> u64 {
        mod_exp(self.base, self.exp, self.modulus)
    }
}

impl OffloadRequest for ModExpRequest {
    fn task_type(&self) -> TaskType {
        TaskType::Rsa
    }

    fn submit_sync(&mut self) -> i32 {
        let r = self.software();
        let out = &self.hw_out;
        self.accel.submit_sync(|| {
            out.store(r, Ordering::Release);
            0
        })
    }

    fn submit_async(&mut self, carrier: Carrier) -> SubmitStatus {
        let (base, exp, modulus) = (self.base, self.exp, self.modulus);
        let out = Arc::clone(&self.hw_out);
        self.accel.submit_async(carrier, move || {
            out.store(mod_exp(base, exp, modulus), Ordering::Release);
            0
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Offload Demo ===\n");

    let threads: u64 = env_get("DEMO_THREADS", 4);
    let requests: u64 = env_get("DEMO_REQUESTS", 250);

    let config = CoordinatorConfig::from_env();
    let accel = Arc::new(SimAccelerator::new(TaskType::Rsa, config.capacity));
    let coord = Arc::new(
        Coordinator::builder(config)
            .register_drain(TaskType::Rsa, accel.clone())
            .start()?,
    );
    kinfo!("coordinator running: capacity={}", coord.capacity());

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let coord = Arc::clone(&coord);
            let accel = Arc::clone(&accel);
            thread::Builder::new()
                .name(format!("submitter-{}", t))
                .spawn(move || {
                    let mut mismatches = 0u64;
                    for i in 0..requests {
                        match i % 50 {
                            17 => accel.inject_reject(-22),
                            33 => accel.inject_busy(u32::MAX),
                            34 => accel.inject_busy(0),
                            _ => {}
                        }
                        let base = 2 + t * 1000 + i;
                        let mut req = ModExpRequest::new(&accel, base, 65537, 0xFFFF_FFFB);
                        let expected = req.software();

                        let op = AsyncOp::with_job(Arc::new(ThreadJob::new()));
                        let got = coord.execute_or_else(
                            &op,
                            &mut req,
                            |r| r.hw_out.load(Ordering::Acquire),
                            |r| r.software(),
                        );
                        if got != expected {
                            mismatches += 1;
                        }
                    }
                    mismatches
                })
        })
        .collect::<Result<_, _>>()?;

    let mut mismatches = 0;
    for h in handles {
        match h.join() {
            Ok(n) => mismatches += n,
            Err(_) => kwarn!("submitter thread panicked"),
        }
    }
    let elapsed = start.elapsed();

    let stats = coord.stats();
    println!("requests:        {}", threads * requests);
    println!("elapsed:         {:?}", elapsed);
    println!("offloaded:       {}", stats.completed);
    println!("failed:          {}", stats.failed);
    println!("fallbacks:       {}", stats.fallbacks);
    println!("  rejected:      {}", stats.rejected);
    println!("  busy give-ups: {}", stats.busy_giveups);
    println!("  exhausted:     {}", stats.exhausted);
    println!("busy retries:    {}", stats.busy_retries);
    println!("drain calls:     {}", stats.drain_calls);
    println!("queue high mark: {}", accel.high_water());
    println!("mismatches:      {}", mismatches);

    println!("\n=== Demo Complete ===");
    if mismatches > 0 {
        return Err(format!("{} results differ from software", mismatches).into());
    }
    Ok(())
}
