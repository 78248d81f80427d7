//! Environment abstraction for deterministic testing.
//!
//! Decouples the engine from system resources (time, randomness). The
//! production implementation reads the monotonic clock and the thread RNG;
//! the simulation harness provides a virtual clock and a seeded RNG so every
//! scenario replays bit for bit.

use rand::{Rng, RngCore};

/// Abstract environment providing millisecond time and randomness.
///
/// # Invariants
///
/// - `now_ms` never goes backwards within one execution.
/// - `fill_random` must be cryptographically secure in production; it seeds
///   the node identity.
pub trait Env {
    /// Milliseconds since engine start (the `millis()` of the firmware).
    fn now_ms(&self) -> u64;

    /// Uniform random value in `0..bound`. Returns 0 when `bound` is 0.
    fn random_range(&self, bound: u32) -> u32;

    /// Fill `buf` with random bytes.
    fn fill_random(&self, buf: &mut [u8]);
}

/// Production environment: monotonic clock plus the thread RNG.
#[derive(Debug)]
pub struct SystemEnv {
    start: std::time::Instant,
}

impl SystemEnv {
    /// Create an environment whose clock starts at zero now.
    #[must_use]
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for SystemEnv {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn random_range(&self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }

    fn fill_random(&self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf);
    }
}
