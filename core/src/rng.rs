//! Deterministic random streams for synthetic traffic.
//!
//! RULE: Synthetic traffic never touches a platform RNG. Every stream is
//! derived from one master seed, so a seed fully reproduces a replay.
//!
//! Each traffic stream gets its own generator, seeded from
//! (master_seed XOR stream_index * golden-ratio constant). Adding a stream
//! never perturbs the others.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct StreamRng {
    pub stream: TrafficStream,
    inner:      Pcg64Mcg,
}

impl StreamRng {
    pub fn new(master_seed: u64, stream: TrafficStream) -> Self {
        let derived = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            stream,
            inner: Pcg64Mcg::seed_from_u64(derived),
        }
    }

    /// Uniform float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        (self.inner.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in [0, n).
    pub fn below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// True with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len() as u64) as usize]
    }

    /// Uniform float in [lo, hi).
    pub fn between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Stable stream assignments. Append only: reordering reseeds everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum TrafficStream {
    Mix      = 0,
    Calls    = 1,
    Bids     = 2,
    Accounts = 3,
    Abuse    = 4,
}
