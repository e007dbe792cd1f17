//! Per-LP deterministic random number generation.
//!
//! One seedable stream per LP, deterministic from the LP id alone. Two
//! distributions are derived from that stream: a uniform destination draw
//! over `[0, N)` and an exponential inter-event delay. Time is represented
//! throughout the crate as [`Tick`], an integer count of simulation time
//! units (microseconds in the reference configurations; nothing in the core
//! cares which unit, as long as `minimum`/`average`/`stop` all share it).

use rand::Rng as _;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::Distribution;
use rand_distr::Exp;

pub type Tick = u64;

/// Per-LP random stream. Seeded by `1 + id` so that id 0 never draws the
/// disallowed zero seed, and so the sequence of draws for a given LP is
/// independent of how many partitions the run is split into.
pub struct Lcg {
    inner: SmallRng,
}

impl Lcg {
    pub fn for_lp(id: u64) -> Self {
        let seed = 1 + id;
        debug_assert_ne!(seed, 0, "seed must never be zero");
        Self {
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`, used for the remote/local coin flip.
    pub fn unit(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Uniform integer destination in `[0, n)`, excluding `exclude`.
    /// Rejects and redraws the excluded id.
    pub fn uniform_excluding(&mut self, n: u64, exclude: u64) -> u64 {
        assert!(n > 1, "cannot draw a remote destination when N <= 1");
        loop {
            let candidate = self.inner.random_range(0..n);
            if candidate != exclude {
                return candidate;
            }
        }
    }

    /// Exponential draw with rate `1 / average`, in the same tick unit as
    /// `average` itself.
    pub fn exponential(&mut self, average: f64) -> Tick {
        assert!(average > 0.0, "average must be positive");
        let dist = Exp::new(1.0 / average).expect("rate is finite and positive");
        let sample: f64 = dist.sample(&mut self.inner);
        sample.round() as Tick
    }
}
