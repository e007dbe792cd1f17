//! Per-LP accumulators, the delay histogram, and the run report assembled
//! once a simulation finishes.
//!
//! The termination handshake itself (the do-not-end token count) lives in
//! [`crate::scheduler`], since it is a scheduler-wide concern; this module
//! owns the per-LP accumulators, the optional delay histogram, and the
//! aggregate report assembled once a run finishes.

use crate::config::Config;
use crate::rng::Tick;
use serde::Serialize;

const BUCKETS: usize = 64;

/// Fixed power-of-two bucketing over raw tick counts.
/// Bucket `i` covers `[2^i, 2^(i+1))` ticks. `underflow` counts a delay of
/// exactly zero ticks (never produced while `minimum > 0`, kept for
/// completeness); `overflow` counts anything past the largest bucket, which
/// cannot happen for any value representable in a `u64`, but the field is
/// explicit rather than silently dropping a sample that somehow got there.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    buckets: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Histogram {
            buckets: vec![0; BUCKETS],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn record(&mut self, ticks: Tick) {
        if ticks == 0 {
            self.underflow += 1;
            return;
        }
        let bucket = (63 - ticks.leading_zeros()) as usize;
        match self.buckets.get_mut(bucket) {
            Some(slot) => *slot += 1,
            None => self.overflow += 1,
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.underflow + self.overflow + self.buckets.iter().sum::<u64>()
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LpReport {
    pub id: u64,
    pub send_count: u64,
    pub recv_count: u64,
    pub histogram: Option<Histogram>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigEcho {
    pub duty_factor: f64,
    pub expected_events: f64,
    pub min_events_recommendation: Option<u64>,
}

/// Aggregate run output. `error` is the non-fatal receiver mismatch:
/// `send_total - recv_total`, nonzero only from events in flight when the
/// run's lookahead let a send land past `stop` faster than its matching
/// receive.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub lps: Vec<LpReport>,
    pub send_total: u64,
    pub recv_total: u64,
    pub error: i64,
    pub config_echo: ConfigEcho,
}

impl Report {
    /// Assembles the final report from the completion reduce's grand totals
    /// (`grand_send`/`grand_recv`, the values actually carried out of the
    /// LPs by the tree-structured reduce collective) rather than recomputing
    /// them directly from `lps` here. The direct per-LP sum is still taken
    /// as a sanity check: the reduce is supposed to fold the exact same
    /// counters with zero loss, so any disagreement between the two would
    /// mean the reduce lost or duplicated a contribution somewhere on its
    /// way up the tree, which is worth knowing about even though it isn't
    /// by itself fatal.
    pub fn assemble(cfg: &Config, lps: Vec<LpReport>, grand_send: u64, grand_recv: u64) -> Report {
        let direct_send: u64 = lps.iter().map(|l| l.send_count).sum();
        let direct_recv: u64 = lps.iter().map(|l| l.recv_count).sum();
        if direct_send != grand_send || direct_recv != grand_recv {
            log::warn!(
                "completion reduce disagrees with direct per-LP sum: reduce=(send={grand_send}, recv={grand_recv}) direct=(send={direct_send}, recv={direct_recv})"
            );
        }

        let error = grand_send as i64 - grand_recv as i64;
        if error != 0 {
            log::warn!(
                "receiver mismatch: send_total={grand_send} recv_total={grand_recv} error={error}"
            );
        }
        Report {
            lps,
            send_total: grand_send,
            recv_total: grand_recv,
            error,
            config_echo: ConfigEcho {
                duty_factor: cfg.duty_factor(),
                expected_events: cfg.expected_events(),
                min_events_recommendation: cfg.min_events_recommendation(),
            },
        }
    }
}
