//! Configuration validation and the derived quantities built from it.
//!
//! The core never parses a file or a CLI flag itself — it only validates an
//! already-populated record and computes the derived quantities the rest of
//! the crate needs. The enclosing binary (`src/bin/phold.rs`) is the only
//! thing that knows about `clap`.

use crate::error::PholdError;
use crate::error::PholdResult;
use serde::Serialize;

/// How the `number` LPs are split across `partitions` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionStrategy {
    /// Contiguous id ranges, as evenly sized as `number % partitions` allows.
    Block,
    /// `id % partitions` assigns the partition.
    RoundRobin,
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        PartitionStrategy::Block
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub remote: f64,
    pub minimum: u64,
    pub average: f64,
    pub stop: u64,
    pub number: u64,
    pub events: u64,
    pub buffer_bytes: usize,
    pub delays_out: bool,
    pub verbosity: u8,
    pub partitions: usize,
    pub partition_strategy: PartitionStrategy,
}

impl Config {
    /// Fraction of the inter-event delay contributed by the exponential
    /// component rather than the fixed lookahead.
    pub fn duty_factor(&self) -> f64 {
        self.average / (self.minimum as f64 + self.average)
    }

    pub fn expected_events(&self) -> f64 {
        self.number as f64 * self.events as f64 * self.stop as f64
            / (self.minimum as f64 + self.average)
    }

    /// `None` if `events * duty_factor >= 10`; otherwise the recommended
    /// `min_events` to quiet the warning.
    pub fn min_events_recommendation(&self) -> Option<u64> {
        let observed = self.events as f64 * self.duty_factor();
        if observed < 10.0 {
            Some((10.0 / self.duty_factor()).ceil() as u64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    remote: f64,
    minimum: u64,
    average: f64,
    stop: u64,
    number: u64,
    events: u64,
    buffer_bytes: usize,
    delays_out: bool,
    verbosity: u8,
    partitions: usize,
    partition_strategy: PartitionStrategy,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            remote: 0.5,
            minimum: 1,
            average: 9,
            stop: 1_000,
            number: 2,
            events: 1,
            buffer_bytes: 0,
            delays_out: false,
            verbosity: 0,
            partitions: 1,
            partition_strategy: PartitionStrategy::Block,
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(mut self, v: f64) -> Self {
        self.remote = v;
        self
    }

    pub fn minimum(mut self, v: u64) -> Self {
        self.minimum = v;
        self
    }

    pub fn average(mut self, v: f64) -> Self {
        self.average = v;
        self
    }

    pub fn stop(mut self, v: u64) -> Self {
        self.stop = v;
        self
    }

    pub fn number(mut self, v: u64) -> Self {
        self.number = v;
        self
    }

    pub fn events(mut self, v: u64) -> Self {
        self.events = v;
        self
    }

    pub fn buffer_bytes(mut self, v: usize) -> Self {
        self.buffer_bytes = v;
        self
    }

    pub fn delays_out(mut self, v: bool) -> Self {
        self.delays_out = v;
        self
    }

    pub fn verbosity(mut self, v: u8) -> Self {
        self.verbosity = v;
        self
    }

    pub fn partitions(mut self, v: usize) -> Self {
        self.partitions = v;
        self
    }

    pub fn partition_strategy(mut self, v: PartitionStrategy) -> Self {
        self.partition_strategy = v;
        self
    }

    /// Validates and freezes the builder into a [`Config`].
    pub fn build(self) -> PholdResult<Config> {
        if self.number < 2 {
            return Err(PholdError::ConfigInvalid(format!(
                "number must be >= 2, got {}",
                self.number
            )));
        }
        if self.minimum == 0 {
            return Err(PholdError::ConfigInvalid(
                "minimum must be > 0".to_string(),
            ));
        }
        if self.average <= 0.0 {
            return Err(PholdError::ConfigInvalid(
                "average must be > 0".to_string(),
            ));
        }
        if self.stop == 0 {
            return Err(PholdError::ConfigInvalid("stop must be > 0".to_string()));
        }
        if self.events < 1 {
            return Err(PholdError::ConfigInvalid(
                "events must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.remote) {
            return Err(PholdError::ConfigInvalid(format!(
                "remote must be in [0, 1], got {}",
                self.remote
            )));
        }
        if self.partitions == 0 {
            return Err(PholdError::ConfigInvalid(
                "partitions must be >= 1".to_string(),
            ));
        }
        if self.partitions as u64 > self.number {
            return Err(PholdError::ConfigInvalid(format!(
                "partitions ({}) cannot exceed number of LPs ({})",
                self.partitions, self.number
            )));
        }

        let cfg = Config {
            remote: self.remote,
            minimum: self.minimum,
            average: self.average,
            stop: self.stop,
            number: self.number,
            events: self.events,
            buffer_bytes: self.buffer_bytes,
            delays_out: self.delays_out,
            verbosity: self.verbosity,
            partitions: self.partitions,
            partition_strategy: self.partition_strategy,
        };

        if let Some(min_events) = cfg.min_events_recommendation() {
            log::warn!(
                "events * duty_factor = {:.2} < 10; consider events >= {min_events} for a representative run",
                cfg.events as f64 * cfg.duty_factor(),
            );
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_produces_valid_config() {
        let cfg = ConfigBuilder::new().build().expect("defaults are valid");
        assert_eq!(cfg.number, 2);
    }

    #[test]
    fn rejects_number_below_two() {
        let err = ConfigBuilder::new().number(1).build().unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_nonpositive_minimum() {
        let err = ConfigBuilder::new().minimum(0).build().unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_nonpositive_average() {
        let err = ConfigBuilder::new().average(0.0).build().unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_nonpositive_stop() {
        let err = ConfigBuilder::new().stop(0).build().unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_events_below_one() {
        let err = ConfigBuilder::new().events(0).build().unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_remote_out_of_unit_interval() {
        assert!(ConfigBuilder::new().remote(-0.1).build().is_err());
        assert!(ConfigBuilder::new().remote(1.1).build().is_err());
        assert!(ConfigBuilder::new().remote(1.0).build().is_ok());
    }

    #[test]
    fn rejects_more_partitions_than_lps() {
        let err = ConfigBuilder::new()
            .number(2)
            .partitions(3)
            .build()
            .unwrap_err();
        assert!(matches!(err, PholdError::ConfigInvalid(_)));
    }

    #[test]
    fn duty_factor_and_expected_events_match_formula() {
        let cfg = ConfigBuilder::new()
            .number(4)
            .events(2)
            .minimum(1)
            .average(9.0)
            .stop(100)
            .build()
            .unwrap();
        assert!((cfg.duty_factor() - 0.9).abs() < 1e-9);
        let expected = 4.0 * 2.0 * 100.0 / 10.0;
        assert!((cfg.expected_events() - expected).abs() < 1e-9);
    }

    #[test]
    fn min_events_recommendation_present_when_below_threshold() {
        let cfg = ConfigBuilder::new()
            .events(1)
            .minimum(9)
            .average(1.0)
            .build()
            .unwrap();
        assert!(cfg.min_events_recommendation().is_some());
    }

    #[test]
    fn min_events_recommendation_absent_when_above_threshold() {
        let cfg = ConfigBuilder::new()
            .events(100)
            .minimum(1)
            .average(9.0)
            .build()
            .unwrap();
        assert!(cfg.min_events_recommendation().is_none());
    }
}
