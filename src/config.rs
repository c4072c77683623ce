//! Runtime tunables.
//!
//! Parameters are read once at setup, either from `GLB_*` environment
//! variables ([`Configuration::from_env`]) or programmatically via the
//! builder-style `with_*` methods. Unparseable values fail fast; no partial
//! scheduler state is left behind on a setup failure.

use std::env;
use std::str::FromStr;
use std::thread;

use crate::error::{GlbError, Result};
use crate::topology::LifelineStrategyKind;

/// Elementary exploration steps performed per `process` call before a worker
/// re-checks its scheduling obligations.
pub const DEFAULT_WORK_UNIT_SIZE: usize = 511;

/// Random-steal attempts before a starving place resorts to its lifelines.
pub const DEFAULT_MAX_RANDOM_STEALS: usize = 1;

/// Snapshot of every tunable in effect for a runtime.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Number of simulated places (hosts).
    pub places: usize,
    /// Concurrent workers per place.
    pub workers: usize,
    /// Chunk size processed per `process` call.
    pub work_unit_size: usize,
    /// Distinct random-steal victims tried before the lifeline phase.
    pub max_random_steals: usize,
    /// Lifeline topology.
    pub lifeline_strategy: LifelineStrategyKind,
    /// Period of the adaptive chunk-size tuner, 0 disables it.
    pub tuning_interval_ms: u64,
    /// Period of auxiliary-bound gossip, 0 disables it.
    pub whisper_interval_ms: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            places: 1,
            workers: thread::available_parallelism().map_or(1, |p| p.get()),
            work_unit_size: DEFAULT_WORK_UNIT_SIZE,
            max_random_steals: DEFAULT_MAX_RANDOM_STEALS,
            lifeline_strategy: LifelineStrategyKind::default(),
            tuning_interval_ms: 0,
            whisper_interval_ms: 0,
        }
    }
}

impl Configuration {
    /// Build a configuration from `GLB_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// Recognized variables: `GLB_PLACES`, `GLB_WORKERS`,
    /// `GLB_WORK_UNIT_SIZE`, `GLB_RANDOM_STEALS`, `GLB_LIFELINES`,
    /// `GLB_TUNING_INTERVAL_MS`, `GLB_WHISPER_INTERVAL_MS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_env("GLB_PLACES")? {
            config.places = v;
        }
        if let Some(v) = parse_env("GLB_WORKERS")? {
            config.workers = v;
        }
        if let Some(v) = parse_env("GLB_WORK_UNIT_SIZE")? {
            config.work_unit_size = v;
        }
        if let Some(v) = parse_env("GLB_RANDOM_STEALS")? {
            config.max_random_steals = v;
        }
        if let Ok(name) = env::var("GLB_LIFELINES") {
            config.lifeline_strategy = LifelineStrategyKind::from_name(&name)?;
        }
        if let Some(v) = parse_env("GLB_TUNING_INTERVAL_MS")? {
            config.tuning_interval_ms = v;
        }
        if let Some(v) = parse_env("GLB_WHISPER_INTERVAL_MS")? {
            config.whisper_interval_ms = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.places == 0 {
            return Err(GlbError::InvalidParameter {
                name: "places",
                value: "0".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(GlbError::InvalidParameter {
                name: "workers",
                value: "0".to_string(),
            });
        }
        if self.work_unit_size == 0 {
            return Err(GlbError::InvalidParameter {
                name: "work_unit_size",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_places(mut self, places: usize) -> Self {
        self.places = places;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_work_unit_size(mut self, size: usize) -> Self {
        self.work_unit_size = size;
        self
    }

    pub fn with_max_random_steals(mut self, attempts: usize) -> Self {
        self.max_random_steals = attempts;
        self
    }

    pub fn with_lifeline_strategy(mut self, kind: LifelineStrategyKind) -> Self {
        self.lifeline_strategy = kind;
        self
    }

    pub fn with_tuning_interval_ms(mut self, ms: u64) -> Self {
        self.tuning_interval_ms = ms;
        self
    }

    pub fn with_whisper_interval_ms(mut self, ms: u64) -> Self {
        self.whisper_interval_ms = ms;
        self
    }
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| GlbError::InvalidParameter { name, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Configuration::default();
        assert_eq!(cfg.places, 1);
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.work_unit_size, DEFAULT_WORK_UNIT_SIZE);
        assert_eq!(cfg.max_random_steals, DEFAULT_MAX_RANDOM_STEALS);
        assert_eq!(cfg.lifeline_strategy, LifelineStrategyKind::Hypercube);
        assert_eq!(cfg.tuning_interval_ms, 0);
        assert_eq!(cfg.whisper_interval_ms, 0);
    }

    #[test]
    fn builder_methods() {
        let cfg = Configuration::default()
            .with_places(4)
            .with_workers(2)
            .with_work_unit_size(63)
            .with_max_random_steals(3)
            .with_lifeline_strategy(LifelineStrategyKind::Ring)
            .with_tuning_interval_ms(10)
            .with_whisper_interval_ms(20);
        assert_eq!(cfg.places, 4);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.work_unit_size, 63);
        assert_eq!(cfg.max_random_steals, 3);
        assert_eq!(cfg.lifeline_strategy, LifelineStrategyKind::Ring);
        assert_eq!(cfg.tuning_interval_ms, 10);
        assert_eq!(cfg.whisper_interval_ms, 20);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let cfg = Configuration::default().with_workers(0);
        assert!(matches!(
            cfg.validate(),
            Err(GlbError::InvalidParameter { name: "workers", .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_places() {
        let cfg = Configuration::default().with_places(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk() {
        let cfg = Configuration::default().with_work_unit_size(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_parse_failure_is_reported() {
        env::set_var("GLB_WORKERS", "not-a-number");
        let err = Configuration::from_env().unwrap_err();
        env::remove_var("GLB_WORKERS");
        assert!(matches!(
            err,
            GlbError::InvalidParameter { name: "GLB_WORKERS", .. }
        ));
    }
}
