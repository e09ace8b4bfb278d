//! Parallel batch dispatcher for the CPU path.
//!
//! Fans a fixed number of predictions out across a rayon pool. The iteration
//! space is striped into one contiguous range per lane, mirroring the GPU
//! kernel's addresses-per-thread coarsening; each lane owns its salt source
//! and shares nothing mutable but the validation cache and atomic counters.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::predictor::{Create2Predictor, PredictError};
use crate::salt::{SaltError, SaltSource, SaltStrategy};
use crate::stats::PredictStats;

/// Local counts are flushed to the shared stats in batches to keep atomic
/// traffic off the hot loop.
const FLUSH_INTERVAL: u64 = 1000;

/// Configuration for one batch run
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub total: usize,
    pub threads: usize,
    pub strategy: SaltStrategy,
    pub base_seed: u64,
}

impl DispatchConfig {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            threads: num_cpus::get(),
            strategy: SaltStrategy::Sequential,
            base_seed: 0,
        }
    }
}

/// Error types for batch dispatch; both carry the failing iteration index
#[derive(Debug)]
pub enum DispatchError {
    Prediction { index: usize, source: PredictError },
    Salt { index: usize, source: SaltError },
}

impl DispatchError {
    pub fn index(&self) -> usize {
        match self {
            DispatchError::Prediction { index, .. } => *index,
            DispatchError::Salt { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Prediction { index, source } => {
                write!(f, "prediction {} failed: {}", index, source)
            }
            DispatchError::Salt { index, source } => {
                write!(f, "salt generation for prediction {} failed: {}", index, source)
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Prediction { source, .. } => Some(source),
            DispatchError::Salt { source, .. } => Some(source),
        }
    }
}

/// Outcome of a completed batch
#[derive(Debug)]
pub struct BatchReport {
    pub completed: u64,
    pub elapsed: Duration,
}

/// Run `config.total` predictions against a fixed (implementation, deployer)
/// pair, striped across `config.threads` lanes.
///
/// Failure policy is abort-all: the first failing prediction stops the batch
/// and its global iteration index is surfaced; there is no skip-and-continue
/// mode. Lanes already running drain out through the abort flag, so no worker
/// threads leak past the error.
pub fn run_batch(
    predictor: &Create2Predictor,
    implementation: &str,
    deployer: &str,
    config: &DispatchConfig,
    stats: &PredictStats,
) -> Result<BatchReport, DispatchError> {
    let start = Instant::now();
    if config.total == 0 {
        return Ok(BatchReport {
            completed: 0,
            elapsed: start.elapsed(),
        });
    }

    let lanes = config.threads.max(1).min(config.total);
    let per_lane = config.total.div_ceil(lanes);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(lanes)
        .build()
        .expect("failed to build dispatch thread pool");

    let abort = AtomicBool::new(false);
    let completed = AtomicU64::new(0);

    let result = pool.install(|| {
        (0..lanes).into_par_iter().try_for_each(|lane| {
            let begin = lane * per_lane;
            let end = ((lane + 1) * per_lane).min(config.total);
            let mut source = SaltSource::for_lane(config.strategy, config.base_seed, lane as u64);
            let mut local_count = 0u64;

            for index in begin..end {
                if abort.load(Ordering::Relaxed) {
                    break;
                }

                let salt = match source.next(index) {
                    Ok(salt) => salt,
                    Err(source) => {
                        abort.store(true, Ordering::Relaxed);
                        stats.add(local_count);
                        completed.fetch_add(local_count, Ordering::Relaxed);
                        return Err(DispatchError::Salt { index, source });
                    }
                };

                if let Err(source) = predictor.predict(implementation, deployer, &salt) {
                    abort.store(true, Ordering::Relaxed);
                    stats.add(local_count);
                    completed.fetch_add(local_count, Ordering::Relaxed);
                    return Err(DispatchError::Prediction { index, source });
                }

                local_count += 1;
                if local_count >= FLUSH_INTERVAL {
                    stats.add(local_count);
                    completed.fetch_add(local_count, Ordering::Relaxed);
                    local_count = 0;
                }
            }

            stats.add(local_count);
            completed.fetch_add(local_count, Ordering::Relaxed);
            Ok(())
        })
    });

    result.map(|()| BatchReport {
        completed: completed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::Network;

    const IMPLEMENTATION: &str = "0xa84c57e9966df7df79bff42f35c68aae71796f64";
    const DEPLOYER: &str = "0xfe15afcb5b9831b8af5fd984678250e95de8e312";

    #[test]
    fn test_batch_completes_exact_total() {
        let predictor = Create2Predictor::new(Network::Evm);
        let stats = PredictStats::new();
        let mut config = DispatchConfig::new(5000);
        config.threads = 4;

        let report = run_batch(&predictor, IMPLEMENTATION, DEPLOYER, &config, &stats).unwrap();
        assert_eq!(report.completed, 5000);
        assert_eq!(stats.completed(), 5000);
    }

    #[test]
    fn test_batch_smaller_than_lane_count() {
        let predictor = Create2Predictor::new(Network::Evm);
        let stats = PredictStats::new();
        let mut config = DispatchConfig::new(3);
        config.threads = 16;

        let report = run_batch(&predictor, IMPLEMENTATION, DEPLOYER, &config, &stats).unwrap();
        assert_eq!(report.completed, 3);
    }

    #[test]
    fn test_empty_batch() {
        let predictor = Create2Predictor::new(Network::Evm);
        let stats = PredictStats::new();
        let config = DispatchConfig::new(0);

        let report = run_batch(&predictor, IMPLEMENTATION, DEPLOYER, &config, &stats).unwrap();
        assert_eq!(report.completed, 0);
    }

    #[test]
    fn test_abort_surfaces_failing_index() {
        let predictor = Create2Predictor::new(Network::Evm);
        let stats = PredictStats::new();
        let mut config = DispatchConfig::new(1000);
        config.threads = 4;

        let err = run_batch(&predictor, "0xbad", DEPLOYER, &config, &stats).unwrap_err();
        assert!(err.index() < 1000);
        match err {
            DispatchError::Prediction { source, .. } => match source {
                PredictError::InvalidAddress { field, .. } => {
                    assert_eq!(field, "implementation")
                }
                other => panic!("unexpected error: {other}"),
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strategies_all_complete() {
        for strategy in [
            SaltStrategy::Sequential,
            SaltStrategy::CryptoRandom,
            SaltStrategy::LanePrng,
        ] {
            let predictor = Create2Predictor::new(Network::Evm);
            let stats = PredictStats::new();
            let mut config = DispatchConfig::new(200);
            config.threads = 2;
            config.strategy = strategy;
            config.base_seed = 42;

            let report =
                run_batch(&predictor, IMPLEMENTATION, DEPLOYER, &config, &stats).unwrap();
            assert_eq!(report.completed, 200, "strategy {strategy} fell short");
        }
    }

    #[test]
    fn test_tron_batch() {
        let predictor = Create2Predictor::new(Network::Tron);
        let stats = PredictStats::new();
        let mut config = DispatchConfig::new(500);
        config.threads = 2;

        let report = run_batch(&predictor, IMPLEMENTATION, DEPLOYER, &config, &stats).unwrap();
        assert_eq!(report.completed, 500);
    }
}
