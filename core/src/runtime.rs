//! Worker pool for the per-point stages of a join.

use std::env;
use std::sync::OnceLock;

use rayon::ThreadPoolBuilder;

use crate::{Error, Result};

/// Environment override for the worker count.
pub const THREADS_ENV: &str = "SCANJOIN_CPU_THREADS";

static WORKER_POOL: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Size the global Rayon pool once per process and return its worker count.
///
/// `configured` wins over `SCANJOIN_CPU_THREADS`; without either the pool
/// follows hardware concurrency. Later calls return the first outcome, so a
/// second run in the same process cannot resize the pool.
pub fn init_global_thread_pool(configured: Option<usize>) -> Result<usize> {
    let outcome = WORKER_POOL.get_or_init(|| {
        let workers = requested_workers(configured).map_err(|e| e.to_string())?;

        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = workers {
            builder = builder.num_threads(n);
        }
        builder
            .build_global()
            .map(|_| rayon::current_num_threads())
            .map_err(|e| e.to_string())
    });
    outcome.clone().map_err(Error::InvalidConfig)
}

/// Workers available to the current parallel stage.
pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

fn requested_workers(configured: Option<usize>) -> Result<Option<usize>> {
    if let Some(n) = configured {
        return parse_worker_count(&n.to_string()).map(Some);
    }
    match env::var(THREADS_ENV) {
        Ok(raw) => parse_worker_count(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidConfig(format!("failed to read {THREADS_ENV}: {e}"))),
    }
}

fn parse_worker_count(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::InvalidConfig("worker count must be >= 1".to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(Error::InvalidConfig(format!(
            "worker count must be a positive integer, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_parsing() {
        assert_eq!(parse_worker_count("4").unwrap(), 4);
        assert_eq!(parse_worker_count(" 12\n").unwrap(), 12);
        assert!(matches!(parse_worker_count("0"), Err(Error::InvalidConfig(_))));
        assert!(matches!(parse_worker_count("many"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn configured_count_overrides_environment() {
        assert_eq!(requested_workers(Some(3)).unwrap(), Some(3));
        assert!(requested_workers(Some(0)).is_err());
    }
}
