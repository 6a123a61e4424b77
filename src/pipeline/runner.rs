//! Bounded fan-out over the files of one stage.
//!
//! Every task runs on a dedicated rayon pool sized to the concurrency
//! ceiling, so at most `concurrency` transforms are in flight at once.
//! [`Runner::run`] returns only after every task has settled, which makes
//! it the barrier between stages.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::policy::Outcome;
use super::stats::StageTotals;
use crate::error::{InitError, TaskError};
use crate::log;

/// Settled results of one fan-out.
#[derive(Debug, Default)]
pub struct Settled {
    pub outcomes: Vec<(PathBuf, Outcome)>,
    pub failed: Vec<PathBuf>,
}

pub struct Runner {
    pool: ThreadPool,
}

impl Runner {
    /// Build a pool with `concurrency` workers (at least one).
    pub fn new(concurrency: usize) -> Result<Self, InitError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("sitetrim-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn concurrency(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` over `files`, recording successes into `totals`.
    ///
    /// A failing or panicking task is logged with its path and does not
    /// affect its siblings. Nothing is retried.
    pub fn run<F>(&self, files: &[PathBuf], totals: &StageTotals, task: F) -> Settled
    where
        F: Fn(&Path) -> Result<Outcome, TaskError> + Sync,
    {
        let results: Vec<(PathBuf, Option<Outcome>)> = self.pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let result = catch_unwind(AssertUnwindSafe(|| task(path)))
                        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(&*payload))));
                    match result {
                        Ok(outcome) => {
                            totals.record(&outcome);
                            (path.clone(), Some(outcome))
                        }
                        Err(e) => {
                            log!("error"; "{}: {:#}", path.display(), anyhow::Error::new(e));
                            (path.clone(), None)
                        }
                    }
                })
                .collect()
        });

        let mut settled = Settled::default();
        for (path, outcome) in results {
            match outcome {
                Some(outcome) => settled.outcomes.push((path, outcome)),
                None => settled.failed.push(path),
            }
        }
        settled
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::pipeline::policy::SavingsPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("file-{i}.js"))).collect()
    }

    fn index_of(path: &Path) -> usize {
        path.to_string_lossy()
            .trim_start_matches("file-")
            .trim_end_matches(".js")
            .parse()
            .unwrap()
    }

    #[test]
    fn test_failure_is_isolated() {
        let runner = Runner::new(4).unwrap();
        let totals = StageTotals::default();
        let files = paths(10);

        let settled = runner.run(&files, &totals, |path| {
            if index_of(path) == 3 {
                return Err(TransformError::parse("javascript", "bad token").into());
            }
            Ok(Outcome::new(SavingsPolicy::AnySavings, 100, 60))
        });

        assert_eq!(settled.outcomes.len(), 9);
        assert_eq!(settled.failed, vec![PathBuf::from("file-3.js")]);
        let snap = totals.snapshot();
        assert_eq!(snap.files, 9);
        assert_eq!(snap.original, 900);
        assert_eq!(snap.saved, 360);
    }

    #[test]
    fn test_panic_is_isolated() {
        let runner = Runner::new(2).unwrap();
        let totals = StageTotals::default();

        let settled = runner.run(&paths(4), &totals, |path| {
            if index_of(path) == 0 {
                panic!("codec exploded");
            }
            Ok(Outcome::new(SavingsPolicy::AnySavings, 10, 5))
        });

        assert_eq!(settled.outcomes.len(), 3);
        assert_eq!(settled.failed.len(), 1);
        assert_eq!(totals.snapshot().files, 3);
    }

    #[test]
    fn test_totals_independent_of_concurrency() {
        let files = paths(64);
        let task = |path: &Path| -> Result<Outcome, TaskError> {
            let i = index_of(path);
            Ok(Outcome::new(SavingsPolicy::AnySavings, 1000 + i, 900 + i / 2))
        };
        let expected: u64 = (0..64u64).map(|i| (1000 + i) - (900 + i / 2)).sum();

        for concurrency in [1, 3, 8] {
            let runner = Runner::new(concurrency).unwrap();
            let totals = StageTotals::default();
            runner.run(&files, &totals, task);
            let snap = totals.snapshot();
            assert_eq!(snap.saved, expected, "concurrency {concurrency}");
            assert_eq!(snap.files, 64);
        }
    }

    #[test]
    fn test_in_flight_never_exceeds_ceiling() {
        let runner = Runner::new(3).unwrap();
        assert_eq!(runner.concurrency(), 3);

        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        runner.run(&paths(24), &StageTotals::default(), |_| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Outcome::new(SavingsPolicy::AnySavings, 1, 1))
        });

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_zero_concurrency_means_one_worker() {
        assert_eq!(Runner::new(0).unwrap().concurrency(), 1);
    }

    #[test]
    fn test_empty_input() {
        let runner = Runner::new(2).unwrap();
        let settled = runner.run(&[], &StageTotals::default(), |_| unreachable!());
        assert!(settled.outcomes.is_empty() && settled.failed.is_empty());
    }
}
