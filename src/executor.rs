//! Concurrent execution of deployment waves.
//!
//! A wave is a set of deployments with no dependencies between them. Each
//! wave gets its own worker pool and fan-in channel; the caller blocks until
//! every task has reported back, then receives either all results in wave
//! order or the first error observed.

use log::{debug, warn};
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Cancellation signal shared by the tasks of one wave
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs waves of independent tasks with bounded concurrency
#[derive(Debug, Clone)]
pub struct WaveExecutor {
    max_concurrency: usize,
    cancel_on_error: bool,
}

impl WaveExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            cancel_on_error: false,
        }
    }

    /// Trip the wave's cancel token on the first failure.
    ///
    /// Tasks that have not started yet are skipped; running tasks see the
    /// token and may stop early. Off by default, in which case siblings of a
    /// failed task run to completion.
    pub fn cancel_on_error(mut self, enabled: bool) -> Self {
        self.cancel_on_error = enabled;
        self
    }

    /// Run `task_fn` once per task and wait for all of them.
    ///
    /// Results are returned in task order regardless of completion order.
    /// When any task fails, the first failure received is returned and the
    /// outcomes of the other tasks are dropped.
    ///
    /// # Arguments
    /// * `tasks` - Work items, one per deployment
    /// * `task_fn` - Runs one item; gets the wave's cancel token
    ///
    /// # Returns
    /// * `Ok` with one result per task, in task order
    /// * `Err` with the first failure, or a pool build error
    pub fn execute<T, R, E, F>(&self, tasks: Vec<T>, task_fn: F) -> Result<Vec<R>, E>
    where
        T: Send,
        R: Send,
        E: Send + Display + From<ThreadPoolBuildError>,
        F: Fn(T, &CancelToken) -> Result<R, E> + Sync,
    {
        let expected = tasks.len();
        if expected == 0 {
            return Ok(Vec::new());
        }

        // Never more workers than tasks
        let workers = expected.min(self.max_concurrency);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("wave-worker-{}", index))
            .build()?;
        debug!("Dispatching {} task(s) on {} worker(s)", expected, workers);

        // Outcomes arrive in completion order; slots restore task order
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel::<(usize, Option<Result<R, E>>)>();
        let mut slots: Vec<Option<R>> = (0..expected).map(|_| None).collect();
        let mut first_error: Option<E> = None;
        let task_fn = &task_fn;

        pool.in_place_scope(|scope| {
            for (index, task) in tasks.into_iter().enumerate() {
                let tx = tx.clone();
                let cancel = cancel.clone();
                scope.spawn(move |_| {
                    // Queued tasks of a cancelled wave never start
                    let outcome = if cancel.is_cancelled() {
                        None
                    } else {
                        Some(task_fn(task, &cancel))
                    };
                    // The receiver outlives the scope
                    let _ = tx.send((index, outcome));
                });
            }
            // Only the workers hold senders now
            drop(tx);

            for _ in 0..expected {
                let Ok((index, outcome)) = rx.recv() else {
                    break;
                };
                match outcome {
                    Some(Ok(result)) => slots[index] = Some(result),
                    Some(Err(err)) => {
                        // Keep the first failure, log the rest
                        if first_error.is_none() {
                            if self.cancel_on_error {
                                cancel.cancel();
                            }
                            first_error = Some(err);
                        } else {
                            warn!("Task {} also failed: {}", index, err);
                        }
                    }
                    None => debug!("Task {} skipped after cancellation", index),
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::Role;
    use crate::error::{BackendError, OrchestratorError};
    use crate::orchestrator::Phase;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn fail(ordinal: u32) -> OrchestratorError {
        OrchestratorError::DeploymentFailed {
            role: Role::Miner,
            ordinal,
            phase: Phase::DeployingBootnodes,
            source: BackendError::Transport("unreachable".to_string()),
        }
    }

    #[test]
    fn test_results_ordered_by_task_not_completion() {
        let executor = WaveExecutor::new(5);
        let ordinals: Vec<u32> = (1..=5).collect();
        let results = executor
            .execute(ordinals, |ordinal, _| {
                // Later ordinals finish first
                thread::sleep(Duration::from_millis(u64::from(6 - ordinal) * 10));
                Ok::<_, OrchestratorError>(ordinal * 10)
            })
            .unwrap();
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_first_error_identifies_failing_task() {
        let executor = WaveExecutor::new(5);
        let completed = AtomicUsize::new(0);
        let result = executor.execute((1..=5).collect(), |ordinal: u32, _| {
            completed.fetch_add(1, Ordering::SeqCst);
            if ordinal == 3 {
                Err(fail(ordinal))
            } else {
                Ok(ordinal)
            }
        });

        let err = result.unwrap_err();
        assert_eq!(err.ordinal(), Some(3));
        // Siblings are not cancelled by default, every task ran
        assert_eq!(completed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_concurrency_bound_respected() {
        let executor = WaveExecutor::new(2);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        executor
            .execute((0..8).collect(), |_: u32, _| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, OrchestratorError>(())
            })
            .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_cancel_on_error_skips_queued_tasks() {
        let executor = WaveExecutor::new(1).cancel_on_error(true);
        let started = AtomicUsize::new(0);
        let result = executor.execute((1..=4).collect(), |ordinal: u32, _| {
            started.fetch_add(1, Ordering::SeqCst);
            if ordinal == 1 {
                Err(fail(ordinal))
            } else {
                // Give the collector time to observe the failure
                thread::sleep(Duration::from_millis(20));
                Ok(ordinal)
            }
        });

        assert_eq!(result.unwrap_err().ordinal(), Some(1));
        assert!(started.load(Ordering::SeqCst) < 4);
    }

    #[test]
    fn test_in_flight_tasks_observe_cancellation() {
        let executor = WaveExecutor::new(2).cancel_on_error(true);
        let observed = AtomicUsize::new(0);
        let result = executor.execute(vec![1u32, 2], |ordinal, cancel| {
            if ordinal == 1 {
                return Err(fail(ordinal));
            }
            for _ in 0..200 {
                if cancel.is_cancelled() {
                    observed.fetch_add(1, Ordering::SeqCst);
                    return Err(fail(ordinal));
                }
                thread::sleep(Duration::from_millis(5));
            }
            Ok(ordinal)
        });

        assert_eq!(result.unwrap_err().ordinal(), Some(1));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_wave() {
        let executor = WaveExecutor::new(3);
        let results = executor
            .execute(Vec::<u32>::new(), |ordinal, _| Ok::<_, OrchestratorError>(ordinal))
            .unwrap();
        assert!(results.is_empty());
    }
}
