//! First-success race over candidate URLs.
//!
//! Candidates are admitted in list order through a semaphore of width `C`;
//! their outcomes arrive on a fan-in channel in completion order. The first
//! `Accepted` outcome flips the shared `decided` flag (compare-and-set, so
//! exactly once), cancels every other probe, and is returned. Probes check
//! the flag before publishing, and the coordinator stops reading once it has
//! a winner, so late results are dropped.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CandidateList, LinkValidator, ValidationOutcome, WatchLink};
use crate::error::{CinelinkError, Result};
use crate::metrics;

/// Default number of probes in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runs the validator over a candidate list and keeps the first success.
#[derive(Clone)]
pub struct RaceCoordinator {
    validator: Arc<dyn LinkValidator>,
    concurrency: usize,
    probe_timeout: Duration,
}

impl RaceCoordinator {
    /// # Errors
    /// Returns [`CinelinkError::Config`] when `concurrency` is zero.
    pub fn new(
        validator: Arc<dyn LinkValidator>,
        concurrency: usize,
        probe_timeout: Duration,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(CinelinkError::Config(
                "race concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            validator,
            concurrency,
            probe_timeout,
        })
    }

    /// Validate `candidates` concurrently and return the first accepted link
    /// in completion order, or `None` once every probe has been rejected.
    ///
    /// Dropping the returned future cancels all outstanding probes.
    pub async fn race(&self, candidates: CandidateList) -> Option<WatchLink> {
        if candidates.is_empty() {
            debug!("No candidates to race");
            return None;
        }

        let total = candidates.len();
        let cancel = CancellationToken::new();
        let _cancel_on_exit = cancel.clone().drop_guard();
        let decided = Arc::new(AtomicBool::new(false));
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<ValidationOutcome>(total);

        let mut pending = candidates.into_iter();
        let mut next = pending.next();
        let mut in_flight = 0usize;
        let mut rejected = 0usize;

        loop {
            tokio::select! {
                // Drain completions before admitting more work.
                biased;

                Some(outcome) = rx.recv(), if in_flight > 0 => {
                    in_flight -= 1;

                    if let Some(link) = outcome.into_link() {
                        if decided
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            cancel.cancel();
                            metrics::record_race(true);
                            info!(
                                "Race won by {} after {} rejections ({} candidates)",
                                link.url, rejected, total
                            );
                            return Some(link);
                        }
                    } else {
                        rejected += 1;
                    }

                    if next.is_none() && in_flight == 0 {
                        break;
                    }
                }

                permit = permits.clone().acquire_owned(), if next.is_some() => {
                    let Ok(permit) = permit else {
                        break;
                    };
                    let Some(url) = next.take() else {
                        continue;
                    };
                    next = pending.next();
                    in_flight += 1;
                    self.spawn_probe(url, permit, tx.clone(), cancel.clone(), decided.clone());
                }
            }
        }

        metrics::record_race(false);
        info!("Race finished with no winner ({} candidates rejected)", rejected);
        None
    }

    fn spawn_probe(
        &self,
        url: String,
        permit: OwnedSemaphorePermit,
        tx: mpsc::Sender<ValidationOutcome>,
        cancel: CancellationToken,
        decided: Arc<AtomicBool>,
    ) {
        let validator = self.validator.clone();
        let probe_timeout = self.probe_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let probe = AssertUnwindSafe(validator.validate(&url)).catch_unwind();

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Probe cancelled for {}", url);
                    return;
                }
                result = tokio::time::timeout(probe_timeout, probe) => match result {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(_)) => {
                        warn!("Validator panicked while probing {}", url);
                        ValidationOutcome::Rejected
                    }
                    Err(_) => {
                        debug!("Probe timed out for {}", url);
                        ValidationOutcome::Rejected
                    }
                },
            };

            if decided.load(Ordering::Acquire) {
                return;
            }
            // The receiver is gone once the race is decided.
            let _ = tx.send(outcome).await;
        });
    }
}
