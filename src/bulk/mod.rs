//! Many-address verification with global and per-domain concurrency caps,
//! progress reporting and cancellation.

mod limiter;
mod types;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use types::{BulkJob, BulkSummary, JobStatus, ProgressUpdate, SmtpStats};

use crate::engine::{VerificationResult, Verifier, rejected_input};
use crate::error::{Error, Result};
use limiter::{DomainLimiter, domain_key};

type ProgressFn = dyn Fn(ProgressUpdate) + Send + Sync;

/// Submits bulk jobs against a shared [`Verifier`] (and its resolver cache).
#[derive(Clone)]
pub struct BulkScheduler {
    verifier: Verifier,
}

impl BulkScheduler {
    pub fn new(verifier: Verifier) -> Self {
        Self { verifier }
    }

    /// Starts a job on the current Tokio runtime.
    pub fn submit(&self, addresses: Vec<String>) -> Result<BulkHandle> {
        self.spawn(addresses, None)
    }

    /// Like [`submit`](Self::submit); `on_progress` runs after every completed
    /// address, one call at a time.
    pub fn submit_with_progress<F>(&self, addresses: Vec<String>, on_progress: F) -> Result<BulkHandle>
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.spawn(addresses, Some(Arc::new(on_progress)))
    }

    fn spawn(&self, addresses: Vec<String>, on_progress: Option<Arc<ProgressFn>>) -> Result<BulkHandle> {
        if addresses.is_empty() {
            return Err(Error::invalid_input("bulk job needs at least one address"));
        }

        let shared = Arc::new(JobShared {
            id: Uuid::new_v4(),
            total: addresses.len(),
            submitted_at: Utc::now(),
            status: Mutex::new(JobStatus::Pending),
            counters: Counters::default(),
        });
        let token = CancellationToken::new();
        info!(target: "mailprobe::bulk", job = %shared.id, total = shared.total, "job submitted");

        let job = Job {
            verifier: self.verifier.clone(),
            shared: Arc::clone(&shared),
            token: token.clone(),
            on_progress,
        };
        let task = tokio::spawn(job.run(addresses));

        Ok(BulkHandle {
            shared,
            token,
            task,
        })
    }
}

/// Live view of a submitted job.
pub struct BulkHandle {
    shared: Arc<JobShared>,
    token: CancellationToken,
    task: JoinHandle<BulkJob>,
}

impl BulkHandle {
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn status(&self) -> JobStatus {
        *self.shared.status.lock()
    }

    pub fn progress(&self) -> ProgressUpdate {
        self.shared.snapshot()
    }

    /// Stops scheduling new addresses. Verifications already running finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this job, for callers that must cancel from
    /// elsewhere (a signal handler) while awaiting [`wait`](Self::wait).
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> Result<BulkJob> {
        self.task
            .await
            .map_err(|err| Error::Task(format!("bulk job {}: {err}", self.shared.id)))
    }
}

struct JobShared {
    id: Uuid,
    total: usize,
    submitted_at: DateTime<Utc>,
    status: Mutex<JobStatus>,
    counters: Counters,
}

impl JobShared {
    fn set_status(&self, status: JobStatus) {
        *self.status.lock() = status;
    }

    fn snapshot(&self) -> ProgressUpdate {
        let processed = self.counters.processed.load(Ordering::SeqCst);
        ProgressUpdate {
            processed,
            total: self.total,
            percentage: processed as f64 * 100.0 / self.total as f64,
            smtp: self.counters.smtp(),
        }
    }
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    connections: AtomicU64,
    failures: AtomicU64,
    greylist_hits: AtomicU64,
    retries: AtomicU64,
}

impl Counters {
    fn record(&self, result: &VerificationResult) {
        if result.smtp.connected {
            self.connections.fetch_add(1, Ordering::SeqCst);
        }
        if smtp_failed(result) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        if result.smtp.greylist_detected {
            self.greylist_hits.fetch_add(1, Ordering::SeqCst);
        }
        self.retries
            .fetch_add(u64::from(result.smtp.retry_count), Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn smtp(&self) -> SmtpStats {
        SmtpStats {
            connections: self.connections.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            greylist_hits: self.greylist_hits.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
        }
    }
}

/// A probe ran (the domain resolved) and either never reached a server or
/// ended on a 4xx/5xx reply.
fn smtp_failed(result: &VerificationResult) -> bool {
    result.domain_valid
        && (!result.smtp.connected || result.smtp.response_code.is_some_and(|code| code >= 400))
}

struct Job {
    verifier: Verifier,
    shared: Arc<JobShared>,
    token: CancellationToken,
    on_progress: Option<Arc<ProgressFn>>,
}

impl Job {
    async fn run(self, addresses: Vec<String>) -> BulkJob {
        self.shared.set_status(JobStatus::Running);

        let config = self.verifier.config();
        let global = Arc::new(Semaphore::new(config.global_concurrency));
        let domains = Arc::new(DomainLimiter::new(config.per_domain_concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, VerificationResult)>();

        let mut tasks = JoinSet::new();
        for (index, address) in addresses.iter().enumerate() {
            if self.token.is_cancelled() {
                break;
            }
            let address = address.clone();
            let verifier = self.verifier.clone();
            let token = self.token.clone();
            let global = Arc::clone(&global);
            let domains = Arc::clone(&domains);
            let tx = tx.clone();
            tasks.spawn(async move {
                let key = domain_key(&address);
                let _domain_permit = tokio::select! {
                    _ = token.cancelled() => return,
                    permit = domains.acquire(&key) => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                let _global_permit = tokio::select! {
                    _ = token.cancelled() => return,
                    permit = global.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                if token.is_cancelled() {
                    return;
                }
                let result = match verifier.verify(&address).await {
                    Ok(result) => result,
                    Err(_) => rejected_input(address.trim()),
                };
                // The receiver outlives every task.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut results: Vec<Option<VerificationResult>> = vec![None; addresses.len()];
        while let Some((index, result)) = rx.recv().await {
            debug!(
                target: "mailprobe::bulk",
                job = %self.shared.id,
                index,
                email = %result.email,
                status = %result.status,
                "address processed"
            );
            self.shared.counters.record(&result);
            results[index] = Some(result);
            if let Some(on_progress) = &self.on_progress {
                on_progress(self.shared.snapshot());
            }
        }

        let mut panicked = false;
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(target: "mailprobe::bulk", job = %self.shared.id, error = %err, "verification task failed");
                panicked = true;
            }
        }

        let processed = results.iter().filter(|r| r.is_some()).count();
        let status = if panicked {
            JobStatus::Failed
        } else if processed < addresses.len() {
            JobStatus::Cancelled
        } else {
            JobStatus::Completed
        };
        self.shared.set_status(status);

        let summary = BulkSummary::from_results(results.iter().flatten(), self.shared.counters.smtp());
        info!(
            target: "mailprobe::bulk",
            job = %self.shared.id,
            status = ?status,
            processed,
            total = addresses.len(),
            deliverable = summary.deliverable,
            undeliverable = summary.undeliverable,
            risky = summary.risky,
            unknown = summary.unknown,
            "job finished"
        );

        BulkJob {
            id: self.shared.id,
            total: addresses.len(),
            addresses,
            results,
            status,
            processed,
            summary,
            submitted_at: self.shared.submitted_at,
            finished_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests;
