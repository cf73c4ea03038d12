use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::Status;
use crate::engine::VerificationResult;

#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    /// A verification task panicked; its slot stays empty.
    Failed,
}

/// Running SMTP statistics for a job.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmtpStats {
    /// Results whose probe reached a server.
    pub connections: u64,
    /// Probes that never reached a server or ended on a 4xx/5xx reply.
    pub failures: u64,
    pub greylist_hits: u64,
    pub retries: u64,
}

/// Emitted after every completed address.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
    pub smtp: SmtpStats,
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    /// Number of results (equals the input size unless cancelled).
    pub total: usize,
    pub deliverable: usize,
    pub undeliverable: usize,
    pub risky: usize,
    pub unknown: usize,
    pub deliverable_rate: f64,
    pub undeliverable_rate: f64,
    pub risky_rate: f64,
    pub unknown_rate: f64,
    pub average_response_time_ms: f64,
    pub smtp: SmtpStats,
}

impl BulkSummary {
    pub(crate) fn from_results<'a, I>(results: I, smtp: SmtpStats) -> Self
    where
        I: IntoIterator<Item = &'a VerificationResult>,
    {
        let mut summary = Self {
            smtp,
            ..Self::default()
        };
        let mut total_ms = 0u64;
        for result in results {
            summary.total += 1;
            total_ms += result.response_time_ms;
            match result.status {
                Status::Deliverable => summary.deliverable += 1,
                Status::Undeliverable => summary.undeliverable += 1,
                Status::Risky => summary.risky += 1,
                Status::Unknown => summary.unknown += 1,
            }
        }
        if summary.total > 0 {
            let n = summary.total as f64;
            summary.deliverable_rate = summary.deliverable as f64 / n;
            summary.undeliverable_rate = summary.undeliverable as f64 / n;
            summary.risky_rate = summary.risky as f64 / n;
            summary.unknown_rate = summary.unknown as f64 / n;
            summary.average_response_time_ms = total_ms as f64 / n;
        }
        summary
    }
}

/// Finished job. `results` is parallel to `addresses`; a slot is `None` only
/// when the job was cancelled before that address was processed.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BulkJob {
    pub id: Uuid,
    pub addresses: Vec<String>,
    pub results: Vec<Option<VerificationResult>>,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub summary: BulkSummary,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
