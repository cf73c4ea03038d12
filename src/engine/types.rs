use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::classify::{RiskFactor, Status, SubStatus};
use crate::smtp::SmtpReport;

/// SMTP evidence attached to a result.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmtpSummary {
    pub connected: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: bool,
    pub response_code: Option<u16>,
    pub response_message: Option<String>,
    pub retry_count: u32,
    pub greylist_detected: bool,
}

impl From<&SmtpReport> for SmtpSummary {
    fn from(report: &SmtpReport) -> Self {
        Self {
            connected: report.connected,
            host: report.host.clone(),
            port: report.port,
            tls_enabled: report.tls_enabled,
            response_code: report.response_code.filter(|_| report.connected),
            response_message: report.response_message.clone(),
            retry_count: report.retry_count,
            greylist_detected: report.greylist_detected,
        }
    }
}

/// Verdict for one address. Plain data: consumers store, display or export
/// it as they see fit.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub email: String,
    pub domain: String,
    pub status: Status,
    pub sub_status: SubStatus,
    pub syntax_valid: bool,
    pub domain_valid: bool,
    pub mx_found: bool,
    pub smtp: SmtpSummary,
    pub risk_factors: BTreeSet<RiskFactor>,
    /// 0..=100.
    pub confidence: u8,
    pub response_time_ms: u64,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn is_deliverable(&self) -> bool {
        self.status == Status::Deliverable
    }
}
