//! Ordered decision table turning verification signals into a status,
//! sub-status, risk factors and a confidence score.

pub mod intel;
mod types;

use std::collections::BTreeSet;

pub use types::{RiskFactor, Status, SubStatus};

use crate::smtp::SmtpOutcome;

/// Outcome of domain resolution as seen by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSignal {
    Resolved,
    Unresolvable,
    TimedOut,
}

/// Everything the decision table looks at. `smtp` is `None` when no probe ran.
#[derive(Debug, Clone, Copy)]
pub struct Signals<'a> {
    pub local_part: &'a str,
    /// Lower-cased domain as written; used for the script check.
    pub domain: &'a str,
    /// IDNA form; used for list lookups.
    pub ascii_domain: &'a str,
    pub syntax_valid: bool,
    pub domain_signal: DomainSignal,
    pub smtp: Option<SmtpOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub sub_status: SubStatus,
    pub risk_factors: BTreeSet<RiskFactor>,
    pub confidence: u8,
}

impl Classification {
    fn new(status: Status, sub_status: SubStatus, confidence: i32) -> Self {
        Self {
            status,
            sub_status,
            risk_factors: BTreeSet::new(),
            confidence: clamp(confidence),
        }
    }
}

const TIMEOUT_PENALTY: i32 = 40;
const DISPOSABLE_PENALTY: i32 = 30;
const ROLE_PENALTY: i32 = 20;
const CATCH_ALL_PENALTY: i32 = 25;
const FREE_PROVIDER_PENALTY: i32 = 5;
const SHORT_LOCAL_PENALTY: i32 = 5;
const SUSPICIOUS_PENALTY: i32 = 10;
const RELIABLE_PROVIDER_BONUS: i32 = 5;

/// Applies the decision table. The first matching rule fixes status and
/// sub-status; the disposable, role-based and catch-all rules still add their
/// factors and penalties when an earlier rule already matched. Deterministic
/// for equal signals.
pub fn classify(signals: &Signals<'_>) -> Classification {
    if !signals.syntax_valid {
        let mut c = Classification::new(Status::Undeliverable, SubStatus::InvalidSyntax, 100);
        c.risk_factors.insert(RiskFactor::InvalidFormat);
        return c;
    }

    match signals.domain_signal {
        DomainSignal::Resolved => {}
        DomainSignal::Unresolvable => {
            return Classification::new(Status::Undeliverable, SubStatus::InvalidDomain, 100);
        }
        DomainSignal::TimedOut => {
            let mut c = Classification::new(
                Status::Undeliverable,
                SubStatus::InvalidDomain,
                100 - TIMEOUT_PENALTY,
            );
            c.risk_factors.insert(RiskFactor::Timeout);
            return c;
        }
    }

    if signals.smtp == Some(SmtpOutcome::MailboxNotFound) {
        return Classification::new(Status::Undeliverable, SubStatus::InvalidMailbox, 95);
    }

    let mut score = match signals.smtp {
        Some(SmtpOutcome::Accepted) => 90,
        Some(SmtpOutcome::CatchAll) => 70,
        Some(SmtpOutcome::Greylisted) => 50,
        _ => 40,
    };
    let mut factors = BTreeSet::new();
    let mut verdict: Option<(Status, SubStatus)> = None;

    if signals.smtp == Some(SmtpOutcome::Greylisted) {
        verdict = Some((Status::Risky, SubStatus::Greylisted));
        factors.insert(RiskFactor::Greylisted);
    }

    // Inconclusive SMTP evidence fixes the verdict; later rules only add
    // their factors and penalties.
    match signals.smtp {
        Some(SmtpOutcome::Timeout) => {
            verdict.get_or_insert((Status::Unknown, SubStatus::Timeout));
            factors.insert(RiskFactor::Timeout);
        }
        Some(outcome) if outcome.is_inconclusive() => {
            verdict.get_or_insert((Status::Unknown, SubStatus::ServerError));
        }
        None => {
            verdict.get_or_insert((Status::Unknown, SubStatus::ServerError));
        }
        _ => {}
    }

    if intel::is_disposable(signals.ascii_domain) {
        verdict.get_or_insert((Status::Risky, SubStatus::Disposable));
        factors.insert(RiskFactor::Disposable);
        factors.insert(RiskFactor::Temporary);
        score -= DISPOSABLE_PENALTY;
    }

    if intel::role_prefix(signals.local_part).is_some() {
        verdict.get_or_insert((Status::Risky, SubStatus::RoleBased));
        factors.insert(RiskFactor::RoleBased);
        if intel::is_no_reply(signals.local_part) {
            factors.insert(RiskFactor::NoReply);
        }
        score -= ROLE_PENALTY;
    }

    if signals.smtp == Some(SmtpOutcome::CatchAll) {
        verdict.get_or_insert((Status::Risky, SubStatus::CatchAll));
        factors.insert(RiskFactor::CatchAll);
        score -= CATCH_ALL_PENALTY;
    }

    if verdict.is_none() && intel::is_free_provider(signals.ascii_domain) {
        factors.insert(RiskFactor::FreeProvider);
        score -= FREE_PROVIDER_PENALTY;
    }

    if signals.smtp == Some(SmtpOutcome::Accepted) && intel::is_reliable_provider(signals.ascii_domain) {
        score += RELIABLE_PROVIDER_BONUS;
    }
    if signals.local_part.chars().count() <= 2 {
        factors.insert(RiskFactor::ShortLocalPart);
        score -= SHORT_LOCAL_PENALTY;
    }
    if intel::is_suspicious(signals.local_part, signals.domain) {
        factors.insert(RiskFactor::SuspiciousPattern);
        score -= SUSPICIOUS_PENALTY;
    }

    let (status, sub_status) = verdict.unwrap_or((Status::Deliverable, SubStatus::ValidMailbox));
    Classification {
        status,
        sub_status,
        risk_factors: factors,
        confidence: clamp(score),
    }
}

fn clamp(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}
