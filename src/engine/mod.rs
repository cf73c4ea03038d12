//! Single-address verification: syntax, then domain resolution, then the
//! SMTP probe, then classification, all under one wall-clock budget.

mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use types::{SmtpSummary, VerificationResult};

use crate::classify::{DomainSignal, RiskFactor, Signals, Status, SubStatus, classify};
use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::mx::{LookupMx, MxResolver};
use crate::smtp::{MailboxProbe, SmtpOutcome, SmtpProber, SmtpReport};
use crate::validator::validate_email;

/// Verifies addresses. Cheap to clone; clones share the resolver cache.
#[derive(Clone)]
pub struct Verifier {
    config: Arc<VerifierConfig>,
    resolver: MxResolver,
    probe: Arc<dyn MailboxProbe>,
}

impl Verifier {
    /// Production wiring: system DNS configuration and live SMTP probing.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        config.validate()?;
        let resolver = MxResolver::system(&config)?;
        let probe = SmtpProber::new(&config, resolver.backend())?;
        Ok(Self {
            config: Arc::new(config),
            resolver,
            probe: Arc::new(probe),
        })
    }

    /// Custom DNS backend and probe, typically stubs.
    pub fn with_components(
        config: VerifierConfig,
        lookup: Arc<dyn LookupMx>,
        probe: Arc<dyn MailboxProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = MxResolver::new(lookup, &config);
        Ok(Self {
            config: Arc::new(config),
            resolver,
            probe,
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MxResolver {
        &self.resolver
    }

    /// Verifies one address. Only blank input is an error; every other
    /// outcome, however adverse, is a result.
    ///
    /// If the budget runs out while the domain is still resolving, the
    /// result is undeliverable/invalid_domain with the `timeout` factor and
    /// `domain_valid` stays false. Expiry after resolution gives
    /// unknown/timeout.
    pub async fn verify(&self, address: &str) -> Result<VerificationResult> {
        let input = address.trim();
        if input.is_empty() {
            return Err(Error::invalid_input("address must not be empty"));
        }

        let started = Instant::now();
        let mut progress = Progress::default();
        let finished = tokio::time::timeout(
            self.config.engine_budget,
            self.run(input, &mut progress),
        )
        .await
        .is_ok();
        if !finished {
            warn!(
                target: "mailprobe::engine",
                email = input,
                budget_ms = self.config.engine_budget.as_millis() as u64,
                "verification budget exceeded"
            );
        }

        let result = progress.into_result(input, finished, started);
        info!(
            target: "mailprobe::engine",
            email = %result.email,
            status = %result.status,
            sub_status = %result.sub_status,
            confidence = result.confidence,
            elapsed_ms = result.response_time_ms,
            "verified"
        );
        Ok(result)
    }

    async fn run(&self, input: &str, progress: &mut Progress) {
        let report = validate_email(input);
        progress.syntax_valid = report.valid;
        progress.domain = report.domain.clone();
        progress.local_part = report.local_part.clone();
        progress.ascii_domain = report.ascii_domain.clone();
        let Some(address) = report.into_address() else {
            debug!(target: "mailprobe::engine", email = input, "invalid syntax");
            return;
        };

        let record = match self.resolver.resolve(address.ascii_domain()).await {
            Ok(record) => record,
            Err(failure) => {
                debug!(target: "mailprobe::engine", email = input, error = %failure, "domain unresolvable");
                progress.domain_signal = Some(if failure.is_timeout() {
                    DomainSignal::TimedOut
                } else {
                    DomainSignal::Unresolvable
                });
                return;
            }
        };
        progress.domain_signal = Some(DomainSignal::Resolved);
        progress.mx_found = record.has_mx();

        progress.smtp = Some(self.probe.probe(&address, &record).await);
    }
}

/// Result for input the engine refuses (blank entries in a bulk list).
pub(crate) fn rejected_input(email: &str) -> VerificationResult {
    Progress::default().into_result(email, true, Instant::now())
}

/// Fields gathered so far. Survives the budget timeout.
#[derive(Default)]
struct Progress {
    syntax_valid: bool,
    local_part: String,
    domain: String,
    ascii_domain: String,
    domain_signal: Option<DomainSignal>,
    mx_found: bool,
    smtp: Option<SmtpReport>,
}

impl Progress {
    fn into_result(self, email: &str, finished: bool, started: Instant) -> VerificationResult {
        // Budget expiry while resolving counts as a resolution timeout.
        let domain_signal = self.domain_signal.unwrap_or(DomainSignal::TimedOut);
        let probe_cut_short = !finished && self.syntax_valid && domain_signal == DomainSignal::Resolved;

        let smtp_outcome = match &self.smtp {
            Some(report) => Some(report.outcome),
            None if probe_cut_short => Some(SmtpOutcome::Timeout),
            None => None,
        };
        let mut classification = classify(&Signals {
            local_part: &self.local_part,
            domain: &self.domain,
            ascii_domain: &self.ascii_domain,
            syntax_valid: self.syntax_valid,
            domain_signal,
            smtp: smtp_outcome,
        });
        if probe_cut_short {
            classification.status = Status::Unknown;
            classification.sub_status = SubStatus::Timeout;
            classification.risk_factors.insert(RiskFactor::Timeout);
        }

        VerificationResult {
            email: email.to_string(),
            domain: self.domain,
            status: classification.status,
            sub_status: classification.sub_status,
            syntax_valid: self.syntax_valid,
            domain_valid: self.syntax_valid && domain_signal == DomainSignal::Resolved,
            mx_found: self.mx_found,
            smtp: self.smtp.as_ref().map(SmtpSummary::from).unwrap_or_default(),
            risk_factors: classification.risk_factors,
            confidence: classification.confidence,
            response_time_ms: started.elapsed().as_millis() as u64,
            verified_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests;
