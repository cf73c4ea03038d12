use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::Verifier;
use crate::classify::{RiskFactor, Status, SubStatus};
use crate::config::VerifierConfig;
use crate::error::Error;
use crate::mx::tests::StubResolver;
use crate::mx::{DomainRecord, MxRecord};
use crate::smtp::{MailboxProbe, ProbeState, SmtpOutcome, SmtpReport};
use crate::validator::EmailAddress;

/// Probe answering with a fixed outcome per local part (default for others).
pub(crate) struct StubProbe {
    pub default: SmtpOutcome,
    pub overrides: Vec<(&'static str, SmtpOutcome)>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StubProbe {
    pub fn new(default: SmtpOutcome) -> Self {
        Self {
            default,
            overrides: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, local: &'static str, outcome: SmtpOutcome) -> Self {
        self.overrides.push((local, outcome));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxProbe for StubProbe {
    async fn probe(&self, address: &EmailAddress, record: &DomainRecord) -> SmtpReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .overrides
            .iter()
            .find(|(local, _)| *local == address.local_part())
            .map(|(_, outcome)| *outcome)
            .unwrap_or(self.default);

        let mut report = SmtpReport::new(outcome);
        if outcome != SmtpOutcome::ConnectionFailed {
            report.connected = true;
            report.host = record.hosts.first().map(|h| h.exchange.clone());
            report.port = Some(25);
            report.response_code = Some(match outcome {
                SmtpOutcome::Accepted | SmtpOutcome::CatchAll => 250,
                SmtpOutcome::MailboxNotFound => 550,
                SmtpOutcome::Greylisted => 451,
                SmtpOutcome::TemporaryFailure => 421,
                _ => 554,
            });
            report.final_state = ProbeState::Closed;
        } else {
            report.final_state = ProbeState::Failed;
        }
        report.greylist_detected = outcome == SmtpOutcome::Greylisted;
        report
    }
}

pub(crate) fn stub_dns() -> StubResolver {
    let local = IpAddr::V4(Ipv4Addr::LOCALHOST);
    StubResolver::default()
        .with_mx("company.com", vec![MxRecord::new(10, "mx.company.com")])
        .with_mx("mailinator.com", vec![MxRecord::new(10, "mx.mailinator.com")])
        .with_mx("gmail.com", vec![MxRecord::new(5, "gmail-smtp-in.l.google.com")])
        .with_ip("implicit.example", local)
}

fn verifier(dns: StubResolver, probe: Arc<StubProbe>) -> Verifier {
    Verifier::with_components(VerifierConfig::default(), Arc::new(dns), probe).expect("verifier")
}

#[tokio::test]
async fn blank_input_is_rejected() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Accepted)));
    assert!(matches!(v.verify("   ").await, Err(Error::InvalidInput(_))));
    assert!(matches!(v.verify("").await, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn invalid_syntax_skips_network_stages() {
    let dns = Arc::new(stub_dns());
    let probe = Arc::new(StubProbe::new(SmtpOutcome::Accepted));
    let v = Verifier::with_components(VerifierConfig::default(), dns.clone(), probe.clone())
        .expect("verifier");

    let r = v.verify("not-an-address").await.expect("result");
    assert_eq!(r.status, Status::Undeliverable);
    assert_eq!(r.sub_status, SubStatus::InvalidSyntax);
    assert!(!r.syntax_valid);
    assert!(!r.domain_valid);
    assert!(r.risk_factors.contains(&RiskFactor::InvalidFormat));
    assert_eq!(dns.calls(), 0);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn unresolvable_domain_skips_smtp() {
    let probe = Arc::new(StubProbe::new(SmtpOutcome::Accepted));
    let v = verifier(stub_dns(), probe.clone());

    let r = v
        .verify("user@nonexistent-domain-xyz.invalid")
        .await
        .expect("result");
    assert_eq!(r.status, Status::Undeliverable);
    assert_eq!(r.sub_status, SubStatus::InvalidDomain);
    assert!(r.syntax_valid);
    assert!(!r.domain_valid);
    assert!(!r.smtp.connected);
    assert_eq!(r.smtp.response_code, None);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn accepted_mailbox_is_deliverable() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Accepted)));

    let r = v.verify("  alice@Company.com ").await.expect("result");
    assert_eq!(r.email, "alice@Company.com");
    assert_eq!(r.domain, "company.com");
    assert_eq!(r.status, Status::Deliverable);
    assert_eq!(r.sub_status, SubStatus::ValidMailbox);
    assert!(r.domain_valid && r.mx_found);
    assert!(r.smtp.connected);
    assert_eq!(r.smtp.host.as_deref(), Some("mx.company.com"));
    assert_eq!(r.smtp.response_code, Some(250));
    assert_eq!(r.confidence, 90);
}

#[tokio::test]
async fn implicit_host_counts_as_valid_domain_without_mx() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Accepted)));

    let r = v.verify("alice@implicit.example").await.expect("result");
    assert!(r.domain_valid);
    assert!(!r.mx_found);
    assert_eq!(r.status, Status::Deliverable);
}

#[tokio::test]
async fn rejected_mailbox_is_undeliverable() {
    let probe = StubProbe::new(SmtpOutcome::Accepted).with("ghost", SmtpOutcome::MailboxNotFound);
    let v = verifier(stub_dns(), Arc::new(probe));

    let r = v.verify("ghost@company.com").await.expect("result");
    assert_eq!(r.sub_status, SubStatus::InvalidMailbox);
    assert_eq!(r.smtp.response_code, Some(550));
}

#[tokio::test]
async fn disposable_domain_is_risky() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Accepted)));

    let r = v.verify("user@mailinator.com").await.expect("result");
    assert_eq!(r.status, Status::Risky);
    assert!(r.risk_factors.contains(&RiskFactor::Disposable));
}

#[tokio::test]
async fn role_based_address_is_risky() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Accepted)));

    let r = v.verify("admin@company.com").await.expect("result");
    assert_eq!(r.status, Status::Risky);
    assert_eq!(r.sub_status, SubStatus::RoleBased);
    assert!(r.risk_factors.contains(&RiskFactor::RoleBased));
}

#[tokio::test]
async fn role_based_timeout_stays_unknown() {
    let probe = StubProbe::new(SmtpOutcome::Accepted).with("admin", SmtpOutcome::Timeout);
    let v = verifier(stub_dns(), Arc::new(probe));

    let r = v.verify("admin@company.com").await.expect("result");
    assert_eq!((r.status, r.sub_status), (Status::Unknown, SubStatus::Timeout));
    assert!(r.risk_factors.contains(&RiskFactor::RoleBased));
    assert!(r.risk_factors.contains(&RiskFactor::Timeout));
}

#[tokio::test]
async fn disposable_server_error_stays_unknown() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::ServerError)));

    let r = v.verify("user@mailinator.com").await.expect("result");
    assert_eq!((r.status, r.sub_status), (Status::Unknown, SubStatus::ServerError));
    assert!(r.risk_factors.contains(&RiskFactor::Disposable));
}

#[tokio::test]
async fn greylisted_after_retries_is_risky() {
    let v = verifier(stub_dns(), Arc::new(StubProbe::new(SmtpOutcome::Greylisted)));

    let r = v.verify("alice@company.com").await.expect("result");
    assert_eq!((r.status, r.sub_status), (Status::Risky, SubStatus::Greylisted));
    assert!(r.smtp.greylist_detected);
}

#[tokio::test]
async fn budget_exceeded_during_smtp_is_unknown_timeout() {
    let probe = StubProbe::new(SmtpOutcome::Accepted).with_delay(Duration::from_secs(5));
    let config = VerifierConfig {
        engine_budget: Duration::from_millis(50),
        ..VerifierConfig::default()
    };
    let v = Verifier::with_components(config, Arc::new(stub_dns()), Arc::new(probe))
        .expect("verifier");

    let r = v.verify("alice@company.com").await.expect("result");
    assert_eq!(r.status, Status::Unknown);
    assert_eq!(r.sub_status, SubStatus::Timeout);
    assert!(r.risk_factors.contains(&RiskFactor::Timeout));
    assert!(r.syntax_valid && r.domain_valid && r.mx_found);
    assert!(!r.smtp.connected);
}

#[tokio::test]
async fn budget_exceeded_during_resolution_is_invalid_domain() {
    let dns = stub_dns().with_delay(Duration::from_secs(5));
    let config = VerifierConfig {
        engine_budget: Duration::from_millis(50),
        ..VerifierConfig::default()
    };
    let v = Verifier::with_components(
        config,
        Arc::new(dns),
        Arc::new(StubProbe::new(SmtpOutcome::Accepted)),
    )
    .expect("verifier");

    let r = v.verify("alice@company.com").await.expect("result");
    assert_eq!(r.status, Status::Undeliverable);
    assert_eq!(r.sub_status, SubStatus::InvalidDomain);
    assert!(r.risk_factors.contains(&RiskFactor::Timeout));
    assert!(!r.domain_valid);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = VerifierConfig {
        smtp_ports: Vec::new(),
        ..VerifierConfig::default()
    };
    let result = Verifier::with_components(
        config,
        Arc::new(stub_dns()),
        Arc::new(StubProbe::new(SmtpOutcome::Accepted)),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
