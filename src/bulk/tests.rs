use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BulkScheduler, JobStatus, ProgressUpdate};
use crate::classify::{Status, SubStatus};
use crate::config::VerifierConfig;
use crate::engine::Verifier;
use crate::engine::tests::{StubProbe, stub_dns};
use crate::error::Error;
use crate::mx::DomainRecord;
use crate::smtp::{MailboxProbe, SmtpOutcome, SmtpReport};
use crate::validator::EmailAddress;

fn scheduler(config: VerifierConfig, probe: Arc<dyn MailboxProbe>) -> BulkScheduler {
    let verifier =
        Verifier::with_components(config, Arc::new(stub_dns()), probe).expect("verifier");
    BulkScheduler::new(verifier)
}

fn addresses(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Records the highest number of simultaneous probes, overall and per domain.
#[derive(Default)]
struct ConcurrencyProbe {
    state: Mutex<Gauge>,
}

#[derive(Default)]
struct Gauge {
    active: usize,
    peak: usize,
    per_domain: HashMap<String, (usize, usize)>,
}

#[async_trait]
impl MailboxProbe for ConcurrencyProbe {
    async fn probe(&self, address: &EmailAddress, _record: &DomainRecord) -> SmtpReport {
        let domain = address.ascii_domain().to_string();
        {
            let mut g = self.state.lock();
            g.active += 1;
            g.peak = g.peak.max(g.active);
            let slot = g.per_domain.entry(domain.clone()).or_default();
            slot.0 += 1;
            slot.1 = slot.1.max(slot.0);
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        {
            let mut g = self.state.lock();
            g.active -= 1;
            if let Some(slot) = g.per_domain.get_mut(&domain) {
                slot.0 -= 1;
            }
        }
        let mut report = SmtpReport::new(SmtpOutcome::Accepted);
        report.connected = true;
        report
    }
}

#[tokio::test]
async fn empty_job_is_rejected() {
    let s = scheduler(
        VerifierConfig::default(),
        Arc::new(StubProbe::new(SmtpOutcome::Accepted)),
    );
    assert!(matches!(s.submit(Vec::new()), Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn results_follow_input_order() {
    let probe = StubProbe::new(SmtpOutcome::Accepted).with("ghost", SmtpOutcome::MailboxNotFound);
    let s = scheduler(VerifierConfig::default(), Arc::new(probe));
    let input = addresses(&[
        "alice@company.com",
        "ghost@company.com",
        "bob@gmail.com",
        "carol@nonexistent-domain-xyz.invalid",
        "dave@mailinator.com",
    ]);

    let handle = s.submit(input.clone()).expect("submit");
    let job = handle.wait().await.expect("job");

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.addresses, input);
    assert_eq!(job.total, 5);
    assert_eq!(job.processed, 5);
    assert!(job.finished_at.is_some());
    assert!(job.finished_at.expect("finished") >= job.submitted_at);

    let results: Vec<_> = job.results.iter().map(|r| r.as_ref().expect("slot")).collect();
    for (result, address) in results.iter().zip(&input) {
        assert_eq!(&result.email, address);
    }
    assert_eq!(results[0].status, Status::Deliverable);
    assert_eq!(results[1].sub_status, SubStatus::InvalidMailbox);
    assert_eq!(results[3].sub_status, SubStatus::InvalidDomain);
    assert_eq!(results[4].status, Status::Risky);

    let summary = &job.summary;
    assert_eq!(summary.total, 5);
    assert_eq!(
        summary.deliverable + summary.undeliverable + summary.risky + summary.unknown,
        5
    );
    assert_eq!(summary.deliverable, 2);
    assert_eq!(summary.undeliverable, 2);
    assert_eq!(summary.risky, 1);
    assert!((summary.deliverable_rate - 0.4).abs() < f64::EPSILON);
    // Four probes reached a server; the unresolvable domain never did.
    assert_eq!(summary.smtp.connections, 4);
    // Only the 550 for ghost; the unresolvable domain never reached SMTP.
    assert_eq!(summary.smtp.failures, 1);
}

#[tokio::test]
async fn smtp_failures_count_refused_connections_and_error_replies() {
    let probe = StubProbe::new(SmtpOutcome::Accepted)
        .with("down", SmtpOutcome::ConnectionFailed)
        .with("busy", SmtpOutcome::TemporaryFailure)
        .with("broken", SmtpOutcome::ServerError);
    let s = scheduler(VerifierConfig::default(), Arc::new(probe));
    let input = addresses(&[
        "alice@company.com",
        "down@company.com",
        "busy@company.com",
        "broken@company.com",
    ]);

    let job = s.submit(input).expect("submit").wait().await.expect("job");

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.summary.smtp.connections, 3);
    assert_eq!(job.summary.smtp.failures, 3);
    assert_eq!(job.summary.unknown, 3);
}

#[tokio::test]
async fn progress_is_reported_per_address() {
    let s = scheduler(
        VerifierConfig::default(),
        Arc::new(StubProbe::new(SmtpOutcome::Greylisted)),
    );
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
    let sink = Arc::clone(&updates);

    let handle = s
        .submit_with_progress(
            addresses(&["alice@company.com", "bob@company.com", "carol@gmail.com"]),
            move |update| sink.lock().push(update),
        )
        .expect("submit");
    let job = handle.wait().await.expect("job");
    assert_eq!(job.status, JobStatus::Completed);

    let updates = updates.lock();
    assert_eq!(updates.len(), 3);
    let processed: Vec<usize> = updates.iter().map(|u| u.processed).collect();
    assert_eq!(processed, vec![1, 2, 3]);
    let last = updates.last().expect("last update");
    assert_eq!(last.total, 3);
    assert!((last.percentage - 100.0).abs() < f64::EPSILON);
    assert_eq!(last.smtp.greylist_hits, 3);
    assert_eq!(job.summary.smtp.greylist_hits, 3);
}

#[tokio::test]
async fn blank_entry_becomes_invalid_syntax() {
    let s = scheduler(
        VerifierConfig::default(),
        Arc::new(StubProbe::new(SmtpOutcome::Accepted)),
    );
    let job = s
        .submit(addresses(&["alice@company.com", "   ", "bob@company.com"]))
        .expect("submit")
        .wait()
        .await
        .expect("job");

    assert_eq!(job.status, JobStatus::Completed);
    let blank = job.results[1].as_ref().expect("slot");
    assert_eq!(blank.email, "");
    assert_eq!(blank.status, Status::Undeliverable);
    assert_eq!(blank.sub_status, SubStatus::InvalidSyntax);
    assert!(!blank.syntax_valid);
}

#[tokio::test]
async fn concurrency_caps_are_respected() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let config = VerifierConfig {
        global_concurrency: 3,
        per_domain_concurrency: 2,
        ..VerifierConfig::default()
    };
    let s = scheduler(config, probe.clone());

    let mut input = Vec::new();
    for name in ["alice", "bob", "carol", "dave", "erin", "frank"] {
        input.push(format!("{name}@company.com"));
        input.push(format!("{name}@gmail.com"));
    }
    let job = s.submit(input).expect("submit").wait().await.expect("job");
    assert_eq!(job.processed, 12);

    let gauge = probe.state.lock();
    assert!(gauge.peak <= 3, "global peak {}", gauge.peak);
    assert!(gauge.peak > 1, "probes never overlapped");
    for (domain, (_, peak)) in &gauge.per_domain {
        assert!(*peak <= 2, "{domain} peak {peak}");
    }
}

#[tokio::test]
async fn cancel_before_start_leaves_all_slots_empty() {
    let probe = Arc::new(StubProbe::new(SmtpOutcome::Accepted).with_delay(Duration::from_millis(50)));
    let s = scheduler(VerifierConfig::default(), probe.clone());

    let handle = s
        .submit(addresses(&["alice@company.com", "bob@company.com"]))
        .expect("submit");
    // The job task has not been polled yet on this single-threaded runtime.
    handle.cancel();
    let job = handle.wait().await.expect("job");

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.processed, 0);
    assert!(job.results.iter().all(Option::is_none));
    assert_eq!(job.summary.total, 0);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn cancel_mid_run_keeps_finished_results() {
    let probe = Arc::new(StubProbe::new(SmtpOutcome::Accepted).with_delay(Duration::from_millis(200)));
    let config = VerifierConfig {
        global_concurrency: 1,
        ..VerifierConfig::default()
    };
    let s = scheduler(config, probe.clone());

    let handle = s
        .submit(addresses(&["alice@company.com", "bob@gmail.com", "carol@company.com"]))
        .expect("submit");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.status(), JobStatus::Running);
    handle.cancel();
    let job = handle.wait().await.expect("job");

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.processed, 1);
    assert_eq!(job.results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(job.summary.total, 1);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn handle_reports_identity_and_progress() {
    let s = scheduler(
        VerifierConfig::default(),
        Arc::new(StubProbe::new(SmtpOutcome::Accepted)),
    );
    let handle = s.submit(addresses(&["alice@company.com"])).expect("submit");
    let id = handle.id();
    assert_eq!(handle.progress().total, 1);

    let job = handle.wait().await.expect("job");
    assert_eq!(job.id, id);
    assert_eq!(job.processed, 1);
}
