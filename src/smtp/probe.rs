use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use super::session::SmtpSession;
use super::tls::native_connector;
use super::{MailboxProbe, ProbeState, SessionError, SmtpOutcome, SmtpReply, SmtpReport};
use crate::config::{TlsPolicy, VerifierConfig};
use crate::error::Error;
use crate::mx::{DomainRecord, LookupMx};
use crate::validator::EmailAddress;

/// Live RCPT-based mailbox probe.
pub struct SmtpProber {
    config: VerifierConfig,
    lookup: Arc<dyn LookupMx>,
    tls: Option<TlsConnector>,
}

impl SmtpProber {
    /// `lookup` resolves exchange hostnames to addresses.
    pub fn new(config: &VerifierConfig, lookup: Arc<dyn LookupMx>) -> Result<Self, Error> {
        config.validate()?;
        let tls = match config.tls_policy {
            TlsPolicy::Disabled => None,
            TlsPolicy::Opportunistic | TlsPolicy::Required => Some(native_connector()?),
        };
        Ok(Self {
            config: config.clone(),
            lookup,
            tls,
        })
    }

    async fn attempt(
        &self,
        address: &EmailAddress,
        record: &DomainRecord,
        transcript: &mut Vec<String>,
    ) -> Attempt {
        let mut allow_tls = self.tls.is_some();
        loop {
            let mut session = match self.connect(record, transcript).await {
                Ok(session) => session,
                Err(outcome) => return Attempt::unconnected(outcome),
            };

            let step = match self.dialogue(&mut session, address, allow_tls).await {
                Ok(step) => step,
                Err(err) => {
                    warn!(target: "mailprobe::smtp", host = session.host(), error = %err, "session aborted");
                    session.fail();
                    let outcome = match err {
                        SessionError::Timeout { .. } => SmtpOutcome::Timeout,
                        _ => SmtpOutcome::ServerError,
                    };
                    Step::Finish(Finish::note(outcome, err.to_string()))
                }
            };

            session.close().await;
            transcript.extend(session.take_transcript());

            match step {
                Step::RetryPlaintext => {
                    allow_tls = false;
                }
                Step::Finish(finish) => {
                    return Attempt {
                        outcome: finish.outcome,
                        connected: true,
                        host: Some(session.host().to_string()),
                        port: Some(session.port()),
                        tls_enabled: session.tls_enabled(),
                        code: finish.code,
                        message: finish.message,
                        final_state: session.state(),
                    };
                }
            }
        }
    }

    /// Walks hosts, then ports, then addresses, all under one deadline.
    async fn connect(
        &self,
        record: &DomainRecord,
        transcript: &mut Vec<String>,
    ) -> Result<SmtpSession, SmtpOutcome> {
        let deadline = Instant::now() + self.config.connection_timeout;

        'hosts: for host in &record.hosts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let ips = match self.addresses(&host.exchange, remaining).await {
                Ok(ips) => ips,
                Err(reason) => {
                    transcript.push(format!("[{}] ! {reason}", host.exchange));
                    continue;
                }
            };

            for &port in &self.config.smtp_ports {
                for &ip in &ips {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break 'hosts;
                    }
                    let addr = SocketAddr::new(ip, port);
                    match SmtpSession::connect(
                        &host.exchange,
                        addr,
                        remaining,
                        self.config.command_timeout,
                    )
                    .await
                    {
                        Ok(session) => return Ok(session),
                        Err(err) => {
                            debug!(target: "mailprobe::smtp", host = %host.exchange, %addr, error = %err, "connect failed");
                            transcript.push(format!("[{}:{port}] ! {err}", host.exchange));
                        }
                    }
                }
            }
        }

        if Instant::now() >= deadline {
            warn!(target: "mailprobe::smtp", domain = %record.domain, "connection deadline elapsed");
            Err(SmtpOutcome::Timeout)
        } else {
            Err(SmtpOutcome::ConnectionFailed)
        }
    }

    async fn addresses(&self, exchange: &str, budget: Duration) -> Result<Vec<IpAddr>, String> {
        if let Ok(ip) = exchange.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        match tokio::time::timeout(budget, self.lookup.lookup_ip(exchange)).await {
            Ok(Ok(ips)) if !ips.is_empty() => Ok(ips),
            Ok(Ok(_)) => Err("no addresses".to_string()),
            Ok(Err(err)) => Err(format!("address lookup failed: {err}")),
            Err(_) => Err("address lookup timed out".to_string()),
        }
    }

    async fn dialogue(
        &self,
        session: &mut SmtpSession,
        address: &EmailAddress,
        allow_tls: bool,
    ) -> Result<Step, SessionError> {
        let greeting = session.read_greeting().await?;
        if !greeting.is_positive_completion() {
            return Ok(Step::rejected(&greeting));
        }
        session.advance(ProbeState::Greeted);

        let ehlo_cmd = format!("EHLO {}", self.config.helo_hostname);
        let mut hello = session.command(&ehlo_cmd).await?;
        let mut extended = true;
        if hello.is_permanent_failure() {
            hello = session
                .command(&format!("HELO {}", self.config.helo_hostname))
                .await?;
            extended = false;
        }
        if !hello.is_positive_completion() {
            return Ok(Step::rejected(&hello));
        }
        session.advance(ProbeState::HeloSent);

        if let (true, Some(connector)) = (allow_tls, &self.tls) {
            let required = self.config.tls_policy == TlsPolicy::Required;
            let advertised = extended && hello.has_capability("STARTTLS");
            if !advertised {
                if required {
                    return Ok(Step::Finish(Finish::note(
                        SmtpOutcome::ServerError,
                        "STARTTLS required but not advertised",
                    )));
                }
            } else {
                let reply = session.command("STARTTLS").await?;
                if !reply.is_positive_completion() {
                    if required {
                        return Ok(Step::Finish(Finish::reply(SmtpOutcome::ServerError, &reply)));
                    }
                    debug!(target: "mailprobe::smtp", host = session.host(), code = reply.code, "STARTTLS refused, continuing in plaintext");
                } else {
                    match session.upgrade_tls(connector).await {
                        Ok(()) => {
                            let again = session.command(&ehlo_cmd).await?;
                            if !again.is_positive_completion() {
                                return Ok(Step::rejected(&again));
                            }
                        }
                        Err(err) if !required => {
                            warn!(target: "mailprobe::smtp", host = session.host(), error = %err, "TLS handshake failed, reconnecting in plaintext");
                            return Ok(Step::RetryPlaintext);
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        let mail = session
            .command(&format!("MAIL FROM:<{}>", self.config.from_address))
            .await?;
        if !mail.is_positive_completion() {
            return Ok(Step::rejected(&mail));
        }
        session.advance(ProbeState::MailFromSent);

        let rcpt = session
            .command(&format!("RCPT TO:<{}>", address.envelope()))
            .await?;
        session.advance(ProbeState::RcptToSent);
        let outcome = rcpt_outcome(&rcpt);

        if outcome == SmtpOutcome::Accepted && self.config.catch_all_probe {
            let probe = format!("RCPT TO:<{}@{}>", random_local_part(), address.ascii_domain());
            match session.command(&probe).await {
                Ok(reply) if reply.is_positive_completion() => {
                    return Ok(Step::Finish(Finish::reply(SmtpOutcome::CatchAll, &rcpt)));
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(target: "mailprobe::smtp", host = session.host(), error = %err, "catch-all probe inconclusive");
                }
            }
        }

        Ok(Step::Finish(Finish::reply(outcome, &rcpt)))
    }
}

#[async_trait]
impl MailboxProbe for SmtpProber {
    async fn probe(&self, address: &EmailAddress, record: &DomainRecord) -> SmtpReport {
        let mut report = SmtpReport::new(SmtpOutcome::ConnectionFailed);
        let mut retries = 0;

        loop {
            let attempt = self.attempt(address, record, &mut report.transcript).await;
            if attempt.outcome == SmtpOutcome::Greylisted {
                report.greylist_detected = true;
            }
            attempt.apply(&mut report);

            if attempt.outcome.is_retryable() && retries < self.config.max_retries {
                retries += 1;
                let delay = self.config.backoff_delay(retries);
                warn!(
                    target: "mailprobe::smtp",
                    address = %address,
                    outcome = %attempt.outcome,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "temporary rejection, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            break;
        }

        report.retry_count = retries;
        info!(
            target: "mailprobe::smtp",
            address = %address,
            outcome = %report.outcome,
            code = ?report.response_code,
            retries,
            "probe finished"
        );
        report
    }
}

enum Step {
    Finish(Finish),
    /// The TLS handshake failed under the opportunistic policy.
    RetryPlaintext,
}

impl Step {
    fn rejected(reply: &SmtpReply) -> Self {
        let outcome = if reply.is_transient_failure() {
            SmtpOutcome::TemporaryFailure
        } else {
            SmtpOutcome::ServerError
        };
        Self::Finish(Finish::reply(outcome, reply))
    }
}

struct Finish {
    outcome: SmtpOutcome,
    code: Option<u16>,
    message: Option<String>,
}

impl Finish {
    fn reply(outcome: SmtpOutcome, reply: &SmtpReply) -> Self {
        Self {
            outcome,
            code: Some(reply.code),
            message: Some(reply.message()),
        }
    }

    fn note(outcome: SmtpOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            code: None,
            message: Some(message.into()),
        }
    }
}

struct Attempt {
    outcome: SmtpOutcome,
    connected: bool,
    host: Option<String>,
    port: Option<u16>,
    tls_enabled: bool,
    code: Option<u16>,
    message: Option<String>,
    final_state: ProbeState,
}

impl Attempt {
    fn unconnected(outcome: SmtpOutcome) -> Self {
        Self {
            outcome,
            connected: false,
            host: None,
            port: None,
            tls_enabled: false,
            code: None,
            message: None,
            final_state: ProbeState::Failed,
        }
    }

    fn apply(&self, report: &mut SmtpReport) {
        report.outcome = self.outcome;
        report.connected = self.connected;
        report.host = self.host.clone();
        report.port = self.port;
        report.tls_enabled = self.tls_enabled;
        report.response_code = if self.connected { self.code } else { None };
        report.response_message = self.message.clone();
        report.final_state = self.final_state;
    }
}

fn rcpt_outcome(reply: &SmtpReply) -> SmtpOutcome {
    match reply.code {
        200..=299 => SmtpOutcome::Accepted,
        550 | 551 | 553 => SmtpOutcome::MailboxNotFound,
        450..=452 => SmtpOutcome::Greylisted,
        400..=499 => SmtpOutcome::TemporaryFailure,
        _ => SmtpOutcome::ServerError,
    }
}

fn random_local_part() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(code: u16) -> SmtpReply {
        SmtpReply {
            code,
            lines: vec!["x".into()],
        }
    }

    #[test]
    fn rcpt_codes_map_to_outcomes() {
        assert_eq!(rcpt_outcome(&reply(250)), SmtpOutcome::Accepted);
        assert_eq!(rcpt_outcome(&reply(251)), SmtpOutcome::Accepted);
        assert_eq!(rcpt_outcome(&reply(550)), SmtpOutcome::MailboxNotFound);
        assert_eq!(rcpt_outcome(&reply(551)), SmtpOutcome::MailboxNotFound);
        assert_eq!(rcpt_outcome(&reply(553)), SmtpOutcome::MailboxNotFound);
        assert_eq!(rcpt_outcome(&reply(450)), SmtpOutcome::Greylisted);
        assert_eq!(rcpt_outcome(&reply(452)), SmtpOutcome::Greylisted);
        assert_eq!(rcpt_outcome(&reply(421)), SmtpOutcome::TemporaryFailure);
        assert_eq!(rcpt_outcome(&reply(554)), SmtpOutcome::ServerError);
    }

    #[test]
    fn random_local_part_is_lowercase_alphanumeric() {
        let local = random_local_part();
        assert_eq!(local.len(), 20);
        assert!(local.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }
}
