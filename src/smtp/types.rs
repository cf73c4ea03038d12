use std::fmt;

/// One (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// EHLO keyword lookup, e.g. `STARTTLS` or `SIZE`.
    pub fn has_capability(&self, keyword: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|token| token.eq_ignore_ascii_case(keyword))
        })
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Where a conversation stopped.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    #[default]
    Connecting,
    Greeted,
    HeloSent,
    MailFromSent,
    RcptToSent,
    Closed,
    Failed,
}

/// What the SMTP conversation says about the mailbox.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpOutcome {
    /// RCPT accepted and, when probed, a random mailbox was refused.
    Accepted,
    /// RCPT accepted for the target and for a random mailbox.
    CatchAll,
    /// 550/551/553 on RCPT.
    MailboxNotFound,
    /// 450/451/452 on RCPT after retries were exhausted.
    Greylisted,
    /// Any other 4xx.
    TemporaryFailure,
    /// 5xx outside RCPT, unexpected replies, or a TLS requirement not met.
    ServerError,
    /// No host/port/address accepted a connection.
    ConnectionFailed,
    /// Connection deadline or command timeout elapsed.
    Timeout,
}

impl SmtpOutcome {
    /// Outcomes worth another attempt after a delay.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Greylisted | Self::TemporaryFailure)
    }

    /// Outcomes that say nothing definite about the mailbox.
    pub fn is_inconclusive(self) -> bool {
        matches!(
            self,
            Self::TemporaryFailure | Self::ServerError | Self::ConnectionFailed | Self::Timeout
        )
    }
}

impl fmt::Display for SmtpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::CatchAll => "catch-all",
            Self::MailboxNotFound => "mailbox not found",
            Self::Greylisted => "greylisted",
            Self::TemporaryFailure => "temporary failure",
            Self::ServerError => "server error",
            Self::ConnectionFailed => "connection failed",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Full account of a probe, across retries.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReport {
    pub outcome: SmtpOutcome,
    pub connected: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: bool,
    /// Last meaningful reply code. Always `None` when `connected` is false.
    pub response_code: Option<u16>,
    pub response_message: Option<String>,
    pub retry_count: u32,
    pub greylist_detected: bool,
    pub final_state: ProbeState,
    pub transcript: Vec<String>,
}

impl SmtpReport {
    pub(crate) fn new(outcome: SmtpOutcome) -> Self {
        Self {
            outcome,
            connected: false,
            host: None,
            port: None,
            tls_enabled: false,
            response_code: None,
            response_message: None,
            retry_count: 0,
            greylist_detected: false,
            final_state: ProbeState::Connecting,
            transcript: Vec::new(),
        }
    }
}
