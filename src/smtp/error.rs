use thiserror::Error;

/// Transport and protocol failures inside one SMTP conversation. These never
/// reach callers; the probe folds them into an [`SmtpOutcome`](super::SmtpOutcome).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("timed out waiting for {stage}")]
    Timeout { stage: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("TLS handshake failed: {source}")]
    TlsHandshake {
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }

    pub(crate) fn timeout(stage: impl Into<String>) -> Self {
        Self::Timeout {
            stage: stage.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
