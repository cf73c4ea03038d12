use thiserror::Error;

/// Hard errors surfaced to callers. Every network or protocol outcome is
/// folded into a [`VerificationResult`](crate::VerificationResult) instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("resolver initialization failed: {message}")]
    ResolverInit { message: String },
    #[error("TLS setup failed: {source}")]
    Tls {
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "with-serde")]
    #[error("config file {path}: {message}")]
    ConfigFile { path: String, message: String },
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
