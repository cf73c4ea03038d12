use thiserror::Error;

/// Failure reported by a [`LookupMx`](super::LookupMx) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no records found")]
    NotFound,
    #[error("lookup timed out")]
    Timeout,
    #[error("lookup failed: {0}")]
    Failed(String),
}

/// Why a domain could not be turned into a [`DomainRecord`](super::DomainRecord).
/// Every variant means `domain_valid = false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveFailure {
    #[error("no mail exchanger for {domain}")]
    NoMailExchanger { domain: String },
    #[error("DNS resolution timed out for {domain}")]
    ResolutionTimeout { domain: String },
    #[error("DNS lookup failed for {domain}: {message}")]
    Lookup { domain: String, message: String },
}

impl ResolveFailure {
    pub(crate) fn no_mail_exchanger(domain: &str) -> Self {
        Self::NoMailExchanger {
            domain: domain.to_string(),
        }
    }

    pub(crate) fn timeout(domain: &str) -> Self {
        Self::ResolutionTimeout {
            domain: domain.to_string(),
        }
    }

    pub(crate) fn lookup(domain: &str, err: LookupError) -> Self {
        match err {
            LookupError::NotFound => Self::no_mail_exchanger(domain),
            LookupError::Timeout => Self::timeout(domain),
            LookupError::Failed(message) => Self::Lookup {
                domain: domain.to_string(),
                message,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ResolutionTimeout { .. })
    }
}
