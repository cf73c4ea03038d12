use std::time::Duration;

use chrono::{DateTime, Utc};

/// A raw MX answer as returned by a [`LookupMx`](super::LookupMx) backend.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// A mail exchanger candidate, ordered by preference.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxHost {
    pub exchange: String,
    pub preference: u16,
    /// True when derived from A/AAAA records because no MX exists.
    pub implicit: bool,
}

/// Resolver cache entry for one domain.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    pub hosts: Vec<MxHost>,
    pub resolved_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl DomainRecord {
    /// True when at least one explicit MX record backs this domain.
    pub fn has_mx(&self) -> bool {
        self.hosts.iter().any(|h| !h.implicit)
    }
}
