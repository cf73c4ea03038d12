use std::fmt;

#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deliverable => "deliverable",
            Self::Undeliverable => "undeliverable",
            Self::Risky => "risky",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubStatus {
    ValidMailbox,
    InvalidSyntax,
    InvalidDomain,
    InvalidMailbox,
    CatchAll,
    Disposable,
    RoleBased,
    FreeProvider,
    Greylisted,
    Timeout,
    ServerError,
}

impl SubStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidMailbox => "valid_mailbox",
            Self::InvalidSyntax => "invalid_syntax",
            Self::InvalidDomain => "invalid_domain",
            Self::InvalidMailbox => "invalid_mailbox",
            Self::CatchAll => "catch_all",
            Self::Disposable => "disposable",
            Self::RoleBased => "role_based",
            Self::FreeProvider => "free_provider",
            Self::Greylisted => "greylisted",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for SubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk tags attached to a result. Ordered so a `BTreeSet` iterates them
/// deterministically.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskFactor {
    RoleBased,
    Disposable,
    Temporary,
    CatchAll,
    FreeProvider,
    Greylisted,
    Timeout,
    NoReply,
    ShortLocalPart,
    SuspiciousPattern,
    InvalidFormat,
}

impl RiskFactor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoleBased => "role_based",
            Self::Disposable => "disposable",
            Self::Temporary => "temporary",
            Self::CatchAll => "catch_all",
            Self::FreeProvider => "free_provider",
            Self::Greylisted => "greylisted",
            Self::Timeout => "timeout",
            Self::NoReply => "no_reply",
            Self::ShortLocalPart => "short_local_part",
            Self::SuspiciousPattern => "suspicious_pattern",
            Self::InvalidFormat => "invalid_format",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
