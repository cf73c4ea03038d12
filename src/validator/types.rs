use std::fmt;

/// Outcome of [`validate_email`](super::validate_email).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxReport {
    pub original: String,
    pub valid: bool,
    pub local_part: String,
    /// Lower-cased domain as written (may contain Unicode).
    pub domain: String,
    /// IDNA form used for DNS and SMTP. Empty when conversion failed.
    pub ascii_domain: String,
    pub reasons: Vec<String>,
}

impl SyntaxReport {
    pub fn into_address(self) -> Option<EmailAddress> {
        if !self.valid {
            return None;
        }
        Some(EmailAddress {
            local_part: self.local_part,
            domain: self.domain,
            ascii_domain: self.ascii_domain,
        })
    }
}

/// A syntactically valid address, split once and never mutated.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    local_part: String,
    domain: String,
    ascii_domain: String,
}

impl EmailAddress {
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn ascii_domain(&self) -> &str {
        &self.ascii_domain
    }

    /// `local@ascii-domain`, the form sent in `RCPT TO`.
    pub fn envelope(&self) -> String {
        format!("{}@{}", self.local_part, self.ascii_domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}
