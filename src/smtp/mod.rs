//! Live SMTP mailbox probing.
//!
//! [`SmtpProber`] connects to the exchangers of a resolved domain, walks the
//! EHLO / STARTTLS / MAIL FROM / RCPT TO dialogue and reports what the server
//! said in an [`SmtpReport`]. No message is ever sent: every conversation ends
//! with QUIT before DATA.

mod error;
mod probe;
mod session;
mod tls;
mod types;

use async_trait::async_trait;

pub use error::SessionError;
pub use probe::SmtpProber;
pub use types::{ProbeState, SmtpOutcome, SmtpReply, SmtpReport};

use crate::mx::DomainRecord;
use crate::validator::EmailAddress;

/// Mailbox probing seam used by the verification engine.
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    /// Never fails: transport and protocol problems become outcomes.
    async fn probe(&self, address: &EmailAddress, record: &DomainRecord) -> SmtpReport;
}
