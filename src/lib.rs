#![forbid(unsafe_code)]
//! mailprobe_lib: email deliverability verification.
//!
//! A [`Verifier`] runs syntax validation, MX resolution (cached and
//! coalesced), an SMTP mailbox probe and risk classification for one
//! address. A [`BulkScheduler`] fans many addresses out over the same
//! verifier under global and per-domain concurrency caps.

pub mod bulk;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod mx;
pub mod smtp;
pub mod validator;

pub use bulk::{BulkHandle, BulkJob, BulkScheduler, BulkSummary, JobStatus, ProgressUpdate, SmtpStats};
pub use classify::{RiskFactor, Status, SubStatus};
#[cfg(feature = "with-serde")]
pub use config::ConfigFile;
pub use config::{BackoffStrategy, TlsPolicy, VerifierConfig};
pub use engine::{SmtpSummary, VerificationResult, Verifier};
pub use error::{Error, Result};
pub use mx::{DomainRecord, LookupMx, MxRecord, MxResolver, ResolveFailure};
pub use smtp::{MailboxProbe, SmtpOutcome, SmtpProber, SmtpReport};
pub use validator::{EmailAddress, SyntaxReport, validate_email};
