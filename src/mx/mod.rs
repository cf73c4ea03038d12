//! Domain resolution: MX lookup with implicit A/AAAA fallback, a TTL + LRU
//! cache and single-flight coalescing of concurrent lookups.
//!
//! The public entry point is [`MxResolver::resolve`]. DNS access goes through
//! the [`LookupMx`] trait so tests can swap in a stub backend.

mod cache;
mod error;
mod resolver;
mod types;

pub use cache::MxResolver;
pub use error::{LookupError, ResolveFailure};
pub use resolver::{LookupMx, SystemResolver};
pub use types::{DomainRecord, MxHost, MxRecord};
