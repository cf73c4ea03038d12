use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::validator::validate_email;

/// One semaphore per destination domain, created on first use.
pub(crate) struct DomainLimiter {
    limit: usize,
    domains: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl DomainLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, domain: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        let semaphore = {
            let mut domains = self.domains.lock();
            Arc::clone(
                domains
                    .entry(domain.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.limit))),
            )
        };
        semaphore.acquire_owned().await
    }
}

/// Grouping key: the IDNA domain when the address is valid, otherwise the
/// lower-cased text after the last `@`.
pub(crate) fn domain_key(address: &str) -> String {
    let report = validate_email(address);
    if report.valid && !report.ascii_domain.is_empty() {
        return report.ascii_domain;
    }
    address
        .trim()
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('.').to_lowercase())
        .unwrap_or_default()
}
