use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::resolver::{LookupMx, SystemResolver, resolve_uncached};
use super::{DomainRecord, ResolveFailure};
use crate::config::VerifierConfig;
use crate::error::Error;

type SharedLookup = Shared<BoxFuture<'static, Result<DomainRecord, ResolveFailure>>>;

struct CacheEntry {
    record: DomainRecord,
    expires_at: Instant,
}

struct Inner {
    lookup: Arc<dyn LookupMx>,
    // Lock order: `inflight` before `cache`. Neither is held across an await.
    inflight: Mutex<HashMap<String, SharedLookup>>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    timeout: Duration,
}

/// Caching, coalescing front of a [`LookupMx`] backend.
///
/// Successful records are kept for `mx_cache_ttl` in an LRU bounded by
/// `mx_cache_capacity`. Concurrent calls for the same uncached domain share a
/// single underlying resolution.
#[derive(Clone)]
pub struct MxResolver {
    inner: Arc<Inner>,
}

impl MxResolver {
    pub fn new(lookup: Arc<dyn LookupMx>, config: &VerifierConfig) -> Self {
        let capacity = NonZeroUsize::new(config.mx_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                lookup,
                inflight: Mutex::new(HashMap::new()),
                cache: Mutex::new(LruCache::new(capacity)),
                ttl: config.mx_cache_ttl,
                timeout: config.dns_timeout,
            }),
        }
    }

    /// Uses the system resolver configuration.
    pub fn system(config: &VerifierConfig) -> Result<Self, Error> {
        let lookup = SystemResolver::from_system_conf(config.dns_timeout)?;
        Ok(Self::new(Arc::new(lookup), config))
    }

    /// The backend, shared with the SMTP probe for exchange address lookups.
    pub fn backend(&self) -> Arc<dyn LookupMx> {
        Arc::clone(&self.inner.lookup)
    }

    pub fn cached_len(&self) -> usize {
        self.inner.cache.lock().len()
    }

    pub async fn resolve(&self, domain: &str) -> Result<DomainRecord, ResolveFailure> {
        let key = domain.trim().trim_end_matches('.').to_ascii_lowercase();

        let pending = {
            let mut inflight = self.inner.inflight.lock();
            if let Some(record) = self.inner.cached(&key) {
                debug!(target: "mailprobe::mx", domain = %key, "cache hit");
                return Ok(record);
            }
            match inflight.get(&key) {
                Some(existing) => {
                    debug!(target: "mailprobe::mx", domain = %key, "joining in-flight lookup");
                    existing.clone()
                }
                None => {
                    // Spawned so the lookup completes and leaves the in-flight
                    // map even when every waiting caller is cancelled.
                    let task = tokio::spawn(Arc::clone(&self.inner).resolve_and_store(key.clone()));
                    let domain = key.clone();
                    let lookup = async move {
                        task.await.unwrap_or_else(|err| {
                            Err(ResolveFailure::Lookup {
                                domain,
                                message: format!("resolver task failed: {err}"),
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.clone(), lookup.clone());
                    lookup
                }
            }
        };

        pending.await
    }
}

impl Inner {
    fn cached(&self, key: &str) -> Option<DomainRecord> {
        let mut cache = self.cache.lock();
        let fresh = cache.get(key).map(|e| e.expires_at > Instant::now())?;
        if fresh {
            cache.get(key).map(|e| e.record.clone())
        } else {
            cache.pop(key);
            None
        }
    }

    async fn resolve_and_store(self: Arc<Self>, key: String) -> Result<DomainRecord, ResolveFailure> {
        debug!(target: "mailprobe::mx", domain = %key, "resolving");
        let result = resolve_uncached(self.lookup.as_ref(), &key, self.timeout, self.ttl).await;

        let mut inflight = self.inflight.lock();
        if let Ok(record) = &result {
            self.cache.lock().put(
                key.clone(),
                CacheEntry {
                    record: record.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        inflight.remove(&key);
        result
    }
}
