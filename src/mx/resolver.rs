use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use trust_dns_resolver::{
    TokioAsyncResolver,
    error::{ResolveError, ResolveErrorKind},
};

use super::{DomainRecord, LookupError, MxHost, MxRecord, ResolveFailure};
use crate::error::Error;

/// DNS backend used by [`MxResolver`](super::MxResolver) and the SMTP probe.
#[async_trait]
pub trait LookupMx: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError>;
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, LookupError>;
}

/// System resolver configuration (`/etc/resolv.conf` or platform equivalent).
pub struct SystemResolver {
    inner: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn from_system_conf(timeout: Duration) -> Result<Self, Error> {
        let (config, mut opts) = trust_dns_resolver::system_conf::read_system_conf()
            .map_err(|err| Error::ResolverInit {
                message: err.to_string(),
            })?;
        opts.timeout = timeout;
        Ok(Self {
            inner: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

#[async_trait]
impl LookupMx for SystemResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError> {
        let lookup = self.inner.mx_lookup(domain).await.map_err(map_error)?;
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
            .collect())
    }

    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
        let lookup = self.inner.lookup_ip(host).await.map_err(map_error)?;
        Ok(lookup.iter().collect())
    }
}

fn map_error(err: ResolveError) -> LookupError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => LookupError::NotFound,
        ResolveErrorKind::Timeout => LookupError::Timeout,
        _ => LookupError::Failed(err.to_string()),
    }
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

/// Resolves `domain` without touching the cache, bounded by `timeout`.
pub(crate) async fn resolve_uncached(
    lookup: &dyn LookupMx,
    domain: &str,
    timeout: Duration,
    ttl: Duration,
) -> Result<DomainRecord, ResolveFailure> {
    let hosts = match tokio::time::timeout(timeout, lookup_hosts(lookup, domain)).await {
        Ok(result) => result?,
        Err(_) => return Err(ResolveFailure::timeout(domain)),
    };
    Ok(DomainRecord {
        domain: domain.to_string(),
        hosts,
        resolved_at: Utc::now(),
        ttl,
    })
}

async fn lookup_hosts(lookup: &dyn LookupMx, domain: &str) -> Result<Vec<MxHost>, ResolveFailure> {
    match lookup.lookup_mx(domain).await {
        Ok(records) => {
            let mut records: Vec<MxRecord> = records
                .into_iter()
                .map(|r| MxRecord::new(r.preference, normalize_exchange(&r.exchange)))
                .collect();
            records.sort();
            records.dedup();

            // RFC 7505 null MX: the domain explicitly accepts no mail.
            if records.len() == 1 && records[0].exchange.is_empty() {
                debug!(target: "mailprobe::mx", domain, "null MX record");
                return Err(ResolveFailure::no_mail_exchanger(domain));
            }

            let hosts: Vec<MxHost> = records
                .into_iter()
                .filter(|r| !r.exchange.is_empty())
                .map(|r| MxHost {
                    exchange: r.exchange,
                    preference: r.preference,
                    implicit: false,
                })
                .collect();
            if !hosts.is_empty() {
                return Ok(hosts);
            }
        }
        Err(LookupError::NotFound) => {}
        Err(err) => return Err(ResolveFailure::lookup(domain, err)),
    }

    debug!(target: "mailprobe::mx", domain, "no MX records, trying implicit A/AAAA");
    match lookup.lookup_ip(domain).await {
        Ok(addrs) if !addrs.is_empty() => Ok(vec![MxHost {
            exchange: domain.to_string(),
            preference: u16::MAX,
            implicit: true,
        }]),
        Ok(_) => Err(ResolveFailure::no_mail_exchanger(domain)),
        Err(err) => Err(ResolveFailure::lookup(domain, err)),
    }
}
