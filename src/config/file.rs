//! TOML configuration file layered over [`VerifierConfig::default`].
//!
//! ```toml
//! [smtp]
//! ports = [25, 587]
//! connection_timeout_ms = 8000
//! tls_policy = "required"
//!
//! [bulk]
//! global_concurrency = 8
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{BackoffStrategy, TlsPolicy, VerifierConfig};
use crate::error::{Error, Result};

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) smtp: SmtpSection,
    #[serde(default)]
    pub(crate) dns: DnsSection,
    #[serde(default)]
    pub(crate) engine: EngineSection,
    #[serde(default)]
    pub(crate) bulk: BulkSection,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SmtpSection {
    pub(crate) ports: Option<Vec<u16>>,
    pub(crate) connection_timeout_ms: Option<u64>,
    pub(crate) command_timeout_ms: Option<u64>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) retry_delay_ms: Option<u64>,
    pub(crate) retry_backoff: Option<BackoffStrategy>,
    pub(crate) tls_policy: Option<TlsPolicy>,
    pub(crate) from_address: Option<String>,
    pub(crate) helo_hostname: Option<String>,
    pub(crate) catch_all_probe: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsSection {
    pub(crate) timeout_ms: Option<u64>,
    pub(crate) mx_cache_ttl_ms: Option<u64>,
    pub(crate) mx_cache_capacity: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct EngineSection {
    pub(crate) budget_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct BulkSection {
    pub(crate) global_concurrency: Option<usize>,
    pub(crate) per_domain_concurrency: Option<usize>,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|err| Error::ConfigFile {
            path: display.clone(),
            message: err.to_string(),
        })?;
        Self::parse(&contents).map_err(|err| Error::ConfigFile {
            path: display,
            message: err.to_string(),
        })
    }

    /// Applies every value present in the file onto `base`, then validates.
    pub fn apply(self, mut base: VerifierConfig) -> Result<VerifierConfig> {
        let millis = Duration::from_millis;

        let smtp = self.smtp;
        if let Some(ports) = smtp.ports {
            base.smtp_ports = ports;
        }
        if let Some(ms) = smtp.connection_timeout_ms {
            base.connection_timeout = millis(ms);
        }
        if let Some(ms) = smtp.command_timeout_ms {
            base.command_timeout = millis(ms);
        }
        if let Some(n) = smtp.max_retries {
            base.max_retries = n;
        }
        if let Some(ms) = smtp.retry_delay_ms {
            base.retry_delay = millis(ms);
        }
        if let Some(backoff) = smtp.retry_backoff {
            base.retry_backoff = backoff;
        }
        if let Some(policy) = smtp.tls_policy {
            base.tls_policy = policy;
        }
        if let Some(from) = smtp.from_address {
            base.from_address = from;
        }
        if let Some(helo) = smtp.helo_hostname {
            base.helo_hostname = helo;
        }
        if let Some(probe) = smtp.catch_all_probe {
            base.catch_all_probe = probe;
        }

        if let Some(ms) = self.dns.timeout_ms {
            base.dns_timeout = millis(ms);
        }
        if let Some(ms) = self.dns.mx_cache_ttl_ms {
            base.mx_cache_ttl = millis(ms);
        }
        if let Some(cap) = self.dns.mx_cache_capacity {
            base.mx_cache_capacity = cap;
        }

        if let Some(ms) = self.engine.budget_ms {
            base.engine_budget = millis(ms);
        }

        if let Some(n) = self.bulk.global_concurrency {
            base.global_concurrency = n;
        }
        if let Some(n) = self.bulk.per_domain_concurrency {
            base.per_domain_concurrency = n;
        }

        base.validate()?;
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let file = ConfigFile::parse(
            r#"
            [smtp]
            ports = [2525]
            command_timeout_ms = 1500
            tls_policy = "disabled"
            retry_backoff = "fixed"

            [bulk]
            per_domain_concurrency = 1
            "#,
        )
        .expect("parse");
        let cfg = file.apply(VerifierConfig::default()).expect("apply");
        assert_eq!(cfg.smtp_ports, vec![2525]);
        assert_eq!(cfg.command_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.tls_policy, TlsPolicy::Disabled);
        assert_eq!(cfg.retry_backoff, BackoffStrategy::Fixed);
        assert_eq!(cfg.per_domain_concurrency, 1);
        assert_eq!(cfg.global_concurrency, 16);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::parse("[smtp]\nport = 25\n").expect_err("unknown key");
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = ConfigFile::parse("[smtp]\nports = []\n").expect("parse");
        assert!(file.apply(VerifierConfig::default()).is_err());
    }
}
