//! Runtime configuration for the verifier, its defaults and validation.
//! The TOML file layer lives in [`file`].

#[cfg(feature = "with-serde")]
mod file;

#[cfg(feature = "with-serde")]
pub use file::ConfigFile;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::validator::validate_email;

/// STARTTLS behaviour of the SMTP probe.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Upgrade when advertised, fall back to plaintext on failure.
    #[default]
    Opportunistic,
    /// Abort the attempt when the upgrade is unavailable or fails.
    Required,
    /// Never upgrade.
    Disabled,
}

impl std::str::FromStr for TlsPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opportunistic" => Ok(Self::Opportunistic),
            "required" => Ok(Self::Required),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::config(format!(
                "unknown tls policy '{other}' (opportunistic|required|disabled)"
            ))),
        }
    }
}

/// Delay growth between SMTP retries.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    Fixed,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub smtp_ports: Vec<u16>,
    pub connection_timeout: Duration,
    pub command_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_backoff: BackoffStrategy,
    pub tls_policy: TlsPolicy,
    pub from_address: String,
    pub helo_hostname: String,
    pub catch_all_probe: bool,

    pub dns_timeout: Duration,
    pub mx_cache_ttl: Duration,
    pub mx_cache_capacity: usize,

    pub engine_budget: Duration,

    pub global_concurrency: usize,
    pub per_domain_concurrency: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            smtp_ports: vec![25, 587, 2525],
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_backoff: BackoffStrategy::Exponential,
            tls_policy: TlsPolicy::Opportunistic,
            from_address: "verify-probe@localhost.localdomain".to_string(),
            helo_hostname: "localhost.localdomain".to_string(),
            catch_all_probe: true,
            dns_timeout: Duration::from_secs(5),
            mx_cache_ttl: Duration::from_secs(300),
            mx_cache_capacity: 10_000,
            engine_budget: Duration::from_secs(15),
            global_concurrency: 16,
            per_domain_concurrency: 3,
        }
    }
}

impl VerifierConfig {
    /// Rejects settings the verifier cannot run with. Called by every
    /// constructor that accepts a config.
    pub fn validate(&self) -> Result<()> {
        if self.smtp_ports.is_empty() {
            return Err(Error::config("smtp_ports must not be empty"));
        }
        if self.smtp_ports.contains(&0) {
            return Err(Error::config("smtp_ports must not contain port 0"));
        }

        let timeouts = [
            ("connection_timeout", self.connection_timeout),
            ("command_timeout", self.command_timeout),
            ("dns_timeout", self.dns_timeout),
            ("engine_budget", self.engine_budget),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be positive")));
            }
        }

        if self.mx_cache_capacity == 0 {
            return Err(Error::config("mx_cache_capacity must be at least 1"));
        }
        if self.global_concurrency == 0 || self.per_domain_concurrency == 0 {
            return Err(Error::config("concurrency limits must be at least 1"));
        }
        if self.helo_hostname.trim().is_empty() {
            return Err(Error::config("helo_hostname must not be empty"));
        }
        // `localhost.localdomain` style senders are fine; a malformed one is not.
        let sender = validate_email(&self.from_address);
        if !sender.valid {
            return Err(Error::config(format!(
                "from_address '{}' is invalid: {}",
                self.from_address,
                sender.reasons.join("; ")
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        match self.retry_backoff {
            BackoffStrategy::Fixed => self.retry_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1).min(16));
                self.retry_delay.saturating_mul(factor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        VerifierConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_empty_port_list() {
        let cfg = VerifierConfig {
            smtp_ports: Vec::new(),
            ..VerifierConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let cfg = VerifierConfig {
            command_timeout: Duration::ZERO,
            ..VerifierConfig::default()
        };
        let err = cfg.validate().expect_err("zero timeout");
        assert!(err.to_string().contains("command_timeout"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let cfg = VerifierConfig {
            per_domain_concurrency: 0,
            ..VerifierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_malformed_sender() {
        let cfg = VerifierConfig {
            from_address: "not-an-address".into(),
            ..VerifierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn exponential_backoff_doubles() {
        let cfg = VerifierConfig {
            retry_delay: Duration::from_millis(100),
            ..VerifierConfig::default()
        };
        assert_eq!(cfg.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let cfg = VerifierConfig {
            retry_delay: Duration::from_millis(250),
            retry_backoff: BackoffStrategy::Fixed,
            ..VerifierConfig::default()
        };
        assert_eq!(cfg.backoff_delay(3), Duration::from_millis(250));
    }

    #[test]
    fn tls_policy_parses() {
        assert_eq!(
            "Required".parse::<TlsPolicy>().expect("parse"),
            TlsPolicy::Required
        );
        assert!("sometimes".parse::<TlsPolicy>().is_err());
    }
}
