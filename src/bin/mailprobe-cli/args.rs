use std::path::PathBuf;

use anyhow::{Result, bail};
#[cfg(feature = "with-serde")]
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
#[cfg(feature = "with-serde")]
use mailprobe_lib::ConfigFile;
use mailprobe_lib::{TlsPolicy, VerifierConfig};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Email deliverability verification")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// TOML configuration file ([smtp], [dns], [engine], [bulk])
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// format: human|json|ndjson
    #[arg(long, global = true, default_value = "human")]
    pub format: String,

    /// write the report to a file instead of stdout
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// STARTTLS policy: opportunistic|required|disabled
    #[arg(long, global = true)]
    pub tls: Option<String>,

    /// MAIL FROM envelope address
    #[arg(long = "from", global = true)]
    pub from_address: Option<String>,

    /// name sent with EHLO/HELO
    #[arg(long, global = true)]
    pub helo: Option<String>,

    /// SMTP ports, tried in order (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub ports: Vec<u16>,

    /// skip the random-recipient catch-all probe
    #[arg(long = "no-catch-all", global = true)]
    pub no_catch_all: bool,

    /// per-address time budget (ms)
    #[arg(long = "timeout", global = true)]
    pub budget_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Syntax check only, no network
    Validate { email: String },
    /// Full verification of one address
    Verify { email: String },
    /// Verify a list of addresses, one per line
    Bulk {
        /// read addresses from this file
        #[arg(long, conflicts_with = "stdin")]
        file: Option<PathBuf>,
        /// read addresses from stdin
        #[arg(long)]
        stdin: bool,
        /// simultaneous verifications overall
        #[arg(long)]
        concurrency: Option<usize>,
        /// simultaneous verifications per domain
        #[arg(long = "per-domain")]
        per_domain: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
    Ndjson,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn output_format(&self) -> Result<Format> {
        match self.format.as_str() {
            "human" => Ok(Format::Human),
            "json" => Ok(Format::Json),
            "ndjson" => Ok(Format::Ndjson),
            other => bail!("unknown --format '{other}', use: human|json|ndjson"),
        }
    }

    /// Defaults, then the config file, then command-line flags.
    pub fn verifier_config(&self) -> Result<VerifierConfig> {
        let mut config = self.file_config()?;

        if let Some(tls) = &self.tls {
            config.tls_policy = tls.parse::<TlsPolicy>()?;
        }
        if let Some(from) = &self.from_address {
            config.from_address = from.clone();
        }
        if let Some(helo) = &self.helo {
            config.helo_hostname = helo.clone();
        }
        if !self.ports.is_empty() {
            config.smtp_ports = self.ports.clone();
        }
        if self.no_catch_all {
            config.catch_all_probe = false;
        }
        if let Some(ms) = self.budget_ms {
            config.engine_budget = std::time::Duration::from_millis(ms);
        }
        if let Some(Commands::Bulk {
            concurrency,
            per_domain,
            ..
        }) = &self.cmd
        {
            if let Some(n) = concurrency {
                config.global_concurrency = *n;
            }
            if let Some(n) = per_domain {
                config.per_domain_concurrency = *n;
            }
        }

        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "with-serde")]
    fn file_config(&self) -> Result<VerifierConfig> {
        let base = VerifierConfig::default();
        let Some(path) = &self.config else {
            return Ok(base);
        };
        let file = ConfigFile::load(path)
            .with_context(|| format!("load config {}", path.display()))?;
        Ok(file.apply(base)?)
    }

    #[cfg(not(feature = "with-serde"))]
    fn file_config(&self) -> Result<VerifierConfig> {
        if self.config.is_some() {
            bail!("--config requires the 'with-serde' feature");
        }
        Ok(VerifierConfig::default())
    }
}
