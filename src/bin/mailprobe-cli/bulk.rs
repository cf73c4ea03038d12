use std::io::{self, BufRead};
use std::path::Path;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::args::Cli;
use crate::output;
use mailprobe_lib::{BulkScheduler, JobStatus, Verifier};

pub async fn run_bulk(file: Option<&Path>, stdin: bool, cli: &Cli) -> Result<i32> {
    let addresses = read_addresses(file, stdin)?;
    if addresses.is_empty() {
        bail!("no addresses to verify");
    }

    let verifier = Verifier::new(cli.verifier_config()?).context("set up verifier")?;
    let scheduler = BulkScheduler::new(verifier);

    let bar = ProgressBar::new(addresses.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Verifying [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    let tick = bar.clone();
    let handle = scheduler.submit_with_progress(addresses, move |update| {
        tick.set_position(update.processed as u64);
        tick.set_message(format!(
            "smtp {} conn, {} greylisted",
            update.smtp.connections, update.smtp.greylist_hits
        ));
    })?;

    let token = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "mailprobe::bulk", "interrupted, finishing in-flight verifications");
            token.cancel();
        }
    });

    let job = handle.wait().await.context("bulk job")?;
    bar.finish_and_clear();

    output::write_job(&job, cli)?;
    match job.status {
        JobStatus::Completed => Ok(output::exit_code(job.results.iter().flatten())),
        status => {
            eprintln!(
                "job {} ended {status:?}: {}/{} addresses processed",
                job.id, job.processed, job.total
            );
            Ok(1)
        }
    }
}

/// One address per line; blank lines and `#` comments are skipped.
fn read_addresses(file: Option<&Path>, stdin: bool) -> Result<Vec<String>> {
    let lines: Vec<String> = match (file, stdin) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        (None, true) => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("read stdin")?,
        (None, false) => bail!("bulk needs --file <path> or --stdin"),
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}
