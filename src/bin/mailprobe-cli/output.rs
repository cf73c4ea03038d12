use anyhow::{Context, Result};
#[cfg(not(feature = "with-serde"))]
use anyhow::bail;

use crate::args::{Cli, Format};
use mailprobe_lib::{BulkJob, BulkSummary, Status, SyntaxReport, VerificationResult};

/// Exit codes: 0 when nothing is undeliverable, 2 otherwise. Fatal errors
/// leave `main` with 1.
pub fn exit_code<'a>(results: impl IntoIterator<Item = &'a VerificationResult>) -> i32 {
    if results
        .into_iter()
        .any(|r| r.status == Status::Undeliverable)
    {
        2
    } else {
        0
    }
}

pub fn write_syntax(report: &SyntaxReport, cli: &Cli) -> Result<()> {
    match cli.output_format()? {
        Format::Human => {
            let line = if report.valid {
                format!("[OK]    {}\n", report.original)
            } else {
                format!(
                    "[INVALID] {} :: {}\n",
                    report.original,
                    report.reasons.join("; ")
                )
            };
            emit(line.as_bytes(), cli)
        }
        Format::Json => write_json(report, cli),
        Format::Ndjson => write_ndjson(std::slice::from_ref(report), cli),
    }
}

pub fn write_result(result: &VerificationResult, cli: &Cli) -> Result<()> {
    match cli.output_format()? {
        Format::Human => emit(human_result(result).as_bytes(), cli),
        Format::Json => write_json(result, cli),
        Format::Ndjson => write_ndjson(std::slice::from_ref(result), cli),
    }
}

pub fn write_job(job: &BulkJob, cli: &Cli) -> Result<()> {
    match cli.output_format()? {
        Format::Human => {
            let mut text = String::new();
            for (address, slot) in job.addresses.iter().zip(&job.results) {
                match slot {
                    Some(result) => text.push_str(&human_result(result)),
                    None => text.push_str(&format!("[SKIPPED] {address} :: cancelled\n")),
                }
            }
            text.push_str(&human_summary(&job.summary));
            emit(text.as_bytes(), cli)
        }
        Format::Json => write_json(job, cli),
        Format::Ndjson => {
            let rows: Vec<&VerificationResult> = job.results.iter().flatten().collect();
            write_ndjson(&rows, cli)
        }
    }
}

fn human_result(r: &VerificationResult) -> String {
    let mut text = format!(
        "[{}] {} :: {} (confidence {}, {} ms)\n",
        r.status.as_str().to_uppercase(),
        r.email,
        r.sub_status,
        r.confidence,
        r.response_time_ms
    );
    if r.smtp.connected {
        let host = r.smtp.host.as_deref().unwrap_or("?");
        let port = r.smtp.port.map(|p| p.to_string()).unwrap_or_default();
        let code = r.smtp.response_code.map(|c| c.to_string()).unwrap_or_default();
        let message = r.smtp.response_message.as_deref().unwrap_or("");
        text.push_str(&format!(
            "        smtp: {host}:{port} tls={} {code} {message}\n",
            r.smtp.tls_enabled
        ));
        if r.smtp.retry_count > 0 {
            text.push_str(&format!(
                "        retries: {} (greylisted={})\n",
                r.smtp.retry_count, r.smtp.greylist_detected
            ));
        }
    }
    if !r.risk_factors.is_empty() {
        let risks: Vec<&str> = r.risk_factors.iter().map(|f| f.as_str()).collect();
        text.push_str(&format!("        risk: {}\n", risks.join(", ")));
    }
    text
}

fn human_summary(s: &BulkSummary) -> String {
    format!(
        "\n{} verified: {} deliverable ({:.1}%), {} undeliverable ({:.1}%), {} risky ({:.1}%), {} unknown ({:.1}%)\n\
         average {:.0} ms; smtp connections {}, failures {}, greylisted {}, retries {}\n",
        s.total,
        s.deliverable,
        s.deliverable_rate * 100.0,
        s.undeliverable,
        s.undeliverable_rate * 100.0,
        s.risky,
        s.risky_rate * 100.0,
        s.unknown,
        s.unknown_rate * 100.0,
        s.average_response_time_ms,
        s.smtp.connections,
        s.smtp.failures,
        s.smtp.greylist_hits,
        s.smtp.retries,
    )
}

#[cfg(feature = "with-serde")]
fn write_json<T: serde::Serialize + ?Sized>(value: &T, cli: &Cli) -> Result<()> {
    let mut s = serde_json::to_string_pretty(value)?;
    s.push('\n');
    emit(s.as_bytes(), cli)
}

#[cfg(not(feature = "with-serde"))]
fn write_json<T: ?Sized>(_: &T, _: &Cli) -> Result<()> {
    bail!("format=json requires the 'with-serde' feature")
}

#[cfg(feature = "with-serde")]
fn write_ndjson<T: serde::Serialize>(rows: &[T], cli: &Cli) -> Result<()> {
    let mut buf = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut buf, row)?;
        buf.push(b'\n');
    }
    emit(&buf, cli)
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson<T>(_: &[T], _: &Cli) -> Result<()> {
    bail!("format=ndjson requires the 'with-serde' feature")
}

fn emit(bytes: &[u8], cli: &Cli) -> Result<()> {
    use std::io::Write;

    match &cli.out {
        Some(path) => write_all_atomically(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}
