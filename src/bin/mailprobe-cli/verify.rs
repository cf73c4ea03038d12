use anyhow::{Context, Result};

use crate::args::Cli;
use crate::output;
use mailprobe_lib::{Verifier, validate_email};

pub fn run_validate(email: &str, cli: &Cli) -> Result<i32> {
    let report = validate_email(email);
    output::write_syntax(&report, cli)?;
    Ok(if report.valid { 0 } else { 2 })
}

pub async fn run_verify(email: &str, cli: &Cli) -> Result<i32> {
    let verifier = Verifier::new(cli.verifier_config()?).context("set up verifier")?;
    let result = verifier
        .verify(email)
        .await
        .with_context(|| format!("verify '{email}'"))?;
    output::write_result(&result, cli)?;
    Ok(output::exit_code([&result]))
}
