mod args;
mod bulk;
mod output;
mod verify;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // exit codes: 0 ok, 2 undeliverable, 1 fatal
    let code = match &cli.cmd {
        Some(Commands::Validate { email }) => verify::run_validate(email, &cli)?,
        Some(Commands::Verify { email }) => verify::run_verify(email, &cli).await?,
        Some(Commands::Bulk { file, stdin, .. }) => {
            bulk::run_bulk(file.as_deref(), *stdin, &cli).await?
        }
        None => {
            Cli::clap_command().print_help()?;
            println!();
            return Ok(());
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mailprobe={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
