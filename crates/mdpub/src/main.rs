//! mdpub CLI - publish markdown documents to Confluence.
//!
//! Compiles each matched markdown file to Confluence storage format and
//! publishes it to the page named by its header, creating missing parent
//! pages and uploading changed attachments. `--compile-only` prints the
//! markup instead of talking to Confluence.

mod error;
mod output;
mod publish;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use output::Output;
use publish::PublishArgs;

/// mdpub - markdown to Confluence publisher.
#[derive(Parser)]
#[command(name = "mdpub", version, about)]
struct Cli {
    #[command(flatten)]
    args: PublishArgs,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.args.execute(&output) {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            output.error(&format!(
                "{} of {} document(s) failed",
                summary.failed, summary.total
            ));
            ExitCode::FAILURE
        }
        Err(err) => {
            let mut lines = error::chain(&err).into_iter();
            if let Some(first) = lines.next() {
                output.error(&format!("Error: {first}"));
            }
            for line in lines {
                output.error(&format!("  {line}"));
            }
            ExitCode::FAILURE
        }
    }
}
