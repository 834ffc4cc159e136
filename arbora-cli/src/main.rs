//! CLI entry point for the arbora analysis pipelines.
//!
//! Parses command-line arguments with clap, executes the selected pipeline,
//! renders the outcome to stdout, and maps errors to appropriate exit
//! codes. Logging is initialised eagerly so subsequent operations can emit
//! structured diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use arbora_cli::{
    cli::{render_outcome, run_cli, Cli, CliError},
    logging::{self, LoggingError},
};
use arbora_core::ArboraError;
use tracing::error;

/// Parse CLI arguments, execute the command, render the outcome, and flush
/// the output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let outcome = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_outcome(&outcome, &mut writer).context("failed to render outcome")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(cli_error) = err.downcast_ref::<CliError>() {
                log_cli_error(cli_error);
            } else {
                error!(error = %err, "command execution failed");
            }
            ExitCode::FAILURE
        }
    }
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialised"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}

fn log_cli_error(err: &CliError) {
    match err {
        CliError::Core(core) => log_core_error(core),
        CliError::Reader(reader) => error!(error = %reader, "tree reader rejected the input"),
        _ => error!(error = %err, "command execution failed"),
    }
}

fn log_core_error(err: &ArboraError) {
    error!(error = %err, code = %err.code(), "command execution failed");
}
