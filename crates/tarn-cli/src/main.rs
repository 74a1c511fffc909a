//! `tarn` command-line host.
//!
//! # Examples
//!
//! ```bash
//! # Show the structure of a module
//! tarn inspect game.wasm
//!
//! # Call an export with strict limits
//! tarn --profile strict run math.wasm fib 20
//! ```

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tarn_cli::Cli;
use tarn_cli::runner::{Settings, execute_command, exit_code_for, init_logging};
use tarn_core::cli::OutputFormat;

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            exit_code_for(&err)
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: Cli) -> Result<tarn_core::cli::ExitCode> {
    init_logging(cli.verbose)?;
    let format = cli
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let settings = Settings {
        format,
        config: cli.config,
        profile: cli.profile,
    };
    execute_command(cli.command, &settings)
}
