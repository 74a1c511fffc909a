//! Command dispatch and logging initialization.

use anyhow::Result;
use std::path::PathBuf;
use tarn_core::EngineProfile;
use tarn_core::cli::{ExitCode, OutputFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Commands;
use crate::commands;
use crate::commands::common::load_config;

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How reports are rendered
    pub format: OutputFormat,
    /// Optional engine configuration file
    pub config: Option<PathBuf>,
    /// Preset used when `config` is absent
    pub profile: EngineProfile,
}

/// Initializes logging.
///
/// `--verbose` forces the `debug` level; otherwise `RUST_LOG` is honored,
/// falling back to `info`. Logs go to stderr so reports on stdout stay
/// machine-readable.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

/// Executes a command.
///
/// # Errors
///
/// Returns the first error of configuration loading or the command itself.
pub fn execute_command(command: Commands, settings: &Settings) -> Result<ExitCode> {
    let config = load_config(settings.config.as_deref(), settings.profile)?;
    match command {
        Commands::Inspect { module } => commands::inspect::run(&module, &config, settings.format),
        Commands::Run {
            module,
            export,
            args,
            backend,
        } => commands::run::run(&module, &export, &args, backend, &config, settings.format),
    }
}

/// Maps a failed command to the process exit code.
///
/// The engine status carried anywhere in the error chain decides the code;
/// errors without one (I/O, bad config syntax) exit with [`ExitCode::ERROR`].
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<tarn_core::Error>())
        .map_or(ExitCode::ERROR, |e| ExitCode::from_status(e.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use tarn_core::{Error, Status};

    #[test]
    fn test_exit_code_for_trap() {
        let err: anyhow::Error = Error::trap(Status::TrapUnreachable, "unreachable").into();
        assert_eq!(exit_code_for(&err), ExitCode::TRAP);
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = Err::<(), _>(Error::invalid_args("bad"))
            .context("while running")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::INVALID_INPUT);
    }

    #[test]
    fn test_exit_code_without_engine_error() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(exit_code_for(&err), ExitCode::ERROR);
    }

    #[test]
    fn test_execute_missing_module_file() {
        let settings = Settings {
            format: OutputFormat::Json,
            config: None,
            profile: EngineProfile::Moderate,
        };
        let command = Commands::Inspect {
            module: PathBuf::from("/nonexistent/tarn/missing.wasm"),
        };
        let err = execute_command(command, &settings).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::ERROR);
        assert!(err.to_string().contains("failed to read module"));
    }
}
