//! Command-line arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tarn_core::EngineProfile;

/// tarn - a sandboxed WebAssembly interpreter.
///
/// Decodes, inspects and runs exported functions of WebAssembly modules.
#[derive(Parser, Debug)]
#[command(name = "tarn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    pub format: String,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "TARN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Limits preset used when no configuration file is given
    #[arg(long, global = true, value_enum, default_value_t = EngineProfile::Moderate)]
    pub profile: EngineProfile,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the structure of a module.
    ///
    /// Shows types, imports, exports, memories, tables, the start function
    /// and function names.
    ///
    /// # Examples
    ///
    /// ```bash
    /// tarn inspect game.wasm
    /// tarn --format json inspect game.wasm
    /// ```
    Inspect {
        /// Path to the module binary
        module: PathBuf,
    },

    /// Instantiate a module and call one of its exports.
    ///
    /// Arguments are parsed according to the export's parameter kinds. The
    /// module may import `print_i32`, `print_i64`, `print_f32`, `print_f64`
    /// and `print_str(ptr, len)` from `env`.
    ///
    /// # Examples
    ///
    /// ```bash
    /// tarn run math.wasm add 2 3
    /// tarn run --backend wasmtime math.wasm fib 30
    /// ```
    Run {
        /// Path to the module binary
        module: PathBuf,

        /// Name of the exported function
        export: String,

        /// Arguments, one per parameter
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Execution backend
        #[arg(short, long, value_enum, default_value_t = BackendKind::Interpreter)]
        backend: BackendKind,
    },
}

/// Execution backend selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// The built-in interpreter
    #[default]
    Interpreter,
    /// wasmtime (requires the `wasmtime` feature)
    Wasmtime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_inspect() {
        let cli = Cli::parse_from(["tarn", "inspect", "game.wasm"]);
        if let Commands::Inspect { module } = cli.command {
            assert_eq!(module, PathBuf::from("game.wasm"));
        } else {
            panic!("Expected Inspect command");
        }
    }

    #[test]
    fn test_cli_parsing_run_with_negative_args() {
        let cli = Cli::parse_from(["tarn", "run", "math.wasm", "add", "-2", "3"]);
        if let Commands::Run {
            export,
            args,
            backend,
            ..
        } = cli.command
        {
            assert_eq!(export, "add");
            assert_eq!(args, vec!["-2", "3"]);
            assert_eq!(backend, BackendKind::Interpreter);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parsing_backend() {
        let cli = Cli::parse_from(["tarn", "run", "--backend", "wasmtime", "m.wasm", "main"]);
        assert!(matches!(
            cli.command,
            Commands::Run {
                backend: BackendKind::Wasmtime,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "tarn",
            "--verbose",
            "--format",
            "json",
            "--profile",
            "strict",
            "inspect",
            "m.wasm",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.profile, EngineProfile::Strict);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::parse_from(["tarn", "inspect", "m.wasm"]);
        assert_eq!(cli.format, "pretty");
        assert_eq!(cli.profile, EngineProfile::Moderate);
    }
}
