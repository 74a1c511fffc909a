//! Run command implementation.
//!
//! Instantiates a module with the `env` host package and calls one export.

use crate::cli::BackendKind;
use crate::commands::common::{parse_args, read_module};
use crate::formatters::format_output;
use crate::host::{SharedWriter, env_bindings};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tarn_core::cli::{ExitCode, OutputFormat};
use tarn_core::traits::Backend;
use tarn_core::{EngineConfig, Error};
use tarn_runtime::{Engine, InterpreterBackend};
use tracing::info;

/// Outcome of a successful call.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Export that was called
    pub export: String,
    /// Backend that executed it
    pub backend: &'static str,
    /// Signature of the export
    pub signature: String,
    /// Returned values, rendered
    pub results: Vec<String>,
}

/// Creates the requested backend.
///
/// # Errors
///
/// Returns [`Error::InvalidArgs`] for `wasmtime` when the binary was built
/// without it, or the configuration error of an invalid config.
pub fn make_backend(kind: BackendKind, config: &EngineConfig) -> Result<Box<dyn Backend>> {
    match kind {
        BackendKind::Interpreter => Ok(Box::new(InterpreterBackend::new(Engine::new(
            config.clone(),
        )?))),
        #[cfg(feature = "wasmtime")]
        BackendKind::Wasmtime => Ok(Box::new(tarn_runtime::WasmtimeBackend::new(config)?)),
        #[cfg(not(feature = "wasmtime"))]
        BackendKind::Wasmtime => Err(Error::invalid_args(
            "this build of tarn has no wasmtime backend (rebuild with --features wasmtime)",
        )
        .into()),
    }
}

/// Decodes, instantiates and calls `export` on `backend`.
///
/// Host output goes to `out`.
///
/// # Errors
///
/// Returns the engine error of the first failing stage. Unparseable
/// arguments are reported as [`Error::InvalidArgs`].
pub fn execute<W: Write + Send + 'static>(
    backend: &mut dyn Backend,
    bytes: &[u8],
    name: &str,
    export: &str,
    args: &[String],
    out: &SharedWriter<W>,
) -> Result<RunReport> {
    for binding in env_bindings(out) {
        backend.register_host_function(binding)?;
    }
    backend.decode(bytes)?;
    backend.instantiate(name, None)?;

    let handle = backend
        .find_function(export)
        .ok_or_else(|| Error::NotFound {
            what: format!("exported function '{export}'"),
        })?;
    let ty = backend.function_type(handle).ok_or_else(|| Error::NotFound {
        what: format!("type of '{export}'"),
    })?;
    let values = parse_args(&ty, args).map_err(|e| Error::invalid_args(format!("{e:#}")))?;

    info!(backend = backend.name(), export, signature = %ty, "invoking");
    let results = backend.invoke(handle, &values)?;
    Ok(RunReport {
        export: export.to_string(),
        backend: backend.name(),
        signature: ty.to_string(),
        results: results.iter().map(ToString::to_string).collect(),
    })
}

/// Runs the run command.
pub fn run(
    module: &Path,
    export: &str,
    args: &[String],
    kind: BackendKind,
    config: &EngineConfig,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    info!("Running {} from {}", export, module.display());
    let bytes = read_module(module)?;
    let name = module
        .file_stem()
        .map_or_else(|| "module".to_string(), |s| s.to_string_lossy().into_owned());

    let mut backend = make_backend(kind, config)?;
    let out = Arc::new(Mutex::new(std::io::stdout()));
    let report = execute(backend.as_mut(), &bytes, &name, export, args, &out)?;
    println!("{}", format_output(&report, output_format)?);
    Ok(ExitCode::SUCCESS)
}
