//! Inspect command implementation.
//!
//! Decodes a module and prints its structure without instantiating it.

use crate::commands::common::read_module;
use crate::formatters::format_output;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tarn_core::EngineConfig;
use tarn_core::cli::{ExitCode, OutputFormat};
use tarn_runtime::{Engine, ModuleCache, ModuleSummary};
use tracing::info;

/// One entry of the function index space.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionEntry {
    /// Function index, imports first
    pub index: u32,
    /// Debug name, export name, or `func[N]`
    pub name: String,
    /// Rendered signature
    pub signature: String,
    /// Whether the function is imported
    pub imported: bool,
}

/// Everything `tarn inspect` reports.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Module path as given
    pub path: String,
    /// Binary size
    pub size_bytes: usize,
    /// BLAKE3 hash of the binary
    pub hash: String,
    /// Section overview
    pub module: ModuleSummary,
    /// Function index space
    pub functions: Vec<FunctionEntry>,
}

/// Decodes `bytes` and builds the report.
///
/// # Errors
///
/// Returns the parse or validation error of a malformed module.
pub fn inspect_bytes(engine: &Engine, path: &str, bytes: &[u8]) -> Result<InspectReport> {
    let module = engine.decode(bytes)?;
    let functions = (0..module.function_count())
        .map(|index| FunctionEntry {
            index,
            name: module.describe_function(index),
            signature: module
                .func_type(index)
                .map(ToString::to_string)
                .unwrap_or_default(),
            imported: module.is_imported_function(index),
        })
        .collect();
    Ok(InspectReport {
        path: path.to_string(),
        size_bytes: bytes.len(),
        hash: ModuleCache::cache_key_for_code(bytes).as_str().to_string(),
        module: module.summary(),
        functions,
    })
}

/// Runs the inspect command.
pub fn run(module: &Path, config: &EngineConfig, output_format: OutputFormat) -> Result<ExitCode> {
    info!("Inspecting module: {}", module.display());
    let bytes = read_module(module)?;
    let engine = Engine::new(config.clone())?;
    let report = inspect_bytes(&engine, &module.display().to_string(), &bytes)?;
    println!("{}", format_output(&report, output_format)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_reports_functions() {
        let bytes = wat::parse_str(
            r#"(module
                (import "env" "print_i32" (func $print (param i32)))
                (memory (export "memory") 1 4)
                (func $helper (result i32) (i32.const 7))
                (func (export "main") (call $print (call $helper))))"#,
        )
        .unwrap();
        let report = inspect_bytes(&Engine::default(), "test.wasm", &bytes).unwrap();

        assert_eq!(report.size_bytes, bytes.len());
        assert!(report.hash.starts_with("wasm_"));
        let names: Vec<_> = report.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["print", "helper", "main"]);
        assert!(report.functions[0].imported);
        assert!(!report.functions[2].imported);
        assert_eq!(report.module.imports.len(), 1);
        assert_eq!(report.module.memories.len(), 1);
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        let err = inspect_bytes(&Engine::default(), "bad.wasm", b"\0asm\x02\0\0\0").unwrap_err();
        let err = err.downcast_ref::<tarn_core::Error>().unwrap();
        assert!(err.is_parse_error());
    }
}
