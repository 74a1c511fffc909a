//! Decodes a module, links a host function and calls an export.
//!
//! Run with:
//! ```bash
//! cargo run --example simple_execution
//! ```

use tarn_core::stats::StatsProvider;
use tarn_core::{EngineConfig, EngineProfile, FuncType, Value};
use tarn_runtime::{Engine, HostFunc, ImportPackage, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("tarn_runtime=info")
        .init();

    let engine = Engine::new(EngineConfig::from_profile(EngineProfile::Strict))?;
    let wasm = wat::parse_str(
        r#"(module
            (import "env" "host_add" (func $add (param i32 i32) (result i32)))
            (func (export "main") (result i32)
                (call $add (i32.const 10) (i32.const 32))))"#,
    )?;
    let module = engine.decode(&wasm)?;
    println!("decoded {} bytes: {:?}", wasm.len(), module.summary());

    let env = ImportPackage::new("env").with_host(HostFunc::new(
        "host_add",
        FuncType::from_tags("i", "ii")?,
        |_, args, results| {
            let a = args[0].as_i32().unwrap_or_default();
            let b = args[1].as_i32().unwrap_or_default();
            results[0] = Value::I32(a.wrapping_add(b));
            Ok(())
        },
    ));

    let mut store = Store::new(&engine);
    let id = store.instantiate(module, "demo", &[env], None)?;
    let result = store.invoke_export(id, "main", &[])?;
    println!("main() = {}", result[0]);

    // decoding the same bytes again is served from the cache
    engine.decode(&wasm)?;
    println!("{}", serde_json::to_string_pretty(&engine.capture_stats())?);
    Ok(())
}
