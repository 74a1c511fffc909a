//! End-to-end tests: decode, link, initialize, invoke.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tarn_core::stats::StatsProvider;
use tarn_core::{FuncType, Status, Value};
use tarn_runtime::{Engine, HostFunc, ImportPackage, Module, Store};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tarn_runtime=debug")
        .with_test_writer()
        .try_init();
}

fn compile(engine: &Engine, text: &str) -> Arc<Module> {
    let bytes = wat::parse_str(text).expect("Failed to parse WAT");
    engine.decode(&bytes).expect("Failed to decode module")
}

const ADD: &str = r#"
    (module
        (func (export "add") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.add))
"#;

/// `add(2, 3)` returns 5 and an overflowing sum wraps.
#[test]
fn test_add_round_trip_and_wraparound() {
    init_tracing();
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(compile(&engine, ADD), "add", &[], None)
        .expect("Failed to instantiate");

    let sum = store
        .invoke_export(id, "add", &[Value::I32(2), Value::I32(3)])
        .unwrap();
    assert_eq!(sum, vec![Value::I32(5)]);

    let wrapped = store
        .invoke_export(id, "add", &[Value::I32(i32::MAX), Value::I32(10)])
        .unwrap();
    assert_eq!(wrapped, vec![Value::I32(i32::MIN.wrapping_add(9))]);
}

/// `div(10, 0)` traps with divide-by-zero and returns no value.
#[test]
fn test_divide_by_zero_traps() {
    init_tracing();
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(
            compile(
                &engine,
                r#"(module (func (export "div") (param i32 i32) (result i32)
                    (i32.div_s (local.get 0) (local.get 1))))"#,
            ),
            "div",
            &[],
            None,
        )
        .unwrap();

    let err = store
        .invoke_export(id, "div", &[Value::I32(10), Value::I32(0)])
        .unwrap_err();
    assert!(err.is_trap());
    assert_eq!(err.status(), Status::TrapDivideByZero);

    // traps end the call, not the instance
    let ok = store
        .invoke_export(id, "div", &[Value::I32(10), Value::I32(3)])
        .unwrap();
    assert_eq!(ok, vec![Value::I32(3)]);
}

/// A missing import fails instantiation and the instance refuses calls.
#[test]
fn test_missing_import_rejects_invoke() {
    init_tracing();
    let engine = Engine::default();
    let module = compile(
        &engine,
        r#"(module
            (import "env" "missing_fn" (func))
            (func (export "run")))"#,
    );
    let env = ImportPackage::new("env")
        .with_host(HostFunc::new("other_fn", FuncType::default(), |_, _, _| Ok(())));

    let mut store = Store::new(&engine);
    let err = store
        .instantiate(Arc::clone(&module), "broken", &[env.clone()], None)
        .unwrap_err();
    assert_eq!(err.status(), Status::FailMissingImport);

    let id = store.create_instance(module, "broken", &[env], None);
    assert_eq!(store.instance_status(id), Some(Status::FailMissingImport));
    let err = store.invoke_export(id, "run", &[]).unwrap_err();
    assert!(err.is_instantiation_error());
    assert_eq!(err.status(), Status::FailMissingImport);
}

/// Decoding and instantiating the same bytes twice gives identical results.
#[test]
fn test_determinism() {
    let text = r#"
        (module
            (memory (export "memory") 1)
            (table (export "table") 4 funcref)
            (global (export "g") i64 (i64.const -7))
            (func $f)
            (elem (i32.const 1) $f)
            (data (i32.const 16) "hello"))
    "#;
    let bytes = wat::parse_str(text).unwrap();
    let a = tarn_runtime::decode(&bytes).unwrap();
    let b = tarn_runtime::decode(&bytes).unwrap();
    assert_eq!(a, b);

    let engine = Engine::default();
    let module = Arc::new(a);
    let mut store = Store::new(&engine);
    let first = store
        .instantiate(Arc::clone(&module), "first", &[], None)
        .unwrap();
    let second = store.instantiate(module, "second", &[], None).unwrap();

    let memory = |store: &Store, id| {
        let addr = store.instance_memory(id, 0).unwrap();
        store.memory(addr).unwrap().data().to_vec()
    };
    assert_eq!(memory(&store, first), memory(&store, second));

    let global = |store: &Store, id| store.global_value(store.instance_global(id, 0).unwrap());
    assert_eq!(global(&store, first), global(&store, second));

    let slot = |store: &Store, id| {
        let addr = store.instance_table(id, 0).unwrap();
        store.table(addr).unwrap().get(1).unwrap().is_null()
    };
    assert_eq!(slot(&store, first), slot(&store, second));
}

/// An instance's exports satisfy another module's imports, sharing state.
#[test]
fn test_cross_instance_linking() {
    init_tracing();
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let lib = store
        .instantiate(
            compile(
                &engine,
                r#"(module
                    (memory (export "memory") 1)
                    (global (export "count") (mut i32) (i32.const 0))
                    (func (export "bump") (result i32)
                        (global.set 0 (i32.add (global.get 0) (i32.const 1)))
                        (i32.store (i32.const 0) (global.get 0))
                        (global.get 0))
                    (func (export "boom") unreachable))"#,
            ),
            "lib",
            &[],
            None,
        )
        .unwrap();
    let package = store.exports_package(lib, "lib").unwrap();

    let app = store
        .instantiate(
            compile(
                &engine,
                r#"(module
                    (import "lib" "bump" (func $bump (result i32)))
                    (import "lib" "boom" (func $boom))
                    (import "lib" "memory" (memory 1))
                    (import "lib" "count" (global (mut i32)))
                    (func (export "twice") (result i32)
                        (drop (call $bump))
                        (call $bump))
                    (func (export "peek") (result i32) (i32.load (i32.const 0)))
                    (func (export "crash") (call $boom)))"#,
            ),
            "app",
            &[package],
            None,
        )
        .unwrap();

    assert_eq!(
        store.invoke_export(app, "twice", &[]).unwrap(),
        vec![Value::I32(2)]
    );
    // the memory and global are the exporter's objects
    assert_eq!(
        store.invoke_export(app, "peek", &[]).unwrap(),
        vec![Value::I32(2)]
    );
    assert_eq!(
        store.instance_global(app, 0),
        store.instance_global(lib, 0)
    );

    // a trap in the callee instance is a trap of the whole call
    let err = store.invoke_export(app, "crash", &[]).unwrap_err();
    assert_eq!(err.status(), Status::TrapUnreachable);
}

/// Host functions receive arguments, write results, and see guest memory.
#[test]
fn test_host_callbacks() {
    init_tracing();
    let engine = Engine::default();
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);

    let env = ImportPackage::new("env")
        .with_host(HostFunc::new(
            "checksum",
            FuncType::from_tags("i", "ii").unwrap(),
            move |caller, args, results| {
                seen.fetch_add(1, Ordering::Relaxed);
                let ptr = args[0].as_i32().unwrap_or_default() as usize;
                let len = args[1].as_i32().unwrap_or_default() as usize;
                let sum: i32 = caller.memory()[ptr..ptr + len]
                    .iter()
                    .map(|b| i32::from(*b))
                    .sum();
                results[0] = Value::I32(sum);
                Ok(())
            },
        ))
        .with_host(HostFunc::new(
            "callback",
            FuncType::from_tags("i", "i").unwrap(),
            |caller, args, results| {
                // call back into the guest
                let id = caller.instance().expect("called from wasm");
                let square = caller
                    .store()
                    .export_function(id, "square")
                    .expect("square is exported");
                let out = caller.invoke(square, args)?;
                results[0] = out[0];
                Ok(())
            },
        ));

    let module = compile(
        &engine,
        r#"(module
            (import "env" "checksum" (func $checksum (param i32 i32) (result i32)))
            (import "env" "callback" (func $callback (param i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 8) "\01\02\03\04")
            (func (export "sum") (result i32) (call $checksum (i32.const 8) (i32.const 4)))
            (func (export "square") (param i32) (result i32)
                (i32.mul (local.get 0) (local.get 0)))
            (func (export "indirect") (param i32) (result i32)
                (call $callback (local.get 0))))"#,
    );
    let mut store = Store::new(&engine);
    let id = store.instantiate(module, "host", &[env], None).unwrap();

    assert_eq!(
        store.invoke_export(id, "sum", &[]).unwrap(),
        vec![Value::I32(10)]
    );
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(
        store.invoke_export(id, "indirect", &[Value::I32(9)]).unwrap(),
        vec![Value::I32(81)]
    );
}

/// Host functions whose declared type differs from the import are rejected
/// at link time.
#[test]
fn test_host_signature_mismatch_is_link_error() {
    let engine = Engine::default();
    let module = compile(
        &engine,
        r#"(module (import "env" "f" (func (param i64))))"#,
    );
    let env = ImportPackage::new("env").with_host(HostFunc::new(
        "f",
        FuncType::from_tags("v", "i").unwrap(),
        |_, _, _| Ok(()),
    ));
    let mut store = Store::new(&engine);
    let err = store.instantiate(module, "m", &[env], None).unwrap_err();
    assert_eq!(err.status(), Status::FailImportTypeMismatch);
}

/// Bulk memory and passive segments work after instantiation.
#[test]
fn test_bulk_memory_and_passive_segments() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(
            compile(
                &engine,
                r#"(module
                    (memory 1)
                    (data $greeting "hello")
                    (func (export "init") (param i32)
                        (memory.init $greeting (local.get 0) (i32.const 0) (i32.const 5)))
                    (func (export "drop") (data.drop $greeting))
                    (func (export "copy")
                        (memory.copy (i32.const 100) (i32.const 0) (i32.const 5)))
                    (func (export "fill")
                        (memory.fill (i32.const 200) (i32.const 0x2a) (i32.const 3)))
                    (func (export "byte") (param i32) (result i32)
                        (i32.load8_u (local.get 0))))"#,
            ),
            "bulk",
            &[],
            None,
        )
        .unwrap();

    store.invoke_export(id, "init", &[Value::I32(0)]).unwrap();
    store.invoke_export(id, "copy", &[]).unwrap();
    store.invoke_export(id, "fill", &[]).unwrap();
    let byte = |store: &mut Store, addr| store.invoke_export(id, "byte", &[Value::I32(addr)]).unwrap()[0];
    assert_eq!(byte(&mut store, 104), Value::I32(i32::from(b'o')));
    assert_eq!(byte(&mut store, 202), Value::I32(0x2a));

    store.invoke_export(id, "drop", &[]).unwrap();
    assert_eq!(store.data_segment_len(id, 0), Some(0));
    let err = store
        .invoke_export(id, "init", &[Value::I32(0)])
        .unwrap_err();
    assert_eq!(err.status(), Status::TrapMemoryOutOfBounds);
}

/// Engine statistics count the work done through its stores.
#[test]
fn test_engine_stats() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(compile(&engine, ADD), "add", &[], None)
        .unwrap();
    store
        .invoke_export(id, "add", &[Value::I32(1), Value::I32(1)])
        .unwrap();
    compile(&engine, ADD);

    let stats = engine.capture_stats();
    assert_eq!(stats.modules_decoded, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.instances_created, 1);
    assert_eq!(stats.invocations, 1);
    assert!(stats.instructions_executed >= 3);
}

/// Host functions that call back into wasm are bounded by the re-entry
/// limit, which keeps a default-sized thread stack from overflowing.
#[test]
fn test_host_reentry_is_bounded() {
    let outcome = std::thread::spawn(|| {
        init_tracing();
        let engine = Engine::default();
        let env = ImportPackage::new("env").with_host(HostFunc::new(
            "bounce",
            FuncType::from_tags("i", "i").unwrap(),
            |caller, args, results| {
                let id = caller.instance().expect("called from wasm");
                let down = caller
                    .store()
                    .export_function(id, "down")
                    .expect("down is exported");
                results[0] = caller.invoke(down, args)?[0];
                Ok(())
            },
        ));
        let module = compile(
            &engine,
            r#"(module
                (import "env" "bounce" (func $bounce (param i32) (result i32)))
                (func (export "down") (param i32) (result i32)
                    (if (result i32) (i32.eqz (local.get 0))
                        (then (i32.const 0))
                        (else (call $bounce (i32.sub (local.get 0) (i32.const 1)))))))"#,
        );
        let mut store = Store::new(&engine);
        let id = store.instantiate(module, "bounce", &[env], None).unwrap();

        let shallow = store.invoke_export(id, "down", &[Value::I32(10)]);
        let deep = store.invoke_export(id, "down", &[Value::I32(5000)]);
        (shallow, deep.map_err(|e| e.status()))
    })
    .join()
    .expect("thread must not overflow its stack");

    assert_eq!(outcome.0.unwrap(), vec![Value::I32(0)]);
    assert_eq!(outcome.1.unwrap_err(), Status::TrapStackOverflow);
}
