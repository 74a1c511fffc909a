//! Performance characteristics: cache hits, instantiation, dispatch.
//!
//! Bounds are loose so the tests stay stable on slow CI machines; they catch
//! order-of-magnitude regressions, not percent changes.

use std::time::{Duration, Instant};
use tarn_core::Value;
use tarn_core::stats::StatsProvider;
use tarn_runtime::{Engine, Store};

const FIB: &str = r#"
    (module
        (func $fib (export "fib") (param i32) (result i32)
            (if (result i32) (i32.lt_u (local.get 0) (i32.const 2))
                (then (local.get 0))
                (else
                    (i32.add
                        (call $fib (i32.sub (local.get 0) (i32.const 1)))
                        (call $fib (i32.sub (local.get 0) (i32.const 2))))))))
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tarn_runtime=info")
        .with_test_writer()
        .try_init();
}

/// Repeated decodes of the same bytes are served from the cache.
#[test]
fn test_cache_hits_are_fast() {
    init_tracing();
    let engine = Engine::default();
    let bytes = wat::parse_str(FIB).unwrap();

    let first = engine.decode(&bytes).unwrap();
    let start = Instant::now();
    for _ in 0..1000 {
        let cached = engine.decode(&bytes).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &cached));
    }
    assert!(start.elapsed() < Duration::from_secs(2));

    let stats = engine.capture_stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1000);
}

/// A decoded module can be instantiated many times cheaply.
#[test]
fn test_instantiation_throughput() {
    init_tracing();
    let engine = Engine::default();
    let module = engine.decode(&wat::parse_str(FIB).unwrap()).unwrap();
    let mut store = Store::new(&engine);

    let start = Instant::now();
    for i in 0..200 {
        store
            .instantiate(module.clone(), &format!("fib{i}"), &[], None)
            .unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(engine.capture_stats().instances_created, 200);
}

/// fib(20) runs tens of thousands of calls within a few seconds.
#[test]
fn test_recursive_dispatch() {
    init_tracing();
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(engine.decode(&wat::parse_str(FIB).unwrap()).unwrap(), "fib", &[], None)
        .unwrap();

    let start = Instant::now();
    let result = store.invoke_export(id, "fib", &[Value::I32(20)]).unwrap();
    assert_eq!(result, vec![Value::I32(6765)]);
    assert!(start.elapsed() < Duration::from_secs(10));
}
