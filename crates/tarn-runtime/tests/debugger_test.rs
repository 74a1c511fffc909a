//! Debugger hooks: breakpoints, single-stepping, suspension, budgets.

use std::time::Duration;
use tarn_core::{InstanceId, Status, Value};
use tarn_runtime::{Engine, Interpreter, Location, Outcome, Store, SuspendReason};

const PROGRAM: &str = r#"
    (module
        (func $add (export "add") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.add)
        (func $count (export "count") (param i32) (result i32) (local i32)
            (block
                (loop
                    (br_if 1 (i32.ge_u (local.get 1) (local.get 0)))
                    (local.set 1 (i32.add (local.get 1) (i32.const 1)))
                    (br 0)))
            (local.get 1))
        (func $outer (export "outer") (result i32)
            (call $add (i32.const 40) (i32.const 2)))
        (func (export "spin") (loop (br 0))))
"#;

struct Fixture {
    engine: Engine,
    store: Store,
    id: InstanceId,
}

impl Fixture {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("tarn_runtime=debug")
            .with_test_writer()
            .try_init();
        let engine = Engine::default();
        let bytes = wat::parse_str(PROGRAM).expect("Failed to parse WAT");
        let mut store = Store::new(&engine);
        let id = store
            .instantiate(engine.decode(&bytes).unwrap(), "debuggee", &[], None)
            .expect("Failed to instantiate");
        Self { engine, store, id }
    }

    fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.engine.config())
    }

    fn invoke(&mut self, interpreter: &mut Interpreter, name: &str, args: &[Value]) -> Outcome {
        let func = self.store.export_function(self.id, name).expect("export");
        interpreter
            .invoke(&mut self.store, func, args)
            .expect("invoke failed")
    }
}

fn suspension(outcome: &Outcome) -> (SuspendReason, Location) {
    match outcome {
        Outcome::Suspended(s) => (s.reason, s.location),
        Outcome::Returned(values) => panic!("expected a suspension, got {values:?}"),
    }
}

/// A breakpoint stops before its instruction and exposes the frame.
#[test]
fn test_breakpoint_and_resume() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    let at = Location::new(fx.id, 0, 2);
    assert!(interpreter.add_breakpoint(at));
    assert!(!interpreter.add_breakpoint(at));

    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(2), Value::I32(3)]);
    assert_eq!(suspension(&outcome), (SuspendReason::Breakpoint, at));
    assert_eq!(SuspendReason::Breakpoint.status(), Status::DebugTrapBreakpoint);
    assert_eq!(
        interpreter.operand_stack(),
        &[Value::I32(2), Value::I32(3)]
    );
    assert_eq!(
        interpreter.current_locals(),
        &[Value::I32(2), Value::I32(3)]
    );

    let trace = interpreter.stack_trace();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].name, "add");
    assert_eq!(trace[0].pc, 2);

    let outcome = interpreter.resume(&mut fx.store).unwrap();
    assert_eq!(outcome, Outcome::Returned(vec![Value::I32(5)]));
    assert!(!interpreter.is_suspended());
}

/// A breakpoint inside a callee shows both frames, innermost first.
#[test]
fn test_breakpoint_in_callee() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    interpreter.add_breakpoint(Location::new(fx.id, 0, 2));

    let outcome = fx.invoke(&mut interpreter, "outer", &[]);
    assert!(outcome.is_suspended());
    let trace = interpreter.stack_trace();
    let names: Vec<_> = trace.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["add", "outer"]);

    let outcome = interpreter.resume(&mut fx.store).unwrap();
    assert_eq!(outcome.into_results().unwrap(), vec![Value::I32(42)]);
}

/// Each step executes exactly one instruction.
#[test]
fn test_single_step() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    interpreter.add_breakpoint(Location::new(fx.id, 0, 0));

    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(4), Value::I32(5)]);
    assert_eq!(suspension(&outcome).1.pc, 0);
    assert!(interpreter.operand_stack().is_empty());

    for pc in 1..=3 {
        let outcome = interpreter.step(&mut fx.store).unwrap();
        assert_eq!(
            suspension(&outcome),
            (SuspendReason::Step, Location::new(fx.id, 0, pc))
        );
    }
    assert_eq!(
        interpreter.operand_stack(),
        &[Value::I32(9)]
    );

    let outcome = interpreter.step(&mut fx.store).unwrap();
    assert_eq!(outcome, Outcome::Returned(vec![Value::I32(9)]));
}

/// Terminating abandons the call; resume then reports termination once.
#[test]
fn test_terminate() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    interpreter.add_breakpoint(Location::new(fx.id, 0, 1));

    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(1), Value::I32(1)]);
    assert!(outcome.is_suspended());

    // one chain at a time
    let add = fx.store.export_function(fx.id, "add").unwrap();
    let err = interpreter
        .invoke(&mut fx.store, add, &[Value::I32(1), Value::I32(1)])
        .unwrap_err();
    assert!(err.is_invalid_args());

    interpreter.terminate();
    assert!(!interpreter.is_suspended());
    assert!(interpreter.stack_trace().is_empty());

    let err = interpreter.resume(&mut fx.store).unwrap_err();
    assert_eq!(err.status(), Status::DebugTrapTerminated);
    let err = interpreter.resume(&mut fx.store).unwrap_err();
    assert!(err.is_invalid_args());

    interpreter.clear_breakpoints();
    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(1), Value::I32(1)]);
    assert_eq!(outcome, Outcome::Returned(vec![Value::I32(2)]));
}

/// A pending suspend request stops execution at the next instruction.
#[test]
fn test_suspend_request_before_start() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    let handle = interpreter.suspend_handle();
    handle.request();
    assert!(handle.is_requested());

    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(1), Value::I32(2)]);
    assert_eq!(
        suspension(&outcome),
        (SuspendReason::Suspended, Location::new(fx.id, 0, 0))
    );
    assert!(!handle.is_requested());

    let outcome = interpreter.resume(&mut fx.store).unwrap();
    assert_eq!(outcome, Outcome::Returned(vec![Value::I32(3)]));
}

/// Another thread can stop an infinite loop.
#[test]
fn test_suspend_from_another_thread() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    let handle = interpreter.suspend_handle();
    let requester = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        handle.request();
    });

    let outcome = fx.invoke(&mut interpreter, "spin", &[]);
    requester.join().unwrap();
    let (reason, location) = suspension(&outcome);
    assert_eq!(reason, SuspendReason::Suspended);
    assert_eq!(location.function, 3);

    interpreter.terminate();
    assert!(!interpreter.is_suspended());
}

/// A step budget turns a long call into a series of resumable slices.
#[test]
fn test_step_budget() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    interpreter.set_step_budget(Some(25));

    let mut outcome = fx.invoke(&mut interpreter, "count", &[Value::I32(30)]);
    let mut slices = 1;
    while let Outcome::Suspended(s) = &outcome {
        assert_eq!(s.reason, SuspendReason::Suspended);
        outcome = interpreter.resume(&mut fx.store).unwrap();
        slices += 1;
    }
    assert!(slices > 1);
    assert_eq!(outcome, Outcome::Returned(vec![Value::I32(30)]));

    interpreter.set_step_budget(None);
    let outcome = fx.invoke(&mut interpreter, "count", &[Value::I32(30)]);
    assert!(!outcome.is_suspended());
}

/// Removing a breakpoint lets execution run through it.
#[test]
fn test_remove_breakpoint() {
    let mut fx = Fixture::new();
    let mut interpreter = fx.interpreter();
    let first = Location::new(fx.id, 0, 1);
    let second = Location::new(fx.id, 0, 2);
    interpreter.add_breakpoint(second);
    interpreter.add_breakpoint(first);
    assert_eq!(interpreter.breakpoints(), vec![first, second]);

    assert!(interpreter.remove_breakpoint(&first));
    assert!(!interpreter.remove_breakpoint(&first));

    let outcome = fx.invoke(&mut interpreter, "add", &[Value::I32(1), Value::I32(1)]);
    assert_eq!(suspension(&outcome).1, second);
    interpreter.terminate();
}

/// A trap ends the chain and records where it happened.
#[test]
fn test_trap_records_location() {
    let engine = Engine::default();
    let bytes = wat::parse_str(
        r#"(module
            (func $boom (unreachable))
            (func (export "run") (call $boom)))"#,
    )
    .unwrap();
    let mut store = Store::new(&engine);
    let id = store
        .instantiate(engine.decode(&bytes).unwrap(), "trap", &[], None)
        .unwrap();
    let run = store.export_function(id, "run").unwrap();

    let mut interpreter = Interpreter::new(engine.config());
    let err = interpreter.invoke(&mut store, run, &[]).unwrap_err();
    assert_eq!(err.status(), Status::TrapUnreachable);
    assert!(err.to_string().contains("boom"));

    let trace = interpreter.last_trap_trace();
    assert_eq!(trace.len(), 2);
    assert_eq!((trace[0].function, trace[0].pc), (0, 0));
    assert_eq!(trace[1].function, 1);
    assert!(!interpreter.is_suspended());
}
