//! Sets a breakpoint, single-steps and prints the suspended frame.
//!
//! Run with:
//! ```bash
//! cargo run --example debugger
//! ```

use tarn_core::Value;
use tarn_runtime::{Engine, Interpreter, Location, Outcome, Store};

const PROGRAM: &str = r#"
    (module
        (func $sq (param i32) (result i32)
            local.get 0
            local.get 0
            i32.mul)
        (func (export "hyp") (param i32 i32) (result i32)
            (i32.add (call $sq (local.get 0)) (call $sq (local.get 1)))))
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let id = store.instantiate(engine.decode(&wat::parse_str(PROGRAM)?)?, "demo", &[], None)?;
    let hyp = store.export_function(id, "hyp").ok_or("hyp is not exported")?;

    let mut interpreter = Interpreter::new(engine.config());
    interpreter.add_breakpoint(Location::new(id, 0, 2));

    let mut outcome = interpreter.invoke(&mut store, hyp, &[Value::I32(3), Value::I32(4)])?;
    let mut steps = 0;
    while let Outcome::Suspended(stop) = outcome {
        println!("{:?} at {}", stop.reason, stop.location);
        println!("  locals: {:?}", interpreter.current_locals());
        println!("  stack:  {:?}", interpreter.operand_stack());
        for frame in interpreter.stack_trace() {
            println!("  in {frame}");
        }
        steps += 1;
        outcome = if steps < 3 {
            interpreter.step(&mut store)?
        } else {
            interpreter.resume(&mut store)?
        };
    }
    if let Outcome::Returned(values) = outcome {
        println!("hyp(3, 4) = {}", values[0]);
    }
    Ok(())
}
