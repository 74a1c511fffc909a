//! Instance initialization.
//!
//! Runs after linking, strictly in this order: global initializers, element
//! segments, data segments, start function. Later steps may read what
//! earlier ones wrote, and a failing step leaves earlier writes in place.

use crate::interpreter::Interpreter;
use crate::module::{ConstExpr, ConstOp, DataMode, ElementMode};
use crate::store::Store;
use tarn_core::{Error, FuncRef, InstanceId, Result, Status, Value};

/// Evaluates a constant expression in the context of instance `id`.
pub(crate) fn eval_const(store: &Store, id: InstanceId, expr: &ConstExpr) -> Result<Value> {
    let data = store.instance(id)?;
    let mut stack: Vec<Value> = Vec::with_capacity(2);
    for op in expr.ops() {
        let value = match *op {
            ConstOp::I32Const(v) => Value::I32(v),
            ConstOp::I64Const(v) => Value::I64(v),
            ConstOp::F32Const(bits) => Value::F32(f32::from_bits(bits)),
            ConstOp::F64Const(bits) => Value::F64(f64::from_bits(bits)),
            ConstOp::RefNull(ty) => ty.default_value(),
            ConstOp::RefFunc(index) => Value::FuncRef(Some(FuncRef::new(id, index))),
            ConstOp::GlobalGet(index) => data
                .globals
                .get(index as usize)
                .and_then(|addr| store.global_value(*addr))
                .ok_or_else(|| {
                    Error::instantiation(
                        Status::FailInstantiate,
                        format!("constant expression reads uninitialized global {index}"),
                    )
                })?,
            ConstOp::I32Add | ConstOp::I32Sub | ConstOp::I32Mul => {
                let (a, b) = pop_pair(&mut stack)?;
                let (Value::I32(a), Value::I32(b)) = (a, b) else {
                    return Err(bad_operands());
                };
                Value::I32(match *op {
                    ConstOp::I32Add => a.wrapping_add(b),
                    ConstOp::I32Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                })
            }
            ConstOp::I64Add | ConstOp::I64Sub | ConstOp::I64Mul => {
                let (a, b) = pop_pair(&mut stack)?;
                let (Value::I64(a), Value::I64(b)) = (a, b) else {
                    return Err(bad_operands());
                };
                Value::I64(match *op {
                    ConstOp::I64Add => a.wrapping_add(b),
                    ConstOp::I64Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                })
            }
        };
        stack.push(value);
    }
    stack.pop().ok_or_else(bad_operands)
}

fn bad_operands() -> Error {
    Error::instantiation(Status::FailInstantiate, "malformed constant expression")
}

fn pop_pair(stack: &mut Vec<Value>) -> Result<(Value, Value)> {
    let b = stack.pop().ok_or_else(bad_operands)?;
    let a = stack.pop().ok_or_else(bad_operands)?;
    Ok((a, b))
}

fn offset_of(value: Value) -> Result<u32> {
    value.as_i32().map(|v| v as u32).ok_or_else(bad_operands)
}

/// Initializes a linked instance.
pub(crate) fn initialize(store: &mut Store, id: InstanceId) -> Result<()> {
    let module = std::sync::Arc::clone(&store.instance(id)?.module);

    for (ty, init) in module.globals[module.imported_globals as usize..]
        .iter()
        .zip(&module.global_inits)
    {
        let value = eval_const(store, id, init)?;
        let addr = store.push_global(*ty, value);
        store.instances[id.index()].globals.push(addr);
    }

    for (index, segment) in module.elements.iter().enumerate() {
        let items = segment
            .items
            .iter()
            .map(|item| eval_const(store, id, item))
            .collect::<Result<Vec<_>>>()?;
        match &segment.mode {
            ElementMode::Active { table, offset } => {
                let offset = offset_of(eval_const(store, id, offset)?)?;
                let addr = store.instances[id.index()].tables[*table as usize];
                store.tables[addr.index()]
                    .init(offset, &items)
                    .map_err(|_| {
                        Error::instantiation(
                            Status::TrapTableOutOfBounds,
                            format!(
                                "element segment {index} does not fit table {table} at offset {offset}"
                            ),
                        )
                    })?;
            }
            ElementMode::Declarative => {}
            ElementMode::Passive => store.instances[id.index()].elements[index] = items,
        }
    }

    for (index, segment) in module.data.iter().enumerate() {
        let DataMode::Active { memory, offset } = &segment.mode else {
            continue;
        };
        let offset = offset_of(eval_const(store, id, offset)?)?;
        let addr = store.instances[id.index()].memories[*memory as usize];
        if !store.memories[addr.index()].write(u64::from(offset), &segment.bytes) {
            return Err(Error::instantiation(
                Status::TrapMemoryOutOfBounds,
                format!("data segment {index} does not fit memory {memory} at offset {offset}"),
            ));
        }
        store.instances[id.index()].data_dropped[index] = true;
    }

    if let Some(start) = module.start {
        let ty = module.func_type(start).cloned().unwrap_or_default();
        if !ty.params().is_empty() || !ty.results().is_empty() {
            return Err(Error::instantiation(
                Status::FailInvalidStart,
                format!("start function {start} has type {ty}, expected () -> ()"),
            ));
        }
        tracing::debug!(start, "running start function");
        let mut interpreter = Interpreter::new(store.engine().config());
        interpreter
            .call(store, FuncRef::new(id, start), &[])
            .map_err(|e| Error::instantiation(e.status(), e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;
    use std::sync::Arc;

    fn instantiate(store: &mut Store, text: &str) -> InstanceId {
        let module = Arc::new(crate::decode(&wat::parse_str(text).unwrap()).unwrap());
        store.create_instance(module, "test", &[], None)
    }

    #[test]
    fn test_globals_evaluated_in_order() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r"(module
                (global $a i32 (i32.const 40))
                (global $b i32 (i32.add (global.get $a) (i32.const 2))))",
        );
        assert_eq!(store.instance_status(id), Some(Status::Ok));
        let b = store.instance_global(id, 1).unwrap();
        assert_eq!(store.global_value(b), Some(Value::I32(42)));
    }

    #[test]
    fn test_segments_are_one_shot() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r#"(module
                (table 4 funcref)
                (memory 1)
                (func $f)
                (elem (i32.const 0) $f $f)
                (elem func $f $f $f)
                (elem declare func $f)
                (data (i32.const 0) "ab")
                (data "xyz"))"#,
        );
        assert_eq!(store.instance_status(id), Some(Status::Ok));
        assert_eq!(store.element_segment_len(id, 0), Some(0));
        assert_eq!(store.element_segment_len(id, 1), Some(3));
        assert_eq!(store.element_segment_len(id, 2), Some(0));
        assert_eq!(store.data_segment_len(id, 0), Some(0));
        assert_eq!(store.data_segment_len(id, 1), Some(3));

        let table = store.instance_table(id, 0).unwrap();
        let first = store.table(table).unwrap().get(0).unwrap();
        assert_eq!(first, Value::FuncRef(Some(FuncRef::new(id, 0))));
        let memory = store.instance_memory(id, 0).unwrap();
        assert_eq!(&store.memory(memory).unwrap().data()[..2], b"ab");
    }

    #[test]
    fn test_element_out_of_bounds_keeps_earlier_writes() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r"(module
                (table 2 funcref)
                (func $f)
                (elem (i32.const 0) $f)
                (elem (i32.const 1) $f $f))",
        );
        assert_eq!(store.instance_status(id), Some(Status::TrapTableOutOfBounds));
        let table = store.instance_table(id, 0).unwrap();
        assert!(!store.table(table).unwrap().get(0).unwrap().is_null());
        assert!(store.table(table).unwrap().get(1).unwrap().is_null());
    }

    #[test]
    fn test_data_out_of_bounds() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r#"(module (memory 1) (data (i32.const 65535) "ab"))"#,
        );
        assert_eq!(
            store.instance_status(id),
            Some(Status::TrapMemoryOutOfBounds)
        );
        let memory = store.instance_memory(id, 0).unwrap();
        assert_eq!(store.memory(memory).unwrap().data()[65535], 0);
    }

    #[test]
    fn test_start_runs_after_data() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r#"(module
                (memory 1)
                (global $g (mut i32) (i32.const 0))
                (data (i32.const 0) "\07")
                (func $start (global.set $g (i32.load8_u (i32.const 0))))
                (start $start))"#,
        );
        assert_eq!(store.instance_status(id), Some(Status::Ok));
        let g = store.instance_global(id, 0).unwrap();
        assert_eq!(store.global_value(g), Some(Value::I32(7)));
    }

    #[test]
    fn test_invalid_start_signature() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r"(module (func $start (result i32) i32.const 1) (start $start))",
        );
        assert_eq!(store.instance_status(id), Some(Status::FailInvalidStart));
    }

    #[test]
    fn test_start_trap_is_terminal_status() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(&mut store, r"(module (func $start unreachable) (start $start))");
        assert_eq!(store.instance_status(id), Some(Status::TrapUnreachable));
    }

    #[test]
    fn test_ref_func_global_points_at_own_instance() {
        let mut store = Store::new(&Engine::default());
        let id = instantiate(
            &mut store,
            r"(module (func $f) (global funcref (ref.func $f)) (elem declare func $f))",
        );
        let g = store.instance_global(id, 0).unwrap();
        assert_eq!(
            store.global_value(g),
            Some(Value::FuncRef(Some(FuncRef::new(id, 0))))
        );
    }
}
