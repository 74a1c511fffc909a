//! Execution of single instructions.

use super::{Flow, Interpreter, Label, corrupt, numeric};
use crate::instr::{Instr, LoadKind, StoreKind};
use crate::memory::LinearMemory;
use crate::module::Module;
use crate::store::{MemAddr, Store, TableAddr};
use tarn_core::{Error, FuncRef, InstanceId, Result, Status, Value};

/// The frame an instruction runs in.
pub(super) struct Context<'m> {
    pub(super) module: &'m Module,
    pub(super) instance: InstanceId,
    pub(super) locals_base: usize,
}

fn memory_oob(addr: u64, len: u64) -> Error {
    Error::trap(
        Status::TrapMemoryOutOfBounds,
        format!("access of {len} bytes at {addr:#x} is out of bounds"),
    )
}

fn table_oob(what: &str) -> Error {
    Error::trap(
        Status::TrapTableOutOfBounds,
        format!("{what}: table index out of bounds"),
    )
}

fn memory_addr(store: &Store, instance: InstanceId, index: u32) -> Result<MemAddr> {
    store.instance_memory(instance, index).ok_or_else(corrupt)
}

fn table_addr(store: &Store, instance: InstanceId, index: u32) -> Result<TableAddr> {
    store.instance_table(instance, index).ok_or_else(corrupt)
}

fn load<const N: usize>(memory: &LinearMemory, addr: u64) -> Result<[u8; N]> {
    memory
        .read::<N>(addr)
        .ok_or_else(|| memory_oob(addr, N as u64))
}

fn flag(b: bool) -> Value {
    Value::I32(i32::from(b))
}

impl Interpreter {
    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or_else(corrupt)
    }

    fn pop_i32(&mut self) -> Result<i32> {
        self.pop()?.as_i32().ok_or_else(corrupt)
    }

    /// Pops an i32 used as an address, length or index.
    fn pop_u32(&mut self) -> Result<u32> {
        self.pop_i32().map(|v| v as u32)
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Takes the branch to the label `depth` levels out.
    fn branch(&mut self, depth: u32) -> Result<Flow> {
        let index = self
            .labels
            .len()
            .checked_sub(depth as usize + 1)
            .ok_or_else(corrupt)?;
        let label = self.labels[index];
        let keep = self
            .stack
            .len()
            .checked_sub(label.arity)
            .filter(|start| *start >= label.height)
            .ok_or_else(corrupt)?;
        self.stack.drain(label.height..keep);
        self.labels.truncate(index);
        Ok(Flow::Jump(label.cont))
    }

    fn enter_block(&mut self, params: u32, arity: u32, cont: usize) -> Result<()> {
        let height = self
            .stack
            .len()
            .checked_sub(params as usize)
            .ok_or_else(corrupt)?;
        self.labels.push(Label {
            height,
            arity: arity as usize,
            cont,
        });
        Ok(())
    }

    fn local_slot(&mut self, ctx: &Context<'_>, index: u32) -> Result<&mut Value> {
        self.locals
            .get_mut(ctx.locals_base + index as usize)
            .ok_or_else(corrupt)
    }

    pub(super) fn exec(
        &mut self,
        store: &mut Store,
        ctx: &Context<'_>,
        instr: &Instr,
        pc: usize,
    ) -> Result<Flow> {
        match instr {
            Instr::Unreachable => {
                return Err(Error::trap(
                    Status::TrapUnreachable,
                    "unreachable executed",
                ));
            }
            Instr::Nop => {}
            Instr::Block { arity, end } => {
                self.enter_block(arity.params, arity.results, *end as usize + 1)?;
            }
            Instr::Loop { arity } => self.enter_block(arity.params, arity.params, pc)?,
            Instr::If { arity, else_, end } => {
                let condition = self.pop_i32()?;
                self.enter_block(arity.params, arity.results, *end as usize + 1)?;
                if condition == 0 {
                    return Ok(Flow::Jump(*else_ as usize));
                }
            }
            Instr::Else { end } => return Ok(Flow::Jump(*end as usize)),
            Instr::End => {
                self.labels.pop();
            }
            Instr::Br(depth) => return self.branch(*depth),
            Instr::BrIf(depth) => {
                if self.pop_i32()? != 0 {
                    return self.branch(*depth);
                }
            }
            Instr::BrTable { targets, default } => {
                let index = self.pop_u32()? as usize;
                let depth = targets.get(index).copied().unwrap_or(*default);
                return self.branch(depth);
            }
            Instr::Return => return Ok(Flow::Return),
            Instr::Call(index) => return Ok(Flow::Call(FuncRef::new(ctx.instance, *index))),
            Instr::CallIndirect { type_index, table } => {
                return self.call_indirect(store, ctx, *type_index, *table);
            }

            Instr::Drop => {
                self.pop()?;
            }
            Instr::Select => {
                let condition = self.pop_i32()?;
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(if condition != 0 { a } else { b });
            }

            Instr::LocalGet(index) => {
                let value = *self.local_slot(ctx, *index)?;
                self.push(value);
            }
            Instr::LocalSet(index) => {
                let value = self.pop()?;
                *self.local_slot(ctx, *index)? = value;
            }
            Instr::LocalTee(index) => {
                let value = *self.stack.last().ok_or_else(corrupt)?;
                *self.local_slot(ctx, *index)? = value;
            }
            Instr::GlobalGet(index) => {
                let addr = store
                    .instance_global(ctx.instance, *index)
                    .ok_or_else(corrupt)?;
                self.push(store.globals[addr.index()].value);
            }
            Instr::GlobalSet(index) => {
                let value = self.pop()?;
                let addr = store
                    .instance_global(ctx.instance, *index)
                    .ok_or_else(corrupt)?;
                store.globals[addr.index()].value = value;
            }

            Instr::TableGet(index) => {
                let i = self.pop_u32()?;
                let addr = table_addr(store, ctx.instance, *index)?;
                let value = store.tables[addr.index()].get(i)?;
                self.push(value);
            }
            Instr::TableSet(index) => {
                let value = self.pop()?;
                let i = self.pop_u32()?;
                let addr = table_addr(store, ctx.instance, *index)?;
                store.tables[addr.index()].set(i, value)?;
            }
            Instr::TableSize(index) => {
                let addr = table_addr(store, ctx.instance, *index)?;
                self.push(Value::I32(store.tables[addr.index()].size() as i32));
            }
            Instr::TableGrow(index) => {
                let delta = self.pop_u32()?;
                let init = self.pop()?;
                let addr = table_addr(store, ctx.instance, *index)?;
                let old = store.tables[addr.index()].grow(delta, init);
                self.push(Value::I32(old.map_or(-1, |n| n as i32)));
            }
            Instr::TableFill(index) => {
                let len = self.pop_u32()?;
                let value = self.pop()?;
                let start = self.pop_u32()?;
                let addr = table_addr(store, ctx.instance, *index)?;
                store.tables[addr.index()].fill(start, value, len)?;
            }
            Instr::TableCopy { dst, src } => {
                let len = self.pop_u32()?;
                let s = self.pop_u32()?;
                let d = self.pop_u32()?;
                let dst = table_addr(store, ctx.instance, *dst)?;
                let src = table_addr(store, ctx.instance, *src)?;
                if dst == src {
                    store.tables[dst.index()].copy_within(d, s, len)?;
                } else {
                    let items = store.tables[src.index()]
                        .slice(s, len)
                        .ok_or_else(|| table_oob("table.copy"))?
                        .to_vec();
                    store.tables[dst.index()].init(d, &items)?;
                }
            }
            Instr::TableInit { segment, table } => {
                let len = self.pop_u32()? as usize;
                let s = self.pop_u32()? as usize;
                let d = self.pop_u32()?;
                let addr = table_addr(store, ctx.instance, *table)?;
                let items = store.instances[ctx.instance.index()]
                    .elements
                    .get(*segment as usize)
                    .ok_or_else(corrupt)?;
                let items = s
                    .checked_add(len)
                    .and_then(|end| items.get(s..end))
                    .ok_or_else(|| table_oob("table.init"))?;
                store.tables[addr.index()].init(d, items)?;
            }
            Instr::ElemDrop(segment) => {
                if let Some(items) = store.instances[ctx.instance.index()]
                    .elements
                    .get_mut(*segment as usize)
                {
                    *items = Vec::new();
                }
            }

            Instr::Load {
                kind,
                memory,
                offset,
            } => {
                let ea = u64::from(self.pop_u32()?) + u64::from(*offset);
                let mem = &store.memories[memory_addr(store, ctx.instance, *memory)?.index()];
                let value = match kind {
                    LoadKind::I32 => Value::I32(i32::from_le_bytes(load(mem, ea)?)),
                    LoadKind::I64 => Value::I64(i64::from_le_bytes(load(mem, ea)?)),
                    LoadKind::F32 => Value::F32(f32::from_le_bytes(load(mem, ea)?)),
                    LoadKind::F64 => Value::F64(f64::from_le_bytes(load(mem, ea)?)),
                    LoadKind::I32S8 => Value::I32(i32::from(i8::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I32U8 => Value::I32(i32::from(u8::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I32S16 => Value::I32(i32::from(i16::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I32U16 => Value::I32(i32::from(u16::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64S8 => Value::I64(i64::from(i8::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64U8 => Value::I64(i64::from(u8::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64S16 => Value::I64(i64::from(i16::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64U16 => Value::I64(i64::from(u16::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64S32 => Value::I64(i64::from(i32::from_le_bytes(load(mem, ea)?))),
                    LoadKind::I64U32 => Value::I64(i64::from(u32::from_le_bytes(load(mem, ea)?))),
                };
                self.push(value);
            }
            Instr::Store {
                kind,
                memory,
                offset,
            } => {
                let value = self.pop()?;
                let ea = u64::from(self.pop_u32()?) + u64::from(*offset);
                let addr = memory_addr(store, ctx.instance, *memory)?;
                let mem = &mut store.memories[addr.index()];
                let written = match (kind, value) {
                    (StoreKind::I32, Value::I32(v)) => mem.write(ea, &v.to_le_bytes()),
                    (StoreKind::I64, Value::I64(v)) => mem.write(ea, &v.to_le_bytes()),
                    (StoreKind::F32, Value::F32(v)) => mem.write(ea, &v.to_le_bytes()),
                    (StoreKind::F64, Value::F64(v)) => mem.write(ea, &v.to_le_bytes()),
                    (StoreKind::I32As8, Value::I32(v)) => mem.write(ea, &(v as u8).to_le_bytes()),
                    (StoreKind::I32As16, Value::I32(v)) => mem.write(ea, &(v as u16).to_le_bytes()),
                    (StoreKind::I64As8, Value::I64(v)) => mem.write(ea, &(v as u8).to_le_bytes()),
                    (StoreKind::I64As16, Value::I64(v)) => mem.write(ea, &(v as u16).to_le_bytes()),
                    (StoreKind::I64As32, Value::I64(v)) => mem.write(ea, &(v as u32).to_le_bytes()),
                    _ => return Err(corrupt()),
                };
                if !written {
                    return Err(memory_oob(ea, u64::from(kind.width())));
                }
            }
            Instr::MemorySize(index) => {
                let addr = memory_addr(store, ctx.instance, *index)?;
                self.push(Value::I32(store.memories[addr.index()].pages() as i32));
            }
            Instr::MemoryGrow(index) => {
                let delta = self.pop_u32()?;
                let addr = memory_addr(store, ctx.instance, *index)?;
                let old = store.memories[addr.index()].grow(delta);
                self.push(Value::I32(old.map_or(-1, |n| n as i32)));
            }
            Instr::MemoryInit { segment, memory } => {
                let len = u64::from(self.pop_u32()?);
                let s = u64::from(self.pop_u32()?);
                let d = u64::from(self.pop_u32()?);
                let addr = memory_addr(store, ctx.instance, *memory)?;
                let bytes = store.instances[ctx.instance.index()].data_segment(*segment);
                let end = s + len;
                if end > bytes.len() as u64 {
                    return Err(memory_oob(s, len));
                }
                if !store.memories[addr.index()].write(d, &bytes[s as usize..end as usize]) {
                    return Err(memory_oob(d, len));
                }
            }
            Instr::DataDrop(segment) => {
                if let Some(dropped) = store.instances[ctx.instance.index()]
                    .data_dropped
                    .get_mut(*segment as usize)
                {
                    *dropped = true;
                }
            }
            Instr::MemoryCopy { dst, src } => {
                let len = u64::from(self.pop_u32()?);
                let s = u64::from(self.pop_u32()?);
                let d = u64::from(self.pop_u32()?);
                let dst = memory_addr(store, ctx.instance, *dst)?;
                let src = memory_addr(store, ctx.instance, *src)?;
                let from = store.memories[src.index()]
                    .range(s, len)
                    .ok_or_else(|| memory_oob(s, len))?;
                let to = store.memories[dst.index()]
                    .range(d, len)
                    .ok_or_else(|| memory_oob(d, len))?;
                if dst == src {
                    store.memories[dst.index()]
                        .data_mut()
                        .copy_within(from, to.start);
                } else {
                    let bytes = store.memories[src.index()].data()[from].to_vec();
                    store.memories[dst.index()].data_mut()[to].copy_from_slice(&bytes);
                }
            }
            Instr::MemoryFill(index) => {
                let len = u64::from(self.pop_u32()?);
                let byte = self.pop_i32()? as u8;
                let d = u64::from(self.pop_u32()?);
                let addr = memory_addr(store, ctx.instance, *index)?;
                let mem = &mut store.memories[addr.index()];
                let range = mem.range(d, len).ok_or_else(|| memory_oob(d, len))?;
                mem.data_mut()[range].fill(byte);
            }

            Instr::I32Const(v) => self.push(Value::I32(*v)),
            Instr::I64Const(v) => self.push(Value::I64(*v)),
            Instr::F32Const(bits) => self.push(Value::F32(f32::from_bits(*bits))),
            Instr::F64Const(bits) => self.push(Value::F64(f64::from_bits(*bits))),
            Instr::RefNull(ty) => self.push(ty.default_value()),
            Instr::RefIsNull => {
                let value = self.pop()?;
                self.push(flag(value.is_null()));
            }
            Instr::RefFunc(index) => {
                self.push(Value::FuncRef(Some(FuncRef::new(ctx.instance, *index))));
            }
            Instr::Num(op) => numeric::eval(*op, &mut self.stack)?,
        }
        Ok(Flow::Next)
    }

    /// Resolves the callee of `call_indirect` and checks its signature.
    fn call_indirect(
        &mut self,
        store: &Store,
        ctx: &Context<'_>,
        type_index: u32,
        table: u32,
    ) -> Result<Flow> {
        let slot = self.pop_u32()?;
        let addr = table_addr(store, ctx.instance, table)?;
        let table = &store.tables[addr.index()];
        if slot >= table.size() {
            return Err(Error::trap(
                Status::TrapTableOutOfBounds,
                format!("call_indirect: element {slot} is outside a table of {}", table.size()),
            ));
        }
        let Value::FuncRef(Some(target)) = table.get(slot)? else {
            return Err(Error::trap(
                Status::TrapRefNull,
                format!("call_indirect: element {slot} is null"),
            ));
        };
        let expected = ctx.module.types.get(type_index as usize).ok_or_else(corrupt)?;
        match store.func_type(target) {
            Some(actual) if actual == expected => Ok(Flow::Call(target)),
            actual => Err(Error::trap(
                Status::TrapIndirectCallTypeMismatch,
                format!(
                    "call_indirect: expected {expected}, element {slot} has {}",
                    actual.map_or_else(|| "no type".to_string(), ToString::to_string)
                ),
            )),
        }
    }
}
