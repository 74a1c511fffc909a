//! Function body decoding with full type validation.
//!
//! Bodies are checked with the usual operand-stack/control-stack algorithm
//! while being lowered to [`Instr`]. Structured-control targets are patched
//! in as each `end` is reached, so the emitted stream needs no further
//! resolution before execution.

use super::reader::Reader;
use crate::instr::{BlockArity, Instr, LoadKind, NumOp, StoreKind};
use crate::module::{FunctionBody, Module};
use tarn_core::{Error, Result, Status, ValueType};

/// Upper bound on declared locals per function.
pub(crate) const MAX_LOCALS: u64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
    Else,
}

#[derive(Debug)]
struct ControlFrame {
    kind: FrameKind,
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    height: usize,
    unreachable: bool,
    /// Index of the `Block`, `Loop`, or `If` that opened the frame.
    start: usize,
    /// Index of the `Else`, once seen.
    else_at: Option<usize>,
}

impl ControlFrame {
    fn label_types(&self) -> &[ValueType] {
        if self.kind == FrameKind::Loop {
            &self.params
        } else {
            &self.results
        }
    }
}

struct BodyValidator<'m> {
    module: &'m Module,
    locals: Vec<ValueType>,
    vals: Vec<Option<ValueType>>,
    ctrls: Vec<ControlFrame>,
    code: Vec<Instr>,
    op_offset: usize,
}

/// Decodes and validates the body of function `func_index`.
pub(crate) fn decode_body(
    module: &Module,
    func_index: u32,
    reader: &mut Reader<'_>,
) -> Result<FunctionBody> {
    let offset = reader.offset();
    let ty = module
        .func_type(func_index)
        .ok_or_else(|| reader.validation_error(Status::ValidationInvalidFunction, "no type"))?;

    let mut declared = Vec::new();
    let mut total: u64 = 0;
    let groups = reader.read_len()?;
    for _ in 0..groups {
        let count = reader.read_u32()?;
        total += u64::from(count);
        if total > MAX_LOCALS {
            return Err(reader.parse_error("too many locals"));
        }
        let ty = reader.read_value_type()?;
        declared.extend(std::iter::repeat_n(ty, count as usize));
    }

    let mut locals = ty.params().to_vec();
    locals.extend_from_slice(&declared);

    let mut validator = BodyValidator {
        module,
        locals,
        vals: Vec::new(),
        ctrls: Vec::new(),
        code: Vec::new(),
        op_offset: reader.offset(),
    };
    validator.push_ctrl(FrameKind::Function, Vec::new(), ty.results().to_vec());

    while !validator.ctrls.is_empty() {
        if reader.is_empty() {
            return Err(reader.parse_error("function body ends before its final end"));
        }
        validator.op_offset = reader.offset();
        validator.step(reader)?;
    }
    if !reader.is_empty() {
        return Err(reader.parse_error("trailing bytes after function end"));
    }

    Ok(FunctionBody {
        locals: declared,
        code: validator.code,
        offset,
    })
}

impl BodyValidator<'_> {
    fn error(&self, status: Status, message: impl Into<String>) -> Error {
        Error::Validation {
            status,
            offset: self.op_offset,
            message: message.into(),
        }
    }

    fn mismatch(&self, message: impl Into<String>) -> Error {
        self.error(Status::ValidationTypeMismatch, message)
    }

    fn frame(&self) -> Result<&ControlFrame> {
        self.ctrls
            .last()
            .ok_or_else(|| self.mismatch("instruction outside of any block"))
    }

    fn push(&mut self, ty: ValueType) {
        self.vals.push(Some(ty));
    }

    fn push_all(&mut self, types: &[ValueType]) {
        self.vals.extend(types.iter().copied().map(Some));
    }

    fn pop(&mut self) -> Result<Option<ValueType>> {
        let frame = self.frame()?;
        if self.vals.len() == frame.height {
            if frame.unreachable {
                return Ok(None);
            }
            return Err(self.mismatch("operand stack underflow"));
        }
        Ok(self.vals.pop().flatten())
    }

    fn pop_expect(&mut self, expected: ValueType) -> Result<Option<ValueType>> {
        let actual = self.pop()?;
        match actual {
            Some(actual) if actual != expected => {
                Err(self.mismatch(format!("expected {expected}, found {actual}")))
            }
            _ => Ok(actual.or(Some(expected))),
        }
    }

    fn pop_all(&mut self, types: &[ValueType]) -> Result<()> {
        for ty in types.iter().rev() {
            self.pop_expect(*ty)?;
        }
        Ok(())
    }

    fn push_ctrl(&mut self, kind: FrameKind, params: Vec<ValueType>, results: Vec<ValueType>) {
        let height = self.vals.len();
        self.push_all(&params);
        self.ctrls.push(ControlFrame {
            kind,
            params,
            results,
            height,
            unreachable: false,
            start: self.code.len(),
            else_at: None,
        });
    }

    fn pop_ctrl(&mut self) -> Result<ControlFrame> {
        let results = self.frame()?.results.clone();
        self.pop_all(&results)?;
        let frame = self.frame()?;
        if self.vals.len() != frame.height {
            return Err(self.mismatch("values remain on the stack at end of block"));
        }
        self.ctrls
            .pop()
            .ok_or_else(|| self.mismatch("unbalanced end"))
    }

    fn set_unreachable(&mut self) -> Result<()> {
        let height = self.frame()?.height;
        self.vals.truncate(height);
        if let Some(frame) = self.ctrls.last_mut() {
            frame.unreachable = true;
        }
        Ok(())
    }

    fn label(&self, depth: u32) -> Result<&ControlFrame> {
        let depth = depth as usize;
        if depth >= self.ctrls.len() {
            return Err(self.mismatch(format!("unknown label {depth}")));
        }
        Ok(&self.ctrls[self.ctrls.len() - 1 - depth])
    }

    fn label_types(&self, depth: u32) -> Result<Vec<ValueType>> {
        Ok(self.label(depth)?.label_types().to_vec())
    }

    fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn block_type(&self, reader: &mut Reader<'_>) -> Result<(Vec<ValueType>, Vec<ValueType>)> {
        match reader.peek_u8() {
            Some(0x40) => {
                reader.read_u8()?;
                Ok((Vec::new(), Vec::new()))
            }
            Some(byte) if ValueType::from_byte(byte).is_some() => {
                let ty = reader.read_value_type()?;
                Ok((Vec::new(), vec![ty]))
            }
            _ => {
                let index = reader.read_s33()?;
                let ty = u32::try_from(index)
                    .ok()
                    .and_then(|i| self.module.types.get(i as usize))
                    .ok_or_else(|| {
                        self.error(
                            Status::ValidationInvalidType,
                            format!("unknown block type {index}"),
                        )
                    })?;
                Ok((ty.params().to_vec(), ty.results().to_vec()))
            }
        }
    }

    fn check_local(&self, index: u32) -> Result<ValueType> {
        self.locals.get(index as usize).copied().ok_or_else(|| {
            self.error(
                Status::ValidationInvalidLocal,
                format!("unknown local {index}"),
            )
        })
    }

    fn check_memory(&self, index: u32) -> Result<()> {
        if (index as usize) < self.module.memories.len() {
            Ok(())
        } else {
            Err(self.error(
                Status::ValidationInvalidMemory,
                format!("unknown memory {index}"),
            ))
        }
    }

    fn check_table(&self, index: u32) -> Result<ValueType> {
        self.module
            .tables
            .get(index as usize)
            .map(|t| t.element)
            .ok_or_else(|| {
                self.error(
                    Status::ValidationInvalidTable,
                    format!("unknown table {index}"),
                )
            })
    }

    fn check_elem(&self, index: u32) -> Result<ValueType> {
        self.module
            .elements
            .get(index as usize)
            .map(|e| e.ty)
            .ok_or_else(|| {
                self.error(
                    Status::ValidationInvalidTable,
                    format!("unknown element segment {index}"),
                )
            })
    }

    fn check_data(&self, index: u32) -> Result<()> {
        let count = self.module.data_count.ok_or_else(|| {
            self.error(
                Status::ValidationInvalidMemory,
                "data count section required",
            )
        })?;
        if index < count {
            Ok(())
        } else {
            Err(self.error(
                Status::ValidationInvalidMemory,
                format!("unknown data segment {index}"),
            ))
        }
    }

    fn read_memarg(&self, reader: &mut Reader<'_>, width: u32) -> Result<(u32, u32)> {
        let mut align = reader.read_u32()?;
        let memory = if align & 0x40 != 0 {
            align &= !0x40;
            reader.read_u32()?
        } else {
            0
        };
        let offset = reader.read_u32()?;
        self.check_memory(memory)?;
        if align >= 32 || (1_u64 << align) > u64::from(width) {
            return Err(self.error(
                Status::ValidationInvalidMemory,
                "alignment must not be larger than natural",
            ));
        }
        Ok((memory, offset))
    }

    /// Reads a memory index immediate.
    fn read_memory_index(&self, reader: &mut Reader<'_>) -> Result<u32> {
        let index = reader.read_u32()?;
        self.check_memory(index)?;
        Ok(index)
    }

    fn step(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        let opcode = reader.read_u8()?;
        match opcode {
            0x00 => {
                self.emit(Instr::Unreachable);
                self.set_unreachable()?;
            }
            0x01 => self.emit(Instr::Nop),
            0x02 | 0x03 => {
                let (params, results) = self.block_type(reader)?;
                self.pop_all(&params)?;
                let arity = BlockArity {
                    params: params.len() as u32,
                    results: results.len() as u32,
                };
                let kind = if opcode == 0x02 {
                    FrameKind::Block
                } else {
                    FrameKind::Loop
                };
                self.push_ctrl(kind, params, results);
                if kind == FrameKind::Block {
                    self.emit(Instr::Block { arity, end: 0 });
                } else {
                    self.emit(Instr::Loop { arity });
                }
            }
            0x04 => {
                let (params, results) = self.block_type(reader)?;
                self.pop_expect(ValueType::I32)?;
                self.pop_all(&params)?;
                let arity = BlockArity {
                    params: params.len() as u32,
                    results: results.len() as u32,
                };
                self.push_ctrl(FrameKind::If, params, results);
                self.emit(Instr::If {
                    arity,
                    else_: 0,
                    end: 0,
                });
            }
            0x05 => {
                if self.frame()?.kind != FrameKind::If {
                    return Err(self.mismatch("else without matching if"));
                }
                let frame = self.pop_ctrl()?;
                let else_at = self.code.len();
                self.emit(Instr::Else { end: 0 });
                if let Some(Instr::If { else_, .. }) = self.code.get_mut(frame.start) {
                    *else_ = else_at as u32 + 1;
                }
                self.push_ctrl(FrameKind::Else, frame.params, frame.results);
                if let Some(current) = self.ctrls.last_mut() {
                    current.start = frame.start;
                    current.else_at = Some(else_at);
                }
            }
            0x0B => {
                let frame = self.pop_ctrl()?;
                if frame.kind == FrameKind::If && frame.params != frame.results {
                    return Err(self.mismatch("if without else must not change the stack"));
                }
                let end = self.here();
                self.emit(Instr::End);
                self.patch_end(&frame, end);
                self.push_all(&frame.results);
            }
            0x0C => {
                let depth = reader.read_u32()?;
                let types = self.label_types(depth)?;
                self.pop_all(&types)?;
                self.emit(Instr::Br(depth));
                self.set_unreachable()?;
            }
            0x0D => {
                let depth = reader.read_u32()?;
                self.pop_expect(ValueType::I32)?;
                let types = self.label_types(depth)?;
                self.pop_all(&types)?;
                self.push_all(&types);
                self.emit(Instr::BrIf(depth));
            }
            0x0E => {
                let count = reader.read_len()?;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(reader.read_u32()?);
                }
                let default = reader.read_u32()?;
                self.pop_expect(ValueType::I32)?;
                let arity = self.label_types(default)?.len();
                for &target in &targets {
                    let types = self.label_types(target)?;
                    if types.len() != arity {
                        return Err(self.mismatch("br_table targets have different arities"));
                    }
                    // Check against a scratch copy so each target sees the same operands.
                    let saved = self.vals.clone();
                    self.pop_all(&types)?;
                    self.vals = saved;
                }
                let types = self.label_types(default)?;
                self.pop_all(&types)?;
                self.emit(Instr::BrTable {
                    targets: targets.into_boxed_slice(),
                    default,
                });
                self.set_unreachable()?;
            }
            0x0F => {
                let results = self
                    .ctrls
                    .first()
                    .map(|f| f.results.clone())
                    .unwrap_or_default();
                self.pop_all(&results)?;
                self.emit(Instr::Return);
                self.set_unreachable()?;
            }
            0x10 => {
                let index = reader.read_u32()?;
                let ty = self.module.func_type(index).cloned().ok_or_else(|| {
                    self.error(
                        Status::ValidationInvalidFunction,
                        format!("unknown function {index}"),
                    )
                })?;
                self.pop_all(ty.params())?;
                self.push_all(ty.results());
                self.emit(Instr::Call(index));
            }
            0x11 => {
                let type_index = reader.read_u32()?;
                let table = reader.read_u32()?;
                let ty = self
                    .module
                    .types
                    .get(type_index as usize)
                    .cloned()
                    .ok_or_else(|| {
                        self.error(
                            Status::ValidationInvalidType,
                            format!("unknown type {type_index}"),
                        )
                    })?;
                if self.check_table(table)? != ValueType::FuncRef {
                    return Err(self.mismatch("call_indirect requires a funcref table"));
                }
                self.pop_expect(ValueType::I32)?;
                self.pop_all(ty.params())?;
                self.push_all(ty.results());
                self.emit(Instr::CallIndirect { type_index, table });
            }
            0x1A => {
                self.pop()?;
                self.emit(Instr::Drop);
            }
            0x1B => {
                self.pop_expect(ValueType::I32)?;
                let first = self.pop()?;
                let second = self.pop()?;
                if first.is_some_and(ValueType::is_ref) || second.is_some_and(ValueType::is_ref) {
                    return Err(self.mismatch("untyped select requires numeric operands"));
                }
                if let (Some(a), Some(b)) = (first, second)
                    && a != b
                {
                    return Err(self.mismatch(format!("select operands differ: {b} and {a}")));
                }
                match first.or(second) {
                    Some(ty) => self.push(ty),
                    None => self.vals.push(None),
                }
                self.emit(Instr::Select);
            }
            0x1C => {
                if reader.read_u32()? != 1 {
                    return Err(self.mismatch("typed select must name exactly one type"));
                }
                let ty = reader.read_value_type()?;
                self.pop_expect(ValueType::I32)?;
                self.pop_expect(ty)?;
                self.pop_expect(ty)?;
                self.push(ty);
                self.emit(Instr::Select);
            }
            0x20 => {
                let index = reader.read_u32()?;
                let ty = self.check_local(index)?;
                self.push(ty);
                self.emit(Instr::LocalGet(index));
            }
            0x21 => {
                let index = reader.read_u32()?;
                let ty = self.check_local(index)?;
                self.pop_expect(ty)?;
                self.emit(Instr::LocalSet(index));
            }
            0x22 => {
                let index = reader.read_u32()?;
                let ty = self.check_local(index)?;
                self.pop_expect(ty)?;
                self.push(ty);
                self.emit(Instr::LocalTee(index));
            }
            0x23 => {
                let index = reader.read_u32()?;
                let global = self.global(index)?;
                self.push(global.value_type);
                self.emit(Instr::GlobalGet(index));
            }
            0x24 => {
                let index = reader.read_u32()?;
                let global = self.global(index)?;
                if !global.mutable {
                    return Err(self.error(
                        Status::ValidationInvalidGlobal,
                        format!("global {index} is immutable"),
                    ));
                }
                self.pop_expect(global.value_type)?;
                self.emit(Instr::GlobalSet(index));
            }
            0x25 => {
                let table = reader.read_u32()?;
                let ty = self.check_table(table)?;
                self.pop_expect(ValueType::I32)?;
                self.push(ty);
                self.emit(Instr::TableGet(table));
            }
            0x26 => {
                let table = reader.read_u32()?;
                let ty = self.check_table(table)?;
                self.pop_expect(ty)?;
                self.pop_expect(ValueType::I32)?;
                self.emit(Instr::TableSet(table));
            }
            0x28..=0x35 => {
                let kind = match opcode {
                    0x28 => LoadKind::I32,
                    0x29 => LoadKind::I64,
                    0x2A => LoadKind::F32,
                    0x2B => LoadKind::F64,
                    0x2C => LoadKind::I32S8,
                    0x2D => LoadKind::I32U8,
                    0x2E => LoadKind::I32S16,
                    0x2F => LoadKind::I32U16,
                    0x30 => LoadKind::I64S8,
                    0x31 => LoadKind::I64U8,
                    0x32 => LoadKind::I64S16,
                    0x33 => LoadKind::I64U16,
                    0x34 => LoadKind::I64S32,
                    _ => LoadKind::I64U32,
                };
                let (memory, offset) = self.read_memarg(reader, kind.width())?;
                self.pop_expect(ValueType::I32)?;
                self.push(kind.result());
                self.emit(Instr::Load {
                    kind,
                    memory,
                    offset,
                });
            }
            0x36..=0x3E => {
                let kind = match opcode {
                    0x36 => StoreKind::I32,
                    0x37 => StoreKind::I64,
                    0x38 => StoreKind::F32,
                    0x39 => StoreKind::F64,
                    0x3A => StoreKind::I32As8,
                    0x3B => StoreKind::I32As16,
                    0x3C => StoreKind::I64As8,
                    0x3D => StoreKind::I64As16,
                    _ => StoreKind::I64As32,
                };
                let (memory, offset) = self.read_memarg(reader, kind.width())?;
                self.pop_expect(kind.operand())?;
                self.pop_expect(ValueType::I32)?;
                self.emit(Instr::Store {
                    kind,
                    memory,
                    offset,
                });
            }
            0x3F => {
                let memory = self.read_memory_index(reader)?;
                self.push(ValueType::I32);
                self.emit(Instr::MemorySize(memory));
            }
            0x40 => {
                let memory = self.read_memory_index(reader)?;
                self.pop_expect(ValueType::I32)?;
                self.push(ValueType::I32);
                self.emit(Instr::MemoryGrow(memory));
            }
            0x41 => {
                let value = reader.read_i32()?;
                self.push(ValueType::I32);
                self.emit(Instr::I32Const(value));
            }
            0x42 => {
                let value = reader.read_i64()?;
                self.push(ValueType::I64);
                self.emit(Instr::I64Const(value));
            }
            0x43 => {
                let bits = reader.read_f32_bits()?;
                self.push(ValueType::F32);
                self.emit(Instr::F32Const(bits));
            }
            0x44 => {
                let bits = reader.read_f64_bits()?;
                self.push(ValueType::F64);
                self.emit(Instr::F64Const(bits));
            }
            0x45..=0xC4 => {
                let op = NumOp::from_opcode(opcode)
                    .ok_or_else(|| reader.parse_error(format!("unknown opcode 0x{opcode:02x}")))?;
                self.numeric(op)?;
            }
            0xD0 => {
                let ty = reader.read_ref_type()?;
                self.push(ty);
                self.emit(Instr::RefNull(ty));
            }
            0xD1 => {
                if let Some(ty) = self.pop()?
                    && !ty.is_ref()
                {
                    return Err(self.mismatch(format!("ref.is_null on {ty}")));
                }
                self.push(ValueType::I32);
                self.emit(Instr::RefIsNull);
            }
            0xD2 => {
                let index = reader.read_u32()?;
                if index >= self.module.function_count() {
                    return Err(self.error(
                        Status::ValidationInvalidFunction,
                        format!("unknown function {index}"),
                    ));
                }
                if !self.module.is_declared_reference(index) {
                    return Err(self.error(
                        Status::ValidationInvalidFunction,
                        format!("function {index} is not declared as a reference"),
                    ));
                }
                self.push(ValueType::FuncRef);
                self.emit(Instr::RefFunc(index));
            }
            0xFC => self.prefixed(reader)?,
            _ => {
                return Err(Error::Parse {
                    offset: self.op_offset,
                    message: format!("unsupported opcode 0x{opcode:02x}"),
                });
            }
        }
        Ok(())
    }

    fn prefixed(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        let sub = reader.read_u32()?;
        match sub {
            0..=7 => {
                let op = NumOp::from_saturating(sub)
                    .ok_or_else(|| reader.parse_error(format!("unknown opcode 0xfc {sub}")))?;
                self.numeric(op)?;
            }
            8 => {
                let segment = reader.read_u32()?;
                let memory = self.read_memory_index(reader)?;
                self.check_data(segment)?;
                self.pop_all(&[ValueType::I32, ValueType::I32, ValueType::I32])?;
                self.emit(Instr::MemoryInit { segment, memory });
            }
            9 => {
                let segment = reader.read_u32()?;
                self.check_data(segment)?;
                self.emit(Instr::DataDrop(segment));
            }
            10 => {
                let dst = self.read_memory_index(reader)?;
                let src = self.read_memory_index(reader)?;
                self.pop_all(&[ValueType::I32, ValueType::I32, ValueType::I32])?;
                self.emit(Instr::MemoryCopy { dst, src });
            }
            11 => {
                let memory = self.read_memory_index(reader)?;
                self.pop_all(&[ValueType::I32, ValueType::I32, ValueType::I32])?;
                self.emit(Instr::MemoryFill(memory));
            }
            12 => {
                let segment = reader.read_u32()?;
                let table = reader.read_u32()?;
                let elem_ty = self.check_elem(segment)?;
                let table_ty = self.check_table(table)?;
                if elem_ty != table_ty {
                    return Err(self.mismatch(format!(
                        "element segment of {elem_ty} used with a {table_ty} table"
                    )));
                }
                self.pop_all(&[ValueType::I32, ValueType::I32, ValueType::I32])?;
                self.emit(Instr::TableInit { segment, table });
            }
            13 => {
                let segment = reader.read_u32()?;
                self.check_elem(segment)?;
                self.emit(Instr::ElemDrop(segment));
            }
            14 => {
                let dst = reader.read_u32()?;
                let src = reader.read_u32()?;
                if self.check_table(dst)? != self.check_table(src)? {
                    return Err(self.mismatch("table.copy between tables of different types"));
                }
                self.pop_all(&[ValueType::I32, ValueType::I32, ValueType::I32])?;
                self.emit(Instr::TableCopy { dst, src });
            }
            15 => {
                let table = reader.read_u32()?;
                let ty = self.check_table(table)?;
                self.pop_all(&[ty, ValueType::I32])?;
                self.push(ValueType::I32);
                self.emit(Instr::TableGrow(table));
            }
            16 => {
                let table = reader.read_u32()?;
                self.check_table(table)?;
                self.push(ValueType::I32);
                self.emit(Instr::TableSize(table));
            }
            17 => {
                let table = reader.read_u32()?;
                let ty = self.check_table(table)?;
                self.pop_all(&[ValueType::I32, ty, ValueType::I32])?;
                self.emit(Instr::TableFill(table));
            }
            _ => {
                return Err(Error::Parse {
                    offset: self.op_offset,
                    message: format!("unsupported opcode 0xfc {sub}"),
                });
            }
        }
        Ok(())
    }

    fn numeric(&mut self, op: NumOp) -> Result<()> {
        let (operands, result) = op.signature();
        self.pop_all(operands)?;
        self.push(result);
        self.emit(Instr::Num(op));
        Ok(())
    }

    fn global(&self, index: u32) -> Result<tarn_core::GlobalType> {
        self.module
            .globals
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                self.error(
                    Status::ValidationInvalidGlobal,
                    format!("unknown global {index}"),
                )
            })
    }

    fn patch_end(&mut self, frame: &ControlFrame, end: u32) {
        match frame.kind {
            FrameKind::Block => {
                if let Some(Instr::Block { end: target, .. }) = self.code.get_mut(frame.start) {
                    *target = end;
                }
            }
            FrameKind::If => {
                if let Some(Instr::If {
                    else_, end: target, ..
                }) = self.code.get_mut(frame.start)
                {
                    *else_ = end;
                    *target = end;
                }
            }
            FrameKind::Else => {
                if let Some(Instr::If { end: target, .. }) = self.code.get_mut(frame.start) {
                    *target = end;
                }
                if let Some(at) = frame.else_at
                    && let Some(Instr::Else { end: target }) = self.code.get_mut(at)
                {
                    *target = end;
                }
            }
            FrameKind::Loop | FrameKind::Function => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Export, ExternKind};
    use tarn_core::FuncType;

    fn module_with(ty: FuncType) -> Module {
        Module {
            types: vec![ty],
            functions: vec![0],
            ..Module::default()
        }
    }

    fn decode(module: &Module, body: &[u8]) -> Result<FunctionBody> {
        let mut reader = Reader::new(body);
        decode_body(module, 0, &mut reader)
    }

    #[test]
    fn test_ref_func_requires_declaration() {
        let mut module = module_with(FuncType::default());
        // no locals; ref.func 0; drop; end
        let body = [0x00, 0xD2, 0x00, 0x1A, 0x0B];
        let err = decode(&module, &body).unwrap_err();
        assert_eq!(err.status(), Status::ValidationInvalidFunction);

        module.exports.push(Export {
            name: "f".to_string(),
            kind: ExternKind::Func,
            index: 0,
        });
        assert!(decode(&module, &body).is_ok());
    }

    #[test]
    fn test_add_body() {
        let module = module_with(FuncType::new(
            [ValueType::I32, ValueType::I32],
            [ValueType::I32],
        ));
        // no locals; local.get 0; local.get 1; i32.add; end
        let body = decode(&module, &[0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B]).unwrap();
        assert_eq!(
            body.code,
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::Num(NumOp::I32Add),
                Instr::End
            ]
        );
    }

    #[test]
    fn test_block_end_is_patched() {
        let module = module_with(FuncType::default());
        // block; nop; end; end
        let body = decode(&module, &[0x00, 0x02, 0x40, 0x01, 0x0B, 0x0B]).unwrap();
        assert_eq!(
            body.code[0],
            Instr::Block {
                arity: BlockArity {
                    params: 0,
                    results: 0
                },
                end: 2
            }
        );
    }

    #[test]
    fn test_if_else_targets() {
        let module = module_with(FuncType::new([ValueType::I32], [ValueType::I32]));
        // local.get 0; if (result i32); i32.const 1; else; i32.const 2; end; end
        let body = decode(
            &module,
            &[
                0x00, 0x20, 0x00, 0x04, 0x7F, 0x41, 0x01, 0x05, 0x41, 0x02, 0x0B, 0x0B,
            ],
        )
        .unwrap();
        assert_eq!(
            body.code[1],
            Instr::If {
                arity: BlockArity {
                    params: 0,
                    results: 1
                },
                else_: 4,
                end: 5
            }
        );
        assert_eq!(body.code[3], Instr::Else { end: 5 });
    }

    #[test]
    fn test_type_mismatch_reported() {
        let module = module_with(FuncType::new([], [ValueType::I32]));
        // i64.const 0; end
        let err = decode(&module, &[0x00, 0x42, 0x00, 0x0B]).unwrap_err();
        assert_eq!(err.status(), Status::ValidationTypeMismatch);
    }

    #[test]
    fn test_invalid_local() {
        let module = module_with(FuncType::default());
        let err = decode(&module, &[0x00, 0x20, 0x05, 0x1A, 0x0B]).unwrap_err();
        assert_eq!(err.status(), Status::ValidationInvalidLocal);
    }

    #[test]
    fn test_unreachable_makes_stack_polymorphic() {
        let module = module_with(FuncType::new([], [ValueType::I64]));
        // unreachable; i32.add; drop; end  -> i32.add pops unknowns
        let body = decode(&module, &[0x00, 0x00, 0x6A, 0x1A, 0x0B]);
        assert!(body.is_ok());
    }

    #[test]
    fn test_missing_end_is_parse_error() {
        let module = module_with(FuncType::default());
        let err = decode(&module, &[0x00, 0x01]).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_simd_prefix_rejected() {
        let module = module_with(FuncType::default());
        let err = decode(&module, &[0x00, 0xFD, 0x0C, 0x0B]).unwrap_err();
        assert!(err.is_parse_error());
    }
}
