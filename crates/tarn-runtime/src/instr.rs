//! Decoded instruction stream executed by the interpreter.
//!
//! Function bodies are decoded once into a flat `Vec<Instr>` with every
//! structured-control target already resolved to an instruction index, so the
//! interpreter never scans for a matching `end` at run time. Instruction
//! indices double as breakpoint locations.

use tarn_core::ValueType;

/// Stack shape of a structured block: values consumed on entry and produced
/// on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockArity {
    /// Values the block takes from the enclosing stack.
    pub params: u32,
    /// Values the block leaves behind.
    pub results: u32,
}

/// Width and extension of a memory load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LoadKind {
    I32,
    I64,
    F32,
    F64,
    I32S8,
    I32U8,
    I32S16,
    I32U16,
    I64S8,
    I64U8,
    I64S16,
    I64U16,
    I64S32,
    I64U32,
}

impl LoadKind {
    /// Bytes read from memory.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::I32S8 | Self::I32U8 | Self::I64S8 | Self::I64U8 => 1,
            Self::I32S16 | Self::I32U16 | Self::I64S16 | Self::I64U16 => 2,
            Self::I32 | Self::F32 | Self::I64S32 | Self::I64U32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Kind of the value pushed.
    #[must_use]
    pub const fn result(self) -> ValueType {
        match self {
            Self::I32 | Self::I32S8 | Self::I32U8 | Self::I32S16 | Self::I32U16 => ValueType::I32,
            Self::F32 => ValueType::F32,
            Self::F64 => ValueType::F64,
            _ => ValueType::I64,
        }
    }
}

/// Width of a memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StoreKind {
    I32,
    I64,
    F32,
    F64,
    I32As8,
    I32As16,
    I64As8,
    I64As16,
    I64As32,
}

impl StoreKind {
    /// Bytes written to memory.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::I32As8 | Self::I64As8 => 1,
            Self::I32As16 | Self::I64As16 => 2,
            Self::I32 | Self::F32 | Self::I64As32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Kind of the value popped.
    #[must_use]
    pub const fn operand(self) -> ValueType {
        match self {
            Self::I32 | Self::I32As8 | Self::I32As16 => ValueType::I32,
            Self::F32 => ValueType::F32,
            Self::F64 => ValueType::F64,
            Self::I64 | Self::I64As8 | Self::I64As16 | Self::I64As32 => ValueType::I64,
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Trap unconditionally.
    Unreachable,
    /// Do nothing.
    Nop,
    /// Enter a block; `end` is the index of its `End`.
    Block {
        /// Block stack shape
        arity: BlockArity,
        /// Index of the matching `End`
        end: u32,
    },
    /// Enter a loop; branches re-enter at this instruction.
    Loop {
        /// Loop stack shape
        arity: BlockArity,
    },
    /// Conditional block.
    If {
        /// Block stack shape
        arity: BlockArity,
        /// Where a false condition continues: past `Else`, or the `End`
        else_: u32,
        /// Index of the matching `End`
        end: u32,
    },
    /// End of the true arm; jumps to the `End` at `end`.
    Else {
        /// Index of the matching `End`
        end: u32,
    },
    /// Leave the innermost block.
    End,
    /// Unconditional branch to a label depth.
    Br(u32),
    /// Conditional branch.
    BrIf(u32),
    /// Indexed branch.
    BrTable {
        /// Label depths indexed by the operand
        targets: Box<[u32]>,
        /// Depth used when the operand is out of range
        default: u32,
    },
    /// Leave the function.
    Return,
    /// Direct call.
    Call(u32),
    /// Call through a table.
    CallIndirect {
        /// Expected signature
        type_index: u32,
        /// Table holding the callee
        table: u32,
    },
    /// Discard the top operand.
    Drop,
    /// Pick one of two operands.
    Select,
    /// `local.get`
    LocalGet(u32),
    /// `local.set`
    LocalSet(u32),
    /// `local.tee`
    LocalTee(u32),
    /// `global.get`
    GlobalGet(u32),
    /// `global.set`
    GlobalSet(u32),
    /// `table.get`
    TableGet(u32),
    /// `table.set`
    TableSet(u32),
    /// `table.size`
    TableSize(u32),
    /// `table.grow`
    TableGrow(u32),
    /// `table.fill`
    TableFill(u32),
    /// Copy between two tables.
    TableCopy {
        /// Destination table
        dst: u32,
        /// Source table
        src: u32,
    },
    /// Copy from an element segment into a table.
    TableInit {
        /// Element segment index
        segment: u32,
        /// Destination table
        table: u32,
    },
    /// `elem.drop`
    ElemDrop(u32),
    /// Load from linear memory.
    Load {
        /// Width and extension
        kind: LoadKind,
        /// Memory index
        memory: u32,
        /// Static offset added to the address operand
        offset: u32,
    },
    /// Store to linear memory.
    Store {
        /// Width
        kind: StoreKind,
        /// Memory index
        memory: u32,
        /// Static offset added to the address operand
        offset: u32,
    },
    /// `memory.size`
    MemorySize(u32),
    /// `memory.grow`
    MemoryGrow(u32),
    /// Copy from a data segment into memory.
    MemoryInit {
        /// Data segment index
        segment: u32,
        /// Destination memory
        memory: u32,
    },
    /// `data.drop`
    DataDrop(u32),
    /// Copy between memories.
    MemoryCopy {
        /// Destination memory
        dst: u32,
        /// Source memory
        src: u32,
    },
    /// `memory.fill`
    MemoryFill(u32),
    /// `i32.const`
    I32Const(i32),
    /// `i64.const`
    I64Const(i64),
    /// `f32.const`, stored as raw bits.
    F32Const(u32),
    /// `f64.const`, stored as raw bits.
    F64Const(u64),
    /// `ref.null`
    RefNull(ValueType),
    /// `ref.is_null`
    RefIsNull,
    /// `ref.func`
    RefFunc(u32),
    /// Numeric operator without immediates.
    Num(NumOp),
}

/// Numeric operators: comparisons, arithmetic, and conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NumOp {
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
}

/// Opcodes `0x45..=0xC4`, in encoding order.
#[allow(clippy::enum_glob_use)]
const SINGLE_BYTE: [NumOp; 128] = {
    use NumOp::*;
    [
        I32Eqz, I32Eq, I32Ne, I32LtS, I32LtU, I32GtS, I32GtU, I32LeS, I32LeU, I32GeS, I32GeU,
        I64Eqz, I64Eq, I64Ne, I64LtS, I64LtU, I64GtS, I64GtU, I64LeS, I64LeU, I64GeS, I64GeU,
        F32Eq, F32Ne, F32Lt, F32Gt, F32Le, F32Ge, F64Eq, F64Ne, F64Lt, F64Gt, F64Le, F64Ge,
        I32Clz, I32Ctz, I32Popcnt, I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU,
        I32And, I32Or, I32Xor, I32Shl, I32ShrS, I32ShrU, I32Rotl, I32Rotr, I64Clz, I64Ctz,
        I64Popcnt, I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU, I64And, I64Or,
        I64Xor, I64Shl, I64ShrS, I64ShrU, I64Rotl, I64Rotr, F32Abs, F32Neg, F32Ceil, F32Floor,
        F32Trunc, F32Nearest, F32Sqrt, F32Add, F32Sub, F32Mul, F32Div, F32Min, F32Max,
        F32Copysign, F64Abs, F64Neg, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt, F64Add,
        F64Sub, F64Mul, F64Div, F64Min, F64Max, F64Copysign, I32WrapI64, I32TruncF32S,
        I32TruncF32U, I32TruncF64S, I32TruncF64U, I64ExtendI32S, I64ExtendI32U, I64TruncF32S,
        I64TruncF32U, I64TruncF64S, I64TruncF64U, F32ConvertI32S, F32ConvertI32U,
        F32ConvertI64S, F32ConvertI64U, F32DemoteF64, F64ConvertI32S, F64ConvertI32U,
        F64ConvertI64S, F64ConvertI64U, F64PromoteF32, I32ReinterpretF32, I64ReinterpretF64,
        F32ReinterpretI32, F64ReinterpretI64, I32Extend8S, I32Extend16S, I64Extend8S,
        I64Extend16S, I64Extend32S,
    ]
};

/// `0xFC` sub-opcodes `0..=7`.
const SATURATING: [NumOp; 8] = [
    NumOp::I32TruncSatF32S,
    NumOp::I32TruncSatF32U,
    NumOp::I32TruncSatF64S,
    NumOp::I32TruncSatF64U,
    NumOp::I64TruncSatF32S,
    NumOp::I64TruncSatF32U,
    NumOp::I64TruncSatF64S,
    NumOp::I64TruncSatF64U,
];

impl NumOp {
    /// Decodes a single-byte numeric opcode.
    #[must_use]
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        let index = opcode.checked_sub(0x45)?;
        SINGLE_BYTE.get(usize::from(index)).copied()
    }

    /// Decodes a saturating truncation from its `0xFC` sub-opcode.
    #[must_use]
    pub fn from_saturating(sub: u32) -> Option<Self> {
        SATURATING.get(sub as usize).copied()
    }

    /// Operand kinds (bottom first) and result kind.
    #[must_use]
    #[allow(clippy::enum_glob_use)]
    pub const fn signature(self) -> (&'static [ValueType], ValueType) {
        use NumOp::*;
        use ValueType::{F32, F64, I32, I64};
        match self {
            I32Eqz => (&[I32], I32),
            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU => (&[I32, I32], I32),
            I64Eqz => (&[I64], I32),
            I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
            | I64GeU => (&[I64, I64], I32),
            F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => (&[F32, F32], I32),
            F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => (&[F64, F64], I32),
            I32Clz | I32Ctz | I32Popcnt | I32Extend8S | I32Extend16S => (&[I32], I32),
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => (&[I32, I32], I32),
            I64Clz | I64Ctz | I64Popcnt | I64Extend8S | I64Extend16S | I64Extend32S => {
                (&[I64], I64)
            }
            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => (&[I64, I64], I64),
            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => {
                (&[F32], F32)
            }
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => {
                (&[F32, F32], F32)
            }
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => {
                (&[F64], F64)
            }
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => {
                (&[F64, F64], F64)
            }
            I32WrapI64 => (&[I64], I32),
            I32TruncF32S | I32TruncF32U | I32ReinterpretF32 | I32TruncSatF32S
            | I32TruncSatF32U => (&[F32], I32),
            I32TruncF64S | I32TruncF64U | I32TruncSatF64S | I32TruncSatF64U => (&[F64], I32),
            I64ExtendI32S | I64ExtendI32U => (&[I32], I64),
            I64TruncF32S | I64TruncF32U | I64TruncSatF32S | I64TruncSatF32U => (&[F32], I64),
            I64TruncF64S | I64TruncF64U | I64ReinterpretF64 | I64TruncSatF64S
            | I64TruncSatF64U => (&[F64], I64),
            F32ConvertI32S | F32ConvertI32U | F32ReinterpretI32 => (&[I32], F32),
            F32ConvertI64S | F32ConvertI64U => (&[I64], F32),
            F32DemoteF64 => (&[F64], F32),
            F64ConvertI32S | F64ConvertI32U => (&[I32], F64),
            F64ConvertI64S | F64ConvertI64U | F64ReinterpretI64 => (&[I64], F64),
            F64PromoteF32 => (&[F32], F64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table_boundaries() {
        assert_eq!(NumOp::from_opcode(0x44), None);
        assert_eq!(NumOp::from_opcode(0x45), Some(NumOp::I32Eqz));
        assert_eq!(NumOp::from_opcode(0x6A), Some(NumOp::I32Add));
        assert_eq!(NumOp::from_opcode(0x7C), Some(NumOp::I64Add));
        assert_eq!(NumOp::from_opcode(0x92), Some(NumOp::F32Add));
        assert_eq!(NumOp::from_opcode(0xA7), Some(NumOp::I32WrapI64));
        assert_eq!(NumOp::from_opcode(0xBF), Some(NumOp::F64ReinterpretI64));
        assert_eq!(NumOp::from_opcode(0xC4), Some(NumOp::I64Extend32S));
        assert_eq!(NumOp::from_opcode(0xC5), None);
    }

    #[test]
    fn test_saturating_table() {
        assert_eq!(NumOp::from_saturating(0), Some(NumOp::I32TruncSatF32S));
        assert_eq!(NumOp::from_saturating(7), Some(NumOp::I64TruncSatF64U));
        assert_eq!(NumOp::from_saturating(8), None);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(
            NumOp::I64Eqz.signature(),
            (&[ValueType::I64][..], ValueType::I32)
        );
        assert_eq!(
            NumOp::F64PromoteF32.signature(),
            (&[ValueType::F32][..], ValueType::F64)
        );
    }

    #[test]
    fn test_memory_widths() {
        assert_eq!(LoadKind::I64U32.width(), 4);
        assert_eq!(LoadKind::I64U32.result(), ValueType::I64);
        assert_eq!(StoreKind::I64As16.width(), 2);
        assert_eq!(StoreKind::F64.operand(), ValueType::F64);
    }
}
