//! Numeric operators.
//!
//! Integer arithmetic wraps, except that division and remainder by zero and
//! signed `MIN / -1` trap. Float-to-integer truncation traps on NaN and on
//! out-of-range input; the saturating variants clamp instead.

use super::corrupt;
use crate::instr::NumOp;
use tarn_core::{Error, Result, Status, Value};

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack.pop().ok_or_else(corrupt)
}

macro_rules! popper {
    ($name:ident, $variant:ident, $t:ty) => {
        fn $name(stack: &mut Vec<Value>) -> Result<$t> {
            match pop(stack)? {
                Value::$variant(v) => Ok(v),
                _ => Err(corrupt()),
            }
        }
    };
}

popper!(pop_i32, I32, i32);
popper!(pop_i64, I64, i64);
popper!(pop_f32, F32, f32);
popper!(pop_f64, F64, f64);

macro_rules! unop {
    ($stack:ident, $pop:ident, |$a:ident| $body:expr) => {{
        let $a = $pop($stack)?;
        $body
    }};
}

macro_rules! binop {
    ($stack:ident, $pop:ident, |$a:ident, $b:ident| $body:expr) => {{
        let $b = $pop($stack)?;
        let $a = $pop($stack)?;
        $body
    }};
}

const fn flag(b: bool) -> Value {
    Value::I32(b as i32)
}

fn divide_by_zero() -> Error {
    Error::trap(Status::TrapDivideByZero, "integer divide by zero")
}

fn integer_overflow() -> Error {
    Error::trap(Status::TrapIntegerOverflow, "integer overflow")
}

fn invalid_conversion() -> Error {
    Error::trap(
        Status::TrapInvalidIntegerConversion,
        "invalid conversion to integer",
    )
}

macro_rules! float_helpers {
    ($min:ident, $max:ident, $t:ty) => {
        #[allow(clippy::float_cmp)]
        fn $min(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                <$t>::NAN
            } else if a == b {
                // -0 orders below +0
                if a.is_sign_negative() { a } else { b }
            } else {
                a.min(b)
            }
        }

        #[allow(clippy::float_cmp)]
        fn $max(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                <$t>::NAN
            } else if a == b {
                if a.is_sign_positive() { a } else { b }
            } else {
                a.max(b)
            }
        }
    };
}

float_helpers!(fmin32, fmax32, f32);
float_helpers!(fmin64, fmax64, f64);

fn trunc_i32_s(x: f64) -> Result<i32> {
    if x.is_nan() {
        Err(invalid_conversion())
    } else if x > -2_147_483_649.0 && x < 2_147_483_648.0 {
        Ok(x.trunc() as i32)
    } else {
        Err(integer_overflow())
    }
}

fn trunc_i32_u(x: f64) -> Result<i32> {
    if x.is_nan() {
        Err(invalid_conversion())
    } else if x > -1.0 && x < 4_294_967_296.0 {
        Ok(x.trunc() as u32 as i32)
    } else {
        Err(integer_overflow())
    }
}

fn trunc_i64_s(x: f64) -> Result<i64> {
    if x.is_nan() {
        Err(invalid_conversion())
    } else if (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&x) {
        Ok(x.trunc() as i64)
    } else {
        Err(integer_overflow())
    }
}

fn trunc_i64_u(x: f64) -> Result<i64> {
    if x.is_nan() {
        Err(invalid_conversion())
    } else if x > -1.0 && x < 18_446_744_073_709_551_616.0 {
        Ok(x.trunc() as u64 as i64)
    } else {
        Err(integer_overflow())
    }
}

/// Applies `op` to the operands on top of `stack`.
#[allow(clippy::float_cmp)]
pub(super) fn eval(op: NumOp, stack: &mut Vec<Value>) -> Result<()> {
    let value = match op {
        NumOp::I32Eqz => unop!(stack, pop_i32, |a| flag(a == 0)),
        NumOp::I32Eq => binop!(stack, pop_i32, |a, b| flag(a == b)),
        NumOp::I32Ne => binop!(stack, pop_i32, |a, b| flag(a != b)),
        NumOp::I32LtS => binop!(stack, pop_i32, |a, b| flag(a < b)),
        NumOp::I32LtU => binop!(stack, pop_i32, |a, b| flag((a as u32) < (b as u32))),
        NumOp::I32GtS => binop!(stack, pop_i32, |a, b| flag(a > b)),
        NumOp::I32GtU => binop!(stack, pop_i32, |a, b| flag((a as u32) > (b as u32))),
        NumOp::I32LeS => binop!(stack, pop_i32, |a, b| flag(a <= b)),
        NumOp::I32LeU => binop!(stack, pop_i32, |a, b| flag((a as u32) <= (b as u32))),
        NumOp::I32GeS => binop!(stack, pop_i32, |a, b| flag(a >= b)),
        NumOp::I32GeU => binop!(stack, pop_i32, |a, b| flag((a as u32) >= (b as u32))),

        NumOp::I64Eqz => unop!(stack, pop_i64, |a| flag(a == 0)),
        NumOp::I64Eq => binop!(stack, pop_i64, |a, b| flag(a == b)),
        NumOp::I64Ne => binop!(stack, pop_i64, |a, b| flag(a != b)),
        NumOp::I64LtS => binop!(stack, pop_i64, |a, b| flag(a < b)),
        NumOp::I64LtU => binop!(stack, pop_i64, |a, b| flag((a as u64) < (b as u64))),
        NumOp::I64GtS => binop!(stack, pop_i64, |a, b| flag(a > b)),
        NumOp::I64GtU => binop!(stack, pop_i64, |a, b| flag((a as u64) > (b as u64))),
        NumOp::I64LeS => binop!(stack, pop_i64, |a, b| flag(a <= b)),
        NumOp::I64LeU => binop!(stack, pop_i64, |a, b| flag((a as u64) <= (b as u64))),
        NumOp::I64GeS => binop!(stack, pop_i64, |a, b| flag(a >= b)),
        NumOp::I64GeU => binop!(stack, pop_i64, |a, b| flag((a as u64) >= (b as u64))),

        NumOp::F32Eq => binop!(stack, pop_f32, |a, b| flag(a == b)),
        NumOp::F32Ne => binop!(stack, pop_f32, |a, b| flag(a != b)),
        NumOp::F32Lt => binop!(stack, pop_f32, |a, b| flag(a < b)),
        NumOp::F32Gt => binop!(stack, pop_f32, |a, b| flag(a > b)),
        NumOp::F32Le => binop!(stack, pop_f32, |a, b| flag(a <= b)),
        NumOp::F32Ge => binop!(stack, pop_f32, |a, b| flag(a >= b)),
        NumOp::F64Eq => binop!(stack, pop_f64, |a, b| flag(a == b)),
        NumOp::F64Ne => binop!(stack, pop_f64, |a, b| flag(a != b)),
        NumOp::F64Lt => binop!(stack, pop_f64, |a, b| flag(a < b)),
        NumOp::F64Gt => binop!(stack, pop_f64, |a, b| flag(a > b)),
        NumOp::F64Le => binop!(stack, pop_f64, |a, b| flag(a <= b)),
        NumOp::F64Ge => binop!(stack, pop_f64, |a, b| flag(a >= b)),

        NumOp::I32Clz => unop!(stack, pop_i32, |a| Value::I32(a.leading_zeros() as i32)),
        NumOp::I32Ctz => unop!(stack, pop_i32, |a| Value::I32(a.trailing_zeros() as i32)),
        NumOp::I32Popcnt => unop!(stack, pop_i32, |a| Value::I32(a.count_ones() as i32)),
        NumOp::I32Add => binop!(stack, pop_i32, |a, b| Value::I32(a.wrapping_add(b))),
        NumOp::I32Sub => binop!(stack, pop_i32, |a, b| Value::I32(a.wrapping_sub(b))),
        NumOp::I32Mul => binop!(stack, pop_i32, |a, b| Value::I32(a.wrapping_mul(b))),
        NumOp::I32DivS => binop!(stack, pop_i32, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I32(a.checked_div(b).ok_or_else(integer_overflow)?)
        }),
        NumOp::I32DivU => binop!(stack, pop_i32, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I32(((a as u32) / (b as u32)) as i32)
        }),
        NumOp::I32RemS => binop!(stack, pop_i32, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I32(a.wrapping_rem(b))
        }),
        NumOp::I32RemU => binop!(stack, pop_i32, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I32(((a as u32) % (b as u32)) as i32)
        }),
        NumOp::I32And => binop!(stack, pop_i32, |a, b| Value::I32(a & b)),
        NumOp::I32Or => binop!(stack, pop_i32, |a, b| Value::I32(a | b)),
        NumOp::I32Xor => binop!(stack, pop_i32, |a, b| Value::I32(a ^ b)),
        NumOp::I32Shl => binop!(stack, pop_i32, |a, b| Value::I32(a.wrapping_shl(b as u32))),
        NumOp::I32ShrS => binop!(stack, pop_i32, |a, b| Value::I32(a.wrapping_shr(b as u32))),
        NumOp::I32ShrU => binop!(stack, pop_i32, |a, b| {
            Value::I32((a as u32).wrapping_shr(b as u32) as i32)
        }),
        NumOp::I32Rotl => binop!(stack, pop_i32, |a, b| Value::I32(a.rotate_left(b as u32 % 32))),
        NumOp::I32Rotr => binop!(stack, pop_i32, |a, b| Value::I32(a.rotate_right(b as u32 % 32))),

        NumOp::I64Clz => unop!(stack, pop_i64, |a| Value::I64(i64::from(a.leading_zeros()))),
        NumOp::I64Ctz => unop!(stack, pop_i64, |a| Value::I64(i64::from(a.trailing_zeros()))),
        NumOp::I64Popcnt => unop!(stack, pop_i64, |a| Value::I64(i64::from(a.count_ones()))),
        NumOp::I64Add => binop!(stack, pop_i64, |a, b| Value::I64(a.wrapping_add(b))),
        NumOp::I64Sub => binop!(stack, pop_i64, |a, b| Value::I64(a.wrapping_sub(b))),
        NumOp::I64Mul => binop!(stack, pop_i64, |a, b| Value::I64(a.wrapping_mul(b))),
        NumOp::I64DivS => binop!(stack, pop_i64, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I64(a.checked_div(b).ok_or_else(integer_overflow)?)
        }),
        NumOp::I64DivU => binop!(stack, pop_i64, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I64(((a as u64) / (b as u64)) as i64)
        }),
        NumOp::I64RemS => binop!(stack, pop_i64, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I64(a.wrapping_rem(b))
        }),
        NumOp::I64RemU => binop!(stack, pop_i64, |a, b| {
            if b == 0 {
                return Err(divide_by_zero());
            }
            Value::I64(((a as u64) % (b as u64)) as i64)
        }),
        NumOp::I64And => binop!(stack, pop_i64, |a, b| Value::I64(a & b)),
        NumOp::I64Or => binop!(stack, pop_i64, |a, b| Value::I64(a | b)),
        NumOp::I64Xor => binop!(stack, pop_i64, |a, b| Value::I64(a ^ b)),
        NumOp::I64Shl => binop!(stack, pop_i64, |a, b| Value::I64(a.wrapping_shl(b as u32))),
        NumOp::I64ShrS => binop!(stack, pop_i64, |a, b| Value::I64(a.wrapping_shr(b as u32))),
        NumOp::I64ShrU => binop!(stack, pop_i64, |a, b| {
            Value::I64((a as u64).wrapping_shr(b as u32) as i64)
        }),
        NumOp::I64Rotl => binop!(stack, pop_i64, |a, b| {
            Value::I64(a.rotate_left((b as u64 % 64) as u32))
        }),
        NumOp::I64Rotr => binop!(stack, pop_i64, |a, b| {
            Value::I64(a.rotate_right((b as u64 % 64) as u32))
        }),

        NumOp::F32Abs => unop!(stack, pop_f32, |a| Value::F32(a.abs())),
        NumOp::F32Neg => unop!(stack, pop_f32, |a| Value::F32(-a)),
        NumOp::F32Ceil => unop!(stack, pop_f32, |a| Value::F32(a.ceil())),
        NumOp::F32Floor => unop!(stack, pop_f32, |a| Value::F32(a.floor())),
        NumOp::F32Trunc => unop!(stack, pop_f32, |a| Value::F32(a.trunc())),
        NumOp::F32Nearest => unop!(stack, pop_f32, |a| Value::F32(a.round_ties_even())),
        NumOp::F32Sqrt => unop!(stack, pop_f32, |a| Value::F32(a.sqrt())),
        NumOp::F32Add => binop!(stack, pop_f32, |a, b| Value::F32(a + b)),
        NumOp::F32Sub => binop!(stack, pop_f32, |a, b| Value::F32(a - b)),
        NumOp::F32Mul => binop!(stack, pop_f32, |a, b| Value::F32(a * b)),
        NumOp::F32Div => binop!(stack, pop_f32, |a, b| Value::F32(a / b)),
        NumOp::F32Min => binop!(stack, pop_f32, |a, b| Value::F32(fmin32(a, b))),
        NumOp::F32Max => binop!(stack, pop_f32, |a, b| Value::F32(fmax32(a, b))),
        NumOp::F32Copysign => binop!(stack, pop_f32, |a, b| Value::F32(a.copysign(b))),

        NumOp::F64Abs => unop!(stack, pop_f64, |a| Value::F64(a.abs())),
        NumOp::F64Neg => unop!(stack, pop_f64, |a| Value::F64(-a)),
        NumOp::F64Ceil => unop!(stack, pop_f64, |a| Value::F64(a.ceil())),
        NumOp::F64Floor => unop!(stack, pop_f64, |a| Value::F64(a.floor())),
        NumOp::F64Trunc => unop!(stack, pop_f64, |a| Value::F64(a.trunc())),
        NumOp::F64Nearest => unop!(stack, pop_f64, |a| Value::F64(a.round_ties_even())),
        NumOp::F64Sqrt => unop!(stack, pop_f64, |a| Value::F64(a.sqrt())),
        NumOp::F64Add => binop!(stack, pop_f64, |a, b| Value::F64(a + b)),
        NumOp::F64Sub => binop!(stack, pop_f64, |a, b| Value::F64(a - b)),
        NumOp::F64Mul => binop!(stack, pop_f64, |a, b| Value::F64(a * b)),
        NumOp::F64Div => binop!(stack, pop_f64, |a, b| Value::F64(a / b)),
        NumOp::F64Min => binop!(stack, pop_f64, |a, b| Value::F64(fmin64(a, b))),
        NumOp::F64Max => binop!(stack, pop_f64, |a, b| Value::F64(fmax64(a, b))),
        NumOp::F64Copysign => binop!(stack, pop_f64, |a, b| Value::F64(a.copysign(b))),

        NumOp::I32WrapI64 => unop!(stack, pop_i64, |a| Value::I32(a as i32)),
        NumOp::I32TruncF32S => unop!(stack, pop_f32, |a| Value::I32(trunc_i32_s(f64::from(a))?)),
        NumOp::I32TruncF32U => unop!(stack, pop_f32, |a| Value::I32(trunc_i32_u(f64::from(a))?)),
        NumOp::I32TruncF64S => unop!(stack, pop_f64, |a| Value::I32(trunc_i32_s(a)?)),
        NumOp::I32TruncF64U => unop!(stack, pop_f64, |a| Value::I32(trunc_i32_u(a)?)),
        NumOp::I64ExtendI32S => unop!(stack, pop_i32, |a| Value::I64(i64::from(a))),
        NumOp::I64ExtendI32U => unop!(stack, pop_i32, |a| Value::I64(i64::from(a as u32))),
        NumOp::I64TruncF32S => unop!(stack, pop_f32, |a| Value::I64(trunc_i64_s(f64::from(a))?)),
        NumOp::I64TruncF32U => unop!(stack, pop_f32, |a| Value::I64(trunc_i64_u(f64::from(a))?)),
        NumOp::I64TruncF64S => unop!(stack, pop_f64, |a| Value::I64(trunc_i64_s(a)?)),
        NumOp::I64TruncF64U => unop!(stack, pop_f64, |a| Value::I64(trunc_i64_u(a)?)),
        NumOp::F32ConvertI32S => unop!(stack, pop_i32, |a| Value::F32(a as f32)),
        NumOp::F32ConvertI32U => unop!(stack, pop_i32, |a| Value::F32(a as u32 as f32)),
        NumOp::F32ConvertI64S => unop!(stack, pop_i64, |a| Value::F32(a as f32)),
        NumOp::F32ConvertI64U => unop!(stack, pop_i64, |a| Value::F32(a as u64 as f32)),
        NumOp::F32DemoteF64 => unop!(stack, pop_f64, |a| Value::F32(a as f32)),
        NumOp::F64ConvertI32S => unop!(stack, pop_i32, |a| Value::F64(f64::from(a))),
        NumOp::F64ConvertI32U => unop!(stack, pop_i32, |a| Value::F64(f64::from(a as u32))),
        NumOp::F64ConvertI64S => unop!(stack, pop_i64, |a| Value::F64(a as f64)),
        NumOp::F64ConvertI64U => unop!(stack, pop_i64, |a| Value::F64(a as u64 as f64)),
        NumOp::F64PromoteF32 => unop!(stack, pop_f32, |a| Value::F64(f64::from(a))),
        NumOp::I32ReinterpretF32 => unop!(stack, pop_f32, |a| Value::I32(a.to_bits() as i32)),
        NumOp::I64ReinterpretF64 => unop!(stack, pop_f64, |a| Value::I64(a.to_bits() as i64)),
        NumOp::F32ReinterpretI32 => unop!(stack, pop_i32, |a| Value::F32(f32::from_bits(a as u32))),
        NumOp::F64ReinterpretI64 => unop!(stack, pop_i64, |a| Value::F64(f64::from_bits(a as u64))),
        NumOp::I32Extend8S => unop!(stack, pop_i32, |a| Value::I32(i32::from(a as i8))),
        NumOp::I32Extend16S => unop!(stack, pop_i32, |a| Value::I32(i32::from(a as i16))),
        NumOp::I64Extend8S => unop!(stack, pop_i64, |a| Value::I64(i64::from(a as i8))),
        NumOp::I64Extend16S => unop!(stack, pop_i64, |a| Value::I64(i64::from(a as i16))),
        NumOp::I64Extend32S => unop!(stack, pop_i64, |a| Value::I64(i64::from(a as i32))),

        NumOp::I32TruncSatF32S => unop!(stack, pop_f32, |a| Value::I32(a as i32)),
        NumOp::I32TruncSatF32U => unop!(stack, pop_f32, |a| Value::I32(a as u32 as i32)),
        NumOp::I32TruncSatF64S => unop!(stack, pop_f64, |a| Value::I32(a as i32)),
        NumOp::I32TruncSatF64U => unop!(stack, pop_f64, |a| Value::I32(a as u32 as i32)),
        NumOp::I64TruncSatF32S => unop!(stack, pop_f32, |a| Value::I64(a as i64)),
        NumOp::I64TruncSatF32U => unop!(stack, pop_f32, |a| Value::I64(a as u64 as i64)),
        NumOp::I64TruncSatF64S => unop!(stack, pop_f64, |a| Value::I64(a as i64)),
        NumOp::I64TruncSatF64U => unop!(stack, pop_f64, |a| Value::I64(a as u64 as i64)),
    };
    stack.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: NumOp, args: &[Value]) -> Result<Value> {
        let mut stack = args.to_vec();
        eval(op, &mut stack)?;
        assert_eq!(stack.len(), 1);
        Ok(stack[0])
    }

    #[test]
    fn test_add_wraps() {
        assert_eq!(
            run(NumOp::I32Add, &[Value::I32(i32::MAX), Value::I32(1)]).unwrap(),
            Value::I32(i32::MIN)
        );
    }

    #[test]
    fn test_division_traps() {
        let err = run(NumOp::I32DivS, &[Value::I32(10), Value::I32(0)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapDivideByZero);
        let err = run(NumOp::I32DivS, &[Value::I32(i32::MIN), Value::I32(-1)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapIntegerOverflow);
        let err = run(NumOp::I64RemU, &[Value::I64(1), Value::I64(0)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapDivideByZero);
    }

    #[test]
    fn test_rem_s_min_by_minus_one_is_zero() {
        assert_eq!(
            run(NumOp::I32RemS, &[Value::I32(i32::MIN), Value::I32(-1)]).unwrap(),
            Value::I32(0)
        );
    }

    #[test]
    fn test_unsigned_ops() {
        assert_eq!(
            run(NumOp::I32DivU, &[Value::I32(-1), Value::I32(2)]).unwrap(),
            Value::I32(i32::MAX)
        );
        assert_eq!(
            run(NumOp::I32LtU, &[Value::I32(1), Value::I32(-1)]).unwrap(),
            Value::I32(1)
        );
        assert_eq!(
            run(NumOp::I32ShrU, &[Value::I32(-1), Value::I32(28)]).unwrap(),
            Value::I32(0xF)
        );
    }

    #[test]
    fn test_shift_count_is_masked() {
        assert_eq!(
            run(NumOp::I32Shl, &[Value::I32(1), Value::I32(33)]).unwrap(),
            Value::I32(2)
        );
        assert_eq!(
            run(NumOp::I64Rotl, &[Value::I64(1), Value::I64(65)]).unwrap(),
            Value::I64(2)
        );
    }

    #[test]
    fn test_trapping_truncation() {
        let err = run(NumOp::I32TruncF32S, &[Value::F32(f32::NAN)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapInvalidIntegerConversion);
        let err = run(NumOp::I32TruncF64S, &[Value::F64(2_147_483_648.0)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapIntegerOverflow);
        assert_eq!(
            run(NumOp::I32TruncF64S, &[Value::F64(-2_147_483_648.9)]).unwrap(),
            Value::I32(i32::MIN)
        );
        assert_eq!(
            run(NumOp::I32TruncF64U, &[Value::F64(-0.9)]).unwrap(),
            Value::I32(0)
        );
        let err = run(NumOp::I64TruncF64U, &[Value::F64(-1.0)]).unwrap_err();
        assert_eq!(err.status(), Status::TrapIntegerOverflow);
    }

    #[test]
    fn test_saturating_truncation() {
        assert_eq!(
            run(NumOp::I32TruncSatF32S, &[Value::F32(f32::NAN)]).unwrap(),
            Value::I32(0)
        );
        assert_eq!(
            run(NumOp::I32TruncSatF64U, &[Value::F64(1e20)]).unwrap(),
            Value::I32(-1)
        );
        assert_eq!(
            run(NumOp::I64TruncSatF64S, &[Value::F64(f64::NEG_INFINITY)]).unwrap(),
            Value::I64(i64::MIN)
        );
    }

    #[test]
    fn test_min_max_signed_zero_and_nan() {
        let min = run(NumOp::F64Min, &[Value::F64(0.0), Value::F64(-0.0)]).unwrap();
        assert!(min.as_f64().unwrap().is_sign_negative());
        let max = run(NumOp::F32Max, &[Value::F32(-0.0), Value::F32(0.0)]).unwrap();
        assert!(max.as_f32().unwrap().is_sign_positive());
        let nan = run(NumOp::F32Min, &[Value::F32(f32::NAN), Value::F32(1.0)]).unwrap();
        assert!(nan.as_f32().unwrap().is_nan());
    }

    #[test]
    fn test_nearest_ties_to_even() {
        assert_eq!(
            run(NumOp::F64Nearest, &[Value::F64(2.5)]).unwrap(),
            Value::F64(2.0)
        );
        assert_eq!(
            run(NumOp::F32Nearest, &[Value::F32(-3.5)]).unwrap(),
            Value::F32(-4.0)
        );
    }

    #[test]
    fn test_sign_extension() {
        assert_eq!(
            run(NumOp::I32Extend8S, &[Value::I32(0x80)]).unwrap(),
            Value::I32(-128)
        );
        assert_eq!(
            run(NumOp::I64ExtendI32U, &[Value::I32(-1)]).unwrap(),
            Value::I64(0xFFFF_FFFF)
        );
    }

    #[test]
    fn test_reinterpret() {
        assert_eq!(
            run(NumOp::I32ReinterpretF32, &[Value::F32(1.0)]).unwrap(),
            Value::I32(0x3F80_0000)
        );
    }
}
