//! Value model shared by the decoder, the interpreter, and every backend.
//!
//! Values are tagged: a [`Value`] always knows its [`ValueType`], and nothing
//! in the engine converts between numeric kinds implicitly. Reference values
//! carry the identity of the instance that owns the referenced function, so a
//! reference stays meaningful after it crosses an instance boundary through a
//! shared table.
//!
//! # Examples
//!
//! ```
//! use tarn_core::{Limits, Value, ValueType, limits_compatible};
//!
//! assert_eq!(Value::F64(1.5).value_type(), ValueType::F64);
//! assert!(Value::I64(3).as_i32().is_none());
//!
//! let provided = Limits::new(2, Some(4));
//! let required = Limits::new(1, Some(8));
//! assert!(limits_compatible(&provided, &required));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one linear-memory page in bytes.
pub const PAGE_SIZE: u32 = 65_536;

/// Largest page count a 32-bit linear memory can describe.
pub const MAX_PAGES: u32 = 65_536;

/// Identity of an instance inside a store.
///
/// Instance identities are never reused within one store, so a reference
/// value built from one instance can never alias a later instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates an instance identity from its raw store index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw store index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw identity value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Kind tag of a WebAssembly value.
///
/// # Examples
///
/// ```
/// use tarn_core::ValueType;
///
/// assert_eq!(ValueType::from_byte(0x7F), Some(ValueType::I32));
/// assert_eq!(ValueType::from_tag('d'), Some(ValueType::F64));
/// assert!(ValueType::FuncRef.is_ref());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit IEEE-754 float.
    F32,
    /// 64-bit IEEE-754 float.
    F64,
    /// Nullable reference to a function.
    FuncRef,
    /// Nullable opaque host reference.
    ExternRef,
}

impl ValueType {
    /// Decodes a value type from its binary encoding.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x7F => Some(Self::I32),
            0x7E => Some(Self::I64),
            0x7D => Some(Self::F32),
            0x7C => Some(Self::F64),
            0x70 => Some(Self::FuncRef),
            0x6F => Some(Self::ExternRef),
            _ => None,
        }
    }

    /// Returns the binary encoding of this type.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::I32 => 0x7F,
            Self::I64 => 0x7E,
            Self::F32 => 0x7D,
            Self::F64 => 0x7C,
            Self::FuncRef => 0x70,
            Self::ExternRef => 0x6F,
        }
    }

    /// Parses a host signature tag.
    ///
    /// Tags are `i` (i32), `I` (i64), `f` (f32), and `d` (f64).
    #[must_use]
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'i' => Some(Self::I32),
            'I' => Some(Self::I64),
            'f' => Some(Self::F32),
            'd' => Some(Self::F64),
            _ => None,
        }
    }

    /// Returns the host signature tag for numeric types.
    #[must_use]
    pub const fn tag(self) -> Option<char> {
        match self {
            Self::I32 => Some('i'),
            Self::I64 => Some('I'),
            Self::F32 => Some('f'),
            Self::F64 => Some('d'),
            Self::FuncRef | Self::ExternRef => None,
        }
    }

    /// Returns `true` for the four numeric types.
    #[must_use]
    pub const fn is_num(self) -> bool {
        !self.is_ref()
    }

    /// Returns `true` for reference types.
    #[must_use]
    pub const fn is_ref(self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }

    /// Returns the zero value of this type (null for references).
    #[must_use]
    pub const fn default_value(self) -> Value {
        match self {
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
            Self::FuncRef => Value::FuncRef(None),
            Self::ExternRef => Value::ExternRef(None),
        }
    }

    /// Returns the text-format name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::FuncRef => "funcref",
            Self::ExternRef => "externref",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a function owned by a specific instance.
///
/// `index` lives in the owning instance's function index space, imports
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncRef {
    /// Instance whose function index space `index` refers to.
    pub instance: InstanceId,
    /// Function index within that instance.
    pub index: u32,
}

impl FuncRef {
    /// Creates a function reference.
    #[must_use]
    pub const fn new(instance: InstanceId, index: u32) -> Self {
        Self { instance, index }
    }
}

/// A tagged WebAssembly value.
///
/// Accessors never coerce: [`Value::as_i32`] on an `I64` returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Function reference, `None` is null.
    FuncRef(Option<FuncRef>),
    /// Host reference, `None` is null.
    ExternRef(Option<u32>),
}

impl Value {
    /// Returns the kind tag of this value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::FuncRef(_) => ValueType::FuncRef,
            Self::ExternRef(_) => ValueType::ExternRef,
        }
    }

    /// Returns the payload of an `I32` value.
    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload of an `I64` value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload of an `F32` value.
    #[must_use]
    pub const fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload of an `F64` value.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the payload of a `FuncRef` value.
    #[must_use]
    pub const fn as_func_ref(&self) -> Option<Option<FuncRef>> {
        match self {
            Self::FuncRef(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns `true` for a null reference of either reference type.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::FuncRef(None) | Self::ExternRef(None))
    }

    /// Compares two values bit-for-bit, so NaN payloads compare equal to themselves.
    #[must_use]
    pub fn bits_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}:i32"),
            Self::I64(v) => write!(f, "{v}:i64"),
            Self::F32(v) => write!(f, "{v}:f32"),
            Self::F64(v) => write!(f, "{v}:f64"),
            Self::FuncRef(None) | Self::ExternRef(None) => f.write_str("null"),
            Self::FuncRef(Some(r)) => write!(f, "func {} of {}", r.index, r.instance),
            Self::ExternRef(Some(r)) => write!(f, "extern {r}"),
        }
    }
}

/// Function signature: ordered parameter and result kinds.
///
/// Two function types are equal only if both sequences match exactly.
///
/// # Examples
///
/// ```
/// use tarn_core::{FuncType, ValueType};
///
/// let ty = FuncType::new([ValueType::I32, ValueType::I64], [ValueType::F32]);
/// assert_eq!(ty.to_string(), "(i32 i64) -> (f32)");
/// assert_eq!(ty, FuncType::from_tags("f", "iI").unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FuncType {
    params: Vec<ValueType>,
    results: Vec<ValueType>,
}

impl FuncType {
    /// Creates a function type from parameter and result kinds.
    pub fn new(
        params: impl IntoIterator<Item = ValueType>,
        results: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// Builds a function type from host signature tag strings.
    ///
    /// `returns` comes first to match the way host export tables are
    /// written, e.g. `("i", "ii")` for `(i32, i32) -> i32`. `v` marks an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`](crate::Error::InvalidArgs) for an unknown tag.
    pub fn from_tags(returns: &str, params: &str) -> crate::Result<Self> {
        let parse = |tags: &str| {
            tags.chars()
                .filter(|c| *c != 'v')
                .map(|c| {
                    ValueType::from_tag(c).ok_or_else(|| crate::Error::InvalidArgs {
                        message: format!("unknown signature tag '{c}' in \"{tags}\""),
                    })
                })
                .collect::<crate::Result<Vec<_>>>()
        };
        Ok(Self {
            params: parse(params)?,
            results: parse(returns)?,
        })
    }

    /// Parameter kinds in order.
    #[must_use]
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Result kinds in order.
    #[must_use]
    pub fn results(&self) -> &[ValueType] {
        &self.results
    }

    /// Returns `true` if `args` has exactly the parameter kinds of this type.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.params.len()
            && args
                .iter()
                .zip(&self.params)
                .all(|(v, t)| v.value_type() == *t)
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValueType]| {
            types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}

/// Whether a limits record carries an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitsKind {
    /// Only a minimum is declared.
    MinOnly,
    /// Both minimum and maximum are declared.
    MinMax,
}

/// Size bounds of a table or linear memory.
///
/// For memories the unit is pages, for tables it is elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limits {
    /// Minimum (current) size.
    pub min: u32,
    /// Optional maximum size.
    pub max: Option<u32>,
}

impl Limits {
    /// Creates a limits record.
    #[must_use]
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Returns whether a maximum is declared.
    #[must_use]
    pub const fn kind(&self) -> LimitsKind {
        if self.max.is_some() {
            LimitsKind::MinMax
        } else {
            LimitsKind::MinOnly
        }
    }

    /// Returns `true` if `min <= max` whenever a maximum is present.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        match self.max {
            Some(max) => self.min <= max,
            None => true,
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{max}", self.min),
            None => write!(f, "{}..", self.min),
        }
    }
}

/// Checks whether an object with limits `candidate` may satisfy an import
/// declaring `required`.
///
/// The candidate must be at least as large as required, and when the import
/// declares a maximum the candidate must declare one no larger.
///
/// # Examples
///
/// ```
/// use tarn_core::{Limits, limits_compatible};
///
/// assert!(limits_compatible(&Limits::new(3, None), &Limits::new(1, None)));
/// assert!(!limits_compatible(&Limits::new(3, None), &Limits::new(1, Some(5))));
/// assert!(!limits_compatible(&Limits::new(1, Some(9)), &Limits::new(1, Some(5))));
/// ```
#[must_use]
pub const fn limits_compatible(candidate: &Limits, required: &Limits) -> bool {
    if candidate.min < required.min {
        return false;
    }
    match (required.max, candidate.max) {
        (None, _) => true,
        (Some(required_max), Some(candidate_max)) => candidate_max <= required_max,
        (Some(_), None) => false,
    }
}

/// Type of a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalType {
    /// Kind of the stored value.
    pub value_type: ValueType,
    /// Whether `global.set` may target it.
    pub mutable: bool,
}

impl GlobalType {
    /// Creates a global type.
    #[must_use]
    pub const fn new(value_type: ValueType, mutable: bool) -> Self {
        Self {
            value_type,
            mutable,
        }
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "(mut {})", self.value_type)
        } else {
            write!(f, "{}", self.value_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_byte_roundtrip() {
        for ty in [
            ValueType::I32,
            ValueType::I64,
            ValueType::F32,
            ValueType::F64,
            ValueType::FuncRef,
            ValueType::ExternRef,
        ] {
            assert_eq!(ValueType::from_byte(ty.to_byte()), Some(ty));
        }
        assert_eq!(ValueType::from_byte(0x7B), None);
    }

    #[test]
    fn test_value_accessors_do_not_coerce() {
        let v = Value::I32(5);
        assert_eq!(v.as_i32(), Some(5));
        assert_eq!(v.as_i64(), None);
        assert_eq!(v.as_f32(), None);
        assert_eq!(Value::F64(2.0).as_f32(), None);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(ValueType::I64.default_value(), Value::I64(0));
        assert!(ValueType::FuncRef.default_value().is_null());
        assert!(ValueType::ExternRef.default_value().is_null());
    }

    #[test]
    fn test_bits_eq_nan() {
        let nan = Value::F32(f32::NAN);
        assert_ne!(nan, nan);
        assert!(nan.bits_eq(&nan));
    }

    #[test]
    fn test_from_tags() {
        let ty = FuncType::from_tags("i", "iI").unwrap();
        assert_eq!(ty.params(), &[ValueType::I32, ValueType::I64]);
        assert_eq!(ty.results(), &[ValueType::I32]);

        let void = FuncType::from_tags("", "").unwrap();
        assert!(void.params().is_empty());
        assert!(void.results().is_empty());

        assert!(FuncType::from_tags("x", "").is_err());
    }

    #[test]
    fn test_func_type_equality_is_exact() {
        let a = FuncType::new([ValueType::I32], [ValueType::I32]);
        let b = FuncType::new([ValueType::I32], [ValueType::I64]);
        let c = FuncType::new([ValueType::I32, ValueType::I32], [ValueType::I32]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, FuncType::from_tags("i", "i").unwrap());
    }

    #[test]
    fn test_accepts() {
        let ty = FuncType::new([ValueType::I32, ValueType::F64], []);
        assert!(ty.accepts(&[Value::I32(1), Value::F64(1.0)]));
        assert!(!ty.accepts(&[Value::I32(1)]));
        assert!(!ty.accepts(&[Value::I32(1), Value::F32(1.0)]));
    }

    #[test]
    fn test_limits_compatible_table() {
        // (candidate, required, expected)
        let cases = [
            (Limits::new(1, None), Limits::new(1, None), true),
            (Limits::new(0, None), Limits::new(1, None), false),
            (Limits::new(2, Some(2)), Limits::new(1, None), true),
            (Limits::new(2, None), Limits::new(1, Some(4)), false),
            (Limits::new(2, Some(4)), Limits::new(1, Some(4)), true),
            (Limits::new(2, Some(5)), Limits::new(1, Some(4)), false),
            (Limits::new(1, Some(3)), Limits::new(2, Some(4)), false),
            (Limits::new(4, Some(4)), Limits::new(4, Some(4)), true),
        ];
        for (candidate, required, expected) in cases {
            assert_eq!(
                limits_compatible(&candidate, &required),
                expected,
                "candidate {candidate}, required {required}"
            );
        }
    }

    #[test]
    fn test_limits_kind() {
        assert_eq!(Limits::new(1, None).kind(), LimitsKind::MinOnly);
        assert_eq!(Limits::new(1, Some(2)).kind(), LimitsKind::MinMax);
        assert!(!Limits::new(3, Some(2)).is_well_formed());
    }

    #[test]
    fn test_value_serde() {
        let json = serde_json::to_string(&Value::I32(42)).unwrap();
        assert_eq!(json, r#"{"type":"i32","value":42}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::I32(42));
    }
}
