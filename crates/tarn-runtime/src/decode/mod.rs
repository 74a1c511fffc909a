//! Binary module decoder.
//!
//! Decodes the standard binary format section by section into a [`Module`],
//! validating every index, limit and constant expression on the way. Function
//! bodies are handed to the body validator, which lowers them to the
//! interpreter's instruction stream.

mod reader;
mod validate;

use crate::module::{
    ConstExpr, ConstOp, DataMode, DataSegment, ElementMode, ElementSegment, Export, ExternKind,
    Import, ImportDesc, Module, TableType,
};
use reader::Reader;
use std::collections::HashSet;
use tarn_core::{Error, FuncType, GlobalType, Limits, MAX_PAGES, Result, Status, ValueType};

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: &[u8; 4] = &[0x01, 0x00, 0x00, 0x00];

/// Largest parameter list accepted in a function type.
pub const MAX_PARAMS: usize = 1000;
/// Largest result list accepted in a function type.
pub const MAX_RESULTS: usize = 1000;

const SECTION_CUSTOM: u8 = 0;
const SECTION_TYPE: u8 = 1;
const SECTION_IMPORT: u8 = 2;
const SECTION_FUNCTION: u8 = 3;
const SECTION_TABLE: u8 = 4;
const SECTION_MEMORY: u8 = 5;
const SECTION_GLOBAL: u8 = 6;
const SECTION_EXPORT: u8 = 7;
const SECTION_START: u8 = 8;
const SECTION_ELEMENT: u8 = 9;
const SECTION_CODE: u8 = 10;
const SECTION_DATA: u8 = 11;
const SECTION_DATA_COUNT: u8 = 12;

/// Position of a known section in the required order.
const fn section_rank(id: u8) -> Option<u8> {
    match id {
        SECTION_TYPE..=SECTION_ELEMENT => Some(id),
        SECTION_DATA_COUNT => Some(10),
        SECTION_CODE => Some(11),
        SECTION_DATA => Some(12),
        _ => None,
    }
}

/// Decodes and validates a binary module.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed input and [`Error::Validation`]
/// for a well-formed module that fails validation. No code runs.
///
/// # Examples
///
/// ```
/// let bytes = wat::parse_str(r#"(module (func (export "f") (result i32) i32.const 7))"#).unwrap();
/// let module = tarn_runtime::decode(&bytes).unwrap();
/// assert_eq!(module.function_count(), 1);
/// assert!(module.export("f").is_some());
/// ```
pub fn decode(bytes: &[u8]) -> Result<Module> {
    let mut reader = Reader::new(bytes);
    if reader.read_bytes(4).ok() != Some(MAGIC.as_slice()) {
        return Err(Error::Parse {
            offset: 0,
            message: "missing magic header".to_string(),
        });
    }
    if reader.read_bytes(4).ok() != Some(VERSION.as_slice()) {
        return Err(Error::Parse {
            offset: 4,
            message: "unsupported binary version".to_string(),
        });
    }

    let mut module = Module::default();
    let mut last_rank = 0;
    let mut declared_bodies: u32 = 0;
    let mut code_seen = false;

    while !reader.is_empty() {
        let id_offset = reader.offset();
        let id = reader.read_u8()?;
        let size = reader.read_u32()? as usize;
        let mut section = reader.sub_reader(size)?;

        if id == SECTION_CUSTOM {
            decode_custom(&mut module, &mut section);
            continue;
        }

        let rank = section_rank(id).ok_or_else(|| Error::Parse {
            offset: id_offset,
            message: format!("unknown section id {id}"),
        })?;
        if rank <= last_rank {
            return Err(Error::Parse {
                offset: id_offset,
                message: format!("section {id} is out of order or repeated"),
            });
        }
        last_rank = rank;

        match id {
            SECTION_TYPE => decode_types(&mut module, &mut section)?,
            SECTION_IMPORT => decode_imports(&mut module, &mut section)?,
            SECTION_FUNCTION => declared_bodies = decode_functions(&mut module, &mut section)?,
            SECTION_TABLE => decode_tables(&mut module, &mut section)?,
            SECTION_MEMORY => decode_memories(&mut module, &mut section)?,
            SECTION_GLOBAL => decode_globals(&mut module, &mut section)?,
            SECTION_EXPORT => decode_exports(&mut module, &mut section)?,
            SECTION_START => {
                let index = section.read_u32()?;
                if index >= module.function_count() {
                    return Err(section.validation_error(
                        Status::ValidationInvalidFunction,
                        format!("unknown start function {index}"),
                    ));
                }
                module.start = Some(index);
            }
            SECTION_ELEMENT => decode_elements(&mut module, &mut section)?,
            SECTION_DATA_COUNT => module.data_count = Some(section.read_u32()?),
            SECTION_CODE => {
                code_seen = true;
                decode_code(&mut module, &mut section, declared_bodies)?;
            }
            _ => decode_data(&mut module, &mut section)?,
        }

        if !section.is_empty() {
            return Err(section.parse_error(format!("section {id} size mismatch")));
        }
    }

    if declared_bodies > 0 && !code_seen {
        return Err(reader.parse_error("function and code section have inconsistent lengths"));
    }
    if let Some(count) = module.data_count
        && count as usize != module.data.len()
    {
        return Err(reader.parse_error("data count and data section have inconsistent lengths"));
    }

    tracing::debug!(
        types = module.types.len(),
        functions = module.functions.len(),
        imports = module.imports.len(),
        exports = module.exports.len(),
        "decoded module"
    );
    Ok(module)
}

impl Module {
    /// Decodes and validates a binary module.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

fn decode_custom(module: &mut Module, section: &mut Reader<'_>) {
    let Ok(name) = section.read_name() else {
        tracing::debug!("ignoring custom section with a malformed name");
        return;
    };
    if name == "name"
        && let Err(error) = decode_names(module, section)
    {
        tracing::debug!(%error, "ignoring malformed name section");
    }
}

fn decode_names(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    while !section.is_empty() {
        let id = section.read_u8()?;
        let size = section.read_u32()? as usize;
        let mut sub = section.sub_reader(size)?;
        match id {
            0 => module.module_name = Some(sub.read_name()?),
            1 => {
                let count = sub.read_len()?;
                for _ in 0..count {
                    let index = sub.read_u32()?;
                    let name = sub.read_name()?;
                    module.function_names.insert(index, name);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn decode_types(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let form = section.read_u8()?;
        if form != 0x60 {
            return Err(section.parse_error(format!("unsupported type form 0x{form:02x}")));
        }
        let params = read_value_types(section, MAX_PARAMS, "parameters")?;
        let results = read_value_types(section, MAX_RESULTS, "results")?;
        module.types.push(FuncType::new(params, results));
    }
    Ok(())
}

fn read_value_types(section: &mut Reader<'_>, max: usize, what: &str) -> Result<Vec<ValueType>> {
    let count = section.read_len()?;
    if count > max {
        return Err(section.parse_error(format!("too many {what}: {count}")));
    }
    (0..count).map(|_| section.read_value_type()).collect()
}

fn check_type_index(module: &Module, section: &Reader<'_>, index: u32) -> Result<()> {
    if (index as usize) < module.types.len() {
        Ok(())
    } else {
        Err(section.validation_error(
            Status::ValidationInvalidType,
            format!("unknown type {index}"),
        ))
    }
}

fn check_memory_limits(section: &Reader<'_>, limits: &Limits) -> Result<()> {
    if !limits.is_well_formed() {
        return Err(section.validation_error(
            Status::ValidationInvalidMemory,
            "size minimum must not be greater than maximum",
        ));
    }
    if limits.min > MAX_PAGES || limits.max.is_some_and(|max| max > MAX_PAGES) {
        return Err(section.validation_error(
            Status::ValidationInvalidMemory,
            format!("memory size must be at most {MAX_PAGES} pages"),
        ));
    }
    Ok(())
}

fn read_table_type(section: &mut Reader<'_>) -> Result<TableType> {
    let element = section.read_ref_type()?;
    let limits = section.read_limits()?;
    if !limits.is_well_formed() {
        return Err(section.validation_error(
            Status::ValidationInvalidTable,
            "size minimum must not be greater than maximum",
        ));
    }
    Ok(TableType { element, limits })
}

fn read_global_type(section: &mut Reader<'_>) -> Result<GlobalType> {
    let value_type = section.read_value_type()?;
    let mutable = match section.read_u8()? {
        0 => false,
        1 => true,
        flag => return Err(section.parse_error(format!("malformed mutability 0x{flag:02x}"))),
    };
    Ok(GlobalType::new(value_type, mutable))
}

fn decode_imports(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let module_name = section.read_name()?;
        let name = section.read_name()?;
        let desc = match section.read_u8()? {
            0x00 => {
                let type_index = section.read_u32()?;
                check_type_index(module, section, type_index)?;
                module.functions.push(type_index);
                module.imported_functions += 1;
                ImportDesc::Func { type_index }
            }
            0x01 => {
                let ty = read_table_type(section)?;
                module.tables.push(ty);
                module.imported_tables += 1;
                ImportDesc::Table { ty }
            }
            0x02 => {
                let limits = section.read_limits()?;
                check_memory_limits(section, &limits)?;
                module.memories.push(limits);
                module.imported_memories += 1;
                ImportDesc::Memory { limits }
            }
            0x03 => {
                let ty = read_global_type(section)?;
                module.globals.push(ty);
                module.imported_globals += 1;
                ImportDesc::Global { ty }
            }
            kind => {
                return Err(section.parse_error(format!("unknown import kind 0x{kind:02x}")));
            }
        };
        module.imports.push(Import {
            module: module_name,
            name,
            desc,
        });
    }
    Ok(())
}

fn decode_functions(module: &mut Module, section: &mut Reader<'_>) -> Result<u32> {
    let count = section.read_len()?;
    for _ in 0..count {
        let type_index = section.read_u32()?;
        check_type_index(module, section, type_index)?;
        module.functions.push(type_index);
    }
    Ok(count as u32)
}

fn decode_tables(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let ty = read_table_type(section)?;
        module.tables.push(ty);
    }
    Ok(())
}

fn decode_memories(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let limits = section.read_limits()?;
        check_memory_limits(section, &limits)?;
        module.memories.push(limits);
    }
    Ok(())
}

fn decode_globals(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let ty = read_global_type(section)?;
        let init = read_const_expr(module, section, ty.value_type)?;
        module.globals.push(ty);
        module.global_inits.push(init);
    }
    Ok(())
}

fn decode_exports(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    let mut seen = HashSet::with_capacity(count);
    for _ in 0..count {
        let name = section.read_name()?;
        let kind_byte = section.read_u8()?;
        let index = section.read_u32()?;
        let (kind, bound, status) = match kind_byte {
            0x00 => (
                ExternKind::Func,
                module.functions.len(),
                Status::ValidationInvalidFunction,
            ),
            0x01 => (
                ExternKind::Table,
                module.tables.len(),
                Status::ValidationInvalidTable,
            ),
            0x02 => (
                ExternKind::Memory,
                module.memories.len(),
                Status::ValidationInvalidMemory,
            ),
            0x03 => (
                ExternKind::Global,
                module.globals.len(),
                Status::ValidationInvalidGlobal,
            ),
            other => {
                return Err(section.parse_error(format!("unknown export kind 0x{other:02x}")));
            }
        };
        if index as usize >= bound {
            return Err(section.validation_error(
                status,
                format!("export \"{name}\" refers to unknown {kind} {index}"),
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(section.parse_error(format!("duplicate export name \"{name}\"")));
        }
        module.exports.push(Export { name, kind, index });
    }
    Ok(())
}

fn decode_elements(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    for _ in 0..count {
        let flags = section.read_u32()?;
        if flags > 7 {
            return Err(section.parse_error(format!("malformed element segment flags {flags}")));
        }
        let passive_or_declarative = flags & 0b001 != 0;
        let explicit_table = flags & 0b010 != 0;
        let uses_exprs = flags & 0b100 != 0;

        let mode = if passive_or_declarative {
            if explicit_table {
                ElementMode::Declarative
            } else {
                ElementMode::Passive
            }
        } else {
            let table = if explicit_table {
                section.read_u32()?
            } else {
                0
            };
            let offset = read_const_expr(module, section, ValueType::I32)?;
            ElementMode::Active { table, offset }
        };

        // Flags 0 and 4 imply funcref; every other form spells out its type.
        let ty = if flags == 0 || flags == 4 {
            ValueType::FuncRef
        } else if uses_exprs {
            section.read_ref_type()?
        } else {
            let kind = section.read_u8()?;
            if kind != 0x00 {
                return Err(section.parse_error(format!("unknown element kind 0x{kind:02x}")));
            }
            ValueType::FuncRef
        };

        let len = section.read_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            if uses_exprs {
                items.push(read_const_expr(module, section, ty)?);
            } else {
                let index = section.read_u32()?;
                if index >= module.function_count() {
                    return Err(section.validation_error(
                        Status::ValidationInvalidFunction,
                        format!("unknown function {index}"),
                    ));
                }
                items.push(ConstExpr::new(vec![ConstOp::RefFunc(index)]));
            }
        }

        if let ElementMode::Active { table, .. } = &mode {
            let table_ty = module.tables.get(*table as usize).ok_or_else(|| {
                section.validation_error(
                    Status::ValidationInvalidTable,
                    format!("unknown table {table}"),
                )
            })?;
            if table_ty.element != ty {
                return Err(section.validation_error(
                    Status::ValidationTypeMismatch,
                    format!(
                        "element segment of {ty} targets a table of {}",
                        table_ty.element
                    ),
                ));
            }
        }
        module.elements.push(ElementSegment { ty, mode, items });
    }
    Ok(())
}

fn decode_code(module: &mut Module, section: &mut Reader<'_>, declared: u32) -> Result<()> {
    let count = section.read_len()?;
    if count as u32 != declared {
        return Err(section.parse_error("function and code section have inconsistent lengths"));
    }
    for i in 0..declared {
        let size = section.read_u32()? as usize;
        let mut body_reader = section.sub_reader(size)?;
        let body = validate::decode_body(module, module.imported_functions + i, &mut body_reader)?;
        module.bodies.push(body);
    }
    Ok(())
}

fn decode_data(module: &mut Module, section: &mut Reader<'_>) -> Result<()> {
    let count = section.read_len()?;
    if let Some(expected) = module.data_count
        && expected as usize != count
    {
        return Err(section.parse_error("data count and data section have inconsistent lengths"));
    }
    for _ in 0..count {
        let mode = match section.read_u32()? {
            0 => DataMode::Active {
                memory: 0,
                offset: read_const_expr(module, section, ValueType::I32)?,
            },
            1 => DataMode::Passive,
            2 => DataMode::Active {
                memory: section.read_u32()?,
                offset: read_const_expr(module, section, ValueType::I32)?,
            },
            flags => {
                return Err(section.parse_error(format!("malformed data segment flags {flags}")));
            }
        };
        if let DataMode::Active { memory, .. } = &mode
            && *memory as usize >= module.memories.len()
        {
            return Err(section.validation_error(
                Status::ValidationInvalidMemory,
                format!("unknown memory {memory}"),
            ));
        }
        let len = section.read_len()?;
        let bytes = section.read_bytes(len)?.to_vec();
        module.data.push(DataSegment { mode, bytes });
    }
    Ok(())
}

/// Reads a constant expression producing one value of type `expected`.
///
/// `global.get` may only name globals already declared, which for global
/// initializers means imports and earlier definitions.
fn read_const_expr(
    module: &Module,
    section: &mut Reader<'_>,
    expected: ValueType,
) -> Result<ConstExpr> {
    let mut ops = Vec::new();
    let mut stack: Vec<ValueType> = Vec::new();
    loop {
        let opcode = section.read_u8()?;
        let (op, pops, pushes) = match opcode {
            0x0B => break,
            0x41 => (ConstOp::I32Const(section.read_i32()?), 0, ValueType::I32),
            0x42 => (ConstOp::I64Const(section.read_i64()?), 0, ValueType::I64),
            0x43 => (ConstOp::F32Const(section.read_f32_bits()?), 0, ValueType::F32),
            0x44 => (ConstOp::F64Const(section.read_f64_bits()?), 0, ValueType::F64),
            0xD0 => {
                let ty = section.read_ref_type()?;
                (ConstOp::RefNull(ty), 0, ty)
            }
            0xD2 => {
                let index = section.read_u32()?;
                if index >= module.function_count() {
                    return Err(section.validation_error(
                        Status::ValidationInvalidFunction,
                        format!("unknown function {index}"),
                    ));
                }
                (ConstOp::RefFunc(index), 0, ValueType::FuncRef)
            }
            0x23 => {
                let index = section.read_u32()?;
                let global = module.globals.get(index as usize).ok_or_else(|| {
                    section.validation_error(
                        Status::ValidationInvalidGlobal,
                        format!("unknown global {index}"),
                    )
                })?;
                if global.mutable {
                    return Err(section.validation_error(
                        Status::ValidationInvalidGlobal,
                        format!("constant expression reads mutable global {index}"),
                    ));
                }
                (ConstOp::GlobalGet(index), 0, global.value_type)
            }
            0x6A => (ConstOp::I32Add, 2, ValueType::I32),
            0x6B => (ConstOp::I32Sub, 2, ValueType::I32),
            0x6C => (ConstOp::I32Mul, 2, ValueType::I32),
            0x7C => (ConstOp::I64Add, 2, ValueType::I64),
            0x7D => (ConstOp::I64Sub, 2, ValueType::I64),
            0x7E => (ConstOp::I64Mul, 2, ValueType::I64),
            other => {
                return Err(section.validation_error(
                    Status::ValidationTypeMismatch,
                    format!("opcode 0x{other:02x} is not allowed in a constant expression"),
                ));
            }
        };
        for _ in 0..pops {
            if stack.pop() != Some(pushes) {
                return Err(section.validation_error(
                    Status::ValidationTypeMismatch,
                    "constant expression operand type mismatch",
                ));
            }
        }
        stack.push(pushes);
        ops.push(op);
    }
    if stack.as_slice() != [expected] {
        return Err(section.validation_error(
            Status::ValidationTypeMismatch,
            format!("constant expression must produce a single {expected}"),
        ));
    }
    Ok(ConstExpr::new(ops))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wasm(text: &str) -> Vec<u8> {
        wat::parse_str(text).unwrap()
    }

    #[test]
    fn test_decode_add() {
        let module = decode(&wasm(
            r#"(module (func (export "add") (param i32 i32) (result i32)
                local.get 0 local.get 1 i32.add))"#,
        ))
        .unwrap();
        let export = module.export("add").unwrap();
        assert_eq!(export.kind, ExternKind::Func);
        assert_eq!(
            module.func_type(export.index).unwrap(),
            &FuncType::from_tags("i", "ii").unwrap()
        );
    }

    #[test]
    fn test_bad_magic() {
        let err = decode(b"\0asn\x01\0\0\0").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_bad_version() {
        let err = decode(b"\0asm\x02\0\0\0").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_empty_module() {
        let module = decode(b"\0asm\x01\0\0\0").unwrap();
        assert_eq!(module.function_count(), 0);
    }

    #[test]
    fn test_truncated_section() {
        // type section claims 5 bytes but only 1 follows
        let err = decode(b"\0asm\x01\0\0\0\x01\x05\x00").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_section_order() {
        // function section (3) before type section (1)
        let err = decode(b"\0asm\x01\0\0\0\x03\x01\x00\x01\x01\x00").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_unknown_section_id() {
        let err = decode(b"\0asm\x01\0\0\0\x0e\x00").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_function_without_code() {
        // one type () -> (), one function, no code section
        let err = decode(b"\0asm\x01\0\0\0\x01\x04\x01\x60\x00\x00\x03\x02\x01\x00").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_invalid_type_index() {
        // function section refers to type 3 with an empty type section
        let err = decode(b"\0asm\x01\0\0\0\x01\x01\x00\x03\x02\x01\x03").unwrap_err();
        assert_eq!(err.status(), Status::ValidationInvalidType);
    }

    #[test]
    fn test_memory_limits_validated() {
        // memory section: min 2, max 1
        let err = decode(b"\0asm\x01\0\0\0\x05\x04\x01\x01\x02\x01").unwrap_err();
        assert_eq!(err.status(), Status::ValidationInvalidMemory);
    }

    #[test]
    fn test_names_are_decoded() {
        let module = decode(&wasm(
            r"(module $demo (func $helper) (func $main call $helper))",
        ))
        .unwrap();
        assert_eq!(module.name(), Some("demo"));
        assert_eq!(module.function_name(0), Some("helper"));
        assert_eq!(module.describe_function(1), "main");
    }

    #[test]
    fn test_malformed_name_section_ignored() {
        // custom section "name" with a function-name subsection cut short
        let mut bytes = b"\0asm\x01\0\0\0".to_vec();
        bytes.extend_from_slice(&[0x00, 0x08, 0x04, b'n', b'a', b'm', b'e', 0x01, 0x05, 0x01]);
        let module = decode(&bytes).unwrap();
        assert_eq!(module.function_name(0), None);
    }

    #[test]
    fn test_element_and_data_segments() {
        let module = decode(&wasm(
            r#"(module
                (table 4 funcref)
                (memory 1)
                (func $f)
                (elem (i32.const 1) $f $f)
                (elem func $f)
                (elem declare func $f)
                (data (i32.const 8) "hi")
                (data "passive"))"#,
        ))
        .unwrap();
        assert_eq!(module.elements().len(), 3);
        assert!(matches!(
            module.elements()[0].mode,
            ElementMode::Active { table: 0, .. }
        ));
        assert_eq!(module.elements()[1].mode, ElementMode::Passive);
        assert_eq!(module.elements()[2].mode, ElementMode::Declarative);
        assert_eq!(module.data().len(), 2);
        assert_eq!(module.data()[1].mode, DataMode::Passive);
        assert_eq!(module.data()[1].bytes, b"passive");
    }

    #[test]
    fn test_global_init_reads_earlier_global() {
        let module = decode(&wasm(
            r#"(module
                (import "env" "base" (global i32))
                (global i32 (i32.add (global.get 0) (i32.const 4))))"#,
        ))
        .unwrap();
        assert_eq!(module.globals().len(), 2);
        assert_eq!(
            module.global_inits[0].ops(),
            &[ConstOp::GlobalGet(0), ConstOp::I32Const(4), ConstOp::I32Add]
        );
    }

    #[test]
    fn test_global_init_type_checked() {
        let bytes = wat::parse_str("(module (global i32 (i64.const 1)))");
        // wat accepts this textually; the decoder rejects it.
        if let Ok(bytes) = bytes {
            let err = decode(&bytes).unwrap_err();
            assert_eq!(err.status(), Status::ValidationTypeMismatch);
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = wasm(
            r#"(module (memory 1) (data (i32.const 0) "abc")
                (func (export "f") (result i32) i32.const 1))"#,
        );
        let a = decode(&bytes).unwrap();
        let b = decode(&bytes).unwrap();
        assert_eq!(a.types(), b.types());
        assert_eq!(a.exports(), b.exports());
        assert_eq!(a.data(), b.data());
        assert_eq!(a.bodies, b.bodies);
    }
}
