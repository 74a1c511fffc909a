//! Decoded, validated module.
//!
//! A [`Module`] is immutable once decoded and is shared behind an `Arc` by
//! every instance created from it. Function index spaces follow the binary
//! format: imports come first, then locally defined items.

use crate::instr::Instr;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tarn_core::{FuncType, GlobalType, Limits, ValueType};

/// Kind of an importable or exportable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    /// Function
    Func,
    /// Table
    Table,
    /// Linear memory
    Memory,
    /// Global
    Global,
}

impl ExternKind {
    /// Returns the kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Func => "func",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element type and size bounds of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableType {
    /// Reference type stored in the table.
    pub element: ValueType,
    /// Size bounds in elements.
    pub limits: Limits,
}

/// Type requirement of one import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportDesc {
    /// Function with the given type index.
    Func {
        /// Index into the type section
        type_index: u32,
    },
    /// Table with the given type.
    Table {
        /// Required table type
        ty: TableType,
    },
    /// Linear memory with the given limits.
    Memory {
        /// Required limits in pages
        limits: Limits,
    },
    /// Global with the given type.
    Global {
        /// Required global type
        ty: GlobalType,
    },
}

impl ImportDesc {
    /// Kind of item required.
    #[must_use]
    pub const fn kind(&self) -> ExternKind {
        match self {
            Self::Func { .. } => ExternKind::Func,
            Self::Table { .. } => ExternKind::Table,
            Self::Memory { .. } => ExternKind::Memory,
            Self::Global { .. } => ExternKind::Global,
        }
    }
}

/// One entry of the import section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Namespace the import is looked up in.
    pub module: String,
    /// Name within the namespace.
    pub name: String,
    /// What the import must be.
    pub desc: ImportDesc,
}

/// One entry of the export section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    /// Export name, unique within the module.
    pub name: String,
    /// Kind of the exported item.
    pub kind: ExternKind,
    /// Index in the index space of `kind`.
    pub index: u32,
}

/// Operation of a constant expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConstOp {
    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),
    RefNull(ValueType),
    RefFunc(u32),
    GlobalGet(u32),
    I32Add,
    I32Sub,
    I32Mul,
    I64Add,
    I64Sub,
    I64Mul,
}

/// Initializer expression evaluated at instantiation time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstExpr {
    pub(crate) ops: Vec<ConstOp>,
}

impl ConstExpr {
    /// Creates an expression from its operations.
    #[must_use]
    pub const fn new(ops: Vec<ConstOp>) -> Self {
        Self { ops }
    }

    /// The operations in evaluation order.
    #[must_use]
    pub fn ops(&self) -> &[ConstOp] {
        &self.ops
    }
}

/// Where an element segment's items go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementMode {
    /// Copied by `table.init` on demand.
    Passive,
    /// Copied into a table during instantiation, then dropped.
    Active {
        /// Destination table
        table: u32,
        /// Start index in the table
        offset: ConstExpr,
    },
    /// Only forward-declares function references; dropped at instantiation.
    Declarative,
}

/// One entry of the element section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    /// Reference type of every item.
    pub ty: ValueType,
    /// Placement of the segment.
    pub mode: ElementMode,
    /// Item initializers.
    pub items: Vec<ConstExpr>,
}

/// Where a data segment's bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataMode {
    /// Copied by `memory.init` on demand.
    Passive,
    /// Copied into a memory during instantiation, then dropped.
    Active {
        /// Destination memory
        memory: u32,
        /// Start address
        offset: ConstExpr,
    },
}

/// One entry of the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    /// Placement of the segment.
    pub mode: DataMode,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// A locally defined function's code.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Declared locals, parameters excluded.
    pub locals: Vec<ValueType>,
    /// Decoded instruction stream, ending with the function's `End`.
    pub code: Vec<Instr>,
    /// Byte offset of the body in the binary.
    pub offset: usize,
}

/// A decoded and validated module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub(crate) types: Vec<FuncType>,
    pub(crate) imports: Vec<Import>,
    /// Type index of every function, imports first.
    pub(crate) functions: Vec<u32>,
    pub(crate) imported_functions: u32,
    pub(crate) tables: Vec<TableType>,
    pub(crate) imported_tables: u32,
    pub(crate) memories: Vec<Limits>,
    pub(crate) imported_memories: u32,
    pub(crate) globals: Vec<GlobalType>,
    pub(crate) imported_globals: u32,
    /// Initializers of locally defined globals.
    pub(crate) global_inits: Vec<ConstExpr>,
    pub(crate) exports: Vec<Export>,
    pub(crate) start: Option<u32>,
    pub(crate) elements: Vec<ElementSegment>,
    pub(crate) data: Vec<DataSegment>,
    pub(crate) data_count: Option<u32>,
    pub(crate) bodies: Vec<FunctionBody>,
    pub(crate) module_name: Option<String>,
    pub(crate) function_names: HashMap<u32, String>,
}

impl Module {
    /// Whether a function body may name function `index` with `ref.func`:
    /// it must be exported or referenced by an element segment or a global
    /// initializer.
    pub(crate) fn is_declared_reference(&self, index: u32) -> bool {
        let names = |expr: &ConstExpr| expr.ops.contains(&ConstOp::RefFunc(index));
        self.exports
            .iter()
            .any(|e| e.kind == ExternKind::Func && e.index == index)
            || self.elements.iter().flat_map(|s| &s.items).any(names)
            || self.global_inits.iter().any(names)
    }

    /// Signatures declared in the type section.
    #[must_use]
    pub fn types(&self) -> &[FuncType] {
        &self.types
    }

    /// Import declarations in order.
    #[must_use]
    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Export declarations in order.
    #[must_use]
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Looks up an export by name.
    #[must_use]
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Number of functions, imports included.
    #[must_use]
    pub fn function_count(&self) -> u32 {
        self.functions.len() as u32
    }

    /// Number of imported functions.
    #[must_use]
    pub const fn imported_function_count(&self) -> u32 {
        self.imported_functions
    }

    /// Signature of a function by index.
    #[must_use]
    pub fn func_type(&self, index: u32) -> Option<&FuncType> {
        let type_index = *self.functions.get(index as usize)?;
        self.types.get(type_index as usize)
    }

    /// Body of a locally defined function by function index.
    #[must_use]
    pub fn body(&self, index: u32) -> Option<&FunctionBody> {
        let local = index.checked_sub(self.imported_functions)?;
        self.bodies.get(local as usize)
    }

    /// Returns `true` if `index` names an imported function.
    #[must_use]
    pub const fn is_imported_function(&self, index: u32) -> bool {
        index < self.imported_functions
    }

    /// Table types, imports first.
    #[must_use]
    pub fn tables(&self) -> &[TableType] {
        &self.tables
    }

    /// Memory limits, imports first.
    #[must_use]
    pub fn memories(&self) -> &[Limits] {
        &self.memories
    }

    /// Global types, imports first.
    #[must_use]
    pub fn globals(&self) -> &[GlobalType] {
        &self.globals
    }

    /// Index of the start function, if any.
    #[must_use]
    pub const fn start(&self) -> Option<u32> {
        self.start
    }

    /// Element segments in order.
    #[must_use]
    pub fn elements(&self) -> &[ElementSegment] {
        &self.elements
    }

    /// Data segments in order.
    #[must_use]
    pub fn data(&self) -> &[DataSegment] {
        &self.data
    }

    /// Module name from the name section.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Function name from the name section.
    #[must_use]
    pub fn function_name(&self, index: u32) -> Option<&str> {
        self.function_names.get(&index).map(String::as_str)
    }

    /// Human-readable label for a function: its debug name, the export
    /// that names it, or its index.
    #[must_use]
    pub fn describe_function(&self, index: u32) -> String {
        if let Some(name) = self.function_name(index) {
            return name.to_string();
        }
        self.exports
            .iter()
            .find(|e| e.kind == ExternKind::Func && e.index == index)
            .map_or_else(|| format!("func[{index}]"), |e| e.name.clone())
    }

    /// Serializable overview for tooling.
    #[must_use]
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            name: self.module_name.clone(),
            types: self.types.len(),
            functions: self.functions.len(),
            imported_functions: self.imported_functions as usize,
            tables: self.tables.len(),
            memories: self.memories.clone(),
            globals: self.globals.len(),
            element_segments: self.elements.len(),
            data_segments: self.data.len(),
            start: self.start,
            imports: self.imports.clone(),
            exports: self
                .exports
                .iter()
                .map(|e| ExportSummary {
                    name: e.name.clone(),
                    kind: e.kind,
                    index: e.index,
                    signature: (e.kind == ExternKind::Func)
                        .then(|| self.func_type(e.index).map(ToString::to_string))
                        .flatten(),
                })
                .collect(),
        }
    }
}

/// Export entry of a [`ModuleSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Export name
    pub name: String,
    /// Export kind
    pub kind: ExternKind,
    /// Index in the kind's index space
    pub index: u32,
    /// Rendered signature for function exports
    pub signature: Option<String>,
}

/// Serializable module overview.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    /// Module name from the name section
    pub name: Option<String>,
    /// Number of type entries
    pub types: usize,
    /// Number of functions, imports included
    pub functions: usize,
    /// Number of imported functions
    pub imported_functions: usize,
    /// Number of tables
    pub tables: usize,
    /// Memory limits
    pub memories: Vec<Limits>,
    /// Number of globals
    pub globals: usize,
    /// Number of element segments
    pub element_segments: usize,
    /// Number of data segments
    pub data_segments: usize,
    /// Start function index
    pub start: Option<u32>,
    /// Import declarations
    pub imports: Vec<Import>,
    /// Export declarations
    pub exports: Vec<ExportSummary>,
}
