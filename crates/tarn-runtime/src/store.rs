//! Store of instances and the objects they own.
//!
//! The store is the arena every instance lives in. Globals, tables and
//! memories are allocated in store-wide vectors and instances refer to them
//! by address, so an imported memory is simply the exporter's address: the
//! exporter owns the object and the store keeps it alive for as long as the
//! store itself lives. Dropping the store reclaims everything at once.

use crate::engine::Engine;
use crate::host::{Binding, HostFunc, ImportPackage};
use crate::interpreter::Interpreter;
use crate::memory::LinearMemory;
use crate::module::{ExternKind, Module, TableType};
use crate::table::Table;
use crate::{initializer, linker};
use std::fmt;
use std::sync::Arc;
use tarn_core::traits::{BudgetAllocator, MemoryCallbacks};
use tarn_core::{
    Error, FuncRef, FuncType, GlobalType, InstanceId, Limits, Result, Status, Value, ValueType,
};

macro_rules! addr_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Position in the store.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

addr_type!(
    /// Address of a global cell in a [`Store`].
    GlobalAddr
);
addr_type!(
    /// Address of a table in a [`Store`].
    TableAddr
);
addr_type!(
    /// Address of a linear memory in a [`Store`].
    MemAddr
);

/// A global's type and current value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlobalCell {
    pub(crate) ty: GlobalType,
    pub(crate) value: Value,
}

/// Where calls to one entry of an instance's function index space go.
#[derive(Debug, Clone)]
pub(crate) enum FuncSlot {
    /// Defined by the instance's own module.
    Local,
    /// Bound to a function of another (or the same) instance.
    Imported(FuncRef),
    /// Bound to a native function.
    Host(HostFunc),
}

/// An exported item, resolved to store addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extern {
    /// Function
    Func(FuncRef),
    /// Table
    Table(TableAddr),
    /// Linear memory
    Memory(MemAddr),
    /// Global
    Global(GlobalAddr),
}

#[derive(Debug)]
pub(crate) struct InstanceData {
    pub(crate) module: Arc<Module>,
    pub(crate) name: String,
    pub(crate) status: Status,
    pub(crate) failure: Option<String>,
    pub(crate) functions: Vec<FuncSlot>,
    pub(crate) globals: Vec<GlobalAddr>,
    pub(crate) tables: Vec<TableAddr>,
    pub(crate) memories: Vec<MemAddr>,
    /// Evaluated element segments; dropped segments are empty.
    pub(crate) elements: Vec<Vec<Value>>,
    pub(crate) data_dropped: Vec<bool>,
}

impl InstanceData {
    pub(crate) fn data_segment(&self, index: u32) -> &[u8] {
        let i = index as usize;
        if self.data_dropped.get(i).copied().unwrap_or(true) {
            return &[];
        }
        self.module
            .data
            .get(i)
            .map_or(&[][..], |segment| segment.bytes.as_slice())
    }
}

/// Arena of instances, globals, tables and memories.
///
/// # Examples
///
/// ```
/// use tarn_runtime::{Engine, Store};
/// use tarn_core::Value;
///
/// let engine = Engine::default();
/// let bytes = wat::parse_str(r#"(module (func (export "answer") (result i32) i32.const 42))"#).unwrap();
/// let module = engine.decode(&bytes).unwrap();
///
/// let mut store = Store::new(&engine);
/// let instance = store.instantiate(module, "demo", &[], None).unwrap();
/// let results = store.invoke_export(instance, "answer", &[]).unwrap();
/// assert_eq!(results, vec![Value::I32(42)]);
/// ```
pub struct Store {
    engine: Engine,
    pub(crate) instances: Vec<InstanceData>,
    pub(crate) globals: Vec<GlobalCell>,
    pub(crate) tables: Vec<Table>,
    pub(crate) memories: Vec<LinearMemory>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("instances", &self.instances.len())
            .field("globals", &self.globals.len())
            .field("tables", &self.tables.len())
            .field("memories", &self.memories.len())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            instances: Vec::new(),
            globals: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
        }
    }

    /// The engine this store reports to.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Instantiates a module and returns its id.
    ///
    /// Imports are resolved against `packages`; see [`ImportPackage`] for
    /// the matching rules. `callbacks` governs the module's first defined
    /// memory; other memories get a [`BudgetAllocator`] with the engine's
    /// memory limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Instantiation`] with the failing status. The failed
    /// instance stays in the store; use [`Store::create_instance`] to keep
    /// its id.
    pub fn instantiate(
        &mut self,
        module: Arc<Module>,
        name: &str,
        packages: &[ImportPackage],
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> Result<InstanceId> {
        let id = self.create_instance(module, name, packages, callbacks);
        match self.instance_status(id) {
            Some(Status::Ok) => Ok(id),
            Some(status) => Err(Error::instantiation(
                status,
                self.instances[id.index()]
                    .failure
                    .clone()
                    .unwrap_or_default(),
            )),
            None => Err(Error::instantiation(Status::FailUnknown, "instance lost")),
        }
    }

    /// Instantiates a module and returns its id even when instantiation
    /// fails.
    ///
    /// The instance carries its terminal status permanently; invoking a
    /// failed instance returns [`Error::Instantiation`] with that status.
    pub fn create_instance(
        &mut self,
        module: Arc<Module>,
        name: &str,
        packages: &[ImportPackage],
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> InstanceId {
        let id = InstanceId::new(self.instances.len() as u32);
        self.instances.push(InstanceData {
            elements: vec![Vec::new(); module.elements.len()],
            data_dropped: vec![false; module.data.len()],
            module,
            name: name.to_string(),
            status: Status::FailInstantiate,
            failure: None,
            functions: Vec::new(),
            globals: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
        });

        let span = tracing::debug_span!("instantiate", instance = %id, name);
        let _enter = span.enter();
        let result = self.build_instance(id, packages, callbacks);
        let data = &mut self.instances[id.index()];
        match result {
            Ok(()) => {
                data.status = Status::Ok;
                tracing::debug!("instance ready");
            }
            Err(error) => {
                tracing::warn!(%error, "instantiation failed");
                data.status = error.status();
                data.failure = Some(error.to_string());
            }
        }
        self.engine.record_instantiation(data.status.is_ok());
        id
    }

    fn build_instance(
        &mut self,
        id: InstanceId,
        packages: &[ImportPackage],
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> Result<()> {
        let module = Arc::clone(&self.instances[id.index()].module);
        let imports = linker::link(self, &module, packages)?;

        let mut tables = imports.tables;
        for ty in &module.tables[module.imported_tables as usize..] {
            tables.push(self.push_table(Table::new(*ty)?));
        }

        let mut memories = imports.memories;
        let mut callbacks = callbacks;
        for limits in &module.memories[module.imported_memories as usize..] {
            let callbacks = callbacks.take().unwrap_or_else(|| self.default_callbacks());
            memories.push(self.push_memory(LinearMemory::new(*limits, callbacks)?));
        }

        let mut functions = imports.functions;
        functions.resize(module.functions.len(), FuncSlot::Local);

        let data = &mut self.instances[id.index()];
        data.functions = functions;
        data.tables = tables;
        data.memories = memories;
        data.globals = imports.globals;

        initializer::initialize(self, id)
    }

    fn default_callbacks(&self) -> Box<dyn MemoryCallbacks> {
        Box::new(BudgetAllocator::new(
            self.engine.config().memory_limit_bytes,
        ))
    }

    fn push_table(&mut self, table: Table) -> TableAddr {
        self.tables.push(table);
        TableAddr(self.tables.len() as u32 - 1)
    }

    fn push_memory(&mut self, memory: LinearMemory) -> MemAddr {
        self.memories.push(memory);
        MemAddr(self.memories.len() as u32 - 1)
    }

    pub(crate) fn push_global(&mut self, ty: GlobalType, value: Value) -> GlobalAddr {
        self.globals.push(GlobalCell { ty, value });
        GlobalAddr(self.globals.len() as u32 - 1)
    }

    /// Creates a host-owned global for import packages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] if `value` is not of `ty`'s kind.
    pub fn create_global(&mut self, ty: GlobalType, value: Value) -> Result<GlobalAddr> {
        if value.value_type() != ty.value_type {
            return Err(Error::invalid_args(format!(
                "global of type {} cannot hold {value}",
                ty.value_type
            )));
        }
        Ok(self.push_global(ty, value))
    }

    /// Creates a host-owned memory for import packages.
    ///
    /// # Errors
    ///
    /// Returns `FailMemoryAlloc` if `callbacks` refuse the reservation.
    pub fn create_memory(
        &mut self,
        limits: Limits,
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> Result<MemAddr> {
        let callbacks = callbacks.unwrap_or_else(|| self.default_callbacks());
        Ok(self.push_memory(LinearMemory::new(limits, callbacks)?))
    }

    /// Creates a host-owned table of null references for import packages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] for a non-reference element type and
    /// `FailMemoryAlloc` for a table too large to allocate.
    pub fn create_table(&mut self, element: ValueType, limits: Limits) -> Result<TableAddr> {
        if !element.is_ref() || !limits.is_well_formed() {
            return Err(Error::invalid_args(format!(
                "invalid table type {element} {limits}"
            )));
        }
        Ok(self.push_table(Table::new(TableType { element, limits })?))
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Result<&InstanceData> {
        self.instances.get(id.index()).ok_or_else(|| Error::NotFound {
            what: id.to_string(),
        })
    }

    /// Terminal status of an instance.
    #[must_use]
    pub fn instance_status(&self, id: InstanceId) -> Option<Status> {
        self.instances.get(id.index()).map(|i| i.status)
    }

    /// Decoded module of an instance.
    #[must_use]
    pub fn instance_module(&self, id: InstanceId) -> Option<&Arc<Module>> {
        self.instances.get(id.index()).map(|i| &i.module)
    }

    /// Debug name given at instantiation.
    #[must_use]
    pub fn instance_name(&self, id: InstanceId) -> Option<&str> {
        self.instances.get(id.index()).map(|i| i.name.as_str())
    }

    /// Address of an instance's memory by memory index.
    #[must_use]
    pub fn instance_memory(&self, id: InstanceId, index: u32) -> Option<MemAddr> {
        self.instances
            .get(id.index())?
            .memories
            .get(index as usize)
            .copied()
    }

    /// Address of an instance's table by table index.
    #[must_use]
    pub fn instance_table(&self, id: InstanceId, index: u32) -> Option<TableAddr> {
        self.instances
            .get(id.index())?
            .tables
            .get(index as usize)
            .copied()
    }

    /// Address of an instance's global by global index.
    #[must_use]
    pub fn instance_global(&self, id: InstanceId, index: u32) -> Option<GlobalAddr> {
        self.instances
            .get(id.index())?
            .globals
            .get(index as usize)
            .copied()
    }

    /// Items left in an element segment; dropped segments report 0.
    #[must_use]
    pub fn element_segment_len(&self, id: InstanceId, index: u32) -> Option<usize> {
        self.instances
            .get(id.index())?
            .elements
            .get(index as usize)
            .map(Vec::len)
    }

    /// Bytes left in a data segment; dropped segments report 0.
    #[must_use]
    pub fn data_segment_len(&self, id: InstanceId, index: u32) -> Option<usize> {
        let data = self.instances.get(id.index())?;
        ((index as usize) < data.module.data.len()).then(|| data.data_segment(index).len())
    }

    /// Resolves an export of an instance.
    #[must_use]
    pub fn export(&self, id: InstanceId, name: &str) -> Option<Extern> {
        let data = self.instances.get(id.index())?;
        let export = data.module.export(name)?;
        let index = export.index as usize;
        match export.kind {
            ExternKind::Func => Some(Extern::Func(FuncRef::new(id, export.index))),
            ExternKind::Table => data.tables.get(index).copied().map(Extern::Table),
            ExternKind::Memory => data.memories.get(index).copied().map(Extern::Memory),
            ExternKind::Global => data.globals.get(index).copied().map(Extern::Global),
        }
    }

    /// Looks up an exported function.
    #[must_use]
    pub fn export_function(&self, id: InstanceId, name: &str) -> Option<FuncRef> {
        match self.export(id, name)? {
            Extern::Func(func) => Some(func),
            _ => None,
        }
    }

    /// Builds an import package offering every export of an instance.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown instance, or the instantiation error
    /// of a failed one.
    pub fn exports_package(&self, id: InstanceId, name: impl Into<String>) -> Result<ImportPackage> {
        let data = self.instance(id)?;
        if !data.status.is_ok() {
            return Err(Error::instantiation(
                data.status,
                format!("{id} failed to instantiate"),
            ));
        }
        let mut package = ImportPackage::new(name);
        for export in data.module.exports() {
            if let Some(item) = self.export(id, &export.name) {
                let binding = match item {
                    Extern::Func(func) => Binding::Function(func),
                    Extern::Table(addr) => Binding::Table(addr),
                    Extern::Memory(addr) => Binding::Memory(addr),
                    Extern::Global(addr) => Binding::Global(addr),
                };
                package.add(export.name.clone(), binding);
            }
        }
        Ok(package)
    }

    /// Signature of a function reference.
    #[must_use]
    pub fn func_type(&self, func: FuncRef) -> Option<&FuncType> {
        self.instances
            .get(func.instance.index())?
            .module
            .func_type(func.index)
    }

    /// Calls a function to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] for mismatched arguments,
    /// [`Error::Instantiation`] for a failed instance, the trap that ended
    /// the call, or [`Error::Suspended`] if the step budget ran out.
    pub fn invoke(&mut self, func: FuncRef, args: &[Value]) -> Result<Vec<Value>> {
        let mut interpreter = Interpreter::new(self.engine.config());
        interpreter.invoke(self, func, args)?.into_results()
    }

    /// Calls an exported function by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a missing export, otherwise as
    /// [`Store::invoke`].
    pub fn invoke_export(
        &mut self,
        id: InstanceId,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        let func = self
            .export_function(id, name)
            .ok_or_else(|| Error::NotFound {
                what: format!("exported function \"{name}\""),
            })?;
        self.invoke(func, args)
    }

    /// Reads a global.
    #[must_use]
    pub fn global_value(&self, addr: GlobalAddr) -> Option<Value> {
        self.globals.get(addr.index()).map(|g| g.value)
    }

    /// Type of a global.
    #[must_use]
    pub fn global_type(&self, addr: GlobalAddr) -> Option<GlobalType> {
        self.globals.get(addr.index()).map(|g| g.ty)
    }

    /// Writes a mutable global.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] for an immutable global or a value of
    /// the wrong kind.
    pub fn set_global_value(&mut self, addr: GlobalAddr, value: Value) -> Result<()> {
        let cell = self
            .globals
            .get_mut(addr.index())
            .ok_or_else(|| Error::NotFound {
                what: format!("global {}", addr.index()),
            })?;
        if !cell.ty.mutable {
            return Err(Error::invalid_args("global is immutable"));
        }
        if value.value_type() != cell.ty.value_type {
            return Err(Error::invalid_args(format!(
                "global of type {} cannot hold {value}",
                cell.ty.value_type
            )));
        }
        cell.value = value;
        Ok(())
    }

    /// A linear memory.
    #[must_use]
    pub fn memory(&self, addr: MemAddr) -> Option<&LinearMemory> {
        self.memories.get(addr.index())
    }

    /// A linear memory, mutably.
    pub fn memory_mut(&mut self, addr: MemAddr) -> Option<&mut LinearMemory> {
        self.memories.get_mut(addr.index())
    }

    /// A table.
    #[must_use]
    pub fn table(&self, addr: TableAddr) -> Option<&Table> {
        self.tables.get(addr.index())
    }

    /// A table, mutably.
    pub fn table_mut(&mut self, addr: TableAddr) -> Option<&mut Table> {
        self.tables.get_mut(addr.index())
    }
}
