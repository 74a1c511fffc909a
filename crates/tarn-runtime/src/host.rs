//! Host functions and import packages.
//!
//! A [`HostFunc`] is a typed closure: its [`FuncType`] is fixed when it is
//! created and the linker compares it with the importing module's declared
//! type, so a signature mismatch is caught at instantiation. At call time the
//! interpreter hands the closure its arguments as [`Value`]s and a result
//! buffer pre-filled with zeros of the declared result kinds.
//!
//! An [`ImportPackage`] is a named list of bindings offered to a module's
//! imports. Packages are searched in the order given to
//! [`Store::instantiate`](crate::Store::instantiate), and within a package
//! bindings are searched in insertion order; the first match wins.

use crate::interpreter::Interpreter;
use crate::memory::LinearMemory;
use crate::store::{GlobalAddr, MemAddr, Store, TableAddr};
use std::fmt;
use std::sync::Arc;
use tarn_core::traits::HostBinding;
use tarn_core::{Error, FuncRef, FuncType, InstanceId, Result, Status, Value};

/// Native closure behind a [`HostFunc`].
pub type HostCallback =
    Arc<dyn Fn(&mut Caller<'_>, &[Value], &mut [Value]) -> Result<()> + Send + Sync>;

/// A native function callable from wasm.
///
/// # Examples
///
/// ```
/// use tarn_runtime::HostFunc;
/// use tarn_core::{FuncType, Value};
///
/// let double = HostFunc::new("double", FuncType::from_tags("i", "i").unwrap(), |_, args, results| {
///     results[0] = Value::I32(args[0].as_i32().unwrap_or_default() * 2);
///     Ok(())
/// });
/// assert_eq!(double.ty().params().len(), 1);
/// ```
#[derive(Clone)]
pub struct HostFunc {
    name: String,
    ty: FuncType,
    callback: HostCallback,
}

impl fmt::Debug for HostFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunc")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

impl HostFunc {
    /// Wraps a closure with its signature.
    pub fn new<F>(name: impl Into<String>, ty: FuncType, callback: F) -> Self
    where
        F: Fn(&mut Caller<'_>, &[Value], &mut [Value]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ty,
            callback: Arc::new(callback),
        }
    }

    /// Adapts a backend-neutral [`HostBinding`].
    ///
    /// The binding's procedure sees the calling instance's default memory.
    #[must_use]
    pub fn from_binding(binding: &HostBinding) -> Self {
        let proc_ = Arc::clone(binding.proc_());
        Self::new(binding.name(), binding.ty().clone(), move |caller, args, results| {
            proc_(caller.memory_mut(), args, results)
        })
    }

    /// Name used in traces.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared signature.
    #[must_use]
    pub const fn ty(&self) -> &FuncType {
        &self.ty
    }

    pub(crate) fn call(
        &self,
        caller: &mut Caller<'_>,
        args: &[Value],
        results: &mut [Value],
    ) -> Result<()> {
        (self.callback)(caller, args, results)
    }
}

/// Context passed to a host function.
///
/// Gives access to the calling instance's memory and lets the host call
/// back into wasm on the same thread.
#[derive(Debug)]
pub struct Caller<'a> {
    store: &'a mut Store,
    instance: Option<InstanceId>,
    depth: u32,
    reentry: u32,
}

impl<'a> Caller<'a> {
    pub(crate) const fn new(
        store: &'a mut Store,
        instance: Option<InstanceId>,
        depth: u32,
        reentry: u32,
    ) -> Self {
        Self {
            store,
            instance,
            depth,
            reentry,
        }
    }

    /// The calling instance, or `None` when the host function was invoked
    /// directly by the embedder.
    #[must_use]
    pub const fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &Store {
        self.store
    }

    /// The store, mutably.
    pub fn store_mut(&mut self) -> &mut Store {
        self.store
    }

    /// Default memory of the calling instance; empty when it has none.
    pub fn memory_mut(&mut self) -> &mut [u8] {
        let addr = self
            .instance
            .and_then(|id| self.store.instance_memory(id, 0));
        match addr.and_then(|addr| self.store.memory_mut(addr)) {
            Some(memory) => memory.data_mut(),
            None => &mut [],
        }
    }

    /// Default memory of the calling instance, read-only.
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        self.instance
            .and_then(|id| self.store.instance_memory(id, 0))
            .and_then(|addr| self.store.memory(addr))
            .map(LinearMemory::data)
            .unwrap_or_default()
    }

    /// Calls a wasm or host function and waits for its results.
    ///
    /// Frames of the outer call count toward the call-depth limit, and each
    /// nested re-entry counts toward `max_host_reentry`.
    ///
    /// # Errors
    ///
    /// Returns `TrapStackOverflow` past the re-entry limit, otherwise the
    /// trap that ended the nested call.
    pub fn invoke(&mut self, func: FuncRef, args: &[Value]) -> Result<Vec<Value>> {
        let config = self.store.engine().config();
        let reentry = self.reentry + 1;
        if reentry > config.max_host_reentry {
            return Err(Error::trap(
                Status::TrapStackOverflow,
                format!("host re-entry depth exceeds {}", config.max_host_reentry),
            ));
        }
        let mut nested = Interpreter::nested(config, self.depth, reentry);
        nested.call(self.store, func, args)
    }
}

/// Something that can satisfy an import.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A function of an instance.
    Function(FuncRef),
    /// A native function.
    Host(HostFunc),
    /// A global cell in the store.
    Global(GlobalAddr),
    /// A linear memory in the store.
    Memory(MemAddr),
    /// A table in the store.
    Table(TableAddr),
}

impl Binding {
    /// Kind name used in link errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Function(_) | Self::Host(_) => "func",
            Self::Global(_) => "global",
            Self::Memory(_) => "memory",
            Self::Table(_) => "table",
        }
    }
}

/// A named bundle of bindings offered to a module's imports.
///
/// # Examples
///
/// ```
/// use tarn_runtime::{HostFunc, ImportPackage};
/// use tarn_core::FuncType;
///
/// let env = ImportPackage::new("env")
///     .with_host(HostFunc::new("tick", FuncType::default(), |_, _, _| Ok(())));
/// assert_eq!(env.name(), "env");
/// assert!(env.find("tick").is_some());
/// assert!(env.find("tock").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ImportPackage {
    name: String,
    bindings: Vec<(String, Binding)>,
}

impl ImportPackage {
    /// Creates an empty package.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// Package name, matched against an import's module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bindings in insertion order.
    #[must_use]
    pub fn bindings(&self) -> &[(String, Binding)] {
        &self.bindings
    }

    /// Appends a binding.
    pub fn add(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.push((name.into(), binding));
    }

    /// Appends a binding, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.add(name, binding);
        self
    }

    /// Appends a host function under its own name.
    #[must_use]
    pub fn with_host(self, func: HostFunc) -> Self {
        let name = func.name().to_string();
        self.with(name, Binding::Host(func))
    }

    /// First binding named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }
}
