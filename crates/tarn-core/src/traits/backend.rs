//! Backend-neutral execution contract.
//!
//! A [`Backend`] owns exactly one module and at most one instance of it. Hosts
//! decode a binary, register their native functions as [`HostBinding`]s,
//! instantiate, and then look up exports by name. Lookups return `None` for
//! a missing export; only invocation and mutation report errors.
//!
//! # Examples
//!
//! ```
//! use tarn_core::traits::HostBinding;
//! use tarn_core::{FuncType, Value};
//!
//! let binding = HostBinding::new(
//!     "add",
//!     FuncType::from_tags("i", "ii").unwrap(),
//!     |_memory, args, results| {
//!         let a = args[0].as_i32().unwrap_or_default();
//!         let b = args[1].as_i32().unwrap_or_default();
//!         results[0] = Value::I32(a.wrapping_add(b));
//!         Ok(())
//!     },
//! );
//! assert_eq!(binding.module(), "env");
//! assert_eq!(binding.name(), "add");
//! ```

use crate::traits::MemoryCallbacks;
use crate::{FuncType, GlobalType, Result, Value};
use std::fmt;
use std::sync::Arc;

/// Native procedure behind a host binding.
///
/// Receives the calling instance's default linear memory (empty when it has
/// none), the arguments, and a result buffer pre-filled with zero values of
/// the declared result kinds.
pub type HostProc = Arc<dyn Fn(&mut [u8], &[Value], &mut [Value]) -> Result<()> + Send + Sync>;

/// Namespace used when a binding does not name one.
const DEFAULT_MODULE: &str = "env";

/// A native function offered to a module's imports.
#[derive(Clone)]
pub struct HostBinding {
    module: String,
    name: String,
    ty: FuncType,
    proc_: HostProc,
}

impl HostBinding {
    /// Creates a binding in the `env` namespace.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, ty: FuncType, proc_: F) -> Self
    where
        F: Fn(&mut [u8], &[Value], &mut [Value]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            module: DEFAULT_MODULE.to_string(),
            name: name.into(),
            ty,
            proc_: Arc::new(proc_),
        }
    }

    /// Moves the binding to another import namespace.
    #[must_use]
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Import namespace.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Import name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared signature.
    #[must_use]
    pub const fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// Native procedure.
    #[must_use]
    pub fn proc_(&self) -> &HostProc {
        &self.proc_
    }
}

impl fmt::Debug for HostBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBinding")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Opaque handle to an exported function of a backend's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(u32);

impl FunctionHandle {
    /// Wraps a backend-specific index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the backend-specific index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle to an exported global of a backend's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalHandle(u32);

impl GlobalHandle {
    /// Wraps a backend-specific index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the backend-specific index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Execution backend.
///
/// Lifecycle: [`decode`](Backend::decode), any number of
/// [`register_host_function`](Backend::register_host_function) calls, then
/// [`instantiate`](Backend::instantiate). Everything else requires a
/// successful instantiation and otherwise fails or returns `None`.
pub trait Backend: fmt::Debug {
    /// Short backend name for logs and CLI output.
    fn name(&self) -> &'static str;

    /// Decodes and validates a binary module.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error for a malformed module.
    fn decode(&mut self, bytes: &[u8]) -> Result<()>;

    /// Offers a native function to the module's imports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`](crate::Error::InvalidArgs) if a binding
    /// with the same namespace and name is already registered.
    fn register_host_function(&mut self, binding: HostBinding) -> Result<()>;

    /// Links and initializes the decoded module.
    ///
    /// `callbacks` governs the module's first defined linear memory; other
    /// memories use the engine's configured budget.
    ///
    /// # Errors
    ///
    /// Returns an instantiation error, or the trap raised while running the
    /// start function.
    fn instantiate(
        &mut self,
        debug_name: &str,
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> Result<()>;

    /// Looks up an exported function.
    fn find_function(&mut self, name: &str) -> Option<FunctionHandle>;

    /// Returns the signature of a function handle.
    fn function_type(&mut self, handle: FunctionHandle) -> Option<FuncType>;

    /// Looks up an exported function and checks its signature.
    ///
    /// Returns `None` when the export is missing or its type differs from
    /// `expected`.
    fn find_function_typed(&mut self, name: &str, expected: &FuncType) -> Option<FunctionHandle> {
        let handle = self.find_function(name)?;
        let actual = self.function_type(handle)?;
        if actual == *expected {
            Some(handle)
        } else {
            tracing::debug!(
                export = name,
                %expected,
                %actual,
                "exported function has unexpected type"
            );
            None
        }
    }

    /// Calls a function and returns its results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`](crate::Error::InvalidArgs) when `args`
    /// does not match the signature, or the trap that ended the call.
    fn invoke(&mut self, handle: FunctionHandle, args: &[Value]) -> Result<Vec<Value>>;

    /// Looks up an exported global.
    fn find_global(&mut self, name: &str) -> Option<GlobalHandle>;

    /// Reads a global.
    fn global_value(&mut self, handle: GlobalHandle) -> Option<Value>;

    /// Value kind and mutability of a global.
    fn global_type(&mut self, handle: GlobalHandle) -> Option<GlobalType>;

    /// Writes a mutable global.
    ///
    /// # Errors
    ///
    /// Fails for an immutable global or a value of the wrong kind.
    fn set_global_value(&mut self, handle: GlobalHandle, value: Value) -> Result<()>;

    /// Reads an exported immutable `i32` global as an address into linear
    /// memory.
    ///
    /// Toolchains export data locations this way, e.g. a `__heap_base` global.
    /// A mutable global is not a stable address and yields `None`.
    fn find_global_pointer(&mut self, name: &str) -> Option<u32> {
        let handle = self.find_global(name)?;
        if self.global_type(handle)?.mutable {
            return None;
        }
        match self.global_value(handle)? {
            Value::I32(addr) => Some(addr as u32),
            _ => None,
        }
    }

    /// The instance's default linear memory.
    fn memory(&mut self) -> Option<&mut [u8]>;

    /// Resizes the default linear memory to `pages` pages.
    ///
    /// # Errors
    ///
    /// Fails if `pages` is below the current size, above the declared
    /// maximum, or refused by the memory callbacks.
    fn resize_memory(&mut self, pages: u32) -> Result<()>;
}
