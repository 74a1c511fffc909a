//! The interpreter behind the backend-neutral [`Backend`] contract.
//!
//! Host bindings are grouped into import packages by namespace, in
//! registration order, so a later binding never shadows an earlier one.

use crate::engine::Engine;
use crate::host::{HostFunc, ImportPackage};
use crate::interpreter::Interpreter;
use crate::module::{ExternKind, Module};
use crate::store::{GlobalAddr, Store};
use std::sync::Arc;
use tarn_core::traits::{Backend, FunctionHandle, GlobalHandle, HostBinding, MemoryCallbacks};
use tarn_core::{Error, FuncRef, FuncType, GlobalType, InstanceId, Result, Value};

/// Interpreter backend owning one module and one instance.
///
/// # Examples
///
/// ```
/// use tarn_runtime::{Engine, InterpreterBackend};
/// use tarn_core::traits::Backend;
/// use tarn_core::{FuncType, Value};
///
/// let bytes = wat::parse_str(r#"
///     (module (func (export "add") (param i32 i32) (result i32)
///         local.get 0
///         local.get 1
///         i32.add))
/// "#).unwrap();
///
/// let mut backend = InterpreterBackend::new(Engine::default());
/// backend.decode(&bytes).unwrap();
/// backend.instantiate("demo", None).unwrap();
///
/// let add = backend
///     .find_function_typed("add", &FuncType::from_tags("i", "ii").unwrap())
///     .unwrap();
/// let results = backend.invoke(add, &[Value::I32(2), Value::I32(3)]).unwrap();
/// assert_eq!(results, vec![Value::I32(5)]);
/// ```
#[derive(Debug)]
pub struct InterpreterBackend {
    engine: Engine,
    store: Store,
    module: Option<Arc<Module>>,
    bindings: Vec<HostBinding>,
    instance: Option<InstanceId>,
}

impl InterpreterBackend {
    /// Creates a backend with an empty store.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            store: Store::new(&engine),
            engine,
            module: None,
            bindings: Vec::new(),
            instance: None,
        }
    }

    /// The engine this backend decodes with.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The decoded module, once [`Backend::decode`] succeeded.
    #[must_use]
    pub const fn module(&self) -> Option<&Arc<Module>> {
        self.module.as_ref()
    }

    /// The instance, once [`Backend::instantiate`] succeeded.
    #[must_use]
    pub const fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// The underlying store, mutably; use it to drive an [`Interpreter`]
    /// directly.
    pub const fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// A fresh interpreter configured like the engine, for debugging.
    #[must_use]
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.engine.config())
    }

    /// Resolves a function handle to a reference in the store.
    #[must_use]
    pub fn func_ref(&self, handle: FunctionHandle) -> Option<FuncRef> {
        let id = self.instance?;
        let module = self.store.instance_module(id)?;
        (handle.raw() < module.function_count()).then(|| FuncRef::new(id, handle.raw()))
    }

    fn packages(&self) -> Vec<ImportPackage> {
        let mut packages: Vec<ImportPackage> = Vec::new();
        for binding in &self.bindings {
            let host = HostFunc::from_binding(binding);
            match packages.iter_mut().find(|p| p.name() == binding.module()) {
                Some(package) => package.add(binding.name(), crate::host::Binding::Host(host)),
                None => packages.push(ImportPackage::new(binding.module()).with_host(host)),
            }
        }
        packages
    }

    fn global_addr(&self, handle: GlobalHandle) -> Option<GlobalAddr> {
        self.store.instance_global(self.instance?, handle.raw())
    }

    fn require_instance(&self) -> Result<InstanceId> {
        self.instance.ok_or_else(|| Error::NotFound {
            what: "instance (call instantiate first)".to_string(),
        })
    }
}

impl Backend for InterpreterBackend {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        let module = self.engine.decode(bytes)?;
        tracing::debug!(
            functions = module.function_count(),
            imports = module.imports().len(),
            "module decoded"
        );
        self.module = Some(module);
        self.instance = None;
        Ok(())
    }

    fn register_host_function(&mut self, binding: HostBinding) -> Result<()> {
        if self
            .bindings
            .iter()
            .any(|b| b.module() == binding.module() && b.name() == binding.name())
        {
            return Err(Error::invalid_args(format!(
                "host function {}.{} is already registered",
                binding.module(),
                binding.name()
            )));
        }
        self.bindings.push(binding);
        Ok(())
    }

    fn instantiate(
        &mut self,
        debug_name: &str,
        callbacks: Option<Box<dyn MemoryCallbacks>>,
    ) -> Result<()> {
        let module = self.module.clone().ok_or_else(|| Error::NotFound {
            what: "module (call decode first)".to_string(),
        })?;
        let packages = self.packages();
        let id = self
            .store
            .instantiate(module, debug_name, &packages, callbacks)?;
        self.instance = Some(id);
        Ok(())
    }

    fn find_function(&mut self, name: &str) -> Option<FunctionHandle> {
        let func = self.store.export_function(self.instance?, name)?;
        Some(FunctionHandle::new(func.index))
    }

    fn function_type(&mut self, handle: FunctionHandle) -> Option<FuncType> {
        let func = self.func_ref(handle)?;
        self.store.func_type(func).cloned()
    }

    fn invoke(&mut self, handle: FunctionHandle, args: &[Value]) -> Result<Vec<Value>> {
        let id = self.require_instance()?;
        let func = self.func_ref(handle).ok_or_else(|| Error::NotFound {
            what: format!("function {} of {id}", handle.raw()),
        })?;
        self.store.invoke(func, args)
    }

    fn find_global(&mut self, name: &str) -> Option<GlobalHandle> {
        let module = self.store.instance_module(self.instance?)?;
        let export = module.export(name)?;
        (export.kind == ExternKind::Global).then(|| GlobalHandle::new(export.index))
    }

    fn global_value(&mut self, handle: GlobalHandle) -> Option<Value> {
        self.store.global_value(self.global_addr(handle)?)
    }

    fn global_type(&mut self, handle: GlobalHandle) -> Option<GlobalType> {
        self.store.global_type(self.global_addr(handle)?)
    }

    fn set_global_value(&mut self, handle: GlobalHandle, value: Value) -> Result<()> {
        let addr = self.global_addr(handle).ok_or_else(|| Error::NotFound {
            what: format!("global {}", handle.raw()),
        })?;
        self.store.set_global_value(addr, value)
    }

    fn memory(&mut self) -> Option<&mut [u8]> {
        let addr = self.store.instance_memory(self.instance?, 0)?;
        self.store.memory_mut(addr).map(crate::memory::LinearMemory::data_mut)
    }

    fn resize_memory(&mut self, pages: u32) -> Result<()> {
        let id = self.require_instance()?;
        let addr = self
            .store
            .instance_memory(id, 0)
            .ok_or_else(|| Error::NotFound {
                what: format!("memory 0 of {id}"),
            })?;
        self.store
            .memory_mut(addr)
            .ok_or_else(|| Error::NotFound {
                what: format!("memory 0 of {id}"),
            })?
            .resize(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::Status;

    const MODULE: &str = r#"(module
        (import "env" "log" (func $log (param i32)))
        (memory (export "memory") 1 2)
        (global (export "counter") (mut i32) (i32.const 0))
        (global (export "buffer") i32 (i32.const 1024))
        (func (export "tick") (param i32)
            (global.set 0 (i32.add (global.get 0) (local.get 0)))
            (call $log (global.get 0))))"#;

    fn log_binding() -> HostBinding {
        HostBinding::new(
            "log",
            FuncType::from_tags("v", "i").unwrap(),
            |memory, args, _| {
                memory[0] = args[0].as_i32().unwrap_or_default() as u8;
                Ok(())
            },
        )
    }

    fn backend() -> InterpreterBackend {
        let mut backend = InterpreterBackend::new(Engine::default());
        backend.decode(&wat::parse_str(MODULE).unwrap()).unwrap();
        backend.register_host_function(log_binding()).unwrap();
        backend.instantiate("test", None).unwrap();
        backend
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut backend = InterpreterBackend::new(Engine::default());
        backend.register_host_function(log_binding()).unwrap();
        let err = backend.register_host_function(log_binding()).unwrap_err();
        assert!(err.is_invalid_args());
    }

    #[test]
    fn test_missing_binding_fails_instantiation() {
        let mut backend = InterpreterBackend::new(Engine::default());
        backend.decode(&wat::parse_str(MODULE).unwrap()).unwrap();
        let err = backend.instantiate("test", None).unwrap_err();
        assert_eq!(err.status(), Status::FailMissingImport);
        assert!(backend.find_function("tick").is_none());
    }

    #[test]
    fn test_host_binding_sees_memory() {
        let mut backend = backend();
        let tick = backend.find_function("tick").unwrap();
        backend.invoke(tick, &[Value::I32(7)]).unwrap();
        backend.invoke(tick, &[Value::I32(5)]).unwrap();
        assert_eq!(backend.memory().unwrap()[0], 12);
    }

    #[test]
    fn test_typed_lookup_treats_mismatch_as_absent() {
        let mut backend = backend();
        let right = FuncType::from_tags("v", "i").unwrap();
        let wrong = FuncType::from_tags("i", "i").unwrap();
        assert!(backend.find_function_typed("tick", &right).is_some());
        assert!(backend.find_function_typed("tick", &wrong).is_none());
        assert!(backend.find_function_typed("missing", &right).is_none());
    }

    #[test]
    fn test_globals() {
        let mut backend = backend();
        assert_eq!(backend.find_global_pointer("buffer"), Some(1024));
        assert_eq!(backend.find_global_pointer("counter"), None);
        let counter = backend.find_global("counter").unwrap();
        backend.set_global_value(counter, Value::I32(40)).unwrap();
        let tick = backend.find_function("tick").unwrap();
        backend.invoke(tick, &[Value::I32(2)]).unwrap();
        assert_eq!(backend.global_value(counter), Some(Value::I32(42)));

        let buffer = backend.find_global("buffer").unwrap();
        assert!(backend.set_global_value(buffer, Value::I32(0)).is_err());
        assert!(backend.find_global("tick").is_none());
    }

    #[test]
    fn test_resize_memory() {
        let mut backend = backend();
        backend.resize_memory(2).unwrap();
        assert_eq!(backend.memory().unwrap().len(), 2 * 65_536);
        let err = backend.resize_memory(3).unwrap_err();
        assert_eq!(err.status(), Status::TrapMemoryOutOfBounds);
    }
}
