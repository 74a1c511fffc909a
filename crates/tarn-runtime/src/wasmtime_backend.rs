//! [`Backend`] implementation wrapping the `wasmtime` engine.
//!
//! Enabled with the `wasmtime` cargo feature. Host bindings become
//! `wasmtime` host functions that see the instance's exported memory, the
//! [`MemoryCallbacks`] approve growth through a `ResourceLimiter`, and
//! `wasmtime` traps are mapped back onto [`Status`].
//!
//! Differences from the interpreter: only functions can be imported, the
//! "default memory" is the first exported memory, and an exhausted step
//! budget ends the call instead of suspending it.

use std::fmt;
use tarn_core::traits::{
    Backend, BudgetAllocator, FunctionHandle, GlobalHandle, HostBinding, MemoryCallbacks,
};
use tarn_core::{
    EngineConfig, Error, FuncType, GlobalType, Limits, PAGE_SIZE, Result, Status, Value,
    ValueType,
};
use wasmtime::{
    Caller, Config, Engine, ExternType, Func, Global, Instance, Linker, Memory, Module,
    Mutability, ResourceLimiter, Store, Trap, Val, ValType,
};

/// Approves linear-memory growth through [`MemoryCallbacks`].
struct CallbackLimiter {
    callbacks: Box<dyn MemoryCallbacks>,
}

const fn to_pages(bytes: usize) -> u32 {
    (bytes / PAGE_SIZE as usize) as u32
}

impl ResourceLimiter for CallbackLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if maximum.is_some_and(|max| desired > max) {
            return Ok(false);
        }
        let approved = if current == 0 {
            self.callbacks
                .reserve(&Limits::new(to_pages(desired), maximum.map(to_pages)))
        } else {
            self.callbacks.commit(to_pages(current), to_pages(desired))
        };
        if approved {
            tracing::trace!(current, desired, "memory growing");
        } else {
            tracing::warn!(current, desired, "memory growth refused");
        }
        Ok(approved)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        _desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
}

struct HostState {
    limiter: CallbackLimiter,
}

fn val_type(ty: ValueType) -> ValType {
    match ty {
        ValueType::I32 => ValType::I32,
        ValueType::I64 => ValType::I64,
        ValueType::F32 => ValType::F32,
        ValueType::F64 => ValType::F64,
        ValueType::FuncRef => ValType::FUNCREF,
        ValueType::ExternRef => ValType::EXTERNREF,
    }
}

fn value_type(ty: &ValType) -> Option<ValueType> {
    match ty {
        ValType::I32 => Some(ValueType::I32),
        ValType::I64 => Some(ValueType::I64),
        ValType::F32 => Some(ValueType::F32),
        ValType::F64 => Some(ValueType::F64),
        ty if ty.is_funcref() => Some(ValueType::FuncRef),
        ty if ty.is_externref() => Some(ValueType::ExternRef),
        _ => None,
    }
}

fn func_type(ty: &wasmtime::FuncType) -> Option<FuncType> {
    let params = ty.params().map(|t| value_type(&t)).collect::<Option<Vec<_>>>()?;
    let results = ty.results().map(|t| value_type(&t)).collect::<Option<Vec<_>>>()?;
    Some(FuncType::new(params, results))
}

fn to_val(value: Value) -> Result<Val> {
    Ok(match value {
        Value::I32(v) => Val::I32(v),
        Value::I64(v) => Val::I64(v),
        Value::F32(v) => Val::F32(v.to_bits()),
        Value::F64(v) => Val::F64(v.to_bits()),
        Value::FuncRef(None) => Val::FuncRef(None),
        Value::ExternRef(None) => Val::ExternRef(None),
        other => {
            return Err(backend_error(
                format!("cannot pass {other} to wasmtime"),
                None,
            ));
        }
    })
}

fn from_val(value: &Val) -> Result<Value> {
    Ok(match value {
        Val::I32(v) => Value::I32(*v),
        Val::I64(v) => Value::I64(*v),
        Val::F32(bits) => Value::F32(f32::from_bits(*bits)),
        Val::F64(bits) => Value::F64(f64::from_bits(*bits)),
        Val::FuncRef(None) => Value::FuncRef(None),
        Val::ExternRef(None) => Value::ExternRef(None),
        _ => {
            return Err(backend_error(
                "wasmtime returned a value with no tarn equivalent",
                None,
            ));
        }
    })
}

fn backend_error(message: impl Into<String>, source: Option<anyhow::Error>) -> Error {
    Error::Backend {
        message: message.into(),
        source: source.map(Into::into),
    }
}

const fn trap_status(trap: Trap) -> Status {
    match trap {
        Trap::StackOverflow => Status::TrapStackOverflow,
        Trap::MemoryOutOfBounds | Trap::HeapMisaligned => Status::TrapMemoryOutOfBounds,
        Trap::TableOutOfBounds => Status::TrapTableOutOfBounds,
        Trap::IndirectCallToNull => Status::TrapRefNull,
        Trap::BadSignature => Status::TrapIndirectCallTypeMismatch,
        Trap::IntegerOverflow => Status::TrapIntegerOverflow,
        Trap::IntegerDivisionByZero => Status::TrapDivideByZero,
        Trap::BadConversionToInteger => Status::TrapInvalidIntegerConversion,
        Trap::UnreachableCodeReached => Status::TrapUnreachable,
        Trap::OutOfFuel | Trap::Interrupt => Status::DebugTrapSuspended,
        _ => Status::TrapUnknown,
    }
}

/// Maps an error raised while running guest code.
fn map_runtime_error(err: anyhow::Error) -> Error {
    if let Some(trap) = err.downcast_ref::<Trap>() {
        let status = trap_status(*trap);
        if status.is_debug_trap() {
            return Error::Suspended { status };
        }
        return Error::trap(status, format!("{err:#}"));
    }
    match err.downcast::<Error>() {
        Ok(err) if err.is_trap() => err,
        Ok(err) => Error::trap(Status::TrapUnknown, format!("host function failed: {err}")),
        Err(err) => Error::trap(Status::TrapUnknown, format!("{err:#}")),
    }
}

/// Backend running modules on `wasmtime`.
///
/// # Examples
///
/// ```
/// use tarn_runtime::WasmtimeBackend;
/// use tarn_core::traits::Backend;
/// use tarn_core::{EngineConfig, Value};
///
/// let bytes = wat::parse_str(r#"
///     (module (func (export "neg") (param i64) (result i64)
///         i64.const 0
///         local.get 0
///         i64.sub))
/// "#).unwrap();
///
/// let mut backend = WasmtimeBackend::new(&EngineConfig::default()).unwrap();
/// backend.decode(&bytes).unwrap();
/// backend.instantiate("demo", None).unwrap();
/// let neg = backend.find_function("neg").unwrap();
/// assert_eq!(backend.invoke(neg, &[Value::I64(5)]).unwrap(), vec![Value::I64(-5)]);
/// ```
pub struct WasmtimeBackend {
    engine: Engine,
    config: EngineConfig,
    module: Option<Module>,
    bindings: Vec<HostBinding>,
    store: Option<Store<HostState>>,
    instance: Option<Instance>,
    functions: Vec<Func>,
    globals: Vec<Global>,
}

impl fmt::Debug for WasmtimeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmtimeBackend")
            .field("config", &self.config)
            .field("bindings", &self.bindings.len())
            .field("instantiated", &self.instance.is_some())
            .finish_non_exhaustive()
    }
}

impl WasmtimeBackend {
    /// Creates a backend; the step budget becomes `wasmtime` fuel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] if `wasmtime` rejects the configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut wasmtime_config = Config::new();
        wasmtime_config.consume_fuel(config.step_budget.is_some());
        let engine = Engine::new(&wasmtime_config)
            .map_err(|e| backend_error("failed to create wasmtime engine", Some(e)))?;
        Ok(Self {
            engine,
            config: config.clone(),
            module: None,
            bindings: Vec::new(),
            store: None,
            instance: None,
            functions: Vec::new(),
            globals: Vec::new(),
        })
    }

    fn binding(&self, module: &str, name: &str) -> Option<&HostBinding> {
        self.bindings
            .iter()
            .find(|b| b.module() == module && b.name() == name)
    }

    /// Checks imports against the registered bindings so failures carry the
    /// same statuses as the interpreter's linker.
    fn check_imports(&self, module: &Module) -> Result<()> {
        let mut missing = Vec::new();
        for import in module.imports() {
            let Some(binding) = self.binding(import.module(), import.name()) else {
                missing.push(format!("{}.{}", import.module(), import.name()));
                continue;
            };
            let ExternType::Func(ty) = import.ty() else {
                return Err(Error::instantiation(
                    Status::FailImportTypeMismatch,
                    format!(
                        "import {}.{}: a host function cannot satisfy a non-function import",
                        import.module(),
                        import.name()
                    ),
                ));
            };
            if func_type(&ty).as_ref() != Some(binding.ty()) {
                return Err(Error::instantiation(
                    Status::FailImportTypeMismatch,
                    format!(
                        "import {}.{}: host function has {}",
                        import.module(),
                        import.name(),
                        binding.ty()
                    ),
                ));
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::instantiation(
                Status::FailMissingImport,
                format!("unresolved imports: {}", missing.join(", ")),
            ))
        }
    }

    fn define_bindings(&self, linker: &mut Linker<HostState>) -> Result<()> {
        for binding in &self.bindings {
            let ty = wasmtime::FuncType::new(
                &self.engine,
                binding.ty().params().iter().map(|t| val_type(*t)),
                binding.ty().results().iter().map(|t| val_type(*t)),
            );
            let proc_ = std::sync::Arc::clone(binding.proc_());
            let result_types = binding.ty().results().to_vec();
            linker
                .func_new(
                    binding.module(),
                    binding.name(),
                    ty,
                    move |mut caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                        let args = params.iter().map(from_val).collect::<Result<Vec<_>>>()?;
                        let mut out: Vec<Value> =
                            result_types.iter().map(|t| t.default_value()).collect();
                        let memory = caller
                            .get_export("memory")
                            .and_then(wasmtime::Extern::into_memory);
                        let data: &mut [u8] = match memory {
                            Some(memory) => memory.data_mut(&mut caller),
                            None => &mut [],
                        };
                        proc_(data, &args, &mut out)?;
                        for (slot, value) in results.iter_mut().zip(out) {
                            *slot = to_val(value)?;
                        }
                        Ok(())
                    },
                )
                .map_err(|e| backend_error("failed to define host function", Some(e)))?;
        }
        Ok(())
    }

    fn parts(&mut self) -> Result<(&mut Store<HostState>, Instance)> {
        match (self.store.as_mut(), self.instance) {
            (Some(store), Some(instance)) => Ok((store, instance)),
            _ => Err(Error::NotFound {
                what: "instance (call instantiate first)".to_string(),
            }),
        }
    }

    fn default_memory(&mut self) -> Option<(Memory, &mut Store<HostState>)> {
        let name = self
            .module
            .as_ref()?
            .exports()
            .find(|e| matches!(e.ty(), ExternType::Memory(_)))?
            .name()
            .to_string();
        let (store, instance) = self.parts().ok()?;
        let memory = instance.get_memory(&mut *store, &name)?;
        Some((memory, store))
    }
}

impl Backend for WasmtimeBackend {
    fn name(&self) -> &'static str {
        "wasmtime"
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        let module = Module::new(&self.engine, bytes).map_err(|e| Error::Parse {
            offset: 0,
            message: format!("{e:#}"),
        })?;
        tracing::debug!(imports = module.imports().len(), "module compiled by wasmtime");
        self.module = Some(module);
        self.store = None;
        self.instance = None;
        self.functions.clear();
        self.globals.clear();
        Ok(())
    }

    fn register_host_function(&mut self, binding: HostBinding) -> Result<()> {
        if self.binding(binding.module(), binding.name()).is_some() {
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
        self.check_imports(&module)?;

        let mut linker = Linker::new(&self.engine);
        self.define_bindings(&mut linker)?;

        let callbacks = callbacks.unwrap_or_else(|| {
            Box::new(BudgetAllocator::new(self.config.memory_limit_bytes))
        });
        let mut store = Store::new(
            &self.engine,
            HostState {
                limiter: CallbackLimiter { callbacks },
            },
        );
        store.limiter(|state| &mut state.limiter);
        if let Some(budget) = self.config.step_budget {
            store
                .set_fuel(budget)
                .map_err(|e| backend_error("failed to set fuel", Some(e)))?;
        }

        let instance = linker.instantiate(&mut store, &module).map_err(|err| {
            let err = map_runtime_error(err);
            let status = match err.status() {
                Status::TrapUnknown => Status::FailInstantiate,
                status => status,
            };
            Error::instantiation(status, err.to_string())
        })?;
        tracing::debug!(name = debug_name, "wasmtime instance ready");
        self.store = Some(store);
        self.instance = Some(instance);
        Ok(())
    }

    fn find_function(&mut self, name: &str) -> Option<FunctionHandle> {
        let (store, instance) = self.parts().ok()?;
        let func = instance.get_func(&mut *store, name)?;
        self.functions.push(func);
        Some(FunctionHandle::new(self.functions.len() as u32 - 1))
    }

    fn function_type(&mut self, handle: FunctionHandle) -> Option<FuncType> {
        let func = *self.functions.get(handle.raw() as usize)?;
        let (store, _) = self.parts().ok()?;
        func_type(&func.ty(&*store))
    }

    fn invoke(&mut self, handle: FunctionHandle, args: &[Value]) -> Result<Vec<Value>> {
        let func = *self
            .functions
            .get(handle.raw() as usize)
            .ok_or_else(|| Error::NotFound {
                what: format!("function handle {}", handle.raw()),
            })?;
        let budget = self.config.step_budget;
        let (store, _) = self.parts()?;
        let ty = func_type(&func.ty(&*store))
            .ok_or_else(|| backend_error("function uses unsupported value types", None))?;
        if !ty.accepts(args) {
            return Err(Error::invalid_args(format!("function expects {ty}")));
        }
        if let Some(budget) = budget {
            store
                .set_fuel(budget)
                .map_err(|e| backend_error("failed to set fuel", Some(e)))?;
        }

        let params = args.iter().copied().map(to_val).collect::<Result<Vec<_>>>()?;
        let mut results: Vec<Val> = ty
            .results()
            .iter()
            .map(|t| to_val(t.default_value()))
            .collect::<Result<_>>()?;
        func.call(&mut *store, &params, &mut results)
            .map_err(map_runtime_error)?;
        results.iter().map(from_val).collect()
    }

    fn find_global(&mut self, name: &str) -> Option<GlobalHandle> {
        let (store, instance) = self.parts().ok()?;
        let global = instance.get_global(&mut *store, name)?;
        self.globals.push(global);
        Some(GlobalHandle::new(self.globals.len() as u32 - 1))
    }

    fn global_value(&mut self, handle: GlobalHandle) -> Option<Value> {
        let global = *self.globals.get(handle.raw() as usize)?;
        let (store, _) = self.parts().ok()?;
        from_val(&global.get(&mut *store)).ok()
    }

    fn global_type(&mut self, handle: GlobalHandle) -> Option<GlobalType> {
        let global = *self.globals.get(handle.raw() as usize)?;
        let (store, _) = self.parts().ok()?;
        let ty = global.ty(&*store);
        Some(GlobalType {
            value_type: value_type(ty.content())?,
            mutable: ty.mutability() == Mutability::Var,
        })
    }

    fn set_global_value(&mut self, handle: GlobalHandle, value: Value) -> Result<()> {
        let global = *self
            .globals
            .get(handle.raw() as usize)
            .ok_or_else(|| Error::NotFound {
                what: format!("global handle {}", handle.raw()),
            })?;
        let (store, _) = self.parts()?;
        global
            .set(&mut *store, to_val(value)?)
            .map_err(|e| Error::invalid_args(format!("{e:#}")))
    }

    fn memory(&mut self) -> Option<&mut [u8]> {
        let (memory, store) = self.default_memory()?;
        Some(memory.data_mut(store))
    }

    fn resize_memory(&mut self, pages: u32) -> Result<()> {
        let (memory, store) = self.default_memory().ok_or_else(|| Error::NotFound {
            what: "exported memory".to_string(),
        })?;
        let current = memory.size(&*store);
        let requested = u64::from(pages);
        if requested < current {
            return Err(Error::instantiation(
                Status::FailMemoryAlloc,
                format!("cannot shrink memory from {current} to {pages} pages"),
            ));
        }
        if memory
            .ty(&*store)
            .maximum()
            .is_some_and(|max| requested > max)
        {
            return Err(Error::trap(
                Status::TrapMemoryOutOfBounds,
                format!("cannot grow memory to {pages} pages"),
            ));
        }
        memory
            .grow(&mut *store, requested - current)
            .map(|_| ())
            .map_err(|e| Error::instantiation(Status::FailMemoryAlloc, format!("{e:#}")))
    }
}
