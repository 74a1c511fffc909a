//! Stack-machine interpreter with debugger hooks.
//!
//! An [`Interpreter`] drives one call chain at a time. Execution runs until
//! the outermost function returns, a trap unwinds the whole chain, or a debug
//! trap suspends it. A suspended chain keeps its frames and can be continued
//! with [`Interpreter::resume`] or advanced one instruction at a time with
//! [`Interpreter::step`].
//!
//! Cross-instance calls push a frame of the callee instance onto the same
//! frame stack, so traps and results cross instance boundaries unchanged.
//! Host functions run inline on the calling thread.

mod exec;
mod numeric;

use crate::host::{Caller, HostFunc};
use crate::module::Module;
use crate::store::{FuncSlot, Store};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tarn_core::{EngineConfig, Error, FuncRef, InstanceId, Result, Status, Value};

pub(crate) fn corrupt() -> Error {
    Error::trap(Status::TrapUnknown, "operand stack does not match validation")
}

/// A point in the program: instruction `pc` of function `function` in
/// `instance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Location {
    /// Instance executing the function
    pub instance: InstanceId,
    /// Function index in that instance
    pub function: u32,
    /// Instruction index in the function body
    pub pc: u32,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub const fn new(instance: InstanceId, function: u32, pc: u32) -> Self {
        Self {
            instance,
            function,
            pc,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} func {} @ {}", self.instance, self.function, self.pc)
    }
}

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspendReason {
    /// Reached an armed breakpoint.
    Breakpoint,
    /// Finished a single step.
    Step,
    /// Suspended through a [`SuspendHandle`] or an exhausted step budget.
    Suspended,
}

impl SuspendReason {
    /// The debug-trap status reported for this reason.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::Breakpoint => Status::DebugTrapBreakpoint,
            Self::Step => Status::DebugTrapStep,
            Self::Suspended => Status::DebugTrapSuspended,
        }
    }
}

/// A resumable stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suspension {
    /// Why execution stopped
    pub reason: SuspendReason,
    /// Next instruction to execute
    pub location: Location,
}

/// Result of driving a call chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The outermost function returned these values.
    Returned(Vec<Value>),
    /// Execution stopped and can be resumed.
    Suspended(Suspension),
}

impl Outcome {
    /// Returned values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Suspended`] if execution did not finish.
    pub fn into_results(self) -> Result<Vec<Value>> {
        match self {
            Self::Returned(values) => Ok(values),
            Self::Suspended(suspension) => Err(Error::Suspended {
                status: suspension.reason.status(),
            }),
        }
    }

    /// Returns `true` if execution stopped before finishing.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// One frame of a stack trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// Instance executing the frame
    pub instance: InstanceId,
    /// Function index in that instance
    pub function: u32,
    /// Debug name, export name, or `func[N]`
    pub name: String,
    /// Instruction index
    pub pc: u32,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (func {}) at instruction {}",
            self.instance, self.name, self.function, self.pc
        )
    }
}

/// Thread-safe request to suspend a running interpreter.
///
/// The interpreter polls the flag before every instruction, so the request
/// takes effect at the next instruction boundary.
///
/// # Examples
///
/// ```
/// use tarn_runtime::Interpreter;
/// use tarn_core::EngineConfig;
///
/// let interpreter = Interpreter::new(&EngineConfig::default());
/// let handle = interpreter.suspend_handle();
/// std::thread::spawn(move || handle.request()).join().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SuspendHandle(Arc<AtomicBool>);

impl SuspendHandle {
    /// Asks the interpreter to stop at the next instruction.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` if a request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    /// Operand height below the label's values
    height: usize,
    /// Values carried by a branch to this label
    arity: usize,
    /// Where a branch continues
    cont: usize,
}

#[derive(Debug)]
struct Frame {
    instance: InstanceId,
    func: u32,
    module: Arc<Module>,
    pc: usize,
    stack_base: usize,
    labels_base: usize,
    locals_base: usize,
    arity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Step,
}

/// What the dispatch loop does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Call(FuncRef),
    Return,
}

/// Interpreter for one call chain.
///
/// # Examples
///
/// ```
/// use tarn_runtime::{Engine, Interpreter, Location, Outcome, Store};
/// use tarn_core::Value;
///
/// let engine = Engine::default();
/// let bytes = wat::parse_str(r#"
///     (module (func (export "three") (result i32)
///         i32.const 1
///         i32.const 2
///         i32.add))
/// "#).unwrap();
/// let mut store = Store::new(&engine);
/// let id = store.instantiate(engine.decode(&bytes).unwrap(), "demo", &[], None).unwrap();
/// let func = store.export_function(id, "three").unwrap();
///
/// let mut interpreter = Interpreter::new(engine.config());
/// interpreter.add_breakpoint(Location::new(id, func.index, 2));
/// let outcome = interpreter.invoke(&mut store, func, &[]).unwrap();
/// assert!(outcome.is_suspended());
/// assert_eq!(interpreter.operand_stack(), &[Value::I32(1), Value::I32(2)]);
///
/// let outcome = interpreter.resume(&mut store).unwrap();
/// assert_eq!(outcome, Outcome::Returned(vec![Value::I32(3)]));
/// ```
pub struct Interpreter {
    max_call_depth: u32,
    max_value_stack: usize,
    step_budget: Option<u64>,
    depth_offset: u32,
    reentry: u32,

    stack: Vec<Value>,
    locals: Vec<Value>,
    labels: Vec<Label>,
    frames: Vec<Frame>,

    mode: Mode,
    budget: Option<u64>,
    executed: u64,
    breakpoints: HashSet<Location>,
    skip_breakpoint: Option<Location>,
    suspend: SuspendHandle,
    suspended: Option<Suspension>,
    terminated: bool,
    last_trap: Vec<FrameInfo>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("frames", &self.frames.len())
            .field("stack", &self.stack.len())
            .field("suspended", &self.suspended)
            .field("breakpoints", &self.breakpoints.len())
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Creates an idle interpreter with the limits of `config`.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth,
            max_value_stack: config.max_value_stack,
            step_budget: config.step_budget,
            depth_offset: 0,
            reentry: 0,
            stack: Vec::new(),
            locals: Vec::new(),
            labels: Vec::new(),
            frames: Vec::new(),
            mode: Mode::Run,
            budget: config.step_budget,
            executed: 0,
            breakpoints: HashSet::new(),
            skip_breakpoint: None,
            suspend: SuspendHandle::default(),
            suspended: None,
            terminated: false,
            last_trap: Vec::new(),
        }
    }

    /// Interpreter for a call made by a host function while `depth` frames
    /// are already live, `reentry` host calls deep.
    pub(crate) fn nested(config: &EngineConfig, depth: u32, reentry: u32) -> Self {
        Self {
            depth_offset: depth,
            reentry,
            ..Self::new(config)
        }
    }

    /// Handle that suspends this interpreter from any thread.
    #[must_use]
    pub fn suspend_handle(&self) -> SuspendHandle {
        self.suspend.clone()
    }

    /// Replaces the step budget; applies to the current run as well.
    pub const fn set_step_budget(&mut self, budget: Option<u64>) {
        self.step_budget = budget;
        self.budget = budget;
    }

    /// Arms a breakpoint; returns `false` if it was already armed.
    pub fn add_breakpoint(&mut self, location: Location) -> bool {
        self.breakpoints.insert(location)
    }

    /// Disarms a breakpoint; returns `false` if it was not armed.
    pub fn remove_breakpoint(&mut self, location: &Location) -> bool {
        self.breakpoints.remove(location)
    }

    /// Armed breakpoints, sorted.
    #[must_use]
    pub fn breakpoints(&self) -> Vec<Location> {
        let mut all: Vec<_> = self.breakpoints.iter().copied().collect();
        all.sort_unstable();
        all
    }

    /// Disarms every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// The current stop, if execution is suspended.
    #[must_use]
    pub const fn suspension(&self) -> Option<&Suspension> {
        self.suspended.as_ref()
    }

    /// Returns `true` if a call chain is suspended.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended.is_some()
    }

    /// Operand stack of the suspended chain, bottom first.
    #[must_use]
    pub fn operand_stack(&self) -> &[Value] {
        &self.stack
    }

    /// Locals of the innermost frame, parameters first.
    #[must_use]
    pub fn current_locals(&self) -> &[Value] {
        self.frames
            .last()
            .map_or(&[][..], |frame| &self.locals[frame.locals_base..])
    }

    /// Frames of the suspended chain, innermost first.
    #[must_use]
    pub fn stack_trace(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .rev()
            .map(|frame| FrameInfo {
                instance: frame.instance,
                function: frame.func,
                name: frame.module.describe_function(frame.func),
                pc: frame.pc as u32,
            })
            .collect()
    }

    /// Frames that were live when the last trap happened.
    #[must_use]
    pub fn last_trap_trace(&self) -> &[FrameInfo] {
        &self.last_trap
    }

    /// Starts a call and drives it until it returns or suspends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] while another call is suspended or
    /// for arguments that do not match the function type,
    /// [`Error::Instantiation`] if the instance failed to instantiate, and
    /// [`Error::Trap`] if execution traps.
    pub fn invoke(&mut self, store: &mut Store, func: FuncRef, args: &[Value]) -> Result<Outcome> {
        if self.suspended.is_some() {
            return Err(Error::invalid_args(
                "a call is suspended; resume or terminate it first",
            ));
        }
        let data = store.instance(func.instance)?;
        if !data.status.is_ok() {
            return Err(Error::instantiation(
                data.status,
                format!("{} failed to instantiate", func.instance),
            ));
        }
        self.start(store, func, args)
    }

    /// Runs a call to completion without checking the instance status.
    pub(crate) fn call(
        &mut self,
        store: &mut Store,
        func: FuncRef,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        self.start(store, func, args)?.into_results()
    }

    fn start(&mut self, store: &mut Store, func: FuncRef, args: &[Value]) -> Result<Outcome> {
        let ty = store.func_type(func).ok_or_else(|| Error::NotFound {
            what: format!("function {} of {}", func.index, func.instance),
        })?;
        if !ty.accepts(args) {
            return Err(Error::invalid_args(format!(
                "function {} expects {ty}",
                func.index
            )));
        }
        tracing::trace!(instance = %func.instance, func = func.index, "invoke");
        store.engine().record_invocation();

        self.reset();
        self.terminated = false;
        self.mode = Mode::Run;
        self.budget = self.step_budget;
        self.stack.extend_from_slice(args);
        if let Err(err) = self.enter(store, func) {
            return Err(self.fail(store, 0, err));
        }
        self.run(store)
    }

    /// Continues a suspended call.
    ///
    /// The breakpoint the call is stopped on, if any, is stepped over. The
    /// step budget is refilled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgs`] if nothing is suspended, a
    /// `DebugTrapTerminated` trap after [`Interpreter::terminate`], and any
    /// trap raised while running.
    pub fn resume(&mut self, store: &mut Store) -> Result<Outcome> {
        self.continue_with(store, Mode::Run)
    }

    /// Executes one instruction of a suspended call, then suspends again
    /// with `DebugTrapStep`.
    ///
    /// # Errors
    ///
    /// As [`Interpreter::resume`].
    pub fn step(&mut self, store: &mut Store) -> Result<Outcome> {
        self.continue_with(store, Mode::Step)
    }

    fn continue_with(&mut self, store: &mut Store, mode: Mode) -> Result<Outcome> {
        if std::mem::take(&mut self.terminated) {
            return Err(Error::trap(
                Status::DebugTrapTerminated,
                "execution was terminated",
            ));
        }
        let Some(suspension) = self.suspended.take() else {
            return Err(Error::invalid_args("no call is suspended"));
        };
        self.skip_breakpoint = Some(suspension.location);
        self.mode = mode;
        self.budget = self.step_budget;
        self.run(store)
    }

    /// Abandons a suspended call.
    ///
    /// The next [`Interpreter::resume`] or [`Interpreter::step`] reports
    /// `DebugTrapTerminated`; a new call may be started right away.
    pub fn terminate(&mut self) {
        if self.suspended.take().is_some() {
            tracing::debug!("suspended call terminated");
            self.reset();
            self.terminated = true;
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.locals.clear();
        self.labels.clear();
        self.frames.clear();
        self.skip_breakpoint = None;
        self.suspended = None;
        self.executed = 0;
    }

    /// Checks debugger state before executing the instruction at `location`.
    fn pause_reason(&mut self, location: Location) -> Option<SuspendReason> {
        let skip = self.skip_breakpoint.take();
        if self.suspend.take() {
            return Some(SuspendReason::Suspended);
        }
        if self.mode == Mode::Step && self.executed > 0 {
            return Some(SuspendReason::Step);
        }
        if !self.breakpoints.is_empty()
            && skip != Some(location)
            && self.breakpoints.contains(&location)
        {
            return Some(SuspendReason::Breakpoint);
        }
        if let Some(budget) = &mut self.budget {
            if *budget == 0 {
                return Some(SuspendReason::Suspended);
            }
            *budget -= 1;
        }
        None
    }

    fn run(&mut self, store: &mut Store) -> Result<Outcome> {
        self.executed = 0;
        let outcome = self.dispatch(store);
        store.engine().record_instructions(self.executed);
        outcome
    }

    fn dispatch(&mut self, store: &mut Store) -> Result<Outcome> {
        loop {
            let Some(frame) = self.frames.last() else {
                return Ok(Outcome::Returned(std::mem::take(&mut self.stack)));
            };
            let module = Arc::clone(&frame.module);
            let instance = frame.instance;
            let func = frame.func;
            let locals_base = frame.locals_base;
            let mut pc = frame.pc;
            let Some(body) = module.body(func) else {
                return Err(self.fail(store, pc, corrupt()));
            };
            let code = &body.code;
            let ctx = exec::Context {
                module: &module,
                instance,
                locals_base,
            };

            let flow = loop {
                if pc >= code.len() {
                    break Flow::Return;
                }
                let location = Location::new(instance, func, pc as u32);
                if let Some(reason) = self.pause_reason(location) {
                    return Ok(self.suspend_at(pc, Suspension { reason, location }));
                }
                self.executed += 1;
                match self.exec(store, &ctx, &code[pc], pc) {
                    Ok(Flow::Next) => pc += 1,
                    Ok(Flow::Jump(target)) => pc = target,
                    Ok(Flow::Call(target)) => break Flow::Call(target),
                    Ok(Flow::Return) => break Flow::Return,
                    Err(err) => return Err(self.fail(store, pc, err)),
                }
            };

            match flow {
                Flow::Call(target) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.pc = pc + 1;
                    }
                    if let Err(err) = self.enter(store, target) {
                        return Err(self.fail(store, pc, err));
                    }
                }
                _ => {
                    if let Err(err) = self.leave() {
                        return Err(self.fail(store, pc, err));
                    }
                }
            }
        }
    }

    fn suspend_at(&mut self, pc: usize, suspension: Suspension) -> Outcome {
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = pc;
        }
        tracing::debug!(reason = ?suspension.reason, location = %suspension.location, "suspended");
        self.suspended = Some(suspension);
        Outcome::Suspended(suspension)
    }

    /// Unwinds the chain after a trap and annotates the error with the
    /// innermost frame.
    fn fail(&mut self, store: &Store, pc: usize, err: Error) -> Error {
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = pc;
        }
        self.last_trap = self.stack_trace();
        self.reset();
        let Error::Trap { status, message } = err else {
            return err;
        };
        store.engine().record_trap();
        let message = match self.last_trap.first() {
            Some(frame) => format!(
                "{message} in function {} ({}) at instruction {}",
                frame.function, frame.name, frame.pc
            ),
            None => message,
        };
        tracing::warn!(%status, %message, "trap");
        Error::Trap { status, message }
    }

    /// Calls `target` with its arguments on top of the operand stack.
    ///
    /// Imports are followed to the function that defines them; a wasm
    /// function gets a new frame, a host function runs to completion here.
    fn enter(&mut self, store: &mut Store, target: FuncRef) -> Result<()> {
        let mut target = target;
        for _ in 0..=store.instances.len() {
            let slot = store
                .instance(target.instance)?
                .functions
                .get(target.index as usize)
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    what: format!("function {} of {}", target.index, target.instance),
                })?;
            match slot {
                FuncSlot::Local => return self.push_frame(store, target),
                FuncSlot::Host(host) => return self.call_host(store, target.instance, &host),
                FuncSlot::Imported(next) => {
                    tracing::trace!(from = %target.instance, to = %next.instance, func = next.index, "cross-instance call");
                    target = next;
                }
            }
        }
        Err(Error::trap(Status::TrapUnknown, "import chain does not end"))
    }

    fn push_frame(&mut self, store: &Store, target: FuncRef) -> Result<()> {
        let depth = self.depth_offset as usize + self.frames.len();
        if depth >= self.max_call_depth as usize {
            return Err(Error::trap(
                Status::TrapStackOverflow,
                format!("call depth exceeds {}", self.max_call_depth),
            ));
        }
        let module = Arc::clone(&store.instance(target.instance)?.module);
        let (params, arity) = module
            .func_type(target.index)
            .map(|ty| (ty.params().len(), ty.results().len()))
            .ok_or_else(corrupt)?;
        let body = module.body(target.index).ok_or_else(corrupt)?;
        let args_start = self.stack.len().checked_sub(params).ok_or_else(corrupt)?;

        if self.stack.len() + self.locals.len() + body.locals.len() > self.max_value_stack {
            return Err(Error::trap(
                Status::TrapStackOverflow,
                format!("value stack exceeds {} slots", self.max_value_stack),
            ));
        }
        let locals_base = self.locals.len();
        self.locals.extend(self.stack.drain(args_start..));
        self.locals
            .extend(body.locals.iter().map(|ty| ty.default_value()));

        let labels_base = self.labels.len();
        self.labels.push(Label {
            height: self.stack.len(),
            arity,
            cont: body.code.len(),
        });
        self.frames.push(Frame {
            instance: target.instance,
            func: target.index,
            module,
            pc: 0,
            stack_base: self.stack.len(),
            labels_base,
            locals_base,
            arity,
        });
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        let frame = self.frames.pop().ok_or_else(corrupt)?;
        let results = self
            .stack
            .len()
            .checked_sub(frame.arity)
            .filter(|start| *start >= frame.stack_base)
            .ok_or_else(corrupt)?;
        self.stack.drain(frame.stack_base..results);
        self.locals.truncate(frame.locals_base);
        self.labels.truncate(frame.labels_base);
        Ok(())
    }

    fn call_host(&mut self, store: &mut Store, instance: InstanceId, host: &HostFunc) -> Result<()> {
        let ty = host.ty();
        let args_start = self
            .stack
            .len()
            .checked_sub(ty.params().len())
            .ok_or_else(corrupt)?;
        let args = self.stack.split_off(args_start);
        let mut results: Vec<Value> = ty.results().iter().map(|t| t.default_value()).collect();

        tracing::trace!(host = host.name(), "host call");
        let depth = self.depth_offset + self.frames.len() as u32;
        let mut caller = Caller::new(store, Some(instance), depth, self.reentry);
        host.call(&mut caller, &args, &mut results).map_err(|err| {
            if err.is_trap() {
                err
            } else {
                Error::trap(
                    Status::TrapUnknown,
                    format!("host function {} failed: {err}", host.name()),
                )
            }
        })?;

        if results
            .iter()
            .zip(ty.results())
            .any(|(value, expected)| value.value_type() != *expected)
        {
            return Err(Error::trap(
                Status::TrapUnknown,
                format!("host function {} returned values not matching {ty}", host.name()),
            ));
        }
        self.stack.extend(results);
        Ok(())
    }
}
