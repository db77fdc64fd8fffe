//! Agent: the explicit execution context threaded through every operation
//!
//! An [`Agent`] owns one realm, the stack of execution contexts and the
//! module registry. Every VM opcode that needs language-level work (coercion,
//! property access, call/construct, iteration) calls back into the agent,
//! so there is no ambient "current agent" anywhere in the crate.
//!
//! Calls recurse on the host stack: each bytecode activation runs its own
//! [`BytecodeVM`] and pushes one [`ExecutionContext`].

pub mod builtins;
pub mod bytecode_vm;
pub mod class;
pub mod generator;
pub mod iterator;
pub mod operations;
pub mod property;
pub mod realm;
pub mod stack;
pub mod variables;

use tracing::{debug, instrument};

use crate::bytecode::{FunctionPackage, NEW_TARGET_SLOT, RECEIVER_SLOT, RESERVED_SLOTS, validate};
use crate::config::VmConfig;
use crate::environment::Env;
use crate::error::{ExecError, JsError, VmError};
use crate::prelude::*;
use crate::value::{
    CheapClone, Closure, ExoticObject, JsFunction, JsObject, JsObjectRef, JsString, JsValue,
    NativeFn, Property, PropertyKey,
};

use builtins::error::create_error_object;
use bytecode_vm::{BytecodeVM, OpcodeExecutor, VmResult};
use generator::{CoroutineKind, CoroutineRef, CoroutineStatus, ResumeMode, SuspendedFrame};
use operations::describe_value;
use realm::{Realm, define_function_metadata};
use stack::Locals;

/// One entry of the context stack; the top entry is the running context
pub struct ExecutionContext {
    pub realm: Rc<Realm>,
    /// `None` for script and module top-level code
    pub function: Option<JsObjectRef>,
    /// Environment the activation started with
    pub environment: Env,
    /// Module specifier of top-level module code
    pub source: Option<JsString>,
}

/// Progress of an async task after one [`Agent::resume_async`] call
#[derive(Debug)]
pub enum AsyncStep {
    /// Suspended at an `Await` on this value
    Awaiting(JsValue),
    /// Ran to completion with this value
    Complete(JsValue),
}

/// Everything needed to start one bytecode activation
pub(crate) struct Activation {
    pub function: Option<JsObjectRef>,
    pub package: Rc<FunctionPackage>,
    pub locals: Locals,
    pub env: Env,
    pub arguments: Vec<JsValue>,
}

/// Pieces of a closure needed to invoke it, copied out of the function
/// object so no borrow is held across the call
struct ClosureParts {
    package: Rc<FunctionPackage>,
    env: Env,
    lexical_this: Option<(JsValue, JsValue)>,
    class_constructor: bool,
}

enum Callee {
    Native(NativeFn),
    Bytecode(ClosureParts),
}

/// A logical runtime instance. Single-threaded; independent agents share nothing.
pub struct Agent {
    config: VmConfig,
    realm: Rc<Realm>,
    contexts: Vec<ExecutionContext>,
    /// Module records by specifier, registered by `PushModuleEnv`
    modules: FxHashMap<JsString, Env>,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            realm: Rc::new(Realm::new()),
            contexts: Vec::new(),
            modules: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn global_object(&self) -> JsObjectRef {
        self.realm.global_object.cheap_clone()
    }

    pub fn global_env(&self) -> Env {
        self.realm.global_env.cheap_clone()
    }

    /// The running execution context, if any code is executing
    pub fn running_context(&self) -> Option<&ExecutionContext> {
        self.contexts.last()
    }

    /// Number of bytecode activations currently on the host stack
    pub fn call_depth(&self) -> usize {
        self.contexts.len()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Run a script package against the global environment.
    /// The receiver of script code is the global object.
    #[instrument(skip_all)]
    pub fn run_script(&mut self, package: FunctionPackage) -> Result<JsValue, ExecError> {
        let package = self.load(package)?;
        let receiver = JsValue::Object(self.global_object());
        let env = self.global_env();
        self.run_top_level(package, receiver, env)
    }

    /// Run a module package. A `PushModuleEnv` in its body registers the
    /// module record under `specifier` so later modules can import from it.
    #[instrument(skip_all, fields(specifier = %specifier))]
    pub fn run_module(&mut self, specifier: &str, package: FunctionPackage) -> Result<JsValue, ExecError> {
        let package = self.load(package)?;
        let env = self.global_env();
        let locals = prepare_locals(&package, JsValue::Undefined, JsValue::Undefined, &[])?;
        self.check_depth()?;
        self.push_context(None, env.cheap_clone(), Some(JsString::from(specifier)));
        let result = self.execute(Activation {
            function: None,
            package,
            locals,
            env,
            arguments: Vec::new(),
        });
        self.contexts.pop();
        result.map(|(value, _)| value)
    }

    fn load(&self, package: FunctionPackage) -> Result<Rc<FunctionPackage>, ExecError> {
        if self.config.validate_on_load {
            validate(&package)?;
        }
        Ok(Rc::new(package))
    }

    fn run_top_level(
        &mut self,
        package: Rc<FunctionPackage>,
        receiver: JsValue,
        env: Env,
    ) -> Result<JsValue, ExecError> {
        let locals = prepare_locals(&package, receiver, JsValue::Undefined, &[])?;
        let (value, _) = self.run_activation(Activation {
            function: None,
            package,
            locals,
            env,
            arguments: Vec::new(),
        })?;
        Ok(value)
    }

    /// Read a global binding the way `LoadGlobal` does
    pub fn get_global(&mut self, name: &str) -> Result<JsValue, ExecError> {
        self.load_global(&JsString::from(name))
    }

    /// Create or overwrite a property of the global object
    pub fn set_global(&mut self, name: &str, value: JsValue) {
        self.realm
            .global_object
            .borrow_mut()
            .set_property(PropertyKey::from(name), value);
    }

    /// Module record registered under `specifier`
    pub fn module_env(&self, specifier: &str) -> Option<Env> {
        self.modules.get(specifier).cloned()
    }

    /// Register `env` under the running context's source, if it has one
    pub(crate) fn register_running_module(&mut self, env: &Env) {
        let source = self.contexts.last().and_then(|ctx| ctx.source.clone());
        if let Some(source) = source {
            debug!(specifier = %source, "registered module record");
            self.modules.insert(source, env.cheap_clone());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Activations
    // ═══════════════════════════════════════════════════════════════════════════════

    fn check_depth(&self) -> Result<(), ExecError> {
        if self.contexts.len() >= self.config.max_call_depth {
            return Err(JsError::range_error("Maximum call stack size exceeded").into());
        }
        Ok(())
    }

    fn push_context(&mut self, function: Option<JsObjectRef>, environment: Env, source: Option<JsString>) {
        self.contexts.push(ExecutionContext {
            realm: self.realm.cheap_clone(),
            function,
            environment,
            source,
        });
    }

    /// Run a non-coroutine activation to completion. Returns the completion
    /// value and the final receiver (derived constructors read it).
    fn run_activation(&mut self, activation: Activation) -> Result<(JsValue, JsValue), ExecError> {
        self.check_depth()?;
        self.push_context(activation.function.clone(), activation.env.cheap_clone(), None);
        let result = self.execute(activation);
        self.contexts.pop();
        result
    }

    fn execute(&mut self, activation: Activation) -> Result<(JsValue, JsValue), ExecError> {
        debug!(
            function = ?activation.package.name(),
            depth = self.contexts.len(),
            "entering activation"
        );
        let mut vm = BytecodeVM::new(activation, self.config.initial_stack_capacity);
        let value = match vm.run(self)? {
            VmResult::Complete(value) => value,
            VmResult::Yield(_) => return Err(VmError::NotACoroutine { op: "Yield" }.into()),
            VmResult::Await(_) => return Err(VmError::NotACoroutine { op: "Await" }.into()),
        };
        debug!(depth = self.contexts.len(), "leaving activation");
        Ok((value, vm.receiver()?))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Closures
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Instantiate a function package over `env`
    pub fn create_closure(&self, package: Rc<FunctionPackage>, env: Env) -> JsObjectRef {
        self.instantiate_closure(package, env, None, None, false)
    }

    pub(crate) fn instantiate_closure(
        &self,
        package: Rc<FunctionPackage>,
        env: Env,
        home_object: Option<JsObjectRef>,
        lexical_this: Option<(JsValue, JsValue)>,
        class_constructor: bool,
    ) -> JsObjectRef {
        let name = package.name().cloned().unwrap_or_else(|| JsString::from(""));
        let arity = package.param_count();
        let flags = package.flags();
        let closure = Closure {
            package,
            env,
            home_object,
            lexical_this,
            class_constructor,
        };
        let constructor = closure.is_constructor();
        let function = JsObjectRef::new(JsObject::new(
            Some(self.realm.intrinsics.function_prototype.cheap_clone()),
            ExoticObject::Function(JsFunction::Bytecode(closure)),
        ));
        define_function_metadata(&function, name, arity);

        // Classes install their own prototype object
        if class_constructor {
            return function;
        }
        let prototype = if flags.generator {
            Some(JsObjectRef::new(JsObject::ordinary(Some(
                self.realm.intrinsics.generator_prototype.cheap_clone(),
            ))))
        } else if constructor {
            let proto = self.realm.create_object();
            proto.borrow_mut().define_property(
                PropertyKey::from("constructor"),
                Property::hidden(JsValue::Object(function.cheap_clone())),
            );
            Some(proto)
        } else {
            None
        };
        if let Some(prototype) = prototype {
            function.borrow_mut().define_property(
                PropertyKey::from("prototype"),
                Property {
                    configurable: false,
                    ..Property::hidden(JsValue::Object(prototype))
                },
            );
        }
        function
    }

    fn callee_of(&self, function: &JsObjectRef) -> Option<Callee> {
        match function.borrow().as_function()? {
            JsFunction::Native(native) => Some(Callee::Native(native.func)),
            JsFunction::Bytecode(closure) => Some(Callee::Bytecode(ClosureParts {
                package: closure.package.cheap_clone(),
                env: closure.env.cheap_clone(),
                lexical_this: closure.lexical_this.clone(),
                class_constructor: closure.class_constructor,
            })),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Call / construct
    // ═══════════════════════════════════════════════════════════════════════════════

    /// [[Call]]: invoke `callee` with `this` and `args`
    pub fn call(&mut self, callee: &JsValue, this: JsValue, args: &[JsValue]) -> Result<JsValue, ExecError> {
        let JsValue::Object(function) = callee else {
            return Err(not_a_function(callee).into());
        };
        let Some(target) = self.callee_of(function) else {
            return Err(not_a_function(callee).into());
        };

        match target {
            Callee::Native(func) => func(self, this, args),
            Callee::Bytecode(parts) => {
                if parts.class_constructor {
                    let name = parts.package.name().map_or("anonymous", |n| n.as_str());
                    return Err(JsError::type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        name
                    ))
                    .into());
                }
                let (receiver, new_target) = match parts.lexical_this {
                    Some(captured) => captured,
                    None => (self.bind_receiver(&parts.package, this), JsValue::Undefined),
                };
                let locals = prepare_locals(&parts.package, receiver, new_target, args)?;

                if parts.package.flags().is_coroutine() {
                    return self.create_coroutine(function, parts.package, parts.env, locals, args);
                }
                let (value, _) = self.run_activation(Activation {
                    function: Some(function.cheap_clone()),
                    package: parts.package,
                    locals,
                    env: parts.env,
                    arguments: args.to_vec(),
                })?;
                Ok(value)
            }
        }
    }

    /// Sloppy functions see the global object in place of a nullish receiver
    fn bind_receiver(&self, package: &FunctionPackage, this: JsValue) -> JsValue {
        if !package.is_strict() && this.is_null_or_undefined() {
            JsValue::Object(self.global_object())
        } else {
            this
        }
    }

    /// [[Construct]]: `new target(...args)` with an explicit new-target
    pub fn construct(
        &mut self,
        target: &JsValue,
        args: &[JsValue],
        new_target: &JsValue,
    ) -> Result<JsValue, ExecError> {
        let function = match target {
            JsValue::Object(obj) if obj.borrow().is_constructor() => obj.cheap_clone(),
            _ => return Err(not_a_constructor(target).into()),
        };
        let Some(callee) = self.callee_of(&function) else {
            return Err(not_a_constructor(target).into());
        };

        match callee {
            Callee::Native(func) => {
                let result = func(self, JsValue::Undefined, args)?;
                // Subclass instances of built-ins take the subclass prototype
                if !new_target.strict_equals(target) {
                    if let JsValue::Object(obj) = &result {
                        let fallback = obj.prototype();
                        let proto = self.prototype_from_constructor(new_target, fallback)?;
                        obj.borrow_mut().prototype = proto;
                    }
                }
                Ok(result)
            }
            Callee::Bytecode(parts) => {
                let derived = parts.package.flags().derived;
                let receiver = if derived {
                    JsValue::Uninitialized
                } else {
                    let fallback = Some(self.realm.intrinsics.object_prototype.cheap_clone());
                    let proto = self.prototype_from_constructor(new_target, fallback)?;
                    JsValue::Object(JsObjectRef::new(JsObject::ordinary(proto)))
                };
                let locals = prepare_locals(&parts.package, receiver, new_target.clone(), args)?;
                let (value, receiver) = self.run_activation(Activation {
                    function: Some(function),
                    package: parts.package,
                    locals,
                    env: parts.env,
                    arguments: args.to_vec(),
                })?;

                if value.is_object() {
                    return Ok(value);
                }
                if derived && !value.is_undefined() {
                    return Err(JsError::type_error(
                        "Derived constructors may only return object or undefined",
                    )
                    .into());
                }
                match receiver {
                    JsValue::Object(_) => Ok(receiver),
                    _ => Err(JsError::reference_error(
                        "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                    )
                    .into()),
                }
            }
        }
    }

    /// `new_target.prototype` if it is an object, else `fallback`
    fn prototype_from_constructor(
        &mut self,
        new_target: &JsValue,
        fallback: Option<JsObjectRef>,
    ) -> Result<Option<JsObjectRef>, ExecError> {
        match self.get_property(new_target, &PropertyKey::from("prototype"))? {
            JsValue::Object(proto) => Ok(Some(proto)),
            _ => Ok(fallback),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Coroutines
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Calling a generator or async function creates its coroutine object;
    /// the body does not run until the first resumption.
    fn create_coroutine(
        &mut self,
        function: &JsObjectRef,
        package: Rc<FunctionPackage>,
        env: Env,
        locals: Locals,
        args: &[JsValue],
    ) -> Result<JsValue, ExecError> {
        let (kind, proto) = if package.flags().generator {
            let own = self.get_property(
                &JsValue::Object(function.cheap_clone()),
                &PropertyKey::from("prototype"),
            )?;
            let proto = match own {
                JsValue::Object(proto) => proto,
                _ => self.realm.intrinsics.generator_prototype.cheap_clone(),
            };
            (CoroutineKind::Generator, proto)
        } else {
            (
                CoroutineKind::Async,
                self.realm.intrinsics.async_task_prototype.cheap_clone(),
            )
        };

        let module_env = env.enclosing_module();
        let coroutine = CoroutineRef::new(
            kind,
            SuspendedFrame {
                function: function.cheap_clone(),
                package,
                locals,
                env,
                module_env,
                arguments: args.to_vec(),
            },
        );
        Ok(JsValue::Object(JsObjectRef::new(JsObject::new(
            Some(proto),
            ExoticObject::Coroutine(coroutine),
        ))))
    }

    /// Drive a generator one step. Returns the `{ value, done }` result.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub fn generator_resume(
        &mut self,
        generator: &JsValue,
        mode: ResumeMode,
        value: JsValue,
    ) -> Result<JsValue, ExecError> {
        let Some(coroutine) = coroutine_of(generator, CoroutineKind::Generator) else {
            return Err(JsError::type_error(format!(
                "{} called on incompatible receiver {}",
                resume_method_name(mode),
                describe_value(generator)
            ))
            .into());
        };

        match (coroutine.status(), mode) {
            (CoroutineStatus::Executing, _) => {
                return Err(JsError::type_error("Generator is already running").into());
            }
            (CoroutineStatus::Completed, ResumeMode::Next) => {
                return Ok(self.realm.create_iter_result(JsValue::Undefined, true));
            }
            (_, ResumeMode::Return) => {
                coroutine.complete();
                return Ok(self.realm.create_iter_result(value, true));
            }
            (CoroutineStatus::Completed | CoroutineStatus::SuspendedStart, ResumeMode::Throw) => {
                coroutine.complete();
                return Err(JsError::thrown(value).into());
            }
            _ => {}
        }

        match self.drive_coroutine(&coroutine, mode, value)? {
            VmResult::Yield(value) => Ok(self.realm.create_iter_result(value, false)),
            VmResult::Complete(value) | VmResult::Await(value) => {
                Ok(self.realm.create_iter_result(value, true))
            }
        }
    }

    pub fn generator_next(&mut self, generator: &JsValue, value: JsValue) -> Result<JsValue, ExecError> {
        self.generator_resume(generator, ResumeMode::Next, value)
    }

    pub fn generator_return(&mut self, generator: &JsValue, value: JsValue) -> Result<JsValue, ExecError> {
        self.generator_resume(generator, ResumeMode::Return, value)
    }

    pub fn generator_throw(&mut self, generator: &JsValue, value: JsValue) -> Result<JsValue, ExecError> {
        self.generator_resume(generator, ResumeMode::Throw, value)
    }

    /// Drive an async task to its next `Await` or to completion. The host
    /// settles the awaited value and passes the outcome back in with
    /// `Next` (fulfilled) or `Throw` (rejected).
    #[instrument(skip_all, fields(mode = ?mode))]
    pub fn resume_async(
        &mut self,
        task: &JsValue,
        mode: ResumeMode,
        value: JsValue,
    ) -> Result<AsyncStep, ExecError> {
        let Some(coroutine) = coroutine_of(task, CoroutineKind::Async) else {
            return Err(JsError::type_error(format!(
                "{} is not an async task",
                describe_value(task)
            ))
            .into());
        };

        match (coroutine.status(), mode) {
            (CoroutineStatus::Executing, _) => {
                return Err(JsError::type_error("Async function is already running").into());
            }
            (CoroutineStatus::Completed, _) => {
                return Err(JsError::type_error("Async function has already completed").into());
            }
            (_, ResumeMode::Return) => {
                coroutine.complete();
                return Ok(AsyncStep::Complete(value));
            }
            (CoroutineStatus::SuspendedStart, ResumeMode::Throw) => {
                coroutine.complete();
                return Err(JsError::thrown(value).into());
            }
            _ => {}
        }

        match self.drive_coroutine(&coroutine, mode, value)? {
            VmResult::Await(value) => Ok(AsyncStep::Awaiting(value)),
            VmResult::Complete(value) | VmResult::Yield(value) => Ok(AsyncStep::Complete(value)),
        }
    }

    /// Rehydrate a parked activation, run it to its next suspension, and
    /// park it again. Any failure completes the coroutine.
    fn drive_coroutine(
        &mut self,
        coroutine: &CoroutineRef,
        mode: ResumeMode,
        value: JsValue,
    ) -> Result<VmResult, ExecError> {
        self.check_depth()?;
        let kind = coroutine.kind();
        let mut parked = coroutine.begin().ok_or(VmError::NotParked)?;
        parked.state.sent_value = value;
        parked.state.resume_mode = mode;
        debug!(?kind, phase = parked.state.phase, "resuming coroutine");

        self.push_context(
            Some(parked.frame.function.cheap_clone()),
            parked.frame.env.cheap_clone(),
            None,
        );
        let mut vm = BytecodeVM::resume(parked, self.config.initial_stack_capacity);
        let result = vm.run(self);
        self.contexts.pop();

        let suspended = match (result, kind) {
            (Ok(VmResult::Complete(value)), _) => {
                coroutine.complete();
                debug!(?kind, "coroutine completed");
                return Ok(VmResult::Complete(value));
            }
            (Ok(VmResult::Yield(value)), CoroutineKind::Generator) => VmResult::Yield(value),
            (Ok(VmResult::Await(value)), CoroutineKind::Async) => VmResult::Await(value),
            (Ok(VmResult::Yield(_)), CoroutineKind::Async) => {
                coroutine.complete();
                return Err(VmError::WrongCoroutineKind {
                    op: "Yield",
                    kind: "async",
                }
                .into());
            }
            (Ok(VmResult::Await(_)), CoroutineKind::Generator) => {
                coroutine.complete();
                return Err(VmError::WrongCoroutineKind {
                    op: "Await",
                    kind: "generator",
                }
                .into());
            }
            (Err(err), _) => {
                coroutine.complete();
                return Err(err);
            }
        };

        match vm.into_parked() {
            Ok(parked) => coroutine.park(parked),
            Err(err) => {
                coroutine.complete();
                return Err(err.into());
            }
        }
        debug!(?kind, phase = ?coroutine.phase(), "coroutine suspended");
        Ok(suspended)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════════════════

    /// The value a handler block receives for a language exception
    pub fn error_to_value(&self, err: &JsError) -> JsValue {
        match err {
            JsError::ThrownValue { value } => value.clone(),
            JsError::TypeError { message }
            | JsError::RangeError { message }
            | JsError::ReferenceError { message }
            | JsError::SyntaxError { message } => {
                let kind = err.kind().unwrap_or(crate::error::ErrorKind::Error);
                JsValue::Object(create_error_object(
                    &self.realm,
                    kind,
                    Some(JsString::from(message.as_str())),
                ))
            }
        }
    }
}

/// Locals with the receiver, new-target and parameter slots filled in
fn prepare_locals(
    package: &FunctionPackage,
    receiver: JsValue,
    new_target: JsValue,
    args: &[JsValue],
) -> Result<Locals, VmError> {
    let mut locals = Locals::new(package.slot_kinds());
    locals.set_value(RECEIVER_SLOT, receiver)?;
    locals.set_value(NEW_TARGET_SLOT, new_target)?;
    for index in 0..package.param_count() {
        let value = args.get(index as usize).cloned().unwrap_or_default();
        locals.set_value(RESERVED_SLOTS + index, value)?;
    }
    Ok(locals)
}

fn coroutine_of(value: &JsValue, kind: CoroutineKind) -> Option<CoroutineRef> {
    let JsValue::Object(obj) = value else {
        return None;
    };
    match &obj.borrow().exotic {
        ExoticObject::Coroutine(coroutine) if coroutine.kind() == kind => Some(coroutine.clone()),
        _ => None,
    }
}

fn resume_method_name(mode: ResumeMode) -> &'static str {
    match mode {
        ResumeMode::Next => "Generator.prototype.next",
        ResumeMode::Throw => "Generator.prototype.throw",
        ResumeMode::Return => "Generator.prototype.return",
    }
}

pub(crate) fn not_a_function(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not a function", describe_value(value)))
}

pub(crate) fn not_a_constructor(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not a constructor", describe_value(value)))
}
