//! Bytecode Virtual Machine
//!
//! Executes one activation of a [`FunctionPackage`] on an operand stack.
//! The VM owns the instruction pointer, the operand stack, the typed locals
//! and the saved handler heights; everything language-level is delegated to
//! the [`Agent`].
//!
//! Handler regions are tracked on control transfers. A jump, an unwind or
//! the start of an activation drops the saved heights of regions the target
//! is outside of, and records the current height for regions the target
//! enters from outside. A language exception unwinds to the innermost
//! region covering the faulting offset.

use tracing::{debug, trace, warn};

use crate::bytecode::{
    BlockId, Constant, ConstantIndex, FunctionPackage, ImportEntry, NEW_TARGET_SLOT, Op,
    RECEIVER_SLOT, ScopeLayout,
};
use crate::environment::Env;
use crate::error::{ExecError, JsError, VmError};
use crate::prelude::*;
use crate::value::{CheapClone, JsFunction, JsObjectRef, JsString, JsValue, PropertyKey};

use super::generator::{GeneratorState, ParkedActivation, ResumeMode, SuspendedFrame};
use super::stack::{Locals, OperandStack};
use super::{Activation, Agent, not_a_constructor};

/// How an activation stopped
#[derive(Debug)]
pub enum VmResult {
    /// Reached a `Return`
    Complete(JsValue),
    /// Suspended at a `Yield`
    Yield(JsValue),
    /// Suspended at an `Await`
    Await(JsValue),
}

/// Outcome of executing one instruction
#[derive(Debug)]
pub enum StepResult {
    Continue,
    Done(VmResult),
}

/// The contract every executor of the instruction set honors: identical
/// exceptions, stack discipline and handler unwinding.
pub trait OpcodeExecutor {
    /// Execute the instruction at the current offset
    fn step(&mut self, agent: &mut Agent) -> Result<StepResult, ExecError>;

    /// Step until the activation returns or suspends
    fn run(&mut self, agent: &mut Agent) -> Result<VmResult, ExecError> {
        loop {
            if let StepResult::Done(result) = self.step(agent)? {
                return Ok(result);
            }
        }
    }
}

/// Result of a single opcode
enum OpResult {
    /// Fall through to the next offset
    Continue,
    Jump(BlockId),
    Done(VmResult),
}

/// The bytecode virtual machine
pub struct BytecodeVM {
    package: Rc<FunctionPackage>,
    /// Offset of the next instruction
    ip: usize,
    stack: OperandStack,
    locals: Locals,
    env: Env,
    /// Module record of the activation, if it runs module code
    module_env: Option<Env>,
    /// Active function; `None` for script and module top level
    function: Option<JsObjectRef>,
    arguments: Vec<JsValue>,
    /// `(region, height)` for every region entered and not yet left
    handler_heights: Vec<(usize, usize)>,
    /// Present for generator and async activations
    generator: Option<GeneratorState>,
}

impl BytecodeVM {
    pub(crate) fn new(activation: Activation, capacity: usize) -> Self {
        let Activation {
            function,
            package,
            locals,
            env,
            arguments,
        } = activation;
        let ip = entry_offset(&package);
        let module_env = env.enclosing_module();
        let mut vm = Self {
            package,
            ip,
            stack: OperandStack::with_capacity(capacity),
            locals,
            env,
            module_env,
            function,
            arguments,
            handler_heights: Vec::new(),
            generator: None,
        };
        vm.transfer(None, ip);
        vm
    }

    /// Rehydrate a parked coroutine. Execution restarts at the entry block,
    /// whose jump table dispatches on the saved phase.
    pub fn resume(parked: ParkedActivation, capacity: usize) -> Self {
        let ParkedActivation { mut state, frame } = parked;
        let handler_heights = std::mem::take(&mut state.handler_heights);
        let ip = entry_offset(&frame.package);
        Self {
            package: frame.package,
            ip,
            stack: OperandStack::with_capacity(capacity),
            locals: frame.locals,
            env: frame.env,
            module_env: frame.module_env,
            function: Some(frame.function),
            arguments: frame.arguments,
            handler_heights,
            generator: Some(state),
        }
    }

    /// Move the suspended activation back into a parked snapshot
    pub fn into_parked(self) -> Result<ParkedActivation, VmError> {
        let mut state = self.generator.ok_or(VmError::NotACoroutine { op: "suspend" })?;
        let function = self.function.ok_or(VmError::NotACoroutine { op: "suspend" })?;
        state.handler_heights = self.handler_heights;
        state.sent_value = JsValue::Undefined;
        Ok(ParkedActivation {
            state,
            frame: SuspendedFrame {
                function,
                package: self.package,
                locals: self.locals,
                env: self.env,
                module_env: self.module_env,
                arguments: self.arguments,
            },
        })
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    pub fn handler_heights(&self) -> &[(usize, usize)] {
        &self.handler_heights
    }

    /// Current receiver slot
    pub fn receiver(&self) -> Result<JsValue, VmError> {
        self.locals.get_value(RECEIVER_SLOT)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Handler regions
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Control moves from `from` to `to`. Blocks never fall through, so
    /// this is the only place a region can be entered or left.
    fn transfer(&mut self, from: Option<usize>, to: usize) {
        let package = self.package.cheap_clone();
        self.handler_heights.retain(|(r, _)| {
            package.region(*r).is_some_and(|region| region.covers(to))
        });
        let height = self.stack.len();
        for (index, _) in package.regions_entered(from, to) {
            self.handler_heights.retain(|(r, _)| *r != index);
            self.handler_heights.push((index, height));
        }
        self.ip = to;
    }

    /// Route a failed instruction to its handler, or give the error back
    fn unwind(&mut self, agent: &mut Agent, err: ExecError, offset: usize) -> Result<(), ExecError> {
        let js_error = match err {
            ExecError::Runtime(js_error) => js_error,
            internal => {
                warn!(offset, error = %internal, "internal error terminates activation");
                return Err(internal);
            }
        };

        let Some(index) = self.package.innermost_region(offset) else {
            return Err(js_error.into());
        };
        let Some(region) = self.package.region(index).copied() else {
            return Err(VmError::HandlerNotEntered { region: index }.into());
        };
        let Some(height) = self
            .handler_heights
            .iter()
            .rev()
            .find(|(r, _)| *r == index)
            .map(|(_, h)| *h)
        else {
            warn!(offset, region = index, "exception inside a region that was never entered");
            return Err(VmError::HandlerNotEntered { region: index }.into());
        };

        debug!(offset, region = index, height, handler = %region.handler, "unwinding to handler");
        let handler = self.offset_of(region.handler)?;
        self.stack.truncate(height);
        self.stack.push(agent.error_to_value(&js_error));
        self.transfer(Some(offset), handler);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════════

    fn offset_of(&self, block: BlockId) -> Result<usize, VmError> {
        self.package
            .block_offset(block)
            .ok_or(VmError::UnknownBlock(block))
    }

    fn push(&mut self, value: JsValue) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<JsValue, VmError> {
        self.stack.pop(self.ip)
    }

    fn peek(&self) -> Result<JsValue, VmError> {
        self.stack.peek(self.ip).cloned()
    }

    /// `[lhs rhs] -> [bool]`
    fn compare(&mut self, agent: &mut Agent, comparison: Comparison) -> Result<(), ExecError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = comparison.evaluate(agent, &lhs, &rhs)?;
        self.push(JsValue::Boolean(result));
        Ok(())
    }

    fn constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.package.constant(index)
    }

    fn string_constant(&self, index: ConstantIndex) -> Result<JsString, VmError> {
        match self.constant(index) {
            Some(Constant::String(s)) => Ok(s.cheap_clone()),
            _ => Err(VmError::BadConstant {
                index,
                expected: "string",
            }),
        }
    }

    fn named_key(&self, index: ConstantIndex) -> Result<PropertyKey, VmError> {
        Ok(PropertyKey::from(self.string_constant(index)?))
    }

    fn function_constant(&self, index: ConstantIndex) -> Result<Rc<FunctionPackage>, VmError> {
        match self.constant(index) {
            Some(Constant::Function(package)) => Ok(package.cheap_clone()),
            _ => Err(VmError::BadConstant {
                index,
                expected: "function",
            }),
        }
    }

    fn scope_constant(&self, index: ConstantIndex) -> Result<Rc<ScopeLayout>, VmError> {
        match self.constant(index) {
            Some(Constant::Scope(layout)) => Ok(layout.cheap_clone()),
            _ => Err(VmError::BadConstant {
                index,
                expected: "scope",
            }),
        }
    }

    fn import_constant(&self, index: ConstantIndex) -> Result<ImportEntry, VmError> {
        match self.constant(index) {
            Some(Constant::Import(entry)) => Ok(entry.clone()),
            _ => Err(VmError::BadConstant {
                index,
                expected: "import",
            }),
        }
    }

    fn literal_constant(&self, index: ConstantIndex) -> Result<JsValue, VmError> {
        match self.constant(index) {
            Some(Constant::Number(n)) => Ok(JsValue::Number(*n)),
            Some(Constant::String(s)) => Ok(JsValue::String(s.cheap_clone())),
            _ => Err(VmError::BadConstant {
                index,
                expected: "number or string",
            }),
        }
    }

    fn is_strict(&self) -> bool {
        self.package.is_strict()
    }

    fn env_at(&self, distance: u32) -> Result<Env, VmError> {
        self.env
            .ancestor(distance)
            .ok_or(VmError::EnvironmentDepth { distance })
    }

    fn module_record(&self, op: &'static str) -> Result<Env, VmError> {
        self.module_env.clone().ok_or(VmError::WrongEnvironment {
            op,
            required: "module",
        })
    }

    fn generator_state(&mut self, op: &'static str) -> Result<&mut GeneratorState, VmError> {
        self.generator.as_mut().ok_or(VmError::NotACoroutine { op })
    }

    /// Home object of the active function, inherited by arrows
    fn home_object(&self) -> Option<JsObjectRef> {
        let function = self.function.as_ref()?;
        match function.borrow().as_function()? {
            JsFunction::Bytecode(closure) => closure.home_object.clone(),
            JsFunction::Native(_) => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════════════

    fn execute_op(&mut self, agent: &mut Agent, op: &Op) -> Result<OpResult, ExecError> {
        match op {
            // Constants
            Op::PushUndefined => self.push(JsValue::Undefined),
            Op::PushNull => self.push(JsValue::Null),
            Op::PushBool(b) => self.push(JsValue::Boolean(*b)),
            Op::PushInt(n) => self.push(JsValue::Number(f64::from(*n))),
            Op::PushConst(index) => {
                let value = self.literal_constant(*index)?;
                self.push(value);
            }

            // Stack shuffle
            Op::Pop => {
                self.pop()?;
            }
            Op::Dup => {
                let value = self.peek()?;
                self.push(value);
            }
            Op::DupUnder => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b.clone());
                self.push(a);
                self.push(b);
            }
            Op::Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b);
                self.push(a);
            }

            // Locals
            Op::LoadValue(slot) => {
                let value = self.locals.get_value(*slot)?;
                self.push(value);
            }
            Op::StoreValue(slot) => {
                let value = self.pop()?;
                self.locals.set_value(*slot, value)?;
            }
            Op::LoadInt(slot) => {
                let n = self.locals.get_int(*slot)?;
                self.push(JsValue::Number(f64::from(n)));
            }
            Op::StoreInt(slot) => {
                let value = self.pop()?;
                self.locals.set_int(*slot, &value)?;
            }
            Op::IncInt { slot, delta } => self.locals.increment(*slot, *delta)?,
            Op::LoadArguments => {
                let array = agent.realm().create_array(self.arguments.clone());
                self.push(JsValue::Object(array));
            }
            Op::CreateRestArray(start) => {
                let rest = self
                    .arguments
                    .get(*start as usize..)
                    .map(<[JsValue]>::to_vec)
                    .unwrap_or_default();
                let array = agent.realm().create_array(rest);
                self.push(JsValue::Object(array));
            }

            // Operators
            Op::Binary(operator) => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let result = agent.binary_op(*operator, &lhs, &rhs)?;
                self.push(result);
            }
            Op::Unary(operator) => {
                let operand = self.pop()?;
                let result = agent.unary_op(*operator, &operand)?;
                self.push(result);
            }
            Op::ToNumber => {
                let value = self.pop()?;
                let n = agent.to_number(&value)?;
                self.push(JsValue::Number(n));
            }
            Op::Typeof => {
                let value = self.pop()?;
                self.push(JsValue::from(value.type_of()));
            }
            Op::StrictEquals => self.compare(agent, Comparison::StrictEquals)?,
            Op::StrictNotEquals => self.compare(agent, Comparison::StrictNotEquals)?,
            Op::LooseEquals => self.compare(agent, Comparison::LooseEquals)?,
            Op::LooseNotEquals => self.compare(agent, Comparison::LooseNotEquals)?,
            Op::LessThan => self.compare(agent, Comparison::LessThan)?,
            Op::GreaterThan => self.compare(agent, Comparison::GreaterThan)?,
            Op::LessThanOrEqual => self.compare(agent, Comparison::LessThanOrEqual)?,
            Op::GreaterThanOrEqual => self.compare(agent, Comparison::GreaterThanOrEqual)?,
            Op::InstanceOf => {
                let constructor = self.pop()?;
                let value = self.pop()?;
                let result = agent.instance_of(&value, &constructor)?;
                self.push(JsValue::Boolean(result));
            }
            Op::In => {
                let object = self.pop()?;
                let key = self.pop()?;
                let result = agent.has_property_in(&key, &object)?;
                self.push(JsValue::Boolean(result));
            }

            // Properties
            Op::GetNamed(index) => {
                let key = self.named_key(*index)?;
                let object = self.pop()?;
                let value = agent.get_property(&object, &key)?;
                self.push(value);
            }
            Op::GetKeyed => {
                let key = self.pop()?;
                let object = self.pop()?;
                let value = agent.get_keyed(&object, &key)?;
                self.push(value);
            }
            Op::SetNamed(index) => {
                let key = self.named_key(*index)?;
                let value = self.pop()?;
                let object = self.pop()?;
                agent.set_property(&object, key, value, self.is_strict())?;
            }
            Op::SetKeyed => {
                let value = self.pop()?;
                let key = self.pop()?;
                let object = self.pop()?;
                agent.set_keyed(&object, &key, value, self.is_strict())?;
            }
            Op::DeleteSloppy | Op::DeleteStrict => {
                let key = self.pop()?;
                let object = self.pop()?;
                let strict = matches!(op, Op::DeleteStrict);
                let deleted = agent.delete_keyed(&object, &key, strict)?;
                self.push(JsValue::Boolean(deleted));
            }

            // Object / array construction
            Op::CreateObject => {
                let object = agent.realm().create_object();
                self.push(JsValue::Object(object));
            }
            Op::CreateArray => {
                let array = agent.realm().create_array(Vec::new());
                self.push(JsValue::Object(array));
            }
            Op::DefineField(index) => {
                let key = self.named_key(*index)?;
                let value = self.pop()?;
                let object = self.peek()?;
                agent.define_field(&object, key, value)?;
            }
            Op::StoreArrayIndexed(index) => {
                let value = self.pop()?;
                let array = self.peek()?;
                agent.store_array_index(&array, *index, value)?;
            }
            Op::ArrayPush => {
                let value = self.pop()?;
                let array = self.peek()?;
                agent.array_append(&array, vec![value])?;
            }
            Op::SpreadIntoArray => {
                let iterable = self.pop()?;
                let array = self.peek()?;
                let values = agent.iterate_to_list(&iterable)?;
                agent.array_append(&array, values)?;
            }

            // Calls
            Op::Call(argc) => {
                let result = self.op_call(agent, *argc)?;
                self.push(result);
            }
            Op::CallSpread => {
                let target = self.pop()?;
                let receiver = self.pop()?;
                let list = self.pop()?;
                let args = agent.spread_arguments(&list)?;
                let result = agent.call(&target, receiver, &args)?;
                self.push(result);
            }
            Op::Construct(argc) => {
                let result = self.op_construct(agent, *argc)?;
                self.push(result);
            }
            Op::ConstructSpread => {
                let target = self.pop()?;
                let new_target = self.pop()?;
                let list = self.pop()?;
                if !target.is_constructor() {
                    return Err(not_a_constructor(&target).into());
                }
                let args = agent.spread_arguments(&list)?;
                let result = agent.construct(&target, &args, &new_target)?;
                self.push(result);
            }
            Op::CreateClosure(index) => {
                let function = self.op_create_closure(agent, *index)?;
                self.push(JsValue::Object(function));
            }

            // Variables
            Op::DeclareGlobalVar(index) => {
                let name = self.string_constant(*index)?;
                agent.global_env().declare_global_var(&name)?;
            }
            Op::DeclareGlobalLexical { name, mutable } => {
                let name = self.string_constant(*name)?;
                agent.global_env().declare_global_lexical(&name, *mutable)?;
            }
            Op::InitializeGlobalLexical(index) => {
                let name = self.string_constant(*index)?;
                let value = self.pop()?;
                if !agent.global_env().initialize_binding(name.as_str(), value) {
                    return Err(VmError::UndeclaredBinding(name.to_string()).into());
                }
            }
            Op::LoadGlobal(index) => {
                let name = self.string_constant(*index)?;
                let value = agent.load_global(&name)?;
                self.push(value);
            }
            Op::StoreGlobal(index) => {
                let name = self.string_constant(*index)?;
                let value = self.pop()?;
                agent.store_global(&name, value, self.is_strict())?;
            }
            Op::TypeofGlobal(index) => {
                let name = self.string_constant(*index)?;
                let value = agent.typeof_global(&name)?;
                self.push(value);
            }
            Op::LoadVariable(index) => {
                let name = self.string_constant(*index)?;
                let value = agent.load_variable(&self.env, &name)?;
                self.push(value);
            }
            Op::StoreVariable(index) => {
                let name = self.string_constant(*index)?;
                let value = self.pop()?;
                agent.store_variable(&self.env, &name, value, self.is_strict())?;
            }
            Op::LoadLexical { slot, distance } => {
                let value = self.env_at(*distance)?.get_slot(*slot)?;
                self.push(value);
            }
            Op::StoreLexical { slot, distance } => {
                let value = self.pop()?;
                self.env_at(*distance)?.set_slot(*slot, value)?;
            }
            Op::InitializeLexical(slot) => {
                let value = self.pop()?;
                self.env.initialize_slot(*slot, value)?;
            }
            Op::LoadModuleVar(index) => {
                let name = self.string_constant(*index)?;
                let module = self.module_record("LoadModuleVar")?;
                let value = agent.load_module_var(&module, &name)?;
                self.push(value);
            }
            Op::StoreModuleVar(index) => {
                let name = self.string_constant(*index)?;
                let module = self.module_record("StoreModuleVar")?;
                let value = self.pop()?;
                agent.store_module_var(&module, &name, value)?;
            }
            Op::CreateImportBinding(index) => {
                let entry = self.import_constant(*index)?;
                let module = self.module_record("CreateImportBinding")?;
                agent.link_import(&module, &entry)?;
            }

            // Environments
            Op::PushDeclarativeEnv(index) => {
                let layout = self.scope_constant(*index)?;
                self.env = Env::declarative(self.env.cheap_clone(), &layout);
            }
            Op::PushModuleEnv(index) => {
                let layout = self.scope_constant(*index)?;
                let module = Env::module(self.env.cheap_clone(), &layout);
                agent.register_running_module(&module);
                self.env = module.cheap_clone();
                self.module_env = Some(module);
            }
            Op::PopEnv => {
                self.env = self.env.outer().ok_or(VmError::EnvironmentUnderflow)?;
            }

            // Exceptions
            Op::Throw => {
                let value = self.pop()?;
                return Err(JsError::thrown(value).into());
            }
            Op::ThrowConstantReassignment(_) => {
                return Err(JsError::type_error("Assignment to constant variable.").into());
            }
            Op::ThrowLexicalAccessError(index) => {
                if matches!(self.stack.peek(self.ip)?, JsValue::Uninitialized) {
                    let name = self.string_constant(*index)?;
                    return Err(JsError::uninitialized(name.as_str()).into());
                }
            }

            // Generators / async
            Op::GetGeneratorPhase => {
                let phase = self.generator_state("GetGeneratorPhase")?.phase;
                self.push(JsValue::Number(f64::from(phase)));
            }
            Op::SetGeneratorPhase(phase) => {
                self.generator_state("SetGeneratorPhase")?.phase = *phase;
            }
            Op::PushToGeneratorState => {
                let value = self.pop()?;
                self.generator_state("PushToGeneratorState")?.push_side(value);
            }
            Op::PopFromGeneratorState => {
                let value = self.generator_state("PopFromGeneratorState")?.pop_side()?;
                self.push(value);
            }
            Op::GeneratorSentValue => {
                let state = self.generator_state("GeneratorSentValue")?;
                let value = std::mem::take(&mut state.sent_value);
                if state.resume_mode == ResumeMode::Throw {
                    state.resume_mode = ResumeMode::Next;
                    return Err(JsError::thrown(value).into());
                }
                self.push(value);
            }
            Op::Yield => {
                let value = self.suspend("Yield")?;
                return Ok(OpResult::Done(VmResult::Yield(value)));
            }
            Op::Await => {
                let value = self.suspend("Await")?;
                return Ok(OpResult::Done(VmResult::Await(value)));
            }

            // Classes
            Op::CreateClass {
                constructor,
                has_heritage,
            } => {
                let heritage = if *has_heritage { Some(self.pop()?) } else { None };
                let package = self.function_constant(*constructor)?;
                let class = agent.create_class(package, self.env.cheap_clone(), heritage)?;
                self.push(JsValue::Object(class));
            }
            Op::AttachClassMethod {
                name,
                kind,
                is_static,
            } => {
                let key = self.named_key(*name)?;
                let method = self.pop()?;
                let class = self.peek()?;
                agent.attach_class_method(&class, key, &method, *kind, *is_static)?;
            }
            Op::GetSuperConstructor => {
                let constructor = agent.super_constructor(self.function.as_ref())?;
                self.push(constructor);
            }
            Op::LoadSuperProperty(index) => {
                let key = self.named_key(*index)?;
                let receiver = self.locals.get_value(RECEIVER_SLOT)?;
                let value = agent.load_super_property(self.home_object(), &key, &receiver)?;
                self.push(value);
            }

            // Iteration
            Op::GetIterator => {
                let iterable = self.pop()?;
                let iterator = agent.get_iterator(&iterable)?;
                self.push(iterator);
            }
            Op::IteratorNext => {
                let iterator = self.pop()?;
                let result = agent.iterator_next(&iterator)?;
                self.push(result);
            }
            Op::IteratorDone => {
                let result = self.pop()?;
                let done = agent.iterator_done(&result)?;
                self.push(JsValue::Boolean(done));
            }
            Op::IteratorValue => {
                let result = self.pop()?;
                let value = agent.iterator_value(&result)?;
                self.push(value);
            }

            // Control flow
            Op::Jump(target) => return Ok(OpResult::Jump(*target)),
            Op::JumpIf { if_true, if_false } => {
                let condition = self.pop()?;
                let target = if condition.to_boolean() { if_true } else { if_false };
                return Ok(OpResult::Jump(*target));
            }
            Op::JumpIfNullish {
                if_nullish,
                otherwise,
            } => {
                let value = self.pop()?;
                let target = if value.is_null_or_undefined() {
                    if_nullish
                } else {
                    otherwise
                };
                return Ok(OpResult::Jump(*target));
            }
            Op::JumpTable(targets) => {
                let index = self.pop()?;
                return Ok(OpResult::Jump(jump_table_target(targets, &index)?));
            }
            Op::Return => {
                let value = self.pop()?;
                return Ok(OpResult::Done(VmResult::Complete(value)));
            }
        }
        Ok(OpResult::Continue)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Larger opcodes
    // ═══════════════════════════════════════════════════════════════════════════════

    /// `[args.. receiver target] -> [result]`
    fn op_call(&mut self, agent: &mut Agent, argc: u32) -> Result<JsValue, ExecError> {
        let target = self.pop()?;
        let receiver = self.pop()?;
        let args = self.stack.pop_n(argc as usize, self.ip)?;
        agent.call(&target, receiver, &args)
    }

    /// `[args.. new_target target] -> [object]`. The constructor check is
    /// part of the opcode, made before any argument is looked at.
    fn op_construct(&mut self, agent: &mut Agent, argc: u32) -> Result<JsValue, ExecError> {
        let target = self.pop()?;
        let new_target = self.pop()?;
        let args = self.stack.pop_n(argc as usize, self.ip)?;
        if !target.is_constructor() {
            return Err(not_a_constructor(&target).into());
        }
        agent.construct(&target, &args, &new_target)
    }

    fn op_create_closure(&mut self, agent: &mut Agent, index: ConstantIndex) -> Result<JsObjectRef, ExecError> {
        let package = self.function_constant(index)?;
        let (home_object, lexical_this) = if package.flags().arrow {
            let receiver = self.locals.get_value(RECEIVER_SLOT)?;
            let new_target = self.locals.get_value(NEW_TARGET_SLOT)?;
            (self.home_object(), Some((receiver, new_target)))
        } else {
            (None, None)
        };
        Ok(agent.instantiate_closure(package, self.env.cheap_clone(), home_object, lexical_this, false))
    }

    /// Pop the suspended value; everything else must already be spilled
    fn suspend(&mut self, op: &'static str) -> Result<JsValue, VmError> {
        if self.generator.is_none() {
            return Err(VmError::NotACoroutine { op });
        }
        let value = self.pop()?;
        if !self.stack.is_empty() {
            return Err(VmError::UnspilledStack(op));
        }
        let phase = self.generator.as_ref().map_or(0, |state| state.phase);
        debug!(op, phase, "suspending activation");
        Ok(value)
    }
}

impl OpcodeExecutor for BytecodeVM {
    fn step(&mut self, agent: &mut Agent) -> Result<StepResult, ExecError> {
        let offset = self.ip;

        let package = self.package.cheap_clone();
        let op = package.op_at(offset).ok_or(VmError::FellOffEnd(offset))?;
        if agent.config().trace_dispatch {
            trace!(offset, height = self.stack.len(), op = %op, "dispatch");
        }

        match self.execute_op(agent, op) {
            Ok(OpResult::Continue) => {
                self.ip = offset + 1;
                Ok(StepResult::Continue)
            }
            Ok(OpResult::Jump(target)) => {
                let target = self.offset_of(target)?;
                self.transfer(Some(offset), target);
                Ok(StepResult::Continue)
            }
            Ok(OpResult::Done(result)) => Ok(StepResult::Done(result)),
            Err(err) => {
                self.unwind(agent, err, offset)?;
                Ok(StepResult::Continue)
            }
        }
    }
}

fn entry_offset(package: &FunctionPackage) -> usize {
    package
        .block_offset(package.entry())
        .unwrap_or(package.code().len())
}

fn jump_table_target(targets: &[BlockId], index: &JsValue) -> Result<BlockId, VmError> {
    let n = match index {
        JsValue::Number(n) => *n,
        _ => f64::NAN,
    };
    let out_of_range = VmError::JumpTableIndex {
        index: n,
        len: targets.len(),
    };
    if n.fract() != 0.0 || n < 0.0 {
        return Err(out_of_range);
    }
    targets.get(n as usize).copied().ok_or(out_of_range)
}

/// Boolean-producing binary opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    StrictEquals,
    StrictNotEquals,
    LooseEquals,
    LooseNotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl Comparison {
    fn evaluate(self, agent: &mut Agent, lhs: &JsValue, rhs: &JsValue) -> Result<bool, ExecError> {
        Ok(match self {
            Comparison::StrictEquals => lhs.strict_equals(rhs),
            Comparison::StrictNotEquals => !lhs.strict_equals(rhs),
            Comparison::LooseEquals => agent.loose_equals(lhs, rhs)?,
            Comparison::LooseNotEquals => !agent.loose_equals(lhs, rhs)?,
            Comparison::LessThan => agent.less_than(lhs, rhs)?,
            Comparison::GreaterThan => agent.greater_than(lhs, rhs)?,
            Comparison::LessThanOrEqual => agent.less_than_or_equal(lhs, rhs)?,
            Comparison::GreaterThanOrEqual => agent.greater_than_or_equal(lhs, rhs)?,
        })
    }
}
