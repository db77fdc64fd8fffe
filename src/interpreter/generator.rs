//! Generator suspension state
//!
//! A generator or async activation is an explicit, persisted state machine.
//! Suspending moves everything needed after resumption (locals, environment,
//! side stack, saved handler heights, phase) into a [`ParkedActivation`]
//! owned by the generator object. Resuming rehydrates a fresh VM loop from it.

use crate::bytecode::FunctionPackage;
use crate::environment::Env;
use crate::error::VmError;
use crate::prelude::*;
use crate::value::{JsObjectRef, JsValue};

use super::stack::Locals;

/// What a coroutine object is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineKind {
    Generator,
    /// Async function task, driven by the embedder
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Created, body not entered yet
    SuspendedStart,
    /// Parked at a `Yield`/`Await`
    SuspendedYield,
    Executing,
    Completed,
}

/// How the driver resumes a coroutine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// `GeneratorSentValue` produces the sent value
    Next,
    /// `GeneratorSentValue` raises the sent value
    Throw,
    /// Complete immediately with the sent value
    Return,
}

/// Locals and scope of a parked activation
pub struct SuspendedFrame {
    pub function: JsObjectRef,
    pub package: Rc<FunctionPackage>,
    pub locals: Locals,
    pub env: Env,
    pub module_env: Option<Env>,
    pub arguments: Vec<JsValue>,
}

/// Coroutine registers carried by the VM while the activation runs
pub struct GeneratorState {
    /// Resume point, the index the entry `JumpTable` dispatches on
    pub phase: u32,
    pub sent_value: JsValue,
    pub resume_mode: ResumeMode,
    /// Operand values spilled across the suspension
    pub side_stack: Vec<JsValue>,
    /// `(region, height)` pairs live at the suspension point
    pub handler_heights: Vec<(usize, usize)>,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            phase: 0,
            sent_value: JsValue::Undefined,
            resume_mode: ResumeMode::Next,
            side_stack: Vec::new(),
            handler_heights: Vec::new(),
        }
    }
}

impl GeneratorState {
    pub fn push_side(&mut self, value: JsValue) {
        self.side_stack.push(value);
    }

    pub fn pop_side(&mut self) -> Result<JsValue, VmError> {
        self.side_stack.pop().ok_or(VmError::SideStackUnderflow)
    }
}

/// A suspended activation: its registers plus its frame
pub struct ParkedActivation {
    pub state: GeneratorState,
    pub frame: SuspendedFrame,
}

pub struct Coroutine {
    pub kind: CoroutineKind,
    pub status: CoroutineStatus,
    /// Absent while executing and after completion
    parked: Option<ParkedActivation>,
}

/// Shared handle stored in the coroutine object's exotic slot
#[derive(Clone)]
pub struct CoroutineRef(Rc<RefCell<Coroutine>>);

impl CoroutineRef {
    /// A coroutine that has not entered its body yet
    pub fn new(kind: CoroutineKind, frame: SuspendedFrame) -> Self {
        CoroutineRef(Rc::new(RefCell::new(Coroutine {
            kind,
            status: CoroutineStatus::SuspendedStart,
            parked: Some(ParkedActivation {
                state: GeneratorState::default(),
                frame,
            }),
        })))
    }

    pub fn kind(&self) -> CoroutineKind {
        self.0.borrow().kind
    }

    pub fn status(&self) -> CoroutineStatus {
        self.0.borrow().status
    }

    /// Take the parked activation and mark the coroutine as executing
    pub fn begin(&self) -> Option<ParkedActivation> {
        let mut coroutine = self.0.borrow_mut();
        let parked = coroutine.parked.take()?;
        coroutine.status = CoroutineStatus::Executing;
        Some(parked)
    }

    /// Park the activation again after a suspension
    pub fn park(&self, parked: ParkedActivation) {
        let mut coroutine = self.0.borrow_mut();
        coroutine.parked = Some(parked);
        coroutine.status = CoroutineStatus::SuspendedYield;
    }

    /// Drop the activation for good
    pub fn complete(&self) {
        let mut coroutine = self.0.borrow_mut();
        coroutine.parked = None;
        coroutine.status = CoroutineStatus::Completed;
    }

    /// Phase of the parked activation
    pub fn phase(&self) -> Option<u32> {
        self.0
            .borrow()
            .parked
            .as_ref()
            .map(|parked| parked.state.phase)
    }
}

impl fmt::Debug for CoroutineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coroutine = self.0.borrow();
        write!(f, "[{:?} {:?}]", coroutine.kind, coroutine.status)
    }
}
