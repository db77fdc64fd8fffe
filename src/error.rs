//! Error types for the virtual machine
//!
//! Three layers:
//! - [`JsError`]: language-level exceptions. These flow through handler
//!   regions and can be caught by bytecode.
//! - [`VmError`]: broken internal invariants (malformed IR, stack
//!   underflow, slot-kind mismatch). Never catchable.
//! - [`ExecError`]: what every interpreter operation returns, one of the two.

use thiserror::Error;

use crate::bytecode::{BlockId, SlotKind};
use crate::value::JsValue;

/// Language-level error raised by an opcode or an intrinsic operation
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("SyntaxError: {message}")]
    SyntaxError { message: String },

    /// Any value raised by `Throw` or rethrown after being caught
    #[error("{}", crate::value::describe_thrown(.value))]
    ThrownValue { value: JsValue },
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        JsError::ReferenceError {
            message: message.into(),
        }
    }

    /// `x is not defined`
    pub fn not_defined(name: &str) -> Self {
        JsError::reference_error(format!("{} is not defined", name))
    }

    /// TDZ access: `Cannot access 'x' before initialization`
    pub fn uninitialized(name: &str) -> Self {
        JsError::reference_error(format!("Cannot access '{}' before initialization", name))
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        JsError::SyntaxError {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary thrown value
    pub fn thrown(value: JsValue) -> Self {
        JsError::ThrownValue { value }
    }

    /// Name of the standard error constructor this error maps to, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            JsError::TypeError { .. } => Some(ErrorKind::TypeError),
            JsError::RangeError { .. } => Some(ErrorKind::RangeError),
            JsError::ReferenceError { .. } => Some(ErrorKind::ReferenceError),
            JsError::SyntaxError { .. } => Some(ErrorKind::SyntaxError),
            JsError::ThrownValue { .. } => None,
        }
    }

    /// Message text without the kind prefix
    pub fn message(&self) -> String {
        match self {
            JsError::TypeError { message }
            | JsError::RangeError { message }
            | JsError::ReferenceError { message }
            | JsError::SyntaxError { message } => message.clone(),
            JsError::ThrownValue { value } => crate::value::describe_thrown(value),
        }
    }
}

/// Standard error constructors the realm provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// Internal invariant violation. Indicates a defect in the IR producer or
/// validator, never a script-level condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("operand stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("local slot {slot} is out of range")]
    SlotOutOfRange { slot: u32 },

    #[error("local slot {slot} has kind {actual:?}, expected {expected:?}")]
    SlotKind {
        slot: u32,
        expected: SlotKind,
        actual: SlotKind,
    },

    #[error("value stored into Int slot {slot} is not an int32")]
    IntSlotValue { slot: u32 },

    #[error("Int slot {slot} overflowed")]
    IntOverflow { slot: u32 },

    #[error("jump to unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("jump table index {index} out of range ({len} targets)")]
    JumpTableIndex { index: f64, len: usize },

    #[error("constant {index} is missing or is not a {expected}")]
    BadConstant { index: u32, expected: &'static str },

    #[error("environment chain is shorter than distance {distance}")]
    EnvironmentDepth { distance: u32 },

    #[error("binding slot {slot} does not exist in the target environment")]
    BindingSlot { slot: u32 },

    #[error("PopEnv would leave the activation without an environment")]
    EnvironmentUnderflow,

    #[error("{op} requires a {required} environment record")]
    WrongEnvironment {
        op: &'static str,
        required: &'static str,
    },

    #[error("{op} used outside a generator or async activation")]
    NotACoroutine { op: &'static str },

    #[error("{op} is not valid in {kind} activations")]
    WrongCoroutineKind {
        op: &'static str,
        kind: &'static str,
    },

    #[error("coroutine has no parked activation to resume")]
    NotParked,

    #[error("no binding named '{0}' was declared")]
    UndeclaredBinding(String),

    #[error("generator side stack is empty")]
    SideStackUnderflow,

    #[error("handler region {region} has no recorded stack height")]
    HandlerNotEntered { region: usize },

    #[error("{0} must be suspended with an empty operand stack")]
    UnspilledStack(&'static str),

    #[error("instruction pointer {0} ran past the end of the code")]
    FellOffEnd(usize),
}

/// Failure of an interpreter operation
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// Catchable language exception; surfaces as "Uncaught ..." when nothing handles it
    #[error("Uncaught {0}")]
    Runtime(JsError),

    /// Non-catchable internal failure
    #[error("internal VM error: {0}")]
    Internal(VmError),

    /// Package rejected before execution
    #[error("invalid bytecode: {0}")]
    Validation(ValidationError),
}

impl ExecError {
    pub fn is_internal(&self) -> bool {
        matches!(self, ExecError::Internal(_))
    }

    /// The language exception, if this is one
    pub fn as_js_error(&self) -> Option<&JsError> {
        match self {
            ExecError::Runtime(err) => Some(err),
            ExecError::Internal(_) | ExecError::Validation(_) => None,
        }
    }
}

impl From<JsError> for ExecError {
    fn from(err: JsError) -> Self {
        ExecError::Runtime(err)
    }
}

impl From<VmError> for ExecError {
    fn from(err: VmError) -> Self {
        ExecError::Internal(err)
    }
}

impl From<ValidationError> for ExecError {
    fn from(err: ValidationError) -> Self {
        ExecError::Validation(err)
    }
}

/// Structural problem found by the IR validator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("function has no blocks")]
    NoBlocks,

    #[error("entry block {0} does not exist")]
    MissingEntry(BlockId),

    #[error("block {0} is empty")]
    EmptyBlock(BlockId),

    #[error("block {0} does not end with a terminator")]
    MissingTerminator(BlockId),

    #[error("block {block} has terminator {op} before its last instruction")]
    TerminatorMidBlock { block: BlockId, op: &'static str },

    #[error("block {block} jumps to unknown block {target}")]
    UnknownTarget { block: BlockId, target: BlockId },

    #[error("block {block} references invalid constant {index} (expected {expected})")]
    BadConstant {
        block: BlockId,
        index: u32,
        expected: &'static str,
    },

    #[error("block {block} uses slot {slot} which is out of range or of the wrong kind")]
    BadSlot { block: BlockId, slot: u32 },

    #[error("slots 0..{0} (receiver, new-target, parameters) must be Value-kind")]
    ReservedSlotKind(u32),

    #[error("stack underflow in block {block} at instruction {index}")]
    StackUnderflow { block: BlockId, index: usize },

    #[error("block {block} is reached with stack heights {first} and {second}")]
    InconsistentHeight {
        block: BlockId,
        first: usize,
        second: usize,
    },

    #[error("try region {region} is entered with stack heights {first} and {second}")]
    InconsistentRegionHeight {
        region: usize,
        first: usize,
        second: usize,
    },

    #[error("block {block}: {op} leaves {height} value(s) on the stack")]
    UnspilledSuspend {
        block: BlockId,
        op: &'static str,
        height: usize,
    },

    #[error("handler block {0} lies inside its own region")]
    HandlerInsideRegion(BlockId),

    #[error("try region {0} was never closed")]
    UnclosedRegion(usize),

    #[error("block {block}: {op} is only valid in generator or async functions")]
    CoroutineOpInPlainFunction { block: BlockId, op: &'static str },
}

/// Invalid configuration input
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
