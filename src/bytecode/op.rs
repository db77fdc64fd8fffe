//! Instruction set
//!
//! Operand-stack machine. Every opcode has a fixed stack effect, documented
//! on the variant as `[inputs] -> [outputs]` (top of stack rightmost), and
//! reported by [`Op::stack_effect`].

use crate::prelude::*;

/// Local slot index
pub type SlotIndex = u32;

/// Constant pool index
pub type ConstantIndex = u32;

/// Stable block identifier, used as a jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Operator tag handed to the numeric/string coercion routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Exp => "**",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::UShr => ">>>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-x`
    Minus,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `void x`
    Void,
}

/// What `AttachClassMethod` installs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// Bytecode instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Constant loads
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[] -> [undefined]`
    PushUndefined,
    /// `[] -> [null]`
    PushNull,
    /// `[] -> [bool]`
    PushBool(bool),
    /// `[] -> [number]`
    PushInt(i32),
    /// Number or string literal from the pool. `[] -> [value]`
    PushConst(ConstantIndex),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Stack shuffle
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[a] -> []`
    Pop,
    /// `[a] -> [a a]`
    Dup,
    /// Copy the top value beneath the second one. `[a b] -> [b a b]`
    DupUnder,
    /// `[a b] -> [b a]`
    Swap,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Locals
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[] -> [value]` from a Value-kind slot
    LoadValue(SlotIndex),
    /// `[value] -> []` into a Value-kind slot
    StoreValue(SlotIndex),
    /// `[] -> [number]` from an Int-kind slot
    LoadInt(SlotIndex),
    /// `[number] -> []` into an Int-kind slot
    StoreInt(SlotIndex),
    /// In-place add on an Int-kind slot. `[] -> []`
    IncInt { slot: SlotIndex, delta: i32 },
    /// All call arguments as a fresh array. `[] -> [array]`
    LoadArguments,
    /// Arguments from `start` onward as a fresh array. `[] -> [array]`
    CreateRestArray(u32),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[lhs rhs] -> [result]`
    Binary(BinaryOperator),
    /// `[x] -> [result]`
    Unary(UnaryOperator),
    /// ToNumber. `[x] -> [number]`
    ToNumber,
    /// `[x] -> [string]`
    Typeof,
    /// `[lhs rhs] -> [bool]`
    StrictEquals,
    StrictNotEquals,
    LooseEquals,
    LooseNotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    /// `[value constructor] -> [bool]`
    InstanceOf,
    /// `[key object] -> [bool]`
    In,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Properties
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[object] -> [value]`
    GetNamed(ConstantIndex),
    /// `[object key] -> [value]`
    GetKeyed,
    /// `[object value] -> []`
    SetNamed(ConstantIndex),
    /// `[object key value] -> []`
    SetKeyed,
    /// Non-configurable properties report `false`. `[object key] -> [bool]`
    DeleteSloppy,
    /// Non-configurable properties raise a TypeError. `[object key] -> [bool]`
    DeleteStrict,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Object / array construction
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[] -> [object]`
    CreateObject,
    /// `[] -> [array]`
    CreateArray,
    /// Define an own enumerable data property. `[object value] -> [object]`
    DefineField(ConstantIndex),
    /// `[array value] -> [array]`
    StoreArrayIndexed(u32),
    /// Append at `length`. `[array value] -> [array]`
    ArrayPush,
    /// Drain an iterable into the array. `[array iterable] -> [array]`
    SpreadIntoArray,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[arg0 .. argN-1 receiver target] -> [result]`
    Call(u32),
    /// `[args_array receiver target] -> [result]`
    CallSpread,
    /// `[arg0 .. argN-1 new_target target] -> [object]`
    Construct(u32),
    /// `[args_array new_target target] -> [object]`
    ConstructSpread,
    /// Instantiate a nested function package. `[] -> [function]`
    CreateClosure(ConstantIndex),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Hoisted `var` in the global record. `[] -> []`
    DeclareGlobalVar(ConstantIndex),
    /// `let`/`const` in the global record, uninitialized. `[] -> []`
    DeclareGlobalLexical { name: ConstantIndex, mutable: bool },
    /// Initialize a global lexical declaration. `[value] -> []`
    InitializeGlobalLexical(ConstantIndex),
    /// `[] -> [value]`
    LoadGlobal(ConstantIndex),
    /// `[value] -> []`
    StoreGlobal(ConstantIndex),
    /// `typeof name` that tolerates unresolvable globals. `[] -> [string]`
    TypeofGlobal(ConstantIndex),
    /// Dynamic lookup along the environment chain. `[] -> [value]`
    LoadVariable(ConstantIndex),
    /// `[value] -> []`
    StoreVariable(ConstantIndex),
    /// Statically resolved read. `[] -> [value | uninitialized]`
    LoadLexical { slot: u32, distance: u32 },
    /// Statically resolved write. `[value] -> []`
    StoreLexical { slot: u32, distance: u32 },
    /// Initialize a binding of the innermost record. `[value] -> []`
    InitializeLexical(u32),
    /// Read from the activation's module record by name. `[] -> [value]`
    LoadModuleVar(ConstantIndex),
    /// `[value] -> []`
    StoreModuleVar(ConstantIndex),
    /// Alias an export of another module into the current module record. `[] -> []`
    CreateImportBinding(ConstantIndex),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Environments
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Enter a declarative record built from a scope layout. `[] -> []`
    PushDeclarativeEnv(ConstantIndex),
    /// Enter a module record built from a scope layout. `[] -> []`
    PushModuleEnv(ConstantIndex),
    /// Leave the innermost record. `[] -> []`
    PopEnv,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Exceptions
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Terminator. `[value] -> !`
    Throw,
    /// Terminator. Always raises a TypeError naming the constant. `[] -> !`
    ThrowConstantReassignment(ConstantIndex),
    /// Raise a ReferenceError if the top of stack is the uninitialized marker. `[v] -> [v]`
    ThrowLexicalAccessError(ConstantIndex),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Generators / async
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[] -> [phase]`
    GetGeneratorPhase,
    /// `[] -> []`
    SetGeneratorPhase(u32),
    /// Move a value to the side stack. `[value] -> []`
    PushToGeneratorState,
    /// Move a value back from the side stack. `[] -> [value]`
    PopFromGeneratorState,
    /// Value passed by the driver on resumption. `[] -> [value]`
    GeneratorSentValue,
    /// Terminator. Suspends the activation. `[value] -> !`
    Yield,
    /// Terminator. Suspends the activation. `[value] -> !`
    Await,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Classes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Build a class from its constructor package.
    /// `[] -> [class]`, or `[superclass] -> [class]` with a heritage
    CreateClass {
        constructor: ConstantIndex,
        has_heritage: bool,
    },
    /// Attach a method to the prototype (or the class when static).
    /// `[class method] -> [class]`
    AttachClassMethod {
        name: ConstantIndex,
        kind: MethodKind,
        is_static: bool,
    },
    /// `[[Prototype]]` of the active function. `[] -> [constructor]`
    GetSuperConstructor,
    /// Property of the home object's prototype, read with the current receiver.
    /// `[] -> [value]`
    LoadSuperProperty(ConstantIndex),

    // ═══════════════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[iterable] -> [iterator]`
    GetIterator,
    /// `[iterator] -> [iterator result]`
    IteratorNext,
    /// `[result] -> [bool]`
    IteratorDone,
    /// `[result] -> [value]`
    IteratorValue,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Control flow (terminators)
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `[] -> !`
    Jump(BlockId),
    /// ToBoolean on the popped value. `[cond] -> !`
    JumpIf { if_true: BlockId, if_false: BlockId },
    /// `[value] -> !`
    JumpIfNullish { if_nullish: BlockId, otherwise: BlockId },
    /// Index must be an integer in range. `[index] -> !`
    JumpTable(Vec<BlockId>),
    /// `[value] -> !`
    Return,
}

impl Op {
    /// Whether this opcode ends a block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Jump(_)
                | Op::JumpIf { .. }
                | Op::JumpIfNullish { .. }
                | Op::JumpTable(_)
                | Op::Return
                | Op::Throw
                | Op::ThrowConstantReassignment(_)
                | Op::Yield
                | Op::Await
        )
    }

    /// Whether this opcode is only meaningful inside a generator or async function
    pub fn requires_coroutine(&self) -> bool {
        matches!(
            self,
            Op::GetGeneratorPhase
                | Op::SetGeneratorPhase(_)
                | Op::PushToGeneratorState
                | Op::PopFromGeneratorState
                | Op::GeneratorSentValue
                | Op::Yield
                | Op::Await
        )
    }

    /// `(pops, pushes)`
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Op::PushUndefined
            | Op::PushNull
            | Op::PushBool(_)
            | Op::PushInt(_)
            | Op::PushConst(_)
            | Op::LoadValue(_)
            | Op::LoadInt(_)
            | Op::LoadArguments
            | Op::CreateRestArray(_)
            | Op::CreateObject
            | Op::CreateArray
            | Op::CreateClosure(_)
            | Op::LoadGlobal(_)
            | Op::TypeofGlobal(_)
            | Op::LoadVariable(_)
            | Op::LoadLexical { .. }
            | Op::LoadModuleVar(_)
            | Op::GetGeneratorPhase
            | Op::PopFromGeneratorState
            | Op::GeneratorSentValue
            | Op::GetSuperConstructor
            | Op::LoadSuperProperty(_) => (0, 1),

            Op::Pop
            | Op::StoreValue(_)
            | Op::StoreInt(_)
            | Op::InitializeGlobalLexical(_)
            | Op::StoreGlobal(_)
            | Op::StoreVariable(_)
            | Op::StoreLexical { .. }
            | Op::InitializeLexical(_)
            | Op::StoreModuleVar(_)
            | Op::PushToGeneratorState => (1, 0),

            Op::Dup => (1, 2),
            Op::DupUnder => (2, 3),
            Op::Swap => (2, 2),

            Op::IncInt { .. }
            | Op::DeclareGlobalVar(_)
            | Op::DeclareGlobalLexical { .. }
            | Op::CreateImportBinding(_)
            | Op::PushDeclarativeEnv(_)
            | Op::PushModuleEnv(_)
            | Op::PopEnv
            | Op::SetGeneratorPhase(_) => (0, 0),

            Op::Binary(_)
            | Op::StrictEquals
            | Op::StrictNotEquals
            | Op::LooseEquals
            | Op::LooseNotEquals
            | Op::LessThan
            | Op::GreaterThan
            | Op::LessThanOrEqual
            | Op::GreaterThanOrEqual
            | Op::InstanceOf
            | Op::In
            | Op::GetKeyed
            | Op::DeleteSloppy
            | Op::DeleteStrict => (2, 1),

            Op::Unary(_)
            | Op::ToNumber
            | Op::Typeof
            | Op::GetNamed(_)
            | Op::ThrowLexicalAccessError(_)
            | Op::GetIterator
            | Op::IteratorNext
            | Op::IteratorDone
            | Op::IteratorValue => (1, 1),

            Op::SetNamed(_) => (2, 0),
            Op::SetKeyed => (3, 0),

            Op::DefineField(_)
            | Op::StoreArrayIndexed(_)
            | Op::ArrayPush
            | Op::SpreadIntoArray
            | Op::AttachClassMethod { .. } => (2, 1),

            Op::Call(argc) | Op::Construct(argc) => (*argc as usize + 2, 1),
            Op::CallSpread | Op::ConstructSpread => (3, 1),

            Op::CreateClass { has_heritage, .. } => (usize::from(*has_heritage), 1),

            Op::Jump(_) | Op::ThrowConstantReassignment(_) => (0, 0),
            Op::JumpIf { .. }
            | Op::JumpIfNullish { .. }
            | Op::JumpTable(_)
            | Op::Return
            | Op::Throw
            | Op::Yield
            | Op::Await => (1, 0),
        }
    }

    /// Blocks this terminator may transfer control to
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Jump(target) => vec![*target],
            Op::JumpIf { if_true, if_false } => vec![*if_true, *if_false],
            Op::JumpIfNullish {
                if_nullish,
                otherwise,
            } => vec![*if_nullish, *otherwise],
            Op::JumpTable(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Mnemonic used by the disassembler and validation errors
    pub fn name(&self) -> &'static str {
        match self {
            Op::PushUndefined => "PushUndefined",
            Op::PushNull => "PushNull",
            Op::PushBool(_) => "PushBool",
            Op::PushInt(_) => "PushInt",
            Op::PushConst(_) => "PushConst",
            Op::Pop => "Pop",
            Op::Dup => "Dup",
            Op::DupUnder => "DupUnder",
            Op::Swap => "Swap",
            Op::LoadValue(_) => "LoadValue",
            Op::StoreValue(_) => "StoreValue",
            Op::LoadInt(_) => "LoadInt",
            Op::StoreInt(_) => "StoreInt",
            Op::IncInt { .. } => "IncInt",
            Op::LoadArguments => "LoadArguments",
            Op::CreateRestArray(_) => "CreateRestArray",
            Op::Binary(_) => "Binary",
            Op::Unary(_) => "Unary",
            Op::ToNumber => "ToNumber",
            Op::Typeof => "Typeof",
            Op::StrictEquals => "StrictEquals",
            Op::StrictNotEquals => "StrictNotEquals",
            Op::LooseEquals => "LooseEquals",
            Op::LooseNotEquals => "LooseNotEquals",
            Op::LessThan => "LessThan",
            Op::GreaterThan => "GreaterThan",
            Op::LessThanOrEqual => "LessThanOrEqual",
            Op::GreaterThanOrEqual => "GreaterThanOrEqual",
            Op::InstanceOf => "InstanceOf",
            Op::In => "In",
            Op::GetNamed(_) => "GetNamed",
            Op::GetKeyed => "GetKeyed",
            Op::SetNamed(_) => "SetNamed",
            Op::SetKeyed => "SetKeyed",
            Op::DeleteSloppy => "DeleteSloppy",
            Op::DeleteStrict => "DeleteStrict",
            Op::CreateObject => "CreateObject",
            Op::CreateArray => "CreateArray",
            Op::DefineField(_) => "DefineField",
            Op::StoreArrayIndexed(_) => "StoreArrayIndexed",
            Op::ArrayPush => "ArrayPush",
            Op::SpreadIntoArray => "SpreadIntoArray",
            Op::Call(_) => "Call",
            Op::CallSpread => "CallSpread",
            Op::Construct(_) => "Construct",
            Op::ConstructSpread => "ConstructSpread",
            Op::CreateClosure(_) => "CreateClosure",
            Op::DeclareGlobalVar(_) => "DeclareGlobalVar",
            Op::DeclareGlobalLexical { .. } => "DeclareGlobalLexical",
            Op::InitializeGlobalLexical(_) => "InitializeGlobalLexical",
            Op::LoadGlobal(_) => "LoadGlobal",
            Op::StoreGlobal(_) => "StoreGlobal",
            Op::TypeofGlobal(_) => "TypeofGlobal",
            Op::LoadVariable(_) => "LoadVariable",
            Op::StoreVariable(_) => "StoreVariable",
            Op::LoadLexical { .. } => "LoadLexical",
            Op::StoreLexical { .. } => "StoreLexical",
            Op::InitializeLexical(_) => "InitializeLexical",
            Op::LoadModuleVar(_) => "LoadModuleVar",
            Op::StoreModuleVar(_) => "StoreModuleVar",
            Op::CreateImportBinding(_) => "CreateImportBinding",
            Op::PushDeclarativeEnv(_) => "PushDeclarativeEnv",
            Op::PushModuleEnv(_) => "PushModuleEnv",
            Op::PopEnv => "PopEnv",
            Op::Throw => "Throw",
            Op::ThrowConstantReassignment(_) => "ThrowConstantReassignment",
            Op::ThrowLexicalAccessError(_) => "ThrowLexicalAccessError",
            Op::GetGeneratorPhase => "GetGeneratorPhase",
            Op::SetGeneratorPhase(_) => "SetGeneratorPhase",
            Op::PushToGeneratorState => "PushToGeneratorState",
            Op::PopFromGeneratorState => "PopFromGeneratorState",
            Op::GeneratorSentValue => "GeneratorSentValue",
            Op::Yield => "Yield",
            Op::Await => "Await",
            Op::CreateClass { .. } => "CreateClass",
            Op::AttachClassMethod { .. } => "AttachClassMethod",
            Op::GetSuperConstructor => "GetSuperConstructor",
            Op::LoadSuperProperty(_) => "LoadSuperProperty",
            Op::GetIterator => "GetIterator",
            Op::IteratorNext => "IteratorNext",
            Op::IteratorDone => "IteratorDone",
            Op::IteratorValue => "IteratorValue",
            Op::Jump(_) => "Jump",
            Op::JumpIf { .. } => "JumpIf",
            Op::JumpIfNullish { .. } => "JumpIfNullish",
            Op::JumpTable(_) => "JumpTable",
            Op::Return => "Return",
        }
    }
}
