//! Bytecode intermediate representation
//!
//! - `op`: the instruction set and per-opcode stack effects
//! - `package`: the immutable per-function artifact
//! - `builder`: assembles packages from blocks
//! - `validate`: structural checks the interpreter relies on
//! - `disasm`: human-readable listings

mod builder;
mod disasm;
mod op;
mod package;
mod validate;

pub use builder::{FunctionBuilder, NEW_TARGET_SLOT, RECEIVER_SLOT, RESERVED_SLOTS};
pub use op::{BinaryOperator, BlockId, ConstantIndex, MethodKind, Op, SlotIndex, UnaryOperator};
pub use package::{
    Block, Constant, FunctionFlags, FunctionPackage, HandlerRegion, ImportEntry, PackageParts,
    ScopeBinding, ScopeLayout, SlotKind,
};
pub use validate::validate;
