//! Operand-stack bytecode virtual machine for an ECMAScript-like language
//!
//! A front end produces [`FunctionPackage`]s (blocks of [`Op`]s, a constant
//! pool and typed local slots); the [`Agent`] runs them. The VM provides
//! call/construct, property access, structured exception handling through
//! handler regions, lexical environment records and resumable generator
//! activations.
//!
//! # Example
//!
//! ```
//! use jsvm::{Agent, BinaryOperator, FunctionBuilder, JsValue, Op};
//!
//! let mut b = FunctionBuilder::new(Some("main"), 0);
//! b.emit(Op::PushInt(1));
//! b.emit(Op::PushInt(2));
//! b.emit(Op::Binary(BinaryOperator::Add));
//! b.emit(Op::Return);
//! let package = b.finish().unwrap();
//!
//! let mut agent = Agent::new();
//! assert_eq!(agent.run_script(package).unwrap(), JsValue::Number(3.0));
//! ```

pub mod bytecode;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod prelude;
pub mod value;

pub use bytecode::{
    BinaryOperator, BlockId, ConstantIndex, FunctionBuilder, FunctionFlags, FunctionPackage,
    MethodKind, Op, ScopeLayout, SlotIndex, SlotKind, UnaryOperator,
};
pub use config::VmConfig;
pub use environment::Env;
pub use error::{ConfigError, ExecError, JsError, ValidationError, VmError};
pub use interpreter::generator::ResumeMode;
pub use interpreter::{Agent, AsyncStep};
pub use value::{CheapClone, JsObjectRef, JsString, JsValue, PropertyKey};
