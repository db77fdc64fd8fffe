//! %GeneratorPrototype%: the driver side of the suspension protocol

use crate::error::ExecError;
use crate::interpreter::Agent;
use crate::interpreter::generator::ResumeMode;
use crate::interpreter::realm::Realm;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::arg;

pub fn init_generator_prototype(realm: &Realm) {
    let proto = &realm.intrinsics.generator_prototype;
    realm.register_method(proto, "next", generator_next, 1);
    realm.register_method(proto, "return", generator_return, 1);
    realm.register_method(proto, "throw", generator_throw, 1);
    realm.register_symbol_method(
        proto,
        PropertyKey::Symbol(JsSymbol::iterator()),
        "[Symbol.iterator]",
        generator_iterator,
    );
}

/// Generator.prototype.next(value)
pub fn generator_next(agent: &mut Agent, this: JsValue, args: &[JsValue]) -> Result<JsValue, ExecError> {
    agent.generator_resume(&this, ResumeMode::Next, arg(args, 0))
}

/// Generator.prototype.return(value)
pub fn generator_return(
    agent: &mut Agent,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    agent.generator_resume(&this, ResumeMode::Return, arg(args, 0))
}

/// Generator.prototype.throw(exception)
pub fn generator_throw(agent: &mut Agent, this: JsValue, args: &[JsValue]) -> Result<JsValue, ExecError> {
    agent.generator_resume(&this, ResumeMode::Throw, arg(args, 0))
}

/// Generators are their own iterators
fn generator_iterator(_agent: &mut Agent, this: JsValue, _args: &[JsValue]) -> Result<JsValue, ExecError> {
    Ok(this)
}
