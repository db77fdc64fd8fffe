//! Function.prototype methods

use crate::error::ExecError;
use crate::interpreter::Agent;
use crate::interpreter::realm::Realm;
use crate::value::JsValue;

use super::arg;

pub fn init_function_prototype(realm: &Realm) {
    let proto = &realm.intrinsics.function_prototype;
    realm.register_method(proto, "call", function_call, 1);
}

/// Function.prototype.call(thisArg, ...args)
pub fn function_call(
    agent: &mut Agent,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let this_arg = arg(args, 0);
    let rest = args.get(1..).unwrap_or(&[]);
    agent.call(&this, this_arg, rest)
}
