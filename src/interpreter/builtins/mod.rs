//! Built-in intrinsics installed into every realm

pub mod array;
pub mod error;
pub mod function;
pub mod generator;
pub mod global;
pub mod object;

use crate::value::JsValue;

use super::realm::Realm;

/// Install every intrinsic into a freshly created realm
pub fn init_realm(realm: &Realm) {
    object::init_object_prototype(realm);
    function::init_function_prototype(realm);
    array::init_array_prototype(realm);
    error::init_error(realm);
    generator::init_generator_prototype(realm);
    global::init_globals(realm);
}

/// Argument `index`, or undefined when absent
pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}
