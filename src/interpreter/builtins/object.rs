//! Object.prototype methods

use crate::error::{ExecError, JsError};
use crate::interpreter::Agent;
use crate::interpreter::generator::CoroutineKind;
use crate::interpreter::realm::Realm;
use crate::value::{ExoticObject, JsValue};

use super::arg;

pub fn init_object_prototype(realm: &Realm) {
    let proto = &realm.intrinsics.object_prototype;
    realm.register_method(proto, "toString", object_to_string, 0);
    realm.register_method(proto, "valueOf", object_value_of, 0);
    realm.register_method(proto, "hasOwnProperty", object_has_own_property, 1);
}

/// Object.prototype.toString()
pub fn object_to_string(
    _agent: &mut Agent,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let tag = match &this {
        JsValue::Undefined | JsValue::Uninitialized => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Symbol(_) => "Symbol",
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Array(_) => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::Error(_) => "Error",
            ExoticObject::Coroutine(c) if c.kind() == CoroutineKind::Generator => "Generator",
            ExoticObject::Coroutine(_) => "AsyncFunction",
            ExoticObject::ArrayIterator { .. } => "Array Iterator",
            ExoticObject::Ordinary => "Object",
        },
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

/// Object.prototype.valueOf()
pub fn object_value_of(
    _agent: &mut Agent,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, ExecError> {
    if this.is_null_or_undefined() {
        return Err(JsError::type_error("Cannot convert undefined or null to object").into());
    }
    Ok(this)
}

/// Object.prototype.hasOwnProperty(key)
pub fn object_has_own_property(
    agent: &mut Agent,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let key = agent.to_property_key(&arg(args, 0))?;
    match &this {
        JsValue::Object(obj) => Ok(JsValue::Boolean(obj.borrow().has_own_property(&key))),
        JsValue::Undefined | JsValue::Null => {
            Err(JsError::type_error("Cannot convert undefined or null to object").into())
        }
        JsValue::String(s) => {
            let own = key.eq_str("length")
                || key.as_index().is_some_and(|i| (i as usize) < s.utf16_len());
            Ok(JsValue::Boolean(own))
        }
        _ => Ok(JsValue::Boolean(false)),
    }
}
