//! Error constructors and Error.prototype

use crate::error::{ErrorKind, ExecError, JsError};
use crate::interpreter::Agent;
use crate::interpreter::realm::Realm;
use crate::value::{
    CheapClone, ExoticObject, JsObject, JsObjectRef, JsString, JsValue, NativeFn, Property,
    PropertyKey,
};

use super::arg;

/// Install the five standard error constructors, their prototypes and
/// their global bindings
pub fn init_error(realm: &Realm) {
    for kind in ErrorKind::ALL {
        let proto = realm.intrinsics.error_prototype(kind);
        let ctor = realm.create_native_function(kind.name(), constructor_for(kind), 1, true);

        ctor.borrow_mut().define_property(
            PropertyKey::from("prototype"),
            Property::frozen(JsValue::Object(proto.cheap_clone())),
        );
        {
            let mut p = proto.borrow_mut();
            p.define_property(
                PropertyKey::from("constructor"),
                Property::hidden(JsValue::Object(ctor.cheap_clone())),
            );
            p.define_property(PropertyKey::from("name"), Property::hidden(JsValue::from(kind.name())));
            p.define_property(PropertyKey::from("message"), Property::hidden(JsValue::from("")));
        }

        realm.define_global(kind.name(), JsValue::Object(ctor));
    }

    let base = realm.intrinsics.error_prototype(ErrorKind::Error);
    realm.register_method(&base, "toString", error_to_string, 0);
}

fn constructor_for(kind: ErrorKind) -> NativeFn {
    match kind {
        ErrorKind::Error => error_constructor,
        ErrorKind::TypeError => type_error_constructor,
        ErrorKind::RangeError => range_error_constructor,
        ErrorKind::ReferenceError => reference_error_constructor,
        ErrorKind::SyntaxError => syntax_error_constructor,
    }
}

/// Error instance with an own, non-enumerable `message`
pub fn create_error_object(realm: &Realm, kind: ErrorKind, message: Option<JsString>) -> JsObjectRef {
    let mut obj = JsObject::new(Some(realm.intrinsics.error_prototype(kind)), ExoticObject::Error(kind));
    if let Some(message) = message {
        obj.define_property(PropertyKey::from("message"), Property::hidden(JsValue::String(message)));
    }
    JsObjectRef::new(obj)
}

/// Shared body of every error constructor. Calling without `new` behaves
/// the same as constructing.
fn construct_error(agent: &mut Agent, kind: ErrorKind, args: &[JsValue]) -> Result<JsValue, ExecError> {
    let message = match arg(args, 0) {
        JsValue::Undefined => None,
        other => Some(agent.to_string(&other)?),
    };
    Ok(JsValue::Object(create_error_object(agent.realm(), kind, message)))
}

pub fn error_constructor(agent: &mut Agent, _this: JsValue, args: &[JsValue]) -> Result<JsValue, ExecError> {
    construct_error(agent, ErrorKind::Error, args)
}

pub fn type_error_constructor(
    agent: &mut Agent,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    construct_error(agent, ErrorKind::TypeError, args)
}

pub fn range_error_constructor(
    agent: &mut Agent,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    construct_error(agent, ErrorKind::RangeError, args)
}

pub fn reference_error_constructor(
    agent: &mut Agent,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    construct_error(agent, ErrorKind::ReferenceError, args)
}

pub fn syntax_error_constructor(
    agent: &mut Agent,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    construct_error(agent, ErrorKind::SyntaxError, args)
}

/// Error.prototype.toString()
pub fn error_to_string(agent: &mut Agent, this: JsValue, _args: &[JsValue]) -> Result<JsValue, ExecError> {
    if !this.is_object() {
        return Err(JsError::type_error("Error.prototype.toString called on non-object").into());
    }
    let name = match agent.get_property(&this, &PropertyKey::from("name"))? {
        JsValue::Undefined => JsString::from("Error"),
        other => agent.to_string(&other)?,
    };
    let message = match agent.get_property(&this, &PropertyKey::from("message"))? {
        JsValue::Undefined => JsString::from(""),
        other => agent.to_string(&other)?,
    };

    let rendered = if name.is_empty() {
        message
    } else if message.is_empty() {
        name
    } else {
        JsString::from(format!("{}: {}", name, message))
    };
    Ok(JsValue::String(rendered))
}
