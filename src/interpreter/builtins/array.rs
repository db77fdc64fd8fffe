//! Array built-in methods and the array iterator

use crate::error::{ExecError, JsError};
use crate::interpreter::Agent;
use crate::interpreter::realm::Realm;
use crate::value::{
    CheapClone, ExoticObject, JsObject, JsObjectRef, JsString, JsSymbol, JsValue, PropertyKey,
};

use super::arg;

/// Longest string `join` will build
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// Initialize Array.prototype and %ArrayIteratorPrototype%
pub fn init_array_prototype(realm: &Realm) {
    let proto = &realm.intrinsics.array_prototype;
    realm.register_method(proto, "push", array_push, 1);
    realm.register_method(proto, "join", array_join, 1);
    realm.register_method(proto, "toString", array_to_string, 0);
    realm.register_method(proto, "values", array_values, 0);
    realm.register_symbol_method(
        proto,
        PropertyKey::Symbol(JsSymbol::iterator()),
        "[Symbol.iterator]",
        array_values,
    );

    let iter_proto = &realm.intrinsics.array_iterator_prototype;
    realm.register_method(iter_proto, "next", array_iterator_next, 0);
}

fn this_array(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match this {
        JsValue::Object(obj) if matches!(obj.borrow().exotic, ExoticObject::Array(_)) => {
            Ok(obj.cheap_clone())
        }
        _ => Err(JsError::type_error(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

/// Array.prototype.push(...items)
pub fn array_push(
    _agent: &mut Agent,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let arr = this_array(&this, "push")?;
    let mut obj = arr.borrow_mut();
    let ExoticObject::Array(elements) = &mut obj.exotic else {
        return Err(JsError::type_error("Array.prototype.push called on non-array").into());
    };
    for value in args {
        elements.push(value.clone());
    }
    Ok(JsValue::Number(f64::from(elements.len())))
}

/// Array.prototype.join(separator)
pub fn array_join(agent: &mut Agent, this: JsValue, args: &[JsValue]) -> Result<JsValue, ExecError> {
    let arr = this_array(&this, "join")?;
    let separator = match arg(args, 0) {
        JsValue::Undefined => JsString::from(","),
        other => agent.to_string(&other)?,
    };
    // Element conversions may run script code; work on a snapshot
    let (length, entries) = match &arr.borrow().exotic {
        ExoticObject::Array(elements) => (elements.len(), elements.entries()),
        _ => (0, Vec::new()),
    };

    let separators = (length.saturating_sub(1) as usize).saturating_mul(separator.as_str().len());
    if separators > MAX_STRING_LENGTH {
        return Err(JsError::range_error("Invalid string length").into());
    }

    // Holes only contribute their separators
    let mut out = String::new();
    let mut cursor = 0;
    for (index, element) in entries {
        push_separators(&mut out, &separator, cursor, index + 1);
        if !element.is_null_or_undefined() {
            out.push_str(agent.to_string(&element)?.as_str());
        }
        cursor = index + 1;
    }
    push_separators(&mut out, &separator, cursor, length);
    Ok(JsValue::from(out))
}

/// Separators preceding positions `from..to`; position 0 has none
fn push_separators(out: &mut String, separator: &JsString, from: u32, to: u32) {
    let count = to.saturating_sub(from.max(1)) as usize;
    out.push_str(&separator.as_str().repeat(count));
}

/// Array.prototype.toString()
pub fn array_to_string(
    agent: &mut Agent,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, ExecError> {
    array_join(agent, this, &[])
}

/// Array.prototype.values() / [Symbol.iterator]()
pub fn array_values(
    agent: &mut Agent,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let array = this_array(&this, "values")?;
    let proto = agent.realm().intrinsics.array_iterator_prototype.cheap_clone();
    let iterator = JsObjectRef::new(JsObject::new(
        Some(proto),
        ExoticObject::ArrayIterator {
            array,
            next_index: 0,
        },
    ));
    Ok(JsValue::Object(iterator))
}

/// %ArrayIteratorPrototype%.next()
pub fn array_iterator_next(
    agent: &mut Agent,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, ExecError> {
    let JsValue::Object(obj) = this else {
        return Err(JsError::type_error("next method called on incompatible receiver").into());
    };
    let step = {
        let mut iter = obj.borrow_mut();
        let ExoticObject::ArrayIterator { array, next_index } = &mut iter.exotic else {
            return Err(JsError::type_error("next method called on incompatible receiver").into());
        };
        // Holes below `length` read as undefined
        let element = match &array.borrow().exotic {
            ExoticObject::Array(elements) => u32::try_from(*next_index)
                .ok()
                .filter(|&index| index < elements.len())
                .map(|index| elements.get(index).cloned().unwrap_or_default()),
            _ => None,
        };
        match element {
            Some(value) => {
                *next_index += 1;
                Some(value)
            }
            None => {
                // Exhausted iterators stay exhausted even if the array grows
                *next_index = usize::MAX;
                None
            }
        }
    };
    let realm = agent.realm();
    Ok(match step {
        Some(value) => realm.create_iter_result(value, false),
        None => realm.create_iter_result(JsValue::Undefined, true),
    })
}
