//! Object protocol: property get/set/delete/has, object literal fields
//! and array element stores.
//!
//! Arrays keep their elements in the exotic payload; `length` and index
//! keys are answered from there, everything else from the property map.

use crate::error::{ExecError, JsError};
use crate::value::{
    CheapClone, ExoticObject, JsObjectRef, JsValue, Property, PropertyKey, PropertySlot,
};

use super::Agent;
use super::operations::describe_value;

/// Where an assignment lands after walking the prototype chain
enum SetTarget {
    /// Writable own data property, or nothing that blocks adding one
    Define,
    ReadOnly,
    Setter(JsObjectRef),
    GetterOnly,
}

impl Agent {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Get
    // ═══════════════════════════════════════════════════════════════════════════════

    /// `target[key]` with `target` as the receiver
    pub fn get_property(&mut self, target: &JsValue, key: &PropertyKey) -> Result<JsValue, ExecError> {
        self.get_with_receiver(target, key, target)
    }

    /// [[Get]] on `target`, running getters against `receiver`
    pub fn get_with_receiver(
        &mut self,
        target: &JsValue,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ExecError> {
        let start = match target {
            JsValue::Object(obj) => obj.cheap_clone(),
            JsValue::Undefined | JsValue::Null | JsValue::Uninitialized => {
                return Err(JsError::type_error(format!(
                    "Cannot read properties of {:?} (reading '{}')",
                    target, key
                ))
                .into());
            }
            JsValue::String(s) => {
                if key.eq_str("length") {
                    return Ok(JsValue::Number(s.utf16_len() as f64));
                }
                if let Some(index) = key.as_index() {
                    let unit = s.as_str().encode_utf16().nth(index as usize);
                    return Ok(match unit {
                        Some(unit) => JsValue::from(String::from_utf16_lossy(&[unit])),
                        None => JsValue::Undefined,
                    });
                }
                self.realm.intrinsics.object_prototype.cheap_clone()
            }
            JsValue::Boolean(_) | JsValue::Number(_) | JsValue::Symbol(_) => {
                self.realm.intrinsics.object_prototype.cheap_clone()
            }
        };

        let mut current = Some(start);
        while let Some(obj) = current.take() {
            let getter = {
                let borrowed = obj.borrow();
                if let ExoticObject::Array(elements) = &borrowed.exotic {
                    if let Some(index) = key.as_index() {
                        if let Some(value) = elements.get(index) {
                            return Ok(value.clone());
                        }
                    } else if key.eq_str("length") {
                        return Ok(JsValue::Number(f64::from(elements.len())));
                    }
                }
                match borrowed.get_own_property(key).map(|prop| &prop.slot) {
                    Some(PropertySlot::Data(value)) => return Ok(value.clone()),
                    Some(PropertySlot::Accessor { get, .. }) => Some(get.clone()),
                    None => {
                        current = borrowed.prototype.clone();
                        None
                    }
                }
            };
            if let Some(getter) = getter {
                return match getter {
                    Some(getter) => self.call(&JsValue::Object(getter), receiver.clone(), &[]),
                    None => Ok(JsValue::Undefined),
                };
            }
        }
        Ok(JsValue::Undefined)
    }

    /// `object[key]` with a computed key
    pub fn get_keyed(&mut self, object: &JsValue, key: &JsValue) -> Result<JsValue, ExecError> {
        let key = self.to_property_key(key)?;
        self.get_property(object, &key)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Set
    // ═══════════════════════════════════════════════════════════════════════════════

    /// [[Set]]. Failed assignments throw in strict code and are ignored otherwise.
    pub fn set_property(
        &mut self,
        target: &JsValue,
        key: PropertyKey,
        value: JsValue,
        strict: bool,
    ) -> Result<(), ExecError> {
        let object = match target {
            JsValue::Object(obj) => obj.cheap_clone(),
            JsValue::Undefined | JsValue::Null | JsValue::Uninitialized => {
                return Err(JsError::type_error(format!(
                    "Cannot set properties of {:?} (setting '{}')",
                    target, key
                ))
                .into());
            }
            primitive => {
                if strict {
                    return Err(JsError::type_error(format!(
                        "Cannot create property '{}' on {} {}",
                        key,
                        primitive.type_of(),
                        describe_value(primitive)
                    ))
                    .into());
                }
                return Ok(());
            }
        };

        if is_array(&object) {
            if let Some(index) = key.as_index() {
                store_element(&object, index, value);
                return Ok(());
            }
            if key.eq_str("length") {
                return self.set_array_length(&object, &value);
            }
        }

        match find_set_target(&object, &key) {
            SetTarget::Define => {
                let mut obj = object.borrow_mut();
                if let Some(prop) = obj.properties.get_mut(&key) {
                    prop.slot = PropertySlot::Data(value);
                    return Ok(());
                }
                if !obj.extensible {
                    drop(obj);
                    return fail(strict, format!("Cannot add property {}, object is not extensible", key));
                }
                obj.set_property(key, value);
                Ok(())
            }
            SetTarget::Setter(setter) => {
                self.call(&JsValue::Object(setter), target.clone(), &[value])?;
                Ok(())
            }
            SetTarget::ReadOnly => fail(
                strict,
                format!(
                    "Cannot assign to read only property '{}' of {}",
                    key,
                    describe_value(target)
                ),
            ),
            SetTarget::GetterOnly => fail(
                strict,
                format!(
                    "Cannot set property {} of {} which has only a getter",
                    key,
                    describe_value(target)
                ),
            ),
        }
    }

    /// `object[key] = value` with a computed key
    pub fn set_keyed(
        &mut self,
        object: &JsValue,
        key: &JsValue,
        value: JsValue,
        strict: bool,
    ) -> Result<(), ExecError> {
        let key = self.to_property_key(key)?;
        self.set_property(object, key, value, strict)
    }

    /// Assigning `length` truncates, or extends with holes
    fn set_array_length(&mut self, array: &JsObjectRef, value: &JsValue) -> Result<(), ExecError> {
        let n = self.to_number(value)?;
        if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
            return Err(JsError::range_error("Invalid array length").into());
        }
        if let ExoticObject::Array(elements) = &mut array.borrow_mut().exotic {
            elements.set_length(n as u32);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Delete / has
    // ═══════════════════════════════════════════════════════════════════════════════

    /// `delete object[key]`. Non-configurable properties report false in
    /// sloppy code and throw in strict code.
    pub fn delete_keyed(&mut self, object: &JsValue, key: &JsValue, strict: bool) -> Result<bool, ExecError> {
        if object.is_null_or_undefined() {
            return Err(JsError::type_error("Cannot convert undefined or null to object").into());
        }
        let key = self.to_property_key(key)?;
        let JsValue::Object(obj) = object else {
            return Ok(true);
        };

        let configurable = {
            let mut borrowed = obj.borrow_mut();
            let object = &mut *borrowed;
            match (&mut object.exotic, key.as_index()) {
                (ExoticObject::Array(elements), Some(index)) => {
                    elements.delete(index);
                    true
                }
                (ExoticObject::Array(_), None) if key.eq_str("length") => false,
                _ => match object.properties.get(&key).map(|prop| prop.configurable) {
                    None => true,
                    Some(true) => {
                        object.properties.shift_remove(&key);
                        true
                    }
                    Some(false) => false,
                },
            }
        };

        if configurable {
            return Ok(true);
        }
        fail(
            strict,
            format!("Cannot delete property '{}' of {}", key, describe_value(object)),
        )?;
        Ok(false)
    }

    /// `key in object`
    pub fn has_property_in(&mut self, key: &JsValue, object: &JsValue) -> Result<bool, ExecError> {
        let JsValue::Object(obj) = object else {
            return Err(JsError::type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                describe_value(key).trim_matches('"'),
                describe_value(object)
            ))
            .into());
        };
        let key = self.to_property_key(key)?;
        Ok(obj.has_property(&key))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════════════════

    /// CreateDataProperty for object literal fields
    pub fn define_field(&mut self, object: &JsValue, key: PropertyKey, value: JsValue) -> Result<(), ExecError> {
        let obj = literal_target(object)?;
        if is_array(&obj) {
            if let Some(index) = key.as_index() {
                store_element(&obj, index, value);
                return Ok(());
            }
        }
        obj.borrow_mut().define_property(key, Property::data(value));
        Ok(())
    }

    /// Store an array literal element at a fixed index
    pub fn store_array_index(&mut self, array: &JsValue, index: u32, value: JsValue) -> Result<(), ExecError> {
        let obj = array_target(array)?;
        store_element(&obj, index, value);
        Ok(())
    }

    /// Append values at `length`
    pub fn array_append(&mut self, array: &JsValue, values: Vec<JsValue>) -> Result<(), ExecError> {
        let obj = array_target(array)?;
        if let ExoticObject::Array(elements) = &mut obj.borrow_mut().exotic {
            for value in values {
                elements.push(value);
            }
        }
        Ok(())
    }
}

fn fail(strict: bool, message: String) -> Result<(), ExecError> {
    if strict {
        Err(JsError::type_error(message).into())
    } else {
        Ok(())
    }
}

fn is_array(obj: &JsObjectRef) -> bool {
    matches!(obj.borrow().exotic, ExoticObject::Array(_))
}

fn store_element(array: &JsObjectRef, index: u32, value: JsValue) {
    if let ExoticObject::Array(elements) = &mut array.borrow_mut().exotic {
        elements.set(index, value);
    }
}

fn literal_target(value: &JsValue) -> Result<JsObjectRef, JsError> {
    match value {
        JsValue::Object(obj) => Ok(obj.cheap_clone()),
        other => Err(JsError::type_error(format!(
            "Cannot define a field on {}",
            describe_value(other)
        ))),
    }
}

fn array_target(value: &JsValue) -> Result<JsObjectRef, JsError> {
    match value {
        JsValue::Object(obj) if is_array(obj) => Ok(obj.cheap_clone()),
        other => Err(JsError::type_error(format!(
            "{} is not an array",
            describe_value(other)
        ))),
    }
}

/// Walk the chain for the first property named `key`
fn find_set_target(object: &JsObjectRef, key: &PropertyKey) -> SetTarget {
    let mut current = Some(object.cheap_clone());
    while let Some(obj) = current.take() {
        let borrowed = obj.borrow();
        if let Some(prop) = borrowed.get_own_property(key) {
            return match &prop.slot {
                PropertySlot::Data(_) if prop.writable => SetTarget::Define,
                PropertySlot::Data(_) => SetTarget::ReadOnly,
                PropertySlot::Accessor { set: Some(setter), .. } => SetTarget::Setter(setter.cheap_clone()),
                PropertySlot::Accessor { set: None, .. } => SetTarget::GetterOnly,
            };
        }
        current = borrowed.prototype.clone();
    }
    SetTarget::Define
}
