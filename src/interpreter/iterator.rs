//! Iterator protocol helpers used by the iteration and spread opcodes

use crate::error::{ExecError, JsError};
use crate::value::{ExoticObject, JsSymbol, JsValue, MAX_MATERIALIZED_LENGTH, PropertyKey};

use super::Agent;
use super::operations::describe_value;

impl Agent {
    /// GetIterator: call `iterable[Symbol.iterator]()` and check the result
    pub fn get_iterator(&mut self, iterable: &JsValue) -> Result<JsValue, ExecError> {
        let key = PropertyKey::Symbol(JsSymbol::iterator());
        let method = if iterable.is_null_or_undefined() {
            JsValue::Undefined
        } else {
            self.get_property(iterable, &key)?
        };
        if !method.is_callable() {
            return Err(JsError::type_error(format!("{} is not iterable", describe_value(iterable))).into());
        }
        let iterator = self.call(&method, iterable.clone(), &[])?;
        if !iterator.is_object() {
            return Err(JsError::type_error("Result of the Symbol.iterator method is not an object").into());
        }
        Ok(iterator)
    }

    /// IteratorNext: call `iterator.next()`; the result must be an object
    pub fn iterator_next(&mut self, iterator: &JsValue) -> Result<JsValue, ExecError> {
        let next = self.get_property(iterator, &PropertyKey::from("next"))?;
        let result = self.call(&next, iterator.clone(), &[])?;
        if !result.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                describe_value(&result)
            ))
            .into());
        }
        Ok(result)
    }

    /// IteratorComplete
    pub fn iterator_done(&mut self, result: &JsValue) -> Result<bool, ExecError> {
        Ok(self.get_property(result, &PropertyKey::from("done"))?.to_boolean())
    }

    /// IteratorValue
    pub fn iterator_value(&mut self, result: &JsValue) -> Result<JsValue, ExecError> {
        self.get_property(result, &PropertyKey::from("value"))
    }

    /// Drain an iterable through the full protocol
    pub fn iterate_to_list(&mut self, iterable: &JsValue) -> Result<Vec<JsValue>, ExecError> {
        let iterator = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        loop {
            let result = self.iterator_next(&iterator)?;
            if self.iterator_done(&result)? {
                return Ok(values);
            }
            if values.len() >= MAX_MATERIALIZED_LENGTH as usize {
                return Err(JsError::range_error("Invalid array length").into());
            }
            values.push(self.iterator_value(&result)?);
        }
    }

    /// Argument list of a spread call. The list is normally the array the
    /// caller built with `SpreadIntoArray`; anything else is iterated.
    pub fn spread_arguments(&mut self, list: &JsValue) -> Result<Vec<JsValue>, ExecError> {
        if let JsValue::Object(obj) = list {
            if let ExoticObject::Array(elements) = &obj.borrow().exotic {
                return elements
                    .to_vec()
                    .ok_or_else(|| JsError::range_error("Invalid array length").into());
            }
        }
        self.iterate_to_list(list)
    }
}
