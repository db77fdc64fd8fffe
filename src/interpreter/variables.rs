//! Name-based variable access: dynamic lookups along the environment
//! chain, the global record, module variables and import linking.
//!
//! Statically resolved `(slot, distance)` accesses go straight to
//! [`Env`](crate::environment::Env) and never come through here.

use crate::bytecode::ImportEntry;
use crate::environment::{Env, Resolution};
use crate::error::{ExecError, JsError};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

use super::Agent;

impl Agent {
    /// Resolve `name` from `env` outward and read it
    pub fn load_variable(&mut self, env: &Env, name: &JsString) -> Result<JsValue, ExecError> {
        match env.resolve(name.as_str()) {
            Resolution::Binding(record) => match record.get_binding_value(name.as_str())? {
                Some(value) => Ok(value),
                None => Err(JsError::not_defined(name.as_str()).into()),
            },
            Resolution::GlobalObject(global) => {
                self.get_property(&JsValue::Object(global), &PropertyKey::from(name.cheap_clone()))
            }
            Resolution::Unresolvable => Err(JsError::not_defined(name.as_str()).into()),
        }
    }

    /// Resolve `name` and assign it. An unresolvable name is a
    /// ReferenceError in strict code and creates a global in sloppy code.
    pub fn store_variable(
        &mut self,
        env: &Env,
        name: &JsString,
        value: JsValue,
        strict: bool,
    ) -> Result<(), ExecError> {
        let key = PropertyKey::from(name.cheap_clone());
        match env.resolve(name.as_str()) {
            Resolution::Binding(record) => {
                record.set_mutable_binding(name.as_str(), value)?;
                Ok(())
            }
            Resolution::GlobalObject(global) => {
                self.set_property(&JsValue::Object(global), key, value, strict)
            }
            Resolution::Unresolvable if strict => Err(JsError::not_defined(name.as_str()).into()),
            Resolution::Unresolvable => {
                let global = JsValue::Object(self.global_object());
                self.set_property(&global, key, value, false)
            }
        }
    }

    /// `LoadGlobal`: lexical declarations first, then the global object
    pub fn load_global(&mut self, name: &JsString) -> Result<JsValue, ExecError> {
        let env = self.global_env();
        self.load_variable(&env, name)
    }

    pub fn store_global(&mut self, name: &JsString, value: JsValue, strict: bool) -> Result<(), ExecError> {
        let env = self.global_env();
        self.store_variable(&env, name, value, strict)
    }

    /// `typeof name` for a global: unresolvable names are "undefined",
    /// a binding still in its TDZ throws
    pub fn typeof_global(&mut self, name: &JsString) -> Result<JsValue, ExecError> {
        let env = self.global_env();
        if matches!(env.resolve(name.as_str()), Resolution::Unresolvable) {
            return Ok(JsValue::from("undefined"));
        }
        let value = self.load_variable(&env, name)?;
        Ok(JsValue::from(value.type_of()))
    }

    /// Read a binding of the module record by name, following imports
    pub fn load_module_var(&mut self, module: &Env, name: &JsString) -> Result<JsValue, ExecError> {
        match module.get_binding_value(name.as_str())? {
            Some(value) => Ok(value),
            None => Err(JsError::not_defined(name.as_str()).into()),
        }
    }

    /// Assign a binding of the module record. Import bindings reject writes.
    pub fn store_module_var(&mut self, module: &Env, name: &JsString, value: JsValue) -> Result<(), ExecError> {
        if module.set_mutable_binding(name.as_str(), value)? {
            Ok(())
        } else {
            Err(JsError::not_defined(name.as_str()).into())
        }
    }

    /// Alias `entry.import_name` of an already registered module as
    /// `entry.local_name` in `module`
    pub fn link_import(&mut self, module: &Env, entry: &ImportEntry) -> Result<(), ExecError> {
        let Some(exporter) = self.modules.get(entry.specifier.as_str()).cloned() else {
            return Err(JsError::syntax_error(format!(
                "Cannot find module '{}'",
                entry.specifier
            ))
            .into());
        };
        if !exporter.has_own_binding(entry.import_name.as_str()) {
            return Err(JsError::syntax_error(format!(
                "The requested module '{}' does not provide an export named '{}'",
                entry.specifier, entry.import_name
            ))
            .into());
        }
        module.create_import_binding(
            entry.local_name.cheap_clone(),
            exporter,
            entry.import_name.cheap_clone(),
        );
        Ok(())
    }
}
