//! Class construction: `CreateClass`, `AttachClassMethod` and the two
//! `super` opcodes.

use crate::bytecode::{FunctionPackage, MethodKind};
use crate::environment::Env;
use crate::error::{ExecError, JsError};
use crate::prelude::*;
use crate::value::{
    CheapClone, ExoticObject, JsFunction, JsObject, JsObjectRef, JsValue, Property, PropertyKey,
    PropertySlot,
};

use super::Agent;
use super::operations::describe_value;

impl Agent {
    /// Build a class from its constructor package and optional heritage.
    ///
    /// `extends null` gives instances a null-prototype; the constructor
    /// itself still inherits from `Function.prototype`.
    pub fn create_class(
        &mut self,
        package: Rc<FunctionPackage>,
        env: Env,
        heritage: Option<JsValue>,
    ) -> Result<JsObjectRef, ExecError> {
        let function_prototype = self.realm.intrinsics.function_prototype.cheap_clone();
        let (proto_parent, constructor_parent) = match heritage {
            None => (
                Some(self.realm.intrinsics.object_prototype.cheap_clone()),
                function_prototype,
            ),
            Some(JsValue::Null) => (None, function_prototype),
            Some(JsValue::Object(superclass)) if superclass.borrow().is_constructor() => {
                let parent = JsValue::Object(superclass.cheap_clone());
                let proto_parent = match self.get_property(&parent, &PropertyKey::from("prototype"))? {
                    JsValue::Object(proto) => Some(proto),
                    JsValue::Null => None,
                    other => {
                        return Err(JsError::type_error(format!(
                            "Class extends value does not have valid prototype property {}",
                            describe_value(&other)
                        ))
                        .into());
                    }
                };
                (proto_parent, superclass)
            }
            Some(other) => {
                return Err(JsError::type_error(format!(
                    "Class extends value {} is not a constructor or null",
                    describe_value(&other)
                ))
                .into());
            }
        };

        let prototype = JsObjectRef::new(JsObject::ordinary(proto_parent));
        let class = self.instantiate_closure(package, env, Some(prototype.cheap_clone()), None, true);
        {
            let mut class_obj = class.borrow_mut();
            class_obj.prototype = Some(constructor_parent);
            class_obj.define_property(
                PropertyKey::from("prototype"),
                Property::frozen(JsValue::Object(prototype.cheap_clone())),
            );
        }
        prototype.borrow_mut().define_property(
            PropertyKey::from("constructor"),
            Property::hidden(JsValue::Object(class.cheap_clone())),
        );
        Ok(class)
    }

    /// Install a method, getter or setter on the class prototype (or on
    /// the class itself when static). The method's home object becomes
    /// that target so `super` lookups resolve from it.
    pub fn attach_class_method(
        &mut self,
        class: &JsValue,
        key: PropertyKey,
        method: &JsValue,
        kind: MethodKind,
        is_static: bool,
    ) -> Result<(), ExecError> {
        let JsValue::Object(class_obj) = class else {
            return Err(JsError::type_error(format!("{} is not a class", describe_value(class))).into());
        };
        let JsValue::Object(method_obj) = method else {
            return Err(JsError::type_error(format!("{} is not a function", describe_value(method))).into());
        };

        let target = if is_static {
            class_obj.cheap_clone()
        } else {
            match self.get_property(class, &PropertyKey::from("prototype"))? {
                JsValue::Object(proto) => proto,
                other => {
                    return Err(JsError::type_error(format!(
                        "Class prototype {} is not an object",
                        describe_value(&other)
                    ))
                    .into());
                }
            }
        };

        if let ExoticObject::Function(JsFunction::Bytecode(closure)) = &mut method_obj.borrow_mut().exotic {
            closure.home_object = Some(target.cheap_clone());
        }

        let mut target_obj = target.borrow_mut();
        match kind {
            MethodKind::Method => {
                target_obj.define_property(key, Property::hidden(method.clone()));
            }
            MethodKind::Getter | MethodKind::Setter => {
                let (mut get, mut set) = match target_obj.get_own_property(&key).map(|prop| &prop.slot) {
                    Some(PropertySlot::Accessor { get, set }) => (get.clone(), set.clone()),
                    _ => (None, None),
                };
                if kind == MethodKind::Getter {
                    get = Some(method_obj.cheap_clone());
                } else {
                    set = Some(method_obj.cheap_clone());
                }
                target_obj.define_property(key, Property::accessor(get, set));
            }
        }
        Ok(())
    }

    /// `[[Prototype]]` of the active function: the parent class constructor
    pub fn super_constructor(&mut self, function: Option<&JsObjectRef>) -> Result<JsValue, ExecError> {
        let Some(function) = function else {
            return Err(JsError::syntax_error("'super' keyword unexpected here").into());
        };
        match function.prototype() {
            Some(parent) if parent.borrow().is_constructor() => Ok(JsValue::Object(parent)),
            Some(parent) => Err(JsError::type_error(format!(
                "Super constructor {} of anonymous class is not a constructor",
                describe_value(&JsValue::Object(parent))
            ))
            .into()),
            None => Err(JsError::type_error(
                "Super constructor null of anonymous class is not a constructor",
            )
            .into()),
        }
    }

    /// `super.key`: looked up on the home object's prototype, with the
    /// current receiver as `this` for getters
    pub fn load_super_property(
        &mut self,
        home_object: Option<JsObjectRef>,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, ExecError> {
        let Some(home) = home_object else {
            return Err(JsError::syntax_error("'super' keyword unexpected here").into());
        };
        if matches!(receiver, JsValue::Uninitialized) {
            return Err(JsError::reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
            .into());
        }
        match home.prototype() {
            Some(parent) => self.get_with_receiver(&JsValue::Object(parent), key, receiver),
            None => Err(JsError::type_error(format!(
                "Cannot read properties of null (reading '{}')",
                key
            ))
            .into()),
        }
    }
}
