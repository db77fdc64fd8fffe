//! Realm: the global object, the global environment record and the
//! intrinsic prototypes reached by opcodes.

use crate::environment::Env;
use crate::error::ErrorKind;
use crate::prelude::*;
use crate::value::{
    ArrayElements, CheapClone, ExoticObject, JsFunction, JsObject, JsObjectRef, JsString, JsValue,
    NativeFn, NativeFunction, Property, PropertyKey,
};

use super::builtins;

/// Intrinsic objects shared by every script and module of a realm
pub struct Intrinsics {
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub array_iterator_prototype: JsObjectRef,
    pub generator_prototype: JsObjectRef,
    pub async_task_prototype: JsObjectRef,
    error_prototypes: FxHashMap<ErrorKind, JsObjectRef>,
}

impl Intrinsics {
    /// Prototype for instances of a standard error kind
    pub fn error_prototype(&self, kind: ErrorKind) -> JsObjectRef {
        match self.error_prototypes.get(&kind) {
            Some(proto) => proto.cheap_clone(),
            None => self.object_prototype.cheap_clone(),
        }
    }
}

pub struct Realm {
    pub global_object: JsObjectRef,
    pub global_env: Env,
    pub intrinsics: Intrinsics,
}

impl Realm {
    /// Create a realm with its intrinsics installed
    pub fn new() -> Self {
        let object_prototype = JsObjectRef::new(JsObject::ordinary(None));
        let ordinary = || JsObjectRef::new(JsObject::ordinary(Some(object_prototype.cheap_clone())));

        let function_prototype = ordinary();
        let array_prototype = JsObjectRef::new(JsObject::new(
            Some(object_prototype.cheap_clone()),
            ExoticObject::Array(ArrayElements::new()),
        ));
        let array_iterator_prototype = ordinary();
        let generator_prototype = ordinary();
        let async_task_prototype = ordinary();

        let error_base = ordinary();
        let mut error_prototypes = FxHashMap::default();
        for kind in ErrorKind::ALL {
            let proto = if kind == ErrorKind::Error {
                error_base.cheap_clone()
            } else {
                JsObjectRef::new(JsObject::ordinary(Some(error_base.cheap_clone())))
            };
            error_prototypes.insert(kind, proto);
        }

        let global_object = ordinary();
        let global_env = Env::global(global_object.cheap_clone());

        let realm = Self {
            global_object,
            global_env,
            intrinsics: Intrinsics {
                object_prototype,
                function_prototype,
                array_prototype,
                array_iterator_prototype,
                generator_prototype,
                async_task_prototype,
                error_prototypes,
            },
        };
        builtins::init_realm(&realm);
        realm
    }

    /// Ordinary object inheriting from `Object.prototype`
    pub fn create_object(&self) -> JsObjectRef {
        JsObjectRef::new(JsObject::ordinary(Some(
            self.intrinsics.object_prototype.cheap_clone(),
        )))
    }

    pub fn create_array(&self, elements: Vec<JsValue>) -> JsObjectRef {
        JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.array_prototype.cheap_clone()),
            ExoticObject::Array(elements.into()),
        ))
    }

    /// `{ value, done }` object returned by iterator and generator `next`
    pub fn create_iter_result(&self, value: JsValue, done: bool) -> JsValue {
        let result = self.create_object();
        {
            let mut obj = result.borrow_mut();
            obj.set_property(PropertyKey::from("value"), value);
            obj.set_property(PropertyKey::from("done"), JsValue::Boolean(done));
        }
        JsValue::Object(result)
    }

    /// Function object wrapping a native function
    pub fn create_native_function(
        &self,
        name: &'static str,
        func: NativeFn,
        arity: u32,
        constructor: bool,
    ) -> JsObjectRef {
        let function = JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.function_prototype.cheap_clone()),
            ExoticObject::Function(JsFunction::Native(NativeFunction {
                name,
                func,
                arity,
                constructor,
            })),
        ));
        define_function_metadata(&function, JsString::from(name), arity);
        function
    }

    /// Install a native method as a non-enumerable property
    pub fn register_method(&self, target: &JsObjectRef, name: &'static str, func: NativeFn, arity: u32) {
        let method = self.create_native_function(name, func, arity, false);
        target
            .borrow_mut()
            .define_property(PropertyKey::from(name), Property::hidden(JsValue::Object(method)));
    }

    /// Install a native method under a symbol key
    pub fn register_symbol_method(
        &self,
        target: &JsObjectRef,
        key: PropertyKey,
        name: &'static str,
        func: NativeFn,
    ) {
        let method = self.create_native_function(name, func, 0, false);
        target
            .borrow_mut()
            .define_property(key, Property::hidden(JsValue::Object(method)));
    }

    /// Global binding that scripts may overwrite (`globalThis`, constructors)
    pub fn define_global(&self, name: &str, value: JsValue) {
        self.global_object
            .borrow_mut()
            .define_property(PropertyKey::from(name), Property::hidden(value));
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

/// `name` and `length`: read-only, non-enumerable, configurable
pub(crate) fn define_function_metadata(function: &JsObjectRef, name: JsString, arity: u32) {
    let mut obj = function.borrow_mut();
    for (key, value) in [
        ("name", JsValue::String(name)),
        ("length", JsValue::Number(f64::from(arity))),
    ] {
        obj.define_property(
            PropertyKey::from(key),
            Property {
                writable: false,
                ..Property::hidden(value)
            },
        );
    }
}
