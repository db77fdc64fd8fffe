//! Value properties of the global object

use crate::interpreter::realm::Realm;
use crate::value::{CheapClone, JsValue, Property, PropertyKey};

pub fn init_globals(realm: &Realm) {
    {
        let mut global = realm.global_object.borrow_mut();
        for (name, value) in [
            ("undefined", JsValue::Undefined),
            ("NaN", JsValue::Number(f64::NAN)),
            ("Infinity", JsValue::Number(f64::INFINITY)),
        ] {
            global.define_property(PropertyKey::from(name), Property::frozen(value));
        }
    }
    realm.define_global(
        "globalThis",
        JsValue::Object(realm.global_object.cheap_clone()),
    );
}
