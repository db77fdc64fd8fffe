//! Environment records
//!
//! Scoped name -> binding maps chained through an outer link. Records are
//! reference counted: the active chain and every closure created while a
//! record was active share it, so a popped record lives as long as its
//! longest holder.
//!
//! Bindings live in an insertion-ordered map, so a binding is addressable
//! both by name (dynamic lookup) and by its slot, the position it was
//! declared at (statically resolved `(slot, distance)` access).

use crate::bytecode::ScopeLayout;
use crate::error::{ExecError, JsError, VmError};
use crate::prelude::*;
use crate::value::{CheapClone, JsObjectRef, JsString, JsValue, Property, PropertyKey};

/// Current contents of a binding
#[derive(Clone)]
pub enum BindingValue {
    /// Created but its initializer has not run (TDZ)
    Uninitialized,
    Value(JsValue),
    /// Alias of a binding that lives in another module record
    Import { module: Env, name: JsString },
}

#[derive(Clone)]
pub struct Binding {
    pub value: BindingValue,
    pub mutable: bool,
}

impl Binding {
    fn uninitialized(mutable: bool) -> Self {
        Self {
            value: BindingValue::Uninitialized,
            mutable,
        }
    }
}

/// Record variant
pub enum EnvironmentKind {
    Declarative,
    /// Lexical declarations live in the record's bindings; `var`
    /// declarations are properties of the global object.
    Global {
        object: JsObjectRef,
        var_names: FxHashSet<JsString>,
    },
    Module,
}

pub struct EnvironmentRecord {
    pub kind: EnvironmentKind,
    pub bindings: IndexMap<JsString, Binding>,
    pub outer: Option<Env>,
}

/// Where a name resolved along the chain
pub enum Resolution {
    /// A record holding the binding
    Binding(Env),
    /// A property reachable from the global object
    GlobalObject(JsObjectRef),
    Unresolvable,
}

/// Shared handle to an environment record
#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvironmentRecord>>);

impl CheapClone for Env {}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0.borrow();
        write!(f, "[{} environment, {} bindings]", self.kind_name(), record.bindings.len())
    }
}

impl Env {
    fn from_record(record: EnvironmentRecord) -> Self {
        Env(Rc::new(RefCell::new(record)))
    }

    /// Global record backed by `object`
    pub fn global(object: JsObjectRef) -> Self {
        Self::from_record(EnvironmentRecord {
            kind: EnvironmentKind::Global {
                object,
                var_names: FxHashSet::default(),
            },
            bindings: index_map_new(),
            outer: None,
        })
    }

    /// Declarative record with every binding of `layout` uninitialized
    pub fn declarative(outer: Env, layout: &ScopeLayout) -> Self {
        Self::with_layout(EnvironmentKind::Declarative, outer, layout)
    }

    /// Module record with every binding of `layout` uninitialized
    pub fn module(outer: Env, layout: &ScopeLayout) -> Self {
        Self::with_layout(EnvironmentKind::Module, outer, layout)
    }

    fn with_layout(kind: EnvironmentKind, outer: Env, layout: &ScopeLayout) -> Self {
        let mut bindings = index_map_with_capacity(layout.len());
        for binding in &layout.bindings {
            bindings.insert(binding.name.cheap_clone(), Binding::uninitialized(binding.mutable));
        }
        Self::from_record(EnvironmentRecord {
            kind,
            bindings,
            outer: Some(outer),
        })
    }

    pub fn borrow(&self) -> Ref<'_, EnvironmentRecord> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn outer(&self) -> Option<Env> {
        self.0.borrow().outer.clone()
    }

    pub fn kind_name(&self) -> &'static str {
        match self.0.borrow().kind {
            EnvironmentKind::Declarative => "declarative",
            EnvironmentKind::Global { .. } => "global",
            EnvironmentKind::Module => "module",
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self.0.borrow().kind, EnvironmentKind::Module)
    }

    pub fn global_object(&self) -> Option<JsObjectRef> {
        match &self.0.borrow().kind {
            EnvironmentKind::Global { object, .. } => Some(object.cheap_clone()),
            _ => None,
        }
    }

    /// Walk `distance` outer links
    pub fn ancestor(&self, distance: u32) -> Option<Env> {
        let mut env = self.cheap_clone();
        for _ in 0..distance {
            env = env.outer()?;
        }
        Some(env)
    }

    /// Nearest module record on the chain
    pub fn enclosing_module(&self) -> Option<Env> {
        let mut current = Some(self.cheap_clone());
        while let Some(env) = current.take() {
            if env.is_module() {
                return Some(env);
            }
            current = env.outer();
        }
        None
    }

    pub fn has_own_binding(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Binding creation
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn create_mutable_binding(&self, name: JsString) {
        self.0
            .borrow_mut()
            .bindings
            .insert(name, Binding::uninitialized(true));
    }

    pub fn create_immutable_binding(&self, name: JsString) {
        self.0
            .borrow_mut()
            .bindings
            .insert(name, Binding::uninitialized(false));
    }

    /// Run the initializer of an existing binding. Returns false if absent.
    pub fn initialize_binding(&self, name: &str, value: JsValue) -> bool {
        match self.0.borrow_mut().bindings.get_mut(name) {
            Some(binding) => {
                binding.value = BindingValue::Value(value);
                true
            }
            None => false,
        }
    }

    pub fn initialize_slot(&self, slot: u32, value: JsValue) -> Result<(), VmError> {
        let mut record = self.0.borrow_mut();
        let (_, binding) = record
            .bindings
            .get_index_mut(slot as usize)
            .ok_or(VmError::BindingSlot { slot })?;
        binding.value = BindingValue::Value(value);
        Ok(())
    }

    /// Alias `module`'s binding `name` as the immutable local `local`
    pub fn create_import_binding(&self, local: JsString, module: Env, name: JsString) {
        self.0.borrow_mut().bindings.insert(
            local,
            Binding {
                value: BindingValue::Import { module, name },
                mutable: false,
            },
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Slot read. An uninitialized binding yields the `Uninitialized` marker
    /// for `ThrowLexicalAccessError` to inspect.
    pub fn get_slot(&self, slot: u32) -> Result<JsValue, ExecError> {
        let value = {
            let record = self.0.borrow();
            let (_, binding) = record
                .bindings
                .get_index(slot as usize)
                .ok_or(VmError::BindingSlot { slot })?;
            binding.value.clone()
        };
        match value {
            BindingValue::Uninitialized => Ok(JsValue::Uninitialized),
            BindingValue::Value(v) => Ok(v),
            BindingValue::Import { module, name } => match module.lookup_raw(name.as_str()) {
                Some(v) => Ok(v),
                None => Err(JsError::not_defined(name.as_str()).into()),
            },
        }
    }

    /// GetBindingValue for an own binding. `None` if this record has no
    /// binding of that name; a TDZ read is a ReferenceError.
    pub fn get_binding_value(&self, name: &str) -> Result<Option<JsValue>, JsError> {
        match self.lookup_raw(name) {
            None => Ok(None),
            Some(JsValue::Uninitialized) => Err(JsError::uninitialized(name)),
            Some(v) => Ok(Some(v)),
        }
    }

    /// Own binding value following imports, with TDZ as the marker
    fn lookup_raw(&self, name: &str) -> Option<JsValue> {
        let value = self.0.borrow().bindings.get(name)?.value.clone();
        match value {
            BindingValue::Uninitialized => Some(JsValue::Uninitialized),
            BindingValue::Value(v) => Some(v),
            BindingValue::Import { module, name } => module.lookup_raw(name.as_str()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn set_slot(&self, slot: u32, value: JsValue) -> Result<(), ExecError> {
        let mut record = self.0.borrow_mut();
        let (name, binding) = record
            .bindings
            .get_index_mut(slot as usize)
            .ok_or(VmError::BindingSlot { slot })?;
        assign(name, binding, value)?;
        Ok(())
    }

    /// SetMutableBinding for an own binding. Returns false if this record
    /// has no binding of that name.
    pub fn set_mutable_binding(&self, name: &str, value: JsValue) -> Result<bool, JsError> {
        let mut record = self.0.borrow_mut();
        match record.bindings.get_full_mut(name) {
            Some((_, key, binding)) => {
                assign(key, binding, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Global record
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Hoisted `var`: rejected if a lexical declaration of the same name exists
    pub fn declare_global_var(&self, name: &JsString) -> Result<(), ExecError> {
        let mut record = self.0.borrow_mut();
        if record.bindings.contains_key(name.as_str()) {
            return Err(already_declared(name).into());
        }
        let EnvironmentKind::Global { object, var_names } = &mut record.kind else {
            return Err(VmError::WrongEnvironment {
                op: "DeclareGlobalVar",
                required: "global",
            }
            .into());
        };
        var_names.insert(name.cheap_clone());
        let key = PropertyKey::from(name.cheap_clone());
        let mut global = object.borrow_mut();
        if !global.has_own_property(&key) {
            global.define_property(
                key,
                Property {
                    configurable: false,
                    ..Property::data(JsValue::Undefined)
                },
            );
        }
        Ok(())
    }

    /// `let`/`const` at top level: rejected if the name is already declared
    /// lexically, as a `var`, or as a non-configurable global property
    pub fn declare_global_lexical(&self, name: &JsString, mutable: bool) -> Result<(), ExecError> {
        let conflict = {
            let record = self.0.borrow();
            let EnvironmentKind::Global { object, var_names } = &record.kind else {
                return Err(VmError::WrongEnvironment {
                    op: "DeclareGlobalLexical",
                    required: "global",
                }
                .into());
            };
            let key = PropertyKey::from(name.cheap_clone());
            let restricted = object
                .borrow()
                .get_own_property(&key)
                .is_some_and(|prop| !prop.configurable);
            var_names.contains(name.as_str()) || restricted || record.bindings.contains_key(name.as_str())
        };
        if conflict {
            return Err(already_declared(name).into());
        }
        if mutable {
            self.create_mutable_binding(name.cheap_clone());
        } else {
            self.create_immutable_binding(name.cheap_clone());
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Chain resolution
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Resolve `name` starting at this record
    pub fn resolve(&self, name: &str) -> Resolution {
        let mut current = Some(self.cheap_clone());
        while let Some(env) = current.take() {
            let record = env.0.borrow();
            if record.bindings.contains_key(name) {
                drop(record);
                return Resolution::Binding(env);
            }
            if let EnvironmentKind::Global { object, .. } = &record.kind {
                if object.has_property(&PropertyKey::from(name)) {
                    return Resolution::GlobalObject(object.cheap_clone());
                }
            }
            current = record.outer.clone();
        }
        Resolution::Unresolvable
    }
}

fn assign(name: &JsString, binding: &mut Binding, value: JsValue) -> Result<(), JsError> {
    match &binding.value {
        BindingValue::Import { .. } => Err(JsError::type_error("Assignment to constant variable.")),
        BindingValue::Uninitialized => Err(JsError::uninitialized(name.as_str())),
        BindingValue::Value(_) if !binding.mutable => {
            Err(JsError::type_error("Assignment to constant variable."))
        }
        BindingValue::Value(_) => {
            binding.value = BindingValue::Value(value);
            Ok(())
        }
    }
}

fn already_declared(name: &JsString) -> JsError {
    JsError::syntax_error(format!("Identifier '{}' has already been declared", name))
}
