//! JavaScript value representation
//!
//! The core JsValue type and the object model the VM operates on.

use std::hash::{Hash, Hasher};

use crate::bytecode::FunctionPackage;
use crate::environment::Env;
use crate::error::{ErrorKind, ExecError};
use crate::interpreter::Agent;
use crate::interpreter::generator::CoroutineRef;
use crate::prelude::*;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit at the call site that a clone only bumps a reference
/// count. Regular `.clone()` still works.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
    /// Read of a lexical binding whose initializer has not run yet.
    /// Only ever observed by `ThrowLexicalAccessError`.
    Uninitialized,
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_constructor(),
            _ => false,
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined | JsValue::Uninitialized => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToBoolean
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null | JsValue::Uninitialized => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) | JsValue::Object(_) => true,
        }
    }

    /// Strict equality (===). Never coerces.
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN !== NaN, +0 === -0
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Symbol(s) => write!(f, "{}", s),
            JsValue::Uninitialized => write!(f, "<uninitialized>"),
            JsValue::Object(obj) => match obj.try_borrow() {
                Ok(obj) => match &obj.exotic {
                    ExoticObject::Ordinary => write!(f, "{{...}}"),
                    ExoticObject::Array(elements) => write!(f, "Array({})", elements.len()),
                    ExoticObject::Function(func) => write!(f, "[Function: {}]", func.name()),
                    ExoticObject::Error(kind) => write!(f, "[{}]", kind.name()),
                    ExoticObject::Coroutine(_) => write!(f, "[object Generator]"),
                    ExoticObject::ArrayIterator { .. } => write!(f, "[object Array Iterator]"),
                },
                Err(_) => write!(f, "{{<borrowed>}}"),
            },
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Strings
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference-counted immutable string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, as scripts observe it
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// Compare by UTF-16 code units (the order `<` uses on strings)
    pub fn cmp_utf16(&self, other: &JsString) -> std::cmp::Ordering {
        self.0.encode_utf16().cmp(other.0.encode_utf16())
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(Rc::from(s))
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(Rc::from(s))
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &*self.0)
    }
}

impl std::ops::Add<&str> for JsString {
    type Output = JsString;

    fn add(self, rhs: &str) -> Self::Output {
        let mut s = String::with_capacity(self.0.len() + rhs.len());
        s.push_str(&self.0);
        s.push_str(rhs);
        JsString::from(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Symbols
// ═══════════════════════════════════════════════════════════════════════════════

/// Id of the well-known `Symbol.iterator`
pub const SYMBOL_ITERATOR_ID: u64 = 1;

/// A symbol value, compared by id
#[derive(Clone)]
pub struct JsSymbol {
    id: u64,
    pub description: Option<JsString>,
}

impl JsSymbol {
    pub fn new(id: u64, description: Option<JsString>) -> Self {
        Self { id, description }
    }

    pub fn iterator() -> Self {
        Self::new(SYMBOL_ITERATOR_ID, Some(JsString::from("Symbol.iterator")))
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl Hash for JsSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "Symbol({})", desc),
            None => write!(f, "Symbol()"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared handle to a heap object
#[derive(Clone)]
pub struct JsObjectRef(Rc<RefCell<JsObject>>);

impl CheapClone for JsObjectRef {}

impl JsObjectRef {
    pub fn new(object: JsObject) -> Self {
        JsObjectRef(Rc::new(RefCell::new(object)))
    }

    pub fn borrow(&self) -> Ref<'_, JsObject> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, JsObject> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, JsObject>, std::cell::BorrowError> {
        self.0.try_borrow()
    }

    pub fn ptr_eq(&self, other: &JsObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity, stable for the object's lifetime
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn prototype(&self) -> Option<JsObjectRef> {
        self.borrow().prototype.clone()
    }

    /// HasProperty: own properties, then the prototype chain
    pub fn has_property(&self, key: &PropertyKey) -> bool {
        let mut current = Some(self.cheap_clone());
        while let Some(obj) = current.take() {
            let borrowed = obj.borrow();
            if borrowed.has_own_property(key) {
                return true;
            }
            current = borrowed.prototype.clone();
        }
        false
    }
}

impl fmt::Debug for JsObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&JsValue::Object(self.cheap_clone()), f)
    }
}

/// A heap object: prototype link, ordered properties, exotic payload
pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    pub properties: IndexMap<PropertyKey, Property>,
    pub exotic: ExoticObject,
    pub extensible: bool,
}

impl JsObject {
    pub fn new(prototype: Option<JsObjectRef>, exotic: ExoticObject) -> Self {
        Self {
            prototype,
            properties: index_map_new(),
            exotic,
            extensible: true,
        }
    }

    pub fn ordinary(prototype: Option<JsObjectRef>) -> Self {
        Self::new(prototype, ExoticObject::Ordinary)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    pub fn is_constructor(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(func) => func.is_constructor(),
            _ => false,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match &self.exotic {
            ExoticObject::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Own property check, including array elements and `length`
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        if let ExoticObject::Array(elements) = &self.exotic {
            if let Some(index) = key.as_index() {
                return elements.contains(index);
            }
            if key.eq_str("length") {
                return true;
            }
        }
        self.properties.contains_key(key)
    }

    /// Define or overwrite a writable, enumerable, configurable data property
    pub fn set_property(&mut self, key: PropertyKey, value: JsValue) {
        self.properties.insert(key, Property::data(value));
    }

    pub fn define_property(&mut self, key: PropertyKey, prop: Property) {
        self.properties.insert(key, prop);
    }
}

/// Exotic payload attached to an object
pub enum ExoticObject {
    Ordinary,
    Array(ArrayElements),
    Function(JsFunction),
    /// Instance created by one of the standard error constructors
    Error(ErrorKind),
    /// Generator object or async task
    Coroutine(CoroutineRef),
    ArrayIterator { array: JsObjectRef, next_index: usize },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Array elements
// ═══════════════════════════════════════════════════════════════════════════════

/// Stores further than this past the dense part go to the sparse map
const MAX_DENSE_GAP: usize = 1024;

/// Largest array a caller may expand into a `Vec`
pub const MAX_MATERIALIZED_LENGTH: u32 = 1 << 24;

/// Elements of an array object: a dense prefix, sparse indices far past it
/// and the array's `length`. Indices below `length` with no element are
/// holes.
#[derive(Debug, Clone, Default)]
pub struct ArrayElements {
    dense: Vec<JsValue>,
    sparse: FxHashMap<u32, JsValue>,
    length: u32,
}

impl ArrayElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Element at `index`; `None` for holes and indices past the end
    pub fn get(&self, index: u32) -> Option<&JsValue> {
        self.dense
            .get(index as usize)
            .or_else(|| self.sparse.get(&index))
    }

    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Store an element, growing `length` past it
    pub fn set(&mut self, index: u32, value: JsValue) {
        let position = index as usize;
        if let Some(slot) = self.dense.get_mut(position) {
            *slot = value;
        } else if position - self.dense.len() <= MAX_DENSE_GAP {
            self.dense.resize(position, JsValue::Undefined);
            self.dense.push(value);
            self.sparse.remove(&index);
            self.absorb_sparse();
        } else {
            self.sparse.insert(index, value);
        }
        self.length = self.length.max(index.saturating_add(1));
    }

    /// Append at `length`
    pub fn push(&mut self, value: JsValue) {
        self.set(self.length, value);
    }

    /// Remove an element, leaving `length` alone
    pub fn delete(&mut self, index: u32) {
        if let Some(slot) = self.dense.get_mut(index as usize) {
            *slot = JsValue::Undefined;
        } else {
            self.sparse.remove(&index);
        }
    }

    /// Truncate or extend. Extending only adds holes.
    pub fn set_length(&mut self, length: u32) {
        self.dense.truncate(length as usize);
        self.sparse.retain(|&index, _| index < length);
        self.length = length;
    }

    /// Every index in `0..length` in order, holes as undefined. `None` when
    /// the array is longer than [`MAX_MATERIALIZED_LENGTH`].
    pub fn to_vec(&self) -> Option<Vec<JsValue>> {
        if self.sparse.is_empty() && self.dense.len() == self.length as usize {
            return Some(self.dense.clone());
        }
        if self.length > MAX_MATERIALIZED_LENGTH {
            return None;
        }
        Some(
            (0..self.length)
                .map(|index| self.get(index).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Present elements in index order
    pub fn entries(&self) -> Vec<(u32, JsValue)> {
        let mut sparse: Vec<(u32, JsValue)> = self
            .sparse
            .iter()
            .map(|(&index, value)| (index, value.clone()))
            .collect();
        sparse.sort_unstable_by_key(|(index, _)| *index);
        self.dense
            .iter()
            .enumerate()
            .map(|(index, value)| (index as u32, value.clone()))
            .chain(sparse)
            .collect()
    }

    /// Move sparse entries that now continue the dense part into it
    fn absorb_sparse(&mut self) {
        while let Some(value) = self.sparse.remove(&(self.dense.len() as u32)) {
            self.dense.push(value);
        }
    }
}

impl From<Vec<JsValue>> for ArrayElements {
    fn from(dense: Vec<JsValue>) -> Self {
        let length = u32::try_from(dense.len()).unwrap_or(u32::MAX);
        Self {
            dense,
            sparse: FxHashMap::default(),
            length,
        }
    }
}

/// Property key
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    /// Canonical array index
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    /// Build a key from a string, canonicalizing array indices
    pub fn from_string(s: JsString) -> Self {
        match canonical_index(s.as_str()) {
            Some(idx) => PropertyKey::Index(idx),
            None => PropertyKey::String(s),
        }
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn eq_str(&self, s: &str) -> bool {
        matches!(self, PropertyKey::String(k) if k.as_str() == s)
    }

    /// The key as a value (`String` or `Symbol`)
    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::String(s) => JsValue::String(s.cheap_clone()),
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(sym) => JsValue::Symbol(sym.clone()),
        }
    }
}

fn canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // 2^32 - 1 is not an array index
    s.parse::<u32>().ok().filter(|&i| i != u32::MAX)
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_string(JsString::from(s))
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        PropertyKey::from_string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}

impl From<JsSymbol> for PropertyKey {
    fn from(sym: JsSymbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(sym) => write!(f, "[{}]", sym),
        }
    }
}

/// Property storage: a data value or an accessor pair
#[derive(Clone, Debug)]
pub enum PropertySlot {
    Data(JsValue),
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
    },
}

/// A property with its attributes
#[derive(Clone, Debug)]
pub struct Property {
    pub slot: PropertySlot,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable, configurable data property
    pub fn data(value: JsValue) -> Self {
        Self {
            slot: PropertySlot::Data(value),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable, non-enumerable, configurable data property (methods)
    pub fn hidden(value: JsValue) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    /// Read-only, non-enumerable, non-configurable data property
    pub fn frozen(value: JsValue) -> Self {
        Self {
            slot: PropertySlot::Data(value),
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    pub fn accessor(get: Option<JsObjectRef>, set: Option<JsObjectRef>) -> Self {
        Self {
            slot: PropertySlot::Accessor { get, set },
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn value(&self) -> Option<&JsValue> {
        match &self.slot {
            PropertySlot::Data(v) => Some(v),
            PropertySlot::Accessor { .. } => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Native function signature: `(agent, this, args) -> value`
pub type NativeFn = fn(&mut Agent, JsValue, &[JsValue]) -> Result<JsValue, ExecError>;

pub enum JsFunction {
    Bytecode(Closure),
    Native(NativeFunction),
}

impl JsFunction {
    pub fn name(&self) -> &str {
        match self {
            JsFunction::Bytecode(closure) => closure.package.name().map_or("anonymous", |n| n.as_str()),
            JsFunction::Native(native) => native.name,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            JsFunction::Bytecode(closure) => closure.is_constructor(),
            JsFunction::Native(native) => native.constructor,
        }
    }
}

/// A function created from a nested IR package plus its captured environment
pub struct Closure {
    pub package: Rc<FunctionPackage>,
    pub env: Env,
    /// Object whose prototype `LoadSuperProperty` reads from
    pub home_object: Option<JsObjectRef>,
    /// Receiver and new-target captured by arrow functions
    pub lexical_this: Option<(JsValue, JsValue)>,
    pub class_constructor: bool,
}

impl Closure {
    pub fn is_constructor(&self) -> bool {
        let flags = self.package.flags();
        if self.class_constructor {
            return true;
        }
        !(flags.arrow || flags.generator || flags.is_async || flags.method)
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
    pub arity: u32,
    pub constructor: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Number formatting
// ═══════════════════════════════════════════════════════════════════════════════

/// Number::toString(10): shortest round-trip digits, JS exponent rules
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // `{:e}` yields the shortest round-trip digits as d.ddde±x
    let sci = format!("{:e}", n);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    // JS: value = 0.digits × 10^point
    let point = exponent + 1;

    if k <= point && point <= 21 {
        let mut s = digits;
        s.extend(std::iter::repeat_n('0', (point - k) as usize));
        s
    } else if 0 < point && point <= 21 {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let sign = if point - 1 >= 0 { "+" } else { "-" };
        let exp = (point - 1).abs();
        let mut chars = digits.chars();
        let first = chars.next().unwrap_or('0');
        let rest: String = chars.collect();
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, exp)
        } else {
            format!("{}.{}e{}{}", first, rest, sign, exp)
        }
    }
}

/// Render a thrown value for error messages without running script code
pub fn describe_thrown(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => s.to_string(),
        JsValue::Object(obj) => {
            let Ok(borrowed) = obj.try_borrow() else {
                return "[object]".to_string();
            };
            let is_error = matches!(borrowed.exotic, ExoticObject::Error(_));
            drop(borrowed);
            if is_error {
                let name = lookup_data_property(obj, "name")
                    .map(|v| describe_thrown(&v))
                    .unwrap_or_else(|| "Error".to_string());
                let message = lookup_data_property(obj, "message")
                    .map(|v| describe_thrown(&v))
                    .unwrap_or_default();
                if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                }
            } else {
                format!("{:?}", value)
            }
        }
        JsValue::Number(n) => number_to_string(*n),
        other => format!("{:?}", other),
    }
}

/// Walk the prototype chain for a data property without invoking accessors
fn lookup_data_property(obj: &JsObjectRef, name: &str) -> Option<JsValue> {
    let key = PropertyKey::from(name);
    let mut current = Some(obj.cheap_clone());
    while let Some(o) = current {
        let borrowed = o.try_borrow().ok()?;
        if let Some(prop) = borrowed.get_own_property(&key) {
            return prop.value().cloned();
        }
        current = borrowed.prototype.clone();
    }
    None
}
