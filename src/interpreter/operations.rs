//! Coercions, operators and comparisons
//!
//! The abstract operations the VM delegates to: ToPrimitive, ToNumber,
//! ToString, ToPropertyKey, the string-or-numeric dispatch of the binary
//! operators, loose equality and the abstract relational comparison.
//! Anything that may run script code (`valueOf`, `toString`) goes through
//! the agent, so these are methods on [`Agent`].

use crate::bytecode::{BinaryOperator, UnaryOperator};
use crate::error::{ExecError, JsError};
use crate::value::{ExoticObject, JsString, JsValue, PropertyKey, number_to_string};

use super::Agent;

/// Hint passed to ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

impl Agent {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Coercions
    // ═══════════════════════════════════════════════════════════════════════════════

    /// ToPrimitive. Objects go through OrdinaryToPrimitive: `valueOf` then
    /// `toString`, or the reverse for a string hint.
    pub fn to_primitive(&mut self, value: &JsValue, hint: PreferredType) -> Result<JsValue, ExecError> {
        if !value.is_object() {
            return Ok(value.clone());
        }
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            PreferredType::Default | PreferredType::Number => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_property(value, &PropertyKey::from(name))?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("Cannot convert object to primitive value").into())
    }

    /// ToNumber
    pub fn to_number(&mut self, value: &JsValue) -> Result<f64, ExecError> {
        Ok(match value {
            JsValue::Undefined | JsValue::Uninitialized => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s.as_str()),
            JsValue::Symbol(_) => {
                return Err(JsError::type_error("Cannot convert a Symbol value to a number").into());
            }
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    /// ToString
    pub fn to_string(&mut self, value: &JsValue) -> Result<JsString, ExecError> {
        Ok(match value {
            JsValue::Undefined | JsValue::Uninitialized => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.clone(),
            JsValue::Symbol(_) => {
                return Err(JsError::type_error("Cannot convert a Symbol value to a string").into());
            }
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    /// ToPropertyKey
    pub fn to_property_key(&mut self, value: &JsValue) -> Result<PropertyKey, ExecError> {
        match value {
            JsValue::Symbol(sym) => Ok(PropertyKey::Symbol(sym.clone())),
            JsValue::String(s) => Ok(PropertyKey::from(s.clone())),
            JsValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < f64::from(u32::MAX) => {
                Ok(PropertyKey::Index(*n as u32))
            }
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_property_key(&primitive)
            }
            other => Ok(PropertyKey::from(self.to_string(other)?)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Apply a binary operator. The left operand is coerced first.
    pub fn binary_op(
        &mut self,
        op: BinaryOperator,
        lhs: &JsValue,
        rhs: &JsValue,
    ) -> Result<JsValue, ExecError> {
        if op == BinaryOperator::Add {
            let left = self.to_primitive(lhs, PreferredType::Default)?;
            let right = self.to_primitive(rhs, PreferredType::Default)?;
            if matches!(left, JsValue::String(_)) || matches!(right, JsValue::String(_)) {
                let l = self.to_string(&left)?;
                let r = self.to_string(&right)?;
                return Ok(JsValue::String(l + r.as_str()));
            }
            let l = self.to_number(&left)?;
            let r = self.to_number(&right)?;
            return Ok(JsValue::Number(l + r));
        }

        let l = self.to_number(lhs)?;
        let r = self.to_number(rhs)?;
        let result = match op {
            BinaryOperator::Add | BinaryOperator::Sub => l - r,
            BinaryOperator::Mul => l * r,
            BinaryOperator::Div => l / r,
            // f64 `%` truncates like the language's remainder
            BinaryOperator::Mod => l % r,
            BinaryOperator::Exp => exponentiate(l, r),
            BinaryOperator::BitAnd => f64::from(to_int32(l) & to_int32(r)),
            BinaryOperator::BitOr => f64::from(to_int32(l) | to_int32(r)),
            BinaryOperator::BitXor => f64::from(to_int32(l) ^ to_int32(r)),
            BinaryOperator::Shl => f64::from(to_int32(l).wrapping_shl(to_uint32(r) & 31)),
            BinaryOperator::Shr => f64::from(to_int32(l) >> (to_uint32(r) & 31)),
            BinaryOperator::UShr => f64::from(to_uint32(l) >> (to_uint32(r) & 31)),
        };
        Ok(JsValue::Number(result))
    }

    pub fn unary_op(&mut self, op: UnaryOperator, operand: &JsValue) -> Result<JsValue, ExecError> {
        Ok(match op {
            UnaryOperator::Minus => JsValue::Number(-self.to_number(operand)?),
            UnaryOperator::Plus => JsValue::Number(self.to_number(operand)?),
            UnaryOperator::Not => JsValue::Boolean(!operand.to_boolean()),
            UnaryOperator::BitNot => JsValue::Number(f64::from(!to_int32(self.to_number(operand)?))),
            UnaryOperator::Void => JsValue::Undefined,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Equality
    // ═══════════════════════════════════════════════════════════════════════════════

    /// IsLooselyEqual (`==`)
    pub fn loose_equals(&mut self, lhs: &JsValue, rhs: &JsValue) -> Result<bool, ExecError> {
        if same_type(lhs, rhs) {
            return Ok(lhs.strict_equals(rhs));
        }
        match (lhs, rhs) {
            (a, b) if a.is_null_or_undefined() && b.is_null_or_undefined() => Ok(true),
            (JsValue::Number(n), JsValue::String(s)) | (JsValue::String(s), JsValue::Number(n)) => {
                Ok(*n == string_to_number(s.as_str()))
            }
            (JsValue::Boolean(b), other) | (other, JsValue::Boolean(b)) => {
                let n = JsValue::Number(f64::from(u8::from(*b)));
                self.loose_equals(&n, other)
            }
            (JsValue::Object(_), JsValue::Number(_) | JsValue::String(_) | JsValue::Symbol(_)) => {
                let primitive = self.to_primitive(lhs, PreferredType::Default)?;
                self.loose_equals(&primitive, rhs)
            }
            (JsValue::Number(_) | JsValue::String(_) | JsValue::Symbol(_), JsValue::Object(_)) => {
                let primitive = self.to_primitive(rhs, PreferredType::Default)?;
                self.loose_equals(lhs, &primitive)
            }
            _ => Ok(false),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Relational comparison
    // ═══════════════════════════════════════════════════════════════════════════════

    /// IsLessThan(x, y). `None` stands for the undefined result (a NaN was
    /// involved). `left_first` fixes the order the operands are coerced in.
    pub fn compare(&mut self, x: &JsValue, y: &JsValue, left_first: bool) -> Result<Option<bool>, ExecError> {
        let (px, py) = if left_first {
            let px = self.to_primitive(x, PreferredType::Number)?;
            let py = self.to_primitive(y, PreferredType::Number)?;
            (px, py)
        } else {
            let py = self.to_primitive(y, PreferredType::Number)?;
            let px = self.to_primitive(x, PreferredType::Number)?;
            (px, py)
        };

        if let (JsValue::String(a), JsValue::String(b)) = (&px, &py) {
            return Ok(Some(a.cmp_utf16(b) == std::cmp::Ordering::Less));
        }
        let nx = self.to_number(&px)?;
        let ny = self.to_number(&py)?;
        if nx.is_nan() || ny.is_nan() {
            return Ok(None);
        }
        Ok(Some(nx < ny))
    }

    /// `a < b`
    pub fn less_than(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, ExecError> {
        Ok(self.compare(a, b, true)?.unwrap_or(false))
    }

    /// `a > b`, evaluated as `b < a` with the left operand still coerced first
    pub fn greater_than(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, ExecError> {
        Ok(self.compare(b, a, false)?.unwrap_or(false))
    }

    /// `a <= b`, evaluated as `!(b < a)`
    pub fn less_than_or_equal(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, ExecError> {
        Ok(self.compare(b, a, false)?.is_some_and(|r| !r))
    }

    /// `a >= b`, evaluated as `!(a < b)`
    pub fn greater_than_or_equal(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, ExecError> {
        Ok(self.compare(a, b, true)?.is_some_and(|r| !r))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // instanceof
    // ═══════════════════════════════════════════════════════════════════════════════

    /// OrdinaryHasInstance: is `constructor.prototype` on `value`'s chain
    pub fn instance_of(&mut self, value: &JsValue, constructor: &JsValue) -> Result<bool, ExecError> {
        if !constructor.is_callable() {
            return Err(JsError::type_error(format!(
                "Right-hand side of 'instanceof' is not callable ({})",
                describe_value(constructor)
            ))
            .into());
        }
        let JsValue::Object(object) = value else {
            return Ok(false);
        };
        let JsValue::Object(prototype) = self.get_property(constructor, &PropertyKey::from("prototype"))?
        else {
            return Err(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            )
            .into());
        };

        let mut current = object.prototype();
        while let Some(proto) = current {
            if proto.ptr_eq(&prototype) {
                return Ok(true);
            }
            current = proto.prototype();
        }
        Ok(false)
    }
}

fn same_type(a: &JsValue, b: &JsValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// `base ** exponent`. Differs from `powf` for NaN exponents and for a
/// base of magnitude one raised to an infinite power, both NaN here.
fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32: truncate, then reduce modulo 2^32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    const TWO_32: f64 = 4_294_967_296.0;
    let m = n.trunc().rem_euclid(TWO_32);
    m as u32
}

/// StringToNumber. Surrounding whitespace is ignored, the empty string is
/// zero, and `0x`/`0o`/`0b` prefixes select a radix.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
    if trimmed.is_empty() {
        return 0.0;
    }

    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = trimmed.get(2..).unwrap_or("");
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits.chars().try_fold(0.0f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN);
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf" and "nan", which are not numeric literals here
    let numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Short rendering of a value for error messages. Never runs script code.
pub fn describe_value(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => format!("\"{}\"", s),
        JsValue::Object(obj) => {
            let Ok(borrowed) = obj.try_borrow() else {
                return "#<Object>".to_string();
            };
            match &borrowed.exotic {
                ExoticObject::Function(func) => format!("function {}", func.name()),
                ExoticObject::Array(_) => "[object Array]".to_string(),
                ExoticObject::Error(kind) => format!("#<{}>", kind.name()),
                ExoticObject::Coroutine(_) => "[object Generator]".to_string(),
                ExoticObject::ArrayIterator { .. } => "[object Array Iterator]".to_string(),
                ExoticObject::Ordinary => "#<Object>".to_string(),
            }
        }
        other => format!("{:?}", other),
    }
}
