// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Typed values produced by expression evaluation.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::core::builtins::Builtin;
use crate::core::parser::{Expr, Param};
use crate::core::scope::ScopeId;
use crate::core::source::Node;

/// Relative tolerance used when comparing floats for equality.
pub const FLOAT_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{0}")]
    TypeMismatch(String),
    #[error("{0}")]
    IllegalQuantity(String),
}

impl ValueError {
    pub fn type_mismatch(detail: impl Into<String>) -> Self {
        ValueError::TypeMismatch(detail.into())
    }

    pub fn illegal_quantity(detail: impl Into<String>) -> Self {
        ValueError::IllegalQuantity(detail.into())
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Not yet known in this pass.
    #[default]
    Undefined,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Char(char),
    String(Rc<str>),
    Array(Rc<[Value]>),
    Dictionary(Rc<[(Value, Value)]>),
    Callable(Rc<Callable>),
}

#[derive(Debug)]
pub enum Callable {
    Builtin(&'static Builtin),
    User(UserFunction),
}

impl Callable {
    pub fn name(&self) -> Option<&str> {
        match self {
            Callable::Builtin(builtin) => Some(builtin.name),
            Callable::User(func) => func.name.as_deref(),
        }
    }
}

#[derive(Debug)]
pub struct UserFunction {
    pub name: Option<String>,
    pub params: Rc<[Param]>,
    pub body: FunctionBody,
    /// Scope the function was defined in; calls nest beneath it.
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Expr(Rc<Expr>),
    Block(Rc<[Node]>),
}

impl Value {
    /// Numeric value from a float, demoted to an integer when it is integral
    /// and fits in 32 bits.
    pub fn number(value: f64) -> Value {
        if value.is_finite()
            && value.fract() == 0.0
            && value >= f64::from(i32::MIN)
            && value <= f64::from(u32::MAX)
        {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        }
    }

    pub fn string(text: impl Into<Rc<str>>) -> Value {
        Value::String(text.into())
    }

    /// Build an array, rejecting elements of incompatible types.
    pub fn array(items: Vec<Value>) -> Result<Value, ValueError> {
        if let Some(first) = items.iter().find(|v| !v.is_undefined()) {
            if let Some(bad) = items
                .iter()
                .find(|v| !v.is_undefined() && !first.is_compatible(v))
            {
                return Err(ValueError::type_mismatch(format!(
                    "array elements must share a type, found {} and {}",
                    first.type_name(),
                    bad.type_name()
                )));
            }
        }
        Ok(Value::Array(items.into()))
    }

    pub fn dictionary(entries: Vec<(Value, Value)>) -> Result<Value, ValueError> {
        let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if matches!(key, Value::Callable(_) | Value::Undefined) {
                return Err(ValueError::type_mismatch(format!(
                    "invalid dictionary key of type {}",
                    key.type_name()
                )));
            }
            if out.iter().any(|(k, _)| k.equals(&key)) {
                return Err(ValueError::illegal_quantity(format!(
                    "duplicate dictionary key {key}"
                )));
            }
            out.push((key, value));
        }
        Ok(Value::Dictionary(out.into()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Char(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Callable(_) => "function",
        }
    }

    /// Integer view of a numeric value. Floats must be integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(f) => Some(*f),
            Value::Char(c) => Some(f64::from(u32::from(*c))),
            _ => None,
        }
    }

    /// Minimal number of bytes needed to store a numeric value.
    pub fn size(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Array(items) => items.len(),
            Value::Dictionary(entries) => entries.len(),
            other => match other.as_f64() {
                Some(v) => storage_size(v),
                None => 0,
            },
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(v) => *v != 0,
            Value::Float(f) => *f != 0.0,
            Value::Char(c) => *c != '\0',
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Dictionary(entries) => !entries.is_empty(),
            Value::Callable(_) => true,
            Value::Undefined => false,
        }
    }

    /// Whether two values may live in the same array.
    pub fn is_compatible(&self, other: &Value) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return true;
        }
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => match (a.first(), b.first()) {
                (Some(x), Some(y)) => x.is_compatible(y),
                _ => true,
            },
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Structural equality; numbers compare across variants.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => almost_equals(x, y),
                _ => false,
            },
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k.equals(k2) && v.equals(v2)))
            }
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::Undefined, Value::Undefined) => true,
            _ => false,
        }
    }

    /// Concatenate strings, chars or arrays.
    pub fn concat(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::String(_) | Value::Char(_), Value::String(_) | Value::Char(_)) => {
                Ok(Value::string(format!("{self}{other}")))
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut items: Vec<Value> = a.iter().cloned().collect();
                items.extend(b.iter().cloned());
                Value::array(items)
            }
            _ => Err(ValueError::type_mismatch(format!(
                "cannot concatenate {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn lookup_key(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Dictionary(entries) => entries
                .iter()
                .find(|(k, _)| k.equals(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

pub fn storage_size(value: f64) -> usize {
    if (-128.0..=255.0).contains(&value) {
        1
    } else if (-32768.0..=65535.0).contains(&value) {
        2
    } else if (-8_388_608.0..=16_777_215.0).contains(&value) {
        3
    } else {
        4
    }
}

/// Compare floats with a relative tolerance.
pub fn almost_equals(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= scale * FLOAT_EPSILON
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("?"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, item)?;
                }
                f.write_str("]")
            }
            Value::Dictionary(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, k)?;
                    f.write_str(": ")?;
                    write_quoted(f, v)?;
                }
                f.write_str("}")
            }
            Value::Callable(callable) => match callable.name() {
                Some(name) => write!(f, "<function {name}>"),
                None => f.write_str("<function>"),
            },
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{s}\""),
        Value::Char(c) => write!(f, "'{c}'"),
        other => write!(f, "{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_size_follows_magnitude() {
        assert_eq!(Value::Integer(255).size(), 1);
        assert_eq!(Value::Integer(-129).size(), 2);
        assert_eq!(Value::Integer(65536).size(), 3);
        assert_eq!(Value::Integer(0x0100_0000).size(), 4);
    }

    #[test]
    fn integral_floats_demote_to_integers() {
        assert!(matches!(Value::number(42.0), Value::Integer(42)));
        assert!(matches!(Value::number(4_294_967_295.0), Value::Integer(_)));
        assert!(matches!(Value::number(4_294_967_296.0), Value::Float(_)));
        assert!(matches!(Value::number(1.5), Value::Float(_)));
    }

    #[test]
    fn almost_equals_uses_relative_tolerance() {
        assert!(almost_equals(0.1 + 0.2, 0.3));
        assert!(!almost_equals(1.0, 1.000001));
    }

    #[test]
    fn concat_strings_and_arrays() {
        let joined = Value::string("ab").concat(&Value::string("cd")).unwrap();
        assert_eq!(joined.to_string(), "abcd");

        let a = Value::array(vec![Value::Integer(1)]).unwrap();
        let b = Value::array(vec![Value::Float(2.5)]).unwrap();
        assert!(matches!(a.concat(&b).unwrap(), Value::Array(ref v) if v.len() == 2));

        let s = Value::array(vec![Value::string("x")]).unwrap();
        assert!(matches!(a.concat(&s), Err(ValueError::TypeMismatch(_))));
    }

    #[test]
    fn arrays_must_be_homogeneous() {
        assert!(Value::array(vec![Value::Integer(1), Value::Char('a')]).is_ok());
        assert!(Value::array(vec![Value::Integer(1), Value::Boolean(true)]).is_err());
    }

    #[test]
    fn dictionary_rejects_duplicate_keys() {
        let err = Value::dictionary(vec![
            (Value::string("a"), Value::Integer(1)),
            (Value::string("a"), Value::Integer(2)),
        ]);
        assert!(matches!(err, Err(ValueError::IllegalQuantity(_))));
    }

    #[test]
    fn display_quotes_nested_strings() {
        let v = Value::array(vec![Value::string("hi"), Value::string("yo")]).unwrap();
        assert_eq!(v.to_string(), "[\"hi\", \"yo\"]");
    }
}
