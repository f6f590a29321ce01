// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Built-in functions and constants available to every program.

use std::fmt;

use crate::core::value::{Value, ValueError};

/// Declared type of a built-in parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Integer, float or char; integers are promoted to floats as needed.
    Number,
    Integer,
    String,
    Array,
    Dictionary,
    /// String, array or dictionary.
    Collection,
    Any,
}

impl ParamType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::Number => value.is_numeric(),
            ParamType::Integer => matches!(value, Value::Integer(_) | Value::Char(_)),
            ParamType::String => matches!(value, Value::String(_)),
            ParamType::Array => matches!(value, Value::Array(_)),
            ParamType::Dictionary => matches!(value, Value::Dictionary(_)),
            ParamType::Collection => matches!(
                value,
                Value::String(_) | Value::Array(_) | Value::Dictionary(_)
            ),
            ParamType::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::String => "string",
            ParamType::Array => "array",
            ParamType::Dictionary => "dictionary",
            ParamType::Collection => "collection",
            ParamType::Any => "value",
        }
    }
}

pub type BuiltinFn = fn(&[Value]) -> Result<Value, ValueError>;

pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [ParamType],
    /// Number of trailing parameters that may be omitted.
    pub optional: usize,
    call: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl Builtin {
    /// Check arguments against the declared signature and run the function.
    /// Any undefined argument makes the result undefined.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, ValueError> {
        let max = self.params.len();
        let min = max - self.optional;
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(ValueError::type_mismatch(format!(
                "{}() expects {expected} argument(s), got {}",
                self.name,
                args.len()
            )));
        }
        if args.iter().any(Value::is_undefined) {
            return Ok(Value::Undefined);
        }
        for (idx, (arg, param)) in args.iter().zip(self.params).enumerate() {
            if !param.accepts(arg) {
                return Err(ValueError::type_mismatch(format!(
                    "{}() argument {} must be {}, found {}",
                    self.name,
                    idx + 1,
                    param.name(),
                    arg.type_name()
                )));
            }
        }
        (self.call)(args)
    }
}

const N: ParamType = ParamType::Number;

macro_rules! math_fn {
    ($name:ident, $op:expr) => {
        fn $name(args: &[Value]) -> Result<Value, ValueError> {
            let f: fn(f64) -> f64 = $op;
            finite(f(num(&args[0])))
        }
    };
}

math_fn!(abs, f64::abs);
math_fn!(acos, f64::acos);
math_fn!(asin, f64::asin);
math_fn!(atan, f64::atan);
math_fn!(cbrt, f64::cbrt);
math_fn!(ceil, f64::ceil);
math_fn!(cos, f64::cos);
math_fn!(cosh, f64::cosh);
math_fn!(deg, f64::to_degrees);
math_fn!(exp, f64::exp);
math_fn!(floor, f64::floor);
math_fn!(frac, f64::fract);
math_fn!(ln, f64::ln);
math_fn!(log10, f64::log10);
math_fn!(rad, f64::to_radians);
math_fn!(round, f64::round);
math_fn!(sin, f64::sin);
math_fn!(sinh, f64::sinh);
math_fn!(sqrt, f64::sqrt);
math_fn!(tan, f64::tan);
math_fn!(tanh, f64::tanh);

fn num(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn finite(value: f64) -> Result<Value, ValueError> {
    if value.is_finite() {
        Ok(Value::number(value))
    } else {
        Err(ValueError::illegal_quantity("result is not a finite number"))
    }
}

fn sgn(args: &[Value]) -> Result<Value, ValueError> {
    let v = num(&args[0]);
    Ok(Value::Integer(if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }))
}

fn pow(args: &[Value]) -> Result<Value, ValueError> {
    finite(num(&args[0]).powf(num(&args[1])))
}

fn hypot(args: &[Value]) -> Result<Value, ValueError> {
    finite(num(&args[0]).hypot(num(&args[1])))
}

fn min(args: &[Value]) -> Result<Value, ValueError> {
    Ok(if num(&args[1]) < num(&args[0]) {
        args[1].clone()
    } else {
        args[0].clone()
    })
}

fn max(args: &[Value]) -> Result<Value, ValueError> {
    Ok(if num(&args[1]) > num(&args[0]) {
        args[1].clone()
    } else {
        args[0].clone()
    })
}

fn int(args: &[Value]) -> Result<Value, ValueError> {
    let v = num(&args[0]).trunc();
    if v < i64::MIN as f64 || v > i64::MAX as f64 {
        return Err(ValueError::illegal_quantity("value out of integer range"));
    }
    Ok(match &args[0] {
        Value::Integer(i) => Value::Integer(*i),
        _ => Value::Integer(v as i64),
    })
}

fn float(args: &[Value]) -> Result<Value, ValueError> {
    Ok(Value::Float(num(&args[0])))
}

fn len(args: &[Value]) -> Result<Value, ValueError> {
    let count = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Dictionary(entries) => entries.len(),
        _ => 0,
    };
    Ok(Value::Integer(count as i64))
}

fn concat(args: &[Value]) -> Result<Value, ValueError> {
    args[0].concat(&args[1])
}

fn substring(args: &[Value]) -> Result<Value, ValueError> {
    let text: Vec<char> = match &args[0] {
        Value::String(s) => s.chars().collect(),
        _ => Vec::new(),
    };
    let start = args[1].as_i64().unwrap_or(-1);
    let count = match args.get(2) {
        Some(v) => v.as_i64().unwrap_or(-1),
        None => (text.len() as i64).saturating_sub(start),
    };
    let end = start
        .checked_add(count)
        .filter(|&end| start >= 0 && count >= 0 && end <= text.len() as i64);
    let Some(end) = end else {
        return Err(ValueError::illegal_quantity(format!(
            "substring({start}, {count}) outside string of length {}",
            text.len()
        )));
    };
    let out: String = text[start as usize..end as usize].iter().collect();
    Ok(Value::string(out))
}

fn char_fn(args: &[Value]) -> Result<Value, ValueError> {
    let code = args[0].as_i64().unwrap_or(-1);
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| ValueError::illegal_quantity(format!("invalid character code {code}")))
}

fn contains(args: &[Value]) -> Result<Value, ValueError> {
    let needle = &args[1];
    let found = match &args[0] {
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_ref()),
            Value::Char(c) => s.contains(*c),
            other => {
                return Err(ValueError::type_mismatch(format!(
                    "cannot search a string for {}",
                    other.type_name()
                )))
            }
        },
        Value::Array(items) => items.iter().any(|item| item.equals(needle)),
        Value::Dictionary(_) => args[0].lookup_key(needle).is_some(),
        _ => false,
    };
    Ok(Value::Boolean(found))
}

fn keys(args: &[Value]) -> Result<Value, ValueError> {
    match &args[0] {
        Value::Dictionary(entries) => Value::array(entries.iter().map(|(k, _)| k.clone()).collect()),
        _ => Ok(Value::Undefined),
    }
}

fn typeof_fn(args: &[Value]) -> Result<Value, ValueError> {
    Ok(Value::string(args[0].type_name()))
}

fn sizeof(args: &[Value]) -> Result<Value, ValueError> {
    Ok(Value::Integer(args[0].size() as i64))
}

macro_rules! builtin {
    ($name:literal, $call:expr, [$($param:expr),*]) => {
        builtin!($name, $call, [$($param),*], 0)
    };
    ($name:literal, $call:expr, [$($param:expr),*], $optional:literal) => {
        Builtin {
            name: $name,
            params: &[$($param),*],
            optional: $optional,
            call: $call,
        }
    };
}

pub static BUILTINS: &[Builtin] = &[
    builtin!("abs", abs, [N]),
    builtin!("acos", acos, [N]),
    builtin!("asin", asin, [N]),
    builtin!("atan", atan, [N]),
    builtin!("cbrt", cbrt, [N]),
    builtin!("ceil", ceil, [N]),
    builtin!("cos", cos, [N]),
    builtin!("cosh", cosh, [N]),
    builtin!("deg", deg, [N]),
    builtin!("exp", exp, [N]),
    builtin!("floor", floor, [N]),
    builtin!("frac", frac, [N]),
    builtin!("hypot", hypot, [N, N]),
    builtin!("ln", ln, [N]),
    builtin!("log10", log10, [N]),
    builtin!("pow", pow, [N, N]),
    builtin!("rad", rad, [N]),
    builtin!("round", round, [N]),
    builtin!("sgn", sgn, [N]),
    builtin!("sin", sin, [N]),
    builtin!("sinh", sinh, [N]),
    builtin!("sqrt", sqrt, [N]),
    builtin!("tan", tan, [N]),
    builtin!("tanh", tanh, [N]),
    builtin!("min", min, [N, N]),
    builtin!("max", max, [N, N]),
    builtin!("int", int, [N]),
    builtin!("float", float, [N]),
    builtin!("len", len, [ParamType::Collection]),
    builtin!("concat", concat, [ParamType::Any, ParamType::Any]),
    builtin!(
        "substring",
        substring,
        [ParamType::String, ParamType::Integer, ParamType::Integer],
        1
    ),
    builtin!("char", char_fn, [ParamType::Integer]),
    builtin!("contains", contains, [ParamType::Collection, ParamType::Any]),
    builtin!("keys", keys, [ParamType::Dictionary]),
    builtin!("typeof", typeof_fn, [ParamType::Any]),
    builtin!("sizeof", sizeof, [ParamType::Any]),
];

/// Constants defined in the global scope at the start of every pass.
pub fn constants() -> Vec<(&'static str, Value)> {
    vec![
        ("true", Value::Boolean(true)),
        ("false", Value::Boolean(false)),
        ("MATH_PI", Value::Float(std::f64::consts::PI)),
        ("MATH_E", Value::Float(std::f64::consts::E)),
        ("INT8_MIN", Value::Integer(i64::from(i8::MIN))),
        ("INT8_MAX", Value::Integer(i64::from(i8::MAX))),
        ("UINT8_MAX", Value::Integer(i64::from(u8::MAX))),
        ("INT16_MIN", Value::Integer(i64::from(i16::MIN))),
        ("INT16_MAX", Value::Integer(i64::from(i16::MAX))),
        ("UINT16_MAX", Value::Integer(i64::from(u16::MAX))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, ValueError> {
        BUILTINS
            .iter()
            .find(|b| b.name == name)
            .unwrap()
            .invoke(args)
    }

    #[test]
    fn math_promotes_integers() {
        assert!(matches!(call("sqrt", &[Value::Integer(16)]), Ok(Value::Integer(4))));
        assert!(matches!(call("floor", &[Value::Float(2.7)]), Ok(Value::Integer(2))));
        assert!(matches!(call("sgn", &[Value::Integer(-9)]), Ok(Value::Integer(-1))));
    }

    #[test]
    fn domain_errors_are_illegal_quantities() {
        assert!(matches!(
            call("ln", &[Value::Integer(-1)]),
            Err(ValueError::IllegalQuantity(_))
        ));
    }

    #[test]
    fn rejects_wrong_argument_types() {
        assert!(matches!(
            call("sin", &[Value::string("x")]),
            Err(ValueError::TypeMismatch(_))
        ));
        assert!(matches!(
            call("len", &[Value::Integer(3)]),
            Err(ValueError::TypeMismatch(_))
        ));
    }

    #[test]
    fn checks_arity() {
        assert!(call("pow", &[Value::Integer(2)]).is_err());
        assert!(call("substring", &[Value::string("hello"), Value::Integer(1)]).is_ok());
    }

    #[test]
    fn substring_bounds_are_checked() {
        let text = Value::string("abc");
        for (start, count) in [(i64::MAX, 1), (1, i64::MAX), (-1, 1), (2, 2)] {
            assert!(matches!(
                call(
                    "substring",
                    &[text.clone(), Value::Integer(start), Value::Integer(count)]
                ),
                Err(ValueError::IllegalQuantity(_))
            ));
        }
        assert!(matches!(
            call("substring", &[text.clone(), Value::Integer(i64::MIN)]),
            Err(ValueError::IllegalQuantity(_))
        ));
        let tail = call("substring", &[text, Value::Integer(3)]).unwrap();
        assert_eq!(tail.to_string(), "");
    }

    #[test]
    fn undefined_arguments_propagate() {
        assert!(matches!(call("abs", &[Value::Undefined]), Ok(Value::Undefined)));
    }

    #[test]
    fn string_functions() {
        let s = call(
            "substring",
            &[Value::string("hello"), Value::Integer(1), Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(s.to_string(), "ell");
        assert!(matches!(call("len", &[Value::string("héllo")]), Ok(Value::Integer(5))));
        assert!(matches!(
            call("contains", &[Value::string("hello"), Value::Char('l')]),
            Ok(Value::Boolean(true))
        ));
        assert!(matches!(call("char", &[Value::Integer(65)]), Ok(Value::Char('A'))));
    }

    #[test]
    fn concat_checks_element_types() {
        let s = call("concat", &[Value::string("ab"), Value::string("cd")]).unwrap();
        assert_eq!(s.to_string(), "abcd");
        let a = Value::array(vec![Value::Integer(1)]).unwrap();
        let b = Value::array(vec![Value::Boolean(true)]).unwrap();
        assert!(matches!(call("concat", &[a, b]), Err(ValueError::TypeMismatch(_))));
    }

    #[test]
    fn introspection() {
        assert_eq!(call("typeof", &[Value::Float(1.5)]).unwrap().to_string(), "float");
        assert!(matches!(call("sizeof", &[Value::Integer(0x1234)]), Ok(Value::Integer(2))));
    }
}
