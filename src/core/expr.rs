// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation over typed values.
//!
//! The evaluator walks a parsed [`Expr`] and reduces it to a [`Value`].
//! Symbol lookup, the program counter and function-call scoping come from an
//! [`EvalContext`], so the same code serves the pass driver, the CPU
//! resolvers and unit tests.

use std::num::IntErrorKind;
use std::ops::RangeInclusive;
use std::rc::Rc;

use thiserror::Error;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::builtins::BUILTINS;
use crate::core::parser::{BinaryOp, Expr, UnaryOp};
use crate::core::scope::{ScopeGraph, ScopeId, SymbolKind};
use crate::core::source::Node;
use crate::core::tokenizer::Span;
use crate::core::value::{Callable, FunctionBody, UserFunction, Value, ValueError};

/// Deepest allowed nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    pub kind: AsmErrorKind,
    pub message: String,
    pub span: Span,
}

impl EvalError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(AsmErrorKind::Syntax, message, span)
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::new(AsmErrorKind::TypeMismatch, message, span)
    }

    pub fn illegal_quantity(message: impl Into<String>, span: Span) -> Self {
        Self::new(AsmErrorKind::IllegalQuantity, message, span)
    }

    pub fn from_value(err: ValueError, span: Span) -> Self {
        match err {
            ValueError::TypeMismatch(msg) => Self::type_mismatch(msg, span),
            ValueError::IllegalQuantity(msg) => Self::illegal_quantity(msg, span),
        }
    }
}

impl From<EvalError> for AsmError {
    fn from(err: EvalError) -> Self {
        AsmError::at(err.kind, err.message, err.span)
    }
}

/// Services the evaluator needs from its host.
pub trait EvalContext {
    /// Value of a named symbol. May return `Value::Undefined` for names not
    /// known yet in this pass.
    fn resolve(&mut self, name: &str, span: Span) -> Result<Value, EvalError>;

    /// Address of an anonymous label relative to the current statement.
    fn anonymous(&mut self, forward: bool, depth: usize, span: Span) -> Result<Value, EvalError>;

    fn program_counter(&self) -> i64;

    /// Scope captured by lambdas defined here.
    fn capture_scope(&self) -> ScopeId;

    /// Push a function-call scope beneath `captured`.
    fn enter_call(&mut self, captured: ScopeId, span: Span) -> Result<(), EvalError>;

    fn bind_argument(&mut self, name: &str, value: Value, span: Span) -> Result<(), EvalError>;

    /// Pop the scope pushed by `enter_call`. Called on every exit path.
    fn leave_call(&mut self);

    /// Run a statement-bodied function and return its `.return` value.
    fn run_block(&mut self, body: &[Node], span: Span) -> Result<Value, EvalError>;
}

pub fn evaluate(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(text, span) => parse_number(text, *span),
        Expr::Identifier(name, span) => ctx.resolve(name, *span),
        Expr::Register(name, span) => Err(EvalError::syntax(
            format!("Register {name} cannot be used as a value"),
            *span,
        )),
        Expr::Dollar(_) => Ok(Value::Integer(ctx.program_counter())),
        Expr::String(text, _) => Ok(Value::string(text.as_str())),
        Expr::Char(c, _) => Ok(Value::Char(*c)),
        Expr::Anonymous {
            forward,
            depth,
            span,
        } => ctx.anonymous(*forward, *depth, *span),
        Expr::Indirect(inner, _) => evaluate(inner, ctx),
        Expr::Array(items, span) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Value::array(values).map_err(|e| EvalError::from_value(e, *span))
        }
        Expr::Dictionary(entries, span) => {
            let mut values = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                values.push((evaluate(key, ctx)?, evaluate(value, ctx)?));
            }
            if values.iter().any(|(k, _)| k.is_undefined()) {
                return Ok(Value::Undefined);
            }
            Value::dictionary(values).map_err(|e| EvalError::from_value(e, *span))
        }
        Expr::Lambda { params, body, .. } => Ok(Value::Callable(Rc::new(Callable::User(
            UserFunction {
                name: None,
                params: params.clone(),
                body: FunctionBody::Expr(body.clone()),
                scope: ctx.capture_scope(),
            },
        )))),
        Expr::Call { callee, args, span } => {
            let function = evaluate(callee, ctx)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(&function, args, ctx, *span)
        }
        Expr::Index {
            target,
            index,
            span,
        } => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            apply_index(&target, &index, *span)
        }
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
            span,
        } => {
            let cond = evaluate(cond, ctx)?;
            if cond.is_undefined() {
                return Ok(Value::Undefined);
            }
            if truth(&cond, *span)? {
                evaluate(then_expr, ctx)
            } else {
                evaluate(else_expr, ctx)
            }
        }
        Expr::Unary { op, expr, span } => {
            let value = evaluate(expr, ctx)?;
            apply_unary(*op, value, *span)
        }
        Expr::Binary {
            op: op @ (BinaryOp::LogicAnd | BinaryOp::LogicOr),
            left,
            right,
            span,
        } => {
            let l = evaluate(left, ctx)?;
            if l.is_undefined() {
                return Ok(Value::Undefined);
            }
            let l = truth(&l, *span)?;
            match (op, l) {
                (BinaryOp::LogicAnd, false) => return Ok(Value::Boolean(false)),
                (BinaryOp::LogicOr, true) => return Ok(Value::Boolean(true)),
                _ => {}
            }
            let r = evaluate(right, ctx)?;
            if r.is_undefined() {
                return Ok(Value::Undefined);
            }
            Ok(Value::Boolean(truth(&r, *span)?))
        }
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            apply_binary(*op, l, r, *span)
        }
        Expr::Immediate(_, span) => Err(EvalError::syntax(
            "Immediate operand cannot be used as a value",
            *span,
        )),
        Expr::Tuple(_, span) => Err(EvalError::syntax("Unexpected ','", *span)),
        Expr::AutoIncrement { span, .. } | Expr::Empty(span) => {
            Err(EvalError::syntax("Invalid expression", *span))
        }
    }
}

/// Evaluate and check the result against a numeric range. Undefined values
/// pass, since they will be settled in a later pass.
pub fn evaluate_in_range(
    expr: &Expr,
    ctx: &mut dyn EvalContext,
    range: Option<RangeInclusive<i64>>,
) -> Result<Value, EvalError> {
    let value = evaluate(expr, ctx)?;
    if let Some(range) = range {
        if let Some(n) = integer_value(&value, expr.span())? {
            if !range.contains(&n) {
                return Err(EvalError::illegal_quantity(
                    format!("Illegal quantity: {n}"),
                    expr.span(),
                ));
            }
        }
    }
    Ok(value)
}

/// Evaluate to an integer; `None` means not known yet.
pub fn evaluate_integer(
    expr: &Expr,
    ctx: &mut dyn EvalContext,
    range: Option<RangeInclusive<i64>>,
) -> Result<Option<i64>, EvalError> {
    let value = evaluate_in_range(expr, ctx, range)?;
    integer_value(&value, expr.span())
}

/// Integer view of a value; booleans count as 0 or 1.
pub fn integer_value(value: &Value, span: Span) -> Result<Option<i64>, EvalError> {
    match value {
        Value::Undefined => Ok(None),
        Value::Boolean(b) => Ok(Some(i64::from(*b))),
        other => other.as_i64().map(Some).ok_or_else(|| {
            EvalError::type_mismatch(
                format!("Expected an integer, found {}", other.type_name()),
                span,
            )
        }),
    }
}

/// Invoke a callable value with already evaluated arguments.
pub fn call(
    function: &Value,
    args: Vec<Value>,
    ctx: &mut dyn EvalContext,
    span: Span,
) -> Result<Value, EvalError> {
    match function {
        Value::Callable(callable) => match callable.as_ref() {
            Callable::Builtin(builtin) => builtin
                .invoke(&args)
                .map_err(|e| EvalError::from_value(e, span)),
            Callable::User(func) => call_user(func, args, ctx, span),
        },
        Value::Undefined => Ok(Value::Undefined),
        other => Err(EvalError::type_mismatch(
            format!("A value of type {} is not callable", other.type_name()),
            span,
        )),
    }
}

fn call_user(
    func: &UserFunction,
    args: Vec<Value>,
    ctx: &mut dyn EvalContext,
    span: Span,
) -> Result<Value, EvalError> {
    if args.len() > func.params.len() {
        return Err(EvalError::type_mismatch(
            format!(
                "{}() expects at most {} argument(s), got {}",
                func.name.as_deref().unwrap_or("function"),
                func.params.len(),
                args.len()
            ),
            span,
        ));
    }
    ctx.enter_call(func.scope, span)?;
    let result = bind_and_run(func, args, ctx, span);
    ctx.leave_call();
    result
}

fn bind_and_run(
    func: &UserFunction,
    args: Vec<Value>,
    ctx: &mut dyn EvalContext,
    span: Span,
) -> Result<Value, EvalError> {
    let mut args = args.into_iter();
    for param in func.params.iter() {
        let value = match (args.next(), &param.default) {
            (Some(value), _) => value,
            (None, Some(default)) => evaluate(default, ctx)?,
            (None, None) => {
                return Err(EvalError::type_mismatch(
                    format!("Missing argument '{}'", param.name),
                    span,
                ))
            }
        };
        ctx.bind_argument(&param.name, value, param.span)?;
    }
    match &func.body {
        FunctionBody::Expr(body) => evaluate(body, ctx),
        FunctionBody::Block(nodes) => ctx.run_block(nodes, span),
    }
}

fn truth(value: &Value, span: Span) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::Char(_) => {
            Ok(value.is_truthy())
        }
        other => Err(EvalError::type_mismatch(
            format!("Expected a boolean, found {}", other.type_name()),
            span,
        )),
    }
}

fn int_operand(value: &Value, span: Span) -> Result<i64, EvalError> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Char(c) => Ok(i64::from(u32::from(*c))),
        other => Err(EvalError::type_mismatch(
            format!("Expected an integer, found {}", other.type_name()),
            span,
        )),
    }
}

fn overflow(span: Span) -> EvalError {
    EvalError::illegal_quantity("Arithmetic overflow", span)
}

pub fn apply_unary(op: UnaryOp, value: Value, span: Span) -> Result<Value, EvalError> {
    if value.is_undefined() {
        return Ok(Value::Undefined);
    }
    match op {
        UnaryOp::LogicNot => Ok(Value::Boolean(!truth(&value, span)?)),
        UnaryOp::Plus | UnaryOp::Minus => match value {
            Value::Float(f) if op == UnaryOp::Minus => Ok(Value::number(-f)),
            Value::Float(_) => Ok(value),
            other => {
                let n = int_operand(&other, span)?;
                if op == UnaryOp::Minus {
                    n.checked_neg().map(Value::Integer).ok_or_else(|| overflow(span))
                } else {
                    Ok(Value::Integer(n))
                }
            }
        },
        UnaryOp::BitNot => Ok(Value::Integer(!int_operand(&value, span)?)),
        UnaryOp::Low => Ok(Value::Integer(int_operand(&value, span)? & 0xff)),
        UnaryOp::High => Ok(Value::Integer((int_operand(&value, span)? >> 8) & 0xff)),
    }
}

fn both_integers(l: &Value, r: &Value) -> bool {
    matches!(l, Value::Integer(_) | Value::Char(_)) && matches!(r, Value::Integer(_) | Value::Char(_))
}

fn numeric_pair(l: &Value, r: &Value, span: Span) -> Result<(f64, f64), EvalError> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::type_mismatch(
            format!(
                "Operator cannot be applied to {} and {}",
                l.type_name(),
                r.type_name()
            ),
            span,
        )),
    }
}

pub fn apply_binary(op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
    if l.is_undefined() || r.is_undefined() {
        return Ok(Value::Undefined);
    }
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::String(_), Value::String(_) | Value::Char(_))
            | (Value::Char(_), Value::String(_))
            | (Value::Array(_), Value::Array(_)) => {
                l.concat(&r).map_err(|e| EvalError::from_value(e, span))
            }
            _ => arithmetic(op, &l, &r, span),
        },
        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Mod | BinaryOp::Power => {
            arithmetic(op, &l, &r, span)
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            let value = int_operand(&l, span)?;
            let amount = int_operand(&r, span)?;
            if !(0..64).contains(&amount) {
                return Err(EvalError::illegal_quantity(
                    format!("Illegal shift amount: {amount}"),
                    span,
                ));
            }
            if op == BinaryOp::Shr {
                return Ok(Value::Integer(value >> amount));
            }
            let shifted = value << amount;
            if shifted >> amount != value {
                return Err(overflow(span));
            }
            Ok(Value::Integer(shifted))
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            let a = int_operand(&l, span)?;
            let b = int_operand(&r, span)?;
            Ok(Value::Integer(match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        BinaryOp::Eq => Ok(Value::Boolean(l.equals(&r))),
        BinaryOp::Ne => Ok(Value::Boolean(!l.equals(&r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ if both_integers(&l, &r) => int_operand(&l, span)?.cmp(&int_operand(&r, span)?),
                _ => {
                    let (a, b) = numeric_pair(&l, &r, span)?;
                    a.partial_cmp(&b).ok_or_else(|| {
                        EvalError::illegal_quantity("Cannot compare NaN", span)
                    })?
                }
            };
            Ok(Value::Boolean(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::LogicAnd => Ok(Value::Boolean(truth(&l, span)? && truth(&r, span)?)),
        BinaryOp::LogicOr => Ok(Value::Boolean(truth(&l, span)? || truth(&r, span)?)),
        BinaryOp::LogicXor => Ok(Value::Boolean(truth(&l, span)? ^ truth(&r, span)?)),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
    if both_integers(l, r) {
        let a = int_operand(l, span)?;
        let b = int_operand(r, span)?;
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide | BinaryOp::Mod if b == 0 => {
                return Err(EvalError::illegal_quantity("Division by zero", span))
            }
            BinaryOp::Divide => a.checked_div(b),
            BinaryOp::Mod => a.checked_rem(b),
            BinaryOp::Power if b < 0 => return Ok(Value::number((a as f64).powf(b as f64))),
            BinaryOp::Power => u32::try_from(b).ok().and_then(|b| a.checked_pow(b)),
            _ => None,
        };
        return result.map(Value::Integer).ok_or_else(|| overflow(span));
    }
    let (a, b) = numeric_pair(l, r, span)?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Mod if b == 0.0 => {
            return Err(EvalError::illegal_quantity("Division by zero", span))
        }
        BinaryOp::Divide => a / b,
        BinaryOp::Mod => a % b,
        _ => a.powf(b),
    };
    if !result.is_finite() {
        return Err(overflow(span));
    }
    Ok(Value::number(result))
}

fn apply_index(target: &Value, index: &Value, span: Span) -> Result<Value, EvalError> {
    if target.is_undefined() || index.is_undefined() {
        return Ok(Value::Undefined);
    }
    let out_of_range = || EvalError::illegal_quantity(format!("Index out of range: {index}"), span);
    match target {
        Value::Dictionary(_) => target.lookup_key(index).cloned().ok_or_else(|| {
            EvalError::illegal_quantity(format!("Key not found: {index}"), span)
        }),
        Value::Array(items) => {
            let idx = int_operand(index, span)?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(out_of_range)
        }
        Value::String(text) => {
            let idx = int_operand(index, span)?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(Value::Char)
                .ok_or_else(out_of_range)
        }
        other => Err(EvalError::type_mismatch(
            format!("A value of type {} cannot be indexed", other.type_name()),
            span,
        )),
    }
}

fn radix_error(text: &str, kind: &IntErrorKind, span: Span) -> EvalError {
    match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            EvalError::illegal_quantity(format!("Illegal quantity: {text}"), span)
        }
        _ => EvalError::syntax(format!("Invalid number: {text}"), span),
    }
}

fn parse_radix(digits: &str, radix: u32, text: &str, span: Span) -> Result<Value, EvalError> {
    i64::from_str_radix(digits, radix)
        .map(Value::Integer)
        .map_err(|e| radix_error(text, e.kind(), span))
}

/// Parse a numeric literal.
///
/// Supports multiple formats:
/// - Decimal: `42`, `42d`
/// - Hex: `$2A`, `0x2A`, `2Ah`
/// - Binary: `%101010`, `0b101010`, `101010b`, and `%..#.#.#.` bit patterns
/// - Octal: `0o52`, `052`, `52o`, `52q`
/// - Float: `1.5`, `2e3`
pub fn parse_number(text: &str, span: Span) -> Result<Value, EvalError> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if body.is_empty() {
        return Err(EvalError::syntax(format!("Invalid number: {text}"), span));
    }
    let lower = body.to_ascii_lowercase();
    let value = if let Some(hex) = body.strip_prefix('$') {
        parse_radix(hex, 16, text, span)?
    } else if let Some(bits) = body.strip_prefix('%') {
        if bits.contains(['.', '#']) {
            let pattern: String = bits
                .chars()
                .map(|c| match c {
                    '.' => '0',
                    '#' => '1',
                    other => other,
                })
                .collect();
            parse_radix(&pattern, 2, text, span)?
        } else {
            parse_radix(bits, 2, text, span)?
        }
    } else if let Some(hex) = lower.strip_prefix("0x") {
        parse_radix(hex, 16, text, span)?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        parse_radix(oct, 8, text, span)?
    } else if let Some(bin) = lower
        .strip_prefix("0b")
        .filter(|b| !b.is_empty() && b.chars().all(|c| c == '0' || c == '1'))
    {
        parse_radix(bin, 2, text, span)?
    } else if let Some(hex) = lower.strip_suffix('h') {
        parse_radix(hex, 16, text, span)?
    } else if let Some(bin) = lower
        .strip_suffix('b')
        .filter(|b| b.chars().all(|c| c == '0' || c == '1'))
    {
        parse_radix(bin, 2, text, span)?
    } else if let Some(oct) = lower.strip_suffix(['o', 'q']) {
        parse_radix(oct, 8, text, span)?
    } else if let Some(dec) = lower.strip_suffix('d') {
        parse_radix(dec, 10, text, span)?
    } else if lower.contains(['.', 'e']) {
        let f: f64 = lower
            .parse()
            .map_err(|_| EvalError::syntax(format!("Invalid number: {text}"), span))?;
        if !f.is_finite() {
            return Err(EvalError::illegal_quantity(format!("Illegal quantity: {text}"), span));
        }
        Value::number(f)
    } else if lower.len() > 1 && lower.starts_with('0') {
        parse_radix(&lower[1..], 8, text, span)?
    } else {
        parse_radix(&lower, 10, text, span)?
    };
    if !negative {
        return Ok(value);
    }
    match value {
        Value::Integer(n) => Ok(Value::Integer(-n)),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Ok(other),
    }
}

/// Evaluation context backed by a bare scope graph, for evaluating
/// expressions outside a pass (command-line defines, tests).
#[derive(Debug)]
pub struct SimpleContext {
    scopes: ScopeGraph,
    pc: i64,
    calls: usize,
}

impl SimpleContext {
    pub fn new() -> Self {
        let mut scopes = ScopeGraph::new(false);
        for builtin in BUILTINS {
            let value = Value::Callable(Rc::new(Callable::Builtin(builtin)));
            let _ = scopes.define(builtin.name, SymbolKind::Constant(value), None, true);
        }
        for (name, value) in crate::core::builtins::constants() {
            let _ = scopes.define(name, SymbolKind::Constant(value), None, true);
        }
        Self {
            scopes,
            pc: 0,
            calls: 0,
        }
    }

    pub fn with_pc(mut self, pc: i64) -> Self {
        self.pc = pc;
        self
    }

    /// Define a constant, replacing nothing.
    pub fn define(&mut self, name: &str, value: Value) -> Result<(), AsmError> {
        self.scopes
            .define(name, SymbolKind::Constant(value), None, false)
            .map(|_| ())
            .map_err(|e| AsmError::new(AsmErrorKind::SymbolRedefinition, &e.to_string(), None))
    }
}

impl Default for SimpleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext for SimpleContext {
    fn resolve(&mut self, name: &str, span: Span) -> Result<Value, EvalError> {
        let id = self.scopes.lookup(name).ok_or_else(|| {
            EvalError::new(AsmErrorKind::SymbolNotFound, format!("Symbol not found: {name}"), span)
        })?;
        self.scopes.symbol(id).value().ok_or_else(|| {
            EvalError::type_mismatch(format!("{name} is a scope, not a value"), span)
        })
    }

    fn anonymous(&mut self, _forward: bool, _depth: usize, span: Span) -> Result<Value, EvalError> {
        Err(EvalError::new(
            AsmErrorKind::SymbolNotFound,
            "Anonymous labels are not available here",
            span,
        ))
    }

    fn program_counter(&self) -> i64 {
        self.pc
    }

    fn capture_scope(&self) -> ScopeId {
        self.scopes.current()
    }

    fn enter_call(&mut self, captured: ScopeId, span: Span) -> Result<(), EvalError> {
        if self.calls >= MAX_CALL_DEPTH {
            return Err(EvalError::illegal_quantity("Function call depth exceeded", span));
        }
        self.calls += 1;
        self.scopes.enter_call(captured);
        Ok(())
    }

    fn bind_argument(&mut self, name: &str, value: Value, span: Span) -> Result<(), EvalError> {
        self.scopes
            .define(name, SymbolKind::Variable(value), None, false)
            .map(|_| ())
            .map_err(|e| EvalError::new(AsmErrorKind::SymbolRedefinition, e.to_string(), span))
    }

    fn leave_call(&mut self) {
        self.calls = self.calls.saturating_sub(1);
        let _ = self.scopes.pop();
    }

    fn run_block(&mut self, _body: &[Node], span: Span) -> Result<Value, EvalError> {
        Err(EvalError::new(
            AsmErrorKind::Directive,
            "Statement functions can only run during assembly",
            span,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;
    use crate::core::tokenizer::register_checker_none;

    fn expr(text: &str) -> Expr {
        let line = format!(" {text}");
        let mut parser =
            Parser::from_line_with_registers(&line, 1, register_checker_none()).unwrap();
        parser.parse_standalone_expr().unwrap()
    }

    fn eval(text: &str) -> Result<Value, EvalError> {
        evaluate(&expr(text), &mut SimpleContext::new())
    }

    fn eval_int(text: &str) -> i64 {
        match eval(text).unwrap() {
            Value::Integer(n) => n,
            other => panic!("expected integer from {text}, got {other:?}"),
        }
    }

    fn num(text: &str) -> Value {
        parse_number(text, Span::default()).unwrap()
    }

    #[test]
    fn parse_number_hex() {
        assert!(num("$ffd2").equals(&Value::Integer(0xffd2)));
        assert!(num("0x2A").equals(&Value::Integer(42)));
        assert!(num("2Ah").equals(&Value::Integer(42)));
    }

    #[test]
    fn parse_number_binary() {
        assert!(num("%01111111").equals(&Value::Integer(0x7f)));
        assert!(num("%.#######").equals(&Value::Integer(0x7f)));
        assert!(num("0b101010").equals(&Value::Integer(42)));
        assert!(num("101010b").equals(&Value::Integer(42)));
    }

    #[test]
    fn parse_number_octal_and_decimal() {
        assert!(num("0o52").equals(&Value::Integer(42)));
        assert!(num("052").equals(&Value::Integer(42)));
        assert!(num("52q").equals(&Value::Integer(42)));
        assert!(num("42d").equals(&Value::Integer(42)));
        assert!(num("1_000").equals(&Value::Integer(1000)));
    }

    #[test]
    fn parse_number_floats_demote_when_integral() {
        assert!(matches!(num("1.5"), Value::Float(f) if f == 1.5));
        assert!(matches!(num("2e3"), Value::Integer(2000)));
    }

    #[test]
    fn parse_number_overflow_is_illegal_quantity() {
        let err = parse_number("$1_0000_0000_0000_0000", Span::default()).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::IllegalQuantity);
        let err = parse_number("09", Span::default()).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::Syntax);
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(eval_int("1+2*5"), 11);
        assert_eq!(eval_int("(1+2)*5"), 15);
        assert_eq!(eval_int("2**3**2"), 512);
        assert_eq!(eval_int("-7/2"), -3);
        assert_eq!(eval_int("1 << 4 | 1"), 17);
        assert_eq!(eval_int("<$1234"), 0x34);
        assert_eq!(eval_int(">$1234"), 0x12);
    }

    #[test]
    fn division_by_zero_and_overflow() {
        assert_eq!(eval("1/0").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
        assert_eq!(eval("1%0").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
        assert_eq!(
            eval("$7fffffffffffffff+1").unwrap_err().kind,
            AsmErrorKind::IllegalQuantity
        );
        assert_eq!(eval("1 << 64").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
    }

    #[test]
    fn shifts_that_drop_bits_overflow() {
        assert_eq!(eval_int("$ffffffff << 31"), 0x7FFF_FFFF_8000_0000);
        assert_eq!(eval_int("-1 << 4"), -16);
        assert_eq!(
            eval("$ffffffff << 40").unwrap_err().kind,
            AsmErrorKind::IllegalQuantity
        );
        assert_eq!(eval("1 << 63").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
        assert_eq!(eval("1 << -1").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
        assert_eq!(eval_int("$ff00 >> 8"), 0xFF);
    }

    #[test]
    fn comparisons_and_logic_yield_booleans() {
        assert!(matches!(eval("3 > 2").unwrap(), Value::Boolean(true)));
        assert!(matches!(eval("\"abc\" < \"abd\"").unwrap(), Value::Boolean(true)));
        assert!(matches!(eval("1 == 1.0").unwrap(), Value::Boolean(true)));
        assert!(matches!(eval("\"1\" == 1").unwrap(), Value::Boolean(false)));
        assert!(matches!(eval("0 || 2").unwrap(), Value::Boolean(true)));
        assert!(matches!(eval("!0").unwrap(), Value::Boolean(true)));
        assert_eq!(eval("\"a\" & 1").unwrap_err().kind, AsmErrorKind::TypeMismatch);
    }

    #[test]
    fn strings_and_arrays_concatenate() {
        assert!(eval("\"ab\" + \"cd\"").unwrap().equals(&Value::string("abcd")));
        assert!(eval("concat(\"ab\", \"cd\")").unwrap().equals(&Value::string("abcd")));
        assert_eq!(eval("[1, 2] + [3]").unwrap().size(), 3);
        assert_eq!(
            eval("concat([1], [\"x\"])").unwrap_err().kind,
            AsmErrorKind::TypeMismatch
        );
        assert_eq!(eval("'A' + 1").unwrap().as_i64(), Some(66));
    }

    #[test]
    fn indexing_collections() {
        assert_eq!(eval_int("[10, 20, 30][1]"), 20);
        assert!(matches!(eval("\"hey\"[2]").unwrap(), Value::Char('y')));
        assert_eq!(eval_int("{\"a\": 1, \"b\": 2}[\"b\"]"), 2);
        assert_eq!(eval("[1][5]").unwrap_err().kind, AsmErrorKind::IllegalQuantity);
    }

    #[test]
    fn builtins_are_called_with_type_checks() {
        assert_eq!(eval_int("max(3, 9)"), 9);
        assert_eq!(eval_int("len(\"hello\")"), 5);
        assert_eq!(eval("sqrt(\"x\")").unwrap_err().kind, AsmErrorKind::TypeMismatch);
        assert_eq!(eval("len()").unwrap_err().kind, AsmErrorKind::TypeMismatch);
    }

    #[test]
    fn lambdas_capture_and_apply_defaults() {
        let mut ctx = SimpleContext::new();
        let square = evaluate(&expr("(x) => x * x"), &mut ctx).unwrap();
        ctx.define("square", square).unwrap();
        let add = evaluate(&expr("(a, b = 10) => a + b"), &mut ctx).unwrap();
        ctx.define("add", add).unwrap();
        assert_eq!(evaluate(&expr("square(7)"), &mut ctx).unwrap().as_i64(), Some(49));
        assert_eq!(evaluate(&expr("add(1)"), &mut ctx).unwrap().as_i64(), Some(11));
        assert_eq!(evaluate(&expr("add(1, 2)"), &mut ctx).unwrap().as_i64(), Some(3));
        let err = evaluate(&expr("square()"), &mut ctx).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::TypeMismatch);
        // The failed call still popped its scope.
        assert_eq!(ctx.scopes.depth(), 1);
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let mut ctx = SimpleContext::new();
        let f = evaluate(&expr("(n) => f(n + 1)"), &mut ctx).unwrap();
        ctx.define("f", f).unwrap();
        let err = evaluate(&expr("f(0)"), &mut ctx).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::IllegalQuantity);
        assert_eq!(ctx.scopes.depth(), 1);
    }

    #[test]
    fn undefined_propagates_and_passes_range_checks() {
        struct Pending;
        impl EvalContext for Pending {
            fn resolve(&mut self, _: &str, _: Span) -> Result<Value, EvalError> {
                Ok(Value::Undefined)
            }
            fn anonymous(&mut self, _: bool, _: usize, _: Span) -> Result<Value, EvalError> {
                Ok(Value::Undefined)
            }
            fn program_counter(&self) -> i64 {
                0
            }
            fn capture_scope(&self) -> ScopeId {
                ScopeGraph::new(false).global()
            }
            fn enter_call(&mut self, _: ScopeId, _: Span) -> Result<(), EvalError> {
                Ok(())
            }
            fn bind_argument(&mut self, _: &str, _: Value, _: Span) -> Result<(), EvalError> {
                Ok(())
            }
            fn leave_call(&mut self) {}
            fn run_block(&mut self, _: &[Node], _: Span) -> Result<Value, EvalError> {
                Ok(Value::Undefined)
            }
        }
        let value = evaluate(&expr("later * 2 + 1"), &mut Pending).unwrap();
        assert!(value.is_undefined());
        assert_eq!(
            evaluate_integer(&expr("later"), &mut Pending, Some(0..=255)).unwrap(),
            None
        );
        let err = evaluate_integer(&expr("256"), &mut SimpleContext::new(), Some(0..=255))
            .unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::IllegalQuantity);
    }

    #[test]
    fn unknown_symbol_is_reported() {
        let err = eval("nowhere + 1").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::SymbolNotFound);
        let asm: AsmError = err.into();
        assert_eq!(asm.kind(), AsmErrorKind::SymbolNotFound);
    }
}
