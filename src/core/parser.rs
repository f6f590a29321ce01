// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Parser for tokenized assembly source.

use std::rc::Rc;

use crate::core::text_utils::is_ident_start;
use crate::core::tokenizer::{
    ConditionalKind, OperatorKind, RegisterChecker, Span, Token, TokenKind, TokenizeError,
    Tokenizer,
};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum LineAst {
    Empty,
    Conditional {
        kind: ConditionalKind,
        expr: Option<Expr>,
        span: Span,
    },
    Assignment {
        label: Label,
        op: AssignOp,
        expr: Expr,
        span: Span,
    },
    Statement {
        label: Option<Label>,
        mnemonic: Option<String>,
        operands: Vec<Expr>,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub struct Label {
    pub name: String,
    pub span: Span,
}

impl Label {
    /// `+` and `-` labels are resolved by position, not by name.
    pub fn is_anonymous(&self) -> bool {
        self.name == "+" || self.name == "-"
    }
}

/// A declared parameter of a lambda or statement-bodied function.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(String, Span),
    Identifier(String, Span),
    Register(String, Span),
    /// Parenthesized expression: grouping, or memory indirection for operands.
    Indirect(Box<Expr>, Span),
    /// Immediate value: #expr
    Immediate(Box<Expr>, Span),
    /// Tuple inside parentheses: (a, b) - used for ($nn,X) style operands
    Tuple(Vec<Expr>, Span),
    /// Bracketed list: array literal, or indexed-indirect operand on the 6809.
    Array(Vec<Expr>, Span),
    Dictionary(Vec<(Expr, Expr)>, Span),
    /// Program counter (`$` or `*`).
    Dollar(Span),
    String(String, Span),
    Char(char, Span),
    /// Reference to an anonymous label: `+`, `++`, `-`, `--`.
    Anonymous {
        forward: bool,
        depth: usize,
        span: Span,
    },
    /// Register with post-increment (`X+`, `X++`).
    AutoIncrement {
        register: String,
        amount: u8,
        span: Span,
    },
    /// An omitted operand before a comma (`,X`).
    Empty(Span),
    Lambda {
        params: Rc<[Param]>,
        body: Rc<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, span)
            | Expr::Identifier(_, span)
            | Expr::Register(_, span)
            | Expr::Indirect(_, span)
            | Expr::Immediate(_, span)
            | Expr::Tuple(_, span)
            | Expr::Array(_, span)
            | Expr::Dictionary(_, span)
            | Expr::Dollar(span)
            | Expr::String(_, span)
            | Expr::Char(_, span)
            | Expr::Empty(span) => *span,
            Expr::Anonymous { span, .. }
            | Expr::AutoIncrement { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicNot,
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Const,
    Var,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Const | AssignOp::Var => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Subtract),
            AssignOp::Mul => Some(BinaryOp::Multiply),
            AssignOp::Div => Some(BinaryOp::Divide),
            AssignOp::Mod => Some(BinaryOp::Mod),
            AssignOp::Pow => Some(BinaryOp::Power),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Mod,
    Power,
    Shl,
    Shr,
    Add,
    Subtract,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    LogicXor,
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    end_span: Span,
}

impl Parser {
    pub fn from_line_with_registers(
        line: &str,
        line_num: u32,
        is_register: RegisterChecker,
    ) -> Result<Self, ParseError> {
        if let Some(first) = line.as_bytes().first().copied() {
            if !first.is_ascii_whitespace()
                && !matches!(first, b';' | b'.' | b'*' | b'+' | b'-')
                && !is_ident_start(first)
            {
                return Err(ParseError {
                    message: format!(
                        "Illegal character in column 1. Must be symbol, '.', '*', '+', '-', comment, or space. Found: {}",
                        line
                    ),
                    span: Span {
                        line: line_num,
                        col_start: 1,
                        col_end: 1,
                    },
                });
            }
        }
        let mut tokenizer = Tokenizer::with_register_checker(line, line_num, is_register);
        let mut tokens = Vec::new();
        let end_span = loop {
            let token = tokenizer.next_token().map_err(map_tokenize_error)?;
            if matches!(token.kind, TokenKind::End) {
                break token.span;
            }
            tokens.push(token);
        };
        Ok(Self {
            tokens,
            index: 0,
            end_span,
        })
    }

    pub fn parse_line(&mut self) -> Result<LineAst, ParseError> {
        if self.tokens.is_empty() {
            return Ok(LineAst::Empty);
        }

        let label = self.parse_label();
        if self.index >= self.tokens.len() {
            let span = label.as_ref().map(|l| l.span).unwrap_or(self.end_span);
            return Ok(LineAst::Statement {
                label,
                mnemonic: None,
                operands: Vec::new(),
                span,
            });
        }

        if label.is_none() && self.is_org_assignment() {
            let span = self.current_span();
            self.index += 2;
            let expr = self.parse_expr()?;
            self.expect_end()?;
            return Ok(LineAst::Statement {
                label: None,
                mnemonic: Some(".org".to_string()),
                operands: vec![expr],
                span,
            });
        }

        // Indented assignments are allowed so function bodies can use them.
        let label = match label {
            None => match self.peek() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    span,
                }) if self.match_assignment_op_at(self.index + 1).is_some() => {
                    let label = Label {
                        name: name.clone(),
                        span: *span,
                    };
                    self.index += 1;
                    Some(label)
                }
                _ => None,
            },
            some => some,
        };

        if let Some(label) = &label {
            if let Some((op, span, consumed)) = self.match_assignment_op_at(self.index) {
                if label.is_anonymous() {
                    return Err(ParseError {
                        message: "Anonymous labels cannot be assigned".to_string(),
                        span: label.span,
                    });
                }
                self.index += consumed;
                let expr = self.parse_expr()?;
                self.expect_end()?;
                return Ok(LineAst::Assignment {
                    label: label.clone(),
                    op,
                    expr,
                    span,
                });
            }
        }

        let (mnemonic, span) = if self.consume_kind(TokenKind::Dot) {
            let dot_span = self.prev_span();
            let (name, span) = match self.next() {
                Some(Token {
                    kind: TokenKind::Identifier(name) | TokenKind::Register(name),
                    span,
                }) => (name, span),
                Some(token) => {
                    return Err(ParseError {
                        message: "Expected directive after '.'".to_string(),
                        span: token.span,
                    })
                }
                None => {
                    return Err(ParseError {
                        message: "Expected directive after '.'".to_string(),
                        span: self.end_span,
                    })
                }
            };
            let span = dot_span.to(span);
            let lower = name.to_ascii_lowercase();
            let kind = match lower.as_str() {
                "if" => Some(ConditionalKind::If),
                "elseif" => Some(ConditionalKind::ElseIf),
                "else" => Some(ConditionalKind::Else),
                "endif" => Some(ConditionalKind::EndIf),
                _ => None,
            };
            if let Some(kind) = kind {
                if label.is_some() {
                    return Err(ParseError {
                        message: "Labels are not allowed on conditionals".to_string(),
                        span,
                    });
                }
                let expr = match kind {
                    ConditionalKind::If | ConditionalKind::ElseIf => Some(self.parse_expr()?),
                    ConditionalKind::Else | ConditionalKind::EndIf => None,
                };
                if self.index < self.tokens.len() {
                    return Err(ParseError {
                        message: "Unexpected tokens after conditional".to_string(),
                        span: self.tokens[self.index].span,
                    });
                }
                return Ok(LineAst::Conditional { kind, expr, span });
            }
            (format!(".{lower}"), span)
        } else {
            match self.next() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    span,
                }) => (name, span),
                Some(token) => {
                    return Err(ParseError {
                        message: "Expected mnemonic identifier".to_string(),
                        span: token.span,
                    });
                }
                None => {
                    return Err(ParseError {
                        message: "Expected mnemonic identifier".to_string(),
                        span: self.end_span,
                    })
                }
            }
        };

        let operands = if self.index < self.tokens.len() {
            self.parse_operand_list()?
        } else {
            Vec::new()
        };
        self.expect_end()?;

        Ok(LineAst::Statement {
            label,
            mnemonic: Some(mnemonic),
            operands,
            span,
        })
    }

    /// Column-1 identifiers (optionally followed by a colon) and column-1
    /// `+`/`-` markers define labels.
    fn parse_label(&mut self) -> Option<Label> {
        let first = self.tokens.first()?.clone();
        if first.span.col_start != 1 {
            return None;
        }
        match &first.kind {
            TokenKind::Identifier(name) | TokenKind::Register(name) => {
                self.index = 1;
                if let Some(colon) = self.tokens.get(1) {
                    let assign_follows = self.match_assignment_op_at(1).is_some();
                    if matches!(colon.kind, TokenKind::Colon)
                        && colon.span.col_start == first.span.col_end
                        && !assign_follows
                    {
                        self.index = 2;
                    }
                }
                Some(Label {
                    name: name.clone(),
                    span: first.span,
                })
            }
            TokenKind::Operator(op @ (OperatorKind::Plus | OperatorKind::Minus)) => {
                let mut end = first.span;
                self.index = 1;
                while let Some(token) = self.tokens.get(self.index) {
                    if token.kind == first.kind && token.span.col_start == end.col_end {
                        end = token.span;
                        self.index += 1;
                    } else {
                        break;
                    }
                }
                Some(Label {
                    name: op.symbol().to_string(),
                    span: first.span.to(end),
                })
            }
            _ => None,
        }
    }

    fn is_org_assignment(&self) -> bool {
        matches!(
            self.tokens.get(self.index),
            Some(Token {
                kind: TokenKind::Operator(OperatorKind::Multiply),
                ..
            })
        ) && matches!(
            self.tokens.get(self.index + 1),
            Some(Token {
                kind: TokenKind::Operator(OperatorKind::Eq),
                ..
            })
        )
    }

    fn match_assignment_op_at(&self, index: usize) -> Option<(AssignOp, Span, usize)> {
        let token = self.tokens.get(index)?;
        let next_is_eq = matches!(
            self.tokens.get(index + 1),
            Some(Token {
                kind: TokenKind::Operator(OperatorKind::Eq),
                span,
            }) if span.col_start == token.span.col_end
        );
        match &token.kind {
            TokenKind::Operator(OperatorKind::Eq) => Some((AssignOp::Const, token.span, 1)),
            TokenKind::Colon if next_is_eq => Some((AssignOp::Var, token.span, 2)),
            TokenKind::Operator(kind) if next_is_eq => {
                let op = match kind {
                    OperatorKind::Plus => AssignOp::Add,
                    OperatorKind::Minus => AssignOp::Sub,
                    OperatorKind::Multiply => AssignOp::Mul,
                    OperatorKind::Divide => AssignOp::Div,
                    OperatorKind::Mod => AssignOp::Mod,
                    OperatorKind::Power => AssignOp::Pow,
                    OperatorKind::BitOr => AssignOp::BitOr,
                    OperatorKind::BitXor => AssignOp::BitXor,
                    OperatorKind::BitAnd => AssignOp::BitAnd,
                    OperatorKind::Shl => AssignOp::Shl,
                    OperatorKind::Shr => AssignOp::Shr,
                    _ => return None,
                };
                Some((op, token.span, 2))
            }
            _ => None,
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.index < self.tokens.len() {
            return Err(ParseError {
                message: "Unexpected trailing tokens".to_string(),
                span: self.tokens[self.index].span,
            });
        }
        Ok(())
    }

    /// Comma-separated operands; an operand may be omitted before a comma.
    fn parse_operand_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut operands = Vec::new();
        loop {
            if self.peek_kind(&TokenKind::Comma) {
                let span = self.current_span();
                operands.push(Expr::Empty(Span {
                    line: span.line,
                    col_start: span.col_start,
                    col_end: span.col_start,
                }));
            } else {
                operands.push(self.parse_expr()?);
            }
            if !self.consume_comma() {
                break;
            }
        }
        Ok(operands)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_operator_kind() {
            Some(OperatorKind::Lt) => Some(UnaryOp::Low),
            Some(OperatorKind::Gt) => Some(UnaryOp::High),
            _ => None,
        };
        if let Some(op) = op {
            self.index += 1;
            let span = self.prev_span();
            let expr = self.parse_expr()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                span,
            });
        }

        self.parse_ternary()
    }

    /// Parse a whole-line expression, as used for `-D name=expr` defines.
    pub fn parse_standalone_expr(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.expect_end()?;
        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_logical_or()?;
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Question {
                let span = token.span;
                self.index += 1;
                let then_expr = self.parse_expr()?;
                if !self.consume_kind(TokenKind::Colon) {
                    return Err(ParseError {
                        message: "Missing ':' in conditional expression".to_string(),
                        span: self.current_span(),
                    });
                }
                let else_expr = self.parse_expr()?;
                node = Expr::Ternary {
                    cond: Box::new(node),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    span,
                };
            }
        }
        Ok(node)
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(OperatorKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut node = next(self)?;
        while let Some(op) = self
            .peek_operator_kind()
            .and_then(|kind| ops.iter().find(|(k, _)| *k == kind).map(|(_, op)| *op))
        {
            self.index += 1;
            let op_span = self.prev_span();
            let right = next(self)?;
            node = Expr::Binary {
                op,
                left: Box::new(node),
                right: Box::new(right),
                span: op_span,
            };
        }
        Ok(node)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (OperatorKind::LogicOr, BinaryOp::LogicOr),
                (OperatorKind::LogicXor, BinaryOp::LogicXor),
            ],
            Self::parse_logical_and,
        )
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(OperatorKind::LogicAnd, BinaryOp::LogicAnd)],
            Self::parse_bit_or,
        )
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(&[(OperatorKind::BitOr, BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(OperatorKind::BitXor, BinaryOp::BitXor)],
            Self::parse_bit_and,
        )
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[(OperatorKind::BitAnd, BinaryOp::BitAnd)],
            Self::parse_compare,
        )
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (OperatorKind::Eq, BinaryOp::Eq),
                (OperatorKind::Ne, BinaryOp::Ne),
                (OperatorKind::Ge, BinaryOp::Ge),
                (OperatorKind::Gt, BinaryOp::Gt),
                (OperatorKind::Le, BinaryOp::Le),
                (OperatorKind::Lt, BinaryOp::Lt),
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (OperatorKind::Shl, BinaryOp::Shl),
                (OperatorKind::Shr, BinaryOp::Shr),
            ],
            Self::parse_sum,
        )
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (OperatorKind::Plus, BinaryOp::Add),
                (OperatorKind::Minus, BinaryOp::Subtract),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(
            &[
                (OperatorKind::Multiply, BinaryOp::Multiply),
                (OperatorKind::Divide, BinaryOp::Divide),
                (OperatorKind::Mod, BinaryOp::Mod),
            ],
            Self::parse_power,
        )
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let node = self.parse_unary()?;
        if self.match_operator(OperatorKind::Power) {
            let op_span = self.prev_span();
            let right = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Power,
                left: Box::new(node),
                right: Box::new(right),
                span: op_span,
            });
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(anon) = self.parse_anonymous_reference() {
            return Ok(anon);
        }
        let op = match self.peek_operator_kind() {
            Some(OperatorKind::Plus) => Some(UnaryOp::Plus),
            Some(OperatorKind::Minus) => Some(UnaryOp::Minus),
            Some(OperatorKind::BitNot) => Some(UnaryOp::BitNot),
            Some(OperatorKind::LogicNot) => Some(UnaryOp::LogicNot),
            _ => None,
        };
        if let Some(op) = op {
            self.index += 1;
            let span = self.prev_span();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                span,
            });
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    /// A run of adjacent `+` or `-` that ends the operand refers to an
    /// anonymous label.
    fn parse_anonymous_reference(&mut self) -> Option<Expr> {
        let first = self.peek()?.clone();
        let forward = match first.kind {
            TokenKind::Operator(OperatorKind::Plus) => true,
            TokenKind::Operator(OperatorKind::Minus) => false,
            _ => return None,
        };
        let mut idx = self.index + 1;
        let mut end = first.span;
        while let Some(token) = self.tokens.get(idx) {
            if token.kind == first.kind && token.span.col_start == end.col_end {
                end = token.span;
                idx += 1;
            } else {
                break;
            }
        }
        if !self.is_operand_end(idx) {
            return None;
        }
        let depth = idx - self.index;
        self.index = idx;
        Some(Expr::Anonymous {
            forward,
            depth,
            span: first.span.to(end),
        })
    }

    fn is_operand_end(&self, idx: usize) -> bool {
        matches!(
            self.tokens.get(idx).map(|t| &t.kind),
            None | Some(
                TokenKind::Comma
                    | TokenKind::CloseParen
                    | TokenKind::CloseBracket
                    | TokenKind::CloseBrace
            )
        )
    }

    fn parse_postfix(&mut self, mut node: Expr) -> Result<Expr, ParseError> {
        loop {
            let node_span = node.span();
            let adjacent = |token: &Token| token.span.col_start == node_span.col_end;
            match self.peek() {
                Some(token @ Token { kind: TokenKind::OpenParen, .. })
                    if adjacent(token)
                        && matches!(
                            node,
                            Expr::Identifier(..) | Expr::Call { .. } | Expr::Index { .. }
                        ) =>
                {
                    self.index += 1;
                    let args = if self.consume_kind(TokenKind::CloseParen) {
                        Vec::new()
                    } else {
                        let args = self.parse_expr_list()?;
                        if !self.consume_kind(TokenKind::CloseParen) {
                            return Err(ParseError {
                                message: "Missing ')' in call".to_string(),
                                span: self.current_span(),
                            });
                        }
                        args
                    };
                    let span = node_span.to(self.prev_span());
                    node = Expr::Call {
                        callee: Box::new(node),
                        args,
                        span,
                    };
                }
                Some(token @ Token { kind: TokenKind::OpenBracket, .. })
                    if adjacent(token)
                        && !matches!(node, Expr::Number(..) | Expr::Register(..)) =>
                {
                    self.index += 1;
                    let index = self.parse_expr()?;
                    if !self.consume_kind(TokenKind::CloseBracket) {
                        return Err(ParseError {
                            message: "Missing ']' in index".to_string(),
                            span: self.current_span(),
                        });
                    }
                    let span = node_span.to(self.prev_span());
                    node = Expr::Index {
                        target: Box::new(node),
                        index: Box::new(index),
                        span,
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = vec![self.parse_expr()?];
        while self.consume_comma() {
            items.push(self.parse_expr()?);
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Hash,
                span: hash_span,
            }) => {
                let expr = self.parse_expr()?;
                let span = hash_span.to(self.prev_span());
                Ok(Expr::Immediate(Box::new(expr), span))
            }
            Some(Token {
                kind: TokenKind::Number(num),
                span,
            }) => Ok(Expr::Number(num.text, span)),
            Some(Token {
                kind: TokenKind::Identifier(name),
                span,
            }) => {
                if self.consume_kind(TokenKind::Arrow) {
                    let body = self.parse_expr()?;
                    let params = vec![Param {
                        name,
                        default: None,
                        span,
                    }];
                    return Ok(Expr::Lambda {
                        params: params.into(),
                        span: span.to(body.span()),
                        body: Rc::new(body),
                    });
                }
                Ok(Expr::Identifier(name, span))
            }
            Some(Token {
                kind: TokenKind::Register(name),
                span,
            }) => Ok(self.parse_register(name, span)),
            Some(Token {
                kind: TokenKind::Dollar | TokenKind::Operator(OperatorKind::Multiply),
                span,
            }) => Ok(Expr::Dollar(span)),
            Some(Token {
                kind: TokenKind::String(lit),
                span,
            }) => Ok(Expr::String(lit.value, span)),
            Some(Token {
                kind: TokenKind::Char(lit),
                span,
            }) => {
                let mut chars = lit.value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Expr::Char(c, span)),
                    _ => Err(ParseError {
                        message: format!("Invalid char literal: {}", lit.raw),
                        span,
                    }),
                }
            }
            Some(Token {
                kind: TokenKind::OpenParen,
                span: open_span,
            }) => {
                if self.lambda_ahead(self.index - 1) {
                    return self.parse_lambda(open_span);
                }
                let expr = self.parse_expr()?;

                if self.consume_comma() {
                    let mut elements = vec![expr];
                    elements.extend(self.parse_expr_list()?);

                    let close_span = self.current_span();
                    if !self.consume_kind(TokenKind::CloseParen) {
                        return Err(ParseError {
                            message: "Missing ')' in tuple".to_string(),
                            span: self.current_span(),
                        });
                    }
                    let span = open_span.to(close_span);
                    // The resolver inspects the inner tuple for ($nn,X) style modes.
                    Ok(Expr::Indirect(Box::new(Expr::Tuple(elements, span)), span))
                } else {
                    let close_span = self.current_span();
                    if !self.consume_kind(TokenKind::CloseParen) {
                        return Err(ParseError {
                            message: "Missing ')'".to_string(),
                            span: self.current_span(),
                        });
                    }
                    Ok(Expr::Indirect(Box::new(expr), open_span.to(close_span)))
                }
            }
            Some(Token {
                kind: TokenKind::OpenBracket,
                span: open_span,
            }) => {
                let elements = if self.peek_kind(&TokenKind::CloseBracket) {
                    Vec::new()
                } else {
                    self.parse_operand_list()?
                };
                let close_span = self.current_span();
                if !self.consume_kind(TokenKind::CloseBracket) {
                    return Err(ParseError {
                        message: "Missing ']'".to_string(),
                        span: self.current_span(),
                    });
                }
                Ok(Expr::Array(elements, open_span.to(close_span)))
            }
            Some(Token {
                kind: TokenKind::OpenBrace,
                span: open_span,
            }) => self.parse_dictionary(open_span),
            Some(token) => Err(ParseError {
                message: format!("Unexpected token in expression: {}", token.to_source_text()),
                span: token.span,
            }),
            None => Err(ParseError {
                message: "Unexpected end of expression".to_string(),
                span: self.end_span,
            }),
        }
    }

    /// `X+` and `X++` at the end of an operand are post-increment forms.
    fn parse_register(&mut self, name: String, span: Span) -> Expr {
        let mut idx = self.index;
        let mut end = span;
        while idx - self.index < 2 {
            match self.tokens.get(idx) {
                Some(Token {
                    kind: TokenKind::Operator(OperatorKind::Plus),
                    span: plus,
                }) if plus.col_start == end.col_end => {
                    end = *plus;
                    idx += 1;
                }
                _ => break,
            }
        }
        if idx > self.index && self.is_operand_end(idx) {
            let amount = (idx - self.index) as u8;
            self.index = idx;
            return Expr::AutoIncrement {
                register: name,
                amount,
                span: span.to(end),
            };
        }
        Expr::Register(name, span)
    }

    fn parse_dictionary(&mut self, open_span: Span) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        if !self.peek_kind(&TokenKind::CloseBrace) {
            loop {
                let key = self.parse_logical_or()?;
                if !self.consume_kind(TokenKind::Colon) {
                    return Err(ParseError {
                        message: "Missing ':' in dictionary entry".to_string(),
                        span: self.current_span(),
                    });
                }
                let value = self.parse_expr()?;
                entries.push((key, value));
                if !self.consume_comma() {
                    break;
                }
            }
        }
        let close_span = self.current_span();
        if !self.consume_kind(TokenKind::CloseBrace) {
            return Err(ParseError {
                message: "Missing '}'".to_string(),
                span: self.current_span(),
            });
        }
        Ok(Expr::Dictionary(entries, open_span.to(close_span)))
    }

    /// True if the parenthesis at `open` closes directly before `=>`.
    fn lambda_ahead(&self, open: usize) -> bool {
        let mut depth = 0usize;
        for (idx, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(idx + 1),
                            Some(Token {
                                kind: TokenKind::Arrow,
                                ..
                            })
                        );
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn parse_lambda(&mut self, open_span: Span) -> Result<Expr, ParseError> {
        let params = self.parse_params()?;
        if !self.consume_kind(TokenKind::Arrow) {
            return Err(ParseError {
                message: "Expected '=>' after parameter list".to_string(),
                span: self.current_span(),
            });
        }
        let body = self.parse_expr()?;
        Ok(Expr::Lambda {
            params: params.into(),
            span: open_span.to(body.span()),
            body: Rc::new(body),
        })
    }

    /// Parameter list after the opening parenthesis, through the closing one.
    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.consume_kind(TokenKind::CloseParen) {
            return Ok(params);
        }
        loop {
            let (name, span) = match self.next() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    span,
                }) => (name, span),
                other => {
                    return Err(ParseError {
                        message: "Expected parameter name".to_string(),
                        span: other.map(|t| t.span).unwrap_or(self.end_span),
                    })
                }
            };
            let default = if self.match_operator(OperatorKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                span,
            });
            if self.consume_comma() {
                continue;
            }
            if self.consume_kind(TokenKind::CloseParen) {
                return Ok(params);
            }
            return Err(ParseError {
                message: "Missing ')' in parameter list".to_string(),
                span: self.current_span(),
            });
        }
    }

    fn consume_comma(&mut self) -> bool {
        self.consume_kind(TokenKind::Comma)
    }

    fn consume_kind(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind(&kind) {
            self.index += 1;
            return true;
        }
        false
    }

    fn peek_kind(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == *kind)
    }

    fn match_operator(&mut self, op: OperatorKind) -> bool {
        self.consume_kind(TokenKind::Operator(op))
    }

    fn peek_operator_kind(&self) -> Option<OperatorKind> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Operator(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn prev_span(&self) -> Span {
        if self.index == 0 {
            Span::default()
        } else {
            self.tokens[self.index - 1].span
        }
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.index)
            .map(|t| t.span)
            .unwrap_or(self.end_span)
    }
}

/// Parse one source line with the given register set.
pub fn parse_source_line(
    line: &str,
    line_num: u32,
    is_register: RegisterChecker,
) -> Result<LineAst, ParseError> {
    Parser::from_line_with_registers(line, line_num, is_register)?.parse_line()
}

fn map_tokenize_error(err: TokenizeError) -> ParseError {
    ParseError {
        message: err.message,
        span: err.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::register_checker_from_fn;

    fn regs(name: &str) -> bool {
        matches!(name, "A" | "X" | "Y")
    }

    fn parse(line: &str) -> LineAst {
        parse_source_line(line, 1, register_checker_from_fn(regs)).unwrap()
    }

    fn parse_err(line: &str) -> ParseError {
        parse_source_line(line, 1, register_checker_from_fn(regs)).unwrap_err()
    }

    fn operands(line: &str) -> Vec<Expr> {
        match parse(line) {
            LineAst::Statement { operands, .. } => operands,
            other => panic!("Expected statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_label_and_mnemonic() {
        match parse("start: lda #$20") {
            LineAst::Statement {
                label, mnemonic, ..
            } => {
                assert_eq!(label.unwrap().name, "start");
                assert_eq!(mnemonic.as_deref(), Some("lda"));
            }
            _ => panic!("Expected statement"),
        }
    }

    #[test]
    fn parses_label_without_colon() {
        match parse("loop  dex") {
            LineAst::Statement {
                label, mnemonic, ..
            } => {
                assert_eq!(label.unwrap().name, "loop");
                assert_eq!(mnemonic.as_deref(), Some("dex"));
            }
            _ => panic!("Expected statement"),
        }
    }

    #[test]
    fn parses_anonymous_label_definition() {
        match parse("-   dex") {
            LineAst::Statement { label, .. } => assert!(label.unwrap().is_anonymous()),
            _ => panic!("Expected statement"),
        }
    }

    #[test]
    fn parses_assignments() {
        match parse("size = 4") {
            LineAst::Assignment { label, op, .. } => {
                assert_eq!(label.name, "size");
                assert_eq!(op, AssignOp::Const);
            }
            _ => panic!("Expected assignment"),
        }
        match parse("    count := 1") {
            LineAst::Assignment { op, .. } => assert_eq!(op, AssignOp::Var),
            _ => panic!("Expected assignment"),
        }
        match parse("count <<= 2") {
            LineAst::Assignment { op, .. } => assert_eq!(op, AssignOp::Shl),
            _ => panic!("Expected assignment"),
        }
    }

    #[test]
    fn parses_star_org_assignment() {
        match parse("* = $1000") {
            LineAst::Statement {
                mnemonic, operands, ..
            } => {
                assert_eq!(mnemonic.as_deref(), Some(".org"));
                assert!(matches!(operands[0], Expr::Number(ref n, _) if n == "$1000"));
            }
            _ => panic!("Expected statement"),
        }
    }

    #[test]
    fn parses_conditionals() {
        match parse("    .if x > 1") {
            LineAst::Conditional { kind, expr, .. } => {
                assert_eq!(kind, ConditionalKind::If);
                assert!(expr.is_some());
            }
            _ => panic!("Expected conditional"),
        }
        assert!(matches!(
            parse("    .endif"),
            LineAst::Conditional {
                kind: ConditionalKind::EndIf,
                ..
            }
        ));
    }

    #[test]
    fn parses_dot_directive_statement() {
        match parse("    .BYTE 1, 2, 3") {
            LineAst::Statement {
                mnemonic, operands, ..
            } => {
                assert_eq!(mnemonic.as_deref(), Some(".byte"));
                assert_eq!(operands.len(), 3);
            }
            _ => panic!("Expected statement"),
        }
    }

    #[test]
    fn parses_indexed_indirect_tuple() {
        let ops = operands("    lda ($20,x)");
        match &ops[0] {
            Expr::Indirect(inner, _) => {
                assert!(matches!(**inner, Expr::Tuple(ref e, _) if e.len() == 2))
            }
            other => panic!("Expected indirect, got {other:?}"),
        }
        let ops = operands("    lda ($20),y");
        assert!(matches!(ops[0], Expr::Indirect(..)));
        assert!(matches!(ops[1], Expr::Register(ref r, _) if r == "y"));
    }

    #[test]
    fn parses_leading_empty_operand() {
        let ops = operands("    lda ,x+");
        assert!(matches!(ops[0], Expr::Empty(_)));
        assert!(matches!(ops[1], Expr::AutoIncrement { amount: 1, .. }));
    }

    #[test]
    fn parses_anonymous_references() {
        let ops = operands("    bne --");
        assert!(matches!(
            ops[0],
            Expr::Anonymous {
                forward: false,
                depth: 2,
                ..
            }
        ));
        let ops = operands("    jmp +");
        assert!(matches!(
            ops[0],
            Expr::Anonymous {
                forward: true,
                depth: 1,
                ..
            }
        ));
    }

    #[test]
    fn minus_before_value_is_negation() {
        let ops = operands("    .byte -1");
        assert!(matches!(
            ops[0],
            Expr::Unary {
                op: UnaryOp::Minus,
                ..
            }
        ));
    }

    #[test]
    fn parses_calls_lambdas_and_collections() {
        let ops = operands("    .byte len(\"abc\"), [1, 2][0], {\"a\": 1}[\"a\"]");
        assert!(matches!(ops[0], Expr::Call { ref args, .. } if args.len() == 1));
        assert!(matches!(ops[1], Expr::Index { .. }));
        assert!(matches!(ops[2], Expr::Index { .. }));

        match parse("f = (a, b = 2) => a * b") {
            LineAst::Assignment { expr, .. } => match expr {
                Expr::Lambda { params, .. } => {
                    assert_eq!(params.len(), 2);
                    assert!(params[1].default.is_some());
                }
                other => panic!("Expected lambda, got {other:?}"),
            },
            _ => panic!("Expected assignment"),
        }
    }

    #[test]
    fn star_in_operand_is_program_counter() {
        let ops = operands("    jmp * + 3");
        match &ops[0] {
            Expr::Binary { left, .. } => assert!(matches!(**left, Expr::Dollar(_))),
            other => panic!("Expected binary, got {other:?}"),
        }
    }

    #[test]
    fn rejects_multi_character_char_literal() {
        let err = parse_err("    .byte 'ab'");
        assert!(err.message.starts_with("Invalid char literal"));
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse_err("    lda #1 2");
        assert_eq!(err.message, "Unexpected trailing tokens");
    }

    #[test]
    fn rejects_illegal_first_column() {
        assert!(parse_err("@foo nop").message.contains("column 1"));
    }
}
