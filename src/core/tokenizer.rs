// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for assembly source with spans.
//!
//! This tokenizer is CPU-agnostic. Register detection is provided via a
//! function passed to [`Tokenizer::with_register_checker`].

use crate::core::text_utils::{is_ident_char, is_ident_start, is_space};
use std::sync::Arc;

/// Function type for checking if an identifier is a register name.
pub type RegisterChecker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Default register checker that treats no identifiers as registers.
pub fn no_registers(_ident: &str) -> bool {
    false
}

pub fn register_checker_none() -> RegisterChecker {
    register_checker_from_fn(no_registers)
}

pub fn register_checker_from_fn(func: fn(&str) -> bool) -> RegisterChecker {
    Arc::new(func)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    pub(crate) fn new(line: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            col_start: start + 1,
            col_end: end + 1,
        }
    }

    /// Span covering both `self` and `other` on the same line.
    pub fn to(self, other: Span) -> Span {
        Span {
            line: self.line,
            col_start: self.col_start.min(other.col_start),
            col_end: self.col_end.max(other.col_end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Register(String),
    Number(NumberLiteral),
    String(StringLiteral),
    Char(StringLiteral),
    Comma,
    Colon,
    Dollar,
    Dot,
    Hash,
    Question,
    Arrow,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Operator(OperatorKind),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLiteral {
    pub text: String,
    pub base: u32,
}

/// A quoted literal. `value` holds the text with escapes already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub raw: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Plus,
    Minus,
    Multiply,
    Power,
    Divide,
    Mod,
    Shl,
    Shr,
    BitNot,
    LogicNot,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    LogicXor,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl OperatorKind {
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKind::Plus => "+",
            OperatorKind::Minus => "-",
            OperatorKind::Multiply => "*",
            OperatorKind::Power => "**",
            OperatorKind::Divide => "/",
            OperatorKind::Mod => "%",
            OperatorKind::Shl => "<<",
            OperatorKind::Shr => ">>",
            OperatorKind::BitNot => "~",
            OperatorKind::LogicNot => "!",
            OperatorKind::BitAnd => "&",
            OperatorKind::BitOr => "|",
            OperatorKind::BitXor => "^",
            OperatorKind::LogicAnd => "&&",
            OperatorKind::LogicOr => "||",
            OperatorKind::LogicXor => "^^",
            OperatorKind::Eq => "==",
            OperatorKind::Ne => "!=",
            OperatorKind::Ge => ">=",
            OperatorKind::Gt => ">",
            OperatorKind::Le => "<=",
            OperatorKind::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    If,
    ElseIf,
    Else,
    EndIf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn to_source_text(&self) -> String {
        match &self.kind {
            TokenKind::Identifier(name) | TokenKind::Register(name) => name.clone(),
            TokenKind::Number(num) => num.text.clone(),
            TokenKind::String(lit) | TokenKind::Char(lit) => lit.raw.clone(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Dollar => "$".to_string(),
            TokenKind::Dot => ".".to_string(),
            TokenKind::Hash => "#".to_string(),
            TokenKind::Question => "?".to_string(),
            TokenKind::Arrow => "=>".to_string(),
            TokenKind::OpenBracket => "[".to_string(),
            TokenKind::CloseBracket => "]".to_string(),
            TokenKind::OpenBrace => "{".to_string(),
            TokenKind::CloseBrace => "}".to_string(),
            TokenKind::OpenParen => "(".to_string(),
            TokenKind::CloseParen => ")".to_string(),
            TokenKind::Operator(op) => op.symbol().to_string(),
            TokenKind::End => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenizeError {
    pub message: String,
    pub span: Span,
}

pub struct Tokenizer<'a> {
    line_num: u32,
    input: &'a [u8],
    cursor: usize,
    is_register: RegisterChecker,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer with no register detection.
    #[must_use]
    pub fn new(line: &'a str, line_num: u32) -> Self {
        Self::with_register_checker(line, line_num, register_checker_none())
    }

    /// Create a new tokenizer with a custom register checker.
    #[must_use]
    pub fn with_register_checker(
        line: &'a str,
        line_num: u32,
        is_register: RegisterChecker,
    ) -> Self {
        Self {
            line_num,
            input: line.as_bytes(),
            cursor: 0,
            is_register,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, TokenizeError> {
        self.skip_white();
        let start = self.cursor;
        let c = self.current_byte();
        match c {
            0 => Ok(self.token(TokenKind::End, start)),
            b';' => {
                self.cursor = self.input.len();
                Ok(Token {
                    kind: TokenKind::End,
                    span: Span::new(self.line_num, start, start),
                })
            }
            _ if is_ident_start(c) => self.scan_identifier(),
            _ if c.is_ascii_digit() => self.scan_number(),
            b'"' => self.scan_quoted(b'"'),
            b'\'' => self.scan_quoted(b'\''),
            b'.' => self.single(TokenKind::Dot, start),
            b'?' => self.single(TokenKind::Question, start),
            b'[' => self.single(TokenKind::OpenBracket, start),
            b']' => self.single(TokenKind::CloseBracket, start),
            b'{' => self.single(TokenKind::OpenBrace, start),
            b'}' => self.single(TokenKind::CloseBrace, start),
            b'#' => self.single(TokenKind::Hash, start),
            b'$' => {
                if is_hex_digit(self.peek_raw_byte(1)) {
                    self.scan_prefixed_number(16)
                } else {
                    self.single(TokenKind::Dollar, start)
                }
            }
            b'%' => {
                let next = self.peek_raw_byte(1);
                if is_bit_pattern_digit(next) && self.is_prefix_context(start) {
                    self.scan_prefixed_number(2)
                } else {
                    self.single(TokenKind::Operator(OperatorKind::Mod), start)
                }
            }
            _ => self.scan_operator(start, c),
        }
    }

    fn single(&mut self, kind: TokenKind, start: usize) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        Ok(self.token(kind, start))
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(self.line_num, start, self.cursor),
        }
    }

    fn scan_operator(&mut self, start: usize, c: u8) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let kind = match c {
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'+' => TokenKind::Operator(OperatorKind::Plus),
            b'-' => TokenKind::Operator(OperatorKind::Minus),
            b'*' => {
                if self.peek_raw_byte(0) == b'*' {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Power)
                } else {
                    TokenKind::Operator(OperatorKind::Multiply)
                }
            }
            b'/' => TokenKind::Operator(OperatorKind::Divide),
            b'~' => TokenKind::Operator(OperatorKind::BitNot),
            b'=' => match self.peek_raw_byte(0) {
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Eq)
                }
                b'>' => {
                    self.cursor += 1;
                    TokenKind::Arrow
                }
                _ => TokenKind::Operator(OperatorKind::Eq),
            },
            b'!' => {
                if self.peek_raw_byte(0) == b'=' {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Ne)
                } else {
                    TokenKind::Operator(OperatorKind::LogicNot)
                }
            }
            b'&' => {
                if self.peek_raw_byte(0) == b'&' {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::LogicAnd)
                } else {
                    TokenKind::Operator(OperatorKind::BitAnd)
                }
            }
            b'|' => {
                if self.peek_raw_byte(0) == b'|' {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::LogicOr)
                } else {
                    TokenKind::Operator(OperatorKind::BitOr)
                }
            }
            b'^' => {
                if self.peek_raw_byte(0) == b'^' {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::LogicXor)
                } else {
                    TokenKind::Operator(OperatorKind::BitXor)
                }
            }
            b'<' => match self.peek_raw_byte(0) {
                b'<' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Shl)
                }
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Le)
                }
                b'>' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Ne)
                }
                _ => TokenKind::Operator(OperatorKind::Lt),
            },
            b'>' => match self.peek_raw_byte(0) {
                b'>' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Shr)
                }
                b'=' => {
                    self.cursor += 1;
                    TokenKind::Operator(OperatorKind::Ge)
                }
                _ => TokenKind::Operator(OperatorKind::Gt),
            },
            _ => {
                return Err(TokenizeError {
                    message: "Illegal character".to_string(),
                    span: Span::new(self.line_num, start, self.cursor),
                })
            }
        };
        Ok(self.token(kind, start))
    }

    fn scan_identifier(&mut self) -> Result<Token, TokenizeError> {
        let start = self.cursor;
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        // The Z80 shadow pair is written AF'.
        if self.current_byte() == b'\''
            && self.input[start..self.cursor].eq_ignore_ascii_case(b"AF")
        {
            self.cursor += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let upper = text.to_ascii_uppercase();

        let kind = if (self.is_register)(&upper) {
            TokenKind::Register(text)
        } else {
            TokenKind::Identifier(text)
        };
        Ok(self.token(kind, start))
    }

    fn scan_number(&mut self) -> Result<Token, TokenizeError> {
        let start = self.cursor;
        while is_num_char(self.current_byte()) {
            self.cursor += 1;
        }
        let run = &self.input[start..self.cursor];
        let all_digits = run.iter().all(|c| c.is_ascii_digit() || *c == b'_');
        let mut is_float = false;
        if all_digits && self.current_byte() == b'.' && self.peek_raw_byte(1).is_ascii_digit() {
            self.cursor += 1;
            while self.current_byte().is_ascii_digit() {
                self.cursor += 1;
            }
            is_float = true;
            self.scan_exponent();
        } else if all_digits {
            is_float = self.scan_exponent();
        } else if matches!(run.last(), Some(b'e' | b'E'))
            && run[..run.len() - 1].iter().all(u8::is_ascii_digit)
            && matches!(self.current_byte(), b'+' | b'-')
            && self.peek_raw_byte(1).is_ascii_digit()
        {
            self.cursor += 1;
            while self.current_byte().is_ascii_digit() {
                self.cursor += 1;
            }
            is_float = true;
        }

        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let base = if is_float { 10 } else { literal_base(&text) };
        Ok(self.token(TokenKind::Number(NumberLiteral { text, base }), start))
    }

    /// Consume an exponent (`e5`, `E-3`) directly after the mantissa.
    fn scan_exponent(&mut self) -> bool {
        if !matches!(self.current_byte(), b'e' | b'E') {
            return false;
        }
        let mut offset = 1;
        if matches!(self.peek_raw_byte(1), b'+' | b'-') {
            offset = 2;
        }
        if !self.peek_raw_byte(offset).is_ascii_digit() {
            return false;
        }
        self.cursor += offset;
        while self.current_byte().is_ascii_digit() {
            self.cursor += 1;
        }
        true
    }

    fn scan_prefixed_number(&mut self, base: u32) -> Result<Token, TokenizeError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut saw_digit = false;
        loop {
            let c = self.current_byte();
            let ok = match base {
                2 => is_bit_pattern_digit(c) || c == b'_',
                16 => is_hex_digit(c) || c == b'_',
                _ => false,
            };
            if !ok {
                break;
            }
            if c != b'_' {
                saw_digit = true;
            }
            self.cursor += 1;
        }
        if !saw_digit {
            return Err(TokenizeError {
                message: "Illegal character in constant".to_string(),
                span: Span::new(self.line_num, start, self.cursor),
            });
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        Ok(self.token(TokenKind::Number(NumberLiteral { text, base }), start))
    }

    fn scan_quoted(&mut self, quote: u8) -> Result<Token, TokenizeError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut out: Vec<u8> = Vec::new();
        let mut pending_high: Option<u32> = None;
        while self.current_byte() != 0 && self.current_byte() != quote {
            let c = self.current_byte();
            if c != b'\\' {
                if pending_high.is_some() {
                    return Err(self.error("Unpaired surrogate in escape", start));
                }
                out.push(c);
                self.cursor += 1;
                continue;
            }
            self.cursor += 1;
            let esc = self.current_byte();
            let ch = match esc {
                b'n' => '\n',
                b'r' => '\r',
                b't' => '\t',
                b'0' => '\0',
                b'x' => {
                    let value = self.hex_escape(2, start)?;
                    char::from_u32(value).unwrap_or('\0')
                }
                b'u' => {
                    let unit = self.hex_escape(4, start)?;
                    match (pending_high.take(), unit) {
                        (None, 0xD800..=0xDBFF) => {
                            pending_high = Some(unit);
                            self.cursor += 1;
                            continue;
                        }
                        (Some(high), 0xDC00..=0xDFFF) => {
                            let folded = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                            char::from_u32(folded)
                                .ok_or_else(|| self.error("Invalid unicode escape", start))?
                        }
                        (None, _) => char::from_u32(unit)
                            .ok_or_else(|| self.error("Unpaired surrogate in escape", start))?,
                        (Some(_), _) => {
                            return Err(self.error("Unpaired surrogate in escape", start))
                        }
                    }
                }
                0 => break,
                other => other as char,
            };
            if pending_high.is_some() {
                return Err(self.error("Unpaired surrogate in escape", start));
            }
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            self.cursor += 1;
        }

        if self.current_byte() != quote {
            return Err(TokenizeError {
                message: format!(
                    "Unterminated string: {}",
                    String::from_utf8_lossy(&self.input[start..])
                ),
                span: Span::new(self.line_num, start, self.cursor),
            });
        }
        if pending_high.is_some() {
            return Err(self.error("Unpaired surrogate in escape", start));
        }
        self.cursor += 1;
        let raw = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let value =
            String::from_utf8(out).map_err(|_| self.error("Invalid UTF-8 in string", start))?;
        let lit = StringLiteral { raw, value };
        let kind = if quote == b'\'' {
            TokenKind::Char(lit)
        } else {
            TokenKind::String(lit)
        };
        Ok(self.token(kind, start))
    }

    /// Read `digits` hex digits following the escape letter at the cursor,
    /// leaving the cursor on the last digit.
    fn hex_escape(&mut self, digits: usize, start: usize) -> Result<u32, TokenizeError> {
        let mut value = 0u32;
        for offset in 1..=digits {
            let c = self.peek_raw_byte(offset);
            if !c.is_ascii_hexdigit() {
                return Err(self.error("Bad hex escape in string", start));
            }
            value = (value << 4) | u32::from(hex_digit(c));
        }
        self.cursor += digits;
        Ok(value)
    }

    fn error(&self, message: &str, start: usize) -> TokenizeError {
        TokenizeError {
            message: message.to_string(),
            span: Span::new(self.line_num, start, self.cursor),
        }
    }

    fn skip_white(&mut self) {
        while is_space(self.current_byte()) {
            self.cursor += 1;
        }
    }

    fn current_byte(&self) -> u8 {
        self.input.get(self.cursor).copied().unwrap_or(0)
    }

    fn peek_raw_byte(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }

    /// Check if the current position is a valid context for a prefix operator
    /// like `%` for binary numbers. This is true when:
    /// - At the start of the line (no previous non-space char)
    /// - After an operator or punctuation that starts an expression
    /// - After whitespace following an identifier (e.g., `.byte %1010`)
    fn is_prefix_context(&self, start: usize) -> bool {
        let has_leading_space = start > 0 && is_space(self.input[start - 1]);

        match self.prev_non_space(start) {
            None => true,
            Some(
                b'(' | b'[' | b'{' | b',' | b'#' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|'
                | b'^' | b'~' | b'!' | b'<' | b'>' | b'=' | b'?' | b':',
            ) => true,
            Some(ch) if has_leading_space && is_ident_char(ch) => true,
            _ => false,
        }
    }

    fn prev_non_space(&self, start: usize) -> Option<u8> {
        (0..start)
            .rev()
            .map(|i| self.input[i])
            .find(|&c| !is_space(c))
    }
}

/// Radix implied by a literal's prefix or suffix.
fn literal_base(text: &str) -> u32 {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") && lower.len() > 2 {
        return 16;
    }
    if lower.starts_with("0o") && lower.len() > 2 {
        return 8;
    }
    if lower.starts_with("0b")
        && lower.len() > 2
        && lower[2..].bytes().all(|c| matches!(c, b'0' | b'1' | b'_'))
    {
        return 2;
    }
    match lower.as_bytes().last() {
        Some(b'h') => 16,
        Some(b'b') => 2,
        Some(b'o') | Some(b'q') => 8,
        _ if lower.len() > 1 && lower.starts_with('0') => 8,
        _ => 10,
    }
}

fn is_num_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_bit_pattern_digit(c: u8) -> bool {
    matches!(c, b'0' | b'1' | b'.' | b'#')
}

fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        _ => c - b'a' + 10,
    }
}
