// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU family abstraction for addressing-mode resolution and encoding.
//!
//! # Architecture Overview
//!
//! ```text
//! Line parser → Pass driver → ModeResolver::classify → lookup_modes → encode → CodeOutput
//! ```
//!
//! - **Pass driver**: labels, directives, scopes, and expressions
//! - **Resolver**: turns operand expressions into family addressing modes
//! - **Instruction table**: static `(mnemonic, mode, mode, mode) → opcode` rows
//!
//! Each family implements [`ModeResolver`] once. The CPU is fixed for a run,
//! so the driver is generic over the resolver instead of dispatching per
//! call.

use std::fmt;
use std::ops::RangeInclusive;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::cpu::CpuKind;
use crate::core::expr::{evaluate_integer, EvalContext};
use crate::core::parser::Expr;
use crate::core::text_utils::split_suffix;
use crate::core::tokenizer::Span;

/// Number of operand slots in an instruction table row.
pub const MAX_OPERANDS: usize = 3;

/// A family's addressing-mode enum.
pub trait OperandMode: Copy + Eq + fmt::Debug + 'static {
    /// Mode of an unused operand slot.
    const NONE: Self;

    /// Long form of a short (zero page / direct) mode.
    fn promoted(self) -> Option<Self> {
        None
    }

    /// The same shape without indirection, for `(expr)` that was only
    /// grouping.
    fn without_indirect(self) -> Option<Self> {
        None
    }
}

/// One row of an instruction table.
#[derive(Debug)]
pub struct InstructionEntry<M: 'static> {
    pub mnemonic: &'static str,
    pub modes: [M; MAX_OPERANDS],
    pub opcode: &'static [u8],
    /// Total encoded size, opcode bytes included.
    pub size: u8,
}

impl<M: OperandMode> InstructionEntry<M> {
    pub const fn new(mnemonic: &'static str, modes: [M; MAX_OPERANDS], opcode: &'static [u8], size: u8) -> Self {
        Self {
            mnemonic,
            modes,
            opcode,
            size,
        }
    }
}

/// Explicit operand width from a mnemonic suffix (`lda.w`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
}

/// An instruction statement ready for resolution.
#[derive(Debug, Clone, Copy)]
pub struct InstructionLine<'a> {
    pub mnemonic: &'a str,
    pub width: Option<Width>,
    pub operands: &'a [Expr],
    pub span: Span,
}

impl<'a> InstructionLine<'a> {
    pub fn parse(text: &'a str, operands: &'a [Expr], span: Span) -> Result<Self, AsmError> {
        let (mnemonic, suffix) = split_suffix(text);
        let width = match suffix.map(str::to_ascii_lowercase).as_deref() {
            None => None,
            Some("b") => Some(Width::Byte),
            Some("w") => Some(Width::Word),
            Some("l") => Some(Width::Long),
            Some(other) => {
                return Err(AsmError::at(
                    AsmErrorKind::Syntax,
                    format!("Unknown width suffix: .{other}"),
                    span,
                ))
            }
        };
        Ok(Self {
            mnemonic,
            width,
            operands,
            span,
        })
    }

    /// Choose the short form for a value unless a suffix says otherwise.
    /// Unknown values take the long form.
    pub fn prefer_short(&self, value: Option<i64>, short: RangeInclusive<i64>) -> bool {
        match self.width {
            Some(Width::Byte) => true,
            Some(Width::Word | Width::Long) => false,
            None => value.is_some_and(|v| short.contains(&v)),
        }
    }
}

/// A classified operand.
#[derive(Debug, Clone)]
pub struct Operand<M, D> {
    pub mode: M,
    /// Evaluated number, `None` when absent or not known yet.
    pub value: Option<i64>,
    pub detail: D,
    pub span: Span,
    /// Parenthesized around a known address outside the short range, so it
    /// may be plain grouping.
    pub loose_indirect: bool,
}

impl<M, D: Default> Operand<M, D> {
    pub fn new(mode: M, span: Span) -> Self {
        Self {
            mode,
            value: None,
            detail: D::default(),
            span,
            loose_indirect: false,
        }
    }

    pub fn with_value(mut self, value: Option<i64>) -> Self {
        self.value = value;
        self
    }

    pub fn with_detail(mut self, detail: D) -> Self {
        self.detail = detail;
        self
    }

    pub fn loose(mut self) -> Self {
        self.loose_indirect = true;
        self
    }
}

/// Matched table row plus operands with their final modes.
#[derive(Debug)]
pub struct Resolution<M: 'static, D> {
    pub entry: &'static InstructionEntry<M>,
    pub operands: Vec<Operand<M, D>>,
}

/// Assembler services available to resolvers.
pub trait AssemblerContext: EvalContext {
    fn eval(&mut self) -> &mut dyn EvalContext;

    /// Whether this pass is already known to be provisional.
    fn pass_needed(&self) -> bool;

    /// Report an error only if the pass turns out to be final.
    fn defer_error(&mut self, error: AsmError);
}

fn find_entry<M: OperandMode>(
    tables: &[&'static [InstructionEntry<M>]],
    mnemonic: &str,
    modes: &[M; MAX_OPERANDS],
) -> Option<&'static InstructionEntry<M>> {
    tables
        .iter()
        .flat_map(|table| table.iter())
        .find(|e| e.modes == *modes && e.mnemonic.eq_ignore_ascii_case(mnemonic))
}

/// Find a table row for the modes, falling back to promoted short modes and
/// then to loose indirects read as plain addresses.
pub fn lookup_modes<M: OperandMode>(
    tables: &[&'static [InstructionEntry<M>]],
    mnemonic: &str,
    modes: [M; MAX_OPERANDS],
    loose: [bool; MAX_OPERANDS],
) -> Option<(&'static InstructionEntry<M>, [M; MAX_OPERANDS])> {
    let promote = |modes: [M; MAX_OPERANDS]| modes.map(|m| m.promoted().unwrap_or(m));
    let attempt = |modes: [M; MAX_OPERANDS]| {
        if let Some(entry) = find_entry(tables, mnemonic, &modes) {
            return Some((entry, modes));
        }
        let promoted = promote(modes);
        if promoted != modes {
            if let Some(entry) = find_entry(tables, mnemonic, &promoted) {
                return Some((entry, promoted));
            }
        }
        None
    };
    if let Some(found) = attempt(modes) {
        return Some(found);
    }
    let mut cleared = modes;
    for (mode, loose) in cleared.iter_mut().zip(loose) {
        if loose {
            if let Some(plain) = mode.without_indirect() {
                *mode = plain;
            }
        }
    }
    if cleared != modes {
        return attempt(cleared);
    }
    None
}

/// Per-family addressing-mode resolver.
pub trait ModeResolver {
    type Mode: OperandMode;
    type Detail: Clone + Default + fmt::Debug;

    fn cpu(&self) -> CpuKind;

    fn is_register(&self, name: &str) -> bool;

    fn tables(&self) -> &[&'static [InstructionEntry<Self::Mode>]];

    /// Classify each operand expression into a mode.
    fn classify(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<Operand<Self::Mode, Self::Detail>>, AsmError>;

    fn encode(
        &self,
        resolution: &Resolution<Self::Mode, Self::Detail>,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<u8>, AsmError>;

    /// Bytes beyond the table size, such as indexed offsets.
    fn extra_size(&self, _resolution: &Resolution<Self::Mode, Self::Detail>) -> usize {
        0
    }

    fn supports_mnemonic(&self, mnemonic: &str) -> bool {
        self.tables()
            .iter()
            .flat_map(|table| table.iter())
            .any(|e| e.mnemonic.eq_ignore_ascii_case(mnemonic))
    }

    fn resolve(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Resolution<Self::Mode, Self::Detail>, AsmError> {
        let mut operands = self.classify(line, ctx)?;
        if operands.len() > MAX_OPERANDS {
            return Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("Too many operands for {}", line.mnemonic.to_ascii_uppercase()),
                line.span,
            ));
        }
        let mut modes = [Self::Mode::NONE; MAX_OPERANDS];
        let mut loose = [false; MAX_OPERANDS];
        for (idx, op) in operands.iter().enumerate() {
            modes[idx] = op.mode;
            loose[idx] = op.loose_indirect;
        }
        let (entry, matched) = lookup_modes(self.tables(), line.mnemonic, modes, loose)
            .ok_or_else(|| {
                AsmError::at(
                    AsmErrorKind::ModeNotSupported,
                    format!(
                        "Addressing mode not supported for {}",
                        line.mnemonic.to_ascii_uppercase()
                    ),
                    line.span,
                )
            })?;
        for (op, mode) in operands.iter_mut().zip(matched) {
            op.mode = mode;
        }
        Ok(Resolution { entry, operands })
    }

    /// Resolve and encode one instruction.
    fn assemble(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<u8>, AsmError> {
        let resolution = self.resolve(line, ctx)?;
        let bytes = self.encode(&resolution, line, ctx)?;
        let expected = resolution.entry.size as usize + self.extra_size(&resolution);
        if bytes.len() != expected && !ctx.pass_needed() {
            return Err(AsmError::at(
                AsmErrorKind::Internal,
                format!(
                    "Size mismatch for {}: expected {expected} bytes, encoded {}",
                    line.mnemonic.to_ascii_uppercase(),
                    bytes.len()
                ),
                line.span,
            ));
        }
        Ok(bytes)
    }
}

/// Evaluate an operand expression to an integer, `None` if not known yet.
pub fn operand_value(
    ctx: &mut dyn AssemblerContext,
    expr: &Expr,
    range: Option<RangeInclusive<i64>>,
) -> Result<Option<i64>, AsmError> {
    Ok(evaluate_integer(expr, ctx.eval(), range)?)
}

/// Signed displacement from the address after the instruction to `target`.
/// Out-of-range displacements are deferred and encoded as zero.
pub fn relative_offset(
    ctx: &mut dyn AssemblerContext,
    target: Option<i64>,
    next_pc: i64,
    range: RangeInclusive<i64>,
    span: Span,
) -> i64 {
    let Some(target) = target else {
        return 0;
    };
    let offset = target - next_pc;
    if range.contains(&offset) {
        offset
    } else {
        ctx.defer_error(AsmError::at(
            AsmErrorKind::IllegalQuantity,
            format!("Relative branch out of range: {offset}"),
            span,
        ));
        0
    }
}

/// Check a known value against a range.
pub fn check_range(value: Option<i64>, range: RangeInclusive<i64>, span: Span) -> Result<i64, AsmError> {
    match value {
        None => Ok(0),
        Some(v) if range.contains(&v) => Ok(v),
        Some(v) => Err(AsmError::at(
            AsmErrorKind::IllegalQuantity,
            format!("Illegal quantity: {v}"),
            span,
        )),
    }
}

pub fn word_bytes(value: i64, big_endian: bool) -> [u8; 2] {
    let word = value as u16;
    if big_endian {
        word.to_be_bytes()
    } else {
        word.to_le_bytes()
    }
}

/// The register name of an operand, if it is a bare register.
pub fn register_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Register(name, _) => Some(name.to_ascii_uppercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        None,
        Imm,
        Zp,
        Abs,
        Ind,
    }

    impl OperandMode for Mode {
        const NONE: Self = Mode::None;

        fn promoted(self) -> Option<Self> {
            (self == Mode::Zp).then_some(Mode::Abs)
        }

        fn without_indirect(self) -> Option<Self> {
            (self == Mode::Ind).then_some(Mode::Zp)
        }
    }

    static TABLE: &[InstructionEntry<Mode>] = &[
        InstructionEntry::new("LDA", [Mode::Imm, Mode::None, Mode::None], &[0xA9], 2),
        InstructionEntry::new("LDA", [Mode::Zp, Mode::None, Mode::None], &[0xA5], 2),
        InstructionEntry::new("LDA", [Mode::Abs, Mode::None, Mode::None], &[0xAD], 3),
        InstructionEntry::new("JMP", [Mode::Abs, Mode::None, Mode::None], &[0x4C], 3),
        InstructionEntry::new("JMP", [Mode::Ind, Mode::None, Mode::None], &[0x6C], 3),
    ];

    fn modes(first: Mode) -> [Mode; 3] {
        [first, Mode::None, Mode::None]
    }

    #[test]
    fn exact_match_wins() {
        let (entry, _) = lookup_modes(&[TABLE], "lda", modes(Mode::Zp), [false; 3]).unwrap();
        assert_eq!(entry.opcode, &[0xA5]);
    }

    #[test]
    fn short_modes_promote_when_missing() {
        let (entry, matched) =
            lookup_modes(&[TABLE], "JMP", modes(Mode::Zp), [false; 3]).unwrap();
        assert_eq!(entry.opcode, &[0x4C]);
        assert_eq!(matched[0], Mode::Abs);
    }

    #[test]
    fn loose_indirect_falls_back_to_address() {
        assert!(lookup_modes(&[TABLE], "LDA", modes(Mode::Ind), [false; 3]).is_none());
        let (entry, matched) =
            lookup_modes(&[TABLE], "LDA", modes(Mode::Ind), [true, false, false]).unwrap();
        assert_eq!(entry.opcode, &[0xA5]);
        assert_eq!(matched[0], Mode::Zp);
        // A real indirect form is preferred when it exists.
        let (entry, _) =
            lookup_modes(&[TABLE], "JMP", modes(Mode::Ind), [true, false, false]).unwrap();
        assert_eq!(entry.opcode, &[0x6C]);
    }

    #[test]
    fn width_suffix_is_parsed() {
        let line = InstructionLine::parse("lda.w", &[], Span::default()).unwrap();
        assert_eq!(line.mnemonic, "lda");
        assert_eq!(line.width, Some(Width::Word));
        assert!(!line.prefer_short(Some(0x20), 0..=0xff));
        let line = InstructionLine::parse("lda", &[], Span::default()).unwrap();
        assert!(line.prefer_short(Some(0x20), 0..=0xff));
        assert!(!line.prefer_short(None, 0..=0xff));
        assert!(InstructionLine::parse("lda.q", &[], Span::default()).is_err());
    }

    #[test]
    fn word_bytes_follow_byte_order() {
        assert_eq!(word_bytes(0x1234, false), [0x34, 0x12]);
        assert_eq!(word_bytes(0x1234, true), [0x12, 0x34]);
        assert_eq!(word_bytes(-1, false), [0xFF, 0xFF]);
    }
}
