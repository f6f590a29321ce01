// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand classification and encoding for the 6800 and 6809.
//!
//! 6809 operand shapes:
//!
//! ```text
//! lda #n          [Immediate(n)]
//! lda n           [n]                  direct or extended
//! lda <n / >n     [Unary(Low|High, n)] forced direct / extended
//! lda n,x         [n, Register(X)]     indexed, offset sized by value
//! lda ,x+         [Empty, AutoIncrement(X, 1)]
//! lda ,--x        [Empty, Unary(-, Unary(-, Register(X)))]
//! lda a,x         [Register(A), Register(X)]
//! lda label,pcr   [label, Register(PCR)]
//! lda [n,x]       [Array[n, Register(X)]]
//! lda [n]         [Array[n]]           extended indirect
//! tfr a,b         [Register(A), Register(B)]
//! pshs a,b,x      [Register(A), Register(B), Register(X)]
//! ```
//!
//! The 6800 takes the immediate, direct and extended shapes above plus
//! `n,x` and `,x`.

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::cpu::CpuKind;
use crate::core::family::{
    check_range, operand_value, register_name, relative_offset, word_bytes, AssemblerContext,
    InstructionEntry, InstructionLine, ModeResolver, Operand, Resolution, Width,
};
use crate::core::parser::{Expr, UnaryOp};
use crate::core::tokenizer::Span;
use crate::families::m6800::table::{branch_kind, m6800_table, m6809_table};
use crate::families::m6800::{
    index_base_code, is_m6800_register, is_register, stack_mask, transfer_code, AddressMode,
    IndexDetail,
};

type Op = Operand<AddressMode, IndexDetail>;

const DIRECT_PAGE: std::ops::RangeInclusive<i64> = 0..=0xFF;
const FIVE_BIT: std::ops::RangeInclusive<i64> = -16..=15;
const EIGHT_BIT: std::ops::RangeInclusive<i64> = -128..=127;

const INDIRECT: u8 = 0x10;

#[derive(Debug, Clone)]
pub struct M6800Resolver {
    cpu: CpuKind,
    tables: [&'static [InstructionEntry<AddressMode>]; 1],
}

impl M6800Resolver {
    pub fn new(cpu: CpuKind) -> Self {
        let table = match cpu {
            CpuKind::M6800 => m6800_table(),
            _ => m6809_table(),
        };
        Self {
            cpu,
            tables: [table],
        }
    }

    /// 6800 operands: no postbyte indexing, no register lists.
    fn classify_m6800(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<Op>, AsmError> {
        if let Some(long) = branch_kind(line.mnemonic) {
            return Ok(vec![Self::classify_branch(ctx, line, long)?]);
        }
        match line.operands {
            [] => Ok(Vec::new()),
            [Expr::Array(_, span)] => Err(Self::not_supported(line, *span)),
            [single] => Ok(vec![self.classify_single(line, ctx, single)?]),
            [offset, base] => {
                if register_name(base).as_deref() != Some("X") {
                    return Err(Self::not_supported(line, base.span()));
                }
                let value = match offset {
                    Expr::Empty(_) => Some(0),
                    other => operand_value(ctx, other, None)?,
                };
                let span = offset.span().to(base.span());
                Ok(vec![Op::new(AddressMode::IndexedOffset, span).with_value(value)])
            }
            _ => Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("Too many operands for {}", line.mnemonic.to_ascii_uppercase()),
                line.span,
            )),
        }
    }

    fn not_supported(line: &InstructionLine<'_>, span: Span) -> AsmError {
        AsmError::at(
            AsmErrorKind::ModeNotSupported,
            format!(
                "Addressing mode not supported for {}",
                line.mnemonic.to_ascii_uppercase()
            ),
            span,
        )
    }

    /// Size of the mnemonic's indexed row, needed to turn a PCR target into
    /// an offset before the row has been picked.
    fn indexed_row_size(&self, mnemonic: &str) -> u8 {
        self.tables[0]
            .iter()
            .find(|e| e.modes[0] == AddressMode::Indexed && e.mnemonic.eq_ignore_ascii_case(mnemonic))
            .map_or(2, |e| e.size)
    }

    fn classify_branch(
        ctx: &mut dyn AssemblerContext,
        line: &InstructionLine<'_>,
        long: bool,
    ) -> Result<Op, AsmError> {
        let [target] = line.operands else {
            return Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("{} takes one target", line.mnemonic.to_ascii_uppercase()),
                line.span,
            ));
        };
        let value = operand_value(ctx, target, None)?;
        let mode = if long {
            AddressMode::Relative16
        } else {
            AddressMode::Relative8
        };
        Ok(Op::new(mode, target.span()).with_value(value))
    }

    fn classify_transfer(line: &InstructionLine<'_>) -> Result<Op, AsmError> {
        let [source, dest] = line.operands else {
            return Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("{} takes two registers", line.mnemonic.to_ascii_uppercase()),
                line.span,
            ));
        };
        let code = |expr: &Expr| {
            register_name(expr)
                .and_then(|name| transfer_code(&name))
                .ok_or_else(|| Self::not_supported(line, expr.span()))
        };
        let (src, dst) = (code(source)?, code(dest)?);
        // Bit 3 set means an 8-bit register.
        if (src & 0x8) != (dst & 0x8) {
            return Err(AsmError::at(
                AsmErrorKind::TypeMismatch,
                "Register sizes do not match",
                line.span,
            ));
        }
        Ok(Op::new(AddressMode::RegisterPair, line.span).with_value(Some(i64::from(src << 4 | dst))))
    }

    fn classify_stack(line: &InstructionLine<'_>) -> Result<Op, AsmError> {
        let upper = line.mnemonic.to_ascii_uppercase();
        let own = if upper.ends_with('S') { "S" } else { "U" };
        let mut mask = 0u8;
        for expr in line.operands {
            let name = register_name(expr).ok_or_else(|| Self::not_supported(line, expr.span()))?;
            if name == own {
                return Err(AsmError::at(
                    AsmErrorKind::ModeNotSupported,
                    format!("{upper} cannot push or pull {own}"),
                    expr.span(),
                ));
            }
            mask |= stack_mask(&name).ok_or_else(|| Self::not_supported(line, expr.span()))?;
        }
        Ok(Op::new(AddressMode::RegisterList, line.span).with_value(Some(i64::from(mask))))
    }

    fn classify_single(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        expr: &Expr,
    ) -> Result<Op, AsmError> {
        match expr {
            Expr::Immediate(inner, span) => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(AddressMode::Immediate8, *span).with_value(value))
            }
            Expr::Array(items, span) => match items.as_slice() {
                [Expr::Empty(_)] | [] => Err(Self::not_supported(line, *span)),
                [address] => {
                    let value = operand_value(ctx, address, None)?;
                    let detail = IndexDetail {
                        postbyte: 0x9F,
                        extra: 2,
                        pc_relative: false,
                    };
                    Ok(Op::new(AddressMode::Indexed, *span)
                        .with_value(value)
                        .with_detail(detail))
                }
                [offset, base] => self.classify_indexed(line, ctx, offset, base, true, *span),
                _ => Err(Self::not_supported(line, *span)),
            },
            Expr::Unary {
                op: UnaryOp::Low,
                expr: inner,
                span,
            } => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(AddressMode::Direct, *span).with_value(value.map(|v| v & 0xFF)))
            }
            Expr::Unary {
                op: UnaryOp::High,
                expr: inner,
                span,
            } => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(AddressMode::Extended, *span).with_value(value))
            }
            Expr::Register(name, span) => Err(AsmError::at(
                AsmErrorKind::ModeNotSupported,
                format!("Register {} is not a valid operand here", name.to_ascii_uppercase()),
                *span,
            )),
            other => {
                let value = operand_value(ctx, other, None)?;
                let mode = if line.prefer_short(value, DIRECT_PAGE) {
                    AddressMode::Direct
                } else {
                    AddressMode::Extended
                };
                Ok(Op::new(mode, other.span()).with_value(value))
            }
        }
    }

    /// Build the postbyte for `offset,base`, optionally inside brackets.
    fn classify_indexed(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        offset: &Expr,
        base: &Expr,
        indirect: bool,
        span: Span,
    ) -> Result<Op, AsmError> {
        let ind = if indirect { INDIRECT } else { 0 };
        let indexed = |postbyte: u8, extra: u8| IndexDetail {
            postbyte: postbyte | ind,
            extra,
            pc_relative: false,
        };
        let op = |detail: IndexDetail, value: Option<i64>| {
            Op::new(AddressMode::Indexed, span)
                .with_value(value)
                .with_detail(detail)
        };

        // Auto increment and decrement carry no offset.
        let (base_name, step) = match base {
            Expr::AutoIncrement {
                register, amount, ..
            } => (register.to_ascii_uppercase(), *amount as i8),
            Expr::Unary {
                op: UnaryOp::Minus,
                expr: inner,
                ..
            } => match inner.as_ref() {
                Expr::Unary {
                    op: UnaryOp::Minus,
                    expr: reg,
                    ..
                } => (register_name(reg).unwrap_or_default(), -2),
                reg => (register_name(reg).unwrap_or_default(), -1),
            },
            other => (register_name(other).unwrap_or_default(), 0),
        };

        if base_name == "PCR" || base_name == "PC" {
            if step != 0 {
                return Err(Self::not_supported(line, base.span()));
            }
            return self.classify_pc_offset(line, ctx, offset, base_name == "PCR", ind, span);
        }

        let rr = index_base_code(&base_name).ok_or_else(|| Self::not_supported(line, base.span()))? << 5;

        if step != 0 {
            if !matches!(offset, Expr::Empty(_)) {
                return Err(Self::not_supported(line, offset.span()));
            }
            if indirect && step.abs() == 1 {
                return Err(AsmError::at(
                    AsmErrorKind::ModeNotSupported,
                    "Single-step auto increment cannot be indirect",
                    span,
                ));
            }
            let mode = match step {
                1 => 0x80,
                2 => 0x81,
                -1 => 0x82,
                _ => 0x83,
            };
            return Ok(op(indexed(mode | rr, 0), None));
        }

        match offset {
            Expr::Empty(_) => Ok(op(indexed(0x84 | rr, 0), None)),
            Expr::Register(name, reg_span) => {
                let mode = match name.to_ascii_uppercase().as_str() {
                    "A" => 0x86,
                    "B" => 0x85,
                    "D" => 0x8B,
                    _ => return Err(Self::not_supported(line, *reg_span)),
                };
                Ok(op(indexed(mode | rr, 0), None))
            }
            value_expr => {
                let value = operand_value(ctx, value_expr, None)?;
                let detail = match (line.width, value) {
                    (Some(Width::Byte), _) => indexed(0x88 | rr, 1),
                    (Some(_), _) | (None, None) => indexed(0x89 | rr, 2),
                    (None, Some(0)) if !indirect => indexed(0x84 | rr, 0),
                    (None, Some(v)) if !indirect && FIVE_BIT.contains(&v) => {
                        let detail = IndexDetail {
                            postbyte: rr | (v as u8 & 0x1F),
                            extra: 0,
                            pc_relative: false,
                        };
                        return Ok(op(detail, Some(v)));
                    }
                    (None, Some(v)) if EIGHT_BIT.contains(&v) => indexed(0x88 | rr, 1),
                    (None, Some(_)) => indexed(0x89 | rr, 2),
                };
                Ok(op(detail, value))
            }
        }
    }

    fn classify_pc_offset(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        offset: &Expr,
        relative: bool,
        ind: u8,
        span: Span,
    ) -> Result<Op, AsmError> {
        if matches!(offset, Expr::Empty(_) | Expr::Register(..)) {
            return Err(Self::not_supported(line, offset.span()));
        }
        let value = operand_value(ctx, offset, None)?;
        let pc = ctx.program_counter();
        let row = i64::from(self.indexed_row_size(line.mnemonic));
        // The row size already counts the postbyte; add the offset bytes.
        let short_distance = value.map(|target| if relative { target - (pc + row + 1) } else { target });
        let short = match line.width {
            Some(Width::Byte) => true,
            Some(_) => false,
            None => short_distance.is_some_and(|d| EIGHT_BIT.contains(&d)),
        };
        let detail = IndexDetail {
            postbyte: (if short { 0x8C } else { 0x8D }) | ind,
            extra: if short { 1 } else { 2 },
            pc_relative: relative,
        };
        Ok(Op::new(AddressMode::Indexed, span)
            .with_value(value)
            .with_detail(detail))
    }
}

impl ModeResolver for M6800Resolver {
    type Mode = AddressMode;
    type Detail = IndexDetail;

    fn cpu(&self) -> CpuKind {
        self.cpu
    }

    fn is_register(&self, name: &str) -> bool {
        match self.cpu {
            CpuKind::M6800 => is_m6800_register(name),
            _ => is_register(name),
        }
    }

    fn tables(&self) -> &[&'static [InstructionEntry<AddressMode>]] {
        &self.tables
    }

    fn classify(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<Op>, AsmError> {
        if self.cpu == CpuKind::M6800 {
            return self.classify_m6800(line, ctx);
        }
        let upper = line.mnemonic.to_ascii_uppercase();
        if let Some(long) = branch_kind(&upper) {
            return Ok(vec![Self::classify_branch(ctx, line, long)?]);
        }
        match upper.as_str() {
            "TFR" | "EXG" => return Ok(vec![Self::classify_transfer(line)?]),
            "PSHS" | "PULS" | "PSHU" | "PULU" => return Ok(vec![Self::classify_stack(line)?]),
            _ => {}
        }
        match line.operands {
            [] => Ok(Vec::new()),
            [single] => Ok(vec![self.classify_single(line, ctx, single)?]),
            [offset, base] => Ok(vec![self.classify_indexed(
                line,
                ctx,
                offset,
                base,
                false,
                offset.span().to(base.span()),
            )?]),
            _ => Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("Too many operands for {upper}"),
                line.span,
            )),
        }
    }

    fn encode(
        &self,
        resolution: &Resolution<AddressMode, IndexDetail>,
        _line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<u8>, AsmError> {
        let entry = resolution.entry;
        let mut bytes = entry.opcode.to_vec();
        let pc = ctx.program_counter();
        let next_pc = pc + i64::from(entry.size) + self.extra_size(resolution) as i64;

        for op in &resolution.operands {
            match op.mode {
                AddressMode::Inherent => {}
                AddressMode::Immediate8 => {
                    bytes.push(check_range(op.value, -128..=0xFF, op.span)? as u8);
                }
                AddressMode::Direct => {
                    bytes.push(check_range(op.value, DIRECT_PAGE, op.span)? as u8);
                }
                AddressMode::IndexedOffset => {
                    bytes.push(check_range(op.value, 0..=0xFF, op.span)? as u8);
                }
                AddressMode::RegisterPair | AddressMode::RegisterList => {
                    bytes.push(op.value.unwrap_or(0) as u8);
                }
                AddressMode::Immediate16 => {
                    let value = check_range(op.value, -0x8000..=0xFFFF, op.span)?;
                    bytes.extend_from_slice(&word_bytes(value, true));
                }
                AddressMode::Extended => {
                    let value = check_range(op.value, 0..=0xFFFF, op.span)?;
                    bytes.extend_from_slice(&word_bytes(value, true));
                }
                AddressMode::Relative8 => {
                    let offset = relative_offset(ctx, op.value, next_pc, EIGHT_BIT, op.span);
                    bytes.push(offset as u8);
                }
                AddressMode::Relative16 => {
                    let offset = long_offset(op.value, next_pc, op.span)?;
                    bytes.extend_from_slice(&word_bytes(offset, true));
                }
                AddressMode::Indexed => {
                    let detail = op.detail;
                    bytes.push(detail.postbyte);
                    if detail.pc_relative {
                        if detail.extra == 1 {
                            let offset = relative_offset(ctx, op.value, next_pc, EIGHT_BIT, op.span);
                            bytes.push(offset as u8);
                        } else {
                            let offset = long_offset(op.value, next_pc, op.span)?;
                            bytes.extend_from_slice(&word_bytes(offset, true));
                        }
                        continue;
                    }
                    let value = op.value;
                    match detail.extra {
                        0 => {}
                        1 => bytes.push(check_range(value, EIGHT_BIT, op.span)? as u8),
                        _ if detail.postbyte == 0x9F => {
                            let value = check_range(value, 0..=0xFFFF, op.span)?;
                            bytes.extend_from_slice(&word_bytes(value, true));
                        }
                        _ => {
                            let value = check_range(value, -0x8000..=0xFFFF, op.span)?;
                            bytes.extend_from_slice(&word_bytes(value, true));
                        }
                    }
                }
            }
        }
        Ok(bytes)
    }

    fn extra_size(&self, resolution: &Resolution<AddressMode, IndexDetail>) -> usize {
        resolution
            .operands
            .iter()
            .filter(|op| op.mode == AddressMode::Indexed)
            .map(|op| usize::from(op.detail.extra))
            .sum()
    }
}

/// 16-bit displacement to `target`. The program counter wraps, so every
/// address is reachable.
fn long_offset(target: Option<i64>, next_pc: i64, span: Span) -> Result<i64, AsmError> {
    let target = check_range(target, 0..=0xFFFF, span)?;
    Ok((target - next_pc).rem_euclid(0x10000))
}
