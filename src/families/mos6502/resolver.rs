// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand classification and encoding for the 6502 and 65C02.
//!
//! Operand shapes as they arrive from the parser:
//!
//! ```text
//! lda #n          [Immediate(n)]
//! lda n           [n]
//! lda n,x         [n, Register(X)]
//! lda (n,x)       [Indirect(Tuple[n, Register(X)])]
//! lda (n),y       [Indirect(n), Register(Y)]
//! jmp (n)         [Indirect(n)]
//! asl a           [Register(A)]
//! bbr0 zp,label   [zp, label]
//! ```

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::cpu::CpuKind;
use crate::core::family::{
    check_range, operand_value, register_name, relative_offset, word_bytes, AssemblerContext,
    InstructionEntry, InstructionLine, ModeResolver, Operand, Resolution,
};
use crate::core::parser::Expr;
use crate::families::mos6502::table::{BASE_TABLE, CMOS_TABLE};
use crate::families::mos6502::{is_register, AddressMode};

type Op = Operand<AddressMode, ()>;

const NMOS_TABLES: &[&[InstructionEntry<AddressMode>]] = &[BASE_TABLE];
const CMOS_TABLES: &[&[InstructionEntry<AddressMode>]] = &[BASE_TABLE, CMOS_TABLE];

const ZERO_PAGE: std::ops::RangeInclusive<i64> = 0..=0xFF;

/// Resolver for the 6502 family.
#[derive(Debug, Clone, Copy)]
pub struct Mos6502Resolver {
    cpu: CpuKind,
}

impl Mos6502Resolver {
    pub fn new(cpu: CpuKind) -> Self {
        Self { cpu }
    }

    fn is_branch(mnemonic: &str) -> bool {
        let upper = mnemonic.to_ascii_uppercase();
        matches!(
            upper.as_str(),
            "BCC" | "BCS" | "BEQ" | "BMI" | "BNE" | "BPL" | "BVC" | "BVS" | "BRA"
        )
    }

    fn is_bit_branch(mnemonic: &str) -> bool {
        let upper = mnemonic.to_ascii_uppercase();
        upper.len() == 4 && (upper.starts_with("BBR") || upper.starts_with("BBS"))
    }

    /// Zero page or absolute, by value and width suffix.
    fn sized(
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        expr: &Expr,
        short: AddressMode,
        long: AddressMode,
    ) -> Result<Op, AsmError> {
        let value = operand_value(ctx, expr, None)?;
        let mode = if line.prefer_short(value, ZERO_PAGE) {
            short
        } else {
            long
        };
        Ok(Op::new(mode, expr.span()).with_value(value))
    }

    fn classify_single(
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        expr: &Expr,
    ) -> Result<Op, AsmError> {
        match expr {
            Expr::Register(name, span) if name.eq_ignore_ascii_case("A") => {
                Ok(Op::new(AddressMode::Accumulator, *span))
            }
            Expr::Register(name, span) => Err(AsmError::at(
                AsmErrorKind::ModeNotSupported,
                format!("Register {} is not a valid operand here", name.to_ascii_uppercase()),
                *span,
            )),
            Expr::Immediate(inner, span) => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(AddressMode::Immediate, *span).with_value(value))
            }
            Expr::Indirect(inner, span) => match inner.as_ref() {
                Expr::Tuple(items, _) => match items.as_slice() {
                    [address, index] if register_name(index).as_deref() == Some("X") => {
                        let value = operand_value(ctx, address, None)?;
                        let mode = if line.prefer_short(value, ZERO_PAGE) {
                            AddressMode::IndexedIndirectX
                        } else {
                            AddressMode::AbsoluteIndexedIndirect
                        };
                        Ok(Op::new(mode, *span).with_value(value))
                    }
                    _ => Err(AsmError::at(
                        AsmErrorKind::ModeNotSupported,
                        "Expected (address,X)",
                        *span,
                    )),
                },
                address => {
                    let value = operand_value(ctx, address, None)?;
                    let mode = if line.prefer_short(value, ZERO_PAGE) {
                        AddressMode::ZeroPageIndirect
                    } else {
                        AddressMode::Indirect
                    };
                    let op = Op::new(mode, *span).with_value(value);
                    // `(n)` reads as a plain address only when n cannot be a
                    // zero page pointer.
                    Ok(match value {
                        Some(v) if !ZERO_PAGE.contains(&v) => op.loose(),
                        _ => op,
                    })
                }
            },
            other => Self::sized(line, ctx, other, AddressMode::ZeroPage, AddressMode::Absolute),
        }
    }

    fn classify_indexed(
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        base: &Expr,
        index: &Expr,
    ) -> Result<Op, AsmError> {
        let register = register_name(index);
        match (base, register.as_deref()) {
            (Expr::Indirect(inner, span), Some("Y")) if !matches!(inner.as_ref(), Expr::Tuple(..)) => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(AddressMode::IndirectIndexedY, *span).with_value(value))
            }
            (_, Some("X")) => Self::sized(line, ctx, base, AddressMode::ZeroPageX, AddressMode::AbsoluteX),
            (_, Some("Y")) => Self::sized(line, ctx, base, AddressMode::ZeroPageY, AddressMode::AbsoluteY),
            _ => Err(AsmError::at(
                AsmErrorKind::ModeNotSupported,
                format!(
                    "Addressing mode not supported for {}",
                    line.mnemonic.to_ascii_uppercase()
                ),
                index.span(),
            )),
        }
    }

    fn target(ctx: &mut dyn AssemblerContext, expr: &Expr) -> Result<Op, AsmError> {
        let value = operand_value(ctx, expr, None)?;
        Ok(Op::new(AddressMode::Relative, expr.span()).with_value(value))
    }
}

impl ModeResolver for Mos6502Resolver {
    type Mode = AddressMode;
    type Detail = ();

    fn cpu(&self) -> CpuKind {
        self.cpu
    }

    fn is_register(&self, name: &str) -> bool {
        is_register(name)
    }

    fn tables(&self) -> &[&'static [InstructionEntry<AddressMode>]] {
        match self.cpu {
            CpuKind::W65C02 => CMOS_TABLES,
            _ => NMOS_TABLES,
        }
    }

    fn classify(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<Op>, AsmError> {
        match line.operands {
            [] => Ok(Vec::new()),
            [target] if Self::is_branch(line.mnemonic) => Ok(vec![Self::target(ctx, target)?]),
            [zp, target] if Self::is_bit_branch(line.mnemonic) => {
                let value = operand_value(ctx, zp, None)?;
                Ok(vec![
                    Op::new(AddressMode::ZeroPage, zp.span()).with_value(value),
                    Self::target(ctx, target)?,
                ])
            }
            [single] => Ok(vec![Self::classify_single(line, ctx, single)?]),
            [base, index] => Ok(vec![Self::classify_indexed(line, ctx, base, index)?]),
            _ => Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!("Too many operands for {}", line.mnemonic.to_ascii_uppercase()),
                line.span,
            )),
        }
    }

    fn encode(
        &self,
        resolution: &Resolution<AddressMode, ()>,
        _line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<u8>, AsmError> {
        let entry = resolution.entry;
        let mut bytes = entry.opcode.to_vec();
        let next_pc = ctx.program_counter() + i64::from(entry.size);
        for op in &resolution.operands {
            match op.mode {
                AddressMode::Implied | AddressMode::Accumulator => {}
                AddressMode::Immediate => {
                    let value = check_range(op.value, -128..=0xFF, op.span)?;
                    bytes.push(value as u8);
                }
                AddressMode::ZeroPage
                | AddressMode::ZeroPageX
                | AddressMode::ZeroPageY
                | AddressMode::IndexedIndirectX
                | AddressMode::IndirectIndexedY
                | AddressMode::ZeroPageIndirect => {
                    let value = check_range(op.value, ZERO_PAGE, op.span)?;
                    bytes.push(value as u8);
                }
                AddressMode::Absolute
                | AddressMode::AbsoluteX
                | AddressMode::AbsoluteY
                | AddressMode::Indirect
                | AddressMode::AbsoluteIndexedIndirect => {
                    let value = check_range(op.value, 0..=0xFFFF, op.span)?;
                    bytes.extend_from_slice(&word_bytes(value, false));
                }
                AddressMode::Relative => {
                    let offset = relative_offset(ctx, op.value, next_pc, -128..=127, op.span);
                    bytes.push(offset as u8);
                }
            }
        }
        Ok(bytes)
    }
}
