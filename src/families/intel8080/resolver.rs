// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand classification and encoding for the Z80 and 8080.
//!
//! Parentheses always mean memory on this family, so there is no loose
//! indirect: `(5)` is an address, `5` an immediate.

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::cpu::CpuKind;
use crate::core::family::{
    check_range, operand_value, relative_offset, word_bytes, AssemblerContext, InstructionEntry,
    InstructionLine, ModeResolver, Operand, Resolution,
};
use crate::core::parser::{BinaryOp, Expr};
use crate::core::tokenizer::Span;
use crate::families::intel8080::table::{base_table, is_index_bit_opcode, z80_table};
use crate::families::intel8080::{is_register, Condition, Register, Z80Mode};

type Op = Operand<Z80Mode, ()>;

const INTERRUPT_MODES: [u8; 3] = [0x46, 0x56, 0x5E];

#[derive(Debug, Clone)]
pub struct Intel8080Resolver {
    cpu: CpuKind,
    tables: Vec<&'static [InstructionEntry<Z80Mode>]>,
}

impl Intel8080Resolver {
    pub fn new(cpu: CpuKind) -> Self {
        let tables = match cpu {
            CpuKind::Z80 => vec![base_table(), z80_table()],
            _ => vec![base_table()],
        };
        Self { cpu, tables }
    }

    fn takes_condition(mnemonic: &str, operand_count: usize) -> bool {
        match mnemonic.to_ascii_uppercase().as_str() {
            "JP" | "JR" | "CALL" => operand_count == 2,
            "RET" => operand_count == 1,
            _ => false,
        }
    }

    fn classify_operand(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
        expr: &Expr,
        slot: usize,
    ) -> Result<Op, AsmError> {
        let upper = line.mnemonic.to_ascii_uppercase();
        let count = line.operands.len();
        let span = expr.span();

        if slot == 0 && Self::takes_condition(&upper, count) {
            let name = match expr {
                Expr::Identifier(name, _) | Expr::Register(name, _) => Some(name.as_str()),
                _ => None,
            };
            if let Some(cond) = name.and_then(Condition::parse) {
                return Ok(Op::new(Z80Mode::Cond(cond), span));
            }
        }

        match expr {
            Expr::Register(name, _) => {
                let reg = Register::parse(name).ok_or_else(|| unknown_register(name, span))?;
                Ok(Op::new(Z80Mode::Reg(reg), span))
            }
            Expr::Indirect(inner, span) => self.classify_memory(&upper, ctx, inner, *span),
            Expr::Immediate(inner, span) => {
                let value = operand_value(ctx, inner, None)?;
                Ok(Op::new(Z80Mode::Imm8, *span).with_value(value))
            }
            Expr::Empty(span) => Err(AsmError::at(AsmErrorKind::Syntax, "Missing operand", *span)),
            other => {
                let value = operand_value(ctx, other, None)?;
                let mode = match upper.as_str() {
                    "JR" | "DJNZ" if slot + 1 == count => Z80Mode::Relative,
                    "BIT" | "SET" | "RES" if slot == 0 => Z80Mode::BitNumber,
                    "RST" => Z80Mode::RestartVector,
                    "IM" => Z80Mode::InterruptMode,
                    _ => Z80Mode::Imm8,
                };
                Ok(Op::new(mode, span).with_value(value))
            }
        }
    }

    fn classify_memory(
        &self,
        mnemonic: &str,
        ctx: &mut dyn AssemblerContext,
        inner: &Expr,
        span: Span,
    ) -> Result<Op, AsmError> {
        match inner {
            Expr::Register(name, reg_span) => {
                let reg = Register::parse(name).ok_or_else(|| unknown_register(name, *reg_span))?;
                if reg.is_index() && mnemonic != "JP" {
                    return Ok(Op::new(Z80Mode::Indexed(reg), span).with_value(Some(0)));
                }
                Ok(Op::new(Z80Mode::Ind(reg), span))
            }
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Subtract),
                left,
                right,
                ..
            } if matches!(left.as_ref(), Expr::Register(..)) => {
                let reg = match left.as_ref() {
                    Expr::Register(name, reg_span) => Register::parse(name)
                        .filter(|r| r.is_index())
                        .ok_or_else(|| {
                            AsmError::at(
                                AsmErrorKind::ModeNotSupported,
                                format!(
                                    "Only IX and IY take a displacement, not {}",
                                    name.to_ascii_uppercase()
                                ),
                                *reg_span,
                            )
                        })?,
                    _ => return Err(unknown_register("?", span)),
                };
                let offset = operand_value(ctx, right, None)?;
                let offset = match op {
                    BinaryOp::Subtract => offset.map(|v| -v),
                    _ => offset,
                };
                Ok(Op::new(Z80Mode::Indexed(reg), span).with_value(offset))
            }
            address => {
                let value = operand_value(ctx, address, None)?;
                Ok(Op::new(Z80Mode::Addr8, span).with_value(value))
            }
        }
    }
}

fn unknown_register(name: &str, span: Span) -> AsmError {
    AsmError::at(
        AsmErrorKind::Syntax,
        format!("Unknown register: {}", name.to_ascii_uppercase()),
        span,
    )
}

impl ModeResolver for Intel8080Resolver {
    type Mode = Z80Mode;
    type Detail = ();

    fn cpu(&self) -> CpuKind {
        self.cpu
    }

    fn is_register(&self, name: &str) -> bool {
        is_register(name)
    }

    fn tables(&self) -> &[&'static [InstructionEntry<Z80Mode>]] {
        &self.tables
    }

    fn classify(
        &self,
        line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<Op>, AsmError> {
        line.operands
            .iter()
            .enumerate()
            .map(|(slot, expr)| self.classify_operand(line, ctx, expr, slot))
            .collect()
    }

    fn encode(
        &self,
        resolution: &Resolution<Z80Mode, ()>,
        _line: &InstructionLine<'_>,
        ctx: &mut dyn AssemblerContext,
    ) -> Result<Vec<u8>, AsmError> {
        let entry = resolution.entry;
        let (mut bytes, tail) = if is_index_bit_opcode(entry.opcode) {
            (entry.opcode[..2].to_vec(), Some(entry.opcode[2]))
        } else {
            (entry.opcode.to_vec(), None)
        };
        let mut fold = 0u8;
        let next_pc = ctx.program_counter() + i64::from(entry.size);

        for op in &resolution.operands {
            match op.mode {
                Z80Mode::Imm8 => {
                    bytes.push(check_range(op.value, -128..=0xFF, op.span)? as u8);
                }
                Z80Mode::Addr8 => {
                    bytes.push(check_range(op.value, 0..=0xFF, op.span)? as u8);
                }
                Z80Mode::Imm16 => {
                    let value = check_range(op.value, -0x8000..=0xFFFF, op.span)?;
                    bytes.extend_from_slice(&word_bytes(value, false));
                }
                Z80Mode::Addr16 => {
                    let value = check_range(op.value, 0..=0xFFFF, op.span)?;
                    bytes.extend_from_slice(&word_bytes(value, false));
                }
                Z80Mode::Indexed(_) => {
                    bytes.push(check_range(op.value, -128..=127, op.span)? as u8);
                }
                Z80Mode::Relative => {
                    let offset = relative_offset(ctx, op.value, next_pc, -128..=127, op.span);
                    bytes.push(offset as u8);
                }
                Z80Mode::BitNumber => {
                    fold |= (check_range(op.value, 0..=7, op.span)? as u8) << 3;
                }
                Z80Mode::RestartVector => {
                    let vector = check_range(op.value, 0..=0x38, op.span)?;
                    if vector % 8 != 0 {
                        return Err(AsmError::at(
                            AsmErrorKind::IllegalQuantity,
                            format!("Illegal restart vector: {vector}"),
                            op.span,
                        ));
                    }
                    fold |= vector as u8;
                }
                Z80Mode::InterruptMode => {
                    let mode = check_range(op.value, 0..=2, op.span)?;
                    if let Some(last) = bytes.last_mut() {
                        *last = INTERRUPT_MODES[mode as usize];
                    }
                }
                Z80Mode::None | Z80Mode::Reg(_) | Z80Mode::Cond(_) | Z80Mode::Ind(_) => {}
            }
        }

        match tail {
            Some(op) => bytes.push(op | fold),
            None if fold != 0 => {
                if let Some(last) = bytes.last_mut() {
                    *last |= fold;
                }
            }
            None => {}
        }
        Ok(bytes)
    }
}
