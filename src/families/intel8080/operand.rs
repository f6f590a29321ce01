// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Registers, condition codes and addressing modes for the Intel 8080 family.
//!
//! Register operands are part of the mode, so table rows name the exact
//! register (`LD A,B` and `LD A,C` are separate rows).

use crate::core::family::OperandMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    I,
    R,
    BC,
    DE,
    HL,
    SP,
    AF,
    /// The shadow pair, written `AF'`.
    AfAlt,
    IX,
    IY,
}

impl Register {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "A" => Register::A,
            "B" => Register::B,
            "C" => Register::C,
            "D" => Register::D,
            "E" => Register::E,
            "H" => Register::H,
            "L" => Register::L,
            "I" => Register::I,
            "R" => Register::R,
            "BC" => Register::BC,
            "DE" => Register::DE,
            "HL" => Register::HL,
            "SP" => Register::SP,
            "AF" => Register::AF,
            "AF'" => Register::AfAlt,
            "IX" => Register::IX,
            "IY" => Register::IY,
            _ => return None,
        })
    }

    /// Register field value: `r` for 8-bit registers, `p` for pairs.
    pub const fn code(self) -> u8 {
        match self {
            Register::B | Register::BC => 0,
            Register::C | Register::DE => 1,
            Register::D | Register::HL | Register::IX | Register::IY => 2,
            Register::E | Register::SP | Register::AF => 3,
            Register::H => 4,
            Register::L => 5,
            Register::A => 7,
            Register::I | Register::R | Register::AfAlt => 0,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, Register::IX | Register::IY)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
    PO,
    PE,
    P,
    M,
}

impl Condition {
    pub const ALL: [Condition; 8] = [
        Condition::NZ,
        Condition::Z,
        Condition::NC,
        Condition::C,
        Condition::PO,
        Condition::PE,
        Condition::P,
        Condition::M,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "NZ" => Condition::NZ,
            "Z" => Condition::Z,
            "NC" => Condition::NC,
            "C" => Condition::C,
            "PO" => Condition::PO,
            "PE" => Condition::PE,
            "P" => Condition::P,
            "M" => Condition::M,
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Z80Mode {
    None,
    Reg(Register),
    Cond(Condition),
    /// `n`; promoted to `Imm16` when no 8-bit form exists.
    Imm8,
    Imm16,
    /// `(n)` port address.
    Addr8,
    /// `(nn)` memory address.
    Addr16,
    /// `(HL)`, `(BC)`, `(DE)`, `(SP)`, `(C)`, and `(IX)` for `JP`.
    Ind(Register),
    /// `(IX+d)` / `(IY+d)`
    Indexed(Register),
    Relative,
    /// Folded into the opcode: bit number, restart vector, interrupt mode.
    BitNumber,
    RestartVector,
    InterruptMode,
}

impl Z80Mode {
    pub const fn operand_size(self) -> u8 {
        match self {
            Z80Mode::Imm8 | Z80Mode::Addr8 | Z80Mode::Indexed(_) | Z80Mode::Relative => 1,
            Z80Mode::Imm16 | Z80Mode::Addr16 => 2,
            _ => 0,
        }
    }
}

impl OperandMode for Z80Mode {
    const NONE: Self = Z80Mode::None;

    fn promoted(self) -> Option<Self> {
        match self {
            Z80Mode::Imm8 => Some(Z80Mode::Imm16),
            Z80Mode::Addr8 => Some(Z80Mode::Addr16),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_parse_case_insensitively() {
        assert_eq!(Register::parse("hl"), Some(Register::HL));
        assert_eq!(Register::parse("af'"), Some(Register::AfAlt));
        assert_eq!(Register::parse("IXH"), None);
        assert_eq!(Register::A.code(), 7);
        assert_eq!(Register::SP.code(), 3);
    }

    #[test]
    fn condition_codes_follow_encoding_order() {
        assert_eq!(Condition::parse("pe").map(Condition::code), Some(5));
        assert_eq!(Condition::M.code(), 7);
        assert_eq!(Condition::parse("EQ"), None);
    }

    #[test]
    fn only_immediates_and_addresses_promote() {
        assert_eq!(Z80Mode::Imm8.promoted(), Some(Z80Mode::Imm16));
        assert_eq!(Z80Mode::Addr8.promoted(), Some(Z80Mode::Addr16));
        assert_eq!(Z80Mode::Indexed(Register::IX).promoted(), None);
    }
}
