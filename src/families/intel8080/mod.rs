// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Intel 8080 CPU family.
//!
//! Covers the Z80 and the 8080. Both are written in Zilog mnemonics; the
//! 8080 accepts the subset without prefix bytes or relative jumps.
//!
//! # Family Characteristics
//!
//! - 8-bit data bus, 16-bit address bus, little endian
//! - Registers: A, B, C, D, E, H, L (8-bit), BC, DE, HL, SP, AF (16-bit)
//! - Z80: I, R, IX, IY and the shadow set (`AF'`, `EXX`)
//! - Condition codes: NZ, Z, NC, C, PO, PE, P, M
//!
//! # Table Architecture
//!
//! 1. **Base table**: 8080 opcodes
//! 2. **Z80 table**: CB, ED, DD, FD and DDCB/FDCB pages plus JR/DJNZ/EXX

mod operand;
mod resolver;
pub mod table;

pub use operand::{Condition, Register, Z80Mode};
pub use resolver::Intel8080Resolver;

/// Check if an identifier is a register name for the Intel 8080 family.
pub fn is_register(name: &str) -> bool {
    Register::parse(name).is_some()
}

/// Check if an identifier is a condition code for the Intel 8080 family.
pub fn is_condition(name: &str) -> bool {
    Condition::parse(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_register() {
        assert!(is_register("A"));
        assert!(is_register("hl"));
        assert!(is_register("IX"));
        assert!(is_register("AF'"));
        assert!(is_register("i"));
        assert!(!is_register("M"));
        assert!(!is_register("NZ"));
        assert!(!is_register("LD"));
    }

    #[test]
    fn test_is_condition() {
        for name in ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M", "nz"] {
            assert!(is_condition(name), "{name}");
        }
        assert!(!is_condition("EQ"));
        assert!(!is_condition("HL"));
    }
}
