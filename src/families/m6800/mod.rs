// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Motorola 6800 family (6800 and 6809).
//!
//! # Family Characteristics
//!
//! - 8-bit data bus, 16-bit address bus, big endian
//! - 6800 registers: A, B, X, SP, CC
//! - 6809 registers: A, B (D = A:B), X, Y, U, S, PC, CC, DP
//! - 6809 opcode pages: plain, `$10` and `$11`
//!
//! # Addressing Modes
//!
//! | Syntax | Mode |
//! |--------|------|
//! | `#$20` | Immediate |
//! | `$20`, `<$20` | Direct |
//! | `$1234`, `>$20` | Extended |
//! | `,X` `5,X` `A,X` `,X+` `,--X` | Indexed |
//! | `label,PCR` | Indexed, program counter relative |
//! | `[5,X]`, `[$1234]` | Indexed indirect |
//!
//! The 6800 only has `n,X` and `,X`, with an unsigned offset byte.

mod operand;
mod resolver;
mod table;

pub use operand::{index_base_code, stack_mask, transfer_code, AddressMode, IndexDetail};
pub use resolver::M6800Resolver;
pub use table::{branch_kind, m6800_table, m6809_table};

pub fn is_register(name: &str) -> bool {
    matches!(
        name.to_ascii_uppercase().as_str(),
        "A" | "B" | "CC" | "DP" | "D" | "X" | "Y" | "U" | "S" | "PC" | "PCR"
    )
}

/// Operand registers of the 6800; only `X` appears in operands, the
/// accumulators are part of the mnemonic.
pub fn is_m6800_register(name: &str) -> bool {
    name.eq_ignore_ascii_case("X")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers() {
        assert!(is_register("pcr"));
        assert!(is_register("DP"));
        assert!(!is_register("W"));
        assert!(!is_register("LDA"));
        assert!(is_m6800_register("x"));
        assert!(!is_m6800_register("Y"));
    }
}
