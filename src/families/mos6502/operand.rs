// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Addressing modes for the MOS 6502 family.
//!
//! The enum covers every mode of every CPU in the family. Which ones a CPU
//! accepts is decided by the tables it is given, not by the enum.

use crate::core::family::OperandMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    /// No operand (NOP, RTS, BRK, etc.)
    Implied,
    /// Accumulator (ASL A, ROL A, etc.)
    Accumulator,
    /// #$nn - 8-bit immediate value
    Immediate,
    /// $nn - Zero page (8-bit address)
    ZeroPage,
    /// $nn,X - Zero page indexed by X
    ZeroPageX,
    /// $nn,Y - Zero page indexed by Y
    ZeroPageY,
    /// $nnnn - Absolute (16-bit address)
    Absolute,
    /// $nnnn,X - Absolute indexed by X
    AbsoluteX,
    /// $nnnn,Y - Absolute indexed by Y
    AbsoluteY,
    /// ($nnnn) - Indirect (JMP only on base 6502)
    Indirect,
    /// ($nn,X) - Indexed indirect (zero page)
    IndexedIndirectX,
    /// ($nn),Y - Indirect indexed (zero page)
    IndirectIndexedY,
    /// Relative branch offset (8-bit signed)
    Relative,

    // 65C02 extensions
    /// ($nn) - Zero page indirect (65C02 only)
    ZeroPageIndirect,
    /// ($nnnn,X) - Absolute indexed indirect (65C02 only, JMP)
    AbsoluteIndexedIndirect,
}

impl AddressMode {
    /// Get the number of operand bytes for this mode.
    pub const fn operand_size(self) -> u8 {
        match self {
            AddressMode::Implied | AddressMode::Accumulator => 0,
            AddressMode::Immediate
            | AddressMode::ZeroPage
            | AddressMode::ZeroPageX
            | AddressMode::ZeroPageY
            | AddressMode::IndexedIndirectX
            | AddressMode::IndirectIndexedY
            | AddressMode::Relative
            | AddressMode::ZeroPageIndirect => 1,
            AddressMode::Absolute
            | AddressMode::AbsoluteX
            | AddressMode::AbsoluteY
            | AddressMode::Indirect
            | AddressMode::AbsoluteIndexedIndirect => 2,
        }
    }
}

impl OperandMode for AddressMode {
    const NONE: Self = AddressMode::Implied;

    fn promoted(self) -> Option<Self> {
        match self {
            AddressMode::ZeroPage => Some(AddressMode::Absolute),
            AddressMode::ZeroPageX => Some(AddressMode::AbsoluteX),
            AddressMode::ZeroPageY => Some(AddressMode::AbsoluteY),
            AddressMode::ZeroPageIndirect => Some(AddressMode::Indirect),
            AddressMode::IndexedIndirectX => Some(AddressMode::AbsoluteIndexedIndirect),
            _ => None,
        }
    }

    fn without_indirect(self) -> Option<Self> {
        match self {
            AddressMode::ZeroPageIndirect => Some(AddressMode::ZeroPage),
            AddressMode::Indirect => Some(AddressMode::Absolute),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_modes_promote_to_absolute() {
        assert_eq!(AddressMode::ZeroPageY.promoted(), Some(AddressMode::AbsoluteY));
        assert_eq!(AddressMode::Absolute.promoted(), None);
        assert_eq!(
            AddressMode::ZeroPageIndirect.without_indirect(),
            Some(AddressMode::ZeroPage)
        );
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(AddressMode::Implied.operand_size(), 0);
        assert_eq!(AddressMode::Relative.operand_size(), 1);
        assert_eq!(AddressMode::AbsoluteIndexedIndirect.operand_size(), 2);
    }
}
