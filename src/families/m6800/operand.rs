// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand types for the Motorola 6800 family (6800 and 6809).

use crate::core::family::OperandMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Inherent,
    Immediate8,
    Immediate16,
    Direct,
    Extended,
    /// Postbyte addressing; offset bytes are carried in [`IndexDetail`].
    Indexed,
    /// 6800 `n,X`: an unsigned offset byte, no postbyte.
    IndexedOffset,
    Relative8,
    Relative16,
    /// `TFR`/`EXG` source and destination folded into one postbyte.
    RegisterPair,
    /// `PSHS`/`PULS`/`PSHU`/`PULU` register mask.
    RegisterList,
}

impl AddressMode {
    /// Bytes after the opcode, not counting indexed offsets.
    pub const fn operand_size(self) -> u8 {
        match self {
            AddressMode::Inherent => 0,
            AddressMode::Immediate8
            | AddressMode::Direct
            | AddressMode::Indexed
            | AddressMode::IndexedOffset
            | AddressMode::Relative8
            | AddressMode::RegisterPair
            | AddressMode::RegisterList => 1,
            AddressMode::Immediate16 | AddressMode::Extended | AddressMode::Relative16 => 2,
        }
    }
}

impl OperandMode for AddressMode {
    const NONE: Self = AddressMode::Inherent;

    fn promoted(self) -> Option<Self> {
        match self {
            AddressMode::Immediate8 => Some(AddressMode::Immediate16),
            AddressMode::Direct => Some(AddressMode::Extended),
            _ => None,
        }
    }
}

/// Indexed postbyte and the offset that follows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexDetail {
    pub postbyte: u8,
    /// Offset bytes after the postbyte: 0, 1 or 2.
    pub extra: u8,
    /// Offset is a target address, encoded relative to the next instruction.
    pub pc_relative: bool,
}

/// Index base register field (`RR` in `1RRxxxxx`).
pub fn index_base_code(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "X" => Some(0b00),
        "Y" => Some(0b01),
        "U" => Some(0b10),
        "S" => Some(0b11),
        _ => None,
    }
}

/// `TFR`/`EXG` register nibble.
pub fn transfer_code(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "D" => Some(0x0),
        "X" => Some(0x1),
        "Y" => Some(0x2),
        "U" => Some(0x3),
        "S" => Some(0x4),
        "PC" => Some(0x5),
        "A" => Some(0x8),
        "B" => Some(0x9),
        "CC" => Some(0xA),
        "DP" => Some(0xB),
        _ => None,
    }
}

/// `PSHS`/`PULS` mask bit. `U` and `S` share bit 6; which one is legal
/// depends on the stack being used.
pub fn stack_mask(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "CC" => Some(0x01),
        "A" => Some(0x02),
        "B" => Some(0x04),
        "D" => Some(0x06),
        "DP" => Some(0x08),
        "X" => Some(0x10),
        "Y" => Some(0x20),
        "U" | "S" => Some(0x40),
        "PC" => Some(0x80),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_codes_split_by_width() {
        assert_eq!(transfer_code("d"), Some(0));
        assert_eq!(transfer_code("DP"), Some(0xB));
        assert_eq!(transfer_code("PCR"), None);
    }

    #[test]
    fn stack_masks() {
        assert_eq!(stack_mask("D"), Some(0x06));
        assert_eq!(stack_mask("pc"), Some(0x80));
        assert_eq!(stack_mask("Z"), None);
    }

    #[test]
    fn direct_promotes_to_extended() {
        assert_eq!(AddressMode::Direct.promoted(), Some(AddressMode::Extended));
        assert_eq!(AddressMode::Indexed.promoted(), None);
    }
}
