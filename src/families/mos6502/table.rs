// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction tables for the MOS 6502 family.
//!
//! [`BASE_TABLE`] holds the documented NMOS 6502 set. [`CMOS_TABLE`] adds the
//! 65C02 instructions and modes; the 65C02 resolver searches both.

use crate::core::family::InstructionEntry;
use crate::families::mos6502::AddressMode;

type Entry = InstructionEntry<AddressMode>;

macro_rules! op {
    ($m:literal, $first:ident, $second:ident, $code:literal) => {
        InstructionEntry::new(
            $m,
            [AddressMode::$first, AddressMode::$second, AddressMode::Implied],
            &[$code],
            1 + AddressMode::$first.operand_size() + AddressMode::$second.operand_size(),
        )
    };
    ($m:literal, $mode:ident, $code:literal) => {
        InstructionEntry::new(
            $m,
            [AddressMode::$mode, AddressMode::Implied, AddressMode::Implied],
            &[$code],
            1 + AddressMode::$mode.operand_size(),
        )
    };
    ($m:literal, $code:literal) => {
        op!($m, Implied, $code)
    };
}

pub static BASE_TABLE: &[Entry] = &[
    // ADC - Add with Carry
    op!("ADC", Immediate, 0x69),
    op!("ADC", ZeroPage, 0x65),
    op!("ADC", ZeroPageX, 0x75),
    op!("ADC", Absolute, 0x6D),
    op!("ADC", AbsoluteX, 0x7D),
    op!("ADC", AbsoluteY, 0x79),
    op!("ADC", IndexedIndirectX, 0x61),
    op!("ADC", IndirectIndexedY, 0x71),
    // AND - Logical AND
    op!("AND", Immediate, 0x29),
    op!("AND", ZeroPage, 0x25),
    op!("AND", ZeroPageX, 0x35),
    op!("AND", Absolute, 0x2D),
    op!("AND", AbsoluteX, 0x3D),
    op!("AND", AbsoluteY, 0x39),
    op!("AND", IndexedIndirectX, 0x21),
    op!("AND", IndirectIndexedY, 0x31),
    // ASL - Arithmetic Shift Left
    op!("ASL", 0x0A),
    op!("ASL", Accumulator, 0x0A),
    op!("ASL", ZeroPage, 0x06),
    op!("ASL", ZeroPageX, 0x16),
    op!("ASL", Absolute, 0x0E),
    op!("ASL", AbsoluteX, 0x1E),
    // Branches
    op!("BCC", Relative, 0x90),
    op!("BCS", Relative, 0xB0),
    op!("BEQ", Relative, 0xF0),
    op!("BMI", Relative, 0x30),
    op!("BNE", Relative, 0xD0),
    op!("BPL", Relative, 0x10),
    op!("BVC", Relative, 0x50),
    op!("BVS", Relative, 0x70),
    // BIT - Bit Test
    op!("BIT", ZeroPage, 0x24),
    op!("BIT", Absolute, 0x2C),
    op!("BRK", 0x00),
    // Flag operations
    op!("CLC", 0x18),
    op!("CLD", 0xD8),
    op!("CLI", 0x58),
    op!("CLV", 0xB8),
    op!("SEC", 0x38),
    op!("SED", 0xF8),
    op!("SEI", 0x78),
    // CMP - Compare Accumulator
    op!("CMP", Immediate, 0xC9),
    op!("CMP", ZeroPage, 0xC5),
    op!("CMP", ZeroPageX, 0xD5),
    op!("CMP", Absolute, 0xCD),
    op!("CMP", AbsoluteX, 0xDD),
    op!("CMP", AbsoluteY, 0xD9),
    op!("CMP", IndexedIndirectX, 0xC1),
    op!("CMP", IndirectIndexedY, 0xD1),
    // CPX / CPY - Compare Index
    op!("CPX", Immediate, 0xE0),
    op!("CPX", ZeroPage, 0xE4),
    op!("CPX", Absolute, 0xEC),
    op!("CPY", Immediate, 0xC0),
    op!("CPY", ZeroPage, 0xC4),
    op!("CPY", Absolute, 0xCC),
    // DEC / INC - Memory
    op!("DEC", ZeroPage, 0xC6),
    op!("DEC", ZeroPageX, 0xD6),
    op!("DEC", Absolute, 0xCE),
    op!("DEC", AbsoluteX, 0xDE),
    op!("INC", ZeroPage, 0xE6),
    op!("INC", ZeroPageX, 0xF6),
    op!("INC", Absolute, 0xEE),
    op!("INC", AbsoluteX, 0xFE),
    // Index register increments
    op!("DEX", 0xCA),
    op!("DEY", 0x88),
    op!("INX", 0xE8),
    op!("INY", 0xC8),
    // EOR - Exclusive OR
    op!("EOR", Immediate, 0x49),
    op!("EOR", ZeroPage, 0x45),
    op!("EOR", ZeroPageX, 0x55),
    op!("EOR", Absolute, 0x4D),
    op!("EOR", AbsoluteX, 0x5D),
    op!("EOR", AbsoluteY, 0x59),
    op!("EOR", IndexedIndirectX, 0x41),
    op!("EOR", IndirectIndexedY, 0x51),
    // Jumps
    op!("JMP", Absolute, 0x4C),
    op!("JMP", Indirect, 0x6C),
    op!("JSR", Absolute, 0x20),
    // LDA - Load Accumulator
    op!("LDA", Immediate, 0xA9),
    op!("LDA", ZeroPage, 0xA5),
    op!("LDA", ZeroPageX, 0xB5),
    op!("LDA", Absolute, 0xAD),
    op!("LDA", AbsoluteX, 0xBD),
    op!("LDA", AbsoluteY, 0xB9),
    op!("LDA", IndexedIndirectX, 0xA1),
    op!("LDA", IndirectIndexedY, 0xB1),
    // LDX / LDY
    op!("LDX", Immediate, 0xA2),
    op!("LDX", ZeroPage, 0xA6),
    op!("LDX", ZeroPageY, 0xB6),
    op!("LDX", Absolute, 0xAE),
    op!("LDX", AbsoluteY, 0xBE),
    op!("LDY", Immediate, 0xA0),
    op!("LDY", ZeroPage, 0xA4),
    op!("LDY", ZeroPageX, 0xB4),
    op!("LDY", Absolute, 0xAC),
    op!("LDY", AbsoluteX, 0xBC),
    // LSR - Logical Shift Right
    op!("LSR", 0x4A),
    op!("LSR", Accumulator, 0x4A),
    op!("LSR", ZeroPage, 0x46),
    op!("LSR", ZeroPageX, 0x56),
    op!("LSR", Absolute, 0x4E),
    op!("LSR", AbsoluteX, 0x5E),
    op!("NOP", 0xEA),
    // ORA - Logical Inclusive OR
    op!("ORA", Immediate, 0x09),
    op!("ORA", ZeroPage, 0x05),
    op!("ORA", ZeroPageX, 0x15),
    op!("ORA", Absolute, 0x0D),
    op!("ORA", AbsoluteX, 0x1D),
    op!("ORA", AbsoluteY, 0x19),
    op!("ORA", IndexedIndirectX, 0x01),
    op!("ORA", IndirectIndexedY, 0x11),
    // Stack
    op!("PHA", 0x48),
    op!("PHP", 0x08),
    op!("PLA", 0x68),
    op!("PLP", 0x28),
    // ROL / ROR - Rotate
    op!("ROL", 0x2A),
    op!("ROL", Accumulator, 0x2A),
    op!("ROL", ZeroPage, 0x26),
    op!("ROL", ZeroPageX, 0x36),
    op!("ROL", Absolute, 0x2E),
    op!("ROL", AbsoluteX, 0x3E),
    op!("ROR", 0x6A),
    op!("ROR", Accumulator, 0x6A),
    op!("ROR", ZeroPage, 0x66),
    op!("ROR", ZeroPageX, 0x76),
    op!("ROR", Absolute, 0x6E),
    op!("ROR", AbsoluteX, 0x7E),
    op!("RTI", 0x40),
    op!("RTS", 0x60),
    // SBC - Subtract with Carry
    op!("SBC", Immediate, 0xE9),
    op!("SBC", ZeroPage, 0xE5),
    op!("SBC", ZeroPageX, 0xF5),
    op!("SBC", Absolute, 0xED),
    op!("SBC", AbsoluteX, 0xFD),
    op!("SBC", AbsoluteY, 0xF9),
    op!("SBC", IndexedIndirectX, 0xE1),
    op!("SBC", IndirectIndexedY, 0xF1),
    // STA / STX / STY - Store
    op!("STA", ZeroPage, 0x85),
    op!("STA", ZeroPageX, 0x95),
    op!("STA", Absolute, 0x8D),
    op!("STA", AbsoluteX, 0x9D),
    op!("STA", AbsoluteY, 0x99),
    op!("STA", IndexedIndirectX, 0x81),
    op!("STA", IndirectIndexedY, 0x91),
    op!("STX", ZeroPage, 0x86),
    op!("STX", ZeroPageY, 0x96),
    op!("STX", Absolute, 0x8E),
    op!("STY", ZeroPage, 0x84),
    op!("STY", ZeroPageX, 0x94),
    op!("STY", Absolute, 0x8C),
    // Transfers
    op!("TAX", 0xAA),
    op!("TAY", 0xA8),
    op!("TSX", 0xBA),
    op!("TXA", 0x8A),
    op!("TXS", 0x9A),
    op!("TYA", 0x98),
];

pub static CMOS_TABLE: &[Entry] = &[
    // (zp) forms of the accumulator group
    op!("ADC", ZeroPageIndirect, 0x72),
    op!("AND", ZeroPageIndirect, 0x32),
    op!("CMP", ZeroPageIndirect, 0xD2),
    op!("EOR", ZeroPageIndirect, 0x52),
    op!("LDA", ZeroPageIndirect, 0xB2),
    op!("ORA", ZeroPageIndirect, 0x12),
    op!("SBC", ZeroPageIndirect, 0xF2),
    op!("STA", ZeroPageIndirect, 0x92),
    // BIT extra modes
    op!("BIT", Immediate, 0x89),
    op!("BIT", ZeroPageX, 0x34),
    op!("BIT", AbsoluteX, 0x3C),
    op!("BRA", Relative, 0x80),
    // Accumulator increment / decrement
    op!("DEC", 0x3A),
    op!("DEC", Accumulator, 0x3A),
    op!("INC", 0x1A),
    op!("INC", Accumulator, 0x1A),
    op!("JMP", AbsoluteIndexedIndirect, 0x7C),
    // Index register stack operations
    op!("PHX", 0xDA),
    op!("PHY", 0x5A),
    op!("PLX", 0xFA),
    op!("PLY", 0x7A),
    // STZ - Store Zero
    op!("STZ", ZeroPage, 0x64),
    op!("STZ", ZeroPageX, 0x74),
    op!("STZ", Absolute, 0x9C),
    op!("STZ", AbsoluteX, 0x9E),
    // TRB / TSB - Test and Reset/Set Bits
    op!("TRB", ZeroPage, 0x14),
    op!("TRB", Absolute, 0x1C),
    op!("TSB", ZeroPage, 0x04),
    op!("TSB", Absolute, 0x0C),
    // RMB / SMB - Reset/Set Memory Bit
    op!("RMB0", ZeroPage, 0x07),
    op!("RMB1", ZeroPage, 0x17),
    op!("RMB2", ZeroPage, 0x27),
    op!("RMB3", ZeroPage, 0x37),
    op!("RMB4", ZeroPage, 0x47),
    op!("RMB5", ZeroPage, 0x57),
    op!("RMB6", ZeroPage, 0x67),
    op!("RMB7", ZeroPage, 0x77),
    op!("SMB0", ZeroPage, 0x87),
    op!("SMB1", ZeroPage, 0x97),
    op!("SMB2", ZeroPage, 0xA7),
    op!("SMB3", ZeroPage, 0xB7),
    op!("SMB4", ZeroPage, 0xC7),
    op!("SMB5", ZeroPage, 0xD7),
    op!("SMB6", ZeroPage, 0xE7),
    op!("SMB7", ZeroPage, 0xF7),
    // BBR / BBS - Branch on Bit Reset/Set
    op!("BBR0", ZeroPage, Relative, 0x0F),
    op!("BBR1", ZeroPage, Relative, 0x1F),
    op!("BBR2", ZeroPage, Relative, 0x2F),
    op!("BBR3", ZeroPage, Relative, 0x3F),
    op!("BBR4", ZeroPage, Relative, 0x4F),
    op!("BBR5", ZeroPage, Relative, 0x5F),
    op!("BBR6", ZeroPage, Relative, 0x6F),
    op!("BBR7", ZeroPage, Relative, 0x7F),
    op!("BBS0", ZeroPage, Relative, 0x8F),
    op!("BBS1", ZeroPage, Relative, 0x9F),
    op!("BBS2", ZeroPage, Relative, 0xAF),
    op!("BBS3", ZeroPage, Relative, 0xBF),
    op!("BBS4", ZeroPage, Relative, 0xCF),
    op!("BBS5", ZeroPage, Relative, 0xDF),
    op!("BBS6", ZeroPage, Relative, 0xEF),
    op!("BBS7", ZeroPage, Relative, 0xFF),
    op!("WAI", 0xCB),
    op!("STP", 0xDB),
];

/// Check if a mnemonic exists in a table (any mode).
pub fn has_mnemonic(table: &[Entry], mnemonic: &str) -> bool {
    table.iter().any(|e| e.mnemonic.eq_ignore_ascii_case(mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::family::{lookup_modes, OperandMode};

    fn lookup(tables: &[&'static [Entry]], mnemonic: &str, mode: AddressMode) -> Option<u8> {
        lookup_modes(
            tables,
            mnemonic,
            [mode, AddressMode::NONE, AddressMode::NONE],
            [false; 3],
        )
        .map(|(entry, _)| entry.opcode[0])
    }

    #[test]
    fn lookup_lda_immediate() {
        assert_eq!(lookup(&[BASE_TABLE], "LDA", AddressMode::Immediate), Some(0xA9));
    }

    #[test]
    fn lookup_jmp_indirect() {
        assert_eq!(lookup(&[BASE_TABLE], "jmp", AddressMode::Indirect), Some(0x6C));
    }

    #[test]
    fn sizes_follow_modes() {
        let entry = BASE_TABLE
            .iter()
            .find(|e| e.mnemonic == "STA" && e.modes[0] == AddressMode::Absolute)
            .unwrap();
        assert_eq!(entry.size, 3);
        let bbr = CMOS_TABLE.iter().find(|e| e.mnemonic == "BBR3").unwrap();
        assert_eq!(bbr.size, 3);
    }

    #[test]
    fn has_mnemonic_test() {
        assert!(has_mnemonic(BASE_TABLE, "LDA"));
        assert!(has_mnemonic(BASE_TABLE, "lda"));
        assert!(!has_mnemonic(BASE_TABLE, "BRA")); // 65C02 only
        assert!(has_mnemonic(CMOS_TABLE, "BRA"));
        assert!(!has_mnemonic(BASE_TABLE, "XXX"));
    }

    #[test]
    fn cmos_zero_page_indirect_only_with_extension() {
        assert_eq!(lookup(&[BASE_TABLE], "LDA", AddressMode::ZeroPageIndirect), None);
        assert_eq!(
            lookup(&[BASE_TABLE, CMOS_TABLE], "LDA", AddressMode::ZeroPageIndirect),
            Some(0xB2)
        );
    }
}
