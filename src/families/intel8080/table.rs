// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction tables for the Intel 8080 family, in Zilog mnemonics.
//!
//! The 8080 set is the Z80 set minus everything behind a prefix byte and
//! the relative jumps, so both tables are generated from register fields
//! the way the opcode map itself is laid out:
//!
//! ```text
//! LD r,r'   01 rrr rrr     INC r   00 rrr 100     ALU A,r  10 ooo rrr
//! LD rr,nn  00 pp0 001     PUSH qq 11 qq0 101     JP cc,nn 11 ccc 010
//! ```

use std::sync::OnceLock;

use crate::core::family::{InstructionEntry, MAX_OPERANDS};
use crate::families::intel8080::{Condition, Register, Z80Mode};

pub type Entry = InstructionEntry<Z80Mode>;

const fn plain_page() -> [[u8; 1]; 256] {
    let mut out = [[0u8; 1]; 256];
    let mut idx = 0;
    while idx < 256 {
        out[idx] = [idx as u8];
        idx += 1;
    }
    out
}

const fn prefixed_page(prefix: u8) -> [[u8; 2]; 256] {
    let mut out = [[0u8; 2]; 256];
    let mut idx = 0;
    while idx < 256 {
        out[idx] = [prefix, idx as u8];
        idx += 1;
    }
    out
}

const fn index_bit_page(prefix: u8) -> [[u8; 3]; 256] {
    let mut out = [[0u8; 3]; 256];
    let mut idx = 0;
    while idx < 256 {
        out[idx] = [prefix, 0xCB, idx as u8];
        idx += 1;
    }
    out
}

static PLAIN: [[u8; 1]; 256] = plain_page();
static CB: [[u8; 2]; 256] = prefixed_page(0xCB);
static ED: [[u8; 2]; 256] = prefixed_page(0xED);
static DD: [[u8; 2]; 256] = prefixed_page(0xDD);
static FD: [[u8; 2]; 256] = prefixed_page(0xFD);
static DDCB: [[u8; 3]; 256] = index_bit_page(0xDD);
static FDCB: [[u8; 3]; 256] = index_bit_page(0xFD);

/// Opcode prefix page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    None,
    Cb,
    Ed,
    Dd,
    Fd,
    /// `DD CB d op`: the displacement sits before the final opcode byte.
    DdCb,
    FdCb,
}

impl Prefix {
    pub fn opcode(self, op: u8) -> &'static [u8] {
        let idx = op as usize;
        match self {
            Prefix::None => &PLAIN[idx],
            Prefix::Cb => &CB[idx],
            Prefix::Ed => &ED[idx],
            Prefix::Dd => &DD[idx],
            Prefix::Fd => &FD[idx],
            Prefix::DdCb => &DDCB[idx],
            Prefix::FdCb => &FDCB[idx],
        }
    }
}

/// Opcodes whose last byte follows the displacement.
pub fn is_index_bit_opcode(opcode: &[u8]) -> bool {
    opcode.len() == 3 && opcode[1] == 0xCB
}

const REGS8: [Register; 7] = [
    Register::B,
    Register::C,
    Register::D,
    Register::E,
    Register::H,
    Register::L,
    Register::A,
];
const PAIRS: [Register; 4] = [Register::BC, Register::DE, Register::HL, Register::SP];
const STACK_PAIRS: [Register; 4] = [Register::BC, Register::DE, Register::HL, Register::AF];
const ALU: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];
const ROTATES: [(&str, u8); 7] = [
    ("RLC", 0x00),
    ("RRC", 0x08),
    ("RL", 0x10),
    ("RR", 0x18),
    ("SLA", 0x20),
    ("SRA", 0x28),
    ("SRL", 0x38),
];
const BIT_OPS: [(&str, u8); 3] = [("BIT", 0x40), ("RES", 0x80), ("SET", 0xC0)];
const INDEX: [(Register, Prefix, Prefix); 2] = [
    (Register::IX, Prefix::Dd, Prefix::DdCb),
    (Register::IY, Prefix::Fd, Prefix::FdCb),
];

#[derive(Default)]
struct TableBuilder {
    rows: Vec<Entry>,
}

impl TableBuilder {
    fn row(&mut self, mnemonic: &'static str, modes: &[Z80Mode], prefix: Prefix, op: u8) {
        let mut slots = [Z80Mode::None; MAX_OPERANDS];
        slots[..modes.len()].copy_from_slice(modes);
        let opcode = prefix.opcode(op);
        let size = opcode.len() as u8 + modes.iter().map(|m| m.operand_size()).sum::<u8>();
        self.rows.push(InstructionEntry::new(mnemonic, slots, opcode, size));
    }

    fn plain(&mut self, mnemonic: &'static str, modes: &[Z80Mode], op: u8) {
        self.row(mnemonic, modes, Prefix::None, op);
    }
}

fn build_base() -> Vec<Entry> {
    use Z80Mode::{Addr16, Addr8, Cond, Imm16, Imm8, Ind, Reg, RestartVector};

    let mut t = TableBuilder::default();
    let hl = Ind(Register::HL);

    for (mnemonic, op) in [
        ("NOP", 0x00),
        ("RLCA", 0x07),
        ("RRCA", 0x0F),
        ("RLA", 0x17),
        ("RRA", 0x1F),
        ("DAA", 0x27),
        ("CPL", 0x2F),
        ("SCF", 0x37),
        ("CCF", 0x3F),
        ("HALT", 0x76),
        ("RET", 0xC9),
        ("DI", 0xF3),
        ("EI", 0xFB),
    ] {
        t.plain(mnemonic, &[], op);
    }

    for pair in PAIRS {
        let p = pair.code() << 4;
        t.plain("LD", &[Reg(pair), Imm16], 0x01 | p);
        t.plain("INC", &[Reg(pair)], 0x03 | p);
        t.plain("DEC", &[Reg(pair)], 0x0B | p);
        t.plain("ADD", &[Reg(Register::HL), Reg(pair)], 0x09 | p);
    }
    for (idx, pair) in STACK_PAIRS.into_iter().enumerate() {
        let q = (idx as u8) << 4;
        t.plain("POP", &[Reg(pair)], 0xC1 | q);
        t.plain("PUSH", &[Reg(pair)], 0xC5 | q);
    }

    t.plain("LD", &[Ind(Register::BC), Reg(Register::A)], 0x02);
    t.plain("LD", &[Ind(Register::DE), Reg(Register::A)], 0x12);
    t.plain("LD", &[Reg(Register::A), Ind(Register::BC)], 0x0A);
    t.plain("LD", &[Reg(Register::A), Ind(Register::DE)], 0x1A);
    t.plain("LD", &[Addr16, Reg(Register::HL)], 0x22);
    t.plain("LD", &[Reg(Register::HL), Addr16], 0x2A);
    t.plain("LD", &[Addr16, Reg(Register::A)], 0x32);
    t.plain("LD", &[Reg(Register::A), Addr16], 0x3A);
    t.plain("LD", &[hl, Imm8], 0x36);
    t.plain("LD", &[Reg(Register::SP), Reg(Register::HL)], 0xF9);

    for dst in REGS8 {
        let d = dst.code() << 3;
        t.plain("INC", &[Reg(dst)], 0x04 | d);
        t.plain("DEC", &[Reg(dst)], 0x05 | d);
        t.plain("LD", &[Reg(dst), Imm8], 0x06 | d);
        for src in REGS8 {
            t.plain("LD", &[Reg(dst), Reg(src)], 0x40 | d | src.code());
        }
        t.plain("LD", &[Reg(dst), hl], 0x46 | d);
        t.plain("LD", &[hl, Reg(dst)], 0x70 | dst.code());
    }
    t.plain("INC", &[hl], 0x34);
    t.plain("DEC", &[hl], 0x35);

    // Both `ADD A,B` and `ADD B` spellings are accepted for every ALU op.
    for (idx, mnemonic) in ALU.into_iter().enumerate() {
        let o = (idx as u8) << 3;
        for src in REGS8 {
            t.plain(mnemonic, &[Reg(Register::A), Reg(src)], 0x80 | o | src.code());
            t.plain(mnemonic, &[Reg(src)], 0x80 | o | src.code());
        }
        t.plain(mnemonic, &[Reg(Register::A), hl], 0x86 | o);
        t.plain(mnemonic, &[hl], 0x86 | o);
        t.plain(mnemonic, &[Reg(Register::A), Imm8], 0xC6 | o);
        t.plain(mnemonic, &[Imm8], 0xC6 | o);
    }

    for cond in Condition::ALL {
        let c = cond.code() << 3;
        t.plain("RET", &[Cond(cond)], 0xC0 | c);
        t.plain("JP", &[Cond(cond), Imm16], 0xC2 | c);
        t.plain("CALL", &[Cond(cond), Imm16], 0xC4 | c);
    }
    t.plain("JP", &[Imm16], 0xC3);
    t.plain("CALL", &[Imm16], 0xCD);
    t.plain("RST", &[RestartVector], 0xC7);
    t.plain("OUT", &[Addr8, Reg(Register::A)], 0xD3);
    t.plain("IN", &[Reg(Register::A), Addr8], 0xDB);
    t.plain("EX", &[Ind(Register::SP), Reg(Register::HL)], 0xE3);
    t.plain("JP", &[hl], 0xE9);
    t.plain("EX", &[Reg(Register::DE), Reg(Register::HL)], 0xEB);

    t.rows
}

fn build_z80() -> Vec<Entry> {
    use Z80Mode::{Addr16, BitNumber, Cond, Imm16, Imm8, Ind, Indexed, InterruptMode, Reg, Relative};

    let mut t = TableBuilder::default();
    let hl = Ind(Register::HL);

    t.plain("EX", &[Reg(Register::AF), Reg(Register::AfAlt)], 0x08);
    t.plain("DJNZ", &[Relative], 0x10);
    t.plain("JR", &[Relative], 0x18);
    for cond in [Condition::NZ, Condition::Z, Condition::NC, Condition::C] {
        t.plain("JR", &[Cond(cond), Relative], 0x20 | cond.code() << 3);
    }
    t.plain("EXX", &[], 0xD9);

    // CB page
    for (mnemonic, base) in ROTATES {
        for reg in REGS8 {
            t.row(mnemonic, &[Reg(reg)], Prefix::Cb, base | reg.code());
        }
        t.row(mnemonic, &[hl], Prefix::Cb, base | 0x06);
    }
    for (mnemonic, base) in BIT_OPS {
        for reg in REGS8 {
            t.row(mnemonic, &[BitNumber, Reg(reg)], Prefix::Cb, base | reg.code());
        }
        t.row(mnemonic, &[BitNumber, hl], Prefix::Cb, base | 0x06);
    }

    // ED page
    for reg in REGS8 {
        let r = reg.code() << 3;
        t.row("IN", &[Reg(reg), Ind(Register::C)], Prefix::Ed, 0x40 | r);
        t.row("OUT", &[Ind(Register::C), Reg(reg)], Prefix::Ed, 0x41 | r);
    }
    for pair in PAIRS {
        let p = pair.code() << 4;
        t.row("SBC", &[Reg(Register::HL), Reg(pair)], Prefix::Ed, 0x42 | p);
        t.row("ADC", &[Reg(Register::HL), Reg(pair)], Prefix::Ed, 0x4A | p);
        if pair != Register::HL {
            t.row("LD", &[Addr16, Reg(pair)], Prefix::Ed, 0x43 | p);
            t.row("LD", &[Reg(pair), Addr16], Prefix::Ed, 0x4B | p);
        }
    }
    for (mnemonic, op) in [
        ("NEG", 0x44),
        ("RETN", 0x45),
        ("RETI", 0x4D),
        ("RRD", 0x67),
        ("RLD", 0x6F),
        ("LDI", 0xA0),
        ("CPI", 0xA1),
        ("INI", 0xA2),
        ("OUTI", 0xA3),
        ("LDD", 0xA8),
        ("CPD", 0xA9),
        ("IND", 0xAA),
        ("OUTD", 0xAB),
        ("LDIR", 0xB0),
        ("CPIR", 0xB1),
        ("INIR", 0xB2),
        ("OTIR", 0xB3),
        ("LDDR", 0xB8),
        ("CPDR", 0xB9),
        ("INDR", 0xBA),
        ("OTDR", 0xBB),
    ] {
        t.row(mnemonic, &[], Prefix::Ed, op);
    }
    t.row("IM", &[InterruptMode], Prefix::Ed, 0x46);
    t.row("LD", &[Reg(Register::I), Reg(Register::A)], Prefix::Ed, 0x47);
    t.row("LD", &[Reg(Register::R), Reg(Register::A)], Prefix::Ed, 0x4F);
    t.row("LD", &[Reg(Register::A), Reg(Register::I)], Prefix::Ed, 0x57);
    t.row("LD", &[Reg(Register::A), Reg(Register::R)], Prefix::Ed, 0x5F);

    // DD / FD pages: HL forms with IX or IY substituted
    for (index, prefix, bit_prefix) in INDEX {
        let x = Reg(index);
        let ixd = Indexed(index);
        t.row("LD", &[x, Imm16], prefix, 0x21);
        t.row("LD", &[Addr16, x], prefix, 0x22);
        t.row("LD", &[x, Addr16], prefix, 0x2A);
        t.row("INC", &[x], prefix, 0x23);
        t.row("DEC", &[x], prefix, 0x2B);
        for (idx, pair) in [Register::BC, Register::DE, index, Register::SP]
            .into_iter()
            .enumerate()
        {
            t.row("ADD", &[x, Reg(pair)], prefix, 0x09 | (idx as u8) << 4);
        }
        t.row("POP", &[x], prefix, 0xE1);
        t.row("PUSH", &[x], prefix, 0xE5);
        t.row("EX", &[Ind(Register::SP), x], prefix, 0xE3);
        t.row("JP", &[Ind(index)], prefix, 0xE9);
        t.row("LD", &[Reg(Register::SP), x], prefix, 0xF9);

        t.row("INC", &[ixd], prefix, 0x34);
        t.row("DEC", &[ixd], prefix, 0x35);
        t.row("LD", &[ixd, Imm8], prefix, 0x36);
        for reg in REGS8 {
            t.row("LD", &[Reg(reg), ixd], prefix, 0x46 | reg.code() << 3);
            t.row("LD", &[ixd, Reg(reg)], prefix, 0x70 | reg.code());
        }
        for (idx, mnemonic) in ALU.into_iter().enumerate() {
            let o = (idx as u8) << 3;
            t.row(mnemonic, &[Reg(Register::A), ixd], prefix, 0x86 | o);
            t.row(mnemonic, &[ixd], prefix, 0x86 | o);
        }
        for (mnemonic, base) in ROTATES {
            t.row(mnemonic, &[ixd], bit_prefix, base | 0x06);
        }
        for (mnemonic, base) in BIT_OPS {
            t.row(mnemonic, &[BitNumber, ixd], bit_prefix, base | 0x06);
        }
    }

    t.rows
}

static BASE_TABLE: OnceLock<Vec<Entry>> = OnceLock::new();
static Z80_TABLE: OnceLock<Vec<Entry>> = OnceLock::new();

/// Instructions shared by the 8080 and the Z80.
pub fn base_table() -> &'static [Entry] {
    BASE_TABLE.get_or_init(build_base)
}

/// Z80-only instructions.
pub fn z80_table() -> &'static [Entry] {
    Z80_TABLE.get_or_init(build_z80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::family::{lookup_modes, OperandMode};

    fn find(tables: &[&'static [Entry]], mnemonic: &str, modes: &[Z80Mode]) -> Option<&'static Entry> {
        let mut slots = [Z80Mode::NONE; MAX_OPERANDS];
        slots[..modes.len()].copy_from_slice(modes);
        lookup_modes(tables, mnemonic, slots, [false; MAX_OPERANDS]).map(|(entry, _)| entry)
    }

    #[test]
    fn ld_register_grid() {
        let entry = find(
            &[base_table()],
            "ld",
            &[Z80Mode::Reg(Register::A), Z80Mode::Reg(Register::B)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0x78]);
        assert_eq!(entry.size, 1);
    }

    #[test]
    fn halt_is_not_a_load() {
        let hl = Z80Mode::Ind(Register::HL);
        assert!(find(&[base_table()], "LD", &[hl, hl]).is_none());
        assert_eq!(find(&[base_table()], "HALT", &[]).unwrap().opcode, &[0x76]);
    }

    #[test]
    fn immediates_promote_to_words() {
        let entry = find(
            &[base_table()],
            "LD",
            &[Z80Mode::Reg(Register::HL), Z80Mode::Imm8],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0x21]);
        assert_eq!(entry.size, 3);
    }

    #[test]
    fn prefixed_rows_count_all_bytes() {
        let tables = [base_table(), z80_table()];
        let entry = find(
            &tables,
            "BIT",
            &[Z80Mode::BitNumber, Z80Mode::Indexed(Register::IY)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0xFD, 0xCB, 0x46]);
        assert_eq!(entry.size, 4);
        assert!(is_index_bit_opcode(entry.opcode));

        let entry = find(&tables, "LDIR", &[]).unwrap();
        assert_eq!(entry.opcode, &[0xED, 0xB0]);
    }

    #[test]
    fn z80_rows_stay_out_of_the_8080_table() {
        assert!(find(&[base_table()], "DJNZ", &[Z80Mode::Relative]).is_none());
        assert!(find(&[base_table(), z80_table()], "DJNZ", &[Z80Mode::Relative]).is_some());
    }

    #[test]
    fn hl_store_prefers_unprefixed_form() {
        let entry = find(
            &[base_table(), z80_table()],
            "LD",
            &[Z80Mode::Addr8, Z80Mode::Reg(Register::HL)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0x22]);
    }
}
