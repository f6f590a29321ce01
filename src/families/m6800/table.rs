// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction tables for the 6800 and 6809.
//!
//! Most memory instructions come in groups of four opcodes sixteen apart
//! (immediate, direct, indexed, extended), so the tables are generated from
//! the first opcode of each group. The 6800 shares most of the layout but
//! uses its own mnemonics for the accumulator groups, has no page 2 or 3,
//! and indexes with a plain offset byte instead of a postbyte.

use std::sync::OnceLock;

use crate::core::family::{InstructionEntry, MAX_OPERANDS};
use crate::families::m6800::AddressMode;

pub type Entry = InstructionEntry<AddressMode>;

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

static PAGE1: [[u8; 1]; 256] = plain_page();
static PAGE2: [[u8; 2]; 256] = prefixed_page(0x10);
static PAGE3: [[u8; 2]; 256] = prefixed_page(0x11);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Page {
    One,
    Two,
    Three,
}

impl Page {
    fn opcode(self, op: u8) -> &'static [u8] {
        match self {
            Page::One => &PAGE1[op as usize],
            Page::Two => &PAGE2[op as usize],
            Page::Three => &PAGE3[op as usize],
        }
    }
}

const MEM8: [(&str, u8); 20] = [
    ("SUBA", 0x80),
    ("CMPA", 0x81),
    ("SBCA", 0x82),
    ("ANDA", 0x84),
    ("BITA", 0x85),
    ("LDA", 0x86),
    ("EORA", 0x88),
    ("ADCA", 0x89),
    ("ORA", 0x8A),
    ("ADDA", 0x8B),
    ("SUBB", 0xC0),
    ("CMPB", 0xC1),
    ("SBCB", 0xC2),
    ("ANDB", 0xC4),
    ("BITB", 0xC5),
    ("LDB", 0xC6),
    ("EORB", 0xC8),
    ("ADCB", 0xC9),
    ("ORB", 0xCA),
    ("ADDB", 0xCB),
];

const MEM16: [(&str, Page, u8); 12] = [
    ("SUBD", Page::One, 0x83),
    ("CMPX", Page::One, 0x8C),
    ("LDX", Page::One, 0x8E),
    ("ADDD", Page::One, 0xC3),
    ("LDD", Page::One, 0xCC),
    ("LDU", Page::One, 0xCE),
    ("CMPD", Page::Two, 0x83),
    ("CMPY", Page::Two, 0x8C),
    ("LDY", Page::Two, 0x8E),
    ("LDS", Page::Two, 0xCE),
    ("CMPU", Page::Three, 0x83),
    ("CMPS", Page::Three, 0x8C),
];

/// Direct-mode opcode; indexed and extended follow at +0x10 and +0x20.
const STORES: [(&str, Page, u8); 8] = [
    ("STA", Page::One, 0x97),
    ("STB", Page::One, 0xD7),
    ("STD", Page::One, 0xDD),
    ("STX", Page::One, 0x9F),
    ("STU", Page::One, 0xDF),
    ("STY", Page::Two, 0x9F),
    ("STS", Page::Two, 0xDF),
    ("JSR", Page::One, 0x9D),
];

/// Direct opcode `0x0n`, indexed `0x6n`, extended `0x7n`. The 6800 has no
/// direct forms.
const READ_MODIFY_WRITE: [(&str, u8); 13] = [
    ("NEG", 0x0),
    ("COM", 0x3),
    ("LSR", 0x4),
    ("ROR", 0x6),
    ("ASR", 0x7),
    ("ASL", 0x8),
    ("LSL", 0x8),
    ("ROL", 0x9),
    ("DEC", 0xA),
    ("INC", 0xC),
    ("TST", 0xD),
    ("JMP", 0xE),
    ("CLR", 0xF),
];

const BRANCHES: [(&str, u8); 18] = [
    ("BRA", 0x20),
    ("BRN", 0x21),
    ("BHI", 0x22),
    ("BLS", 0x23),
    ("BCC", 0x24),
    ("BHS", 0x24),
    ("BCS", 0x25),
    ("BLO", 0x25),
    ("BNE", 0x26),
    ("BEQ", 0x27),
    ("BVC", 0x28),
    ("BVS", 0x29),
    ("BPL", 0x2A),
    ("BMI", 0x2B),
    ("BGE", 0x2C),
    ("BLT", 0x2D),
    ("BGT", 0x2E),
    ("BLE", 0x2F),
];

const LONG_BRANCHES: [&str; 18] = [
    "LBRA", "LBRN", "LBHI", "LBLS", "LBCC", "LBHS", "LBCS", "LBLO", "LBNE", "LBEQ", "LBVC",
    "LBVS", "LBPL", "LBMI", "LBGE", "LBLT", "LBGT", "LBLE",
];

const ACCUMULATOR_UNARY: [(&str, u8); 24] = [
    ("NEGA", 0x40),
    ("COMA", 0x43),
    ("LSRA", 0x44),
    ("RORA", 0x46),
    ("ASRA", 0x47),
    ("ASLA", 0x48),
    ("LSLA", 0x48),
    ("ROLA", 0x49),
    ("DECA", 0x4A),
    ("INCA", 0x4C),
    ("TSTA", 0x4D),
    ("CLRA", 0x4F),
    ("NEGB", 0x50),
    ("COMB", 0x53),
    ("LSRB", 0x54),
    ("RORB", 0x56),
    ("ASRB", 0x57),
    ("ASLB", 0x58),
    ("LSLB", 0x58),
    ("ROLB", 0x59),
    ("DECB", 0x5A),
    ("INCB", 0x5C),
    ("TSTB", 0x5D),
    ("CLRB", 0x5F),
];

const M6800_MEM8: [(&str, u8); 20] = [
    ("SUBA", 0x80),
    ("CMPA", 0x81),
    ("SBCA", 0x82),
    ("ANDA", 0x84),
    ("BITA", 0x85),
    ("LDAA", 0x86),
    ("EORA", 0x88),
    ("ADCA", 0x89),
    ("ORAA", 0x8A),
    ("ADDA", 0x8B),
    ("SUBB", 0xC0),
    ("CMPB", 0xC1),
    ("SBCB", 0xC2),
    ("ANDB", 0xC4),
    ("BITB", 0xC5),
    ("LDAB", 0xC6),
    ("EORB", 0xC8),
    ("ADCB", 0xC9),
    ("ORAB", 0xCA),
    ("ADDB", 0xCB),
];

const M6800_INHERENT: [(&str, u8); 29] = [
    ("NOP", 0x01),
    ("TAP", 0x06),
    ("TPA", 0x07),
    ("INX", 0x08),
    ("DEX", 0x09),
    ("CLV", 0x0A),
    ("SEV", 0x0B),
    ("CLC", 0x0C),
    ("SEC", 0x0D),
    ("CLI", 0x0E),
    ("SEI", 0x0F),
    ("SBA", 0x10),
    ("CBA", 0x11),
    ("TAB", 0x16),
    ("TBA", 0x17),
    ("DAA", 0x19),
    ("ABA", 0x1B),
    ("TSX", 0x30),
    ("INS", 0x31),
    ("PULA", 0x32),
    ("PULB", 0x33),
    ("DES", 0x34),
    ("TXS", 0x35),
    ("PSHA", 0x36),
    ("PSHB", 0x37),
    ("RTS", 0x39),
    ("RTI", 0x3B),
    ("WAI", 0x3E),
    ("SWI", 0x3F),
];

struct TableBuilder {
    rows: Vec<Entry>,
    /// Mode of the `+0x20` column.
    indexed: AddressMode,
}

impl TableBuilder {
    fn new(indexed: AddressMode) -> Self {
        Self {
            rows: Vec::new(),
            indexed,
        }
    }

    fn row(&mut self, mnemonic: &'static str, mode: AddressMode, page: Page, op: u8) {
        let mut modes = [AddressMode::Inherent; MAX_OPERANDS];
        modes[0] = mode;
        let opcode = page.opcode(op);
        let size = opcode.len() as u8 + mode.operand_size();
        self.rows.push(InstructionEntry::new(mnemonic, modes, opcode, size));
    }

    fn memory(&mut self, mnemonic: &'static str, immediate: Option<AddressMode>, page: Page, base: u8) {
        if let Some(mode) = immediate {
            self.row(mnemonic, mode, page, base);
        }
        self.row(mnemonic, AddressMode::Direct, page, base + 0x10);
        self.row(mnemonic, self.indexed, page, base + 0x20);
        self.row(mnemonic, AddressMode::Extended, page, base + 0x30);
    }
}

fn build_m6809() -> Vec<Entry> {
    let mut t = TableBuilder::new(AddressMode::Indexed);

    for (mnemonic, base) in MEM8 {
        t.memory(mnemonic, Some(AddressMode::Immediate8), Page::One, base);
    }
    for (mnemonic, page, base) in MEM16 {
        t.memory(mnemonic, Some(AddressMode::Immediate16), page, base);
    }
    for (mnemonic, page, direct) in STORES {
        t.memory(mnemonic, None, page, direct - 0x10);
    }
    for (mnemonic, low) in READ_MODIFY_WRITE {
        t.row(mnemonic, AddressMode::Direct, Page::One, low);
        t.row(mnemonic, AddressMode::Indexed, Page::One, 0x60 | low);
        t.row(mnemonic, AddressMode::Extended, Page::One, 0x70 | low);
    }
    for (mnemonic, op) in ACCUMULATOR_UNARY {
        t.row(mnemonic, AddressMode::Inherent, Page::One, op);
    }
    for (mnemonic, op) in [
        ("NOP", 0x12),
        ("SYNC", 0x13),
        ("DAA", 0x19),
        ("SEX", 0x1D),
        ("RTS", 0x39),
        ("ABX", 0x3A),
        ("RTI", 0x3B),
        ("MUL", 0x3D),
        ("SWI", 0x3F),
    ] {
        t.row(mnemonic, AddressMode::Inherent, Page::One, op);
    }
    t.row("SWI2", AddressMode::Inherent, Page::Two, 0x3F);
    t.row("SWI3", AddressMode::Inherent, Page::Three, 0x3F);

    t.row("ORCC", AddressMode::Immediate8, Page::One, 0x1A);
    t.row("ANDCC", AddressMode::Immediate8, Page::One, 0x1C);
    t.row("CWAI", AddressMode::Immediate8, Page::One, 0x3C);

    for (mnemonic, op) in [("LEAX", 0x30), ("LEAY", 0x31), ("LEAS", 0x32), ("LEAU", 0x33)] {
        t.row(mnemonic, AddressMode::Indexed, Page::One, op);
    }
    t.row("EXG", AddressMode::RegisterPair, Page::One, 0x1E);
    t.row("TFR", AddressMode::RegisterPair, Page::One, 0x1F);
    for (mnemonic, op) in [("PSHS", 0x34), ("PULS", 0x35), ("PSHU", 0x36), ("PULU", 0x37)] {
        t.row(mnemonic, AddressMode::RegisterList, Page::One, op);
    }

    for (mnemonic, op) in BRANCHES {
        t.row(mnemonic, AddressMode::Relative8, Page::One, op);
    }
    t.row("BSR", AddressMode::Relative8, Page::One, 0x8D);
    t.row("LBRA", AddressMode::Relative16, Page::One, 0x16);
    t.row("LBSR", AddressMode::Relative16, Page::One, 0x17);
    // LBRA has its own page-one opcode; the rest mirror the short forms.
    for (mnemonic, (_, op)) in LONG_BRANCHES.iter().zip(BRANCHES).skip(1) {
        t.row(*mnemonic, AddressMode::Relative16, Page::Two, op);
    }

    t.rows
}

fn build_m6800() -> Vec<Entry> {
    let mut t = TableBuilder::new(AddressMode::IndexedOffset);

    for (mnemonic, base) in M6800_MEM8 {
        t.memory(mnemonic, Some(AddressMode::Immediate8), Page::One, base);
    }
    for (mnemonic, base) in [("CPX", 0x8C), ("LDS", 0x8E), ("LDX", 0xCE)] {
        t.memory(mnemonic, Some(AddressMode::Immediate16), Page::One, base);
    }
    for (mnemonic, direct) in [("STAA", 0x97), ("STAB", 0xD7), ("STS", 0x9F), ("STX", 0xDF)] {
        t.memory(mnemonic, None, Page::One, direct - 0x10);
    }
    t.row("JSR", AddressMode::IndexedOffset, Page::One, 0xAD);
    t.row("JSR", AddressMode::Extended, Page::One, 0xBD);
    for (mnemonic, low) in READ_MODIFY_WRITE {
        t.row(mnemonic, AddressMode::IndexedOffset, Page::One, 0x60 | low);
        t.row(mnemonic, AddressMode::Extended, Page::One, 0x70 | low);
    }
    for (mnemonic, op) in ACCUMULATOR_UNARY.into_iter().chain(M6800_INHERENT) {
        t.row(mnemonic, AddressMode::Inherent, Page::One, op);
    }
    for (mnemonic, op) in BRANCHES.into_iter().filter(|(m, _)| *m != "BRN") {
        t.row(mnemonic, AddressMode::Relative8, Page::One, op);
    }
    t.row("BSR", AddressMode::Relative8, Page::One, 0x8D);

    t.rows
}

static M6809_TABLE: OnceLock<Vec<Entry>> = OnceLock::new();
static M6800_TABLE: OnceLock<Vec<Entry>> = OnceLock::new();

pub fn m6809_table() -> &'static [Entry] {
    M6809_TABLE.get_or_init(build_m6809)
}

pub fn m6800_table() -> &'static [Entry] {
    M6800_TABLE.get_or_init(build_m6800)
}

/// Whether the mnemonic is a relative branch, and whether it is long.
pub fn branch_kind(mnemonic: &str) -> Option<bool> {
    let upper = mnemonic.to_ascii_uppercase();
    if upper == "BSR" || BRANCHES.iter().any(|(m, _)| *m == upper) {
        Some(false)
    } else if upper == "LBSR" || LONG_BRANCHES.contains(&upper.as_str()) {
        Some(true)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_in(table: &'static [Entry], mnemonic: &str, mode: AddressMode) -> Option<&'static Entry> {
        table
            .iter()
            .find(|e| e.mnemonic.eq_ignore_ascii_case(mnemonic) && e.modes[0] == mode)
    }

    fn find(mnemonic: &str, mode: AddressMode) -> Option<&'static Entry> {
        find_in(m6809_table(), mnemonic, mode)
    }

    #[test]
    fn memory_groups_are_sixteen_apart() {
        assert_eq!(find("LDA", AddressMode::Immediate8).unwrap().opcode, &[0x86]);
        assert_eq!(find("LDA", AddressMode::Direct).unwrap().opcode, &[0x96]);
        assert_eq!(find("LDA", AddressMode::Indexed).unwrap().opcode, &[0xA6]);
        assert_eq!(find("LDA", AddressMode::Extended).unwrap().opcode, &[0xB6]);
        assert!(find("STA", AddressMode::Immediate8).is_none());
        assert_eq!(find("STA", AddressMode::Extended).unwrap().opcode, &[0xB7]);
    }

    #[test]
    fn prefixed_pages_count_in_size() {
        let ldy = find("LDY", AddressMode::Immediate16).unwrap();
        assert_eq!(ldy.opcode, &[0x10, 0x8E]);
        assert_eq!(ldy.size, 4);
        let cmps = find("CMPS", AddressMode::Extended).unwrap();
        assert_eq!(cmps.opcode, &[0x11, 0xBC]);
        assert_eq!(cmps.size, 4);
    }

    #[test]
    fn long_branches() {
        assert_eq!(find("LBRA", AddressMode::Relative16).unwrap().opcode, &[0x16]);
        assert_eq!(find("LBNE", AddressMode::Relative16).unwrap().opcode, &[0x10, 0x26]);
        assert_eq!(find("LBLE", AddressMode::Relative16).unwrap().opcode, &[0x10, 0x2F]);
        assert_eq!(branch_kind("lbeq"), Some(true));
        assert_eq!(branch_kind("bsr"), Some(false));
        assert_eq!(branch_kind("lda"), None);
    }

    #[test]
    fn read_modify_write_rows() {
        assert_eq!(find("CLR", AddressMode::Direct).unwrap().opcode, &[0x0F]);
        assert_eq!(find("JMP", AddressMode::Extended).unwrap().opcode, &[0x7E]);
        assert_eq!(find("INC", AddressMode::Indexed).unwrap().opcode, &[0x6C]);
    }

    #[test]
    fn m6800_table_uses_offset_indexing() {
        let m6800 = |mnemonic, mode| find_in(m6800_table(), mnemonic, mode);
        assert_eq!(m6800("LDAA", AddressMode::Immediate8).unwrap().opcode, &[0x86]);
        let ldaa = m6800("LDAA", AddressMode::IndexedOffset).unwrap();
        assert_eq!(ldaa.opcode, &[0xA6]);
        assert_eq!(ldaa.size, 2);
        assert_eq!(m6800("LDX", AddressMode::Immediate16).unwrap().opcode, &[0xCE]);
        assert_eq!(m6800("STX", AddressMode::Extended).unwrap().opcode, &[0xFF]);
        assert_eq!(m6800("JSR", AddressMode::Extended).unwrap().opcode, &[0xBD]);
        assert_eq!(m6800("PSHA", AddressMode::Inherent).unwrap().opcode, &[0x36]);
        assert!(m6800("JSR", AddressMode::Direct).is_none());
        assert!(m6800("CLR", AddressMode::Direct).is_none());
        assert!(m6800("LDA", AddressMode::Immediate8).is_none());
        assert!(m6800("BRN", AddressMode::Relative8).is_none());
        assert!(m6800("LBRA", AddressMode::Relative16).is_none());
        assert!(m6800_table().iter().all(|e| e.opcode.len() == 1));
    }
}
