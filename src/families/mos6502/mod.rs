// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 CPU family.
//!
//! Covers the NMOS 6502 and the WDC 65C02.
//!
//! # Family Characteristics
//!
//! - 8-bit data bus, 16-bit address bus, little endian
//! - Registers: A (accumulator), X, Y (index)
//! - Zero page forms are one byte shorter than absolute forms
//!
//! # Addressing Modes (Family Common)
//!
//! | Syntax | Mode |
//! |--------|------|
//! | `#$20` | Immediate |
//! | `$20` | Zero Page |
//! | `$20,X` | Zero Page,X |
//! | `$20,Y` | Zero Page,Y |
//! | `$1234` | Absolute |
//! | `$1234,X` | Absolute,X |
//! | `$1234,Y` | Absolute,Y |
//! | `($20,X)` | Indexed Indirect |
//! | `($20),Y` | Indirect Indexed |
//!
//! # CPU Extensions
//!
//! - `($20)` - Zero Page Indirect (65C02 only)
//! - `($1234,X)` - Absolute Indexed Indirect (65C02 only)

mod operand;
mod resolver;
mod table;

pub use operand::AddressMode;
pub use resolver::Mos6502Resolver;
pub use table::{has_mnemonic, BASE_TABLE, CMOS_TABLE};

/// Check if an identifier is a register for the MOS 6502 family.
pub fn is_register(name: &str) -> bool {
    matches!(name.to_ascii_uppercase().as_str(), "A" | "X" | "Y")
}
