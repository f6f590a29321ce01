// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU identifiers.
//!
//! The CPU is chosen once per run. Each kind maps to one addressing-mode
//! resolver in `families`.

use std::fmt;
use std::str::FromStr;

use crate::core::assembler::error::{AsmError, AsmErrorKind};

/// Identifier for a CPU family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CpuFamily {
    Mos6502,
    Intel8080,
    Motorola6800,
}

impl CpuFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuFamily::Mos6502 => "mos6502",
            CpuFamily::Intel8080 => "intel8080",
            CpuFamily::Motorola6800 => "motorola6800",
        }
    }
}

/// Target CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CpuKind {
    M6502,
    W65C02,
    Z80,
    I8080,
    M6800,
    M6809,
}

impl CpuKind {
    pub const ALL: [CpuKind; 6] = [
        CpuKind::M6502,
        CpuKind::W65C02,
        CpuKind::Z80,
        CpuKind::I8080,
        CpuKind::M6800,
        CpuKind::M6809,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CpuKind::M6502 => "6502",
            CpuKind::W65C02 => "65c02",
            CpuKind::Z80 => "z80",
            CpuKind::I8080 => "8080",
            CpuKind::M6800 => "6800",
            CpuKind::M6809 => "6809",
        }
    }

    pub fn family(&self) -> CpuFamily {
        match self {
            CpuKind::M6502 | CpuKind::W65C02 => CpuFamily::Mos6502,
            CpuKind::Z80 | CpuKind::I8080 => CpuFamily::Intel8080,
            CpuKind::M6800 | CpuKind::M6809 => CpuFamily::Motorola6800,
        }
    }

    pub fn is_big_endian(&self) -> bool {
        self.family() == CpuFamily::Motorola6800
    }
}

impl fmt::Display for CpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CpuKind {
    type Err = AsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "6502" | "m6502" => CpuKind::M6502,
            "65c02" | "w65c02" => CpuKind::W65C02,
            "z80" => CpuKind::Z80,
            "8080" | "i8080" => CpuKind::I8080,
            "6800" | "m6800" => CpuKind::M6800,
            "6809" | "m6809" => CpuKind::M6809,
            _ => {
                let known: Vec<&str> = CpuKind::ALL.iter().map(CpuKind::as_str).collect();
                return Err(AsmError::new(
                    AsmErrorKind::Cli,
                    "Unknown CPU",
                    Some(&format!("{s} (expected one of {})", known.join(", "))),
                ));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("6502".parse::<CpuKind>().unwrap(), CpuKind::M6502);
        assert_eq!("W65C02".parse::<CpuKind>().unwrap(), CpuKind::W65C02);
        assert_eq!("i8080".parse::<CpuKind>().unwrap(), CpuKind::I8080);
        assert_eq!("m6809".parse::<CpuKind>().unwrap(), CpuKind::M6809);
        assert_eq!("6800".parse::<CpuKind>().unwrap(), CpuKind::M6800);
        let err = "68000".parse::<CpuKind>().unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Cli);
    }

    #[test]
    fn families_and_byte_order() {
        assert_eq!(CpuKind::W65C02.family(), CpuFamily::Mos6502);
        assert_eq!(CpuKind::I8080.family(), CpuFamily::Intel8080);
        assert!(CpuKind::M6809.is_big_endian());
        assert!(CpuKind::M6800.is_big_endian());
        assert!(!CpuKind::Z80.is_big_endian());
    }
}
