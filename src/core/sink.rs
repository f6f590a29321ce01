// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Binary output formats.
//!
//! A sink turns the converged `(start address, bytes)` image into a file
//! body. Record framing and checksums live here, not in the engine.

use std::fmt::Write as _;

use thiserror::Error;

use crate::core::cpu::{CpuFamily, CpuKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
    #[error("Format {format} is not available for CPU {cpu}")]
    UnsupportedCpu { format: &'static str, cpu: CpuKind },
    #[error("Start address ${0:X} does not fit the {1} format")]
    AddressOutOfRange(u32, &'static str),
}

pub trait BinarySink {
    fn name(&self) -> &'static str;

    fn supports_cpu(&self, _cpu: CpuKind) -> bool {
        true
    }

    fn render(&self, start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError>;
}

pub const FORMATS: [&str; 5] = ["bin", "prg", "ihex", "srec", "hex"];

/// Pick the sink for a format name and check it against the CPU.
pub fn select_sink(format: &str, cpu: CpuKind) -> Result<Box<dyn BinarySink>, SinkError> {
    let sink: Box<dyn BinarySink> = match format.to_ascii_lowercase().as_str() {
        "bin" | "raw" => Box::new(RawSink),
        "prg" => Box::new(PrgSink),
        "ihex" | "intel" => Box::new(IntelHexSink),
        "srec" | "s19" => Box::new(SRecordSink),
        "hex" => Box::new(HexDumpSink),
        _ => return Err(SinkError::UnknownFormat(format.to_string())),
    };
    if !sink.supports_cpu(cpu) {
        return Err(SinkError::UnsupportedCpu {
            format: sink.name(),
            cpu,
        });
    }
    Ok(sink)
}

fn hex_digit(value: u8) -> char {
    char::from_digit(u32::from(value & 0x0f), 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

fn push_hex(out: &mut String, value: u8) {
    out.push(hex_digit(value >> 4));
    out.push(hex_digit(value));
}

pub struct RawSink;

impl BinarySink for RawSink {
    fn name(&self) -> &'static str {
        "bin"
    }

    fn render(&self, _start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError> {
        Ok(bytes.to_vec())
    }
}

/// Commodore load file: little-endian load address, then the image.
pub struct PrgSink;

impl BinarySink for PrgSink {
    fn name(&self) -> &'static str {
        "prg"
    }

    fn supports_cpu(&self, cpu: CpuKind) -> bool {
        cpu.family() == CpuFamily::Mos6502
    }

    fn render(&self, start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError> {
        let start = u16::try_from(start).map_err(|_| SinkError::AddressOutOfRange(start, "prg"))?;
        let mut out = Vec::with_capacity(bytes.len() + 2);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(bytes);
        Ok(out)
    }
}

pub struct IntelHexSink;

impl IntelHexSink {
    const LINE_LIMIT: usize = 16;

    fn record(out: &mut String, rec_type: u8, addr: u16, data: &[u8]) {
        let mut checksum: u8 = 0;
        checksum = checksum.wrapping_add(data.len() as u8);
        checksum = checksum.wrapping_add((addr >> 8) as u8);
        checksum = checksum.wrapping_add((addr & 0xff) as u8);
        checksum = checksum.wrapping_add(rec_type);
        let mut hex_data = String::with_capacity(data.len() * 2);
        for &val in data {
            push_hex(&mut hex_data, val);
            checksum = checksum.wrapping_add(val);
        }
        checksum = (!checksum).wrapping_add(1);
        let _ = writeln!(
            out,
            ":{:02X}{:04X}{:02X}{}{:02X}",
            data.len(),
            addr,
            rec_type,
            hex_data,
            checksum
        );
    }
}

impl BinarySink for IntelHexSink {
    fn name(&self) -> &'static str {
        "ihex"
    }

    fn render(&self, start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError> {
        let mut out = String::new();
        let mut upper: u16 = 0;
        let mut offset = 0usize;
        while offset < bytes.len() {
            let addr = start + offset as u32;
            let addr_upper = (addr >> 16) as u16;
            if addr_upper != upper {
                upper = addr_upper;
                Self::record(&mut out, 0x04, 0, &upper.to_be_bytes());
            }
            // Records never straddle a 64K boundary.
            let to_boundary = 0x1_0000 - (addr & 0xffff) as usize;
            let len = Self::LINE_LIMIT.min(bytes.len() - offset).min(to_boundary);
            Self::record(&mut out, 0x00, addr as u16, &bytes[offset..offset + len]);
            offset += len;
        }
        out.push_str(":00000001FF\n");
        Ok(out.into_bytes())
    }
}

/// Motorola S-record with 16- or 24-bit addresses.
pub struct SRecordSink;

impl SRecordSink {
    const LINE_LIMIT: usize = 16;

    fn record(out: &mut String, rec_type: char, addr: u32, addr_len: usize, data: &[u8]) {
        let count = (addr_len + data.len() + 1) as u8;
        let mut sum = count;
        let mut body = String::new();
        push_hex(&mut body, count);
        for shift in (0..addr_len).rev() {
            let byte = (addr >> (shift * 8)) as u8;
            sum = sum.wrapping_add(byte);
            push_hex(&mut body, byte);
        }
        for &val in data {
            sum = sum.wrapping_add(val);
            push_hex(&mut body, val);
        }
        push_hex(&mut body, !sum);
        let _ = writeln!(out, "S{rec_type}{body}");
    }
}

impl BinarySink for SRecordSink {
    fn name(&self) -> &'static str {
        "srec"
    }

    fn render(&self, start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError> {
        let end = start as u64 + bytes.len() as u64;
        if end > 0x100_0000 {
            return Err(SinkError::AddressOutOfRange(start, "srec"));
        }
        let wide = end > 0x1_0000;
        let mut out = String::new();
        Self::record(&mut out, '0', 0, 2, &[]);
        for (idx, chunk) in bytes.chunks(Self::LINE_LIMIT).enumerate() {
            let addr = start + (idx * Self::LINE_LIMIT) as u32;
            if wide {
                Self::record(&mut out, '2', addr, 3, chunk);
            } else {
                Self::record(&mut out, '1', addr, 2, chunk);
            }
        }
        if wide {
            Self::record(&mut out, '8', start, 3, &[]);
        } else {
            Self::record(&mut out, '9', start, 2, &[]);
        }
        Ok(out.into_bytes())
    }
}

/// Plain hex string, 32 bytes per line.
pub struct HexDumpSink;

impl BinarySink for HexDumpSink {
    fn name(&self) -> &'static str {
        "hex"
    }

    fn render(&self, _start: u32, bytes: &[u8]) -> Result<Vec<u8>, SinkError> {
        let mut out = String::with_capacity(bytes.len() * 2 + bytes.len() / 32 + 1);
        for chunk in bytes.chunks(32) {
            for &val in chunk {
                push_hex(&mut out, val);
            }
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_hex_byte(text: &str) -> u8 {
        u8::from_str_radix(text, 16).unwrap()
    }

    fn verify_checksum(line: &str) {
        assert!(line.starts_with(':'), "record must start with ':'");
        let bytes = &line[1..];
        let len = parse_hex_byte(&bytes[0..2]) as usize;
        let data_end = 8 + len * 2;
        let checksum = parse_hex_byte(&bytes[data_end..data_end + 2]);
        let mut sum: u8 = 0;
        for idx in (0..data_end).step_by(2) {
            sum = sum.wrapping_add(parse_hex_byte(&bytes[idx..idx + 2]));
        }
        assert_eq!((!sum).wrapping_add(1), checksum, "bad checksum in {line}");
    }

    fn render_text(sink: &dyn BinarySink, start: u32, bytes: &[u8]) -> String {
        String::from_utf8(sink.render(start, bytes).unwrap()).unwrap()
    }

    #[test]
    fn intel_hex_splits_records_and_ends_with_eof() {
        let bytes: Vec<u8> = (0..20).collect();
        let text = render_text(&IntelHexSink, 0x1000, &bytes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(":10100000"));
        assert!(lines[1].starts_with(":04101000"));
        for line in &lines {
            verify_checksum(line);
        }
        assert_eq!(lines.last().copied(), Some(":00000001FF"));
    }

    #[test]
    fn intel_hex_emits_extended_linear_address() {
        let text = render_text(&IntelHexSink, 0x1_FFFE, &[1, 2, 3, 4]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ":020000040001F9");
        assert!(lines[1].starts_with(":02FFFE00"));
        assert_eq!(lines[2], ":020000040002F8");
        assert!(lines[3].starts_with(":02000000"));
        for line in &lines {
            verify_checksum(line);
        }
    }

    #[test]
    fn srecord_uses_header_data_and_terminator() {
        let text = render_text(&SRecordSink, 0x1000, &[0xA9, 0x00]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "S0030000FC");
        // 05 + 10 + 00 + A9 + 00 = 0xBE, complement 0x41
        assert_eq!(lines[1], "S1051000A90041");
        assert_eq!(lines[2], "S9031000EC");
    }

    #[test]
    fn prg_prefixes_load_address() {
        assert_eq!(
            PrgSink.render(0x0801, &[0x0B, 0x08]).unwrap(),
            vec![0x01, 0x08, 0x0B, 0x08]
        );
        assert!(PrgSink.render(0x1_0000, &[0]).is_err());
    }

    #[test]
    fn hex_dump_wraps_at_32_bytes() {
        let bytes = vec![0xABu8; 33];
        let text = render_text(&HexDumpSink, 0, &bytes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 64);
        assert_eq!(lines[1], "AB");
    }

    #[test]
    fn selection_checks_cpu() {
        assert!(select_sink("prg", CpuKind::W65C02).is_ok());
        assert_eq!(
            select_sink("prg", CpuKind::Z80).err(),
            Some(SinkError::UnsupportedCpu {
                format: "prg",
                cpu: CpuKind::Z80
            })
        );
        assert!(matches!(
            select_sink("d64", CpuKind::M6502).err(),
            Some(SinkError::UnknownFormat(_))
        ));
        assert_eq!(select_sink("IHEX", CpuKind::M6809).unwrap().name(), "ihex");
    }
}
