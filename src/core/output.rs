// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Addressable output buffer with physical and logical program counters.

use thiserror::Error;

/// Highest address within a bank.
pub const MAX_ADDRESS: i64 = 0xFFFF;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("Program overflow at ${0:04X}")]
    Overflow(i64),
    #[error("Illegal write at ${0:04X}")]
    IllegalWrite(i64),
    #[error("Invalid address ${0:X}")]
    InvalidAddress(i64),
}

/// Emitted bytes for one pass.
///
/// Memory is addressed as `bank << 16 | pc`. A byte written by one statement
/// cannot be written again except through [`CodeOutput::poke`].
#[derive(Debug, Default)]
pub struct CodeOutput {
    memory: Vec<u8>,
    written: Vec<bool>,
    pc: i64,
    /// Address the code runs at while relocating.
    logical: Option<i64>,
    bank: u8,
    low: Option<usize>,
    high: usize,
}

impl CodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next byte will run at.
    pub fn program_counter(&self) -> i64 {
        self.logical.unwrap_or(self.pc)
    }

    /// Address the next byte will be stored at.
    pub fn physical_pc(&self) -> i64 {
        self.pc
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn set_pc(&mut self, address: i64) -> Result<(), OutputError> {
        if !(0..=MAX_ADDRESS).contains(&address) {
            return Err(OutputError::InvalidAddress(address));
        }
        self.pc = address;
        self.logical = None;
        Ok(())
    }

    pub fn relocate(&mut self, address: i64) -> Result<(), OutputError> {
        if !(0..=MAX_ADDRESS).contains(&address) {
            return Err(OutputError::InvalidAddress(address));
        }
        self.logical = Some(address);
        Ok(())
    }

    pub fn end_relocate(&mut self) {
        self.logical = None;
    }

    pub fn set_bank(&mut self, bank: i64) -> Result<(), OutputError> {
        self.bank = u8::try_from(bank).map_err(|_| OutputError::InvalidAddress(bank))?;
        Ok(())
    }

    fn physical(&self, address: i64) -> usize {
        ((self.bank as usize) << 16) | address as usize
    }

    fn advance(&mut self, count: usize) -> Result<(), OutputError> {
        let end = self.pc + count as i64;
        if end > MAX_ADDRESS + 1 {
            return Err(OutputError::Overflow(self.pc));
        }
        self.pc = end;
        if let Some(logical) = self.logical.as_mut() {
            *logical += count as i64;
        }
        Ok(())
    }

    fn store(&mut self, phys: usize, value: u8) {
        if phys >= self.memory.len() {
            let len = (phys + 1).next_power_of_two().max(0x1_0000);
            self.memory.resize(len, 0);
            self.written.resize(len, false);
        }
        self.memory[phys] = value;
        self.written[phys] = true;
        self.low = Some(self.low.map_or(phys, |low| low.min(phys)));
        self.high = self.high.max(phys + 1);
    }

    pub fn emit(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        if self.pc + bytes.len() as i64 > MAX_ADDRESS + 1 {
            return Err(OutputError::Overflow(self.pc));
        }
        for offset in 0..bytes.len() {
            let phys = self.physical(self.pc + offset as i64);
            if self.written.get(phys).copied().unwrap_or(false) {
                return Err(OutputError::IllegalWrite(self.pc + offset as i64));
            }
        }
        for (offset, &byte) in bytes.iter().enumerate() {
            let phys = self.physical(self.pc + offset as i64);
            self.store(phys, byte);
        }
        self.advance(bytes.len())
    }

    /// Reserve space without writing it.
    pub fn emit_uninitialized(&mut self, count: usize) -> Result<(), OutputError> {
        self.advance(count)
    }

    /// Emit `count` bytes repeating `pattern`, or reserve them when the
    /// pattern is empty.
    pub fn fill(&mut self, count: usize, pattern: &[u8]) -> Result<(), OutputError> {
        if pattern.is_empty() {
            return self.emit_uninitialized(count);
        }
        let bytes: Vec<u8> = pattern.iter().copied().cycle().take(count).collect();
        self.emit(&bytes)
    }

    /// Pad to the next multiple of `amount`.
    pub fn align(&mut self, amount: i64, fill: Option<u8>) -> Result<usize, OutputError> {
        if amount <= 0 {
            return Err(OutputError::InvalidAddress(amount));
        }
        let pc = self.program_counter();
        let pad = ((amount - pc % amount) % amount) as usize;
        match fill {
            Some(value) => self.fill(pad, &[value])?,
            None => self.emit_uninitialized(pad)?,
        }
        Ok(pad)
    }

    /// Overwrite a byte at an absolute address in the current bank.
    pub fn poke(&mut self, address: i64, value: u8) -> Result<(), OutputError> {
        if !(0..=MAX_ADDRESS).contains(&address) {
            return Err(OutputError::InvalidAddress(address));
        }
        let phys = self.physical(address);
        self.store(phys, value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_none()
    }

    /// Lowest written physical address and the bytes up to the highest one.
    /// Gaps are zero.
    pub fn bytes(&self) -> Option<(u32, Vec<u8>)> {
        let low = self.low?;
        Some((low as u32, self.memory[low..self.high].to_vec()))
    }
}
