// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic assembler core.
//!
//! # Components
//!
//! - [`cpu`] - CPU selection and family grouping
//! - [`text_utils`] - Text helpers (identifiers, suffixes, highlighting)
//! - [`tokenizer`] - Token scanning with configurable register detection
//! - [`parser`] - Line and expression parsing
//! - [`source`] - Program tree of blocks and conditionals, include splicing
//! - [`value`] - Typed values
//! - [`builtins`] - Built-in functions and constants
//! - [`expr`] - Expression evaluator
//! - [`scope`] - Scope graph and symbols
//! - [`family`] - Addressing-mode resolver abstraction
//! - [`output`] - Code output buffer
//! - [`sink`] - Binary output formats
//! - [`loader`] - Source and binary loaders
//! - [`assembler`] - Diagnostics and symbol listing

pub mod assembler;
pub mod builtins;
pub mod cpu;
pub mod expr;
pub mod family;
pub mod loader;
pub mod output;
pub mod parser;
pub mod scope;
pub mod sink;
pub mod source;
pub mod text_utils;
pub mod tokenizer;
pub mod value;

pub use cpu::{CpuFamily, CpuKind};
pub use expr::{evaluate, EvalContext, EvalError};
pub use family::{AssemblerContext, ModeResolver};
pub use parser::ParseError;
pub use tokenizer::{RegisterChecker, Span};
