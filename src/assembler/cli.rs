// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use tracing::Level;

use crate::assembler::{AssemblerOptions, DEFAULT_MAX_PASSES};
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::cpu::CpuKind;
use crate::core::expr::parse_number;
use crate::core::sink::{select_sink, BinarySink, FORMATS};
use crate::core::tokenizer::Span;

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "Multi-pass cross assembler for the 6502, 65C02, Z80, 8080, 6800 and 6809.

Forward references are settled by repeating passes until every label keeps
its address. The image is written in the selected format; symbol listings are
opt-in with -l/--labels and --labels-json.
Output formats: bin, prg (6502 family only), ihex, srec, hex.";

#[derive(Parser, Debug)]
#[command(
    name = "retroforge",
    version = VERSION,
    about = "Multi-pass cross assembler for 8-bit CPUs",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "FILE", long_help = "Assembly source file.")]
    pub input: PathBuf,
    #[arg(
        short = 'c',
        long = "cpu",
        value_name = "CPU",
        default_value = "6502",
        long_help = "Target CPU: 6502, 65c02, z80, 8080, 6800 or 6809. Defaults to 6502."
    )]
    pub cpu: String,
    #[arg(
        short = 'f',
        long = "format",
        value_name = "FORMAT",
        default_value = "bin",
        long_help = "Output format: bin, prg, ihex, srec or hex. Defaults to bin."
    )]
    pub format: String,
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        long_help = "Output file. Defaults to the input name with an extension matching the format."
    )]
    pub output: Option<PathBuf>,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VAL]",
        action = ArgAction::Append,
        long_help = "Predefine a constant (repeatable). If VAL is omitted, defaults to 1. VAL accepts the same number syntax as source code."
    )]
    pub defines: Vec<String>,
    #[arg(
        short = 'I',
        long = "include-path",
        value_name = "DIR",
        action = ArgAction::Append,
        long_help = "Directory searched for .include and .binary files (repeatable). The input file's directory is always searched first."
    )]
    pub include_paths: Vec<PathBuf>,
    #[arg(
        short = 'l',
        long = "labels",
        value_name = "FILE",
        long_help = "Write a text symbol listing, one `name = $XXXX ; kind` line per symbol."
    )]
    pub labels: Option<PathBuf>,
    #[arg(
        long = "labels-json",
        value_name = "FILE",
        long_help = "Write the symbol listing as a JSON array."
    )]
    pub labels_json: Option<PathBuf>,
    #[arg(
        long = "werror",
        action = ArgAction::SetTrue,
        long_help = "Treat warnings as errors."
    )]
    pub warnings_as_errors: bool,
    #[arg(
        long = "case-sensitive",
        action = ArgAction::SetTrue,
        long_help = "Make symbol names case sensitive."
    )]
    pub case_sensitive: bool,
    #[arg(
        long = "warn-unreferenced",
        action = ArgAction::SetTrue,
        long_help = "Warn about labels and constants that are never used."
    )]
    pub warn_unreferenced: bool,
    #[arg(
        long = "no-color",
        action = ArgAction::SetTrue,
        long_help = "Disable ANSI colour in diagnostics. Setting NO_COLOR has the same effect."
    )]
    pub no_color: bool,
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value_t = Level::WARN,
        long_help = "Log level written to stderr: error, warn, info, debug or trace. Defaults to warn."
    )]
    pub log_level: Level,
    #[arg(
        long = "max-passes",
        value_name = "N",
        default_value_t = DEFAULT_MAX_PASSES,
        long_help = "Give up when the program has not settled after N passes. Defaults to 5."
    )]
    pub max_passes: u32,
}

/// Validated CLI configuration.
pub struct CliConfig {
    pub input: PathBuf,
    pub cpu: CpuKind,
    pub sink: Box<dyn BinarySink>,
    pub output: PathBuf,
    pub include_paths: Vec<PathBuf>,
    pub labels: Option<PathBuf>,
    pub labels_json: Option<PathBuf>,
    pub options: AssemblerOptions,
}

fn cli_error(msg: &str, param: Option<&str>) -> AsmRunError {
    AsmRunError::new(AsmError::new(AsmErrorKind::Cli, msg, param), Vec::new())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a `NAME[=VAL]` define.
pub fn parse_define(arg: &str) -> Result<(String, i64), AsmRunError> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (arg.trim(), None),
    };
    if !is_identifier(name) {
        return Err(cli_error("Invalid -D/--define name", Some(arg)));
    }
    let value = match value {
        None => 1,
        Some(text) => parse_number(text, Span::default())
            .ok()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| cli_error("Invalid -D/--define value", Some(arg)))?,
    };
    Ok((name.to_string(), value))
}

fn default_extension(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "prg" => "prg",
        "ihex" | "intel" => "hex",
        "srec" | "s19" => "s19",
        "hex" => "txt",
        _ => "bin",
    }
}

/// Output path next to the input, named after its stem.
pub fn default_output_path(input: &Path, format: &str) -> PathBuf {
    input.with_extension(default_extension(format))
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    if cli.input.as_os_str().is_empty() {
        return Err(cli_error("No input file specified", None));
    }
    let cpu: CpuKind = cli
        .cpu
        .parse()
        .map_err(|err: AsmError| AsmRunError::new(err, Vec::new()))?;
    let sink = select_sink(&cli.format, cpu).map_err(|err| {
        cli_error(
            &err.to_string(),
            Some(&format!("formats are {}", FORMATS.join(", "))),
        )
    })?;
    if cli.max_passes == 0 {
        return Err(cli_error("--max-passes must be at least 1", None));
    }
    let defines = cli
        .defines
        .iter()
        .map(|arg| parse_define(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&cli.input, &cli.format),
    };
    if output == cli.input {
        return Err(cli_error(
            "Output file would overwrite the input",
            Some(&output.to_string_lossy()),
        ));
    }

    let mut include_paths = Vec::new();
    if let Some(dir) = cli.input.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        include_paths.push(dir.to_path_buf());
    }
    include_paths.extend(cli.include_paths.iter().cloned());

    Ok(CliConfig {
        input: cli.input.clone(),
        cpu,
        sink,
        output,
        include_paths,
        labels: cli.labels.clone(),
        labels_json: cli.labels_json.clone(),
        options: AssemblerOptions {
            case_sensitive: cli.case_sensitive,
            warnings_as_errors: cli.warnings_as_errors,
            warn_unreferenced: cli.warn_unreferenced,
            max_passes: cli.max_passes,
            defines,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags_and_repeatable_options() {
        let cli = Cli::parse_from([
            "retroforge",
            "prog.asm",
            "-c",
            "z80",
            "-f",
            "ihex",
            "-D",
            "DEBUG",
            "-D",
            "BASE=$c000",
            "-I",
            "lib",
            "-l",
            "prog.lbl",
            "--werror",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.input, PathBuf::from("prog.asm"));
        assert_eq!(cli.cpu, "z80");
        assert_eq!(cli.format, "ihex");
        assert_eq!(cli.defines, vec!["DEBUG".to_string(), "BASE=$c000".to_string()]);
        assert_eq!(cli.include_paths, vec![PathBuf::from("lib")]);
        assert_eq!(cli.labels, Some(PathBuf::from("prog.lbl")));
        assert!(cli.warnings_as_errors);
        assert!(!cli.case_sensitive);
        assert_eq!(cli.log_level, Level::DEBUG);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["retroforge", "prog.asm"]);
        assert_eq!(cli.cpu, "6502");
        assert_eq!(cli.format, "bin");
        assert_eq!(cli.log_level, Level::WARN);
        assert_eq!(cli.max_passes, DEFAULT_MAX_PASSES);
    }

    #[test]
    fn validate_cli_builds_options() {
        let cli = Cli::parse_from([
            "retroforge",
            "src/prog.asm",
            "-c",
            "6809",
            "-f",
            "srec",
            "-D",
            "LIMIT=%1010",
            "--case-sensitive",
        ]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.cpu, CpuKind::M6809);
        assert_eq!(config.sink.name(), "srec");
        assert_eq!(config.output, PathBuf::from("src/prog.s19"));
        assert_eq!(config.include_paths, vec![PathBuf::from("src")]);
        assert_eq!(config.options.defines, vec![("LIMIT".to_string(), 10)]);
        assert!(config.options.case_sensitive);
    }

    #[test]
    fn validate_cli_rejects_unknown_cpu_and_format_pairs() {
        let cli = Cli::parse_from(["retroforge", "prog.asm", "-c", "68000"]);
        let err = validate_cli(&cli).err().expect("unknown cpu");
        assert_eq!(err.error().kind(), AsmErrorKind::Cli);

        let cli = Cli::parse_from(["retroforge", "prog.asm", "-c", "z80", "-f", "prg"]);
        let err = validate_cli(&cli).err().expect("prg needs a 6502");
        assert!(err.to_string().contains("prg"));
    }

    #[test]
    fn validate_cli_refuses_to_overwrite_input() {
        let cli = Cli::parse_from(["retroforge", "prog.bin"]);
        let err = validate_cli(&cli).err().expect("same path");
        assert!(err.to_string().starts_with("Output file would overwrite the input"));
    }

    #[test]
    fn parse_define_defaults_to_one() {
        assert_eq!(parse_define("FAST").unwrap(), ("FAST".to_string(), 1));
        assert_eq!(parse_define("ORG=0x0800").unwrap(), ("ORG".to_string(), 0x800));
        assert!(parse_define("1BAD").is_err());
        assert!(parse_define("X=zz").is_err());
    }
}
