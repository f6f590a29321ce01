// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass assembler driver.
//!
//! Every pass rebuilds the scope graph and the code output from scratch and
//! walks the program tree once in source order. Names that are not defined
//! yet are answered from the previous pass's snapshot; a pass that cannot
//! settle a value asks for another one. Assembly succeeds on the first pass
//! that asks for nothing more, and fails after
//! [`AssemblerOptions::max_passes`].

pub mod cli;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use crate::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, DiagnosticLog, Severity,
};
use crate::core::assembler::listing::{symbols_json, write_symbols};
use crate::core::builtins::{constants, BUILTINS};
use crate::core::cpu::{CpuFamily, CpuKind};
use crate::core::expr::{
    apply_binary, evaluate, evaluate_integer, integer_value, EvalContext, EvalError,
    MAX_CALL_DEPTH,
};
use crate::core::family::{AssemblerContext, InstructionLine, ModeResolver};
use crate::core::loader::{FileReader, FsLoader, StreamFactory};
use crate::core::output::{CodeOutput, OutputError};
use crate::core::parser::{AssignOp, Expr, Label, LineAst};
use crate::core::scope::{
    search_anonymous, AnonymousTable, ExportedSymbol, ScopeError, ScopeGraph, ScopeId, ScopeKind,
    SymbolId, SymbolKind,
};
use crate::core::source::{
    function_signature, Block, BlockKind, Conditional, Location, Node, Program, ProgramBuilder,
    SourceLine,
};
use crate::core::tokenizer::{register_checker_from_fn, RegisterChecker, Span};
use crate::core::value::{Callable, FunctionBody, UserFunction, Value};
use crate::families::intel8080::{self, Intel8080Resolver};
use crate::families::m6800::{self, M6800Resolver};
use crate::families::mos6502::{self, Mos6502Resolver};

use cli::{validate_cli, Cli, CliConfig};

pub const DEFAULT_MAX_PASSES: u32 = 5;

/// Settings for one assembly run.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub case_sensitive: bool,
    pub warnings_as_errors: bool,
    pub warn_unreferenced: bool,
    pub max_passes: u32,
    /// Constants defined before the first statement, as with `-D`.
    pub defines: Vec<(String, i64)>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            warnings_as_errors: false,
            warn_unreferenced: false,
            max_passes: DEFAULT_MAX_PASSES,
            defines: Vec::new(),
        }
    }
}

/// Result of a converged run.
#[derive(Debug)]
pub struct Assembly {
    pub report: AsmRunReport,
    /// Load address and bytes; `None` when no code was emitted.
    pub image: Option<(u32, Vec<u8>)>,
    pub symbols: Vec<ExportedSymbol>,
    /// `.echo` output of the final pass.
    pub echoes: Vec<String>,
}

/// Register predicate handed to the line parser for a CPU's operand syntax.
pub fn register_checker(cpu: CpuKind) -> RegisterChecker {
    match cpu.family() {
        CpuFamily::Mos6502 => register_checker_from_fn(mos6502::is_register),
        CpuFamily::Intel8080 => register_checker_from_fn(intel8080::is_register),
        CpuFamily::Motorola6800 if cpu == CpuKind::M6800 => {
            register_checker_from_fn(m6800::is_m6800_register)
        }
        CpuFamily::Motorola6800 => register_checker_from_fn(m6800::is_register),
    }
}

/// Read `name` through `loader`, build the program tree and assemble it for
/// `cpu`.
pub fn assemble<L>(
    cpu: CpuKind,
    name: &str,
    loader: &L,
    options: &AssemblerOptions,
) -> Result<Assembly, AsmRunError>
where
    L: StreamFactory + FileReader,
{
    let program = ProgramBuilder::new(loader, register_checker(cpu))
        .build(name)
        .map_err(|err| AsmRunError::new(err, Vec::new()))?;
    debug!(
        cpu = %cpu,
        sources = program.sources.len(),
        "program tree built"
    );
    match cpu.family() {
        CpuFamily::Mos6502 => {
            assemble_program(&Mos6502Resolver::new(cpu), &program, loader, options)
        }
        CpuFamily::Intel8080 => {
            assemble_program(&Intel8080Resolver::new(cpu), &program, loader, options)
        }
        CpuFamily::Motorola6800 => {
            assemble_program(&M6800Resolver::new(cpu), &program, loader, options)
        }
    }
}

/// Run passes over an already built program until it converges.
pub fn assemble_program<R: ModeResolver>(
    resolver: &R,
    program: &Program,
    files: &dyn FileReader,
    options: &AssemblerOptions,
) -> Result<Assembly, AsmRunError> {
    let mut asm = Assembler::new(resolver, program, files, options);
    for pass in 1..=options.max_passes {
        asm.run_pass(pass);
        if !asm.pass_needed {
            debug!(passes = pass, "assembly converged");
            return asm.finish(pass);
        }
        debug!(
            pass,
            reason = asm.reason.as_deref().unwrap_or("unknown"),
            "another pass needed"
        );
        asm.keep_snapshot();
    }
    let detail = format!("no stable result after {} passes", options.max_passes);
    Err(AsmRunError::new(
        AsmError::new(AsmErrorKind::TooManyPasses, "Too many passes", Some(&detail)),
        asm.logged().into_entries(),
    ))
}

/// Assemble the file named on the command line and write the requested
/// outputs.
pub fn run(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    let config = validate_cli(cli)?;
    let input = config.input.to_string_lossy().into_owned();
    info!(input = %input, cpu = %config.cpu, "assembling");
    let loader = FsLoader::new(config.include_paths.clone());
    let assembly = assemble(config.cpu, &input, &loader, &config.options)?;
    write_outputs(&config, &assembly)?;
    info!(passes = assembly.report.passes(), "done");
    Ok(assembly.report)
}

fn write_outputs(config: &CliConfig, assembly: &Assembly) -> Result<(), AsmRunError> {
    match &assembly.image {
        Some((start, bytes)) => {
            let rendered = config.sink.render(*start, bytes).map_err(|err| {
                AsmRunError::new(
                    AsmError::new(AsmErrorKind::Cli, &err.to_string(), None),
                    Vec::new(),
                )
            })?;
            fs::write(&config.output, rendered).map_err(|err| io_error(&config.output, err))?;
            info!(
                path = %config.output.display(),
                start = *start,
                bytes = bytes.len(),
                "image written"
            );
        }
        None => warn!("no code emitted, {} not written", config.output.display()),
    }
    if let Some(path) = &config.labels {
        let file = File::create(path).map_err(|err| io_error(path, err))?;
        let mut out = BufWriter::new(file);
        write_symbols(&mut out, &assembly.symbols)
            .and_then(|()| out.flush())
            .map_err(|err| io_error(path, err))?;
    }
    if let Some(path) = &config.labels_json {
        let json = symbols_json(&assembly.symbols);
        let text = serde_json::to_string_pretty(&json).map_err(|err| {
            AsmRunError::new(
                AsmError::new(AsmErrorKind::Internal, &err.to_string(), None),
                Vec::new(),
            )
        })?;
        fs::write(path, text).map_err(|err| io_error(path, err))?;
    }
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(
            AsmErrorKind::Io,
            &format!("Cannot write {}", path.display()),
            Some(&err.to_string()),
        ),
        Vec::new(),
    )
}

/// Values carried from one pass into the next.
#[derive(Debug, Default)]
struct PassSnapshot {
    values: HashMap<String, Value>,
    anonymous: HashMap<String, AnonymousTable>,
}

struct Assembler<'a, R: ModeResolver> {
    resolver: &'a R,
    program: &'a Program,
    files: &'a dyn FileReader,
    options: &'a AssemblerOptions,
    scopes: ScopeGraph,
    output: CodeOutput,
    pass: u32,
    pass_needed: bool,
    reason: Option<String>,
    diagnostics: Vec<Diagnostic>,
    echoes: Vec<String>,
    previous: PassSnapshot,
    /// Snapshot keys answered for names not defined yet in this pass.
    snapshot_hits: HashSet<String>,
    line: Option<Rc<SourceLine>>,
    calls: usize,
    function_depth: usize,
    returning: Option<Value>,
}

impl<'a, R: ModeResolver> Assembler<'a, R> {
    fn new(
        resolver: &'a R,
        program: &'a Program,
        files: &'a dyn FileReader,
        options: &'a AssemblerOptions,
    ) -> Self {
        Self {
            resolver,
            program,
            files,
            options,
            scopes: ScopeGraph::new(options.case_sensitive),
            output: CodeOutput::new(),
            pass: 0,
            pass_needed: false,
            reason: None,
            diagnostics: Vec::new(),
            echoes: Vec::new(),
            previous: PassSnapshot::default(),
            snapshot_hits: HashSet::new(),
            line: None,
            calls: 0,
            function_depth: 0,
            returning: None,
        }
    }

    fn run_pass(&mut self, pass: u32) {
        debug!(pass, "pass started");
        self.pass = pass;
        self.scopes = ScopeGraph::new(self.options.case_sensitive);
        self.output = CodeOutput::new();
        self.pass_needed = false;
        self.reason = None;
        self.diagnostics.clear();
        self.echoes.clear();
        self.snapshot_hits.clear();
        self.line = None;
        self.calls = 0;
        self.function_depth = 0;
        self.returning = None;
        self.seed();

        let program = self.program;
        if let Err(err) = self.walk(&program.nodes) {
            self.report(err);
        }
        debug!(
            pass,
            pc = self.output.program_counter(),
            diagnostics = self.diagnostics.len(),
            pass_needed = self.pass_needed,
            "pass finished"
        );
    }

    fn seed(&mut self) {
        for builtin in BUILTINS {
            let value = Value::Callable(Rc::new(Callable::Builtin(builtin)));
            let _ = self
                .scopes
                .define(builtin.name, SymbolKind::Constant(value), None, true);
        }
        for (name, value) in constants() {
            let _ = self
                .scopes
                .define(name, SymbolKind::Constant(value), None, true);
        }
        let options = self.options;
        for (name, value) in &options.defines {
            let defined = self.scopes.define(
                name,
                SymbolKind::Constant(Value::Integer(*value)),
                None,
                true,
            );
            if defined.is_err() {
                self.report(AsmError::new(
                    AsmErrorKind::SymbolRedefinition,
                    "Cannot redefine a built-in symbol",
                    Some(name),
                ));
            }
        }
    }

    fn keep_snapshot(&mut self) {
        self.previous = PassSnapshot {
            values: self.scopes.snapshot(),
            anonymous: self.scopes.anonymous_tables(),
        };
    }

    fn logged(&mut self) -> DiagnosticLog {
        let mut log = DiagnosticLog::new(self.options.warnings_as_errors);
        for diagnostic in self.diagnostics.drain(..) {
            log.push(diagnostic);
        }
        log
    }

    fn finish(mut self, passes: u32) -> Result<Assembly, AsmRunError> {
        if self.options.warn_unreferenced {
            self.warn_unreferenced();
        }
        for echo in &self.echoes {
            info!("{echo}");
        }
        let log = self.logged();
        if log.has_errors() {
            let kind = log
                .entries()
                .iter()
                .find(|d| d.severity() == Severity::Error)
                .map_or(AsmErrorKind::Internal, |d| d.error().kind());
            let count = format!("{} error(s)", log.error_count());
            return Err(AsmRunError::new(
                AsmError::new(kind, "Errors detected in source. No output written", Some(&count)),
                log.into_entries(),
            ));
        }
        Ok(Assembly {
            report: AsmRunReport::new(log.into_entries(), passes),
            image: self.output.bytes(),
            symbols: self.scopes.export(),
            echoes: self.echoes,
        })
    }

    fn warn_unreferenced(&mut self) {
        let unused: Vec<(String, Option<Location>)> = self
            .scopes
            .unreferenced()
            .into_iter()
            .filter(|sym| !matches!(sym.kind, SymbolKind::Scope))
            .filter(|sym| {
                let key = self.scopes.qualified_key(sym.scope, &sym.name);
                !self.snapshot_hits.contains(&key)
            })
            .map(|sym| (sym.name.clone(), sym.location))
            .collect();
        for (name, location) in unused {
            let error = AsmError::new(AsmErrorKind::Unreferenced, "Symbol is never used", Some(&name));
            let diagnostic = self.diagnostic(Severity::Warning, error, location);
            self.diagnostics.push(diagnostic);
        }
    }

    fn diagnostic(
        &self,
        severity: Severity,
        error: AsmError,
        location: Option<Location>,
    ) -> Diagnostic {
        let current = self.line.as_deref();
        let source = location
            .map(|loc| loc.source)
            .or(current.map(|line| line.source));
        let span = error.span().or(location.map(|loc| loc.span));
        let line = span
            .map(|span| span.line)
            .filter(|&line| line > 0)
            .or(current.map(|line| line.line))
            .unwrap_or(0);
        let column = span.map(|span| span.col_start).filter(|&col| col > 0);
        let file = source
            .and_then(|source| self.program.source_name(source))
            .map(str::to_string);
        let text = source
            .and_then(|source| self.program.source_text(source, line))
            .map(str::to_string);
        Diagnostic::new(line, severity, error)
            .with_column(column)
            .with_file(file)
            .with_source(text)
    }

    fn report(&mut self, error: AsmError) {
        trace!(pass = self.pass, error = %error, "statement error");
        let diagnostic = self.diagnostic(Severity::Error, error, None);
        self.diagnostics.push(diagnostic);
    }

    fn warn(&mut self, error: AsmError) {
        let diagnostic = self.diagnostic(Severity::Warning, error, None);
        self.diagnostics.push(diagnostic);
    }

    fn request_pass(&mut self, reason: impl FnOnce() -> String) {
        if !self.pass_needed {
            self.pass_needed = true;
            self.reason = Some(reason());
        }
    }

    fn position(&self) -> usize {
        self.line.as_ref().map_or(0, |line| line.position)
    }

    fn value_of(&mut self, expr: &Expr) -> Result<Value, AsmError> {
        Ok(evaluate(expr, self)?)
    }

    fn integer(
        &mut self,
        expr: &Expr,
        range: Option<std::ops::RangeInclusive<i64>>,
    ) -> Result<Option<i64>, AsmError> {
        Ok(evaluate_integer(expr, self, range)?)
    }

    fn emit(&mut self, bytes: &[u8], span: Span) -> Result<(), AsmError> {
        self.output
            .emit(bytes)
            .map_err(|err| output_error(err, span))
    }

    /// Compare a label or constant with the previous pass.
    fn check_settled(&mut self, id: SymbolId, value: &Value) {
        if self.pass == 1 || self.function_depth > 0 || contains_callable(value) {
            return;
        }
        let symbol = self.scopes.symbol(id);
        let key = self.scopes.qualified_key(symbol.scope, &symbol.name);
        let settled = self
            .previous
            .values
            .get(&key)
            .is_some_and(|old| old.equals(value));
        if !settled {
            self.request_pass(|| format!("{key} changed to {value}"));
        }
    }

    fn walk(&mut self, nodes: &[Node]) -> Result<(), AsmError> {
        for node in nodes {
            if self.returning.is_some() {
                break;
            }
            let result = match node {
                Node::Line(line) => self.visit_line(line),
                Node::Block(block) => self.visit_block(block),
                Node::Conditional(cond) => self.visit_conditional(cond),
            };
            if let Err(err) = result {
                if self.function_depth > 0 {
                    return Err(err);
                }
                self.report(err);
            }
        }
        Ok(())
    }

    fn visit_line(&mut self, line: &Rc<SourceLine>) -> Result<(), AsmError> {
        self.line = Some(Rc::clone(line));
        trace!(line = line.line, text = %line.text, "statement");
        let ast = line.ast.as_ref().map_err(|err| AsmError::from(err.clone()))?;
        match ast {
            LineAst::Empty | LineAst::Conditional { .. } => Ok(()),
            LineAst::Assignment {
                label, op, expr, ..
            } => self.assignment(line, label, *op, expr),
            LineAst::Statement {
                label,
                mnemonic,
                operands,
                span,
            } => self.statement(line, label.as_ref(), mnemonic.as_deref(), operands, *span),
        }
    }

    fn statement(
        &mut self,
        line: &SourceLine,
        label: Option<&Label>,
        mnemonic: Option<&str>,
        operands: &[Expr],
        span: Span,
    ) -> Result<(), AsmError> {
        let directive = mnemonic.filter(|m| m.starts_with('.'));
        if self.function_depth > 0 {
            if label.is_some() {
                return Err(AsmError::at(
                    AsmErrorKind::Directive,
                    "Labels are not allowed in a function body",
                    span,
                ));
            }
            return match (directive, mnemonic) {
                (_, None) => Ok(()),
                (
                    Some(name @ (".return" | ".echo" | ".warn" | ".error" | ".assert" | ".import")),
                    _,
                ) => self.directive(name, operands, span),
                (_, Some(other)) => Err(AsmError::at(
                    AsmErrorKind::Directive,
                    format!("{other} is not allowed in a function body"),
                    span,
                )),
            };
        }

        // A label on `.org` names the new address.
        if directive == Some(".org") {
            self.directive(".org", operands, span)?;
            self.define_line_label(line, label);
            return Ok(());
        }
        self.define_line_label(line, label);
        match (directive, mnemonic) {
            (_, None) => Ok(()),
            (Some(name), _) => self.directive(name, operands, span),
            (None, Some(mnemonic)) => self.instruction(mnemonic, operands, span),
        }
    }

    /// Define the label of a statement at the current address. Errors are
    /// reported here so the statement itself still assembles.
    fn define_line_label(&mut self, line: &SourceLine, label: Option<&Label>) -> Option<SymbolId> {
        let label = label?;
        let pc = self.output.program_counter();
        if label.is_anonymous() {
            self.scopes
                .define_anonymous(line.position, label.name == "+", pc);
            if self.pass > 1 {
                let key = self.scopes.scope_key(self.scopes.current());
                let previous = self
                    .previous
                    .anonymous
                    .get(&key)
                    .and_then(|table| table.get(&line.position))
                    .map(|anon| anon.address);
                if previous != Some(pc) {
                    self.request_pass(|| format!("anonymous label on line {} moved", line.line));
                }
            }
            return None;
        }
        let defined = self.scopes.define_label(
            &label.name,
            pc,
            self.output.bank(),
            Some(line.location(label.span)),
        );
        match defined {
            Ok(id) => {
                self.check_settled(id, &Value::Integer(pc));
                Some(id)
            }
            Err(err) => {
                self.report(scope_error(err, label.span));
                None
            }
        }
    }

    fn assignment(
        &mut self,
        line: &SourceLine,
        label: &Label,
        op: AssignOp,
        expr: &Expr,
    ) -> Result<(), AsmError> {
        let location = Some(line.location(label.span));
        if let Some(binary) = op.binary_op() {
            let id = self.scopes.lookup(&label.name).ok_or_else(|| {
                AsmError::at(
                    AsmErrorKind::SymbolNotFound,
                    format!("Symbol not found: {}", label.name),
                    label.span,
                )
            })?;
            let current = self.scopes.symbol(id).value().unwrap_or_default();
            let rhs = self.value_of(expr)?;
            let value = apply_binary(binary, current, rhs, label.span)?;
            return self
                .scopes
                .assign(id, value)
                .map_err(|err| scope_error(err, label.span));
        }

        let value = self.value_of(expr)?;
        if op == AssignOp::Var {
            let existing = self
                .scopes
                .find(&label.name)
                .filter(|id| matches!(self.scopes.symbol(*id).kind, SymbolKind::Variable(_)));
            return match existing {
                Some(id) => self.scopes.assign(id, value),
                None => self
                    .scopes
                    .define(&label.name, SymbolKind::Variable(value), location, false)
                    .map(|_| ()),
            }
            .map_err(|err| scope_error(err, label.span));
        }
        let id = self
            .scopes
            .define(&label.name, SymbolKind::Constant(value.clone()), location, false)
            .map_err(|err| scope_error(err, label.span))?;
        self.check_settled(id, &value);
        Ok(())
    }

    fn instruction(
        &mut self,
        mnemonic: &str,
        operands: &[Expr],
        span: Span,
    ) -> Result<(), AsmError> {
        let line = InstructionLine::parse(mnemonic, operands, span)?;
        let resolver = self.resolver;
        if !resolver.supports_mnemonic(line.mnemonic) {
            return Err(AsmError::at(
                AsmErrorKind::Syntax,
                format!(
                    "Unknown instruction for {}: {}",
                    resolver.cpu(),
                    line.mnemonic.to_ascii_uppercase()
                ),
                span,
            ));
        }
        let bytes = resolver.assemble(&line, self)?;
        self.emit(&bytes, span)
    }

    fn directive(&mut self, name: &str, operands: &[Expr], span: Span) -> Result<(), AsmError> {
        match name {
            ".org" => {
                let [address] = operands else {
                    return Err(arity(name, "an address", span));
                };
                if let Some(address) = self.integer(address, None)? {
                    self.output
                        .set_pc(address)
                        .map_err(|err| output_error(err, span))?;
                }
                Ok(())
            }
            ".bank" => {
                let [bank] = operands else {
                    return Err(arity(name, "a bank number", span));
                };
                if let Some(bank) = self.integer(bank, None)? {
                    self.output
                        .set_bank(bank)
                        .map_err(|err| output_error(err, span))?;
                }
                Ok(())
            }
            ".align" => {
                let (amount, fill) = match operands {
                    [amount] => (amount, None),
                    [amount, fill] => (amount, Some(fill)),
                    _ => return Err(arity(name, "an amount and an optional fill byte", span)),
                };
                let fill = match fill {
                    Some(fill) => self.integer(fill, Some(-128..=0xFF))?.map(|v| v as u8),
                    None => None,
                };
                if let Some(amount) = self.integer(amount, Some(1..=0xFFFF))? {
                    self.output
                        .align(amount, fill)
                        .map_err(|err| output_error(err, span))?;
                }
                Ok(())
            }
            ".fill" => {
                let (count, value) = match operands {
                    [count] => (count, None),
                    [count, value] => (count, Some(value)),
                    _ => return Err(arity(name, "a count and an optional value", span)),
                };
                let count = self.integer(count, Some(0..=0xFFFF))?.unwrap_or(0) as usize;
                let pattern = match value {
                    Some(value) => {
                        let value = self.value_of(value)?;
                        let mut pattern = Vec::new();
                        push_data(&mut pattern, &value, 1, self.big_endian(), span)?;
                        pattern
                    }
                    None => Vec::new(),
                };
                self.output
                    .fill(count, &pattern)
                    .map_err(|err| output_error(err, span))
            }
            ".ds" => {
                let [count] = operands else {
                    return Err(arity(name, "a size", span));
                };
                let count = self.integer(count, Some(0..=0xFFFF))?.unwrap_or(0) as usize;
                self.output
                    .emit_uninitialized(count)
                    .map_err(|err| output_error(err, span))
            }
            ".byte" | ".text" => self.data(operands, 1, false, span),
            ".cstring" => self.data(operands, 1, true, span),
            ".word" => self.data(operands, 2, false, span),
            ".long" => self.data(operands, 3, false, span),
            ".dword" => self.data(operands, 4, false, span),
            ".poke" => {
                let [address, value] = operands else {
                    return Err(arity(name, "an address and a value", span));
                };
                let address = self.integer(address, Some(0..=0xFF_FFFF))?;
                let value = self.integer(value, Some(-128..=0xFF))?;
                if let (Some(address), Some(value)) = (address, value) {
                    self.output
                        .poke(address, value as u8)
                        .map_err(|err| output_error(err, span))?;
                }
                Ok(())
            }
            ".binary" => self.binary(operands, span),
            ".import" => {
                let [Expr::Identifier(scope, scope_span)] = operands else {
                    return Err(arity(name, "a namespace name", span));
                };
                self.scopes
                    .import(scope)
                    .map_err(|err| scope_error(err, *scope_span))
            }
            ".echo" => {
                let text = self.message(operands)?;
                self.echoes.push(text);
                Ok(())
            }
            ".warn" => {
                let text = self.message(operands)?;
                self.warn(AsmError::at(AsmErrorKind::User, text, span));
                Ok(())
            }
            ".error" => {
                let text = self.message(operands)?;
                Err(AsmError::at(AsmErrorKind::User, text, span))
            }
            ".assert" => {
                let [condition, message @ ..] = operands else {
                    return Err(arity(name, "a condition", span));
                };
                let value = self.value_of(condition)?;
                if value.is_undefined() || value.is_truthy() {
                    return Ok(());
                }
                let text = if message.is_empty() {
                    "Assertion failed".to_string()
                } else {
                    self.message(message)?
                };
                Err(AsmError::at(AsmErrorKind::User, text, span))
            }
            ".return" => {
                if self.function_depth == 0 {
                    return Err(AsmError::at(
                        AsmErrorKind::Directive,
                        ".return outside of a function",
                        span,
                    ));
                }
                let value = match operands {
                    [] => Value::Undefined,
                    [value] => self.value_of(value)?,
                    _ => return Err(arity(name, "at most one value", span)),
                };
                self.returning = Some(value);
                Ok(())
            }
            other => Err(AsmError::at(
                AsmErrorKind::Directive,
                format!("Unknown directive: {other}"),
                span,
            )),
        }
    }

    fn big_endian(&self) -> bool {
        self.resolver.cpu().is_big_endian()
    }

    fn data(
        &mut self,
        operands: &[Expr],
        width: usize,
        terminate: bool,
        span: Span,
    ) -> Result<(), AsmError> {
        let mut bytes = Vec::new();
        for expr in operands {
            let value = self.value_of(expr)?;
            push_data(&mut bytes, &value, width, self.big_endian(), expr.span())?;
        }
        if terminate {
            bytes.push(0);
        }
        self.emit(&bytes, span)
    }

    fn binary(&mut self, operands: &[Expr], span: Span) -> Result<(), AsmError> {
        let Some((file, rest)) = operands.split_first() else {
            return Err(arity(".binary", "a file name", span));
        };
        let name = match self.value_of(file)? {
            Value::String(name) => name.to_string(),
            other => {
                return Err(AsmError::at(
                    AsmErrorKind::TypeMismatch,
                    format!("Expected a file name, found {}", other.type_name()),
                    file.span(),
                ))
            }
        };
        if rest.len() > 2 {
            return Err(arity(".binary", "a file name, offset and size", span));
        }
        let data = self.files.read_all_bytes(&name).map_err(|err| {
            AsmError::at(AsmErrorKind::Io, format!("Cannot read {name}: {err}"), file.span())
        })?;
        let len = data.len() as i64;
        let offset = match rest.first() {
            Some(expr) => self.integer(expr, Some(0..=len))?.unwrap_or(0),
            None => 0,
        };
        let size = match rest.get(1) {
            Some(expr) => self.integer(expr, Some(0..=len - offset))?.unwrap_or(0),
            None => len - offset,
        };
        let start = offset as usize;
        self.emit(&data[start..start + size as usize], span)
    }

    fn message(&mut self, operands: &[Expr]) -> Result<String, AsmError> {
        let mut text = String::new();
        for expr in operands {
            let value = self.value_of(expr)?;
            text.push_str(&value.to_string());
        }
        Ok(text)
    }

    fn visit_block(&mut self, block: &Block) -> Result<(), AsmError> {
        self.line = Some(Rc::clone(&block.open));
        let (label, operands, span) = match &block.open.ast {
            Ok(LineAst::Statement {
                label,
                operands,
                span,
                ..
            }) => (label.as_ref(), operands.as_slice(), *span),
            Ok(_) => {
                return Err(AsmError::new(
                    AsmErrorKind::Internal,
                    "Block opened by a non-statement line",
                    None,
                ))
            }
            Err(err) => return Err(err.clone().into()),
        };
        if block.kind == BlockKind::Function {
            return self.define_function(block, label, operands, span);
        }
        if self.function_depth > 0 {
            return Err(AsmError::at(
                AsmErrorKind::Directive,
                "Only functions may be nested in a function body",
                span,
            ));
        }

        let label_id = self.define_line_label(&block.open, label);
        match block.kind {
            BlockKind::Block => {
                let entered = label_id.and_then(|id| self.scopes.enter_label(id));
                if entered.is_none() {
                    self.scopes
                        .open_scope(None, ScopeKind::Anonymous, None)
                        .map_err(|err| scope_error(err, span))?;
                }
                self.walk(&block.body)?;
                self.close_scope(block, span)
            }
            BlockKind::Namespace => {
                let (name, name_span) = scope_name(operands, ".namespace", span)?;
                self.scopes
                    .open_scope(
                        Some(name),
                        ScopeKind::Namespace,
                        Some(block.open.location(name_span)),
                    )
                    .map_err(|err| scope_error(err, name_span))?;
                self.walk(&block.body)?;
                self.close_scope(block, span)
            }
            BlockKind::Enum => {
                let (name, name_span) = scope_name(operands, ".enum", span)?;
                self.scopes
                    .open_scope(Some(name), ScopeKind::Enum, Some(block.open.location(name_span)))
                    .map_err(|err| scope_error(err, name_span))?;
                self.enum_members(&block.body);
                self.close_scope(block, span)
            }
            BlockKind::Relocate => {
                let [address] = operands else {
                    return Err(arity(".relocate", "an address", span));
                };
                if let Some(address) = self.integer(address, None)? {
                    self.output
                        .relocate(address)
                        .map_err(|err| output_error(err, span))?;
                }
                self.walk(&block.body)?;
                self.line = Some(Rc::clone(&block.close));
                self.output.end_relocate();
                Ok(())
            }
            BlockKind::Function => Ok(()),
        }
    }

    fn close_scope(&mut self, block: &Block, span: Span) -> Result<(), AsmError> {
        self.line = Some(Rc::clone(&block.close));
        self.scopes
            .pop()
            .map(|_| ())
            .map_err(|err| scope_error(err, span))
    }

    fn enum_members(&mut self, nodes: &[Node]) {
        let mut next = 0;
        for node in nodes {
            let Node::Line(line) = node else {
                self.report(AsmError::new(
                    AsmErrorKind::Directive,
                    "Only members are allowed in an enum",
                    None,
                ));
                continue;
            };
            self.line = Some(Rc::clone(line));
            if let Err(err) = self.enum_member(line, &mut next) {
                self.report(err);
            }
        }
    }

    fn enum_member(&mut self, line: &SourceLine, next: &mut i64) -> Result<(), AsmError> {
        let ast = line.ast.as_ref().map_err(|err| AsmError::from(err.clone()))?;
        let (label, value) = match ast {
            LineAst::Empty => return Ok(()),
            LineAst::Statement {
                label: Some(label),
                mnemonic: None,
                ..
            } => (label, Value::Integer(*next)),
            LineAst::Assignment {
                label,
                op: AssignOp::Const,
                expr,
                ..
            } => (label, self.value_of(expr)?),
            _ => {
                return Err(AsmError::new(
                    AsmErrorKind::Directive,
                    "Expected an enum member",
                    None,
                ))
            }
        };
        if let Some(n) = integer_value(&value, label.span)? {
            *next = n + 1;
        }
        let id = self
            .scopes
            .define(
                &label.name,
                SymbolKind::Constant(value.clone()),
                Some(line.location(label.span)),
                false,
            )
            .map_err(|err| scope_error(err, label.span))?;
        self.check_settled(id, &value);
        Ok(())
    }

    fn define_function(
        &mut self,
        block: &Block,
        label: Option<&Label>,
        operands: &[Expr],
        span: Span,
    ) -> Result<(), AsmError> {
        if let Some(label) = label {
            return Err(AsmError::at(
                AsmErrorKind::Directive,
                "A function is named by its signature, not a label",
                label.span,
            ));
        }
        let [signature] = operands else {
            return Err(arity(".function", "a signature", span));
        };
        let (name, params) = function_signature(signature)?;
        let function = UserFunction {
            name: Some(name.clone()),
            params,
            body: FunctionBody::Block(Rc::clone(&block.body)),
            scope: self.scopes.current(),
        };
        let value = Value::Callable(Rc::new(Callable::User(function)));
        self.scopes
            .define(
                &name,
                SymbolKind::Constant(value),
                Some(block.open.location(signature.span())),
                false,
            )
            .map_err(|err| scope_error(err, signature.span()))?;
        Ok(())
    }

    fn visit_conditional(&mut self, cond: &Conditional) -> Result<(), AsmError> {
        for branch in &cond.branches {
            self.line = Some(Rc::clone(&branch.line));
            let taken = match &branch.condition {
                None => true,
                Some(expr) => match self.value_of(expr)? {
                    Value::Undefined => false,
                    value @ (Value::Boolean(_)
                    | Value::Integer(_)
                    | Value::Float(_)
                    | Value::Char(_)) => value.is_truthy(),
                    other => {
                        return Err(AsmError::at(
                            AsmErrorKind::TypeMismatch,
                            format!("Condition must be a boolean, found {}", other.type_name()),
                            expr.span(),
                        ))
                    }
                },
            };
            if taken {
                return self.walk(&branch.body);
            }
        }
        Ok(())
    }
}

impl<R: ModeResolver> EvalContext for Assembler<'_, R> {
    fn resolve(&mut self, name: &str, span: Span) -> Result<Value, EvalError> {
        if let Some(id) = self.scopes.lookup(name) {
            return self.scopes.symbol(id).value().ok_or_else(|| {
                EvalError::type_mismatch(format!("{name} is a scope, not a value"), span)
            });
        }
        let remembered = self
            .scopes
            .candidate_keys(name)
            .into_iter()
            .find_map(|key| self.previous.values.get(&key).map(|v| (key, v.clone())));
        if let Some((key, value)) = remembered {
            if contains_callable(&value) {
                return Err(EvalError::new(
                    AsmErrorKind::Directive,
                    format!("Function {name} must be defined before it is used"),
                    span,
                ));
            }
            self.snapshot_hits.insert(key);
            return Ok(value);
        }
        if self.pass == 1 {
            self.request_pass(|| format!("{name} is not defined yet"));
            return Ok(Value::Undefined);
        }
        Err(EvalError::new(
            AsmErrorKind::SymbolNotFound,
            format!("Symbol not found: {name}"),
            span,
        ))
    }

    fn anonymous(&mut self, forward: bool, depth: usize, span: Span) -> Result<Value, EvalError> {
        let position = self.position();
        if let Some(address) = self.scopes.find_anonymous(position, forward, depth) {
            return Ok(Value::Integer(address));
        }
        let remembered = self.scopes.visible_scope_keys().iter().find_map(|key| {
            self.previous
                .anonymous
                .get(key)
                .and_then(|table| search_anonymous(table, position, forward, depth))
        });
        if let Some(address) = remembered {
            return Ok(Value::Integer(address));
        }
        if self.pass == 1 {
            self.request_pass(|| "anonymous label not defined yet".to_string());
            return Ok(Value::Undefined);
        }
        let marker = if forward { "+" } else { "-" };
        Err(EvalError::new(
            AsmErrorKind::SymbolNotFound,
            format!("No anonymous label {}", marker.repeat(depth.max(1))),
            span,
        ))
    }

    fn program_counter(&self) -> i64 {
        self.output.program_counter()
    }

    fn capture_scope(&self) -> ScopeId {
        self.scopes.current()
    }

    fn enter_call(&mut self, captured: ScopeId, span: Span) -> Result<(), EvalError> {
        if self.calls >= MAX_CALL_DEPTH {
            return Err(EvalError::illegal_quantity(
                format!("Function calls nested deeper than {MAX_CALL_DEPTH}"),
                span,
            ));
        }
        self.calls += 1;
        self.scopes.enter_call(captured);
        Ok(())
    }

    fn bind_argument(&mut self, name: &str, value: Value, span: Span) -> Result<(), EvalError> {
        self.scopes
            .define(name, SymbolKind::Variable(value), None, false)
            .map(|_| ())
            .map_err(|err| EvalError::new(AsmErrorKind::SymbolRedefinition, err.to_string(), span))
    }

    fn leave_call(&mut self) {
        self.calls = self.calls.saturating_sub(1);
        let _ = self.scopes.pop();
    }

    fn run_block(&mut self, body: &[Node], span: Span) -> Result<Value, EvalError> {
        let saved_line = self.line.clone();
        let saved_return = self.returning.take();
        self.function_depth += 1;
        let result = self.walk(body);
        self.function_depth -= 1;
        let value = self.returning.take().unwrap_or_default();
        self.returning = saved_return;
        self.line = saved_line;
        result
            .map(|()| value)
            .map_err(|err| EvalError::new(err.kind(), err.message(), err.span().unwrap_or(span)))
    }
}

impl<R: ModeResolver> AssemblerContext for Assembler<'_, R> {
    fn eval(&mut self) -> &mut dyn EvalContext {
        self
    }

    fn pass_needed(&self) -> bool {
        self.pass_needed
    }

    fn defer_error(&mut self, error: AsmError) {
        // Later passes get here only after labels settled or were already
        // flagged as moving.
        if self.pass == 1 {
            self.request_pass(|| format!("deferred error: {}", error.message()));
        }
        self.report(error);
    }
}

/// Append `value` as `width`-byte data. Strings are only allowed as bytes.
fn push_data(
    bytes: &mut Vec<u8>,
    value: &Value,
    width: usize,
    big_endian: bool,
    span: Span,
) -> Result<(), AsmError> {
    match value {
        Value::String(text) if width == 1 => bytes.extend_from_slice(text.as_bytes()),
        Value::Array(items) => {
            for item in items.iter() {
                push_data(bytes, item, width, big_endian, span)?;
            }
        }
        Value::Undefined => bytes.resize(bytes.len() + width, 0),
        other => {
            let n = integer_value(other, span)?.unwrap_or(0);
            bytes.extend(number_bytes(n, width, big_endian, span)?);
        }
    }
    Ok(())
}

fn number_bytes(value: i64, width: usize, big_endian: bool, span: Span) -> Result<Vec<u8>, AsmError> {
    let bits = 8 * width as u32;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if !(min..=max).contains(&value) {
        return Err(AsmError::at(
            AsmErrorKind::IllegalQuantity,
            format!("Illegal quantity: {value} does not fit in {width} byte(s)"),
            span,
        ));
    }
    let mut out = value.to_le_bytes()[..width].to_vec();
    if big_endian {
        out.reverse();
    }
    Ok(out)
}

fn contains_callable(value: &Value) -> bool {
    match value {
        Value::Callable(_) => true,
        Value::Array(items) => items.iter().any(contains_callable),
        Value::Dictionary(entries) => entries.iter().any(|(_, v)| contains_callable(v)),
        _ => false,
    }
}

fn scope_name<'e>(operands: &'e [Expr], directive: &str, span: Span) -> Result<(&'e str, Span), AsmError> {
    match operands {
        [Expr::Identifier(name, name_span)] => Ok((name.as_str(), *name_span)),
        _ => Err(arity(directive, "a name", span)),
    }
}

fn arity(directive: &str, expected: &str, span: Span) -> AsmError {
    AsmError::at(
        AsmErrorKind::Syntax,
        format!("{directive} expects {expected}"),
        span,
    )
}

fn scope_error(err: ScopeError, span: Span) -> AsmError {
    let kind = match err {
        ScopeError::Redefinition(_) => AsmErrorKind::SymbolRedefinition,
        ScopeError::NotFound(_) => AsmErrorKind::SymbolNotFound,
        ScopeError::NotAScope(_) => AsmErrorKind::TypeMismatch,
        ScopeError::PopGlobal => AsmErrorKind::Internal,
    };
    AsmError::at(kind, err.to_string(), span)
}

fn output_error(err: OutputError, span: Span) -> AsmError {
    let kind = match err {
        OutputError::InvalidAddress(..) => AsmErrorKind::IllegalQuantity,
        _ => AsmErrorKind::ProgramOverflow,
    };
    AsmError::at(kind, err.to_string(), span)
}
