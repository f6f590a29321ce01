// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Program tree built from parsed source lines.
//!
//! Lines are grouped into blocks and conditionals once, before the first
//! pass. Includes are spliced in at this point so every pass walks the same
//! tree and statement positions stay stable.

use std::io::BufRead;
use std::rc::Rc;

use tracing::debug;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::loader::StreamFactory;
use crate::core::parser::{parse_source_line, BinaryOp, Expr, LineAst, Param, ParseError};
use crate::core::tokenizer::{ConditionalKind, RegisterChecker, Span};

pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Source file index plus span within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub source: usize,
    pub span: Span,
}

#[derive(Debug)]
pub struct SourceFile {
    pub name: String,
    pub lines: Vec<String>,
}

#[derive(Debug)]
pub struct SourceLine {
    /// Ordinal of the statement in the whole program.
    pub position: usize,
    pub source: usize,
    pub line: u32,
    pub text: String,
    pub ast: Result<LineAst, ParseError>,
}

impl SourceLine {
    pub fn location(&self, span: Span) -> Location {
        Location {
            source: self.source,
            span,
        }
    }

    /// Lower-case directive name, if the line is a `.directive` statement.
    pub fn directive(&self) -> Option<&str> {
        match &self.ast {
            Ok(LineAst::Statement {
                mnemonic: Some(m), ..
            }) if m.starts_with('.') => Some(m.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Block,
    Namespace,
    Enum,
    Function,
    Relocate,
}

impl BlockKind {
    fn from_directive(name: &str) -> Option<(BlockKind, bool)> {
        Some(match name {
            ".block" => (BlockKind::Block, true),
            ".endblock" => (BlockKind::Block, false),
            ".namespace" => (BlockKind::Namespace, true),
            ".endnamespace" => (BlockKind::Namespace, false),
            ".enum" => (BlockKind::Enum, true),
            ".endenum" => (BlockKind::Enum, false),
            ".function" => (BlockKind::Function, true),
            ".endfunction" => (BlockKind::Function, false),
            ".relocate" => (BlockKind::Relocate, true),
            ".endrelocate" => (BlockKind::Relocate, false),
            _ => return None,
        })
    }

    fn close_directive(self) -> &'static str {
        match self {
            BlockKind::Block => ".endblock",
            BlockKind::Namespace => ".endnamespace",
            BlockKind::Enum => ".endenum",
            BlockKind::Function => ".endfunction",
            BlockKind::Relocate => ".endrelocate",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Line(Rc<SourceLine>),
    Block(Rc<Block>),
    Conditional(Rc<Conditional>),
}

#[derive(Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub open: Rc<SourceLine>,
    pub body: Rc<[Node]>,
    pub close: Rc<SourceLine>,
}

#[derive(Debug)]
pub struct Branch {
    pub line: Rc<SourceLine>,
    /// `None` for `.else`.
    pub condition: Option<Expr>,
    pub body: Rc<[Node]>,
}

#[derive(Debug)]
pub struct Conditional {
    pub branches: Vec<Branch>,
}

#[derive(Debug)]
pub struct Program {
    pub sources: Vec<SourceFile>,
    pub nodes: Rc<[Node]>,
}

impl Program {
    pub fn source_name(&self, source: usize) -> Option<&str> {
        self.sources.get(source).map(|s| s.name.as_str())
    }

    pub fn source_text(&self, source: usize, line: u32) -> Option<&str> {
        self.sources
            .get(source)?
            .lines
            .get(line.checked_sub(1)? as usize)
            .map(String::as_str)
    }
}

enum Frame {
    Block {
        kind: BlockKind,
        open: Rc<SourceLine>,
        body: Vec<Node>,
    },
    Conditional {
        done: Vec<Branch>,
        line: Rc<SourceLine>,
        condition: Option<Expr>,
        body: Vec<Node>,
        seen_else: bool,
    },
}

impl Frame {
    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Block { body, .. } | Frame::Conditional { body, .. } => body,
        }
    }
}

/// Builds a [`Program`] by reading sources through a [`StreamFactory`].
pub struct ProgramBuilder<'a> {
    streams: &'a dyn StreamFactory,
    is_register: RegisterChecker,
    sources: Vec<SourceFile>,
    stack: Vec<Frame>,
    root: Vec<Node>,
    position: usize,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(streams: &'a dyn StreamFactory, is_register: RegisterChecker) -> Self {
        Self {
            streams,
            is_register,
            sources: Vec::new(),
            stack: Vec::new(),
            root: Vec::new(),
            position: 0,
        }
    }

    /// Read and structure the named main source file.
    pub fn build(mut self, name: &str) -> Result<Program, AsmError> {
        self.add_file(name, 0)?;
        if let Some(frame) = self.stack.last() {
            let (line, message) = match frame {
                Frame::Block { kind, open, .. } => {
                    (open, format!("Missing {}", kind.close_directive()))
                }
                Frame::Conditional { line, .. } => (line, "Missing .endif".to_string()),
            };
            return Err(self.structure_error(line, &message));
        }
        debug!(
            files = self.sources.len(),
            statements = self.position,
            "program tree built"
        );
        Ok(Program {
            sources: self.sources,
            nodes: self.root.into(),
        })
    }

    fn add_file(&mut self, name: &str, depth: usize) -> Result<(), AsmError> {
        let reader = self.streams.get_stream(name).map_err(|err| {
            AsmError::new(AsmErrorKind::Io, "Cannot open source", Some(&format!("{name}: {err}")))
        })?;
        let lines = reader
            .lines()
            .collect::<Result<Vec<String>, _>>()
            .map_err(|err| {
                AsmError::new(AsmErrorKind::Io, "Cannot read source", Some(&format!("{name}: {err}")))
            })?;
        let source = self.sources.len();
        self.sources.push(SourceFile {
            name: name.to_string(),
            lines: lines.clone(),
        });

        for (idx, text) in lines.into_iter().enumerate() {
            let line_num = idx as u32 + 1;
            let ast = parse_source_line(&text, line_num, self.is_register.clone());
            let line = Rc::new(SourceLine {
                position: self.position,
                source,
                line: line_num,
                text,
                ast,
            });
            self.position += 1;
            self.add_line(line, depth)?;
        }
        Ok(())
    }

    fn add_line(&mut self, line: Rc<SourceLine>, depth: usize) -> Result<(), AsmError> {
        if let Ok(LineAst::Conditional { kind, expr, .. }) = &line.ast {
            return self.add_conditional(&line, *kind, expr.clone());
        }
        if let Some(directive) = line.directive() {
            if directive == ".include" {
                let name = include_name(&line)?;
                if depth + 1 > MAX_INCLUDE_DEPTH {
                    return Err(self.structure_error(&line, "Include nesting too deep"));
                }
                return self.add_file(&name, depth + 1);
            }
            if let Some((kind, opening)) = BlockKind::from_directive(directive) {
                if opening {
                    self.stack.push(Frame::Block {
                        kind,
                        open: line,
                        body: Vec::new(),
                    });
                    return Ok(());
                }
                return match self.stack.pop() {
                    Some(Frame::Block {
                        kind: open_kind,
                        open,
                        body,
                    }) if open_kind == kind => {
                        self.push_node(Node::Block(Rc::new(Block {
                            kind,
                            open,
                            body: body.into(),
                            close: line,
                        })));
                        Ok(())
                    }
                    _ => Err(self.structure_error(&line, &format!("Unexpected {directive}"))),
                };
            }
        }
        self.push_node(Node::Line(line));
        Ok(())
    }

    fn add_conditional(
        &mut self,
        line: &Rc<SourceLine>,
        kind: ConditionalKind,
        expr: Option<Expr>,
    ) -> Result<(), AsmError> {
        if kind == ConditionalKind::If {
            self.stack.push(Frame::Conditional {
                done: Vec::new(),
                line: line.clone(),
                condition: expr,
                body: Vec::new(),
                seen_else: false,
            });
            return Ok(());
        }
        let Some(Frame::Conditional {
            mut done,
            line: branch_line,
            condition,
            body,
            seen_else,
        }) = self.stack.pop()
        else {
            return Err(self.structure_error(line, "Conditional without .if"));
        };
        if seen_else && kind != ConditionalKind::EndIf {
            return Err(self.structure_error(line, "Branch after .else"));
        }
        done.push(Branch {
            line: branch_line,
            condition,
            body: body.into(),
        });
        match kind {
            ConditionalKind::EndIf => {
                self.push_node(Node::Conditional(Rc::new(Conditional { branches: done })));
            }
            _ => self.stack.push(Frame::Conditional {
                done,
                line: line.clone(),
                condition: expr,
                body: Vec::new(),
                seen_else: kind == ConditionalKind::Else,
            }),
        }
        Ok(())
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(frame) => frame.body_mut().push(node),
            None => self.root.push(node),
        }
    }

    fn structure_error(&self, line: &SourceLine, message: &str) -> AsmError {
        let file = self
            .sources
            .get(line.source)
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        AsmError::new(
            AsmErrorKind::Syntax,
            message,
            Some(&format!("{file}:{}", line.line)),
        )
    }
}

fn include_name(line: &SourceLine) -> Result<String, AsmError> {
    match &line.ast {
        Ok(LineAst::Statement { operands, .. }) => match operands.as_slice() {
            [Expr::String(name, _)] => Ok(name.clone()),
            _ => Err(AsmError::new(
                AsmErrorKind::Directive,
                ".include expects a file name string",
                Some(&line.line.to_string()),
            )),
        },
        _ => Err(AsmError::new(AsmErrorKind::Internal, "not a statement", None)),
    }
}

/// Name and parameters from a `.function name(a, b = 1)` operand.
pub fn function_signature(expr: &Expr) -> Result<(String, Rc<[Param]>), AsmError> {
    let bad = |span: Span| {
        AsmError::at(
            AsmErrorKind::Syntax,
            "Expected function name and parameter list",
            span,
        )
    };
    let (name, args) = match expr {
        Expr::Call { callee, args, .. } => match callee.as_ref() {
            Expr::Identifier(name, _) => (name.clone(), args),
            other => return Err(bad(other.span())),
        },
        other => return Err(bad(other.span())),
    };
    let mut params = Vec::with_capacity(args.len());
    for arg in args {
        let param = match arg {
            Expr::Identifier(name, span) => Param {
                name: name.clone(),
                default: None,
                span: *span,
            },
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
                ..
            } => match left.as_ref() {
                Expr::Identifier(name, span) => Param {
                    name: name.clone(),
                    default: Some(right.as_ref().clone()),
                    span: *span,
                },
                other => return Err(bad(other.span())),
            },
            other => return Err(bad(other.span())),
        };
        params.push(param);
    }
    Ok((name, params.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::MemoryLoader;
    use crate::core::tokenizer::register_checker_none;

    fn build(loader: &MemoryLoader) -> Result<Program, AsmError> {
        ProgramBuilder::new(loader, register_checker_none()).build("main.asm")
    }

    #[test]
    fn groups_blocks_and_conditionals() {
        let loader = MemoryLoader::new().with_file(
            "main.asm",
            "    .namespace io\nport = 1\n    .endnamespace\n    .if 1\n    nop\n    .else\n    brk\n    .endif\n",
        );
        let program = build(&loader).unwrap();
        assert_eq!(program.nodes.len(), 2);
        match &program.nodes[0] {
            Node::Block(block) => {
                assert_eq!(block.kind, BlockKind::Namespace);
                assert_eq!(block.body.len(), 1);
            }
            other => panic!("Expected block, got {other:?}"),
        }
        match &program.nodes[1] {
            Node::Conditional(cond) => {
                assert_eq!(cond.branches.len(), 2);
                assert!(cond.branches[1].condition.is_none());
            }
            other => panic!("Expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn splices_includes_with_stable_positions() {
        let loader = MemoryLoader::new()
            .with_file("main.asm", "    nop\n    .include \"inc.asm\"\n    rts\n")
            .with_file("inc.asm", "    inx\n    iny\n");
        let program = build(&loader).unwrap();
        assert_eq!(program.sources.len(), 2);
        let positions: Vec<usize> = program
            .nodes
            .iter()
            .map(|node| match node {
                Node::Line(line) => line.position,
                _ => usize::MAX,
            })
            .collect();
        assert_eq!(positions, vec![0, 2, 3, 4]);
    }

    #[test]
    fn unbalanced_blocks_are_fatal() {
        let loader = MemoryLoader::new().with_file("main.asm", "    .block\n    nop\n");
        let err = build(&loader).unwrap_err();
        assert!(err.message().contains("Missing .endblock"));

        let loader = MemoryLoader::new().with_file("main.asm", "    .endif\n");
        assert!(build(&loader).is_err());
    }

    #[test]
    fn recursive_include_hits_depth_limit() {
        let loader = MemoryLoader::new().with_file("main.asm", "    .include \"main.asm\"\n");
        let err = build(&loader).unwrap_err();
        assert!(err.message().contains("Include nesting too deep"));
    }

    #[test]
    fn function_signature_reads_defaults() {
        let loader =
            MemoryLoader::new().with_file("main.asm", "    .function scale(x, f = 2)\n    .endfunction\n");
        let program = build(&loader).unwrap();
        let Node::Block(block) = &program.nodes[0] else {
            panic!("Expected block");
        };
        let Ok(LineAst::Statement { operands, .. }) = &block.open.ast else {
            panic!("Expected statement");
        };
        let (name, params) = function_signature(&operands[0]).unwrap();
        assert_eq!(name, "scale");
        assert_eq!(params.len(), 2);
        assert!(params[1].default.is_some());
    }
}
