// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scope graph and symbol storage.
//!
//! Scopes live in an arena and refer to each other by [`ScopeId`]. The graph
//! is rebuilt from scratch at the start of every pass.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::core::source::Location;
use crate::core::text_utils::is_cheap_local;
use crate::core::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Label,
    Anonymous,
    FunctionCall,
    Enum,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Constant(Value),
    Variable(Value),
    Label { address: i64, bank: u8 },
    /// Namespace or enum name; only its nested scope is meaningful.
    Scope,
}

impl SymbolKind {
    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::Constant(_) => "constant",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Label { .. } => "label",
            SymbolKind::Scope => "scope",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Option<Location>,
    pub scope: ScopeId,
    pub nested: Option<ScopeId>,
    pub built_in: bool,
    pub referenced: bool,
}

impl Symbol {
    pub fn value(&self) -> Option<Value> {
        match &self.kind {
            SymbolKind::Constant(v) | SymbolKind::Variable(v) => Some(v.clone()),
            SymbolKind::Label { address, .. } => Some(Value::Integer(*address)),
            SymbolKind::Scope => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnonymousLabel {
    pub forward: bool,
    pub address: i64,
}

/// Anonymous labels of one scope keyed by statement position.
pub type AnonymousTable = BTreeMap<usize, AnonymousLabel>;

#[derive(Debug)]
pub struct Scope {
    pub name: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    symbols: HashMap<String, SymbolId>,
    local_label: Option<ScopeId>,
    imports: Vec<ScopeId>,
    anonymous: AnonymousTable,
    anonymous_children: u32,
}

impl Scope {
    fn new(name: String, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            name,
            kind,
            parent,
            symbols: HashMap::new(),
            local_label: None,
            imports: Vec::new(),
            anonymous: BTreeMap::new(),
            anonymous_children: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Symbol redefinition: {0}")]
    Redefinition(String),
    #[error("Not a scope: {0}")]
    NotAScope(String),
    #[error("Symbol not found: {0}")]
    NotFound(String),
    #[error("Cannot close the global scope")]
    PopGlobal,
}

/// A resolved symbol in listing form.
#[derive(Debug, Clone)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: &'static str,
    pub value: Value,
    pub bank: Option<u8>,
}

#[derive(Debug)]
pub struct ScopeGraph {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    stack: Vec<ScopeId>,
    case_sensitive: bool,
}

impl ScopeGraph {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            scopes: vec![Scope::new(String::new(), ScopeKind::Global, None)],
            symbols: Vec::new(),
            stack: vec![ScopeId(0)],
            case_sensitive,
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId(0))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn normalize(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    /// Scope cheap locals are defined in and resolved from.
    pub fn local_scope(&self) -> ScopeId {
        let mut cursor = Some(self.current());
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if let Some(local) = scope.local_label {
                return local;
            }
            if matches!(scope.kind, ScopeKind::FunctionCall) {
                break;
            }
            cursor = scope.parent;
        }
        self.current()
    }

    fn target_scope(&self, name: &str) -> ScopeId {
        if is_cheap_local(name) {
            self.local_scope()
        } else {
            self.current()
        }
    }

    /// Define a symbol in the current scope (or the local-label scope for
    /// cheap locals).
    pub fn define(
        &mut self,
        name: &str,
        kind: SymbolKind,
        location: Option<Location>,
        built_in: bool,
    ) -> Result<SymbolId, ScopeError> {
        let scope = self.target_scope(name);
        self.define_in(scope, name, kind, location, built_in)
    }

    fn define_in(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        location: Option<Location>,
        built_in: bool,
    ) -> Result<SymbolId, ScopeError> {
        let key = self.normalize(name);
        if let Some(&existing) = self.scope(scope).symbols.get(&key) {
            let symbol = &mut self.symbols[existing.0 as usize];
            let is_variable = matches!(symbol.kind, SymbolKind::Variable(_));
            return match kind {
                SymbolKind::Variable(value) if is_variable => {
                    symbol.kind = SymbolKind::Variable(value);
                    Ok(existing)
                }
                _ => Err(ScopeError::Redefinition(name.to_string())),
            };
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            location,
            scope,
            nested: None,
            built_in,
            referenced: false,
        });
        self.scope_mut(scope).symbols.insert(key, id);
        Ok(id)
    }

    /// Define a label. Ordinary labels also open the scope that holds the
    /// cheap locals following them.
    pub fn define_label(
        &mut self,
        name: &str,
        address: i64,
        bank: u8,
        location: Option<Location>,
    ) -> Result<SymbolId, ScopeError> {
        let id = self.define(name, SymbolKind::Label { address, bank }, location, false)?;
        let owner = self.symbol(id).scope;
        let nested = self.new_scope(name.to_string(), ScopeKind::Label, Some(owner));
        self.symbols[id.0 as usize].nested = Some(nested);
        if !is_cheap_local(name) {
            self.scope_mut(owner).local_label = Some(nested);
        }
        Ok(id)
    }

    /// Replace the value of a variable in place.
    pub fn assign(&mut self, id: SymbolId, value: Value) -> Result<(), ScopeError> {
        let symbol = &mut self.symbols[id.0 as usize];
        match symbol.kind {
            SymbolKind::Variable(_) => {
                symbol.kind = SymbolKind::Variable(value);
                Ok(())
            }
            _ => Err(ScopeError::Redefinition(symbol.name.clone())),
        }
    }

    fn new_scope(&mut self, name: String, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(name, kind, parent));
        id
    }

    /// Open a namespace, enum or block scope and make it current.
    ///
    /// Named scopes are reachable as `name.member`; a namespace may be
    /// reopened. Unnamed scopes are anonymous.
    pub fn open_scope(
        &mut self,
        name: Option<&str>,
        kind: ScopeKind,
        location: Option<Location>,
    ) -> Result<ScopeId, ScopeError> {
        let current = self.current();
        let id = match name {
            Some(name) => {
                let key = self.normalize(name);
                let existing = self.scope(current).symbols.get(&key).copied();
                match existing {
                    Some(sym) if kind == ScopeKind::Namespace => {
                        match self.symbol(sym).nested {
                            Some(nested)
                                if matches!(self.symbol(sym).kind, SymbolKind::Scope) =>
                            {
                                nested
                            }
                            _ => return Err(ScopeError::Redefinition(name.to_string())),
                        }
                    }
                    _ => {
                        let sym = self.define_in(current, name, SymbolKind::Scope, location, false)?;
                        let nested = self.new_scope(name.to_string(), kind, Some(current));
                        self.symbols[sym.0 as usize].nested = Some(nested);
                        nested
                    }
                }
            }
            None => {
                let scope = self.scope_mut(current);
                scope.anonymous_children += 1;
                let name = format!("@{}", scope.anonymous_children);
                self.new_scope(name, ScopeKind::Anonymous, Some(current))
            }
        };
        self.stack.push(id);
        Ok(id)
    }

    /// Push a function-call scope nested under the callee's defining scope.
    pub fn enter_call(&mut self, parent: ScopeId) -> ScopeId {
        let scope = self.scope_mut(parent);
        scope.anonymous_children += 1;
        let name = format!("@call{}", scope.anonymous_children);
        let id = self.new_scope(name, ScopeKind::FunctionCall, Some(parent));
        self.stack.push(id);
        id
    }

    /// Make a label's own scope current, so a labeled `.block` keeps its
    /// symbols reachable as `label.member`.
    pub fn enter_label(&mut self, id: SymbolId) -> Option<ScopeId> {
        let nested = self.symbol(id).nested?;
        self.stack.push(nested);
        Some(nested)
    }

    pub fn pop(&mut self) -> Result<ScopeId, ScopeError> {
        if self.stack.len() <= 1 {
            return Err(ScopeError::PopGlobal);
        }
        let id = self.stack.pop().ok_or(ScopeError::PopGlobal)?;
        self.scope_mut(id).local_label = None;
        Ok(id)
    }

    /// Make the members of a named scope visible from the current scope.
    pub fn import(&mut self, name: &str) -> Result<(), ScopeError> {
        let sym = self
            .lookup(name)
            .ok_or_else(|| ScopeError::NotFound(name.to_string()))?;
        let nested = match (&self.symbol(sym).kind, self.symbol(sym).nested) {
            (SymbolKind::Scope, Some(nested)) => nested,
            _ => return Err(ScopeError::NotAScope(name.to_string())),
        };
        let current = self.current();
        let imports = &mut self.scope_mut(current).imports;
        if !imports.contains(&nested) {
            imports.push(nested);
        }
        Ok(())
    }

    /// Resolve a name from the current scope and mark it referenced.
    pub fn lookup(&mut self, name: &str) -> Option<SymbolId> {
        let id = self.find(name)?;
        self.symbols[id.0 as usize].referenced = true;
        Some(id)
    }

    /// Resolve a name without marking it.
    pub fn find(&self, name: &str) -> Option<SymbolId> {
        let mut parts = name.split('.');
        let head = parts.next()?;
        let mut id = self.find_simple(head)?;
        for part in parts {
            let nested = self.symbol(id).nested?;
            id = self.find_in(nested, part)?;
        }
        Some(id)
    }

    fn find_simple(&self, name: &str) -> Option<SymbolId> {
        if is_cheap_local(name) {
            return self.find_in(self.local_scope(), name);
        }
        let mut cursor = Some(self.current());
        while let Some(id) = cursor {
            if let Some(sym) = self.find_in(id, name) {
                return Some(sym);
            }
            cursor = self.scope(id).parent;
        }
        let mut cursor = Some(self.current());
        while let Some(id) = cursor {
            for &import in &self.scope(id).imports {
                if let Some(sym) = self.find_in(import, name) {
                    return Some(sym);
                }
            }
            cursor = self.scope(id).parent;
        }
        None
    }

    fn find_in(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).symbols.get(&self.normalize(name)).copied()
    }

    pub fn define_anonymous(&mut self, position: usize, forward: bool, address: i64) {
        let current = self.current();
        self.scope_mut(current)
            .anonymous
            .insert(position, AnonymousLabel { forward, address });
    }

    /// Find the `depth`-th anonymous label of the given direction relative
    /// to `position`, searching the current scope and then its parents.
    pub fn find_anonymous(&self, position: usize, forward: bool, depth: usize) -> Option<i64> {
        let mut cursor = Some(self.current());
        while let Some(id) = cursor {
            if let Some(address) =
                search_anonymous(&self.scope(id).anonymous, position, forward, depth)
            {
                return Some(address);
            }
            cursor = self.scope(id).parent;
        }
        None
    }

    /// Scopes visible from the current one, innermost first, then imports.
    pub fn visible_scopes(&self) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut cursor = Some(self.current());
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.scope(id).parent;
        }
        let imports: Vec<ScopeId> = out
            .iter()
            .flat_map(|id| self.scope(*id).imports.iter().copied())
            .collect();
        out.extend(imports);
        out
    }

    /// Dotted path of a scope from the global root, normalized for lookup.
    pub fn scope_key(&self, scope: ScopeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if scope.kind != ScopeKind::Global {
                parts.push(self.normalize(&scope.name));
            }
            cursor = scope.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Fully-qualified normalized key of `name` inside `scope`.
    pub fn qualified_key(&self, scope: ScopeId, name: &str) -> String {
        let prefix = self.scope_key(scope);
        let name = self.normalize(name);
        if prefix.is_empty() {
            name
        } else {
            format!("{prefix}.{name}")
        }
    }

    /// Keys a name may have been stored under in an earlier pass, in lookup
    /// order.
    pub fn candidate_keys(&self, name: &str) -> Vec<String> {
        if is_cheap_local(name) {
            return vec![self.qualified_key(self.local_scope(), name)];
        }
        self.visible_scopes()
            .into_iter()
            .map(|scope| self.qualified_key(scope, name))
            .collect()
    }

    /// Keys of all scopes visible from the current one, for anonymous label
    /// lookups against an earlier pass.
    pub fn visible_scope_keys(&self) -> Vec<String> {
        let mut cursor = Some(self.current());
        let mut out = Vec::new();
        while let Some(id) = cursor {
            out.push(self.scope_key(id));
            cursor = self.scope(id).parent;
        }
        out
    }

    fn inside_call(&self, scope: ScopeId) -> bool {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if self.scope(id).kind == ScopeKind::FunctionCall {
                return true;
            }
            cursor = self.scope(id).parent;
        }
        false
    }

    fn is_listable(&self, scope: ScopeId) -> bool {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if matches!(
                self.scope(id).kind,
                ScopeKind::Anonymous | ScopeKind::FunctionCall
            ) {
                return false;
            }
            cursor = self.scope(id).parent;
        }
        true
    }

    /// User symbols that were never referenced.
    pub fn unreferenced(&self) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|sym| !sym.built_in && !sym.referenced && self.is_listable(sym.scope))
            .collect()
    }

    /// Values of all labels and constants keyed by qualified name.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.symbols
            .iter()
            .filter(|sym| !sym.built_in && !self.inside_call(sym.scope))
            .filter_map(|sym| {
                let value = match &sym.kind {
                    SymbolKind::Constant(v) => v.clone(),
                    SymbolKind::Label { address, .. } => Value::Integer(*address),
                    _ => return None,
                };
                Some((self.qualified_key(sym.scope, &sym.name), value))
            })
            .collect()
    }

    pub fn anonymous_tables(&self) -> HashMap<String, AnonymousTable> {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, scope)| !scope.anonymous.is_empty())
            .map(|(idx, scope)| (self.scope_key(ScopeId(idx as u32)), scope.anonymous.clone()))
            .collect()
    }

    /// Listing of user labels and constants sorted by qualified name.
    pub fn export(&self) -> Vec<ExportedSymbol> {
        let mut out: Vec<ExportedSymbol> = self
            .symbols
            .iter()
            .filter(|sym| !sym.built_in && self.is_listable(sym.scope))
            .filter_map(|sym| {
                let (value, bank) = match &sym.kind {
                    SymbolKind::Label { address, bank } => (Value::Integer(*address), Some(*bank)),
                    SymbolKind::Constant(v) | SymbolKind::Variable(v) => {
                        if matches!(v, Value::Callable(_)) {
                            return None;
                        }
                        (v.clone(), None)
                    }
                    SymbolKind::Scope => return None,
                };
                let prefix = self.display_path(sym.scope);
                let name = if prefix.is_empty() {
                    sym.name.clone()
                } else {
                    format!("{prefix}.{}", sym.name)
                };
                Some(ExportedSymbol {
                    name,
                    kind: sym.kind.name(),
                    value,
                    bank,
                })
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn display_path(&self, scope: ScopeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if scope.kind != ScopeKind::Global {
                parts.push(scope.name.as_str());
            }
            cursor = scope.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

/// Search one anonymous table. Backward references include a label on the
/// referencing statement itself.
pub fn search_anonymous(
    table: &AnonymousTable,
    position: usize,
    forward: bool,
    depth: usize,
) -> Option<i64> {
    let depth = depth.max(1);
    if forward {
        table
            .range(position + 1..)
            .filter(|(_, label)| label.forward)
            .nth(depth - 1)
            .map(|(_, label)| label.address)
    } else {
        table
            .range(..=position)
            .rev()
            .filter(|(_, label)| !label.forward)
            .nth(depth - 1)
            .map(|(_, label)| label.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward_and_is_case_insensitive() {
        let mut graph = ScopeGraph::new(false);
        graph
            .define("Width", SymbolKind::Constant(Value::Integer(40)), None, false)
            .unwrap();
        graph
            .open_scope(Some("screen"), ScopeKind::Namespace, None)
            .unwrap();
        let id = graph.lookup("WIDTH").unwrap();
        assert!(matches!(graph.symbol(id).value(), Some(Value::Integer(40))));
        assert!(graph.symbol(id).referenced);
    }

    #[test]
    fn case_sensitive_lookup_distinguishes_names() {
        let mut graph = ScopeGraph::new(true);
        graph
            .define("Width", SymbolKind::Constant(Value::Integer(40)), None, false)
            .unwrap();
        assert!(graph.lookup("width").is_none());
    }

    #[test]
    fn constants_cannot_be_redefined_but_variables_can() {
        let mut graph = ScopeGraph::new(false);
        graph
            .define("c", SymbolKind::Constant(Value::Integer(1)), None, false)
            .unwrap();
        assert_eq!(
            graph.define("c", SymbolKind::Constant(Value::Integer(1)), None, false),
            Err(ScopeError::Redefinition("c".to_string()))
        );
        graph
            .define("v", SymbolKind::Variable(Value::Integer(1)), None, false)
            .unwrap();
        let id = graph
            .define("v", SymbolKind::Variable(Value::Integer(2)), None, false)
            .unwrap();
        assert!(matches!(graph.symbol(id).value(), Some(Value::Integer(2))));
    }

    #[test]
    fn cheap_locals_bind_to_nearest_label() {
        let mut graph = ScopeGraph::new(false);
        graph.define_label("first", 0x1000, 0, None).unwrap();
        graph.define_label("_loop", 0x1002, 0, None).unwrap();
        graph.define_label("second", 0x1010, 0, None).unwrap();
        graph.define_label("_loop", 0x1012, 0, None).unwrap();

        let id = graph.lookup("_loop").unwrap();
        assert!(matches!(graph.symbol(id).value(), Some(Value::Integer(0x1012))));
        let id = graph.lookup("first._loop").unwrap();
        assert!(matches!(graph.symbol(id).value(), Some(Value::Integer(0x1002))));
    }

    #[test]
    fn pop_clears_local_label() {
        let mut graph = ScopeGraph::new(false);
        graph.open_scope(None, ScopeKind::Anonymous, None).unwrap();
        graph.define_label("inner", 1, 0, None).unwrap();
        let block = graph.current();
        graph.pop().unwrap();
        assert_eq!(graph.pop(), Err(ScopeError::PopGlobal));
        assert!(graph.scope(block).local_label.is_none());
    }

    #[test]
    fn labeled_block_members_are_qualified() {
        let mut graph = ScopeGraph::new(false);
        let id = graph.define_label("sprite", 0x2000, 0, None).unwrap();
        let nested = graph.enter_label(id).unwrap();
        assert_eq!(graph.current(), nested);
        graph
            .define("width", SymbolKind::Constant(Value::Integer(24)), None, false)
            .unwrap();
        graph.pop().unwrap();
        let member = graph.find("sprite.width").unwrap();
        assert!(matches!(graph.symbol(member).value(), Some(Value::Integer(24))));
    }

    #[test]
    fn namespaces_can_be_reopened_and_imported() {
        let mut graph = ScopeGraph::new(false);
        let first = graph
            .open_scope(Some("gfx"), ScopeKind::Namespace, None)
            .unwrap();
        graph.define_label("plot", 0x2000, 0, None).unwrap();
        graph.pop().unwrap();
        let second = graph
            .open_scope(Some("gfx"), ScopeKind::Namespace, None)
            .unwrap();
        assert_eq!(first, second);
        graph.pop().unwrap();

        assert!(graph.lookup("plot").is_none());
        graph.import("gfx").unwrap();
        assert!(graph.lookup("plot").is_some());
        assert!(graph.lookup("gfx.plot").is_some());
    }

    #[test]
    fn anonymous_labels_resolve_by_position() {
        let mut graph = ScopeGraph::new(false);
        graph.define_anonymous(1, false, 0x10);
        graph.define_anonymous(3, false, 0x20);
        graph.define_anonymous(5, true, 0x30);
        graph.define_anonymous(7, true, 0x40);
        assert_eq!(graph.find_anonymous(4, false, 1), Some(0x20));
        assert_eq!(graph.find_anonymous(4, false, 2), Some(0x10));
        assert_eq!(graph.find_anonymous(4, true, 2), Some(0x40));
        assert_eq!(graph.find_anonymous(3, false, 1), Some(0x20));
        assert_eq!(graph.find_anonymous(7, true, 1), None);
    }

    #[test]
    fn unreferenced_skips_builtins_and_anonymous_scopes() {
        let mut graph = ScopeGraph::new(false);
        graph
            .define("true", SymbolKind::Constant(Value::Boolean(true)), None, true)
            .unwrap();
        graph.define_label("unused", 0, 0, None).unwrap();
        graph.open_scope(None, ScopeKind::Anonymous, None).unwrap();
        graph.define_label("hidden", 0, 0, None).unwrap();
        graph.pop().unwrap();
        let names: Vec<&str> = graph
            .unreferenced()
            .iter()
            .map(|sym| sym.name.as_str())
            .collect();
        assert_eq!(names, vec!["unused"]);
    }

    #[test]
    fn export_is_sorted_and_qualified() {
        let mut graph = ScopeGraph::new(false);
        graph.define_label("zeta", 2, 0, None).unwrap();
        graph
            .open_scope(Some("io"), ScopeKind::Namespace, None)
            .unwrap();
        graph.define_label("port", 0xD000, 0, None).unwrap();
        graph.pop().unwrap();
        graph.define_label("alpha", 1, 0, None).unwrap();
        let names: Vec<String> = graph.export().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "io.port", "zeta"]);
    }
}
