//! Identifier renaming.
//!
//! `Lexical` renames every non-builtin `Name` node by its spelling alone.
//! `ScopeAware` first collects the scope tree and its bindings, then rewrites
//! each reference to the placeholder of the binding it resolves to.

use std::collections::HashSet;

use obs_core::error::Result;
use obs_core::ident_map::{IdentifierMap, ScopeId};
use rustpython_parser::ast;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builtins::{is_builtin, is_dunder};
use crate::frontend::SourceUnit;
use crate::walk::{walk_arguments, walk_except_handler, walk_expr, walk_pattern, walk_stmt, VisitMut};

const MODULE_LABEL: &str = "<module>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenamePolicy {
    /// Rename every non-builtin name reference by spelling, ignoring scopes.
    Lexical,
    /// Resolve names with Python scoping rules and rename only bindings whose
    /// renaming keeps the program's behaviour.
    #[default]
    ScopeAware,
}

impl std::str::FromStr for RenamePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lexical" => Ok(RenamePolicy::Lexical),
            "scope-aware" | "scope_aware" => Ok(RenamePolicy::ScopeAware),
            other => Err(format!("unknown rename policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameOutput {
    pub text: String,
    pub map: IdentifierMap,
}

/// Parses `source`, renames identifiers and prints the result.
pub fn rename_identifiers(source: &str, policy: RenamePolicy) -> Result<RenameOutput> {
    let mut unit = SourceUnit::parse(source)?;
    let map = rename_suite(&mut unit.suite, policy);
    let text = unit.regenerate()?;
    debug!(?policy, renamed = map.len(), "renamed identifiers");
    Ok(RenameOutput { text, map })
}

pub fn rename_suite(suite: &mut ast::Suite, policy: RenamePolicy) -> IdentifierMap {
    let reserved = reserved_names(suite);
    match policy {
        RenamePolicy::Lexical => {
            let mut renamer = LexicalRenamer {
                map: IdentifierMap::with_reserved(reserved),
            };
            renamer.visit_body(suite);
            renamer.map
        }
        RenamePolicy::ScopeAware => {
            let mut renamer = ScopeRenamer::new(reserved);
            renamer.visit_body(suite);
            renamer.begin_rewrite();
            renamer.visit_body(suite);
            renamer.map
        }
    }
}

struct LexicalRenamer {
    map: IdentifierMap,
}

impl VisitMut for LexicalRenamer {
    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        if let ast::Expr::Name(name) = expr {
            if !is_builtin(name.id.as_str()) {
                let placeholder = self.map.assign(ScopeId::MODULE, MODULE_LABEL, name.id.as_str());
                name.id = ast::Identifier::new(placeholder);
            }
            return;
        }
        walk_expr(self, expr);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Lambda,
    Class,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    label: String,
    parent: Option<ScopeId>,
    bindings: HashSet<String>,
    params: HashSet<String>,
    globals: HashSet<String>,
    nonlocals: HashSet<String>,
    dotted_roots: HashSet<String>,
    exported: HashSet<String>,
    star_import: bool,
}

impl Scope {
    fn new(kind: ScopeKind, label: String, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            label,
            parent,
            bindings: HashSet::new(),
            params: HashSet::new(),
            globals: HashSet::new(),
            nonlocals: HashSet::new(),
            dotted_roots: HashSet::new(),
            exported: HashSet::new(),
            star_import: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collect,
    Rewrite,
}

/// Both phases walk the tree identically, so scope ids handed out while
/// collecting match the ones seen while rewriting.
struct ScopeRenamer {
    phase: Phase,
    scopes: Vec<Scope>,
    current: ScopeId,
    next_scope: usize,
    map: IdentifierMap,
}

impl ScopeRenamer {
    fn new(reserved: HashSet<String>) -> Self {
        Self {
            phase: Phase::Collect,
            scopes: vec![Scope::new(ScopeKind::Module, MODULE_LABEL.to_string(), None)],
            current: ScopeId::MODULE,
            next_scope: 1,
            map: IdentifierMap::with_reserved(reserved),
        }
    }

    fn begin_rewrite(&mut self) {
        self.phase = Phase::Rewrite;
        self.current = ScopeId::MODULE;
        self.next_scope = 1;
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    fn enter(&mut self, kind: ScopeKind, label: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        if self.phase == Phase::Collect {
            let scope = Scope::new(kind, label.into(), Some(self.current));
            self.scopes.push(scope);
        }
        std::mem::replace(&mut self.current, id)
    }

    fn leave(&mut self, outer: ScopeId) {
        self.current = outer;
    }

    fn bind(&mut self, scope: ScopeId, name: &str) {
        let target = if self.scope(scope).globals.contains(name) {
            Some(ScopeId::MODULE)
        } else if self.scope(scope).nonlocals.contains(name) {
            None
        } else {
            Some(scope)
        };
        if let Some(target) = target {
            self.scope_mut(target).bindings.insert(name.to_string());
        }
    }

    /// Finds the scope whose binding `name` refers to when used in `from`.
    /// Class scopes are only visible to their own body.
    fn resolve(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if id == from || scope.kind != ScopeKind::Class {
                if scope.globals.contains(name) {
                    return self
                        .scope(ScopeId::MODULE)
                        .bindings
                        .contains(name)
                        .then_some(ScopeId::MODULE);
                }
                if scope.bindings.contains(name) {
                    return Some(id);
                }
            }
            cursor = scope.parent;
        }
        None
    }

    fn is_renamable(&self, binding: ScopeId, name: &str) -> bool {
        let scope = self.scope(binding);
        !(scope.kind == ScopeKind::Class
            || scope.star_import
            || scope.params.contains(name)
            || scope.dotted_roots.contains(name)
            || scope.exported.contains(name)
            || is_dunder(name))
    }

    fn placeholder_for(&mut self, scope: ScopeId, name: &str) -> Option<String> {
        let binding = self.resolve(scope, name)?;
        if !self.is_renamable(binding, name) {
            return None;
        }
        let label = self.scope(binding).label.clone();
        Some(self.map.assign(binding, &label, name))
    }

    fn rename_identifier(&mut self, scope: ScopeId, ident: &mut ast::Identifier) {
        if let Some(placeholder) = self.placeholder_for(scope, ident.as_str()) {
            *ident = ast::Identifier::new(placeholder);
        }
    }

    fn handle_identifier(&mut self, scope: ScopeId, ident: &mut ast::Identifier) {
        match self.phase {
            Phase::Collect => self.bind(scope, ident.as_str()),
            Phase::Rewrite => self.rename_identifier(scope, ident),
        }
    }

    fn handle_name(&mut self, scope: ScopeId, name: &mut ast::ExprName) {
        match self.phase {
            Phase::Collect => {
                if !matches!(name.ctx, ast::ExprContext::Load) {
                    self.bind(scope, name.id.as_str());
                }
            }
            Phase::Rewrite => self.rename_identifier(scope, &mut name.id),
        }
    }

    fn bind_parameters(&mut self, args: &ast::Arguments) {
        if self.phase != Phase::Collect {
            return;
        }
        let current = self.current;
        for name in parameter_names(args) {
            let scope = self.scope_mut(current);
            scope.params.insert(name.to_string());
            scope.bindings.insert(name.to_string());
        }
    }

    fn handle_alias(&mut self, alias: &mut ast::Alias) {
        let scope = self.current;
        if alias.name.as_str() == "*" {
            if self.phase == Phase::Collect {
                self.scope_mut(scope).star_import = true;
            }
            return;
        }
        if let Some(asname) = alias.asname.as_mut() {
            self.handle_identifier(scope, asname);
            return;
        }
        let name = alias.name.as_str().to_string();
        match (self.phase, name.split_once('.')) {
            (Phase::Collect, Some((root, _))) => {
                self.scope_mut(scope).dotted_roots.insert(root.to_string());
                self.bind(scope, root);
            }
            (Phase::Collect, None) => self.bind(scope, &name),
            (Phase::Rewrite, Some(_)) => {}
            (Phase::Rewrite, None) => {
                if let Some(placeholder) = self.placeholder_for(scope, &name) {
                    alias.asname = Some(ast::Identifier::new(placeholder));
                }
            }
        }
    }

    fn record_exports(&mut self, stmt: &ast::Stmt) {
        if self.phase != Phase::Collect || self.current != ScopeId::MODULE {
            return;
        }
        let value = match stmt {
            ast::Stmt::Assign(assign)
                if assign.targets.iter().any(|target| is_name(target, "__all__")) =>
            {
                Some(&*assign.value)
            }
            ast::Stmt::AugAssign(assign) if is_name(&assign.target, "__all__") => {
                Some(&*assign.value)
            }
            ast::Stmt::AnnAssign(assign) if is_name(&assign.target, "__all__") => {
                assign.value.as_deref()
            }
            _ => None,
        };
        let elts = match value {
            Some(ast::Expr::List(list)) => &list.elts,
            Some(ast::Expr::Tuple(tuple)) => &tuple.elts,
            _ => return,
        };
        let exported = elts
            .iter()
            .filter_map(|elt| match elt {
                ast::Expr::Constant(ast::ExprConstant {
                    value: ast::Constant::Str(name),
                    ..
                }) => Some(name.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        self.scope_mut(ScopeId::MODULE).exported.extend(exported);
    }

    /// Assignment expressions inside comprehensions bind in the nearest
    /// enclosing non-comprehension scope.
    fn walrus_scope(&self) -> ScopeId {
        let mut id = self.current;
        while self.scope(id).kind == ScopeKind::Comprehension {
            match self.scope(id).parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        id
    }

    fn visit_function(
        &mut self,
        decorators: &mut [ast::Expr],
        name: &mut ast::Identifier,
        args: &mut ast::Arguments,
        returns: &mut Option<Box<ast::Expr>>,
        body: &mut Vec<ast::Stmt>,
    ) {
        for decorator in decorators.iter_mut() {
            self.visit_expr(decorator);
        }
        let label = name.as_str().to_string();
        let scope = self.current;
        self.handle_identifier(scope, name);
        walk_arguments(self, args);
        if let Some(returns) = returns {
            self.visit_expr(returns);
        }
        let outer = self.enter(ScopeKind::Function, label);
        self.bind_parameters(args);
        self.visit_body(body);
        self.leave(outer);
    }

    /// The first iterable is evaluated in the enclosing scope; everything
    /// else belongs to the comprehension.
    fn visit_generators(&mut self, outer: ScopeId, generators: &mut [ast::Comprehension]) {
        for (idx, generator) in generators.iter_mut().enumerate() {
            self.visit_expr(&mut generator.target);
            if idx == 0 {
                let inner = std::mem::replace(&mut self.current, outer);
                self.visit_expr(&mut generator.iter);
                self.current = inner;
            } else {
                self.visit_expr(&mut generator.iter);
            }
            for condition in generator.ifs.iter_mut() {
                self.visit_expr(condition);
            }
        }
    }
}

impl VisitMut for ScopeRenamer {
    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        self.record_exports(stmt);
        match stmt {
            ast::Stmt::FunctionDef(def) => self.visit_function(
                &mut def.decorator_list,
                &mut def.name,
                &mut def.args,
                &mut def.returns,
                &mut def.body,
            ),
            ast::Stmt::AsyncFunctionDef(def) => self.visit_function(
                &mut def.decorator_list,
                &mut def.name,
                &mut def.args,
                &mut def.returns,
                &mut def.body,
            ),
            ast::Stmt::ClassDef(def) => {
                for decorator in def.decorator_list.iter_mut() {
                    self.visit_expr(decorator);
                }
                let label = def.name.as_str().to_string();
                let scope = self.current;
                self.handle_identifier(scope, &mut def.name);
                for base in def.bases.iter_mut() {
                    self.visit_expr(base);
                }
                for keyword in def.keywords.iter_mut() {
                    self.visit_expr(&mut keyword.value);
                }
                let outer = self.enter(ScopeKind::Class, label);
                self.visit_body(&mut def.body);
                self.leave(outer);
            }
            ast::Stmt::Global(global) => {
                let scope = self.current;
                for name in global.names.iter_mut() {
                    match self.phase {
                        Phase::Collect => {
                            self.scope_mut(scope).globals.insert(name.as_str().to_string());
                        }
                        Phase::Rewrite => self.rename_identifier(scope, name),
                    }
                }
            }
            ast::Stmt::Nonlocal(nonlocal) => {
                let scope = self.current;
                for name in nonlocal.names.iter_mut() {
                    match self.phase {
                        Phase::Collect => {
                            self.scope_mut(scope).nonlocals.insert(name.as_str().to_string());
                        }
                        Phase::Rewrite => self.rename_identifier(scope, name),
                    }
                }
            }
            ast::Stmt::Import(import) => {
                for alias in import.names.iter_mut() {
                    self.handle_alias(alias);
                }
            }
            ast::Stmt::ImportFrom(import) => {
                let is_future = import
                    .module
                    .as_ref()
                    .is_some_and(|module| module.as_str() == "__future__");
                if is_future {
                    return;
                }
                for alias in import.names.iter_mut() {
                    self.handle_alias(alias);
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        match expr {
            ast::Expr::Name(name) => {
                let scope = self.current;
                self.handle_name(scope, name);
            }
            ast::Expr::NamedExpr(named) => {
                let target_scope = self.walrus_scope();
                match named.target.as_mut() {
                    ast::Expr::Name(name) => self.handle_name(target_scope, name),
                    other => self.visit_expr(other),
                }
                self.visit_expr(&mut named.value);
            }
            ast::Expr::Lambda(lambda) => {
                walk_arguments(self, &mut lambda.args);
                let outer = self.enter(ScopeKind::Lambda, "<lambda>");
                self.bind_parameters(&lambda.args);
                self.visit_expr(&mut lambda.body);
                self.leave(outer);
            }
            ast::Expr::ListComp(comp) => {
                let outer = self.enter(ScopeKind::Comprehension, "<listcomp>");
                self.visit_expr(&mut comp.elt);
                self.visit_generators(outer, &mut comp.generators);
                self.leave(outer);
            }
            ast::Expr::SetComp(comp) => {
                let outer = self.enter(ScopeKind::Comprehension, "<setcomp>");
                self.visit_expr(&mut comp.elt);
                self.visit_generators(outer, &mut comp.generators);
                self.leave(outer);
            }
            ast::Expr::GeneratorExp(comp) => {
                let outer = self.enter(ScopeKind::Comprehension, "<genexpr>");
                self.visit_expr(&mut comp.elt);
                self.visit_generators(outer, &mut comp.generators);
                self.leave(outer);
            }
            ast::Expr::DictComp(comp) => {
                let outer = self.enter(ScopeKind::Comprehension, "<dictcomp>");
                self.visit_expr(&mut comp.key);
                self.visit_expr(&mut comp.value);
                self.visit_generators(outer, &mut comp.generators);
                self.leave(outer);
            }
            _ => walk_expr(self, expr),
        }
    }

    fn visit_except_handler(&mut self, handler: &mut ast::ExceptHandler) {
        let ast::ExceptHandler::ExceptHandler(inner) = handler;
        if let Some(ty) = inner.type_.as_mut() {
            self.visit_expr(ty);
        }
        let scope = self.current;
        if let Some(name) = inner.name.as_mut() {
            self.handle_identifier(scope, name);
        }
        self.visit_body(&mut inner.body);
    }

    fn visit_pattern(&mut self, pattern: &mut ast::Pattern) {
        walk_pattern(self, pattern);
        let scope = self.current;
        let capture = match pattern {
            ast::Pattern::MatchAs(match_as) => match_as.name.as_mut(),
            ast::Pattern::MatchStar(star) => star.name.as_mut(),
            ast::Pattern::MatchMapping(mapping) => mapping.rest.as_mut(),
            _ => None,
        };
        if let Some(name) = capture {
            self.handle_identifier(scope, name);
        }
    }
}

fn is_name(expr: &ast::Expr, expected: &str) -> bool {
    matches!(expr, ast::Expr::Name(name) if name.id.as_str() == expected)
}

fn parameter_names(args: &ast::Arguments) -> impl Iterator<Item = &str> {
    args.posonlyargs
        .iter()
        .chain(args.args.iter())
        .chain(args.kwonlyargs.iter())
        .map(|param| param.def.arg.as_str())
        .chain(
            args.vararg
                .iter()
                .chain(args.kwarg.iter())
                .map(|arg| arg.arg.as_str()),
        )
}

/// Every identifier spelled anywhere in the tree.
fn reserved_names(suite: &mut ast::Suite) -> HashSet<String> {
    let mut collector = NameCollector::default();
    collector.visit_body(suite);
    collector.names
}

#[derive(Default)]
struct NameCollector {
    names: HashSet<String>,
}

impl NameCollector {
    fn insert(&mut self, name: &ast::Identifier) {
        self.names.insert(name.as_str().to_string());
    }
}

impl VisitMut for NameCollector {
    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        match stmt {
            ast::Stmt::FunctionDef(def) => self.insert(&def.name),
            ast::Stmt::AsyncFunctionDef(def) => self.insert(&def.name),
            ast::Stmt::ClassDef(def) => self.insert(&def.name),
            ast::Stmt::Global(global) => global.names.iter().for_each(|name| self.insert(name)),
            ast::Stmt::Nonlocal(nonlocal) => {
                nonlocal.names.iter().for_each(|name| self.insert(name))
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        match expr {
            ast::Expr::Name(name) => self.insert(&name.id),
            ast::Expr::Attribute(attr) => self.insert(&attr.attr),
            ast::Expr::Call(call) => {
                for keyword in &call.keywords {
                    if let Some(arg) = &keyword.arg {
                        self.insert(arg);
                    }
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_arguments(&mut self, args: &mut ast::Arguments) {
        let names = parameter_names(args).map(str::to_string).collect::<Vec<_>>();
        self.names.extend(names);
        walk_arguments(self, args);
    }

    fn visit_alias(&mut self, alias: &mut ast::Alias) {
        self.insert(&alias.name);
        if let Some(asname) = &alias.asname {
            self.insert(asname);
        }
    }

    fn visit_except_handler(&mut self, handler: &mut ast::ExceptHandler) {
        let ast::ExceptHandler::ExceptHandler(inner) = &*handler;
        if let Some(name) = &inner.name {
            self.names.insert(name.as_str().to_string());
        }
        walk_except_handler(self, handler);
    }

    fn visit_pattern(&mut self, pattern: &mut ast::Pattern) {
        match &*pattern {
            ast::Pattern::MatchAs(ast::PatternMatchAs { name: Some(name), .. })
            | ast::Pattern::MatchStar(ast::PatternMatchStar { name: Some(name), .. })
            | ast::Pattern::MatchMapping(ast::PatternMatchMapping {
                rest: Some(name), ..
            }) => {
                self.names.insert(name.as_str().to_string());
            }
            ast::Pattern::MatchClass(class) => {
                let attrs = class
                    .kwd_attrs
                    .iter()
                    .map(|attr| attr.as_str().to_string())
                    .collect::<Vec<_>>();
                self.names.extend(attrs);
            }
            _ => {}
        }
        walk_pattern(self, pattern);
    }
}
