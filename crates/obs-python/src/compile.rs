//! CPython target for the bytecode stage.
//!
//! CPython code objects can only be produced by CPython itself, so the unit
//! carries normalized program text that the loader hands to `compile()`.
//! Before packing, the program is checked for the structural errors CPython's
//! compiler reports after parsing succeeds.

use obs_bytecode::{BytecodeError, CompileToLoadableUnit, LoadableUnit, CPYTHON_RUNTIME};
use obs_core::error::{Error, Result};
use rustpython_parser::ast;
use tracing::debug;

use crate::frontend::SourceUnit;
use crate::walk::{walk_arguments, walk_expr, walk_stmt, VisitMut};

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonUnitCompiler;

impl PythonUnitCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl CompileToLoadableUnit for PythonUnitCompiler {
    fn runtime(&self) -> &'static str {
        CPYTHON_RUNTIME
    }

    fn compile(&self, source: &str) -> std::result::Result<LoadableUnit, BytecodeError> {
        let compile_error = |err: Error| BytecodeError::compile(err.to_string());
        let mut unit = SourceUnit::parse(source).map_err(compile_error)?;
        check_structure(&mut unit.suite).map_err(compile_error)?;
        let normalized = unit.regenerate().map_err(compile_error)?;
        debug!(len = normalized.len(), "normalized python unit");
        LoadableUnit::from_source(CPYTHON_RUNTIME, &normalized)
    }
}

/// Rejects statements and expressions that parse but do not compile, such as
/// `return` at module level or `break` outside a loop.
pub fn check_structure(suite: &mut ast::Suite) -> Result<()> {
    let mut checker = StructureChecker::default();
    checker.visit_body(suite);
    match checker.error {
        Some(message) => Err(Error::compile(message)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Function { is_async: bool },
    Lambda,
    Class,
}

#[derive(Default)]
struct StructureChecker {
    frames: Vec<Frame>,
    loop_depth: usize,
    error: Option<String>,
}

impl StructureChecker {
    fn fail(&mut self, message: &str) {
        self.error.get_or_insert_with(|| message.to_string());
    }

    fn enter(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        std::mem::take(&mut self.loop_depth)
    }

    fn exit(&mut self, loop_depth: usize) {
        self.frames.pop();
        self.loop_depth = loop_depth;
    }

    fn in_async_function(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Function { is_async: true }))
    }

    fn visit_loop_body(&mut self, body: &mut Vec<ast::Stmt>, orelse: &mut Vec<ast::Stmt>) {
        self.loop_depth += 1;
        self.visit_body(body);
        self.loop_depth -= 1;
        self.visit_body(orelse);
    }

    fn visit_function(
        &mut self,
        is_async: bool,
        decorators: &mut [ast::Expr],
        args: &mut ast::Arguments,
        returns: &mut Option<Box<ast::Expr>>,
        body: &mut Vec<ast::Stmt>,
    ) {
        for decorator in decorators.iter_mut() {
            self.visit_expr(decorator);
        }
        walk_arguments(self, args);
        if let Some(returns) = returns {
            self.visit_expr(returns);
        }
        let saved = self.enter(Frame::Function { is_async });
        self.visit_body(body);
        self.exit(saved);
    }
}

impl VisitMut for StructureChecker {
    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        match stmt {
            ast::Stmt::FunctionDef(def) => self.visit_function(
                false,
                &mut def.decorator_list,
                &mut def.args,
                &mut def.returns,
                &mut def.body,
            ),
            ast::Stmt::AsyncFunctionDef(def) => self.visit_function(
                true,
                &mut def.decorator_list,
                &mut def.args,
                &mut def.returns,
                &mut def.body,
            ),
            ast::Stmt::ClassDef(def) => {
                for expr in def.decorator_list.iter_mut().chain(def.bases.iter_mut()) {
                    self.visit_expr(expr);
                }
                for keyword in def.keywords.iter_mut() {
                    self.visit_expr(&mut keyword.value);
                }
                let saved = self.enter(Frame::Class);
                self.visit_body(&mut def.body);
                self.exit(saved);
            }
            ast::Stmt::Return(_) => {
                if !matches!(self.frames.last(), Some(Frame::Function { .. })) {
                    self.fail("'return' outside function");
                }
                walk_stmt(self, stmt);
            }
            ast::Stmt::For(stmt_for) => {
                self.visit_expr(&mut stmt_for.target);
                self.visit_expr(&mut stmt_for.iter);
                self.visit_loop_body(&mut stmt_for.body, &mut stmt_for.orelse);
            }
            ast::Stmt::AsyncFor(stmt_for) => {
                if !self.in_async_function() {
                    self.fail("'async for' outside async function");
                }
                self.visit_expr(&mut stmt_for.target);
                self.visit_expr(&mut stmt_for.iter);
                self.visit_loop_body(&mut stmt_for.body, &mut stmt_for.orelse);
            }
            ast::Stmt::While(stmt_while) => {
                self.visit_expr(&mut stmt_while.test);
                self.visit_loop_body(&mut stmt_while.body, &mut stmt_while.orelse);
            }
            ast::Stmt::AsyncWith(_) => {
                if !self.in_async_function() {
                    self.fail("'async with' outside async function");
                }
                walk_stmt(self, stmt);
            }
            ast::Stmt::Break(_) if self.loop_depth == 0 => self.fail("'break' outside loop"),
            ast::Stmt::Continue(_) if self.loop_depth == 0 => {
                self.fail("'continue' not properly in loop")
            }
            ast::Stmt::Nonlocal(_) if self.frames.is_empty() => {
                self.fail("nonlocal declaration not allowed at module level")
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        match expr {
            ast::Expr::Lambda(lambda) => {
                walk_arguments(self, &mut lambda.args);
                let saved = self.enter(Frame::Lambda);
                self.visit_expr(&mut lambda.body);
                self.exit(saved);
            }
            ast::Expr::Yield(_) | ast::Expr::YieldFrom(_) => {
                if !matches!(
                    self.frames.last(),
                    Some(Frame::Function { .. }) | Some(Frame::Lambda)
                ) {
                    self.fail("'yield' outside function");
                }
                walk_expr(self, expr);
            }
            ast::Expr::Await(_) => {
                if !self.in_async_function() {
                    self.fail("'await' outside async function");
                }
                walk_expr(self, expr);
            }
            _ => walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Result<()> {
        let mut unit = SourceUnit::parse(source).unwrap();
        check_structure(&mut unit.suite)
    }

    fn message(source: &str) -> String {
        match check(source) {
            Err(Error::Compile(message)) => message,
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn compiles_to_normalized_unit() {
        let unit = PythonUnitCompiler::new()
            .compile("x  =  1 # comment\nprint( x )\n")
            .unwrap();
        assert_eq!(unit.runtime, "cpython");
        assert_eq!(unit.source().unwrap(), "x = 1\nprint(x)\n");
    }

    #[test]
    fn accepts_well_formed_control_flow() {
        let source = "\
async def f(items):
    for item in items:
        if item:
            break
        await item
    return [x async for x in items]

def g():
    yield 1
";
        assert!(check(source).is_ok());
    }

    #[test]
    fn rejects_misplaced_statements() {
        assert_eq!(message("return 1\n"), "'return' outside function");
        assert_eq!(message("break\n"), "'break' outside loop");
        assert_eq!(message("if x:\n    continue\n"), "'continue' not properly in loop");
        assert_eq!(message("class A:\n    yield 1\n"), "'yield' outside function");
        assert_eq!(
            message("nonlocal x\n"),
            "nonlocal declaration not allowed at module level"
        );
        assert_eq!(message("def f():\n    await g()\n"), "'await' outside async function");
    }

    #[test]
    fn loops_do_not_leak_into_nested_functions() {
        let source = "for i in range(3):\n    def f():\n        break\n";
        assert_eq!(message(source), "'break' outside loop");
    }

    #[test]
    fn compile_failures_surface_as_bytecode_errors() {
        let err = PythonUnitCompiler::new().compile("return 1\n").unwrap_err();
        assert!(matches!(err, BytecodeError::Compile { .. }));
    }
}
