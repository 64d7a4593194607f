//! Replaces string literals with an expression that decodes a base64 copy of
//! the literal at run time.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use obs_core::error::{Error, Result};
use rustpython_parser::ast;
use rustpython_parser::Parse;
use tracing::debug;

use crate::frontend::SourceUnit;
use crate::walk::{walk_arguments, walk_expr, walk_stmt, VisitMut};

/// Python expression that evaluates back to the literal encoded as `encoded`.
pub fn decode_expression(encoded: &str) -> String {
    format!("__import__('base64').b64decode('{}').decode()", encoded)
}

#[derive(Debug, Clone)]
pub struct WrapOutput {
    pub text: String,
    pub wrapped: usize,
}

pub fn wrap_string_literals(source: &str) -> Result<WrapOutput> {
    let mut unit = SourceUnit::parse(source)?;
    let wrapped = wrap_suite(&mut unit.suite)?;
    let text = unit.regenerate()?;
    debug!(wrapped, "wrapped string literals");
    Ok(WrapOutput { text, wrapped })
}

/// Rewrites every eligible string constant in `suite`, returning how many
/// were replaced.
pub fn wrap_suite(suite: &mut ast::Suite) -> Result<usize> {
    let mut wrapper = StringWrapper::default();
    wrapper.visit_definition_body(suite);
    match wrapper.error {
        Some(err) => Err(err),
        None => Ok(wrapper.wrapped),
    }
}

#[derive(Default)]
struct StringWrapper {
    wrapped: usize,
    error: Option<Error>,
}

impl StringWrapper {
    fn replacement(&mut self, value: &str) -> Option<ast::Expr> {
        let encoded = STANDARD.encode(value.as_bytes());
        match ast::Expr::parse(&decode_expression(&encoded), "<wrapper>") {
            Ok(expr) => Some(expr),
            Err(err) => {
                self.error
                    .get_or_insert_with(|| Error::regeneration(err.error.to_string()));
                None
            }
        }
    }

    /// Module, function and class bodies keep a leading docstring as is.
    fn visit_definition_body(&mut self, body: &mut [ast::Stmt]) {
        for (idx, stmt) in body.iter_mut().enumerate() {
            if idx == 0 && is_docstring(stmt) {
                continue;
            }
            self.visit_stmt(stmt);
        }
    }

    /// Only the embedded expressions of an f-string are rewritten; its literal
    /// text and format spec text must stay plain constants.
    fn visit_fstring_values(&mut self, values: &mut [ast::Expr]) {
        for value in values.iter_mut() {
            match value {
                ast::Expr::FormattedValue(formatted) => {
                    self.visit_expr(&mut formatted.value);
                    if let Some(spec) = formatted.format_spec.as_mut() {
                        if let ast::Expr::JoinedStr(joined) = spec.as_mut() {
                            self.visit_fstring_values(&mut joined.values);
                        }
                    }
                }
                ast::Expr::JoinedStr(joined) => self.visit_fstring_values(&mut joined.values),
                _ => {}
            }
        }
    }
}

impl VisitMut for StringWrapper {
    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                for decorator in def.decorator_list.iter_mut() {
                    self.visit_expr(decorator);
                }
                walk_arguments(self, &mut def.args);
                if let Some(returns) = def.returns.as_mut() {
                    self.visit_expr(returns);
                }
                self.visit_definition_body(&mut def.body);
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                for decorator in def.decorator_list.iter_mut() {
                    self.visit_expr(decorator);
                }
                walk_arguments(self, &mut def.args);
                if let Some(returns) = def.returns.as_mut() {
                    self.visit_expr(returns);
                }
                self.visit_definition_body(&mut def.body);
            }
            ast::Stmt::ClassDef(def) => {
                for decorator in def.decorator_list.iter_mut() {
                    self.visit_expr(decorator);
                }
                for base in def.bases.iter_mut() {
                    self.visit_expr(base);
                }
                for keyword in def.keywords.iter_mut() {
                    self.visit_expr(&mut keyword.value);
                }
                self.visit_definition_body(&mut def.body);
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        match expr {
            ast::Expr::Constant(ast::ExprConstant {
                value: ast::Constant::Str(value),
                ..
            }) => {
                if let Some(replacement) = self.replacement(value) {
                    *expr = replacement;
                    self.wrapped += 1;
                }
            }
            ast::Expr::JoinedStr(joined) => self.visit_fstring_values(&mut joined.values),
            _ => walk_expr(self, expr),
        }
    }

    // Patterns only admit literals, so `case 'a':` stays as written.
    fn visit_pattern(&mut self, _pattern: &mut ast::Pattern) {}
}

fn is_docstring(stmt: &ast::Stmt) -> bool {
    matches!(
        stmt,
        ast::Stmt::Expr(ast::StmtExpr { value, .. })
            if matches!(
                value.as_ref(),
                ast::Expr::Constant(ast::ExprConstant {
                    value: ast::Constant::Str(_),
                    ..
                })
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wrap(source: &str) -> String {
        wrap_string_literals(source).unwrap().text
    }

    #[test]
    fn wraps_plain_literals() {
        let output = wrap_string_literals("print('hi')\n").unwrap();
        assert_eq!(
            output.text,
            "print(__import__('base64').b64decode('aGk=').decode())\n"
        );
        assert_eq!(output.wrapped, 1);
    }

    #[test]
    fn encodes_utf8_bytes() {
        assert_eq!(
            wrap("s = 'é'\n"),
            "s = __import__('base64').b64decode('w6k=').decode()\n"
        );
    }

    #[test]
    fn keeps_docstrings() {
        let source = "def f():\n    \"\"\"Doc.\"\"\"\n    return \"x\"\n";
        assert_eq!(
            wrap(source),
            "def f():\n    'Doc.'\n    return __import__('base64').b64decode('eA==').decode()\n"
        );
    }

    #[test]
    fn rewrites_only_fstring_expressions() {
        let source = "print(f'{name}: {d[\"k\"]}')\n";
        assert_eq!(
            wrap(source),
            "print(f\"{name}: {d[__import__('base64').b64decode('aw==').decode()]}\")\n"
        );
    }

    #[test]
    fn leaves_match_patterns_and_bytes_alone() {
        let source = "match x:\n    case 'a':\n        y = 'b'\ndata = b'raw'\n";
        let output = wrap_string_literals(source).unwrap();
        assert_eq!(
            output.text,
            "match x:\n    case 'a':\n        y = __import__('base64').b64decode('Yg==').decode()\ndata = b'raw'\n"
        );
        assert_eq!(output.wrapped, 1);
    }

    #[test]
    fn rejects_invalid_source() {
        assert!(wrap_string_literals("x = 'unterminated\n").is_err());
    }
}
