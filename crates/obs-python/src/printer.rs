//! Python source printer for rustpython syntax trees.
//!
//! Output is normalized (four-space indent, no comments, canonical quoting)
//! and parenthesized by operator precedence, following the rules CPython's
//! own `ast.unparse` uses.

use itertools::Itertools;
use obs_core::error::{Error, Result};
use rustpython_parser::ast;

const INDENT: &str = "    ";

/// Binding strength of an expression position, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    NamedExpr,
    Tuple,
    Yield,
    Test,
    Or,
    And,
    Not,
    Cmp,
    Expr,
    BOr,
    BXor,
    BAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Await,
    Atom,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::NamedExpr => Prec::Tuple,
            Prec::Tuple => Prec::Yield,
            Prec::Yield => Prec::Test,
            Prec::Test => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Not,
            Prec::Not => Prec::Cmp,
            Prec::Cmp => Prec::Expr,
            Prec::Expr => Prec::BOr,
            Prec::BOr => Prec::BXor,
            Prec::BXor => Prec::BAnd,
            Prec::BAnd => Prec::Shift,
            Prec::Shift => Prec::Arith,
            Prec::Arith => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Power,
            Prec::Power => Prec::Await,
            Prec::Await | Prec::Atom => Prec::Atom,
        }
    }
}

/// Prints statements and expressions back to Python text.
#[derive(Debug, Default)]
pub struct PythonPrinter {
    code: String,
    indent: usize,
}

impl PythonPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_suite(mut self, suite: &[ast::Stmt]) -> Result<String> {
        self.emit_body(suite)?;
        Ok(self.finish())
    }

    fn finish(self) -> String {
        self.code
    }

    fn push_line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
        self.code.push_str(text);
        self.code.push('\n');
    }

    fn emit_block(&mut self, header: &str, body: &[ast::Stmt]) -> Result<()> {
        self.push_line(header);
        self.indent += 1;
        let result = self.emit_body(body);
        self.indent -= 1;
        result
    }

    fn emit_body(&mut self, body: &[ast::Stmt]) -> Result<()> {
        for (idx, stmt) in body.iter().enumerate() {
            if idx > 0 && is_definition(stmt) {
                self.code.push('\n');
            }
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_decorators(&mut self, decorators: &[ast::Expr]) {
        for decorator in decorators {
            self.push_line(&format!("@{}", render_expr(decorator, Prec::Test)));
        }
    }

    fn emit_stmt(&mut self, stmt: &ast::Stmt) -> Result<()> {
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                self.emit_decorators(&def.decorator_list);
                let header = function_header("def", &def.name, &def.args, &def.returns);
                self.emit_block(&header, &def.body)
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                self.emit_decorators(&def.decorator_list);
                let header = function_header("async def", &def.name, &def.args, &def.returns);
                self.emit_block(&header, &def.body)
            }
            ast::Stmt::ClassDef(def) => {
                self.emit_decorators(&def.decorator_list);
                let items = def
                    .bases
                    .iter()
                    .map(|base| render_expr(base, Prec::Test))
                    .chain(def.keywords.iter().map(render_keyword))
                    .collect::<Vec<_>>();
                let header = if items.is_empty() {
                    format!("class {}:", def.name.as_str())
                } else {
                    format!("class {}({}):", def.name.as_str(), items.join(", "))
                };
                self.emit_block(&header, &def.body)
            }
            ast::Stmt::Return(ret) => {
                let line = match &ret.value {
                    Some(value) => format!("return {}", render_expr(value, Prec::Tuple)),
                    None => "return".to_string(),
                };
                self.push_line(&line);
                Ok(())
            }
            ast::Stmt::Delete(del) => {
                let targets = del
                    .targets
                    .iter()
                    .map(|target| render_expr(target, Prec::Test))
                    .join(", ");
                self.push_line(&format!("del {}", targets));
                Ok(())
            }
            ast::Stmt::Assign(assign) => {
                let mut line = String::new();
                for target in &assign.targets {
                    line.push_str(&render_expr(target, Prec::Tuple));
                    line.push_str(" = ");
                }
                line.push_str(&render_expr(&assign.value, Prec::Tuple));
                self.push_line(&line);
                Ok(())
            }
            ast::Stmt::AugAssign(assign) => {
                let (symbol, _) = binop(&assign.op);
                self.push_line(&format!(
                    "{} {}= {}",
                    render_expr(&assign.target, Prec::Tuple),
                    symbol,
                    render_expr(&assign.value, Prec::Tuple)
                ));
                Ok(())
            }
            ast::Stmt::AnnAssign(assign) => {
                let mut line = format!(
                    "{}: {}",
                    render_expr(&assign.target, Prec::Test),
                    render_expr(&assign.annotation, Prec::Test)
                );
                if let Some(value) = &assign.value {
                    line.push_str(" = ");
                    line.push_str(&render_expr(value, Prec::Tuple));
                }
                self.push_line(&line);
                Ok(())
            }
            ast::Stmt::For(stmt_for) => self.emit_for(
                "for",
                &stmt_for.target,
                &stmt_for.iter,
                &stmt_for.body,
                &stmt_for.orelse,
            ),
            ast::Stmt::AsyncFor(stmt_for) => self.emit_for(
                "async for",
                &stmt_for.target,
                &stmt_for.iter,
                &stmt_for.body,
                &stmt_for.orelse,
            ),
            ast::Stmt::While(stmt_while) => {
                let header = format!("while {}:", render_expr(&stmt_while.test, Prec::Test));
                self.emit_block(&header, &stmt_while.body)?;
                self.emit_else(&stmt_while.orelse)
            }
            ast::Stmt::If(stmt_if) => self.emit_if("if", stmt_if),
            ast::Stmt::With(with) => {
                let header = format!("with {}:", render_with_items(&with.items));
                self.emit_block(&header, &with.body)
            }
            ast::Stmt::AsyncWith(with) => {
                let header = format!("async with {}:", render_with_items(&with.items));
                self.emit_block(&header, &with.body)
            }
            ast::Stmt::Match(stmt_match) => {
                self.push_line(&format!(
                    "match {}:",
                    render_expr(&stmt_match.subject, Prec::Tuple)
                ));
                self.indent += 1;
                let mut result = Ok(());
                for case in &stmt_match.cases {
                    let mut header = format!("case {}", render_pattern(&case.pattern, false));
                    if let Some(guard) = &case.guard {
                        header.push_str(" if ");
                        header.push_str(&render_expr(guard, Prec::Test));
                    }
                    header.push(':');
                    result = self.emit_block(&header, &case.body);
                    if result.is_err() {
                        break;
                    }
                }
                self.indent -= 1;
                result
            }
            ast::Stmt::Raise(raise) => {
                let mut line = "raise".to_string();
                if let Some(exc) = &raise.exc {
                    line.push(' ');
                    line.push_str(&render_expr(exc, Prec::Test));
                }
                if let Some(cause) = &raise.cause {
                    line.push_str(" from ");
                    line.push_str(&render_expr(cause, Prec::Test));
                }
                self.push_line(&line);
                Ok(())
            }
            ast::Stmt::Try(stmt_try) => self.emit_try(
                "except",
                &stmt_try.body,
                &stmt_try.handlers,
                &stmt_try.orelse,
                &stmt_try.finalbody,
            ),
            ast::Stmt::TryStar(stmt_try) => self.emit_try(
                "except*",
                &stmt_try.body,
                &stmt_try.handlers,
                &stmt_try.orelse,
                &stmt_try.finalbody,
            ),
            ast::Stmt::Assert(assert) => {
                let mut line = format!("assert {}", render_expr(&assert.test, Prec::Test));
                if let Some(msg) = &assert.msg {
                    line.push_str(", ");
                    line.push_str(&render_expr(msg, Prec::Test));
                }
                self.push_line(&line);
                Ok(())
            }
            ast::Stmt::Import(import) => {
                self.push_line(&format!("import {}", render_aliases(&import.names)));
                Ok(())
            }
            ast::Stmt::ImportFrom(import) => {
                let level = import.level.as_ref().map(|level| level.to_u32()).unwrap_or(0);
                let module = import
                    .module
                    .as_ref()
                    .map(|module| module.as_str())
                    .unwrap_or("");
                self.push_line(&format!(
                    "from {}{} import {}",
                    ".".repeat(level as usize),
                    module,
                    render_aliases(&import.names)
                ));
                Ok(())
            }
            ast::Stmt::Global(global) => {
                let names = global.names.iter().map(|name| name.as_str()).join(", ");
                self.push_line(&format!("global {}", names));
                Ok(())
            }
            ast::Stmt::Nonlocal(nonlocal) => {
                let names = nonlocal.names.iter().map(|name| name.as_str()).join(", ");
                self.push_line(&format!("nonlocal {}", names));
                Ok(())
            }
            ast::Stmt::Expr(expr) => {
                self.push_line(&render_expr(&expr.value, Prec::Yield));
                Ok(())
            }
            ast::Stmt::Pass(_) => {
                self.push_line("pass");
                Ok(())
            }
            ast::Stmt::Break(_) => {
                self.push_line("break");
                Ok(())
            }
            ast::Stmt::Continue(_) => {
                self.push_line("continue");
                Ok(())
            }
            #[allow(unreachable_patterns)]
            other => Err(Error::regeneration(format!(
                "unsupported python statement: {:?}",
                other
            ))),
        }
    }

    fn emit_for(
        &mut self,
        keyword: &str,
        target: &ast::Expr,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        orelse: &[ast::Stmt],
    ) -> Result<()> {
        let header = format!(
            "{} {} in {}:",
            keyword,
            render_expr(target, Prec::Tuple),
            render_expr(iter, Prec::Tuple)
        );
        self.emit_block(&header, body)?;
        self.emit_else(orelse)
    }

    fn emit_if(&mut self, keyword: &str, stmt_if: &ast::StmtIf) -> Result<()> {
        let header = format!("{} {}:", keyword, render_expr(&stmt_if.test, Prec::Test));
        self.emit_block(&header, &stmt_if.body)?;
        match stmt_if.orelse.as_slice() {
            [] => Ok(()),
            [ast::Stmt::If(nested)] => self.emit_if("elif", nested),
            orelse => self.emit_block("else:", orelse),
        }
    }

    fn emit_else(&mut self, orelse: &[ast::Stmt]) -> Result<()> {
        if orelse.is_empty() {
            return Ok(());
        }
        self.emit_block("else:", orelse)
    }

    fn emit_try(
        &mut self,
        except_keyword: &str,
        body: &[ast::Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[ast::Stmt],
        finalbody: &[ast::Stmt],
    ) -> Result<()> {
        self.emit_block("try:", body)?;
        for handler in handlers {
            let ast::ExceptHandler::ExceptHandler(handler) = handler;
            let mut header = except_keyword.to_string();
            if let Some(ty) = &handler.type_ {
                header.push(' ');
                header.push_str(&render_expr(ty, Prec::Test));
            }
            if let Some(name) = &handler.name {
                header.push_str(" as ");
                header.push_str(name.as_str());
            }
            header.push(':');
            self.emit_block(&header, &handler.body)?;
        }
        self.emit_else(orelse)?;
        if !finalbody.is_empty() {
            self.emit_block("finally:", finalbody)?;
        }
        Ok(())
    }
}

fn is_definition(stmt: &ast::Stmt) -> bool {
    matches!(
        stmt,
        ast::Stmt::FunctionDef(_) | ast::Stmt::AsyncFunctionDef(_) | ast::Stmt::ClassDef(_)
    )
}

fn function_header(
    keyword: &str,
    name: &ast::Identifier,
    args: &ast::Arguments,
    returns: &Option<Box<ast::Expr>>,
) -> String {
    let mut header = format!("{} {}({})", keyword, name.as_str(), render_arguments(args));
    if let Some(returns) = returns {
        header.push_str(" -> ");
        header.push_str(&render_expr(returns, Prec::Test));
    }
    header.push(':');
    header
}

fn render_arg(arg: &ast::Arg) -> String {
    match &arg.annotation {
        Some(annotation) => format!("{}: {}", arg.arg.as_str(), render_expr(annotation, Prec::Test)),
        None => arg.arg.as_str().to_string(),
    }
}

fn render_param(param: &ast::ArgWithDefault) -> String {
    let base = render_arg(&param.def);
    match &param.default {
        Some(default) if param.def.annotation.is_some() => {
            format!("{} = {}", base, render_expr(default, Prec::Test))
        }
        Some(default) => format!("{}={}", base, render_expr(default, Prec::Test)),
        None => base,
    }
}

fn render_arguments(args: &ast::Arguments) -> String {
    let mut parts = Vec::new();
    parts.extend(args.posonlyargs.iter().map(render_param));
    if !args.posonlyargs.is_empty() {
        parts.push("/".to_string());
    }
    parts.extend(args.args.iter().map(render_param));
    match &args.vararg {
        Some(vararg) => parts.push(format!("*{}", render_arg(vararg))),
        None if !args.kwonlyargs.is_empty() => parts.push("*".to_string()),
        None => {}
    }
    parts.extend(args.kwonlyargs.iter().map(render_param));
    if let Some(kwarg) = &args.kwarg {
        parts.push(format!("**{}", render_arg(kwarg)));
    }
    parts.join(", ")
}

fn render_keyword(keyword: &ast::Keyword) -> String {
    match &keyword.arg {
        Some(arg) => format!("{}={}", arg.as_str(), render_expr(&keyword.value, Prec::Test)),
        None => format!("**{}", render_expr(&keyword.value, Prec::Test)),
    }
}

fn render_aliases(names: &[ast::Alias]) -> String {
    names
        .iter()
        .map(|alias| match &alias.asname {
            Some(asname) => format!("{} as {}", alias.name.as_str(), asname.as_str()),
            None => alias.name.as_str().to_string(),
        })
        .join(", ")
}

fn render_with_items(items: &[ast::WithItem]) -> String {
    items
        .iter()
        .map(|item| {
            let context = render_expr(&item.context_expr, Prec::Test);
            match &item.optional_vars {
                Some(vars) => format!("{} as {}", context, render_expr(vars, Prec::Test)),
                None => context,
            }
        })
        .join(", ")
}

fn wrap(text: String, own: Prec, context: Prec) -> String {
    if own < context {
        format!("({})", text)
    } else {
        text
    }
}

fn binop(op: &ast::Operator) -> (&'static str, Prec) {
    match op {
        ast::Operator::Add => ("+", Prec::Arith),
        ast::Operator::Sub => ("-", Prec::Arith),
        ast::Operator::Mult => ("*", Prec::Term),
        ast::Operator::MatMult => ("@", Prec::Term),
        ast::Operator::Div => ("/", Prec::Term),
        ast::Operator::Mod => ("%", Prec::Term),
        ast::Operator::FloorDiv => ("//", Prec::Term),
        ast::Operator::Pow => ("**", Prec::Power),
        ast::Operator::LShift => ("<<", Prec::Shift),
        ast::Operator::RShift => (">>", Prec::Shift),
        ast::Operator::BitOr => ("|", Prec::BOr),
        ast::Operator::BitXor => ("^", Prec::BXor),
        ast::Operator::BitAnd => ("&", Prec::BAnd),
    }
}

fn cmpop(op: &ast::CmpOp) -> &'static str {
    match op {
        ast::CmpOp::Eq => "==",
        ast::CmpOp::NotEq => "!=",
        ast::CmpOp::Lt => "<",
        ast::CmpOp::LtE => "<=",
        ast::CmpOp::Gt => ">",
        ast::CmpOp::GtE => ">=",
        ast::CmpOp::Is => "is",
        ast::CmpOp::IsNot => "is not",
        ast::CmpOp::In => "in",
        ast::CmpOp::NotIn => "not in",
    }
}

fn render_elements(elts: &[ast::Expr]) -> String {
    elts.iter().map(|elt| render_expr(elt, Prec::Test)).join(", ")
}

fn render_generators(generators: &[ast::Comprehension]) -> String {
    let mut text = String::new();
    for generator in generators {
        text.push_str(if generator.is_async {
            " async for "
        } else {
            " for "
        });
        text.push_str(&render_expr(&generator.target, Prec::Tuple));
        text.push_str(" in ");
        text.push_str(&render_expr(&generator.iter, Prec::Test.next()));
        for condition in &generator.ifs {
            text.push_str(" if ");
            text.push_str(&render_expr(condition, Prec::Test.next()));
        }
    }
    text
}

fn render_expr(expr: &ast::Expr, context: Prec) -> String {
    match expr {
        ast::Expr::BoolOp(op) => {
            let (word, prec) = match op.op {
                ast::BoolOp::And => (" and ", Prec::And),
                ast::BoolOp::Or => (" or ", Prec::Or),
            };
            let text = op
                .values
                .iter()
                .map(|value| render_expr(value, prec.next()))
                .join(word);
            wrap(text, prec, context)
        }
        ast::Expr::NamedExpr(named) => wrap(
            format!(
                "{} := {}",
                render_expr(&named.target, Prec::Atom),
                render_expr(&named.value, Prec::Test)
            ),
            Prec::NamedExpr,
            context,
        ),
        ast::Expr::BinOp(op) => {
            let (symbol, prec) = binop(&op.op);
            let (left, right) = if matches!(op.op, ast::Operator::Pow) {
                (prec.next(), prec)
            } else {
                (prec, prec.next())
            };
            wrap(
                format!(
                    "{} {} {}",
                    render_expr(&op.left, left),
                    symbol,
                    render_expr(&op.right, right)
                ),
                prec,
                context,
            )
        }
        ast::Expr::UnaryOp(op) => {
            let (symbol, prec) = match op.op {
                ast::UnaryOp::Not => ("not ", Prec::Not),
                ast::UnaryOp::Invert => ("~", Prec::Factor),
                ast::UnaryOp::UAdd => ("+", Prec::Factor),
                ast::UnaryOp::USub => ("-", Prec::Factor),
            };
            wrap(
                format!("{}{}", symbol, render_expr(&op.operand, prec)),
                prec,
                context,
            )
        }
        ast::Expr::Lambda(lambda) => {
            let args = render_arguments(&lambda.args);
            let body = render_expr(&lambda.body, Prec::Test);
            let text = if args.is_empty() {
                format!("lambda: {}", body)
            } else {
                format!("lambda {}: {}", args, body)
            };
            wrap(text, Prec::Test, context)
        }
        ast::Expr::IfExp(if_exp) => wrap(
            format!(
                "{} if {} else {}",
                render_expr(&if_exp.body, Prec::Test.next()),
                render_expr(&if_exp.test, Prec::Test.next()),
                render_expr(&if_exp.orelse, Prec::Test)
            ),
            Prec::Test,
            context,
        ),
        ast::Expr::Dict(dict) => {
            let entries = dict
                .keys
                .iter()
                .zip(dict.values.iter())
                .map(|(key, value)| match key {
                    Some(key) => format!(
                        "{}: {}",
                        render_expr(key, Prec::Test),
                        render_expr(value, Prec::Test)
                    ),
                    None => format!("**{}", render_expr(value, Prec::Expr)),
                })
                .join(", ");
            format!("{{{}}}", entries)
        }
        ast::Expr::Set(set) => {
            if set.elts.is_empty() {
                "{*()}".to_string()
            } else {
                format!("{{{}}}", render_elements(&set.elts))
            }
        }
        ast::Expr::ListComp(comp) => format!(
            "[{}{}]",
            render_expr(&comp.elt, Prec::Test),
            render_generators(&comp.generators)
        ),
        ast::Expr::SetComp(comp) => format!(
            "{{{}{}}}",
            render_expr(&comp.elt, Prec::Test),
            render_generators(&comp.generators)
        ),
        ast::Expr::DictComp(comp) => format!(
            "{{{}: {}{}}}",
            render_expr(&comp.key, Prec::Test),
            render_expr(&comp.value, Prec::Test),
            render_generators(&comp.generators)
        ),
        ast::Expr::GeneratorExp(comp) => format!(
            "({}{})",
            render_expr(&comp.elt, Prec::Test),
            render_generators(&comp.generators)
        ),
        ast::Expr::Await(await_expr) => wrap(
            format!("await {}", render_expr(&await_expr.value, Prec::Atom)),
            Prec::Await,
            context,
        ),
        ast::Expr::Yield(yield_expr) => {
            let text = match &yield_expr.value {
                Some(value) => format!("yield {}", render_expr(value, Prec::Tuple)),
                None => "yield".to_string(),
            };
            wrap(text, Prec::Yield, context)
        }
        ast::Expr::YieldFrom(yield_from) => wrap(
            format!("yield from {}", render_expr(&yield_from.value, Prec::Test)),
            Prec::Yield,
            context,
        ),
        ast::Expr::Compare(compare) => {
            let mut text = render_expr(&compare.left, Prec::Cmp.next());
            for (op, comparator) in compare.ops.iter().zip(compare.comparators.iter()) {
                text.push(' ');
                text.push_str(cmpop(op));
                text.push(' ');
                text.push_str(&render_expr(comparator, Prec::Cmp.next()));
            }
            wrap(text, Prec::Cmp, context)
        }
        ast::Expr::Call(call) => {
            let args = call
                .args
                .iter()
                .map(|arg| render_expr(arg, Prec::Test))
                .chain(call.keywords.iter().map(render_keyword))
                .join(", ");
            format!("{}({})", render_expr(&call.func, Prec::Atom), args)
        }
        ast::Expr::FormattedValue(_) => render_fstring(std::slice::from_ref(expr)),
        ast::Expr::JoinedStr(joined) => render_fstring(&joined.values),
        ast::Expr::Constant(constant) => render_constant(&constant.value),
        ast::Expr::Attribute(attr) => {
            let value = match attr.value.as_ref() {
                ast::Expr::Constant(ast::ExprConstant {
                    value: ast::Constant::Int(_),
                    ..
                }) => format!("({})", render_expr(&attr.value, Prec::Atom)),
                value => render_expr(value, Prec::Atom),
            };
            format!("{}.{}", value, attr.attr.as_str())
        }
        ast::Expr::Subscript(subscript) => {
            let slice = match subscript.slice.as_ref() {
                ast::Expr::Tuple(tuple)
                    if !tuple.elts.is_empty()
                        && !tuple
                            .elts
                            .iter()
                            .any(|elt| matches!(elt, ast::Expr::Starred(_))) =>
                {
                    let mut items = render_elements(&tuple.elts);
                    if tuple.elts.len() == 1 {
                        items.push(',');
                    }
                    items
                }
                slice => render_expr(slice, Prec::Tuple),
            };
            format!("{}[{}]", render_expr(&subscript.value, Prec::Atom), slice)
        }
        ast::Expr::Starred(starred) => format!("*{}", render_expr(&starred.value, Prec::Expr)),
        ast::Expr::Name(name) => name.id.as_str().to_string(),
        ast::Expr::List(list) => format!("[{}]", render_elements(&list.elts)),
        ast::Expr::Tuple(tuple) => {
            if tuple.elts.is_empty() {
                return "()".to_string();
            }
            let mut items = render_elements(&tuple.elts);
            if tuple.elts.len() == 1 {
                items.push(',');
            }
            wrap(items, Prec::Tuple, context)
        }
        ast::Expr::Slice(slice) => {
            let mut text = String::new();
            if let Some(lower) = &slice.lower {
                text.push_str(&render_expr(lower, Prec::Test));
            }
            text.push(':');
            if let Some(upper) = &slice.upper {
                text.push_str(&render_expr(upper, Prec::Test));
            }
            if let Some(step) = &slice.step {
                text.push(':');
                text.push_str(&render_expr(step, Prec::Test));
            }
            text
        }
    }
}

fn render_pattern(pattern: &ast::Pattern, nested: bool) -> String {
    let parenthesize = |text: String| if nested { format!("({})", text) } else { text };
    match pattern {
        ast::Pattern::MatchValue(value) => render_expr(&value.value, Prec::Test),
        ast::Pattern::MatchSingleton(singleton) => render_constant(&singleton.value),
        ast::Pattern::MatchSequence(sequence) => format!(
            "[{}]",
            sequence
                .patterns
                .iter()
                .map(|pattern| render_pattern(pattern, true))
                .join(", ")
        ),
        ast::Pattern::MatchMapping(mapping) => {
            let mut entries = mapping
                .keys
                .iter()
                .zip(mapping.patterns.iter())
                .map(|(key, pattern)| {
                    format!(
                        "{}: {}",
                        render_expr(key, Prec::Test),
                        render_pattern(pattern, true)
                    )
                })
                .collect::<Vec<_>>();
            if let Some(rest) = &mapping.rest {
                entries.push(format!("**{}", rest.as_str()));
            }
            format!("{{{}}}", entries.join(", "))
        }
        ast::Pattern::MatchClass(class) => {
            let args = class
                .patterns
                .iter()
                .map(|pattern| render_pattern(pattern, true))
                .chain(
                    class
                        .kwd_attrs
                        .iter()
                        .zip(class.kwd_patterns.iter())
                        .map(|(attr, pattern)| {
                            format!("{}={}", attr.as_str(), render_pattern(pattern, true))
                        }),
                )
                .join(", ");
            format!("{}({})", render_expr(&class.cls, Prec::Atom), args)
        }
        ast::Pattern::MatchStar(star) => match &star.name {
            Some(name) => format!("*{}", name.as_str()),
            None => "*_".to_string(),
        },
        ast::Pattern::MatchAs(match_as) => match (&match_as.pattern, &match_as.name) {
            (Some(pattern), Some(name)) => {
                parenthesize(format!("{} as {}", render_pattern(pattern, true), name.as_str()))
            }
            (Some(pattern), None) => render_pattern(pattern, nested),
            (None, Some(name)) => name.as_str().to_string(),
            (None, None) => "_".to_string(),
        },
        ast::Pattern::MatchOr(or) => parenthesize(
            or.patterns
                .iter()
                .map(|pattern| render_pattern(pattern, true))
                .join(" | "),
        ),
    }
}

fn render_constant(value: &ast::Constant) -> String {
    match value {
        ast::Constant::None => "None".to_string(),
        ast::Constant::Bool(true) => "True".to_string(),
        ast::Constant::Bool(false) => "False".to_string(),
        ast::Constant::Str(value) => quote_str(value),
        ast::Constant::Bytes(value) => quote_bytes(value),
        ast::Constant::Int(value) => value.to_string(),
        ast::Constant::Tuple(values) => {
            let mut items = values.iter().map(render_constant).join(", ");
            if values.len() == 1 {
                items.push(',');
            }
            format!("({})", items)
        }
        ast::Constant::Float(value) => render_float(*value),
        ast::Constant::Complex { real, imag } => {
            if *real == 0.0 {
                format!("{}j", render_float(*imag))
            } else {
                format!("({} + {}j)", render_float(*real), render_float(*imag))
            }
        }
        ast::Constant::Ellipsis => "...".to_string(),
    }
}

fn render_float(value: f64) -> String {
    if value.is_infinite() {
        // Python has no inf literal; an overflowing exponent parses to inf.
        let literal = if value > 0.0 { "1e309" } else { "-1e309" };
        literal.to_string()
    } else if value.is_nan() {
        "(1e309 - 1e309)".to_string()
    } else {
        format!("{:?}", value)
    }
}

fn choose_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double {
        '"'
    } else {
        '\''
    }
}

fn push_code_point_escape(out: &mut String, c: char) {
    let code = c as u32;
    if code <= 0xff {
        out.push_str(&format!("\\x{:02x}", code));
    } else if code <= 0xffff {
        out.push_str(&format!("\\u{:04x}", code));
    } else {
        out.push_str(&format!("\\U{:08x}", code));
    }
}

fn push_escaped_char(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() || (c.is_whitespace() && c != ' ') => push_code_point_escape(out, c),
        c => out.push(c),
    }
}

/// Python `repr()`-style string literal.
pub fn quote_str(value: &str) -> String {
    let quote = choose_quote(value.contains('\''), value.contains('"'));
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        push_escaped_char(&mut out, c, quote);
    }
    out.push(quote);
    out
}

fn quote_bytes(value: &[u8]) -> String {
    let quote = choose_quote(value.contains(&b'\''), value.contains(&b'"'));
    let mut out = String::with_capacity(value.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in value {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            byte if byte as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(byte as char),
            byte => out.push_str(&format!("\\x{:02x}", byte)),
        }
    }
    out.push(quote);
    out
}

enum FStringPiece {
    Text(String),
    Field {
        expr: String,
        conversion: Option<char>,
        spec: Vec<FStringPiece>,
    },
}

fn collect_fstring_pieces(values: &[ast::Expr], pieces: &mut Vec<FStringPiece>) {
    for value in values {
        match value {
            ast::Expr::Constant(ast::ExprConstant {
                value: ast::Constant::Str(text),
                ..
            }) => pieces.push(FStringPiece::Text(text.clone())),
            ast::Expr::JoinedStr(joined) => collect_fstring_pieces(&joined.values, pieces),
            ast::Expr::FormattedValue(formatted) => {
                let conversion = match formatted.conversion {
                    ast::ConversionFlag::None => None,
                    ast::ConversionFlag::Str => Some('s'),
                    ast::ConversionFlag::Ascii => Some('a'),
                    ast::ConversionFlag::Repr => Some('r'),
                };
                let mut spec = Vec::new();
                if let Some(format_spec) = &formatted.format_spec {
                    collect_fstring_pieces(std::slice::from_ref(format_spec.as_ref()), &mut spec);
                }
                pieces.push(FStringPiece::Field {
                    expr: render_expr(&formatted.value, Prec::Test.next()),
                    conversion,
                    spec,
                });
            }
            other => pieces.push(FStringPiece::Field {
                expr: render_expr(other, Prec::Test.next()),
                conversion: None,
                spec: Vec::new(),
            }),
        }
    }
}

fn fstring_expressions<'a>(pieces: &'a [FStringPiece], out: &mut Vec<&'a str>) {
    for piece in pieces {
        if let FStringPiece::Field { expr, spec, .. } = piece {
            out.push(expr);
            fstring_expressions(spec, out);
        }
    }
}

fn render_fstring_pieces(pieces: &[FStringPiece], quote: char, out: &mut String) {
    for piece in pieces {
        match piece {
            FStringPiece::Text(text) => {
                for c in text.chars() {
                    match c {
                        '{' => out.push_str("{{"),
                        '}' => out.push_str("}}"),
                        c => push_escaped_char(out, c, quote),
                    }
                }
            }
            FStringPiece::Field {
                expr,
                conversion,
                spec,
            } => {
                out.push('{');
                if expr.starts_with('{') {
                    out.push(' ');
                }
                out.push_str(expr);
                if let Some(conversion) = conversion {
                    out.push('!');
                    out.push(*conversion);
                }
                if !spec.is_empty() {
                    out.push(':');
                    render_fstring_pieces(spec, quote, out);
                }
                out.push('}');
            }
        }
    }
}

/// Renders an f-string, picking a quote style that none of the embedded
/// expressions use (required before Python 3.12).
fn render_fstring(values: &[ast::Expr]) -> String {
    let mut pieces = Vec::new();
    collect_fstring_pieces(values, &mut pieces);
    let mut expressions = Vec::new();
    fstring_expressions(&pieces, &mut expressions);

    let quote = ["'", "\"", "'''", "\"\"\""]
        .into_iter()
        .find(|quote| expressions.iter().all(|expr| !expr.contains(quote)))
        .unwrap_or("'");
    let quote_char = quote.chars().next().unwrap_or('\'');

    let mut body = String::new();
    render_fstring_pieces(&pieces, quote_char, &mut body);
    format!("f{}{}{}", quote, body, quote)
}
