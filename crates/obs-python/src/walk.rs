//! Mutable traversal over the rustpython syntax tree.
//!
//! Implementors override the `visit_*` hooks they care about and call the
//! matching `walk_*` function to keep descending. Children are visited in
//! source order, which the renamer relies on for placeholder numbering.

use rustpython_parser::ast;

pub trait VisitMut {
    fn visit_body(&mut self, body: &mut Vec<ast::Stmt>) {
        walk_body(self, body)
    }

    fn visit_stmt(&mut self, stmt: &mut ast::Stmt) {
        walk_stmt(self, stmt)
    }

    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        walk_expr(self, expr)
    }

    fn visit_arguments(&mut self, args: &mut ast::Arguments) {
        walk_arguments(self, args)
    }

    fn visit_comprehension(&mut self, comprehension: &mut ast::Comprehension) {
        walk_comprehension(self, comprehension)
    }

    fn visit_except_handler(&mut self, handler: &mut ast::ExceptHandler) {
        walk_except_handler(self, handler)
    }

    fn visit_match_case(&mut self, case: &mut ast::MatchCase) {
        walk_match_case(self, case)
    }

    fn visit_pattern(&mut self, pattern: &mut ast::Pattern) {
        walk_pattern(self, pattern)
    }

    fn visit_alias(&mut self, _alias: &mut ast::Alias) {}
}

pub fn walk_body<V: VisitMut + ?Sized>(visitor: &mut V, body: &mut Vec<ast::Stmt>) {
    for stmt in body.iter_mut() {
        visitor.visit_stmt(stmt);
    }
}

fn walk_exprs<V: VisitMut + ?Sized>(visitor: &mut V, exprs: &mut [ast::Expr]) {
    for expr in exprs.iter_mut() {
        visitor.visit_expr(expr);
    }
}

fn walk_opt_expr<V: VisitMut + ?Sized>(visitor: &mut V, expr: &mut Option<Box<ast::Expr>>) {
    if let Some(expr) = expr {
        visitor.visit_expr(expr);
    }
}

pub fn walk_stmt<V: VisitMut + ?Sized>(visitor: &mut V, stmt: &mut ast::Stmt) {
    match stmt {
        ast::Stmt::FunctionDef(def) => {
            walk_exprs(visitor, &mut def.decorator_list);
            visitor.visit_arguments(&mut def.args);
            walk_opt_expr(visitor, &mut def.returns);
            visitor.visit_body(&mut def.body);
        }
        ast::Stmt::AsyncFunctionDef(def) => {
            walk_exprs(visitor, &mut def.decorator_list);
            visitor.visit_arguments(&mut def.args);
            walk_opt_expr(visitor, &mut def.returns);
            visitor.visit_body(&mut def.body);
        }
        ast::Stmt::ClassDef(def) => {
            walk_exprs(visitor, &mut def.decorator_list);
            walk_exprs(visitor, &mut def.bases);
            for keyword in def.keywords.iter_mut() {
                visitor.visit_expr(&mut keyword.value);
            }
            visitor.visit_body(&mut def.body);
        }
        ast::Stmt::Return(ret) => walk_opt_expr(visitor, &mut ret.value),
        ast::Stmt::Delete(del) => walk_exprs(visitor, &mut del.targets),
        ast::Stmt::Assign(assign) => {
            walk_exprs(visitor, &mut assign.targets);
            visitor.visit_expr(&mut assign.value);
        }
        ast::Stmt::AugAssign(assign) => {
            visitor.visit_expr(&mut assign.target);
            visitor.visit_expr(&mut assign.value);
        }
        ast::Stmt::AnnAssign(assign) => {
            visitor.visit_expr(&mut assign.target);
            visitor.visit_expr(&mut assign.annotation);
            walk_opt_expr(visitor, &mut assign.value);
        }
        ast::Stmt::For(stmt_for) => {
            visitor.visit_expr(&mut stmt_for.target);
            visitor.visit_expr(&mut stmt_for.iter);
            visitor.visit_body(&mut stmt_for.body);
            visitor.visit_body(&mut stmt_for.orelse);
        }
        ast::Stmt::AsyncFor(stmt_for) => {
            visitor.visit_expr(&mut stmt_for.target);
            visitor.visit_expr(&mut stmt_for.iter);
            visitor.visit_body(&mut stmt_for.body);
            visitor.visit_body(&mut stmt_for.orelse);
        }
        ast::Stmt::While(stmt_while) => {
            visitor.visit_expr(&mut stmt_while.test);
            visitor.visit_body(&mut stmt_while.body);
            visitor.visit_body(&mut stmt_while.orelse);
        }
        ast::Stmt::If(stmt_if) => {
            visitor.visit_expr(&mut stmt_if.test);
            visitor.visit_body(&mut stmt_if.body);
            visitor.visit_body(&mut stmt_if.orelse);
        }
        ast::Stmt::With(with) => {
            for item in with.items.iter_mut() {
                visitor.visit_expr(&mut item.context_expr);
                walk_opt_expr(visitor, &mut item.optional_vars);
            }
            visitor.visit_body(&mut with.body);
        }
        ast::Stmt::AsyncWith(with) => {
            for item in with.items.iter_mut() {
                visitor.visit_expr(&mut item.context_expr);
                walk_opt_expr(visitor, &mut item.optional_vars);
            }
            visitor.visit_body(&mut with.body);
        }
        ast::Stmt::Match(stmt_match) => {
            visitor.visit_expr(&mut stmt_match.subject);
            for case in stmt_match.cases.iter_mut() {
                visitor.visit_match_case(case);
            }
        }
        ast::Stmt::Raise(raise) => {
            walk_opt_expr(visitor, &mut raise.exc);
            walk_opt_expr(visitor, &mut raise.cause);
        }
        ast::Stmt::Try(stmt_try) => {
            visitor.visit_body(&mut stmt_try.body);
            for handler in stmt_try.handlers.iter_mut() {
                visitor.visit_except_handler(handler);
            }
            visitor.visit_body(&mut stmt_try.orelse);
            visitor.visit_body(&mut stmt_try.finalbody);
        }
        ast::Stmt::TryStar(stmt_try) => {
            visitor.visit_body(&mut stmt_try.body);
            for handler in stmt_try.handlers.iter_mut() {
                visitor.visit_except_handler(handler);
            }
            visitor.visit_body(&mut stmt_try.orelse);
            visitor.visit_body(&mut stmt_try.finalbody);
        }
        ast::Stmt::Assert(assert) => {
            visitor.visit_expr(&mut assert.test);
            walk_opt_expr(visitor, &mut assert.msg);
        }
        ast::Stmt::Import(import) => {
            for alias in import.names.iter_mut() {
                visitor.visit_alias(alias);
            }
        }
        ast::Stmt::ImportFrom(import) => {
            for alias in import.names.iter_mut() {
                visitor.visit_alias(alias);
            }
        }
        ast::Stmt::Expr(expr) => visitor.visit_expr(&mut expr.value),
        ast::Stmt::Global(_)
        | ast::Stmt::Nonlocal(_)
        | ast::Stmt::Pass(_)
        | ast::Stmt::Break(_)
        | ast::Stmt::Continue(_) => {}
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

pub fn walk_expr<V: VisitMut + ?Sized>(visitor: &mut V, expr: &mut ast::Expr) {
    match expr {
        ast::Expr::BoolOp(op) => walk_exprs(visitor, &mut op.values),
        ast::Expr::NamedExpr(named) => {
            visitor.visit_expr(&mut named.target);
            visitor.visit_expr(&mut named.value);
        }
        ast::Expr::BinOp(op) => {
            visitor.visit_expr(&mut op.left);
            visitor.visit_expr(&mut op.right);
        }
        ast::Expr::UnaryOp(op) => visitor.visit_expr(&mut op.operand),
        ast::Expr::Lambda(lambda) => {
            visitor.visit_arguments(&mut lambda.args);
            visitor.visit_expr(&mut lambda.body);
        }
        ast::Expr::IfExp(if_exp) => {
            visitor.visit_expr(&mut if_exp.body);
            visitor.visit_expr(&mut if_exp.test);
            visitor.visit_expr(&mut if_exp.orelse);
        }
        ast::Expr::Dict(dict) => {
            for (key, value) in dict.keys.iter_mut().zip(dict.values.iter_mut()) {
                if let Some(key) = key {
                    visitor.visit_expr(key);
                }
                visitor.visit_expr(value);
            }
        }
        ast::Expr::Set(set) => walk_exprs(visitor, &mut set.elts),
        ast::Expr::ListComp(comp) => {
            visitor.visit_expr(&mut comp.elt);
            for generator in comp.generators.iter_mut() {
                visitor.visit_comprehension(generator);
            }
        }
        ast::Expr::SetComp(comp) => {
            visitor.visit_expr(&mut comp.elt);
            for generator in comp.generators.iter_mut() {
                visitor.visit_comprehension(generator);
            }
        }
        ast::Expr::DictComp(comp) => {
            visitor.visit_expr(&mut comp.key);
            visitor.visit_expr(&mut comp.value);
            for generator in comp.generators.iter_mut() {
                visitor.visit_comprehension(generator);
            }
        }
        ast::Expr::GeneratorExp(comp) => {
            visitor.visit_expr(&mut comp.elt);
            for generator in comp.generators.iter_mut() {
                visitor.visit_comprehension(generator);
            }
        }
        ast::Expr::Await(await_expr) => visitor.visit_expr(&mut await_expr.value),
        ast::Expr::Yield(yield_expr) => walk_opt_expr(visitor, &mut yield_expr.value),
        ast::Expr::YieldFrom(yield_from) => visitor.visit_expr(&mut yield_from.value),
        ast::Expr::Compare(compare) => {
            visitor.visit_expr(&mut compare.left);
            walk_exprs(visitor, &mut compare.comparators);
        }
        ast::Expr::Call(call) => {
            visitor.visit_expr(&mut call.func);
            walk_exprs(visitor, &mut call.args);
            for keyword in call.keywords.iter_mut() {
                visitor.visit_expr(&mut keyword.value);
            }
        }
        ast::Expr::FormattedValue(value) => {
            visitor.visit_expr(&mut value.value);
            walk_opt_expr(visitor, &mut value.format_spec);
        }
        ast::Expr::JoinedStr(joined) => walk_exprs(visitor, &mut joined.values),
        ast::Expr::Attribute(attr) => visitor.visit_expr(&mut attr.value),
        ast::Expr::Subscript(subscript) => {
            visitor.visit_expr(&mut subscript.value);
            visitor.visit_expr(&mut subscript.slice);
        }
        ast::Expr::Starred(starred) => visitor.visit_expr(&mut starred.value),
        ast::Expr::List(list) => walk_exprs(visitor, &mut list.elts),
        ast::Expr::Tuple(tuple) => walk_exprs(visitor, &mut tuple.elts),
        ast::Expr::Slice(slice) => {
            walk_opt_expr(visitor, &mut slice.lower);
            walk_opt_expr(visitor, &mut slice.upper);
            walk_opt_expr(visitor, &mut slice.step);
        }
        ast::Expr::Constant(_) | ast::Expr::Name(_) => {}
    }
}

pub fn walk_arguments<V: VisitMut + ?Sized>(visitor: &mut V, args: &mut ast::Arguments) {
    for arg in args
        .posonlyargs
        .iter_mut()
        .chain(args.args.iter_mut())
        .chain(args.kwonlyargs.iter_mut())
    {
        if let Some(annotation) = &mut arg.def.annotation {
            visitor.visit_expr(annotation);
        }
        if let Some(default) = &mut arg.default {
            visitor.visit_expr(default);
        }
    }
    for arg in args.vararg.iter_mut().chain(args.kwarg.iter_mut()) {
        if let Some(annotation) = &mut arg.annotation {
            visitor.visit_expr(annotation);
        }
    }
}

pub fn walk_comprehension<V: VisitMut + ?Sized>(
    visitor: &mut V,
    comprehension: &mut ast::Comprehension,
) {
    visitor.visit_expr(&mut comprehension.target);
    visitor.visit_expr(&mut comprehension.iter);
    walk_exprs(visitor, &mut comprehension.ifs);
}

pub fn walk_except_handler<V: VisitMut + ?Sized>(
    visitor: &mut V,
    handler: &mut ast::ExceptHandler,
) {
    let ast::ExceptHandler::ExceptHandler(handler) = handler;
    walk_opt_expr(visitor, &mut handler.type_);
    visitor.visit_body(&mut handler.body);
}

pub fn walk_match_case<V: VisitMut + ?Sized>(visitor: &mut V, case: &mut ast::MatchCase) {
    visitor.visit_pattern(&mut case.pattern);
    walk_opt_expr(visitor, &mut case.guard);
    visitor.visit_body(&mut case.body);
}

pub fn walk_pattern<V: VisitMut + ?Sized>(visitor: &mut V, pattern: &mut ast::Pattern) {
    match pattern {
        ast::Pattern::MatchValue(value) => visitor.visit_expr(&mut value.value),
        ast::Pattern::MatchSingleton(_) | ast::Pattern::MatchStar(_) => {}
        ast::Pattern::MatchSequence(sequence) => {
            for pattern in sequence.patterns.iter_mut() {
                visitor.visit_pattern(pattern);
            }
        }
        ast::Pattern::MatchMapping(mapping) => {
            walk_exprs(visitor, &mut mapping.keys);
            for pattern in mapping.patterns.iter_mut() {
                visitor.visit_pattern(pattern);
            }
        }
        ast::Pattern::MatchClass(class) => {
            visitor.visit_expr(&mut class.cls);
            for pattern in class
                .patterns
                .iter_mut()
                .chain(class.kwd_patterns.iter_mut())
            {
                visitor.visit_pattern(pattern);
            }
        }
        ast::Pattern::MatchAs(match_as) => {
            if let Some(pattern) = &mut match_as.pattern {
                visitor.visit_pattern(pattern);
            }
        }
        ast::Pattern::MatchOr(or) => {
            for pattern in or.patterns.iter_mut() {
                visitor.visit_pattern(pattern);
            }
        }
    }
}
