use std::collections::BTreeSet;

use obs_bytecode::{extract_unit, render_loader, CompileToLoadableUnit};
use obs_core::ident_map::is_placeholder;
use obs_python::walk::{walk_expr, VisitMut};
use obs_python::{
    rename_identifiers, wrap_string_literals, PythonUnitCompiler, RenamePolicy, SourceUnit,
};
use pretty_assertions::assert_eq;
use rustpython_parser::ast;

const SAMPLE: &str = r#"import json

def summarize(records):
    total = 0
    names = []
    for record in records:
        total += record["amount"]
        names.append(record["name"])
    label = f"{len(names)} records"
    return {"total": total, "label": label}

data = [{"name": "a", "amount": 2}, {"name": "b", "amount": 3}]
report = summarize(data)
print(json.dumps(report))
"#;

#[derive(Default)]
struct NameCollector {
    names: BTreeSet<String>,
}

impl VisitMut for NameCollector {
    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        if let ast::Expr::Name(name) = expr {
            self.names.insert(name.id.as_str().to_string());
        }
        walk_expr(self, expr);
    }
}

fn referenced_names(source: &str) -> BTreeSet<String> {
    let mut unit = SourceUnit::parse(source).unwrap();
    let mut collector = NameCollector::default();
    collector.visit_body(&mut unit.suite);
    collector.names
}

fn distinct_placeholders(source: &str) -> usize {
    referenced_names(source)
        .into_iter()
        .filter(|name| is_placeholder(name))
        .count()
}

#[test]
fn test_scope_aware_output_has_no_renamable_names_left() {
    let output = rename_identifiers(SAMPLE, RenamePolicy::ScopeAware).unwrap();
    let remaining = referenced_names(&output.text);
    for renamed in ["json", "summarize", "total", "names", "record", "label", "data", "report"] {
        assert!(!remaining.contains(renamed), "{renamed} survived:\n{}", output.text);
    }
    // The parameter keeps its name so keyword callers still work.
    assert!(remaining.contains("records"));
    assert!(remaining.contains("len"));
    assert!(remaining.contains("print"));
}

#[test]
fn test_lexical_output_has_no_non_builtin_names_left() {
    let output = rename_identifiers(SAMPLE, RenamePolicy::Lexical).unwrap();
    let remaining = referenced_names(&output.text);
    let non_placeholders = remaining
        .iter()
        .filter(|name| !is_placeholder(name))
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(non_placeholders, vec!["len".to_string(), "print".to_string()]);
}

#[test]
fn test_renaming_twice_keeps_placeholder_count() {
    for policy in [RenamePolicy::Lexical, RenamePolicy::ScopeAware] {
        let once = rename_identifiers(SAMPLE, policy).unwrap();
        let twice = rename_identifiers(&once.text, policy).unwrap();
        assert_eq!(once.map.len(), twice.map.len(), "{policy:?}");
        assert_eq!(
            distinct_placeholders(&once.text),
            distinct_placeholders(&twice.text),
            "{policy:?}"
        );
    }
}

#[test]
fn test_wrapped_strings_keep_their_values() {
    let output = wrap_string_literals(SAMPLE).unwrap();
    assert_eq!(output.wrapped, 10);
    assert!(!output.text.contains("\"amount\""));
    assert!(!output.text.contains("'amount'"));
    // The f-string literal part is untouched.
    assert!(output.text.contains(" records"));
    assert!(SourceUnit::parse(&output.text).is_ok());
}

#[test]
fn test_loader_embeds_the_normalized_program() {
    let renamed = rename_identifiers(SAMPLE, RenamePolicy::ScopeAware).unwrap();
    let unit = PythonUnitCompiler::new().compile(&renamed.text).unwrap();
    let loader = render_loader(&unit);
    let recovered = extract_unit(&loader).unwrap().source().unwrap();
    assert_eq!(recovered, renamed.text);
}

#[test]
fn test_printer_round_trips_sample() {
    let unit = SourceUnit::parse(SAMPLE).unwrap();
    let printed = unit.regenerate().unwrap();
    let reparsed = SourceUnit::parse(&printed).unwrap();
    assert_eq!(reparsed.regenerate().unwrap(), printed);
}
