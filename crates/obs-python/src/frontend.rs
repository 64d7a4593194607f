//! Python frontend backed by rustpython-parser.

use std::path::{Path, PathBuf};

use obs_core::error::{Error, Result};
use rustpython_parser::ast;
use rustpython_parser::Parse;
use tracing::debug;

use crate::printer::PythonPrinter;
use crate::walk::{walk_expr, VisitMut};

const DEFAULT_SOURCE_PATH: &str = "<python>";

/// Raw source text plus its parsed module body. Owned by a single transform
/// call and dropped when the call returns.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub source: String,
    pub suite: ast::Suite,
    /// Byte offset of a string literal the printer cannot reproduce.
    lossy_literal: Option<usize>,
}

impl SourceUnit {
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with_path(source, None)
    }

    pub fn parse_with_path(source: &str, path: Option<&Path>) -> Result<Self> {
        let source_path = path
            .and_then(|path| path.to_str())
            .unwrap_or(DEFAULT_SOURCE_PATH);
        let mut suite = ast::Suite::parse(source, source_path).map_err(|err| {
            Error::parse(err.error.to_string(), u32::from(err.offset) as usize)
        })?;
        let lossy_literal = find_lone_surrogate(source, &mut suite);
        debug!(path = source_path, statements = suite.len(), "parsed python unit");
        Ok(Self {
            path: path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_PATH)),
            source: source.to_string(),
            suite,
            lossy_literal,
        })
    }

    /// Prints the (possibly rewritten) tree back to Python text and checks
    /// that the result parses again.
    pub fn regenerate(&self) -> Result<String> {
        if let Some(offset) = self.lossy_literal {
            return Err(Error::regeneration(format!(
                "string literal at byte {} holds a lone surrogate escape that cannot be reproduced",
                offset
            )));
        }
        let text = PythonPrinter::new().print_suite(&self.suite)?;
        ast::Suite::parse(&text, "<regenerated>").map_err(|err| {
            Error::regeneration(format!(
                "printed source does not parse: {} at byte {}",
                err.error,
                u32::from(err.offset)
            ))
        })?;
        Ok(text)
    }
}

/// Entry point used by the pipeline stages to obtain a [`SourceUnit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonFrontend;

impl PythonFrontend {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source: &str, path: Option<&Path>) -> Result<SourceUnit> {
        SourceUnit::parse_with_path(source, path)
    }
}

/// The parser decodes a `\uD800`-style escape to U+FFFD, so printing such a
/// literal back would change the program.
fn find_lone_surrogate(source: &str, suite: &mut ast::Suite) -> Option<usize> {
    let mut scan = SurrogateScan {
        source,
        found: None,
    };
    scan.visit_body(suite);
    scan.found
}

struct SurrogateScan<'a> {
    source: &'a str,
    found: Option<usize>,
}

impl VisitMut for SurrogateScan<'_> {
    fn visit_expr(&mut self, expr: &mut ast::Expr) {
        if self.found.is_some() {
            return;
        }
        if let ast::Expr::Constant(ast::ExprConstant {
            value: ast::Constant::Str(value),
            range,
            ..
        }) = expr
        {
            if value.contains('\u{FFFD}') {
                let start = usize::from(range.start());
                let end = usize::from(range.end());
                let literal = self.source.get(start..end).unwrap_or_default();
                if has_surrogate_escape(literal) {
                    self.found = Some(start);
                }
            }
            return;
        }
        walk_expr(self, expr);
    }
}

/// True when `literal` (a string token with its prefix and quotes) spells a
/// `\u` or `\U` escape in the D800..=DFFF range.
fn has_surrogate_escape(literal: &str) -> bool {
    let prefix_end = literal.find(['\'', '"']).unwrap_or(0);
    if literal[..prefix_end].contains(['r', 'R']) {
        return false;
    }
    let bytes = literal.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] != b'\\' {
            idx += 1;
            continue;
        }
        let run_start = idx;
        while idx < bytes.len() && bytes[idx] == b'\\' {
            idx += 1;
        }
        if (idx - run_start) % 2 == 0 {
            continue;
        }
        let digits = match bytes.get(idx) {
            Some(b'u') => 4,
            Some(b'U') => 8,
            _ => continue,
        };
        let hex = literal.get(idx + 1..idx + 1 + digits).unwrap_or_default();
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            if (0xD800..=0xDFFF).contains(&code) {
                return true;
            }
        }
    }
    false
}
