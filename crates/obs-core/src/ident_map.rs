//! Per-call mapping from original identifiers to generated placeholders.

use std::collections::{HashMap, HashSet};

const PLACEHOLDER_PREFIX: &str = "var_";

/// Identifies the scope a binding lives in. Scope ids are assigned by the
/// renamer in traversal order; the lexical policy uses a single scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const MODULE: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierEntry {
    pub original: String,
    pub placeholder: String,
    pub scope: ScopeId,
    /// Human readable scope name, e.g. `<module>`, `load_config`, `<lambda>`.
    pub scope_label: String,
}

/// Insertion-ordered rename table. Entries are created on first occurrence and
/// numbered `var_0001`, `var_0002`, ... skipping any reserved name.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMap {
    entries: Vec<IdentifierEntry>,
    index: HashMap<(ScopeId, String), usize>,
    reserved: HashSet<String>,
    counter: usize,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names already present in the source; generated placeholders never
    /// collide with them.
    pub fn with_reserved(reserved: impl IntoIterator<Item = String>) -> Self {
        Self {
            reserved: reserved.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn get(&self, scope: ScopeId, original: &str) -> Option<&str> {
        self.index
            .get(&(scope, original.to_string()))
            .map(|&idx| self.entries[idx].placeholder.as_str())
    }

    /// Returns the placeholder for `original` in `scope`, allocating the next
    /// free one on first sight.
    pub fn assign(&mut self, scope: ScopeId, scope_label: &str, original: &str) -> String {
        let key = (scope, original.to_string());
        if let Some(&idx) = self.index.get(&key) {
            return self.entries[idx].placeholder.clone();
        }
        let placeholder = self.next_placeholder();
        self.index.insert(key, self.entries.len());
        self.entries.push(IdentifierEntry {
            original: original.to_string(),
            placeholder: placeholder.clone(),
            scope,
            scope_label: scope_label.to_string(),
        });
        placeholder
    }

    fn next_placeholder(&mut self) -> String {
        loop {
            self.counter += 1;
            let candidate = format_placeholder(self.counter);
            if !self.reserved.contains(&candidate) {
                return candidate;
            }
        }
    }

    pub fn entries(&self) -> &[IdentifierEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reverse lookup used when reporting: placeholder back to original name.
    pub fn original_of(&self, placeholder: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.placeholder == placeholder)
            .map(|entry| entry.original.as_str())
    }
}

pub fn format_placeholder(n: usize) -> String {
    format!("{}{:04}", PLACEHOLDER_PREFIX, n)
}

/// True for names shaped like generated placeholders (`var_` + 4 or more digits).
pub fn is_placeholder(name: &str) -> bool {
    name.strip_prefix(PLACEHOLDER_PREFIX)
        .map(|digits| digits.len() >= 4 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn placeholders_are_sequential_and_reused() {
        let mut map = IdentifierMap::new();
        assert_eq!(map.assign(ScopeId::MODULE, "<module>", "total"), "var_0001");
        assert_eq!(map.assign(ScopeId::MODULE, "<module>", "count"), "var_0002");
        assert_eq!(map.assign(ScopeId::MODULE, "<module>", "total"), "var_0001");
        assert_eq!(map.len(), 2);
        assert_eq!(map.original_of("var_0002"), Some("count"));
    }

    #[test]
    fn same_name_in_two_scopes_gets_two_placeholders() {
        let mut map = IdentifierMap::new();
        let outer = map.assign(ScopeId(0), "<module>", "x");
        let inner = map.assign(ScopeId(1), "f", "x");
        assert_ne!(outer, inner);
        assert_eq!(map.get(ScopeId(1), "x"), Some("var_0002"));
    }

    #[test]
    fn reserved_names_are_skipped() {
        let mut map = IdentifierMap::with_reserved(vec!["var_0001".to_string()]);
        assert_eq!(map.assign(ScopeId::MODULE, "<module>", "a"), "var_0002");
    }

    #[test]
    fn recognizes_placeholder_shape() {
        assert!(is_placeholder("var_0001"));
        assert!(is_placeholder("var_12345"));
        assert!(!is_placeholder("var_01"));
        assert!(!is_placeholder("variable"));
    }
}
