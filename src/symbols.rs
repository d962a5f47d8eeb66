//! String interning for remote-write requests
use std::collections::HashMap;

/// An insertion-ordered table of unique strings.
///
/// Reference 0 always points at the empty string.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<String>,
    index: HashMap<String, u32>,
}

impl SymbolTable {
    /// Create a table holding only the empty string
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(String::new(), 0);
        Self {
            symbols: vec![String::new()],
            index,
        }
    }

    /// Return the reference for `s`, adding it if not yet present
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&r) = self.index.get(s) {
            return r;
        }

        let r = self.symbols.len() as u32;
        self.symbols.push(s.to_string());
        self.index.insert(s.to_string(), r);
        r
    }

    /// Intern a flat name/value list, returning references in the same order
    pub fn intern_labels<S: AsRef<str>>(&mut self, labels: &[S]) -> Vec<u32> {
        labels.iter().map(|l| self.intern(l.as_ref())).collect()
    }

    /// The interned strings in reference order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn into_symbols(self) -> Vec<String> {
        self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when nothing beyond the empty string has been interned
    pub fn is_empty(&self) -> bool {
        self.symbols.len() == 1
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
