//! String interner for labels, mnemonics and directive names.
//! Provides fixed-width `Symbol` handles for deduplicated strings.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{to_raw, RawIndex, INDEX_CAPACITY};
use crate::core::{GraphError, IndexKind};

/// Label attached to the edge linking an enclosing scope to a nested label.
/// Not a valid identifier, so it never collides with user symbols.
pub const CONTAINS_LABEL: &str = "<contains>";

/// Reserved words interned before any document text.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    CONTAINS_LABEL,
    // Directives
    ".section",
    ".global",
    ".extern",
    ".align",
    ".byte",
    ".word",
    ".quad",
    ".ascii",
    // Mnemonics
    "mov",
    "lea",
    "add",
    "sub",
    "cmp",
    "push",
    "pop",
    "jmp",
    "je",
    "jne",
    "call",
    "ret",
    "nop",
];

/// Interned string handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(RawIndex);

impl Symbol {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Ordered list of reserved words.
///
/// Every table seeded from the same `KeywordSeed` assigns the same handles to
/// its words, so keyword symbols stay stable across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSeed {
    words: Vec<String>,
    index: HashSet<String>,
}

impl KeywordSeed {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seed = Self {
            words: Vec::new(),
            index: HashSet::new(),
        };
        seed.extend(words);
        seed
    }

    /// Appends words that are not already part of the seed.
    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for word in words {
            let word = word.into();
            if self.index.insert(word.clone()) {
                self.words.push(word);
            }
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for KeywordSeed {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    map: HashMap<Arc<str>, Symbol>,
    strings: Vec<Arc<str>>,
    bytes: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose first handles belong to the words of `seed`, in order.
    pub fn seeded(seed: &KeywordSeed) -> Result<Self, GraphError> {
        let mut table = Self::new();
        for word in seed.words() {
            table.intern(word)?;
        }
        Ok(table)
    }

    /// Returns the handle of `s`, allocating one on first occurrence.
    pub fn intern(&mut self, s: &str) -> Result<Symbol, GraphError> {
        if let Some(&sym) = self.map.get(s) {
            return Ok(sym);
        }
        let raw = to_raw(self.strings.len()).ok_or(GraphError::CapacityExceeded {
            kind: IndexKind::Symbol,
            capacity: INDEX_CAPACITY,
        })?;
        let sym = Symbol(raw);
        let stored: Arc<str> = Arc::from(s);
        self.bytes += s.len();
        self.strings.push(Arc::clone(&stored));
        self.map.insert(stored, sym);
        tracing::trace!(symbol = %sym, text = s, "interned");
        Ok(sym)
    }

    /// Looks up `s` without interning it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Display string of `sym`; foreign handles are rejected, not trusted.
    pub fn resolve(&self, sym: Symbol) -> Result<&str, GraphError> {
        self.strings
            .get(sym.index())
            .map(|s| &**s)
            .ok_or(GraphError::InvalidIndex {
                kind: IndexKind::Symbol,
                index: sym.index(),
                len: self.strings.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Total bytes of interned text.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.strings
            .iter()
            .enumerate()
            .filter_map(|(i, s)| to_raw(i).map(|raw| (Symbol(raw), &**s)))
    }
}
