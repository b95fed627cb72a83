//! # Symbol Table
//!
//! Per-graph string interner handing out dense [`SymbolId`]s, plus the
//! declared-symbol set the front-end uses to pin user-visible names, plus the
//! internal-symbol generator passes use to mint anonymous entities.
//!
//! Interning is idempotent; `text` retrieval is O(1). All containers are
//! `BTreeMap`/`BTreeSet` for deterministic iteration.

use crate::types::SymbolId;
use std::collections::{BTreeMap, BTreeSet};

/// Per-graph interner with declared-symbol tracking.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Dense storage: `SymbolId(i)` maps to `texts[i]`.
    texts: Vec<String>,

    /// Reverse lookup: text -> id.
    index: BTreeMap<String, SymbolId>,

    /// Identifiers the front-end promised to preserve across optimizations.
    declared: BTreeSet<SymbolId>,

    /// Counter for internal value symbols (`_val_<n>`).
    internal_val_counter: u32,

    /// Counter for internal operation symbols (`_op_<n>`).
    internal_op_counter: u32,
}

impl SymbolTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the existing id when already present.
    pub fn intern(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = SymbolId(self.texts.len() as u32);
        self.texts.push(text.to_string());
        self.index.insert(text.to_string(), id);
        id
    }

    /// Retrieve the text for an id. The sentinel maps to the empty string.
    #[must_use]
    pub fn text(&self, id: SymbolId) -> &str {
        self.texts.get(id.index()).map_or("", String::as_str)
    }

    /// Look up a string without interning. Returns the sentinel when absent.
    #[must_use]
    pub fn lookup(&self, text: &str) -> SymbolId {
        self.index.get(text).copied().unwrap_or_default()
    }

    /// True if the string has been interned.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    /// Number of interned symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// True if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    // =========================================================================
    // DECLARED SYMBOLS
    // =========================================================================

    /// Record an identifier the front-end requires to survive optimization.
    pub fn mark_declared(&mut self, id: SymbolId) {
        if id.is_valid() {
            self.declared.insert(id);
        }
    }

    /// True if the identifier was marked declared.
    #[must_use]
    pub fn is_declared(&self, id: SymbolId) -> bool {
        self.declared.contains(&id)
    }

    /// Declared symbols in id order.
    pub fn declared_symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.declared.iter().copied()
    }

    // =========================================================================
    // INTERNAL SYMBOL GENERATION
    // =========================================================================

    /// Mint a fresh `_val_<n>` symbol, advancing the counter past collisions
    /// with interned names.
    pub fn make_internal_val_sym(&mut self) -> SymbolId {
        loop {
            let candidate = format!("_val_{}", self.internal_val_counter);
            self.internal_val_counter = self.internal_val_counter.saturating_add(1);
            if !self.contains(&candidate) {
                return self.intern(&candidate);
            }
        }
    }

    /// Mint a fresh `_op_<n>` symbol, advancing the counter past collisions.
    pub fn make_internal_op_sym(&mut self) -> SymbolId {
        loop {
            let candidate = format!("_op_{}", self.internal_op_counter);
            self.internal_op_counter = self.internal_op_counter.saturating_add(1);
            if !self.contains(&candidate) {
                return self.intern(&candidate);
            }
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
///
/// Used when deriving port names from hierarchical paths.
#[must_use]
pub fn sanitize_identifier(text: &str) -> String {
    let out: String = text
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if out.is_empty() { "xmr".to_string() } else { out }
}

// =============================================================================
// TESTS
// =============================================================================
