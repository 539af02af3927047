//! Bookkeeping table of registered memory ranges.
//!
//! The directive layer registers named buffers of the traced program
//! (group, name, address, size, element type). Nothing here reads the
//! memory; the table only records what was declared.

use approx_store_core::ScalarType;
use rustc_hash::FxHashMap;

/// One registered range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    /// Group the range belongs to
    pub group: String,
    /// Range name
    pub name: String,
    /// Start address
    pub address: u64,
    /// Length in bytes
    pub size_bytes: u64,
    /// Element type
    pub scalar_type: ScalarType,
}

impl MemoryEntry {
    /// Number of whole elements in the range.
    pub fn num_elements(&self) -> u64 {
        self.size_bytes / self.scalar_type.size_in_bytes() as u64
    }
}

/// Name-keyed table of [`MemoryEntry`] values.
///
/// Registering the same `(group, name)` again replaces the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    entries: FxHashMap<(String, String), MemoryEntry>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        MemoryRegistry::default()
    }

    /// Record a range. Returns the entry it replaced, if any.
    pub fn register(&mut self, entry: MemoryEntry) -> Option<MemoryEntry> {
        self.entries
            .insert((entry.group.clone(), entry.name.clone()), entry)
    }

    /// Entry by group and name.
    pub fn get(&self, group: &str, name: &str) -> Option<&MemoryEntry> {
        self.entries.get(&(group.to_string(), name.to_string()))
    }

    /// Entries of one group, sorted by name.
    pub fn group(&self, group: &str) -> Vec<&MemoryEntry> {
        let mut entries: Vec<_> = self.entries.values().filter(|e| e.group == group).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// All entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all registered sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size_bytes).sum()
    }
}
