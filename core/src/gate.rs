//! Allow/deny lists of column names.

use compact_str::CompactString;
use hashbrown::HashSet;

/// A pair of column lists deciding which names pass.
///
/// A non-empty allow list is authoritative: the deny list is only
/// consulted when nothing is explicitly allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnGate {
    allow: HashSet<CompactString>,
    deny: HashSet<CompactString>,
}

impl ColumnGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.allow.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn deny<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.deny.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn is_open(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    pub fn permits(&self, column: &str) -> bool {
        if !self.allow.is_empty() {
            return self.allow.contains(column);
        }
        !self.deny.contains(column)
    }
}
