//! Per-caller outstanding byte totals

use std::collections::{BTreeMap, BTreeSet};

/// Change in one caller's outstanding bytes between two flushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDiff {
    /// Caller token
    pub owner: String,
    /// Signed byte change
    pub delta: i64,
}

/// Mapping from caller token to signed outstanding bytes
///
/// Ordered by caller so reports come out in a stable order. Entries are
/// never dropped once created, even when they return to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTotals {
    totals: BTreeMap<String, i64>,
}

impl ModuleTotals {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute `bytes` more outstanding bytes to `owner`.
    ///
    /// A caller's total never exceeds the ledger total, which is checked
    /// before any credit; saturating here only keeps a broken caller from
    /// panicking.
    pub fn credit(&mut self, owner: &str, bytes: i64) {
        match self.totals.get_mut(owner) {
            Some(total) => *total = total.saturating_add(bytes),
            None => {
                self.totals.insert(owner.to_string(), bytes);
            }
        }
    }

    /// Take `bytes` outstanding bytes away from `owner`.
    pub fn debit(&mut self, owner: &str, bytes: i64) {
        self.credit(owner, -bytes);
    }

    /// Outstanding bytes attributed to `owner` (zero if never seen)
    pub fn get(&self, owner: &str) -> i64 {
        self.totals.get(owner).copied().unwrap_or(0)
    }

    /// Sum over all callers
    pub fn sum(&self) -> i64 {
        self.totals.values().sum()
    }

    /// Number of callers seen
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Whether no caller has been seen
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Iterate callers in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.totals
            .iter()
            .map(|(owner, &total)| (owner.as_str(), total))
    }

    /// Nonzero per-caller changes relative to an earlier snapshot.
    pub fn diff_since(&self, earlier: &ModuleTotals) -> Vec<ModuleDiff> {
        let owners: BTreeSet<&str> = self
            .totals
            .keys()
            .chain(earlier.totals.keys())
            .map(String::as_str)
            .collect();

        owners
            .into_iter()
            .filter_map(|owner| {
                let delta = self.get(owner) - earlier.get(owner);
                (delta != 0).then(|| ModuleDiff {
                    owner: owner.to_string(),
                    delta,
                })
            })
            .collect()
    }
}
