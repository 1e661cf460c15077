//! Address-keyed allocation ledger
//!
//! The ledger is the authoritative record of what is currently outstanding.
//! Its byte total is maintained incrementally on every insert and remove,
//! never recomputed on the hot path.

mod modules;

pub use modules::{ModuleDiff, ModuleTotals};

use std::collections::HashMap;

use thiserror::Error;

/// Recording an allocation would push the outstanding total past `i64::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outstanding byte total would exceed {}", i64::MAX)]
pub struct TotalOverflow;

/// One outstanding allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Size in bytes
    pub size: u64,

    /// Caller token that made the allocation
    pub owner: String,
}

impl AllocationRecord {
    /// Create a record owned by `owner`.
    pub fn new(size: u64, owner: impl Into<String>) -> Self {
        Self {
            size,
            owner: owner.into(),
        }
    }

    /// Size as a signed byte count for running totals.
    pub fn bytes(&self) -> i64 {
        i64::try_from(self.size).unwrap_or(i64::MAX)
    }
}

/// Mapping from opaque address token to allocation record
///
/// Address tokens are compared as printed; `0x10` and `0x010` are
/// different allocations.
#[derive(Debug, Default)]
pub struct Ledger {
    records: HashMap<String, AllocationRecord>,

    /// Sum of all record sizes
    total: i64,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allocation at `address`.
    ///
    /// Returns the record it displaced, if the address was already
    /// outstanding; the displaced bytes leave the total. Nothing changes
    /// when the new total would overflow.
    pub fn insert(
        &mut self,
        address: &str,
        record: AllocationRecord,
    ) -> Result<Option<AllocationRecord>, TotalOverflow> {
        self.total = self.total_after(address, record.bytes())?;
        Ok(self.records.insert(address.to_string(), record))
    }

    /// Total once `bytes` are recorded at `address`, replacing whatever is
    /// outstanding there.
    pub fn total_after(&self, address: &str, bytes: i64) -> Result<i64, TotalOverflow> {
        let displaced = self.get(address).map_or(0, AllocationRecord::bytes);
        (self.total - displaced).checked_add(bytes).ok_or(TotalOverflow)
    }

    /// Forget the allocation at `address`, if it is outstanding.
    pub fn remove(&mut self, address: &str) -> Option<AllocationRecord> {
        let record = self.records.remove(address)?;
        self.total -= record.bytes();
        Some(record)
    }

    /// Look up an outstanding allocation
    pub fn get(&self, address: &str) -> Option<&AllocationRecord> {
        self.records.get(address)
    }

    /// Outstanding bytes across all records
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Number of outstanding allocations
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate outstanding allocations in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AllocationRecord)> {
        self.records
            .iter()
            .map(|(address, record)| (address.as_str(), record))
    }

    /// Outstanding allocations sorted by address token
    pub fn outstanding(&self) -> Vec<(&str, &AllocationRecord)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Total recomputed from scratch (for consistency checks only)
    pub fn recomputed_total(&self) -> i64 {
        self.records.values().map(AllocationRecord::bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_track_total() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.insert("0x1", AllocationRecord::new(100, "A")), Ok(None));
        assert_eq!(ledger.insert("0x2", AllocationRecord::new(28, "B")), Ok(None));
        assert_eq!(ledger.total(), 128);
        assert_eq!(ledger.len(), 2);

        let removed = ledger.remove("0x1").unwrap();
        assert_eq!(removed, AllocationRecord::new(100, "A"));
        assert_eq!(ledger.total(), 28);
        assert_eq!(ledger.total(), ledger.recomputed_total());
    }

    #[test]
    fn test_remove_unknown_address_is_noop() {
        let mut ledger = Ledger::new();
        ledger.insert("0x1", AllocationRecord::new(8, "A")).unwrap();
        assert!(ledger.remove("0x2").is_none());
        assert_eq!(ledger.total(), 8);
    }

    #[test]
    fn test_overwrite_returns_displaced_record() {
        let mut ledger = Ledger::new();
        ledger.insert("0x1", AllocationRecord::new(10, "A")).unwrap();
        let displaced = ledger.insert("0x1", AllocationRecord::new(4, "B"));

        assert_eq!(displaced, Ok(Some(AllocationRecord::new(10, "A"))));
        assert_eq!(ledger.total(), 4);
        assert_eq!(ledger.get("0x1").unwrap().owner, "B");
    }

    #[test]
    fn test_insert_past_signed_range_is_refused() {
        let max = i64::MAX as u64;
        let mut ledger = Ledger::new();
        ledger.insert("0x1", AllocationRecord::new(max, "A")).unwrap();

        assert_eq!(
            ledger.insert("0x2", AllocationRecord::new(1, "A")),
            Err(TotalOverflow)
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total(), i64::MAX);

        // Replacing the record in place frees its bytes first.
        assert_eq!(
            ledger.insert("0x1", AllocationRecord::new(max, "B")),
            Ok(Some(AllocationRecord::new(max, "A")))
        );
        assert_eq!(ledger.total(), i64::MAX);
    }

    #[test]
    fn test_addresses_are_opaque_strings() {
        let mut ledger = Ledger::new();
        ledger.insert("0x10", AllocationRecord::new(1, "A")).unwrap();
        ledger.insert("0x010", AllocationRecord::new(2, "A")).unwrap();
        assert_eq!(ledger.len(), 2);

        let order: Vec<&str> = ledger.outstanding().into_iter().map(|(a, _)| a).collect();
        assert_eq!(order, vec!["0x010", "0x10"]);
    }
}
