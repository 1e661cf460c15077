//! Engine state: ledger, per-caller totals, and the flush snapshot
//!
//! Every mutation of the ledger is paired with the opposite mutation of the
//! owning caller's total, so at any point
//!
//! `modules.sum() == ledger.total() == sum(record.size)`
//!
//! Released bytes are always debited from the caller that *made* the
//! allocation, whatever caller the release line names.

use tracing::debug;

use crate::classify::AllocEvent;
use crate::ledger::{AllocationRecord, Ledger, ModuleDiff, ModuleTotals, TotalOverflow};

/// Changes since the previous flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushDelta {
    /// Change in total outstanding bytes
    pub total_diff: i64,

    /// Nonzero per-caller changes, ordered by caller
    pub modules: Vec<ModuleDiff>,
}

impl FlushDelta {
    /// Whether nothing changed since the previous flush
    pub fn is_empty(&self) -> bool {
        self.total_diff == 0 && self.modules.is_empty()
    }
}

/// Everything still outstanding when the stream ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    /// Unfreed allocations as (address, record), ordered by address
    pub unfreed: Vec<(String, AllocationRecord)>,

    /// Nonzero per-caller totals, ordered by caller
    pub end_totals: Vec<(String, i64)>,
}

impl LeakReport {
    /// Whether the run ended with nothing outstanding
    pub fn is_clean(&self) -> bool {
        self.unfreed.is_empty() && self.end_totals.is_empty()
    }
}

/// Running allocation state owned by the batch scheduler
#[derive(Debug, Default)]
pub struct EngineState {
    ledger: Ledger,
    modules: ModuleTotals,

    /// Copy of `modules` taken at the previous flush
    snapshot: ModuleTotals,

    /// Ledger total at the previous flush
    last_flush_total: i64,
}

impl EngineState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the ledger and the per-caller totals.
    ///
    /// An event that would push the outstanding total past `i64::MAX` is
    /// refused and leaves the state untouched.
    pub fn apply(&mut self, event: &AllocEvent<'_>) -> Result<(), TotalOverflow> {
        match *event {
            AllocEvent::Allocate {
                caller,
                size,
                address,
            } => self.record(caller, size, address)?,
            AllocEvent::AllocateZeroed {
                caller,
                count,
                elem_size,
                address,
            } => self.record(caller, count.saturating_mul(elem_size), address)?,
            AllocEvent::Release { caller, address } => {
                if self.release(address).is_none() {
                    debug!(caller, address, "release of untracked address ignored");
                }
            }
            AllocEvent::Reallocate {
                caller,
                old_address,
                size,
                new_address,
            } => {
                self.check_reallocate(old_address, size, new_address)?;
                if self.release(old_address).is_none() {
                    debug!(caller, old_address, "realloc of untracked address");
                }
                self.record(caller, size, new_address)?;
            }
            AllocEvent::Failed { caller, call } => {
                debug!(caller, call = call.name(), "allocation returned null");
            }
        }
        Ok(())
    }

    /// Whether a realloc fits once both the old block and anything still
    /// recorded at the new address are gone.
    fn check_reallocate(
        &self,
        old_address: &str,
        size: u64,
        new_address: &str,
    ) -> Result<(), TotalOverflow> {
        let outstanding = |address| self.ledger.get(address).map_or(0, AllocationRecord::bytes);
        let mut freed = outstanding(old_address);
        if new_address != old_address {
            freed += outstanding(new_address);
        }
        let bytes = i64::try_from(size).unwrap_or(i64::MAX);
        (self.ledger.total() - freed)
            .checked_add(bytes)
            .ok_or(TotalOverflow)?;
        Ok(())
    }

    fn record(&mut self, caller: &str, size: u64, address: &str) -> Result<(), TotalOverflow> {
        let record = AllocationRecord::new(size, caller);
        let bytes = record.bytes();

        // A missed free: the address came back before we saw it released.
        if let Some(displaced) = self.ledger.insert(address, record)? {
            debug!(
                address,
                owner = %displaced.owner,
                size = displaced.size,
                "address reused while still outstanding"
            );
            self.modules.debit(&displaced.owner, displaced.bytes());
        }
        self.modules.credit(caller, bytes);
        Ok(())
    }

    fn release(&mut self, address: &str) -> Option<AllocationRecord> {
        let record = self.ledger.remove(address)?;
        self.modules.debit(&record.owner, record.bytes());
        Some(record)
    }

    /// Outstanding bytes right now
    pub fn current_total(&self) -> i64 {
        self.ledger.total()
    }

    /// Outstanding allocations
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Running per-caller totals
    pub fn modules(&self) -> &ModuleTotals {
        &self.modules
    }

    /// Per-caller totals as of the previous flush
    pub fn snapshot(&self) -> &ModuleTotals {
        &self.snapshot
    }

    /// Check the ledger/aggregator invariant from scratch.
    pub fn is_consistent(&self) -> bool {
        let total = self.ledger.total();
        total == self.ledger.recomputed_total() && total == self.modules.sum()
    }

    /// Compute changes since the previous flush and start a new period.
    pub fn flush(&mut self) -> FlushDelta {
        let current = self.current_total();
        let delta = FlushDelta {
            total_diff: current - self.last_flush_total,
            modules: self.modules.diff_since(&self.snapshot),
        };

        self.snapshot.clone_from(&self.modules);
        self.last_flush_total = current;
        delta
    }

    /// Everything still outstanding.
    pub fn leak_report(&self) -> LeakReport {
        LeakReport {
            unfreed: self
                .ledger
                .outstanding()
                .into_iter()
                .map(|(address, record)| (address.to_string(), record.clone()))
                .collect(),
            end_totals: self
                .modules
                .iter()
                .filter(|&(_, total)| total != 0)
                .map(|(owner, total)| (owner.to_string(), total))
                .collect(),
        }
    }

    /// Final flush followed by the leak report.
    pub fn drain(&mut self) -> (FlushDelta, LeakReport) {
        let delta = self.flush();
        (delta, self.leak_report())
    }
}
