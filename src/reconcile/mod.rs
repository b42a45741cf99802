//! Derivation of odds, settlement history and spend quotas from ledger data.

pub mod facade;
pub mod odds;
pub mod payout;
pub mod quota;
pub mod settlement;

pub use facade::{Reconciler, ReconcilerSettings};
pub use odds::OddsAggregator;
pub use quota::{SpendQuotaTracker, UnconfiguredLimitPolicy};
pub use settlement::SettlementReplayer;
