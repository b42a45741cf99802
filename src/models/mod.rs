pub mod amount;
pub mod market;
pub mod odds;
pub mod quota;
pub mod settlement;

pub use amount::{Amount, SignedAmount};
pub use market::{Market, MarketId, WagerEvent};
pub use odds::{OddsSnapshot, OptionOdds};
pub use quota::{Period, QuotaEvaluation, QuotaWindow, SpendLimits, SpendRecord};
pub use settlement::{SettlementResult, SettlementStatus};
