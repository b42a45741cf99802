pub mod odds_monitor;

pub use odds_monitor::{OddsMonitorWorker, RefreshSummary};
