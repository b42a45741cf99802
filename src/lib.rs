pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod workers;

pub use error::{ReconcileError, Result};
pub use reconcile::{Reconciler, ReconcilerSettings};
