//! `veriroute-engine` — Delivery reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tabular rows, returns normalized
//! records, join partitions, and classified results. No network dependencies;
//! geocoding lives in `veriroute-geocode`.

pub mod config;
pub mod distance;
pub mod error;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod rows;
pub mod stats;

pub use config::RunConfig;
pub use error::EngineError;
pub use model::{
    AccuracyCategory, ComparisonResult, DashboardStats, FieldRecord, GeocodeStatus, SystemRecord,
};
pub use reconcile::{reconcile, MatchedRecord, Reconciliation};
pub use rows::RowSet;
