//! `veriroute-batch` — reconciliation run lifecycle.
//!
//! A run is a `Batch` moving through `draft → processing → completed|failed`,
//! persisted in a single-file SQLite store so the latest results and stats
//! survive a process restart. The runner drives the pipeline on a worker
//! thread and emits results in input order through a channel.

pub mod runner;
pub mod session;
pub mod store;

pub use runner::{synthesize_addresses, RunHandle, Runner};
pub use session::{Batch, BatchStatus, SessionError};
pub use store::{SessionStore, SqliteCache, StoreError};
