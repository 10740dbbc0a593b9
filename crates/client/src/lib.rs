//! `veriroute-client` — HTTP client for the comparison backend.
//!
//! Blocking reqwest client (no async runtime required). Covers the one-shot
//! compare endpoint and the batch flow: create → upload system data →
//! upload field data → process → fetch results.

pub mod auth;
pub mod client;

pub use auth::{delete_auth, load_auth, save_auth, AuthCredentials};
pub use client::{
    ApiClient, ApiError, Batch, BatchItem, CompareItem, CompareOutcome, FieldUpload, SystemUpload,
};
