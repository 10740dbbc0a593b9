//! CLI Exit Code Registry
//!
//! Single source of truth for all exit codes. Exit codes are part of the
//! shell contract — scripts rely on them.
//!
//! | Range | Domain    | Description                              |
//! |-------|-----------|------------------------------------------|
//! | 0     | Universal | Success                                  |
//! | 1     | Universal | General error (unspecified)              |
//! | 2     | Universal | CLI usage error (bad args, missing file) |
//! | 10-19 | run       | Reconciliation run codes                 |
//! | 20-29 | backend   | Comparison backend codes                 |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (10-19)
// =============================================================================

/// Run config failed to parse or validate.
pub const EXIT_RUN_INVALID_CONFIG: u8 = 10;

/// Runtime failure (file IO, store, CSV decode).
pub const EXIT_RUN_RUNTIME: u8 = 11;

/// Lifecycle validation rejected the run (empty dataset, incomplete field
/// column mapping).
pub const EXIT_RUN_VALIDATION: u8 = 12;

// =============================================================================
// Backend (20-29)
// =============================================================================

/// Not authenticated (no saved token).
pub const EXIT_BACKEND_NOT_AUTH: u8 = 20;

/// Session expired (backend returned 401).
pub const EXIT_BACKEND_AUTH: u8 = 21;

/// Cannot reach the backend; the run as a whole failed and must be retried.
pub const EXIT_BACKEND_TRANSPORT: u8 = 22;

/// Backend rejected the request (validation) or returned an error status.
pub const EXIT_BACKEND_REJECTED: u8 = 23;
