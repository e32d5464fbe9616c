//! Centralized error handling for the cron orchestrator
//!
//! Every layer has its own `thiserror` enum. Synchronous lifecycle operations
//! surface [`AppError`]; execution and notification failures never leave the
//! pipeline and are expressed as [`ExecutionError`] and [`NotificationError`].
//!
//! # Error Categories
//!
//! - **Validation Errors**: malformed input, kind/payload mismatch, bad cron
//! - **Dependency Errors**: missing or foreign dependency ids, cycles
//! - **Not Found Errors**: absent jobs and jobs owned by another organization
//! - **Repository Errors**: data access failures in the job store
//!
//! # Usage
//!
//! ```rust
//! use cron_orchestrator::errors::{AppError, AppResult};
//!
//! fn require_name(name: &str) -> AppResult<()> {
//!     if name.trim().is_empty() {
//!         return Err(AppError::validation("name is required"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
