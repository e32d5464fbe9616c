//! Data access layer
//!
//! [`JobStore`] is the seam the scheduling core depends on;
//! [`JobSeaOrmRepository`] is the SeaORM-backed implementation used by the
//! service.

pub mod job;
pub mod traits;

pub use job::JobSeaOrmRepository;
pub use traits::JobStore;
