//! Maintenance job implementations.

pub mod session_purge;

pub use session_purge::SessionPurgeJob;
