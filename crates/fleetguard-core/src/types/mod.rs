//! Shared value types used across FleetGuard crates.

pub mod session_limit;

pub use session_limit::SessionLimit;
