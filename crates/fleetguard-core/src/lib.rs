//! # fleetguard-core
//!
//! Core crate for FleetGuard. Contains configuration schemas, the unified
//! error system, the store deadline helper, and small shared value types.
//!
//! This crate has **no** internal dependencies on other FleetGuard crates.

pub mod config;
pub mod deadline;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
