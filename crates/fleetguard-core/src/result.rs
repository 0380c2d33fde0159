//! Convenience result type alias for FleetGuard.

use crate::error::AppError;

/// A specialized `Result` type for FleetGuard operations.
pub type AppResult<T> = Result<T, AppError>;
