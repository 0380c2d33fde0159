//! Scheduled maintenance for FleetGuard.
//!
//! This crate provides:
//! - A cron scheduler for periodic maintenance tasks
//! - The session retention sweep job

pub mod jobs;
pub mod scheduler;

pub use jobs::SessionPurgeJob;
pub use scheduler::CronScheduler;
