//! Scheduled background jobs for Canopy.
//!
//! The only job today is the trash reaper, which physically deletes
//! content pending deletion on a cron schedule.

pub mod jobs;
pub mod scheduler;

pub use jobs::{TrashPurger, TrashReaper};
pub use scheduler::CronScheduler;
