//! Background Tasks Module
//!
//! Contains tasks that run independently of request flow.
//!
//! # Tasks
//! - Janitor: sweeps expired entries from both tiers at a fixed interval

mod janitor;

pub use janitor::Janitor;
