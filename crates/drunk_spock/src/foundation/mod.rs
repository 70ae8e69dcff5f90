//! Foundation module - Core utilities shared by the rest of the crate
//!
//! - Logging setup
//! - Optional callback hooks
//! - Frame timing and fixed-rate tics

pub mod hook;
pub mod logging;
pub mod time;
