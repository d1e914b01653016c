//! Shared utilities.

pub mod decimal;
pub mod time;
