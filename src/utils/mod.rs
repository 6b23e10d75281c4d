//! Utility functions and helpers.

pub mod cookie;
pub mod env;
