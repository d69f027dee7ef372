//! Core types for Q-Mart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod amount;
pub mod id;
pub mod status;

pub use amount::{Amount, AmountError};
pub use id::*;
pub use status::*;
