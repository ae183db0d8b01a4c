//! Shared domain types for the voice call orchestration core: opaque ids,
//! the error taxonomy, the caller principal, phone-number validation and
//! application configuration. Everything here is free of I/O.

pub mod config;
pub mod error;
pub mod ids;
pub mod phone;
pub mod principal;

pub use error::{AppError, AppResult};
