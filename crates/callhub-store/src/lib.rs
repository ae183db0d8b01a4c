//! Typed data access over the relational store. No business logic lives
//! here; every method takes an explicit tenant scope and a pre-resolved,
//! validated schema identifier (§4.1).

pub mod listener;
pub mod model;
pub mod pagination;
pub mod pool;
pub mod repositories;
pub mod schema;

pub use sqlx::PgPool;
