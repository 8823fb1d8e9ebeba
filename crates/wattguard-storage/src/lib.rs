//! PostgreSQL repository layer for `WattGuard`.
//!
//! Every function here takes a `&sqlx::PgPool` (or an already-open
//! transaction) and returns a `Result` in a domain-specific error type from
//! `wattguard-core`. No DDL is ever issued by this crate at runtime — schema
//! changes live in `migrations/` and are applied once via `sqlx migrate run`
//! before any server process starts; [`schema::verify_schema`] only checks
//! that the tables this crate depends on are present.

pub mod audit;
pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod heartbeats;
pub mod machines;
pub mod operators;
pub mod refresh_tokens;
pub mod schema;
