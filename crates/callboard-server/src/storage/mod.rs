//! SQLite storage for the Callboard server.
//!
//! Provides persistence for callers and the shared rate-limit counters.

mod db;
mod models;
mod queries;
mod queries_rate_limits;


pub use db::{CallerDatabase, DatabaseError};
pub use models::*;
pub use queries::NewCaller;
pub use queries_rate_limits::RateSlot;
