//! Callboard Server Library
//!
//! Caller registration for call-in contests:
//! - Admission pipeline (validation, rate limits, policy, dedup by national ID)
//! - Fixed-window rate limiting over memory or `SQLite` counter stores
//! - Security audit trail on a dedicated tracing target
//! - Draw eligibility, random selection and winner confirmation
//! - axum HTTP surface

pub mod admission;
pub mod audit;
pub mod directory;
pub mod draw;
pub mod eligibility;
pub mod http;
pub mod identity;
pub mod ratelimit;
pub mod storage;
