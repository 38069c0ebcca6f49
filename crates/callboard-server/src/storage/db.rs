//! SQLite database for the Callboard server.

pub use callboard_core::db::DatabaseError;

callboard_core::define_database!(CallerDatabase, "Caller database migrations complete");
