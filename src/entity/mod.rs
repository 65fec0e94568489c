//! Database entity models for seaorm-session-lockstore.
//!
//! These entities define the database schema used by
//! [`DatabaseStore`](crate::DatabaseStore).

/// Session rows, one per active session.
pub mod session;

/// Synthesized advisory locks for backends without a native primitive.
pub mod session_lock;
