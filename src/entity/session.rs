//! Session entity model for Sea-ORM database interaction.
//!
//! This module defines the database schema representation for session storage.
//! It maps to the `sessions` table created by the bundled migration.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one active session.
///
/// # Database Schema
///
/// | Column      | Type                    | Description                                  |
/// |-------------|-------------------------|----------------------------------------------|
/// | id          | VARCHAR(32) (Primary Key) | Session ID, generated by the caller        |
/// | user_id     | BIGINT                  | Authenticated user, 0 when anonymous         |
/// | resource_id | BIGINT                  | Application-defined current resource, or 0   |
/// | data        | BYTEA / BLOB            | Opaque serialized session payload            |
/// | ts          | TIMESTAMPTZ             | Time of the last write                       |
/// | ip          | BIGINT                  | Numeric client address, 0 when not tracked   |
/// | ua          | VARCHAR(255)            | Sanitised user agent, empty when not tracked |
/// | expires_at  | TIMESTAMPTZ NULL        | Explicit expiry, overrides the age rule      |
///
/// Unsigned values are kept in signed 64-bit columns because PostgreSQL has no
/// unsigned integer types. [`DatabaseStore`](crate::DatabaseStore) converts them
/// back to `u32` at the API boundary.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// The opaque session identifier, at most 32 bytes.
    #[sea_orm(
        primary_key,
        auto_increment = false,
        column_type = "String(StringLen::N(32))"
    )]
    pub id: String,

    pub user_id: i64,

    pub resource_id: i64,

    /// Serialized session payload. The store never interprets it on the
    /// read/write path.
    pub data: Vec<u8>,

    /// Last-write time; drives activity queries and the age-based sweep.
    pub ts: DateTimeWithTimeZone,

    pub ip: i64,

    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub ua: String,

    /// Set when the writer knows the session's expiry, as `tower-sessions`
    /// does. Such rows are swept once this passes, regardless of `ts`.
    pub expires_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
