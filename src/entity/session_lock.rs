//! Lock rows used where the database has no named advisory locks.
//!
//! A row exists for as long as some request holds the lock for `name`. The
//! primary key makes the conditional insert in [`crate::lock`] the acquire
//! primitive.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session_locks")]
pub struct Model {
    #[sea_orm(
        primary_key,
        auto_increment = false,
        column_type = "String(StringLen::N(64))"
    )]
    pub name: String,

    /// Random token of the current holder. Release deletes by name and owner.
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub owner: String,

    /// When the current holder took the lock. Rows older than the configured
    /// stale threshold are treated as left behind by a crashed holder.
    pub acquired_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
