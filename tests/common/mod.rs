#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use seaorm_session_lockstore::entity::session;
use seaorm_session_lockstore::migration::{Migrator, MigratorTrait};
use seaorm_session_lockstore::{DatabaseStore, ManualClock};
use time::macros::datetime;

pub const SESSION_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const SESSION_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const SESSION_C: &str = "cccccccccccccccccccccccccccccccc";

pub async fn connect() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // Every pooled connection would otherwise get its own empty database.
    opt.max_connections(1).sqlx_logging(false);

    let conn = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    conn
}

/// A store on a fresh in-memory database with a clock pinned to a fixed time.
pub async fn setup() -> (DatabaseStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(datetime!(2024-06-01 12:00:00 UTC)));
    let store = DatabaseStore::new(connect().await)
        .with_clock(clock.clone())
        .with_lock_wait(Duration::from_secs(5));
    (store, clock)
}

pub async fn row_count(store: &DatabaseStore) -> u64 {
    session::Entity::find()
        .count(store.connection())
        .await
        .unwrap()
}
