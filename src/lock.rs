//! Per-session mutual exclusion.
//!
//! A lock is taken by [`DatabaseStore::read`](crate::DatabaseStore::read) and
//! travels inside the returned [`LockedSession`] until the handle is consumed
//! by `write` or `release`. The lock is cooperative: it only excludes callers
//! that go through this protocol.
//!
//! PostgreSQL uses a transaction-scoped advisory lock, so committing or
//! rolling back the transaction held by the handle frees it. A dropped handle
//! rolls back when the pool recycles its connection. Other backends get a lock
//! row in `session_locks`, inserted conditionally and deleted on release.
//! Each row carries a random owner token, and only the holder presenting the
//! token can delete it, so a holder whose lock was taken over as stale cannot
//! free the lock of the new holder.

use std::fmt;
use std::time::Duration;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    QueryFilter, Set, Statement, TransactionTrait,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::context::Clock;
use crate::entity::session_lock;
use crate::error::{Error, Result};
use crate::store::{convert_time_to_datetime, saturating_cutoff};

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Name of the lock guarding `id`, shared by every process using the database.
pub(crate) fn lock_name(id: &str) -> String {
    format!("session:{id}")
}

/// How the lock for one session is currently held.
pub(crate) enum LockHold {
    /// Open transaction owning a `pg_advisory_xact_lock`.
    Advisory(DatabaseTransaction),
    /// Row in `session_locks`.
    Row(RowLock),
}

impl LockHold {
    /// Give the lock up without writing anything.
    pub(crate) async fn release(self) -> Result<()> {
        match self {
            LockHold::Advisory(txn) => txn.rollback().await.map_err(Error::from),
            LockHold::Row(mut row) => row.release().await,
        }
    }
}

pub(crate) struct RowLock {
    conn: DatabaseConnection,
    name: String,
    owner: String,
    released: bool,
}

impl RowLock {
    /// Deletes the lock row if it still belongs to this holder.
    ///
    /// A lock that was taken over in the meantime is left alone and only
    /// logged; nothing was written under it.
    pub(crate) async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if delete_lock_row(&self.conn, &self.name, &self.owner).await? {
            debug!(lock = %self.name, "Session lock released");
        } else {
            warn!(lock = %self.name, "Session lock was taken over before release");
        }
        Ok(())
    }

    /// Deletes the lock row on `db` as part of a larger transaction.
    ///
    /// Returns `false` when another holder owns the lock now. The caller
    /// must not write in that case.
    pub(crate) async fn release_in<C: ConnectionTrait>(&self, db: &C) -> Result<bool> {
        delete_lock_row(db, &self.name, &self.owner).await
    }

    /// Records that the row is gone, so that drop does not delete it again.
    pub(crate) fn mark_released(&mut self) {
        self.released = true;
    }
}

impl Drop for RowLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(lock = %self.name, "Session lock dropped without write or release");

        let conn = self.conn.clone();
        let name = std::mem::take(&mut self.name);
        let owner = std::mem::take(&mut self.owner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = delete_lock_row(&conn, &name, &owner).await {
                        error!(lock = %name, error = %e, "Failed to release abandoned session lock");
                    }
                });
            }
            // The row expires through the stale-lock threshold instead.
            Err(_) => error!(lock = %name, "No runtime to release abandoned session lock"),
        }
    }
}

async fn delete_lock_row<C: ConnectionTrait>(db: &C, name: &str, owner: &str) -> Result<bool> {
    let result = session_lock::Entity::delete_many()
        .filter(session_lock::Column::Name.eq(name))
        .filter(session_lock::Column::Owner.eq(owner))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// The lock for one session together with the payload read under it.
///
/// Hand it back to [`DatabaseStore::write`](crate::DatabaseStore::write) or
/// [`DatabaseStore::release`](crate::DatabaseStore::release). Dropping it
/// also releases the lock, but any pending write is lost.
pub struct LockedSession {
    pub(crate) id: String,
    pub(crate) data: Vec<u8>,
    pub(crate) hold: LockHold,
}

impl LockedSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stored payload, empty if the session does not exist yet.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_new(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for LockedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.hold {
            LockHold::Advisory(_) => "advisory",
            LockHold::Row(_) => "row",
        };
        f.debug_struct("LockedSession")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("lock", &kind)
            .finish()
    }
}

/// Wait up to `wait` for the lock on `id`.
pub(crate) async fn acquire(
    conn: &DatabaseConnection,
    clock: &dyn Clock,
    id: &str,
    wait: Duration,
    stale_after: Duration,
) -> Result<LockHold> {
    let name = lock_name(id);
    let started = Instant::now();

    let hold = match conn.get_database_backend() {
        DbBackend::Postgres => {
            let txn = conn.begin().await?;
            let locked = poll(id, wait, started, || try_advisory(&txn, &name)).await;
            match locked {
                Ok(()) => LockHold::Advisory(txn),
                Err(e) => {
                    if let Err(rollback) = txn.rollback().await {
                        warn!(session_id = %id, error = %rollback, "Rollback after failed lock attempt failed");
                    }
                    return Err(e);
                }
            }
        }
        _ => {
            let owner = Uuid::new_v4().to_string();
            poll(id, wait, started, || {
                try_lock_row(conn, clock, &name, &owner, stale_after)
            })
            .await?;
            LockHold::Row(RowLock {
                conn: conn.clone(),
                name,
                owner,
                released: false,
            })
        }
    };

    debug!(
        session_id = %id,
        waited_ms = started.elapsed().as_millis() as u64,
        "Session lock acquired"
    );
    Ok(hold)
}

async fn poll<F, Fut>(id: &str, wait: Duration, started: Instant, mut attempt: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let mut delay = INITIAL_BACKOFF;
    loop {
        if attempt().await? {
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= wait {
            warn!(session_id = %id, waited_ms = waited.as_millis() as u64, "Timed out waiting for session lock");
            return Err(Error::LockTimeout {
                id: id.to_string(),
                waited,
            });
        }

        sleep(delay.min(wait - waited)).await;
        delay = (delay * 2).min(MAX_BACKOFF);
    }
}

async fn try_advisory(txn: &DatabaseTransaction, name: &str) -> Result<bool> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_try_advisory_xact_lock(hashtextextended($1, 0)) AS locked",
        [name.into()],
    );

    match txn.query_one(stmt).await? {
        Some(row) => Ok(row.try_get::<bool>("", "locked")?),
        None => Ok(false),
    }
}

async fn try_lock_row(
    conn: &DatabaseConnection,
    clock: &dyn Clock,
    name: &str,
    owner: &str,
    stale_after: Duration,
) -> Result<bool> {
    let now = clock.now();
    let stale_cutoff = convert_time_to_datetime(saturating_cutoff(now, stale_after));

    let cleared = session_lock::Entity::delete_many()
        .filter(session_lock::Column::Name.eq(name))
        .filter(session_lock::Column::AcquiredAt.lt(stale_cutoff))
        .exec(conn)
        .await?;
    if cleared.rows_affected > 0 {
        warn!(lock = %name, "Removed stale session lock");
    }

    let lock = session_lock::ActiveModel {
        name: Set(name.to_string()),
        owner: Set(owner.to_string()),
        acquired_at: Set(convert_time_to_datetime(now)),
    };

    let inserted = session_lock::Entity::insert(lock)
        .on_conflict(
            OnConflict::column(session_lock::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(inserted == 1)
}
