//! [`tower_sessions`] integration.
//!
//! Lets a [`DatabaseStore`] back a `SessionManagerLayer`. tower-sessions
//! loads at the start of a request and saves only when the session changed,
//! so the adapter does not take part in the per-session lock protocol: it
//! reads and upserts directly.
//!
//! The payload is a named MessagePack map `{ data, expiry_date }` with the
//! expiry as a unix timestamp; the id lives only in the row key. That keeps
//! it readable by [`MessagePackCodec`](crate::MessagePackCodec). The expiry
//! is also written to the `expires_at` column, which is what the sweep looks
//! at for these rows.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tower_sessions::{session::Id, session::Record, session_store, ExpiredDeletion, SessionStore};
use tracing::debug;

use crate::context::WriteContext;
use crate::error::Error;
use crate::store::DatabaseStore;

#[derive(Serialize)]
struct PayloadRef<'a> {
    data: &'a HashMap<String, Value>,
    expiry_date: i64,
}

#[derive(Deserialize)]
struct Payload {
    data: HashMap<String, Value>,
    expiry_date: i64,
}

fn encode(record: &Record) -> session_store::Result<Vec<u8>> {
    let payload = PayloadRef {
        data: &record.data,
        expiry_date: record.expiry_date.unix_timestamp(),
    };
    rmp_serde::to_vec_named(&payload).map_err(|e| session_store::Error::Encode(e.to_string()))
}

fn decode(id: Id, bytes: &[u8]) -> session_store::Result<Record> {
    let payload: Payload =
        rmp_serde::from_slice(bytes).map_err(|e| session_store::Error::Decode(e.to_string()))?;
    let expiry_date = OffsetDateTime::from_unix_timestamp(payload.expiry_date)
        .map_err(|e| session_store::Error::Decode(e.to_string()))?;

    Ok(Record {
        id,
        data: payload.data,
        expiry_date,
    })
}

fn context(record: &Record) -> WriteContext {
    WriteContext::anonymous().with_expiry(record.expiry_date)
}

fn backend(e: Error) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for DatabaseStore {
    /// Creates a new session row.
    ///
    /// If the record's id is already taken a new id is generated and the
    /// insert retried, so the record id may change.
    ///
    /// # Error Mapping
    ///
    /// * Storage errors → `session_store::Error::Backend`
    /// * MessagePack serialization errors → `session_store::Error::Encode`
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        loop {
            let data = encode(record)?;

            if self
                .insert_new(&record.id.to_string(), &context(record), &data)
                .await
                .map_err(backend)?
            {
                return Ok(());
            }

            debug!("Session id collision, regenerating");
            record.id = Id::default();
        }
    }

    /// Upserts the record with an anonymous write context carrying its expiry.
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let data = encode(record)?;

        self.write_unlocked(&record.id.to_string(), &context(record), &data)
            .await
            .map_err(backend)
    }

    /// Loads a record, treating one past its expiry date as absent.
    ///
    /// # Error Mapping
    ///
    /// * Storage errors → `session_store::Error::Backend`
    /// * MessagePack deserialization errors → `session_store::Error::Decode`
    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let Some(data) = self
            .read_unlocked(&session_id.to_string())
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let record = decode(*session_id, &data)?;

        if record.expiry_date <= self.now() {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.destroy(&session_id.to_string()).await.map_err(backend)
    }
}

#[async_trait]
impl ExpiredDeletion for DatabaseStore {
    /// Deletes records whose expiry date has passed, plus sessions written
    /// without an expiry that are older than the configured session lifetime.
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use tower_sessions::Expiry;
    /// use seaorm_session_lockstore::DatabaseStore;
    ///
    /// # async fn example(store: DatabaseStore) {
    /// let session_layer = tower_sessions::SessionManagerLayer::new(store)
    ///     .with_expiry(Expiry::OnInactivity(time::Duration::days(1)));
    /// # }
    /// ```
    async fn delete_expired(&self) -> session_store::Result<()> {
        self.garbage_collect(self.config().session_lifetime)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
