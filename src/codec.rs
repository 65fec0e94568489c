//! Decoding of session payloads for administrative inspection.
//!
//! The live read/write path never goes through a codec; payloads are opaque
//! bytes there. A codec is only used by
//! [`DatabaseStore::get_session_data`](crate::DatabaseStore::get_session_data),
//! and always decodes into a fresh value owned by the caller.

use std::fmt::Debug;

use serde_json::Value;

use crate::error::{Error, Result};

/// Turns a stored payload into an inspectable value.
pub trait PayloadCodec: Debug + Send + Sync + 'static {
    fn decode(&self, payload: &[u8]) -> Result<Value>;
}

/// MessagePack, the format the tower-sessions adapter writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl PayloadCodec for MessagePackCodec {
    fn decode(&self, payload: &[u8]) -> Result<Value> {
        if payload.is_empty() {
            return Ok(Value::Null);
        }
        rmp_serde::from_slice(payload).map_err(|e| Error::MalformedPayload(e.to_string()))
    }
}

/// Plain JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn decode(&self, payload: &[u8]) -> Result<Value> {
        if payload.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(payload).map_err(|e| Error::MalformedPayload(e.to_string()))
    }
}
