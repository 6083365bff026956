//! Key and value encoding for the store.
//!
//! Ids are written as 8-byte big-endian integers so that sled's
//! byte-lexicographic key order is the numeric order. Values are JSON task
//! records.

use crate::error::{Error, Result};
use crate::task::Task;

pub const ID_LEN: usize = 8;

pub fn encode_id(id: u64) -> [u8; ID_LEN] {
    id.to_be_bytes()
}

pub fn decode_id(key: &[u8]) -> Result<u64> {
    let bytes: [u8; ID_LEN] = key.try_into().map_err(|_| {
        Error::Decode(format!(
            "expected an {ID_LEN}-byte key, found {} bytes",
            key.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn encode_task(task: &Task) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(task)?)
}

pub fn decode_task(bytes: &[u8]) -> Result<Task> {
    serde_json::from_slice(bytes).map_err(|err| Error::Decode(err.to_string()))
}
