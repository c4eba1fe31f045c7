//! The durable key-value store backing the replica (§4.4) and the delegation store
//! (§4.2): one `sled::Tree` per logical collection, encoded as JSON. `sled` is an
//! embedded ordered store with synchronous reads/writes, which fits the
//! single-threaded cooperative scheduling model of §5 — no separate I/O thread pool
//! to coordinate with.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ReplicaError;

pub mod trees {
    pub const CELLS: &str = "cells";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const VOTES: &str = "votes";
    pub const MODERATIONS: &str = "moderations";
    pub const IDENTITIES: &str = "identities";
    pub const PROFILES: &str = "profile_updates";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const FOLLOWING: &str = "following";
    pub const SEEN: &str = "seen";
    pub const DELEGATIONS: &str = "delegations";
}

/// Thin wrapper over `sled::Db` providing JSON-encoded, per-collection access.
#[derive(Clone)]
pub struct DurableStore {
    db: sled::Db,
}

impl DurableStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(DurableStore { db })
    }

    /// An in-memory-only store, useful for tests and for hosts that don't want
    /// durability (e.g. an ephemeral preview session).
    pub fn temporary() -> Result<Self, sled::Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(DurableStore { db })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, ReplicaError> {
        self.db.open_tree(name).map_err(ReplicaError::Store)
    }

    pub fn put<T: Serialize>(&self, tree: &str, key: &[u8], value: &T) -> Result<(), ReplicaError> {
        let bytes = serde_json::to_vec(value).map_err(ReplicaError::Codec)?;
        self.tree(tree)?
            .insert(key, bytes)
            .map_err(ReplicaError::StorageFailure)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        tree: &str,
        key: &[u8],
    ) -> Result<Option<T>, ReplicaError> {
        match self.tree(tree)?.get(key).map_err(ReplicaError::Store)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(ReplicaError::Codec)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, tree: &str, key: &[u8]) -> Result<(), ReplicaError> {
        self.tree(tree)?
            .remove(key)
            .map_err(ReplicaError::StorageFailure)?;
        Ok(())
    }

    /// Iterates every record in a collection, for hydrating in-memory indexes on
    /// `open()`.
    pub fn iter_all<T: DeserializeOwned>(&self, tree: &str) -> Result<Vec<T>, ReplicaError> {
        let mut out = Vec::new();
        for entry in self.tree(tree)?.iter() {
            let (_key, bytes) = entry.map_err(ReplicaError::Store)?;
            out.push(serde_json::from_slice(&bytes).map_err(ReplicaError::Codec)?);
        }
        Ok(out)
    }

    pub fn flush(&self) -> Result<(), sled::Error> {
        self.db.flush()?;
        Ok(())
    }
}
