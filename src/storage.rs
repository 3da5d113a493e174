//! Record store on Sled.
//!
//! Each resource kind lives in its own tree, records serialized as JSON and keyed
//! by their big-endian id so iteration follows creation order. Kinds with a
//! natural key (username, SKU, ...) own a companion `<table>.unique` tree mapping
//! that key to the record id; the `__sequences` tree holds the last id issued per
//! table. Single-record writes are Sled multi-tree transactions, so the
//! uniqueness check, the id bump and the insert land together or not at all.
//!
//! Mutations also take the write side of a store-wide gate. Holding a
//! [`ReadScope`] therefore gives a view of every table at one point in time,
//! and a [`WriteScope`] lets a handler run several dependent writes without
//! another writer slipping in between.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

const SEQUENCES: &str = "__sequences";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("corrupt id entry in {0}")]
    CorruptId(String),
    /// A natural key is already taken. `message` is the human-readable text
    /// surfaced to API callers.
    #[error("{message}")]
    Conflict {
        table: &'static str,
        key: String,
        message: &'static str,
    },
    #[error("{table} record {id} not found")]
    NotFound { table: &'static str, id: u64 },
}

/// A persistable resource kind.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Tree name.
    const TABLE: &'static str;
    /// Message returned when [`Record::unique_key`] collides.
    const CONFLICT: &'static str = "Record must be unique";

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);

    /// Natural key enforced unique across the table, if the kind has one.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Shared handle to the store. Cheap to clone: Sled handles are reference
/// counted and the gate is behind an `Arc`.
#[derive(Clone)]
pub struct Storage {
    db: Db,
    gate: Arc<RwLock<()>>,
}

impl Storage {
    /// Open or create the Sled database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self::from_db(db))
    }

    /// In-memory store removed on drop; used by tests and dry runs.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::from_db(db))
    }

    fn from_db(db: Db) -> Self {
        Self {
            db,
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Consistent multi-table read view. No writer runs while it is held.
    pub fn read(&self) -> ReadScope<'_> {
        ReadScope {
            db: &self.db,
            _guard: self.gate.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Exclusive scope for dependent writes. Do not call the convenience
    /// methods on `Storage` while holding it: they take the gate themselves.
    pub fn write(&self) -> WriteScope<'_> {
        WriteScope {
            db: &self.db,
            _guard: self.gate.write().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn list<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.read().list()
    }

    pub fn get<T: Record>(&self, id: u64) -> Result<Option<T>, StoreError> {
        self.read().get(id)
    }

    pub fn find_by_key<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.read().find_by_key(key)
    }

    pub fn count<T: Record>(&self) -> Result<usize, StoreError> {
        self.read().count::<T>()
    }

    pub fn insert<T: Record>(&self, record: T) -> Result<T, StoreError> {
        self.write().insert(record)
    }

    pub fn update<T: Record>(&self, id: u64, record: T) -> Result<T, StoreError> {
        self.write().update(id, record)
    }

    pub fn delete<T: Record>(&self, id: u64) -> Result<Option<T>, StoreError> {
        self.write().delete(id)
    }
}

/// Read operations shared by both scopes.
pub trait RecordReader {
    fn db(&self) -> &Db;

    fn get<T: Record>(&self, id: u64) -> Result<Option<T>, StoreError> {
        let tree = self.db().open_tree(T::TABLE)?;
        tree.get(id.to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn find_by_key<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let index = self.db().open_tree(index_name::<T>())?;
        match index.get(key.as_bytes())? {
            Some(id) => self.get(decode_id(&id)?),
            None => Ok(None),
        }
    }

    fn list<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let tree = self.db().open_tree(T::TABLE)?;
        tree.iter()
            .values()
            .map(|item| decode(&item?))
            .collect()
    }

    fn count<T: Record>(&self) -> Result<usize, StoreError> {
        Ok(self.db().open_tree(T::TABLE)?.len())
    }
}

pub struct ReadScope<'a> {
    db: &'a Db,
    _guard: RwLockReadGuard<'a, ()>,
}

impl RecordReader for ReadScope<'_> {
    fn db(&self) -> &Db {
        self.db
    }
}

pub struct WriteScope<'a> {
    db: &'a Db,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl RecordReader for WriteScope<'_> {
    fn db(&self) -> &Db {
        self.db
    }
}

impl WriteScope<'_> {
    fn trees<T: Record>(&self) -> Result<(Tree, Tree, Tree), StoreError> {
        Ok((
            self.db.open_tree(T::TABLE)?,
            self.db.open_tree(index_name::<T>())?,
            self.db.open_tree(SEQUENCES)?,
        ))
    }

    /// Insert with a freshly issued id. Fails with `Conflict` when the natural
    /// key is taken.
    pub fn insert<T: Record>(&self, record: T) -> Result<T, StoreError> {
        let (data, index, sequences) = self.trees::<T>()?;
        let key = record.unique_key();

        let stored = (&data, &index, &sequences)
            .transaction(
                |(data, index, sequences)| -> ConflictableTransactionResult<T, StoreError> {
                    if let Some(key) = &key {
                        if index.get(key.as_bytes())?.is_some() {
                            return abort(conflict::<T>(key));
                        }
                    }
                    let id = next_id(sequences, T::TABLE)?;
                    let mut stored = record.clone();
                    stored.set_id(id);
                    let bytes = encode(&stored).map_err(ConflictableTransactionError::Abort)?;
                    data.insert(&id.to_be_bytes()[..], bytes)?;
                    if let Some(key) = &key {
                        index.insert(key.as_bytes(), &id.to_be_bytes()[..])?;
                    }
                    Ok(stored)
                },
            );
        let stored = settle(stored)?;

        debug!(table = T::TABLE, id = stored.id(), "record inserted");
        Ok(stored)
    }

    /// Replace every field of record `id`. The natural key may change as long
    /// as the new key is free.
    pub fn update<T: Record>(&self, id: u64, record: T) -> Result<T, StoreError> {
        let (data, index, _) = self.trees::<T>()?;
        let mut replacement = record;
        replacement.set_id(id);
        let bytes = encode(&replacement)?;
        let new_key = replacement.unique_key();
        let id_key = id.to_be_bytes();

        let outcome = (&data, &index).transaction(
            |(data, index)| -> ConflictableTransactionResult<(), StoreError> {
                let Some(previous) = data.get(&id_key[..])? else {
                    return abort(StoreError::NotFound { table: T::TABLE, id });
                };
                let previous: T = decode(&previous).map_err(ConflictableTransactionError::Abort)?;
                let old_key = previous.unique_key();

                if old_key != new_key {
                    if let Some(key) = &new_key {
                        if let Some(owner) = index.get(key.as_bytes())? {
                            let owner = decode_id(&owner).map_err(ConflictableTransactionError::Abort)?;
                            if owner != id {
                                return abort(conflict::<T>(key));
                            }
                        }
                    }
                    if let Some(key) = &old_key {
                        index.remove(key.as_bytes())?;
                    }
                    if let Some(key) = &new_key {
                        index.insert(key.as_bytes(), &id_key[..])?;
                    }
                }
                data.insert(&id_key[..], bytes.clone())?;
                Ok(())
            },
        );
        settle(outcome)?;

        debug!(table = T::TABLE, id, "record replaced");
        Ok(replacement)
    }

    /// Remove record `id`, returning it. Removing an absent id is not an error.
    pub fn delete<T: Record>(&self, id: u64) -> Result<Option<T>, StoreError> {
        let (data, index, _) = self.trees::<T>()?;
        let id_key = id.to_be_bytes();

        let removed = (&data, &index).transaction(
            |(data, index)| -> ConflictableTransactionResult<Option<T>, StoreError> {
                let Some(bytes) = data.remove(&id_key[..])? else {
                    return Ok(None);
                };
                let removed: T = decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                if let Some(key) = removed.unique_key() {
                    index.remove(key.as_bytes())?;
                }
                Ok(Some(removed))
            },
        );
        let removed = settle(removed)?;

        if removed.is_some() {
            debug!(table = T::TABLE, id, "record deleted");
        }
        Ok(removed)
    }

    /// Drop every record of the kind. The id sequence is kept, so ids are
    /// never reused.
    pub fn clear<T: Record>(&self) -> Result<(), StoreError> {
        let (data, index, _) = self.trees::<T>()?;
        data.clear()?;
        index.clear()?;
        debug!(table = T::TABLE, "table cleared");
        Ok(())
    }
}

fn index_name<T: Record>() -> String {
    format!("{}.unique", T::TABLE)
}

fn next_id(
    sequences: &TransactionalTree,
    table: &str,
) -> ConflictableTransactionResult<u64, StoreError> {
    let last = match sequences.get(table.as_bytes())? {
        Some(bytes) => decode_id(&bytes).map_err(ConflictableTransactionError::Abort)?,
        None => 0,
    };
    let next = last + 1;
    sequences.insert(table.as_bytes(), &next.to_be_bytes()[..])?;
    Ok(next)
}

fn conflict<T: Record>(key: &str) -> StoreError {
    StoreError::Conflict {
        table: T::TABLE,
        key: key.to_owned(),
        message: T::CONFLICT,
    }
}

fn abort<T>(err: StoreError) -> ConflictableTransactionResult<T, StoreError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn settle<T>(result: TransactionResult<T, StoreError>) -> Result<T, StoreError> {
    result.map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Sled(err),
    })
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(record)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::CorruptId(format!("{bytes:?}")))?;
    Ok(u64::from_be_bytes(raw))
}
