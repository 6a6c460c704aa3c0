//! redb-based storage for resource snapshots and lifecycle events
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `deliveries` | `delivery_id` | `DeliverySnapshot` | Versioned snapshot |
//! | `rentals` | `rental_id` | `RentalSnapshot` | Versioned snapshot |
//! | `events` | `(resource_id, sequence)` | `LifecycleEvent` | Append-only audit stream |
//! | `sequence_counter` | `()` | `u64` | Global event sequence |
//! | `processed_webhooks` | `raw_event_id` | `()` | Webhook replay detection |
//! | `intent_index` | `intent_ref` | `ResourceKey` | Payment ref → resource |
//!
//! # Conditional updates
//!
//! Snapshot writes go through `update_*_if`, which re-reads the stored
//! row inside the write transaction and compares its `version` against
//! the version the caller decided on. A mismatch means another unit of
//! work committed in between; the caller re-evaluates against the
//! fresh snapshot or surfaces `Conflict`.
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns
//! the write survives power loss and the file is always in a
//! consistent state.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::{DeliverySnapshot, LifecycleEvent, RentalSnapshot, ResourceKey};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Delivery snapshots: key = delivery_id, value = JSON
const DELIVERIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("deliveries");

/// Rental snapshots: key = rental_id, value = JSON
const RENTALS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rentals");

/// Lifecycle events: key = (resource_id, sequence), value = JSON (append-only)
const EVENTS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("events");

/// Global sequence counter: key = "seq", value = u64
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

/// Processed webhook events: key = raw_event_id, value = empty (idempotency)
const PROCESSED_WEBHOOKS_TABLE: TableDefinition<&str, ()> =
    TableDefinition::new("processed_webhooks");

/// Payment intent index: key = intent_ref, value = JSON ResourceKey
const INTENT_INDEX_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("intent_index");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::AppError {
    fn from(e: StorageError) -> Self {
        shared::AppError::storage(e.to_string())
    }
}

/// Lifecycle storage backed by redb
#[derive(Clone)]
pub struct LifecycleStorage {
    db: Arc<Database>,
}

impl LifecycleStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DELIVERIES_TABLE)?;
            let _ = write_txn.open_table(RENTALS_TABLE)?;
            let _ = write_txn.open_table(EVENTS_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
            let _ = write_txn.open_table(INTENT_INDEX_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Sequence Operations ==========

    /// Increment and return the global sequence number
    pub fn increment_sequence(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Get current sequence (read-only)
    pub fn current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Delivery Snapshots ==========

    /// Insert a new delivery (fresh draft, version 0)
    pub fn insert_delivery(
        &self,
        txn: &WriteTransaction,
        snapshot: &DeliverySnapshot,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(DELIVERIES_TABLE)?;
        let value = serde_json::to_vec(snapshot)?;
        table.insert(snapshot.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get a delivery snapshot by id
    pub fn get_delivery(&self, id: &str) -> StorageResult<Option<DeliverySnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DELIVERIES_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Conditionally replace a delivery snapshot.
    ///
    /// Re-reads the stored row inside the transaction; the write
    /// happens only if its `version` equals `expected_version`. Returns
    /// `false` when the version moved (lost race), `true` on success.
    pub fn update_delivery_if(
        &self,
        txn: &WriteTransaction,
        id: &str,
        expected_version: u64,
        snapshot: &DeliverySnapshot,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(DELIVERIES_TABLE)?;
        let current_version = match table.get(id)? {
            Some(value) => {
                let current: DeliverySnapshot = serde_json::from_slice(value.value())?;
                current.version
            }
            None => return Ok(false),
        };
        if current_version != expected_version {
            return Ok(false);
        }
        let value = serde_json::to_vec(snapshot)?;
        table.insert(id, value.as_slice())?;
        Ok(true)
    }

    /// Remove a delivery row (draft deletion). Events are retained.
    pub fn remove_delivery(&self, txn: &WriteTransaction, id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(DELIVERIES_TABLE)?;
        table.remove(id)?;
        Ok(())
    }

    // ========== Rental Snapshots ==========

    /// Insert a new rental (fresh draft, version 0)
    pub fn insert_rental(
        &self,
        txn: &WriteTransaction,
        snapshot: &RentalSnapshot,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(RENTALS_TABLE)?;
        let value = serde_json::to_vec(snapshot)?;
        table.insert(snapshot.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get a rental snapshot by id
    pub fn get_rental(&self, id: &str) -> StorageResult<Option<RentalSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RENTALS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Conditionally replace a rental snapshot (see [`Self::update_delivery_if`])
    pub fn update_rental_if(
        &self,
        txn: &WriteTransaction,
        id: &str,
        expected_version: u64,
        snapshot: &RentalSnapshot,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(RENTALS_TABLE)?;
        let current_version = match table.get(id)? {
            Some(value) => {
                let current: RentalSnapshot = serde_json::from_slice(value.value())?;
                current.version
            }
            None => return Ok(false),
        };
        if current_version != expected_version {
            return Ok(false);
        }
        let value = serde_json::to_vec(snapshot)?;
        table.insert(id, value.as_slice())?;
        Ok(true)
    }

    /// Remove a rental row (draft deletion). Events are retained.
    pub fn remove_rental(&self, txn: &WriteTransaction, id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(RENTALS_TABLE)?;
        table.remove(id)?;
        Ok(())
    }

    // ========== Event Operations ==========

    /// Append an event, assigning the next global sequence number.
    /// Returns the assigned sequence.
    pub fn append_event(
        &self,
        txn: &WriteTransaction,
        event: &mut LifecycleEvent,
    ) -> StorageResult<u64> {
        let seq = self.increment_sequence(txn)?;
        event.sequence = seq;

        let mut table = txn.open_table(EVENTS_TABLE)?;
        let key = (event.resource_id.as_str(), seq);
        let value = serde_json::to_vec(event)?;
        table.insert(key, value.as_slice())?;
        Ok(seq)
    }

    /// All events for a resource, ordered by occurrence then sequence
    pub fn events_for_resource(&self, resource_id: &str) -> StorageResult<Vec<LifecycleEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        let range_start = (resource_id, 0u64);
        let range_end = (resource_id, u64::MAX);

        for result in table.range(range_start..=range_end)? {
            let (_key, value) = result?;
            let event: LifecycleEvent = serde_json::from_slice(value.value())?;
            events.push(event);
        }

        events.sort_by_key(|e| (e.occurred_at, e.sequence));
        Ok(events)
    }

    // ========== Webhook Idempotency ==========

    /// Check whether a webhook event has already been applied
    pub fn is_webhook_processed(&self, raw_event_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
        Ok(table.get(raw_event_id)?.is_some())
    }

    /// Mark a webhook event as applied (same transaction as the state
    /// change it produced)
    pub fn mark_webhook_processed(
        &self,
        txn: &WriteTransaction,
        raw_event_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
        table.insert(raw_event_id, ())?;
        Ok(())
    }

    // ========== Payment Intent Index ==========

    /// Record which resource an external intent ref belongs to
    pub fn put_intent_index(
        &self,
        txn: &WriteTransaction,
        intent_ref: &str,
        key: &ResourceKey,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(INTENT_INDEX_TABLE)?;
        let value = serde_json::to_vec(key)?;
        table.insert(intent_ref, value.as_slice())?;
        Ok(())
    }

    /// Look up the resource an intent ref belongs to
    pub fn get_intent_resource(&self, intent_ref: &str) -> StorageResult<Option<ResourceKey>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INTENT_INDEX_TABLE)?;
        match table.get(intent_ref)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{Actor, DeliveryStatus};

    fn storage() -> LifecycleStorage {
        LifecycleStorage::open_in_memory().unwrap()
    }

    fn draft(id: &str) -> DeliverySnapshot {
        DeliverySnapshot::new_draft(id, "cust-1", 500, "eur")
    }

    #[test]
    fn test_insert_and_get_delivery() {
        let storage = storage();
        let snap = draft("dlv-1");

        let txn = storage.begin_write().unwrap();
        storage.insert_delivery(&txn, &snap).unwrap();
        txn.commit().unwrap();

        let loaded = storage.get_delivery("dlv-1").unwrap().unwrap();
        assert_eq!(loaded, snap);
        assert!(storage.get_delivery("missing").unwrap().is_none());
    }

    #[test]
    fn test_conditional_update_succeeds_on_matching_version() {
        let storage = storage();
        let snap = draft("dlv-1");
        let txn = storage.begin_write().unwrap();
        storage.insert_delivery(&txn, &snap).unwrap();
        txn.commit().unwrap();

        let mut next = snap.clone();
        next.version = 1;
        next.status = DeliveryStatus::Authorized;

        let txn = storage.begin_write().unwrap();
        assert!(storage.update_delivery_if(&txn, "dlv-1", 0, &next).unwrap());
        txn.commit().unwrap();

        let loaded = storage.get_delivery("dlv-1").unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.status, DeliveryStatus::Authorized);
    }

    #[test]
    fn test_conditional_update_rejects_stale_version() {
        let storage = storage();
        let snap = draft("dlv-1");
        let txn = storage.begin_write().unwrap();
        storage.insert_delivery(&txn, &snap).unwrap();
        txn.commit().unwrap();

        let mut next = snap.clone();
        next.version = 1;

        // First writer wins
        let txn = storage.begin_write().unwrap();
        assert!(storage.update_delivery_if(&txn, "dlv-1", 0, &next).unwrap());
        txn.commit().unwrap();

        // Second writer decided against version 0, which is gone
        let mut stale = snap.clone();
        stale.version = 1;
        stale.assignee_id = Some("drv-9".into());

        let txn = storage.begin_write().unwrap();
        assert!(!storage.update_delivery_if(&txn, "dlv-1", 0, &stale).unwrap());
        txn.abort().unwrap();

        let loaded = storage.get_delivery("dlv-1").unwrap().unwrap();
        assert!(loaded.assignee_id.is_none());
    }

    #[test]
    fn test_conditional_update_of_missing_row() {
        let storage = storage();
        let snap = draft("dlv-1");
        let txn = storage.begin_write().unwrap();
        assert!(!storage.update_delivery_if(&txn, "dlv-1", 0, &snap).unwrap());
        txn.abort().unwrap();
    }

    #[test]
    fn test_events_survive_draft_deletion() {
        let storage = storage();
        let snap = draft("dlv-1");
        let actor = Actor::customer("cust-1");

        let txn = storage.begin_write().unwrap();
        storage.insert_delivery(&txn, &snap).unwrap();
        let mut ev = LifecycleEvent::new("dlv-1", &actor, "created", json!({}));
        storage.append_event(&txn, &mut ev).unwrap();
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        storage.remove_delivery(&txn, "dlv-1").unwrap();
        let mut ev = LifecycleEvent::new("dlv-1", &actor, "draft_deleted", json!({}));
        storage.append_event(&txn, &mut ev).unwrap();
        txn.commit().unwrap();

        assert!(storage.get_delivery("dlv-1").unwrap().is_none());
        let events = storage.events_for_resource("dlv-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "created");
        assert_eq!(events[1].event_type, "draft_deleted");
    }

    #[test]
    fn test_sequence_is_global_and_monotonic() {
        let storage = storage();
        let actor = Actor::system();

        let txn = storage.begin_write().unwrap();
        let mut e1 = LifecycleEvent::new("dlv-1", &actor, "created", json!({}));
        let mut e2 = LifecycleEvent::new("rnt-1", &actor, "created", json!({}));
        let s1 = storage.append_event(&txn, &mut e1).unwrap();
        let s2 = storage.append_event(&txn, &mut e2).unwrap();
        txn.commit().unwrap();

        assert_eq!(s1, 1);
        assert_eq!(s2, 2);
        assert_eq!(storage.current_sequence().unwrap(), 2);
    }

    #[test]
    fn test_webhook_idempotency_marker() {
        let storage = storage();
        assert!(!storage.is_webhook_processed("evt-1").unwrap());

        let txn = storage.begin_write().unwrap();
        storage.mark_webhook_processed(&txn, "evt-1").unwrap();
        txn.commit().unwrap();

        assert!(storage.is_webhook_processed("evt-1").unwrap());
    }

    #[test]
    fn test_intent_index_round_trip() {
        let storage = storage();
        let key = ResourceKey::Delivery("dlv-1".into());

        let txn = storage.begin_write().unwrap();
        storage.put_intent_index(&txn, "pi_abc", &key).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_intent_resource("pi_abc").unwrap(), Some(key));
        assert!(storage.get_intent_resource("pi_zzz").unwrap().is_none());
    }
}
