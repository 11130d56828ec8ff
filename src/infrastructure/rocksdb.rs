use super::clock::SystemClock;
use crate::domain::outcome::{LogEntry, PaymentOutcome};
use crate::domain::ports::{
    ClockArc, DEFAULT_IN_FLIGHT_LEASE, IdempotencyStore, Reservation, TransactionLogger,
    lease_expired,
};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Column Family for idempotency keys and their recorded outcomes.
pub const CF_IDEMPOTENCY: &str = "idempotency";
/// Column Family for the transaction log, keyed by transaction id.
pub const CF_TRANSACTION_LOG: &str = "transaction_log";

#[derive(Debug, Serialize, Deserialize)]
enum StoredKey {
    InFlight { since: DateTime<Utc> },
    Completed(Box<PaymentOutcome>),
}

/// A persistent store implementation using RocksDB.
///
/// Serves as both the idempotency store and the transaction log, each in
/// its own Column Family with JSON values. `Clone` shares the underlying
/// `Arc<DB>`.
///
/// In-flight reservations record when they were taken, so a key left behind
/// by a crashed run is handed to the next request once the lease lapses.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Serializes read-then-write reservations within this process.
    reservations: Arc<Mutex<()>>,
    clock: ClockArc,
    in_flight_lease: Duration,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating the column
    /// families if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_idempotency = ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Options::default());
        let cf_log = ColumnFamilyDescriptor::new(CF_TRANSACTION_LOG, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_idempotency, cf_log])?;

        Ok(Self {
            db: Arc::new(db),
            reservations: Arc::new(Mutex::new(())),
            clock: Arc::new(SystemClock),
            in_flight_lease: DEFAULT_IN_FLIGHT_LEASE,
        })
    }

    pub fn with_clock(self, clock: ClockArc) -> Self {
        Self { clock, ..self }
    }

    pub fn with_in_flight_lease(self, in_flight_lease: Duration) -> Self {
        Self {
            in_flight_lease,
            ..self
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::SystemError(format!("column family {name} not found")))
    }

    fn read_key(&self, key: &str) -> Result<Option<StoredKey>> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_key(&self, key: &str, state: &StoredKey) -> Result<()> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        self.db.put_cf(cf, key.as_bytes(), serde_json::to_vec(state)?)?;
        Ok(())
    }

    /// Every logged entry, ordered by transaction id.
    pub fn log_entries(&self) -> Result<Vec<LogEntry>> {
        let cf = self.cf(CF_TRANSACTION_LOG)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn reserve(&self, key: &str) -> Result<Reservation> {
        let _guard = self.reservations.lock().await;
        let now = self.clock.now();
        match self.read_key(key)? {
            None => {
                self.write_key(key, &StoredKey::InFlight { since: now })?;
                Ok(Reservation::Acquired)
            }
            Some(StoredKey::InFlight { since }) if lease_expired(since, now, self.in_flight_lease) => {
                tracing::warn!(key, %since, "Reclaiming stale in-flight reservation");
                self.write_key(key, &StoredKey::InFlight { since: now })?;
                Ok(Reservation::Acquired)
            }
            Some(StoredKey::InFlight { .. }) => Ok(Reservation::InFlight),
            Some(StoredKey::Completed(outcome)) => Ok(Reservation::Completed(outcome)),
        }
    }

    async fn complete(&self, key: &str, outcome: &PaymentOutcome) -> Result<()> {
        let _guard = self.reservations.lock().await;
        self.write_key(key, &StoredKey::Completed(Box::new(outcome.clone())))
    }

    async fn release(&self, key: &str) -> Result<()> {
        let _guard = self.reservations.lock().await;
        if let Some(StoredKey::InFlight { .. }) = self.read_key(key)? {
            let cf = self.cf(CF_IDEMPOTENCY)?;
            self.db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionLogger for RocksDBStore {
    async fn log(&self, entry: &LogEntry) -> Result<()> {
        let cf = self.cf(CF_TRANSACTION_LOG)?;
        self.db
            .put_cf(cf, entry.transaction_id.as_bytes(), serde_json::to_vec(entry)?)?;
        Ok(())
    }
}
