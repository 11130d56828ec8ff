use super::clock::SystemClock;
use crate::domain::outcome::{LogEntry, PaymentOutcome};
use crate::domain::ports::{
    ClockArc, DEFAULT_IN_FLIGHT_LEASE, IdempotencyStore, Reservation, RiskDataProvider,
    TransactionLogger, lease_expired,
};
use crate::domain::risk::{GeoLocation, HistoricalPayment};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum KeyState {
    InFlight { since: DateTime<Utc> },
    Completed(Box<PaymentOutcome>),
}

/// Thread-safe in-memory idempotency store.
///
/// Reservation happens under a single write lock, so two concurrent requests
/// with the same key can never both acquire it. An in-flight key older than
/// the lease is handed to the next request. Completed outcomes are kept for
/// the life of the store.
#[derive(Clone)]
pub struct InMemoryIdempotencyStore {
    keys: Arc<RwLock<HashMap<String, KeyState>>>,
    clock: ClockArc,
    in_flight_lease: Duration,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self {
            keys: Arc::default(),
            clock: Arc::new(SystemClock),
            in_flight_lease: DEFAULT_IN_FLIGHT_LEASE,
        }
    }
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
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
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn reserve(&self, key: &str) -> Result<Reservation> {
        let now = self.clock.now();
        let mut keys = self.keys.write().await;
        Ok(match keys.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(KeyState::InFlight { since: now });
                Reservation::Acquired
            }
            Entry::Occupied(mut slot) => match slot.get().clone() {
                KeyState::InFlight { since } if lease_expired(since, now, self.in_flight_lease) => {
                    tracing::warn!(key, %since, "Reclaiming stale in-flight reservation");
                    slot.insert(KeyState::InFlight { since: now });
                    Reservation::Acquired
                }
                KeyState::InFlight { .. } => Reservation::InFlight,
                KeyState::Completed(outcome) => Reservation::Completed(outcome),
            },
        })
    }

    async fn complete(&self, key: &str, outcome: &PaymentOutcome) -> Result<()> {
        let mut keys = self.keys.write().await;
        keys.insert(key.to_string(), KeyState::Completed(Box::new(outcome.clone())));
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut keys = self.keys.write().await;
        if matches!(keys.get(key), Some(KeyState::InFlight { .. })) {
            keys.remove(key);
        }
        Ok(())
    }
}

/// Keeps every log entry in memory, in arrival order.
#[derive(Default, Clone)]
pub struct InMemoryTransactionLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl TransactionLogger for InMemoryTransactionLog {
    async fn log(&self, entry: &LogEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RiskData {
    recent_counts: HashMap<String, u32>,
    locations: HashMap<String, GeoLocation>,
    history: HashMap<String, Vec<HistoricalPayment>>,
}

/// Risk lookups served from seeded maps. Unknown customers have no recent
/// transactions and no history; unknown IPs do not resolve.
#[derive(Default, Clone)]
pub struct InMemoryRiskData {
    data: Arc<RwLock<RiskData>>,
}

impl InMemoryRiskData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_recent_count(&self, customer_id: &str, count: u32) {
        let mut data = self.data.write().await;
        data.recent_counts.insert(customer_id.to_string(), count);
    }

    pub async fn set_location(&self, ip_address: &str, location: GeoLocation) {
        let mut data = self.data.write().await;
        data.locations.insert(ip_address.to_string(), location);
    }

    pub async fn add_history(&self, customer_id: &str, payment: HistoricalPayment) {
        let mut data = self.data.write().await;
        data.history
            .entry(customer_id.to_string())
            .or_default()
            .push(payment);
    }
}

#[async_trait]
impl RiskDataProvider for InMemoryRiskData {
    async fn recent_transaction_count(&self, customer_id: &str, _merchant_id: &str) -> Result<u32> {
        let data = self.data.read().await;
        Ok(data.recent_counts.get(customer_id).copied().unwrap_or(0))
    }

    async fn geolocate(&self, ip_address: &str) -> Result<Option<GeoLocation>> {
        let data = self.data.read().await;
        Ok(data.locations.get(ip_address).cloned())
    }

    async fn customer_history(&self, customer_id: &str) -> Result<Vec<HistoricalPayment>> {
        let data = self.data.read().await;
        Ok(data.history.get(customer_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentMethod, PaymentRequest, Transaction};
    use crate::infrastructure::clock::FixedClock;
    use chrono::TimeZone;

    fn outcome() -> PaymentOutcome {
        let request = PaymentRequest {
            amount: 100,
            currency: "USD".to_string(),
            method: "card".to_string(),
            ..Default::default()
        };
        PaymentOutcome::new(Transaction::receive("tx_1".to_string(), &request, Utc::now()))
    }

    #[tokio::test]
    async fn test_reserve_complete_replay() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.reserve("k").await.unwrap(), Reservation::Acquired);
        assert_eq!(store.reserve("k").await.unwrap(), Reservation::InFlight);

        store.complete("k", &outcome()).await.unwrap();
        match store.reserve("k").await.unwrap() {
            Reservation::Completed(replayed) => assert_eq!(replayed.transaction.id, "tx_1"),
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_frees_only_in_flight_keys() {
        let store = InMemoryIdempotencyStore::new();
        store.reserve("a").await.unwrap();
        store.release("a").await.unwrap();
        assert_eq!(store.reserve("a").await.unwrap(), Reservation::Acquired);

        store.complete("a", &outcome()).await.unwrap();
        store.release("a").await.unwrap();
        assert!(matches!(
            store.reserve("a").await.unwrap(),
            Reservation::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_stale_in_flight_key_is_reclaimed() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 11, 12, 0, 0).unwrap(),
        ));
        let store = InMemoryIdempotencyStore::new()
            .with_clock(clock.clone())
            .with_in_flight_lease(Duration::from_secs(60));

        assert_eq!(store.reserve("k").await.unwrap(), Reservation::Acquired);
        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(store.reserve("k").await.unwrap(), Reservation::InFlight);

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(store.reserve("k").await.unwrap(), Reservation::Acquired);
        // the new holder gets a fresh lease
        assert_eq!(store.reserve("k").await.unwrap(), Reservation::InFlight);

        store.complete("k", &outcome()).await.unwrap();
        clock.advance(chrono::Duration::days(30));
        assert!(matches!(
            store.reserve("k").await.unwrap(),
            Reservation::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reservations_single_winner() {
        let store = InMemoryIdempotencyStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.reserve("same").await.unwrap() }));
        }
        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap() == Reservation::Acquired {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test]
    async fn test_risk_data_defaults_and_seeds() {
        let data = InMemoryRiskData::new();
        assert_eq!(data.recent_transaction_count("cus", "m").await.unwrap(), 0);
        assert!(data.geolocate("1.2.3.4").await.unwrap().is_none());

        data.set_recent_count("cus", 7).await;
        data.add_history(
            "cus",
            HistoricalPayment {
                amount: 100,
                method: PaymentMethod::Upi,
                timestamp: Utc::now(),
            },
        )
        .await;
        assert_eq!(data.recent_transaction_count("cus", "m").await.unwrap(), 7);
        assert_eq!(data.customer_history("cus").await.unwrap().len(), 1);
    }
}
