use crate::domain::ports::{Clock, IdGenerator};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use uuid::Uuid;

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to, at millisecond precision.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// UUID-based identifiers and random trace numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn transaction_id(&self) -> String {
        format!("tx_{}", Uuid::new_v4().simple())
    }

    fn settlement_id(&self) -> String {
        format!("stl_{}", Uuid::new_v4().simple())
    }

    fn trace_number(&self) -> u32 {
        rand::thread_rng().gen_range(0..1_000_000)
    }
}

/// Predictable identifiers (`tx_000001`, `stl_000001`, ...).
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    transactions: AtomicU64,
    settlements: AtomicU64,
    traces: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn transaction_id(&self) -> String {
        format!("tx_{:06}", self.transactions.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn settlement_id(&self) -> String {
        format!("stl_{:06}", self.settlements.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn trace_number(&self) -> u32 {
        ((self.traces.fetch_add(1, Ordering::SeqCst) + 1) % 1_000_000) as u32
    }
}
