//! Weighted multi-factor fraud scoring.
//!
//! The scorer is a pure function of [`RiskSignals`]: everything that needs a
//! lookup (velocity counts, IP geolocation, customer history) is gathered by
//! the caller beforehand, so identical signals always produce an identical
//! [`RiskAssessment`].

use super::money::{MinorUnits, round_half_up, to_major_units};
use super::payment::PaymentMethod;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Scores strictly above this are treated as fraud.
pub const FRAUD_THRESHOLD: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFactorType {
    Amount,
    Velocity,
    Location,
    Device,
    Behavioral,
}

impl RiskFactorType {
    /// Evaluation order, which is also the tie-break order for the reason.
    pub const ORDER: [RiskFactorType; 5] = [
        RiskFactorType::Amount,
        RiskFactorType::Velocity,
        RiskFactorType::Location,
        RiskFactorType::Device,
        RiskFactorType::Behavioral,
    ];

    pub fn weight(&self) -> Decimal {
        match self {
            RiskFactorType::Amount => dec!(0.30),
            RiskFactorType::Velocity => dec!(0.25),
            RiskFactorType::Location => dec!(0.20),
            RiskFactorType::Device => dec!(0.15),
            RiskFactorType::Behavioral => dec!(0.10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor_type: RiskFactorType,
    pub score: u8,
    pub weight: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskDecision {
    Clean,
    Fraudulent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub decision: RiskDecision,
    /// Description of the highest-scoring factor.
    pub reason: String,
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    pub fn is_fraudulent(&self) -> bool {
        self.decision == RiskDecision::Fraudulent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: String,
    pub is_proxy: bool,
    pub is_vpn: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPayment {
    pub amount: MinorUnits,
    pub method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
}

/// Inputs for one assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskSignals {
    pub amount: MinorUnits,
    pub currency: String,
    pub method: PaymentMethod,
    pub customer_id: Option<String>,
    pub customer_country: Option<String>,
    pub ip_address: Option<String>,
    /// `None` when there is no IP or it could not be resolved.
    pub geolocation: Option<GeoLocation>,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub recent_transaction_count: u32,
    pub history: Vec<HistoricalPayment>,
    pub at: DateTime<Utc>,
}

/// Tunable tables behind the factor ladders.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPolicy {
    /// Major-unit USD value of one major unit of each currency. Unknown
    /// currencies are taken at par.
    pub usd_rates: HashMap<String, Decimal>,
    pub high_risk_countries: HashSet<String>,
    pub medium_risk_countries: HashSet<String>,
    pub blocked_fingerprints: HashSet<String>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        let usd_rates = [
            ("USD", dec!(1)),
            ("EUR", dec!(1.1)),
            ("GBP", dec!(1.25)),
            ("JPY", dec!(0.007)),
            ("INR", dec!(0.012)),
            ("BRL", dec!(0.2)),
            ("NGN", dec!(0.0024)),
            ("KES", dec!(0.0096)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self {
            usd_rates,
            high_risk_countries: ["KP", "IR", "SY"].into_iter().map(String::from).collect(),
            medium_risk_countries: HashSet::new(),
            blocked_fingerprints: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    policy: Arc<RiskPolicy>,
}

impl RiskScorer {
    pub fn new(policy: Arc<RiskPolicy>) -> Self {
        Self { policy }
    }

    pub fn assess(&self, signals: &RiskSignals) -> RiskAssessment {
        let factors: Vec<RiskFactor> = RiskFactorType::ORDER
            .iter()
            .map(|factor_type| {
                let (score, description) = match factor_type {
                    RiskFactorType::Amount => self.amount_factor(signals),
                    RiskFactorType::Velocity => velocity_factor(signals),
                    RiskFactorType::Location => self.location_factor(signals),
                    RiskFactorType::Device => self.device_factor(signals),
                    RiskFactorType::Behavioral => behavioral_factor(signals),
                };
                RiskFactor {
                    factor_type: *factor_type,
                    score,
                    weight: factor_type.weight(),
                    description: description.to_string(),
                }
            })
            .collect();

        let weighted: Decimal = factors
            .iter()
            .map(|factor| Decimal::from(factor.score) * factor.weight)
            .sum();
        let score = u8::try_from(round_half_up(weighted).clamp(dec!(0), dec!(100))).unwrap_or(100);

        let mut highest = &factors[0];
        for factor in &factors[1..] {
            if factor.score > highest.score {
                highest = factor;
            }
        }
        let reason = highest.description.clone();

        RiskAssessment {
            score,
            decision: if score > FRAUD_THRESHOLD {
                RiskDecision::Fraudulent
            } else {
                RiskDecision::Clean
            },
            reason,
            factors,
        }
    }

    pub fn usd_value(&self, amount: MinorUnits, currency: &str) -> Decimal {
        let rate = self.policy.usd_rates.get(currency).copied().unwrap_or(dec!(1));
        to_major_units(amount, currency) * rate
    }

    fn amount_factor(&self, signals: &RiskSignals) -> (u8, &'static str) {
        let usd = self.usd_value(signals.amount, &signals.currency);
        if usd > dec!(10000) {
            (80, "Very high transaction amount")
        } else if usd > dec!(5000) {
            (60, "High transaction amount")
        } else if usd > dec!(1000) {
            (30, "Elevated transaction amount")
        } else if usd > dec!(500) {
            (10, "Moderate transaction amount")
        } else {
            (0, "Normal transaction amount")
        }
    }

    fn location_factor(&self, signals: &RiskSignals) -> (u8, &'static str) {
        let Some(location) = signals.ip_address.as_ref().and(signals.geolocation.as_ref()) else {
            return (20, "Unknown IP location");
        };

        if self.policy.high_risk_countries.contains(&location.country) {
            (85, "Transaction from high-risk country")
        } else if location.is_proxy || location.is_vpn {
            (60, "Transaction through proxy or VPN")
        } else if self.policy.medium_risk_countries.contains(&location.country) {
            (50, "Transaction from medium-risk country")
        } else if signals
            .customer_country
            .as_ref()
            .is_some_and(|country| *country != location.country)
        {
            (35, "IP location differs from customer country")
        } else {
            (0, "Normal geographic location")
        }
    }

    fn device_factor(&self, signals: &RiskSignals) -> (u8, &'static str) {
        if signals.device_fingerprint.is_none() && signals.user_agent.is_none() {
            return (30, "Missing device information");
        }

        let fingerprint = signals.device_fingerprint.as_deref().map(|fp| {
            if self.policy.blocked_fingerprints.contains(fp) {
                (70, "Suspicious device fingerprint")
            } else if fp.len() < 16 || !fp.bytes().all(|b| b.is_ascii_hexdigit()) {
                (30, "Unusual device configuration")
            } else {
                (0, "Normal device profile")
            }
        });

        let user_agent = signals.user_agent.as_deref().map(|ua| {
            let lower = ua.to_ascii_lowercase();
            if ["bot", "crawler", "spider"].iter().any(|tag| lower.contains(tag)) {
                (90, "Automated browser detected")
            } else if ua.len() < 20 {
                (60, "Suspicious user agent string")
            } else if ua.contains("MSIE") {
                (50, "Outdated browser version")
            } else {
                (0, "Normal device profile")
            }
        });

        match (fingerprint, user_agent) {
            (Some(fp), Some(ua)) if ua.0 > fp.0 => ua,
            (Some(fp), _) => fp,
            (None, Some(ua)) => ua,
            (None, None) => (0, "Normal device profile"),
        }
    }
}

fn velocity_factor(signals: &RiskSignals) -> (u8, &'static str) {
    if signals.customer_id.is_none() {
        return (25, "Unknown customer - moderate risk");
    }
    match signals.recent_transaction_count {
        count if count > 20 => (90, "Extremely high transaction velocity"),
        count if count > 10 => (70, "Very high transaction velocity"),
        count if count > 5 => (40, "High transaction velocity"),
        count if count > 2 => (15, "Moderate transaction velocity"),
        _ => (0, "Normal transaction velocity"),
    }
}

fn hour_distance(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b);
    diff.min(24 - diff)
}

fn behavioral_factor(signals: &RiskSignals) -> (u8, &'static str) {
    if signals.customer_id.is_none() || signals.history.is_empty() {
        return (10, "New customer - limited behavioral data");
    }
    let history = &signals.history;

    // (points, description) for each anomaly that fires
    let mut anomalies: Vec<(u8, &'static str)> = Vec::new();

    if !history.iter().any(|past| past.method == signals.method) {
        anomalies.push((20, "Unusual payment method for customer"));
    }

    let min = history.iter().map(|past| past.amount).min().unwrap_or(0);
    let max = history.iter().map(|past| past.amount).max().unwrap_or(0);
    if signals.amount.saturating_mul(10) < min || signals.amount > max.saturating_mul(5) {
        anomalies.push((25, "Unusual transaction amount for customer"));
    }

    let hour = signals.at.hour();
    if !history
        .iter()
        .any(|past| hour_distance(past.timestamp.hour(), hour) <= 2)
    {
        anomalies.push((15, "Transaction outside usual time pattern"));
    }

    let score = anomalies.iter().map(|(points, _)| *points).sum::<u8>().min(100);
    let description = anomalies
        .iter()
        .fold(None::<(u8, &'static str)>, |best, current| match best {
            Some(best) if best.0 >= current.0 => Some(best),
            _ => Some(*current),
        })
        .map_or("Normal behavioral pattern", |(_, description)| description);

    (score, description)
}
