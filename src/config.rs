use crate::domain::payment::MerchantTier;
use crate::error::{PaymentError, Result};
use std::time::Duration;

/// Width of the card acceptor id (ISO field 42).
pub const MAX_MERCHANT_ID_LENGTH: usize = 15;

/// Per-merchant pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Merchant on whose behalf payments are authorized. Checked by
    /// [`validate_merchant_id`] when built through [`PipelineConfig::for_merchant`].
    pub merchant_id: String,
    pub merchant_tier: MerchantTier,
    /// Used when a request does not say whether to settle instantly.
    pub instant_settlement: bool,
    /// Fee region and settlement calendar for customers with no country.
    pub default_country: String,
    pub processor_timeout: Duration,
    pub provider_timeout: Duration,
    pub logger_timeout: Duration,
}

impl PipelineConfig {
    /// Default settings for `merchant_id`, refusing ids the card network
    /// cannot carry.
    pub fn for_merchant(merchant_id: &str, merchant_tier: MerchantTier) -> Result<Self> {
        Ok(Self {
            merchant_id: validate_merchant_id(merchant_id)?,
            merchant_tier,
            ..Self::default()
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merchant_id: "MERCHANT0000001".to_string(),
            merchant_tier: MerchantTier::Standard,
            instant_settlement: false,
            default_country: "US".to_string(),
            processor_timeout: Duration::from_secs(30),
            provider_timeout: Duration::from_secs(5),
            logger_timeout: Duration::from_secs(2),
        }
    }
}

/// Trimmed merchant id: non-empty, printable ASCII, at most
/// [`MAX_MERCHANT_ID_LENGTH`] characters.
pub fn validate_merchant_id(merchant_id: &str) -> Result<String> {
    let id = merchant_id.trim();
    if id.is_empty() {
        return Err(PaymentError::ValidationError(
            "merchant id is required".to_string(),
        ));
    }
    if !id.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(PaymentError::ValidationError(format!(
            "merchant id {id:?} must be printable ASCII"
        )));
    }
    if id.len() > MAX_MERCHANT_ID_LENGTH {
        return Err(PaymentError::ValidationError(format!(
            "merchant id {id:?} is {} characters, at most {MAX_MERCHANT_ID_LENGTH} allowed",
            id.len()
        )));
    }
    Ok(id.to_string())
}
