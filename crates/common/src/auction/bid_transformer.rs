//! Price transformation into reporting and ad-server targeting values.
//!
//! Prices arrive in the source's unit (dollars for JustPremium). They are
//! scaled to cents, optionally floored into granularity buckets, then scaled
//! to the output unit and printed with a fixed number of decimals.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::provider::PriceTransform;

/// Rounding applied before formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingType {
    #[serde(alias = "FLOOR")]
    Floor,
    #[serde(alias = "NONE")]
    None,
}

/// One granularity band: values up to `max` cents snap down in `step` cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PriceBucket {
    pub max: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub step: f64,
}

/// Configuration of one [`BidTransformer`].
///
/// Field names accept the camelCase spelling used in publisher configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BidTransformerConfig {
    #[serde(alias = "inputCentsMultiplier", default = "default_cents_factor")]
    #[validate(range(exclusive_min = 0.0))]
    pub input_cents_multiplier: f64,

    #[serde(alias = "outputCentsDivisor", default = "default_cents_factor")]
    #[validate(range(exclusive_min = 0.0))]
    pub output_cents_divisor: f64,

    #[serde(alias = "outputPrecision", default = "default_output_precision")]
    #[validate(range(max = 10))]
    pub output_precision: u8,

    #[serde(alias = "roundingType", default = "default_rounding_type")]
    pub rounding_type: RoundingType,

    /// Values below this many cents transform to zero.
    #[serde(default)]
    pub floor: f64,

    #[serde(default)]
    #[validate(nested, custom(function = "validate_bucket_order"))]
    pub buckets: Vec<PriceBucket>,
}

fn default_cents_factor() -> f64 {
    100.0
}

fn default_output_precision() -> u8 {
    2
}

fn default_rounding_type() -> RoundingType {
    RoundingType::Floor
}

fn validate_bucket_order(buckets: &[PriceBucket]) -> Result<(), ValidationError> {
    let ascending = buckets.windows(2).all(|pair| pair[0].max < pair[1].max);
    if ascending {
        Ok(())
    } else {
        Err(ValidationError::new("buckets_not_ascending"))
    }
}

impl BidTransformerConfig {
    /// Ad-server targeting granularity: 5 cent steps to $20, $1 steps to $50.
    #[must_use]
    pub fn targeting_default() -> Self {
        Self {
            input_cents_multiplier: 100.0,
            output_cents_divisor: 100.0,
            output_precision: 2,
            rounding_type: RoundingType::Floor,
            floor: 0.0,
            buckets: vec![
                PriceBucket {
                    max: 2000.0,
                    step: 5.0,
                },
                PriceBucket {
                    max: 5000.0,
                    step: 100.0,
                },
            ],
        }
    }

    /// Reported price: dollars in, dollars out, no rounding.
    #[must_use]
    pub fn price_default() -> Self {
        Self {
            input_cents_multiplier: 100.0,
            output_cents_divisor: 100.0,
            output_precision: 2,
            rounding_type: RoundingType::None,
            floor: 0.0,
            buckets: Vec::new(),
        }
    }
}

impl Default for BidTransformerConfig {
    fn default() -> Self {
        Self::targeting_default()
    }
}

/// Default [`PriceTransform`] implementation.
#[derive(Debug, Clone)]
pub struct BidTransformer {
    config: BidTransformerConfig,
}

impl BidTransformer {
    #[must_use]
    pub fn new(config: BidTransformerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &BidTransformerConfig {
        &self.config
    }

    fn bucket_floor(&self, cents: f64) -> f64 {
        if cents.is_nan() {
            return cents;
        }

        if cents < self.config.floor {
            return 0.0;
        }

        let mut lower = 0.0;
        for bucket in &self.config.buckets {
            if cents <= bucket.max {
                return lower + ((cents - lower) / bucket.step).floor() * bucket.step;
            }
            lower = bucket.max;
        }

        match self.config.buckets.last() {
            Some(last) => last.max,
            None => cents.floor(),
        }
    }
}

impl PriceTransform for BidTransformer {
    fn apply(&self, price: f64) -> String {
        // Strip binary noise (1.15 * 100 = 114.999...) before flooring.
        let cents = (price * self.config.input_cents_multiplier * 1e6).round() / 1e6;

        let cents = match self.config.rounding_type {
            RoundingType::None => cents,
            RoundingType::Floor => self.bucket_floor(cents),
        };

        format!(
            "{:.*}",
            usize::from(self.config.output_precision),
            cents / self.config.output_cents_divisor
        )
    }
}
