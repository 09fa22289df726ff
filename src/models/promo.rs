use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoRejection {
    Inactive,
    NotStarted,
    Expired,
    UsageCapReached,
}

impl PromoRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoRejection::Inactive => "inactive",
            PromoRejection::NotStarted => "not_started",
            PromoRejection::Expired => "expired",
            PromoRejection::UsageCapReached => "usage_cap_reached",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromoCode {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percentage 0-100, or a fixed USD amount.
    pub value: f64,
    pub valid_from: DateTime,
    pub valid_until: Option<DateTime>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl PromoCode {
    /// Pure check against the row; `now` comes from the caller so the logic
    /// stays testable.
    pub fn validate(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }

        let now_ms = now.timestamp_millis();
        if now_ms < self.valid_from.timestamp_millis() {
            return Err(PromoRejection::NotStarted);
        }
        if let Some(until) = self.valid_until {
            if now_ms > until.timestamp_millis() {
                return Err(PromoRejection::Expired);
            }
        }
        if let Some(cap) = self.max_uses {
            if self.used_count >= cap {
                return Err(PromoRejection::UsageCapReached);
            }
        }

        Ok(())
    }

    /// Discounted checkout amount, rounded to cents, never negative.
    pub fn apply_discount(&self, amount: f64) -> f64 {
        let discounted = match self.discount_type {
            DiscountType::Percentage => amount * (1.0 - self.value / 100.0),
            DiscountType::Fixed => amount - self.value,
        };
        (discounted.max(0.0) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePromoCodeDto {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    /// ISO-8601; defaults to now.
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub max_uses: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidatePromoDto {
    pub code: String,
    /// Checkout amount the discount would apply to.
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PromoValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn promo(discount_type: DiscountType, value: f64) -> PromoCode {
        let now = DateTime::now();
        PromoCode {
            id: None,
            code: "TEST".to_string(),
            discount_type,
            value,
            valid_from: DateTime::from_millis(now.timestamp_millis() - 1000),
            valid_until: None,
            max_uses: None,
            used_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_discount_rounds_to_cents() {
        let p = promo(DiscountType::Percentage, 10.0);
        assert_eq!(p.apply_discount(99.99), 89.99);
        assert_eq!(p.apply_discount(100.0), 90.0);

        let third = promo(DiscountType::Percentage, 33.0);
        assert_eq!(third.apply_discount(10.0), 6.7);
    }

    #[test]
    fn fixed_discount_never_goes_negative() {
        let p = promo(DiscountType::Fixed, 50.0);
        assert_eq!(p.apply_discount(30.0), 0.0);
        assert_eq!(p.apply_discount(50.0), 0.0);
        assert_eq!(p.apply_discount(79.99), 29.99);
    }

    #[test]
    fn full_percentage_discount_is_free_not_negative() {
        let p = promo(DiscountType::Percentage, 100.0);
        assert_eq!(p.apply_discount(49.0), 0.0);
    }

    #[test]
    fn expired_code_rejected() {
        let mut p = promo(DiscountType::Percentage, 10.0);
        p.valid_until = Some(DateTime::from_millis(
            Utc::now().timestamp_millis() - 60_000,
        ));
        assert_eq!(p.validate(Utc::now()), Err(PromoRejection::Expired));
    }

    #[test]
    fn not_yet_started_code_rejected() {
        let mut p = promo(DiscountType::Fixed, 5.0);
        p.valid_from = DateTime::from_millis(Utc::now().timestamp_millis() + 60_000);
        assert_eq!(p.validate(Utc::now()), Err(PromoRejection::NotStarted));
    }

    #[test]
    fn usage_cap_enforced() {
        let mut p = promo(DiscountType::Fixed, 5.0);
        p.max_uses = Some(3);
        p.used_count = 3;
        assert_eq!(p.validate(Utc::now()), Err(PromoRejection::UsageCapReached));

        p.used_count = 2;
        assert!(p.validate(Utc::now()).is_ok());
    }

    #[test]
    fn inactive_beats_other_reasons() {
        let mut p = promo(DiscountType::Fixed, 5.0);
        p.is_active = false;
        p.used_count = 99;
        p.max_uses = Some(1);
        assert_eq!(p.validate(Utc::now()), Err(PromoRejection::Inactive));
    }
}
