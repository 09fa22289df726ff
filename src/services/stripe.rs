use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

/// Stripe Checkout wrapper. The session is a black box to the rest of the
/// app: we hand over an amount and get back a redirect URL; settlement
/// arrives later on the webhook.
pub struct StripeService;

impl StripeService {
    fn secret_key() -> Result<String, String> {
        crate::config::Config::stripe_secret_key().ok_or_else(|| "Stripe is not configured".to_string())
    }

    /// Creates a Checkout Session for a one-off plan purchase. `amount` is
    /// the already-discounted USD total; Stripe wants cents.
    pub async fn create_checkout_session(
        amount: f64,
        plan_name: &str,
        transaction_id: &str,
    ) -> Result<serde_json::Value, String> {
        let key = Self::secret_key()?;
        let frontend = crate::config::Config::frontend_url();
        let client = Client::new();

        let unit_amount = (amount * 100.0).round() as i64;
        let success_url = format!("{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}", frontend);
        let cancel_url = format!("{}/billing/cancelled", frontend);

        let params: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                plan_name.to_string(),
            ),
            ("metadata[transaction_id]", transaction_id.to_string()),
        ];

        let res = client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .basic_auth(&key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Stripe returned {}: {}", status, body));
        }

        res.json().await.map_err(|e| e.to_string())
    }

    /// Verifies a `Stripe-Signature` header against the raw webhook payload.
    /// The signed message is `"{timestamp}.{payload}"`, HMAC-SHA256 with the
    /// endpoint secret, hex encoded in the `v1` field.
    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        secret: &str,
    ) -> Result<(), String> {
        let (timestamp, provided) = Self::parse_signature_header(signature_header)?;

        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| "Invalid webhook secret".to_string())?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if expected != provided {
            return Err("Webhook signature mismatch".to_string());
        }

        Ok(())
    }

    fn parse_signature_header(header: &str) -> Result<(String, String), String> {
        let mut timestamp = None;
        let mut v1 = None;

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value.to_string()),
                Some(("v1", value)) => v1 = Some(value.to_string()),
                _ => {}
            }
        }

        match (timestamp, v1) {
            (Some(t), Some(sig)) => Ok((t, sig)),
            _ => Err("Malformed Stripe-Signature header".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, timestamp: &str, secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let sig = sign(payload, "1700000000", "whsec_test");
        let header = format!("t=1700000000,v1={}", sig);

        assert!(StripeService::verify_webhook_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let sig = sign(r#"{"amount":10}"#, "1700000000", "whsec_test");
        let header = format!("t=1700000000,v1={}", sig);

        assert!(
            StripeService::verify_webhook_signature(r#"{"amount":9999}"#, &header, "whsec_test")
                .is_err()
        );
    }

    #[test]
    fn rejects_wrong_secret_and_malformed_header() {
        let payload = "{}";
        let sig = sign(payload, "1700000000", "whsec_a");
        let header = format!("t=1700000000,v1={}", sig);

        assert!(StripeService::verify_webhook_signature(payload, &header, "whsec_b").is_err());
        assert!(StripeService::verify_webhook_signature(payload, "garbage", "whsec_a").is_err());
    }
}
