//! Payment provider webhooks: signature verification and event payloads.

use chrono::prelude::*;
use failure::{Error as FailureError, Fail};
use hex;
use hmac::{Hmac, Mac};
use serde_json::{self, Value};
use sha2::Sha256;

use errors::*;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// In cents.
    #[serde(default)]
    pub amount_total: Option<i64>,
}

fn invalid(reason: &str) -> FailureError {
    format_err!("Webhook signature rejected: {}", reason)
        .context(Error::InvalidSignature)
        .into()
}

/// Checks `t=<unix>,v1=<hex>` signature headers against `HMAC-SHA256(secret, "<t>.<payload>")`.
#[derive(Clone, Debug)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: String, tolerance_secs: i64) -> Self {
        Self { secret, tolerance_secs }
    }

    fn mac(&self, timestamp: i64, payload: &str) -> Result<HmacSha256, FailureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| invalid("unusable secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    /// Produces a header value the verifier accepts.
    pub fn sign(&self, payload: &str, timestamp: i64) -> Result<String, FailureError> {
        let signature = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
    }

    pub fn verify(&self, payload: &str, header: &str) -> Result<WebhookEvent, FailureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &str, header: &str, now: i64) -> Result<WebhookEvent, FailureError> {
        let mut timestamp = None;
        let mut signatures = vec![];
        for part in header.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(v)) => timestamp = v.parse::<i64>().ok(),
                (Some("v1"), Some(v)) => signatures.push(v.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| invalid("no timestamp"))?;
        if signatures.is_empty() {
            return Err(invalid("no v1 signature"));
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(invalid("timestamp outside of tolerance"));
        }

        let matched = signatures.iter().any(|signature| match hex::decode(signature) {
            Ok(bytes) => self.mac(timestamp, payload)
                .map(|mac| mac.verify_slice(&bytes).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        });
        if !matched {
            return Err(invalid("signature mismatch"));
        }

        serde_json::from_str(payload).map_err(|e| e.context(Error::Parse).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"id":"evt_1","type":"invoice.payment_succeeded","data":{"object":{"subscription":"sub_1"}}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test".to_string(), 300)
    }

    #[test]
    fn signed_payload_is_accepted() {
        let header = verifier().sign(PAYLOAD, 1_700_000_000).unwrap();

        let event = verifier().verify_at(PAYLOAD, &header, 1_700_000_100).unwrap();

        assert_eq!(event.event_type, "invoice.payment_succeeded");
        assert_eq!(event.data.object["subscription"], "sub_1");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = verifier().sign(PAYLOAD, 1_700_000_000).unwrap();
        let tampered = PAYLOAD.replace("sub_1", "sub_2");

        let e = verifier().verify_at(&tampered, &header, 1_700_000_000).unwrap_err();

        assert_eq!(error_kind(&e), Some(Error::InvalidSignature));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let header = verifier().sign(PAYLOAD, 1_700_000_000).unwrap();

        let e = verifier().verify_at(PAYLOAD, &header, 1_700_000_301).unwrap_err();

        assert_eq!(error_kind(&e), Some(Error::InvalidSignature));
    }

    #[test]
    fn other_secret_is_rejected() {
        let header = WebhookVerifier::new("whsec_other".to_string(), 300)
            .sign(PAYLOAD, 1_700_000_000)
            .unwrap();

        let e = verifier().verify_at(PAYLOAD, &header, 1_700_000_000).unwrap_err();

        assert_eq!(error_kind(&e), Some(Error::InvalidSignature));
    }

    #[test]
    fn malformed_header_is_rejected() {
        for header in &["", "t=abc,v1=00", "v1=00", "t=1700000000"] {
            let e = verifier().verify_at(PAYLOAD, header, 1_700_000_000).unwrap_err();
            assert_eq!(error_kind(&e), Some(Error::InvalidSignature));
        }
    }
}
