//! # Redemption code format
//!
//! Orders are collected against a QR payload rather than a receipt. The payload has to prove two things at the
//! pickup counter: that this engine issued it, and that it has not been altered since. Anyone could otherwise
//! mint a payload for an order they never paid for, or stretch the expiry on one they let lapse.
//!
//! The payload is therefore a signed claims object. The signature is a keyed MAC over the three immutable facts of
//! the order: its id, its payment method, and the expiry deadline. Binding only immutable fields means a code can
//! be checked offline, without a database round trip, and still be tamper-evident. Mutable order state (was it
//! paid? was it collected?) is deliberately *not* in the payload; the database stays authoritative for that.
//!
//! ## Payload format
//!
//! ```text
//!    {"order_id":17,"payment_method":"Cash","expires_at":"2024-06-10T12:15:00Z","signature":"<64 hex chars>"}
//! ```
//!
//! where `signature` is the hex encoding of `HMAC-SHA256(secret, canonical)`, and `canonical` is the JSON
//! serialization of the three claim fields alone, in declaration order. Verification recomputes the MAC over the
//! re-serialized claims, so cosmetic re-encodings of the same claims (whitespace, an equivalent timestamp
//! spelling) still verify, while any change to the claimed *values* does not.
//!
//! A rejected payload never reveals which check failed. Expiry is the one exception: an expired-but-authentic
//! payload reports the order id, because the caller needs it to trigger the reversal flow.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tuckshop_common::Secret;

use crate::{config::PosConfig, db_types::PaymentMethod};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionCodeError {
    /// The payload could not be authenticated. Deliberately carries no detail.
    #[error("Invalid redemption code")]
    Invalid,
    #[error("Redemption code for order {order_id} expired at {expired_at}")]
    Expired { order_id: i64, expired_at: DateTime<Utc> },
}

/// The three signed facts of a redemption code. Everything else about the order lives in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionClaims {
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRedemptionCode {
    #[serde(flatten)]
    claims: RedemptionClaims,
    signature: String,
}

impl SignedRedemptionCode {
    pub fn order_id(&self) -> i64 {
        self.claims.order_id
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.claims.payment_method
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at
    }

    pub fn claims(&self) -> &RedemptionClaims {
        &self.claims
    }

    /// The wire form of the code: what gets stored on the order row and rendered into the QR image.
    pub fn as_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// Issues and verifies signed redemption codes. One instance is built from the process configuration at startup
/// and shared; the signing secret never leaves it.
#[derive(Debug, Clone)]
pub struct RedemptionCodes {
    secret: Secret<String>,
    cash_window: Duration,
    mobile_window: Duration,
}

impl RedemptionCodes {
    pub fn new(secret: Secret<String>, cash_window: Duration, mobile_window: Duration) -> Self {
        Self { secret, cash_window, mobile_window }
    }

    pub fn from_config(config: &PosConfig) -> Self {
        Self::new(config.redemption_secret.clone(), config.cash_expiry, config.mobile_expiry)
    }

    /// How long a fresh code stays redeemable. Cash windows are short: an unpaid cash order holds a stock
    /// reservation, and must not hold it for long.
    pub fn window_for(&self, method: PaymentMethod) -> Duration {
        match method {
            PaymentMethod::MobileMoney => self.mobile_window,
            PaymentMethod::Cash => self.cash_window,
        }
    }

    /// Mints the code for a new order. The expiry window is chosen by payment method.
    pub fn issue(&self, order_id: i64, method: PaymentMethod, now: DateTime<Utc>) -> SignedRedemptionCode {
        self.issue_with_expiry(order_id, method, now + self.window_for(method))
    }

    pub fn issue_with_expiry(
        &self,
        order_id: i64,
        method: PaymentMethod,
        expires_at: DateTime<Utc>,
    ) -> SignedRedemptionCode {
        let claims = RedemptionClaims { order_id, payment_method: method, expires_at };
        let signature = sign_claims(&claims, &self.secret);
        SignedRedemptionCode { claims, signature }
    }

    /// Checks a presented payload: authenticity first, then expiry. An inauthentic payload is rejected without
    /// detail; an authentic-but-stale one reports the order id so the caller can trigger reversal.
    pub fn verify(&self, payload: &str, now: DateTime<Utc>) -> Result<RedemptionClaims, RedemptionCodeError> {
        let code: SignedRedemptionCode = serde_json::from_str(payload).map_err(|e| {
            debug!("🔏️ Rejecting unparseable redemption payload: {e}");
            RedemptionCodeError::Invalid
        })?;
        let signature = hex::decode(&code.signature).map_err(|e| {
            debug!("🔏️ Rejecting redemption payload with non-hex signature: {e}");
            RedemptionCodeError::Invalid
        })?;
        let mut mac = new_mac(&self.secret);
        mac.update(canonical_message(&code.claims).as_bytes());
        mac.verify_slice(&signature).map_err(|_| {
            debug!("🔏️ Rejecting redemption payload for order {}: signature mismatch", code.claims.order_id);
            RedemptionCodeError::Invalid
        })?;
        if now > code.claims.expires_at {
            return Err(RedemptionCodeError::Expired {
                order_id: code.claims.order_id,
                expired_at: code.claims.expires_at,
            });
        }
        Ok(code.claims)
    }
}

/// The exact byte string the MAC covers: the JSON serialization of the claims, without the signature field.
pub fn canonical_message(claims: &RedemptionClaims) -> String {
    serde_json::to_string(claims).unwrap()
}

fn new_mac(secret: &Secret<String>) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.reveal().as_bytes()).expect("HMAC can take a key of any size")
}

fn sign_claims(claims: &RedemptionClaims, secret: &Secret<String>) -> String {
    let mut mac = new_mac(secret);
    mac.update(canonical_message(claims).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    fn codes() -> RedemptionCodes {
        let secret = Secret::new("an ancient shared secret".to_string());
        RedemptionCodes::new(secret, Duration::minutes(15), Duration::hours(4))
    }

    fn now() -> DateTime<Utc> {
        "2024-06-10T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let codes = codes();
        let code = codes.issue(17, PaymentMethod::Cash, now());
        assert_eq!(code.order_id(), 17);
        assert_eq!(code.payment_method(), PaymentMethod::Cash);
        assert_eq!(code.expires_at(), now() + Duration::minutes(15));
        let claims = codes.verify(&code.as_json(), now()).expect("freshly issued code must verify");
        assert_eq!(&claims, code.claims());
    }

    #[test]
    fn windows_follow_the_payment_method() {
        let codes = codes();
        let cash = codes.issue(1, PaymentMethod::Cash, now());
        let mobile = codes.issue(1, PaymentMethod::MobileMoney, now());
        assert_eq!(cash.expires_at(), now() + Duration::minutes(15));
        assert_eq!(mobile.expires_at(), now() + Duration::hours(4));
    }

    #[test]
    fn tampered_order_id_is_rejected() {
        let codes = codes();
        let payload = codes.issue(17, PaymentMethod::Cash, now()).as_json();
        let forged = payload.replace("\"order_id\":17", "\"order_id\":99");
        assert_ne!(payload, forged);
        assert_eq!(codes.verify(&forged, now()), Err(RedemptionCodeError::Invalid));
    }

    #[test]
    fn tampered_payment_method_is_rejected() {
        let codes = codes();
        let payload = codes.issue(17, PaymentMethod::Cash, now()).as_json();
        let forged = payload.replace("Cash", "MobileMoney");
        assert_eq!(codes.verify(&forged, now()), Err(RedemptionCodeError::Invalid));
    }

    #[test]
    fn stretched_expiry_is_rejected() {
        let codes = codes();
        let code = codes.issue_with_expiry(17, PaymentMethod::Cash, now());
        let stretched = codes.issue_with_expiry(17, PaymentMethod::Cash, now() + Duration::days(30));
        // Splice the far-future expiry into the originally signed payload
        let forged = code.as_json().replace(
            &serde_json::to_string(&code.expires_at()).unwrap().replace('"', ""),
            &serde_json::to_string(&stretched.expires_at()).unwrap().replace('"', ""),
        );
        assert_eq!(codes.verify(&forged, now()), Err(RedemptionCodeError::Invalid));
    }

    #[test]
    fn expired_code_reports_the_order_id() {
        let codes = codes();
        let code = codes.issue(42, PaymentMethod::Cash, now());
        let later = now() + Duration::minutes(16);
        let err = codes.verify(&code.as_json(), later).unwrap_err();
        assert_eq!(err, RedemptionCodeError::Expired { order_id: 42, expired_at: code.expires_at() });
    }

    #[test]
    fn code_is_still_valid_at_the_deadline_itself() {
        let codes = codes();
        let code = codes.issue(42, PaymentMethod::Cash, now());
        assert!(codes.verify(&code.as_json(), code.expires_at()).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codes = codes();
        let other = RedemptionCodes::new(
            Secret::new("a different secret".to_string()),
            Duration::minutes(15),
            Duration::hours(4),
        );
        let payload = codes.issue(17, PaymentMethod::Cash, now()).as_json();
        assert_eq!(other.verify(&payload, now()), Err(RedemptionCodeError::Invalid));
    }

    #[test]
    fn garbage_payloads_are_rejected() {
        let codes = codes();
        for junk in ["", "not json", "{}", "{\"order_id\":1}", "{\"signature\":\"zz\"}"] {
            assert_eq!(codes.verify(junk, now()), Err(RedemptionCodeError::Invalid), "payload: {junk}");
        }
    }

    #[test]
    fn signature_is_a_sha256_digest_in_hex() {
        let code = codes().issue(17, PaymentMethod::Cash, now());
        let json: serde_json::Value = serde_json::from_str(&code.as_json()).unwrap();
        let signature = json["signature"].as_str().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
