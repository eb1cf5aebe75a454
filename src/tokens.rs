//! Override token codec.
//!
//! Tokens are self-contained: the payload travels inside the token
//! together with an HMAC-SHA256 signature, so nothing but a keyed hash
//! of the full token ever needs to be persisted. Wire format:
//! `base64url(JSON{payload..., signature})` with the signature computed
//! over the canonical JSON of the payload alone (struct field order).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime an override token may be issued with.
pub const MAX_TOKEN_MINUTES: i64 = 15;

/// Privileged action categories an override token can authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideScope {
    BookingCapacity,
    Pricing,
    PolicyBypass,
    Refund,
    DepositWaiver,
    AdminAction,
}

impl OverrideScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideScope::BookingCapacity => "BOOKING_CAPACITY",
            OverrideScope::Pricing => "PRICING",
            OverrideScope::PolicyBypass => "POLICY_BYPASS",
            OverrideScope::Refund => "REFUND",
            OverrideScope::DepositWaiver => "DEPOSIT_WAIVER",
            OverrideScope::AdminAction => "ADMIN_ACTION",
        }
    }

    pub fn parse(value: &str) -> Option<OverrideScope> {
        match value {
            "BOOKING_CAPACITY" => Some(OverrideScope::BookingCapacity),
            "PRICING" => Some(OverrideScope::Pricing),
            "POLICY_BYPASS" => Some(OverrideScope::PolicyBypass),
            "REFUND" => Some(OverrideScope::Refund),
            "DEPOSIT_WAIVER" => Some(OverrideScope::DepositWaiver),
            "ADMIN_ACTION" => Some(OverrideScope::AdminAction),
            _ => None,
        }
    }
}

/// Signed token payload. Field order is the canonical serialization the
/// signature covers; do not reorder fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub nonce: String,
    pub scope: OverrideScope,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub issued_to: Uuid,
    pub issued_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenEnvelope {
    #[serde(flatten)]
    payload: TokenPayload,
    signature: String,
}

/// Outcome of token verification. Signature mismatch, expiry and
/// malformed encodings all collapse to `Invalid`; callers must not be
/// able to tell which check failed.
#[derive(Debug)]
pub enum Verification {
    Valid(TokenPayload),
    Invalid,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

#[derive(Clone)]
pub struct OverrideTokenCodec {
    secret: Vec<u8>,
}

impl OverrideTokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("OVERRIDE_TOKEN_SECRET")
            .map_err(|_| AppError::configuration("OVERRIDE_TOKEN_SECRET not set"))?;
        Ok(Self::new(secret.into_bytes()))
    }

    /// Mint a signed token. Returns the opaque token string and the nonce
    /// separately so the nonce can be indexed for consumption tracking.
    pub fn issue(
        &self,
        issued_by: Uuid,
        issued_to: Uuid,
        scope: OverrideScope,
        entity_type: &str,
        entity_id: Option<Uuid>,
        expires_at: DateTime<Utc>,
    ) -> Result<(String, String), AppError> {
        let now = Utc::now();
        if expires_at <= now {
            return Err(AppError::validation("expires_at", "must be in the future"));
        }
        if expires_at - now > Duration::minutes(MAX_TOKEN_MINUTES) {
            return Err(AppError::validation(
                "expires_at",
                format!("expiry window exceeds {} minutes", MAX_TOKEN_MINUTES),
            ));
        }

        let mut nonce_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);

        let payload = TokenPayload {
            nonce: nonce.clone(),
            scope,
            entity_type: entity_type.to_string(),
            entity_id,
            issued_to,
            issued_by,
            expires_at,
        };

        let signature = self.sign(&payload)?;
        let envelope = TokenEnvelope { payload, signature };
        let json = serde_json::to_vec(&envelope)
            .map_err(|err| AppError::internal(format!("token serialization failed: {err}")))?;

        Ok((URL_SAFE_NO_PAD.encode(json), nonce))
    }

    /// Decode and verify an opaque token. Never errors on malformed
    /// input; every failure path yields `Verification::Invalid`.
    pub fn verify(&self, opaque: &str) -> Verification {
        let raw = match URL_SAFE_NO_PAD.decode(opaque.as_bytes()) {
            Ok(raw) => raw,
            Err(_) => return Verification::Invalid,
        };

        let envelope: TokenEnvelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(_) => return Verification::Invalid,
        };

        let expected = match hex::decode(&envelope.signature) {
            Ok(bytes) => bytes,
            Err(_) => return Verification::Invalid,
        };

        let canonical = match serde_json::to_vec(&envelope.payload) {
            Ok(bytes) => bytes,
            Err(_) => return Verification::Invalid,
        };

        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return Verification::Invalid,
        };
        mac.update(&canonical);
        if mac.verify_slice(&expected).is_err() {
            return Verification::Invalid;
        }

        if envelope.payload.expires_at <= Utc::now() {
            return Verification::Invalid;
        }

        Verification::Valid(envelope.payload)
    }

    /// Keyed one-way hash of the full token string. This is what gets
    /// persisted; the raw token must be presented by the bearer.
    pub fn hash(&self, opaque: &str) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| AppError::internal(format!("hmac key error: {err}")))?;
        mac.update(opaque.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn sign(&self, payload: &TokenPayload) -> Result<String, AppError> {
        let canonical = serde_json::to_vec(payload)
            .map_err(|err| AppError::internal(format!("token serialization failed: {err}")))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| AppError::internal(format!("hmac key error: {err}")))?;
        mac.update(&canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
