//! Identity provider webhooks (Svix signing scheme).
//!
//! A delivery carries `svix-id`, `svix-timestamp` and `svix-signature`
//! headers. The signature is `v1,<base64 HMAC-SHA256>` over
//! `"{id}.{timestamp}.{body}"`, keyed with the base64 part of a `whsec_`
//! secret. Several space separated signatures may be present during secret
//! rotation; any match is accepted.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AppError, Result};
use crate::models::UserSync;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew for a delivery, in seconds
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

/// What a verified delivery asks us to do
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAction {
    SyncUser(UserSync),
    Ignore(String),
}

pub struct WebhookService;

impl WebhookService {
    /// Verify a delivery's signature and freshness against `now` (unix seconds)
    pub fn verify(secret: &str, headers: &HeaderMap, body: &[u8], now: i64) -> Result<()> {
        let msg_id = Self::header(headers, "svix-id")?;
        let timestamp = Self::header(headers, "svix-timestamp")?;
        let signatures = Self::header(headers, "svix-signature")?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid webhook timestamp".to_string()))?;
        let skew = now.checked_sub(ts).map(i64::unsigned_abs);
        if !matches!(skew, Some(s) if s <= TIMESTAMP_TOLERANCE_SECS.unsigned_abs()) {
            return Err(AppError::BadRequest("Webhook timestamp out of tolerance".to_string()));
        }

        let key = STANDARD
            .decode(secret.strip_prefix("whsec_").unwrap_or(secret))
            .map_err(|e| AppError::Internal(format!("Invalid webhook signing secret: {}", e)))?;
        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AppError::Internal(format!("Invalid webhook signing secret: {}", e)))?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);

        let matched = signatures
            .split_whitespace()
            .filter_map(|s| s.strip_prefix("v1,"))
            .filter_map(|s| STANDARD.decode(s).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if !matched {
            return Err(AppError::BadRequest("Webhook signature mismatch".to_string()));
        }
        Ok(())
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", name)))
    }

    /// Decode a verified delivery
    pub fn parse(body: &[u8]) -> Result<WebhookAction> {
        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        match event.event_type.as_str() {
            "user.created" | "user.updated" => {
                let data: UserData = serde_json::from_value(event.data)
                    .map_err(|_| AppError::BadRequest("Invalid user data received".to_string()))?;

                let email = data.email_addresses.into_iter().next().map(|e| e.email_address);
                match (data.id, email) {
                    (Some(id), Some(email)) if !id.is_empty() && !email.is_empty() => {
                        Ok(WebhookAction::SyncUser(UserSync {
                            auth_subject: id,
                            email,
                            first_name: data.first_name,
                            last_name: data.last_name,
                        }))
                    }
                    _ => Err(AppError::BadRequest("Invalid user data received".to_string())),
                }
            }
            _ => Ok(WebhookAction::Ignore(event.event_type)),
        }
    }
}
