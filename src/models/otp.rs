use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Document in the "otps" collection, keyed by email. A TTL index on `expiresAt`
/// removes it if it is never consumed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Otp {
    pub email: String,
    pub otp: String,
    pub created_at: DateTime,
    pub expires_at: DateTime,
}

impl Otp {
    pub fn new(email: &str, otp: String, ttl_seconds: i64) -> Self {
        let now = DateTime::now();
        Self {
            email: email.to_string(),
            otp,
            created_at: now,
            expires_at: DateTime::from_millis(now.timestamp_millis() + ttl_seconds * 1000),
        }
    }

    pub fn is_expired_at(&self, now: DateTime) -> bool {
        self.expires_at <= now
    }
}
