//! Test factories for generating tokens
//!
//! Tokens are signed with the same secret the test application verifies with.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

pub const TEST_SECRET: &str = "test_secret_key_that_is_at_least_32_bytes_long";

/// Builds signed bearer tokens
pub struct TokenFactory {
    secret: String,
}

impl Default for TokenFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenFactory {
    pub fn new() -> Self {
        Self {
            secret: TEST_SECRET.to_string(),
        }
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Token valid for one hour
    pub fn token(&self, username: &str, role: &str) -> String {
        self.sign(json!({
            "username": username,
            "role": role,
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        }))
    }

    /// Token that expired a minute ago
    pub fn expired(&self, username: &str, role: &str) -> String {
        self.sign(json!({
            "username": username,
            "role": role,
            "iat": (Utc::now() - Duration::hours(1)).timestamp(),
            "exp": (Utc::now() - Duration::minutes(1)).timestamp(),
        }))
    }

    pub fn host(&self, username: &str) -> String {
        self.token(username, "host")
    }

    pub fn guest(&self, username: &str) -> String {
        self.token(username, "guest")
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("Failed to sign test token")
    }
}
