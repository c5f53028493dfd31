use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, Method};
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::crypto::cookie::{decode_cookie, encode_cookie};
use crate::crypto::cypher::Cypher;
use crate::error::CypherError;

/// Name of the form field carrying the token.
pub const CSRF_HEADER_NAME: &str = "X-Csrf-Token";
/// Header carrying the token, checked when the form field is absent.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

const DELIMITER: &str = "//00//";
const TOKEN_PARTS: usize = 2;

/// Issues and checks single-use, time-boxed anti-forgery tokens.
///
/// A token is `nonce//00//issued_at` sealed by the shared [`Cypher`], so it
/// cannot be forged or aged without the key.
#[derive(Clone)]
pub struct Csrf {
    cypher: Arc<dyn Cypher>,
    expires: Duration,
}

impl Csrf {
    /// Creates a new issuer whose tokens live for `expires`.
    pub fn new(expires: Duration, cypher: Arc<dyn Cypher>) -> Self {
        Self { cypher, expires }
    }

    /// Methods that never need a token.
    pub fn is_safe_method(method: &Method) -> bool {
        method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
    }

    /// Generates a fresh token.
    pub fn generate(&self) -> Result<String, CypherError> {
        self.generate_at(Utc::now().timestamp())
    }

    pub(crate) fn generate_at(&self, issued_at: i64) -> Result<String, CypherError> {
        let raw = format!("{}{DELIMITER}{}", OsRng.next_u64(), issued_at);
        encode_cookie(self.cypher.as_ref(), &raw)
    }

    /// Checks that `token` was issued by this key and has not expired.
    pub fn check(&self, token: &str) -> bool {
        let raw = match decode_cookie(self.cypher.as_ref(), token) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Cannot decrypt csrf token: {}", e);
                return false;
            }
        };

        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        if parts.len() != TOKEN_PARTS {
            tracing::debug!("Malformed csrf token: expected {} parts", TOKEN_PARTS);
            return false;
        }

        let Ok(issued_at) = parts[1].parse::<i64>() else {
            tracing::debug!("Malformed csrf token: timestamp is not an integer");
            return false;
        };

        let ttl = i64::try_from(self.expires.as_secs()).unwrap_or(i64::MAX);
        if issued_at.saturating_add(ttl) < Utc::now().timestamp() {
            tracing::debug!("Expired csrf token");
            return false;
        }
        true
    }

    /// Validates a request. Safe methods always pass; otherwise the token is
    /// taken from the form field first and from the header second.
    pub fn check_request(&self, method: &Method, headers: &HeaderMap, form_token: Option<&str>) -> bool {
        if Self::is_safe_method(method) {
            return true;
        }

        let header_token = headers
            .get(&CSRF_HEADER)
            .and_then(|value| value.to_str().ok());

        match form_token.filter(|t| !t.is_empty()).or(header_token.filter(|t| !t.is_empty())) {
            Some(token) => self.check(token),
            None => {
                tracing::warn!("Csrf token ({}) not found in form or headers", CSRF_HEADER_NAME);
                false
            }
        }
    }
}
