use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::cypher::{KEY_SIZE, SecureKey, generate_key};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
const DEFAULT_CSRF_TTL_SECS: u64 = 3_600;

/// Largest request body the application reads.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the server listens on.
    pub bind_addr: SocketAddr,
    /// The key sealing session cookies and CSRF tokens.
    pub cypher_key: SecureKey,
    /// How long a session lives.
    pub session_ttl: Duration,
    /// How long a CSRF token is accepted.
    pub csrf_ttl: Duration,
    /// Whether the session cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
    /// Whether logging in closes the user's other sessions.
    pub session_renewal: bool,
    /// Where unauthenticated requests are redirected. 401 when unset.
    pub login_url: Option<String>,
    /// Redis server holding the sessions. In memory when unset.
    pub redis_url: Option<String>,
    /// Password of the seeded `admin` account. Random when unset.
    pub admin_password: Option<Zeroizing<String>>,
}

impl Default for Config {
    /// Defaults with a random cypher key. Sessions do not survive a restart.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cypher_key: generate_key(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            csrf_ttl: Duration::from_secs(DEFAULT_CSRF_TTL_SECS),
            cookie_secure: true,
            session_renewal: true,
            login_url: None,
            redis_url: None,
            admin_password: None,
        }
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let cypher_key = match env::var("CYPHER_KEY") {
            Ok(mut key_hex) => {
                let key = SecureKey::from_hex(key_hex.trim()).with_context(|| {
                    format!(
                        "CYPHER_KEY must be {} hex characters (generate with: openssl rand -hex {})",
                        KEY_SIZE * 2,
                        KEY_SIZE
                    )
                });
                key_hex.zeroize();
                key?
            }
            Err(_) => {
                tracing::warn!("⚠️ CYPHER_KEY not set: using a random key, sessions will not survive a restart");
                generate_key()
            }
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            cypher_key,
            session_ttl: Duration::from_secs(parse_var("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?),
            csrf_ttl: Duration::from_secs(parse_var("CSRF_TTL_SECS", DEFAULT_CSRF_TTL_SECS)?),
            cookie_secure: parse_var("SESSION_COOKIE_SECURE", true)?,
            session_renewal: parse_var("SESSION_RENEWAL", true)?,
            login_url: non_empty_var("LOGIN_URL"),
            redis_url: non_empty_var("REDIS_URL"),
            admin_password: non_empty_var("ADMIN_PASSWORD").map(Zeroizing::new),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.csrf_ttl, Duration::from_secs(3_600));
        assert!(config.cookie_secure && config.session_renewal);
        assert!(config.login_url.is_none() && config.redis_url.is_none());
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(parse_var("OWL_TEST_SURELY_UNSET_VAR", 42u64).unwrap(), 42);
        assert!(non_empty_var("OWL_TEST_SURELY_UNSET_VAR").is_none());
    }
}
