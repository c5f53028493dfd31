use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tower_cookies::Cookie;
use tower_cookies::cookie::{SameSite, time};

use crate::crypto::cookie::{decode_cookie, encode_cookie};
use crate::crypto::cypher::Cypher;
use crate::crypto::token::generate_token_default_length;
use crate::error::SessionError;
use crate::models::session::{Entry, SessionId};
use crate::models::user::User;
use crate::repositories::session::{MemoryStore, SessionStore};

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "owl_session";

/// Upper bound for a session lifetime, to keep timestamp arithmetic in range.
const MAX_SESSION_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Behaviour switches of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfiguration {
    /// Controls the cookie `Secure` attribute. `true` restricts the cookie to
    /// HTTPS.
    pub secure: bool,

    /// Enables session renewal: every login invalidates the previous sessions
    /// of the same principal. When disabled, old sessions stay valid until
    /// they expire.
    pub invalidate: bool,
}

impl Default for ManagerConfiguration {
    fn default() -> Self {
        Self {
            secure: true,
            invalidate: true,
        }
    }
}

/// Issues, validates and destroys sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    cypher: Arc<dyn Cypher>,
    configuration: ManagerConfiguration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        ttl: Duration,
        cypher: Arc<dyn Cypher>,
        configuration: ManagerConfiguration,
    ) -> Self {
        Self {
            store,
            ttl: ttl.min(MAX_SESSION_TTL),
            cypher,
            configuration,
        }
    }

    /// Secure cookies and session renewal enabled.
    pub fn with_defaults(store: Arc<dyn SessionStore>, ttl: Duration, cypher: Arc<dyn Cypher>) -> Self {
        Self::new(store, ttl, cypher, ManagerConfiguration::default())
    }

    /// A manager backed by a fresh [`MemoryStore`].
    pub fn in_memory(ttl: Duration, cypher: Arc<dyn Cypher>, configuration: ManagerConfiguration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), ttl, cypher, configuration)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn configuration(&self) -> ManagerConfiguration {
        self.configuration
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Stores a new entry for `user` and returns it.
    pub async fn add(&self, user: User) -> Result<Entry, SessionError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        let entry = Entry {
            id: SessionId::new(generate_token_default_length()),
            user,
            expires_at: Utc::now() + ttl,
        };

        if self.configuration.invalidate {
            self.store.replace_for_user(entry.clone()).await?;
        } else {
            self.store.save(entry.clone()).await?;
        }
        self.store.recollect_garbage().await?;

        tracing::debug!("Session created for user {}", entry.user.id);
        Ok(entry)
    }

    /// Looks an entry up. Expiry is not checked.
    pub async fn get(&self, id: &SessionId) -> Result<Entry, SessionError> {
        self.store.get(id).await
    }

    pub async fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        self.store.delete(id).await
    }

    /// Runs a garbage collection pass on the store.
    pub async fn recollect_garbage(&self) -> Result<(), SessionError> {
        self.store.recollect_garbage().await
    }

    /// Returns the principal of `id` if its session has not expired. An
    /// expired entry is deleted. Every lookup also collects garbage.
    pub async fn get_user_if_valid(&self, id: &SessionId) -> Result<User, SessionError> {
        let entry = self.get(id).await;
        self.store.recollect_garbage().await?;
        let entry = entry?;
        if entry.is_valid() {
            return Ok(entry.user);
        }
        self.store.delete(id).await?;
        Err(SessionError::ExpiredSession)
    }

    /// Creates a session for `user` and returns the cookie carrying it.
    pub async fn create_session(&self, user: User) -> Result<Cookie<'static>, SessionError> {
        let entry = self.add(user).await?;
        let encoded = encode_cookie(self.cypher.as_ref(), entry.id.as_str())?;

        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, encoded);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.configuration.secure);
        cookie.set_max_age(time::Duration::seconds(self.ttl.as_secs() as i64));
        Ok(cookie)
    }

    /// Resolves the principal behind a session cookie value.
    pub async fn read_session(&self, cookie_value: Option<&str>) -> Result<User, SessionError> {
        let id = self.read_session_id(cookie_value)?;
        self.get_user_if_valid(&id).await
    }

    /// Deletes the session behind a cookie value and returns a cookie that
    /// clears it on the client.
    pub async fn destroy_session(&self, cookie_value: Option<&str>) -> Result<Cookie<'static>, SessionError> {
        let id = self.read_session_id(cookie_value)?;
        self.store.delete(&id).await?;
        tracing::debug!("Session destroyed");
        Ok(self.removal_cookie())
    }

    /// A cookie that makes the client forget the session.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.configuration.secure);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }

    fn read_session_id(&self, cookie_value: Option<&str>) -> Result<SessionId, SessionError> {
        let value = cookie_value
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SessionError::InvalidCookie("no session cookie is present".into()))?;
        let id = decode_cookie(self.cypher.as_ref(), value)
            .map_err(|e| SessionError::InvalidCookie(e.to_string()))?;
        Ok(SessionId::new(id))
    }
}
