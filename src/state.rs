use std::sync::Arc;

use anyhow::Result;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::csrf::Csrf;
use crate::crypto::cypher::{Aes256Cypher, Cypher};
use crate::crypto::hash::{Argon2Hasher, Hasher};
use crate::crypto::token::generate_random_password;
use crate::models::user::Role;
use crate::repositories::redis_session::RedisStore;
use crate::repositories::session::{MemoryStore, SessionStore};
use crate::services::session::{ManagerConfiguration, SessionManager};
use crate::services::users::UserDirectory;

/// Username of the account seeded at startup.
pub const ADMIN_USERNAME: &str = "admin";

const GENERATED_PASSWORD_LEN: usize = 20;

/// The application's shared services.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Seals session cookies and CSRF tokens.
    pub cypher: Arc<dyn Cypher>,
    pub sessions: Arc<SessionManager>,
    pub csrf: Arc<Csrf>,
    pub users: Arc<UserDirectory>,
}

impl AppState {
    /// Creates a new `AppState` with production password hashing.
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_hasher(config, Arc::new(Argon2Hasher::new()?)).await
    }

    /// Creates a new `AppState` and seeds the `admin` account.
    pub async fn with_hasher(config: &Config, hasher: Arc<dyn Hasher>) -> Result<Self> {
        let cypher: Arc<dyn Cypher> = Arc::new(Aes256Cypher::new(&config.cypher_key));

        let store: Arc<dyn SessionStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url).await?),
            None => {
                tracing::info!("✅ In-memory session store initialized");
                Arc::new(MemoryStore::new())
            }
        };

        let sessions = Arc::new(SessionManager::new(
            store,
            config.session_ttl,
            cypher.clone(),
            ManagerConfiguration {
                secure: config.cookie_secure,
                invalidate: config.session_renewal,
            },
        ));
        tracing::info!("✅ Session manager initialized (ttl: {:?})", sessions.ttl());

        let csrf = Arc::new(Csrf::new(config.csrf_ttl, cypher.clone()));
        let users = Arc::new(UserDirectory::new(hasher));

        let password = match &config.admin_password {
            Some(password) => password.clone(),
            None => {
                let password = Zeroizing::new(generate_random_password(GENERATED_PASSWORD_LEN));
                tracing::warn!(
                    "⚠️ ADMIN_PASSWORD not set, generated password for '{}': {}",
                    ADMIN_USERNAME,
                    password.as_str()
                );
                password
            }
        };
        users
            .create_user("Administrator", ADMIN_USERNAME, &password, vec![Role::Admin, Role::User])
            .await?;
        tracing::info!("✅ User directory initialized");

        Ok(AppState {
            config: config.clone(),
            cypher,
            sessions,
            csrf,
            users,
        })
    }
}
