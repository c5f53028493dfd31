use chrono::Utc;
use futures::future::BoxFuture;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::SessionError;
use crate::models::session::{Entry, SessionId};
use crate::repositories::session::SessionStore;

/// Drops every session of `KEYS[1]`, then stores `ARGV[1]` under `KEYS[2]`
/// for `ARGV[2]` seconds and records its id `ARGV[3]`.
const REPLACE_FOR_USER: &str = r#"
for _, id in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    redis.call('DEL', 'session:' .. id)
end
redis.call('DEL', KEYS[1])
redis.call('SET', KEYS[2], ARGV[1], 'EX', ARGV[2])
redis.call('SADD', KEYS[1], ARGV[3])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return redis.status_reply('OK')
"#;

/// [`SessionStore`] persisted in Redis.
///
/// Each entry lives under `session:{id}` with a Redis TTL matching its
/// expiry, so an expired entry is never returned by `get`. The ids of a
/// principal are tracked in the set `user_sessions:{user_id}`.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Connects to `url` and wraps the connection manager.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis session store connected");
        Ok(Self::new(redis))
    }

    fn entry_key(id: &SessionId) -> String {
        format!("session:{}", id)
    }

    fn user_key(user_id: i64) -> String {
        format!("user_sessions:{}", user_id)
    }
}

impl SessionStore for RedisStore {
    fn save(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let ttl = (entry.expires_at - Utc::now()).num_seconds().max(1);
            let json = sonic_rs::to_string(&entry)
                .map_err(|e| SessionError::Serialization(e.to_string()))?;
            let user_key = Self::user_key(entry.user.id);

            let _: () = redis::pipe()
                .atomic()
                .set_ex(Self::entry_key(&entry.id), json, ttl as u64)
                .ignore()
                .sadd(&user_key, entry.id.as_str())
                .ignore()
                .expire(&user_key, ttl)
                .ignore()
                .query_async(&mut self.redis.clone())
                .await?;

            tracing::debug!("Session saved to Redis for user {}", entry.user.id);
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<Entry, SessionError>> {
        Box::pin(async move {
            let json: Option<String> = self.redis.clone().get(Self::entry_key(id)).await?;
            let json = json.ok_or_else(|| SessionError::EntryNotFound(id.to_string()))?;
            sonic_rs::from_str(&json).map_err(|e| SessionError::Serialization(e.to_string()))
        })
    }

    fn delete<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let _: () = self.redis.clone().del(Self::entry_key(id)).await?;
            Ok(())
        })
    }

    fn invalidate(&self, user_id: i64) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let user_key = Self::user_key(user_id);
            let mut redis = self.redis.clone();
            let ids: Vec<String> = redis.smembers(&user_key).await?;
            if ids.is_empty() {
                return Ok(());
            }

            // Remove only the ids read above; a save racing with us keeps its id.
            let mut pipe = redis::pipe();
            pipe.atomic();
            for id in &ids {
                pipe.del(format!("session:{}", id)).ignore();
                pipe.srem(&user_key, id).ignore();
            }
            let _: () = pipe.query_async(&mut redis).await?;

            tracing::debug!("Invalidated {} session(s) for user {}", ids.len(), user_id);
            Ok(())
        })
    }

    fn replace_for_user(&self, entry: Entry) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let ttl = (entry.expires_at - Utc::now()).num_seconds().max(1);
            let json = sonic_rs::to_string(&entry)
                .map_err(|e| SessionError::Serialization(e.to_string()))?;

            // One script runs without interleaving, so no save slips between the reads and writes.
            let _: () = redis::Script::new(REPLACE_FOR_USER)
                .key(Self::user_key(entry.user.id))
                .key(Self::entry_key(&entry.id))
                .arg(json)
                .arg(ttl)
                .arg(entry.id.as_str())
                .invoke_async(&mut self.redis.clone())
                .await?;

            tracing::debug!("Sessions replaced in Redis for user {}", entry.user.id);
            Ok(())
        })
    }

    fn recollect_garbage(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        // Redis expires entries on its own.
        Box::pin(async { Ok(()) })
    }
}
