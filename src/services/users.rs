use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use crate::crypto::hash::Hasher;
use crate::error::{AppError, Result};
use crate::models::user::{Role, User};

struct Account {
    user: User,
    password_hash: String,
}

/// In-memory user accounts with hashed passwords.
pub struct UserDirectory {
    hasher: Arc<dyn Hasher>,
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicI64,
}

impl UserDirectory {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self {
            hasher,
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Creates a new user.
    pub async fn create_user(
        &self,
        name: &str,
        username: &str,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<User> {
        tracing::debug!("🔐 Creating user: {}", username);
        let password_hash = self.hasher.hash(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(username) {
            return Err(AppError::Validation("Username is already taken".to_string()));
        }

        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            roles,
            avatar: String::new(),
        };
        accounts.insert(
            username.to_string(),
            Account {
                user: user.clone(),
                password_hash,
            },
        );

        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Authenticates a user.
    pub async fn authenticate_user(&self, username: &str, password: &str) -> Result<User> {
        tracing::debug!("🔐 Authenticating user: {}", username);
        let accounts = self.accounts.read().await;

        let account = accounts
            .get(username)
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !self.hasher.check(password, &account.password_hash) {
            return Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        tracing::info!("✅ User authenticated: {}", account.user.id);
        Ok(account.user.clone())
    }

    /// Changes a user's password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let username = self.username_of(user_id).await?;
        self.authenticate_user(&username, old_password).await?;
        let new_hash = self.hasher.hash(new_password)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&username)
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;
        account.password_hash = new_hash;

        tracing::info!("✅ Password changed for user: {}", account.user.id);
        Ok(())
    }

    async fn username_of(&self, user_id: i64) -> Result<String> {
        let accounts = self.accounts.read().await;
        accounts
            .iter()
            .find(|(_, account)| account.user.id == user_id)
            .map(|(username, _)| username.clone())
            .ok_or_else(|| AppError::Authentication("Unknown user".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Argon2Hasher;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap()))
    }

    #[tokio::test]
    async fn registered_users_can_authenticate() {
        let users = directory();
        let created = users
            .create_user("Ana", "ana", "s3cret-pass", vec![Role::User])
            .await
            .unwrap();

        let found = users.authenticate_user("ana", "s3cret-pass").await.unwrap();
        assert_eq!(found, created);
        assert!(users.authenticate_user("ana", "wrong-pass").await.is_err());
        assert!(users.authenticate_user("bob", "s3cret-pass").await.is_err());
    }

    #[tokio::test]
    async fn usernames_are_unique_and_ids_increase() {
        let users = directory();
        let a = users.create_user("A", "a", "password1", vec![]).await.unwrap();
        let b = users.create_user("B", "b", "password2", vec![]).await.unwrap();
        assert!(b.id > a.id);
        assert!(users.create_user("A2", "a", "password3", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn password_changes_require_the_old_password() {
        let users = directory();
        let ana = users.create_user("Ana", "ana", "old-password", vec![]).await.unwrap();

        assert!(users.change_password(ana.id, "bad", "new-password").await.is_err());
        assert!(users.change_password(ana.id + 1, "old-password", "new-password").await.is_err());
        users.change_password(ana.id, "old-password", "new-password").await.unwrap();

        assert!(users.authenticate_user("ana", "old-password").await.is_err());
        assert!(users.authenticate_user("ana", "new-password").await.is_ok());
    }
}
