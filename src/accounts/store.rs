//! User accounts backed by the `users` table.

use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;

use super::password::{fingerprint, hash_password, verify_password};
use super::reset::ResetTokens;
use crate::db::Database;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("an account with this username already exists")]
    DuplicateUsername,

    #[error("failed to sign reset token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Hash(pbkdf2::password_hash::Error),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A registered user. The password field holds the salted hash only.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
        })
    }
}

const SELECT_USER: &str = "SELECT id, username, email, password FROM users";

/// Credential store: user rows plus reset token issuing.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
    tokens: ResetTokens,
    rounds: u32,
}

impl UserStore {
    pub fn new(db: Database, tokens: ResetTokens, rounds: u32) -> Self {
        Self { db, tokens, rounds }
    }

    /// Create an account. Username and email must both be unused.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        let username = username.trim();
        let email = email.trim();
        let password_hash = self.hash(password).await?;

        let conn = self.db.lock().await;
        if exists(&conn, "SELECT 1 FROM users WHERE username = ?1", username)? {
            return Err(AccountError::DuplicateUsername);
        }
        if exists(&conn, "SELECT 1 FROM users WHERE email = ?1", email)? {
            return Err(AccountError::DuplicateEmail);
        }

        conn.execute(
            "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
            params![username, email, password_hash],
        )
        .map_err(map_unique_violation)?;

        let user = User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };
        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check an email/password pair. `None` covers both an unknown email and a
    /// wrong password; callers report a single generic failure.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AccountError> {
        let Some(user) = self.find_by_email(email).await? else {
            // Burn the same work as a real check so timing does not reveal the account.
            self.hash(password).await?;
            return Ok(None);
        };

        if self.verify(password, &user.password_hash).await? {
            Ok(Some(user))
        } else {
            tracing::debug!("Password mismatch for user {}", user.id);
            Ok(None)
        }
    }

    /// Hashing is CPU bound, so it runs off the async workers.
    async fn hash(&self, password: &str) -> Result<String, AccountError> {
        let password = password.to_string();
        let rounds = self.rounds;
        tokio::task::spawn_blocking(move || hash_password(&password, rounds))
            .await?
            .map_err(AccountError::Hash)
    }

    async fn verify(&self, password: &str, stored: &str) -> Result<bool, AccountError> {
        let password = password.to_string();
        let stored = stored.to_string();
        Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, AccountError> {
        let conn = self.db.lock().await;
        let user = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_USER),
                params![id],
                User::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Lookup ignores case, matching the column collation.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let conn = self.db.lock().await;
        let user = conn
            .query_row(
                &format!("{} WHERE email = ?1", SELECT_USER),
                params![email.trim()],
                User::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Replace the stored hash. Outstanding reset tokens stop verifying.
    pub async fn set_password(&self, user: &User, password: &str) -> Result<User, AccountError> {
        let password_hash = self.hash(password).await?;
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2",
            params![password_hash, user.id],
        )?;
        tracing::info!("Password changed for user {}", user.id);
        Ok(User {
            password_hash,
            ..user.clone()
        })
    }

    pub fn issue_reset_token(&self, user: &User) -> Result<String, AccountError> {
        Ok(self
            .tokens
            .issue(user.id, &fingerprint(&user.password_hash))?)
    }

    /// Resolve a reset token to the user it was issued for, if it is still valid.
    pub async fn verify_reset_token(&self, token: &str) -> Result<Option<User>, AccountError> {
        let Some(verified) = self.tokens.verify(token) else {
            return Ok(None);
        };
        let Some(user) = self.get(verified.user_id).await? else {
            return Ok(None);
        };
        if fingerprint(&user.password_hash) != verified.fingerprint {
            tracing::debug!("Reset token for user {} predates a password change", user.id);
            return Ok(None);
        }
        Ok(Some(user))
    }
}

fn exists(conn: &rusqlite::Connection, sql: &str, value: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(sql, params![value], |_| Ok(()))
        .optional()?
        .is_some())
}

/// A concurrent registration can slip past the pre-checks; the UNIQUE
/// constraints still catch it.
fn map_unique_violation(err: rusqlite::Error) -> AccountError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.email") {
                return AccountError::DuplicateEmail;
            }
            if msg.contains("users.username") {
                return AccountError::DuplicateUsername;
            }
        }
    }
    AccountError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        let db = Database::open_in_memory().unwrap();
        UserStore::new(db, ResetTokens::new("test-secret", 1800), 1_000)
    }

    async fn user_count(store: &UserStore) -> i64 {
        let conn = store.db.lock().await;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let store = store();
        let user = store.register("u1", "e1@x.com", "pw1").await.unwrap();
        assert_eq!(user.username, "u1");
        assert_ne!(user.password_hash, "pw1");

        let found = store.authenticate("e1@x.com", "pw1").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(store.authenticate("e1@x.com", "wrong").await.unwrap().is_none());
        assert!(store.authenticate("nobody@x.com", "pw1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = store();
        store.register("u1", "e1@x.com", "pw1").await.unwrap();

        let err = store.register("u2", "e1@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));

        let err = store.register("u3", "E1@X.COM", "pw3").await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));

        assert_eq!(user_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = store();
        store.register("u1", "e1@x.com", "pw1").await.unwrap();
        let err = store.register("u1", "e2@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername));
        assert_eq!(user_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_unique_violation_mapping() {
        let store = store();
        store.register("u1", "e1@x.com", "pw1").await.unwrap();
        let conn = store.db.lock().await;
        let err = conn
            .execute(
                "INSERT INTO users (username, email, password) VALUES ('u2', 'e1@x.com', 'h')",
                [],
            )
            .unwrap_err();
        assert!(matches!(map_unique_violation(err), AccountError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_only_last_password_authenticates() {
        let store = store();
        let user = store.register("u1", "e1@x.com", "old").await.unwrap();
        store.set_password(&user, "new").await.unwrap();

        assert!(store.authenticate("e1@x.com", "old").await.unwrap().is_none());
        assert!(store.authenticate("e1@x.com", "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reset_token_is_bound_to_user() {
        let store = store();
        let a = store.register("a", "a@x.com", "pw").await.unwrap();
        let b = store.register("b", "b@x.com", "pw").await.unwrap();

        let token = store.issue_reset_token(&a).unwrap();
        let resolved = store.verify_reset_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved.id, a.id);
        assert_ne!(resolved.id, b.id);
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let store = store();
        let user = store.register("u1", "e1@x.com", "pw").await.unwrap();
        let token = store.issue_reset_token(&user).unwrap();

        let user = store.verify_reset_token(&token).await.unwrap().unwrap();
        store.set_password(&user, "changed").await.unwrap();

        assert!(store.verify_reset_token(&token).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_runtime_responsive() {
        let db = Database::open_in_memory().unwrap();
        let store = UserStore::new(db, ResetTokens::new("test-secret", 1800), 200_000);
        store.register("u1", "e1@x.com", "pw").await.unwrap();

        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..5 {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                ticks += 1;
            }
            ticks
        });
        let found = store.authenticate("e1@x.com", "pw").await.unwrap();
        assert!(found.is_some());
        // The ticker ran to completion while the hash was computed elsewhere.
        assert!(ticker.is_finished());
        assert_eq!(ticker.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_user_debug_hides_hash() {
        let store = store();
        let user = store.register("u1", "e1@x.com", "pw").await.unwrap();
        let printed = format!("{:?}", user);
        assert!(printed.contains("u1"));
        assert!(!printed.contains(&user.password_hash));
    }
}
