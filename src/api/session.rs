//! Cookie sessions and flash messages.
//!
//! The browser holds only a random session id in an HttpOnly cookie. The
//! server keeps the bound user id, pending flash messages, and an expiry
//! instant in memory. Sessions do not survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tower_cookies::cookie::{time, SameSite};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use super::error::AppError;
use super::routes::AppState;
use crate::accounts::{User, UserStore};
use crate::config::SessionConfig;

pub const SESSION_COOKIE: &str = "todo_session";

/// Visual category of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone)]
struct SessionData {
    user_id: Option<i64>,
    flashes: Vec<Flash>,
    expires_at: DateTime<Utc>,
}

/// Server-side session records, bounded to `capacity` entries.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Store a new record. Expired records go first; when the store is still
    /// full, anonymous records are evicted before signed-in ones, soonest
    /// expiry first.
    async fn create(&self, data: SessionData) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        while sessions.len() >= self.capacity {
            let Some(victim) = sessions
                .iter()
                .min_by_key(|(_, s)| (s.user_id.is_some(), s.expires_at))
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&victim);
        }
        sessions.insert(id.clone(), data);
        id
    }

    /// Whether `id` names a live session. Expired records are dropped.
    async fn is_live(&self, id: &str) -> bool {
        let now = Utc::now();
        let expired = match self.sessions.read().await.get(id) {
            Some(s) => s.expires_at <= now,
            None => return false,
        };
        if expired {
            self.sessions.write().await.remove(id);
        }
        !expired
    }

    async fn user_id(&self, id: &str) -> Option<i64> {
        self.sessions.read().await.get(id).and_then(|s| s.user_id)
    }

    async fn push_flash(&self, id: &str, flash: Flash) -> bool {
        match self.sessions.write().await.get_mut(id) {
            Some(s) => {
                s.flashes.push(flash);
                true
            }
            None => false,
        }
    }

    /// Drain flashes. An anonymous record has nothing left after that and is dropped.
    async fn take_flashes(&self, id: &str) -> Vec<Flash> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Vec::new();
        };
        let flashes = std::mem::take(&mut session.flashes);
        if session.user_id.is_none() {
            sessions.remove(id);
        }
        flashes
    }

    async fn remove(&self, id: &str) -> Option<SessionData> {
        self.sessions.write().await.remove(id)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

/// The caller's session, extracted per request.
pub struct Session {
    id: Option<String>,
    cookies: Cookies,
    store: SharedSessionStore,
    config: SessionConfig,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await?;
        let store = Arc::clone(&state.sessions);

        let mut id = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string());
        if let Some(existing) = id.as_deref() {
            if !store.is_live(existing).await {
                id = None;
            }
        }

        Ok(Self {
            id,
            cookies,
            store,
            config: state.config.session.clone(),
        })
    }
}

impl Session {
    /// Id of the user bound to this session, if any.
    pub async fn user_id(&self) -> Option<i64> {
        match self.id.as_deref() {
            Some(id) => self.store.user_id(id).await,
            None => None,
        }
    }

    /// The authenticated user, re-read from the credential store.
    pub async fn current_user(
        &self,
        users: &UserStore,
    ) -> Result<Option<User>, crate::accounts::AccountError> {
        match self.user_id().await {
            Some(user_id) => users.get(user_id).await,
            None => Ok(None),
        }
    }

    /// Like `current_user`, but an anonymous session is an error.
    pub async fn require_user(&self, users: &UserStore) -> Result<User, AppError> {
        self.current_user(users)
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    /// Bind `user` to a fresh session id. Pending flashes carry over; the
    /// previous id is discarded so a pre-login id cannot be reused.
    pub async fn login(&mut self, user: &User, remember: bool) {
        let flashes = match self.id.take() {
            Some(old) => self
                .store
                .remove(&old)
                .await
                .map(|s| s.flashes)
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let lifetime = if remember {
            Duration::days(self.config.remember_days)
        } else {
            Duration::hours(self.config.ttl_hours)
        };
        let id = self
            .store
            .create(SessionData {
                user_id: Some(user.id),
                flashes,
                expires_at: Utc::now() + lifetime,
            })
            .await;

        let max_age = remember.then(|| time::Duration::days(self.config.remember_days));
        self.set_cookie(&id, max_age);
        self.id = Some(id);
        tracing::info!("User {} logged in (remember={})", user.id, remember);
    }

    /// Drop the session entirely and clear the cookie.
    pub async fn logout(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(data) = self.store.remove(&id).await {
                if let Some(user_id) = data.user_id {
                    tracing::info!("User {} logged out", user_id);
                }
            }
        }
        self.cookies.remove(Cookie::build(SESSION_COOKIE).path("/").into());
    }

    /// Queue a message for the next rendered page.
    pub async fn flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        let flash = Flash {
            kind,
            message: message.into(),
        };
        if let Some(id) = self.id.as_deref() {
            if self.store.push_flash(id, flash.clone()).await {
                return;
            }
        }

        let id = self
            .store
            .create(SessionData {
                user_id: None,
                flashes: vec![flash],
                expires_at: Utc::now() + Duration::minutes(self.config.flash_ttl_minutes),
            })
            .await;
        self.set_cookie(&id, None);
        self.id = Some(id);
    }

    /// Drain pending flash messages.
    pub async fn take_flashes(&mut self) -> Vec<Flash> {
        match self.id.as_deref() {
            Some(id) => self.store.take_flashes(id).await,
            None => Vec::new(),
        }
    }

    fn set_cookie(&self, id: &str, max_age: Option<time::Duration>) {
        let mut cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie);
        if let Some(max_age) = max_age {
            cookie = cookie.max_age(max_age);
        }
        self.cookies.add(cookie.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(user_id: Option<i64>, expires_in: Duration) -> SessionData {
        SessionData {
            user_id,
            flashes: Vec::new(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_flashes_drain_once() {
        let store = SessionStore::new(100);
        let id = store.create(data(None, Duration::hours(1))).await;

        assert!(
            store
                .push_flash(
                    &id,
                    Flash {
                        kind: FlashKind::Info,
                        message: "hello".to_string(),
                    },
                )
                .await
        );
        let flashes = store.take_flashes(&id).await;
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].kind.as_str(), "info");
        assert!(store.take_flashes(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_not_live() {
        let store = SessionStore::new(100);
        let live = store.create(data(Some(1), Duration::hours(1))).await;
        let dead = store.create(data(Some(2), Duration::seconds(-1))).await;

        assert!(store.is_live(&live).await);
        assert!(!store.is_live(&dead).await);
        assert!(!store.is_live("missing").await);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.user_id(&live).await, Some(1));
    }

    #[tokio::test]
    async fn test_create_purges_expired() {
        let store = SessionStore::new(100);
        store.create(data(None, Duration::seconds(-5))).await;
        store.create(data(None, Duration::seconds(-5))).await;
        store.create(data(None, Duration::hours(1))).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_is_bounded() {
        let store = SessionStore::new(10);
        let signed_in = store.create(data(Some(1), Duration::hours(1))).await;
        for _ in 0..500 {
            store.create(data(None, Duration::minutes(10))).await;
        }
        assert_eq!(store.len().await, 10);
        assert!(store.is_live(&signed_in).await);
    }

    #[tokio::test]
    async fn test_anonymous_session_dropped_once_drained() {
        let store = SessionStore::new(100);
        let anonymous = store.create(data(None, Duration::minutes(10))).await;
        let signed_in = store.create(data(Some(1), Duration::hours(1))).await;

        store.take_flashes(&anonymous).await;
        store.take_flashes(&signed_in).await;
        assert!(!store.is_live(&anonymous).await);
        assert!(store.is_live(&signed_in).await);
    }

    #[tokio::test]
    async fn test_push_flash_to_unknown_session_fails() {
        let store = SessionStore::new(100);
        let pushed = store
            .push_flash(
                "missing",
                Flash {
                    kind: FlashKind::Danger,
                    message: "x".to_string(),
                },
            )
            .await;
        assert!(!pushed);
        assert_eq!(store.len().await, 0);
    }
}
