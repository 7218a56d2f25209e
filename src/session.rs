use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use dashmap::DashMap;
use ulid::Ulid;

use crate::limits::MAX_SESSIONS;
use crate::model::Actor;

#[derive(Debug, Clone)]
pub struct Session {
    pub actor: Actor,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginError {
    MissingFields,
    InvalidCredentials,
    TooManySessions,
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginError::MissingFields => write!(f, "informe nome, e-mail e senha"),
            LoginError::InvalidCredentials => write!(f, "usuário ou senha inválidos"),
            LoginError::TooManySessions => write!(f, "limite de sessões atingido"),
        }
    }
}

impl std::error::Error for LoginError {}

/// Expiring bearer tokens for staff. Decisions receive the resolved `Actor`
/// explicitly — no ambient session state reaches the engine. Tokens are
/// checked lazily on resolve and swept by the background reaper.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    staff_password: String,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(staff_password: String, ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            staff_password,
            ttl,
        }
    }

    /// Validate the configured staff password (constant-time compare) and
    /// issue a fresh token bound to the supplied identity.
    pub fn login(&self, name: &str, email: &str, password: &str) -> Result<IssuedToken, LoginError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(LoginError::MissingFields);
        }
        if !constant_time_eq(password.as_bytes(), self.staff_password.as_bytes()) {
            metrics::counter!(crate::observability::LOGIN_FAILURES_TOTAL).increment(1);
            return Err(LoginError::InvalidCredentials);
        }
        if self.sessions.len() >= MAX_SESSIONS {
            return Err(LoginError::TooManySessions);
        }

        let token = Ulid::new().to_string();
        let expires_at = Utc::now() + self.ttl;
        self.sessions.insert(
            token.clone(),
            Session {
                actor: Actor { name: name.to_string(), email: email.to_string() },
                expires_at,
            },
        );
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        Ok(IssuedToken { token, expires_at })
    }

    /// Resolve a bearer token to its actor. Expired tokens resolve to
    /// nothing even before the reaper sweeps them.
    pub fn resolve(&self, token: &str) -> Option<Actor> {
        let entry = self.sessions.get(token)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.actor.clone())
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        removed
    }

    /// Drop every session expired at `now`. Returns how many were purged.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        let purged = before - self.sessions.len();
        if purged > 0 {
            metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        }
        purged
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
