//! Auth service - user registration, password login and sessions
//!
//! Passwords are stored as Argon2id PHC strings
//! (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`), which carry their own
//! parameters, so costs can change without invalidating existing users.
//!
//! Sessions are opaque random tokens held in memory; a restart logs
//! everybody out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::domain::{Id, NewUser, User};
use crate::ports::Repository;

const TOKEN_LEN: usize = 32;

/// Hashed in place of a real password when the username is unknown
const DUMMY_PASSWORD: &str = "finboard-unknown-user";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password into its stored PHC form
pub fn hash_password(password: &str, params: PasswordParams) -> Result<String> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        None,
    )
    .map_err(|e| Error::Other(format!("Failed to create argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against its stored form
///
/// Parameters come from the stored hash. A malformed hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Id,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session store with a fixed lifetime per session
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24)),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    pub fn create(&self, user_id: Id) -> Result<Session> {
        self.create_at(user_id, Utc::now())
    }

    fn create_at(&self, user_id: Id, now: DateTime<Utc>) -> Result<Session> {
        let bytes: [u8; TOKEN_LEN] = rand::thread_rng().gen();
        let session = Session {
            token: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes),
            user_id,
            expires_at: now + self.ttl,
        };
        self.sessions()?
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// User behind a live session; expired sessions are removed on sight
    pub fn resolve(&self, token: &str) -> Result<Option<Id>> {
        self.resolve_at(token, Utc::now())
    }

    fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Id>> {
        let mut sessions = self.sessions()?;
        let entry = sessions
            .get(token)
            .map(|session| (session.user_id, session.expires_at > now));
        match entry {
            Some((user_id, true)) => Ok(Some(user_id)),
            Some((_, false)) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, token: &str) -> Result<bool> {
        Ok(self.sessions()?.remove(token).is_some())
    }

    /// Drop every expired session, returning how many were removed
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(Utc::now())
    }

    fn prune_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions()?;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.sessions()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Auth service for users and sessions
pub struct AuthService {
    repository: Arc<dyn Repository>,
    sessions: SessionStore,
    params: PasswordParams,
    /// Verified against for unknown usernames, so both login paths pay for Argon2
    dummy_hash: OnceLock<String>,
}

impl AuthService {
    pub fn new(repository: Arc<dyn Repository>, session_ttl: Duration) -> Self {
        Self::with_params(repository, session_ttl, PasswordParams::default())
    }

    pub fn with_params(
        repository: Arc<dyn Repository>,
        session_ttl: Duration,
        params: PasswordParams,
    ) -> Self {
        Self {
            repository,
            sessions: SessionStore::new(session_ttl),
            params,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Create a user and log them in
    pub async fn register(&self, username: &str, password: &str) -> Result<(User, Session)> {
        let username = NewUser::normalize_username(username);
        if password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }
        if username.is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }
        if self.repository.get_user_by_username(&username).await?.is_some() {
            return Err(Error::conflict("Username already exists"));
        }

        let password_hash = self.hash(password).await?;
        let new_user = NewUser::new(username, password_hash);
        new_user.validate().map_err(Error::validation)?;

        let user = self.repository.create_user(new_user).await?;
        let session = self.sessions.create(user.id)?;
        info!(user = user.id, "registered user");
        Ok((user, session))
    }

    /// Check credentials and open a session
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, Session)> {
        let username = NewUser::normalize_username(username);
        let user = self.repository.get_user_by_username(&username).await?;

        let stored = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash().await?,
        };
        let candidate = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored))
            .await
            .map_err(|e| Error::Other(format!("password check failed: {}", e)))?;
        let user = match user {
            Some(user) if valid => user,
            _ => return Err(Error::auth("Invalid username or password")),
        };

        let session = self.sessions.create(user.id)?;
        debug!(user = user.id, "login");
        Ok((user, session))
    }

    pub fn logout(&self, token: &str) -> Result<bool> {
        self.sessions.remove(token)
    }

    pub fn resolve(&self, token: &str) -> Result<Option<Id>> {
        self.sessions.resolve(token)
    }

    /// The user behind a session token
    pub async fn current_user(&self, token: &str) -> Result<User> {
        let user_id = self
            .resolve(token)?
            .ok_or_else(|| Error::auth("Not authenticated"))?;
        self.repository
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::auth("Not authenticated"))
    }

    pub fn prune_expired(&self) -> Result<usize> {
        self.sessions.prune_expired()
    }

    async fn dummy_hash(&self) -> Result<String> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = self.hash(DUMMY_PASSWORD).await?;
        // Concurrent first callers may race; any of their hashes will do
        let _ = self.dummy_hash.set(hash.clone());
        Ok(hash)
    }

    // Argon2 is CPU bound; keep it off the async workers
    async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let params = self.params;
        tokio::task::spawn_blocking(move || hash_password(&password, params))
            .await
            .map_err(|e| Error::Other(format!("password hashing failed: {}", e)))?
    }
}
