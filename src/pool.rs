//! Credential pool manager
//!
//! Authenticates upstream account credentials ("profiles"), keeps only the
//! valid ones, and round-robins selection across sessions. The pool is
//! rebuilt wholesale on every refresh and published atomically; between
//! refreshes it is immutable, so readers see either the old or the new
//! pool, never a half-built one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::errors::PoolError;
use crate::resolver::UpstreamApi;

/// One credential pair from configuration, in `user:pass` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse a `user:pass` string; passwords may themselves contain colons.
    pub fn parse(raw: &str) -> Option<Self> {
        let (username, password) = raw.split_once(':')?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// An authenticated upstream profile.
#[derive(Debug)]
pub struct Profile {
    pub username: String,
    pub password: String,
    /// Session identifier; present only after successful authentication.
    pub sid: String,
    usage: AtomicU64,
}

impl Profile {
    pub fn usage_count(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }
}

/// Immutable ordered list of valid profiles plus a rotation cursor.
pub struct CredentialPool {
    profiles: Vec<Arc<Profile>>,
    cursor: Mutex<usize>,
}

impl CredentialPool {
    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
            cursor: Mutex::new(0),
        }
    }

    fn from_profiles(profiles: Vec<Arc<Profile>>) -> Self {
        Self {
            profiles,
            cursor: Mutex::new(0),
        }
    }

    /// Return the profile at the cursor and advance circularly, bumping the
    /// selected profile's usage counter.
    pub fn next(&self) -> Result<Arc<Profile>, PoolError> {
        if self.profiles.is_empty() {
            return Err(PoolError::Empty);
        }
        let mut cursor = self.cursor.lock().expect("pool cursor lock poisoned");
        let profile = Arc::clone(&self.profiles[*cursor]);
        *cursor = (*cursor + 1) % self.profiles.len();
        profile.usage.fetch_add(1, Ordering::Relaxed);
        Ok(profile)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Owns the published pool and rebuilds it on refresh.
pub struct SessionPool {
    published: RwLock<Arc<CredentialPool>>,
}

impl SessionPool {
    /// Start with an empty pool; `refresh` populates it at startup.
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Arc::new(CredentialPool::empty())),
        }
    }

    /// Snapshot of the currently published pool.
    pub async fn pool(&self) -> Arc<CredentialPool> {
        Arc::clone(&*self.published.read().await)
    }

    /// Round-robin selection from the current pool.
    pub async fn next(&self) -> Result<Arc<Profile>, PoolError> {
        self.pool().await.next()
    }

    pub async fn len(&self) -> usize {
        self.pool().await.len()
    }

    /// Authenticate every credential pair and publish a fresh pool holding
    /// only the valid profiles. One rejected login never aborts the rest;
    /// the previous pool stays published until the new one is complete.
    pub async fn refresh(&self, api: &UpstreamApi, credentials: &[Credentials]) {
        let mut profiles: Vec<Arc<Profile>> = Vec::with_capacity(credentials.len());

        for cred in credentials {
            match api.login(&cred.username, &cred.password).await {
                Ok(sid) => {
                    profiles.push(Arc::new(Profile {
                        username: cred.username.clone(),
                        password: cred.password.clone(),
                        sid,
                        usage: AtomicU64::new(0),
                    }));
                }
                Err(e) => {
                    warn!(username = %cred.username, error = %e, "profile login rejected, dropping from pool");
                }
            }
        }

        if profiles.is_empty() {
            error!("credential pool refresh produced zero valid profiles");
        } else {
            info!(profiles = profiles.len(), "credential pool refreshed");
        }

        *self.published.write().await = Arc::new(CredentialPool::from_profiles(profiles));
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}
