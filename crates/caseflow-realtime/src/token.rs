//! Bearer token storage
//!
//! The socket authenticates with a bearer token kept under a single
//! well-known key. In a browser that is local storage; here it is a trait so
//! the CLI can keep it in a file and tests can keep it in memory.

use crate::error::TransportError;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::path::PathBuf;

/// Where the bearer token lives
pub trait TokenStore: Send + Sync + Debug {
    /// Current token, if any
    fn token(&self) -> Option<String>;

    /// Replace or clear the token
    ///
    /// # Errors
    /// `TransportError::TokenStore` if the backing storage cannot be written.
    fn set_token(&self, token: Option<String>) -> Result<(), TransportError>;
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Create a store holding `token`
    #[inline]
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set_token(&self, token: Option<String>) -> Result<(), TransportError> {
        *self.token.write() = token;
        Ok(())
    }
}

/// Token kept in a file; read on every access so external rotation is seen
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("could not read token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set_token(&self, token: Option<String>) -> Result<(), TransportError> {
        let result = match token {
            Some(token) => std::fs::write(&self.path, token),
            None => match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        result.map_err(|e| TransportError::TokenStore(e.to_string()))
    }
}
