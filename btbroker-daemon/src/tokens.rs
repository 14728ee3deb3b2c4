/*!
 * Token store
 * Username → shared secret pairs gating the HTTP API, persisted in sled
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use subtle::ConstantTimeEq;
use thiserror::Error;

const TOKENS_TREE: &str = "user_tokens";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub username: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("username {0} already exists")]
    Conflict(String),
    #[error("token for {0} not found")]
    NotFound(String),
    #[error("token storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("corrupt token record: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(Clone)]
pub struct TokenStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl TokenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_db(sled::open(path)?)
    }

    /// In-memory store removed on drop; used by tests and dry runs.
    pub fn open_temporary() -> Result<Self> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(TOKENS_TREE)?;
        Ok(Self { db, tree })
    }

    pub fn create(&self, username: &str, token: &str) -> Result<Token> {
        let record = Token {
            username: username.to_string(),
            token: token.to_string(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record)?;

        // Insert only if absent, so two concurrent creates cannot both win.
        if self
            .tree
            .compare_and_swap(username.as_bytes(), None::<&[u8]>, Some(bytes))?
            .is_err()
        {
            return Err(TokenError::Conflict(username.to_string()));
        }
        self.tree.flush()?;

        tracing::info!("Created token for {}", username);
        Ok(record)
    }

    /// All tokens, newest first.
    pub fn list(&self) -> Result<Vec<Token>> {
        let mut tokens = self
            .tree
            .iter()
            .values()
            .map(|value| Ok(serde_json::from_slice::<Token>(&value?)?))
            .collect::<Result<Vec<_>>>()?;
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    pub fn get(&self, username: &str) -> Result<Option<Token>> {
        match self.tree.get(username.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, username: &str) -> Result<()> {
        if self.tree.remove(username.as_bytes())?.is_none() {
            return Err(TokenError::NotFound(username.to_string()));
        }
        self.tree.flush()?;
        tracing::info!("Deleted token for {}", username);
        Ok(())
    }

    /// Checks a Basic-auth credential pair against the store.
    pub fn verify(&self, username: &str, secret: &str) -> Result<bool> {
        Ok(self.get(username)?.is_some_and(|stored| {
            let (stored, given) = (stored.token.as_bytes(), secret.as_bytes());
            stored.len() == given.len() && bool::from(stored.ct_eq(given))
        }))
    }

    /// Readiness probe: touches the underlying database.
    pub fn ping(&self) -> Result<()> {
        self.db.size_on_disk()?;
        Ok(())
    }
}
