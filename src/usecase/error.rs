use thiserror::Error;

use crate::repository::errors::RepositoryError;

pub const LOAD_FAILED: &str = "Failed to load comments";
pub const SAVE_FAILED: &str = "Failed to save comments";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Failed to load comments: {0}")]
    Load(String),

    #[error("Failed to save comments: {0}")]
    Save(String),
}

impl StoreError {
    pub fn load(e: RepositoryError) -> Self {
        StoreError::Load(e.to_string())
    }

    pub fn save(e: RepositoryError) -> Self {
        StoreError::Save(e.to_string())
    }

    /// Message shown to the user; the underlying cause stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Load(_) => LOAD_FAILED,
            StoreError::Save(_) => SAVE_FAILED,
        }
    }
}
