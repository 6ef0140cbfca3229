use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

/// A comment in tree form. `replies` are ordered newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn new(text: &str, parent_id: Option<CommentId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.trim().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            parent_id,
            replies: Vec::new(),
        }
    }

    /// Storage form of this node alone, with `parent_id` taken from the node.
    pub fn to_record(&self) -> CommentRecord {
        CommentRecord {
            id: self.id,
            text: self.text.clone(),
            timestamp: self.timestamp,
            parent_id: self.parent_id,
        }
    }
}

/// Flat storage form of a comment. The tree is rebuilt from `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: CommentId,
    pub text: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            text: record.text,
            timestamp: record.timestamp,
            parent_id: record.parent_id,
            replies: Vec::new(),
        }
    }
}
