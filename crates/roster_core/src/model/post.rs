//! Post entity authored by exactly one account.
//!
//! # Invariants
//! - A persisted post always has `author_id`; it is fixed at creation.
//! - `view_count` starts at 0 and never goes negative.

use crate::model::account::AccountId;
use crate::model::{now_epoch_ms, require_text, Entity, EntityId, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};

pub type PostId = EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    id: Option<PostId>,
    pub title: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub view_count: i64,
    author_id: Option<AccountId>,
}

impl Post {
    /// Creates a transient post for an existing author.
    pub fn new(author_id: AccountId, title: impl Into<String>, content: impl Into<String>) -> Self {
        let mut post = Self::draft(title, content);
        post.author_id = Some(author_id);
        post
    }

    /// Creates a transient post whose author is assigned by cascade when the
    /// owning account graph is persisted.
    pub fn draft(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            created_at: now_epoch_ms(),
            view_count: 0,
            author_id: None,
        }
    }

    pub(crate) fn from_row(
        id: PostId,
        title: String,
        content: String,
        created_at: i64,
        view_count: i64,
        author_id: AccountId,
    ) -> Self {
        Self {
            id: Some(id),
            title,
            content,
            created_at,
            view_count,
            author_id: Some(author_id),
        }
    }

    pub fn author_id(&self) -> Option<AccountId> {
        self.author_id
    }

    pub(crate) fn set_id(&mut self, id: PostId) {
        self.id = Some(id);
    }

    pub(crate) fn set_author(&mut self, author_id: AccountId) {
        self.author_id = Some(author_id);
    }
}

impl Entity for Post {
    const KIND: EntityKind = EntityKind::Post;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(Self::KIND, "title", &self.title)?;
        if self.author_id.is_none() {
            return Err(ValidationError::MissingOwner(Self::KIND));
        }
        if self.view_count < 0 {
            return Err(ValidationError::NegativeCount {
                kind: Self::KIND,
                field: "view_count",
            });
        }
        Ok(())
    }
}
