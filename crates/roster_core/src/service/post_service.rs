//! Post use cases.
//!
//! # Invariants
//! - A post is only created for an existing author (`DanglingReference`
//!   otherwise); the author never changes afterwards.
//! - Author listings are newest first.

use crate::model::account::AccountId;
use crate::model::post::{Post, PostId};
use crate::service::{detached, RosterService};
use crate::session::SessionResult;

impl RosterService<'_> {
    pub fn create_post(
        &mut self,
        author_id: AccountId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> SessionResult<Post> {
        let post = Post::new(author_id, title, content);
        self.write("post_create", |uow| {
            let id = uow.persist(post)?;
            detached(uow.find::<Post>(id)?, "created post is not tracked")
        })
    }

    pub fn find_post(&mut self, id: PostId) -> SessionResult<Option<Post>> {
        self.read("post_get", |uow| Ok(uow.find::<Post>(id)?.cloned()))
    }

    pub fn list_posts(&mut self) -> SessionResult<Vec<Post>> {
        self.read("post_list", |uow| {
            Ok(uow.list::<Post>()?.into_iter().cloned().collect())
        })
    }

    /// Replaces title and content; `None` when the post is absent.
    pub fn update_post(
        &mut self,
        id: PostId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> SessionResult<Option<Post>> {
        let (title, content) = (title.into(), content.into());
        self.write("post_update", |uow| {
            Ok(uow.find_mut::<Post>(id)?.map(|post| {
                post.title = title;
                post.content = content;
                post.clone()
            }))
        })
    }

    /// Increments the view counter and returns the new value.
    pub fn record_post_view(&mut self, id: PostId) -> SessionResult<Option<i64>> {
        self.write("post_view", |uow| {
            Ok(uow.find_mut::<Post>(id)?.map(|post| {
                post.view_count += 1;
                post.view_count
            }))
        })
    }

    pub fn delete_post(&mut self, id: PostId) -> SessionResult<bool> {
        self.write("post_delete", |uow| uow.remove::<Post>(id))
    }

    /// Posts by one author, newest first. Empty for unknown authors.
    pub fn posts_by_account(&mut self, author_id: AccountId) -> SessionResult<Vec<Post>> {
        self.read("post_list_by_author", |uow| {
            Ok(uow.posts_by_author(author_id)?.into_iter().cloned().collect())
        })
    }
}
