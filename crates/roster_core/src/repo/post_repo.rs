//! Post rows and author-scoped lookups.
//!
//! # Invariants
//! - Author listings are ordered `created_at DESC, id DESC` so posts
//!   created in the same millisecond still come out newest first.

use crate::model::account::AccountId;
use crate::model::post::{Post, PostId};
use crate::model::{Entity, EntityId, EntityKind};
use crate::repo::{
    ensure_updated, missing_id, EntityRepository, RepoError, RepoResult, SqliteStore,
};
use rusqlite::{params, Row};

const POST_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    view_count,
    author_id
FROM posts";

impl EntityRepository<Post> for SqliteStore<'_> {
    fn insert(&self, post: &Post) -> RepoResult<EntityId> {
        post.validate()?;
        let author_id = post
            .author_id()
            .ok_or_else(|| RepoError::InvalidData("post insert without author".to_string()))?;
        self.conn.execute(
            "INSERT INTO posts (
                title,
                content,
                created_at,
                view_count,
                author_id
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                post.title.as_str(),
                post.content.as_str(),
                post.created_at,
                post.view_count,
                author_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, post: &Post) -> RepoResult<()> {
        post.validate()?;
        let id = post.id().ok_or_else(|| missing_id(EntityKind::Post))?;
        // author_id is never rewritten.
        let changed = self.conn.execute(
            "UPDATE posts
             SET
                title = ?2,
                content = ?3,
                created_at = ?4,
                view_count = ?5
             WHERE id = ?1;",
            params![
                id,
                post.title.as_str(),
                post.content.as_str(),
                post.created_at,
                post.view_count,
            ],
        )?;
        ensure_updated(changed, EntityKind::Post, id)
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Post>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POST_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_post_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> RepoResult<Vec<Post>> {
        self.query_posts(&format!("{POST_SELECT_SQL} ORDER BY id ASC;"), None)
    }
}

impl SqliteStore<'_> {
    /// Lists one author's posts, newest first.
    pub fn posts_by_author(&self, author_id: AccountId) -> RepoResult<Vec<Post>> {
        self.query_posts(
            &format!("{POST_SELECT_SQL} WHERE author_id = ?1 ORDER BY created_at DESC, id DESC;"),
            Some(author_id),
        )
    }

    pub fn post_ids_by_author(&self, author_id: AccountId) -> RepoResult<Vec<PostId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM posts WHERE author_id = ?1 ORDER BY id ASC;")?;
        let mut rows = stmt.query([author_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    pub fn count_posts_by_author(&self, author_id: AccountId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1;",
            [author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn query_posts(&self, sql: &str, author_id: Option<AccountId>) -> RepoResult<Vec<Post>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match author_id {
            Some(author_id) => stmt.query([author_id])?,
            None => stmt.query([])?,
        };
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_post_row(row)?);
        }
        Ok(posts)
    }
}

fn parse_post_row(row: &Row<'_>) -> RepoResult<Post> {
    let id: PostId = row.get("id")?;
    let view_count: i64 = row.get("view_count")?;
    if view_count < 0 {
        return Err(RepoError::InvalidData(format!(
            "negative view_count `{view_count}` in posts.view_count for post {id}"
        )));
    }
    Ok(Post::from_row(
        id,
        row.get("title")?,
        row.get::<_, Option<String>>("content")?.unwrap_or_default(),
        row.get("created_at")?,
        view_count,
        row.get("author_id")?,
    ))
}
