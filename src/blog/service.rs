//! Blog service

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

use super::model::{BlogPost, CreatePostRequest, UpdatePostRequest};

const POST_COLUMNS: &str = "id, author_id, title, summary, body, published, created_at, updated_at";

#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Please fill in all fields")]
    MissingFields(Vec<String>),

    #[error("Post not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<BlogError> for ApiError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::MissingFields(fields) => ApiError::MissingFields(fields),
            BlogError::NotFound => ApiError::NotFound(e.to_string()),
            BlogError::Database(err) => err.into(),
        }
    }
}

#[derive(Clone)]
pub struct BlogService {
    db_pool: PgPool,
}

impl BlogService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Published posts, newest first
    pub async fn list_posts(&self) -> Result<Vec<BlogPost>, BlogError> {
        let posts = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE published ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(posts)
    }

    /// Every post including drafts
    pub async fn list_all_posts(&self) -> Result<Vec<BlogPost>, BlogError> {
        let posts = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(posts)
    }

    /// Drafts are only visible when `include_drafts` is set
    pub async fn get_post(&self, id: Uuid, include_drafts: bool) -> Result<BlogPost, BlogError> {
        let post: BlogPost =
            sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(BlogError::NotFound)?;

        if !post.published && !include_drafts {
            return Err(BlogError::NotFound);
        }
        Ok(post)
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        req: CreatePostRequest,
    ) -> Result<BlogPost, BlogError> {
        let empty = req.empty_fields();
        if !empty.is_empty() {
            return Err(BlogError::MissingFields(empty));
        }

        let post: BlogPost = sqlx::query_as(&format!(
            r#"
            INSERT INTO blog_posts (id, author_id, title, summary, body, published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(req.title.unwrap_or_default().trim().to_string())
        .bind(req.summary.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .bind(req.body.unwrap_or_default())
        .bind(req.published.unwrap_or(true))
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(post_id = %post.id, author_id = %author_id, "Blog post created");
        Ok(post)
    }

    pub async fn update_post(
        &self,
        id: Uuid,
        req: UpdatePostRequest,
    ) -> Result<BlogPost, BlogError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE blog_posts SET
                title = COALESCE($2, title),
                summary = COALESCE($3, summary),
                body = COALESCE($4, body),
                published = COALESCE($5, published),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.title.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .bind(req.summary)
        .bind(req.body.filter(|s| !s.trim().is_empty()))
        .bind(req.published)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(BlogError::NotFound)
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<(), BlogError> {
        let rows = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(BlogError::NotFound);
        }
        Ok(())
    }
}
