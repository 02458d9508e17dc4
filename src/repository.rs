use crate::error::ApiError;
use crate::models::{FeedFilter, Post, PostSort, PostStatus, Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Columns selected for every post query: the full row plus the author's
/// username joined from `users`.
const POST_COLUMNS: &str = "p.id, p.title, p.author_id, u.username AS author, p.date, \
     p.location, p.description, p.image_name, p.likes, p.status";

/// FeedQuery
///
/// The resolved parameters of a feed request. Built by the list handler after
/// filter/sort parsing and actor resolution; the repository turns it into SQL.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub filter: Option<FeedFilter>,
    /// Owner restriction for the `mine` filter. The handler guarantees this is
    /// set whenever `filter == Some(Mine)`.
    pub viewer_id: Option<Uuid>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sort: PostSort,
    pub page: i64,
    pub size: i64,
}

/// NewPost
///
/// Validated input for a post insert. Status and like count are not caller
/// choices: every post starts Pending with zero likes.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub title: String,
    pub location: String,
    pub description: Option<String>,
    pub image_name: String,
}

/// PostPatch
///
/// Partial update for the mutable fields of a post. `None` leaves a column
/// untouched (COALESCE in SQL). Status and author are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_name: Option<String>,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers interact
/// with the data layer without knowing the concrete implementation
/// (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Inserts a new user. The database unique constraints are the source of
    /// truth for username/email uniqueness; violations surface as
    /// DuplicateUsername/DuplicateEmail.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<User, ApiError>;
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), ApiError>;
    async fn update_user_image(&self, user_id: Uuid, image_name: &str) -> Result<(), ApiError>;
    /// Admin action: grants a role to the named user. Ok(false) when the user
    /// does not exist.
    async fn set_role(&self, username: &str, role: Role) -> Result<bool, ApiError>;

    // --- Posts ---
    async fn create_post(&self, new_post: NewPost) -> Result<Post, ApiError>;
    async fn find_post(&self, id: i64) -> Result<Option<Post>, ApiError>;
    async fn update_post(&self, id: i64, patch: PostPatch) -> Result<Option<Post>, ApiError>;
    /// Removes the post and its like rows in one transaction.
    async fn delete_post(&self, id: i64) -> Result<(), ApiError>;
    async fn set_post_status(&self, id: i64, status: PostStatus) -> Result<(), ApiError>;
    async fn set_post_image(&self, id: i64, image_name: &str) -> Result<(), ApiError>;

    // --- Likes ---
    /// Idempotent toggle: inserts or removes the membership row and adjusts
    /// the denormalized counter in the same transaction, returning the new
    /// like count.
    async fn toggle_like(&self, user_id: Uuid, post_id: i64) -> Result<i32, ApiError>;
    /// Enrichment lookup: whether the user currently likes the post.
    async fn is_liked(&self, user_id: Uuid, post_id: i64) -> Result<bool, ApiError>;

    // --- Feed ---
    /// Paginated, filtered, sorted feed. Returns the page rows and the total
    /// matching row count.
    async fn list_posts(&self, query: &FeedQuery) -> Result<(Vec<Post>, i64), ApiError>;
    /// Top posts by like count then date, excluding denied ones.
    async fn recommended_posts(&self, limit: i64) -> Result<Vec<Post>, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share persistence access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a sqlx error to the failure taxonomy, translating unique-constraint
/// violations on the users table into their Duplicate variants.
fn map_user_insert_err(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some("users_username_key") => return ApiError::DuplicateUsername,
            Some("users_email_key") => return ApiError::DuplicateEmail,
            _ => {}
        }
    }
    ApiError::from_db(err)
}

/// Appends the WHERE conditions of a feed query to a builder. Shared between
/// the page query and the count query so they can never disagree.
fn push_feed_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a FeedQuery) {
    match query.filter {
        Some(FeedFilter::Mine) => {
            builder.push(" WHERE p.author_id = ");
            // Guaranteed by the handler; a missing viewer is a programming
            // error, not a user input problem.
            builder.push_bind(query.viewer_id.unwrap_or_default());
        }
        Some(FeedFilter::Moderation) => {
            builder.push(" WHERE p.status = ");
            builder.push_bind(PostStatus::Pending);
        }
        None => {
            builder.push(" WHERE p.status <> ");
            builder.push_bind(PostStatus::Denied);
        }
    }

    // Author substring matching is skipped in `mine` mode: the author is
    // always the viewer there.
    if query.filter != Some(FeedFilter::Mine) {
        if let Some(author) = &query.author {
            builder.push(" AND u.username ILIKE ");
            builder.push_bind(format!("%{}%", author));
        }
    }
    if let Some(title) = &query.title {
        builder.push(" AND p.title ILIKE ");
        builder.push_bind(format!("%{}%", title));
    }
    if let Some(location) = &query.location {
        builder.push(" AND p.location ILIKE ");
        builder.push_bind(format!("%{}%", location));
    }
    if let Some(start) = query.start_date {
        builder.push(" AND p.date >= ");
        builder.push_bind(start);
    }
    if let Some(end) = query.end_date {
        builder.push(" AND p.date <= ");
        builder.push_bind(end);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, image_name, role
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_insert_err)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, image_name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from_db)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, image_name, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from_db)
    }

    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET email = $2 WHERE id = $1
            RETURNING id, username, email, password_hash, image_name, role
            "#,
        )
        .bind(user_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_insert_err)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from_db)?;
        Ok(())
    }

    async fn update_user_image(&self, user_id: Uuid, image_name: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET image_name = $2 WHERE id = $1")
            .bind(user_id)
            .bind(image_name)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from_db)?;
        Ok(())
    }

    async fn set_role(&self, username: &str, role: Role) -> Result<bool, ApiError> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE username = $1")
            .bind(username)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from_db)?;
        Ok(result.rows_affected() > 0)
    }

    // --- POSTS ---

    /// Inserts a new post (status Pending, zero likes) and joins the author's
    /// username in the same statement via a CTE.
    async fn create_post(&self, new_post: NewPost) -> Result<Post, ApiError> {
        sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (title, author_id, date, location, description, image_name, likes, status)
                VALUES ($1, $2, NOW(), $3, $4, $5, 0, 'STATUS_PENDING')
                RETURNING *
            )
            SELECT p.id, p.title, p.author_id, u.username AS author, p.date,
                   p.location, p.description, p.image_name, p.likes, p.status
            FROM inserted p JOIN users u ON p.author_id = u.id
            "#,
        )
        .bind(&new_post.title)
        .bind(new_post.author_id)
        .bind(&new_post.location)
        .bind(&new_post.description)
        .bind(&new_post.image_name)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::from_db)
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, ApiError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.author_id = u.id WHERE p.id = $1"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::from_db)
    }

    /// Updates the mutable columns of a post, leaving any column whose patch
    /// field is None untouched (COALESCE). Status and author are never
    /// writable through this path.
    async fn update_post(&self, id: i64, patch: PostPatch) -> Result<Option<Post>, ApiError> {
        sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts
                SET title = COALESCE($2, title),
                    location = COALESCE($3, location),
                    description = COALESCE($4, description),
                    image_name = COALESCE($5, image_name)
                WHERE id = $1
                RETURNING *
            )
            SELECT p.id, p.title, p.author_id, u.username AS author, p.date,
                   p.location, p.description, p.image_name, p.likes, p.status
            FROM updated p JOIN users u ON p.author_id = u.id
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.location)
        .bind(patch.description)
        .bind(patch.image_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from_db)
    }

    async fn delete_post(&self, id: i64) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::from_db)?;

        sqlx::query("DELETE FROM post_likes WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from_db)?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from_db)?;

        tx.commit().await.map_err(ApiError::from_db)
    }

    async fn set_post_status(&self, id: i64, status: PostStatus) -> Result<(), ApiError> {
        sqlx::query("UPDATE posts SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from_db)?;
        Ok(())
    }

    async fn set_post_image(&self, id: i64, image_name: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE posts SET image_name = $2 WHERE id = $1")
            .bind(id)
            .bind(image_name)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from_db)?;
        Ok(())
    }

    // --- LIKES ---

    /// Membership row and counter move together inside one transaction, so
    /// two racing toggles cannot desynchronize `posts.likes` from the
    /// `post_likes` cardinality.
    async fn toggle_like(&self, user_id: Uuid, post_id: i64) -> Result<i32, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::from_db)?;

        let removed = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from_db)?
            .rows_affected();

        let likes: i32 = if removed > 0 {
            sqlx::query("UPDATE posts SET likes = likes - 1 WHERE id = $1 RETURNING likes")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(ApiError::from_db)?
                .get("likes")
        } else {
            sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::from_db)?;

            sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = $1 RETURNING likes")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(ApiError::from_db)?
                .get("likes")
        };

        tx.commit().await.map_err(ApiError::from_db)?;
        Ok(likes)
    }

    async fn is_liked(&self, user_id: Uuid, post_id: i64) -> Result<bool, ApiError> {
        let row =
            sqlx::query("SELECT 1 AS present FROM post_likes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::from_db)?;
        Ok(row.is_some())
    }

    // --- FEED ---

    /// Implements the feed with QueryBuilder for safe parameterization. The
    /// count and page queries share `push_feed_filters`, and the ORDER BY
    /// fragment comes from the closed `PostSort` enum, never from user input.
    async fn list_posts(&self, query: &FeedQuery) -> Result<(Vec<Post>, i64), ApiError> {
        let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p JOIN users u ON p.author_id = u.id",
        );
        push_feed_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::from_db)?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.author_id = u.id"
        ));
        push_feed_filters(&mut builder, query);
        builder.push(format!(" ORDER BY {}", query.sort.order_clause()));
        builder.push(" OFFSET ");
        // Saturating: the page index is attacker-controlled and the product
        // must stay a valid non-negative OFFSET.
        builder.push_bind(query.page.saturating_mul(query.size));
        builder.push(" LIMIT ");
        builder.push_bind(query.size);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::from_db)?;

        Ok((posts, total))
    }

    async fn recommended_posts(&self, limit: i64) -> Result<Vec<Post>, ApiError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.author_id = u.id \
             WHERE p.status <> $1 ORDER BY p.likes DESC, p.date DESC LIMIT $2"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(PostStatus::Denied)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::from_db)
    }
}
