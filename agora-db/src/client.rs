use crate::record::{
    AuthenticationRecord, CommentRecord, CredentialsRecord, PostRecord, UserRecord, sql_id,
    sql_timestamp,
};
use agora_common::model::{
    AgoraSnowflakeGenerator, Id, ModelValidationError,
    auth::{Authentication, AuthTokenHash, PasswordDigest},
    comment::{Comment, CommentMarker, CommentNode, CreateComment, build_comment_tree},
    like::LikeToggle,
    post::{CreatePost, Post, PostMarker, PostView},
    user::{User, UserMarker, Username},
};
use agora_common::snowflake::{ProcessId, WorkerId};
use sqlx::{
    SqlitePool,
    migrate::{MigrateError, Migrator},
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{
    str::FromStr,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use time::{OffsetDateTime, UtcDateTime};
use tracing::{debug, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error("Username {0} is already taken.")]
    UsernameTaken(Username),
    #[error("User with id {0} was not found.")]
    UserNotFound(Id<UserMarker>),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment with id {parent_id} was not found on post {post_id}.")]
    ParentCommentNotFound {
        post_id: Id<PostMarker>,
        parent_id: Id<CommentMarker>,
    },
}

const POST_COLUMNS: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.content,
        posts.created_at,
        posts.likes,
        users.user_snowflake,
        users.username,
        EXISTS (
            SELECT 1 FROM likes
            WHERE likes.post_snowflake = posts.post_snowflake
                AND likes.user_snowflake = ?1
        ) AS liked
    FROM
        posts JOIN users ON users.user_snowflake = posts.user_snowflake
";

const COMMENT_COLUMNS: &str = "
    SELECT
        comments.comment_snowflake,
        comments.post_snowflake,
        comments.parent_comment_snowflake,
        comments.content,
        comments.created_at,
        users.user_snowflake,
        users.username
    FROM
        comments JOIN users ON users.user_snowflake = comments.user_snowflake
";

#[derive(Debug)]
pub struct DbClient {
    pool: SqlitePool,
    snowflake_generator: Mutex<AgoraSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(AgoraSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    /// Opens (creating if needed) the database at `database_url` and brings
    /// its schema up to date.
    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        MIGRATOR.run(&pool).await?;
        info!(database_url, "Database ready");

        Ok(Self::new(pool, worker_id, process_id))
    }

    /// A fresh id and the creation time encoded in it, so ordering by
    /// `(created_at, id)` always agrees with id order.
    fn next_id<Marker>(&self) -> (Id<Marker>, OffsetDateTime) {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate();
        let created_at = UtcDateTime::from(snowflake.timestamp());

        (snowflake.into(), created_at.into())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT users.user_snowflake, users.username
            FROM users
            WHERE users.user_snowflake = ?1
            ",
        )
        .bind(sql_id(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT users.user_snowflake, users.username
            FROM users
            WHERE users.username = ?1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Looks up a user together with the stored password digest, for login.
    pub async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, PasswordDigest)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT users.user_snowflake, users.username, users.password_digest
            FROM users
            WHERE users.username = ?1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };
        let digest = PasswordDigest::from_stored(record.password_digest.clone());
        Ok(Some((User::try_from(record)?, digest)))
    }

    /// Fails with [`DbError::UsernameTaken`] if the name is in use. The
    /// UNIQUE constraint decides, so two concurrent registrations of one
    /// name cannot both succeed.
    pub async fn create_user(&self, username: &Username, digest: &PasswordDigest) -> Result<User> {
        let (user_id, _) = self.next_id::<UserMarker>();

        let inserted = query(
            "
            INSERT INTO users (user_snowflake, username, password_digest)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(sql_id(user_id))
        .bind(username.get())
        .bind(digest.get())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(DbError::UsernameTaken(username.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        debug!(%user_id, %username, "Created user");
        Ok(User {
            id: user_id,
            username: username.clone(),
        })
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(sql_id(authentication.user))
        .bind(sql_timestamp(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM authentications
            WHERE authentications.token_hash = ?1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    /// Returns whether there was anything to delete.
    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM authentications WHERE token_hash = ?1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    pub async fn create_post(&self, author: Id<UserMarker>, post: &CreatePost) -> Result<Post> {
        let (post_id, created_at) = self.next_id::<PostMarker>();

        let inserted = query(
            "
            INSERT INTO posts (post_snowflake, title, content, user_snowflake, created_at, likes)
            SELECT ?1, ?2, ?3, users.user_snowflake, ?5, 0
            FROM users
            WHERE users.user_snowflake = ?4
            ",
        )
        .bind(sql_id(post_id))
        .bind(post.title.get())
        .bind(post.content.get())
        .bind(sql_id(author))
        .bind(sql_timestamp(created_at))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(DbError::UserNotFound(author));
        }

        debug!(%post_id, %author, "Created post");
        let view = self
            .fetch_post(post_id, None)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;
        Ok(view.post)
    }

    pub async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Option<PostView>> {
        let record = query_as::<_, PostRecord>(&format!(
            "{POST_COLUMNS} WHERE posts.post_snowflake = ?2"
        ))
        .bind(viewer.map(sql_id))
        .bind(sql_id(post_id))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(PostView::try_from).transpose()?;
        Ok(post)
    }

    /// All posts, newest first.
    pub async fn fetch_posts(&self, viewer: Option<Id<UserMarker>>) -> Result<Vec<PostView>> {
        let records = query_as::<_, PostRecord>(&format!(
            "{POST_COLUMNS} ORDER BY posts.created_at DESC, posts.post_snowflake DESC"
        ))
        .bind(viewer.map(sql_id))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(PostView::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    /// Adds a comment to `post_id`, optionally as a reply.
    ///
    /// The existence checks for the post and the parent are part of the
    /// insert itself, so a rejected comment never leaves a row behind and a
    /// parent on another post can never be referenced.
    pub async fn create_comment(
        &self,
        author: Id<UserMarker>,
        post_id: Id<PostMarker>,
        comment: &CreateComment,
    ) -> Result<Comment> {
        let (comment_id, created_at) = self.next_id::<CommentMarker>();

        let inserted = query(
            "
            INSERT INTO comments (
                comment_snowflake, post_snowflake, parent_comment_snowflake,
                user_snowflake, content, created_at
            )
            SELECT ?1, posts.post_snowflake, ?3, ?4, ?5, ?6
            FROM posts
            WHERE posts.post_snowflake = ?2
                AND (
                    ?3 IS NULL
                    OR EXISTS (
                        SELECT 1 FROM comments AS parent
                        WHERE parent.comment_snowflake = ?3
                            AND parent.post_snowflake = ?2
                    )
                )
            ",
        )
        .bind(sql_id(comment_id))
        .bind(sql_id(post_id))
        .bind(comment.parent_id.map(sql_id))
        .bind(sql_id(author))
        .bind(comment.content.get())
        .bind(sql_timestamp(created_at))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            let post_exists = query_scalar::<_, i64>("SELECT 1 FROM posts WHERE post_snowflake = ?1")
                .bind(sql_id(post_id))
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            return Err(match comment.parent_id {
                Some(parent_id) if post_exists => DbError::ParentCommentNotFound { post_id, parent_id },
                _ => DbError::PostNotFound(post_id),
            });
        }

        debug!(%comment_id, %post_id, parent_id = ?comment.parent_id, "Created comment");
        self.fetch_comment(comment_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    pub async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "{COMMENT_COLUMNS} WHERE comments.comment_snowflake = ?1"
        ))
        .bind(sql_id(comment_id))
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    /// Every comment on `post_id`, oldest first, in a single query.
    pub async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(&format!(
            "{COMMENT_COLUMNS}
            WHERE comments.post_snowflake = ?1
            ORDER BY comments.created_at, comments.comment_snowflake"
        ))
        .bind(sql_id(post_id))
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn fetch_comment_tree(&self, post_id: Id<PostMarker>) -> Result<Vec<CommentNode>> {
        let comments = self.fetch_comments(post_id).await?;
        Ok(build_comment_tree(post_id, comments))
    }

    /// Flips whether `user_id` likes `post_id`.
    ///
    /// Runs as one transaction. Its first statement writes, so SQLite hands
    /// out the write lock before anything is read and toggles never
    /// interleave. The counter is recomputed from the like rows rather than
    /// adjusted, so it cannot drift from them.
    pub async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<LikeToggle> {
        let mut transaction = self.pool.begin().await?;

        let removed = query("DELETE FROM likes WHERE user_snowflake = ?1 AND post_snowflake = ?2")
            .bind(sql_id(user_id))
            .bind(sql_id(post_id))
            .execute(&mut *transaction)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            let inserted = query(
                "
                INSERT INTO likes (user_snowflake, post_snowflake)
                SELECT ?1, posts.post_snowflake
                FROM posts
                WHERE posts.post_snowflake = ?2
                ",
            )
            .bind(sql_id(user_id))
            .bind(sql_id(post_id))
            .execute(&mut *transaction)
            .await?
            .rows_affected();

            if inserted == 0 {
                return Err(DbError::PostNotFound(post_id));
            }
        }

        let likes = query_scalar::<_, i64>(
            "
            UPDATE posts
            SET likes = (SELECT COUNT(*) FROM likes WHERE likes.post_snowflake = ?1)
            WHERE post_snowflake = ?1
            RETURNING likes
            ",
        )
        .bind(sql_id(post_id))
        .fetch_optional(&mut *transaction)
        .await?
        .ok_or(DbError::PostNotFound(post_id))?;

        transaction.commit().await?;

        let toggle = LikeToggle {
            liked: !removed,
            likes: u64::try_from(likes).map_err(ModelValidationError::from)?,
        };
        debug!(%user_id, %post_id, liked = toggle.liked, likes = toggle.likes, "Toggled like");
        Ok(toggle)
    }

    pub async fn has_liked(&self, user_id: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<bool> {
        let like = query_scalar::<_, i64>(
            "SELECT 1 FROM likes WHERE user_snowflake = ?1 AND post_snowflake = ?2",
        )
        .bind(sql_id(user_id))
        .bind(sql_id(post_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(like.is_some())
    }

    /// Number of like rows for `post_id`, independent of the cached counter.
    pub async fn count_likes(&self, post_id: Id<PostMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_snowflake = ?1")
            .bind(sql_id(post_id))
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).map_err(ModelValidationError::from)?)
    }
}
