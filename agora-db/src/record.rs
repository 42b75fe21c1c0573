use agora_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    comment::{Comment, CommentContent},
    post::{Post, PostContent, PostTitle, PostView},
    user::{User, Username},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

pub(crate) fn sql_id<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

fn model_id<Marker>(snowflake: i64) -> Id<Marker> {
    snowflake.cast_unsigned().into()
}

/// Timestamps are stored as unix milliseconds.
pub(crate) fn sql_timestamp(time: OffsetDateTime) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (time.unix_timestamp_nanos() / 1_000_000) as i64;
    millis
}

fn model_timestamp(millis: i64) -> Result<OffsetDateTime, ModelValidationError> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(
        i128::from(millis) * 1_000_000,
    )?)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub password_digest: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub likes: i64,
    pub user_snowflake: i64,
    pub username: String,
    pub liked: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub parent_comment_snowflake: Option<i64>,
    pub content: String,
    pub created_at: i64,
    pub user_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: i64,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model_id(value.user_snowflake),
            username: Username::new(&value.username)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        User::try_from(UserRecord {
            user_snowflake: value.user_snowflake,
            username: value.username,
        })
    }
}

impl TryFrom<PostRecord> for PostView {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            post: Post {
                id: model_id(value.post_snowflake),
                title: PostTitle::new(&value.title)?,
                content: PostContent::new(&value.content)?,
                author: User {
                    id: model_id(value.user_snowflake),
                    username: Username::new(&value.username)?,
                },
                created_at: model_timestamp(value.created_at)?,
                likes: u64::try_from(value.likes)?,
            },
            liked: value.liked != 0,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model_id(value.comment_snowflake),
            post_id: model_id(value.post_snowflake),
            parent_id: value.parent_comment_snowflake.map(model_id),
            author: User {
                id: model_id(value.user_snowflake),
                username: Username::new(&value.username)?,
            },
            content: CommentContent::new(&value.content)?,
            created_at: model_timestamp(value.created_at)?,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: model_id(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: model_timestamp(value.created_at)?,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
