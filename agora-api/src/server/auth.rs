//! Request identity.
//!
//! Clients authenticate with `Authorization: Bearer <token>`, where the token
//! is the string handed out by registration or login. [`Session`] resolves the
//! caller if possible and falls back to an anonymous session.
//! [`AuthenticatedUser`] rejects the request instead.

use crate::server::{ServerError, TokenLifetime};
use agora_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash, Authentication},
    user::{User, UserMarker, Username},
};
use agora_db::client::DbClient;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Stores a new authentication for `user` and returns the token to hand out.
pub async fn issue_token(
    db: &DbClient,
    user: Id<UserMarker>,
    lifetime: TokenLifetime,
) -> Result<AuthToken, ServerError> {
    let token = AuthToken::generate_random(user);
    let authentication = Authentication {
        user,
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: lifetime.0,
    };
    db.create_auth(&authentication).await?;

    debug!(user = %user, "Issued auth token");
    Ok(token)
}

async fn authenticate<S>(parts: &mut Parts, state: &S) -> Result<AuthenticatedUser, ServerError>
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    let request_token: AuthToken = AuthorizationHeader::from_request_parts(parts, state)
        .await
        .map_err(ServerError::InvalidAuthorizationHeader)?
        .token()
        .parse()?;

    let token_hash = request_token.hash()?;

    let db = Arc::<DbClient>::from_ref(state);
    let authentication = db
        .fetch_auth(&token_hash)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    if authentication.user != request_token.user_id
        || authentication.is_expired_at(OffsetDateTime::now_utc())
    {
        return Err(ServerError::InvalidToken);
    }

    // The account may have been removed since the token was issued.
    let user = db
        .fetch_user(authentication.user)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    Ok(AuthenticatedUser { user, token_hash })
}

/// A caller that presented a valid, unexpired token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    /// Hash of the token this request was made with.
    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await
    }
}

/// The identity behind a request, if any.
///
/// Missing, malformed, unknown or expired tokens all yield an anonymous
/// session. Only storage failures reject the request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Session {
    user: Option<AuthenticatedUser>,
}

impl Session {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn current_user_id(&self) -> Option<Id<UserMarker>> {
        self.user.as_ref().map(AuthenticatedUser::user_id)
    }

    #[must_use]
    pub fn current_username(&self) -> Option<&Username> {
        self.user.as_ref().map(|user| &user.user().username)
    }
}

impl From<AuthenticatedUser> for Session {
    fn from(user: AuthenticatedUser) -> Self {
        Self { user: Some(user) }
    }
}

impl<S> FromRequestParts<S> for Session
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(user) => Ok(user.into()),
            Err(err) if err.is_unauthenticated() => {
                if parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
                    debug!(error = %err, "Treating request with unusable token as anonymous");
                }
                Ok(Self::anonymous())
            }
            Err(err) => Err(err),
        }
    }
}
