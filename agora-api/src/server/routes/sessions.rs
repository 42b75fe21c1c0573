use crate::server::{
    Result, ServerError, ServerRouter, TokenLifetime,
    auth::{AuthenticatedUser, Session, issue_token},
    json::Json,
};
use agora_common::model::{
    Id,
    user::{Credentials, User, UserMarker, Username},
};
use agora_db::client::DbClient;
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(login)
        .typed_post(logout)
        .typed_get(session)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(lifetime): State<TokenLifetime>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
    let (user, digest) = db
        .fetch_credentials(&credentials.username)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    let password = credentials.password;
    let verified = task::spawn_blocking(move || digest.verify(&password)).await?;
    if !verified {
        return Err(ServerError::InvalidCredentials);
    }

    let token = issue_token(&db, user.id, lifetime).await?;
    info!(user = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

/// Revokes the token the request was made with.
async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_auth(user.token_hash()).await?;
    info!(user = %user.user_id(), "User logged out");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    pub user_id: Option<Id<UserMarker>>,
    pub username: Option<Username>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/session", rejection(ServerError))]
struct SessionPath();

async fn session(SessionPath(): SessionPath, session: Session) -> Json<SessionInfo> {
    Json(SessionInfo {
        authenticated: session.is_authenticated(),
        user_id: session.current_user_id(),
        username: session.current_username().cloned(),
    })
}
