use crate::server::{
    Result, ServerError, ServerRouter, TokenLifetime,
    auth::issue_token,
    json::{Created, Json},
    routes::sessions::LoginResponse,
};
use agora_common::model::{
    Id,
    auth::PasswordDigest,
    user::{Credentials, User, UserMarker},
};
use agora_db::client::DbClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tokio::task;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_get(get_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

/// Creates the account and logs it in right away.
async fn register(
    UsersPath(): UsersPath,
    State(db): State<Arc<DbClient>>,
    State(lifetime): State<TokenLifetime>,
    Json(credentials): Json<Credentials>,
) -> Result<Created<LoginResponse>> {
    let password = credentials.password;
    let digest = task::spawn_blocking(move || PasswordDigest::hash(&password)).await??;
    let user = db.create_user(&credentials.username, &digest).await?;
    info!(user = %user.id, username = %user.username, "User registered");

    let token = issue_token(&db, user.id, lifetime).await?;

    Ok(Created(LoginResponse {
        token: token.as_token_str(),
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}
