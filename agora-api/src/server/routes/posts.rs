use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, Session},
    json::{Created, Json},
};
use agora_common::model::{
    Id,
    comment::{Comment, CommentNode, CreateComment},
    like::LikeToggle,
    post::{CreatePost, Post, PostMarker, PostView},
};
use agora_db::client::DbClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_post(create_comment)
        .typed_post(toggle_like)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    session: Session,
) -> Result<Json<Vec<PostView>>> {
    let posts = db.fetch_posts(session.current_user_id()).await?;

    Ok(Json(posts))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<CreatePost>,
) -> Result<Created<Post>> {
    let post = db.create_post(user.user_id(), &post).await?;
    info!(post = %post.id, author = %post.author.id, "Post created");

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

/// A post with its whole discussion.
#[derive(Clone, Debug, Serialize)]
struct PostPage {
    post: PostView,
    comment_count: usize,
    comments: Vec<CommentNode>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    session: Session,
) -> Result<Json<PostPage>> {
    let post = db
        .fetch_post(id, session.current_user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let comments = db.fetch_comment_tree(id).await?;
    let comment_count = comments.iter().map(CommentNode::thread_len).sum();

    Ok(Json(PostPage {
        post,
        comment_count,
        comments,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<CreateComment>,
) -> Result<Created<Comment>> {
    let comment = db.create_comment(user.user_id(), id, &comment).await?;
    info!(comment = %comment.id, post = %id, "Comment created");

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    PostLikePath { id }: PostLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeToggle>> {
    let toggle = db.toggle_like(user.user_id(), id).await?;

    Ok(Json(toggle))
}
