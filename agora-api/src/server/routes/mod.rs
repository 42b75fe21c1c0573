use crate::server::ServerRouter;
use axum::Router;

mod posts;
pub mod sessions;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(users::routes())
        .merge(sessions::routes())
}
