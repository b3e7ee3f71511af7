use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use posts_common::model::{
    Id,
    post::{Post, PostMarker},
};
use posts_db::store::PostStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_get(get_post)
        .typed_post(create_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn PostStore>>,
) -> Result<Json<Vec<Post>>> {
    let posts = store.find_all().await?;

    Ok(Json(posts))
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn PostStore>>,
) -> Result<Json<Post>> {
    // A failed lookup is reported to the client like a missing post.
    let post = store
        .find_by_id(id)
        .await
        .unwrap_or_else(|err| {
            warn!(%id, error = %err, "Looking up post failed");
            None
        })
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

/// Saves the posted post and answers `201 Created` with what the store returned.
///
/// A post carrying both an id and a version replaces the stored post at that
/// version, so this also serves as the update path and still answers 201.
async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn PostStore>>,
    Json(post): Json<Post>,
) -> Result<Created<Post>> {
    post.validate()?;

    let post = store.save(post).await?;
    debug!(id = ?post.id, "Created post");

    Ok(Created(post))
}
