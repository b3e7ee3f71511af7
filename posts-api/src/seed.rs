//! Initial posts loaded from a JSON file at startup.

use posts_common::model::post::{InvalidPostError, Post};
use posts_db::store::{PostStore, StoreError};
use std::{io, path::Path};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Error reading seed file: {0}")]
    Read(#[from] io::Error),
    #[error("Error parsing seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Seed post at index {index} is invalid: {source}")]
    InvalidPost {
        index: usize,
        source: InvalidPostError,
    },
    #[error("Error saving seed post: {0}")]
    Store(#[from] StoreError),
}

pub async fn load_seed_file(path: &Path) -> Result<Vec<Post>, SeedError> {
    let contents = tokio::fs::read(path).await?;

    Ok(serde_json::from_slice(&contents)?)
}

/// Saves `posts` if the store holds no posts yet, returning how many were saved.
///
/// All posts are validated before the first one is saved.
pub async fn seed_store(store: &dyn PostStore, posts: Vec<Post>) -> Result<usize, SeedError> {
    if store.count().await? > 0 {
        info!("Store already holds posts, skipping seed");
        return Ok(0);
    }

    for (index, post) in posts.iter().enumerate() {
        post.validate()
            .map_err(|source| SeedError::InvalidPost { index, source })?;
    }

    let seeded = posts.len();
    for post in posts {
        store.save(post).await?;
    }
    info!(seeded, "Seeded post store");

    Ok(seeded)
}
