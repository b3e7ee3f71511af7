//! In-memory post store, used when no database is configured.
//!
//! Data is lost on process restart.

use crate::store::{PostStore, Result, SaveMode, StoreError};
use async_trait::async_trait;
use posts_common::model::{
    Id,
    post::{Post, PostMarker},
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: RwLock<BTreeMap<Id<PostMarker>, Post>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(posts: &BTreeMap<Id<PostMarker>, Post>) -> Result<Id<PostMarker>> {
        let Some((last_id, _)) = posts.last_key_value() else {
            return Ok(1.into());
        };

        last_id
            .get()
            .checked_add(1)
            .map(Id::new)
            .ok_or(StoreError::IdsExhausted)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_all(&self) -> Result<Vec<Post>> {
        Ok(self.posts.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn save(&self, post: Post) -> Result<Post> {
        let mut posts = self.posts.write().await;

        let (id, version) = match SaveMode::of(&post) {
            SaveMode::InsertGenerated => (Self::next_id(&posts)?, 0),
            SaveMode::Insert(id) => {
                if posts.contains_key(&id) {
                    return Err(StoreError::DuplicateId(id));
                }
                (id, 0)
            }
            SaveMode::Update(id, version) => {
                match posts.get(&id) {
                    Some(stored) if stored.version == Some(version) => {}
                    _ => return Err(StoreError::VersionConflict { id, version }),
                }
                (id, version + 1)
            }
        };

        let saved = Post {
            id: Some(id),
            version: Some(version),
            ..post
        };
        posts.insert(id, saved.clone());
        debug!(%id, version, "Saved post in memory");

        Ok(saved)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.posts.read().await.len() as u64)
    }
}
