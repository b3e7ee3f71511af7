use async_trait::async_trait;
use posts_common::model::{
    Id,
    post::{Post, PostMarker},
};
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A post with id {0} already exists.")]
    DuplicateId(Id<PostMarker>),
    #[error("Post {id} is not at version {version}.")]
    VersionConflict { id: Id<PostMarker>, version: i64 },
    #[error("No post ids are left to assign.")]
    IdsExhausted,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Persistence for posts.
///
/// `save` follows optimistic concurrency on [`Post::version`]:
///
/// * no id: the post is inserted under a store-assigned id, failing with
///   [`StoreError::IdsExhausted`] once the largest id is taken,
/// * an id but no version: the post is inserted under that id,
///   failing with [`StoreError::DuplicateId`] if it is taken,
/// * an id and a version: the stored post at exactly that version is
///   replaced, failing with [`StoreError::VersionConflict`] otherwise.
///
/// Inserted posts start at version 0, every update increments it.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, ordered by id.
    async fn find_all(&self) -> Result<Vec<Post>>;

    async fn find_by_id(&self, id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn save(&self, post: Post) -> Result<Post>;

    async fn count(&self) -> Result<u64>;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) enum SaveMode {
    InsertGenerated,
    Insert(Id<PostMarker>),
    Update(Id<PostMarker>, i64),
}

impl SaveMode {
    pub(crate) fn of(post: &Post) -> Self {
        match (post.id, post.version) {
            (None, _) => SaveMode::InsertGenerated,
            (Some(id), None) => SaveMode::Insert(id),
            (Some(id), Some(version)) => SaveMode::Update(id, version),
        }
    }
}
