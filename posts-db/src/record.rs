use posts_common::model::post::Post;
use sqlx::FromRow;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub version: Option<i64>,
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: Some(value.id.into()),
            user_id: value.user_id.into(),
            title: value.title,
            body: value.body,
            version: value.version,
        }
    }
}
