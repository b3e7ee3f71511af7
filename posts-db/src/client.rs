use crate::{
    record::PostRecord,
    store::{PostStore, Result, SaveMode, StoreError},
};
use async_trait::async_trait;
use posts_common::model::{
    Id,
    post::{Post, PostMarker},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use tracing::{debug, info};

/// Postgres error code raised by `nextval` past the sequence maximum.
const SEQUENCE_LIMIT_EXCEEDED: &str = "2200H";

pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database migrations are up to date");

        Ok(())
    }

    async fn insert_generated(&self, post: &Post) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (user_id, title, body, version)
            VALUES ($1, $2, $3, 0)
            RETURNING id, user_id, title, body, version
            ",
        )
        .bind(post.user_id.get())
        .bind(&post.title)
        .bind(&post.body)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(SEQUENCE_LIMIT_EXCEEDED) =>
            {
                StoreError::IdsExhausted
            }
            err => err.into(),
        })?;

        Ok(record.into())
    }

    async fn insert(&self, id: Id<PostMarker>, post: &Post) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (id, user_id, title, body, version)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING id, user_id, title, body, version
            ",
        )
        .bind(id.get())
        .bind(post.user_id.get())
        .bind(&post.title)
        .bind(&post.body)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateId(id)
            }
            err => err.into(),
        })?;

        // Generated ids must not collide with ids chosen by clients. The
        // sequence only moves forward and never below its minimum of 1.
        query(
            "
            SELECT setval(id_sequence, $1)
            FROM (
                SELECT pg_get_serial_sequence('posts.posts', 'id')::regclass AS id_sequence
            ) AS sequences
            WHERE $1 > COALESCE(pg_sequence_last_value(id_sequence), 0)
            ",
        )
        .bind(id.get())
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(record.into())
    }

    async fn update(&self, id: Id<PostMarker>, version: i64, post: &Post) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            UPDATE posts.posts
            SET
                user_id = $3,
                title = $4,
                body = $5,
                version = version + 1
            WHERE
                id = $1 AND version = $2
            RETURNING id, user_id, title, body, version
            ",
        )
        .bind(id.get())
        .bind(version)
        .bind(post.user_id.get())
        .bind(&post.title)
        .bind(&post.body)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::VersionConflict { id, version })?;

        Ok(record.into())
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn find_all(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.user_id,
                posts.title,
                posts.body,
                posts.version
            FROM
                posts.posts
            ORDER BY
                posts.id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    async fn find_by_id(&self, id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.user_id,
                posts.title,
                posts.body,
                posts.version
            FROM
                posts.posts
            WHERE
                posts.id = $1
            ",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    async fn save(&self, post: Post) -> Result<Post> {
        let saved = match SaveMode::of(&post) {
            SaveMode::InsertGenerated => self.insert_generated(&post).await?,
            SaveMode::Insert(id) => self.insert(id, &post).await?,
            SaveMode::Update(id, version) => self.update(id, version, &post).await?,
        };
        debug!(id = ?saved.id, version = ?saved.version, "Saved post");

        Ok(saved)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM posts.posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::DbClient,
        store::{PostStore, StoreError},
    };
    use posts_common::model::post::Post;
    use sqlx::PgPool;

    fn candidate(id: Option<i64>, title: &str) -> Post {
        Post {
            id: id.map(Into::into),
            user_id: 1.into(),
            title: title.to_owned(),
            body: format!("{title} body"),
            version: None,
        }
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn insert_with_supplied_id(pool: PgPool) {
        let db = DbClient::new(pool);

        let saved = db.save(candidate(Some(5), "five")).await.unwrap();
        assert_eq!(saved.id, Some(5.into()));
        assert_eq!(saved.version, Some(0));

        assert_eq!(db.find_by_id(5.into()).await.unwrap(), Some(saved));
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn duplicate_id(pool: PgPool) {
        let db = DbClient::new(pool);
        db.save(candidate(Some(5), "five")).await.unwrap();

        let err = db.save(candidate(Some(5), "again")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id.get() == 5));
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn generated_ids_follow_supplied_ids(pool: PgPool) {
        let db = DbClient::new(pool);

        db.save(candidate(Some(10), "ten")).await.unwrap();
        let next = db.save(candidate(None, "next")).await.unwrap();
        assert_eq!(next.id, Some(11.into()));

        // A smaller supplied id does not rewind the sequence.
        db.save(candidate(Some(3), "three")).await.unwrap();
        let after = db.save(candidate(None, "after")).await.unwrap();
        assert_eq!(after.id, Some(12.into()));

        let ids: Vec<i64> = db
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|post| post.id)
            .map(|id| id.get())
            .collect();
        assert_eq!(ids, [3, 10, 11, 12]);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn non_positive_supplied_ids(pool: PgPool) {
        let db = DbClient::new(pool);

        let zero = db.save(candidate(Some(0), "zero")).await.unwrap();
        assert_eq!(zero.id, Some(0.into()));
        let negative = db.save(candidate(Some(-7), "negative")).await.unwrap();
        assert_eq!(negative.id, Some((-7).into()));

        let generated = db.save(candidate(None, "generated")).await.unwrap();
        assert_eq!(generated.id, Some(1.into()));
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn insert_after_largest_id(pool: PgPool) {
        let db = DbClient::new(pool);
        db.save(candidate(Some(i64::MAX), "last")).await.unwrap();

        let err = db.save(candidate(None, "next")).await.unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted));
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn long_title(pool: PgPool) {
        let db = DbClient::new(pool);
        let title = "t".repeat(1000);

        let saved = db.save(candidate(Some(1), &title)).await.unwrap();
        assert_eq!(saved.title, title);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn update_checks_version(pool: PgPool) {
        let db = DbClient::new(pool);
        let saved = db.save(candidate(Some(1), "original")).await.unwrap();

        let updated = db
            .save(Post {
                title: "updated".to_owned(),
                ..saved.clone()
            })
            .await
            .unwrap();
        assert_eq!(updated.version, Some(1));

        let stale = db.save(saved).await.unwrap_err();
        assert!(matches!(
            stale,
            StoreError::VersionConflict { id, version: 0 } if id.get() == 1
        ));
    }
}
