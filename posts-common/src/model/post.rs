use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post as exchanged over the API and persisted by a store.
///
/// `id` is absent on a candidate the store has to assign an id to.
/// `version` is owned by the store and only round-tripped here.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Option<Id<PostMarker>>,
    pub user_id: Id<UserMarker>,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostField {
    Title,
    Body,
}

impl Display for PostField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PostField::Title => f.write_str("title"),
            PostField::Body => f.write_str("body"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Required post fields were empty: {fields:?}")]
pub struct InvalidPostError {
    fields: Vec<PostField>,
}

impl InvalidPostError {
    #[must_use]
    pub fn fields(&self) -> &[PostField] {
        &self.fields
    }
}

impl Post {
    /// Checks the fields a post needs before it may be saved.
    ///
    /// Every failing field is reported, not just the first one.
    pub fn validate(&self) -> Result<(), InvalidPostError> {
        let mut fields = Vec::new();

        if self.title.is_empty() {
            fields.push(PostField::Title);
        }
        if self.body.is_empty() {
            fields.push(PostField::Body);
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(InvalidPostError { fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{Post, PostField};

    fn post(title: &str, body: &str) -> Post {
        Post {
            id: Some(1.into()),
            user_id: 1.into(),
            title: title.to_owned(),
            body: body.to_owned(),
            version: None,
        }
    }

    #[test]
    fn validate() {
        assert!(post("title1", "body1").validate().is_ok());
        assert!(post(" ", " ").validate().is_ok());

        let err = post("", "body1").validate().unwrap_err();
        assert_eq!(err.fields(), [PostField::Title]);

        let err = post("title1", "").validate().unwrap_err();
        assert_eq!(err.fields(), [PostField::Body]);

        let err = post("", "").validate().unwrap_err();
        assert_eq!(err.fields(), [PostField::Title, PostField::Body]);
    }

    #[test]
    fn json_representation() {
        let json = serde_json::to_value(post("title1", "body1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "userId": 1, "title": "title1", "body": "body1"})
        );

        let versioned = Post {
            version: Some(3),
            ..post("title1", "body1")
        };
        assert_eq!(serde_json::to_value(versioned).unwrap()["version"], 3);

        let unsaved = Post {
            id: None,
            ..post("title1", "body1")
        };
        assert!(serde_json::to_value(unsaved).unwrap()["id"].is_null());
    }

    #[test]
    fn deserialize_optional_fields() {
        let parsed: Post =
            serde_json::from_str(r#"{"userId": 7, "title": "t", "body": "b", "version": null}"#)
                .unwrap();
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.user_id.get(), 7);
        assert_eq!(parsed.version, None);

        assert!(serde_json::from_str::<Post>(r#"{"id": 1, "title": "t", "body": "b"}"#).is_err());
        assert!(
            serde_json::from_str::<Post>(r#"{"id": 1, "userId": "one", "title": "t", "body": "b"}"#)
                .is_err()
        );
    }
}
