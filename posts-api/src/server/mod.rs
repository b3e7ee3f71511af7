use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use posts_common::model::{
    Id,
    post::{InvalidPostError, PostField, PostMarker},
};
use posts_db::store::{PostStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub post_store: Arc<dyn PostStore>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidPost(#[from] InvalidPostError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_) | ServerError::InvalidPost(_) => StatusCode::BAD_REQUEST,
            ServerError::Store(StoreError::DuplicateId(_) | StoreError::VersionConflict { .. }) => {
                StatusCode::CONFLICT
            }
            ServerError::JsonResponse(_) | ServerError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    invalid_fields: Vec<PostField>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let invalid_fields = match &self {
            ServerError::InvalidPost(err) => err.fields().to_vec(),
            _ => Vec::new(),
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            invalid_fields,
        };
        (status, Json(error_response)).into_response()
    }
}
