use std::fmt::Display;

use rouille::Response;
use serde_json::json;

use crate::storage::error::StorageError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidTrackId(id) => {
                ApiError::BadRequest(format!("invalid track id '{id}'"))
            }

            StorageError::Fs(_)
            | StorageError::Serialization(_)
            | StorageError::Scan(_) => {
                log::error!("storage failure: {err}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        Response::json(&json!({ "error": self.to_string() })).with_status_code(self.status_code())
    }
}
