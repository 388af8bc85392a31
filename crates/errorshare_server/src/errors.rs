use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

use crate::handlers::create::ParseError;
use errorshare_core::db;

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("CSRF check failed (Sec-Fetch-Site)")]
    CrossSite,
    #[error(transparent)]
    Request(#[from] ParseError),
    #[error("not found")]
    NotFound,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("could not build URL: {0}")]
    UrlParsing(#[from] url::ParseError),
    #[error("database error: {0}")]
    Database(#[from] db::Error),
}

impl Error {
    /// Message safe to show to clients. Server side failures never expose their cause.
    pub fn public_message(&self) -> String {
        match self {
            Error::UrlParsing(_) | Error::Database(_) => String::from("internal server error"),
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct JsonError {
    pub status: &'static str,
    pub message: String,
}

/// Response carrying a status code and the error message as JSON.
pub(crate) type JsonErrorResponse = (StatusCode, Json<JsonError>);

impl From<Error> for StatusCode {
    fn from(err: Error) -> Self {
        match err {
            Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::CrossSite => StatusCode::FORBIDDEN,
            Error::Request(ParseError::UnsupportedMediaType) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Request(_) => StatusCode::BAD_REQUEST,
            Error::NotFound | Error::Database(db::Error::NotFound) => StatusCode::NOT_FOUND,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::UrlParsing(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for JsonErrorResponse {
    fn from(err: Error) -> Self {
        let payload = Json::from(JsonError {
            status: "failed",
            message: err.public_message(),
        });

        (err.into(), payload)
    }
}
