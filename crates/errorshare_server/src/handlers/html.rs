use askama::Template;
use askama_web::WebTemplate;
use axum::http::StatusCode;

use crate::Page;
use errorshare_core::params::ErrorPage;

/// Error page showing a message.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub(crate) struct Error {
    pub page: Page,
    pub description: String,
}

/// Preview of a shared error page. Everything coming from the parameters is escaped.
#[derive(Template, WebTemplate)]
#[template(path = "share.html")]
pub(crate) struct Share {
    pub page: Page,
    pub error: ErrorPage,
    /// Canonical URL of this preview.
    pub url: String,
    pub description: &'static str,
}

/// Error response carrying a status code and the page itself.
pub(crate) type ErrorResponse = (StatusCode, Error);

/// Create an error response from `error` consisting of [`StatusCode`] derive from `error` as well
/// as a rendered page with a description.
pub fn make_error(error: crate::Error, page: Page) -> ErrorResponse {
    let description = error.public_message();
    (error.into(), Error { page, description })
}
