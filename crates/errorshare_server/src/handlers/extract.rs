use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use http::header::ACCEPT;

/// Browser supplied fetch metadata telling where a request was initiated from.
pub(crate) const SEC_FETCH_SITE: http::HeaderName = http::HeaderName::from_static("sec-fetch-site");

/// Whether the client asked for JSON through the `Accept` header.
pub(crate) struct WantsJson(pub bool);

impl<S> FromRequestParts<S> for WantsJson
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let wants_json = parts
            .headers
            .get(ACCEPT)
            .and_then(|accept| accept.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"));

        Ok(Self(wants_json))
    }
}
