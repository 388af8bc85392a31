use axum::Json;
use axum::extract::State;
use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, JsonErrorResponse};
use crate::handlers::extract::SEC_FETCH_SITE;
use crate::{Database, Page};
use errorshare_core::db::Item;
use errorshare_core::id::Name;
use errorshare_core::params::Params;

/// Largest accepted request body in bytes.
pub(crate) const MAX_CREATE_SIZE: usize = 4096;

/// Reasons a create request body is rejected.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("expected request with `Content-Type: application/json`")]
    UnsupportedMediaType,
    #[error("failed to parse the request body as JSON")]
    Malformed,
    #[error("missing `parameters`")]
    MissingParameters,
    #[error("`parameters` must be an object")]
    InvalidParameters,
}

/// Validated body of a create request.
#[derive(Debug, PartialEq)]
pub(crate) struct CreateRequest {
    pub parameters: Params,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum CreateResponse {
    Ok { name: String, url: String },
    Failed,
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|mime| {
            mime.type_() == mime::APPLICATION
                && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
        })
}

impl CreateRequest {
    /// Validate content type and shape of `body`.
    pub fn parse(headers: &HeaderMap, body: &[u8]) -> Result<Self, ParseError> {
        if !is_json_content_type(headers) {
            return Err(ParseError::UnsupportedMediaType);
        }

        let value: Value = serde_json::from_slice(body).map_err(|_| ParseError::Malformed)?;

        let Value::Object(mut object) = value else {
            return Err(ParseError::MissingParameters);
        };

        match object.remove("parameters") {
            Some(Value::Object(parameters)) => Ok(Self { parameters }),
            Some(_) => Err(ParseError::InvalidParameters),
            None => Err(ParseError::MissingParameters),
        }
    }
}

/// Reject requests the browser marked as not coming from our own origin.
fn check_fetch_site(headers: &HeaderMap) -> Result<(), Error> {
    match headers.get(SEC_FETCH_SITE) {
        Some(site) if site.as_bytes() != b"same-origin" => Err(Error::CrossSite),
        _ => Ok(()),
    }
}

/// Persist `item`. Storage failures are reported as [`CreateResponse::Failed`], everything the
/// database did not cause stays an error.
async fn store(db: &Database, page: &Page, item: Item) -> Result<CreateResponse, Error> {
    if let Err(err) = db.insert(&item).await {
        tracing::warn!(kind = err.kind(), "failed to store item: {err}");
        return Ok(CreateResponse::Failed);
    }

    let url = page.item_url(&item.name)?;

    tracing::debug!(name = %item.name, "stored item");

    Ok(CreateResponse::Ok {
        name: item.name.to_string(),
        url: url.into(),
    })
}

async fn create(
    db: &Database,
    page: &Page,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<CreateResponse, Error> {
    if body.len() > MAX_CREATE_SIZE {
        return Err(Error::PayloadTooLarge);
    }

    check_fetch_site(headers)?;

    let CreateRequest { parameters } = CreateRequest::parse(headers, body)?;

    let item = Item {
        name: Name::rand(),
        params: parameters,
    };

    store(db, page, item).await
}

pub async fn post(
    State(db): State<Database>,
    State(page): State<Page>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreateResponse>, JsonErrorResponse> {
    create(&db, &page, &headers, &body)
        .await
        .map(Json)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::Rule;
    use crate::test_helpers::{Client, test_page};
    use errorshare_core::db::Open;
    use http::HeaderValue;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::str::FromStr;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn parse_request() {
        let request = CreateRequest::parse(&json_headers(), br#"{"parameters": {"a": 1}}"#);
        assert_eq!(
            request.map(|r| r.parameters),
            Ok(json!({"a": 1}).as_object().unwrap().clone())
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.api+json; charset=utf-8"),
        );
        assert!(CreateRequest::parse(&headers, br#"{"parameters": {}}"#).is_ok());
    }

    #[test]
    fn parse_failures() {
        assert_eq!(
            CreateRequest::parse(&HeaderMap::new(), br#"{"parameters": {}}"#),
            Err(ParseError::UnsupportedMediaType)
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(
            CreateRequest::parse(&headers, br#"{"parameters": {}}"#),
            Err(ParseError::UnsupportedMediaType)
        );

        let headers = json_headers();
        assert_eq!(
            CreateRequest::parse(&headers, b"{\"parameters\": "),
            Err(ParseError::Malformed)
        );
        assert_eq!(
            CreateRequest::parse(&headers, br#"{"params": {}}"#),
            Err(ParseError::MissingParameters)
        );
        assert_eq!(
            CreateRequest::parse(&headers, br#"[1, 2]"#),
            Err(ParseError::MissingParameters)
        );
        assert_eq!(
            CreateRequest::parse(&headers, br#"{"parameters": "text"}"#),
            Err(ParseError::InvalidParameters)
        );
    }

    #[test]
    fn fetch_site() {
        let mut headers = HeaderMap::new();
        assert!(check_fetch_site(&headers).is_ok());

        headers.insert(SEC_FETCH_SITE, HeaderValue::from_static("same-origin"));
        assert!(check_fetch_site(&headers).is_ok());

        for site in ["cross-site", "same-site", "none"] {
            headers.insert(SEC_FETCH_SITE, HeaderValue::from_static(site));
            assert!(matches!(check_fetch_site(&headers), Err(Error::CrossSite)));
        }
    }

    #[tokio::test]
    async fn name_collision_fails_softly() -> Result<(), Box<dyn std::error::Error>> {
        let db = Database::new(Open::Memory)?;
        let page = test_page();
        let item = Item {
            name: Name::from_str("samename")?,
            params: Params::new(),
        };

        let first = store(&db, &page, item.clone()).await?;
        assert!(matches!(first, CreateResponse::Ok { .. }));

        let second = store(&db, &page, item).await?;
        assert!(matches!(second, CreateResponse::Failed));

        Ok(())
    }

    #[tokio::test]
    async fn create_item() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let res = client
            .post_create()
            .json(&json!({"parameters": {"title": "Bad gateway"}}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        let CreateResponse::Ok { name, url } = res.json::<CreateResponse>().await? else {
            unreachable!("expected successful creation")
        };

        assert_eq!(name.len(), 8);
        assert!(
            name.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
        assert_eq!(url, format!("https://localhost:8888/{name}"));

        let item = client.db.get(Name::from_str(&name)?).await?;
        assert_eq!(item.params["title"], "Bad gateway");

        Ok(())
    }

    #[tokio::test]
    async fn same_origin_is_allowed() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let res = client
            .post_create()
            .header(SEC_FETCH_SITE, "same-origin")
            .json(&json!({"parameters": {}}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(matches!(
            res.json::<CreateResponse>().await?,
            CreateResponse::Ok { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn cross_site_is_forbidden() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let res = client
            .post_create()
            .header(SEC_FETCH_SITE, "cross-site")
            .json(&json!({"parameters": {"a": 1}}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let payload = res.json::<Value>().await?;
        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["message"], "CSRF check failed (Sec-Fetch-Site)");

        // regardless of the payload
        let res = client
            .post_create()
            .header(SEC_FETCH_SITE, "cross-site")
            .body("not json at all")
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        assert!(client.db.list().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn oversized_body() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let payload = json!({"parameters": {"padding": "x".repeat(MAX_CREATE_SIZE)}});
        let res = client
            .post_create()
            .header(SEC_FETCH_SITE, "cross-site")
            .json(&payload)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.json::<Value>().await?["status"], "failed");

        assert!(client.db.list().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn body_at_limit() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let prefix = r#"{"parameters": {"p": ""#;
        let suffix = r#""}}"#;
        let padding = "x".repeat(MAX_CREATE_SIZE - prefix.len() - suffix.len());
        let body = format!("{prefix}{padding}{suffix}");
        assert_eq!(body.len(), MAX_CREATE_SIZE);

        let res = client
            .post_create()
            .header(CONTENT_TYPE.as_str(), "application/json")
            .body(body)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        Ok(())
    }

    #[tokio::test]
    async fn invalid_requests() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::new().await;

        let res = client
            .post_create()
            .header(CONTENT_TYPE.as_str(), "text/plain")
            .body(r#"{"parameters": {}}"#)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let res = client
            .post_create()
            .header(CONTENT_TYPE.as_str(), "application/json")
            .body("{")
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = client
            .post_create()
            .json(&json!({"something": "else"}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.json::<Value>().await?["message"], "missing `parameters`");

        assert!(client.db.list().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn rate_limited() -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::with_rules(vec![Rule::per_minute(2)]).await;
        let payload = json!({"parameters": {}});

        for _ in 0..2 {
            let res = client.post_create().json(&payload).send().await?;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = client.post_create().json(&payload).send().await?;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));
        assert_eq!(res.json::<Value>().await?["message"], "rate limit exceeded");

        // another client behind the local proxy still gets through
        let res = client
            .post_create()
            .header("x-forwarded-for", "203.0.113.7")
            .json(&payload)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);

        // reading is not limited
        let res = client.get("/unknown0").send().await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        Ok(())
    }
}
