use std::time::Duration;

use axum::response::{IntoResponse, Response};
use axum_extra::{TypedHeader, headers};
use sha2::{Digest, Sha256};

/// An asset associated with a MIME type.
#[derive(Clone)]
pub(crate) struct Asset {
    /// Route that this will be served under.
    pub route: String,
    /// MIME type of this asset determined for the `ContentType` response header.
    mime: mime::Mime,
    /// Actual asset content.
    content: Vec<u8>,
}

/// Asset kind.
#[derive(Copy, Clone)]
pub(crate) enum Kind {
    Css,
    Svg,
}

/// Static assets referenced by the rendered pages.
pub(crate) struct Assets {
    pub favicon: Asset,
    pub style: Asset,
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let content_type_header = headers::ContentType::from(self.mime);

        let headers = (
            TypedHeader(content_type_header),
            TypedHeader(
                headers::CacheControl::new()
                    .with_max_age(Duration::from_secs(60 * 60 * 24 * 30))
                    .with_immutable(),
            ),
        );

        (headers, self.content).into_response()
    }
}

impl Asset {
    /// Construct new hashed asset under the given `name`, `kind` and `content`.
    pub fn new_hashed(name: &str, kind: Kind, content: Vec<u8>) -> Self {
        let (mime, ext) = match kind {
            Kind::Css => (mime::TEXT_CSS, "css"),
            Kind::Svg => (mime::IMAGE_SVG, "svg"),
        };

        let route = format!(
            "/{name}.{}.{ext}",
            hex::encode(Sha256::digest(&content))
                .get(0..16)
                .expect("at least 16 characters")
        );

        Self {
            route,
            mime,
            content,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

impl Assets {
    pub fn new() -> Self {
        Self {
            favicon: Asset::new_hashed(
                "favicon",
                Kind::Svg,
                include_bytes!("favicon.svg").to_vec(),
            ),
            style: Asset::new_hashed("style", Kind::Css, include_bytes!("style.css").to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_asset() {
        let asset = Asset::new_hashed("style", Kind::Css, String::from("body {}").into_bytes());
        assert_eq!(asset.route, "/style.62368a1a29259b30.css");
    }

    #[test]
    fn asset_response() {
        let asset = Asset::new_hashed("icon", Kind::Svg, b"<svg/>".to_vec());
        assert!(asset.route().starts_with("/icon."));
        assert!(asset.route().ends_with(".svg"));

        let response = asset.into_response();
        let headers = response.headers();

        assert_eq!(
            headers.get(http::header::CONTENT_TYPE).unwrap(),
            "image/svg+xml"
        );
        assert_eq!(
            headers.get(http::header::CACHE_CONTROL).unwrap(),
            "immutable, max-age=2592000"
        );
    }
}
