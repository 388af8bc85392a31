use axum::Json;
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, JsonErrorResponse};
use crate::handlers::extract::WantsJson;
use crate::handlers::html::{Share, make_error};
use crate::{Database, Page};
use errorshare_core::db::{self, Item};
use errorshare_core::id::Name;
use errorshare_core::params::{
    CreatorInfo, ErrorPage, Params, prepare_page_params, strip_metadata,
};

/// Attribution text of the link back to the editor.
const CREATOR_TEXT: &str = "CF Error Page Editor";

/// Description used in the page meta tags.
const DESCRIPTION: &str = "Cloudflare error page";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum GetResponse {
    Ok { parameters: Params },
    NotFound,
}

fn render(page: &Page, name: &Name, mut params: Params, uri: &Uri) -> Result<Share, Error> {
    let creator = CreatorInfo::for_item(CREATOR_TEXT, &page.editor_url, name);
    prepare_page_params(&mut params, creator);

    let mut url = page.item_url(name)?;
    url.set_query(uri.query());

    Ok(Share {
        page: page.clone(),
        error: ErrorPage::from_params(&params),
        url: url.into(),
        description: DESCRIPTION,
    })
}

/// GET handler returning an item as JSON or as rendered preview depending on `Accept`.
pub async fn get(
    State(db): State<Database>,
    State(page): State<Page>,
    Path(name): Path<String>,
    WantsJson(wants_json): WantsJson,
    uri: Uri,
) -> Response {
    let item = match name.parse::<Name>() {
        Ok(name) => db.get(name).await,
        Err(_) => Err(db::Error::NotFound),
    };

    let Item { name, mut params } = match item {
        Ok(item) => item,
        Err(err) => {
            let err = match err {
                db::Error::NotFound if wants_json => {
                    return Json(GetResponse::NotFound).into_response();
                }
                db::Error::NotFound => Error::NotFound,
                err => {
                    tracing::error!(kind = err.kind(), "failed to load item: {err}");
                    Error::Database(err)
                }
            };

            return if wants_json {
                JsonErrorResponse::from(err).into_response()
            } else {
                make_error(err, page).into_response()
            };
        }
    };

    if wants_json {
        strip_metadata(&mut params);
        return Json(GetResponse::Ok { parameters: params }).into_response();
    }

    match render(&page, &name, params, &uri) {
        Ok(share) => share.into_response(),
        Err(err) => make_error(err, page).into_response(),
    }
}
