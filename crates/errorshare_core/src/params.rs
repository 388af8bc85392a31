//! Passes over the parameter document of a shared error page.
//!
//! A stored document is never modified. Every pass here works on the copy loaded for a single
//! request and the HTML view always runs them in the order of [`prepare_page_params`].

use crate::id::Name;
use rand::Rng;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use url::Url;

/// Parameter document as supplied by the client.
pub type Params = Map<String, Value>;

/// Capture-time request metadata that is meaningless when replaying a page.
pub const METADATA_KEYS: [&str; 3] = ["time", "ray_id", "client_ip"];

/// Shown instead of the visitor's real address.
pub const DEFAULT_CLIENT_IP: &str = "1.1.1.1";

const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

/// Attribution block linking a rendered page back to the editor that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorInfo {
    pub text: String,
    pub link: String,
}

impl CreatorInfo {
    /// Attribution for item `name` pointing to `editor` with a `from=<name>` fragment.
    #[must_use]
    pub fn for_item(text: impl Into<String>, editor: &Url, name: &Name) -> Self {
        let mut link = editor.clone();
        link.set_fragment(Some(&format!("from={name}")));

        Self {
            text: text.into(),
            link: link.into(),
        }
    }
}

/// Remove [`METADATA_KEYS`] from `params`.
pub fn strip_metadata(params: &mut Params) {
    for key in METADATA_KEYS {
        params.remove(key);
    }
}

/// Set the `creator_info` block, replacing whatever the client sent.
pub fn inject_creator_info(params: &mut Params, info: CreatorInfo) {
    params.insert(
        "creator_info".to_string(),
        json!({
            "hidden": false,
            "text": info.text,
            "link": info.link,
        }),
    );
}

/// Insert `default` under `key` if missing or null. Objects are merged key by key so that a
/// partially specified block keeps the client's values.
fn fill(params: &mut Params, key: &str, default: Value) {
    match params.get_mut(key) {
        Some(Value::Object(existing)) => {
            if let Value::Object(defaults) = default {
                for (k, v) in defaults {
                    existing.entry(k).or_insert(v);
                }
            }
        }
        Some(Value::Null) | None => {
            params.insert(key.to_string(), default);
        }
        Some(_) => {}
    }
}

/// Fill every field the error page template relies on but the client left out.
pub fn fill_template_params(params: &mut Params) {
    fill(params, "title", json!("Internal server error"));
    fill(params, "error_code", json!(500));
    fill(params, "error_source", json!("cloudflare"));
    fill(
        params,
        "browser_status",
        json!({"status": "ok", "location": "You", "name": "Browser", "status_text": "Working"}),
    );
    fill(
        params,
        "cloudflare_status",
        json!({
            "status": "error",
            "location": "San Francisco",
            "name": "Cloudflare",
            "status_text": "Error",
        }),
    );
    fill(
        params,
        "host_status",
        json!({"status": "ok", "location": "Website", "name": "Host", "status_text": "Working"}),
    );
    fill(
        params,
        "what_happened",
        json!("There is an internal server error on Cloudflare's network."),
    );
    fill(
        params,
        "what_can_i_do",
        json!("Please try again in a few minutes."),
    );
    fill(
        params,
        "more_information",
        json!({
            "hidden": false,
            "text": "cloudflare.com",
            "link": "https://www.cloudflare.com/",
            "for": "more information",
        }),
    );
    fill(
        params,
        "perf_sec_by",
        json!({"text": "Cloudflare", "link": "https://www.cloudflare.com/5xx-error-landing/"}),
    );

    let html_title = format!(
        "{}: {}",
        text(params.get("error_code")),
        text(params.get("title"))
    );
    fill(params, "html_title", Value::String(html_title));

    if let Ok(now) = OffsetDateTime::now_utc().format(TIME_FORMAT) {
        fill(params, "time", Value::String(now));
    }

    let ray_id = format!("{:016x}", rand::rng().random::<u64>());
    fill(params, "ray_id", Value::String(ray_id));
    fill(params, "client_ip", json!(DEFAULT_CLIENT_IP));
}

/// Return the normalized form of `value` if it is an absolute HTTP(S) URL.
fn safe_link(value: &Value) -> Option<String> {
    let Value::String(link) = value else {
        return None;
    };

    let url = Url::parse(link.trim()).ok()?;

    matches!(url.scheme(), "http" | "https").then(|| url.into())
}

/// Neutralize the `link` of every top-level block: anything that is not an absolute HTTP(S) URL
/// is dropped.
pub fn sanitize_page_param_links(params: &mut Params) {
    for value in params.values_mut() {
        let Value::Object(block) = value else {
            continue;
        };

        let Some(sanitized) = block.get("link").map(safe_link) else {
            continue;
        };

        match sanitized {
            Some(link) => {
                block.insert("link".to_string(), Value::String(link));
            }
            None => {
                tracing::debug!("dropping unsafe link");
                block.remove("link");
            }
        }
    }
}

/// Turn a stored document into one ready for rendering: strip metadata, add attribution, fill
/// defaults and finally sanitize links, attribution included.
pub fn prepare_page_params(params: &mut Params, creator: CreatorInfo) {
    strip_metadata(params);
    inject_creator_info(params, creator);
    fill_template_params(params);
    sanitize_page_param_links(params);
}

/// Textual representation of scalar values, empty for everything else.
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// One of the three browser, Cloudflare and host boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub is_ok: bool,
    /// This box is where the error originated.
    pub is_source: bool,
    pub location: String,
    pub name: String,
    pub status_text: String,
}

/// A text with an optional link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub hidden: bool,
    pub text: String,
    pub link: Option<String>,
    pub for_text: String,
}

/// Typed view of a filled parameter document. Unknown or mistyped fields degrade to empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub html_title: String,
    pub title: String,
    pub error_code: String,
    pub time: String,
    pub ray_id: String,
    pub client_ip: String,
    pub browser_status: Status,
    pub cloudflare_status: Status,
    pub host_status: Status,
    pub what_happened: String,
    pub what_can_i_do: String,
    pub more_information: Link,
    pub perf_sec_by: Link,
    pub creator_info: Link,
}

impl Status {
    fn from_block(value: Option<&Value>, source: &str, this: &str) -> Self {
        let block = value.and_then(Value::as_object);
        let field = |key: &str| block.and_then(|block| block.get(key));

        Self {
            is_ok: text(field("status")) == "ok",
            is_source: source == this,
            location: text(field("location")),
            name: text(field("name")),
            status_text: text(field("status_text")),
        }
    }
}

impl Link {
    fn from_block(value: Option<&Value>) -> Self {
        let Some(block) = value.and_then(Value::as_object) else {
            return Self {
                hidden: true,
                text: String::new(),
                link: None,
                for_text: String::new(),
            };
        };

        Self {
            hidden: flag(block.get("hidden")),
            text: text(block.get("text")),
            link: block
                .get("link")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            for_text: text(block.get("for")),
        }
    }
}

impl ErrorPage {
    /// Browser, Cloudflare and host boxes in display order.
    #[must_use]
    pub fn statuses(&self) -> [&Status; 3] {
        [
            &self.browser_status,
            &self.cloudflare_status,
            &self.host_status,
        ]
    }

    /// Build the view from `params`, normally after [`prepare_page_params`].
    #[must_use]
    pub fn from_params(params: &Params) -> Self {
        let source = text(params.get("error_source"));

        Self {
            html_title: text(params.get("html_title")),
            title: text(params.get("title")),
            error_code: text(params.get("error_code")),
            time: text(params.get("time")),
            ray_id: text(params.get("ray_id")),
            client_ip: text(params.get("client_ip")),
            browser_status: Status::from_block(params.get("browser_status"), &source, "browser"),
            cloudflare_status: Status::from_block(
                params.get("cloudflare_status"),
                &source,
                "cloudflare",
            ),
            host_status: Status::from_block(params.get("host_status"), &source, "host"),
            what_happened: text(params.get("what_happened")),
            what_can_i_do: text(params.get("what_can_i_do")),
            more_information: Link::from_block(params.get("more_information")),
            perf_sec_by: Link::from_block(params.get("perf_sec_by")),
            creator_info: Link::from_block(params.get("creator_info")),
        }
    }
}
