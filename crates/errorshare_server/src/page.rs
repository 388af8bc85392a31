use crate::assets::Assets;
use errorshare_core::id::Name;
use url::Url;

pub(crate) struct Page {
    pub version: &'static str,
    /// Site name used in the meta tags of shared pages.
    pub title: String,
    pub assets: Assets,
    pub base_url: Url,
    /// Editor that shared pages link back to.
    pub editor_url: Url,
}

impl Page {
    /// Create new page meta data from `title`, `base_url` and `editor_url`.
    #[must_use]
    pub fn new(title: String, base_url: Url, editor_url: Url) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            title,
            assets: Assets::new(),
            base_url,
            editor_url,
        }
    }

    /// Fully-qualified URL under which the item `name` can be retrieved.
    pub fn item_url(&self, name: &Name) -> Result<Url, url::ParseError> {
        self.base_url.join(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn item_url() {
        let page = Page::new(
            String::from("test"),
            Url::parse("https://example.com").unwrap(),
            Url::parse("https://example.com/editor/").unwrap(),
        );
        let name = Name::from_str("abcd1234").unwrap();
        assert_eq!(
            page.item_url(&name).unwrap().as_str(),
            "https://example.com/abcd1234"
        );

        let page = Page::new(
            String::from("test"),
            Url::parse("https://example.com/share/").unwrap(),
            Url::parse("https://example.com/editor/").unwrap(),
        );
        assert_eq!(
            page.item_url(&name).unwrap().as_str(),
            "https://example.com/share/abcd1234"
        );
    }
}
