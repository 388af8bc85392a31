use std::env::VarError;
use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use errorshare_core::db;
use errorshare_core::env::vars::{
    self, ADDRESS_PORT, BASE_URL, DATABASE_PATH, EDITOR_URL, HTTP_TIMEOUT, MAX_BODY_SIZE,
};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("failed to parse {DATABASE_PATH}, contains non-Unicode data")]
    DatabasePath,
    #[error("failed to parse {MAX_BODY_SIZE}, expected number of bytes: {0}")]
    MaxBodySize(ParseIntError),
    #[error("failed to parse {ADDRESS_PORT}, expected `host:port`")]
    AddressPort,
    #[error("failed to parse {BASE_URL}: {0}")]
    BaseUrl(String),
    #[error("failed to parse {EDITOR_URL}: {0}")]
    EditorUrl(String),
    #[error("failed to parse {HTTP_TIMEOUT}: {0}")]
    HttpTimeout(ParseIntError),
    #[error("binding to both TCP and Unix socket is not possible")]
    BothListeners,
}

pub(crate) enum SocketType {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl Display for SocketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketType::Tcp(addr) => {
                write!(f, "{addr}")
            }
            SocketType::Unix(path) => {
                write!(f, "{}", path.display())
            }
        }
    }
}

pub fn title() -> String {
    std::env::var(vars::TITLE).unwrap_or_else(|_| "errorshare".to_string())
}

pub fn database_method() -> Result<db::Open, Error> {
    match std::env::var(vars::DATABASE_PATH) {
        Ok(path) => Ok(db::Open::Path(PathBuf::from(path))),
        Err(VarError::NotUnicode(_)) => Err(Error::DatabasePath),
        Err(VarError::NotPresent) => Ok(db::Open::Memory),
    }
}

pub fn socket_type() -> Result<SocketType, Error> {
    match (
        std::env::var(vars::ADDRESS_PORT),
        std::env::var(vars::SOCKET_PATH),
    ) {
        (Ok(_), Ok(_)) => Err(Error::BothListeners),
        (Ok(var), Err(_)) => {
            let addr: SocketAddr = var.parse().map_err(|_| Error::AddressPort)?;
            Ok(SocketType::Tcp(addr))
        }
        (Err(_), Ok(var)) => Ok(SocketType::Unix(var.into())),
        (Err(_), Err(_)) => {
            let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 8088);
            Ok(SocketType::Tcp(addr))
        }
    }
}

pub fn max_body_size() -> Result<usize, Error> {
    std::env::var(vars::MAX_BODY_SIZE)
        .map_or_else(|_| Ok(1024 * 1024), |s| s.parse::<usize>())
        .map_err(Error::MaxBodySize)
}

/// Make sure `url` ends with a `/` so that joining item names appends to its path instead of
/// replacing the last segment.
fn with_trailing_slash(mut url: url::Url) -> url::Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url
}

/// Read base URL either from the environment variable or fallback to the hostname.
pub fn base_url() -> Result<url::Url, Error> {
    let base_url = match std::env::var(vars::BASE_URL) {
        Ok(var) => url::Url::parse(&var).map_err(|err| Error::BaseUrl(err.to_string()))?,
        Err(VarError::NotUnicode(_)) => {
            return Err(Error::BaseUrl(format!("{BASE_URL} is not unicode")));
        }
        Err(VarError::NotPresent) => {
            let hostname = hostname::get()
                .map_err(|err| Error::BaseUrl(format!("failed to get hostname: {err}")))?;

            url::Url::parse(&format!("https://{}", hostname.to_string_lossy()))
                .map_err(|err| Error::BaseUrl(err.to_string()))?
        }
    };

    Ok(with_trailing_slash(base_url))
}

/// Read the editor URL from the environment or place it under `/editor/` of `base_url`.
pub fn editor_url(base_url: &url::Url) -> Result<url::Url, Error> {
    match std::env::var(vars::EDITOR_URL) {
        Ok(var) => url::Url::parse(&var).map_err(|err| Error::EditorUrl(err.to_string())),
        Err(VarError::NotUnicode(_)) => {
            Err(Error::EditorUrl(format!("{EDITOR_URL} is not unicode")))
        }
        Err(VarError::NotPresent) => base_url
            .join("editor/")
            .map_err(|err| Error::EditorUrl(err.to_string())),
    }
}

pub fn http_timeout() -> Result<Duration, Error> {
    std::env::var(vars::HTTP_TIMEOUT)
        .map_or_else(
            |_| Ok(DEFAULT_HTTP_TIMEOUT),
            |s| s.parse::<u64>().map(|v| Duration::new(v, 0)),
        )
        .map_err(Error::HttpTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = with_trailing_slash(Url::parse("https://example.com/share").unwrap());
        assert_eq!(url.as_str(), "https://example.com/share/");
        assert_eq!(
            url.join("abcd1234").unwrap().as_str(),
            "https://example.com/share/abcd1234"
        );

        let url = with_trailing_slash(Url::parse("https://example.com/share/").unwrap());
        assert_eq!(url.as_str(), "https://example.com/share/");

        let url = with_trailing_slash(Url::parse("https://example.com").unwrap());
        assert_eq!(url.as_str(), "https://example.com/");
    }
}
