/// Names of environment variables.
pub mod vars {
    /// Address and port the server binds to.
    pub const ADDRESS_PORT: &str = "ERRORSHARE_ADDRESS_PORT";
    /// Base URL used to build the links handed out to clients.
    pub const BASE_URL: &str = "ERRORSHARE_BASE_URL";
    /// Path to the database file.
    pub const DATABASE_PATH: &str = "ERRORSHARE_DATABASE_PATH";
    /// URL of the editor that shared pages link back to.
    pub const EDITOR_URL: &str = "ERRORSHARE_EDITOR_URL";
    /// Time before a request times out.
    pub const HTTP_TIMEOUT: &str = "ERRORSHARE_HTTP_TIMEOUT";
    /// Maximum body size.
    pub const MAX_BODY_SIZE: &str = "ERRORSHARE_MAX_BODY_SIZE";
    /// Path to a Unix socket the server binds to instead of a TCP port.
    pub const SOCKET_PATH: &str = "ERRORSHARE_SOCKET_PATH";
    /// Site name shown in the page meta tags.
    pub const TITLE: &str = "ERRORSHARE_TITLE";
}
