use crate::page;
use crate::ratelimit::{RateLimiter, Rule};
use errorshare_core::db::{self, Database};
use reqwest::RequestBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub(crate) struct Client {
    client: reqwest::Client,
    addr: SocketAddr,
    /// Handle on the database the server writes to.
    pub db: Database,
}

pub(crate) fn test_page() -> crate::Page {
    Arc::new(page::Page::new(
        String::from("test"),
        url::Url::parse("https://localhost:8888").unwrap(),
        url::Url::parse("https://localhost:8888/editor/").unwrap(),
    ))
}

impl Client {
    pub(crate) async fn new() -> Self {
        Self::with_limiter(RateLimiter::default()).await
    }

    pub(crate) async fn with_rules(rules: Vec<Rule>) -> Self {
        Self::with_limiter(RateLimiter::new(rules)).await
    }

    async fn with_limiter(limiter: RateLimiter) -> Self {
        let db = Database::new(db::Open::Memory).expect("open memory database");
        let state = crate::AppState {
            db: db.clone(),
            page: test_page(),
            limiter: Arc::new(limiter),
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Could not bind ephemeral socket");

        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = crate::make_app(state, Duration::from_secs(30), 1024 * 1024);

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(crate::shutdown_signal())
            .await
            .unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self { client, addr, db }
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(format!("http://{}{}", self.addr, url))
    }

    pub(crate) fn post_create(&self) -> RequestBuilder {
        self.client.post(format!("http://{}/create", self.addr))
    }
}
