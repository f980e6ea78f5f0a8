// tests/common/mod.rs

//! Minimal HTTP fixture server for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use veille::models::{Config, FetcherConfig};
use veille::services::UrlGuard;

#[derive(Clone)]
struct Route {
    status: u16,
    content_type: String,
    body: String,
}

/// Serves fixed bodies by path; routes can be replaced while running.
#[derive(Clone)]
pub struct FixtureServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        let served = Arc::clone(&routes);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = Arc::clone(&served);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let path = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();

                    let route = routes.lock().unwrap().get(&path).cloned().unwrap_or(Route {
                        status: 404,
                        content_type: "text/plain".into(),
                        body: "not found".into(),
                    });
                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        route.status,
                        route.content_type,
                        route.body.len(),
                        route.body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base, routes }
    }

    /// Serve `body` at `path` with status 200.
    pub fn serve(&self, path: &str, content_type: &str, body: impl Into<String>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Guard that lets the loopback fixture server through.
pub fn local_guard() -> UrlGuard {
    UrlGuard::new().allow_host("127.0.0.1")
}

/// Config with short timeouts and backoffs.
pub fn test_config() -> Config {
    Config {
        fetcher: FetcherConfig {
            timeout_secs: 5,
            retry_backoff_ms: 1,
            rate_limit_backoff_ms: 1,
            ..FetcherConfig::default()
        },
        ..Config::default()
    }
}

/// RSS document with (title, link, description) items.
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let entries: String = items
        .iter()
        .map(|(title, link, description)| {
            format!(
                "<item><title>{title}</title><link>{link}</link><description>{description}</description></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Fixture</title><link>http://127.0.0.1/</link><description>Fixture feed</description>{entries}</channel></rss>"#
    )
}
