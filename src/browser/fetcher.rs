use crate::model::BrowserError;

use reqwest::Client;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Source of raw page markup for a URL.
#[async_trait::async_trait]
pub trait PageLoader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, BrowserError>;
}

pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserError::Http(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PageLoader for HttpLoader {
    async fn fetch(&self, url: &str) -> Result<String, BrowserError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrowserError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::Http(format!("{} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| BrowserError::Http(e.to_string()))
    }
}

/// In-memory pages keyed by URL, for offline replays of saved markup.
///
/// A URL may hold a sequence of versions: each fetch consumes the front one
/// and the last version is served for every later fetch.
#[derive(Default)]
pub struct StaticPages {
    pages: Mutex<HashMap<String, VecDeque<String>>>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_versions(url, &[html])
    }

    pub fn with_versions(self, url: &str, versions: &[&str]) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages
                .entry(url.to_string())
                .or_default()
                .extend(versions.iter().map(|html| html.to_string()));
        }
        self
    }
}

#[async_trait::async_trait]
impl PageLoader for StaticPages {
    async fn fetch(&self, url: &str) -> Result<String, BrowserError> {
        let mut pages = self
            .pages
            .lock()
            .map_err(|_| BrowserError::Http("page store poisoned".into()))?;
        let versions = pages
            .get_mut(url)
            .ok_or_else(|| BrowserError::Http(format!("{} returned 404 Not Found", url)))?;

        let html = if versions.len() > 1 {
            versions.pop_front()
        } else {
            versions.front().cloned()
        };
        html.ok_or_else(|| BrowserError::Http(format!("{} has no content", url)))
    }
}
