//! Page fetching and HTML cleaning.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Node};
use thiserror::Error;

use crate::config::HttpConfig;

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("unreadable body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Retrieves raw HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// Plain GET with a browser user agent.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(settings: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Visible text of an HTML page.
///
/// Drops script, style, navigation, header and footer subtrees, then collapses
/// every run of whitespace into a single space.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut pieces: Vec<&str> = Vec::new();

    let mut stack = vec![document.tree.root()];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                pieces.push(text);
                continue;
            }
            Node::Element(element) if SKIPPED_ELEMENTS.contains(&element.name()) => continue,
            Node::Document | Node::Fragment | Node::Element(_) => {}
            _ => continue,
        }
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }

    collapse_whitespace(&pieces.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
