// Marketplace search client abstraction

mod dpop;
mod http;

pub use dpop::DpopSigner;
pub use http::HttpMarketplace;

use crate::error::MarketplaceResult;
use crate::types::{CandidateItem, SearchQuery};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source of raw candidate listings
#[async_trait::async_trait]
pub trait MarketplaceSearch: Send + Sync {
    /// Run one search and return candidates in marketplace order
    async fn search(&self, query: &SearchQuery) -> MarketplaceResult<Vec<CandidateItem>>;
}

/// Connection settings for the Mercari search API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    /// API root, the search endpoint is resolved relative to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefix joined with an item id to build its listing URL
    #[serde(default = "default_item_base_url")]
    pub item_base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on result pages fetched per search
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fixed `DPoP` header value; when unset each request is signed with an
    /// ephemeral key
    #[serde(default)]
    pub dpop_token: Option<String>,
}

fn default_base_url() -> String {
    "https://api.mercari.jp/".to_string()
}

fn default_item_base_url() -> String {
    "https://jp.mercari.com/item/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    120
}

fn default_max_pages() -> u32 {
    1
}

fn default_user_agent() -> String {
    format!("mercari-mcp/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            item_base_url: default_item_base_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
            dpop_token: None,
        }
    }
}

impl MarketplaceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
