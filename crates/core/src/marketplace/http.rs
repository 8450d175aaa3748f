//! HTTP client for the Mercari search API.

use super::dpop::DpopSigner;
use super::{MarketplaceConfig, MarketplaceSearch};
use crate::error::{MarketplaceError, MarketplaceResult};
use crate::types::{CandidateItem, SearchQuery};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

const SEARCH_PATH: &str = "v2/entities:search";

const DPOP_HEADER: &str = "dpop";

/// Marketplace search over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    client: Client,
    config: MarketplaceConfig,
    search_url: Url,
    signer: Option<DpopSigner>,
}

impl HttpMarketplace {
    /// Create a client with the given configuration.
    pub fn new(config: MarketplaceConfig) -> MarketplaceResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("x-platform"),
            header::HeaderValue::from_static("web"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // A configured token replaces per-request proofs
        let signer = match config.dpop_token {
            Some(ref token) => {
                headers.insert(
                    header::HeaderName::from_static(DPOP_HEADER),
                    header::HeaderValue::from_str(token).map_err(|_| {
                        MarketplaceError::Config("Invalid DPoP token format".to_string())
                    })?,
                );
                None
            }
            None => Some(DpopSigner::generate()?),
        };

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let search_url = Url::parse(&base)?.join(SEARCH_PATH)?;

        Ok(Self {
            client,
            config,
            search_url,
            signer,
        })
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    fn search_body<'a>(&self, query: &'a SearchQuery, page_token: String) -> SearchBody<'a> {
        let session = uuid::Uuid::new_v4().simple().to_string();

        SearchBody {
            user_id: format!("MERCARI_MCP_{}", session),
            page_size: self.config.page_size,
            page_token,
            search_session_id: session,
            index_routing: "INDEX_ROUTING_UNSPECIFIED",
            thumbnail_types: Vec::new(),
            search_condition: SearchCondition {
                keyword: &query.keyword,
                exclude_keyword: &query.exclude_keywords,
                sort: query.sort.as_api_str(),
                order: query.order.as_api_str(),
                status: vec![query.status.as_api_str()],
                ..SearchCondition::default()
            },
            default_datasets: Vec::new(),
            service_from: "suruga",
            with_item_brand: false,
            with_item_size: false,
            with_item_promotions: false,
            with_item_sizes: false,
            with_shop_name: false,
        }
    }

    async fn fetch_page(&self, body: &SearchBody<'_>) -> MarketplaceResult<SearchResponse> {
        debug!(url = %self.search_url, page_token = %body.page_token, "POST search");

        let mut request = self.client.post(self.search_url.clone()).json(body);
        if let Some(ref signer) = self.signer {
            request = request.header(DPOP_HEADER, signer.proof("POST", &self.search_url)?);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Search request rejected");
            return Err(MarketplaceError::from_response(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}{}", self.config.item_base_url, id)
    }
}

#[async_trait::async_trait]
impl MarketplaceSearch for HttpMarketplace {
    async fn search(&self, query: &SearchQuery) -> MarketplaceResult<Vec<CandidateItem>> {
        let max_pages = self.config.max_pages.max(1);
        let mut page_token = "v1:0".to_string();
        let mut candidates = Vec::new();

        for page in 0..max_pages {
            let body = self.search_body(query, page_token);
            let response = self.fetch_page(&body).await?;

            debug!(page, items = response.items.len(), "Received search page");

            candidates.extend(response.items.into_iter().map(|raw| CandidateItem {
                product_url: raw.id.as_deref().map(|id| self.item_url(id)),
                product_name: raw.name,
                price: raw.price,
            }));

            if response.meta.next_page_token.is_empty() {
                break;
            }
            page_token = response.meta.next_page_token;
        }

        Ok(candidates)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    user_id: String,
    page_size: u32,
    page_token: String,
    search_session_id: String,
    index_routing: &'static str,
    thumbnail_types: Vec<String>,
    search_condition: SearchCondition<'a>,
    default_datasets: Vec<String>,
    service_from: &'static str,
    with_item_brand: bool,
    with_item_size: bool,
    with_item_promotions: bool,
    with_item_sizes: bool,
    with_shop_name: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchCondition<'a> {
    keyword: &'a str,
    exclude_keyword: &'a str,
    sort: &'static str,
    order: &'static str,
    status: Vec<&'static str>,
    size_id: Vec<String>,
    category_id: Vec<String>,
    brand_id: Vec<String>,
    seller_id: Vec<String>,
    price_min: u64,
    price_max: u64,
    item_condition_id: Vec<String>,
    shipping_payer_id: Vec<String>,
    shipping_from_area: Vec<String>,
    shipping_method: Vec<String>,
    color_id: Vec<String>,
    has_coupon: bool,
    attributes: Vec<String>,
    item_types: Vec<String>,
    sku_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    meta: SearchMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchMeta {
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<serde_json::Value>,
}
