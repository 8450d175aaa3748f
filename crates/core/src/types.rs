use serde::{Deserialize, Serialize};

/// Default number of listings returned by a search
pub const DEFAULT_LIMIT: usize = 20;

/// Placeholder URL for listings the marketplace returned without one
pub const MISSING_URL: &str = "N/A";

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Filtered search request as received from a tool caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Main keyword, also the source of required terms
    pub keyword: String,
    /// Space-separated terms that must not appear in a listing name
    #[serde(default)]
    pub exclude_keywords: String,
    /// Inclusive lower price bound in JPY
    #[serde(default)]
    pub min_price: Option<u64>,
    /// Inclusive upper price bound in JPY
    #[serde(default)]
    pub max_price: Option<u64>,
    /// Maximum number of listings to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            exclude_keywords: String::new(),
            min_price: None,
            max_price: None,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_exclude_keywords(mut self, exclude_keywords: impl Into<String>) -> Self {
        self.exclude_keywords = exclude_keywords.into();
        self
    }

    pub fn with_price_range(mut self, min_price: Option<u64>, max_price: Option<u64>) -> Self {
        self.min_price = min_price;
        self.max_price = max_price;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Reject requests that can never produce a meaningful result
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if self.keyword.trim().is_empty() {
            return Err(InvalidRequest::EmptyKeyword);
        }

        if self.limit == 0 {
            return Err(InvalidRequest::ZeroLimit);
        }

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(InvalidRequest::InvertedPriceRange { min, max });
            }
        }

        Ok(())
    }
}

/// Reasons a search request is refused before reaching the marketplace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("limit must be at least 1")]
    ZeroLimit,

    #[error("min_price ({min}) is greater than max_price ({max})")]
    InvertedPriceRange { min: u64, max: u64 },
}

/// Raw listing returned by the marketplace, before filtering.
///
/// Every field is optional: the upstream payload is not trusted to be
/// complete, and `price` is kept as the raw JSON value because the API
/// encodes it as a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub product_name: Option<String>,
    pub price: Option<serde_json::Value>,
    pub product_url: Option<String>,
}

impl CandidateItem {
    pub fn new(name: impl Into<String>, price: impl Into<serde_json::Value>) -> Self {
        Self {
            product_name: Some(name.into()),
            price: Some(price.into()),
            product_url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.product_url = Some(url.into());
        self
    }
}

/// Listing that passed every filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub name: String,
    pub url: String,
    pub price: f64,
}

/// Sort key understood by the marketplace search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    #[default]
    Score,
    CreatedTime,
    Price,
    NumLikes,
}

impl SearchSort {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Score => "SORT_SCORE",
            Self::CreatedTime => "SORT_CREATED_TIME",
            Self::Price => "SORT_PRICE",
            Self::NumLikes => "SORT_NUM_LIKES",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    #[default]
    Desc,
    Asc,
}

impl SearchOrder {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Desc => "ORDER_DESC",
            Self::Asc => "ORDER_ASC",
        }
    }
}

/// Listing status filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Default,
    #[default]
    OnSale,
    SoldOut,
}

impl SearchStatus {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Default => "STATUS_DEFAULT",
            Self::OnSale => "STATUS_ON_SALE",
            Self::SoldOut => "STATUS_SOLD_OUT",
        }
    }
}

/// Parameters of a single upstream search call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub exclude_keywords: String,
    pub sort: SearchSort,
    pub order: SearchOrder,
    pub status: SearchStatus,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            exclude_keywords: String::new(),
            sort: SearchSort::default(),
            order: SearchOrder::default(),
            status: SearchStatus::default(),
        }
    }

    pub fn with_exclude_keywords(mut self, exclude_keywords: impl Into<String>) -> Self {
        self.exclude_keywords = exclude_keywords.into();
        self
    }

    pub fn with_sort(mut self, sort: SearchSort, order: SearchOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn with_status(mut self, status: SearchStatus) -> Self {
        self.status = status;
        self
    }
}
