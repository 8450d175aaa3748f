// Mercari search tool: upstream search followed by local post-filtering

use crate::config::SearchSettings;
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_integer, json_schema_object, json_schema_string, Tool};
use anyhow::{Context, Result};
use mercari_core::{filter_candidates, MarketplaceSearch, SearchQuery, SearchRequest};
use std::sync::Arc;

pub const SEARCH_TOOL_NAME: &str = "search_mercari_jp";

/// Tool to search Mercari Japan listings
pub struct SearchMercariTool {
    marketplace: Arc<dyn MarketplaceSearch>,
    settings: SearchSettings,
}

impl SearchMercariTool {
    pub fn new(marketplace: Arc<dyn MarketplaceSearch>, settings: SearchSettings) -> Self {
        Self {
            marketplace,
            settings,
        }
    }

    fn query_for(&self, request: &SearchRequest) -> SearchQuery {
        SearchQuery::new(&request.keyword)
            .with_exclude_keywords(&request.exclude_keywords)
            .with_sort(self.settings.sort, self.settings.order)
            .with_status(self.settings.status)
    }
}

#[async_trait::async_trait]
impl Tool for SearchMercariTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search Mercari Japan for items on sale, excluding keywords and \
                filtering by price and by the words of the product name. Listing names must \
                contain every word of `keyword` and none of `exclude_keywords`."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "keyword": json_schema_string(
                        "The main keyword to search for (e.g. 'iPhone15 Pro 256GB'). Sometimes it has to be in Japanese."
                    ),
                    "exclude_keywords": json_schema_string(
                        "Space-separated keywords to exclude (e.g. 'ジャンク max ケース'). Default: empty"
                    ),
                    "min_price": json_schema_integer("Minimum price in JPY", 0),
                    "max_price": json_schema_integer("Maximum price in JPY", 0),
                    "limit": json_schema_integer("Maximum number of items to return (default: 20)", 1)
                }),
                vec!["keyword"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let request: SearchRequest = match serde_json::from_value(arguments) {
            Ok(request) => request,
            Err(e) => {
                return Ok(CallToolResult::error(format!(
                    "Invalid arguments for {}: {}",
                    SEARCH_TOOL_NAME, e
                )));
            }
        };

        if let Err(e) = request.validate() {
            return Ok(CallToolResult::error(format!(
                "Invalid arguments for {}: {}",
                SEARCH_TOOL_NAME, e
            )));
        }

        let query = self.query_for(&request);
        tracing::info!(
            keyword = %query.keyword,
            exclude = %query.exclude_keywords,
            sort = query.sort.as_api_str(),
            "Searching Mercari"
        );

        let candidates = match self.marketplace.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Mercari search failed");
                return Ok(CallToolResult::error(format!("Mercari search failed: {}", e)));
            }
        };

        let outcome = filter_candidates(&request, &self.settings.base_exclusions, &candidates);
        tracing::info!(
            candidates = candidates.len(),
            scanned = outcome.scanned,
            skipped = outcome.skipped.len(),
            matched = outcome.items.len(),
            "Search complete"
        );

        let json = serde_json::to_string(&outcome.items).context("Failed to encode results")?;
        Ok(CallToolResult::text(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercari_core::{
        CandidateItem, MarketplaceError, MarketplaceResult, ResultItem, SearchOrder, SearchSort,
        SearchStatus,
    };
    use serde_json::json;
    use std::sync::Mutex;

    /// Marketplace returning a fixed candidate list and recording queries
    #[derive(Default)]
    struct FakeMarketplace {
        candidates: Vec<CandidateItem>,
        queries: Mutex<Vec<SearchQuery>>,
    }

    #[async_trait::async_trait]
    impl MarketplaceSearch for FakeMarketplace {
        async fn search(&self, query: &SearchQuery) -> MarketplaceResult<Vec<CandidateItem>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.candidates.clone())
        }
    }

    struct FailingMarketplace;

    #[async_trait::async_trait]
    impl MarketplaceSearch for FailingMarketplace {
        async fn search(&self, _query: &SearchQuery) -> MarketplaceResult<Vec<CandidateItem>> {
            Err(MarketplaceError::Api {
                status: 503,
                message: "maintenance".to_string(),
            })
        }
    }

    fn iphone_candidates() -> Vec<CandidateItem> {
        vec![
            CandidateItem::new("iPhone15 Pro 256GB 美品", "120000")
                .with_url("https://jp.mercari.com/item/m1"),
            CandidateItem::new("iPhone15 Pro Max 256GB", "125000")
                .with_url("https://jp.mercari.com/item/m2"),
            CandidateItem::new("iPhone15 Pro 256GB", "90000")
                .with_url("https://jp.mercari.com/item/m3"),
            CandidateItem {
                product_name: None,
                price: Some(json!("100000")),
                product_url: None,
            },
        ]
    }

    fn parse_items(result: &CallToolResult) -> Vec<ResultItem> {
        serde_json::from_str(result.first_text().unwrap()).unwrap()
    }

    #[test]
    fn test_schema() {
        let tool = SearchMercariTool::new(Arc::new(FakeMarketplace::default()), SearchSettings::default());
        let schema = tool.schema();

        assert_eq!(schema.name, "search_mercari_jp");
        assert_eq!(schema.input_schema["required"], json!(["keyword"]));
        assert_eq!(schema.input_schema["properties"]["limit"]["minimum"], 1);
        assert_eq!(schema.input_schema["properties"]["min_price"]["type"], "integer");
    }

    #[tokio::test]
    async fn test_execute_filters_results() {
        let marketplace = Arc::new(FakeMarketplace {
            candidates: iphone_candidates(),
            ..Default::default()
        });
        let tool = SearchMercariTool::new(marketplace.clone(), SearchSettings::default());

        let result = tool
            .execute(json!({
                "keyword": "iPhone15 Pro 256GB",
                "exclude_keywords": "max 12",
                "min_price": 100000,
                "max_price": 150000
            }))
            .await
            .unwrap();

        assert!(!result.is_error());
        let items = parse_items(&result);
        assert_eq!(
            items,
            vec![ResultItem {
                name: "iPhone15 Pro 256GB 美品".to_string(),
                url: "https://jp.mercari.com/item/m1".to_string(),
                price: 120000.0,
            }]
        );

        let queries = marketplace.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].keyword, "iPhone15 Pro 256GB");
        assert_eq!(queries[0].exclude_keywords, "max 12");
        assert_eq!(queries[0].sort, SearchSort::Score);
        assert_eq!(queries[0].order, SearchOrder::Desc);
        assert_eq!(queries[0].status, SearchStatus::OnSale);
    }

    #[tokio::test]
    async fn test_execute_applies_settings() {
        let marketplace = Arc::new(FakeMarketplace {
            candidates: iphone_candidates(),
            ..Default::default()
        });
        let settings = SearchSettings {
            sort: SearchSort::Price,
            order: SearchOrder::Asc,
            base_exclusions: vec!["美品".to_string()],
            ..Default::default()
        };
        let tool = SearchMercariTool::new(marketplace.clone(), settings);

        let result = tool
            .execute(json!({ "keyword": "iPhone15 Pro", "exclude_keywords": "max" }))
            .await
            .unwrap();

        let names: Vec<String> = parse_items(&result).into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["iPhone15 Pro 256GB"]);

        let queries = marketplace.queries.lock().unwrap();
        assert_eq!(queries[0].sort, SearchSort::Price);
        assert_eq!(queries[0].order, SearchOrder::Asc);
    }

    #[tokio::test]
    async fn test_execute_respects_limit() {
        let candidates = (0..30)
            .map(|i| CandidateItem::new(format!("Switch {}", i), 1000 * i))
            .collect();
        let marketplace = Arc::new(FakeMarketplace {
            candidates,
            ..Default::default()
        });
        let tool = SearchMercariTool::new(marketplace, SearchSettings::default());

        let default_limit = tool.execute(json!({ "keyword": "switch" })).await.unwrap();
        assert_eq!(parse_items(&default_limit).len(), 20);

        let limited = tool
            .execute(json!({ "keyword": "switch", "limit": 5 }))
            .await
            .unwrap();
        assert_eq!(parse_items(&limited).len(), 5);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let tool = SearchMercariTool::new(Arc::new(FailingMarketplace), SearchSettings::default());

        let result = tool.execute(json!({ "keyword": "switch" })).await.unwrap();

        assert!(result.is_error());
        assert!(result.first_text().unwrap().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_upstream() {
        let marketplace = Arc::new(FakeMarketplace::default());
        let tool = SearchMercariTool::new(marketplace.clone(), SearchSettings::default());

        for arguments in [
            json!({}),
            json!({ "keyword": "" }),
            json!({ "keyword": "switch", "limit": 0 }),
            json!({ "keyword": "switch", "min_price": -5 }),
            json!({ "keyword": "switch", "min_price": 5000, "max_price": 1000 }),
        ] {
            let result = tool.execute(arguments.clone()).await.unwrap();
            assert!(result.is_error(), "expected error for {}", arguments);
        }

        assert!(marketplace.queries.lock().unwrap().is_empty());
    }
}
