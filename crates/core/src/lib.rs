// Core types and search logic for the Mercari MCP tool

pub mod error;
pub mod filter;
pub mod marketplace;
pub mod types;

pub use error::{MarketplaceError, MarketplaceResult};
pub use filter::{filter_candidates, FilterOutcome, FilterTerms, PriceRange, SkipReason};
pub use marketplace::{HttpMarketplace, MarketplaceConfig, MarketplaceSearch};
pub use types::*;
