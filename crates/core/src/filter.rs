// Post-filtering of marketplace candidates by name terms and price range

use crate::types::{CandidateItem, ResultItem, SearchRequest, MISSING_URL};
use serde::Serialize;

/// Lowercased terms a listing name must and must not contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerms {
    required: Vec<String>,
    unwanted: Vec<String>,
}

impl FilterTerms {
    /// Build terms from the request keyword, its exclusion list and any
    /// deployment-wide base exclusions.
    ///
    /// A term that is required is never also unwanted.
    pub fn new(keyword: &str, exclude_keywords: &str, base_exclusions: &[String]) -> Self {
        let required = split_terms(keyword);

        let mut unwanted: Vec<String> = Vec::new();
        let candidates = base_exclusions
            .iter()
            .flat_map(|term| split_terms(term))
            .chain(split_terms(exclude_keywords));
        for term in candidates {
            if !required.contains(&term) && !unwanted.contains(&term) {
                unwanted.push(term);
            }
        }

        Self { required, unwanted }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn unwanted(&self) -> &[String] {
        &self.unwanted
    }

    /// Substring match: every required term present, no unwanted term present
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.required.iter().all(|term| name.contains(term.as_str()))
            && !self.unwanted.iter().any(|term| name.contains(term.as_str()))
    }
}

fn split_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Inclusive price bounds, either side optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl PriceRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        let above_min = self.min.map_or(true, |min| price >= min as f64);
        let below_max = self.max.map_or(true, |max| price <= max as f64);
        above_min && below_max
    }
}

/// Interpret a numeric-like JSON value as a price.
///
/// Accepts JSON numbers and numeric strings. Anything else, including
/// non-finite values, is treated as malformed.
pub fn parse_price(value: &serde_json::Value) -> Option<f64> {
    let price = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

/// Why a candidate was dropped without being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingName,
    MissingPrice,
    MalformedPrice,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "missing product name"),
            Self::MissingPrice => write!(f, "missing price"),
            Self::MalformedPrice => write!(f, "invalid price format"),
        }
    }
}

/// Result of evaluating one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept(ResultItem),
    Reject,
    Skip(SkipReason),
}

/// Per-candidate predicate with no side effects
pub fn evaluate(terms: &FilterTerms, range: &PriceRange, item: &CandidateItem) -> Verdict {
    let Some(name) = item.product_name.as_deref() else {
        return Verdict::Skip(SkipReason::MissingName);
    };
    let Some(raw_price) = item.price.as_ref() else {
        return Verdict::Skip(SkipReason::MissingPrice);
    };
    let Some(price) = parse_price(raw_price) else {
        return Verdict::Skip(SkipReason::MalformedPrice);
    };

    if !terms.matches_name(name) || !range.contains(price) {
        return Verdict::Reject;
    }

    Verdict::Accept(ResultItem {
        name: name.to_string(),
        url: item
            .product_url
            .clone()
            .unwrap_or_else(|| MISSING_URL.to_string()),
        price,
    })
}

/// Candidate dropped because of bad upstream data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// Position in the upstream result list
    pub index: usize,
    pub reason: SkipReason,
}

/// Accepted listings plus diagnostics about the scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub items: Vec<ResultItem>,
    /// Candidates examined before the limit was reached
    pub scanned: usize,
    pub skipped: Vec<SkippedItem>,
}

/// Filter candidates in upstream order and stop at `request.limit` accepted items
pub fn filter_candidates(
    request: &SearchRequest,
    base_exclusions: &[String],
    candidates: &[CandidateItem],
) -> FilterOutcome {
    let terms = FilterTerms::new(&request.keyword, &request.exclude_keywords, base_exclusions);
    let range = PriceRange::new(request.min_price, request.max_price);

    tracing::debug!(
        required = ?terms.required(),
        unwanted = ?terms.unwanted(),
        min_price = ?range.min,
        max_price = ?range.max,
        "Filtering candidates"
    );

    let mut outcome = FilterOutcome::default();
    if request.limit == 0 {
        return outcome;
    }

    for (index, item) in candidates.iter().enumerate() {
        outcome.scanned += 1;

        match evaluate(&terms, &range, item) {
            Verdict::Accept(result) => {
                outcome.items.push(result);
                if outcome.items.len() >= request.limit {
                    break;
                }
            }
            Verdict::Reject => {}
            Verdict::Skip(reason) => {
                tracing::warn!(
                    index,
                    name = item.product_name.as_deref().unwrap_or("<none>"),
                    %reason,
                    "Skipping candidate"
                );
                outcome.skipped.push(SkippedItem { index, reason });
            }
        }
    }

    outcome
}
