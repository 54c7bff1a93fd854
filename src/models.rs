use crate::insights::Insight;
use crate::signal::MarketSignal;
use serde::{Deserialize, Serialize};

/// Optional condition filter applied to both data sources and folded into
/// the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    New,
    Used,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignalRequest {
    pub query: String,
    #[serde(default)]
    pub condition: Option<Condition>,
    /// When set, the response carries a days-to-sell estimate for this
    /// candidate list price.
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub include_insights: bool,
    #[serde(default)]
    pub max_samples: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResponse {
    #[serde(flatten)]
    pub signal: MarketSignal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedEstimate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SpeedRequest {
    pub list_price: f64,
    pub median_price: f64,
    pub sell_through_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedEstimate {
    pub list_price: f64,
    pub estimated_days_to_sell: u32,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
