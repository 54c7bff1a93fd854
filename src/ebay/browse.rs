#![allow(non_snake_case)]

use crate::ebay::config::{BROWSE_SEARCH_URL, MARKETPLACE_ID};
use crate::http::build_client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EbayBrowseError {
    #[error("auth rejected: HTTP {0}")]
    Auth(u16),
    #[error("rate limited")]
    RateLimited,
    #[error("upstream error: HTTP {0}")]
    Upstream(u16),
    #[error("request failed: {0}")]
    Request(String),
}

/// Current supply for a query: total as reported by the API (which may
/// exceed the number of items returned) plus the prices of returned items.
#[derive(Debug, Clone, Default)]
pub struct ActiveSnapshot {
    pub count: u32,
    pub prices: Vec<f64>,
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    total: Option<u32>,
    itemSummaries: Option<Vec<ItemSummary>>,
}

#[derive(serde::Deserialize)]
struct ItemSummary {
    price: Option<ItemPrice>,
}

#[derive(serde::Deserialize)]
struct ItemPrice {
    value: Option<String>,
}

/// Query the Browse API for currently-active fixed-price listings.
pub async fn search_active(
    access_token: &str,
    query: &str,
    limit: u32,
) -> Result<ActiveSnapshot, EbayBrowseError> {
    let client = build_client();
    let limit = limit.clamp(1, 200).to_string();
    let response = client
        .get(BROWSE_SEARCH_URL.as_str())
        .bearer_auth(access_token)
        .header("X-EBAY-C-MARKETPLACE-ID", MARKETPLACE_ID.as_str())
        .query(&[
            ("q", query),
            ("limit", &limit),
            ("filter", "buyingOptions:{FIXED_PRICE}"),
        ])
        .send()
        .await
        .map_err(|err| EbayBrowseError::Request(err.to_string()))?;

    let status = response.status();
    match status.as_u16() {
        401 | 403 => return Err(EbayBrowseError::Auth(status.as_u16())),
        429 => return Err(EbayBrowseError::RateLimited),
        code if status.is_server_error() => return Err(EbayBrowseError::Upstream(code)),
        _ if !status.is_success() => {
            return Err(EbayBrowseError::Request(format!("HTTP {status}")));
        }
        _ => {}
    }

    let payload: SearchResponse = response
        .json()
        .await
        .map_err(|err| EbayBrowseError::Request(err.to_string()))?;
    Ok(snapshot_from_response(payload))
}

fn snapshot_from_response(payload: SearchResponse) -> ActiveSnapshot {
    let items = payload.itemSummaries.unwrap_or_default();
    let prices: Vec<f64> = items
        .iter()
        .filter_map(|item| item.price.as_ref())
        .filter_map(|price| price.value.as_deref())
        .filter_map(|value| value.parse::<f64>().ok())
        .filter(|value| *value > 0.0)
        .collect();
    ActiveSnapshot {
        count: payload.total.unwrap_or(items.len() as u32),
        prices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_prefers_the_reported_total_over_returned_items() {
        let payload: SearchResponse = serde_json::from_str(
            r#"{
                "total": 1834,
                "itemSummaries": [
                    {"price": {"value": "59.99", "currency": "USD"}},
                    {"price": {"value": "72.50", "currency": "USD"}}
                ]
            }"#,
        )
        .unwrap();
        let snapshot = snapshot_from_response(payload);
        assert_eq!(snapshot.count, 1834);
        assert_eq!(snapshot.prices, vec![59.99, 72.50]);
    }

    #[test]
    fn snapshot_tolerates_missing_fields_and_bad_prices() {
        let payload: SearchResponse = serde_json::from_str(
            r#"{
                "itemSummaries": [
                    {"price": {"value": "not-a-number"}},
                    {"price": null},
                    {},
                    {"price": {"value": "0"}},
                    {"price": {"value": "19.95"}}
                ]
            }"#,
        )
        .unwrap();
        let snapshot = snapshot_from_response(payload);
        assert_eq!(snapshot.count, 5);
        assert_eq!(snapshot.prices, vec![19.95]);
    }

    #[test]
    fn empty_response_is_an_empty_snapshot() {
        let payload: SearchResponse = serde_json::from_str("{}").unwrap();
        let snapshot = snapshot_from_response(payload);
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.prices.is_empty());
    }
}
