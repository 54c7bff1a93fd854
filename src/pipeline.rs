use crate::cache::SignalCache;
use crate::ebay::{ActiveSnapshot, TokenManager, browse};
use crate::estimator;
use crate::models::Condition;
use crate::query::{self, CacheKey};
use crate::scrape::{self, SoldSnapshot};
use crate::signal::{DataSource, MarketSignal, PriceStats, SoldSample, Verdict, sell_through_rate};
use crate::speed;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Upper bound on sample listings echoed back to the caller.
const MAX_SAMPLE_LISTINGS: usize = 10;

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    SourceUnavailable,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn source_unavailable(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::SourceUnavailable,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// The only component that knows the overall flow: cache lookup, concurrent
/// source fetch, fusion, cache write.
#[derive(Clone)]
pub struct Pipeline {
    pub cache: SignalCache,
    tokens: Arc<TokenManager>,
    active_limit: u32,
}

impl Pipeline {
    pub fn from_env() -> Self {
        Self {
            cache: SignalCache::from_env(),
            tokens: Arc::new(TokenManager::new()),
            active_limit: active_limit_from_env(),
        }
    }

    pub async fn research(
        &self,
        raw_query: &str,
        condition: Option<Condition>,
        max_samples: Option<usize>,
    ) -> Result<MarketSignal, PipelineError> {
        let normalized = query::normalize(raw_query);
        let key = CacheKey::derive(&normalized, condition);

        if let Some(cached) = self.cache.get(&key).await {
            crate::metrics::cache_result("hit");
            info!(target = "scout.pipeline", query = %normalized, "serving cached signal");
            return Ok(cached);
        }
        crate::metrics::cache_result("miss");

        // The two sources are independent; neither may wait on the other.
        // The token exchange only ever delays the active-listings leg.
        let started = Instant::now();
        let active_leg = async {
            let token = self
                .tokens
                .token()
                .await
                .map_err(|err| PipelineError::source_unavailable("ebay_auth", err.to_string()))?;
            browse::search_active(&token, &normalized, self.active_limit)
                .await
                .map_err(|err| {
                    PipelineError::source_unavailable("active_listings", err.to_string())
                })
        };
        let sold_leg = scrape::fetch_sold(&normalized, condition);
        let (active_result, sold) = tokio::join!(active_leg, sold_leg);
        crate::metrics::stage_elapsed("fetch_sources", started.elapsed().as_millis());

        // Without active-listing data there is nothing honest to report.
        let active = active_result?;

        if !sold.success {
            warn!(
                target = "scout.pipeline",
                query = %normalized,
                "scrape unconfirmed; falling back to estimator"
            );
        }

        let max_samples = max_samples
            .unwrap_or(MAX_SAMPLE_LISTINGS)
            .min(MAX_SAMPLE_LISTINGS);
        let signal = fuse(normalized.clone(), &active, &sold, max_samples);
        crate::metrics::signal_source(signal.data_source, sold.strategy);
        info!(
            target = "scout.pipeline",
            query = %normalized,
            sold_count = signal.sold_count,
            active_count = signal.active_count,
            rate = signal.sell_through_rate,
            strategy = sold.strategy,
            "signal fused"
        );

        self.cache.put(&key, &signal).await;
        Ok(signal)
    }
}

/// Fold both snapshots into the caller-facing signal. All price statistics
/// come from one list per pass: the scraped sale prices when the scrape
/// produced any, the active-listing prices otherwise.
fn fuse(
    query: String,
    active: &ActiveSnapshot,
    sold: &SoldSnapshot,
    max_samples: usize,
) -> MarketSignal {
    let (sold_count, data_source) = if sold.success {
        (sold.sold_count, DataSource::Real)
    } else {
        (
            estimator::estimate_sold(active.count, &active.prices),
            DataSource::Estimated,
        )
    };

    let price_source: &[f64] = if sold.success && !sold.prices.is_empty() {
        &sold.prices
    } else {
        &active.prices
    };
    let stats = PriceStats::from_prices(price_source);

    let rate = sell_through_rate(sold_count, active.count);
    let samples = if sold.success {
        sold.prices
            .iter()
            .take(max_samples)
            .enumerate()
            .map(|(idx, price)| SoldSample {
                price: *price,
                sold_on: sold.dates.get(idx).copied(),
            })
            .collect()
    } else {
        Vec::new()
    };

    MarketSignal {
        query,
        sold_count,
        active_count: active.count,
        sell_through_rate: rate,
        avg_price: stats.avg,
        median_price: stats.median,
        price_low: stats.low,
        price_high: stats.high,
        avg_days_to_sell: speed::estimate_days_to_sell(stats.median, stats.median, rate),
        verdict: Verdict::classify(rate),
        data_source,
        samples,
    }
}

fn active_limit_from_env() -> u32 {
    std::env::var("ACTIVE_RESULT_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn active(count: u32, prices: &[f64]) -> ActiveSnapshot {
        ActiveSnapshot {
            count,
            prices: prices.to_vec(),
        }
    }

    fn scraped(sold_count: u32, prices: &[f64]) -> SoldSnapshot {
        SoldSnapshot {
            success: true,
            sold_count,
            prices: prices.to_vec(),
            dates: Vec::new(),
            strategy: "heading-bold",
        }
    }

    fn failed_scrape() -> SoldSnapshot {
        SoldSnapshot {
            success: false,
            sold_count: 0,
            prices: Vec::new(),
            dates: Vec::new(),
            strategy: "none",
        }
    }

    #[test]
    fn real_scrape_keeps_the_real_tag_and_scraped_prices() {
        let signal = fuse(
            "nike dunk".into(),
            &active(183, &[500.0]),
            &scraped(247, &[80.0, 90.0, 100.0]),
            MAX_SAMPLE_LISTINGS,
        );
        assert_eq!(signal.data_source, DataSource::Real);
        assert_eq!(signal.sold_count, 247);
        assert_eq!(signal.sell_through_rate, 57.4);
        assert_eq!(signal.verdict, Verdict::Buy);
        // scraped prices, not the active snapshot's, feed every stat
        assert_eq!(signal.median_price, 90.0);
        assert_eq!(signal.price_high, 100.0);
    }

    #[test]
    fn failed_scrape_routes_through_the_estimator() {
        let signal = fuse(
            "rare widget".into(),
            &active(120, &[40.0, 42.0, 41.0, 39.0, 40.5]),
            &failed_scrape(),
            MAX_SAMPLE_LISTINGS,
        );
        assert_eq!(signal.data_source, DataSource::Estimated);
        assert!(signal.sold_count >= 1);
        assert!(signal.samples.is_empty());
        // estimated sold count still obeys the sell-through identity
        assert_eq!(
            signal.sell_through_rate,
            sell_through_rate(signal.sold_count, 120)
        );
    }

    #[test]
    fn confirmed_zero_is_real_and_skips_the_estimator() {
        let zero = SoldSnapshot {
            success: true,
            sold_count: 0,
            prices: Vec::new(),
            dates: Vec::new(),
            strategy: "zero-confirmed",
        };
        let signal = fuse("dead product".into(), &active(40, &[25.0]), &zero, 10);
        assert_eq!(signal.data_source, DataSource::Real);
        assert_eq!(signal.sold_count, 0);
        assert_eq!(signal.sell_through_rate, 0.0);
        assert_eq!(signal.verdict, Verdict::Pass);
    }

    #[test]
    fn no_activity_at_all_is_a_zero_rate_pass() {
        let zero = SoldSnapshot {
            success: true,
            sold_count: 0,
            prices: Vec::new(),
            dates: Vec::new(),
            strategy: "zero-confirmed",
        };
        let signal = fuse("ghost town".into(), &active(0, &[]), &zero, 10);
        assert_eq!(signal.sell_through_rate, 0.0);
        assert_eq!(signal.verdict, Verdict::Pass);
    }

    #[test]
    fn samples_are_bounded_and_carry_dates() {
        let mut sold = scraped(30, &[10.0, 20.0, 30.0]);
        sold.dates = vec![
            NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
        ];
        let signal = fuse("lego set".into(), &active(10, &[]), &sold, 2);
        assert_eq!(signal.samples.len(), 2);
        assert_eq!(signal.samples[0].price, 10.0);
        assert_eq!(
            signal.samples[0].sold_on,
            Some(NaiveDate::from_ymd_opt(2025, 10, 3).unwrap())
        );

        let capped = fuse("lego set".into(), &active(10, &[]), &sold, 50);
        assert!(capped.samples.len() <= MAX_SAMPLE_LISTINGS);
    }

    #[test]
    fn fusion_never_mixes_price_sources() {
        // Scrape succeeded but returned no card prices: stats must come
        // wholly from the active list rather than a blend.
        let signal = fuse(
            "ps5 slim".into(),
            &active(50, &[400.0, 450.0]),
            &scraped(60, &[]),
            10,
        );
        assert_eq!(signal.price_low, 400.0);
        assert_eq!(signal.price_high, 450.0);
        assert_eq!(signal.avg_price, 425.0);
    }
}
