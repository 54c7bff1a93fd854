use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether the sold-side figures came from a real scrape or the fallback
/// estimator. Always present so callers can weigh confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Real,
    Estimated,
}

/// Discrete demand tier derived from the sell-through rate. Bands are
/// ordered and non-overlapping with boundaries at 25, 50, 75 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Watch,
    Buy,
    StrongBuy,
    Instant,
}

impl Verdict {
    pub fn classify(rate: f64) -> Self {
        match rate {
            r if r >= 100.0 => Verdict::Instant,
            r if r >= 75.0 => Verdict::StrongBuy,
            r if r >= 50.0 => Verdict::Buy,
            r if r >= 25.0 => Verdict::Watch,
            _ => Verdict::Pass,
        }
    }
}

/// `sold / (sold + active) * 100`, one decimal. Zero activity maps to 0.
pub fn sell_through_rate(sold: u32, active: u32) -> f64 {
    let total = sold as f64 + active as f64;
    if total == 0.0 {
        return 0.0;
    }
    round_one(sold as f64 / total * 100.0)
}

/// Price statistics computed in one pass over a single price list; avg,
/// median, low and high always describe the same source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceStats {
    pub avg: f64,
    pub median: f64,
    pub low: f64,
    pub high: f64,
}

impl PriceStats {
    pub fn from_prices(prices: &[f64]) -> Self {
        let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| *p > 0.0).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = sorted.iter().sum();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            avg: round_two(sum / sorted.len() as f64),
            median: round_two(median),
            low: round_two(sorted[0]),
            high: round_two(sorted[sorted.len() - 1]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldSample {
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_on: Option<NaiveDate>,
}

/// The fused, caller-facing market signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignal {
    pub query: String,
    /// Completed sales over the 90-day lookback window.
    pub sold_count: u32,
    pub active_count: u32,
    pub sell_through_rate: f64,
    pub avg_price: f64,
    pub median_price: f64,
    pub price_low: f64,
    pub price_high: f64,
    pub avg_days_to_sell: u32,
    pub verdict: Verdict,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<SoldSample>,
}

pub fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_matches_exact_formula() {
        assert_eq!(sell_through_rate(30, 70), 30.0);
        assert_eq!(sell_through_rate(0, 0), 0.0);
        assert_eq!(sell_through_rate(247, 183), 57.4);
        assert_eq!(sell_through_rate(45, 287), 13.6);
        assert_eq!(sell_through_rate(10, 0), 100.0);
        assert_eq!(sell_through_rate(0, 50), 0.0);
    }

    #[test]
    fn verdict_is_total_over_the_rate_range() {
        let mut rate = 0.0;
        while rate <= 110.0 {
            // classify must never panic and always lands in one tier
            let _ = Verdict::classify(rate);
            rate += 0.1;
        }
    }

    #[test]
    fn verdict_boundaries_are_tier_transitions() {
        assert_ne!(Verdict::classify(24.9), Verdict::classify(25.0));
        assert_ne!(Verdict::classify(49.9), Verdict::classify(50.0));
        assert_ne!(Verdict::classify(74.9), Verdict::classify(75.0));
        assert_ne!(Verdict::classify(99.9), Verdict::classify(100.0));

        assert_eq!(Verdict::classify(0.0), Verdict::Pass);
        assert_eq!(Verdict::classify(13.6), Verdict::Pass);
        assert_eq!(Verdict::classify(25.0), Verdict::Watch);
        assert_eq!(Verdict::classify(57.4), Verdict::Buy);
        assert_eq!(Verdict::classify(75.0), Verdict::StrongBuy);
        assert_eq!(Verdict::classify(100.0), Verdict::Instant);
    }

    #[test]
    fn verdict_is_stable() {
        assert_eq!(Verdict::classify(57.4), Verdict::classify(57.4));
    }

    #[test]
    fn price_stats_single_pass() {
        let stats = PriceStats::from_prices(&[40.0, 10.0, 20.0, 30.0]);
        assert_eq!(stats.low, 10.0);
        assert_eq!(stats.high, 40.0);
        assert_eq!(stats.avg, 25.0);
        assert_eq!(stats.median, 25.0);

        let odd = PriceStats::from_prices(&[15.0, 5.0, 10.0]);
        assert_eq!(odd.median, 10.0);
    }

    #[test]
    fn price_stats_ignore_non_positive_noise() {
        let stats = PriceStats::from_prices(&[0.0, -4.0, 12.0]);
        assert_eq!(stats.low, 12.0);
        assert_eq!(stats.high, 12.0);
    }

    #[test]
    fn price_stats_empty_is_all_zero() {
        assert_eq!(PriceStats::from_prices(&[]), PriceStats::default());
    }
}
