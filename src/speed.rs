//! Days-to-sell estimation for a candidate list price.

const BASELINE_MAX_DAYS: f64 = 90.0;
const BASELINE_MIN_DAYS: f64 = 3.0;
const MAX_DAYS: u32 = 365;

/// Estimate how long a listing at `list_price` takes to sell in a market
/// with the given median sold price and sell-through rate.
///
/// Baseline days fall linearly as the rate rises; a piecewise multiplier on
/// the price-to-median ratio then stretches or compresses the baseline.
/// Monotone non-decreasing in the ratio for a fixed rate, and monotone
/// non-increasing in the rate for a fixed ratio.
pub fn estimate_days_to_sell(list_price: f64, median_price: f64, sell_through_rate: f64) -> u32 {
    let rate = sell_through_rate.clamp(0.0, 100.0);
    let baseline = (BASELINE_MAX_DAYS * (1.0 - rate / 100.0)).max(BASELINE_MIN_DAYS);

    let ratio = if median_price > 0.0 {
        list_price / median_price
    } else {
        1.0
    };

    let days = (baseline * ratio_multiplier(ratio)).round() as i64;
    (days.max(1) as u32).min(MAX_DAYS)
}

fn ratio_multiplier(ratio: f64) -> f64 {
    match ratio {
        r if r <= 0.8 => 0.5,
        r if r <= 1.1 => 1.0,
        r if r <= 1.3 => 1.6,
        r if r <= 1.6 => 2.5,
        _ => 4.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underpricing_sells_faster_overpricing_slower() {
        let median = 100.0;
        let at_median = estimate_days_to_sell(median, median, 60.0);
        assert!(estimate_days_to_sell(median * 0.5, median, 60.0) <= at_median);
        assert!(estimate_days_to_sell(median * 2.0, median, 60.0) >= at_median);
    }

    #[test]
    fn monotone_in_price_ratio_for_fixed_rate() {
        let median = 80.0;
        let mut last = 0;
        for price in [20.0, 60.0, 80.0, 95.0, 100.0, 120.0, 200.0] {
            let days = estimate_days_to_sell(price, median, 45.0);
            assert!(days >= last, "days regressed at price {price}");
            last = days;
        }
    }

    #[test]
    fn monotone_in_rate_for_fixed_ratio() {
        let mut last = u32::MAX;
        for rate in [0.0, 10.0, 25.0, 50.0, 75.0, 90.0, 100.0] {
            let days = estimate_days_to_sell(50.0, 50.0, rate);
            assert!(days <= last, "days grew at rate {rate}");
            last = days;
        }
    }

    #[test]
    fn result_is_clamped_to_a_sane_range() {
        assert!(estimate_days_to_sell(1000.0, 10.0, 0.0) <= MAX_DAYS);
        assert!(estimate_days_to_sell(1.0, 100.0, 100.0) >= 1);
    }

    #[test]
    fn unknown_median_leaves_baseline_untouched() {
        assert_eq!(
            estimate_days_to_sell(50.0, 0.0, 40.0),
            estimate_days_to_sell(60.0, 60.0, 40.0),
        );
    }
}
