use crate::signal::{DataSource, MarketSignal};
use serde::Serialize;

const MAX_INSIGHTS: usize = 3;

/// A short contextual observation about a market signal. Lower priority
/// numbers are surfaced first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub text: String,
    pub icon: &'static str,
    pub priority: u8,
}

type Rule = fn(&MarketSignal) -> Option<Insight>;

/// Rules are independent of each other: each inspects the signal on its own
/// and emits at most one insight. Ordering here is registration order only;
/// ranking happens centrally on the priority field.
const RULES: &[Rule] = &[
    no_confirmed_sales,
    estimate_caution,
    hot_demand,
    solid_demand,
    weak_demand,
    thin_supply,
    saturated_supply,
    wide_price_spread,
    strong_price_point,
];

pub fn generate(signal: &MarketSignal) -> Vec<Insight> {
    let mut insights: Vec<Insight> = RULES.iter().filter_map(|rule| rule(signal)).collect();
    insights.sort_by_key(|insight| insight.priority);
    insights.truncate(MAX_INSIGHTS);
    insights
}

fn no_confirmed_sales(signal: &MarketSignal) -> Option<Insight> {
    (signal.data_source == DataSource::Real && signal.sold_count == 0).then(|| Insight {
        text: "No confirmed sales in the last 90 days — demand looks dead at this price point"
            .into(),
        icon: "🧊",
        priority: 1,
    })
}

fn estimate_caution(signal: &MarketSignal) -> Option<Insight> {
    (signal.data_source == DataSource::Estimated).then(|| Insight {
        text: "Sold figures are estimated from active supply; verify before committing real money"
            .into(),
        icon: "⚠️",
        priority: 2,
    })
}

fn hot_demand(signal: &MarketSignal) -> Option<Insight> {
    (signal.sell_through_rate >= 75.0).then(|| Insight {
        text: format!(
            "{:.1}% sell-through — demand clears nearly everything listed",
            signal.sell_through_rate
        ),
        icon: "🔥",
        priority: 3,
    })
}

fn solid_demand(signal: &MarketSignal) -> Option<Insight> {
    (50.0..75.0)
        .contains(&signal.sell_through_rate)
        .then(|| Insight {
            text: format!(
                "{:.1}% sell-through — solid demand with room to price competitively",
                signal.sell_through_rate
            ),
            icon: "📈",
            priority: 4,
        })
}

fn weak_demand(signal: &MarketSignal) -> Option<Insight> {
    (signal.sell_through_rate < 25.0 && signal.sold_count > 0).then(|| Insight {
        text: "Listings heavily outnumber sales; expect a long hold or a price cut".into(),
        icon: "🐌",
        priority: 4,
    })
}

fn thin_supply(signal: &MarketSignal) -> Option<Insight> {
    (signal.active_count < 10 && signal.sold_count > 0).then(|| Insight {
        text: format!(
            "Only {} active listings against {} recent sales — sellers have pricing power",
            signal.active_count, signal.sold_count
        ),
        icon: "🎯",
        priority: 5,
    })
}

fn saturated_supply(signal: &MarketSignal) -> Option<Insight> {
    (signal.active_count > 200).then(|| Insight {
        text: format!(
            "{} active listings — a crowded market where undercutting decides who sells",
            signal.active_count
        ),
        icon: "📦",
        priority: 6,
    })
}

fn wide_price_spread(signal: &MarketSignal) -> Option<Insight> {
    (signal.samples.len() >= 4 && signal.price_low > 0.0 && signal.price_high / signal.price_low >= 3.0)
        .then(|| Insight {
            text: format!(
                "Sold prices span ${:.0}–${:.0}; condition and completeness drive big margins",
                signal.price_low, signal.price_high
            ),
            icon: "💰",
            priority: 7,
        })
}

fn strong_price_point(signal: &MarketSignal) -> Option<Insight> {
    (signal.median_price >= 100.0 && signal.sell_through_rate >= 50.0).then(|| Insight {
        text: format!(
            "Median sale of ${:.0} with healthy turnover — worth sourcing at the right buy cost",
            signal.median_price
        ),
        icon: "💵",
        priority: 8,
    })
}
