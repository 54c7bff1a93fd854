//! Best-effort scraper for the public sold/completed listings page.
//!
//! The page structure is externally controlled and changes without notice,
//! so the count extraction runs an ordered set of independent strategies
//! and records which one matched. Nothing here is allowed to error past
//! the module boundary: every failure collapses into a snapshot with
//! `success = false`, which the pipeline routes to the fallback estimator.

use crate::ebay::config::SOLD_SEARCH_URL;
use crate::http::build_scrape_client;
use crate::models::Condition;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use urlencoding::encode;

/// Page-size hint sent with the request; also the cap for card-census counts.
const PAGE_SIZE: u32 = 240;

/// Parsed amounts at or above this are treated as parser noise, not prices.
const PRICE_CEILING: f64 = 100_000.0;

const BOT_MARKERS: &[&str] = &[
    "pardon our interruption",
    "checking your browser",
    "verify yourself to continue",
    "captcha",
];

const ZERO_MARKER: &str = "no exact matches found";

static ZERO_RESULTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0\s+results?\b").expect("zero-results regex"));

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+)\s+results?").expect("count regex"));

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*([\d,]+(?:\.\d{1,2})?)").expect("price regex"));

static SOLD_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sold\s+(\w{3}\s+\d{1,2},\s+\d{4})").expect("sold-date regex"));

/// What the scrape produced. A `sold_count` of zero is only trustworthy
/// when `success` is true (confirmed by the page itself); otherwise the
/// scrape failed and the count is unknown.
#[derive(Debug, Clone)]
pub struct SoldSnapshot {
    pub success: bool,
    pub sold_count: u32,
    pub prices: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    /// Name of the parsing strategy that produced the count.
    pub strategy: &'static str,
}

impl SoldSnapshot {
    fn failed() -> Self {
        Self {
            success: false,
            sold_count: 0,
            prices: Vec::new(),
            dates: Vec::new(),
            strategy: "none",
        }
    }

    fn confirmed_zero() -> Self {
        Self {
            success: true,
            sold_count: 0,
            prices: Vec::new(),
            dates: Vec::new(),
            strategy: "zero-confirmed",
        }
    }
}

/// Fetch and parse the sold-listings page for a normalized query.
pub async fn fetch_sold(query: &str, condition: Option<Condition>) -> SoldSnapshot {
    let url = build_sold_url(query, condition);
    let client = build_scrape_client();
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(target = "scout.scrape", query, error = %err, "sold page fetch failed");
            return SoldSnapshot::failed();
        }
    };

    if !response.status().is_success() {
        warn!(
            target = "scout.scrape",
            query,
            status = response.status().as_u16(),
            "sold page returned non-success status"
        );
        return SoldSnapshot::failed();
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            warn!(target = "scout.scrape", query, error = %err, "sold page body unreadable");
            return SoldSnapshot::failed();
        }
    };

    let snapshot = parse_sold_page(&body);
    debug!(
        target = "scout.scrape",
        query,
        success = snapshot.success,
        sold_count = snapshot.sold_count,
        strategy = snapshot.strategy,
        "sold page parsed"
    );
    snapshot
}

fn build_sold_url(query: &str, condition: Option<Condition>) -> String {
    let mut url = format!(
        "{}?_nkw={}&LH_Sold=1&LH_Complete=1&_ipg={}",
        *SOLD_SEARCH_URL,
        encode(query),
        PAGE_SIZE
    );
    match condition {
        Some(Condition::New) => url.push_str("&LH_ItemCondition=1000"),
        Some(Condition::Used) => url.push_str("&LH_ItemCondition=3000"),
        None => {}
    }
    url
}

fn parse_sold_page(html: &str) -> SoldSnapshot {
    let lowered = html.to_lowercase();
    if BOT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        warn!(target = "scout.scrape", "bot challenge page detected");
        return SoldSnapshot::failed();
    }

    // An explicit empty result page is a real signal, not a parse failure.
    if lowered.contains(ZERO_MARKER) || ZERO_RESULTS_RE.is_match(&lowered) {
        return SoldSnapshot::confirmed_zero();
    }

    let document = Html::parse_document(html);

    let mut count = None;
    let mut strategy = "none";
    for &(name, extract) in COUNT_STRATEGIES {
        if let Some(found) = extract(&document) {
            count = Some(found);
            strategy = name;
            break;
        }
    }

    let Some(sold_count) = count else {
        return SoldSnapshot::failed();
    };

    let (prices, dates) = extract_sales(&document);
    SoldSnapshot {
        success: true,
        sold_count,
        prices,
        dates,
        strategy,
    }
}

// --- count strategies, highest-confidence first ---

const COUNT_STRATEGIES: &[(&str, fn(&Html) -> Option<u32>)] = &[
    ("heading-bold", count_from_heading_bold),
    ("heading-span", count_from_heading_span),
    ("heading-regex", count_from_heading_regex),
    ("count-node", count_from_count_node),
    ("card-census", count_from_card_census),
];

fn count_from_heading_bold(document: &Html) -> Option<u32> {
    first_text(document, "h1.srp-controls__count-heading span.BOLD").and_then(parse_count)
}

fn count_from_heading_span(document: &Html) -> Option<u32> {
    first_text(document, "h1.srp-controls__count-heading span").and_then(parse_count)
}

fn count_from_heading_regex(document: &Html) -> Option<u32> {
    let heading = first_text(document, "h1.srp-controls__count-heading")?;
    let captured = COUNT_RE.captures(&heading)?;
    parse_count(captured.get(1)?.as_str().to_string())
}

fn count_from_count_node(document: &Html) -> Option<u32> {
    first_text(
        document,
        "h2.srp-controls__count-heading, .result-count__count-heading",
    )
    .and_then(|text| {
        COUNT_RE
            .captures(&text)
            .and_then(|captured| captured.get(1))
            .map(|m| m.as_str().to_string())
            .or(Some(text))
    })
    .and_then(parse_count)
}

/// Last resort: count result cards that carry a price. Bounded by the page
/// size, so it undercounts large markets but still separates "something
/// sold" from "nothing parseable".
fn count_from_card_census(document: &Html) -> Option<u32> {
    for &(card_sel, price_sel, _) in CARD_LAYOUTS {
        let Ok(cards) = Selector::parse(card_sel) else {
            continue;
        };
        let Ok(price) = Selector::parse(price_sel) else {
            continue;
        };
        let priced = document
            .select(&cards)
            .filter(|card| card.select(&price).next().is_some())
            .take(PAGE_SIZE as usize)
            .count() as u32;
        if priced > 0 {
            return Some(priced);
        }
    }
    None
}

// --- price and date extraction over result cards ---

/// (card, price, caption) selector triples. The current layout comes
/// first; the legacy layout survives on older page variants.
const CARD_LAYOUTS: &[(&str, &str, &str)] = &[
    (".s-card", ".s-card__price", ".s-card__caption"),
    (".s-item", ".s-item__price", ".s-item__caption"),
];

fn extract_sales(document: &Html) -> (Vec<f64>, Vec<NaiveDate>) {
    for &(card_sel, price_sel, caption_sel) in CARD_LAYOUTS {
        let Ok(cards) = Selector::parse(card_sel) else {
            continue;
        };
        let Ok(price) = Selector::parse(price_sel) else {
            continue;
        };
        let Ok(caption) = Selector::parse(caption_sel) else {
            continue;
        };

        let mut prices = Vec::new();
        let mut dates = Vec::new();
        let mut saw_card = false;
        for card in document.select(&cards) {
            saw_card = true;
            if let Some(value) = card
                .select(&price)
                .next()
                .map(element_text)
                .and_then(|text| parse_price(&text))
            {
                prices.push(value);
            }
            if let Some(date) = card
                .select(&caption)
                .next()
                .map(element_text)
                .and_then(|text| parse_sold_date(&text))
            {
                dates.push(date);
            }
        }
        if saw_card {
            return (prices, dates);
        }
    }
    (Vec::new(), Vec::new())
}

fn first_text(document: &Html, raw_selector: &str) -> Option<String> {
    let Ok(selector) = Selector::parse(raw_selector) else {
        return None;
    };
    document.select(&selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_count(text: String) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok().filter(|count| *count > 0)
}

/// First currency amount in the text (range prices like "$12 to $18" take
/// the leading figure), rejected outside the sane range.
fn parse_price(text: &str) -> Option<f64> {
    let captured = PRICE_RE.captures(text)?;
    let raw = captured.get(1)?.as_str().replace(',', "");
    raw.parse::<f64>()
        .ok()
        .filter(|price| *price > 0.0 && *price < PRICE_CEILING)
}

fn parse_sold_date(text: &str) -> Option<NaiveDate> {
    let captured = SOLD_DATE_RE.captures(text)?;
    let normalized = captured
        .get(1)?
        .as_str()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    NaiveDate::parse_from_str(&normalized, "%b %d, %Y").ok()
}
