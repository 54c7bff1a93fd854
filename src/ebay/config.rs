use once_cell::sync::Lazy;
use std::env;

pub static EBAY_ENV: Lazy<String> =
    Lazy::new(|| env::var("EBAY_ENV").unwrap_or_else(|_| "SANDBOX".to_string()));

pub static APP_ID: Lazy<String> = Lazy::new(|| env::var("EBAY_APP_ID").unwrap_or_default());

pub static APP_SECRET: Lazy<String> = Lazy::new(|| env::var("EBAY_CERT_ID").unwrap_or_default());

pub static ROOT: Lazy<String> = Lazy::new(|| {
    if EBAY_ENV.as_str().eq_ignore_ascii_case("PROD") {
        "https://api.ebay.com".to_string()
    } else {
        "https://api.sandbox.ebay.com".to_string()
    }
});

pub static OAUTH_TOKEN_URL: Lazy<String> =
    Lazy::new(|| format!("{}/identity/v1/oauth2/token", *ROOT));

pub static BROWSE_SEARCH_URL: Lazy<String> =
    Lazy::new(|| format!("{}/buy/browse/v1/item_summary/search", *ROOT));

/// The sold-listings page is public and has no sandbox; overridable so a
/// mirror can stand in during development.
pub static SOLD_SEARCH_URL: Lazy<String> = Lazy::new(|| {
    env::var("SOLD_SEARCH_URL").unwrap_or_else(|_| "https://www.ebay.com/sch/i.html".to_string())
});

pub static MARKETPLACE_ID: Lazy<String> =
    Lazy::new(|| env::var("EBAY_MARKETPLACE_ID").unwrap_or_else(|_| "EBAY_US".to_string()));

pub const APP_SCOPES: &[&str] = &["https://api.ebay.com/oauth/api_scope"];
