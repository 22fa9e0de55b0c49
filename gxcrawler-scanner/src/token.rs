//! Scraping of the two authentication values the server embeds in its pages.
//!
//! Both functions are pure: they only look at the text they are given, so
//! they can be exercised against saved fixtures without a live server.

use crate::error::{CrawlError, Result};
use scraper::{Html, Selector};

/// Key of the login token inside the landing page's serialized form state.
pub const MAIN_LOGIN_KEY: &str = "GX_AUTH_W0010MAINLOGIN";

/// Marker preceding the activity token in the activity page's startup script.
pub const ACTIVITY_MARKER: &str = "GX_AUTH_ACTIVITY";

const MAIN_STATE_INPUT: &str = "body > form > div:nth-of-type(2) input";
const BODY_SCRIPT: &str = "body > script";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| CrawlError::ParseError(format!("invalid selector {}: {:?}", css, e)))
}

/// Extract the login token from the landing page.
///
/// The token lives in the JSON `value` of the first `<input>` under the
/// second `<div>` of the page form.
pub fn extract_main_auth_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let input_selector = selector(MAIN_STATE_INPUT)?;

    let input = document
        .select(&input_selector)
        .next()
        .ok_or_else(|| CrawlError::ParseError("form state input not found".to_string()))?;

    let raw_state = input
        .value()
        .attr("value")
        .ok_or_else(|| CrawlError::ParseError("form state input has no value".to_string()))?;

    let state: serde_json::Value = serde_json::from_str(raw_state)
        .map_err(|e| CrawlError::ParseError(format!("form state is not valid JSON: {}", e)))?;

    state
        .get(MAIN_LOGIN_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CrawlError::ParseError(format!("{} missing from form state", MAIN_LOGIN_KEY)))
}

/// Extract the activity token from the first inline script of the page body.
pub fn extract_activity_auth_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let script_selector = selector(BODY_SCRIPT)?;

    let script = document
        .select(&script_selector)
        .next()
        .ok_or_else(|| CrawlError::ParseError("no script element in page body".to_string()))?;
    let text: String = script.text().collect();

    token_after_marker(&text, ACTIVITY_MARKER)
        .ok_or_else(|| CrawlError::ParseError(format!("{} not found in script", ACTIVITY_MARKER)))
}

/// Returns the quoted value that follows `marker`, accepting both
/// `"MARKER":"value"` and `MARKER="value"` layouts. An empty value is
/// treated as absent.
fn token_after_marker(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = text[start..].strip_prefix('"').unwrap_or(&text[start..]);
    let rest = rest.trim_start().strip_prefix([':', '='])?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    let token = &rest[..end];
    (!token.is_empty()).then(|| token.to_string())
}
