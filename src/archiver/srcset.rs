//! srcset attribute parsing.
//!
//! A naive comma split corrupts URLs that carry commas inside query
//! parameters. The rule here: tokens are whitespace-separated, and a token of
//! the shape `<number>w` or `<number>x` (optionally followed by a comma) is a
//! width/density descriptor, not part of a URL.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DESCRIPTOR_RE: Regex =
        Regex::new(r"^\d+(?:\.\d+)?[wx],?$").expect("hardcoded descriptor pattern must compile");
}

/// Extract candidate URLs from a srcset attribute value.
#[must_use]
pub fn parse_srcset(value: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for token in value.split_whitespace() {
        if DESCRIPTOR_RE.is_match(token) {
            continue;
        }
        let url = token.trim_end_matches(',');
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    urls
}
