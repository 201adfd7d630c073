//! Capture job configuration.
//!
//! `CaptureJobConfig` is stored as a JSON column on the capture job record;
//! it is structured in memory and only serialized at the datastore boundary.
//! Interest-zone patterns are resolved into an explicit [`ZonePattern`] once
//! at load time so depth computation never branches on a compile failure.

use serde::{Deserialize, Serialize};

/// Crawl strategy for a capture job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureJobMode {
    /// Breadth-first autonomous crawl from the start URL.
    Auto,
    /// Only explicitly listed URLs, no link following.
    Targeted,
}

/// A URL-pattern-scoped multiplier that locally adjusts crawl depth.
///
/// `url_pattern` is tried as a regex first; an invalid pattern falls back to
/// plain substring containment. The fallback is decided at compile time, not
/// per match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestZone {
    pub url_pattern: String,
    pub depth_multiplier: f64,
}

/// Configuration driving one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureJobConfig {
    pub start_url: String,
    pub target_page_count: usize,
    pub mode: CaptureJobMode,
    pub max_depth: u32,
    /// Link-text terms that disqualify a link from being followed
    /// (case-insensitive containment).
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub interest_zones: Vec<InterestZone>,
}

impl CaptureJobConfig {
    /// Deserialize from the datastore's JSON column.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize for the datastore's JSON column.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Compile interest zones for hot-path matching.
    #[must_use]
    pub fn compiled_zones(&self) -> Vec<CompiledZone> {
        self.interest_zones
            .iter()
            .map(CompiledZone::from_zone)
            .collect()
    }
}

impl Default for CaptureJobConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            target_page_count: 25,
            mode: CaptureJobMode::Auto,
            max_depth: 3,
            blacklist: Vec::new(),
            interest_zones: Vec::new(),
        }
    }
}

/// A zone pattern resolved at load time.
#[derive(Debug, Clone)]
pub enum ZonePattern {
    Regex(regex::Regex),
    /// Fallback for patterns that do not compile as a regex.
    Literal(String),
}

impl ZonePattern {
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(url),
            Self::Literal(needle) => url.contains(needle.as_str()),
        }
    }
}

/// An interest zone with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledZone {
    pub pattern: ZonePattern,
    pub depth_multiplier: f64,
}

impl CompiledZone {
    #[must_use]
    pub fn from_zone(zone: &InterestZone) -> Self {
        let pattern = match regex::Regex::new(&zone.url_pattern) {
            Ok(re) => ZonePattern::Regex(re),
            Err(e) => {
                log::debug!(
                    target: "demoforge::config",
                    "zone pattern {:?} is not a valid regex ({e}), using substring match",
                    zone.url_pattern
                );
                ZonePattern::Literal(zone.url_pattern.clone())
            }
        };
        Self {
            pattern,
            depth_multiplier: zone.depth_multiplier,
        }
    }
}
