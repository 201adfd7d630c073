//! The crawl frontier and its driving loop.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use url::Url;

use crate::browser::{BrowserAgent, ExtractedLink};
use crate::config::{CaptureJobConfig, CaptureJobMode, CompiledZone};
use crate::error::CrawlError;

use super::CaptureSink;

/// Poll interval while paused.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One pending navigation target. Queue-only; never persisted.
#[derive(Debug, Clone)]
pub struct FrontierItem {
    pub url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
}

/// External control over a running session.
///
/// Pause is a cooperative flag polled between iterations, not a preemption;
/// resuming lets the loop continue consuming the preserved queue.
#[derive(Debug, Clone)]
pub struct CrawlControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl CrawlControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub pages_captured: usize,
    pub urls_visited: usize,
}

/// BFS crawl state for one run, owned by its caller.
pub struct CrawlSession {
    origin: Url,
    max_depth: u32,
    /// Auto jobs follow extracted links; targeted jobs capture only what was
    /// seeded into the queue.
    follow_links: bool,
    target_page_count: usize,
    blacklist: Vec<String>,
    zones: Vec<CompiledZone>,
    queue: VecDeque<FrontierItem>,
    visited: HashSet<String>,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    captured: usize,
}

impl CrawlSession {
    /// Build a session seeded with the job's start URL at depth 0.
    pub fn new(config: &CaptureJobConfig) -> Result<Self, CrawlError> {
        let origin =
            Url::parse(&config.start_url).map_err(|source| CrawlError::InvalidStartUrl {
                url: config.start_url.clone(),
                source,
            })?;

        let mut queue = VecDeque::new();
        queue.push_back(FrontierItem {
            url: config.start_url.clone(),
            depth: 0,
            parent_url: None,
        });

        Ok(Self {
            origin,
            max_depth: config.max_depth,
            follow_links: config.mode == CaptureJobMode::Auto,
            target_page_count: config.target_page_count,
            blacklist: config
                .blacklist
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            zones: config.compiled_zones(),
            queue,
            visited: HashSet::new(),
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            captured: 0,
        })
    }

    /// Handle for pausing/resuming/stopping the run from outside the loop.
    #[must_use]
    pub fn control(&self) -> CrawlControl {
        CrawlControl {
            paused: Arc::clone(&self.paused),
            stopped: Arc::clone(&self.stopped),
        }
    }

    #[must_use]
    pub fn pages_captured(&self) -> usize {
        self.captured
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether a discovered link is worth enqueueing.
    ///
    /// Rejects links whose anchor text contains a blacklist term
    /// (case-insensitive), links off the start origin, and
    /// fragment/`javascript:`/`mailto:`/`tel:` pseudo-links.
    #[must_use]
    pub fn should_enqueue(&self, link: &ExtractedLink) -> bool {
        let trimmed = link.url.trim();
        let lower = trimmed.to_lowercase();
        if trimmed.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            return false;
        }

        let text_lower = link.text.to_lowercase();
        if self.blacklist.iter().any(|term| text_lower.contains(term)) {
            log::debug!(
                target: "demoforge::crawl",
                "blacklisted link text {:?} for {trimmed}",
                link.text
            );
            return false;
        }

        match Url::parse(trimmed) {
            Ok(parsed) => parsed.origin() == self.origin.origin(),
            Err(_) => false,
        }
    }

    /// Drive the loop to completion: target reached, queue drained, or
    /// externally stopped. One failed item never aborts the run.
    pub async fn run(
        &mut self,
        agent: &dyn BrowserAgent,
        sink: &dyn CaptureSink,
    ) -> Result<CrawlSummary, CrawlError> {
        let mut last_failure: Option<String> = None;

        loop {
            if self.stopped.load(Ordering::Relaxed) {
                log::info!(target: "demoforge::crawl", "crawl stopped externally");
                break;
            }
            if self.paused.load(Ordering::Relaxed) {
                tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
                continue;
            }
            if self.captured >= self.target_page_count {
                log::info!(
                    target: "demoforge::crawl",
                    "target of {} pages reached",
                    self.target_page_count
                );
                break;
            }
            let Some(item) = self.queue.pop_front() else {
                break;
            };

            let Some(normalized) = normalize_url(&item.url) else {
                log::warn!(target: "demoforge::crawl", "skipping unparseable URL {}", item.url);
                continue;
            };
            if self.visited.contains(&normalized) {
                continue;
            }
            if item.depth > effective_depth(self.max_depth, &normalized, &self.zones) {
                log::debug!(
                    target: "demoforge::crawl",
                    "dropping {normalized} at depth {} beyond budget",
                    item.depth
                );
                continue;
            }
            self.visited.insert(normalized.clone());

            let capture = match agent.capture_dom(&item.url).await {
                Ok(capture) => capture,
                Err(e) => {
                    log::warn!(target: "demoforge::crawl", "capture failed for {}: {e:#}", item.url);
                    last_failure = Some(format!("{e:#}"));
                    continue;
                }
            };

            if let Err(e) = sink.store(&capture, &item).await {
                log::warn!(target: "demoforge::crawl", "store failed for {}: {e:#}", item.url);
                last_failure = Some(format!("{e:#}"));
                continue;
            }
            self.captured += 1;

            if !self.follow_links {
                continue;
            }
            match agent.extract_links(&capture.url).await {
                Ok(links) => {
                    let survivors: Vec<ExtractedLink> = links
                        .into_iter()
                        .filter(|link| self.should_enqueue(link))
                        .collect();
                    log::debug!(
                        target: "demoforge::crawl",
                        "{normalized}: {} links enqueued at depth {}",
                        survivors.len(),
                        item.depth + 1
                    );
                    for link in survivors {
                        self.queue.push_back(FrontierItem {
                            url: link.url,
                            depth: item.depth + 1,
                            parent_url: Some(item.url.clone()),
                        });
                    }
                }
                Err(e) => {
                    log::warn!(
                        target: "demoforge::crawl",
                        "link extraction failed for {}: {e:#}",
                        item.url
                    );
                }
            }
        }

        if self.captured == 0
            && let Some(failure) = last_failure
        {
            return Err(CrawlError::Agent(failure));
        }

        Ok(CrawlSummary {
            pages_captured: self.captured,
            urls_visited: self.visited.len(),
        })
    }
}

/// Normalize a URL for deduplication: drop the fragment, strip trailing
/// slashes from the path (an empty path becomes `/`), keep origin + path +
/// query.
#[must_use]
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);

    let path = parsed.path().trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    let mut out = parsed.origin().ascii_serialization();
    out.push_str(path);
    if let Some(query) = parsed.query() {
        out.push('?');
        out.push_str(query);
    }
    Some(out)
}

/// Depth budget for a URL under the given interest zones.
///
/// Every matching zone recomputes the budget from the base depth; the last
/// match in list order wins.
#[must_use]
pub fn effective_depth(max_depth: u32, url: &str, zones: &[CompiledZone]) -> u32 {
    let mut depth = max_depth;
    for zone in zones {
        if zone.pattern.matches(url) {
            depth = (f64::from(max_depth) * zone.depth_multiplier).round() as u32;
        }
    }
    depth
}
