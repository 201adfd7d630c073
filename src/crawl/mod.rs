//! Autonomous crawl loop.
//!
//! The session owns the frontier queue, the visited set, and the pause flag
//! as a caller-owned value: two independent crawls never share state, and
//! unit tests drive the loop deterministically with a scripted agent.

pub mod pipeline;
pub mod session;

use async_trait::async_trait;

use crate::browser::PageCapture;

pub use pipeline::CapturePipeline;
pub use session::{CrawlControl, CrawlSession, CrawlSummary, FrontierItem};

/// Where a successfully captured page goes.
///
/// The session hands every capture to its sink; a sink failure is logged and
/// the loop moves on to the next frontier item.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn store(&self, capture: &PageCapture, item: &FrontierItem) -> anyhow::Result<()>;
}
