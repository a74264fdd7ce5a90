//! Browser-automation seam.
//!
//! The engine never talks to a real browser directly; it goes through the
//! [`Automation`] trait. [`HeadlessMock`] is the deployment for display-less
//! hosts: every operation answers immediately with a deterministic stand-in
//! rather than erroring, so callers degrade instead of branching.
//!
//! [`run_blocking`] is the bridge for synchronous automation call sites that
//! may or may not already be running inside the async runtime.

mod bridge;
mod headless;

pub use bridge::run_blocking;
pub use headless::{HeadlessMock, BLANK_PNG};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a click attempt, echoed back to the caller verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickOutcome {
    pub selector: String,
    pub clicked: bool,
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait Automation: Send + Sync {
    /// Captures the page at `url` as PNG bytes.
    async fn screenshot(&self, url: &str) -> anyhow::Result<Vec<u8>>;

    /// Extracts visible text from an image reference (URL, path, or inline
    /// base64 payload).
    async fn ocr(&self, input: &str) -> anyhow::Result<String>;

    async fn click(&self, selector: &str) -> anyhow::Result<ClickOutcome>;
}

/// Synchronous entry points for callers outside the async runtime. Each one
/// crosses [`run_blocking`] with an owned copy of its arguments.
pub fn screenshot_sync(automation: Arc<dyn Automation>, url: &str) -> anyhow::Result<Vec<u8>> {
    let url = url.to_string();
    run_blocking(async move { automation.screenshot(&url).await })?
}

pub fn ocr_sync(automation: Arc<dyn Automation>, input: &str) -> anyhow::Result<String> {
    let input = input.to_string();
    run_blocking(async move { automation.ocr(&input).await })?
}

pub fn click_sync(automation: Arc<dyn Automation>, selector: &str) -> anyhow::Result<ClickOutcome> {
    let selector = selector.to_string();
    run_blocking(async move { automation.click(&selector).await })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_wrappers_work_without_a_runtime() {
        let automation: Arc<dyn Automation> = Arc::new(HeadlessMock);
        let png = screenshot_sync(Arc::clone(&automation), "http://localhost:3000").expect("png");
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);

        let outcome = click_sync(automation, "#submit").expect("click");
        assert_eq!(outcome.selector, "#submit");
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn sync_wrappers_work_inside_a_runtime() {
        let automation: Arc<dyn Automation> = Arc::new(HeadlessMock);
        let inside = tokio::task::spawn_blocking(move || {
            ocr_sync(automation, "screenshot-1.png").expect("ocr")
        })
        .await
        .expect("join");
        assert!(inside.contains("headless"));
    }

    #[tokio::test]
    async fn both_bridge_paths_yield_identical_results() {
        let automation: Arc<dyn Automation> = Arc::new(HeadlessMock);
        let direct = automation.screenshot("http://x").await.expect("direct");
        let auto2 = Arc::clone(&automation);
        let bridged = tokio::task::spawn_blocking(move || {
            screenshot_sync(auto2, "http://x").expect("bridged")
        })
        .await
        .expect("join");
        assert_eq!(direct, bridged);
    }
}
