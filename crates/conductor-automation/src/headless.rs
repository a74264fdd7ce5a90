use async_trait::async_trait;

use crate::{Automation, ClickOutcome};

/// An 8x8 all-white RGB PNG, served whenever no display is attached.
pub const BLANK_PNG: [u8; 72] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x08, 0x08, 0x02, 0x00, 0x00, 0x00, 0x4b,
    0x6d, 0x29, 0xdc, 0x00, 0x00, 0x00, 0x0f, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0xf8,
    0x8f, 0x03, 0x30, 0x0c, 0x2d, 0x09, 0x00, 0xba, 0x1e, 0xbf, 0x41, 0x30, 0x93, 0x0a, 0xfc,
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Automation stand-in for hosts with no browser or display. Every
/// operation succeeds with a deterministic placeholder so the rest of the
/// system keeps moving.
pub struct HeadlessMock;

#[async_trait]
impl Automation for HeadlessMock {
    async fn screenshot(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        tracing::debug!(target: "conductor.automation", %url, "headless screenshot, returning blank frame");
        Ok(BLANK_PNG.to_vec())
    }

    async fn ocr(&self, input: &str) -> anyhow::Result<String> {
        Ok(format!(
            "headless mode: no display attached, no text extracted from {input}"
        ))
    }

    async fn click(&self, selector: &str) -> anyhow::Result<ClickOutcome> {
        Ok(ClickOutcome {
            selector: selector.to_string(),
            clicked: true,
            success: true,
            message: "mock clicked".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn screenshot_is_a_valid_png_frame() {
        let png = HeadlessMock
            .screenshot("http://localhost:3000")
            .await
            .expect("screenshot");
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[tokio::test]
    async fn click_reports_mock_success() {
        let outcome = HeadlessMock.click("button.primary").await.expect("click");
        assert!(outcome.clicked);
        assert!(outcome.success);
        assert_eq!(outcome.message, "mock clicked");
    }

    #[tokio::test]
    async fn ocr_explains_the_headless_degradation() {
        let text = HeadlessMock.ocr("frame.png").await.expect("ocr");
        assert!(text.contains("headless"));
        assert!(text.contains("frame.png"));
    }
}
