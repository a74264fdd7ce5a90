use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Oldest entries roll off the main queue past this depth.
pub const MAIN_QUEUE_CAP: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotEntry {
    pub id: String,
    pub url: String,
    pub image_base64: String,
    pub ocr_text: String,
    pub captured_at: DateTime<Utc>,
}

/// Two-tier capture buffer: a bounded main queue for fresh captures, and an
/// unbounded extra queue for entries the operator pins aside.
#[derive(Default)]
pub struct ScreenshotQueues {
    main: VecDeque<ScreenshotEntry>,
    extra: Vec<ScreenshotEntry>,
}

impl ScreenshotQueues {
    /// Appends to the main queue, evicting the oldest entry at capacity.
    pub fn push(&mut self, entry: ScreenshotEntry) {
        if self.main.len() >= MAIN_QUEUE_CAP {
            self.main.pop_front();
        }
        self.main.push_back(entry);
    }

    pub fn main(&self) -> impl Iterator<Item = &ScreenshotEntry> {
        self.main.iter()
    }

    pub fn extra(&self) -> impl Iterator<Item = &ScreenshotEntry> {
        self.extra.iter()
    }

    /// Removes the entry from whichever queue holds it.
    pub fn remove(&mut self, id: &str) -> bool {
        if let Some(pos) = self.main.iter().position(|e| e.id == id) {
            self.main.remove(pos);
            return true;
        }
        if let Some(pos) = self.extra.iter().position(|e| e.id == id) {
            self.extra.remove(pos);
            return true;
        }
        false
    }

    pub fn move_to_extra(&mut self, id: &str) -> bool {
        if let Some(pos) = self.main.iter().position(|e| e.id == id) {
            if let Some(entry) = self.main.remove(pos) {
                self.extra.push(entry);
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.main.clear();
        self.extra.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ScreenshotEntry {
        ScreenshotEntry {
            id: id.to_string(),
            url: format!("http://localhost/{id}"),
            image_base64: "aGk=".to_string(),
            ocr_text: String::new(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn main_queue_caps_at_ten_dropping_oldest() {
        let mut queues = ScreenshotQueues::default();
        for i in 0..12 {
            queues.push(entry(&format!("s{i}")));
        }
        let ids: Vec<&str> = queues.main().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), MAIN_QUEUE_CAP);
        assert_eq!(ids.first(), Some(&"s2"));
        assert_eq!(ids.last(), Some(&"s11"));
    }

    #[test]
    fn move_to_extra_pins_entry_outside_the_cap() {
        let mut queues = ScreenshotQueues::default();
        queues.push(entry("keep"));
        assert!(queues.move_to_extra("keep"));
        assert_eq!(queues.main().count(), 0);
        assert_eq!(queues.extra().count(), 1);
        // Extra entries survive main-queue churn.
        for i in 0..20 {
            queues.push(entry(&format!("s{i}")));
        }
        assert_eq!(queues.extra().count(), 1);
    }

    #[test]
    fn remove_searches_both_queues() {
        let mut queues = ScreenshotQueues::default();
        queues.push(entry("a"));
        queues.push(entry("b"));
        queues.move_to_extra("a");
        assert!(queues.remove("a"));
        assert!(queues.remove("b"));
        assert!(!queues.remove("ghost"));
    }
}
