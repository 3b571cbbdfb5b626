use serde::{Deserialize, Serialize};

/// Which index pages a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBounds {
    /// First index page (1-based)
    pub start: u32,
    /// Number of pages to visit; `None` walks until no new listings appear
    pub max_pages: Option<u32>,
}

impl PageBounds {
    pub fn new(start: u32, max_pages: Option<u32>) -> Self {
        Self {
            start: start.max(1),
            max_pages,
        }
    }

    pub fn unbounded(start: u32) -> Self {
        Self::new(start, None)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_pages.is_none()
    }

    pub fn contains(&self, page: u32) -> bool {
        if page < self.start {
            return false;
        }
        match self.max_pages {
            Some(max) => page - self.start < max,
            None => true,
        }
    }
}

impl Default for PageBounds {
    fn default() -> Self {
        Self {
            start: 1,
            max_pages: Some(1),
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages_visited: usize,
    pub listings_discovered: usize,
    pub listings_written: usize,
    pub listings_skipped: usize,
    pub images_saved: usize,
}
