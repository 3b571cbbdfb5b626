use crate::models::{DetailPage, ListingSummary, Site};

/// Fixed page layout of one classified-ads site
///
/// This allows the walker to drive Avito and Moteur the same way; everything
/// site-specific (URLs, selectors, label vocabulary) lives behind it.
pub trait SiteLayout: Send + Sync {
    fn site(&self) -> Site;

    /// URL of index page `page` (1-based)
    fn index_url(&self, page: u32) -> String;

    /// Selector that is present once an index page has rendered its cards
    fn index_ready(&self) -> &'static str;

    /// Whether an index page past the last one renders without `index_ready`.
    /// Such a page is read as having no listings instead of failing to load.
    fn index_may_be_empty(&self) -> bool {
        false
    }

    /// Selector that is present once a detail page has rendered
    fn detail_ready(&self) -> &'static str;

    /// Script run on a detail page before its HTML is read
    fn detail_script(&self) -> Option<&'static str> {
        None
    }

    /// Listing cards of a rendered index page, in page order
    fn parse_index(&self, html: &str) -> Vec<ListingSummary>;

    /// Fields and image URLs of a rendered detail page
    fn parse_detail(&self, html: &str, summary: &ListingSummary) -> DetailPage;

    /// Whether listings without a visible date get the run date
    fn stamps_run_date(&self) -> bool {
        false
    }
}
