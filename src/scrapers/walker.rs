use crate::models::{Listing, ListingSummary};
use crate::scrapers::browser::{PageRequest, PageSource};
use crate::scrapers::traits::SiteLayout;
use crate::scrapers::types::{PageBounds, RunSummary};
use crate::storage::{ImageFetcher, ListingSink};
use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Consecutive index pages that may fail to load before the walk stops
const MAX_INDEX_FAILURES: u32 = 3;

/// One index page worth of listings not seen earlier in the run
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPage {
    pub number: u32,
    pub listings: Vec<ListingSummary>,
}

/// Outcome of loading one index page
enum Attempt {
    Page(IndexPage),
    Skipped,
    Finished,
}

/// Iterator over the index pages of a site.
///
/// Yields only listings whose id has not been seen earlier in the walk. It
/// ends at the page bound, on a page with no listing cards, on a page with
/// nothing new when unbounded, or after repeated load failures.
///
/// Iterating loads pages back to back; [`IndexPages::next_page`] waits the
/// configured delay before every load after the first, skipped ones included.
pub struct IndexPages<'a, P: PageSource + ?Sized> {
    source: &'a P,
    layout: &'a dyn SiteLayout,
    bounds: PageBounds,
    delay: Duration,
    next_page: u32,
    seen: HashSet<String>,
    failures: u32,
    loads: u32,
    done: bool,
}

impl<'a, P: PageSource + ?Sized> IndexPages<'a, P> {
    pub fn new(source: &'a P, layout: &'a dyn SiteLayout, bounds: PageBounds) -> Self {
        Self {
            source,
            layout,
            bounds,
            delay: Duration::ZERO,
            next_page: bounds.start,
            seen: HashSet::new(),
            failures: 0,
            loads: 0,
            done: false,
        }
    }

    /// Pause before every index load but the first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Start over from the first page, forgetting every id seen so far
    pub fn restart(&mut self) {
        self.next_page = self.bounds.start;
        self.seen.clear();
        self.failures = 0;
        self.loads = 0;
        self.done = false;
    }

    /// Next page with new listings, pausing before each load
    pub async fn next_page(&mut self) -> Option<IndexPage> {
        while !self.exhausted() {
            if self.loads > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            match self.attempt() {
                Attempt::Page(page) => return Some(page),
                Attempt::Skipped => continue,
                Attempt::Finished => break,
            }
        }
        None
    }

    fn exhausted(&self) -> bool {
        self.done || !self.bounds.contains(self.next_page)
    }

    fn attempt(&mut self) -> Attempt {
        if self.exhausted() {
            return Attempt::Finished;
        }

        let number = self.next_page;
        match number.checked_add(1) {
            Some(next) => self.next_page = next,
            // Last addressable page
            None => self.done = true,
        }
        self.loads += 1;

        let url = self.layout.index_url(number);
        info!("🔎 Scraping {} index page {}: {}", self.layout.site(), number, url);

        let request = PageRequest {
            url: &url,
            ready: self.layout.index_ready(),
            ready_optional: self.layout.index_may_be_empty(),
            script: None,
        };
        let html = match blocking(|| self.source.render(&request)) {
            Ok(html) => html,
            Err(e) => {
                self.failures += 1;
                warn!("Index page {} failed to load: {:#}", number, e);
                if self.failures >= MAX_INDEX_FAILURES {
                    warn!("{} index pages failed in a row, stopping", self.failures);
                    self.done = true;
                }
                return Attempt::Skipped;
            }
        };
        self.failures = 0;

        let cards = self.layout.parse_index(&html);
        if cards.is_empty() {
            info!("No listings on index page {}, stopping", number);
            self.done = true;
            return Attempt::Finished;
        }

        let total = cards.len();
        let listings: Vec<_> = cards
            .into_iter()
            .filter(|card| self.seen.insert(card.id.clone()))
            .collect();
        info!("✅ {} listings on page {} ({} new)", total, number, listings.len());

        if listings.is_empty() {
            if self.bounds.is_unbounded() {
                info!("Nothing new on index page {}, stopping", number);
                self.done = true;
                return Attempt::Finished;
            }
            return Attempt::Skipped;
        }

        Attempt::Page(IndexPage { number, listings })
    }
}

impl<P: PageSource + ?Sized> Iterator for IndexPages<'_, P> {
    type Item = IndexPage;

    fn next(&mut self) -> Option<IndexPage> {
        loop {
            match self.attempt() {
                Attempt::Page(page) => return Some(page),
                Attempt::Skipped => continue,
                Attempt::Finished => return None,
            }
        }
    }
}

/// Page loads block on the browser; keep them off the async workers
fn blocking<T>(load: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => block_in_place(load),
        _ => load(),
    }
}

/// Drives one site: index pages, then every new detail page in order
pub struct Walker<'a, P: PageSource + ?Sized> {
    source: &'a P,
    layout: &'a dyn SiteLayout,
    images: &'a ImageFetcher,
    sink: &'a mut ListingSink,
    bounds: PageBounds,
    delay: Duration,
}

impl<'a, P: PageSource + ?Sized> Walker<'a, P> {
    pub fn new(
        source: &'a P,
        layout: &'a dyn SiteLayout,
        images: &'a ImageFetcher,
        sink: &'a mut ListingSink,
    ) -> Self {
        Self {
            source,
            layout,
            images,
            sink,
            bounds: PageBounds::default(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_bounds(mut self, bounds: PageBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Pause before every page load
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Walk with the current wall-clock time as date reference
    pub async fn run(&mut self) -> Result<RunSummary> {
        let now = Local::now().naive_local();
        self.run_at(now).await
    }

    /// Walk using `now` to normalize relative dates.
    ///
    /// Only sink (CSV) failures abort; page and image failures are skipped.
    pub async fn run_at(&mut self, now: NaiveDateTime) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut pages = IndexPages::new(self.source, self.layout, self.bounds).with_delay(self.delay);

        while let Some(page) = pages.next_page().await {
            summary.pages_visited += 1;
            summary.listings_discovered += page.listings.len();

            let count = page.listings.len();
            for (idx, listing) in page.listings.iter().enumerate() {
                info!("➡️ Listing {}/{} of page {}: {}", idx + 1, count, page.number, listing.url);
                self.pause().await;

                match self.visit(listing, now).await? {
                    Some(images) => {
                        summary.listings_written += 1;
                        summary.images_saved += images;
                    }
                    None => summary.listings_skipped += 1,
                }
            }
        }

        info!(
            "🏁 {}: {} pages, {} listings written, {} skipped, {} images",
            self.layout.site(),
            summary.pages_visited,
            summary.listings_written,
            summary.listings_skipped,
            summary.images_saved
        );
        Ok(summary)
    }

    /// Scrape one detail page. `Ok(None)` means the page was skipped.
    async fn visit(&mut self, summary: &ListingSummary, now: NaiveDateTime) -> Result<Option<usize>> {
        let request = PageRequest {
            url: &summary.url,
            ready: self.layout.detail_ready(),
            ready_optional: false,
            script: self.layout.detail_script(),
        };

        let html = match blocking(|| self.source.render(&request)) {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping listing {}: {:#}", summary.id, e);
                return Ok(None);
            }
        };

        let detail = self.layout.parse_detail(&html, summary);
        debug!(
            "Listing {}: {} detail fields, {} images",
            summary.id,
            detail.fields.len(),
            detail.image_urls.len()
        );

        let mut listing = Listing::assemble(summary, detail, now, self.layout.stamps_run_date());

        let saved = self.images.fetch_all(&listing.id, &listing.image_urls).await;
        if !saved.is_empty() {
            listing.image_folder = Some(format!("images/{}", ImageFetcher::folder_name(&listing.id)));
        }

        self.sink.write(&listing).await?;
        Ok(Some(saved.len()))
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}
