use crate::config::Config;
use crate::models::Site;
use crate::scrapers::{layout_for, ChromeSession, RunSummary, Walker};
use crate::storage::{CsvSink, ImageFetcher, ListingSink, Publisher, RedisPublisher};
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Scrape `site` with settings from the environment
pub async fn run(site: Site) -> Result<RunSummary> {
    let config = Config::from_env(site)?;
    run_with(&config).await
}

/// Everything that can fail before the first page is opened happens here,
/// so configuration, output and browser problems end the process early.
pub async fn run_with(config: &Config) -> Result<RunSummary> {
    info!("🚗 Car Scout - {} scraper", config.site);
    info!("Output: {}", config.site_dir().display());

    let csv = CsvSink::open(config.csv_path())?;
    let publisher = match &config.queue {
        Some(queue) => {
            let redis = RedisPublisher::connect(&queue.url, queue.topic.clone()).await?;
            Some(Box::new(redis) as Box<dyn Publisher>)
        }
        None => None,
    };
    let mut sink = ListingSink::new(csv, publisher);

    let images = ImageFetcher::new(config.images_dir(), config.image_timeout)?;
    let session = ChromeSession::launch(config.headless, config.page_timeout)?;
    let layout = layout_for(config.site);

    let summary = Walker::new(&session, layout.as_ref(), &images, &mut sink)
        .with_bounds(config.bounds)
        .with_delay(config.delay)
        .run()
        .await?;

    info!("💾 {} rows in {}", sink.csv().rows(), sink.csv().path().display());
    info!("🖼️ Images in {}", images.root().display());

    Ok(summary)
}
