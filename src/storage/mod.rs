pub mod csv_sink;
pub mod images;
pub mod queue;

pub use csv_sink::CsvSink;
pub use images::ImageFetcher;
pub use queue::{Publisher, RedisPublisher};

use crate::models::Listing;
use anyhow::Result;
use tracing::warn;

/// Where finished listings go: the CSV file always, the queue if configured
pub struct ListingSink {
    csv: CsvSink,
    publisher: Option<Box<dyn Publisher>>,
}

impl ListingSink {
    pub fn new(csv: CsvSink, publisher: Option<Box<dyn Publisher>>) -> Self {
        Self { csv, publisher }
    }

    /// Append to the CSV, then publish.
    ///
    /// Only the CSV write can fail the call; publish errors are logged.
    pub async fn write(&mut self, listing: &Listing) -> Result<()> {
        self.csv.append(listing)?;

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(listing).await {
                warn!("Queue publish to '{}' failed: {:#}", publisher.topic(), e);
            }
        }

        Ok(())
    }

    pub fn csv(&self) -> &CsvSink {
        &self.csv
    }
}
