use crate::models::Site;
use crate::scrapers::types::PageBounds;
use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DATA_ROOT: &str = "CAR_SCOUT_DATA_ROOT";
pub const START_PAGE: &str = "CAR_SCOUT_START_PAGE";
pub const MAX_PAGES: &str = "CAR_SCOUT_MAX_PAGES";
pub const PAGE_TIMEOUT_SECS: &str = "CAR_SCOUT_PAGE_TIMEOUT_SECS";
pub const IMAGE_TIMEOUT_SECS: &str = "CAR_SCOUT_IMAGE_TIMEOUT_SECS";
pub const DELAY_MS: &str = "CAR_SCOUT_DELAY_MS";
pub const HEADLESS: &str = "CAR_SCOUT_HEADLESS";
pub const QUEUE_URL: &str = "CAR_SCOUT_QUEUE_URL";
pub const QUEUE_TOPIC: &str = "CAR_SCOUT_QUEUE_TOPIC";

/// Queue publishing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub url: String,
    pub topic: String,
}

/// Run settings for one site, read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub site: Site,
    pub data_root: PathBuf,
    pub bounds: PageBounds,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    pub delay: Duration,
    pub headless: bool,
    pub queue: Option<QueueConfig>,
}

impl Config {
    /// Read the process environment, after loading `.env` if present
    pub fn from_env(site: Site) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(site, |key| env::var(key).ok())
    }

    pub fn from_lookup(site: Site, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let start: u32 = parse_or(get(START_PAGE), START_PAGE, 1)?;
        if start == 0 {
            bail!("{} must be at least 1", START_PAGE);
        }

        let max_pages = match get(MAX_PAGES).as_deref() {
            None => Some(1),
            Some(v) if v.eq_ignore_ascii_case("all") => None,
            Some(v) => match v.parse::<u32>().with_context(|| format!("Invalid value for {}: '{}'", MAX_PAGES, v))? {
                0 => None,
                n => Some(n),
            },
        };

        let queue = get(QUEUE_URL).map(|url| QueueConfig {
            url,
            topic: get(QUEUE_TOPIC).unwrap_or_else(|| site.default_topic()),
        });

        Ok(Self {
            site,
            data_root: get(DATA_ROOT).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            bounds: PageBounds::new(start, max_pages),
            page_timeout: Duration::from_secs(parse_or(get(PAGE_TIMEOUT_SECS), PAGE_TIMEOUT_SECS, 20)?),
            image_timeout: Duration::from_secs(parse_or(get(IMAGE_TIMEOUT_SECS), IMAGE_TIMEOUT_SECS, 10)?),
            delay: Duration::from_millis(parse_or(get(DELAY_MS), DELAY_MS, 2000)?),
            headless: parse_flag(get(HEADLESS), HEADLESS, true)?,
            queue,
        })
    }

    /// `<data_root>/<site>`
    pub fn site_dir(&self) -> PathBuf {
        self.data_root.join(self.site.slug())
    }

    /// `<data_root>/<site>/<site>_complete.csv`
    pub fn csv_path(&self) -> PathBuf {
        self.site_dir().join(self.site.csv_file_name())
    }

    /// `<data_root>/<site>/images`
    pub fn images_dir(&self) -> PathBuf {
        self.site_dir().join("images")
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, v)),
        None => Ok(default),
    }
}

fn parse_flag(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value.map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("Invalid value for {}: '{}'", key, other),
    }
}
