use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Downloads listing photos into `<root>/<listing-id>/<n>.<ext>`
pub struct ImageFetcher {
    client: Client,
    root: PathBuf,
}

impl ImageFetcher {
    /// `root` is the site's `images` directory
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name used for a listing's photos
    pub fn folder_name(listing_id: &str) -> String {
        let name: String = listing_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            "unknown".to_string()
        } else {
            name
        }
    }

    /// Download every URL in order, skipping the ones that fail.
    ///
    /// Returns the paths written. A failed image never stops the others.
    pub async fn fetch_all(&self, listing_id: &str, urls: &[String]) -> Vec<PathBuf> {
        if urls.is_empty() {
            debug!("No images for listing {}", listing_id);
            return Vec::new();
        }

        let dir = self.root.join(Self::folder_name(listing_id));
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("Cannot create image directory {}: {}", dir.display(), e);
            return Vec::new();
        }

        let mut saved = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            match self.fetch_one(url, &dir, idx + 1).await {
                Ok(path) => {
                    debug!("Saved image {}/{} for listing {}", idx + 1, urls.len(), listing_id);
                    saved.push(path);
                }
                Err(e) => warn!("Skipping image {} for listing {}: {:#}", url, listing_id, e),
            }
        }

        info!("Saved {}/{} images for listing {}", saved.len(), urls.len(), listing_id);
        saved
    }

    async fn fetch_one(&self, url: &str, dir: &Path, index: usize) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if let Some(ct) = &content_type {
            if !ct.starts_with("image/") && !ct.starts_with("application/octet-stream") {
                bail!("Unexpected content type {}", ct);
            }
        }

        let bytes = response.bytes().await.context("Failed to read image body")?;
        if bytes.is_empty() {
            bail!("Empty body");
        }

        let path = dir.join(format!("{}.{}", index, extension(content_type.as_deref(), url)));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

/// File extension from the content type, else the URL, else `jpg`
fn extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type {
        for (needle, ext) in [("png", "png"), ("jpeg", "jpg"), ("jpg", "jpg"), ("webp", "webp"), ("gif", "gif")] {
            if ct.contains(needle) {
                return ext.to_string();
            }
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}
