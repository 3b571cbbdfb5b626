use crate::models::{Field, Fields};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::warn;
use url::Url;

/// Fuel types as the sites spell them
pub const FUELS: &[&str] = &["Essence", "Diesel", "Hybride", "Électrique", "GPL"];

/// Gearbox types as the sites spell them
pub const GEARBOXES: &[&str] = &["Automatique", "Manuelle"];

/// A bare model year
pub const YEAR_PATTERN: &str = r"^(19|20)\d{2}$";

/// Where a field lives on a page.
///
/// Every locator is evaluated relative to a root element (a whole document
/// or a single index card) and yields the first non-empty match, or nothing.
#[derive(Debug, Clone, Copy)]
pub enum Locator {
    /// Text of the first element matching the selector
    Text(&'static str),
    /// Attribute of the first element matching the selector
    Attr(&'static str, &'static str),
    /// Text of the first element whose whole text matches the pattern
    Matching(&'static str, &'static str),
    /// Text of the first element equal (ignoring case) to a vocabulary word,
    /// returned in the vocabulary's spelling
    OneOf(&'static str, &'static [&'static str]),
    /// Label/value rows: the row whose label cell starts with `key`
    Labeled {
        row: &'static str,
        label: &'static str,
        value: &'static str,
        key: &'static str,
    },
    /// Text of the first element matching `css` that contains a `marker` child
    Marked {
        css: &'static str,
        marker: &'static str,
    },
    /// First locator that finds something
    Fallback(&'static [Locator]),
}

/// A label/value row locator
pub const fn labeled(
    row: &'static str,
    label: &'static str,
    value: &'static str,
    key: &'static str,
) -> Locator {
    Locator::Labeled {
        row,
        label,
        value,
        key,
    }
}

impl Locator {
    pub fn find(&self, root: ElementRef<'_>) -> Option<String> {
        match *self {
            Locator::Text(css) => {
                let sel = selector(css)?;
                root.select(&sel).map(clean_text).find(|t| !t.is_empty())
            }
            Locator::Attr(css, attr) => {
                let sel = selector(css)?;
                root.select(&sel)
                    .filter_map(|el| el.value().attr(attr))
                    .map(str::trim)
                    .find(|v| !v.is_empty())
                    .map(str::to_string)
            }
            Locator::Matching(css, pattern) => {
                let sel = selector(css)?;
                let re = compiled(pattern)?;
                root.select(&sel).map(clean_text).find(|t| re.is_match(t))
            }
            Locator::OneOf(css, words) => {
                let sel = selector(css)?;
                root.select(&sel).find_map(|el| {
                    let text = clean_text(el).to_lowercase();
                    words
                        .iter()
                        .find(|w| w.to_lowercase() == text)
                        .map(|w| w.to_string())
                })
            }
            Locator::Labeled {
                row,
                label,
                value,
                key,
            } => {
                let (row_sel, label_sel, value_sel) =
                    (selector(row)?, selector(label)?, selector(value)?);
                let key = key.to_lowercase();

                for row in root.select(&row_sel) {
                    let Some(label_el) = row.select(&label_sel).next() else {
                        continue;
                    };
                    let label_text = clean_text(label_el).to_lowercase();
                    if !label_text.trim_end_matches(':').trim().starts_with(&key) {
                        continue;
                    }

                    let found = row
                        .select(&value_sel)
                        .filter(|el| el.id() != label_el.id())
                        .map(clean_text)
                        .find(|t| !t.is_empty());
                    if found.is_some() {
                        return found;
                    }
                }
                None
            }
            Locator::Marked { css, marker } => {
                let (sel, marker_sel) = (selector(css)?, selector(marker)?);
                root.select(&sel)
                    .filter(|el| el.select(&marker_sel).next().is_some())
                    .map(clean_text)
                    .find(|t| !t.is_empty())
            }
            Locator::Fallback(locators) => locators.iter().find_map(|l| l.find(root)),
        }
    }
}

/// `Matching` patterns, compiled once per process
static PATTERNS: Lazy<Mutex<HashMap<&'static str, Regex>>> = Lazy::new(Default::default);

fn compiled(pattern: &'static str) -> Option<Regex> {
    let mut cache = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    match Regex::new(pattern) {
        Ok(re) => {
            cache.insert(pattern, re.clone());
            Some(re)
        }
        Err(e) => {
            warn!("Invalid pattern '{}': {}", pattern, e);
            None
        }
    }
}

/// Read every field of `map` under `root`. Misses are simply absent.
pub fn extract(root: ElementRef<'_>, map: &[(Field, Locator)]) -> Fields {
    let mut fields = Fields::new();
    for (field, locator) in map {
        if let Some(value) = locator.find(root) {
            fields.insert(*field, value);
        }
    }
    fields
}

/// All non-empty values of `attr` on elements matching `css`, in page order
pub fn attr_values(root: ElementRef<'_>, css: &str, attr: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    root.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Element text with whitespace (including `&nbsp;`) collapsed
pub fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `raw` links against `base`, dropping unparseable and duplicate ones
pub fn resolve_urls(base: &str, raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let base = Url::parse(base).ok();
    let mut seen = HashSet::new();

    raw.into_iter()
        .filter_map(|link| match &base {
            Some(base) => base.join(&link).ok(),
            None => Url::parse(&link).ok(),
        })
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}
