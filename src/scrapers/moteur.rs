use crate::models::{DetailPage, Field, ListingSummary, Site};
use crate::scrapers::extract::{
    self, attr_values, clean_text, labeled, resolve_urls, selector, Locator, FUELS, YEAR_PATTERN,
};
use crate::scrapers::traits::SiteLayout;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

const BASE_URL: &str = "https://www.moteur.ma/fr/voiture/achat-voiture-occasion/";
const PAGE_SIZE: u32 = 30;

const CARDS: &str = ".row-item";
const CARD_LINK: &str = "h3.title_mark_model a";

const CARD_FIELDS: &[(Field, Locator)] = &[
    (Field::Title, Locator::Text(".title_mark_model")),
    (Field::Price, Locator::Text(".PriceListing")),
    (Field::Year, Locator::Matching("li", YEAR_PATTERN)),
    (Field::FuelType, Locator::OneOf("li", FUELS)),
];

/// Card `li` entries that are buttons, not the seller's city
const NOT_A_CITY: [&str; 3] = ["Appeler pour le prix", "Se faire rappeler", "Booster l'annonce"];

const fn line(key: &'static str) -> Locator {
    labeled(".detail_line", "span", "span", key)
}

const SELLER: &[Locator] = &[
    Locator::Marked {
        css: "div.block_tele a",
        marker: "i.icon-normal-megaphone",
    },
    Locator::Marked {
        css: "a",
        marker: "i.icon-normal-megaphone",
    },
    Locator::Text("a[href*='stock-professionnel']"),
];

const DETAIL_FIELDS: &[(Field, Locator)] = &[
    (Field::Seller, Locator::Fallback(SELLER)),
    (Field::Mileage, line("Kilométrage")),
    (Field::Transmission, line("Boite de vitesses")),
    (Field::FuelType, line("Carburant")),
    (Field::FiscalPower, line("Puissance fiscale")),
    (Field::Doors, line("Nombre de portes")),
    (Field::FirstHand, line("Première main")),
    (Field::CustomsCleared, line("Véhicule dédouané")),
    (Field::Equipment, Locator::Text("div.options div.col-md-12")),
    (Field::SellerCity, Locator::Text("a[href*='ville']")),
    (Field::Location, Locator::Text("a[href*='ville']")),
];

const GALLERY: &str = "img[data-u='image']";

static AD_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/detail-annonce/(\d+)/").expect("valid ad id pattern"));
static BARE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(YEAR_PATTERN).expect("valid year pattern"));

/// moteur.ma used-car listings
#[derive(Debug, Default, Clone, Copy)]
pub struct MoteurLayout;

impl MoteurLayout {
    pub fn new() -> Self {
        Self
    }
}

impl SiteLayout for MoteurLayout {
    fn site(&self) -> Site {
        Site::Moteur
    }

    /// Pages are addressed by listing offset; the first page has none
    fn index_url(&self, page: u32) -> String {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(PAGE_SIZE);
        if offset > 0 {
            format!("{}{}", BASE_URL, offset)
        } else {
            BASE_URL.to_string()
        }
    }

    fn index_ready(&self) -> &'static str {
        CARDS
    }

    /// Pages past the last one are served without any cards
    fn index_may_be_empty(&self) -> bool {
        true
    }

    fn detail_ready(&self) -> &'static str {
        ".detail_line, h1"
    }

    fn parse_index(&self, html: &str) -> Vec<ListingSummary> {
        let document = Html::parse_document(html);
        let Some(card_selector) = selector(CARDS) else {
            return Vec::new();
        };
        let Ok(base) = Url::parse(BASE_URL) else {
            return Vec::new();
        };

        let cards: Vec<_> = document.select(&card_selector).collect();
        debug!("Found {} Moteur cards", cards.len());

        cards
            .into_iter()
            .filter_map(|card| {
                let href = Locator::Attr(CARD_LINK, "href").find(card)?;
                let url = base.join(&href).ok()?;
                let Some(id) = AD_ID.captures(url.path()).map(|c| c[1].to_string()) else {
                    debug!("Skipping card without listing id: {}", url);
                    return None;
                };

                let mut fields = extract::extract(card, CARD_FIELDS);
                match card_city(card) {
                    Some(city) => fields.insert(Field::SellerCity, city),
                    None => warn!("No city on card {} ({})", id, url),
                }

                Some(ListingSummary {
                    id,
                    url: url.into(),
                    fields,
                })
            })
            .collect()
    }

    fn parse_detail(&self, html: &str, summary: &ListingSummary) -> DetailPage {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let mut fields = extract::extract(root, DETAIL_FIELDS);

        // Brand and model are not labeled on the page; the title starts with them
        if let Some(title) = summary.fields.get(Field::Title) {
            let mut words = title.split_whitespace();
            if let (Some(brand), Some(model)) = (words.next(), words.next()) {
                fields.insert(Field::Brand, brand.to_uppercase());
                fields.insert(Field::Model, capitalize(model));
            }
        }

        let sources = attr_values(root, GALLERY, "src")
            .into_iter()
            .filter(|src| src.starts_with("http"));

        DetailPage {
            fields,
            image_urls: resolve_urls(&summary.url, sources),
        }
    }

    /// Moteur shows no publication date
    fn stamps_run_date(&self) -> bool {
        true
    }
}

/// First card `li` that is neither the year, the fuel nor a button label
fn card_city(card: ElementRef<'_>) -> Option<String> {
    let li = selector("li")?;
    card.select(&li).map(clean_text).find(|text| {
        !text.is_empty()
            && !BARE_YEAR.is_match(text)
            && !FUELS.iter().any(|f| f.to_lowercase() == text.to_lowercase())
            && !NOT_A_CITY.contains(&text.as_str())
    })
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
