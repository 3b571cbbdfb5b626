use crate::models::{DetailPage, Field, ListingSummary, Site};
use crate::scrapers::extract::{
    self, attr_values, clean_text, labeled, resolve_urls, selector, Locator, FUELS, GEARBOXES,
    YEAR_PATTERN,
};
use crate::scrapers::traits::SiteLayout;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

const BASE_URL: &str = "https://www.avito.ma/fr/maroc/voitures_d_occasion-%C3%A0_vendre";

const INDEX_READY: &str = ".sc-1nre5ec-1";
const CARDS: &str = ".sc-1nre5ec-1 a.sc-1jge648-0";
const DEFAULT_SELLER: &str = "Particulier";

const CARD_FIELDS: &[(Field, Locator)] = &[
    (Field::Title, Locator::Text("p.sc-1x0vz2r-0.iHApav")),
    (Field::Price, Locator::Text("p.sc-1x0vz2r-0.dJAfqm")),
    (Field::Published, Locator::Text("p.sc-1x0vz2r-0.layWaX")),
    (Field::Year, Locator::Matching("span", YEAR_PATTERN)),
    (Field::FuelType, Locator::OneOf("span", FUELS)),
    (Field::Transmission, Locator::OneOf("span", GEARBOXES)),
    (Field::Seller, Locator::Text("p.sc-1x0vz2r-0.hNCqYw")),
];

// Characteristic rows on the detail page: a value span and a label span
const ROW: &str = "div[class*='sc-19cngu6-1']";
const ROW_VALUE: &str = "span[class*='fjZBup']";
const ROW_LABEL: &str = "span[class*='bXFCIH']";
const LOCATION: &str = "span[class*='iKguVF']";

const fn row(key: &'static str) -> Locator {
    labeled(ROW, ROW_LABEL, ROW_VALUE, key)
}

const VEHICLE_TYPE: &[Locator] = &[row("Type de véhicule"), row("Catégorie"), row("Categorie")];
const SECTOR: &[Locator] = &[row("Secteur"), Locator::Text(LOCATION)];

const DETAIL_FIELDS: &[(Field, Locator)] = &[
    (Field::Year, row("Année-Modèle")),
    (Field::VehicleType, Locator::Fallback(VEHICLE_TYPE)),
    (Field::Mileage, row("Kilométrage")),
    (Field::Brand, row("Marque")),
    (Field::Model, row("Modèle")),
    (Field::Doors, row("Nombre de portes")),
    (Field::Origin, row("Origine")),
    (Field::FirstHand, row("Première main")),
    (Field::FiscalPower, row("Puissance fiscale")),
    (Field::Condition, row("État")),
    (Field::Location, Locator::Fallback(SECTOR)),
    (Field::Transmission, row("Boite de vitesses")),
    (Field::FuelType, row("Type de carburant")),
];

const GALLERY: &str = "div.picture img";
const GALLERY_FALLBACK: &str = "img.sc-1gjavk-0, .sc-1gjavk-0 img";

/// Expands the collapsed characteristics block
const SHOW_MORE: &str = r#"
    const more = Array.from(document.querySelectorAll('button'))
        .find(b => b.textContent.includes('Voir plus'));
    if (more) more.click();
"#;

static AD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.htm").expect("valid ad id pattern"));

/// avito.ma used-car listings
#[derive(Debug, Default, Clone, Copy)]
pub struct AvitoLayout;

impl AvitoLayout {
    pub fn new() -> Self {
        Self
    }
}

impl SiteLayout for AvitoLayout {
    fn site(&self) -> Site {
        Site::Avito
    }

    fn index_url(&self, page: u32) -> String {
        format!("{}?o={}", BASE_URL, page)
    }

    fn index_ready(&self) -> &'static str {
        INDEX_READY
    }

    fn detail_ready(&self) -> &'static str {
        "h1"
    }

    fn detail_script(&self) -> Option<&'static str> {
        Some(SHOW_MORE)
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
        debug!("Found {} Avito cards", cards.len());

        cards
            .into_iter()
            .filter_map(|card| {
                let href = card.value().attr("href")?;
                let url = base.join(href).ok()?;
                let Some(id) = listing_id(&url) else {
                    debug!("Skipping card without listing id: {}", url);
                    return None;
                };

                let mut fields = extract::extract(card, CARD_FIELDS);
                if !fields.contains(Field::Seller) {
                    fields.insert(Field::Seller, DEFAULT_SELLER);
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

        if let Some(place) = Locator::Text(LOCATION).find(root) {
            let city = place.split(',').next().unwrap_or(&place).to_string();
            fields.insert(Field::SellerCity, city);
        }
        if let Some(equipment) = equipment(root) {
            fields.insert(Field::Equipment, equipment);
        }

        let mut sources = attr_values(root, GALLERY, "src");
        if sources.is_empty() {
            sources = attr_values(root, GALLERY_FALLBACK, "src");
        }

        DetailPage {
            fields,
            image_urls: resolve_urls(&summary.url, sources),
        }
    }
}

/// Numeric id from `..._55012345.htm`, else the last path segment
fn listing_id(url: &Url) -> Option<String> {
    if let Some(caps) = AD_ID.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.trim_end_matches(".htm").to_string())
        .filter(|s| !s.is_empty())
}

/// Characteristic rows that carry a value but no label are equipment items
fn equipment(root: ElementRef<'_>) -> Option<String> {
    let (row_sel, label_sel, value_sel) = (selector(ROW)?, selector(ROW_LABEL)?, selector(ROW_VALUE)?);

    let items: Vec<String> = root
        .select(&row_sel)
        .filter(|row| row.select(&label_sel).next().is_none())
        .filter_map(|row| row.select(&value_sel).next())
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .collect();

    (!items.is_empty()).then(|| items.join(", "))
}
