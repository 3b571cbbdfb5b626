use crate::dates::{self, PublishedAt};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Classified-ads site a scraper targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Avito,
    Moteur,
}

impl Site {
    /// Directory and file prefix used under the data root
    pub fn slug(&self) -> &'static str {
        match self {
            Site::Avito => "avito",
            Site::Moteur => "moteur",
        }
    }

    pub fn default_topic(&self) -> String {
        format!("{}_listings", self.slug())
    }

    pub fn csv_file_name(&self) -> String {
        format!("{}_complete.csv", self.slug())
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Avito => write!(f, "Avito"),
            Site::Moteur => write!(f, "Moteur"),
        }
    }
}

/// Named values a page can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Price,
    Published,
    Year,
    FuelType,
    Transmission,
    Seller,
    VehicleType,
    Location,
    Mileage,
    Brand,
    Model,
    Doors,
    Origin,
    FirstHand,
    FiscalPower,
    Condition,
    Equipment,
    SellerCity,
    CustomsCleared,
}

/// Raw text values read from a page, keyed by field
///
/// Blank values are never stored, so `get` returning `Some` always means the
/// page actually showed something.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(HashMap<Field, String>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.0.insert(field, value.to_string());
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Overlay `other` on top of `self`; values in `other` win
    pub fn merge(&mut self, other: Fields) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What an index card shows before its detail page is visited
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub id: String,
    pub url: String,
    pub fields: Fields,
}

/// Values read from a detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub fields: Fields,
    pub image_urls: Vec<String>,
}

/// CSV header, in output order. `Listing::to_record` follows the same order.
pub const COLUMNS: [&str; 24] = [
    "id",
    "title",
    "price",
    "publication_date",
    "year",
    "fuel_type",
    "transmission",
    "seller",
    "vehicle_type",
    "location",
    "mileage",
    "brand",
    "model",
    "doors",
    "origin",
    "first_hand",
    "fiscal_power",
    "condition",
    "equipment",
    "seller_city",
    "customs_cleared",
    "url",
    "image_folder",
    "image_urls",
];

/// Separator between image URLs inside the `image_urls` CSV cell
pub const IMAGE_URL_SEPARATOR: &str = " | ";

/// One scraped car listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: Option<String>,
    pub price: Option<u64>,
    pub publication_date: Option<PublishedAt>,
    pub year: Option<u16>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub seller: Option<String>,
    pub vehicle_type: Option<String>,
    pub location: Option<String>,
    pub mileage: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub doors: Option<String>,
    pub origin: Option<String>,
    pub first_hand: Option<String>,
    pub fiscal_power: Option<String>,
    pub condition: Option<String>,
    pub equipment: Option<String>,
    pub seller_city: Option<String>,
    pub customs_cleared: Option<String>,
    pub url: String,
    pub image_folder: Option<String>,
    pub image_urls: Vec<String>,
}

impl Listing {
    /// Combine an index card with its detail page.
    ///
    /// Detail values win over card values. `now` is the reference instant for
    /// relative publication dates; when the site shows no date at all and
    /// `stamp_run_date` is set, the run date is recorded instead.
    pub fn assemble(
        summary: &ListingSummary,
        detail: DetailPage,
        now: NaiveDateTime,
        stamp_run_date: bool,
    ) -> Self {
        let mut fields = summary.fields.clone();
        fields.merge(detail.fields);

        let text = |field: Field| fields.get(field).map(str::to_string);

        let publication_date = match fields.get(Field::Published) {
            Some(raw) => Some(dates::normalize(raw, now)),
            None if stamp_run_date => Some(PublishedAt::Day(now.date())),
            None => None,
        };

        Self {
            id: summary.id.clone(),
            title: text(Field::Title),
            price: fields.get(Field::Price).and_then(parse_price),
            publication_date,
            year: fields.get(Field::Year).and_then(parse_year),
            fuel_type: text(Field::FuelType),
            transmission: text(Field::Transmission),
            seller: text(Field::Seller),
            vehicle_type: text(Field::VehicleType),
            location: text(Field::Location),
            mileage: text(Field::Mileage),
            brand: text(Field::Brand),
            model: text(Field::Model),
            doors: text(Field::Doors),
            origin: text(Field::Origin),
            first_hand: text(Field::FirstHand),
            fiscal_power: text(Field::FiscalPower),
            condition: text(Field::Condition),
            equipment: text(Field::Equipment),
            seller_city: text(Field::SellerCity),
            customs_cleared: text(Field::CustomsCleared),
            url: summary.url.clone(),
            image_folder: None,
            image_urls: detail.image_urls,
        }
    }

    /// CSV row in `COLUMNS` order; absent values become empty cells
    pub fn to_record(&self) -> [String; COLUMNS.len()] {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();

        [
            self.id.clone(),
            opt(&self.title),
            self.price.map(|p| p.to_string()).unwrap_or_default(),
            self.publication_date
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            opt(&self.fuel_type),
            opt(&self.transmission),
            opt(&self.seller),
            opt(&self.vehicle_type),
            opt(&self.location),
            opt(&self.mileage),
            opt(&self.brand),
            opt(&self.model),
            opt(&self.doors),
            opt(&self.origin),
            opt(&self.first_hand),
            opt(&self.fiscal_power),
            opt(&self.condition),
            opt(&self.equipment),
            opt(&self.seller_city),
            opt(&self.customs_cleared),
            self.url.clone(),
            opt(&self.image_folder),
            self.image_urls.join(IMAGE_URL_SEPARATOR),
        ]
    }
}

/// Phrases the sites show instead of a number
const PRICE_ON_REQUEST: [&str; 4] = [
    "prix non spécifié",
    "appeler pour le prix",
    "prix sur demande",
    "price on request",
];

/// Parse a displayed price such as `145 000 DH`.
///
/// A missing price and an unreadable one both come back as `None`; only the
/// log line tells them apart.
pub fn parse_price(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        let lowered = raw.trim().to_lowercase();
        if PRICE_ON_REQUEST.iter().any(|p| lowered.contains(p)) {
            debug!("Price on request: {}", raw);
        } else {
            warn!("Could not parse price from '{}'", raw);
        }
        return None;
    }

    match digits.parse() {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("Could not parse price from '{}': {}", raw, e);
            None
        }
    }
}

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year pattern"));

pub fn parse_year(raw: &str) -> Option<u16> {
    YEAR.find(raw).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn summary(fields: Fields) -> ListingSummary {
        ListingSummary {
            id: "42".to_string(),
            url: "https://example.test/42".to_string(),
            fields,
        }
    }

    #[test]
    fn record_width_is_fixed_for_empty_listing() {
        let listing = Listing::assemble(&summary(Fields::new()), DetailPage::default(), now(), false);
        let record = listing.to_record();

        assert_eq!(record.len(), COLUMNS.len());
        assert_eq!(record[0], "42");
        assert_eq!(record[21], "https://example.test/42");
        assert!(record[1..21].iter().all(String::is_empty));
    }

    #[test]
    fn detail_values_override_card_values() {
        let mut card = Fields::new();
        card.insert(Field::Title, "Dacia Logan");
        card.insert(Field::Transmission, "Manuelle");
        card.insert(Field::Price, "89 000 DH");

        let mut detail = DetailPage::default();
        detail.fields.insert(Field::Transmission, "Automatique");
        detail.fields.insert(Field::Mileage, "120 000 - 129 999");
        detail.image_urls = vec!["https://img.test/1.jpg".to_string()];

        let listing = Listing::assemble(&summary(card), detail, now(), false);

        assert_eq!(listing.title.as_deref(), Some("Dacia Logan"));
        assert_eq!(listing.transmission.as_deref(), Some("Automatique"));
        assert_eq!(listing.mileage.as_deref(), Some("120 000 - 129 999"));
        assert_eq!(listing.price, Some(89_000));
        assert_eq!(listing.image_urls.len(), 1);
    }

    #[test]
    fn publication_date_is_normalized_or_stamped() {
        let mut card = Fields::new();
        card.insert(Field::Published, "il y a 2 jours");
        let listing = Listing::assemble(&summary(card), DetailPage::default(), now(), false);
        assert_eq!(
            listing.publication_date,
            Some(PublishedAt::Day(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()))
        );

        let stamped = Listing::assemble(&summary(Fields::new()), DetailPage::default(), now(), true);
        assert_eq!(stamped.publication_date, Some(PublishedAt::Day(now().date())));

        let undated = Listing::assemble(&summary(Fields::new()), DetailPage::default(), now(), false);
        assert_eq!(undated.publication_date, None);
    }

    #[test]
    fn blank_field_values_are_not_stored() {
        let mut fields = Fields::new();
        fields.insert(Field::Title, "   ");
        assert!(fields.is_empty());
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price("145 000 DH"), Some(145_000));
        assert_eq!(parse_price("1\u{a0}250\u{a0}000 Dhs"), Some(1_250_000));
        assert_eq!(parse_price("Prix non spécifié"), None);
        assert_eq!(parse_price("Appeler pour le prix"), None);
        assert_eq!(parse_price("n/a"), None);
        assert_eq!(parse_price("999999999999999999999999"), None);
    }

    #[test]
    fn year_parsing() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year("Modèle 1998"), Some(1998));
        assert_eq!(parse_year("Diesel"), None);
    }

    #[test]
    fn json_keys_match_csv_columns() {
        let listing = Listing::assemble(&summary(Fields::new()), DetailPage::default(), now(), true);
        let value = serde_json::to_value(&listing).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), COLUMNS.len());
        for column in COLUMNS {
            assert!(object.contains_key(column), "missing key {column}");
        }
        assert_eq!(object["publication_date"], "2024-03-15");
        assert!(object["price"].is_null());
    }
}
