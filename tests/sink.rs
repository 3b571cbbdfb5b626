use anyhow::{bail, Result};
use async_trait::async_trait;
use car_scout::models::{DetailPage, Field, Fields, Listing, ListingSummary, COLUMNS};
use car_scout::storage::{CsvSink, ListingSink, Publisher};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

fn listing(id: &str, fields: Fields) -> Listing {
    let summary = ListingSummary {
        id: id.to_string(),
        url: format!("https://www.avito.ma/fr/annonce_{}.htm", id),
        fields,
    };
    Listing::assemble(&summary, DetailPage::default(), now(), false)
}

fn rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _listing: &Listing) -> Result<()> {
        bail!("broker unreachable")
    }

    fn topic(&self) -> &str {
        "avito_listings"
    }
}

#[derive(Default, Clone)]
struct RecordingPublisher {
    messages: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, listing: &Listing) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push(serde_json::to_string(listing)?);
        Ok(())
    }

    fn topic(&self) -> &str {
        "avito_listings"
    }
}

#[tokio::test]
async fn fresh_file_gets_one_header_then_rows_in_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avito").join("avito_complete.csv");

    let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), None);
    sink.write(&listing("1", Fields::new())).await.unwrap();
    sink.write(&listing("2", Fields::new())).await.unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], COLUMNS.join(","));

    let rows = rows(&path);
    assert_eq!(rows[1][0], "1");
    assert_eq!(rows[2][0], "2");
    assert_eq!(sink.csv().rows(), 2);
}

#[tokio::test]
async fn reopening_appends_without_a_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avito_complete.csv");

    {
        let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), None);
        sink.write(&listing("1", Fields::new())).await.unwrap();
    }
    {
        let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), None);
        sink.write(&listing("2", Fields::new())).await.unwrap();
    }

    let rows = rows(&path);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r[0] == "id").count(), 1);
    assert_eq!(rows[1][0], "1");
    assert_eq!(rows[2][0], "2");
}

#[tokio::test]
async fn every_row_has_the_fixed_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avito_complete.csv");

    let mut full = Fields::new();
    full.insert(Field::Title, "Golf 7, \"R-Line\"");
    full.insert(Field::Price, "215 000 DH");
    full.insert(Field::Published, "il y a 2 jours");
    full.insert(Field::Year, "2020");
    full.insert(Field::FuelType, "Diesel");
    full.insert(Field::Transmission, "Automatique");
    full.insert(Field::Equipment, "ABS, Climatisation");

    let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), None);
    sink.write(&listing("1", full)).await.unwrap();
    sink.write(&listing("2", Fields::new())).await.unwrap();

    let rows = rows(&path);
    assert!(rows.iter().all(|r| r.len() == COLUMNS.len()));

    let title = COLUMNS.iter().position(|c| *c == "title").unwrap();
    let price = COLUMNS.iter().position(|c| *c == "price").unwrap();
    let date = COLUMNS.iter().position(|c| *c == "publication_date").unwrap();
    let transmission = COLUMNS.iter().position(|c| *c == "transmission").unwrap();

    assert_eq!(rows[1][title], "Golf 7, \"R-Line\"");
    assert_eq!(rows[1][price], "215000");
    assert_eq!(rows[1][date], "2024-03-13");
    assert_eq!(rows[1][transmission], "Automatique");

    assert_eq!(rows[2][title], "");
    assert_eq!(rows[2][price], "");
    assert_eq!(rows[2][transmission], "");
}

#[tokio::test]
async fn publish_failure_does_not_block_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avito_complete.csv");

    let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), Some(Box::new(FailingPublisher)));
    sink.write(&listing("1", Fields::new())).await.unwrap();
    sink.write(&listing("2", Fields::new())).await.unwrap();

    assert_eq!(rows(&path).len(), 3);
}

#[tokio::test]
async fn published_message_carries_the_csv_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avito_complete.csv");
    let publisher = RecordingPublisher::default();

    let mut fields = Fields::new();
    fields.insert(Field::Price, "Prix non spécifié");
    fields.insert(Field::Year, "2016");

    let mut sink = ListingSink::new(CsvSink::open(&path).unwrap(), Some(Box::new(publisher.clone())));
    sink.write(&listing("7", fields)).await.unwrap();

    let messages = publisher.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);

    let value: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
    let object = value.as_object().unwrap();
    for column in COLUMNS {
        assert!(object.contains_key(column), "missing {column}");
    }
    assert_eq!(object["id"], "7");
    assert!(object["price"].is_null());
    assert_eq!(object["year"], 2016);
}

#[test]
fn unwritable_output_path_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file.txt");
    fs::write(&blocker, "not a directory").unwrap();

    let result = CsvSink::open(blocker.join("out.csv"));

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
}
