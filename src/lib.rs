//! Car listing scrapers for avito.ma and moteur.ma.
//!
//! Each site is walked page by page in a headless browser; every listing is
//! appended to `<data_root>/<site>/<site>_complete.csv`, its photos are saved
//! under `<data_root>/<site>/images/<id>/`, and the record can optionally be
//! pushed to a Redis queue.

pub mod app;
pub mod config;
pub mod dates;
pub mod models;
pub mod scrapers;
pub mod storage;
