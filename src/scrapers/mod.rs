pub mod avito;
pub mod browser;
pub mod extract;
pub mod moteur;
pub mod traits;
pub mod types;
pub mod walker;

pub use avito::AvitoLayout;
pub use browser::{ChromeSession, PageRequest, PageSource};
pub use moteur::MoteurLayout;
pub use traits::SiteLayout;
pub use types::{PageBounds, RunSummary};
pub use walker::{IndexPage, IndexPages, Walker};

use crate::models::Site;

/// Page layout for `site`
pub fn layout_for(site: Site) -> Box<dyn SiteLayout> {
    match site {
        Site::Avito => Box::new(AvitoLayout::new()),
        Site::Moteur => Box::new(MoteurLayout::new()),
    }
}
