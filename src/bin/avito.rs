use car_scout::app;
use car_scout::models::Site;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::init_tracing();

    let summary = app::run(Site::Avito).await?;
    println!(
        "✅ Avito: {} listings written, {} skipped, {} images",
        summary.listings_written, summary.listings_skipped, summary.images_saved
    );

    Ok(())
}
