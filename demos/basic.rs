//! Basic example showing how to use sea-orm-tagging.
//!
//! Run with: cargo run --example basic

use sea_orm::sea_query::{Alias, Asterisk};
use sea_orm::Database;
use sea_orm_tagging::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_tagging=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url)
        .await?
        .with_tagging_config(TaggerConfig::development());

    // Raw statements pick up the pending tag directly.
    db.tag_with_comment("health check");
    db.execute_raw("SELECT 1", []).await?;

    // Query objects take the tag over and prepend it when they run.
    db.tag_with_comment(sql_tag!("main"));
    let mut tables = db.select();
    tables
        .column(Asterisk)
        .from((Alias::new("information_schema"), Alias::new("tables")));
    let rows = tables.run().await?;
    tracing::info!(rows = rows.len(), "Query finished");

    Ok(())
}
