//! `pricebot list-documents` - inspect recent ingests

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use pricebot_config::Config;
use pricebot_store::{DocumentRepo, OfferRepo, Store};

#[derive(Args, Debug)]
pub struct ListDocumentsArgs {
    /// How many documents to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub async fn run(config: Config, args: ListDocumentsArgs) -> Result<()> {
    let store = Arc::new(
        Store::open(&config.database.url)
            .await
            .context("opening catalog database")?,
    );
    let conn = store.connect()?;
    let documents = DocumentRepo::new(&conn).list(args.limit, 0).await?;
    let offers = OfferRepo::new(&conn);

    if documents.is_empty() {
        println!("no documents ingested yet");
        return Ok(());
    }

    println!(
        "{:<36}  {:<24}  {:<10}  {:>6}  {}",
        "ID", "STATUS", "TYPE", "OFFERS", "FILE"
    );
    for doc in documents {
        let count = offers.count_for_document(&doc.id).await?;
        println!(
            "{:<36}  {:<24}  {:<10}  {:>6}  {}",
            doc.id,
            doc.status.as_str(),
            doc.file_type,
            count,
            doc.file_name
        );
    }
    Ok(())
}
