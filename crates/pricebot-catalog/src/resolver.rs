//! Entity resolution
//!
//! Maps noisy raw strings onto canonical vendors and products. The product
//! ladder tries deterministic keys first, then the alias table, then
//! embedding similarity, and only then mints a new product. Every hit whose
//! description differs from the canonical name back-fills an alias so the
//! next sheet from that vendor resolves deterministically.

use std::sync::Arc;

use pricebot_extraction::EmbeddingClient;
use pricebot_ingest::RawOffer;
use pricebot_store::{AliasRepo, Product, ProductAlias, ProductRepo, Vendor, VendorRepo};
use serde::Serialize;
use tracing::debug;
use turso::Connection;
use uuid::Uuid;

use crate::error::Result;

/// How a product lookup was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Upc,
    BrandModel,
    ModelNumber,
    AliasExact,
    AliasEmbedding,
    Created,
}

/// Resolver tuning knobs (config-fed)
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Cosine similarity floor for an embedding match
    pub similarity_threshold: f32,
    /// Candidate aliases scored per fuzzy lookup
    pub candidate_cap: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.86,
            candidate_cap: 50,
        }
    }
}

/// Entity resolver for one unit of work
pub struct EntityResolver<'a> {
    conn: &'a Connection,
    settings: ResolverSettings,
    embeddings: Option<Arc<dyn EmbeddingClient>>,
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        conn: &'a Connection,
        settings: ResolverSettings,
        embeddings: Option<Arc<dyn EmbeddingClient>>,
    ) -> Self {
        Self {
            conn,
            settings,
            embeddings,
        }
    }

    /// Resolve a vendor name (declared > row hint > document metadata),
    /// creating on miss. `None` when every source is empty.
    pub async fn resolve_vendor(
        &self,
        declared: Option<&str>,
        row_hint: Option<&str>,
        document_vendor: Option<&str>,
    ) -> Result<Option<Vendor>> {
        let name = [declared, row_hint, document_vendor]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty());

        match name {
            Some(name) => Ok(Some(VendorRepo::new(self.conn).get_or_create(name).await?)),
            None => Ok(None),
        }
    }

    /// Walk the resolution ladder for one row
    pub async fn resolve_product(
        &self,
        row: &RawOffer,
        vendor: &Vendor,
    ) -> Result<(Product, MatchSource)> {
        let products = ProductRepo::new(self.conn);
        let aliases = AliasRepo::new(self.conn);
        let description = clean_description(&row.description);

        // (a) UPC equality on the normalized code
        if let Some(upc) = row.upc.as_deref().map(normalize_upc).filter(|u| plausible_upc(u))
            && let Some(product) = products.get_by_upc(&upc).await?
        {
            self.backfill_alias(&aliases, &product, &description, vendor).await?;
            return Ok((product, MatchSource::Upc));
        }

        // (b) (brand, model_number) when the row carries both
        if let (Some(brand), Some(model)) = (row.brand.as_deref(), row.model_number.as_deref())
            && let Some(product) = products.get_by_brand_model(brand, model).await?
        {
            self.backfill_alias(&aliases, &product, &description, vendor).await?;
            return Ok((product, MatchSource::BrandModel));
        }

        // Model number alone still identifies electronics reliably
        if let Some(model) = row.model_number.as_deref().map(str::trim).filter(|m| !m.is_empty())
            && let Some(product) = products.get_by_model(model).await?
        {
            self.backfill_alias(&aliases, &product, &description, vendor).await?;
            return Ok((product, MatchSource::ModelNumber));
        }

        // (c) exact alias, vendor-scoped first
        let exact = aliases.find_exact(&description, Some(&vendor.id)).await?;
        if let Some(alias) = exact.first()
            && let Some(product) = products.get_by_id(&alias.product_id).await?
        {
            return Ok((product, MatchSource::AliasExact));
        }

        // (d) embedding similarity when the capability is on
        if let Some(hit) = self.embedding_lookup(&aliases, &description).await? {
            if let Some(product) = products.get_by_id(&hit).await? {
                self.backfill_alias(&aliases, &product, &description, vendor).await?;
                return Ok((product, MatchSource::AliasEmbedding));
            }
        }

        // (e) miss: mint a product named by the cleaned description
        let product = Product::new(description.clone())
            .with_identifiers(
                row.brand.clone(),
                row.model_number.clone(),
                row.upc.as_deref().map(normalize_upc).filter(|u| plausible_upc(u)),
            )
            .with_default_vendor(vendor.id);
        products.create(&product).await?;

        let mut alias = ProductAlias::new(product.id, description, Some(vendor.id));
        if let Some(embedding) = self.embed_quietly(&alias.alias_text).await {
            alias.embedding = Some(embedding);
        }
        aliases.create_if_absent(&alias).await?;

        debug!(product = %product.canonical_name, "Created product");
        Ok((product, MatchSource::Created))
    }

    /// Record the observed description as an alias when it differs from the
    /// canonical name
    async fn backfill_alias(
        &self,
        aliases: &AliasRepo<'_>,
        product: &Product,
        description: &str,
        vendor: &Vendor,
    ) -> Result<()> {
        if description.eq_ignore_ascii_case(&product.canonical_name) {
            return Ok(());
        }
        let mut alias = ProductAlias::new(product.id, description, Some(vendor.id));
        if let Some(embedding) = self.embed_quietly(description).await {
            alias.embedding = Some(embedding);
        }
        aliases.create_if_absent(&alias).await?;
        Ok(())
    }

    /// Nearest alias by cosine similarity, if it clears the threshold
    async fn embedding_lookup(
        &self,
        aliases: &AliasRepo<'_>,
        description: &str,
    ) -> Result<Option<Uuid>> {
        let Some(query) = self.embed_quietly(description).await else {
            return Ok(None);
        };

        let candidates = aliases.list_with_embeddings(self.settings.candidate_cap).await?;
        let mut best: Option<(f32, Uuid)> = None;
        for candidate in &candidates {
            let Some(vector) = candidate.embedding.as_deref() else {
                continue;
            };
            let score = cosine_similarity(&query, vector);
            if score >= self.settings.similarity_threshold
                && best.is_none_or(|(s, _)| score > s)
            {
                best = Some((score, candidate.product_id));
            }
        }
        Ok(best.map(|(_, product_id)| product_id))
    }

    /// Embed without failing the row; capability problems just disable fuzz
    async fn embed_quietly(&self, text: &str) -> Option<Vec<f32>> {
        let client = self.embeddings.as_ref()?;
        match client.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                debug!(error = %e, "embedding unavailable");
                None
            }
        }
    }
}

/// Squeeze whitespace; the canonical name for minted products
pub fn clean_description(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Digits only
pub fn normalize_upc(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Real UPC/EAN codes are 8-14 digits
pub fn plausible_upc(digits: &str) -> bool {
    (8..=14).contains(&digits.len())
}

/// Cosine similarity over two dense vectors; 0 on dimension mismatch
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricebot_store::Store;
    use rust_decimal::Decimal;

    fn row(description: &str) -> RawOffer {
        RawOffer::new(description, Decimal::ONE)
    }

    async fn setup() -> (Store, Vendor) {
        let store = Store::new_memory().await.unwrap();
        let vendor = {
            let conn = store.connect().unwrap();
            VendorRepo::new(&conn).get_or_create("Acme").await.unwrap()
        };
        (store, vendor)
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_upc_normalization() {
        assert_eq!(normalize_upc("190-199-220546"), "190199220546");
        assert!(plausible_upc("190199220546"));
        assert!(!plausible_upc("123"));
    }

    #[tokio::test]
    async fn test_miss_creates_product_with_alias() {
        let (store, vendor) = setup().await;
        let conn = store.connect().unwrap();
        let resolver = EntityResolver::new(&conn, ResolverSettings::default(), None);

        let (product, source) = resolver
            .resolve_product(&row("iPhone  11  64GB"), &vendor)
            .await
            .unwrap();
        assert_eq!(source, MatchSource::Created);
        assert_eq!(product.canonical_name, "iPhone 11 64GB");
        assert_eq!(product.default_vendor_id, Some(vendor.id));

        let aliases = AliasRepo::new(&conn)
            .list_for_product(&product.id)
            .await
            .unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].alias_text, "iPhone 11 64GB");
    }

    #[tokio::test]
    async fn test_upc_wins_over_everything() {
        let (store, vendor) = setup().await;
        let conn = store.connect().unwrap();
        let resolver = EntityResolver::new(&conn, ResolverSettings::default(), None);

        let mut first = row("iPhone 11 64GB Black");
        first.upc = Some("190199220546".into());
        let (created, _) = resolver.resolve_product(&first, &vendor).await.unwrap();

        // Totally different description, same UPC
        let mut second = row("IPH 11 64 BLK renewed");
        second.upc = Some("190-199-220546".into());
        let (matched, source) = resolver.resolve_product(&second, &vendor).await.unwrap();

        assert_eq!(matched.id, created.id);
        assert_eq!(source, MatchSource::Upc);

        // The divergent description was recorded as an alias
        let aliases = AliasRepo::new(&conn)
            .list_for_product(&created.id)
            .await
            .unwrap();
        assert!(aliases.iter().any(|a| a.alias_text == "IPH 11 64 BLK renewed"));
    }

    #[tokio::test]
    async fn test_alias_exact_match_reuses_product() {
        let (store, vendor) = setup().await;
        let conn = store.connect().unwrap();
        let resolver = EntityResolver::new(&conn, ResolverSettings::default(), None);

        let (created, _) = resolver
            .resolve_product(&row("Galaxy S24 256GB"), &vendor)
            .await
            .unwrap();
        let (matched, source) = resolver
            .resolve_product(&row("Galaxy S24 256GB"), &vendor)
            .await
            .unwrap();

        assert_eq!(matched.id, created.id);
        assert_eq!(source, MatchSource::AliasExact);
    }

    #[tokio::test]
    async fn test_model_number_match() {
        let (store, vendor) = setup().await;
        let conn = store.connect().unwrap();
        let resolver = EntityResolver::new(&conn, ResolverSettings::default(), None);

        let mut first = row("Apple iPhone 12");
        first.model_number = Some("A2403".into());
        let (created, _) = resolver.resolve_product(&first, &vendor).await.unwrap();

        let mut second = row("iphone12 dual sim");
        second.model_number = Some("a2403".into());
        let (matched, source) = resolver.resolve_product(&second, &vendor).await.unwrap();

        assert_eq!(matched.id, created.id);
        assert_eq!(source, MatchSource::ModelNumber);
    }

    #[tokio::test]
    async fn test_embedding_match_above_threshold() {
        use async_trait::async_trait;
        use pricebot_extraction::{EmbeddingClient, ExtractionError};

        struct StubEmbeddings;

        #[async_trait]
        impl EmbeddingClient for StubEmbeddings {
            async fn embed(&self, text: &str) -> pricebot_extraction::Result<Vec<f32>> {
                // Same-prefix texts embed identically; others orthogonal
                if text.to_lowercase().contains("iphone") {
                    Ok(vec![1.0, 0.0])
                } else if text.to_lowercase().contains("pixel") {
                    Ok(vec![0.0, 1.0])
                } else {
                    Err(ExtractionError::Unavailable("unknown".into()))
                }
            }
        }

        let (store, vendor) = setup().await;
        let conn = store.connect().unwrap();
        let resolver = EntityResolver::new(
            &conn,
            ResolverSettings::default(),
            Some(std::sync::Arc::new(StubEmbeddings)),
        );

        let (created, _) = resolver
            .resolve_product(&row("iPhone 15 Pro Max"), &vendor)
            .await
            .unwrap();

        // Different wording, same embedding neighborhood
        let (matched, source) = resolver
            .resolve_product(&row("iphone fifteen promax 256"), &vendor)
            .await
            .unwrap();
        assert_eq!(matched.id, created.id);
        assert_eq!(source, MatchSource::AliasEmbedding);

        // Orthogonal embedding mints a fresh product
        let (other, source) = resolver
            .resolve_product(&row("Pixel 9"), &vendor)
            .await
            .unwrap();
        assert_ne!(other.id, created.id);
        assert_eq!(source, MatchSource::Created);
    }
}
