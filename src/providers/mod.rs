//! Upstream product-data providers.
//!
//! Each provider is a [`SourceAdapter`]: one HTTP lookup that maps the
//! provider's own JSON shape into the normalized [`Product`]. Adapters never
//! propagate transport or parse errors past their boundary; everything
//! degrades to a [`FetchOutcome`] so the resolver can compose them into a
//! fallback chain.
//!
//! Providers:
//!
//! | Module | Upstream | Codes |
//! |--------|----------|-------|
//! | [`open_facts`] | Open Food Facts / Open Beauty Facts | EAN/UPC |
//! | [`drug_registry`] | OpenFDA drug label + NDC catalog | UPC, NDC |

pub mod drug_registry;
pub mod open_facts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProvidersConfig;
use crate::models::{Product, Source};

pub use drug_registry::DrugRegistryAdapter;
pub use open_facts::OpenFactsAdapter;

/// Outcome of a single adapter call.
///
/// `NotFound` is an authoritative answer from the provider ("this code is
/// not in our database"); `Unavailable` means the provider could not be
/// consulted at all (network failure, 5xx, malformed body). The fallback
/// chain treats both as "try the next adapter", but the distinction is kept
/// so the outermost boundary can tell an unknown barcode from an outage.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Product),
    NotFound,
    Unavailable(String),
}

/// A single upstream product-data source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which provider this adapter represents.
    fn source(&self) -> Source;

    /// Looks up one barcode. Must not panic and must not surface transport
    /// or parse errors as anything other than [`FetchOutcome::Unavailable`].
    async fn lookup(&self, barcode: &str) -> FetchOutcome;
}

/// Builds the three production adapters from configuration, sharing one
/// HTTP client.
pub fn build_adapters(config: &ProvidersConfig) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(vec![
        Arc::new(OpenFactsAdapter::food_facts(
            client.clone(),
            config.food_facts_base.clone(),
        )),
        Arc::new(OpenFactsAdapter::beauty_facts(
            client.clone(),
            config.beauty_facts_base.clone(),
        )),
        Arc::new(DrugRegistryAdapter::new(
            client,
            config.drug_registry_base.clone(),
        )),
    ])
}
