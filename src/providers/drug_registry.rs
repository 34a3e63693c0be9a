//! Adapter for the OpenFDA drug databases.
//!
//! UPC coverage in the drug/label index is incomplete, so this adapter makes
//! up to two requests: a UPC search against `/drug/label.json`, then a
//! direct product-NDC search against `/drug/ndc.json`. The first hit wins.
//!
//! OpenFDA reports no nutriments, tags, or images; a hit maps to a product
//! carrying only name and brand.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::models::{Product, Source};

use super::{open_facts::nullable_string, FetchOutcome, SourceAdapter};

/// OpenFDA adapter (`https://api.fda.gov`).
pub struct DrugRegistryAdapter {
    client: reqwest::Client,
    base: String,
}

/// One probe against a single OpenFDA index.
enum Probe {
    Hit(Product),
    Miss,
    Unavailable,
}

impl DrugRegistryAdapter {
    pub fn new(client: reqwest::Client, base: String) -> Self {
        Self { client, base }
    }

    async fn probe(&self, path: &str, search: String, barcode: &str, label_index: bool) -> Probe {
        let url = format!("{}/{}", self.base.trim_end_matches('/'), path);
        let resp = match self
            .client
            .get(&url)
            .query(&[("search", search.as_str()), ("limit", "1")])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(path, error = %e, "openfda transport error");
                return Probe::Unavailable;
            }
        };
        if resp.status().is_server_error() {
            return Probe::Unavailable;
        }
        // A search with no matches answers 404 with a JSON error body; that
        // is an authoritative miss, not an outage.
        if !resp.status().is_success() {
            return Probe::Miss;
        }
        let json: Value = match resp.json().await {
            Ok(json) => json,
            Err(e) => {
                debug!(path, error = %e, "openfda invalid body");
                return Probe::Unavailable;
            }
        };
        let Some(result) = json.get("results").and_then(Value::as_array).and_then(|r| r.first())
        else {
            return Probe::Miss;
        };
        Probe::Hit(if label_index {
            map_label_result(barcode, result)
        } else {
            map_ndc_result(barcode, result)
        })
    }
}

#[async_trait]
impl SourceAdapter for DrugRegistryAdapter {
    fn source(&self) -> Source {
        Source::DrugRegistry
    }

    async fn lookup(&self, barcode: &str) -> FetchOutcome {
        let upc = match self
            .probe(
                "drug/label.json",
                format!("upc:\"{}\"", barcode),
                barcode,
                true,
            )
            .await
        {
            Probe::Hit(product) => return FetchOutcome::Found(product),
            miss => miss,
        };

        let ndc = match self
            .probe(
                "drug/ndc.json",
                format!("product_ndc:\"{}\"", barcode),
                barcode,
                false,
            )
            .await
        {
            Probe::Hit(product) => return FetchOutcome::Found(product),
            miss => miss,
        };

        // Only when neither index could even be consulted is the registry
        // considered down.
        match (upc, ndc) {
            (Probe::Unavailable, Probe::Unavailable) => {
                FetchOutcome::Unavailable("Service unavailable".to_string())
            }
            _ => FetchOutcome::NotFound,
        }
    }
}

/// Maps a `/drug/label.json` result: names live under the `openfda` block
/// as single-element arrays. Name prefers the generic name.
pub fn map_label_result(barcode: &str, result: &Value) -> Product {
    let openfda = result.get("openfda").cloned().unwrap_or(Value::Null);
    let generic = first_entry(openfda.get("generic_name"));
    let brand = first_entry(openfda.get("brand_name"));
    let mut product = Product::empty(barcode, Source::DrugRegistry);
    product.product_name = generic.or_else(|| brand.clone());
    product.brand = brand;
    product
}

/// Maps a `/drug/ndc.json` result: names are flat string fields.
pub fn map_ndc_result(barcode: &str, result: &Value) -> Product {
    let generic = nullable_string(result.get("generic_name"));
    let brand = nullable_string(result.get("brand_name"));
    let mut product = Product::empty(barcode, Source::DrugRegistry);
    product.product_name = generic.or_else(|| brand.clone());
    product.brand = brand;
    product
}

fn first_entry(value: Option<&Value>) -> Option<String> {
    nullable_string(value?.as_array()?.first())
}
