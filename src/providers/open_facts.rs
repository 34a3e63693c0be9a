//! Adapter for the Open Food Facts and Open Beauty Facts APIs.
//!
//! Both sites expose the same v2 product endpoint and payload shape, so one
//! adapter serves both; only the base URL and the [`Source`] tag differ.
//!
//! The interesting part is the normalization contract, implemented as pure
//! functions over `serde_json::Value` so it can be tested without a network:
//!
//! - strings are trimmed and empty strings become `None`
//! - brand keeps only the first comma-separated token
//! - nutrient values accept a number or a numeric string; anything
//!   non-finite becomes `None`, never `NaN` or zero
//! - allergens/labels prefer the `*_hierarchy` list (stripping `xx:`
//!   language prefixes) and fall back to splitting the flat string field
//! - a payload `status` of `0` is the provider's not-found sentinel

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use crate::models::{Nutriments, Product, ProductImages, Source};

use super::{FetchOutcome, SourceAdapter};

/// Shared adapter for the two Open*Facts providers.
pub struct OpenFactsAdapter {
    client: reqwest::Client,
    base: String,
    source: Source,
}

impl OpenFactsAdapter {
    /// Open Food Facts (`https://world.openfoodfacts.org`).
    pub fn food_facts(client: reqwest::Client, base: String) -> Self {
        Self {
            client,
            base,
            source: Source::FoodFacts,
        }
    }

    /// Open Beauty Facts (`https://world.openbeautyfacts.org`).
    pub fn beauty_facts(client: reqwest::Client, base: String) -> Self {
        Self {
            client,
            base,
            source: Source::BeautyFacts,
        }
    }
}

#[async_trait]
impl SourceAdapter for OpenFactsAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn lookup(&self, barcode: &str) -> FetchOutcome {
        let url = format!(
            "{}/api/v2/product/{}.json",
            self.base.trim_end_matches('/'),
            barcode
        );
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(source = self.source.as_str(), error = %e, "transport error");
                return FetchOutcome::Unavailable("Service unavailable".to_string());
            }
        };
        if resp.status().is_server_error() {
            return FetchOutcome::Unavailable("Service unavailable".to_string());
        }
        // The provider answers 404 with a JSON body carrying `status: 0`,
        // so the body is parsed regardless of 4xx.
        let json: Value = match resp.json().await {
            Ok(json) => json,
            Err(e) => {
                debug!(source = self.source.as_str(), error = %e, "invalid response body");
                return FetchOutcome::Unavailable("Invalid response".to_string());
            }
        };
        decode_body(barcode, &json, self.source)
    }
}

/// Classifies a parsed response body. `status: 0` is the provider's
/// not-found sentinel; a non-object body is an upstream fault, not a miss.
pub fn decode_body(barcode: &str, json: &Value, source: Source) -> FetchOutcome {
    if !json.is_object() {
        return FetchOutcome::Unavailable("Invalid response".to_string());
    }
    if json.get("status").and_then(Value::as_i64) == Some(0) {
        return FetchOutcome::NotFound;
    }
    match json.get("product") {
        Some(raw) if raw.is_object() => FetchOutcome::Found(map_product(barcode, raw, source)),
        _ => FetchOutcome::NotFound,
    }
}

/// Maps a raw Open*Facts `product` object into the normalized model.
pub fn map_product(barcode: &str, raw: &Value, source: Source) -> Product {
    let mut product = Product::empty(barcode, source);
    product.product_name = nullable_string(raw.get("product_name"));
    product.brand = first_brand(raw.get("brands"));
    product.ingredients_text = nullable_string(raw.get("ingredients_text"));
    product.nutriments = raw
        .get("nutriments")
        .map(parse_nutriments)
        .unwrap_or_default();
    product.allergens = parse_tags(raw, "allergens_hierarchy", "allergens");
    product.labels = parse_tags(raw, "labels_hierarchy", "labels");
    product.images = ProductImages {
        front: nullable_string(raw.get("image_front_url"))
            .or_else(|| nullable_string(raw.get("image_url"))),
        ingredients: nullable_string(raw.get("image_ingredients_url")),
    };
    product.expiry_date = nullable_string(raw.get("expiration_date"));
    product.is_expired = product.expiry_date.as_deref().and_then(is_expired);
    product
}

/// Trimmed string, or `None` for missing, non-string, or empty values.
pub fn nullable_string(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// First comma-separated token of the free-text brand field.
fn first_brand(value: Option<&Value>) -> Option<String> {
    let brands = nullable_string(value)?;
    let first = brands.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Numeric coercion: accepts a native number or a parseable numeric string.
/// Non-finite results become `None`.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() {
        Some(n)
    } else {
        None
    }
}

/// Probes candidate keys in priority order, returning the first that
/// coerces to a number.
fn probe(n: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| coerce_number(n.get(k)))
}

/// Extracts the fixed per-100g nutrient set. The energy field prefers the
/// kcal-specific keys over the generic (kJ) one.
pub fn parse_nutriments(n: &Value) -> Nutriments {
    Nutriments {
        energy_kcal: probe(n, &["energy-kcal_100g", "energy_kcal_100g", "energy_100g"]),
        fat: probe(n, &["fat_100g"]),
        saturated_fat: probe(n, &["saturated-fat_100g", "saturated_fat_100g"]),
        carbohydrates: probe(n, &["carbohydrates_100g"]),
        sugars: probe(n, &["sugars_100g"]),
        fiber: probe(n, &["fiber_100g"]),
        proteins: probe(n, &["proteins_100g"]),
        salt: probe(n, &["salt_100g"]),
        sodium: probe(n, &["sodium_100g"]),
    }
}

/// Tag extraction: prefer the hierarchical list field, fall back to the
/// flat comma-separated string field, else empty. Source order preserved.
pub fn parse_tags(raw: &Value, list_key: &str, flat_key: &str) -> Vec<String> {
    if let Some(items) = raw.get(list_key).and_then(Value::as_array) {
        return items
            .iter()
            .map(|v| clean_tag(v.as_str().unwrap_or_default()))
            .collect();
    }
    if let Some(flat) = raw.get(flat_key).and_then(Value::as_str) {
        if !flat.trim().is_empty() {
            return flat
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

/// Strips a leading `xx:` language-code prefix: `"en:organic"` becomes
/// `"organic"`; a tag with no colon is returned unchanged.
pub fn clean_tag(tag: &str) -> String {
    match tag.find(':') {
        Some(idx) => tag[idx + 1..].to_string(),
        None => tag.to_string(),
    }
}

/// Compares an expiry date against today. `None` when the date does not
/// parse; the flag is only ever computed, never assumed false.
pub fn is_expired(expiry: &str) -> Option<bool> {
    let s = expiry.trim();
    let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()?;
    Some(parsed < Utc::now().date_naive())
}
