//! Core data types shared across the cache, resolver, and HTTP layers.
//!
//! The central type is [`Product`], the normalized UI model: every upstream
//! provider's payload is mapped into this one shape so callers never see
//! provider-specific JSON. Wire field names are camelCase to match the
//! proxy API contract consumed by the web and mobile clients.

use serde::{Deserialize, Serialize};

/// Where a product record came from.
///
/// Serialized values match the identifiers the clients store in scan
/// history rows (`"openfoodfacts"`, `"openfda"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Open Food Facts (food products).
    #[serde(rename = "openfoodfacts")]
    FoodFacts,
    /// Open Beauty Facts (cosmetics).
    #[serde(rename = "openbeautyfacts")]
    BeautyFacts,
    /// OpenFDA drug/label registry (medicine).
    #[serde(rename = "openfda")]
    DrugRegistry,
    /// Served from a local cache rather than a live upstream call.
    #[serde(rename = "cache")]
    Cache,
    /// Entered by hand (expiry-scan path, no barcode match).
    #[serde(rename = "manual")]
    Manual,
}

impl Source {
    /// Stable identifier used in logs and scan rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::FoodFacts => "openfoodfacts",
            Source::BeautyFacts => "openbeautyfacts",
            Source::DrugRegistry => "openfda",
            Source::Cache => "cache",
            Source::Manual => "manual",
        }
    }
}

/// Optional category hint attached to a lookup.
///
/// The hint only reorders the provider fallback chain; every category still
/// tries all three sources. Unrecognized hints fall back to the food
/// ordering, so parsing never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Medicine,
    Cosmetic,
}

impl Category {
    /// Parses a free-text hint. Unknown strings map to `None`, which the
    /// resolver treats the same as no hint at all.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "food" => Some(Category::Food),
            "medicine" => Some(Category::Medicine),
            "cosmetic" => Some(Category::Cosmetic),
            _ => None,
        }
    }
}

/// Per-100g nutrient values. Every field is optional: a provider that does
/// not report a nutrient yields `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutriments {
    pub energy_kcal: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugars: Option<f64>,
    pub fiber: Option<f64>,
    pub proteins: Option<f64>,
    pub salt: Option<f64>,
    pub sodium: Option<f64>,
}

/// Front-of-pack and ingredients-panel image URLs, when the provider has them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductImages {
    pub front: Option<String>,
    pub ingredients: Option<String>,
}

/// The normalized product record returned to all callers regardless of which
/// upstream answered.
///
/// Constructed fresh on every successful lookup and never mutated in place;
/// a later lookup supersedes it with a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Barcode/UPC/NDC code the lookup was keyed on.
    pub barcode: String,
    pub product_name: Option<String>,
    /// First comma-separated token of the provider's brand field, trimmed.
    pub brand: Option<String>,
    pub ingredients_text: Option<String>,
    #[serde(default)]
    pub nutriments: Nutriments,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub images: ProductImages,
    /// Provider's expiration field, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    /// `Some(expiry < today)` when an expiry date is present and parseable,
    /// otherwise `None`. Never defaults to `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    pub source: Source,
}

impl Product {
    /// An empty record carrying only the barcode and source. Adapters fill
    /// in whatever fields their provider reports.
    pub fn empty(barcode: &str, source: Source) -> Self {
        Self {
            barcode: barcode.to_string(),
            product_name: None,
            brand: None,
            ingredients_text: None,
            nutriments: Nutriments::default(),
            allergens: Vec::new(),
            labels: Vec::new(),
            images: ProductImages::default(),
            expiry_date: None,
            is_expired: None,
            source,
        }
    }
}

/// Outcome of a full resolve: exactly one variant per call, never partial.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    /// A product was found (live or cached).
    Found(Product),
    /// At least one source answered authoritatively that the code is unknown.
    NotFound,
    /// Every source was unreachable; carries a user-safe message, never raw
    /// upstream error text.
    Error(String),
}

/// Cacheable subset of [`LookupResult`]. `Error` outcomes are deliberately
/// not representable here: a failed lookup must retry upstream next time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CachedLookup {
    Found { product: Product },
    NotFound,
}

impl CachedLookup {
    pub fn into_result(self) -> LookupResult {
        match self {
            CachedLookup::Found { product } => LookupResult::Found(product),
            CachedLookup::NotFound => LookupResult::NotFound,
        }
    }
}

/// A persisted scan-history row, mirroring the hosted backend's `scans`
/// table. The backend fills `id` and `created_at` on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub barcode: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub expiry_date: Option<String>,
    pub is_expired: Option<bool>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ScanRecord {
    /// Builds a history row from a resolved lookup. Error outcomes produce
    /// no row: nothing was learned about the barcode. `user_id` is the
    /// authenticated scanner, when the request carried one.
    pub fn from_result(
        barcode: &str,
        result: &LookupResult,
        user_id: Option<&str>,
    ) -> Option<Self> {
        let user_id = user_id.map(str::to_string);
        match result {
            LookupResult::Found(p) => Some(Self {
                barcode: barcode.to_string(),
                product_name: p.product_name.clone(),
                brand: p.brand.clone(),
                expiry_date: p.expiry_date.clone(),
                is_expired: p.is_expired,
                source: p.source,
                user_id,
            }),
            LookupResult::NotFound => Some(Self {
                barcode: barcode.to_string(),
                product_name: None,
                brand: None,
                expiry_date: None,
                is_expired: None,
                source: Source::Manual,
                user_id,
            }),
            LookupResult::Error(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serializes_to_provider_ids() {
        let json = serde_json::to_string(&Source::FoodFacts).unwrap();
        assert_eq!(json, "\"openfoodfacts\"");
        let json = serde_json::to_string(&Source::DrugRegistry).unwrap();
        assert_eq!(json, "\"openfda\"");
    }

    #[test]
    fn test_category_hint_parsing() {
        assert_eq!(Category::from_hint("food"), Some(Category::Food));
        assert_eq!(Category::from_hint(" Medicine "), Some(Category::Medicine));
        assert_eq!(Category::from_hint("pet-food"), None);
        assert_eq!(Category::from_hint(""), None);
    }

    #[test]
    fn test_product_wire_shape_is_camel_case() {
        let mut p = Product::empty("737628064502", Source::FoodFacts);
        p.product_name = Some("Example Bar".to_string());
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["productName"], "Example Bar");
        assert_eq!(v["barcode"], "737628064502");
        // Absent expiry fields stay off the wire entirely.
        assert!(v.get("expiryDate").is_none());
        assert!(v.get("isExpired").is_none());
    }

    #[test]
    fn test_cached_lookup_round_trip() {
        let mut p = Product::empty("123", Source::BeautyFacts);
        p.nutriments.fat = Some(1.5);
        p.labels = vec!["organic".to_string()];
        let cached = CachedLookup::Found { product: p.clone() };
        let json = serde_json::to_string(&cached).unwrap();
        let back: CachedLookup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CachedLookup::Found { product: p });
    }

    #[test]
    fn test_error_results_produce_no_scan_row() {
        let r = LookupResult::Error("nope".to_string());
        assert!(ScanRecord::from_result("1", &r, Some("u-1")).is_none());
    }

    #[test]
    fn test_scan_row_carries_owner_when_given() {
        let p = Product::empty("456", Source::FoodFacts);
        let row = ScanRecord::from_result("456", &LookupResult::Found(p), Some("u-42")).unwrap();
        assert_eq!(row.user_id.as_deref(), Some("u-42"));

        let row = ScanRecord::from_result("456", &LookupResult::NotFound, None).unwrap();
        assert_eq!(row.user_id, None);
        assert_eq!(row.source, Source::Manual);
    }
}
