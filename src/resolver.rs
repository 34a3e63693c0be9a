//! Cache-checked, category-ordered fallback chain over the source adapters.
//!
//! A resolve consults the cache first, then walks an ordered list of
//! adapters sequentially, stopping at the first hit. The category hint only
//! reorders the chain; every lookup still tries all three sources, on the
//! assumption that the hinted source is statistically most likely to have
//! the record but any source may.
//!
//! Chain orderings:
//!
//! | Hint | Order |
//! |------|-------|
//! | `food` (and none/unrecognized) | food facts, beauty facts, drug registry |
//! | `medicine` | drug registry, food facts, beauty facts |
//! | `cosmetic` | beauty facts, food facts, drug registry |
//!
//! No parallel fan-out, no shared timeout budget, no retries: one pass,
//! first hit wins.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::models::{CachedLookup, Category, LookupResult, Source};
use crate::providers::{FetchOutcome, SourceAdapter};

/// User-facing message for the all-sources-unreachable case. Raw upstream
/// error text never crosses the API boundary.
pub const UNAVAILABLE_MESSAGE: &str = "Unable to fetch product info right now.";

/// Message attached to not-found responses on the proxy API.
pub const NOT_FOUND_MESSAGE: &str = "Product not found in database. Try expiry scan.";

/// Adapter ordering for a category hint. A missing or unrecognized hint
/// uses the food ordering.
pub fn chain_order(category: Option<Category>) -> [Source; 3] {
    match category {
        Some(Category::Medicine) => [Source::DrugRegistry, Source::FoodFacts, Source::BeautyFacts],
        Some(Category::Cosmetic) => [Source::BeautyFacts, Source::FoodFacts, Source::DrugRegistry],
        Some(Category::Food) | None => {
            [Source::FoodFacts, Source::BeautyFacts, Source::DrugRegistry]
        }
    }
}

/// The lookup resolver: owns the adapter set and a cache handle.
///
/// Both are injected; there is no hidden process-wide state, so tests can
/// isolate instances and control time through the cache's clock.
pub struct Resolver {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<dyn CacheStore>,
}

impl Resolver {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, cache: Arc<dyn CacheStore>) -> Self {
        Self { adapters, cache }
    }

    /// Resolves one barcode through the cache and the fallback chain.
    ///
    /// Outcome policy: the first adapter hit wins and is cached. When the
    /// chain is exhausted, the result is `NotFound` (and cached) if at
    /// least one source answered authoritatively, or `Error` (not cached)
    /// when every source was unreachable, so the next call retries live.
    pub async fn resolve(&self, barcode: &str, category: Option<Category>) -> LookupResult {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return LookupResult::Error("Missing barcode".to_string());
        }

        if let Some(cached) = self.cache.get(barcode).await {
            debug!(barcode, "cache hit");
            return match cached.into_result() {
                LookupResult::Found(mut product) => {
                    product.source = Source::Cache;
                    LookupResult::Found(product)
                }
                other => other,
            };
        }

        let mut saw_not_found = false;
        for source in chain_order(category) {
            let Some(adapter) = self.adapters.iter().find(|a| a.source() == source) else {
                continue;
            };
            match adapter.lookup(barcode).await {
                FetchOutcome::Found(product) => {
                    info!(barcode, source = source.as_str(), "resolved");
                    self.cache
                        .set(
                            barcode,
                            CachedLookup::Found {
                                product: product.clone(),
                            },
                        )
                        .await;
                    return LookupResult::Found(product);
                }
                FetchOutcome::NotFound => {
                    debug!(barcode, source = source.as_str(), "not found, trying next");
                    saw_not_found = true;
                }
                FetchOutcome::Unavailable(reason) => {
                    warn!(
                        barcode,
                        source = source.as_str(),
                        reason = %reason,
                        "unavailable, trying next"
                    );
                }
            }
        }

        if saw_not_found {
            self.cache.set(barcode, CachedLookup::NotFound).await;
            LookupResult::NotFound
        } else {
            LookupResult::Error(UNAVAILABLE_MESSAGE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::ManualClock;
    use crate::cache::{MemoryCache, CACHE_TTL_MS};
    use crate::models::Product;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted adapter that records how often (and in what order) it was
    /// called. The call log is shared across the three stubs of a chain.
    struct StubAdapter {
        source: Source,
        outcome: FetchOutcome,
        calls: AtomicUsize,
        log: Arc<Mutex<Vec<Source>>>,
    }

    impl StubAdapter {
        fn new(source: Source, outcome: FetchOutcome, log: Arc<Mutex<Vec<Source>>>) -> Arc<Self> {
            Arc::new(Self {
                source,
                outcome,
                calls: AtomicUsize::new(0),
                log,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source(&self) -> Source {
            self.source
        }

        async fn lookup(&self, _barcode: &str) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.source);
            self.outcome.clone()
        }
    }

    struct Chain {
        food: Arc<StubAdapter>,
        beauty: Arc<StubAdapter>,
        drug: Arc<StubAdapter>,
        log: Arc<Mutex<Vec<Source>>>,
        clock: Arc<ManualClock>,
        resolver: Resolver,
    }

    fn chain(food: FetchOutcome, beauty: FetchOutcome, drug: FetchOutcome) -> Chain {
        let log = Arc::new(Mutex::new(Vec::new()));
        let food = StubAdapter::new(Source::FoodFacts, food, log.clone());
        let beauty = StubAdapter::new(Source::BeautyFacts, beauty, log.clone());
        let drug = StubAdapter::new(Source::DrugRegistry, drug, log.clone());
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(MemoryCache::new(clock.clone()));
        let resolver = Resolver::new(
            vec![
                food.clone() as Arc<dyn SourceAdapter>,
                beauty.clone(),
                drug.clone(),
            ],
            cache,
        );
        Chain {
            food,
            beauty,
            drug,
            log,
            clock,
            resolver,
        }
    }

    fn found(name: &str) -> FetchOutcome {
        let mut p = Product::empty("737628064502", Source::FoodFacts);
        p.product_name = Some(name.to_string());
        FetchOutcome::Found(p)
    }

    #[test]
    fn test_chain_order_per_category() {
        assert_eq!(
            chain_order(Some(Category::Medicine)),
            [Source::DrugRegistry, Source::FoodFacts, Source::BeautyFacts]
        );
        assert_eq!(
            chain_order(Some(Category::Cosmetic)),
            [Source::BeautyFacts, Source::FoodFacts, Source::DrugRegistry]
        );
        assert_eq!(
            chain_order(Some(Category::Food)),
            [Source::FoodFacts, Source::BeautyFacts, Source::DrugRegistry]
        );
        assert_eq!(chain_order(None), chain_order(Some(Category::Food)));
    }

    #[tokio::test]
    async fn test_first_hit_short_circuits() {
        let c = chain(found("Example Bar"), FetchOutcome::NotFound, FetchOutcome::NotFound);
        let result = c
            .resolver
            .resolve("737628064502", Some(Category::Food))
            .await;
        match result {
            LookupResult::Found(p) => assert_eq!(p.product_name, Some("Example Bar".to_string())),
            other => panic!("expected Found, got {:?}", other),
        }
        assert_eq!(c.food.calls(), 1);
        assert_eq!(c.beauty.calls(), 0);
        assert_eq!(c.drug.calls(), 0);
    }

    #[tokio::test]
    async fn test_medicine_queries_drug_registry_first() {
        let c = chain(found("X"), FetchOutcome::NotFound, FetchOutcome::NotFound);
        c.resolver.resolve("0573016440", Some(Category::Medicine)).await;
        let log = c.log.lock().unwrap();
        assert_eq!(log[0], Source::DrugRegistry);
        assert_eq!(log[1], Source::FoodFacts);
    }

    #[tokio::test]
    async fn test_all_not_found() {
        let c = chain(
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
        );
        let result = c
            .resolver
            .resolve("000000000000", Some(Category::Medicine))
            .await;
        assert_eq!(result, LookupResult::NotFound);
        assert_eq!(c.food.calls(), 1);
        assert_eq!(c.beauty.calls(), 1);
        assert_eq!(c.drug.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_unavailable_is_an_error_not_not_found() {
        let down = FetchOutcome::Unavailable("boom".to_string());
        let c = chain(down.clone(), down.clone(), down);
        let result = c.resolver.resolve("123", None).await;
        assert_eq!(result, LookupResult::Error(UNAVAILABLE_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_unavailable_then_not_found_collapses_to_not_found() {
        let c = chain(
            FetchOutcome::Unavailable("down".to_string()),
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
        );
        let result = c.resolver.resolve("123", None).await;
        assert_eq!(result, LookupResult::NotFound);
    }

    #[tokio::test]
    async fn test_repeat_lookup_within_ttl_hits_cache() {
        let c = chain(found("Example Bar"), FetchOutcome::NotFound, FetchOutcome::NotFound);
        c.resolver.resolve("737628064502", None).await;
        let second = c.resolver.resolve("737628064502", None).await;
        assert_eq!(c.food.calls(), 1, "second lookup must not hit the network");
        match second {
            LookupResult::Found(p) => assert_eq!(p.source, Source::Cache),
            other => panic!("expected cached Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_found_is_cached_too() {
        let c = chain(
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
            FetchOutcome::NotFound,
        );
        c.resolver.resolve("000000000000", None).await;
        c.resolver.resolve("000000000000", None).await;
        assert_eq!(c.food.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_expiry_triggers_fresh_chain() {
        let c = chain(found("X"), FetchOutcome::NotFound, FetchOutcome::NotFound);
        c.resolver.resolve("737628064502", None).await;
        c.clock.advance(CACHE_TTL_MS + 1);
        c.resolver.resolve("737628064502", None).await;
        assert_eq!(c.food.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_outcome_is_not_cached() {
        let down = FetchOutcome::Unavailable("down".to_string());
        let c = chain(down.clone(), down.clone(), down);
        c.resolver.resolve("123", None).await;
        c.resolver.resolve("123", None).await;
        // Both calls went upstream; nothing was cached.
        assert_eq!(c.food.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_barcode_rejected_without_network() {
        let c = chain(found("X"), FetchOutcome::NotFound, FetchOutcome::NotFound);
        let result = c.resolver.resolve("   ", None).await;
        assert_eq!(result, LookupResult::Error("Missing barcode".to_string()));
        assert_eq!(c.food.calls(), 0);
    }
}
