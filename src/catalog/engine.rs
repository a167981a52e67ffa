//! Product query engine

use super::models::{Product, ReviewSort};
use super::query::{ProductQuery, SortOrder};
use super::CatalogError;
use crate::config::CatalogSettings;
use crate::search::FuzzyMatcher;
use crate::store::{Cursor, Direction, DocumentStore, Query};
use std::sync::Arc;
use tracing::debug;

/// Reads products and categories from the document store
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
    settings: CatalogSettings,
    matcher: FuzzyMatcher,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>, settings: CatalogSettings) -> Self {
        let matcher =
            FuzzyMatcher::new(settings.search_threshold).with_distance(settings.search_distance);
        debug!(
            "Catalog over {} (search threshold {})",
            store.name(),
            matcher.threshold()
        );
        Self {
            store,
            settings,
            matcher,
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Filtered and ordered query, before any cursor or limit
    fn base_query(&self, query: &ProductQuery) -> Query {
        let mut q = Query::collection(&self.settings.products_collection);
        if let Some(ref category) = query.category {
            q = q.filter_eq("category", category.as_str());
        }
        match query.sort {
            SortOrder::Id => q.order_by("id", Direction::Ascending),
            SortOrder::PriceAsc => q.order_by("price", Direction::Ascending),
            SortOrder::PriceDesc => q.order_by("price", Direction::Descending),
        }
    }

    /// One page of products.
    ///
    /// Pages past the first cost an extra round trip: the preceding
    /// `(page - 1) * page_size` documents are read to find the cursor.
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError> {
        let base = self.base_query(query);
        let mut page_query = base.clone().limit(query.page_size);

        let skip = query.skip();
        if skip > 0 {
            let prefix = self.store.run_query(&base.clone().limit(skip)).await?;
            if prefix.len() < skip as usize {
                debug!(
                    "page {} starts past the end ({} of {} documents)",
                    query.page,
                    prefix.len(),
                    skip
                );
                return Ok(Vec::new());
            }
            match prefix.last() {
                Some(last) => {
                    let cursor = Cursor::from_document(last, &base.order_by);
                    page_query = page_query.start_after(cursor);
                }
                None => return Ok(Vec::new()),
            }
        }

        let docs = self.store.run_query(&page_query).await?;
        let products: Vec<Product> = docs.iter().map(Product::from_document).collect();
        debug!(
            "page {} (size {}) fetched {} products",
            query.page,
            query.page_size,
            products.len()
        );

        Ok(match query.search {
            Some(ref term) => self.matcher.filter(term, products, |p| p.title()),
            None => products,
        })
    }

    /// Fetch one product by id, zero padding short numeric ids
    pub async fn get_product(&self, id: &str, review_sort: ReviewSort) -> Result<Product, CatalogError> {
        let id = pad_id(id.trim(), self.settings.id_pad_width);
        if id.is_empty() {
            return Err(CatalogError::Validation("product id is required".to_string()));
        }

        let doc = self
            .store
            .get(&self.settings.products_collection, &id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;

        let mut product = Product::from_document(&doc);
        product.sort_reviews(review_sort);
        Ok(product)
    }

    /// Names of every category
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        let docs = self
            .store
            .run_query(&Query::collection(&self.settings.categories_collection))
            .await?;
        Ok(docs
            .iter()
            .filter_map(|doc| doc.get("name").and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }
}

/// `7` becomes `007` for width 3; non-numeric ids are untouched
pub fn pad_id(id: &str, width: usize) -> String {
    if !id.is_empty() && id.len() < width && id.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>width$}", id, width = width)
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, FieldValue, MemoryStore, Precondition, StoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Passes calls through and remembers every query
    struct RecordingStore {
        inner: MemoryStore,
        queries: Mutex<Vec<Query>>,
    }

    impl RecordingStore {
        fn queries(&self) -> Vec<Query> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
            self.queries.lock().unwrap().push(query.clone());
            self.inner.run_query(query).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn array_union(
            &self,
            collection: &str,
            id: &str,
            field: &str,
            values: Vec<FieldValue>,
        ) -> Result<(), StoreError> {
            self.inner.array_union(collection, id, field, values).await
        }

        async fn set_field(
            &self,
            collection: &str,
            id: &str,
            field: &str,
            value: FieldValue,
            precondition: Precondition,
        ) -> Result<(), StoreError> {
            self.inner
                .set_field(collection, id, field, value, precondition)
                .await
        }
    }

    const TITLES: [&str; 6] = [
        "iPhone 9",
        "Essence Mascara",
        "Red Lipstick",
        "Table Lamp",
        "Desk Lamp",
        "Gaming Laptop",
    ];

    async fn seeded(count: usize) -> Arc<RecordingStore> {
        let inner = MemoryStore::new();
        for i in 1..=count {
            let title = TITLES[(i - 1) % TITLES.len()];
            inner
                .insert_json(
                    "products",
                    &format!("{:03}", i),
                    json!({
                        "id": i,
                        "title": title,
                        "category": if i % 2 == 0 { "home" } else { "beauty" },
                        // prices deliberately not in id order
                        "price": ((i * 37) % 50) as f64 + 0.99,
                        "rating": 4.5,
                        "stock": 10
                    }),
                )
                .await;
        }
        inner.insert_json("categories", "001", json!({"name": "beauty"})).await;
        inner.insert_json("categories", "002", json!({"name": "home"})).await;
        inner.insert_json("categories", "003", json!({"slug": "nameless"})).await;

        Arc::new(RecordingStore {
            inner,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn catalog(store: Arc<RecordingStore>) -> Catalog {
        Catalog::new(store, CatalogSettings::default())
    }

    fn page(page: u32, page_size: u32) -> ProductQuery {
        ProductQuery {
            page,
            page_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_page_single_round_trip() {
        let store = seeded(25).await;
        let products = catalog(store.clone()).list_products(&page(1, 10)).await.unwrap();

        assert_eq!(products.len(), 10);
        assert_eq!(products[0].id, "001");
        assert_eq!(products[9].id, "010");
        assert_eq!(store.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_second_page_uses_prefix_then_cursor() {
        let store = seeded(25).await;
        let products = catalog(store.clone()).list_products(&page(2, 10)).await.unwrap();

        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"011"));
        assert_eq!(ids.last(), Some(&"020"));

        let queries = store.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].limit, Some(10));
        assert!(queries[0].start_after.is_none());
        assert_eq!(queries[1].limit, Some(10));
        let cursor = queries[1].start_after.as_ref().unwrap();
        assert_eq!(cursor.document_id, "010");
        assert_eq!(cursor.values, vec![FieldValue::Integer(10)]);
    }

    #[tokio::test]
    async fn test_page_past_end_skips_second_query() {
        let store = seeded(15).await;
        let products = catalog(store.clone()).list_products(&page(3, 10)).await.unwrap();

        assert!(products.is_empty());
        assert_eq!(store.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_count_never_exceeds_page_size() {
        let store = seeded(25).await;
        let catalog = catalog(store);
        for n in 1..=4 {
            let products = catalog.list_products(&page(n, 7)).await.unwrap();
            assert!(products.len() <= 7);
        }
    }

    #[tokio::test]
    async fn test_price_ordering_across_pages() {
        let store = seeded(25).await;
        let catalog = catalog(store);

        let mut prices = Vec::new();
        for n in 1..=3 {
            let query = ProductQuery {
                sort: SortOrder::PriceDesc,
                ..page(n, 10)
            };
            prices.extend(catalog.list_products(&query).await.unwrap().iter().filter_map(|p| p.price()));
        }
        assert_eq!(prices.len(), 25);
        assert!(prices.windows(2).all(|w| w[0] >= w[1]));

        let asc = ProductQuery {
            sort: SortOrder::PriceAsc,
            ..page(1, 25)
        };
        let prices: Vec<f64> = catalog.list_products(&asc).await.unwrap().iter().filter_map(|p| p.price()).collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_category_filter_applies_to_both_queries() {
        let store = seeded(25).await;
        let query = ProductQuery {
            category: Some("home".to_string()),
            ..page(2, 5)
        };
        let products = catalog(store.clone()).list_products(&query).await.unwrap();

        assert_eq!(products.len(), 5);
        assert!(products.iter().all(|p| p.category() == Some("home")));
        assert!(store.queries().iter().all(|q| q.filters.len() == 1));
    }

    #[tokio::test]
    async fn test_search_scoped_to_fetched_page() {
        let store = seeded(12).await;
        let catalog = catalog(store);

        // first page of 3 holds iPhone, Mascara, Lipstick only
        let query = ProductQuery {
            search: Some("lamp".to_string()),
            ..page(1, 3)
        };
        assert!(catalog.list_products(&query).await.unwrap().is_empty());

        let query = ProductQuery {
            search: Some("lamp".to_string()),
            ..page(1, 12)
        };
        let products = catalog.list_products(&query).await.unwrap();
        assert!(products.len() >= 4);
        assert!(products[0].title().ends_with("Lamp"));
        assert!(products.iter().all(|p| p.title() != "Red Lipstick"));
    }

    #[tokio::test]
    async fn test_get_product_pads_id() {
        let store = seeded(8).await;
        let catalog = catalog(store);

        let product = catalog.get_product("7", ReviewSort::Stored).await.unwrap();
        assert_eq!(product.id, "007");

        let missing = catalog.get_product("404", ReviewSort::Stored).await;
        assert!(matches!(missing, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_categories_skip_unnamed() {
        let store = seeded(1).await;
        let names = catalog(store).categories().await.unwrap();
        assert_eq!(names, vec!["beauty".to_string(), "home".to_string()]);
    }

    #[test]
    fn test_pad_id() {
        assert_eq!(pad_id("7", 3), "007");
        assert_eq!(pad_id("1234", 3), "1234");
        assert_eq!(pad_id("abc", 3), "abc");
        assert_eq!(pad_id("7", 0), "7");
    }
}
