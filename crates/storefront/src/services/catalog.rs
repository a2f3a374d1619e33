//! Cached catalog reads.
//!
//! Categories and product listings are cached with `moka` for the configured
//! TTL. Admin writes call [`CatalogService::invalidate`]; stock changes made
//! by checkout do too, so availability never lags behind an order.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use fournil_core::ProductId;

use crate::db::{RepositoryError, Store};
use crate::models::{Category, Product, ProductFilter};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Products(ProductFilter),
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
}

/// Catalog access for the public routes.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    /// All categories, by rank then name.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` on a cache miss that fails to load.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }
        let categories = Arc::new(self.store.list_categories().await?);
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Category by slug, served from the cached list.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` if the list cannot be loaded.
    pub async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .categories()
            .await?
            .iter()
            .find(|c| c.slug == slug)
            .cloned())
    }

    /// Products passing `filter`. Text searches bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` on a cache miss that fails to load.
    #[instrument(skip(self))]
    pub async fn products(&self, filter: &ProductFilter) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if filter.query.is_some() {
            return Ok(Arc::new(self.store.list_products(filter).await?));
        }
        let key = CacheKey::Products(filter.clone());
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }
        let products = Arc::new(self.store.list_products(filter).await?);
        self.cache
            .insert(key, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` on a cache miss that fails to load.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }
        let product = self.store.get_product(id).await?;
        if let Some(product) = &product {
            self.cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    /// Drop everything cached.
    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("Catalog cache invalidated");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::db::seed::SeedData;

    async fn service() -> (Arc<dyn Store>, CatalogService) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        SeedData::demo().unwrap().apply(store.as_ref()).await.unwrap();
        let catalog = CatalogService::new(Arc::clone(&store), Duration::from_secs(300));
        (store, catalog)
    }

    #[tokio::test]
    async fn test_cached_until_invalidated() {
        let (store, catalog) = service().await;
        let products = catalog.products(&ProductFilter::default()).await.unwrap();
        let first = products.first().unwrap().clone();

        store.adjust_stock(first.id, -1).await.unwrap();
        let loaded = catalog.product(first.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock, first.stock - 1);

        store.adjust_stock(first.id, -1).await.unwrap();
        assert_eq!(
            catalog.product(first.id).await.unwrap().unwrap().stock,
            first.stock - 1
        );

        catalog.invalidate().await;
        assert_eq!(
            catalog.product(first.id).await.unwrap().unwrap().stock,
            first.stock - 2
        );
    }

    #[tokio::test]
    async fn test_category_by_slug() {
        let (_, catalog) = service().await;
        let categories = catalog.categories().await.unwrap();
        assert_eq!(categories.len(), 4);
        assert!(catalog.category_by_slug("viennoiseries").await.unwrap().is_some());
        assert!(catalog.category_by_slug("gateaux").await.unwrap().is_none());
    }
}
