//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::payment::PaymentSimulator;
use crate::services::slots::SlotSchedule;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, the catalog cache and the checkout collaborators.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    catalog: CatalogService,
    slots: SlotSchedule,
    payments: PaymentSimulator,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Memory or `PostgreSQL` store
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn Store>) -> Self {
        let catalog = CatalogService::new(Arc::clone(&store), config.catalog_cache_ttl);
        let slots = SlotSchedule::new(config.slots.clone());
        let payments = PaymentSimulator::new(&config.payment);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                catalog,
                slots,
                payments,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the pickup slot rules.
    #[must_use]
    pub fn slots(&self) -> &SlotSchedule {
        &self.inner.slots
    }

    /// Checkout side effects bound to this state.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.store(),
            self.slots(),
            &self.inner.payments,
            self.inner.config.orders.pending_ttl,
        )
    }
}
