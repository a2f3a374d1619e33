//! Order lifecycle, stock bookkeeping and expiry of unpaid orders.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use fournil_core::{OrderId, OrderStatus};

use crate::config::OrderConfig;
use crate::db::{RepositoryError, Store};
use crate::models::{Order, OrderFilter, OrderLine, StatusTransitionError};

/// An order status change failed.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Take the stock for every line, or none of it.
///
/// Lines already decremented are put back if a later one fails.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` naming the product that ran out, or
/// `NotFound` for a product that no longer exists.
#[instrument(skip_all, fields(lines = lines.len()))]
pub async fn reserve_stock(store: &dyn Store, lines: &[OrderLine]) -> Result<(), RepositoryError> {
    let mut taken: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        let delta = i32::try_from(line.quantity).unwrap_or(i32::MAX);
        match store.adjust_stock(line.product_id, -delta).await {
            Ok(_) => taken.push(line.clone()),
            Err(e) => {
                warn!(product_id = %line.product_id, error = %e, "Stock reservation failed, rolling back");
                restore_stock(store, &taken).await;
                return Err(match e {
                    RepositoryError::Conflict(_) => {
                        RepositoryError::Conflict(format!("not enough stock for {}", line.name))
                    }
                    other => other,
                });
            }
        }
    }
    Ok(())
}

/// Give back the stock of `lines`. Failures are logged, not returned.
pub async fn restore_stock(store: &dyn Store, lines: &[OrderLine]) {
    for line in lines {
        let delta = i32::try_from(line.quantity).unwrap_or(i32::MAX);
        if let Err(e) = store.adjust_stock(line.product_id, delta).await {
            warn!(product_id = %line.product_id, error = %e, "Failed to restore stock");
        }
    }
}

/// Give back the promo use counted when an order was placed. Failures are logged.
pub async fn release_promo_use(store: &dyn Store, code: &str) {
    if let Err(e) = store.release_promo_use(code).await {
        warn!(code, error = %e, "Failed to release promo code use");
    }
}

/// Move order `id` to `next`, restoring stock and the promo use when it is
/// cancelled.
///
/// # Errors
///
/// Returns `OrderError::NotFound`, `OrderError::Transition` if the lifecycle
/// forbids the move, or a repository `Conflict` if the order changed
/// concurrently.
#[instrument(skip(store))]
pub async fn transition_order(
    store: &dyn Store,
    id: OrderId,
    next: OrderStatus,
) -> Result<Order, OrderError> {
    let order = store.get_order(id).await?.ok_or(OrderError::NotFound)?;
    order.check_transition(next)?;
    let updated = store
        .transition_order_status(id, order.status, next)
        .await?;
    if next == OrderStatus::Cancelled {
        restore_stock(store, &updated.lines).await;
        if let Some(code) = &updated.promo_code {
            release_promo_use(store, code).await;
        }
    }
    info!(
        order_number = %updated.number,
        from = %order.status,
        to = %next,
        "Order status changed"
    );
    Ok(updated)
}

/// Cancel every `pending_payment` order created before `cutoff`.
///
/// Stock of each cancelled order is released. Orders paid or cancelled in
/// the meantime are left alone. Returns how many orders expired.
///
/// # Errors
///
/// Returns `OrderError::Repository` if the pending orders cannot be listed.
#[instrument(skip(store))]
pub async fn expire_pending_orders(
    store: &dyn Store,
    cutoff: DateTime<Utc>,
) -> Result<usize, OrderError> {
    let pending = store
        .list_orders(&OrderFilter {
            status: Some(OrderStatus::PendingPayment),
            ..OrderFilter::default()
        })
        .await?;

    let mut expired = 0;
    for order in pending.iter().filter(|o| o.created_at < cutoff) {
        match transition_order(store, order.id, OrderStatus::Cancelled).await {
            Ok(_) => expired += 1,
            Err(
                OrderError::NotFound
                | OrderError::Transition(_)
                | OrderError::Repository(RepositoryError::Conflict(_)),
            ) => {
                debug!(order_number = %order.number, "Order changed before expiry, skipped");
            }
            Err(e) => {
                warn!(order_number = %order.number, error = %e, "Failed to expire pending order");
            }
        }
    }
    if expired > 0 {
        info!(expired, "Expired unpaid orders");
    }
    Ok(expired)
}

/// Spawn a background task expiring unpaid orders older than
/// `config.pending_ttl`, every `config.sweep_interval`.
pub fn spawn_pending_order_sweeper(store: Arc<dyn Store>, config: &OrderConfig) -> JoinHandle<()> {
    let ttl = TimeDelta::from_std(config.pending_ttl).unwrap_or(TimeDelta::MAX);
    let every = config.sweep_interval;
    info!(
        ttl_minutes = ttl.num_minutes(),
        every_secs = every.as_secs(),
        "Spawning pending order sweeper"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
                continue;
            };
            if let Err(e) = expire_pending_orders(store.as_ref(), cutoff).await {
                error!(error = %e, "Pending order sweep failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CatalogRepository, OrderRepository};
    use crate::db::MemoryStore;
    use crate::models::{CustomerInfo, NewOrder, OrderTotals, ProductInput};
    use chrono::NaiveDate;
    use fournil_core::{Email, Phone, Price};
    use std::time::Duration;

    async fn product(store: &MemoryStore, name: &str, stock: u32) -> OrderLine {
        let product = store
            .create_product(&ProductInput {
                name: name.to_owned(),
                description: String::new(),
                price: Price::from_cents(250),
                images: vec![],
                category_id: None,
                stock,
                available: true,
            })
            .await
            .unwrap();
        OrderLine {
            product_id: product.id,
            name: product.name,
            unit_price: product.price,
            quantity: 2,
            line_total: product.price.times(2),
        }
    }

    async fn order(store: &MemoryStore, lines: Vec<OrderLine>) -> Order {
        order_numbered(store, "CMD-20260603-ABCDEF", lines).await
    }

    async fn order_numbered(store: &MemoryStore, number: &str, lines: Vec<OrderLine>) -> Order {
        store
            .create_order(&NewOrder {
                number: number.to_owned(),
                user_id: None,
                lines,
                pickup_at: NaiveDate::from_ymd_opt(2026, 6, 3)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                customer: CustomerInfo {
                    first_name: "Léa".to_owned(),
                    last_name: "Martin".to_owned(),
                    email: Email::parse("lea@example.fr").unwrap(),
                    phone: Phone::parse("0612345678").unwrap(),
                    note: None,
                },
                promo_code: None,
                totals: OrderTotals::default(),
                slot_capacity: 10,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_rolls_back() {
        let store = MemoryStore::new();
        let plenty = product(&store, "Baguette", 10).await;
        let scarce = product(&store, "Paris-Brest", 1).await;

        let err = reserve_stock(&store, &[plenty.clone(), scarce.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg.contains("Paris-Brest")));
        let baguette = store.get_product(plenty.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 10);

        reserve_stock(&store, &[plenty.clone()]).await.unwrap();
        let baguette = store.get_product(plenty.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 8);
    }

    #[tokio::test]
    async fn test_transitions_and_cancel_restores_stock() {
        let store = MemoryStore::new();
        let line = product(&store, "Baguette", 10).await;
        reserve_stock(&store, &[line.clone()]).await.unwrap();
        let placed = order(&store, vec![line.clone()]).await;

        assert!(matches!(
            transition_order(&store, placed.id, OrderStatus::Ready).await,
            Err(OrderError::Transition(_))
        ));
        let confirmed = transition_order(&store, placed.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        transition_order(&store, placed.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        let baguette = store.get_product(line.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 10);

        assert!(matches!(
            transition_order(&store, placed.id, OrderStatus::Confirmed).await,
            Err(OrderError::Transition(_))
        ));
        assert!(matches!(
            transition_order(&store, OrderId::new(999), OrderStatus::Confirmed).await,
            Err(OrderError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expire_pending_orders_releases_stock() {
        let store = MemoryStore::new();
        let line = product(&store, "Baguette", 10).await;
        reserve_stock(&store, &[line.clone(), line.clone()]).await.unwrap();
        let unpaid = order_numbered(&store, "CMD-20260603-UNPAID", vec![line.clone()]).await;
        let paid = order_numbered(&store, "CMD-20260603-PAIDUP", vec![line.clone()]).await;
        transition_order(&store, paid.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let too_early = Utc::now() - TimeDelta::minutes(30);
        assert_eq!(expire_pending_orders(&store, too_early).await.unwrap(), 0);
        let baguette = store.get_product(line.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 6);

        let cutoff = Utc::now() + TimeDelta::minutes(1);
        assert_eq!(expire_pending_orders(&store, cutoff).await.unwrap(), 1);
        let unpaid = store.get_order(unpaid.id).await.unwrap().unwrap();
        assert_eq!(unpaid.status, OrderStatus::Cancelled);
        let paid = store.get_order(paid.id).await.unwrap().unwrap();
        assert_eq!(paid.status, OrderStatus::Confirmed);
        let baguette = store.get_product(line.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 8);

        assert_eq!(expire_pending_orders(&store, cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_expires_orders_in_background() {
        let store = Arc::new(MemoryStore::new());
        let line = product(&store, "Baguette", 10).await;
        reserve_stock(store.as_ref(), &[line.clone()]).await.unwrap();
        let unpaid = order(&store, vec![line.clone()]).await;

        let handle = spawn_pending_order_sweeper(
            Arc::clone(&store) as Arc<dyn Store>,
            &OrderConfig {
                pending_ttl: Duration::ZERO,
                sweep_interval: Duration::from_millis(10),
            },
        );
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if store.get_order(unpaid.id).await.unwrap().unwrap().status == OrderStatus::Cancelled {
                break;
            }
        }
        handle.abort();

        let unpaid = store.get_order(unpaid.id).await.unwrap().unwrap();
        assert_eq!(unpaid.status, OrderStatus::Cancelled);
        let baguette = store.get_product(line.product_id).await.unwrap().unwrap();
        assert_eq!(baguette.stock, 10);
    }
}
