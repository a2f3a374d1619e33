//! In-memory store.
//!
//! One `RwLock` per collection. Operations that touch two collections take
//! the locks in declaration order (catalog, orders, promos, payments, users,
//! reviews).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tokio::sync::RwLock;

use fournil_core::{
    CategoryId, Email, InvoiceId, OrderId, OrderStatus, PaymentId, ProductId, PromoCodeId,
    ReviewId, UserId, UserRole,
};

use super::{
    CatalogRepository, OrderRepository, PaymentRepository, PromoRepository, RepositoryError,
    ReviewRepository, Store, UserRepository,
};
use crate::models::{
    Category, CategoryInput, Invoice, NewInvoice, NewOrder, NewPayment, NewReview, NewUser,
    Order, OrderFilter, Payment, Product, ProductFilter, ProductInput, PromoCode, PromoCodeInput,
    Review, User,
};

/// Rows keyed by id, with a sequence.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.last_id = self.last_id.saturating_add(1);
        self.last_id
    }
}

#[derive(Debug, Default)]
struct Catalog {
    categories: Table<Category>,
    products: Table<Product>,
}

#[derive(Debug, Default)]
struct Payments {
    payments: Table<Payment>,
    invoices: Table<Invoice>,
}

#[derive(Debug)]
struct Account {
    user: User,
    password_hash: String,
}

/// Store backed by process memory. Everything is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    orders: RwLock<Table<Order>>,
    promos: RwLock<Table<PromoCode>>,
    payments: RwLock<Payments>,
    users: RwLock<Table<Account>>,
    reviews: RwLock<Table<Review>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let catalog = self.catalog.read().await;
        let mut categories: Vec<Category> = catalog.categories.rows.values().cloned().collect();
        sort_categories(&mut categories);
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog.categories.rows.get(&id.as_i32()).cloned())
    }

    async fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .categories
            .rows
            .values()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        if catalog.categories.rows.values().any(|c| c.slug == input.slug) {
            return Err(RepositoryError::Conflict(format!(
                "category slug {} already exists",
                input.slug
            )));
        }
        let id = catalog.categories.next_id();
        let category = Category {
            id: CategoryId::new(id),
            name: input.name.clone(),
            slug: input.slug.clone(),
            color: input.color.clone(),
            icon: input.icon.clone(),
            rank: input.rank,
        };
        catalog.categories.rows.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        if catalog
            .categories
            .rows
            .values()
            .any(|c| c.slug == input.slug && c.id != id)
        {
            return Err(RepositoryError::Conflict(format!(
                "category slug {} already exists",
                input.slug
            )));
        }
        let category = catalog
            .categories
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        category.name.clone_from(&input.name);
        category.slug.clone_from(&input.slug);
        category.color.clone_from(&input.color);
        category.icon.clone_from(&input.icon);
        category.rank = input.rank;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut catalog = self.catalog.write().await;
        catalog
            .categories
            .rows
            .remove(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        for product in catalog.products.rows.values_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let catalog = self.catalog.read().await;
        let mut products: Vec<Product> = catalog
            .products
            .rows
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog.products.rows.get(&id.as_i32()).cloned())
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        if let Some(category_id) = input.category_id
            && !catalog.categories.rows.contains_key(&category_id.as_i32())
        {
            return Err(RepositoryError::Conflict(format!(
                "category {category_id} does not exist"
            )));
        }
        let id = catalog.products.next_id();
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(id),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            images: input.images.clone(),
            category_id: input.category_id,
            stock: input.stock,
            available: input.available,
            created_at: now,
            updated_at: now,
        };
        catalog.products.rows.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        if let Some(category_id) = input.category_id
            && !catalog.categories.rows.contains_key(&category_id.as_i32())
        {
            return Err(RepositoryError::Conflict(format!(
                "category {category_id} does not exist"
            )));
        }
        let product = catalog
            .products
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        product.name.clone_from(&input.name);
        product.description.clone_from(&input.description);
        product.price = input.price;
        product.images.clone_from(&input.images);
        product.category_id = input.category_id;
        product.stock = input.stock;
        product.available = input.available;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut catalog = self.catalog.write().await;
        catalog
            .products
            .rows
            .remove(&id.as_i32())
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        let product = catalog
            .products
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        let stock = i64::from(product.stock) + i64::from(delta);
        let stock = u32::try_from(stock).map_err(|_| {
            RepositoryError::Conflict(format!("not enough stock for {}", product.name))
        })?;
        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.rows.values().any(|o| o.number == order.number) {
            return Err(RepositoryError::Conflict(format!(
                "order number {} already exists",
                order.number
            )));
        }
        let booked = orders
            .rows
            .values()
            .filter(|o| o.pickup_at == order.pickup_at && o.status != OrderStatus::Cancelled)
            .count();
        if booked >= usize::try_from(order.slot_capacity).unwrap_or(usize::MAX) {
            return Err(RepositoryError::SlotFull(order.pickup_at));
        }
        let id = orders.next_id();
        let now = Utc::now();
        let created = Order {
            id: OrderId::new(id),
            number: order.number.clone(),
            user_id: order.user_id,
            lines: order.lines.clone(),
            pickup_at: order.pickup_at,
            customer: order.customer.clone(),
            promo_code: order.promo_code.clone(),
            totals: order.totals,
            status: OrderStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        };
        orders.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.rows.get(&id.as_i32()).cloned())
    }

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.rows.values().find(|o| o.number == number).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut list: Vec<Order> = orders
            .rows
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, not {from}",
                order.number, order.status
            )));
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn count_booked_slots(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<HashMap<NaiveDateTime, u32>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut counts: HashMap<NaiveDateTime, u32> = HashMap::new();
        for order in orders.rows.values() {
            if order.status != OrderStatus::Cancelled
                && order.pickup_at >= from
                && order.pickup_at < to
            {
                let count = counts.entry(order.pickup_at).or_default();
                *count = count.saturating_add(1);
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl PromoRepository for MemoryStore {
    async fn list_promo_codes(&self) -> Result<Vec<PromoCode>, RepositoryError> {
        let promos = self.promos.read().await;
        let mut list: Vec<PromoCode> = promos.rows.values().cloned().collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(list)
    }

    async fn get_promo_code_by_code(
        &self,
        code: &str,
    ) -> Result<Option<PromoCode>, RepositoryError> {
        let code = code.trim().to_uppercase();
        let promos = self.promos.read().await;
        Ok(promos.rows.values().find(|p| p.code == code).cloned())
    }

    async fn create_promo_code(
        &self,
        input: &PromoCodeInput,
    ) -> Result<PromoCode, RepositoryError> {
        let mut promos = self.promos.write().await;
        let code = input.code.to_uppercase();
        if promos.rows.values().any(|p| p.code == code) {
            return Err(RepositoryError::Conflict(format!(
                "promo code {code} already exists"
            )));
        }
        let id = promos.next_id();
        let promo = PromoCode {
            id: PromoCodeId::new(id),
            code,
            kind: input.kind,
            value: input.value,
            minimum_amount: input.minimum_amount,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            max_uses: input.max_uses,
            uses: 0,
            active: input.active,
        };
        promos.rows.insert(id, promo.clone());
        Ok(promo)
    }

    async fn set_promo_code_active(
        &self,
        id: PromoCodeId,
        active: bool,
    ) -> Result<PromoCode, RepositoryError> {
        let mut promos = self.promos.write().await;
        let promo = promos
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        promo.active = active;
        Ok(promo.clone())
    }

    async fn record_promo_use(&self, code: &str) -> Result<PromoCode, RepositoryError> {
        let code = code.trim().to_uppercase();
        let mut promos = self.promos.write().await;
        let promo = promos
            .rows
            .values_mut()
            .find(|p| p.code == code)
            .ok_or(RepositoryError::NotFound)?;
        if promo.max_uses.is_some_and(|max| promo.uses >= max) {
            return Err(RepositoryError::Conflict(format!(
                "promo code {code} has reached its usage limit"
            )));
        }
        promo.uses = promo.uses.saturating_add(1);
        Ok(promo.clone())
    }

    async fn release_promo_use(&self, code: &str) -> Result<(), RepositoryError> {
        let code = code.trim().to_uppercase();
        let mut promos = self.promos.write().await;
        let promo = promos
            .rows
            .values_mut()
            .find(|p| p.code == code)
            .ok_or(RepositoryError::NotFound)?;
        promo.uses = promo.uses.saturating_sub(1);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError> {
        let mut payments = self.payments.write().await;
        let id = payments.payments.next_id();
        let receipt = &payment.receipt;
        let created = Payment {
            id: PaymentId::new(id),
            order_id: payment.order_id,
            method: receipt.method,
            amount: receipt.amount,
            status: receipt.status,
            transaction_id: receipt.transaction_id.clone(),
            payer: receipt.payer.clone(),
            decline_reason: receipt.decline_reason.clone(),
            created_at: receipt.processed_at,
        };
        payments.payments.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn list_payments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let payments = self.payments.read().await;
        Ok(payments
            .payments
            .rows
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError> {
        let orders = self.orders.read().await;
        let order = orders
            .rows
            .get(&invoice.order_id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        let mut payments = self.payments.write().await;
        if payments
            .invoices
            .rows
            .values()
            .any(|i| i.order_id == invoice.order_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "order {} already has an invoice",
                order.number
            )));
        }
        let id = payments.invoices.next_id();
        let created = Invoice {
            id: InvoiceId::new(id),
            number: Invoice::number_for(order.id, invoice.issued_at),
            order_id: order.id,
            order_number: order.number.clone(),
            customer: order.customer.clone(),
            lines: order.lines.clone(),
            totals: order.totals,
            payment_method: invoice.payment_method,
            transaction_id: invoice.transaction_id.clone(),
            issued_at: invoice.issued_at,
        };
        payments.invoices.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn get_invoice_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let payments = self.payments.read().await;
        Ok(payments
            .invoices
            .rows
            .values()
            .find(|i| i.order_id == order_id)
            .cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let normalized = user.email.normalized();
        if users
            .rows
            .values()
            .any(|a| a.user.email.normalized() == normalized)
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let id = users.next_id();
        let created = User {
            id: UserId::new(id),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        users.rows.insert(
            id,
            Account {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.rows.get(&id.as_i32()).map(|a| a.user.clone()))
    }

    async fn get_user_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let normalized = email.normalized();
        let users = self.users.read().await;
        Ok(users
            .rows
            .values()
            .find(|a| a.user.email.normalized() == normalized)
            .map(|a| (a.user.clone(), a.password_hash.clone())))
    }

    async fn set_user_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let account = users
            .rows
            .get_mut(&id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        account.user.role = role;
        Ok(account.user.clone())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        if !self
            .catalog
            .read()
            .await
            .products
            .rows
            .contains_key(&review.product_id.as_i32())
        {
            return Err(RepositoryError::NotFound);
        }
        let mut reviews = self.reviews.write().await;
        let id = reviews.next_id();
        let created = Review {
            id: ReviewId::new(id),
            product_id: review.product_id,
            user_id: review.user_id,
            author: review.author.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        reviews.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn list_reviews(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .rows
            .values()
            .rev()
            .filter(|r| product_id.is_none_or(|id| r.product_id == id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fournil_core::{Phone, Price};

    use crate::models::{CustomerInfo, OrderTotals};

    fn product_input(name: &str, stock: u32) -> ProductInput {
        ProductInput {
            name: name.to_owned(),
            description: String::new(),
            price: Price::from_cents(120),
            images: vec![],
            category_id: None,
            stock,
            available: true,
        }
    }

    fn new_order(number: &str, pickup_at: NaiveDateTime) -> NewOrder {
        NewOrder {
            number: number.to_owned(),
            user_id: None,
            lines: vec![],
            pickup_at,
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
        }
    }

    #[tokio::test]
    async fn test_adjust_stock_never_below_zero() {
        let store = MemoryStore::new();
        let product = store.create_product(&product_input("Croissant", 2)).await.unwrap();

        let updated = store.adjust_stock(product.id, -2).await.unwrap();
        assert_eq!(updated.stock, 0);
        assert!(matches!(
            store.adjust_stock(product.id, -1).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(store.adjust_stock(product.id, 5).await.unwrap().stock, 5);
        assert!(matches!(
            store.adjust_stock(ProductId::new(99), 1).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_category_uncategorizes_products() {
        let store = MemoryStore::new();
        let category = store
            .create_category(&CategoryInput {
                name: "Pains".to_owned(),
                slug: "pains".to_owned(),
                color: String::new(),
                icon: String::new(),
                rank: 1,
            })
            .await
            .unwrap();
        let mut input = product_input("Baguette", 10);
        input.category_id = Some(category.id);
        let product = store.create_product(&input).await.unwrap();

        store.delete_category(category.id).await.unwrap();
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.category_id, None);
    }

    #[tokio::test]
    async fn test_status_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let at = NaiveDate::from_ymd_opt(2026, 6, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let order = store.create_order(&new_order("CMD-1", at)).await.unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);

        store
            .transition_order_status(order.id, OrderStatus::PendingPayment, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert!(matches!(
            store
                .transition_order_status(
                    order.id,
                    OrderStatus::PendingPayment,
                    OrderStatus::Cancelled
                )
                .await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_count_booked_slots_skips_cancelled() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 6, 3).unwrap();
        let nine = day.and_hms_opt(9, 0, 0).unwrap();
        let ten = day.and_hms_opt(10, 0, 0).unwrap();
        store.create_order(&new_order("CMD-1", nine)).await.unwrap();
        store.create_order(&new_order("CMD-2", nine)).await.unwrap();
        let cancelled = store.create_order(&new_order("CMD-3", ten)).await.unwrap();
        store
            .transition_order_status(
                cancelled.id,
                OrderStatus::PendingPayment,
                OrderStatus::Cancelled,
            )
            .await
            .unwrap();

        let counts = store
            .count_booked_slots(day.and_hms_opt(0, 0, 0).unwrap(), day.and_hms_opt(23, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(counts.get(&nine), Some(&2));
        assert_eq!(counts.get(&ten), None);
    }

    #[tokio::test]
    async fn test_create_order_enforces_slot_capacity() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let nine = NaiveDate::from_ymd_opt(2026, 6, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    let mut order = new_order(&format!("CMD-{i}"), nine);
                    order.slot_capacity = 2;
                    store.create_order(&order).await
                })
            })
            .collect();
        let mut placed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(order) => placed.push(order),
                Err(e) => assert!(matches!(e, RepositoryError::SlotFull(at) if at == nine)),
            }
        }
        assert_eq!(placed.len(), 2);

        // A cancelled order frees its place.
        let first = placed.first().unwrap();
        store
            .transition_order_status(first.id, OrderStatus::PendingPayment, OrderStatus::Cancelled)
            .await
            .unwrap();
        let mut again = new_order("CMD-again", nine);
        again.slot_capacity = 2;
        store.create_order(&again).await.unwrap();
        store.create_order(&new_order("CMD-roomy", nine)).await.unwrap();
        let mut over = new_order("CMD-over", nine);
        over.slot_capacity = 3;
        assert!(matches!(
            store.create_order(&over).await,
            Err(RepositoryError::SlotFull(_))
        ));
    }

    #[tokio::test]
    async fn test_promo_codes_case_insensitive_and_capped() {
        let store = MemoryStore::new();
        store
            .create_promo_code(&PromoCodeInput {
                code: "GOURMAND20".to_owned(),
                kind: crate::models::PromoKind::Percent,
                value: rust_decimal::Decimal::from(20),
                minimum_amount: Price::from_cents(4000),
                valid_from: None,
                valid_until: None,
                max_uses: Some(1),
                active: true,
            })
            .await
            .unwrap();

        assert!(store.get_promo_code_by_code("gourmand20").await.unwrap().is_some());
        assert_eq!(store.record_promo_use("Gourmand20").await.unwrap().uses, 1);
        assert!(matches!(
            store.record_promo_use("GOURMAND20").await,
            Err(RepositoryError::Conflict(_))
        ));

        store.release_promo_use("gourmand20").await.unwrap();
        store.release_promo_use("GOURMAND20").await.unwrap();
        let promo = store.get_promo_code_by_code("GOURMAND20").await.unwrap().unwrap();
        assert_eq!(promo.uses, 0);
        assert_eq!(store.record_promo_use("GOURMAND20").await.unwrap().uses, 1);
        assert!(matches!(
            store.release_promo_use("NOPE").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_user_email_unique_case_insensitive() {
        let store = MemoryStore::new();
        let user = NewUser {
            email: Email::parse("Lea@Example.fr").unwrap(),
            name: "Léa".to_owned(),
            role: UserRole::Customer,
            password_hash: "hash".to_owned(),
        };
        store.create_user(&user).await.unwrap();
        let dup = NewUser {
            email: Email::parse("lea@example.fr").unwrap(),
            ..user
        };
        assert!(matches!(
            store.create_user(&dup).await,
            Err(RepositoryError::Conflict(_))
        ));
        let (found, hash) = store
            .get_user_by_email(&Email::parse("LEA@example.FR").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Léa");
        assert_eq!(hash, "hash");
    }
}
