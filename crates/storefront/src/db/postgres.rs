//! `PostgreSQL` store.
//!
//! Queries are checked at runtime (`query_as` into `FromRow` rows) so the
//! crate builds without a live database. Rows are converted into domain
//! types; anything that fails to parse back is reported as
//! `RepositoryError::DataCorruption`.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use fournil_core::{
    CategoryId, Email, InvoiceId, OrderId, OrderStatus, PaymentId, Price, ProductId, PromoCodeId,
    ReviewId, UserId, UserRole,
};

use super::{
    CatalogRepository, OrderRepository, PaymentRepository, PromoRepository, RepositoryError,
    ReviewRepository, Store, UserRepository,
};
use crate::models::{
    Category, CategoryInput, CustomerInfo, Invoice, NewInvoice, NewOrder, NewPayment, NewReview,
    NewUser, Order, OrderFilter, OrderLine, OrderTotals, Payment, Product, ProductFilter,
    ProductInput, PromoCode, PromoCodeInput, Review, User,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(what: &str, err: impl Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {err}"))
}

/// Map unique and check violations to `Conflict`, foreign keys to `NotFound`.
fn map_constraint(err: sqlx::Error, conflict: impl FnOnce() -> String) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() || db_err.is_check_violation() {
            return RepositoryError::Conflict(conflict());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(err)
}

fn to_u32(what: &str, value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|e| corrupt(what, e))
}

fn to_i32(what: &str, value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("{what} is too large")))
}

// =============================================================================
// Rows
// =============================================================================

const CATEGORY_COLUMNS: &str = "id, name, slug, color, icon, rank";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    color: String,
    icon: String,
    rank: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            color: row.color,
            icon: row.icon,
            rank: row.rank,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, images, category_id, stock, available, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    category_id: Option<i32>,
    stock: i32,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: Price::new(row.price),
            images: row.images,
            category_id: row.category_id.map(CategoryId::new),
            stock: to_u32("stock", row.stock)?,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, number, user_id, lines, pickup_at, customer, promo_code, \
     subtotal, discount, total, tax, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    number: String,
    user_id: Option<i32>,
    lines: Json<Vec<OrderLine>>,
    pickup_at: NaiveDateTime,
    customer: Json<CustomerInfo>,
    promo_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    tax: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            number: row.number,
            user_id: row.user_id.map(UserId::new),
            lines: row.lines.0,
            pickup_at: row.pickup_at,
            customer: row.customer.0,
            promo_code: row.promo_code,
            totals: OrderTotals {
                subtotal: Price::new(row.subtotal),
                discount: Price::new(row.discount),
                total: Price::new(row.total),
                tax: Price::new(row.tax),
            },
            status: row.status.parse().map_err(|e| corrupt("order status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PROMO_COLUMNS: &str =
    "id, code, kind, value, minimum_amount, valid_from, valid_until, max_uses, uses, active";

#[derive(sqlx::FromRow)]
struct PromoRow {
    id: i32,
    code: String,
    kind: String,
    value: Decimal,
    minimum_amount: Decimal,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    max_uses: Option<i32>,
    uses: i32,
    active: bool,
}

impl TryFrom<PromoRow> for PromoCode {
    type Error = RepositoryError;

    fn try_from(row: PromoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PromoCodeId::new(row.id),
            code: row.code,
            kind: row.kind.parse().map_err(|e: String| corrupt("promo kind", e))?,
            value: row.value,
            minimum_amount: Price::new(row.minimum_amount),
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            max_uses: row.max_uses.map(|m| to_u32("max_uses", m)).transpose()?,
            uses: to_u32("uses", row.uses)?,
            active: row.active,
        })
    }
}

const PAYMENT_COLUMNS: &str =
    "id, order_id, method, amount, status, transaction_id, payer, decline_reason, created_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: i32,
    method: String,
    amount: Decimal,
    status: String,
    transaction_id: Option<String>,
    payer: String,
    decline_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PaymentId::new(row.id),
            order_id: OrderId::new(row.order_id),
            method: row.method.parse().map_err(|e| corrupt("payment method", e))?,
            amount: Price::new(row.amount),
            status: row.status.parse().map_err(|e| corrupt("payment status", e))?,
            transaction_id: row.transaction_id,
            payer: row.payer,
            decline_reason: row.decline_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i32,
    number: String,
    payment_method: String,
    transaction_id: Option<String>,
    issued_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self, order: Order) -> Result<Invoice, RepositoryError> {
        Ok(Invoice {
            id: InvoiceId::new(self.id),
            number: self.number,
            order_id: order.id,
            order_number: order.number,
            customer: order.customer,
            lines: order.lines,
            totals: order.totals,
            payment_method: self
                .payment_method
                .parse()
                .map_err(|e| corrupt("payment method", e))?,
            transaction_id: self.transaction_id,
            issued_at: self.issued_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, name, role, password_hash, created_at";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i32,
    email: String,
    name: String,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_user(self) -> Result<(User, String), RepositoryError> {
        let user = User {
            id: UserId::new(self.id),
            email: Email::parse(&self.email).map_err(|e| corrupt("email", e))?,
            name: self.name,
            role: self.role.parse().map_err(|e| corrupt("role", e))?,
            created_at: self.created_at,
        };
        Ok((user, self.password_hash))
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    author: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            author: row.author,
            rating: u8::try_from(row.rating).map_err(|e| corrupt("rating", e))?,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogRepository for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category ORDER BY rank, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO storefront.category (name, slug, color, icon, rank)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.color)
        .bind(&input.icon)
        .bind(input.rank)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("category slug {} already exists", input.slug)))?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE storefront.category
             SET name = $2, slug = $3, color = $4, icon = $5, rank = $6
             WHERE id = $1
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.color)
        .bind(&input.icon)
        .bind(input.rank)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("category slug {} already exists", input.slug)))?;
        row.map(Category::from).ok_or(RepositoryError::NotFound)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.category WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE TRUE"
        ));
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id.as_i32());
        }
        if let Some(query) = filter.query.as_deref() {
            let pattern = format!("%{}%", escape_like(query));
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if filter.available_only {
            qb.push(" AND available AND stock > 0");
        }
        qb.push(" ORDER BY name, id");

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO storefront.product
                 (name, description, price, images, category_id, stock, available)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price.amount())
        .bind(&input.images)
        .bind(input.category_id.map(|c| c.as_i32()))
        .bind(to_i32("stock", input.stock)?)
        .bind(input.available)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("invalid product {}", input.name)))?;
        row.try_into()
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE storefront.product
             SET name = $2, description = $3, price = $4, images = $5, category_id = $6,
                 stock = $7, available = $8, updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price.amount())
        .bind(&input.images)
        .bind(input.category_id.map(|c| c.as_i32()))
        .bind(to_i32("stock", input.stock)?)
        .bind(input.available)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("invalid product {}", input.name)))?;
        row.map(Product::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE storefront.product
             SET stock = stock + $2, updated_at = now()
             WHERE id = $1 AND stock + $2 >= 0
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_product(id).await? {
                Some(product) => Err(RepositoryError::Conflict(format!(
                    "not enough stock for {}",
                    product.name
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }
}

/// Escape `%`, `_` and `\` for an `ILIKE` pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderRepository for PgStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialize inserts for the same slot until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("pickup:{}", order.pickup_at))
            .execute(&mut *tx)
            .await?;
        let booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.customer_order
             WHERE status <> 'cancelled' AND pickup_at = $1",
        )
        .bind(order.pickup_at)
        .fetch_one(&mut *tx)
        .await?;
        if booked >= i64::from(order.slot_capacity) {
            return Err(RepositoryError::SlotFull(order.pickup_at));
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.customer_order
                 (number, user_id, lines, pickup_at, customer, promo_code,
                  subtotal, discount, total, tax, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.number)
        .bind(order.user_id.map(|u| u.as_i32()))
        .bind(Json(&order.lines))
        .bind(order.pickup_at)
        .bind(Json(&order.customer))
        .bind(order.promo_code.as_deref())
        .bind(order.totals.subtotal.amount())
        .bind(order.totals.discount.amount())
        .bind(order.totals.total.amount())
        .bind(order.totals.tax.amount())
        .bind(OrderStatus::PendingPayment.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, || format!("order number {} already exists", order.number)))?;
        tx.commit().await?;
        row.try_into()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE number = $1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE TRUE"
        ));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.as_i32());
        }
        if let Some(from) = filter.from {
            qb.push(" AND ((created_at AT TIME ZONE 'UTC') + make_interval(mins => ")
                .push_bind(filter.utc_offset_minutes)
                .push("))::date >= ")
                .push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND ((created_at AT TIME ZONE 'UTC') + make_interval(mins => ")
                .push_bind(filter.utc_offset_minutes)
                .push("))::date <= ")
                .push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_order(id).await? {
                Some(order) => Err(RepositoryError::Conflict(format!(
                    "order {} is {}, not {from}",
                    order.number, order.status
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }

    async fn count_booked_slots(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<HashMap<NaiveDateTime, u32>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDateTime, i64)>(
            "SELECT pickup_at, COUNT(*)
             FROM storefront.customer_order
             WHERE status <> 'cancelled' AND pickup_at >= $1 AND pickup_at < $2
             GROUP BY pickup_at",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(at, count)| {
                u32::try_from(count)
                    .map(|count| (at, count))
                    .map_err(|e| corrupt("booking count", e))
            })
            .collect()
    }
}

// =============================================================================
// Promo codes
// =============================================================================

#[async_trait]
impl PromoRepository for PgStore {
    async fn list_promo_codes(&self) -> Result<Vec<PromoCode>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromoRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM storefront.promo_code ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PromoCode::try_from).collect()
    }

    async fn get_promo_code_by_code(
        &self,
        code: &str,
    ) -> Result<Option<PromoCode>, RepositoryError> {
        let row = sqlx::query_as::<_, PromoRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM storefront.promo_code WHERE code = upper($1)"
        ))
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.map(PromoCode::try_from).transpose()
    }

    async fn create_promo_code(
        &self,
        input: &PromoCodeInput,
    ) -> Result<PromoCode, RepositoryError> {
        let code = input.code.to_uppercase();
        let row = sqlx::query_as::<_, PromoRow>(&format!(
            "INSERT INTO storefront.promo_code
                 (code, kind, value, minimum_amount, valid_from, valid_until, max_uses, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PROMO_COLUMNS}"
        ))
        .bind(&code)
        .bind(input.kind.as_str())
        .bind(input.value)
        .bind(input.minimum_amount.amount())
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.max_uses.map(|m| to_i32("max_uses", m)).transpose()?)
        .bind(input.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("promo code {code} already exists")))?;
        row.try_into()
    }

    async fn set_promo_code_active(
        &self,
        id: PromoCodeId,
        active: bool,
    ) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoRow>(&format!(
            "UPDATE storefront.promo_code SET active = $2 WHERE id = $1 RETURNING {PROMO_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PromoCode::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn record_promo_use(&self, code: &str) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoRow>(&format!(
            "UPDATE storefront.promo_code
             SET uses = uses + 1
             WHERE code = upper($1) AND (max_uses IS NULL OR uses < max_uses)
             RETURNING {PROMO_COLUMNS}"
        ))
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row.try_into();
        }
        match self.get_promo_code_by_code(code).await? {
            Some(_) => Err(RepositoryError::Conflict(format!(
                "promo code {code} has reached its usage limit"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn release_promo_use(&self, code: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.promo_code
             SET uses = GREATEST(uses - 1, 0)
             WHERE code = upper($1)",
        )
        .bind(code.trim())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Payments and invoices
// =============================================================================

#[async_trait]
impl PaymentRepository for PgStore {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError> {
        let receipt = &payment.receipt;
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO storefront.payment
                 (order_id, method, amount, status, transaction_id, payer, decline_reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.order_id.as_i32())
        .bind(receipt.method.as_str())
        .bind(receipt.amount.amount())
        .bind(receipt.status.as_str())
        .bind(receipt.transaction_id.as_deref())
        .bind(&receipt.payer)
        .bind(receipt.decline_reason.as_deref())
        .bind(receipt.processed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || "invalid payment".to_owned()))?;
        row.try_into()
    }

    async fn list_payments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM storefront.payment WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.as_i32())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError> {
        let order = self
            .get_order(invoice.order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let number = Invoice::number_for(order.id, invoice.issued_at);
        let row = sqlx::query_as::<_, InvoiceRow>(
            "INSERT INTO storefront.invoice (number, order_id, payment_method, transaction_id, issued_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, number, payment_method, transaction_id, issued_at",
        )
        .bind(&number)
        .bind(order.id.as_i32())
        .bind(invoice.payment_method.as_str())
        .bind(invoice.transaction_id.as_deref())
        .bind(invoice.issued_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, || format!("order {} already has an invoice", order.number))
        })?;
        row.into_invoice(order)
    }

    async fn get_invoice_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, number, payment_method, transaction_id, issued_at
             FROM storefront.invoice WHERE order_id = $1",
        )
        .bind(order_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let order = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| corrupt("invoice", "order is missing"))?;
        row.into_invoice(order).map(Some)
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO storefront.account (email, email_normalized, name, role, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(user.email.as_str())
        .bind(user.email.normalized())
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || "email already exists".to_owned()))?;
        row.into_user().map(|(user, _)| user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM storefront.account WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.into_user().map(|(user, _)| user)).transpose()
    }

    async fn get_user_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM storefront.account WHERE email_normalized = $1"
        ))
        .bind(email.normalized())
        .fetch_optional(&self.pool)
        .await?;
        row.map(AccountRow::into_user).transpose()
    }

    async fn set_user_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE storefront.account SET role = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.into_user().map(|(user, _)| user))
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Reviews
// =============================================================================

#[async_trait]
impl ReviewRepository for PgStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let (id, created_at) = sqlx::query_as::<_, (i32, DateTime<Utc>)>(
            "INSERT INTO storefront.review (product_id, user_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING id, created_at",
        )
        .bind(review.product_id.as_i32())
        .bind(review.user_id.as_i32())
        .bind(i16::from(review.rating))
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || "invalid review".to_owned()))?;

        Ok(Review {
            id: ReviewId::new(id),
            product_id: review.product_id,
            user_id: review.user_id,
            author: review.author.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            created_at,
        })
    }

    async fn list_reviews(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT r.id, r.product_id, r.user_id, a.name AS author, r.rating, r.comment, r.created_at
             FROM storefront.review r
             JOIN storefront.account a ON a.id = r.user_id
             WHERE $1::INTEGER IS NULL OR r.product_id = $1
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(product_id.map(|p| p.as_i32()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Review::try_from).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("pain"), "pain");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
