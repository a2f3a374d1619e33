//! Sales analytics for the back-office.
//!
//! Every report is a single pass over orders (or reviews) already loaded
//! from the store. Only orders in a sale status count towards revenue,
//! quantities and slots; the status breakdown of [`summary`] covers all.
//! Periods follow the shop-local calendar, not UTC.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fournil_core::{OrderStatus, Price, ProductId};

use crate::models::slot::shop_local;
use crate::models::{Order, Product, Review};

/// Revenue grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

impl Period {
    /// Group key of `order`: `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`.
    fn key(self, order: &Order, utc_offset_minutes: i32) -> String {
        let date = shop_local(order.created_at, utc_offset_minutes).date();
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => date.format("%Y-%m").to_string(),
        }
    }
}

/// Revenue for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenuePoint {
    pub period: String,
    pub revenue: Price,
    pub orders: u32,
}

/// Sales of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub revenue: Price,
}

/// Orders picking up at one time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    /// `HH:MM`.
    pub time: String,
    pub orders: u32,
}

/// Headline numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub orders: u32,
    pub revenue: Price,
    pub average_order: Price,
    /// Every order, by status.
    pub by_status: BTreeMap<OrderStatus, u32>,
    pub reviews: u32,
    pub average_rating: Option<Decimal>,
}

/// Average rating of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRating {
    pub product_id: ProductId,
    pub name: String,
    pub reviews: u32,
    pub average: Decimal,
}

fn sales(orders: &[Order]) -> impl Iterator<Item = &Order> {
    orders.iter().filter(|o| o.status.is_sale())
}

/// Revenue and order count per shop-local period, oldest first.
#[must_use]
pub fn revenue(orders: &[Order], period: Period, utc_offset_minutes: i32) -> Vec<RevenuePoint> {
    let mut groups: BTreeMap<String, (Price, u32)> = BTreeMap::new();
    for order in sales(orders) {
        let entry = groups.entry(period.key(order, utc_offset_minutes)).or_default();
        entry.0 += order.totals.total;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(period, (revenue, orders))| RevenuePoint {
            period,
            revenue,
            orders,
        })
        .collect()
}

/// Best sellers: quantity desc, then revenue desc, then name.
#[must_use]
pub fn top_products(orders: &[Order], limit: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<ProductId, ProductSales> = HashMap::new();
    for line in sales(orders).flat_map(|o| &o.lines) {
        let entry = by_product
            .entry(line.product_id)
            .or_insert_with(|| ProductSales {
                product_id: line.product_id,
                name: line.name.clone(),
                quantity: 0,
                revenue: Price::ZERO,
            });
        entry.quantity = entry.quantity.saturating_add(line.quantity);
        entry.revenue += line.line_total;
    }
    let mut ranked: Vec<ProductSales> = by_product.into_values().collect();
    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

/// Orders per pickup time of day, earliest first.
#[must_use]
pub fn slot_histogram(orders: &[Order]) -> Vec<SlotCount> {
    let mut counts: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    for order in sales(orders) {
        let time = order.pickup_at.time();
        *counts.entry((time.hour(), time.minute())).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((hour, minute), orders)| SlotCount {
            time: format!("{hour:02}:{minute:02}"),
            orders,
        })
        .collect()
}

/// Order, revenue and review headline numbers.
#[must_use]
pub fn summary(orders: &[Order], reviews: &[Review]) -> Summary {
    let mut by_status = BTreeMap::new();
    let mut count = 0_u32;
    let mut revenue = Price::ZERO;
    for order in orders {
        *by_status.entry(order.status).or_insert(0) += 1;
        if order.status.is_sale() {
            count += 1;
            revenue += order.totals.total;
        }
    }
    let average_order = if count == 0 {
        Price::ZERO
    } else {
        Price::new(revenue.amount() / Decimal::from(count)).round()
    };

    let review_count = u32::try_from(reviews.len()).unwrap_or(u32::MAX);
    let average_rating = average(reviews.iter().map(|r| r.rating));

    Summary {
        orders: count,
        revenue,
        average_order,
        by_status,
        reviews: review_count,
        average_rating,
    }
}

/// Average rating per reviewed product, best first.
#[must_use]
pub fn product_ratings(reviews: &[Review], products: &[Product]) -> Vec<ProductRating> {
    let mut by_product: BTreeMap<ProductId, Vec<u8>> = BTreeMap::new();
    for review in reviews {
        by_product
            .entry(review.product_id)
            .or_default()
            .push(review.rating);
    }
    let mut ratings: Vec<ProductRating> = by_product
        .into_iter()
        .filter_map(|(product_id, ratings)| {
            let name = products
                .iter()
                .find(|p| p.id == product_id)
                .map_or_else(|| format!("#{product_id}"), |p| p.name.clone());
            Some(ProductRating {
                product_id,
                name,
                reviews: u32::try_from(ratings.len()).unwrap_or(u32::MAX),
                average: average(ratings.into_iter())?,
            })
        })
        .collect();
    ratings.sort_by(|a, b| {
        b.average
            .cmp(&a.average)
            .then_with(|| b.reviews.cmp(&a.reviews))
            .then_with(|| a.name.cmp(&b.name))
    });
    ratings
}

/// Mean of ratings to two decimals, `None` when empty.
fn average(ratings: impl Iterator<Item = u8>) -> Option<Decimal> {
    let (sum, count) = ratings.fold((0_u32, 0_u32), |(sum, count), r| {
        (sum + u32::from(r), count + 1)
    });
    (count > 0).then(|| (Decimal::from(sum) / Decimal::from(count)).round_dp(2))
}
