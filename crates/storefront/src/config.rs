//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! ## Server
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: <http://localhost:3000>)
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string;
//!   without one the storefront runs on the in-memory store
//! - `STOREFRONT_SEED_DEMO` - Load the demo catalog into the in-memory store (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## Shop
//! - `SHOP_NAME` - Name printed on invoices (default: Fournil)
//! - `SHOP_VAT_RATE` - VAT rate included in prices (default: 0.055)
//! - `SHOP_UTC_OFFSET_MINUTES` - Shop-local time offset from UTC (default: 60)
//!
//! ## Pickup slots
//! - `SLOT_OPEN` / `SLOT_CLOSE` - Opening hours (default: 07:00 / 19:00)
//! - `SLOT_MINUTES` - Slot length (default: 30)
//! - `SLOT_CAPACITY` - Orders per slot (default: 10)
//! - `SLOT_DAYS_AHEAD` - Days open for booking (default: 7)
//! - `SLOT_LEAD_MINUTES` - Minimum delay before pickup (default: 120)
//! - `SLOT_CLOSED_DAYS` - Comma-separated weekdays (default: mon)
//!
//! ## Payment simulator
//! - `PAYMENT_DELAY_MS` - Simulated processing time (default: 1500)
//! - `PAYMENT_FAILURE_RATE` - Share of valid payments randomly declined (default: 0.0)
//!
//! ## Orders
//! - `PENDING_ORDER_TTL_MINUTES` - Unpaid orders are cancelled after this long (default: 30)
//! - `PENDING_ORDER_SWEEP_SECS` - How often expired unpaid orders are swept (default: 60)
//!
//! ## Caching
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Seed the demo catalog into the memory store
    pub seed_demo: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub shop: ShopConfig,
    pub slots: SlotConfig,
    pub payment: PaymentConfig,
    pub orders: OrderConfig,
    /// How long catalog reads are cached
    pub catalog_cache_ttl: Duration,
}

/// Shop identity and tax.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub name: String,
    /// VAT rate included in prices (0.055 = 5.5 %)
    pub vat_rate: Decimal,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: "Fournil".to_owned(),
            vat_rate: Decimal::new(55, 3),
        }
    }
}

/// Pickup slot rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_minutes: u32,
    pub capacity: u32,
    pub days_ahead: u32,
    pub lead_minutes: u32,
    pub closed_days: Vec<Weekday>,
    pub utc_offset_minutes: i32,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: 30,
            capacity: 10,
            days_ahead: 7,
            lead_minutes: 120,
            closed_days: vec![Weekday::Mon],
            utc_offset_minutes: 60,
        }
    }
}

/// Payment simulator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfig {
    pub delay: Duration,
    /// Probability in `[0, 1]` of declining a valid payment.
    pub failure_rate: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            failure_rate: 0.0,
        }
    }
}

/// Unpaid order expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    /// Age after which a `pending_payment` order is cancelled and its stock released.
    pub pending_ttl: Duration,
    /// Period of the expiry sweep.
    pub sweep_interval: Duration,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env
            .get("STOREFRONT_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from);

        let shop = ShopConfig {
            name: env.get("SHOP_NAME").unwrap_or_else(|| ShopConfig::default().name),
            vat_rate: env.parse_or("SHOP_VAT_RATE", ShopConfig::default().vat_rate)?,
        };
        if shop.vat_rate < Decimal::ZERO || shop.vat_rate >= Decimal::ONE {
            return Err(invalid("SHOP_VAT_RATE", "must be in [0, 1)"));
        }

        let defaults = SlotConfig::default();
        let slots = SlotConfig {
            open: env.time_or("SLOT_OPEN", defaults.open)?,
            close: env.time_or("SLOT_CLOSE", defaults.close)?,
            slot_minutes: env.parse_or("SLOT_MINUTES", defaults.slot_minutes)?,
            capacity: env.parse_or("SLOT_CAPACITY", defaults.capacity)?,
            days_ahead: env.parse_or("SLOT_DAYS_AHEAD", defaults.days_ahead)?,
            lead_minutes: env.parse_or("SLOT_LEAD_MINUTES", defaults.lead_minutes)?,
            closed_days: match env.get("SLOT_CLOSED_DAYS") {
                Some(value) => parse_weekdays(&value)?,
                None => defaults.closed_days,
            },
            utc_offset_minutes: env
                .parse_or("SHOP_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?,
        };
        if slots.open >= slots.close {
            return Err(invalid("SLOT_CLOSE", "must be after SLOT_OPEN"));
        }
        if slots.slot_minutes == 0 {
            return Err(invalid("SLOT_MINUTES", "must be positive"));
        }

        let payment = PaymentConfig {
            delay: Duration::from_millis(env.parse_or("PAYMENT_DELAY_MS", 1500_u64)?),
            failure_rate: env.parse_or("PAYMENT_FAILURE_RATE", 0.0_f64)?,
        };
        if !(0.0..=1.0).contains(&payment.failure_rate) {
            return Err(invalid("PAYMENT_FAILURE_RATE", "must be in [0, 1]"));
        }

        let ttl_minutes: u64 = env.parse_or("PENDING_ORDER_TTL_MINUTES", 30)?;
        if ttl_minutes == 0 {
            return Err(invalid("PENDING_ORDER_TTL_MINUTES", "must be positive"));
        }
        let sweep_secs: u64 = env.parse_or("PENDING_ORDER_SWEEP_SECS", 60)?;
        if sweep_secs == 0 {
            return Err(invalid("PENDING_ORDER_SWEEP_SECS", "must be positive"));
        }
        let orders = OrderConfig {
            pending_ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)),
            sweep_interval: Duration::from_secs(sweep_secs),
        };

        Ok(Self {
            database_url,
            host: env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("STOREFRONT_PORT", 3000)?,
            base_url: env
                .get("STOREFRONT_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_owned()),
            seed_demo: env.parse_or("STOREFRONT_SEED_DEMO", true)?,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            shop,
            slots,
            payment,
            orders,
            catalog_cache_ttl: Duration::from_secs(env.parse_or("CATALOG_CACHE_TTL_SECS", 300)?),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// A non-empty variable.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key).map_or(Ok(default), |value| {
            value.trim().parse::<T>().map_err(|e| invalid(key, e))
        })
    }

    fn time_or(&self, key: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| invalid(key, e))
        })
    }
}

fn invalid(key: &str, reason: impl Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_owned(), reason.to_string())
}

/// Parse `mon,sun` (or `none`) into weekdays.
fn parse_weekdays(value: &str) -> Result<Vec<Weekday>, ConfigError> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|day| !day.is_empty())
        .map(|day| {
            day.parse::<Weekday>()
                .map_err(|_| invalid("SLOT_CLOSED_DAYS", format!("unknown weekday {day}")))
        })
        .collect()
}
