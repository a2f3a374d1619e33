//! Status enums for various entities.
//!
//! Each enum has a stable `snake_case` text form used both on the wire (serde)
//! and in the database (`Display`/`FromStr`).

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown status string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable text form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of a pickup order.
///
/// ```text
/// pending_payment -> confirmed -> in_preparation -> ready -> picked_up
///        \______________\______________\____________\-> cancelled
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, waiting for a successful payment.
    #[default]
    PendingPayment,
    /// Paid, waiting for the bakery to start on it.
    Confirmed,
    /// Being prepared.
    InPreparation,
    /// Ready for pickup.
    Ready,
    /// Collected by the customer.
    PickedUp,
    /// Cancelled by the customer or the bakery.
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    PendingPayment => "pending_payment",
    Confirmed => "confirmed",
    InPreparation => "in_preparation",
    Ready => "ready",
    PickedUp => "picked_up",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::PendingPayment,
        Self::Confirmed,
        Self::InPreparation,
        Self::Ready,
        Self::PickedUp,
        Self::Cancelled,
    ];

    /// True once no further transition is possible.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::PickedUp | Self::Cancelled)
    }

    /// True if the order counts as a sale (paid and not cancelled).
    #[must_use]
    pub const fn is_sale(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::InPreparation | Self::Ready | Self::PickedUp
        )
    }

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::PendingPayment, Self::Confirmed)
            | (Self::Confirmed, Self::InPreparation)
            | (Self::InPreparation, Self::Ready)
            | (Self::Ready, Self::PickedUp) => true,
            (current, Self::Cancelled) => !current.is_final(),
            _ => false,
        }
    }
}

/// Outcome of a simulated payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Declined,
}

text_enum!(PaymentStatus, "payment status", {
    Succeeded => "succeeded",
    Declined => "declined",
});

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
}

text_enum!(PaymentMethod, "payment method", {
    Card => "card",
    Paypal => "paypal",
});

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular customer account.
    #[default]
    Customer,
    /// Bakery staff with back-office access.
    Admin,
}

text_enum!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});

/// Steps of the checkout wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Choose a pickup slot.
    #[default]
    Slot,
    /// Enter name, email and phone.
    CustomerInfo,
    /// Review the order.
    Recap,
    /// Pay.
    Payment,
    /// Order placed.
    Confirmation,
}

text_enum!(CheckoutStep, "checkout step", {
    Slot => "slot",
    CustomerInfo => "customer_info",
    Recap => "recap",
    Payment => "payment",
    Confirmation => "confirmation",
});

impl CheckoutStep {
    /// The first step.
    pub const FIRST: Self = Self::Slot;
    /// The last step.
    pub const LAST: Self = Self::Confirmation;

    /// The following step, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Slot => Some(Self::CustomerInfo),
            Self::CustomerInfo => Some(Self::Recap),
            Self::Recap => Some(Self::Payment),
            Self::Payment => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }

    /// The preceding step, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Slot => None,
            Self::CustomerInfo => Some(Self::Slot),
            Self::Recap => Some(Self::CustomerInfo),
            Self::Payment => Some(Self::Recap),
            Self::Confirmation => Some(Self::Payment),
        }
    }
}
