//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses carry a JSON body `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::{
    CartError, CheckoutError, PromoError, StatusTransitionError, ValidationError,
};
use crate::services::auth::AuthError;
use crate::services::checkout::FinalizeError;
use crate::services::orders::OrderError;
use crate::services::payment::PaymentError;
use crate::services::promo::PromoCheckError;
use crate::services::slots::SlotError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Input failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The payment went through the simulator and was declined.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Repository(RepositoryError::NotFound) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Repository(RepositoryError::Conflict(_) | RepositoryError::SlotFull(_))
            | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let body = match &self {
            _ if self.is_server_error() => json!({ "error": "Internal server error" }),
            Self::Repository(RepositoryError::NotFound) => json!({ "error": "Not found" }),
            Self::Repository(err @ RepositoryError::SlotFull(_)) => {
                json!({ "error": err.to_string() })
            }
            Self::Repository(RepositoryError::Conflict(msg))
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::PaymentDeclined(msg)
            | Self::BadRequest(msg) => json!({ "error": msg }),
            Self::Validation(err) => json!({ "error": err.to_string(), "field": err.field }),
            Self::Auth(err) => {
                let message = match err {
                    AuthError::InvalidCredentials | AuthError::UserNotFound => {
                        "Invalid credentials".to_string()
                    }
                    AuthError::UserAlreadyExists => {
                        "An account with this email already exists".to_string()
                    }
                    AuthError::WeakPassword(msg) | AuthError::InvalidName(msg) => msg.clone(),
                    AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                    _ => "Authentication error".to_string(),
                };
                json!({ "error": message })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::NotInCart(_) => Self::NotFound(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::NotStarted => Self::NotFound(err.to_string()),
            CheckoutError::OrderAlreadyPlaced => Self::Conflict(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<PromoError> for AppError {
    fn from(err: PromoError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<PromoCheckError> for AppError {
    fn from(err: PromoCheckError) -> Self {
        match err {
            PromoCheckError::Rejected(e) => e.into(),
            PromoCheckError::Repository(e) => e.into(),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::Repository(e) => e.into(),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<StatusTransitionError> for AppError {
    fn from(err: StatusTransitionError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => Self::NotFound(err.to_string()),
            OrderError::Transition(e) => e.into(),
            OrderError::Repository(e) => e.into(),
        }
    }
}

impl From<FinalizeError> for AppError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::Checkout(e) => e.into(),
            FinalizeError::Slot(e) => e.into(),
            FinalizeError::Promo(e) => e.into(),
            FinalizeError::Payment(e) => e.into(),
            FinalizeError::Repository(e) => e.into(),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Payment declined", Some(&[("order", "CMD-20260603-ABC234")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fournil_core::{CheckoutStep, OrderStatus, Price};

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::PaymentDeclined("insufficient funds".to_string())),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Conflict("stock".to_string())),
            StatusCode::CONFLICT
        );
        let full = NaiveDate::from_ymd_opt(2026, 6, 3)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .map(RepositoryError::SlotFull);
        assert_eq!(get_status(full.unwrap()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad row".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(ValidationError::new("email", "is invalid")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::CannotAdvance(CheckoutStep::Slot)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PromoError::MinimumNotMet {
                minimum: Price::from_cents(1500)
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(StatusTransitionError {
                from: OrderStatus::PickedUp,
                to: OrderStatus::Cancelled,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(PaymentError::InvalidCvv),
            StatusCode::BAD_REQUEST
        );
    }
}
