//! Account route handlers: register, login, logout and the current user.
//!
//! A successful register or login stores the [`CurrentUser`] in the session
//! under a fresh session ID. Logging out keeps the cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use fournil_core::UserRole;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Registration payload.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login payload.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn sign_in(session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/auth/register`
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CurrentUser>)> {
    let user = AuthService::new(state.store())
        .register(&body.email, &body.name, &body.password, UserRole::Customer)
        .await?;
    info!(user_id = %user.id, "Account created");
    let current = sign_in(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(current)))
}

/// `POST /api/auth/login`
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let user = AuthService::new(state.store())
        .login(&body.email, &body.password)
        .await?;
    info!(user_id = %user.id, "Logged in");
    Ok(Json(sign_in(&session, &user).await?))
}

/// `POST /api/auth/logout`
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(AuthService::new(state.store()).get_user(user.id).await?))
}
