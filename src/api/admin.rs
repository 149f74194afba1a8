//! Admin API endpoints.
//!
//! Account creation, login and logout are open; everything else requires an
//! admin token.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::listing::{ListQuery, Paginated, parse_flag};
use super::users::{
    ProfileRequest, SuccessResponse, UserResource, authenticate, register,
    revoke_presented_token, update_profile,
};
use crate::auth::{AdminAuth, Credentials, Guard};
use crate::db::{Database, User, UserFilter, UserSort};
use crate::impl_has_auth_backend;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub guard: Guard,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/create", post(create_admin))
        .route("/login", post(login_admin))
        .route("/logout", get(logout))
        .route("/user-listing", get(list_users))
        .route("/user-edit/{uuid}", put(edit_user))
        .route("/user-delete/{uuid}", delete(delete_user))
        .with_state(state)
}

async fn create_admin(
    State(state): State<AdminState>,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = register(&state.db, &state.guard, &payload, true).await?;
    Ok(Json(created))
}

/// Same as user login, but only for admin accounts.
async fn login_admin(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let email = credentials.email.as_deref().unwrap_or_default();

    let is_admin = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to get user")?
        .is_some_and(|user| user.is_admin());

    if !is_admin {
        return Err(ApiError::unprocessable("User is not an admin"));
    }

    let response = authenticate(&state.guard, &headers, &credentials).await?;
    Ok(Json(response))
}

async fn logout(State(state): State<AdminState>, headers: HeaderMap) -> impl IntoResponse {
    revoke_presented_token(&state.guard, &headers).await;
    Json(SuccessResponse { success: true })
}

/// Substring filters for the user listing, alongside the paging parameters.
#[derive(Debug, Default, Deserialize)]
struct UserListingFilter {
    first_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    created_at: Option<String>,
    marketing: Option<String>,
}

impl From<UserListingFilter> for UserFilter {
    fn from(query: UserListingFilter) -> Self {
        let non_empty = |value: Option<String>| value.filter(|s| !s.trim().is_empty());
        Self {
            marketing: parse_flag(query.marketing.as_deref()),
            first_name: non_empty(query.first_name),
            email: non_empty(query.email),
            phone: non_empty(query.phone),
            address: non_empty(query.address),
            created_at: non_empty(query.created_at),
        }
    }
}

/// List non-admin users, filtered and paginated.
async fn list_users(
    State(state): State<AdminState>,
    _auth: AdminAuth,
    Query(query): Query<ListQuery>,
    Query(filter): Query<UserListingFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = query
        .sort_by()
        .and_then(UserSort::parse)
        .unwrap_or_default();

    let page = state
        .db
        .users()
        .list_customers(&filter.into(), sort, query.descending(), query.page())
        .await
        .db_err("Failed to list users")?;

    Ok(Json(Paginated::from(page.map(|user| UserResource::from(&user)))))
}

/// Look up a customer by UUID for an admin action. Admin accounts are off limits.
async fn find_customer(db: &Database, uuid: &str, action: &str) -> Result<User, ApiError> {
    validate_uuid(uuid)?;

    let user = db
        .users()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_admin() {
        return Err(ApiError::unprocessable(format!(
            "Admin users cannot be {}",
            action
        )));
    }

    Ok(user)
}

/// Replace a customer's profile and password.
async fn edit_user(
    State(state): State<AdminState>,
    AdminAuth(admin): AdminAuth,
    Path(uuid): Path<String>,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_customer(&state.db, &uuid, "edited").await?;
    let updated = update_profile(&state.db, &user, &payload).await?;

    info!(admin = %admin.uuid, user = %user.uuid, "User edited by admin");
    Ok(Json(UserResource::from(&updated)))
}

/// Delete a non-admin user by UUID.
async fn delete_user(
    State(state): State<AdminState>,
    AdminAuth(admin): AdminAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_customer(&state.db, &uuid, "deleted").await?;

    let deleted = state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin = %admin.uuid, user = %user.uuid, "User deleted by admin");
    Ok(Json(SuccessResponse { success: true }))
}
