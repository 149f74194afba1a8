//! User account endpoints.
//!
//! - POST `/create` - Register and receive a first token
//! - POST `/login` - Exchange email and password for a token
//! - GET `/` - Current user
//! - DELETE `/` - Delete the current user
//! - PUT `/edit` - Replace the current user's profile and password
//! - GET `/orders` - The current user's orders, paginated
//! - GET `/logout` - Revoke the presented token

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, write_err};
use super::listing::ListQuery;
use super::orders::list_orders_page;
use crate::auth::{Auth, Credentials, Guard, RequestContext, password::hash_password};
use crate::db::{Database, NewUser, TokenRecord, User, UserUpdate};
use crate::impl_has_auth_backend;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub guard: Guard,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(show_user).delete(delete_user))
        .route("/create", post(create_user))
        .route("/edit", put(edit_user))
        .route("/orders", get(user_orders))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state)
}

/// Public view of a user. Never includes the internal ID or password hash.
#[derive(Debug, Serialize)]
pub struct UserResource {
    pub uuid: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    pub is_marketing: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserResource {
    fn from(user: &User) -> Self {
        Self {
            uuid: user.uuid.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar: user.avatar.clone(),
            email: user.email.clone(),
            address: user.address.clone(),
            phone_number: user.phone_number.clone(),
            is_marketing: user.is_marketing,
            is_admin: user.is_admin(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// Account fields submitted on registration and on every edit.
#[derive(Deserialize)]
pub struct ProfileRequest {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    password_confirmation: Option<String>,
    avatar: Option<String>,
    #[serde(default)]
    address: String,
    #[serde(default)]
    phone_number: String,
    #[serde(default)]
    is_marketing: bool,
}

#[derive(Serialize)]
pub struct CreatedUserResponse {
    #[serde(flatten)]
    user: UserResource,
    token: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    expires_at: String,
    #[serde(rename = "type")]
    token_type: String,
}

impl From<TokenRecord> for LoginResponse {
    fn from(record: TokenRecord) -> Self {
        Self {
            token: record.token,
            expires_at: record.expires_at,
            token_type: record.label,
        }
    }
}

#[derive(Serialize)]
pub(super) struct SuccessResponse {
    pub(super) success: bool,
}

/// A profile payload after trimming and validation.
struct Profile<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    avatar: Option<&'a str>,
    address: &'a str,
    phone_number: &'a str,
    password: &'a str,
    is_marketing: bool,
}

fn validate_profile(payload: &ProfileRequest) -> Result<Profile<'_>, ApiError> {
    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();
    let email = payload.email.trim();
    let address = payload.address.trim();
    let phone_number = payload.phone_number.trim();
    let avatar = payload
        .avatar
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::unprocessable("First and last name are required"));
    }

    if [first_name, last_name, address, phone_number]
        .iter()
        .chain(avatar.as_ref())
        .any(|field| field.len() > 255)
    {
        return Err(ApiError::unprocessable(
            "Fields cannot be longer than 255 characters",
        ));
    }

    if email.len() > 255 || !email.contains('@') || email.starts_with('@') || email.ends_with('@')
    {
        return Err(ApiError::unprocessable("A valid email is required"));
    }

    if address.is_empty() || phone_number.is_empty() {
        return Err(ApiError::unprocessable(
            "Address and phone number are required",
        ));
    }

    if payload.password.len() < 8 {
        return Err(ApiError::unprocessable(
            "Password must be at least 8 characters",
        ));
    }

    if payload
        .password_confirmation
        .as_deref()
        .is_some_and(|confirmation| confirmation != payload.password)
    {
        return Err(ApiError::unprocessable(
            "Password confirmation does not match",
        ));
    }

    Ok(Profile {
        first_name,
        last_name,
        email,
        avatar,
        address,
        phone_number,
        password: &payload.password,
        is_marketing: payload.is_marketing,
    })
}

/// Register an account and issue its first token. Admins must supply an avatar.
pub(super) async fn register(
    db: &Database,
    guard: &Guard,
    payload: &ProfileRequest,
    admin: bool,
) -> Result<CreatedUserResponse, ApiError> {
    let profile = validate_profile(payload)?;

    if admin && profile.avatar.is_none() {
        return Err(ApiError::unprocessable("Avatar is required"));
    }

    let taken = db
        .users()
        .is_email_taken(profile.email)
        .await
        .db_err("Failed to check email availability")?;

    if taken {
        return Err(ApiError::unprocessable("Email is already taken"));
    }

    let password_hash = hash_password(profile.password).internal_err("Failed to hash password")?;

    let mut new_user = NewUser::new(
        profile.first_name,
        profile.last_name,
        profile.email,
        &password_hash,
    )
    .contact(profile.address, profile.phone_number)
    .avatar(profile.avatar)
    .marketing(profile.is_marketing);
    if admin {
        new_user = new_user.admin();
    }

    // The email may have been taken since the check above.
    let user = db
        .users()
        .create(&new_user)
        .await
        .map_err(|e| write_err(e, "Email is already taken", "Failed to create user"))?;

    let record = guard
        .service()
        .request_token(&user)
        .await
        .internal_err("Failed to issue token")?;

    info!(user = %user.uuid, admin, "Account created");

    Ok(CreatedUserResponse {
        user: UserResource::from(&user),
        token: record.token,
    })
}

/// Replace `user`'s profile and re-hash the submitted password.
pub(super) async fn update_profile(
    db: &Database,
    user: &User,
    payload: &ProfileRequest,
) -> Result<User, ApiError> {
    let profile = validate_profile(payload)?;
    let password_hash = hash_password(profile.password).internal_err("Failed to hash password")?;

    let update = UserUpdate {
        first_name: profile.first_name.to_string(),
        last_name: profile.last_name.to_string(),
        email: profile.email.to_string(),
        password_hash,
        avatar: profile.avatar.map(str::to_string),
        address: profile.address.to_string(),
        phone_number: profile.phone_number.to_string(),
        is_marketing: profile.is_marketing,
    };

    db.users()
        .update(user.id, &update)
        .await
        .map_err(|e| write_err(e, "Email is already taken", "Failed to update user"))?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Check credentials for this request and issue a token for the resulting user.
pub(super) async fn authenticate(
    guard: &Guard,
    headers: &HeaderMap,
    credentials: &Credentials,
) -> Result<LoginResponse, ApiError> {
    let mut ctx = RequestContext::from_headers(headers);

    if !guard.validate(&mut ctx, credentials).await {
        return Err(ApiError::unprocessable("Failed to authenticate user"));
    }

    let user = ctx
        .user()
        .cloned()
        .ok_or_else(|| ApiError::unprocessable("Failed to authenticate user"))?;

    let record = guard
        .service()
        .request_token(&user)
        .await
        .internal_err("Failed to issue token")?;

    info!(user = %user.uuid, "Logged in");

    Ok(LoginResponse::from(record))
}

/// Revoke the bearer token presented with the request, if any. Always succeeds.
pub(super) async fn revoke_presented_token(guard: &Guard, headers: &HeaderMap) {
    let ctx = RequestContext::from_headers(headers);
    if let Some(token) = ctx.bearer_token() {
        guard.service().revoke_token(token).await;
    }
}

async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = register(&state.db, &state.guard, &payload, false).await?;
    Ok((StatusCode::OK, Json(created)))
}

async fn login(
    State(state): State<UsersState>,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let response = authenticate(&state.guard, &headers, &credentials).await?;
    Ok((StatusCode::OK, Json(response)))
}

async fn show_user(Auth(user): Auth) -> impl IntoResponse {
    Json(UserResource::from(&user))
}

async fn edit_user(
    State(state): State<UsersState>,
    Auth(user): Auth,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = update_profile(&state.db, &user, &payload).await?;
    info!(user = %user.uuid, "Profile updated");
    Ok(Json(UserResource::from(&updated)))
}

async fn user_orders(
    State(state): State<UsersState>,
    Auth(user): Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = list_orders_page(&state.db, Some(user.id), &query).await?;
    Ok(Json(page))
}

async fn delete_user(
    State(state): State<UsersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %user.uuid, "Account deleted");
    Ok(Json(SuccessResponse { success: true }))
}

async fn logout(State(state): State<UsersState>, headers: HeaderMap) -> impl IntoResponse {
    revoke_presented_token(&state.guard, &headers).await;
    Json(SuccessResponse { success: true })
}
