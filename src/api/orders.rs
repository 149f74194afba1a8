//! Order endpoints. Every route requires a token.
//!
//! Customers see and change only their own orders; admins see all of them.
//! An order the caller may not see answers 404, same as a missing one.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::listing::{ListQuery, Paginated};
use super::users::SuccessResponse;
use crate::auth::{Auth, Guard};
use crate::db::{
    Database, NewOrder, Order, OrderAddress, OrderLine, OrderSort, OrderTotals, User,
};
use crate::impl_has_auth_backend;

#[derive(Clone)]
pub struct OrdersState {
    pub db: Database,
    pub guard: Guard,
}

impl_has_auth_backend!(OrdersState);

pub fn router(state: OrdersState) -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/create", post(create_order))
        .route(
            "/{uuid}",
            get(show_order)
                .put(update_order)
                .patch(update_order)
                .delete(delete_order),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct OrderRequest {
    order_status_uuid: String,
    payment_uuid: String,
    products: Vec<OrderLine>,
    address: OrderAddress,
}

#[derive(Serialize)]
struct StatusResource {
    uuid: String,
    title: String,
}

#[derive(Serialize)]
struct PaymentResource {
    uuid: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
pub struct OrderResource {
    uuid: String,
    user_uuid: String,
    order_status: StatusResource,
    payment: PaymentResource,
    products: Vec<OrderLine>,
    address: OrderAddress,
    delivery_fee: f64,
    amount: f64,
    created_at: String,
    updated_at: String,
    shipped_at: Option<String>,
}

impl From<Order> for OrderResource {
    fn from(order: Order) -> Self {
        Self {
            uuid: order.uuid,
            user_uuid: order.user_uuid,
            order_status: StatusResource {
                uuid: order.status.uuid,
                title: order.status.title,
            },
            payment: PaymentResource {
                uuid: order.payment.uuid,
                kind: order.payment.kind,
            },
            products: order.products,
            address: order.address,
            delivery_fee: order.delivery_fee,
            amount: order.amount,
            created_at: order.created_at,
            updated_at: order.updated_at,
            shipped_at: order.shipped_at,
        }
    }
}

/// Resolve the references in a request and price it.
async fn prepare_order(db: &Database, payload: OrderRequest) -> Result<NewOrder, ApiError> {
    if payload.products.is_empty() {
        return Err(ApiError::unprocessable("An order needs at least one product"));
    }
    if payload.products.iter().any(|line| line.quantity == 0) {
        return Err(ApiError::unprocessable("Quantities must be at least 1"));
    }
    if payload.address.billing.trim().is_empty() || payload.address.shipping.trim().is_empty() {
        return Err(ApiError::unprocessable(
            "Billing and shipping addresses are required",
        ));
    }

    let catalog = db.catalog();

    let status = catalog
        .status_by_uuid(&payload.order_status_uuid)
        .await
        .db_err("Failed to get order status")?
        .ok_or_else(|| ApiError::unprocessable("Invalid order status"))?;

    let payment = catalog
        .payment_by_uuid(&payload.payment_uuid)
        .await
        .db_err("Failed to get payment")?
        .ok_or_else(|| ApiError::unprocessable("Invalid payment"))?;

    let uuids: Vec<String> = payload.products.iter().map(|l| l.uuid.clone()).collect();
    let products = catalog
        .products_by_uuids(&uuids)
        .await
        .db_err("Failed to get products")?;

    let totals = OrderTotals::compute(&payload.products, &products)
        .ok_or_else(|| ApiError::unprocessable("Invalid product"))?;

    Ok(NewOrder {
        status_id: status.id,
        payment_id: payment.id,
        products: payload.products,
        address: payload.address,
        totals,
    })
}

/// Fetch an order the caller owns, or any order for an admin.
async fn find_visible(db: &Database, user: &User, uuid: &str) -> Result<Order, ApiError> {
    validate_uuid(uuid)?;

    db.orders()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get order")?
        .filter(|order| user.is_admin() || order.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("Order not found"))
}

/// One page of orders, restricted to `owner` when given.
pub(super) async fn list_orders_page(
    db: &Database,
    owner: Option<i64>,
    query: &ListQuery,
) -> Result<Paginated<OrderResource>, ApiError> {
    let sort = query
        .sort_by()
        .and_then(OrderSort::parse)
        .unwrap_or_default();

    let page = db
        .orders()
        .list(owner, sort, query.descending(), query.page())
        .await
        .db_err("Failed to list orders")?;

    Ok(Paginated::from(page.map(OrderResource::from)))
}

async fn list_orders(
    State(state): State<OrdersState>,
    Auth(user): Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = (!user.is_admin()).then_some(user.id);
    let page = list_orders_page(&state.db, owner, &query).await?;
    Ok(Json(page))
}

async fn create_order(
    State(state): State<OrdersState>,
    Auth(user): Auth,
    Json(payload): Json<OrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_order = prepare_order(&state.db, payload).await?;

    let order = state
        .db
        .orders()
        .create(user.id, &new_order)
        .await
        .db_err("Failed to create order")?;

    info!(user = %user.uuid, order = %order.uuid, amount = order.amount, "Order created");
    Ok(Json(OrderResource::from(order)))
}

async fn show_order(
    State(state): State<OrdersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = find_visible(&state.db, &user, &uuid).await?;
    Ok(Json(OrderResource::from(order)))
}

async fn update_order(
    State(state): State<OrdersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<OrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = find_visible(&state.db, &user, &uuid).await?;
    let new_order = prepare_order(&state.db, payload).await?;

    let updated = state
        .db
        .orders()
        .update(order.id, &new_order)
        .await
        .db_err("Failed to update order")?;
    if !updated {
        return Err(ApiError::not_found("Order not found"));
    }

    let order = state
        .db
        .orders()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get order")?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    info!(user = %user.uuid, order = %order.uuid, "Order updated");
    Ok(Json(OrderResource::from(order)))
}

async fn delete_order(
    State(state): State<OrdersState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = find_visible(&state.db, &user, &uuid).await?;

    let deleted = state
        .db
        .orders()
        .delete(order.id)
        .await
        .db_err("Failed to delete order")?;
    if !deleted {
        return Err(ApiError::not_found("Order not found"));
    }

    info!(user = %user.uuid, order = %order.uuid, "Order deleted");
    Ok(Json(SuccessResponse { success: true }))
}
