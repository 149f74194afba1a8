mod admin;
mod error;
mod listing;
mod orders;
mod users;

use axum::Router;

use crate::auth::Guard;
use crate::db::Database;

pub use error::ApiError;
pub use listing::Paginated;
pub use orders::OrderResource;
pub use users::UserResource;

/// Create the API router.
pub fn create_api_router(db: Database, guard: Guard) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        guard: guard.clone(),
    };

    let admin_state = admin::AdminState {
        db: db.clone(),
        guard: guard.clone(),
    };

    let orders_state = orders::OrdersState { db, guard };

    Router::new()
        .nest("/user", users::router(users_state))
        .nest("/admin", admin::router(admin_state))
        .nest("/order", orders::router(orders_state))
}
