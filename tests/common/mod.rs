#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use storefront_auth::{
    ServerConfig,
    auth::{Guard, JwtService, password::hash_password},
    clock::ManualClock,
    create_app,
    db::{Database, NewUser, OrderStatus, Payment, Product, User},
    jwt::JwtConfig,
};

/// Fixed start time for every test (2023-11-14 22:13:20 UTC).
pub const T0: u64 = 1_700_000_000;
pub const SECRET: &[u8] = b"test-jwt-secret-with-at-least-32-bytes";
pub const ISSUER: &str = "http://localhost";
pub const TTL_MINUTES: u32 = 60;
pub const PASSWORD: &str = "correct horse battery";

pub fn ttl() -> NonZeroU32 {
    NonZeroU32::new(TTL_MINUTES).unwrap()
}

pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub service: JwtService,
    pub guard: Guard,
}

/// App, service and guard sharing one in-memory database and one manual clock.
pub async fn setup() -> TestContext {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let clock = Arc::new(ManualClock::new(T0));

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: SECRET.to_vec(),
        app_url: ISSUER.to_string(),
        ttl_minutes: ttl(),
        clock: clock.clone(),
    };
    let app = create_app(&config);

    let service = JwtService::new(
        db.clone(),
        JwtConfig::new(SECRET),
        clock.clone(),
        ISSUER,
        ttl(),
    );
    let guard = Guard::new(service.clone(), db.clone());

    TestContext {
        app,
        db,
        clock,
        service,
        guard,
    }
}

/// Insert a user whose password is [`PASSWORD`].
pub async fn create_user(db: &Database, email: &str, admin: bool) -> User {
    let hash = hash_password(PASSWORD).expect("Failed to hash password");
    let mut new_user =
        NewUser::new("Test", "User", email, &hash).contact("1 Test Street", "555-0100");
    if admin {
        new_user = new_user.admin();
    }
    db.users()
        .create(&new_user)
        .await
        .expect("Failed to create user")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Reference rows an order needs, with two products priced 40 and 300.
pub struct Catalog {
    pub status: OrderStatus,
    pub shipped: OrderStatus,
    pub payment: Payment,
    pub lamp: Product,
    pub desk: Product,
}

pub async fn seed_catalog(db: &Database) -> Catalog {
    let catalog = db.catalog();
    Catalog {
        status: catalog.create_status("open").await.unwrap(),
        shipped: catalog.create_status("shipped").await.unwrap(),
        payment: catalog.create_payment("credit_card").await.unwrap(),
        lamp: catalog.create_product("Lamp", 40.0).await.unwrap(),
        desk: catalog.create_product("Desk", 300.0).await.unwrap(),
    }
}

pub fn authed_json_request(
    method: &str,
    uri: &str,
    authorization: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
