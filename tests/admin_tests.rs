mod common;

use axum::http::StatusCode;
use common::{
    PASSWORD, TestContext, authed_json_request, authed_request, bearer, body_json, create_user,
    json_request, setup,
};
use serde_json::json;
use storefront_auth::db::User;
use tower::ServiceExt;

async fn admin_header(ctx: &TestContext) -> (User, String) {
    let admin = create_user(&ctx.db, "admin@example.com", true).await;
    let issued = ctx.service.request_token(&admin).await.unwrap();
    (admin, bearer(&issued.token))
}

fn admin_registration() -> serde_json::Value {
    json!({
        "first_name": "Grace",
        "last_name": "Hopper",
        "email": "grace@example.com",
        "password": PASSWORD,
        "avatar": "8a1e2f7c-3b5d-4c6e-9f0a-1b2c3d4e5f60",
        "address": "Arlington",
        "phone_number": "555-0142",
    })
}

fn customer_profile(email: &str) -> serde_json::Value {
    json!({
        "first_name": "Ada",
        "last_name": "King",
        "email": email,
        "password": "reset by an admin",
        "address": "Ockham Park",
        "phone_number": "555-0199",
    })
}

/// Emails of a user listing response, in response order.
fn listed_emails(json: &serde_json::Value) -> Vec<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_create_admin() {
    let ctx = setup().await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/create",
            admin_registration(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["is_admin"], true);
    assert_eq!(json["avatar"], "8a1e2f7c-3b5d-4c6e-9f0a-1b2c3d4e5f60");
    assert!(json["token"].as_str().is_some());

    let stored = ctx
        .db
        .users()
        .get_by_email("grace@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_admin());
}

#[tokio::test]
async fn test_create_admin_requires_avatar() {
    let ctx = setup().await;
    let mut body = admin_registration();
    body.as_object_mut().unwrap().remove("avatar");

    let response = ctx
        .app
        .clone()
        .oneshot(json_request("POST", "/api/v1/admin/create", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "Avatar is required");
    assert!(!ctx.db.users().is_email_taken("grace@example.com").await.unwrap());
}

#[tokio::test]
async fn test_admin_login() {
    let ctx = setup().await;
    create_user(&ctx.db, "admin@example.com", true).await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/login",
            json!({"email": "admin@example.com", "password": PASSWORD}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["type"], "Bearer");

    let token = json["token"].as_str().unwrap();
    let record = ctx.service.validate_token(token, None).await.unwrap();
    assert!(record.user.unwrap().is_admin());
}

#[tokio::test]
async fn test_admin_login_rejects_customers() {
    let ctx = setup().await;
    create_user(&ctx.db, "ada@example.com", false).await;

    for email in ["ada@example.com", "nobody@example.com"] {
        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/admin/login",
                json!({"email": email, "password": PASSWORD}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "User is not an admin");
    }

    // No token was issued for the customer.
    let user = ctx
        .db
        .users()
        .get_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(ctx.db.tokens().list_by_user(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_login_wrong_password() {
    let ctx = setup().await;
    create_user(&ctx.db, "admin@example.com", true).await;

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/login",
            json!({"email": "admin@example.com", "password": "wrong password"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"],
        "Failed to authenticate user"
    );
}

#[tokio::test]
async fn test_user_listing_requires_admin() {
    let ctx = setup().await;
    let customer = create_user(&ctx.db, "ada@example.com", false).await;
    let customer_token = ctx.service.request_token(&customer).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request("GET", "/api/v1/admin/user-listing", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/admin/user-listing",
            Some(&bearer(&customer_token.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Insufficient permissions");
}

#[tokio::test]
async fn test_user_listing_excludes_admins() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    create_user(&ctx.db, "ada@example.com", false).await;
    create_user(&ctx.db, "bob@example.com", false).await;
    create_user(&ctx.db, "second-admin@example.com", true).await;

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/admin/user-listing",
            Some(&header),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let mut emails = listed_emails(&json);
    emails.sort();
    assert_eq!(emails, ["ada@example.com", "bob@example.com"]);
    assert_eq!(json["total"], 2);
    assert_eq!(json["per_page"], 10);
    assert_eq!(json["current_page"], 1);
    assert_eq!(json["last_page"], 1);
}

#[tokio::test]
async fn test_user_listing_paginates_and_sorts() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    for email in ["carol@example.com", "ada@example.com", "bob@example.com"] {
        create_user(&ctx.db, email, false).await;
    }

    let get = |uri: &'static str| {
        let app = ctx.app.clone();
        let header = header.clone();
        async move {
            let response = app
                .oneshot(authed_request("GET", uri, Some(&header)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            body_json(response).await
        }
    };

    let json = get("/api/v1/admin/user-listing?sortBy=email&limit=2").await;
    assert_eq!(listed_emails(&json), ["ada@example.com", "bob@example.com"]);
    assert_eq!(json["total"], 3);
    assert_eq!(json["last_page"], 2);

    let json = get("/api/v1/admin/user-listing?sortBy=email&limit=2&page=2").await;
    assert_eq!(listed_emails(&json), ["carol@example.com"]);

    let json = get("/api/v1/admin/user-listing?sortBy=email&desc=true").await;
    assert_eq!(
        listed_emails(&json),
        ["carol@example.com", "bob@example.com", "ada@example.com"]
    );

    // Unknown sort columns fall back to creation order.
    let json = get("/api/v1/admin/user-listing?sortBy=password").await;
    assert_eq!(
        listed_emails(&json),
        ["carol@example.com", "ada@example.com", "bob@example.com"]
    );
}

#[tokio::test]
async fn test_user_listing_filters() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    create_user(&ctx.db, "ada@example.com", false).await;
    create_user(&ctx.db, "bob@builder.test", false).await;

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/admin/user-listing?email=builder",
            Some(&header),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(listed_emails(&json), ["bob@builder.test"]);
    assert_eq!(json["total"], 1);

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/admin/user-listing?marketing=true",
            Some(&header),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["total"], 0);
}

#[tokio::test]
async fn test_admin_edits_customer() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    let customer = create_user(&ctx.db, "ada@example.com", false).await;

    let uri = format!("/api/v1/admin/user-edit/{}", customer.uuid);
    let response = ctx
        .app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            &uri,
            &header,
            customer_profile("augusta@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["uuid"], customer.uuid.as_str());
    assert_eq!(json["email"], "augusta@example.com");
    assert_eq!(json["is_admin"], false);

    // The password was re-hashed from the submitted value.
    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/user/login",
            json!({"email": "augusta@example.com", "password": "reset by an admin"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = ctx.db.users().get_by_id(customer.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, customer.password_hash);
}

#[tokio::test]
async fn test_admin_cannot_edit_admin() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    let other = create_user(&ctx.db, "other-admin@example.com", true).await;

    let uri = format!("/api/v1/admin/user-edit/{}", other.uuid);
    let response = ctx
        .app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            &uri,
            &header,
            customer_profile("renamed@example.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"],
        "Admin users cannot be edited"
    );
    let stored = ctx.db.users().get_by_id(other.id).await.unwrap().unwrap();
    assert_eq!(stored.email, "other-admin@example.com");
}

#[tokio::test]
async fn test_admin_edit_unknown_user_and_customer_token() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    let customer = create_user(&ctx.db, "ada@example.com", false).await;
    let customer_token = ctx.service.request_token(&customer).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            "/api/v1/admin/user-edit/8a1e2f7c-3b5d-4c6e-9f0a-1b2c3d4e5f60",
            &header,
            customer_profile("augusta@example.com"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/v1/admin/user-edit/{}", customer.uuid);
    let response = ctx
        .app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            &uri,
            &bearer(&customer_token.token),
            customer_profile("augusta@example.com"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_deletes_customer() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;
    let customer = create_user(&ctx.db, "ada@example.com", false).await;
    let customer_token = ctx.service.request_token(&customer).await.unwrap();

    let uri = format!("/api/v1/admin/user-delete/{}", customer.uuid);
    let response = ctx
        .app
        .clone()
        .oneshot(authed_request("DELETE", &uri, Some(&header)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
    assert!(ctx.db.users().get_by_id(customer.id).await.unwrap().is_none());

    // The customer's token is now orphaned and no longer accepted.
    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/user",
            Some(&bearer(&customer_token.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cannot_delete_admin() {
    let ctx = setup().await;
    let (admin, header) = admin_header(&ctx).await;
    let other = create_user(&ctx.db, "other-admin@example.com", true).await;

    for target in [&admin, &other] {
        let uri = format!("/api/v1/admin/user-delete/{}", target.uuid);
        let response = ctx
            .app
            .clone()
            .oneshot(authed_request("DELETE", &uri, Some(&header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    assert!(ctx.db.users().get_by_id(other.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_admin_delete_unknown_or_invalid_uuid() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            "/api/v1/admin/user-delete/8a1e2f7c-3b5d-4c6e-9f0a-1b2c3d4e5f60",
            Some(&header),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            "/api/v1/admin/user-delete/not-a-uuid",
            Some(&header),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_logout() {
    let ctx = setup().await;
    let (_admin, header) = admin_header(&ctx).await;

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request("GET", "/api/v1/admin/logout", Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/v1/admin/user-listing",
            Some(&header),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
