mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_text, TestApp, PASSWORD};
use flexvolt_ops::entities::types::{Region, SupplierRole};
use serde_json::json;

async fn manager_token(app: &TestApp) -> String {
    app.seed_supplier(
        "manager@flexvolt.test",
        SupplierRole::WarehouseManager,
        &[Region::UsWest],
        &[],
    )
    .await;
    app.login("manager@flexvolt.test").await
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, _) = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/health/detailed", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["details"]["database"].is_object());
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;

    let response = app.send(Method::GET, "/api/v1/status", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/warehouses", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app
        .request(Method::GET, "/api/v1/warehouses", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_over_http_then_use_the_token() {
    let app = TestApp::new().await;
    app.seed_supplier(
        "manager@flexvolt.test",
        SupplierRole::WarehouseManager,
        &[Region::UsWest],
        &[],
    )
    .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "manager@flexvolt.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string();
    assert!(body["data"]["refresh_token"].is_string());
    assert!(body["data"]["supplier"].get("password_hash").is_none());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/warehouses",
            Some(&token),
            Some(json!({
                "code": "lax-1",
                "name": "Los Angeles DC",
                "region": "US_WEST",
                "capacity": 20000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["code"], "LAX-1");
    assert_eq!(body["data"]["currency"], "USD");

    let (status, body) = app
        .request(Method::GET, "/api/v1/warehouses", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["supplier"]["email"], "manager@flexvolt.test");
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@flexvolt.test", "password": "Wrong-Password-99" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn viewers_cannot_write() {
    let app = TestApp::new().await;
    app.seed_supplier("viewer@flexvolt.test", SupplierRole::Viewer, &[Region::UsWest], &[])
        .await;
    let token = app.login("viewer@flexvolt.test").await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/warehouses", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/warehouses",
            Some(&token),
            Some(json!({
                "code": "LAX-2",
                "name": "Overflow",
                "region": "US_WEST",
                "capacity": 100
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().expect("message").contains("warehouses:manage"));
}

#[tokio::test]
async fn region_scope_is_enforced_over_http() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/warehouses",
            Some(&token),
            Some(json!({
                "code": "TYO-1",
                "name": "Tokyo DC",
                "region": "JAPAN",
                "capacity": 5000
            })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quote_prices_without_creating_an_order() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/quote",
            Some(&token),
            Some(json!({
                "region": "US_WEST",
                "payment_model": "FULL",
                "items": [{ "product_id": "FV-9AH", "quantity": 2, "unit_price": "149.00" }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currency"], "USD");
    assert_eq!(body["data"]["discount_percent"], "0");

    let (_, listed) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(listed["data"]["total"], 0);
}

#[tokio::test]
async fn out_of_range_unit_price_is_a_bad_request() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/quote",
            Some(&token),
            Some(json!({
                "region": "US_WEST",
                "payment_model": "FULL",
                "items": [{
                    "product_id": "FV-9AH",
                    "quantity": 2,
                    "unit_price": "79228162514264337593543950335"
                }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().expect("message").contains("unit price"));
}

#[tokio::test]
async fn insufficient_stock_maps_to_422() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;
    let admin = app.seed_actor(SupplierRole::Admin, &[], &[]).await;
    let wh = app.warehouse(&admin, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&admin, wh.id, "FV-9AH", 5).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "warehouse_id": wh.id,
                "payment_model": "FULL",
                "items": [{ "product_id": "FV-9AH", "quantity": 50, "unit_price": "149.00" }]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn csv_reports_download_as_attachments() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;
    let admin = app.seed_actor(SupplierRole::Admin, &[], &[]).await;
    let wh = app.warehouse(&admin, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&admin, wh.id, "FV-9AH", 120).await;

    let response = app
        .send(
            Method::POST,
            "/api/v1/reports",
            Some(&token),
            Some(json!({ "report_type": "INVENTORY", "format": "CSV" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE]
        .to_str()
        .expect("content type")
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("disposition")
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"inventory-"));

    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert!(lines.next().expect("header row").contains("product_id"));
    assert!(lines.next().expect("data row").contains("FV-9AH"));
}

#[tokio::test]
async fn audit_log_is_queryable_over_http() {
    let app = TestApp::new().await;
    let token = manager_token(&app).await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/audit?action=auth.login",
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["outcome"], "SUCCESS");
}
