#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use flexvolt_ops::{
    auth::{hash_password, permissions_for_role, AuthUser, ClientContext, LoginRequest},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{
        supplier::{self, join_list},
        types::{ProductType, Region, SupplierRole, SupplierStatus},
        warehouse,
    },
    events::{self, EventSender},
    services::{
        inventory_dashboard::{InventoryItemView, NewInventoryItem},
        warehouses::CreateWarehouseRequest,
    },
    AppState,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str =
    "test-secret-for-integration-runs-only-0123456789abcdefghijklmnopqrstuvwxyz";
pub const PASSWORD: &str = "Sup3r-Secure-Pass!";

/// Application state on a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "test".to_string(),
        );
        customize(&mut cfg);

        let pool = db::establish_connection_with_config(&DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(rx));
        let state = AppState::new(Arc::new(pool), cfg, Arc::new(EventSender::new(tx)));
        let router = flexvolt_ops::app(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Insert an active supplier and return the caller identity for it.
    pub async fn seed_actor(
        &self,
        role: SupplierRole,
        regions: &[Region],
        certifications: &[&str],
    ) -> AuthUser {
        let supplier = self
            .seed_supplier(
                &format!("{}@flexvolt.test", Uuid::new_v4().simple()),
                role,
                regions,
                certifications,
            )
            .await;
        AuthUser {
            supplier_id: supplier.id,
            email: supplier.email,
            role,
            regions: regions.to_vec(),
            permissions: permissions_for_role(role),
            session_id: Uuid::new_v4(),
        }
    }

    pub async fn seed_supplier(
        &self,
        email: &str,
        role: SupplierRole,
        regions: &[Region],
        certifications: &[&str],
    ) -> supplier::Model {
        let now = Utc::now();
        supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_lowercase()),
            password_hash: Set(hash_password(PASSWORD).expect("hash")),
            company_name: Set("Acme Battery Supply".to_string()),
            contact_name: Set("Test Contact".to_string()),
            role: Set(role.as_str().to_string()),
            status: Set(SupplierStatus::Active.as_str().to_string()),
            regions: Set(join_list(regions.iter().map(Region::as_str))),
            certifications: Set(join_list(certifications.iter())),
            mfa_enabled: Set(false),
            failed_login_attempts: Set(0),
            locked_until: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("insert supplier")
    }

    /// Log in through the service and return the access token.
    pub async fn login(&self, email: &str) -> String {
        self.state
            .services
            .auth
            .login(
                LoginRequest {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    mfa_code: None,
                },
                ClientContext::default(),
            )
            .await
            .expect("login")
            .tokens
            .access_token
    }

    pub async fn warehouse(
        &self,
        actor: &AuthUser,
        code: &str,
        region: Region,
        capacity: i32,
    ) -> warehouse::Model {
        self.state
            .services
            .warehouses
            .create_warehouse(
                actor,
                CreateWarehouseRequest {
                    code: code.to_string(),
                    name: format!("{} distribution center", code),
                    region,
                    address: None,
                    capacity,
                    timezone: None,
                },
            )
            .await
            .expect("create warehouse")
    }

    /// Stock a FlexVolt pack with min 50, max 500, reorder point 100.
    pub async fn stock(
        &self,
        actor: &AuthUser,
        warehouse_id: Uuid,
        product_id: &str,
        quantity: i32,
    ) -> InventoryItemView {
        self.state
            .services
            .inventory
            .add_inventory_item(
                actor,
                NewInventoryItem {
                    warehouse_id,
                    product_id: product_id.to_string(),
                    product_name: format!("FlexVolt {}", product_id),
                    product_type: ProductType::LithiumIon,
                    quantity,
                    min_stock_level: 50,
                    max_stock_level: 500,
                    reorder_point: 100,
                    unit_cost: dec!(95.00),
                    location: None,
                },
            )
            .await
            .expect("stock item")
    }

    /// Send a request through the full router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Like [`TestApp::send`], decoding the body as JSON (or a JSON string
    /// when it is not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn body_json(response: Response) -> Value {
    let text = body_text(response).await;
    if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }
}

pub fn actor_without_account(role: SupplierRole, regions: &[Region]) -> AuthUser {
    AuthUser {
        supplier_id: Uuid::new_v4(),
        email: "nobody@flexvolt.test".to_string(),
        role,
        regions: regions.to_vec(),
        permissions: permissions_for_role(role),
        session_id: Uuid::new_v4(),
    }
}
