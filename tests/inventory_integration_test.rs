mod common;

use assert_matches::assert_matches;
use common::TestApp;
use flexvolt_ops::{
    entities::{
        inventory_alert,
        types::{
            AdjustmentType, AlertStatus, ProductType, Region, StockStatus, SupplierRole,
            WarehouseStatus,
        },
        warehouse_inventory,
    },
    errors::ServiceError,
    services::inventory_dashboard::{
        AlertFilter, DashboardFilter, NewInventoryItem, TransferRequest, UpdateInventoryRequest,
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

async fn row(app: &TestApp, warehouse_id: Uuid, product_id: &str) -> warehouse_inventory::Model {
    warehouse_inventory::Entity::find()
        .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_inventory::Column::ProductId.eq(product_id))
        .one(app.state.db.as_ref())
        .await
        .expect("query inventory")
        .expect("inventory row")
}

fn set_quantity(warehouse_id: Uuid, product_id: &str, quantity: i32) -> UpdateInventoryRequest {
    UpdateInventoryRequest {
        warehouse_id,
        product_id: product_id.to_string(),
        quantity,
        reason: "cycle count".to_string(),
        adjustment_type: AdjustmentType::CycleCount,
    }
}

#[tokio::test]
async fn drop_below_minimum_raises_one_low_stock_alert() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 150).await;

    let result = app
        .state
        .services
        .inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 30))
        .await
        .expect("update");

    assert_eq!(result.item.item.quantity, 30);
    assert_eq!(result.item.stock_status, StockStatus::LowStock);
    assert_eq!(result.movement.quantity_delta, -120);
    assert_eq!(result.movement.previous_quantity, 150);
    assert_eq!(result.movement.new_quantity, 30);
    assert_eq!(result.alerts.len(), 1);
    assert_eq!(result.alerts[0].alert_type, "LOW_STOCK");
    assert_eq!(result.alerts[0].severity, "HIGH");
    assert_eq!(result.alerts[0].threshold, 50);
}

#[tokio::test]
async fn zero_quantity_raises_low_and_out_of_stock() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 150).await;

    let result = app
        .state
        .services
        .inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 0))
        .await
        .expect("update");

    let mut kinds: Vec<&str> = result.alerts.iter().map(|a| a.alert_type.as_str()).collect();
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["LOW_STOCK", "OUT_OF_STOCK"]);
    assert_eq!(result.item.stock_status, StockStatus::OutOfStock);
}

#[tokio::test]
async fn recovery_resolves_open_alerts() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 150).await;
    let inventory = &app.state.services.inventory;

    inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 30))
        .await
        .expect("drop");
    let recovered = inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 200))
        .await
        .expect("restock");
    assert!(recovered.alerts.is_empty());

    let active = inventory
        .list_alerts(
            &manager,
            AlertFilter {
                warehouse_id: Some(wh.id),
                status: Some(AlertStatus::Active),
            },
        )
        .await
        .expect("alerts");
    assert!(active.is_empty());

    let all = inventory_alert::Entity::find()
        .filter(inventory_alert::Column::WarehouseId.eq(wh.id))
        .all(app.state.db.as_ref())
        .await
        .expect("alerts");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, "RESOLVED");
}

#[tokio::test]
async fn negative_quantity_is_rejected_without_writes() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 150).await;

    let err = app
        .state
        .services
        .inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", -5))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(row(&app, wh.id, "FV-9AH").await.quantity, 150);
}

#[tokio::test]
async fn unit_cost_above_limit_is_rejected() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;

    let err = app
        .state
        .services
        .inventory
        .add_inventory_item(
            &manager,
            NewInventoryItem {
                warehouse_id: wh.id,
                product_id: "FV-9AH".to_string(),
                product_name: "FlexVolt 9Ah".to_string(),
                product_type: ProductType::LithiumIon,
                quantity: 10,
                min_stock_level: 5,
                max_stock_level: 100,
                reorder_point: 10,
                unit_cost: dec!(1000000.01),
                location: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    let count = warehouse_inventory::Entity::find()
        .filter(warehouse_inventory::Column::WarehouseId.eq(wh.id))
        .all(app.state.db.as_ref())
        .await
        .expect("query inventory")
        .len();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn update_outside_assigned_region_is_forbidden() {
    let app = TestApp::new().await;
    let admin = app.seed_actor(SupplierRole::Admin, &[], &[]).await;
    let tokyo = app.warehouse(&admin, "TYO-1", Region::Japan, 5_000).await;
    app.stock(&admin, tokyo.id, "FV-9AH", 150).await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;

    let err = app
        .state
        .services
        .inventory
        .update_inventory(&manager, set_quantity(tokyo.id, "FV-9AH", 10))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;

    let err = app
        .state
        .services
        .inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-NOPE", 10))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn transfer_lifecycle_moves_reserved_units() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let source = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let dest = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, source.id, "FV-9AH", 200).await;
    let inventory = &app.state.services.inventory;

    let transfer = inventory
        .transfer_inventory(
            &manager,
            TransferRequest {
                from_warehouse_id: source.id,
                to_warehouse_id: dest.id,
                product_id: "FV-9AH".to_string(),
                quantity: 80,
                reason: Some("rebalance".to_string()),
            },
        )
        .await
        .expect("transfer");
    assert_eq!(transfer.status, "PENDING");
    let held = row(&app, source.id, "FV-9AH").await;
    assert_eq!((held.quantity, held.reserved_quantity), (200, 80));

    let done = inventory
        .complete_transfer(&manager, transfer.id)
        .await
        .expect("complete");
    assert_eq!(done.status, "COMPLETED");
    assert!(done.completed_at.is_some());

    let after = row(&app, source.id, "FV-9AH").await;
    assert_eq!((after.quantity, after.reserved_quantity), (120, 0));
    let received = row(&app, dest.id, "FV-9AH").await;
    assert_eq!(received.quantity, 80);
    assert_eq!(received.min_stock_level, 50);

    let err = inventory
        .complete_transfer(&manager, transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn racing_complete_and_cancel_settle_once() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let source = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let dest = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, source.id, "FV-9AH", 200).await;
    let inventory = &app.state.services.inventory;
    let transfer = inventory
        .transfer_inventory(
            &manager,
            TransferRequest {
                from_warehouse_id: source.id,
                to_warehouse_id: dest.id,
                product_id: "FV-9AH".to_string(),
                quantity: 80,
                reason: None,
            },
        )
        .await
        .expect("transfer");

    let (first, second, cancelled) = tokio::join!(
        inventory.complete_transfer(&manager, transfer.id),
        inventory.complete_transfer(&manager, transfer.id),
        inventory.cancel_transfer(&manager, transfer.id),
    );

    let outcomes = [first, second, cancelled];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert_matches!(err, ServiceError::InvalidOperation(_));
    }

    let held = row(&app, source.id, "FV-9AH").await;
    assert_eq!(held.reserved_quantity, 0);
    if outcomes[2].is_ok() {
        assert_eq!(held.quantity, 200);
    } else {
        assert_eq!(held.quantity, 120);
        assert_eq!(row(&app, dest.id, "FV-9AH").await.quantity, 80);
    }
}

#[tokio::test]
async fn cancelled_transfer_releases_reservation() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let source = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let dest = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, source.id, "FV-9AH", 200).await;
    let inventory = &app.state.services.inventory;

    let transfer = inventory
        .transfer_inventory(
            &manager,
            TransferRequest {
                from_warehouse_id: source.id,
                to_warehouse_id: dest.id,
                product_id: "FV-9AH".to_string(),
                quantity: 50,
                reason: None,
            },
        )
        .await
        .expect("transfer");
    let cancelled = inventory
        .cancel_transfer(&manager, transfer.id)
        .await
        .expect("cancel");

    assert_eq!(cancelled.status, "CANCELLED");
    let after = row(&app, source.id, "FV-9AH").await;
    assert_eq!((after.quantity, after.reserved_quantity), (200, 0));
}

#[tokio::test]
async fn transfer_beyond_available_stock_fails() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let source = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let dest = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, source.id, "FV-9AH", 40).await;

    let err = app
        .state
        .services
        .inventory
        .transfer_inventory(
            &manager,
            TransferRequest {
                from_warehouse_id: source.id,
                to_warehouse_id: dest.id,
                product_id: "FV-9AH".to_string(),
                quantity: 100,
                reason: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(row(&app, source.id, "FV-9AH").await.reserved_quantity, 0);
}

#[tokio::test]
async fn transfer_to_inactive_warehouse_is_rejected() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let source = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let dest = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, source.id, "FV-9AH", 200).await;
    app.state
        .services
        .warehouses
        .set_status(&manager, dest.id, WarehouseStatus::Maintenance)
        .await
        .expect("status");

    let err = app
        .state
        .services
        .inventory
        .transfer_inventory(
            &manager,
            TransferRequest {
                from_warehouse_id: source.id,
                to_warehouse_id: dest.id,
                product_id: "FV-9AH".to_string(),
                quantity: 10,
                reason: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn dashboard_is_scoped_to_caller_regions() {
    let app = TestApp::new().await;
    let admin = app.seed_actor(SupplierRole::Admin, &[], &[]).await;
    let lax = app.warehouse(&admin, "LAX-1", Region::UsWest, 10_000).await;
    let tyo = app.warehouse(&admin, "TYO-1", Region::Japan, 10_000).await;
    app.stock(&admin, lax.id, "FV-9AH", 150).await;
    app.stock(&admin, tyo.id, "FV-9AH", 20).await;
    let viewer = app
        .seed_actor(SupplierRole::Viewer, &[Region::UsWest], &[])
        .await;

    let dashboard = app
        .state
        .services
        .inventory
        .get_dashboard(&viewer, DashboardFilter::default())
        .await
        .expect("dashboard");
    assert_eq!(dashboard.items.len(), 1);
    assert_eq!(dashboard.items[0].warehouse_code, "LAX-1");
    assert_eq!(dashboard.summary.in_stock, 1);

    let everything = app
        .state
        .services
        .inventory
        .get_dashboard(&admin, DashboardFilter::default())
        .await
        .expect("dashboard");
    assert_eq!(everything.summary.total_items, 2);
    assert_eq!(everything.summary.total_units, 170);
}

#[tokio::test]
async fn movements_record_every_change_newest_first() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 150).await;
    let inventory = &app.state.services.inventory;

    inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 120))
        .await
        .expect("first");
    inventory
        .update_inventory(&manager, set_quantity(wh.id, "FV-9AH", 140))
        .await
        .expect("second");

    let movements = inventory
        .list_movements(&manager, wh.id, Some("FV-9AH".to_string()), None)
        .await
        .expect("movements");
    let deltas: Vec<i32> = movements.iter().map(|m| m.quantity_delta).collect();
    assert_eq!(movements.len(), 2);
    assert!(deltas.contains(&-30));
    assert!(deltas.contains(&20));
    assert!(movements.iter().all(|m| m.movement_type == "ADJUSTMENT"));
}
