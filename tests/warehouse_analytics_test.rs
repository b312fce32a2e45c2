mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use flexvolt_ops::{
    entities::types::{OperationStatus, OperationType, Region, Severity, StaffRole, SupplierRole},
    errors::ServiceError,
    services::{
        analytics::AnalyticsScope,
        warehouses::{NewStaffMember, ScheduleOperationRequest},
    },
};
use rust_decimal_macros::dec;

fn picker() -> NewStaffMember {
    NewStaffMember {
        name: "Lee Chen".to_string(),
        email: "lee@flexvolt.test".to_string(),
        role: StaffRole::Operator,
        shift: Some("night".to_string()),
    }
}

#[tokio::test]
async fn operations_run_through_their_lifecycle() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let warehouses = &app.state.services.warehouses;
    let staff = warehouses
        .add_staff(&manager, wh.id, picker())
        .await
        .expect("staff");

    let operation = warehouses
        .schedule_operation(
            &manager,
            wh.id,
            ScheduleOperationRequest {
                operation_type: OperationType::Picking,
                scheduled_at: Utc::now() + Duration::hours(2),
                assigned_staff_id: Some(staff.id),
                notes: None,
            },
        )
        .await
        .expect("schedule");
    assert_eq!(operation.status, "SCHEDULED");

    // cannot finish what never started
    let err = warehouses
        .complete_operation(&manager, operation.id, 10)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let started = warehouses
        .start_operation(&manager, operation.id)
        .await
        .expect("start");
    assert!(started.started_at.is_some());
    let done = warehouses
        .complete_operation(&manager, operation.id, 120)
        .await
        .expect("complete");
    assert_eq!(done.status, "COMPLETED");
    assert_eq!(done.items_processed, 120);

    let err = warehouses
        .cancel_operation(&manager, operation.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let completed = warehouses
        .list_operations(&manager, wh.id, Some(OperationStatus::Completed))
        .await
        .expect("list");
    assert_eq!(completed.len(), 1);

    let metrics = warehouses
        .warehouse_metrics(&manager, wh.id)
        .await
        .expect("metrics");
    assert_eq!(metrics.items_processed, 120);
    assert_eq!(metrics.active_staff, 1);
    assert_eq!(metrics.staff_by_role["OPERATOR"], 1);
    assert_eq!(metrics.operations_by_status["COMPLETED"], 1);
}

#[tokio::test]
async fn staff_from_another_warehouse_cannot_be_assigned() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let lax = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let sfo = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    let warehouses = &app.state.services.warehouses;
    let staff = warehouses
        .add_staff(&manager, sfo.id, picker())
        .await
        .expect("staff");

    let err = warehouses
        .schedule_operation(
            &manager,
            lax.id,
            ScheduleOperationRequest {
                operation_type: OperationType::Receiving,
                scheduled_at: Utc::now(),
                assigned_staff_id: Some(staff.id),
                notes: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn utilization_tracks_units_against_capacity() {
    let app = TestApp::new().await;
    let admin = app.seed_actor(SupplierRole::Admin, &[], &[]).await;
    let lax = app.warehouse(&admin, "LAX-1", Region::UsWest, 1_000).await;
    let sfo = app.warehouse(&admin, "SFO-1", Region::UsWest, 3_000).await;
    let tyo = app.warehouse(&admin, "TYO-1", Region::Japan, 2_000).await;
    app.stock(&admin, lax.id, "FV-9AH", 250).await;
    app.stock(&admin, sfo.id, "FV-9AH", 150).await;
    app.stock(&admin, tyo.id, "FV-9AH", 100).await;
    let warehouses = &app.state.services.warehouses;

    let metrics = warehouses
        .warehouse_metrics(&admin, lax.id)
        .await
        .expect("metrics");
    assert_eq!(metrics.utilization, dec!(0.25));
    assert_eq!(metrics.total_units, 250);
    assert_eq!(metrics.inventory_value, dec!(23750.00));

    let overview = warehouses.network_overview(&admin).await.expect("overview");
    let us = overview
        .iter()
        .find(|r| r.region == Region::UsWest)
        .expect("US_WEST row");
    assert_eq!(us.warehouses, 2);
    assert_eq!(us.capacity, 4_000);
    assert_eq!(us.total_units, 400);
    assert_eq!(us.utilization, dec!(0.1));

    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::Japan], &[])
        .await;
    let scoped = warehouses
        .network_overview(&manager)
        .await
        .expect("overview");
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].region, Region::Japan);
}

#[tokio::test]
async fn inventory_metrics_count_stock_states() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 200).await;
    app.stock(&manager, wh.id, "FV-12AH", 20).await;
    app.stock(&manager, wh.id, "FV-6AH", 0).await;
    app.stock(&manager, wh.id, "FV-3AH", 800).await;

    let metrics = app
        .state
        .services
        .analytics
        .inventory_metrics(&manager, AnalyticsScope::default())
        .await
        .expect("metrics");

    assert_eq!(metrics.total_skus, 4);
    assert_eq!(metrics.total_units, 1020);
    assert_eq!(metrics.in_stock_items, 1);
    assert_eq!(metrics.low_stock_items, 1);
    assert_eq!(metrics.out_of_stock_items, 1);
    assert_eq!(metrics.overstock_items, 1);
    assert_eq!(metrics.stock_out_rate, 25.0);
}

#[tokio::test]
async fn analytics_results_are_cached_per_scope() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 200).await;
    let analytics = &app.state.services.analytics;

    let first = analytics
        .inventory_metrics(&manager, AnalyticsScope::default())
        .await
        .expect("metrics");
    assert_eq!(analytics.cache().len(), 1);

    app.stock(&manager, wh.id, "FV-12AH", 100).await;
    let cached = analytics
        .inventory_metrics(&manager, AnalyticsScope::default())
        .await
        .expect("metrics");
    assert_eq!(cached, first);

    analytics.cache().invalidate_all();
    let fresh = analytics
        .inventory_metrics(&manager, AnalyticsScope::default())
        .await
        .expect("metrics");
    assert_eq!(fresh.total_skus, 2);
}

#[tokio::test]
async fn forecast_horizon_must_be_positive() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;

    let err = app
        .state
        .services
        .analytics
        .demand_forecast(&manager, AnalyticsScope::default(), 0)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn analytics_outside_region_scope_is_forbidden() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;

    let err = app
        .state
        .services
        .analytics
        .order_metrics(
            &manager,
            AnalyticsScope {
                region: Some(Region::Japan),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn reorders_top_up_items_at_or_below_reorder_point() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let wh = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    app.stock(&manager, wh.id, "FV-9AH", 60).await;
    app.stock(&manager, wh.id, "FV-12AH", 300).await;

    let recommendations = app
        .state
        .services
        .optimization
        .reorder_recommendations(&manager, AnalyticsScope::default())
        .await
        .expect("recommendations");

    assert_eq!(recommendations.len(), 1);
    let rec = &recommendations[0];
    assert_eq!(rec.product_id, "FV-9AH");
    assert_eq!(rec.recommended_quantity, 440);
    assert_eq!(rec.estimated_cost, dec!(41800.00));
    assert_eq!(rec.days_of_cover, None);
    assert_eq!(rec.priority, Severity::Low);
}

#[tokio::test]
async fn rebalancing_moves_surplus_to_deficit() {
    let app = TestApp::new().await;
    let manager = app
        .seed_actor(SupplierRole::WarehouseManager, &[Region::UsWest], &[])
        .await;
    let lax = app.warehouse(&manager, "LAX-1", Region::UsWest, 10_000).await;
    let sfo = app.warehouse(&manager, "SFO-1", Region::UsWest, 10_000).await;
    app.stock(&manager, lax.id, "FV-9AH", 700).await;
    app.stock(&manager, sfo.id, "FV-9AH", 20).await;

    let suggestions = app
        .state
        .services
        .optimization
        .rebalancing_suggestions(&manager, AnalyticsScope::default())
        .await
        .expect("suggestions");

    assert_eq!(suggestions.len(), 1);
    let move_ = &suggestions[0];
    assert_eq!(move_.from_warehouse_id, lax.id);
    assert_eq!(move_.to_warehouse_id, sfo.id);
    assert_eq!(move_.quantity, 30);
    assert!(move_.same_region);
}
