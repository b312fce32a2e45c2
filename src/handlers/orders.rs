use super::common::{created_response, success_response, Created, ReasonBody};
use crate::{
    auth::AuthUser,
    entities::{
        order_tracking_event,
        types::{PaymentModel, Region},
    },
    services::{
        orders::{
            CreateOrderRequest, OrderDetails, OrderFilter, OrderItemInput, OrderPage,
            TrackingEventRequest, UpdateOrderRequest,
        },
        pricing::PriceBreakdown,
    },
    ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// Price preview without placing an order
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub region: Region,
    pub payment_model: PaymentModel,
    pub items: Vec<OrderItemInput>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<OrderPage> {
    let page = state.services.orders.list_orders(&user, filter).await?;
    Ok(success_response(page))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.get_order(&user, id).await?;
    Ok(success_response(order))
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Created<OrderDetails> {
    let order = state.services.orders.create_order(&user, payload).await?;
    Ok(created_response(order))
}

pub async fn quote(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<QuoteRequest>,
) -> ApiResult<PriceBreakdown> {
    let pricing = state.services.orders.calculate_pricing(
        &payload.items,
        payload.region,
        payload.payment_model,
    )?;
    Ok(success_response(pricing))
}

pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.update_order(&user, id, payload).await?;
    Ok(success_response(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<OrderDetails> {
    let reason = body.and_then(|Json(body)| body.reason);
    let order = state.services.orders.cancel_order(&user, id, reason).await?;
    Ok(success_response(order))
}

pub async fn add_tracking_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingEventRequest>,
) -> Created<order_tracking_event::Model> {
    let event = state
        .services
        .orders
        .add_tracking_event(&user, id, payload)
        .await?;
    Ok(created_response(event))
}
