//! Database entities. Enumerated columns are stored as their SCREAMING_SNAKE_CASE
//! string form and parsed through [`types`].

pub mod audit_log;
pub mod compliance_check;
pub mod compliance_violation;
pub mod inventory_alert;
pub mod inventory_movement;
pub mod inventory_transfer;
pub mod order;
pub mod order_item;
pub mod order_tracking_event;
pub mod refresh_token;
pub mod session;
pub mod supplier;
pub mod supplier_mfa;
pub mod types;
pub mod warehouse;
pub mod warehouse_inventory;
pub mod warehouse_operation;
pub mod warehouse_staff;
