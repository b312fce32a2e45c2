pub mod analytics;
pub mod audit;
pub mod compliance;
pub mod inventory_dashboard;
pub mod optimization;
pub mod orders;
pub mod pricing;
pub mod reports;
pub mod stock;
pub mod warehouses;
