//! Domain enums stored as string columns.
//!
//! Every enum round-trips through its `SCREAMING_SNAKE_CASE` name, both in
//! JSON and in the database, so rows stay readable from plain SQL.

use crate::errors::ServiceError;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Parse a string column into its enum, reporting the column on failure.
pub fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T, ServiceError> {
    T::from_str(value).map_err(|_| {
        ServiceError::InternalError(format!("unexpected value '{}' in column {}", value, column))
    })
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
            Display, EnumString, IntoStaticStr, EnumIter,
        )]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                self.into()
            }
        }
    };
}

string_enum!(
    /// Partition key for inventory, compliance and access control.
    Region { UsWest, Japan, EuGermany, Australia }
);

impl Region {
    /// Sales tax / VAT / GST applied to the discounted subtotal.
    pub fn tax_rate(&self) -> Decimal {
        match self {
            Region::UsWest => dec!(0.0875),
            Region::Japan => dec!(0.10),
            Region::EuGermany => dec!(0.19),
            Region::Australia => dec!(0.10),
        }
    }

    /// Flat freight charge, waived above the free shipping threshold.
    pub fn shipping_fee(&self) -> Decimal {
        match self {
            Region::UsWest => dec!(25.00),
            Region::Japan => dec!(30.00),
            Region::EuGermany => dec!(35.00),
            Region::Australia => dec!(40.00),
        }
    }

    pub fn default_timezone(&self) -> &'static str {
        match self {
            Region::UsWest => "America/Los_Angeles",
            Region::Japan => "Asia/Tokyo",
            Region::EuGermany => "Europe/Berlin",
            Region::Australia => "Australia/Sydney",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Region::UsWest => "USD",
            Region::Japan => "JPY",
            Region::EuGermany => "EUR",
            Region::Australia => "AUD",
        }
    }
}

string_enum!(WarehouseStatus { Active, Maintenance, Inactive });
string_enum!(StockStatus { InStock, LowStock, OutOfStock, Overstock });
string_enum!(AlertType { LowStock, OutOfStock, Overstock });
string_enum!(AlertStatus { Active, Acknowledged, Resolved });
string_enum!(AdjustmentType { Manual, CycleCount, Damage, Receiving, Correction, Return });
string_enum!(MovementType {
    Adjustment,
    Reservation,
    ReservationRelease,
    TransferOut,
    TransferIn,
    OrderShipment,
});
string_enum!(TransferStatus { Pending, Completed, Cancelled });
string_enum!(StaffRole { Manager, Supervisor, Operator });
string_enum!(OperationType { Receiving, Picking, Packing, Shipping, CycleCount });
string_enum!(OperationStatus { Scheduled, InProgress, Completed, Cancelled });
string_enum!(PaymentModel { Full, Deposit });
string_enum!(SupplierStatus { Pending, Active, Suspended });
string_enum!(SupplierRole { Admin, WarehouseManager, Supplier, Viewer });
string_enum!(ComplianceOperation { Storage, Receiving, Shipping, Transfer });
string_enum!(ProductType { LithiumIon, NickelMetalHydride, Charger, Accessory });
string_enum!(ViolationStatus { Open, Resolved });
string_enum!(AuditOutcome { Success, Failure });
string_enum!(ReportType { Inventory, Orders, Compliance, Audit });
string_enum!(ReportFormat { Json, Csv });

string_enum!(OrderStatus { Pending, Confirmed, Processing, Shipped, Delivered, Cancelled });

impl OrderStatus {
    /// Delivered and cancelled orders accept no further edits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl OperationStatus {
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (Scheduled, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

/// Severity shared by inventory alerts and compliance findings. Ordered so the
/// highest observed severity can be taken with `max`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Offset from a compliance check to its next scheduled review.
    pub fn review_interval(&self) -> Duration {
        match self {
            Severity::Low => Duration::days(90),
            Severity::Medium => Duration::days(30),
            Severity::High => Duration::days(7),
            Severity::Critical => Duration::days(1),
        }
    }
}

/// Risk level of a compliance check is the highest violation severity.
pub type RiskLevel = Severity;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn region_names_round_trip() {
        for region in Region::iter() {
            let parsed: Region = parse_column(region.as_str(), "region").unwrap();
            assert_eq!(parsed, region);
        }
        assert_eq!(Region::EuGermany.as_str(), "EU_GERMANY");
        assert_eq!(
            serde_json::to_string(&Region::UsWest).unwrap(),
            "\"US_WEST\""
        );
    }

    #[test]
    fn unknown_column_value_is_an_internal_error() {
        let err = parse_column::<Region>("MARS", "region").unwrap_err();
        assert!(matches!(err, ServiceError::InternalError(_)));
    }

    #[test]
    fn order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        for next in OrderStatus::iter() {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn severity_orders_by_risk() {
        assert!(Severity::Critical > Severity::High);
        assert_eq!(
            [Severity::Medium, Severity::Low, Severity::High]
                .into_iter()
                .max(),
            Some(Severity::High)
        );
        assert_eq!(Severity::High.review_interval(), Duration::days(7));
    }
}
