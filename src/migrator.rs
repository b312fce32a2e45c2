use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_warehouse_tables::Migration),
            Box::new(m20250101_000002_create_inventory_ledger_tables::Migration),
            Box::new(m20250101_000003_create_order_tables::Migration),
            Box::new(m20250101_000004_create_auth_tables::Migration),
            Box::new(m20250101_000005_create_compliance_tables::Migration),
            Box::new(m20250101_000006_create_audit_log_table::Migration),
        ]
    }
}

mod m20250101_000001_create_warehouse_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_warehouse_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Warehouses::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Region).string().not_null())
                        .col(ColumnDef::new(Warehouses::Address).string().null())
                        .col(ColumnDef::new(Warehouses::Capacity).integer().not_null())
                        .col(ColumnDef::new(Warehouses::Status).string().not_null())
                        .col(ColumnDef::new(Warehouses::Timezone).string().not_null())
                        .col(ColumnDef::new(Warehouses::Currency).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouses_region")
                        .table(Warehouses::Table)
                        .col(Warehouses::Region)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseInventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseInventory::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WarehouseInventory::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(WarehouseInventory::ProductId).string().not_null())
                        .col(ColumnDef::new(WarehouseInventory::ProductName).string().not_null())
                        .col(ColumnDef::new(WarehouseInventory::ProductType).string().not_null())
                        .col(
                            ColumnDef::new(WarehouseInventory::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::ReservedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::MinStockLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::MaxStockLevel)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::UnitCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(WarehouseInventory::Location).string().null())
                        .col(
                            ColumnDef::new(WarehouseInventory::LastMovementAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warehouse_inventory_warehouse_id")
                                .from(WarehouseInventory::Table, WarehouseInventory::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_warehouse_inventory_warehouse_product")
                        .table(WarehouseInventory::Table)
                        .col(WarehouseInventory::WarehouseId)
                        .col(WarehouseInventory::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseStaff::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(WarehouseStaff::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(WarehouseStaff::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(WarehouseStaff::Name).string().not_null())
                        .col(ColumnDef::new(WarehouseStaff::Email).string().not_null())
                        .col(ColumnDef::new(WarehouseStaff::Role).string().not_null())
                        .col(ColumnDef::new(WarehouseStaff::Shift).string().null())
                        .col(
                            ColumnDef::new(WarehouseStaff::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(WarehouseStaff::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseStaff::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warehouse_staff_warehouse_id")
                                .from(WarehouseStaff::Table, WarehouseStaff::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseOperations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseOperations::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WarehouseOperations::WarehouseId).uuid().not_null())
                        .col(
                            ColumnDef::new(WarehouseOperations::OperationType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseOperations::Status).string().not_null())
                        .col(ColumnDef::new(WarehouseOperations::AssignedStaffId).uuid().null())
                        .col(
                            ColumnDef::new(WarehouseOperations::ScheduledAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::StartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOperations::ItemsProcessed)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(WarehouseOperations::Notes).string().null())
                        .col(
                            ColumnDef::new(WarehouseOperations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseOperations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseStaff::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseInventory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        Region,
        Address,
        Capacity,
        Status,
        Timezone,
        Currency,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseInventory {
        Table,
        Id,
        WarehouseId,
        ProductId,
        ProductName,
        ProductType,
        Quantity,
        ReservedQuantity,
        MinStockLevel,
        MaxStockLevel,
        ReorderPoint,
        UnitCost,
        Location,
        LastMovementAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseStaff {
        Table,
        Id,
        WarehouseId,
        Name,
        Email,
        Role,
        Shift,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseOperations {
        Table,
        Id,
        WarehouseId,
        OperationType,
        Status,
        AssignedStaffId,
        ScheduledAt,
        StartedAt,
        CompletedAt,
        ItemsProcessed,
        Notes,
        CreatedAt,
    }
}

mod m20250101_000002_create_inventory_ledger_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_inventory_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryMovements::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryMovements::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(InventoryMovements::ProductId).string().not_null())
                        .col(
                            ColumnDef::new(InventoryMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::AdjustmentType).string().null())
                        .col(
                            ColumnDef::new(InventoryMovements::QuantityDelta)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryMovements::NewQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::Reason).string().null())
                        .col(ColumnDef::new(InventoryMovements::ReferenceId).uuid().null())
                        .col(ColumnDef::new(InventoryMovements::PerformedBy).uuid().null())
                        .col(
                            ColumnDef::new(InventoryMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_movements_item")
                        .table(InventoryMovements::Table)
                        .col(InventoryMovements::WarehouseId)
                        .col(InventoryMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryAlerts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(InventoryAlerts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(InventoryAlerts::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(InventoryAlerts::ProductId).string().not_null())
                        .col(ColumnDef::new(InventoryAlerts::AlertType).string().not_null())
                        .col(ColumnDef::new(InventoryAlerts::Severity).string().not_null())
                        .col(ColumnDef::new(InventoryAlerts::Message).string().not_null())
                        .col(
                            ColumnDef::new(InventoryAlerts::CurrentQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryAlerts::Threshold).integer().not_null())
                        .col(ColumnDef::new(InventoryAlerts::Status).string().not_null())
                        .col(ColumnDef::new(InventoryAlerts::AcknowledgedBy).uuid().null())
                        .col(
                            ColumnDef::new(InventoryAlerts::AcknowledgedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryAlerts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_alerts_status")
                        .table(InventoryAlerts::Table)
                        .col(InventoryAlerts::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryTransfers::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::FromWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::ToWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryTransfers::ProductId).string().not_null())
                        .col(ColumnDef::new(InventoryTransfers::Quantity).integer().not_null())
                        .col(ColumnDef::new(InventoryTransfers::Status).string().not_null())
                        .col(ColumnDef::new(InventoryTransfers::Reason).string().null())
                        .col(ColumnDef::new(InventoryTransfers::RequestedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransfers::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryTransfers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryAlerts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryMovements {
        Table,
        Id,
        WarehouseId,
        ProductId,
        MovementType,
        AdjustmentType,
        QuantityDelta,
        PreviousQuantity,
        NewQuantity,
        Reason,
        ReferenceId,
        PerformedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryAlerts {
        Table,
        Id,
        WarehouseId,
        ProductId,
        AlertType,
        Severity,
        Message,
        CurrentQuantity,
        Threshold,
        Status,
        AcknowledgedBy,
        AcknowledgedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryTransfers {
        Table,
        Id,
        FromWarehouseId,
        ToWarehouseId,
        ProductId,
        Quantity,
        Status,
        Reason,
        RequestedBy,
        CreatedAt,
        UpdatedAt,
        CompletedAt,
    }
}

mod m20250101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Region).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(Orders::DiscountPercent).decimal().not_null())
                        .col(ColumnDef::new(Orders::DiscountAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::TaxAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::ShippingAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal().not_null())
                        .col(ColumnDef::new(Orders::PaymentModel).string().not_null())
                        .col(ColumnDef::new(Orders::DepositAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::BalanceDue).decimal().not_null())
                        .col(ColumnDef::new(Orders::BalanceDueDate).date().null())
                        .col(ColumnDef::new(Orders::ShippingAddress).string().null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(ColumnDef::new(Orders::TrackingNumber).string().null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).string().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::LineTotal).decimal().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderTrackingEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderTrackingEvents::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderTrackingEvents::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderTrackingEvents::Status).string().not_null())
                        .col(
                            ColumnDef::new(OrderTrackingEvents::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderTrackingEvents::Location).string().null())
                        .col(ColumnDef::new(OrderTrackingEvents::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(OrderTrackingEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_tracking_events_order_id")
                                .from(OrderTrackingEvents::Table, OrderTrackingEvents::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderTrackingEvents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        WarehouseId,
        Region,
        Status,
        Currency,
        Subtotal,
        DiscountPercent,
        DiscountAmount,
        TaxAmount,
        ShippingAmount,
        Total,
        PaymentModel,
        DepositAmount,
        BalanceDue,
        BalanceDueDate,
        ShippingAddress,
        Notes,
        TrackingNumber,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        DeliveredAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum OrderTrackingEvents {
        Table,
        Id,
        OrderId,
        Status,
        Description,
        Location,
        CreatedBy,
        CreatedAt,
    }
}

mod m20250101_000004_create_auth_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_auth_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RhySuppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RhySuppliers::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(RhySuppliers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(RhySuppliers::PasswordHash).string().not_null())
                        .col(ColumnDef::new(RhySuppliers::CompanyName).string().not_null())
                        .col(ColumnDef::new(RhySuppliers::ContactName).string().not_null())
                        .col(ColumnDef::new(RhySuppliers::Role).string().not_null())
                        .col(ColumnDef::new(RhySuppliers::Status).string().not_null())
                        .col(ColumnDef::new(RhySuppliers::Regions).string().not_null())
                        .col(
                            ColumnDef::new(RhySuppliers::Certifications)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::MfaEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::FailedLoginAttempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::LockedUntil)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RhySuppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RhySessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RhySessions::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(RhySessions::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(RhySessions::IpAddress).string().null())
                        .col(ColumnDef::new(RhySessions::UserAgent).string().null())
                        .col(
                            ColumnDef::new(RhySessions::Revoked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RhySessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RhySessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RhySessions::LastSeenAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rhy_sessions_supplier_id")
                                .from(RhySessions::Table, RhySessions::SupplierId)
                                .to(RhySuppliers::Table, RhySuppliers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RhyRefreshTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RhyRefreshTokens::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RhyRefreshTokens::SessionId).uuid().not_null())
                        .col(ColumnDef::new(RhyRefreshTokens::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(RhyRefreshTokens::TokenHash)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(RhyRefreshTokens::Used)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RhyRefreshTokens::Revoked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RhyRefreshTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RhyRefreshTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rhy_refresh_tokens_session_id")
                                .from(RhyRefreshTokens::Table, RhyRefreshTokens::SessionId)
                                .to(RhySessions::Table, RhySessions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RhyMfa::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RhyMfa::SupplierId).uuid().not_null().primary_key())
                        .col(ColumnDef::new(RhyMfa::Secret).string().not_null())
                        .col(
                            ColumnDef::new(RhyMfa::Enabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(RhyMfa::BackupCodes).text().not_null())
                        .col(ColumnDef::new(RhyMfa::LastUsedStep).big_integer().null())
                        .col(
                            ColumnDef::new(RhyMfa::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RhyMfa::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rhy_mfa_supplier_id")
                                .from(RhyMfa::Table, RhyMfa::SupplierId)
                                .to(RhySuppliers::Table, RhySuppliers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RhyMfa::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RhyRefreshTokens::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RhySessions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RhySuppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RhySuppliers {
        Table,
        Id,
        Email,
        PasswordHash,
        CompanyName,
        ContactName,
        Role,
        Status,
        Regions,
        Certifications,
        MfaEnabled,
        FailedLoginAttempts,
        LockedUntil,
        LastLoginAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RhySessions {
        Table,
        Id,
        SupplierId,
        IpAddress,
        UserAgent,
        Revoked,
        CreatedAt,
        ExpiresAt,
        LastSeenAt,
    }

    #[derive(DeriveIden)]
    enum RhyRefreshTokens {
        Table,
        Id,
        SessionId,
        SupplierId,
        TokenHash,
        Used,
        Revoked,
        CreatedAt,
        ExpiresAt,
    }

    #[derive(DeriveIden)]
    enum RhyMfa {
        Table,
        SupplierId,
        Secret,
        Enabled,
        BackupCodes,
        LastUsedStep,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_compliance_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_compliance_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ComplianceChecks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ComplianceChecks::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ComplianceChecks::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(ComplianceChecks::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(ComplianceChecks::Region).string().not_null())
                        .col(ColumnDef::new(ComplianceChecks::Operation).string().not_null())
                        .col(ColumnDef::new(ComplianceChecks::ProductType).string().not_null())
                        .col(ColumnDef::new(ComplianceChecks::Quantity).integer().null())
                        .col(ColumnDef::new(ComplianceChecks::Compliant).boolean().not_null())
                        .col(ColumnDef::new(ComplianceChecks::RiskLevel).string().not_null())
                        .col(
                            ColumnDef::new(ComplianceChecks::ViolationCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ComplianceChecks::NextReviewAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ComplianceChecks::CheckedBy).uuid().null())
                        .col(
                            ColumnDef::new(ComplianceChecks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ComplianceViolations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ComplianceViolations::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ComplianceViolations::CheckId).uuid().not_null())
                        .col(ColumnDef::new(ComplianceViolations::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(ComplianceViolations::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(ComplianceViolations::Region).string().not_null())
                        .col(ColumnDef::new(ComplianceViolations::RuleCode).string().not_null())
                        .col(
                            ColumnDef::new(ComplianceViolations::Regulation)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ComplianceViolations::Severity).string().not_null())
                        .col(
                            ColumnDef::new(ComplianceViolations::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ComplianceViolations::Remediation)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ComplianceViolations::Status).string().not_null())
                        .col(ColumnDef::new(ComplianceViolations::ResolvedBy).uuid().null())
                        .col(
                            ColumnDef::new(ComplianceViolations::ResolvedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ComplianceViolations::ResolutionNotes)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ComplianceViolations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_compliance_violations_check_id")
                                .from(ComplianceViolations::Table, ComplianceViolations::CheckId)
                                .to(ComplianceChecks::Table, ComplianceChecks::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ComplianceViolations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ComplianceChecks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ComplianceChecks {
        Table,
        Id,
        SupplierId,
        WarehouseId,
        Region,
        Operation,
        ProductType,
        Quantity,
        Compliant,
        RiskLevel,
        ViolationCount,
        NextReviewAt,
        CheckedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ComplianceViolations {
        Table,
        Id,
        CheckId,
        SupplierId,
        WarehouseId,
        Region,
        RuleCode,
        Regulation,
        Severity,
        Description,
        Remediation,
        Status,
        ResolvedBy,
        ResolvedAt,
        ResolutionNotes,
        CreatedAt,
    }
}

mod m20250101_000006_create_audit_log_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_audit_log_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogEntries::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AuditLogEntries::ActorId).uuid().null())
                        .col(ColumnDef::new(AuditLogEntries::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogEntries::ResourceType).string().not_null())
                        .col(ColumnDef::new(AuditLogEntries::ResourceId).string().null())
                        .col(ColumnDef::new(AuditLogEntries::Region).string().null())
                        .col(ColumnDef::new(AuditLogEntries::Outcome).string().not_null())
                        .col(ColumnDef::new(AuditLogEntries::IpAddress).string().null())
                        .col(ColumnDef::new(AuditLogEntries::RequestId).string().null())
                        .col(ColumnDef::new(AuditLogEntries::Details).text().null())
                        .col(
                            ColumnDef::new(AuditLogEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_log_entries_created_at")
                        .table(AuditLogEntries::Table)
                        .col(AuditLogEntries::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogEntries {
        Table,
        Id,
        ActorId,
        Action,
        ResourceType,
        ResourceId,
        Region,
        Outcome,
        IpAddress,
        RequestId,
        Details,
        CreatedAt,
    }
}
