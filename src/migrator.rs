use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_cart_tables::Migration),
            Box::new(m20240301_000003_create_order_tables::Migration),
            Box::new(m20240301_000004_create_payments_table::Migration),
        ]
    }
}

mod m20240301_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let money = |col: Products| {
                ColumnDef::new(col)
                    .decimal()
                    .not_null()
                    .default(0)
                    .to_owned()
            };

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Slug).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Unit1).string_len(50).not_null())
                        .col(ColumnDef::new(Products::Unit2).string_len(50).not_null())
                        .col(ColumnDef::new(Products::Unit3).string_len(50).not_null())
                        .col(ColumnDef::new(Products::Conversion1).integer().not_null().default(1))
                        .col(ColumnDef::new(Products::Conversion2).integer().not_null().default(1))
                        .col(ColumnDef::new(Products::Conversion3).integer().not_null().default(1))
                        .col(&mut money(Products::CostPrice1))
                        .col(&mut money(Products::CostPrice2))
                        .col(&mut money(Products::CostPrice3))
                        .col(&mut money(Products::BulkPrice1))
                        .col(&mut money(Products::BulkPrice2))
                        .col(&mut money(Products::BulkPrice3))
                        .col(&mut money(Products::RetailPrice1))
                        .col(&mut money(Products::RetailPrice2))
                        .col(&mut money(Products::RetailPrice3))
                        .col(ColumnDef::new(Products::Stock).integer().not_null().default(0))
                        .col(ColumnDef::new(Products::Supplier).string().null())
                        .col(ColumnDef::new(Products::Categories).string().not_null())
                        .col(&mut money(Products::Price))
                        .col(
                            ColumnDef::new(Products::Weight)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::ShortDescription).string().null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Status).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_stock")
                        .table(Products::Table)
                        .col(Products::Stock)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    pub enum Products {
        Table,
        Id,
        Name,
        Sku,
        Slug,
        #[sea_orm(iden = "unit_1")]
        Unit1,
        #[sea_orm(iden = "unit_2")]
        Unit2,
        #[sea_orm(iden = "unit_3")]
        Unit3,
        #[sea_orm(iden = "conversion_1")]
        Conversion1,
        #[sea_orm(iden = "conversion_2")]
        Conversion2,
        #[sea_orm(iden = "conversion_3")]
        Conversion3,
        #[sea_orm(iden = "cost_price_1")]
        CostPrice1,
        #[sea_orm(iden = "cost_price_2")]
        CostPrice2,
        #[sea_orm(iden = "cost_price_3")]
        CostPrice3,
        #[sea_orm(iden = "bulk_price_1")]
        BulkPrice1,
        #[sea_orm(iden = "bulk_price_2")]
        BulkPrice2,
        #[sea_orm(iden = "bulk_price_3")]
        BulkPrice3,
        #[sea_orm(iden = "retail_price_1")]
        RetailPrice1,
        #[sea_orm(iden = "retail_price_2")]
        RetailPrice2,
        #[sea_orm(iden = "retail_price_3")]
        RetailPrice3,
        Stock,
        Supplier,
        Categories,
        Price,
        Weight,
        ShortDescription,
        Description,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_cart_tables {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::BaseTotalPrice).decimal().not_null())
                        .col(ColumnDef::new(Carts::TaxAmount).decimal().not_null())
                        .col(ColumnDef::new(Carts::TaxPercent).decimal().not_null())
                        .col(ColumnDef::new(Carts::DiscountAmount).decimal().not_null())
                        .col(ColumnDef::new(Carts::DiscountPercent).decimal().not_null())
                        .col(ColumnDef::new(Carts::GrandTotal).decimal().not_null())
                        .col(ColumnDef::new(Carts::TotalWeight).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Qty).integer().not_null())
                        .col(ColumnDef::new(CartItems::Unit).string_len(50).not_null())
                        .col(ColumnDef::new(CartItems::BasePrice).decimal().not_null())
                        .col(ColumnDef::new(CartItems::BaseTotal).decimal().not_null())
                        .col(ColumnDef::new(CartItems::TaxAmount).decimal().not_null())
                        .col(ColumnDef::new(CartItems::TaxPercent).decimal().not_null())
                        .col(
                            ColumnDef::new(CartItems::DiscountAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::DiscountPercent)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::SubTotal).decimal().not_null())
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart_id")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_product_id")
                                .from(CartItems::Table, CartItems::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_cart_items_cart_id")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        BaseTotalPrice,
        TaxAmount,
        TaxPercent,
        DiscountAmount,
        DiscountPercent,
        GrandTotal,
        TotalWeight,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        CartId,
        ProductId,
        Qty,
        Unit,
        BasePrice,
        BaseTotal,
        TaxAmount,
        TaxPercent,
        DiscountAmount,
        DiscountPercent,
        SubTotal,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_order_tables {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_order_tables"
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
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CartId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Orders::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentDue)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::PaymentStatus).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::PaymentToken).string().null())
                        .col(ColumnDef::new(Orders::BaseTotalPrice).decimal().not_null())
                        .col(ColumnDef::new(Orders::TaxAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::TaxPercent).decimal().not_null())
                        .col(ColumnDef::new(Orders::DiscountAmount).decimal().not_null())
                        .col(
                            ColumnDef::new(Orders::DiscountPercent)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::ShippingCost).decimal().not_null())
                        .col(ColumnDef::new(Orders::GrandTotal).decimal().not_null())
                        .col(ColumnDef::new(Orders::DeliveryMode).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::ShippingCourier).string().not_null())
                        .col(ColumnDef::new(Orders::ShippingServiceName).string().not_null())
                        .col(ColumnDef::new(Orders::Note).text().null())
                        .col(ColumnDef::new(Orders::CourierStatus).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::TrackingId).string().null())
                        .col(ColumnDef::new(Orders::WaybillId).string().null())
                        .col(ColumnDef::new(Orders::CourierError).text().null())
                        .col(ColumnDef::new(Orders::CourierRequest).json().null())
                        .col(ColumnDef::new(Orders::PaidAt).timestamp_with_time_zone().null())
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
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_courier_status")
                        .table(Orders::Table)
                        .col(Orders::CourierStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Qty).integer().not_null())
                        .col(ColumnDef::new(OrderItems::Unit).string_len(50).not_null())
                        .col(ColumnDef::new(OrderItems::BasePrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::BaseTotal).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::TaxAmount).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::TaxPercent).decimal().not_null())
                        .col(
                            ColumnDef::new(OrderItems::DiscountAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::DiscountPercent)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::SubTotal).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Sku).string().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Weight).decimal().not_null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product_id")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderCustomers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderCustomers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderCustomers::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(OrderCustomers::FirstName).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::LastName).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::CityId).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::ProvinceId).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::Address1).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::Address2).string().null())
                        .col(ColumnDef::new(OrderCustomers::Phone).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::Email).string().not_null())
                        .col(ColumnDef::new(OrderCustomers::PostCode).string().not_null())
                        .col(
                            ColumnDef::new(OrderCustomers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_customers_order_id")
                                .from(OrderCustomers::Table, OrderCustomers::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderCustomers::Table).to_owned())
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
    pub enum Orders {
        Table,
        Id,
        CartId,
        Status,
        OrderDate,
        PaymentDue,
        PaymentStatus,
        PaymentToken,
        BaseTotalPrice,
        TaxAmount,
        TaxPercent,
        DiscountAmount,
        DiscountPercent,
        ShippingCost,
        GrandTotal,
        DeliveryMode,
        ShippingCourier,
        ShippingServiceName,
        Note,
        CourierStatus,
        TrackingId,
        WaybillId,
        CourierError,
        CourierRequest,
        PaidAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Qty,
        Unit,
        BasePrice,
        BaseTotal,
        TaxAmount,
        TaxPercent,
        DiscountAmount,
        DiscountPercent,
        SubTotal,
        Sku,
        Name,
        Weight,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderCustomers {
        Table,
        Id,
        OrderId,
        FirstName,
        LastName,
        CityId,
        ProvinceId,
        Address1,
        Address2,
        Phone,
        Email,
        PostCode,
        CreatedAt,
    }
}

mod m20240301_000004_create_payments_table {
    use super::m20240301_000003_create_order_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::TransactionId).string().not_null())
                        .col(ColumnDef::new(Payments::TransactionStatus).string().not_null())
                        .col(ColumnDef::new(Payments::FraudStatus).string().null())
                        .col(ColumnDef::new(Payments::PaymentType).string().not_null())
                        .col(ColumnDef::new(Payments::StatusCode).string_len(10).not_null())
                        .col(ColumnDef::new(Payments::Payload).json().not_null())
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order_id")
                                .from(Payments::Table, Payments::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_order_id")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        Amount,
        TransactionId,
        TransactionStatus,
        FraudStatus,
        PaymentType,
        StatusCode,
        Payload,
        CreatedAt,
    }
}
