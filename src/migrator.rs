use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_directory_tables::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_order_tables::Migration),
            Box::new(m20240301_000004_create_commission_statements_table::Migration),
        ]
    }
}

/// Schools, students and the four account tables, plus login codes.
mod m20240301_000001_create_directory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Schools::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Schools::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Schools::Name).string().not_null())
                        .col(
                            ColumnDef::new(Schools::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Schools::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Students::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Students::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Students::SchoolId).uuid().not_null())
                        .col(ColumnDef::new(Students::Name).string().not_null())
                        .col(ColumnDef::new(Students::Enrollment).string().not_null())
                        .col(ColumnDef::new(Students::Grade).string_len(50).not_null())
                        .col(ColumnDef::new(Students::Gender).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Students::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Students::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_students_school_id")
                                .from(Students::Table, Students::SchoolId)
                                .to(Schools::Table, Schools::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_students_school_id")
                        .table(Students::Table)
                        .col(Students::SchoolId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Guardians::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Guardians::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Guardians::Name).string().not_null())
                        .col(
                            ColumnDef::new(Guardians::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Guardians::Phone).string().null())
                        .col(ColumnDef::new(Guardians::StudentId).uuid().null())
                        .col(
                            ColumnDef::new(Guardians::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Guardians::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_guardians_student_id")
                                .from(Guardians::Table, Guardians::StudentId)
                                .to(Students::Table, Students::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Suppliers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Suppliers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::TaxId).string().null())
                        .col(
                            ColumnDef::new(Suppliers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SchoolManagers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SchoolManagers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SchoolManagers::Name).string().not_null())
                        .col(
                            ColumnDef::new(SchoolManagers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SchoolManagers::Phone).string().null())
                        .col(ColumnDef::new(SchoolManagers::SchoolId).uuid().not_null())
                        .col(
                            ColumnDef::new(SchoolManagers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(SchoolManagers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_school_managers_school_id")
                                .from(SchoolManagers::Table, SchoolManagers::SchoolId)
                                .to(Schools::Table, Schools::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Administrators::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Administrators::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Administrators::Name).string().not_null())
                        .col(
                            ColumnDef::new(Administrators::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Administrators::Phone).string().null())
                        .col(
                            ColumnDef::new(Administrators::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Administrators::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AccessCodes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AccessCodes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AccessCodes::Email).string().not_null())
                        .col(ColumnDef::new(AccessCodes::Code).string_len(16).not_null())
                        .col(ColumnDef::new(AccessCodes::Role).string_len(20).not_null())
                        .col(
                            ColumnDef::new(AccessCodes::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccessCodes::Used)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AccessCodes::CreatedAt)
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
                        .name("idx_access_codes_email")
                        .table(AccessCodes::Table)
                        .col(AccessCodes::Email)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AccessCodes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Administrators::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SchoolManagers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Guardians::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Students::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Schools::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Schools {
        Table,
        Id,
        Name,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Students {
        Table,
        Id,
        SchoolId,
        Name,
        Enrollment,
        Grade,
        Gender,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Guardians {
        Table,
        Id,
        Name,
        Email,
        Phone,
        StudentId,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        TaxId,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SchoolManagers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        SchoolId,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Administrators {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum AccessCodes {
        Table,
        Id,
        Email,
        Code,
        Role,
        ExpiresAt,
        Used,
        CreatedAt,
    }
}

/// Homologations, products, variants and per-grade approvals.
mod m20240301_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Homologations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Homologations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Homologations::SchoolId).uuid().not_null())
                        .col(ColumnDef::new(Homologations::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(Homologations::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Homologations::ApprovedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_homologations_school_id")
                                .from(Homologations::Table, Homologations::SchoolId)
                                .to(Schools::Table, Schools::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_homologations_supplier_id")
                                .from(Homologations::Table, Homologations::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_homologations_school_supplier")
                        .table(Homologations::Table)
                        .col(Homologations::SchoolId)
                        .col(Homologations::SupplierId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
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
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_supplier_id")
                                .from(Products::Table, Products::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_supplier_id")
                        .table(Products::Table)
                        .col(Products::SupplierId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Size).string_len(20).not_null())
                        .col(ColumnDef::new(ProductVariants::Color).string_len(50).not_null())
                        .col(ColumnDef::new(ProductVariants::Gender).string_len(20).not_null())
                        .col(
                            ColumnDef::new(ProductVariants::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(ProductVariants::StockQuantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_variants_product_id")
                                .from(ProductVariants::Table, ProductVariants::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_product_variants_attributes")
                        .table(ProductVariants::Table)
                        .col(ProductVariants::ProductId)
                        .col(ProductVariants::Size)
                        .col(ProductVariants::Color)
                        .col(ProductVariants::Gender)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductApprovals::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductApprovals::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductApprovals::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductApprovals::SchoolId).uuid().not_null())
                        .col(ColumnDef::new(ProductApprovals::Grade).string_len(50).not_null())
                        .col(
                            ColumnDef::new(ProductApprovals::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_approvals_product_id")
                                .from(ProductApprovals::Table, ProductApprovals::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_approvals_school_id")
                                .from(ProductApprovals::Table, ProductApprovals::SchoolId)
                                .to(Schools::Table, Schools::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_product_approvals_product_school_grade")
                        .table(ProductApprovals::Table)
                        .col(ProductApprovals::ProductId)
                        .col(ProductApprovals::SchoolId)
                        .col(ProductApprovals::Grade)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductApprovals::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Homologations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Schools {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Homologations {
        Table,
        Id,
        SchoolId,
        SupplierId,
        Active,
        ApprovedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        SupplierId,
        Name,
        Description,
        Price,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        Size,
        Color,
        Gender,
        StockQuantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductApprovals {
        Table,
        Id,
        ProductId,
        SchoolId,
        Grade,
        CreatedAt,
    }
}

/// Cart lines, orders and their item snapshots.
mod m20240301_000003_create_order_tables {
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
                        .table(CartLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartLines::GuardianId).uuid().not_null())
                        .col(ColumnDef::new(CartLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartLines::VariantId).uuid().not_null())
                        .col(ColumnDef::new(CartLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_lines_guardian_id")
                                .from(CartLines::Table, CartLines::GuardianId)
                                .to(Guardians::Table, Guardians::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_lines_product_id")
                                .from(CartLines::Table, CartLines::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_lines_variant_id")
                                .from(CartLines::Table, CartLines::VariantId)
                                .to(ProductVariants::Table, ProductVariants::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_cart_lines_guardian_product_variant")
                        .table(CartLines::Table)
                        .col(CartLines::GuardianId)
                        .col(CartLines::ProductId)
                        .col(CartLines::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::GuardianId).uuid().not_null())
                        .col(ColumnDef::new(Orders::StudentId).uuid().not_null())
                        .col(ColumnDef::new(Orders::SchoolId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal_len(16, 4).not_null())
                        .col(
                            ColumnDef::new(Orders::Commission)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
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
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_guardian_id")
                                .from(Orders::Table, Orders::GuardianId)
                                .to(Guardians::Table, Guardians::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_student_id")
                                .from(Orders::Table, Orders::StudentId)
                                .to(Students::Table, Students::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_school_id")
                                .from(Orders::Table, Orders::SchoolId)
                                .to(Schools::Table, Schools::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_guardian_id")
                        .table(Orders::Table)
                        .col(Orders::GuardianId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_school_id")
                        .table(Orders::Table)
                        .col(Orders::SchoolId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status_created_at")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::VariantId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Subtotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_supplier_id")
                                .from(OrderItems::Table, OrderItems::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_supplier_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::SupplierId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CartLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Schools {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Students {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Guardians {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum CartLines {
        Table,
        Id,
        GuardianId,
        ProductId,
        VariantId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        GuardianId,
        StudentId,
        SchoolId,
        Total,
        Commission,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        VariantId,
        SupplierId,
        Quantity,
        UnitPrice,
        Subtotal,
    }
}

mod m20240301_000004_create_commission_statements_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_commission_statements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CommissionStatements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CommissionStatements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::SupplierId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::ReferenceMonth)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::TotalSales)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::TotalCommission)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::NetAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(CommissionStatements::PaymentDate).date().null())
                        .col(
                            ColumnDef::new(CommissionStatements::AmountPaid)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionStatements::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_commission_statements_supplier_id")
                                .from(CommissionStatements::Table, CommissionStatements::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_commission_statements_supplier_month")
                        .table(CommissionStatements::Table)
                        .col(CommissionStatements::SupplierId)
                        .col(CommissionStatements::ReferenceMonth)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CommissionStatements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum CommissionStatements {
        Table,
        Id,
        SupplierId,
        ReferenceMonth,
        TotalSales,
        TotalCommission,
        NetAmount,
        Status,
        PaymentDate,
        AmountPaid,
        CreatedAt,
        UpdatedAt,
    }
}
