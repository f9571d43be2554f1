use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Products::Sku).string().not_null())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Uom).string().not_null())
                    .col(
                        ColumnDef::new(Products::Tracking)
                            .string_len(16)
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Descriptive slab attributes are nullable; most lots only carry a subset.
        manager
            .create_table(
                Table::create()
                    .table(StockLots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StockLots::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(StockLots::Name).string().not_null())
                    .col(ColumnDef::new(StockLots::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockLots::Block).string().null())
                    .col(ColumnDef::new(StockLots::CustomsPermit).string().null())
                    .col(ColumnDef::new(StockLots::Thickness).string().null())
                    .col(ColumnDef::new(StockLots::Height).decimal_len(19, 4).null())
                    .col(ColumnDef::new(StockLots::Width).decimal_len(19, 4).null())
                    .col(ColumnDef::new(StockLots::Weight).decimal_len(19, 4).null())
                    .col(ColumnDef::new(StockLots::SlabNumber).integer().null())
                    .col(ColumnDef::new(StockLots::Bundle).string().null())
                    .col(ColumnDef::new(StockLots::Color).string().null())
                    .col(ColumnDef::new(StockLots::Kind).string().null())
                    .col(ColumnDef::new(StockLots::Details).text().null())
                    .col(ColumnDef::new(StockLots::Container).string().null())
                    .col(ColumnDef::new(StockLots::Origin).string().null())
                    .col(ColumnDef::new(StockLots::Supplier).string().null())
                    .col(
                        ColumnDef::new(StockLots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_lots_product")
                            .from(StockLots::Table, StockLots::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockPickings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockPickings::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockPickings::Name).string().not_null())
                    .col(
                        ColumnDef::new(StockPickings::PickingType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockPickings::State).string_len(16).not_null())
                    .col(ColumnDef::new(StockPickings::LocationId).uuid().not_null())
                    .col(ColumnDef::new(StockPickings::LocationDestId).uuid().not_null())
                    .col(ColumnDef::new(StockPickings::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(StockPickings::ReturnOfId).uuid().null())
                    .col(
                        ColumnDef::new(StockPickings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockPickings::DateDone)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockMoves::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StockMoves::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(StockMoves::PickingId).uuid().not_null())
                    .col(ColumnDef::new(StockMoves::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockMoves::ProductUom).string().not_null())
                    .col(
                        ColumnDef::new(StockMoves::Quantity)
                            .decimal_len(19, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(StockMoves::State).string_len(16).not_null())
                    .col(ColumnDef::new(StockMoves::LocationId).uuid().not_null())
                    .col(ColumnDef::new(StockMoves::LocationDestId).uuid().not_null())
                    .col(ColumnDef::new(StockMoves::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(StockMoves::OriginReturnedMoveId).uuid().null())
                    .col(
                        ColumnDef::new(StockMoves::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_moves_picking")
                            .from(StockMoves::Table, StockMoves::PickingId)
                            .to(StockPickings::Table, StockPickings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_moves_origin_returned")
                    .table(StockMoves::Table)
                    .col(StockMoves::OriginReturnedMoveId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockMoveLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMoveLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMoveLines::MoveId).uuid().not_null())
                    .col(ColumnDef::new(StockMoveLines::PickingId).uuid().not_null())
                    .col(ColumnDef::new(StockMoveLines::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockMoveLines::ProductUom).string().not_null())
                    .col(ColumnDef::new(StockMoveLines::LotId).uuid().null())
                    .col(
                        ColumnDef::new(StockMoveLines::Quantity)
                            .decimal_len(19, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockMoveLines::State)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMoveLines::LocationId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMoveLines::LocationDestId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMoveLines::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMoveLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_move_lines_move")
                            .from(StockMoveLines::Table, StockMoveLines::MoveId)
                            .to(StockMoves::Table, StockMoves::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_move_lines_move")
                    .table(StockMoveLines::Table)
                    .col(StockMoveLines::MoveId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockMoveLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockMoves::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockPickings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockLots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Sku,
    Name,
    Uom,
    Tracking,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StockLots {
    Table,
    Id,
    Name,
    ProductId,
    Block,
    CustomsPermit,
    Thickness,
    Height,
    Width,
    Weight,
    SlabNumber,
    Bundle,
    Color,
    Kind,
    Details,
    Container,
    Origin,
    Supplier,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StockPickings {
    Table,
    Id,
    Name,
    PickingType,
    State,
    LocationId,
    LocationDestId,
    CompanyId,
    ReturnOfId,
    CreatedAt,
    DateDone,
}

#[derive(DeriveIden)]
enum StockMoves {
    Table,
    Id,
    PickingId,
    ProductId,
    ProductUom,
    Quantity,
    State,
    LocationId,
    LocationDestId,
    CompanyId,
    OriginReturnedMoveId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StockMoveLines {
    Table,
    Id,
    MoveId,
    PickingId,
    ProductId,
    ProductUom,
    LotId,
    Quantity,
    State,
    LocationId,
    LocationDestId,
    CompanyId,
    CreatedAt,
}
