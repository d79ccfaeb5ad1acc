//! Create `booking` table.
//!
//! The queue and calendar only read duration/items/bay off a booking; the
//! wider booking workflow owns the rest of its lifecycle.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::BranchId).not_null())
                    .col(uuid_null(Booking::BayId))
                    .col(uuid_null(Booking::VehicleId))
                    .col(date(Booking::BookingDate).not_null())
                    .col(integer_null(Booking::EstimatedMinutes))
                    .col(integer(Booking::ItemCount).not_null())
                    .col(string_len(Booking::Status, 16).not_null())
                    .col(timestamp_with_time_zone(Booking::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Booking::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_branch")
                            .from(Booking::Table, Booking::BranchId)
                            .to(Branch::Table, Branch::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_bay")
                            .from(Booking::Table, Booking::BayId)
                            .to(Bay::Table, Bay::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Booking::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Booking {
    Table,
    Id,
    BranchId,
    BayId,
    VehicleId,
    BookingDate,
    EstimatedMinutes,
    ItemCount,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Branch { Table, Id }

#[derive(DeriveIden)]
enum Bay { Table, Id }
