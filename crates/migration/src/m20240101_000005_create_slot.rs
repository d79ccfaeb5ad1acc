//! Create `slot` table.
//!
//! One row per fixed-width calendar cell of a bay/day. Generation purges and
//! re-inserts a day in bulk; afterwards rows only change status.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Slot::Table)
                    .if_not_exists()
                    .col(uuid(Slot::Id).primary_key())
                    .col(uuid(Slot::BayId).not_null())
                    .col(date(Slot::SlotDate).not_null())
                    .col(time(Slot::StartTime).not_null())
                    .col(time(Slot::EndTime).not_null())
                    .col(string_len(Slot::Status, 16).not_null())
                    .col(uuid_null(Slot::BookingId))
                    .col(time_null(Slot::ActualEndTime))
                    .col(string_len_null(Slot::CancelReason, 256))
                    .col(timestamp_with_time_zone(Slot::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Slot::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_slot_bay")
                            .from(Slot::Table, Slot::BayId)
                            .to(Bay::Table, Bay::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_slot_booking")
                            .from(Slot::Table, Slot::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Slot::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Slot {
    Table,
    Id,
    BayId,
    SlotDate,
    StartTime,
    EndTime,
    Status,
    BookingId,
    ActualEndTime,
    CancelReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Bay { Table, Id }

#[derive(DeriveIden)]
enum Booking { Table, Id }
