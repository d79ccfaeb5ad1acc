//! Create `queue_entry` table.
//!
//! Same-day wait list; entries are deactivated, never deleted, so the active
//! flag participates in every uniqueness/ordering query.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueueEntry::Table)
                    .if_not_exists()
                    .col(uuid(QueueEntry::Id).primary_key())
                    .col(uuid(QueueEntry::BayId).not_null())
                    .col(uuid(QueueEntry::BookingId).not_null())
                    .col(date(QueueEntry::QueueDate).not_null())
                    .col(integer(QueueEntry::Position).not_null())
                    .col(timestamp_with_time_zone(QueueEntry::EstimatedStart).not_null())
                    .col(timestamp_with_time_zone(QueueEntry::EstimatedCompletion).not_null())
                    .col(boolean(QueueEntry::Active).not_null())
                    .col(timestamp_with_time_zone(QueueEntry::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(QueueEntry::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entry_bay")
                            .from(QueueEntry::Table, QueueEntry::BayId)
                            .to(Bay::Table, Bay::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entry_booking")
                            .from(QueueEntry::Table, QueueEntry::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(QueueEntry::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum QueueEntry {
    Table,
    Id,
    BayId,
    BookingId,
    QueueDate,
    Position,
    EstimatedStart,
    EstimatedCompletion,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Bay { Table, Id }

#[derive(DeriveIden)]
enum Booking { Table, Id }
