use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Slot: one row per bay/date/start cell
        manager
            .create_index(
                Index::create()
                    .name("uniq_slot_cell")
                    .table(Slot::Table)
                    .col(Slot::BayId)
                    .col(Slot::SlotDate)
                    .col(Slot::StartTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // QueueEntry: queue scans are always per bay/date
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entry_bay_date")
                    .table(QueueEntry::Table)
                    .col(QueueEntry::BayId)
                    .col(QueueEntry::QueueDate)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entry_booking")
                    .table(QueueEntry::Table)
                    .col(QueueEntry::BookingId)
                    .to_owned(),
            )
            .await?;

        // Draft: session lookup, single-active-draft check, expiry sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_draft_session")
                    .table(Draft::Table)
                    .col(Draft::SessionId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_draft_customer_status")
                    .table(Draft::Table)
                    .col(Draft::CustomerId)
                    .col(Draft::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_draft_status_expires")
                    .table(Draft::Table)
                    .col(Draft::Status)
                    .col(Draft::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uniq_slot_cell").table(Slot::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_queue_entry_bay_date").table(QueueEntry::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_queue_entry_booking").table(QueueEntry::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_draft_session").table(Draft::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_draft_customer_status").table(Draft::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_draft_status_expires").table(Draft::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Slot { Table, BayId, SlotDate, StartTime }

#[derive(DeriveIden)]
enum QueueEntry { Table, BayId, QueueDate, BookingId }

#[derive(DeriveIden)]
enum Draft { Table, SessionId, CustomerId, Status, ExpiresAt }
