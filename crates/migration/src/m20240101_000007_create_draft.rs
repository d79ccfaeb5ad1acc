//! Create `draft` table (in-progress booking wizard state, keyed by session).
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Draft::Table)
                    .if_not_exists()
                    .col(uuid(Draft::Id).primary_key())
                    .col(string_len(Draft::SessionId, 128).not_null())
                    .col(uuid_null(Draft::CustomerId))
                    .col(integer(Draft::CurrentStep).not_null())
                    .col(uuid_null(Draft::VehicleId))
                    .col(date_null(Draft::PreferredDate))
                    .col(uuid_null(Draft::BranchId))
                    .col(uuid_null(Draft::PrimaryServiceId))
                    .col(uuid_null(Draft::BayId))
                    .col(time_null(Draft::SlotTime))
                    .col(string_len(Draft::Status, 16).not_null())
                    .col(timestamp_with_time_zone(Draft::ExpiresAt).not_null())
                    .col(timestamp_with_time_zone(Draft::LastActivityAt).not_null())
                    .col(timestamp_with_time_zone(Draft::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Draft::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draft_branch")
                            .from(Draft::Table, Draft::BranchId)
                            .to(Branch::Table, Branch::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draft_primary_service")
                            .from(Draft::Table, Draft::PrimaryServiceId)
                            .to(ServiceType::Table, ServiceType::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draft_bay")
                            .from(Draft::Table, Draft::BayId)
                            .to(Bay::Table, Bay::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Draft::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Draft {
    Table,
    Id,
    SessionId,
    CustomerId,
    CurrentStep,
    VehicleId,
    PreferredDate,
    BranchId,
    PrimaryServiceId,
    BayId,
    SlotTime,
    Status,
    ExpiresAt,
    LastActivityAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Branch { Table, Id }

#[derive(DeriveIden)]
enum ServiceType { Table, Id }

#[derive(DeriveIden)]
enum Bay { Table, Id }
