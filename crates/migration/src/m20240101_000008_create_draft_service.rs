//! Create `draft_service` link table (multi-service selection of a draft).
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DraftService::Table)
                    .if_not_exists()
                    .col(uuid(DraftService::Id).primary_key())
                    .col(uuid(DraftService::DraftId).not_null())
                    .col(uuid(DraftService::ServiceTypeId).not_null())
                    .col(timestamp_with_time_zone(DraftService::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draft_service_draft")
                            .from(DraftService::Table, DraftService::DraftId)
                            .to(Draft::Table, Draft::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draft_service_service_type")
                            .from(DraftService::Table, DraftService::ServiceTypeId)
                            .to(ServiceType::Table, ServiceType::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(DraftService::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum DraftService { Table, Id, DraftId, ServiceTypeId, CreatedAt }

#[derive(DeriveIden)]
enum Draft { Table, Id }

#[derive(DeriveIden)]
enum ServiceType { Table, Id }
