//! Create `service_type` table (the service catalog entries a draft selects).
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceType::Table)
                    .if_not_exists()
                    .col(uuid(ServiceType::Id).primary_key())
                    .col(string_len(ServiceType::Name, 128).not_null())
                    .col(integer(ServiceType::EstimatedMinutes).not_null())
                    .col(boolean(ServiceType::Active).not_null())
                    .col(timestamp_with_time_zone(ServiceType::CreatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ServiceType::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ServiceType { Table, Id, Name, EstimatedMinutes, Active, CreatedAt }
