//! Create `branch` table.
//!
//! Root reference entity; bays and bookings hang off it.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Branch::Table)
                    .if_not_exists()
                    .col(uuid(Branch::Id).primary_key())
                    .col(string_len(Branch::Name, 128).not_null())
                    .col(boolean(Branch::Active).not_null())
                    .col(timestamp_with_time_zone(Branch::CreatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Branch::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Branch { Table, Id, Name, Active, CreatedAt }
