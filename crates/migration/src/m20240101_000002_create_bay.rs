//! Create `bay` table.
//!
//! A bay carries the working-hours bounds the slot calendar is generated from.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bay::Table)
                    .if_not_exists()
                    .col(uuid(Bay::Id).primary_key())
                    .col(uuid(Bay::BranchId).not_null())
                    .col(string_len(Bay::Name, 64).not_null())
                    .col(integer(Bay::WorkingStartHour).not_null())
                    .col(integer(Bay::WorkingEndHour).not_null())
                    .col(boolean(Bay::Active).not_null())
                    .col(timestamp_with_time_zone(Bay::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bay_branch")
                            .from(Bay::Table, Bay::BranchId)
                            .to(Branch::Table, Branch::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Bay::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Bay { Table, Id, BranchId, Name, WorkingStartHour, WorkingEndHour, Active, CreatedAt }

#[derive(DeriveIden)]
enum Branch { Table, Id }
