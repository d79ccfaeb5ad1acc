//! Migrator registering entity-specific migrations in dependency order.
//! Indexes are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_branch;
mod m20240101_000002_create_bay;
mod m20240101_000003_create_service_type;
mod m20240101_000004_create_booking;
mod m20240101_000005_create_slot;
mod m20240101_000006_create_queue_entry;
mod m20240101_000007_create_draft;
mod m20240101_000008_create_draft_service;
mod m20240101_000009_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_branch::Migration),
            Box::new(m20240101_000002_create_bay::Migration),
            Box::new(m20240101_000003_create_service_type::Migration),
            Box::new(m20240101_000004_create_booking::Migration),
            Box::new(m20240101_000005_create_slot::Migration),
            Box::new(m20240101_000006_create_queue_entry::Migration),
            Box::new(m20240101_000007_create_draft::Migration),
            Box::new(m20240101_000008_create_draft_service::Migration),
            // Indexes should always be applied last
            Box::new(m20240101_000009_add_indexes::Migration),
        ]
    }
}
