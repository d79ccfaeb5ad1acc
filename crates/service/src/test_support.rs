#![cfg(test)]
use chrono::NaiveDate;
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;
use uuid::Uuid;

use models::{bay, booking, branch, db, service_type};

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<()> = OnceCell::const_new();

pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    MIGRATED
        .get_or_init(|| async {
            let db = db::connect().await.expect("connect db for migration");
            migration::Migrator::up(&db, None).await.expect("migrate up");
            drop(db);
        })
        .await;
    Ok(db::connect().await?)
}

/// Fresh branch with one active bay working `start_hour..end_hour`.
pub async fn seed_bay(
    db: &DatabaseConnection,
    start_hour: i32,
    end_hour: i32,
) -> Result<(branch::Model, bay::Model), anyhow::Error> {
    let br = branch::create(db, &format!("branch_{}", Uuid::new_v4())).await?;
    let b = bay::create(db, br.id, "bay-a", start_hour, end_hour).await?;
    Ok((br, b))
}

pub async fn seed_booking(
    db: &DatabaseConnection,
    branch: &branch::Model,
    bay_id: Option<Uuid>,
    date: NaiveDate,
    estimated_minutes: Option<i32>,
    item_count: i32,
) -> Result<booking::Model, anyhow::Error> {
    let bk = booking::create(
        db,
        branch.id,
        bay_id,
        Some(Uuid::new_v4()),
        date,
        estimated_minutes,
        item_count,
    )
    .await?;
    Ok(bk)
}

pub async fn seed_service(
    db: &DatabaseConnection,
    minutes: i32,
) -> Result<service_type::Model, anyhow::Error> {
    let s = service_type::create(db, &format!("svc_{}", Uuid::new_v4()), minutes).await?;
    Ok(s)
}
