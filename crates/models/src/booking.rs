use chrono::Utc;
use sea_orm::{entity::prelude::*, ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{bay, branch, errors};

/// A confirmed (or pending) workshop visit. The calendar and queue only read
/// duration, item count and bay off this entity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub branch_id: Uuid,
    pub bay_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub booking_date: Date,
    pub estimated_minutes: Option<i32>,
    pub item_count: i32,
    pub status: BookingStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "in_service")]
    InService,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Branch,
    Bay,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Branch => Entity::belongs_to(branch::Entity)
                .from(Column::BranchId)
                .to(branch::Column::Id)
                .into(),
            Relation::Bay => Entity::belongs_to(bay::Entity)
                .from(Column::BayId)
                .to(bay::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fallback duration when a booking carries neither an estimate nor items.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Effective service duration of a booking, in minutes.
/// Preference order: stored estimate, then `item_count * 60`, then the
/// hard default of 60.
pub fn duration_minutes(booking: &Model) -> i64 {
    if let Some(est) = booking.estimated_minutes {
        if est > 0 {
            return i64::from(est);
        }
    }
    if booking.item_count > 0 {
        return i64::from(booking.item_count) * 60;
    }
    DEFAULT_DURATION_MINUTES
}

pub async fn create(
    db: &DatabaseConnection,
    branch_id: Uuid,
    bay_id: Option<Uuid>,
    vehicle_id: Option<Uuid>,
    booking_date: Date,
    estimated_minutes: Option<i32>,
    item_count: i32,
) -> Result<Model, errors::ModelError> {
    if item_count < 0 {
        return Err(errors::ModelError::Validation("item_count must be >= 0".into()));
    }
    if let Some(est) = estimated_minutes {
        if est <= 0 {
            return Err(errors::ModelError::Validation("estimated_minutes must be > 0".into()));
        }
    }
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        branch_id: Set(branch_id),
        bay_id: Set(bay_id),
        vehicle_id: Set(vehicle_id),
        booking_date: Set(booking_date),
        estimated_minutes: Set(estimated_minutes),
        item_count: Set(item_count),
        status: Set(BookingStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<Model>, errors::ModelError> {
    Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}
