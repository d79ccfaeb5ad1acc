use chrono::Utc;
use sea_orm::{entity::prelude::*, ActiveModelTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{branch, errors};

/// A service bay. The working-hour bounds drive slot calendar generation;
/// hours are whole local hours, `working_start_hour < working_end_hour`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bay")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub working_start_hour: i32,
    pub working_end_hour: i32,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Branch,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Branch => Entity::belongs_to(branch::Entity)
                .from(Column::BranchId)
                .to(branch::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Hours must fit the time grid: slots end at `end_hour:00`, so 23 is the
/// latest representable closing hour.
pub fn validate_working_hours(start_hour: i32, end_hour: i32) -> Result<(), errors::ModelError> {
    if !(0..=22).contains(&start_hour) || !(1..=23).contains(&end_hour) {
        return Err(errors::ModelError::Validation(
            "working hours must fall within 0..=23".into(),
        ));
    }
    if start_hour >= end_hour {
        return Err(errors::ModelError::Validation(
            "working_start_hour must be before working_end_hour".into(),
        ));
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    branch_id: Uuid,
    name: &str,
    start_hour: i32,
    end_hour: i32,
) -> Result<Model, errors::ModelError> {
    validate_working_hours(start_hour, end_hour)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        branch_id: Set(branch_id),
        name: Set(name.to_string()),
        working_start_hour: Set(start_hour),
        working_end_hour: Set(end_hour),
        active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

/// Active bays of a branch, in stable name order.
pub async fn find_active_by_branch(
    db: &DatabaseConnection,
    branch_id: Uuid,
) -> Result<Vec<Model>, errors::ModelError> {
    Entity::find()
        .filter(Column::BranchId.eq(branch_id))
        .filter(Column::Active.eq(true))
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_shop_hours() {
        assert!(validate_working_hours(8, 18).is_ok());
        assert!(validate_working_hours(0, 23).is_ok());
    }

    #[test]
    fn rejects_inverted_or_out_of_range_hours() {
        assert!(validate_working_hours(18, 8).is_err());
        assert!(validate_working_hours(9, 9).is_err());
        assert!(validate_working_hours(-1, 10).is_err());
        assert!(validate_working_hours(8, 24).is_err());
    }
}
