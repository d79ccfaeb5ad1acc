use chrono::Utc;
use sea_orm::{entity::prelude::*, ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors;

/// Catalog entry for a bookable service (oil change, inspection, ...).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_type")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub estimated_minutes: i32,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("no relations defined")
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_estimated_minutes(minutes: i32) -> Result<(), errors::ModelError> {
    if minutes <= 0 {
        return Err(errors::ModelError::Validation("estimated_minutes must be > 0".into()));
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    name: &str,
    estimated_minutes: i32,
) -> Result<Model, errors::ModelError> {
    validate_estimated_minutes(estimated_minutes)?;
    if name.trim().is_empty() {
        return Err(errors::ModelError::Validation("service name must not be empty".into()));
    }
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        estimated_minutes: Set(estimated_minutes),
        active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}
