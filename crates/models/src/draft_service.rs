use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{draft, service_type};

/// Link row: one selected service of a draft. Insertion order (via
/// `created_at`) decides which remaining service becomes primary when the
/// current primary is removed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "draft_service")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub draft_id: Uuid,
    pub service_type_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Draft,
    ServiceType,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Draft => Entity::belongs_to(draft::Entity)
                .from(Column::DraftId)
                .to(draft::Column::Id)
                .into(),
            Relation::ServiceType => Entity::belongs_to(service_type::Entity)
                .from(Column::ServiceTypeId)
                .to(service_type::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
