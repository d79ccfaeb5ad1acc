use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{bay, branch, service_type};

/// In-progress booking wizard state, owned by a session with a soft customer
/// linkage used only to enforce the single-active-draft rule.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "draft")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: String,
    pub customer_id: Option<Uuid>,
    pub current_step: i32,
    pub vehicle_id: Option<Uuid>,
    pub preferred_date: Option<Date>,
    pub branch_id: Option<Uuid>,
    pub primary_service_id: Option<Uuid>,
    pub bay_id: Option<Uuid>,
    pub slot_time: Option<Time>,
    pub status: DraftStatus,
    pub expires_at: DateTimeWithTimeZone,
    pub last_activity_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// `InProgress -> Completed` on booking creation, `InProgress -> Abandoned`
/// via explicit call, superseding draft, or the TTL sweep. Both terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DraftStatus {
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "abandoned")]
    Abandoned,
}

impl DraftStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DraftStatus::Completed | DraftStatus::Abandoned)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Branch,
    PrimaryService,
    Bay,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Branch => Entity::belongs_to(branch::Entity)
                .from(Column::BranchId)
                .to(branch::Column::Id)
                .into(),
            Relation::PrimaryService => Entity::belongs_to(service_type::Entity)
                .from(Column::PrimaryServiceId)
                .to(service_type::Column::Id)
                .into(),
            Relation::Bay => Entity::belongs_to(bay::Entity)
                .from(Column::BayId)
                .to(bay::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
