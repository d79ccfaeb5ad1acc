use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{bay, booking};

/// One position in a bay's same-day wait queue.
///
/// Removed entries are deactivated, never hard-deleted. Among the *active*
/// entries of a bay/date, positions are a dense 1..N sequence.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "queue_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bay_id: Uuid,
    pub booking_id: Uuid,
    pub queue_date: Date,
    pub position: i32,
    pub estimated_start: DateTimeWithTimeZone,
    pub estimated_completion: DateTimeWithTimeZone,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Bay,
    Booking,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Bay => Entity::belongs_to(bay::Entity)
                .from(Column::BayId)
                .to(bay::Column::Id)
                .into(),
            Relation::Booking => Entity::belongs_to(booking::Entity)
                .from(Column::BookingId)
                .to(booking::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn construct_model() {
        let now = Utc::now();
        let m = Model {
            id: Uuid::new_v4(),
            bay_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            queue_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            position: 1,
            estimated_start: now.into(),
            estimated_completion: (now + chrono::Duration::minutes(60)).into(),
            active: true,
            created_at: now.into(),
            updated_at: now.into(),
        };
        assert_eq!(m.position, 1);
        assert!(m.active);
        assert!(m.estimated_completion > m.estimated_start);
    }
}
