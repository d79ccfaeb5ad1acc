use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{bay, booking};

/// One fixed-width time cell in a bay's daily calendar.
///
/// Cells for a bay/day are created in bulk by calendar generation and are
/// never deleted afterwards, only status-transitioned.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slot")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bay_id: Uuid,
    pub slot_date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: SlotStatus,
    pub booking_id: Option<Uuid>,
    pub actual_end_time: Option<Time>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// `Available -> Booked -> InProgress -> Completed`, with `Cancelled`
/// reachable from any non-terminal state. No other transitions are legal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SlotStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "booked")]
    Booked,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SlotStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Cancelled)
    }
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

/// Half-open interval overlap against `[start, end)`.
pub fn overlaps(slot: &Model, start: Time, end: Time) -> bool {
    slot.start_time < end && slot.end_time > start
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn cell(start_h: u32, end_h: u32) -> Model {
        Model {
            id: Uuid::new_v4(),
            bay_id: Uuid::new_v4(),
            slot_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end_h, 0, 0).unwrap(),
            status: SlotStatus::Available,
            booking_id: None,
            actual_end_time: None,
            cancel_reason: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn overlap_is_half_open() {
        let slot = cell(10, 11);
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(overlaps(&slot, t(10), t(11)));
        assert!(overlaps(&slot, t(9), t(11)));
        assert!(!overlaps(&slot, t(11), t(12)));
        assert!(!overlaps(&slot, t(9), t(10)));
    }

    #[test]
    fn terminal_states() {
        assert!(SlotStatus::Completed.is_terminal());
        assert!(SlotStatus::Cancelled.is_terminal());
        assert!(!SlotStatus::Booked.is_terminal());
        assert!(!SlotStatus::Available.is_terminal());
    }
}
