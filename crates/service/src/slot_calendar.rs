//! Slot calendar: generation and lifecycle of a bay's fixed-grid daily slots.
//!
//! Slots are fixed-width cells rather than free intervals so that conflict
//! detection, availability counting and early-completion release stay simple
//! set operations on a small bounded collection.

use chrono::{Local, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use models::slot::{self, SlotStatus};
use models::{bay, booking, branch};

/// Width of one calendar cell.
pub const SLOT_MINUTES: u32 = 60;

/// Contiguous fixed-width cells covering `[start_hour:00, end_hour:00)`.
/// A trailing remainder shorter than `slot_minutes` is not emitted.
pub fn day_grid(start_hour: i32, end_hour: i32, slot_minutes: u32) -> Vec<(NaiveTime, NaiveTime)> {
    let mut cells = Vec::new();
    if slot_minutes == 0 || start_hour < 0 || end_hour <= start_hour || end_hour > 23 {
        return cells;
    }
    let mut cursor = (start_hour as u32) * 60;
    let close = (end_hour as u32) * 60;
    while cursor + slot_minutes <= close {
        let start = NaiveTime::from_num_seconds_from_midnight_opt(cursor * 60, 0);
        let end = NaiveTime::from_num_seconds_from_midnight_opt((cursor + slot_minutes) * 60, 0);
        match (start, end) {
            (Some(s), Some(e)) => cells.push((s, e)),
            _ => break,
        }
        cursor += slot_minutes;
    }
    cells
}

async fn load_slot<C: ConnectionTrait>(conn: &C, slot_id: Uuid) -> Result<slot::Model, ServiceError> {
    slot::Entity::find_by_id(slot_id)
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("slot"))
}

/// Purge and re-insert the day's cells for one bay. Caller owns the transaction.
pub(crate) async fn regenerate_for_bay<C: ConnectionTrait>(
    conn: &C,
    bay: &bay::Model,
    date: NaiveDate,
) -> Result<Vec<slot::Model>, ServiceError> {
    slot::Entity::delete_many()
        .filter(slot::Column::BayId.eq(bay.id))
        .filter(slot::Column::SlotDate.eq(date))
        .exec(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let now = Utc::now().into();
    let mut created = Vec::new();
    for (start, end) in day_grid(bay.working_start_hour, bay.working_end_hour, SLOT_MINUTES) {
        let am = slot::ActiveModel {
            id: Set(Uuid::new_v4()),
            bay_id: Set(bay.id),
            slot_date: Set(date),
            start_time: Set(start),
            end_time: Set(end),
            status: Set(SlotStatus::Available),
            booking_id: Set(None),
            actual_end_time: Set(None),
            cancel_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(conn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
        created.push(m);
    }
    Ok(created)
}

/// Regenerate the calendar of one bay/day. Existing slots for the day are
/// purged first, so repeated calls replace rather than accumulate.
pub async fn generate_daily(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<slot::Model>, ServiceError> {
    let bay = bay::Entity::find_by_id(bay_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("bay"))?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let created = regenerate_for_bay(&txn, &bay, date).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(bay_id = %bay_id, %date, slots = created.len(), "generated_daily_slots");
    Ok(created)
}

/// Regenerate the calendars of every active bay of a branch for one day.
pub async fn generate_branch_daily(
    db: &DatabaseConnection,
    branch_id: Uuid,
    date: NaiveDate,
) -> Result<usize, ServiceError> {
    branch::Entity::find_by_id(branch_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("branch"))?;
    let bays = bay::find_active_by_branch(db, branch_id).await?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let mut total = 0;
    for b in &bays {
        total += regenerate_for_bay(&txn, b, date).await?.len();
    }
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(branch_id = %branch_id, %date, bays = bays.len(), slots = total, "generated_branch_slots");
    Ok(total)
}

/// Look up the cell starting at `time`. Fails with `NotFound` when the
/// calendar has no such cell.
pub async fn get_slot(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<slot::Model, ServiceError> {
    slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .filter(slot::Column::StartTime.eq(time))
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("slot"))
}

/// Full day schedule of one bay, in start-time order.
pub async fn get_bay_schedule(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<slot::Model>, ServiceError> {
    slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .order_by_asc(slot::Column::StartTime)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

pub async fn get_available_slots(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<slot::Model>, ServiceError> {
    slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .filter(slot::Column::Status.eq(SlotStatus::Available))
        .order_by_asc(slot::Column::StartTime)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Available slots of every active bay of a branch, paired per bay.
pub async fn get_available_slots_by_branch(
    db: &DatabaseConnection,
    branch_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<(bay::Model, Vec<slot::Model>)>, ServiceError> {
    let bays = bay::find_active_by_branch(db, branch_id).await?;
    let mut out = Vec::with_capacity(bays.len());
    for b in bays {
        let slots = get_available_slots(db, b.id, date).await?;
        out.push((b, slots));
    }
    Ok(out)
}

pub(crate) async fn book_slot_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    booking_id: Uuid,
) -> Result<slot::Model, ServiceError> {
    booking::Entity::find_by_id(booking_id)
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("booking"))?;

    let found = slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .filter(slot::Column::StartTime.eq(time))
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("slot"))?;

    if found.status != SlotStatus::Available {
        return Err(ServiceError::InvalidState("slot not available".into()));
    }
    let mut am: slot::ActiveModel = found.into();
    am.status = Set(SlotStatus::Booked);
    am.booking_id = Set(Some(booking_id));
    am.updated_at = Set(Utc::now().into());
    am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Reserve an `Available` cell for a booking.
pub async fn book_slot(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    booking_id: Uuid,
) -> Result<slot::Model, ServiceError> {
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let updated = book_slot_on(&txn, bay_id, date, time, booking_id).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(updated)
}

/// `Booked -> InProgress`: the vehicle is in the bay, work has started.
pub async fn start_service(
    db: &DatabaseConnection,
    slot_id: Uuid,
) -> Result<slot::Model, ServiceError> {
    let found = load_slot(db, slot_id).await?;
    if found.status != SlotStatus::Booked {
        return Err(ServiceError::InvalidState(format!(
            "cannot start service from {:?}",
            found.status
        )));
    }
    let mut am: slot::ActiveModel = found.into();
    am.status = Set(SlotStatus::InProgress);
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// `InProgress -> Completed`, recording the actual end of work.
///
/// When work ends before the reserved window does, every still-`Booked` cell
/// of the same bay/day lying strictly inside the freed remainder of the
/// window is released back to `Available`. Cells already `InProgress` or
/// `Completed` are left untouched. The reserved window of a multi-cell
/// booking extends to the last cell attached to the same booking.
///
/// `completed_at` defaults to the current local time; operators may pass a
/// back-dated completion time.
pub async fn complete_service(
    db: &DatabaseConnection,
    slot_id: Uuid,
    completed_at: Option<NaiveTime>,
) -> Result<(slot::Model, usize), ServiceError> {
    let found = load_slot(db, slot_id).await?;
    if found.status != SlotStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "cannot complete service from {:?}",
            found.status
        )));
    }
    let at = completed_at.unwrap_or_else(|| Local::now().time());

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    // Scheduled end of the whole reservation, not just this cell.
    let mut scheduled_end = found.end_time;
    if let Some(bid) = found.booking_id {
        let reserved = slot::Entity::find()
            .filter(slot::Column::BayId.eq(found.bay_id))
            .filter(slot::Column::SlotDate.eq(found.slot_date))
            .filter(slot::Column::BookingId.eq(bid))
            .all(&txn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        for s in &reserved {
            if s.end_time > scheduled_end {
                scheduled_end = s.end_time;
            }
        }
    }

    let bay_id = found.bay_id;
    let date = found.slot_date;
    let mut am: slot::ActiveModel = found.into();
    am.status = Set(SlotStatus::Completed);
    am.actual_end_time = Set(Some(at));
    am.updated_at = Set(Utc::now().into());
    let completed = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let mut released = 0;
    if at < scheduled_end {
        let candidates = slot::Entity::find()
            .filter(slot::Column::BayId.eq(bay_id))
            .filter(slot::Column::SlotDate.eq(date))
            .filter(slot::Column::Status.eq(SlotStatus::Booked))
            .all(&txn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        for s in candidates {
            if s.start_time >= at && s.end_time <= scheduled_end {
                let mut free: slot::ActiveModel = s.into();
                free.status = Set(SlotStatus::Available);
                free.booking_id = Set(None);
                free.updated_at = Set(Utc::now().into());
                free.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
                released += 1;
            }
        }
    }

    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    if released > 0 {
        info!(slot_id = %slot_id, released, "early_completion_released_slots");
    }
    Ok((completed, released))
}

/// Any non-terminal state `-> Cancelled`; the reason is kept for audit.
pub async fn cancel_slot(
    db: &DatabaseConnection,
    slot_id: Uuid,
    reason: &str,
) -> Result<slot::Model, ServiceError> {
    let found = load_slot(db, slot_id).await?;
    if found.status.is_terminal() {
        return Err(ServiceError::InvalidState(format!(
            "cannot cancel slot in {:?}",
            found.status
        )));
    }
    let mut am: slot::ActiveModel = found.into();
    am.status = Set(SlotStatus::Cancelled);
    am.cancel_reason = Set(Some(reason.to_string()));
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

pub(crate) async fn release_slot_on<C: ConnectionTrait>(
    conn: &C,
    found: slot::Model,
) -> Result<slot::Model, ServiceError> {
    let mut am: slot::ActiveModel = found.into();
    am.status = Set(SlotStatus::Available);
    am.booking_id = Set(None);
    am.actual_end_time = Set(None);
    am.updated_at = Set(Utc::now().into());
    am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Manual override: `Booked | InProgress -> Available`, detaching the booking.
pub async fn release_slot(
    db: &DatabaseConnection,
    slot_id: Uuid,
) -> Result<slot::Model, ServiceError> {
    let found = load_slot(db, slot_id).await?;
    if !matches!(found.status, SlotStatus::Booked | SlotStatus::InProgress) {
        return Err(ServiceError::InvalidState(format!(
            "cannot release slot in {:?}",
            found.status
        )));
    }
    release_slot_on(db, found).await
}

pub(crate) async fn block_slots_in_range_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    booking_id: Uuid,
) -> Result<Vec<slot::Model>, ServiceError> {
    if start >= end {
        return Err(ServiceError::Validation("start must be before end".into()));
    }
    let candidates = slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .filter(slot::Column::Status.eq(SlotStatus::Available))
        .order_by_asc(slot::Column::StartTime)
        .all(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let mut blocked = Vec::new();
    for s in candidates {
        if slot::overlaps(&s, start, end) {
            let mut am: slot::ActiveModel = s.into();
            am.status = Set(SlotStatus::Booked);
            am.booking_id = Set(Some(booking_id));
            am.updated_at = Set(Utc::now().into());
            let m = am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
            blocked.push(m);
        }
    }
    Ok(blocked)
}

/// Mark every currently-`Available` cell overlapping `[start, end)` as
/// `Booked` for one spanning booking.
pub async fn block_slots_in_range(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    booking_id: Uuid,
) -> Result<Vec<slot::Model>, ServiceError> {
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let blocked = block_slots_in_range_on(&txn, bay_id, date, start, end, booking_id).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(blocked)
}

pub(crate) async fn find_conflicting_slots_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<Vec<slot::Model>, ServiceError> {
    if start >= end {
        return Err(ServiceError::Validation("start must be before end".into()));
    }
    let day = slot::Entity::find()
        .filter(slot::Column::BayId.eq(bay_id))
        .filter(slot::Column::SlotDate.eq(date))
        .order_by_asc(slot::Column::StartTime)
        .all(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(day.into_iter().filter(|s| slot::overlaps(s, start, end)).collect())
}

/// Every cell overlapping `[start, end)`, regardless of status. Booking
/// validation inspects the result before committing a reservation.
pub async fn find_conflicting_slots(
    db: &DatabaseConnection,
    bay_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<Vec<slot::Model>, ServiceError> {
    find_conflicting_slots_on(db, bay_id, date, start, end).await
}
