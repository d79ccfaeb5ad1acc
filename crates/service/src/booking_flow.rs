//! Booking flow: the workflows that consume the slot calendar, bay queue and
//! draft wizard together. Each operation is all-or-nothing.

use chrono::{Duration, Local, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::draft_wizard::{self, WizardStep};
use crate::errors::ServiceError;
use crate::{bay_queue, slot_calendar};
use models::booking::{self, BookingStatus};
use models::slot::{self, SlotStatus};
use models::service_type;

/// Turn a ready draft into a confirmed booking.
///
/// In one transaction: the booking row is created, its time window is
/// validated against the calendar and reserved (spanning extra cells when the
/// combined service duration exceeds one), the booking is enqueued when it is
/// for today, and the draft is completed. Any sub-step failure aborts the
/// whole operation.
pub async fn finalize_draft(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<booking::Model, ServiceError> {
    let d = draft_wizard::get_draft_by_session(db, session_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("draft"))?;
    let (step, missing) = draft_wizard::draft_progress(&d);
    if step != WizardStep::Ready.as_i32() {
        return Err(ServiceError::InvalidState(format!(
            "draft is incomplete, missing: {}",
            missing.join(", ")
        )));
    }
    let (Some(branch_id), Some(bay_id), Some(date), Some(start)) =
        (d.branch_id, d.bay_id, d.preferred_date, d.slot_time)
    else {
        return Err(ServiceError::InvalidState("draft is incomplete".into()));
    };

    // Combined duration and item count of the selected services.
    let links = draft_wizard::get_draft_services(db, d.id).await?;
    let service_ids: Vec<Uuid> = links.iter().map(|l| l.service_type_id).collect();
    let services = service_type::Entity::find()
        .filter(service_type::Column::Id.is_in(service_ids))
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    let total_minutes: i64 = services.iter().map(|s| i64::from(s.estimated_minutes)).sum();
    let total_minutes = if total_minutes > 0 { total_minutes } else { booking::DEFAULT_DURATION_MINUTES };
    let item_count = services.len().max(1) as i32;

    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(total_minutes));
    let end = if wrapped > 0 {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(start)
    } else {
        end
    };

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let now = Utc::now();
    let am = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        branch_id: Set(branch_id),
        bay_id: Set(Some(bay_id)),
        vehicle_id: Set(d.vehicle_id),
        booking_date: Set(date),
        estimated_minutes: Set(Some(total_minutes as i32)),
        item_count: Set(item_count),
        status: Set(BookingStatus::Confirmed),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let created = am.insert(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;

    // The whole window must be free before any cell is touched.
    let window = slot_calendar::find_conflicting_slots_on(&txn, bay_id, date, start, end).await?;
    if window.is_empty() {
        return Err(ServiceError::not_found("slot"));
    }
    if window.iter().any(|s| s.status != SlotStatus::Available) {
        return Err(ServiceError::Conflict("time window unavailable".into()));
    }

    let first = slot_calendar::book_slot_on(&txn, bay_id, date, start, created.id).await?;
    if end > first.end_time {
        slot_calendar::block_slots_in_range_on(&txn, bay_id, date, first.end_time, end, created.id)
            .await?;
    }

    if date == Local::now().date_naive() {
        bay_queue::add_to_queue_on(&txn, bay_id, created.id, date).await?;
    }

    draft_wizard::complete_draft_on(&txn, d).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(booking_id = %created.id, bay_id = %bay_id, %date, "finalized_draft");
    Ok(created)
}

/// Cancel a booking, detaching it from queue and, per policy, calendar.
///
/// The queue removal is a no-op when the booking is not queued, so this is
/// safe to call unconditionally. `release_slots` decides whether the
/// booking's still-`Booked` cells return to `Available` in the same
/// transaction or are left for manual correction. An already-cancelled
/// booking is returned as-is.
pub async fn cancel_booking(
    db: &DatabaseConnection,
    booking_id: Uuid,
    release_slots: bool,
) -> Result<booking::Model, ServiceError> {
    let bk = booking::Entity::find_by_id(booking_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    if bk.status == BookingStatus::Cancelled {
        return Ok(bk);
    }
    if bk.status == BookingStatus::Completed {
        return Err(ServiceError::InvalidState("completed booking cannot be cancelled".into()));
    }

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let mut am: booking::ActiveModel = bk.into();
    am.status = Set(BookingStatus::Cancelled);
    am.updated_at = Set(Utc::now().into());
    let cancelled = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;

    bay_queue::remove_booking_on(&txn, booking_id).await?;

    if release_slots {
        let reserved = slot::Entity::find()
            .filter(slot::Column::BookingId.eq(booking_id))
            .filter(slot::Column::Status.eq(SlotStatus::Booked))
            .all(&txn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        for s in reserved {
            slot_calendar::release_slot_on(&txn, s).await?;
        }
    }

    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(booking_id = %booking_id, release_slots, "cancelled_booking");
    Ok(cancelled)
}

/// Complete the service running in a slot, then re-estimate the bay's queue:
/// an early completion changes every waiting booking's ETA for that bay/day.
pub async fn record_service_completion(
    db: &DatabaseConnection,
    slot_id: Uuid,
    completed_at: Option<NaiveTime>,
) -> Result<(slot::Model, usize), ServiceError> {
    let (completed, released) = slot_calendar::complete_service(db, slot_id, completed_at).await?;
    bay_queue::update_estimated_times_for_bay(db, completed.bay_id, Some(completed.slot_date))
        .await?;
    Ok((completed, released))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft_wizard::{get_or_create_draft, update_draft, DraftPatch};
    use crate::test_support::{get_db, seed_bay, seed_service};
    use models::draft;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn finalize_requires_a_ready_draft() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let session = format!("sess_{}", Uuid::new_v4());
        get_or_create_draft(&db, &session, None).await?;

        assert!(matches!(
            finalize_draft(&db, &session).await,
            Err(ServiceError::InvalidState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn finalize_books_window_and_enqueues_today() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay) = seed_bay(&db, 8, 18).await?;
        let svc_a = seed_service(&db, 60).await?;
        let svc_b = seed_service(&db, 30).await?;
        let today = Local::now().date_naive();
        slot_calendar::generate_daily(&db, bay.id, today).await?;

        let session = format!("sess_{}", Uuid::new_v4());
        let d = get_or_create_draft(&db, &session, None).await?;
        update_draft(
            &db,
            &session,
            DraftPatch {
                vehicle_id: Some(Uuid::new_v4()),
                branch_id: Some(branch.id),
                preferred_date: Some(today),
                service_id: Some(svc_a.id),
                bay_id: Some(bay.id),
                slot_time: Some(t(9, 0)),
            },
        )
        .await?;
        crate::draft_wizard::add_service_to_draft(&db, d.id, svc_b.id).await?;

        let bk = finalize_draft(&db, &session).await?;
        assert_eq!(bk.status, BookingStatus::Confirmed);
        assert_eq!(bk.estimated_minutes, Some(90));
        assert_eq!(bk.item_count, 2);

        // 90 minutes span the 9..10 cell and part of 10..11
        let nine = slot_calendar::get_slot(&db, bay.id, today, t(9, 0)).await?;
        let ten = slot_calendar::get_slot(&db, bay.id, today, t(10, 0)).await?;
        assert_eq!(nine.status, SlotStatus::Booked);
        assert_eq!(nine.booking_id, Some(bk.id));
        assert_eq!(ten.status, SlotStatus::Booked);
        assert_eq!(ten.booking_id, Some(bk.id));

        // same-day booking joined the wait queue
        assert!(bay_queue::get_booking_queue_position(&db, bk.id).await?.is_some());

        // the draft is done and the session has no active draft anymore
        let done = draft::Entity::find_by_id(d.id).one(&db).await?.unwrap();
        assert_eq!(done.status, models::draft::DraftStatus::Completed);
        assert!(draft_wizard::get_draft_by_session(&db, &session).await?.is_none());

        // the window cannot be booked twice
        let session2 = format!("sess_{}", Uuid::new_v4());
        get_or_create_draft(&db, &session2, None).await?;
        update_draft(
            &db,
            &session2,
            DraftPatch {
                vehicle_id: Some(Uuid::new_v4()),
                branch_id: Some(branch.id),
                preferred_date: Some(today),
                service_id: Some(svc_b.id),
                bay_id: Some(bay.id),
                slot_time: Some(t(10, 0)),
            },
        )
        .await?;
        assert!(matches!(
            finalize_draft(&db, &session2).await,
            Err(ServiceError::Conflict(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn cancel_detaches_queue_and_optionally_slots() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay) = seed_bay(&db, 8, 18).await?;
        let svc = seed_service(&db, 120).await?;
        let today = Local::now().date_naive();
        slot_calendar::generate_daily(&db, bay.id, today).await?;

        let session = format!("sess_{}", Uuid::new_v4());
        get_or_create_draft(&db, &session, None).await?;
        update_draft(
            &db,
            &session,
            DraftPatch {
                vehicle_id: Some(Uuid::new_v4()),
                branch_id: Some(branch.id),
                preferred_date: Some(today),
                service_id: Some(svc.id),
                bay_id: Some(bay.id),
                slot_time: Some(t(14, 0)),
            },
        )
        .await?;
        let bk = finalize_draft(&db, &session).await?;

        let cancelled = cancel_booking(&db, bk.id, true).await?;
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(bay_queue::get_booking_queue_position(&db, bk.id).await?, None);
        assert_eq!(
            slot_calendar::get_slot(&db, bay.id, today, t(14, 0)).await?.status,
            SlotStatus::Available
        );
        assert_eq!(
            slot_calendar::get_slot(&db, bay.id, today, t(15, 0)).await?.status,
            SlotStatus::Available
        );

        // cancelling again is a safe no-op
        let again = cancel_booking(&db, bk.id, true).await?;
        assert_eq!(again.status, BookingStatus::Cancelled);
        Ok(())
    }
}
