//! Bay queue: ordered same-day wait list per bay with derived ETA estimates.
//!
//! Entries are deactivated rather than deleted; whenever membership or order
//! changes, the remaining active entries are renumbered and re-estimated
//! through [`replan`] and written back as one transactional batch, so
//! positions never hold gaps or duplicates.

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use models::{bay, booking, queue_entry};

/// Recomputed placement of one active queue entry.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuePlan {
    pub entry_id: Uuid,
    pub position: i32,
    pub estimated_start: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
}

/// Renumber and re-estimate a bay/day's active entries.
///
/// `entries` are `(entry id, duration minutes)` pairs in stored-position
/// order. The head starts at `now`; every later entry chains off its
/// predecessor's completion. Ordering follows the stored positions only,
/// never wall-clock comparison across entries.
pub fn replan(entries: &[(Uuid, i64)], now: DateTime<Utc>) -> Vec<QueuePlan> {
    let mut plans = Vec::with_capacity(entries.len());
    let mut cursor = now;
    for (idx, (entry_id, minutes)) in entries.iter().enumerate() {
        let start = cursor;
        let completion = start + Duration::minutes(*minutes);
        plans.push(QueuePlan {
            entry_id: *entry_id,
            position: (idx + 1) as i32,
            estimated_start: start,
            estimated_completion: completion,
        });
        cursor = completion;
    }
    plans
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn active_entries_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<queue_entry::Model>, ServiceError> {
    queue_entry::Entity::find()
        .filter(queue_entry::Column::BayId.eq(bay_id))
        .filter(queue_entry::Column::QueueDate.eq(date))
        .filter(queue_entry::Column::Active.eq(true))
        .order_by_asc(queue_entry::Column::Position)
        .all(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Pair each entry with its booking's effective duration, preserving order.
async fn durations_on<C: ConnectionTrait>(
    conn: &C,
    entries: &[queue_entry::Model],
) -> Result<Vec<(Uuid, i64)>, ServiceError> {
    let ids: Vec<Uuid> = entries.iter().map(|e| e.booking_id).collect();
    let bookings = booking::Entity::find()
        .filter(booking::Column::Id.is_in(ids))
        .all(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(entries
        .iter()
        .map(|e| {
            let minutes = bookings
                .iter()
                .find(|b| b.id == e.booking_id)
                .map(booking::duration_minutes)
                .unwrap_or(booking::DEFAULT_DURATION_MINUTES);
            (e.id, minutes)
        })
        .collect())
}

async fn apply_plans_on<C: ConnectionTrait>(
    conn: &C,
    entries: Vec<queue_entry::Model>,
    plans: &[QueuePlan],
) -> Result<(), ServiceError> {
    for entry in entries {
        let Some(plan) = plans.iter().find(|p| p.entry_id == entry.id) else {
            continue;
        };
        let mut am: queue_entry::ActiveModel = entry.into();
        am.position = Set(plan.position);
        am.estimated_start = Set(plan.estimated_start.into());
        am.estimated_completion = Set(plan.estimated_completion.into());
        am.updated_at = Set(Utc::now().into());
        am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    }
    Ok(())
}

/// Full re-walk of one bay/day: dense positions, chained estimates.
pub(crate) async fn replan_bay_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize, ServiceError> {
    let entries = active_entries_on(conn, bay_id, date).await?;
    let durations = durations_on(conn, &entries).await?;
    let plans = replan(&durations, now);
    let count = plans.len();
    apply_plans_on(conn, entries, &plans).await?;
    Ok(count)
}

async fn find_active_by_booking<C: ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
) -> Result<Option<queue_entry::Model>, ServiceError> {
    queue_entry::Entity::find()
        .filter(queue_entry::Column::BookingId.eq(booking_id))
        .filter(queue_entry::Column::Active.eq(true))
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

pub(crate) async fn add_to_queue_on<C: ConnectionTrait>(
    conn: &C,
    bay_id: Uuid,
    booking_id: Uuid,
    date: NaiveDate,
) -> Result<queue_entry::Model, ServiceError> {
    bay::Entity::find_by_id(bay_id)
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("bay"))?;
    let bk = booking::Entity::find_by_id(booking_id)
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("booking"))?;

    if find_active_by_booking(conn, booking_id).await?.is_some() {
        return Err(ServiceError::Conflict("booking already queued".into()));
    }

    let predecessors = active_entries_on(conn, bay_id, date).await?;
    let position = predecessors.last().map(|e| e.position + 1).unwrap_or(1);
    let now = Utc::now();
    // Chain off the highest-position predecessor; the head starts now.
    let estimated_start = predecessors
        .last()
        .map(|p| p.estimated_completion.with_timezone(&Utc))
        .unwrap_or(now);
    let estimated_completion =
        estimated_start + Duration::minutes(booking::duration_minutes(&bk));

    let am = queue_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        bay_id: Set(bay_id),
        booking_id: Set(booking_id),
        queue_date: Set(date),
        position: Set(position),
        estimated_start: Set(estimated_start.into()),
        estimated_completion: Set(estimated_completion.into()),
        active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    am.insert(conn).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Append a booking to a bay's wait list. Fails with `Conflict` when the
/// booking is already active in any queue. No capacity ceiling applies; the
/// queue is a real-time FIFO, not a hard calendar constraint.
pub async fn add_to_queue(
    db: &DatabaseConnection,
    bay_id: Uuid,
    booking_id: Uuid,
    queue_date: Option<NaiveDate>,
) -> Result<queue_entry::Model, ServiceError> {
    let date = queue_date.unwrap_or_else(today);
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let entry = add_to_queue_on(&txn, bay_id, booking_id, date).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(bay_id = %bay_id, booking_id = %booking_id, position = entry.position, "queued_booking");
    Ok(entry)
}

pub(crate) async fn deactivate_and_replan_on<C: ConnectionTrait>(
    conn: &C,
    entry: queue_entry::Model,
) -> Result<(), ServiceError> {
    let bay_id = entry.bay_id;
    let date = entry.queue_date;
    let mut am: queue_entry::ActiveModel = entry.into();
    am.active = Set(false);
    am.updated_at = Set(Utc::now().into());
    am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    replan_bay_on(conn, bay_id, date, Utc::now()).await?;
    Ok(())
}

/// Deactivate a booking's entry in one bay and compact the remaining
/// positions back to a dense 1..N, re-estimating every entry.
pub async fn remove_from_queue(
    db: &DatabaseConnection,
    bay_id: Uuid,
    booking_id: Uuid,
) -> Result<(), ServiceError> {
    let entry = find_active_by_booking(db, booking_id)
        .await?
        .filter(|e| e.bay_id == bay_id)
        .ok_or_else(|| ServiceError::not_found("queue entry"))?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    deactivate_and_replan_on(&txn, entry).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(())
}

pub(crate) async fn remove_booking_on<C: ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let Some(entry) = find_active_by_booking(conn, booking_id).await? else {
        return Ok(None);
    };
    let bay_id = entry.bay_id;
    deactivate_and_replan_on(conn, entry).await?;
    Ok(Some(bay_id))
}

/// Remove a booking from whichever queue holds it. A booking that is in no
/// queue is a no-op, not an error: cancellation flows call this
/// unconditionally.
pub async fn remove_booking_from_queue(
    db: &DatabaseConnection,
    booking_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let removed_from = remove_booking_on(&txn, booking_id).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(removed_from)
}

/// Move a booking between bay queues and re-point its bay reference.
/// Either the whole transfer applies or none of it does.
pub async fn transfer_booking(
    db: &DatabaseConnection,
    from_bay: Uuid,
    to_bay: Uuid,
    booking_id: Uuid,
) -> Result<queue_entry::Model, ServiceError> {
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    let entry = find_active_by_booking(&txn, booking_id)
        .await?
        .filter(|e| e.bay_id == from_bay)
        .ok_or_else(|| ServiceError::not_found("queue entry"))?;
    let date = entry.queue_date;
    deactivate_and_replan_on(&txn, entry).await?;
    let new_entry = add_to_queue_on(&txn, to_bay, booking_id, date).await?;

    let bk = booking::Entity::find_by_id(booking_id)
        .one(&txn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("booking"))?;
    let mut am: booking::ActiveModel = bk.into();
    am.bay_id = Set(Some(to_bay));
    am.updated_at = Set(Utc::now().into());
    am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;

    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    info!(booking_id = %booking_id, from_bay = %from_bay, to_bay = %to_bay, "transferred_booking");
    Ok(new_entry)
}

/// Recompute every active entry of a bay/day from scratch. Used after
/// external disruptions, e.g. a slot completed early.
pub async fn update_estimated_times_for_bay(
    db: &DatabaseConnection,
    bay_id: Uuid,
    queue_date: Option<NaiveDate>,
) -> Result<usize, ServiceError> {
    let date = queue_date.unwrap_or_else(today);
    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let count = replan_bay_on(&txn, bay_id, date, Utc::now()).await?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(count)
}

/// Active entries of a bay/day in position order.
pub async fn get_bay_queue(
    db: &DatabaseConnection,
    bay_id: Uuid,
    queue_date: Option<NaiveDate>,
) -> Result<Vec<queue_entry::Model>, ServiceError> {
    let date = queue_date.unwrap_or_else(today);
    active_entries_on(db, bay_id, date).await
}

/// The next-to-be-served entries (positions 1..=3).
pub async fn get_upcoming_bookings(
    db: &DatabaseConnection,
    bay_id: Uuid,
    queue_date: Option<NaiveDate>,
) -> Result<Vec<queue_entry::Model>, ServiceError> {
    let date = queue_date.unwrap_or_else(today);
    queue_entry::Entity::find()
        .filter(queue_entry::Column::BayId.eq(bay_id))
        .filter(queue_entry::Column::QueueDate.eq(date))
        .filter(queue_entry::Column::Active.eq(true))
        .filter(queue_entry::Column::Position.lte(3))
        .order_by_asc(queue_entry::Column::Position)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

pub async fn get_queue_length(
    db: &DatabaseConnection,
    bay_id: Uuid,
    queue_date: Option<NaiveDate>,
) -> Result<u64, ServiceError> {
    let date = queue_date.unwrap_or_else(today);
    queue_entry::Entity::find()
        .filter(queue_entry::Column::BayId.eq(bay_id))
        .filter(queue_entry::Column::QueueDate.eq(date))
        .filter(queue_entry::Column::Active.eq(true))
        .count(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Where a booking currently waits: `(bay, position)`, if anywhere.
pub async fn get_booking_queue_position(
    db: &DatabaseConnection,
    booking_id: Uuid,
) -> Result<Option<(Uuid, i32)>, ServiceError> {
    Ok(find_active_by_booking(db, booking_id)
        .await?
        .map(|e| (e.bay_id, e.position)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get_db, seed_bay, seed_booking};

    #[test]
    fn replan_of_empty_queue_is_empty() {
        assert!(replan(&[], Utc::now()).is_empty());
    }

    #[test]
    fn replan_chains_estimates_densely() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let plans = replan(&[(a, 30), (b, 60), (c, 90)], now);

        assert_eq!(plans.iter().map(|p| p.position).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(plans[0].estimated_start, now);
        assert_eq!(plans[0].estimated_completion, now + Duration::minutes(30));
        assert_eq!(plans[1].estimated_start, plans[0].estimated_completion);
        assert_eq!(plans[2].estimated_start, plans[1].estimated_completion);
        assert_eq!(plans[2].estimated_completion, now + Duration::minutes(180));
    }

    #[tokio::test]
    async fn queue_positions_stay_dense() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay) = seed_bay(&db, 8, 18).await?;
        let date = today();
        let b1 = seed_booking(&db, &branch, Some(bay.id), date, Some(30), 1).await?;
        let b2 = seed_booking(&db, &branch, Some(bay.id), date, Some(60), 1).await?;
        let b3 = seed_booking(&db, &branch, Some(bay.id), date, None, 2).await?;

        let e1 = add_to_queue(&db, bay.id, b1.id, Some(date)).await?;
        let e2 = add_to_queue(&db, bay.id, b2.id, Some(date)).await?;
        let e3 = add_to_queue(&db, bay.id, b3.id, Some(date)).await?;
        assert_eq!((e1.position, e2.position, e3.position), (1, 2, 3));
        // second chains off the first's completion
        assert_eq!(e2.estimated_start, e1.estimated_completion);

        // double enqueue anywhere conflicts
        assert!(matches!(
            add_to_queue(&db, bay.id, b1.id, Some(date)).await,
            Err(ServiceError::Conflict(_))
        ));

        remove_from_queue(&db, bay.id, b1.id).await?;
        let remaining = get_bay_queue(&db, bay.id, Some(date)).await?;
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].booking_id, b2.id);
        assert_eq!(remaining[0].position, 1);
        assert_eq!(remaining[1].position, 2);
        // the new head was re-estimated to start roughly now
        let drift = (Utc::now() - remaining[0].estimated_start.with_timezone(&Utc)).num_seconds();
        assert!(drift.abs() < 30, "head should restart at now, drift {drift}s");

        assert_eq!(get_queue_length(&db, bay.id, Some(date)).await?, 2);
        assert_eq!(
            get_booking_queue_position(&db, b2.id).await?,
            Some((bay.id, 1))
        );
        Ok(())
    }

    #[tokio::test]
    async fn removing_unqueued_booking_is_noop() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay) = seed_bay(&db, 8, 18).await?;
        let date = today();
        let b = seed_booking(&db, &branch, Some(bay.id), date, None, 1).await?;

        assert_eq!(remove_booking_from_queue(&db, b.id).await?, None);
        // but the bay-addressed variant is strict
        assert!(matches!(
            remove_from_queue(&db, bay.id, b.id).await,
            Err(ServiceError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn transfer_moves_entry_and_repoints_booking() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay_a) = seed_bay(&db, 8, 18).await?;
        let bay_b = models::bay::create(&db, branch.id, "bay-b", 8, 18).await?;
        let date = today();
        let b = seed_booking(&db, &branch, Some(bay_a.id), date, Some(45), 1).await?;

        add_to_queue(&db, bay_a.id, b.id, Some(date)).await?;
        let moved = transfer_booking(&db, bay_a.id, bay_b.id, b.id).await?;
        assert_eq!(moved.bay_id, bay_b.id);
        assert_eq!(moved.position, 1);
        assert!(get_bay_queue(&db, bay_a.id, Some(date)).await?.is_empty());

        let reloaded = models::booking::find_by_id(&db, b.id).await?.unwrap();
        assert_eq!(reloaded.bay_id, Some(bay_b.id));

        // transferring out of the wrong bay fails whole
        assert!(matches!(
            transfer_booking(&db, bay_a.id, bay_b.id, b.id).await,
            Err(ServiceError::NotFound(_))
        ));
        Ok(())
    }
}
