//! Draft wizard: an in-progress, multi-field booking selection per session.
//!
//! Selection fields form one strict dependency chain
//! `branch > date > service > bay > time` (vehicle sits outside it). An
//! upstream change invalidates everything downstream; the cascade is a fixed
//! ordered rule list, not a generic dependency solver.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use common::pagination::Pagination;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;
use models::draft::{self, DraftStatus};
use models::{bay, branch, draft_service, service_type};

/// Inactivity window after which an in-progress draft expires.
pub const DRAFT_TTL_HOURS: i64 = 24;

/// Wizard steps in completion order. `current_step` is the first step whose
/// field is still missing; `Ready` means the selection is complete.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WizardStep {
    Vehicle = 1,
    Branch = 2,
    Date = 3,
    Service = 4,
    Bay = 5,
    Time = 6,
    Ready = 7,
}

impl WizardStep {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Fields of the dependency chain (plus the independent vehicle).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChainField {
    Branch,
    Date,
    Service,
    Bay,
    Time,
    Vehicle,
}

/// Ordered cascade rules: `(trigger, fields cleared)`. Evaluated top-down,
/// first matching trigger wins; vehicle and time changes clear nothing.
const CASCADE_RULES: &[(ChainField, &[ChainField])] = &[
    (ChainField::Branch, &[ChainField::Service, ChainField::Bay, ChainField::Time, ChainField::Date]),
    (ChainField::Date, &[ChainField::Service, ChainField::Bay, ChainField::Time]),
    (ChainField::Service, &[ChainField::Bay, ChainField::Time]),
    (ChainField::Bay, &[ChainField::Time]),
];

/// The dependent fields to clear for a set of changed fields.
pub fn cascade_targets(changed: &[ChainField]) -> &'static [ChainField] {
    for (trigger, cleared) in CASCADE_RULES {
        if changed.contains(trigger) {
            return cleared;
        }
    }
    &[]
}

/// Current step and the outstanding requirements of a draft.
pub fn draft_progress(d: &draft::Model) -> (i32, Vec<&'static str>) {
    let requirements: [(WizardStep, &'static str, bool); 6] = [
        (WizardStep::Vehicle, "vehicle", d.vehicle_id.is_some()),
        (WizardStep::Branch, "branch", d.branch_id.is_some()),
        (WizardStep::Date, "date", d.preferred_date.is_some()),
        (WizardStep::Service, "service", d.primary_service_id.is_some()),
        (WizardStep::Bay, "bay", d.bay_id.is_some()),
        (WizardStep::Time, "time", d.slot_time.is_some()),
    ];
    let mut step = WizardStep::Ready;
    let mut missing = Vec::new();
    for (s, name, present) in requirements {
        if !present {
            if step == WizardStep::Ready {
                step = s;
            }
            missing.push(name);
        }
    }
    (step.as_i32(), missing)
}

/// Partial update payload; only present fields are applied.
#[derive(Clone, Debug, Default)]
pub struct DraftPatch {
    pub vehicle_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub preferred_date: Option<NaiveDate>,
    pub service_id: Option<Uuid>,
    pub bay_id: Option<Uuid>,
    pub slot_time: Option<NaiveTime>,
}

/// What the caller (typically the assistant's tool layer) reads back to
/// decide its next prompt.
#[derive(Clone, Debug)]
pub struct DraftOutcome {
    pub draft: draft::Model,
    pub missing_data: Vec<&'static str>,
}

fn touch(am: &mut draft::ActiveModel, now: DateTime<Utc>) {
    am.last_activity_at = Set(now.into());
    am.expires_at = Set((now + Duration::hours(DRAFT_TTL_HOURS)).into());
    am.updated_at = Set(now.into());
}

async fn load_in_progress<C: ConnectionTrait>(
    conn: &C,
    draft_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let d = draft::Entity::find_by_id(draft_id)
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("draft"))?;
    if d.status != DraftStatus::InProgress {
        return Err(ServiceError::InvalidState(format!(
            "draft is {:?}, not in progress",
            d.status
        )));
    }
    Ok(d)
}

async fn find_in_progress_by_session<C: ConnectionTrait>(
    conn: &C,
    session_id: &str,
) -> Result<Option<draft::Model>, ServiceError> {
    draft::Entity::find()
        .filter(draft::Column::SessionId.eq(session_id))
        .filter(draft::Column::Status.eq(DraftStatus::InProgress))
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

async fn delete_service_links<C: ConnectionTrait>(
    conn: &C,
    draft_id: Uuid,
) -> Result<u64, ServiceError> {
    let res = draft_service::Entity::delete_many()
        .filter(draft_service::Column::DraftId.eq(draft_id))
        .exec(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(res.rows_affected)
}

async fn validate_patch_lookups<C: ConnectionTrait>(
    conn: &C,
    patch: &DraftPatch,
) -> Result<(), ServiceError> {
    if let Some(id) = patch.branch_id {
        let b = branch::Entity::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?
            .ok_or_else(|| ServiceError::not_found("branch"))?;
        if !b.active {
            return Err(ServiceError::Validation("branch is inactive".into()));
        }
    }
    if let Some(id) = patch.service_id {
        let s = service_type::Entity::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?
            .ok_or_else(|| ServiceError::not_found("service"))?;
        if !s.active {
            return Err(ServiceError::Validation("service is inactive".into()));
        }
    }
    if let Some(id) = patch.bay_id {
        let b = bay::Entity::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?
            .ok_or_else(|| ServiceError::not_found("bay"))?;
        if !b.active {
            return Err(ServiceError::Validation("bay is inactive".into()));
        }
    }
    Ok(())
}

/// Return the session's in-progress draft, or start a fresh one at step 1.
///
/// Starting a fresh draft for a customer abandons their in-progress drafts
/// from other sessions first: at most one active draft per customer.
pub async fn get_or_create_draft(
    db: &DatabaseConnection,
    session_id: &str,
    customer_id: Option<Uuid>,
) -> Result<draft::Model, ServiceError> {
    if let Some(existing) = find_in_progress_by_session(db, session_id).await? {
        return Ok(existing);
    }

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    if let Some(customer) = customer_id {
        let superseded = draft::Entity::find()
            .filter(draft::Column::CustomerId.eq(customer))
            .filter(draft::Column::Status.eq(DraftStatus::InProgress))
            .all(&txn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        for d in superseded {
            let id = d.id;
            let mut am: draft::ActiveModel = d.into();
            am.status = Set(DraftStatus::Abandoned);
            am.updated_at = Set(Utc::now().into());
            am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
            info!(draft_id = %id, customer_id = %customer, "abandoned_superseded_draft");
        }
    }

    let now = Utc::now();
    let am = draft::ActiveModel {
        id: Set(Uuid::new_v4()),
        session_id: Set(session_id.to_string()),
        customer_id: Set(customer_id),
        current_step: Set(WizardStep::Vehicle.as_i32()),
        vehicle_id: Set(None),
        preferred_date: Set(None),
        branch_id: Set(None),
        primary_service_id: Set(None),
        bay_id: Set(None),
        slot_time: Set(None),
        status: Set(DraftStatus::InProgress),
        expires_at: Set((now + Duration::hours(DRAFT_TTL_HOURS)).into()),
        last_activity_at: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let created = am.insert(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(created)
}

pub async fn get_draft_by_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<draft::Model>, ServiceError> {
    find_in_progress_by_session(db, session_id).await
}

/// Apply a partial update to the session's draft.
///
/// Present fields are applied, the chain fields revised away from an
/// existing value are detected, and exactly one cascade rule fires for the
/// highest-priority one; filling a field for the first time never cascades.
/// A patch that changes nothing is a no-op and does not renew activity or
/// expiry.
pub async fn update_draft(
    db: &DatabaseConnection,
    session_id: &str,
    patch: DraftPatch,
) -> Result<DraftOutcome, ServiceError> {
    let current = find_in_progress_by_session(db, session_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("draft"))?;
    validate_patch_lookups(db, &patch).await?;

    let mut next = current.clone();
    // A field revised away from an existing value invalidates its dependents.
    // A first-time set is activity but never triggers a cascade.
    let mut revised: Vec<ChainField> = Vec::new();
    let mut modified = false;

    if let Some(v) = patch.vehicle_id {
        if next.vehicle_id != Some(v) {
            modified = true;
        }
        next.vehicle_id = Some(v);
    }
    if let Some(v) = patch.branch_id {
        if next.branch_id != Some(v) {
            modified = true;
            if next.branch_id.is_some() {
                revised.push(ChainField::Branch);
            }
        }
        next.branch_id = Some(v);
    }
    if let Some(v) = patch.preferred_date {
        if next.preferred_date != Some(v) {
            modified = true;
            if next.preferred_date.is_some() {
                revised.push(ChainField::Date);
            }
        }
        next.preferred_date = Some(v);
    }
    if let Some(v) = patch.service_id {
        if next.primary_service_id != Some(v) {
            modified = true;
            if next.primary_service_id.is_some() {
                revised.push(ChainField::Service);
            }
        }
        next.primary_service_id = Some(v);
    }
    if let Some(v) = patch.bay_id {
        if next.bay_id != Some(v) {
            modified = true;
            if next.bay_id.is_some() {
                revised.push(ChainField::Bay);
            }
        }
        next.bay_id = Some(v);
    }
    if let Some(v) = patch.slot_time {
        if next.slot_time != Some(v) {
            modified = true;
        }
        next.slot_time = Some(v);
    }

    if !modified {
        let (_, missing) = draft_progress(&current);
        return Ok(DraftOutcome { draft: current, missing_data: missing });
    }

    let targets = cascade_targets(&revised);
    let mut clear_services = false;
    for t in targets {
        match t {
            ChainField::Service => {
                next.primary_service_id = None;
                clear_services = true;
            }
            ChainField::Bay => next.bay_id = None,
            ChainField::Time => next.slot_time = None,
            ChainField::Date => next.preferred_date = None,
            ChainField::Branch | ChainField::Vehicle => {}
        }
    }

    let (step, missing) = draft_progress(&next);
    debug!(
        session_id,
        ?revised,
        cleared = ?targets,
        before = ?(current.branch_id, current.preferred_date, current.primary_service_id, current.bay_id, current.slot_time),
        after = ?(next.branch_id, next.preferred_date, next.primary_service_id, next.bay_id, next.slot_time),
        step,
        "draft_update"
    );

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    if clear_services {
        delete_service_links(&txn, current.id).await?;
    }
    // Keep the selection list consistent with a primary chosen through the
    // wizard: ensure a link row exists for it.
    if let Some(service_id) = patch.service_id {
        if next.primary_service_id == Some(service_id) {
            ensure_service_link(&txn, current.id, service_id).await?;
        }
    }

    let now = Utc::now();
    let mut am: draft::ActiveModel = current.into();
    am.vehicle_id = Set(next.vehicle_id);
    am.branch_id = Set(next.branch_id);
    am.preferred_date = Set(next.preferred_date);
    am.primary_service_id = Set(next.primary_service_id);
    am.bay_id = Set(next.bay_id);
    am.slot_time = Set(next.slot_time);
    am.current_step = Set(step);
    touch(&mut am, now);
    let updated = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;

    Ok(DraftOutcome { draft: updated, missing_data: missing })
}

async fn ensure_service_link<C: ConnectionTrait>(
    conn: &C,
    draft_id: Uuid,
    service_type_id: Uuid,
) -> Result<(), ServiceError> {
    let exists = draft_service::Entity::find()
        .filter(draft_service::Column::DraftId.eq(draft_id))
        .filter(draft_service::Column::ServiceTypeId.eq(service_type_id))
        .one(conn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    if exists.is_none() {
        let am = draft_service::ActiveModel {
            id: Set(Uuid::new_v4()),
            draft_id: Set(draft_id),
            service_type_id: Set(service_type_id),
            created_at: Set(Utc::now().into()),
        };
        am.insert(conn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    }
    Ok(())
}

/// Clear every selection and return to step 1, keeping the draft in
/// progress with a renewed TTL. Safe to call repeatedly.
pub async fn reset_draft(
    db: &DatabaseConnection,
    draft_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    delete_service_links(&txn, current.id).await?;
    let mut am: draft::ActiveModel = current.into();
    am.vehicle_id = Set(None);
    am.branch_id = Set(None);
    am.preferred_date = Set(None);
    am.primary_service_id = Set(None);
    am.bay_id = Set(None);
    am.slot_time = Set(None);
    am.current_step = Set(WizardStep::Vehicle.as_i32());
    touch(&mut am, Utc::now());
    let updated = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(updated)
}

pub(crate) async fn complete_draft_on<C: ConnectionTrait>(
    conn: &C,
    current: draft::Model,
) -> Result<draft::Model, ServiceError> {
    let mut am: draft::ActiveModel = current.into();
    am.status = Set(DraftStatus::Completed);
    am.updated_at = Set(Utc::now().into());
    am.update(conn).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Terminal transition on successful booking creation.
pub async fn complete_draft(
    db: &DatabaseConnection,
    draft_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;
    complete_draft_on(db, current).await
}

/// Terminal transition for explicit abandonment.
pub async fn abandon_draft(
    db: &DatabaseConnection,
    draft_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;
    let mut am: draft::ActiveModel = current.into();
    am.status = Set(DraftStatus::Abandoned);
    am.updated_at = Set(Utc::now().into());
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Add a service to the draft's selection list. The first service selected
/// while no primary is set becomes the primary. Adding a service twice is a
/// no-op.
pub async fn add_service_to_draft(
    db: &DatabaseConnection,
    draft_id: Uuid,
    service_type_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;
    let svc = service_type::Entity::find_by_id(service_type_id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("service"))?;
    if !svc.active {
        return Err(ServiceError::Validation("service is inactive".into()));
    }

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    ensure_service_link(&txn, current.id, service_type_id).await?;
    let mut next = current.clone();
    if next.primary_service_id.is_none() {
        next.primary_service_id = Some(service_type_id);
    }
    let (step, _) = draft_progress(&next);
    let mut am: draft::ActiveModel = current.into();
    am.primary_service_id = Set(next.primary_service_id);
    am.current_step = Set(step);
    touch(&mut am, Utc::now());
    let updated = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(updated)
}

/// Remove one service from the selection list. Removing the primary promotes
/// the oldest remaining selection, if any.
pub async fn remove_service_from_draft(
    db: &DatabaseConnection,
    draft_id: Uuid,
    service_type_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;
    let link = draft_service::Entity::find()
        .filter(draft_service::Column::DraftId.eq(draft_id))
        .filter(draft_service::Column::ServiceTypeId.eq(service_type_id))
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("draft service"))?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    draft_service::Entity::delete_by_id(link.id)
        .exec(&txn)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let mut next = current.clone();
    if next.primary_service_id == Some(service_type_id) {
        let remaining = draft_service::Entity::find()
            .filter(draft_service::Column::DraftId.eq(draft_id))
            .order_by_asc(draft_service::Column::CreatedAt)
            .one(&txn)
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        next.primary_service_id = remaining.map(|l| l.service_type_id);
    }
    let (step, _) = draft_progress(&next);
    let mut am: draft::ActiveModel = current.into();
    am.primary_service_id = Set(next.primary_service_id);
    am.current_step = Set(step);
    touch(&mut am, Utc::now());
    let updated = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(updated)
}

/// Empty the selection list and clear the primary service.
pub async fn clear_draft_services(
    db: &DatabaseConnection,
    draft_id: Uuid,
) -> Result<draft::Model, ServiceError> {
    let current = load_in_progress(db, draft_id).await?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let removed = delete_service_links(&txn, current.id).await?;
    if removed == 0 && current.primary_service_id.is_none() {
        txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
        return Ok(current);
    }
    let mut next = current.clone();
    next.primary_service_id = None;
    let (step, _) = draft_progress(&next);
    let mut am: draft::ActiveModel = current.into();
    am.primary_service_id = Set(None);
    am.current_step = Set(step);
    touch(&mut am, Utc::now());
    let updated = am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(updated)
}

/// The draft's selected services in insertion order.
pub async fn get_draft_services(
    db: &DatabaseConnection,
    draft_id: Uuid,
) -> Result<Vec<draft_service::Model>, ServiceError> {
    draft_service::Entity::find()
        .filter(draft_service::Column::DraftId.eq(draft_id))
        .order_by_asc(draft_service::Column::CreatedAt)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// A customer's drafts, newest first.
pub async fn list_drafts_by_customer_paginated(
    db: &DatabaseConnection,
    customer_id: Uuid,
    opts: Pagination,
) -> Result<Vec<draft::Model>, ServiceError> {
    let (page_idx, per_page) = opts.normalize();
    draft::Entity::find()
        .filter(draft::Column::CustomerId.eq(customer_id))
        .order_by_desc(draft::Column::CreatedAt)
        .paginate(db, per_page)
        .fetch_page(page_idx)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Abandon every in-progress draft that expired or has been inactive past
/// the TTL. Invoked by the periodic sweep; best effort against concurrent
/// edits.
pub async fn sweep_expired_drafts(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<u64, ServiceError> {
    let cutoff = now - Duration::hours(DRAFT_TTL_HOURS);
    let expired = draft::Entity::find()
        .filter(draft::Column::Status.eq(DraftStatus::InProgress))
        .filter(
            Condition::any()
                .add(draft::Column::ExpiresAt.lt(now))
                .add(draft::Column::LastActivityAt.lt(cutoff)),
        )
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;

    let txn = db.begin().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    let mut swept = 0u64;
    for d in expired {
        let mut am: draft::ActiveModel = d.into();
        am.status = Set(DraftStatus::Abandoned);
        am.updated_at = Set(Utc::now().into());
        am.update(&txn).await.map_err(|e| ServiceError::Db(e.to_string()))?;
        swept += 1;
    }
    txn.commit().await.map_err(|e| ServiceError::Db(e.to_string()))?;
    if swept > 0 {
        info!(swept, "swept_expired_drafts");
    }
    Ok(swept)
}

/// Hard-delete abandoned drafts older than the retention window.
pub async fn purge_abandoned_drafts(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    retention_days: u32,
) -> Result<u64, ServiceError> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    let res = draft::Entity::delete_many()
        .filter(draft::Column::Status.eq(DraftStatus::Abandoned))
        .filter(draft::Column::UpdatedAt.lt(cutoff))
        .exec(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?;
    if res.rows_affected > 0 {
        info!(purged = res.rows_affected, "purged_abandoned_drafts");
    }
    Ok(res.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get_db, seed_bay, seed_service};

    fn blank_draft() -> draft::Model {
        let now = Utc::now();
        draft::Model {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            customer_id: None,
            current_step: 1,
            vehicle_id: None,
            preferred_date: None,
            branch_id: None,
            primary_service_id: None,
            bay_id: None,
            slot_time: None,
            status: DraftStatus::InProgress,
            expires_at: (now + Duration::hours(24)).into(),
            last_activity_at: now.into(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn cascade_picks_highest_priority_rule_only() {
        // branch beats date even when both changed
        let cleared = cascade_targets(&[ChainField::Date, ChainField::Branch]);
        assert_eq!(
            cleared,
            &[ChainField::Service, ChainField::Bay, ChainField::Time, ChainField::Date]
        );
        assert_eq!(cascade_targets(&[ChainField::Bay]), &[ChainField::Time]);
        assert!(cascade_targets(&[ChainField::Time]).is_empty());
        assert!(cascade_targets(&[ChainField::Vehicle]).is_empty());
        assert!(cascade_targets(&[]).is_empty());
    }

    #[test]
    fn progress_walks_the_chain_in_step_order() {
        let mut d = blank_draft();
        let (step, missing) = draft_progress(&d);
        assert_eq!(step, 1);
        assert_eq!(missing, vec!["vehicle", "branch", "date", "service", "bay", "time"]);

        d.vehicle_id = Some(Uuid::new_v4());
        d.branch_id = Some(Uuid::new_v4());
        let (step, missing) = draft_progress(&d);
        assert_eq!(step, WizardStep::Date.as_i32());
        assert_eq!(missing, vec!["date", "service", "bay", "time"]);

        d.preferred_date = NaiveDate::from_ymd_opt(2024, 6, 3);
        d.primary_service_id = Some(Uuid::new_v4());
        d.bay_id = Some(Uuid::new_v4());
        d.slot_time = NaiveTime::from_hms_opt(9, 0, 0);
        let (step, missing) = draft_progress(&d);
        assert_eq!(step, WizardStep::Ready.as_i32());
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn bay_change_clears_time_only() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay_a) = seed_bay(&db, 8, 18).await?;
        let bay_b = models::bay::create(&db, branch.id, "bay-b", 8, 18).await?;
        let svc = seed_service(&db, 60).await?;
        let session = format!("sess_{}", Uuid::new_v4());
        let vehicle = Uuid::new_v4();

        get_or_create_draft(&db, &session, None).await?;
        let full = update_draft(
            &db,
            &session,
            DraftPatch {
                vehicle_id: Some(vehicle),
                branch_id: Some(branch.id),
                preferred_date: NaiveDate::from_ymd_opt(2024, 6, 10),
                service_id: Some(svc.id),
                bay_id: Some(bay_a.id),
                slot_time: NaiveTime::from_hms_opt(9, 0, 0),
            },
        )
        .await?;
        assert_eq!(full.draft.current_step, WizardStep::Ready.as_i32());
        assert!(full.missing_data.is_empty());

        let out = update_draft(
            &db,
            &session,
            DraftPatch { bay_id: Some(bay_b.id), ..Default::default() },
        )
        .await?;
        let d = &out.draft;
        assert_eq!(d.bay_id, Some(bay_b.id));
        assert_eq!(d.slot_time, None);
        assert_eq!(d.vehicle_id, Some(vehicle));
        assert_eq!(d.branch_id, Some(branch.id));
        assert_eq!(d.primary_service_id, Some(svc.id));
        assert_eq!(d.preferred_date, NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(d.current_step, WizardStep::Time.as_i32());
        assert_eq!(out.missing_data, vec!["time"]);
        Ok(())
    }

    #[tokio::test]
    async fn branch_change_cascades_to_select_date() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch_a, bay) = seed_bay(&db, 8, 18).await?;
        let branch_b = models::branch::create(&db, &format!("branch_{}", Uuid::new_v4())).await?;
        let svc = seed_service(&db, 45).await?;
        let session = format!("sess_{}", Uuid::new_v4());

        get_or_create_draft(&db, &session, None).await?;
        update_draft(
            &db,
            &session,
            DraftPatch {
                vehicle_id: Some(Uuid::new_v4()),
                branch_id: Some(branch_a.id),
                preferred_date: NaiveDate::from_ymd_opt(2024, 6, 11),
                service_id: Some(svc.id),
                bay_id: Some(bay.id),
                slot_time: NaiveTime::from_hms_opt(10, 0, 0),
            },
        )
        .await?;

        let out = update_draft(
            &db,
            &session,
            DraftPatch { branch_id: Some(branch_b.id), ..Default::default() },
        )
        .await?;
        let d = &out.draft;
        assert_eq!(d.branch_id, Some(branch_b.id));
        assert_eq!(d.preferred_date, None);
        assert_eq!(d.primary_service_id, None);
        assert_eq!(d.bay_id, None);
        assert_eq!(d.slot_time, None);
        assert_eq!(d.current_step, WizardStep::Date.as_i32());
        // the selection list was purged along with the primary
        assert!(get_draft_services(&db, d.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn noop_update_does_not_renew_ttl() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, _) = seed_bay(&db, 8, 18).await?;
        let session = format!("sess_{}", Uuid::new_v4());

        get_or_create_draft(&db, &session, None).await?;
        let first = update_draft(
            &db,
            &session,
            DraftPatch { branch_id: Some(branch.id), ..Default::default() },
        )
        .await?;

        let second = update_draft(
            &db,
            &session,
            DraftPatch { branch_id: Some(branch.id), ..Default::default() },
        )
        .await?;
        assert_eq!(second.draft.expires_at, first.draft.expires_at);
        assert_eq!(second.draft.last_activity_at, first.draft.last_activity_at);
        Ok(())
    }

    #[tokio::test]
    async fn reset_is_idempotent() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let (branch, bay) = seed_bay(&db, 8, 18).await?;
        let svc = seed_service(&db, 30).await?;
        let session = format!("sess_{}", Uuid::new_v4());

        let created = get_or_create_draft(&db, &session, None).await?;
        update_draft(
            &db,
            &session,
            DraftPatch {
                vehicle_id: Some(Uuid::new_v4()),
                branch_id: Some(branch.id),
                preferred_date: NaiveDate::from_ymd_opt(2024, 6, 12),
                service_id: Some(svc.id),
                bay_id: Some(bay.id),
                slot_time: NaiveTime::from_hms_opt(11, 0, 0),
            },
        )
        .await?;

        let once = reset_draft(&db, created.id).await?;
        let twice = reset_draft(&db, created.id).await?;
        for d in [&once, &twice] {
            assert_eq!(d.status, DraftStatus::InProgress);
            assert_eq!(d.current_step, WizardStep::Vehicle.as_i32());
            assert_eq!(d.vehicle_id, None);
            assert_eq!(d.branch_id, None);
            assert_eq!(d.preferred_date, None);
            assert_eq!(d.primary_service_id, None);
            assert_eq!(d.bay_id, None);
            assert_eq!(d.slot_time, None);
        }
        assert!(get_draft_services(&db, created.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn customer_keeps_a_single_active_draft() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let customer = Uuid::new_v4();
        let session_a = format!("sess_{}", Uuid::new_v4());
        let session_b = format!("sess_{}", Uuid::new_v4());

        let first = get_or_create_draft(&db, &session_a, Some(customer)).await?;
        // same session returns the same draft
        let again = get_or_create_draft(&db, &session_a, Some(customer)).await?;
        assert_eq!(again.id, first.id);

        let second = get_or_create_draft(&db, &session_b, Some(customer)).await?;
        assert_ne!(second.id, first.id);

        let superseded = draft::Entity::find_by_id(first.id).one(&db).await?.unwrap();
        assert_eq!(superseded.status, DraftStatus::Abandoned);
        assert_eq!(get_draft_by_session(&db, &session_a).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn service_list_tracks_primary() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let svc_a = seed_service(&db, 30).await?;
        let svc_b = seed_service(&db, 60).await?;
        let session = format!("sess_{}", Uuid::new_v4());

        let d = get_or_create_draft(&db, &session, None).await?;
        let d = add_service_to_draft(&db, d.id, svc_a.id).await?;
        assert_eq!(d.primary_service_id, Some(svc_a.id));
        let d = add_service_to_draft(&db, d.id, svc_b.id).await?;
        // the first selection stays primary
        assert_eq!(d.primary_service_id, Some(svc_a.id));
        assert_eq!(get_draft_services(&db, d.id).await?.len(), 2);

        // adding again is a no-op
        let d = add_service_to_draft(&db, d.id, svc_b.id).await?;
        assert_eq!(get_draft_services(&db, d.id).await?.len(), 2);

        let d = remove_service_from_draft(&db, d.id, svc_a.id).await?;
        assert_eq!(d.primary_service_id, Some(svc_b.id));

        let d = clear_draft_services(&db, d.id).await?;
        assert_eq!(d.primary_service_id, None);
        assert!(get_draft_services(&db, d.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn sweep_abandons_expired_drafts() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let session = format!("sess_{}", Uuid::new_v4());
        let d = get_or_create_draft(&db, &session, None).await?;

        // age the draft past its expiry
        let stale = Utc::now() - Duration::hours(25);
        let mut am: draft::ActiveModel = d.clone().into();
        am.expires_at = Set(stale.into());
        am.last_activity_at = Set(stale.into());
        am.update(&db).await?;

        let swept = sweep_expired_drafts(&db, Utc::now()).await?;
        assert!(swept >= 1);
        let reloaded = draft::Entity::find_by_id(d.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.status, DraftStatus::Abandoned);

        // old enough abandoned drafts get purged
        let mut am: draft::ActiveModel = reloaded.into();
        am.updated_at = Set((Utc::now() - Duration::days(31)).into());
        am.update(&db).await?;
        let purged = purge_abandoned_drafts(&db, Utc::now(), 30).await?;
        assert!(purged >= 1);
        assert!(draft::Entity::find_by_id(d.id).one(&db).await?.is_none());
        Ok(())
    }
}
