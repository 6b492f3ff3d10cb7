//! Vacation and time-off requests, plus daily attendance marks.

use chrono::{DateTime, NaiveDate, Utc};
use entity::{attendance, employee, vacation_request};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LeaveError {
    #[error("employee not found")]
    EmployeeNotFound,
    #[error("request not found")]
    RequestNotFound,
    #[error("end date is before start date")]
    InvalidRange,
    #[error("dates overlap an existing request")]
    Overlap,
    #[error("only pending requests can be decided")]
    NotPending,
    #[error("request can no longer be cancelled")]
    NotCancellable,
    #[error("already checked in for {0}")]
    AlreadyCheckedIn(NaiveDate),
    #[error("no open check-in for {0}")]
    NotCheckedIn(NaiveDate),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Calendar days between `start` and `end`, both ends included.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Result<i32, LeaveError> {
    if end < start {
        return Err(LeaveError::InvalidRange);
    }
    Ok((end - start).num_days() as i32 + 1)
}

pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

pub fn worked_minutes(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i32 {
    (check_out - check_in).num_minutes().max(0) as i32
}

pub async fn request_vacation(
    db: &DatabaseConnection,
    employee_id: Uuid,
    kind: vacation_request::Kind,
    start_date: NaiveDate,
    end_date: NaiveDate,
    comment: Option<String>,
) -> Result<vacation_request::Model, LeaveError> {
    let days = inclusive_days(start_date, end_date)?;
    employee::Entity::find_by_id(employee_id)
        .one(db)
        .await?
        .ok_or(LeaveError::EmployeeNotFound)?;

    let active = vacation_request::Entity::find()
        .filter(vacation_request::Column::EmployeeId.eq(employee_id))
        .filter(vacation_request::Column::Status.is_in([
            vacation_request::Status::Pending,
            vacation_request::Status::Approved,
        ]))
        .all(db)
        .await?;
    if active
        .iter()
        .any(|r| ranges_overlap(r.start_date, r.end_date, start_date, end_date))
    {
        return Err(LeaveError::Overlap);
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = vacation_request::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        kind: Set(kind),
        start_date: Set(start_date),
        end_date: Set(end_date),
        days: Set(days),
        status: Set(vacation_request::Status::Pending),
        comment: Set(comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())),
        decided_by: Set(None),
        decided_at: Set(None),
        created_at: Set(now),
    };
    let inserted = model.insert(db).await?;
    info!(%employee_id, request_id = %inserted.id, days, "leave requested");
    Ok(inserted)
}

pub async fn decide_vacation(
    db: &DatabaseConnection,
    request_id: Uuid,
    approve: bool,
    actor: Uuid,
) -> Result<vacation_request::Model, LeaveError> {
    let existing = vacation_request::Entity::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or(LeaveError::RequestNotFound)?;
    if existing.status != vacation_request::Status::Pending {
        return Err(LeaveError::NotPending);
    }
    let next = if approve {
        vacation_request::Status::Approved
    } else {
        vacation_request::Status::Rejected
    };
    let mut active: vacation_request::ActiveModel = existing.into();
    active.status = Set(next);
    active.decided_by = Set(Some(actor));
    active.decided_at = Set(Some(Utc::now().into()));
    let updated = active.update(db).await?;
    info!(%request_id, status = ?next, "leave request decided");
    Ok(updated)
}

pub async fn cancel_vacation(
    db: &DatabaseConnection,
    request_id: Uuid,
) -> Result<vacation_request::Model, LeaveError> {
    let existing = vacation_request::Entity::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or(LeaveError::RequestNotFound)?;
    if !matches!(
        existing.status,
        vacation_request::Status::Pending | vacation_request::Status::Approved
    ) {
        return Err(LeaveError::NotCancellable);
    }
    let mut active: vacation_request::ActiveModel = existing.into();
    active.status = Set(vacation_request::Status::Cancelled);
    Ok(active.update(db).await?)
}

pub async fn list_vacations(
    db: &DatabaseConnection,
    employee_id: Option<Uuid>,
    status: Option<vacation_request::Status>,
    limit: u64,
) -> Result<Vec<vacation_request::Model>, DbErr> {
    let mut query = vacation_request::Entity::find();
    if let Some(employee_id) = employee_id {
        query = query.filter(vacation_request::Column::EmployeeId.eq(employee_id));
    }
    if let Some(status) = status {
        query = query.filter(vacation_request::Column::Status.eq(status));
    }
    query
        .order_by_desc(vacation_request::Column::StartDate)
        .limit(limit)
        .all(db)
        .await
}

async fn attendance_on(
    db: &DatabaseConnection,
    employee_id: Uuid,
    work_date: NaiveDate,
) -> Result<Option<attendance::Model>, DbErr> {
    attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::WorkDate.eq(work_date))
        .one(db)
        .await
}

pub async fn check_in(
    db: &DatabaseConnection,
    employee_id: Uuid,
    at: DateTime<Utc>,
) -> Result<attendance::Model, LeaveError> {
    let work_date = at.date_naive();
    employee::Entity::find_by_id(employee_id)
        .one(db)
        .await?
        .ok_or(LeaveError::EmployeeNotFound)?;
    if attendance_on(db, employee_id, work_date).await?.is_some() {
        return Err(LeaveError::AlreadyCheckedIn(work_date));
    }
    let model = attendance::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        work_date: Set(work_date),
        check_in: Set(at.into()),
        check_out: Set(None),
        worked_minutes: Set(None),
    };
    Ok(model.insert(db).await?)
}

pub async fn check_out(
    db: &DatabaseConnection,
    employee_id: Uuid,
    at: DateTime<Utc>,
) -> Result<attendance::Model, LeaveError> {
    let work_date = at.date_naive();
    let open = attendance_on(db, employee_id, work_date)
        .await?
        .filter(|row| row.check_out.is_none())
        .ok_or(LeaveError::NotCheckedIn(work_date))?;
    let started: DateTime<Utc> = open.check_in.with_timezone(&Utc);
    let minutes = worked_minutes(started, at);
    let mut active: attendance::ActiveModel = open.into();
    active.check_out = Set(Some(at.into()));
    active.worked_minutes = Set(Some(minutes));
    Ok(active.update(db).await?)
}

pub async fn list_attendance(
    db: &DatabaseConnection,
    employee_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<attendance::Model>, DbErr> {
    attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::WorkDate.gte(from))
        .filter(attendance::Column::WorkDate.lte(to))
        .order_by_asc(attendance::Column::WorkDate)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_include_both_ends() {
        assert_eq!(inclusive_days(date(2026, 7, 1), date(2026, 7, 14)).unwrap(), 14);
        assert_eq!(inclusive_days(date(2026, 7, 1), date(2026, 7, 1)).unwrap(), 1);
        assert!(matches!(
            inclusive_days(date(2026, 7, 2), date(2026, 7, 1)),
            Err(LeaveError::InvalidRange)
        ));
    }

    #[test]
    fn touching_ranges_overlap() {
        let (a, b) = (date(2026, 7, 1), date(2026, 7, 10));
        assert!(ranges_overlap(a, b, date(2026, 7, 10), date(2026, 7, 20)));
        assert!(ranges_overlap(a, b, date(2026, 6, 1), date(2026, 8, 1)));
        assert!(!ranges_overlap(a, b, date(2026, 7, 11), date(2026, 7, 20)));
    }

    #[test]
    fn worked_minutes_never_negative() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 17, 45, 30).unwrap();
        assert_eq!(worked_minutes(start, end), 525);
        assert_eq!(worked_minutes(end, start), 0);
    }
}
