use async_graphql::{Context, Error, InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use entity::{attendance, vacation_request};
use sea_orm::EntityTrait;
use tracing::{info_span, Instrument};

use super::{
    acting_employee, conflict, database, db_error, enforce_page, error_with_code, id_of,
    not_found, parse_optional_id, parse_uuid, require_role, require_viewer, validation_error,
    LeaveKind, LeaveStatus,
};
use crate::auth::UserRole;
use crate::leave::{self, LeaveError};

const DEFAULT_ATTENDANCE_DAYS: i64 = 31;
const MAX_ATTENDANCE_DAYS: i64 = 366;

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "VacationRequest")]
pub struct VacationRequestNode {
    pub id: ID,
    #[graphql(name = "employeeId")]
    pub employee_id: ID,
    pub kind: LeaveKind,
    #[graphql(name = "startDate")]
    pub start_date: NaiveDate,
    #[graphql(name = "endDate")]
    pub end_date: NaiveDate,
    pub days: i32,
    pub status: LeaveStatus,
    pub comment: Option<String>,
    #[graphql(name = "decidedBy")]
    pub decided_by: Option<ID>,
    #[graphql(name = "decidedAt")]
    pub decided_at: Option<DateTime<Utc>>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<vacation_request::Model> for VacationRequestNode {
    fn from(model: vacation_request::Model) -> Self {
        Self {
            id: id_of(model.id),
            employee_id: id_of(model.employee_id),
            kind: model.kind.into(),
            start_date: model.start_date,
            end_date: model.end_date,
            days: model.days,
            status: model.status.into(),
            comment: model.comment,
            decided_by: model.decided_by.map(id_of),
            decided_at: model.decided_at.map(|d| d.into()),
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "AttendanceMark")]
pub struct AttendanceNode {
    pub id: ID,
    #[graphql(name = "employeeId")]
    pub employee_id: ID,
    #[graphql(name = "workDate")]
    pub work_date: NaiveDate,
    #[graphql(name = "checkIn")]
    pub check_in: DateTime<Utc>,
    #[graphql(name = "checkOut")]
    pub check_out: Option<DateTime<Utc>>,
    #[graphql(name = "workedMinutes")]
    pub worked_minutes: Option<i32>,
}

impl From<attendance::Model> for AttendanceNode {
    fn from(model: attendance::Model) -> Self {
        Self {
            id: id_of(model.id),
            employee_id: id_of(model.employee_id),
            work_date: model.work_date,
            check_in: model.check_in.into(),
            check_out: model.check_out.map(|d| d.into()),
            worked_minutes: model.worked_minutes,
        }
    }
}

#[derive(InputObject, Clone)]
pub struct VacationRequestInput {
    /// Defaults to the caller's own employee record.
    #[graphql(name = "employeeId")]
    pub employee_id: Option<ID>,
    pub kind: LeaveKind,
    #[graphql(name = "startDate")]
    pub start_date: NaiveDate,
    #[graphql(name = "endDate")]
    pub end_date: NaiveDate,
    pub comment: Option<String>,
}

pub(super) fn leave_error(err: LeaveError) -> Error {
    match err {
        LeaveError::EmployeeNotFound => not_found("Employee not found"),
        LeaveError::RequestNotFound => not_found("Leave request not found"),
        LeaveError::InvalidRange => validation_error("endDate must not be before startDate"),
        LeaveError::Overlap => conflict("Dates overlap an existing request"),
        LeaveError::NotPending => conflict("Only pending requests can be decided"),
        LeaveError::NotCancellable => conflict("Request can no longer be cancelled"),
        LeaveError::AlreadyCheckedIn(day) => conflict(format!("Already checked in on {day}")),
        LeaveError::NotCheckedIn(day) => conflict(format!("No open check-in on {day}")),
        LeaveError::Db(e) => db_error(e),
    }
}

#[derive(Default)]
pub struct LeaveQuery;

#[Object]
impl LeaveQuery {
    /// Managers see every request; everyone else sees their own.
    async fn vacation_requests(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: Option<ID>,
        status: Option<LeaveStatus>,
        first: Option<i32>,
    ) -> async_graphql::Result<Vec<VacationRequestNode>> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let limit = enforce_page(first)?;
        let employee_id = if current.has_role(UserRole::Manager) {
            parse_optional_id("employeeId", employee_id.as_ref())?
        } else {
            Some(acting_employee(&current, employee_id.as_ref())?)
        };
        let rows = leave::list_vacations(db.as_ref(), employee_id, status.map(Into::into), limit)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(VacationRequestNode::from).collect())
    }

    async fn attendance(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: Option<ID>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> async_graphql::Result<Vec<AttendanceNode>> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = match employee_id {
            Some(id) if current.has_role(UserRole::Manager) => parse_uuid(&id)?,
            other => acting_employee(&current, other.as_ref())?,
        };
        let to = to.unwrap_or_else(|| Utc::now().date_naive());
        let from = from.unwrap_or(to - Duration::days(DEFAULT_ATTENDANCE_DAYS - 1));
        if from > to {
            return Err(validation_error("from must not be after to"));
        }
        if (to - from).num_days() >= MAX_ATTENDANCE_DAYS {
            return Err(error_with_code(
                "LIMIT_EXCEEDED",
                format!("Cannot request more than {} days at once", MAX_ATTENDANCE_DAYS),
            ));
        }
        let rows = leave::list_attendance(db.as_ref(), employee_id, from, to)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(AttendanceNode::from).collect())
    }
}

#[derive(Default)]
pub struct LeaveMutation;

#[Object]
impl LeaveMutation {
    async fn request_vacation(
        &self,
        ctx: &Context<'_>,
        input: VacationRequestInput,
    ) -> async_graphql::Result<VacationRequestNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = acting_employee(&current, input.employee_id.as_ref())?;
        let created = leave::request_vacation(
            db.as_ref(),
            employee_id,
            input.kind.into(),
            input.start_date,
            input.end_date,
            input.comment,
        )
        .instrument(info_span!("hr.leave.request", %employee_id))
        .await
        .map_err(leave_error)?;
        Ok(created.into())
    }

    async fn decide_vacation(
        &self,
        ctx: &Context<'_>,
        id: ID,
        approve: bool,
    ) -> async_graphql::Result<VacationRequestNode> {
        let current = require_role(ctx, UserRole::Manager)?;
        let db = database(ctx)?;
        let request_id = parse_uuid(&id)?;
        let updated = leave::decide_vacation(db.as_ref(), request_id, approve, current.user_id)
            .instrument(info_span!("hr.leave.decide", %request_id, approve))
            .await
            .map_err(leave_error)?;
        Ok(updated.into())
    }

    async fn cancel_vacation(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<VacationRequestNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let request_id = parse_uuid(&id)?;
        let existing = vacation_request::Entity::find_by_id(request_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| not_found("Leave request not found"))?;
        if Some(existing.employee_id) != current.employee_id && !current.has_role(UserRole::Hr) {
            return Err(error_with_code(
                "FORBIDDEN",
                "Only HR can cancel another employee's request",
            ));
        }
        let updated = leave::cancel_vacation(db.as_ref(), request_id)
            .await
            .map_err(leave_error)?;
        Ok(updated.into())
    }

    async fn check_in(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: Option<ID>,
        at: Option<DateTime<Utc>>,
    ) -> async_graphql::Result<AttendanceNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = acting_employee(&current, employee_id.as_ref())?;
        let mark = leave::check_in(db.as_ref(), employee_id, at.unwrap_or_else(Utc::now))
            .await
            .map_err(leave_error)?;
        Ok(mark.into())
    }

    async fn check_out(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: Option<ID>,
        at: Option<DateTime<Utc>>,
    ) -> async_graphql::Result<AttendanceNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = acting_employee(&current, employee_id.as_ref())?;
        let mark = leave::check_out(db.as_ref(), employee_id, at.unwrap_or_else(Utc::now))
            .await
            .map_err(leave_error)?;
        Ok(mark.into())
    }
}
