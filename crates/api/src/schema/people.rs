use async_graphql::{Context, Error, InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{department, employee, employment_history, position};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{info_span, Instrument};

use super::processes::ProcessNode;
use super::{
    conflict, database, db_error, enforce_page, id_of, not_found,
    parse_optional_id, parse_uuid, require_role, require_viewer, validation_error,
    EmployeeStatus, EmploymentEvent, LifecycleStage,
};
use crate::auth::UserRole;
use crate::people::{self, EmployeeChanges, EmployeeFilter, NewEmployee, OrgNode, PeopleError};

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Department")]
pub struct DepartmentNode {
    pub id: ID,
    pub name: String,
    #[graphql(name = "parentId")]
    pub parent_id: Option<ID>,
    #[graphql(name = "headEmployeeId")]
    pub head_employee_id: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<department::Model> for DepartmentNode {
    fn from(model: department::Model) -> Self {
        Self {
            id: id_of(model.id),
            name: model.name,
            parent_id: model.parent_id.map(id_of),
            head_employee_id: model.head_employee_id.map(id_of),
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Position")]
pub struct PositionNode {
    pub id: ID,
    pub title: String,
    #[graphql(name = "departmentId")]
    pub department_id: ID,
    pub salary: Option<i64>,
    pub headcount: i32,
    pub occupied: i32,
    #[graphql(name = "hasVacancy")]
    pub has_vacancy: bool,
}

impl From<position::Model> for PositionNode {
    fn from(model: position::Model) -> Self {
        Self {
            has_vacancy: model.has_vacancy(),
            id: id_of(model.id),
            title: model.title,
            department_id: id_of(model.department_id),
            salary: model.salary,
            headcount: model.headcount,
            occupied: model.occupied,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Employee")]
pub struct EmployeeNode {
    pub id: ID,
    #[graphql(name = "personnelNumber")]
    pub personnel_number: Option<String>,
    #[graphql(name = "firstName")]
    pub first_name: String,
    #[graphql(name = "lastName")]
    pub last_name: String,
    #[graphql(name = "middleName")]
    pub middle_name: Option<String>,
    #[graphql(name = "fullName")]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[graphql(name = "birthDate")]
    pub birth_date: Option<NaiveDate>,
    #[graphql(name = "hireDate")]
    pub hire_date: Option<NaiveDate>,
    #[graphql(name = "terminationDate")]
    pub termination_date: Option<NaiveDate>,
    pub status: EmployeeStatus,
    #[graphql(name = "lifecycleStage")]
    pub lifecycle_stage: LifecycleStage,
    #[graphql(name = "positionId")]
    pub position_id: Option<ID>,
    #[graphql(name = "departmentId")]
    pub department_id: Option<ID>,
    pub salary: Option<i64>,
    pub address: Option<String>,
    #[graphql(name = "profileCompletion")]
    pub profile_completion: i32,
    #[graphql(name = "userId")]
    pub user_id: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<employee::Model> for EmployeeNode {
    fn from(model: employee::Model) -> Self {
        Self {
            full_name: model.full_name(),
            id: id_of(model.id),
            personnel_number: model.personnel_number,
            first_name: model.first_name,
            last_name: model.last_name,
            middle_name: model.middle_name,
            email: model.email,
            phone: model.phone,
            birth_date: model.birth_date,
            hire_date: model.hire_date,
            termination_date: model.termination_date,
            status: model.status.into(),
            lifecycle_stage: model.lifecycle_stage.into(),
            position_id: model.position_id.map(id_of),
            department_id: model.department_id.map(id_of),
            salary: model.salary,
            address: model.address,
            profile_completion: model.profile_completion,
            user_id: model.user_id.map(id_of),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "EmploymentHistoryEntry")]
pub struct EmploymentHistoryNode {
    pub id: ID,
    pub kind: EmploymentEvent,
    #[graphql(name = "positionId")]
    pub position_id: Option<ID>,
    pub note: Option<String>,
    #[graphql(name = "effectiveDate")]
    pub effective_date: NaiveDate,
    #[graphql(name = "createdBy")]
    pub created_by: Option<ID>,
}

impl From<employment_history::Model> for EmploymentHistoryNode {
    fn from(model: employment_history::Model) -> Self {
        Self {
            id: id_of(model.id),
            kind: model.kind.into(),
            position_id: model.position_id.map(id_of),
            note: model.note,
            effective_date: model.effective_date,
            created_by: model.created_by.map(id_of),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrgUnit {
    pub department: DepartmentNode,
    pub positions: Vec<PositionNode>,
    pub headcount: i32,
    pub occupied: i32,
    pub children: Vec<OrgUnit>,
}

impl From<OrgNode> for OrgUnit {
    fn from(node: OrgNode) -> Self {
        Self {
            department: node.department.into(),
            positions: node.positions.into_iter().map(PositionNode::from).collect(),
            headcount: node.headcount,
            occupied: node.occupied,
            children: node.children.into_iter().map(OrgUnit::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ReleasePayload {
    pub employee: EmployeeNode,
    /// Null when the offboarding checklist could not be started.
    pub offboarding: Option<ProcessNode>,
}

#[derive(InputObject, Default, Clone)]
pub struct EmployeeFilterInput {
    pub status: Option<EmployeeStatus>,
    #[graphql(name = "lifecycleStage")]
    pub lifecycle_stage: Option<LifecycleStage>,
    #[graphql(name = "departmentId")]
    pub department_id: Option<ID>,
    pub q: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct NewEmployeeInput {
    #[graphql(name = "firstName")]
    pub first_name: String,
    #[graphql(name = "lastName")]
    pub last_name: String,
    #[graphql(name = "middleName")]
    pub middle_name: Option<String>,
    #[graphql(name = "personnelNumber")]
    pub personnel_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[graphql(name = "birthDate")]
    pub birth_date: Option<NaiveDate>,
    #[graphql(name = "hireDate")]
    pub hire_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub salary: Option<i64>,
    #[graphql(name = "positionId")]
    pub position_id: Option<ID>,
    #[graphql(name = "departmentId")]
    pub department_id: Option<ID>,
    #[graphql(name = "userId")]
    pub user_id: Option<ID>,
}

#[derive(InputObject, Clone)]
pub struct UpdateEmployeeInput {
    pub id: ID,
    #[graphql(name = "firstName")]
    pub first_name: Option<String>,
    #[graphql(name = "lastName")]
    pub last_name: Option<String>,
    #[graphql(name = "middleName")]
    pub middle_name: Option<String>,
    #[graphql(name = "personnelNumber")]
    pub personnel_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[graphql(name = "birthDate")]
    pub birth_date: Option<NaiveDate>,
    #[graphql(name = "hireDate")]
    pub hire_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub salary: Option<i64>,
    pub status: Option<EmployeeStatus>,
    #[graphql(name = "userId")]
    pub user_id: Option<ID>,
}

pub(super) fn people_error(err: PeopleError) -> Error {
    match err {
        PeopleError::EmployeeNotFound => not_found("Employee not found"),
        PeopleError::PositionNotFound => not_found("Position not found"),
        PeopleError::DepartmentNotFound => not_found("Department not found"),
        PeopleError::PositionFull => conflict("Position has no free seats"),
        PeopleError::AlreadyReleased => conflict("Employee is already released"),
        PeopleError::Validation(message) => validation_error(message),
        PeopleError::Db(e) => db_error(e),
    }
}

#[derive(Default)]
pub struct PeopleQuery;

#[Object]
impl PeopleQuery {
    async fn employees(
        &self,
        ctx: &Context<'_>,
        filter: Option<EmployeeFilterInput>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<EmployeeNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let limit = enforce_page(first)?;
        let skip = offset.unwrap_or(0).max(0) as u64;
        let filter = filter.unwrap_or_default();
        let filter = EmployeeFilter {
            status: filter.status.map(Into::into),
            lifecycle_stage: filter.lifecycle_stage.map(Into::into),
            department_id: parse_optional_id("departmentId", filter.department_id.as_ref())?,
            q: filter.q,
        };
        let records = people::list_employees(db.as_ref(), &filter, limit, skip)
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(EmployeeNode::from).collect())
    }

    async fn employee(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<EmployeeNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&id)?;
        let record = employee::Entity::find_by_id(employee_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(record.map(EmployeeNode::from))
    }

    async fn employment_history(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: ID,
    ) -> async_graphql::Result<Vec<EmploymentHistoryNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        let rows = people::employment_history(db.as_ref(), employee_id)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(EmploymentHistoryNode::from).collect())
    }

    async fn departments(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<DepartmentNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let rows = department::Entity::find()
            .order_by_asc(department::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(DepartmentNode::from).collect())
    }

    async fn org_structure(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<OrgUnit>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let tree = people::org_tree(db.as_ref()).await.map_err(db_error)?;
        Ok(tree.into_iter().map(OrgUnit::from).collect())
    }

    async fn positions(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "departmentId")] department_id: Option<ID>,
        #[graphql(name = "vacantOnly", default)] vacant_only: bool,
    ) -> async_graphql::Result<Vec<PositionNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let mut query = position::Entity::find();
        if let Some(dept) = parse_optional_id("departmentId", department_id.as_ref())? {
            query = query.filter(position::Column::DepartmentId.eq(dept));
        }
        let rows = query
            .order_by_asc(position::Column::Title)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows
            .into_iter()
            .filter(|p| !vacant_only || p.has_vacancy())
            .map(PositionNode::from)
            .collect())
    }
}

#[derive(Default)]
pub struct PeopleMutation;

#[Object]
impl PeopleMutation {
    async fn create_department(
        &self,
        ctx: &Context<'_>,
        name: String,
        #[graphql(name = "parentId")] parent_id: Option<ID>,
    ) -> async_graphql::Result<DepartmentNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let parent_id = parse_optional_id("parentId", parent_id.as_ref())?;
        let created = people::create_department(db.as_ref(), &name, parent_id)
            .instrument(info_span!("hr.people.create_department"))
            .await
            .map_err(people_error)?;
        Ok(created.into())
    }

    async fn create_position(
        &self,
        ctx: &Context<'_>,
        title: String,
        #[graphql(name = "departmentId")] department_id: ID,
        salary: Option<i64>,
        #[graphql(default = 1)] headcount: i32,
    ) -> async_graphql::Result<PositionNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let department_id = parse_uuid(&department_id)?;
        let created =
            people::create_position(db.as_ref(), &title, department_id, salary, headcount)
                .await
                .map_err(people_error)?;
        Ok(created.into())
    }

    async fn create_employee(
        &self,
        ctx: &Context<'_>,
        input: NewEmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let input = NewEmployee {
            position_id: parse_optional_id("positionId", input.position_id.as_ref())?,
            department_id: parse_optional_id("departmentId", input.department_id.as_ref())?,
            user_id: parse_optional_id("userId", input.user_id.as_ref())?,
            first_name: input.first_name,
            last_name: input.last_name,
            middle_name: input.middle_name,
            personnel_number: input.personnel_number,
            email: input.email,
            phone: input.phone,
            birth_date: input.birth_date,
            hire_date: input.hire_date,
            address: input.address,
            salary: input.salary,
        };
        let created = people::create_employee(db.as_ref(), input, Some(current.user_id))
            .instrument(info_span!("hr.people.create_employee", actor = %current.user_id))
            .await
            .map_err(people_error)?;
        Ok(created.into())
    }

    async fn update_employee(
        &self,
        ctx: &Context<'_>,
        input: UpdateEmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&input.id)?;
        let changes = EmployeeChanges {
            user_id: parse_optional_id("userId", input.user_id.as_ref())?,
            first_name: input.first_name,
            last_name: input.last_name,
            middle_name: input.middle_name,
            personnel_number: input.personnel_number,
            email: input.email,
            phone: input.phone,
            birth_date: input.birth_date,
            hire_date: input.hire_date,
            address: input.address,
            salary: input.salary,
            status: input.status.map(Into::into),
        };
        let updated = people::update_employee(db.as_ref(), employee_id, changes)
            .await
            .map_err(people_error)?;
        Ok(updated.into())
    }

    async fn assign_position(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: ID,
        #[graphql(name = "positionId")] position_id: ID,
        #[graphql(name = "effectiveDate")] effective_date: Option<NaiveDate>,
    ) -> async_graphql::Result<EmployeeNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        let position_id = parse_uuid(&position_id)?;
        let updated = people::assign_position(
            db.as_ref(),
            employee_id,
            position_id,
            effective_date.unwrap_or_else(|| Utc::now().date_naive()),
            Some(current.user_id),
        )
        .instrument(info_span!("hr.people.assign_position", %employee_id, %position_id))
        .await
        .map_err(people_error)?;
        Ok(updated.into())
    }

    async fn release_employee(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: ID,
        #[graphql(name = "terminationDate")] termination_date: Option<NaiveDate>,
        reason: Option<String>,
    ) -> async_graphql::Result<ReleasePayload> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        if reason.as_deref().is_some_and(|r| r.chars().count() > 2000) {
            return Err(validation_error("reason must be at most 2000 characters"));
        }
        let released = people::release_employee(
            db.as_ref(),
            employee_id,
            termination_date.unwrap_or_else(|| Utc::now().date_naive()),
            reason,
            Some(current.user_id),
        )
        .instrument(info_span!("hr.people.release_employee", %employee_id))
        .await
        .map_err(people_error)?;
        Ok(ReleasePayload {
            employee: released.employee.into(),
            offboarding: released
                .offboarding
                .map(ProcessNode::try_from)
                .transpose()?,
        })
    }
}
