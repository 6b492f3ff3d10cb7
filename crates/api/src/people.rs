//! Departments, positions and the employee record with its staffing moves.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use entity::{department, employee, employment_history, hr_process, position};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::progress;

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum PeopleError {
    #[error("employee not found")]
    EmployeeNotFound,
    #[error("position not found")]
    PositionNotFound,
    #[error("department not found")]
    DepartmentNotFound,
    #[error("position has no free seats")]
    PositionFull,
    #[error("employee is already released")]
    AlreadyReleased,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Share of the profile fields that are filled in, 0..=100.
pub fn profile_completion(model: &employee::Model) -> i32 {
    fn text(value: &Option<String>) -> bool {
        value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
    let filled = [
        !model.first_name.trim().is_empty(),
        !model.last_name.trim().is_empty(),
        text(&model.middle_name),
        text(&model.email),
        text(&model.phone),
        model.birth_date.is_some(),
        model.hire_date.is_some(),
        text(&model.address),
        model.position_id.is_some(),
        model.department_id.is_some(),
        text(&model.personnel_number),
    ];
    let done = filled.iter().filter(|f| **f).count();
    (100.0 * done as f64 / filled.len() as f64).round() as i32
}

fn required_name(field: &str, value: &str) -> Result<String, PeopleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PeopleError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(PeopleError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create_department(
    db: &DatabaseConnection,
    name: &str,
    parent_id: Option<Uuid>,
) -> Result<department::Model, PeopleError> {
    let name = required_name("name", name)?;
    if let Some(parent) = parent_id {
        department::Entity::find_by_id(parent)
            .one(db)
            .await?
            .ok_or(PeopleError::DepartmentNotFound)?;
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = department::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        parent_id: Set(parent_id),
        head_employee_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

pub async fn create_position(
    db: &DatabaseConnection,
    title: &str,
    department_id: Uuid,
    salary: Option<i64>,
    headcount: i32,
) -> Result<position::Model, PeopleError> {
    let title = required_name("title", title)?;
    if headcount < 1 {
        return Err(PeopleError::Validation("headcount must be at least 1".into()));
    }
    if salary.is_some_and(|s| s < 0) {
        return Err(PeopleError::Validation("salary cannot be negative".into()));
    }
    department::Entity::find_by_id(department_id)
        .one(db)
        .await?
        .ok_or(PeopleError::DepartmentNotFound)?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = position::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        department_id: Set(department_id),
        salary: Set(salary),
        headcount: Set(headcount),
        occupied: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

/// Takes one seat of `position_id`; fails when every seat is occupied.
async fn take_seat<C: ConnectionTrait>(conn: &C, position_id: Uuid) -> Result<(), PeopleError> {
    let result = position::Entity::update_many()
        .col_expr(
            position::Column::Occupied,
            Expr::col(position::Column::Occupied).add(1),
        )
        .filter(position::Column::Id.eq(position_id))
        .filter(Expr::col(position::Column::Occupied).lt(Expr::col(position::Column::Headcount)))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(PeopleError::PositionFull);
    }
    Ok(())
}

async fn free_seat<C: ConnectionTrait>(conn: &C, position_id: Uuid) -> Result<(), DbErr> {
    position::Entity::update_many()
        .col_expr(
            position::Column::Occupied,
            Expr::col(position::Column::Occupied).sub(1),
        )
        .filter(position::Column::Id.eq(position_id))
        .filter(position::Column::Occupied.gt(0))
        .exec(conn)
        .await?;
    Ok(())
}

async fn record_history<C: ConnectionTrait>(
    conn: &C,
    employee_id: Uuid,
    kind: employment_history::Kind,
    position_id: Option<Uuid>,
    note: Option<String>,
    effective_date: NaiveDate,
    actor: Option<Uuid>,
) -> Result<(), DbErr> {
    let row = employment_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        kind: Set(kind),
        position_id: Set(position_id),
        note: Set(note),
        effective_date: Set(effective_date),
        created_by: Set(actor),
        created_at: Set(Utc::now().into()),
    };
    employment_history::Entity::insert(row)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub personnel_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub hire_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub salary: Option<i64>,
    pub position_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// `None` leaves a field as it is.
#[derive(Clone, Debug, Default)]
pub struct EmployeeChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub personnel_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub hire_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub salary: Option<i64>,
    pub status: Option<employee::Status>,
    pub user_id: Option<Uuid>,
}

pub async fn create_employee(
    db: &DatabaseConnection,
    input: NewEmployee,
    actor: Option<Uuid>,
) -> Result<employee::Model, PeopleError> {
    let first_name = required_name("firstName", &input.first_name)?;
    let last_name = required_name("lastName", &input.last_name)?;
    let hire_date = input.hire_date.unwrap_or_else(|| Utc::now().date_naive());

    let txn = db.begin().await?;
    let mut department_id = input.department_id;
    let mut salary = input.salary;
    if let Some(position_id) = input.position_id {
        let seat = position::Entity::find_by_id(position_id)
            .one(&txn)
            .await?
            .ok_or(PeopleError::PositionNotFound)?;
        take_seat(&txn, position_id).await?;
        department_id = Some(seat.department_id);
        salary = salary.or(seat.salary);
    } else if let Some(dept) = department_id {
        department::Entity::find_by_id(dept)
            .one(&txn)
            .await?
            .ok_or(PeopleError::DepartmentNotFound)?;
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut model = employee::Model {
        id: Uuid::new_v4(),
        personnel_number: optional_text(input.personnel_number),
        first_name,
        last_name,
        middle_name: optional_text(input.middle_name),
        email: optional_text(input.email).map(|e| e.to_lowercase()),
        phone: optional_text(input.phone),
        birth_date: input.birth_date,
        hire_date: Some(hire_date),
        termination_date: None,
        status: employee::Status::Active,
        lifecycle_stage: employee::LifecycleStage::Onboarding,
        position_id: input.position_id,
        department_id,
        salary,
        address: optional_text(input.address),
        profile_completion: 0,
        user_id: input.user_id,
        created_at: now,
        updated_at: now,
    };
    model.profile_completion = profile_completion(&model);
    let active: employee::ActiveModel = model.into();
    let inserted = active.insert(&txn).await?;

    record_history(
        &txn,
        inserted.id,
        employment_history::Kind::Hired,
        inserted.position_id,
        None,
        hire_date,
        actor,
    )
    .await?;
    txn.commit().await?;
    info!(employee_id = %inserted.id, "employee hired");
    Ok(inserted)
}

pub async fn update_employee(
    db: &DatabaseConnection,
    employee_id: Uuid,
    changes: EmployeeChanges,
) -> Result<employee::Model, PeopleError> {
    let mut model = employee::Entity::find_by_id(employee_id)
        .one(db)
        .await?
        .ok_or(PeopleError::EmployeeNotFound)?;
    if let Some(value) = changes.first_name {
        model.first_name = required_name("firstName", &value)?;
    }
    if let Some(value) = changes.last_name {
        model.last_name = required_name("lastName", &value)?;
    }
    if changes.middle_name.is_some() {
        model.middle_name = optional_text(changes.middle_name);
    }
    if changes.personnel_number.is_some() {
        model.personnel_number = optional_text(changes.personnel_number);
    }
    if changes.email.is_some() {
        model.email = optional_text(changes.email).map(|e| e.to_lowercase());
    }
    if changes.phone.is_some() {
        model.phone = optional_text(changes.phone);
    }
    if changes.address.is_some() {
        model.address = optional_text(changes.address);
    }
    if let Some(value) = changes.birth_date {
        model.birth_date = Some(value);
    }
    if let Some(value) = changes.hire_date {
        model.hire_date = Some(value);
    }
    if let Some(value) = changes.salary {
        if value < 0 {
            return Err(PeopleError::Validation("salary cannot be negative".into()));
        }
        model.salary = Some(value);
    }
    if let Some(value) = changes.status {
        // Termination goes through `release_employee`, which frees the seat.
        if value == employee::Status::Terminated {
            return Err(PeopleError::Validation(
                "status TERMINATED is set by releasing the employee".into(),
            ));
        }
        if model.status == employee::Status::Terminated && value != model.status {
            return Err(PeopleError::AlreadyReleased);
        }
        model.status = value;
    }
    if let Some(value) = changes.user_id {
        model.user_id = Some(value);
    }
    model.profile_completion = profile_completion(&model);
    model.updated_at = Utc::now().into();

    // Every column is rewritten, so mark them all as changed.
    let active = employee::ActiveModel::from(model).reset_all();
    Ok(active.update(db).await?)
}

pub async fn assign_position(
    db: &DatabaseConnection,
    employee_id: Uuid,
    position_id: Uuid,
    effective_date: NaiveDate,
    actor: Option<Uuid>,
) -> Result<employee::Model, PeopleError> {
    let txn = db.begin().await?;
    let current = employee::Entity::find_by_id(employee_id)
        .one(&txn)
        .await?
        .ok_or(PeopleError::EmployeeNotFound)?;
    if current.status == employee::Status::Terminated {
        return Err(PeopleError::AlreadyReleased);
    }
    if current.position_id == Some(position_id) {
        txn.commit().await?;
        return Ok(current);
    }
    let target = position::Entity::find_by_id(position_id)
        .one(&txn)
        .await?
        .ok_or(PeopleError::PositionNotFound)?;

    if let Some(old) = current.position_id {
        free_seat(&txn, old).await?;
    }
    take_seat(&txn, position_id).await?;

    let mut model = current;
    model.position_id = Some(position_id);
    model.department_id = Some(target.department_id);
    if model.salary.is_none() {
        model.salary = target.salary;
    }
    model.profile_completion = profile_completion(&model);
    model.updated_at = Utc::now().into();
    let active = employee::ActiveModel::from(model).reset_all();
    let updated = active.update(&txn).await?;

    record_history(
        &txn,
        employee_id,
        employment_history::Kind::PositionAssigned,
        Some(position_id),
        Some(target.title.clone()),
        effective_date,
        actor,
    )
    .await?;
    txn.commit().await?;
    info!(%employee_id, %position_id, "position assigned");
    Ok(updated)
}

#[derive(Clone, Debug)]
pub struct Release {
    pub employee: employee::Model,
    /// `None` when the offboarding checklist could not be started.
    pub offboarding: Option<hr_process::Model>,
}

pub async fn release_employee(
    db: &DatabaseConnection,
    employee_id: Uuid,
    termination_date: NaiveDate,
    reason: Option<String>,
    actor: Option<Uuid>,
) -> Result<Release, PeopleError> {
    let txn = db.begin().await?;
    let current = employee::Entity::find_by_id(employee_id)
        .one(&txn)
        .await?
        .ok_or(PeopleError::EmployeeNotFound)?;
    if current.status == employee::Status::Terminated {
        return Err(PeopleError::AlreadyReleased);
    }
    let released_from = current.position_id;
    if let Some(old) = released_from {
        free_seat(&txn, old).await?;
    }

    let mut model = current;
    model.position_id = None;
    model.status = employee::Status::Terminated;
    model.lifecycle_stage = employee::LifecycleStage::Offboarding;
    model.termination_date = Some(termination_date);
    model.profile_completion = profile_completion(&model);
    model.updated_at = Utc::now().into();
    let active = employee::ActiveModel::from(model).reset_all();
    let updated = active.update(&txn).await?;

    record_history(
        &txn,
        employee_id,
        employment_history::Kind::Released,
        released_from,
        optional_text(reason),
        termination_date,
        actor,
    )
    .await?;
    txn.commit().await?;
    info!(%employee_id, "employee released");

    let offboarding =
        match progress::start_process(db, employee_id, hr_process::Kind::Offboarding).await {
            Ok(process) => Some(process),
            Err(err) => {
                warn!(%employee_id, error = %err, "offboarding checklist was not started after release");
                None
            }
        };
    Ok(Release {
        employee: updated,
        offboarding,
    })
}

#[derive(Clone, Debug, Default)]
pub struct EmployeeFilter {
    pub status: Option<employee::Status>,
    pub lifecycle_stage: Option<employee::LifecycleStage>,
    pub department_id: Option<Uuid>,
    pub q: Option<String>,
}

pub async fn list_employees(
    db: &DatabaseConnection,
    filter: &EmployeeFilter,
    limit: u64,
    offset: u64,
) -> Result<Vec<employee::Model>, DbErr> {
    let mut query = employee::Entity::find();
    if let Some(status) = filter.status {
        query = query.filter(employee::Column::Status.eq(status));
    }
    if let Some(stage) = filter.lifecycle_stage {
        query = query.filter(employee::Column::LifecycleStage.eq(stage));
    }
    if let Some(department_id) = filter.department_id {
        query = query.filter(employee::Column::DepartmentId.eq(department_id));
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(employee::Column::LastName.contains(q))
                .add(employee::Column::FirstName.contains(q))
                .add(employee::Column::MiddleName.contains(q))
                .add(employee::Column::Email.contains(&q.to_lowercase())),
        );
    }
    query
        .order_by_asc(employee::Column::LastName)
        .order_by_asc(employee::Column::FirstName)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await
}

pub async fn employment_history(
    db: &DatabaseConnection,
    employee_id: Uuid,
) -> Result<Vec<employment_history::Model>, DbErr> {
    employment_history::Entity::find()
        .filter(employment_history::Column::EmployeeId.eq(employee_id))
        .order_by_asc(employment_history::Column::EffectiveDate)
        .order_by_asc(employment_history::Column::CreatedAt)
        .all(db)
        .await
}

#[derive(Clone, Debug)]
pub struct OrgNode {
    pub department: department::Model,
    pub positions: Vec<position::Model>,
    pub headcount: i32,
    pub occupied: i32,
    pub children: Vec<OrgNode>,
}

/// Departments nested under their parents. A department whose parent is
/// missing is shown as a root.
pub fn build_org_tree(
    departments: Vec<department::Model>,
    positions: Vec<position::Model>,
) -> Vec<OrgNode> {
    let known: HashSet<Uuid> = departments.iter().map(|d| d.id).collect();
    let mut by_department: HashMap<Uuid, Vec<position::Model>> = HashMap::new();
    for position in positions {
        by_department
            .entry(position.department_id)
            .or_default()
            .push(position);
    }
    let mut children: HashMap<Option<Uuid>, Vec<department::Model>> = HashMap::new();
    for dept in departments {
        let parent = dept.parent_id.filter(|p| known.contains(p));
        children.entry(parent).or_default().push(dept);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn build(
        parent: Option<Uuid>,
        children: &mut HashMap<Option<Uuid>, Vec<department::Model>>,
        positions: &mut HashMap<Uuid, Vec<position::Model>>,
        visited: &mut HashSet<Uuid>,
    ) -> Vec<OrgNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        let mut nodes = Vec::with_capacity(level.len());
        for dept in level {
            if !visited.insert(dept.id) {
                continue;
            }
            let mut own = positions.remove(&dept.id).unwrap_or_default();
            own.sort_by(|a, b| a.title.cmp(&b.title));
            let nested = build(Some(dept.id), children, positions, visited);
            let headcount = own.iter().map(|p| p.headcount).sum::<i32>()
                + nested.iter().map(|n| n.headcount).sum::<i32>();
            let occupied = own.iter().map(|p| p.occupied).sum::<i32>()
                + nested.iter().map(|n| n.occupied).sum::<i32>();
            nodes.push(OrgNode {
                department: dept,
                positions: own,
                headcount,
                occupied,
                children: nested,
            });
        }
        nodes
    }

    let mut visited = HashSet::new();
    build(None, &mut children, &mut by_department, &mut visited)
}

pub async fn org_tree(db: &DatabaseConnection) -> Result<Vec<OrgNode>, DbErr> {
    let departments = department::Entity::find().all(db).await?;
    let positions = position::Entity::find().all(db).await?;
    Ok(build_org_tree(departments, positions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTimeWithTimeZone {
        Utc::now().into()
    }

    fn blank_employee() -> employee::Model {
        employee::Model {
            id: Uuid::new_v4(),
            personnel_number: None,
            first_name: "Анна".into(),
            last_name: "Петрова".into(),
            middle_name: None,
            email: None,
            phone: None,
            birth_date: None,
            hire_date: None,
            termination_date: None,
            status: employee::Status::Active,
            lifecycle_stage: employee::LifecycleStage::Onboarding,
            position_id: None,
            department_id: None,
            salary: None,
            address: None,
            profile_completion: 0,
            user_id: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn dept(name: &str, parent: Option<Uuid>) -> department::Model {
        department::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: parent,
            head_employee_id: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn seat(department_id: Uuid, headcount: i32, occupied: i32) -> position::Model {
        position::Model {
            id: Uuid::new_v4(),
            title: "Engineer".into(),
            department_id,
            salary: None,
            headcount,
            occupied,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn completion_counts_filled_profile_fields() {
        let mut model = blank_employee();
        // first and last name only: 2 of 11
        assert_eq!(profile_completion(&model), 18);
        model.email = Some("   ".into());
        assert_eq!(profile_completion(&model), 18);
        model.email = Some("anna@example.test".into());
        model.phone = Some("+7 900 000-00-00".into());
        model.middle_name = Some("Сергеевна".into());
        model.birth_date = NaiveDate::from_ymd_opt(1990, 5, 1);
        model.hire_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        model.address = Some("Москва".into());
        model.position_id = Some(Uuid::new_v4());
        model.department_id = Some(Uuid::new_v4());
        model.personnel_number = Some("0001".into());
        assert_eq!(profile_completion(&model), 100);
    }

    #[test]
    fn org_tree_nests_and_sums_seats() {
        let root = dept("Компания", None);
        let child = dept("Разработка", Some(root.id));
        let orphan = dept("Склад", Some(Uuid::new_v4()));
        let tree = build_org_tree(
            vec![child.clone(), root.clone(), orphan.clone()],
            vec![seat(root.id, 1, 1), seat(child.id, 3, 2)],
        );
        assert_eq!(tree.len(), 2);
        let top = tree.iter().find(|n| n.department.id == root.id).unwrap();
        assert_eq!(top.children.len(), 1);
        assert_eq!(top.children[0].department.id, child.id);
        assert_eq!(top.headcount, 4);
        assert_eq!(top.occupied, 3);
        assert!(tree.iter().any(|n| n.department.id == orphan.id));
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(required_name("name", "  HR  ").unwrap(), "HR");
        assert!(matches!(
            required_name("name", "   "),
            Err(PeopleError::Validation(_))
        ));
    }
}
