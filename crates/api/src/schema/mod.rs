mod documents;
mod leave;
mod people;
mod processes;

use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, Error, ErrorExtensions, MergedObject, Object, Schema,
    SimpleObject, ID,
};
use entity::{
    document_type, employee, employment_history, er_document, er_document_history, hr_process,
    vacation_request,
};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use uuid::Uuid;

use crate::auth::{CurrentUser, UserRole};
use crate::template::CompanyProfile;

pub use documents::{
    CreateDocumentInput, CreateDocumentPayload, DocumentHistoryNode, DocumentNode,
    DocumentTypeNode, ReviewerInput, TemplateNode,
};
pub use leave::{AttendanceNode, VacationRequestNode};
pub use people::{DepartmentNode, EmployeeNode, OrgUnit, PositionNode};
pub use processes::{ChecklistTaskNode, ProcessNode, StageNode};

pub type HrSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub struct AppSchema(pub HrSchema);

pub fn build_schema(db: Arc<DatabaseConnection>, company: Arc<CompanyProfile>) -> AppSchema {
    let schema = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(company)
        .finish();
    AppSchema(schema)
}

pub struct QueryRoot;
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    async fn hr(&self) -> HrQuery {
        HrQuery::default()
    }
}

#[Object]
impl MutationRoot {
    async fn hr(&self) -> HrMutation {
        HrMutation::default()
    }
}

#[derive(MergedObject, Default)]
pub struct HrQuery(
    MeQuery,
    people::PeopleQuery,
    documents::DocumentQuery,
    processes::ProcessQuery,
    leave::LeaveQuery,
);

#[derive(MergedObject, Default)]
pub struct HrMutation(
    people::PeopleMutation,
    documents::DocumentMutation,
    processes::ProcessMutation,
    leave::LeaveMutation,
);

#[derive(Default)]
pub struct MeQuery;

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    #[graphql(name = "userId")]
    pub user_id: ID,
    pub roles: Vec<String>,
    pub employee: Option<EmployeeNode>,
}

#[Object]
impl MeQuery {
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        let viewer = require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee = match viewer.employee_id {
            Some(id) => employee::Entity::find_by_id(id)
                .one(db.as_ref())
                .await
                .map_err(db_error)?
                .map(EmployeeNode::from),
            None => None,
        };
        Ok(MePayload {
            user_id: id_of(viewer.user_id),
            roles: viewer.roles.iter().map(|r| r.as_str().to_string()).collect(),
            employee,
        })
    }
}

/// Generates a GraphQL enum mirroring an entity enum, with conversions both ways.
macro_rules! entity_enum {
    ($name:ident = $module:ident :: $ty:ident { $($variant:ident),+ $(,)? }) => {
        #[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
        pub enum $name {
            $($variant),+
        }

        impl From<$module::$ty> for $name {
            fn from(value: $module::$ty) -> Self {
                match value {
                    $($module::$ty::$variant => $name::$variant),+
                }
            }
        }

        impl From<$name> for $module::$ty {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $module::$ty::$variant),+
                }
            }
        }
    };
}

entity_enum!(EmployeeStatus = employee::Status { Active, OnLeave, Terminated });
entity_enum!(LifecycleStage = employee::LifecycleStage {
    Onboarding,
    Development,
    Offboarding,
    Alumni,
});
entity_enum!(EmploymentEvent = employment_history::Kind {
    Hired,
    PositionAssigned,
    Released,
});
entity_enum!(ResetPeriod = document_type::ResetPeriod { Yearly, Monthly, Never });
entity_enum!(DocumentStatus = er_document::Status {
    Draft,
    Pending,
    InReview,
    Reviewed,
    Approved,
    Signed,
});
entity_enum!(DocumentAction = er_document_history::Action {
    Created,
    Edited,
    Submitted,
    ReviewerApproved,
    ReviewerRejected,
    Reviewed,
    Approved,
    Signed,
    Comment,
});
entity_enum!(ProcessKind = hr_process::Kind { Onboarding, Offboarding });
entity_enum!(ProcessStatus = hr_process::Status { InProgress, Completed });
entity_enum!(LeaveKind = vacation_request::Kind {
    Vacation,
    SickLeave,
    Unpaid,
    TimeOff,
});
entity_enum!(LeaveStatus = vacation_request::Status {
    Pending,
    Approved,
    Rejected,
    Cancelled,
});

const DEFAULT_PAGE: i32 = 50;
const MAX_PAGE: i32 = 200;

fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Missing database connection"))
}

fn company_profile(ctx: &Context<'_>) -> async_graphql::Result<Arc<CompanyProfile>> {
    ctx.data::<Arc<CompanyProfile>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Missing company profile"))
}

fn current_user(ctx: &Context<'_>) -> async_graphql::Result<CurrentUser> {
    ctx.data::<CurrentUser>()
        .cloned()
        .map_err(|_| error_with_code("UNAUTHENTICATED", "Login required"))
}

fn require_role(ctx: &Context<'_>, role: UserRole) -> async_graphql::Result<CurrentUser> {
    let user = current_user(ctx)?;
    if user.has_role(role) {
        Ok(user)
    } else {
        Err(error_with_code("FORBIDDEN", "Insufficient permissions"))
    }
}

fn require_viewer(ctx: &Context<'_>) -> async_graphql::Result<CurrentUser> {
    require_role(ctx, UserRole::Employee)
}

/// The employee a self-service action targets: the caller's own record, or
/// anyone's when the caller is HR.
fn acting_employee(user: &CurrentUser, requested: Option<&ID>) -> async_graphql::Result<Uuid> {
    match requested {
        Some(id) => {
            let target = parse_uuid(id)?;
            if Some(target) == user.employee_id || user.has_role(UserRole::Hr) {
                Ok(target)
            } else {
                Err(error_with_code(
                    "FORBIDDEN",
                    "Only HR can act on behalf of another employee",
                ))
            }
        }
        None => user
            .employee_id
            .ok_or_else(|| validation_error("No employee record is linked to this login")),
    }
}

fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| validation_error("Invalid ID"))
}

fn parse_optional_id(field: &str, value: Option<&ID>) -> async_graphql::Result<Option<Uuid>> {
    match value {
        Some(id) => Uuid::parse_str(id.as_str())
            .map(Some)
            .map_err(|_| validation_error(format!("Invalid {}", field))),
        None => Ok(None),
    }
}

fn id_of(id: Uuid) -> ID {
    ID::from(id.to_string())
}

fn enforce_page(first: Option<i32>) -> async_graphql::Result<u64> {
    let limit = first.unwrap_or(DEFAULT_PAGE);
    if limit <= 0 {
        return Err(validation_error("first must be positive"));
    }
    if limit > MAX_PAGE {
        return Err(error_with_code(
            "LIMIT_EXCEEDED",
            format!("Cannot request more than {} records at once", MAX_PAGE),
        ));
    }
    Ok(limit as u64)
}

fn db_error(err: DbErr) -> Error {
    error_with_code("INTERNAL", format!("Database error: {}", err))
}

fn error_with_code(code: &'static str, message: impl Into<String>) -> Error {
    Error::new(message).extend_with(|_, e| e.set("code", code))
}

fn validation_error(message: impl Into<String>) -> Error {
    error_with_code("VALIDATION", message)
}

fn not_found(message: impl Into<String>) -> Error {
    error_with_code("NOT_FOUND", message)
}

fn conflict(message: impl Into<String>) -> Error {
    error_with_code("CONFLICT", message)
}
