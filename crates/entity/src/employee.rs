use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "employee")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub personnel_number: Option<String>,
    pub first_name: String,
    #[sea_orm(indexed)]
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<Date>,
    pub hire_date: Option<Date>,
    pub termination_date: Option<Date>,
    pub status: Status,
    pub lifecycle_stage: LifecycleStage,
    #[sea_orm(indexed)]
    pub position_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub department_id: Option<Uuid>,
    pub salary: Option<i64>,
    pub address: Option<String>,
    pub profile_completion: i32,
    #[sea_orm(indexed)]
    pub user_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// "Last First Middle", the order used on HR paperwork.
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.last_name.as_str(), self.first_name.as_str()];
        if let Some(middle) = self.middle_name.as_deref() {
            if !middle.trim().is_empty() {
                parts.push(middle);
            }
        }
        parts.join(" ")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::position::Entity",
        from = "Column::PositionId",
        to = "super::position::Column::Id",
        on_delete = "SetNull"
    )]
    Position,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id",
        on_delete = "SetNull"
    )]
    Department,
}

impl Related<super::position::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Position.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Status {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "ON_LEAVE")]
    OnLeave,
    #[sea_orm(string_value = "TERMINATED")]
    Terminated,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum LifecycleStage {
    #[sea_orm(string_value = "ONBOARDING")]
    Onboarding,
    #[sea_orm(string_value = "DEVELOPMENT")]
    Development,
    #[sea_orm(string_value = "OFFBOARDING")]
    Offboarding,
    #[sea_orm(string_value = "ALUMNI")]
    Alumni,
}

impl ActiveModelBehavior for ActiveModel {}
