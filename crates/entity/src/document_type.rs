use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "document_type")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub prefix: Option<String>,
    pub separator: String,
    pub padding: i32,
    pub reset_period: ResetPeriod,
    /// Last sequence handed out within `last_reset_period`.
    pub counter: i64,
    pub last_reset_period: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::er_template::Entity")]
    Template,
    #[sea_orm(has_many = "super::er_document::Entity")]
    Document,
}

impl Related<super::er_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::er_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum ResetPeriod {
    #[sea_orm(string_value = "YEARLY")]
    Yearly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "NEVER")]
    Never,
}

impl ActiveModelBehavior for ActiveModel {}
