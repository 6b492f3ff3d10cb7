use sea_orm::entity::prelude::*;

use super::er_document::Status;

/// Append-only; rows are never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "er_document_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub document_id: Uuid,
    /// Position within the document's history, starting at 1.
    pub seq: i32,
    pub action: Action,
    pub from_status: Option<Status>,
    pub to_status: Option<Status>,
    pub actor_id: Option<Uuid>,
    pub comment: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::er_document::Entity",
        from = "Column::DocumentId",
        to = "super::er_document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::er_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Action {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "EDITED")]
    Edited,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "REVIEWER_APPROVED")]
    ReviewerApproved,
    #[sea_orm(string_value = "REVIEWER_REJECTED")]
    ReviewerRejected,
    #[sea_orm(string_value = "REVIEWED")]
    Reviewed,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "SIGNED")]
    Signed,
    #[sea_orm(string_value = "COMMENT")]
    Comment,
}

impl ActiveModelBehavior for ActiveModel {}
