use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum DocumentType {
    Table,
    Id,
    Code,
    Name,
    Prefix,
    Separator,
    Padding,
    ResetPeriod,
    Counter,
    LastResetPeriod,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ErTemplate {
    Table,
    Id,
    Name,
    DocumentTypeId,
    Body,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ErDocument {
    Table,
    Id,
    DocumentTypeId,
    TemplateId,
    EmployeeId,
    Number,
    Title,
    Content,
    Status,
    Reviewers,
    RejectionReason,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ErDocumentHistory {
    Table,
    Id,
    DocumentId,
    Seq,
    Action,
    FromStatus,
    ToStatus,
    ActorId,
    Comment,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DocumentType::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DocumentType::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(DocumentType::Code)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(DocumentType::Name).string_len(256).not_null())
                    .col(ColumnDef::new(DocumentType::Prefix).string_len(32))
                    .col(
                        ColumnDef::new(DocumentType::Separator)
                            .string_len(8)
                            .not_null()
                            .default("-"),
                    )
                    .col(
                        ColumnDef::new(DocumentType::Padding)
                            .integer()
                            .not_null()
                            .default(4),
                    )
                    .col(
                        ColumnDef::new(DocumentType::ResetPeriod)
                            .string_len(16)
                            .not_null()
                            .default("YEARLY"),
                    )
                    .col(
                        ColumnDef::new(DocumentType::Counter)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DocumentType::LastResetPeriod).string_len(16))
                    .col(
                        ColumnDef::new(DocumentType::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DocumentType::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ErTemplate::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ErTemplate::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ErTemplate::Name).string_len(256).not_null())
                    .col(ColumnDef::new(ErTemplate::DocumentTypeId).uuid().not_null())
                    .col(ColumnDef::new(ErTemplate::Body).text().not_null())
                    .col(
                        ColumnDef::new(ErTemplate::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ErTemplate::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_er_template_document_type")
                            .from(ErTemplate::Table, ErTemplate::DocumentTypeId)
                            .to(DocumentType::Table, DocumentType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ErDocument::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ErDocument::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ErDocument::DocumentTypeId).uuid().not_null())
                    .col(ColumnDef::new(ErDocument::TemplateId).uuid())
                    .col(ColumnDef::new(ErDocument::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(ErDocument::Number).string_len(64))
                    .col(ColumnDef::new(ErDocument::Title).string_len(256).not_null())
                    .col(ColumnDef::new(ErDocument::Content).text().not_null())
                    .col(
                        ColumnDef::new(ErDocument::Status)
                            .string_len(16)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(ColumnDef::new(ErDocument::Reviewers).json_binary().not_null())
                    .col(ColumnDef::new(ErDocument::RejectionReason).text())
                    .col(ColumnDef::new(ErDocument::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(ErDocument::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ErDocument::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_er_document_type")
                            .from(ErDocument::Table, ErDocument::DocumentTypeId)
                            .to(DocumentType::Table, DocumentType::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_er_document_employee")
                            .from(ErDocument::Table, ErDocument::EmployeeId)
                            .to(Employee::Table, Employee::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_er_document_employee")
                    .table(ErDocument::Table)
                    .col(ErDocument::EmployeeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("uq_er_document_number")
                    .table(ErDocument::Table)
                    .col(ErDocument::DocumentTypeId)
                    .col(ErDocument::Number)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ErDocumentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErDocumentHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErDocumentHistory::DocumentId).uuid().not_null())
                    .col(ColumnDef::new(ErDocumentHistory::Seq).integer().not_null())
                    .col(
                        ColumnDef::new(ErDocumentHistory::Action)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ErDocumentHistory::FromStatus).string_len(16))
                    .col(ColumnDef::new(ErDocumentHistory::ToStatus).string_len(16))
                    .col(ColumnDef::new(ErDocumentHistory::ActorId).uuid())
                    .col(ColumnDef::new(ErDocumentHistory::Comment).text())
                    .col(
                        ColumnDef::new(ErDocumentHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_er_document_history_document")
                            .from(ErDocumentHistory::Table, ErDocumentHistory::DocumentId)
                            .to(ErDocument::Table, ErDocument::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_er_document_history_document")
                    .table(ErDocumentHistory::Table)
                    .col(ErDocumentHistory::DocumentId)
                    .col(ErDocumentHistory::Seq)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ErDocumentHistory::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ErDocument::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ErTemplate::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DocumentType::Table).if_exists().to_owned())
            .await
    }
}
