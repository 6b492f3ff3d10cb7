use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum HrProcess {
    Table,
    Id,
    EmployeeId,
    Kind,
    Stages,
    Progress,
    Status,
    StartedAt,
    CompletedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum VacationRequest {
    Table,
    Id,
    EmployeeId,
    Kind,
    StartDate,
    EndDate,
    Days,
    Status,
    Comment,
    DecidedBy,
    DecidedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    Id,
    EmployeeId,
    WorkDate,
    CheckIn,
    CheckOut,
    WorkedMinutes,
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
                    .table(HrProcess::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HrProcess::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(HrProcess::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(HrProcess::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(HrProcess::Stages).json_binary().not_null())
                    .col(
                        ColumnDef::new(HrProcess::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(HrProcess::Status)
                            .string_len(16)
                            .not_null()
                            .default("IN_PROGRESS"),
                    )
                    .col(
                        ColumnDef::new(HrProcess::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HrProcess::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(HrProcess::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_hr_process_employee")
                            .from(HrProcess::Table, HrProcess::EmployeeId)
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
                    .unique()
                    .name("uq_hr_process_employee_kind")
                    .table(HrProcess::Table)
                    .col(HrProcess::EmployeeId)
                    .col(HrProcess::Kind)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VacationRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VacationRequest::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VacationRequest::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(VacationRequest::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(VacationRequest::StartDate).date().not_null())
                    .col(ColumnDef::new(VacationRequest::EndDate).date().not_null())
                    .col(ColumnDef::new(VacationRequest::Days).integer().not_null())
                    .col(
                        ColumnDef::new(VacationRequest::Status)
                            .string_len(16)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(VacationRequest::Comment).text())
                    .col(ColumnDef::new(VacationRequest::DecidedBy).uuid())
                    .col(ColumnDef::new(VacationRequest::DecidedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(VacationRequest::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vacation_request_employee")
                            .from(VacationRequest::Table, VacationRequest::EmployeeId)
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
                    .name("idx_vacation_request_employee")
                    .table(VacationRequest::Table)
                    .col(VacationRequest::EmployeeId)
                    .col(VacationRequest::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Attendance::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Attendance::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Attendance::WorkDate).date().not_null())
                    .col(
                        ColumnDef::new(Attendance::CheckIn)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attendance::CheckOut).timestamp_with_time_zone())
                    .col(ColumnDef::new(Attendance::WorkedMinutes).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_employee")
                            .from(Attendance::Table, Attendance::EmployeeId)
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
                    .unique()
                    .name("uq_attendance_employee_date")
                    .table(Attendance::Table)
                    .col(Attendance::EmployeeId)
                    .col(Attendance::WorkDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendance::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(VacationRequest::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(HrProcess::Table).if_exists().to_owned())
            .await
    }
}
