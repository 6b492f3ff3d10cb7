use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Department {
    Table,
    Id,
    Name,
    ParentId,
    HeadEmployeeId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Position {
    Table,
    Id,
    Title,
    DepartmentId,
    Salary,
    Headcount,
    Occupied,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
    PersonnelNumber,
    FirstName,
    LastName,
    MiddleName,
    Email,
    Phone,
    BirthDate,
    HireDate,
    TerminationDate,
    Status,
    LifecycleStage,
    PositionId,
    DepartmentId,
    Salary,
    Address,
    ProfileCompletion,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmploymentHistory {
    Table,
    Id,
    EmployeeId,
    Kind,
    PositionId,
    Note,
    EffectiveDate,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Department::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Department::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Department::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Department::ParentId).uuid())
                    .col(ColumnDef::new(Department::HeadEmployeeId).uuid())
                    .col(
                        ColumnDef::new(Department::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Department::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_department_parent")
                            .from(Department::Table, Department::ParentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_department_parent")
                    .table(Department::Table)
                    .col(Department::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Position::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Position::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Position::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Position::DepartmentId).uuid().not_null())
                    .col(ColumnDef::new(Position::Salary).big_integer())
                    .col(
                        ColumnDef::new(Position::Headcount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Position::Occupied)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Position::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Position::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_position_department")
                            .from(Position::Table, Position::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_position_department")
                    .table(Position::Table)
                    .col(Position::DepartmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Employee::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employee::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Employee::PersonnelNumber)
                            .string_len(64)
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employee::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Employee::LastName).string_len(128).not_null())
                    .col(ColumnDef::new(Employee::MiddleName).string_len(128))
                    .col(ColumnDef::new(Employee::Email).string_len(256))
                    .col(ColumnDef::new(Employee::Phone).string_len(64))
                    .col(ColumnDef::new(Employee::BirthDate).date())
                    .col(ColumnDef::new(Employee::HireDate).date())
                    .col(ColumnDef::new(Employee::TerminationDate).date())
                    .col(
                        ColumnDef::new(Employee::Status)
                            .string_len(32)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Employee::LifecycleStage)
                            .string_len(32)
                            .not_null()
                            .default("ONBOARDING"),
                    )
                    .col(ColumnDef::new(Employee::PositionId).uuid())
                    .col(ColumnDef::new(Employee::DepartmentId).uuid())
                    .col(ColumnDef::new(Employee::Salary).big_integer())
                    .col(ColumnDef::new(Employee::Address).string_len(512))
                    .col(
                        ColumnDef::new(Employee::ProfileCompletion)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Employee::UserId).uuid())
                    .col(
                        ColumnDef::new(Employee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Employee::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_position")
                            .from(Employee::Table, Employee::PositionId)
                            .to(Position::Table, Position::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_department")
                            .from(Employee::Table, Employee::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_employee_last_name", Employee::LastName),
            ("idx_employee_position", Employee::PositionId),
            ("idx_employee_department", Employee::DepartmentId),
            ("idx_employee_user", Employee::UserId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Employee::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(EmploymentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmploymentHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmploymentHistory::EmployeeId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmploymentHistory::Kind)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmploymentHistory::PositionId).uuid())
                    .col(ColumnDef::new(EmploymentHistory::Note).text())
                    .col(
                        ColumnDef::new(EmploymentHistory::EffectiveDate)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmploymentHistory::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(EmploymentHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employment_history_employee")
                            .from(EmploymentHistory::Table, EmploymentHistory::EmployeeId)
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
                    .name("idx_employment_history_employee")
                    .table(EmploymentHistory::Table)
                    .col(EmploymentHistory::EmployeeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(EmploymentHistory::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Employee::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Position::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Department::Table).if_exists().to_owned())
            .await
    }
}
