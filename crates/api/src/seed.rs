//! Demo organisation used by `server seed` and the integration tests.

use chrono::NaiveDate;
use entity::{department, document_type, employee, er_template, hr_process, position};
use sea_orm::{DatabaseConnection, EntityTrait};
use thiserror::Error;
use uuid::Uuid;

use crate::documents::{self, DocumentError, NewDocumentType};
use crate::people::{self, NewEmployee, PeopleError};
use crate::progress::{self, ProgressError};

pub const EMPLOYMENT_CONTRACT: &str = "\
ТРУДОВОЙ ДОГОВОР № {{system.documentNumber}}

{{company.legalName}} (ИНН {{company.inn}}), в лице {{company.director}}, и \
{{employee.fullName}} заключили настоящий договор о нижеследующем.

1. Работник принимается на должность «{{position.title}}» в подразделение \
«{{department.name}}» с {{employee.hireDate}}.
2. Должностной оклад составляет {{employee.salary}} руб.
3. Испытательный срок: {{custom.probationMonths}} мес.

Дата составления: {{system.currentDate}}
";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    People(#[from] PeopleError),
    #[error(transparent)]
    Documents(#[from] DocumentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[derive(Debug, Clone)]
pub struct SeededHrRecords {
    pub departments: Vec<department::Model>,
    pub positions: Vec<position::Model>,
    pub employees: Vec<employee::Model>,
    pub document_types: Vec<document_type::Model>,
    pub templates: Vec<er_template::Model>,
}

impl SeededHrRecords {
    pub fn department_named(&self, name: &str) -> Option<&department::Model> {
        self.departments.iter().find(|d| d.name == name)
    }

    pub fn position_titled(&self, title: &str) -> Option<&position::Model> {
        self.positions.iter().find(|p| p.title == title)
    }

    pub fn employee_email(&self, email: &str) -> Option<&employee::Model> {
        self.employees
            .iter()
            .find(|e| e.email.as_deref() == Some(email))
    }

    pub fn document_type(&self, code: &str) -> Option<&document_type::Model> {
        self.document_types.iter().find(|t| t.code == code)
    }
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

pub async fn seed_hr_demo(db: &DatabaseConnection) -> Result<SeededHrRecords, SeedError> {
    let company = people::create_department(db, "Головной офис", None).await?;
    let hr = people::create_department(db, "Отдел персонала", Some(company.id)).await?;
    let dev = people::create_department(db, "Разработка", Some(company.id)).await?;

    let director = people::create_position(db, "Генеральный директор", company.id, Some(350_000), 1)
        .await?;
    let hr_lead = people::create_position(db, "Руководитель HR", hr.id, Some(180_000), 1).await?;
    let recruiter = people::create_position(db, "Рекрутер", hr.id, Some(95_000), 2).await?;
    let engineer = people::create_position(db, "Инженер-программист", dev.id, Some(210_000), 3)
        .await?;

    let mut employees = Vec::new();
    let people_to_hire = [
        ("Ольга", "Смирнова", Some("Викторовна"), "olga.smirnova@hr.test", director.id, date(2019, 3, 1)),
        ("Марина", "Кузнецова", Some("Андреевна"), "marina.kuznetsova@hr.test", hr_lead.id, date(2021, 9, 15)),
        ("Илья", "Соколов", None, "ilya.sokolov@hr.test", recruiter.id, date(2023, 2, 6)),
        ("Андрей", "Волков", Some("Петрович"), "andrey.volkov@hr.test", engineer.id, date(2024, 11, 11)),
    ];
    for (idx, (first, last, middle, email, position_id, hire_date)) in
        people_to_hire.into_iter().enumerate()
    {
        let hired = people::create_employee(
            db,
            NewEmployee {
                first_name: first.to_string(),
                last_name: last.to_string(),
                middle_name: middle.map(str::to_string),
                personnel_number: Some(format!("{:04}", idx + 1)),
                email: Some(email.to_string()),
                phone: Some(format!("+7 900 000-00-{:02}", idx + 1)),
                hire_date,
                address: Some("Москва".to_string()),
                position_id: Some(position_id),
                user_id: Some(Uuid::new_v4()),
                ..NewEmployee::default()
            },
            None,
        )
        .await?;
        employees.push(hired);
    }
    if let Some(newcomer) = employees.last() {
        progress::start_process(db, newcomer.id, hr_process::Kind::Onboarding).await?;
    }

    let contract_type = documents::create_document_type(
        db,
        NewDocumentType {
            code: "employment_contract".into(),
            name: "Трудовой договор".into(),
            prefix: Some("ГЭР".into()),
            separator: None,
            padding: None,
            reset_period: Some(document_type::ResetPeriod::Yearly),
        },
    )
    .await?;
    let memo_type = documents::create_document_type(
        db,
        NewDocumentType {
            code: "memo".into(),
            name: "Служебная записка".into(),
            prefix: None,
            separator: None,
            padding: None,
            reset_period: Some(document_type::ResetPeriod::Never),
        },
    )
    .await?;
    let contract = documents::create_template(
        db,
        "Трудовой договор (стандартный)",
        contract_type.id,
        EMPLOYMENT_CONTRACT,
    )
    .await?;

    // Re-read so seat counters reflect the hires above.
    let positions = vec![
        reload_position(db, director.id).await?,
        reload_position(db, hr_lead.id).await?,
        reload_position(db, recruiter.id).await?,
        reload_position(db, engineer.id).await?,
    ];

    Ok(SeededHrRecords {
        departments: vec![company, hr, dev],
        positions,
        employees,
        document_types: vec![contract_type, memo_type],
        templates: vec![contract],
    })
}

async fn reload_position(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<position::Model, PeopleError> {
    position::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(PeopleError::PositionNotFound)
}
