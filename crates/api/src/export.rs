//! Staff list exports (CSV and spreadsheet) and the printable CV page.

use std::collections::HashMap;
use std::fmt::Write as _;

use entity::{department, employee, employment_history, position};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, QueryOrder};
use thiserror::Error;
use uuid::Uuid;

use crate::template::{format_amount, format_date, CompanyProfile};

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const HEADERS: [&str; 10] = [
    "Табельный номер",
    "ФИО",
    "Подразделение",
    "Должность",
    "Статус",
    "Этап",
    "Email",
    "Телефон",
    "Дата приёма",
    "Оклад",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmployeeRow {
    pub personnel_number: String,
    pub full_name: String,
    pub department: String,
    pub position: String,
    pub status: String,
    pub lifecycle_stage: String,
    pub email: String,
    pub phone: String,
    pub hire_date: String,
    pub salary: String,
}

impl EmployeeRow {
    fn cells(&self) -> [&str; 10] {
        [
            &self.personnel_number,
            &self.full_name,
            &self.department,
            &self.position,
            &self.status,
            &self.lifecycle_stage,
            &self.email,
            &self.phone,
            &self.hire_date,
            &self.salary,
        ]
    }
}

pub fn status_label(status: employee::Status) -> &'static str {
    match status {
        employee::Status::Active => "Работает",
        employee::Status::OnLeave => "В отпуске",
        employee::Status::Terminated => "Уволен",
    }
}

pub fn lifecycle_label(stage: employee::LifecycleStage) -> &'static str {
    match stage {
        employee::LifecycleStage::Onboarding => "Адаптация",
        employee::LifecycleStage::Development => "Развитие",
        employee::LifecycleStage::Offboarding => "Увольнение",
        employee::LifecycleStage::Alumni => "Выпускник",
    }
}

fn history_label(kind: employment_history::Kind) -> &'static str {
    match kind {
        employment_history::Kind::Hired => "Принят на работу",
        employment_history::Kind::PositionAssigned => "Назначен на должность",
        employment_history::Kind::Released => "Уволен",
    }
}

pub fn employee_row(
    model: &employee::Model,
    department: Option<&department::Model>,
    position: Option<&position::Model>,
) -> EmployeeRow {
    EmployeeRow {
        personnel_number: model.personnel_number.clone().unwrap_or_default(),
        full_name: model.full_name(),
        department: department.map(|d| d.name.clone()).unwrap_or_default(),
        position: position.map(|p| p.title.clone()).unwrap_or_default(),
        status: status_label(model.status).to_string(),
        lifecycle_stage: lifecycle_label(model.lifecycle_stage).to_string(),
        email: model.email.clone().unwrap_or_default(),
        phone: model.phone.clone().unwrap_or_default(),
        hire_date: model.hire_date.map(format_date).unwrap_or_default(),
        salary: model
            .salary
            .map(|s| format_amount(s as f64))
            .unwrap_or_default(),
    }
}

pub async fn employee_rows(db: &DatabaseConnection) -> Result<Vec<EmployeeRow>, DbErr> {
    let departments: HashMap<Uuid, department::Model> = department::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();
    let positions: HashMap<Uuid, position::Model> = position::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let employees = employee::Entity::find()
        .order_by_asc(employee::Column::LastName)
        .order_by_asc(employee::Column::FirstName)
        .all(db)
        .await?;
    Ok(employees
        .iter()
        .map(|e| {
            employee_row(
                e,
                e.department_id.and_then(|id| departments.get(&id)),
                e.position_id.and_then(|id| positions.get(&id)),
            )
        })
        .collect())
}

/// UTF-8 CSV with a byte-order mark so spreadsheet apps pick the encoding.
pub fn to_csv(rows: &[EmployeeRow]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(BOM.to_vec());
    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// HTML table that Excel opens as a worksheet.
pub fn to_xls_html(rows: &[EmployeeRow]) -> String {
    let mut out = String::from(
        "<html><head><meta charset=\"utf-8\"></head><body><table border=\"1\">\n<tr>",
    );
    for header in HEADERS {
        let _ = write!(out, "<th>{}</th>", escape_html(header));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row.cells() {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table></body></html>\n");
    out
}

pub struct CvSources<'a> {
    pub employee: &'a employee::Model,
    pub position: Option<&'a position::Model>,
    pub department: Option<&'a department::Model>,
    pub history: &'a [employment_history::Model],
    pub company: &'a CompanyProfile,
}

pub fn cv_html(src: CvSources<'_>) -> String {
    let e = src.employee;
    let mut facts: Vec<(&str, String)> = vec![
        ("Табельный номер", e.personnel_number.clone().unwrap_or_default()),
        (
            "Подразделение",
            src.department.map(|d| d.name.clone()).unwrap_or_default(),
        ),
        (
            "Должность",
            src.position.map(|p| p.title.clone()).unwrap_or_default(),
        ),
        ("Статус", status_label(e.status).to_string()),
        ("Email", e.email.clone().unwrap_or_default()),
        ("Телефон", e.phone.clone().unwrap_or_default()),
        ("Адрес", e.address.clone().unwrap_or_default()),
        (
            "Дата рождения",
            e.birth_date.map(format_date).unwrap_or_default(),
        ),
        ("Дата приёма", e.hire_date.map(format_date).unwrap_or_default()),
    ];
    if let Some(date) = e.termination_date {
        facts.push(("Дата увольнения", format_date(date)));
    }

    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"ru\"><head><meta charset=\"utf-8\"><title>{name}</title>\
         <style>body{{font-family:serif;margin:2cm}}th{{text-align:left;padding-right:1em}}\
         @media print{{body{{margin:0}}}}</style></head><body>\n\
         <p>{company}</p>\n<h1>{name}</h1>\n<table>\n",
        name = escape_html(&e.full_name()),
        company = escape_html(&src.company.name),
    );
    for (label, value) in facts.iter().filter(|(_, v)| !v.is_empty()) {
        let _ = writeln!(
            out,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(value)
        );
    }
    out.push_str("</table>\n");

    if !src.history.is_empty() {
        out.push_str("<h2>Трудовая история</h2>\n<ul>\n");
        for entry in src.history {
            let mut line = format!(
                "{}: {}",
                format_date(entry.effective_date),
                history_label(entry.kind)
            );
            if let Some(note) = entry.note.as_deref().filter(|n| !n.is_empty()) {
                line.push_str(" (");
                line.push_str(note);
                line.push(')');
            }
            let _ = writeln!(out, "<li>{}</li>", escape_html(&line));
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</body></html>\n");
    out
}

/// Loads everything the CV page shows; `None` when the employee is unknown.
pub async fn employee_cv(
    db: &DatabaseConnection,
    employee_id: Uuid,
    company: &CompanyProfile,
) -> Result<Option<String>, DbErr> {
    let Some(person) = employee::Entity::find_by_id(employee_id).one(db).await? else {
        return Ok(None);
    };
    let seat = match person.position_id {
        Some(id) => position::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let unit = match person.department_id {
        Some(id) => department::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let history = crate::people::employment_history(db, employee_id).await?;
    Ok(Some(cv_html(CvSources {
        employee: &person,
        position: seat.as_ref(),
        department: unit.as_ref(),
        history: &history,
        company,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> EmployeeRow {
        EmployeeRow {
            full_name: name.to_string(),
            salary: "1\u{a0}000".into(),
            ..EmployeeRow::default()
        }
    }

    #[test]
    fn csv_starts_with_bom_and_quotes_fields() {
        let bytes = to_csv(&[row("Smith, \"John\"")]).unwrap();
        assert!(bytes.starts_with(BOM));
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Табельный номер,ФИО,"));
        assert!(lines.next().unwrap().contains("\"Smith, \"\"John\"\"\""));
    }

    #[test]
    fn spreadsheet_cells_are_escaped() {
        let html = to_xls_html(&[row("<b>Tom & Jerry</b>")]);
        assert!(html.contains("<td>&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;</td>"));
        assert!(html.contains("<th>ФИО</th>"));
    }
}
