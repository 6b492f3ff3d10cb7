//! Document types, templates and generated documents.

use chrono::{DateTime, Utc};
use entity::{department, document_type, employee, er_document, er_template, position};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::numbering::{allocate_number, NumberingError};
use crate::review::{insert_history, reviewers_json, ReviewError, ReviewState, Reviewer};
use crate::template::{build_context, render, CompanyProfile, ContextSources, Rendered};
use entity::er_document_history::Action;

const MAX_TITLE_LEN: usize = 300;
const MAX_PADDING: i32 = 12;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document type not found")]
    TypeNotFound,
    #[error("template not found")]
    TemplateNotFound,
    #[error("employee not found")]
    EmployeeNotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Db(#[from] DbErr),
}

fn required(field: &str, value: &str, max: usize) -> Result<String, DocumentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DocumentError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(DocumentError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_prefix(prefix: Option<String>) -> Option<String> {
    prefix
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

fn check_padding(padding: i32) -> Result<i32, DocumentError> {
    if !(1..=MAX_PADDING).contains(&padding) {
        return Err(DocumentError::Validation(format!(
            "padding must be between 1 and {MAX_PADDING}"
        )));
    }
    Ok(padding)
}

#[derive(Clone, Debug)]
pub struct NewDocumentType {
    pub code: String,
    pub name: String,
    pub prefix: Option<String>,
    pub separator: Option<String>,
    pub padding: Option<i32>,
    pub reset_period: Option<document_type::ResetPeriod>,
}

pub async fn create_document_type(
    db: &DatabaseConnection,
    input: NewDocumentType,
) -> Result<document_type::Model, DocumentError> {
    let code = required("code", &input.code, 64)?.to_lowercase();
    let name = required("name", &input.name, MAX_TITLE_LEN)?;
    let taken = document_type::Entity::find()
        .filter(document_type::Column::Code.eq(code.clone()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(DocumentError::Validation(format!(
            "document type {code} already exists"
        )));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = document_type::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        name: Set(name),
        prefix: Set(normalize_prefix(input.prefix)),
        separator: Set(input.separator.unwrap_or_else(|| "-".to_string())),
        padding: Set(check_padding(input.padding.unwrap_or(4))?),
        reset_period: Set(input
            .reset_period
            .unwrap_or(document_type::ResetPeriod::Yearly)),
        counter: Set(0),
        last_reset_period: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

/// Changes numbering settings. The running counter is left alone; an empty
/// prefix switches numbering off.
#[derive(Clone, Debug, Default)]
pub struct DocumentTypeChanges {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub separator: Option<String>,
    pub padding: Option<i32>,
    pub reset_period: Option<document_type::ResetPeriod>,
}

pub async fn update_document_type(
    db: &DatabaseConnection,
    id: Uuid,
    changes: DocumentTypeChanges,
) -> Result<document_type::Model, DocumentError> {
    let existing = document_type::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DocumentError::TypeNotFound)?;
    let mut active: document_type::ActiveModel = existing.into();
    if let Some(name) = changes.name {
        active.name = Set(required("name", &name, MAX_TITLE_LEN)?);
    }
    if changes.prefix.is_some() {
        active.prefix = Set(normalize_prefix(changes.prefix));
    }
    if let Some(separator) = changes.separator {
        active.separator = Set(separator);
    }
    if let Some(padding) = changes.padding {
        active.padding = Set(check_padding(padding)?);
    }
    if let Some(reset) = changes.reset_period {
        active.reset_period = Set(reset);
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(db).await?)
}

pub async fn create_template(
    db: &DatabaseConnection,
    name: &str,
    document_type_id: Uuid,
    body: &str,
) -> Result<er_template::Model, DocumentError> {
    let name = required("name", name, MAX_TITLE_LEN)?;
    document_type::Entity::find_by_id(document_type_id)
        .one(db)
        .await?
        .ok_or(DocumentError::TypeNotFound)?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = er_template::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        document_type_id: Set(document_type_id),
        body: Set(body.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

pub async fn update_template(
    db: &DatabaseConnection,
    id: Uuid,
    name: Option<String>,
    body: Option<String>,
) -> Result<er_template::Model, DocumentError> {
    let existing = er_template::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DocumentError::TemplateNotFound)?;
    let mut active: er_template::ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(required("name", &name, MAX_TITLE_LEN)?);
    }
    if let Some(body) = body {
        active.body = Set(body);
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(db).await?)
}

/// Renders `body` against everything known about `employee_id`.
pub async fn render_for_employee(
    db: &DatabaseConnection,
    body: &str,
    employee_id: Uuid,
    company: &CompanyProfile,
    now: DateTime<Utc>,
    document_number: Option<&str>,
    custom: Option<Value>,
) -> Result<Rendered, DocumentError> {
    let person = employee::Entity::find_by_id(employee_id)
        .one(db)
        .await?
        .ok_or(DocumentError::EmployeeNotFound)?;
    let seat = match person.position_id {
        Some(id) => position::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let unit = match person.department_id {
        Some(id) => department::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let ctx = build_context(ContextSources {
        employee: &person,
        position: seat.as_ref(),
        department: unit.as_ref(),
        company,
        now,
        document_number,
        custom,
    });
    Ok(render(body, &ctx))
}

#[derive(Clone, Debug)]
pub struct NewDocument {
    pub document_type_id: Uuid,
    pub template_id: Option<Uuid>,
    pub employee_id: Uuid,
    pub title: Option<String>,
    /// Used when no template is given.
    pub content: Option<String>,
    pub reviewers: Vec<Reviewer>,
    pub custom: Option<Value>,
    /// Hand the document to its reviewers right away.
    pub submit: bool,
}

#[derive(Clone, Debug)]
pub struct CreatedDocument {
    pub document: er_document::Model,
    pub unresolved: Vec<String>,
}

pub async fn create_document(
    db: &DatabaseConnection,
    input: NewDocument,
    company: &CompanyProfile,
    actor: Option<Uuid>,
) -> Result<CreatedDocument, DocumentError> {
    let kind = document_type::Entity::find_by_id(input.document_type_id)
        .one(db)
        .await?
        .ok_or(DocumentError::TypeNotFound)?;
    let template = match input.template_id {
        Some(id) => {
            let found = er_template::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or(DocumentError::TemplateNotFound)?;
            if found.document_type_id != kind.id {
                return Err(DocumentError::Validation(
                    "template belongs to another document type".into(),
                ));
            }
            Some(found)
        }
        None => None,
    };
    employee::Entity::find_by_id(input.employee_id)
        .one(db)
        .await?
        .ok_or(DocumentError::EmployeeNotFound)?;

    let title = match input.title.as_deref() {
        Some(title) => required("title", title, MAX_TITLE_LEN)?,
        None => template
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| kind.name.clone()),
    };
    let body = match (&template, input.content) {
        (Some(t), _) => t.body.clone(),
        (None, Some(content)) => content,
        (None, None) => String::new(),
    };

    // Reviewer checks run before a number is taken.
    let mut state = ReviewState {
        status: er_document::Status::Draft,
        reviewers: input.reviewers,
        rejection_reason: None,
    };
    let parked = if input.submit {
        Some(state.park()?)
    } else {
        None
    };

    let now = Utc::now();
    let number = match allocate_number(db, kind.id, now.date_naive()).await {
        Ok(number) => Some(number.code),
        Err(NumberingError::MissingPrefix(code)) => {
            warn!(document_type = %code, "document type has no prefix; creating document without a number");
            None
        }
        Err(err) => return Err(err.into()),
    };

    let rendered = render_for_employee(
        db,
        &body,
        input.employee_id,
        company,
        now,
        number.as_deref(),
        input.custom,
    )
    .await?;

    let stamp: DateTimeWithTimeZone = now.into();
    let document_id = Uuid::new_v4();
    let txn = db.begin().await?;
    let model = er_document::ActiveModel {
        id: Set(document_id),
        document_type_id: Set(kind.id),
        template_id: Set(template.as_ref().map(|t| t.id)),
        employee_id: Set(input.employee_id),
        number: Set(number.clone()),
        title: Set(title),
        content: Set(rendered.text),
        status: Set(state.status),
        reviewers: Set(reviewers_json(&state.reviewers)),
        rejection_reason: Set(None),
        created_by: Set(actor),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    };
    let inserted = model.insert(&txn).await?;
    insert_history(
        &txn,
        document_id,
        Action::Created,
        None,
        Some(er_document::Status::Draft),
        actor,
        number.clone(),
    )
    .await?;
    if let Some(transition) = parked {
        insert_history(
            &txn,
            document_id,
            transition.action,
            Some(transition.from),
            Some(transition.to),
            actor,
            None,
        )
        .await?;
    }
    txn.commit().await?;
    info!(%document_id, number = ?number, unresolved = rendered.unresolved.len(), "document created");

    Ok(CreatedDocument {
        document: inserted,
        unresolved: rendered.unresolved,
    })
}
