use async_graphql::{Context, Enum, Error, InputObject, Json, Object, SimpleObject, ID};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{document_type, er_document, er_document_history, er_template};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::{info_span, Instrument};

use super::{
    company_profile, conflict, database, db_error, enforce_page, error_with_code, id_of,
    not_found, parse_optional_id, parse_uuid, require_role, require_viewer, validation_error,
    DocumentAction, DocumentStatus, ResetPeriod,
};
use crate::auth::UserRole;
use crate::documents::{
    self, DocumentError, DocumentTypeChanges, NewDocumentType, NewDocument,
};
use crate::numbering::{self, NumberingError};
use crate::review::{
    self, parse_reviewers, Decision, ReviewActor, ReviewError, Reviewer, ReviewerKind, Verdict,
};
use crate::template;

const MAX_BODY_LEN: usize = 200_000;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
#[graphql(name = "ReviewerKind")]
pub enum ReviewerKindGql {
    User,
    Position,
}

impl From<ReviewerKind> for ReviewerKindGql {
    fn from(value: ReviewerKind) -> Self {
        match value {
            ReviewerKind::User => ReviewerKindGql::User,
            ReviewerKind::Position => ReviewerKindGql::Position,
        }
    }
}

impl From<ReviewerKindGql> for ReviewerKind {
    fn from(value: ReviewerKindGql) -> Self {
        match value {
            ReviewerKindGql::User => ReviewerKind::User,
            ReviewerKindGql::Position => ReviewerKind::Position,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReviewDecision {
    Pending,
    Approved,
    Rejected,
}

impl From<Decision> for ReviewDecision {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Pending => ReviewDecision::Pending,
            Decision::Approved => ReviewDecision::Approved,
            Decision::Rejected => ReviewDecision::Rejected,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "DocumentType")]
pub struct DocumentTypeNode {
    pub id: ID,
    pub code: String,
    pub name: String,
    pub prefix: Option<String>,
    pub separator: String,
    pub padding: i32,
    #[graphql(name = "resetPeriod")]
    pub reset_period: ResetPeriod,
    pub counter: i64,
    #[graphql(name = "lastResetPeriod")]
    pub last_reset_period: Option<String>,
}

impl From<document_type::Model> for DocumentTypeNode {
    fn from(model: document_type::Model) -> Self {
        Self {
            id: id_of(model.id),
            code: model.code,
            name: model.name,
            prefix: model.prefix,
            separator: model.separator,
            padding: model.padding,
            reset_period: model.reset_period.into(),
            counter: model.counter,
            last_reset_period: model.last_reset_period,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "DocumentTemplate")]
pub struct TemplateNode {
    pub id: ID,
    pub name: String,
    #[graphql(name = "documentTypeId")]
    pub document_type_id: ID,
    pub body: String,
    pub markers: Vec<String>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<er_template::Model> for TemplateNode {
    fn from(model: er_template::Model) -> Self {
        Self {
            markers: template::markers(&model.body),
            id: id_of(model.id),
            name: model.name,
            document_type_id: id_of(model.document_type_id),
            body: model.body,
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Reviewer")]
pub struct ReviewerNode {
    pub key: ID,
    pub kind: ReviewerKindGql,
    pub name: String,
    pub decision: ReviewDecision,
    #[graphql(name = "decidedAt")]
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl From<Reviewer> for ReviewerNode {
    fn from(reviewer: Reviewer) -> Self {
        Self {
            key: id_of(reviewer.key),
            kind: reviewer.kind.into(),
            name: reviewer.name,
            decision: reviewer.decision.into(),
            decided_at: reviewer.decided_at,
            comment: reviewer.comment,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Document")]
pub struct DocumentNode {
    pub id: ID,
    #[graphql(name = "documentTypeId")]
    pub document_type_id: ID,
    #[graphql(name = "templateId")]
    pub template_id: Option<ID>,
    #[graphql(name = "employeeId")]
    pub employee_id: ID,
    pub number: Option<String>,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
    pub reviewers: Vec<ReviewerNode>,
    #[graphql(name = "rejectionReason")]
    pub rejection_reason: Option<String>,
    #[graphql(name = "createdBy")]
    pub created_by: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<er_document::Model> for DocumentNode {
    type Error = Error;

    fn try_from(model: er_document::Model) -> Result<Self, Self::Error> {
        let reviewers = parse_reviewers(&model.reviewers).map_err(review_error)?;
        Ok(Self {
            id: id_of(model.id),
            document_type_id: id_of(model.document_type_id),
            template_id: model.template_id.map(id_of),
            employee_id: id_of(model.employee_id),
            number: model.number,
            title: model.title,
            content: model.content,
            status: model.status.into(),
            reviewers: reviewers.into_iter().map(ReviewerNode::from).collect(),
            rejection_reason: model.rejection_reason,
            created_by: model.created_by.map(id_of),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "DocumentHistoryEntry")]
pub struct DocumentHistoryNode {
    pub id: ID,
    pub action: DocumentAction,
    #[graphql(name = "fromStatus")]
    pub from_status: Option<DocumentStatus>,
    #[graphql(name = "toStatus")]
    pub to_status: Option<DocumentStatus>,
    #[graphql(name = "actorId")]
    pub actor_id: Option<ID>,
    pub comment: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<er_document_history::Model> for DocumentHistoryNode {
    fn from(model: er_document_history::Model) -> Self {
        Self {
            id: id_of(model.id),
            action: model.action.into(),
            from_status: model.from_status.map(Into::into),
            to_status: model.to_status.map(Into::into),
            actor_id: model.actor_id.map(id_of),
            comment: model.comment,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CreateDocumentPayload {
    pub document: DocumentNode,
    /// Recognized fields that had no value and were printed as blanks.
    pub unresolved: Vec<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct TemplatePreview {
    pub text: String,
    pub unresolved: Vec<String>,
    pub markers: Vec<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DocumentNumberPayload {
    pub code: String,
    pub sequence: i64,
    pub period: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct DocumentTypeInput {
    pub code: String,
    pub name: String,
    pub prefix: Option<String>,
    pub separator: Option<String>,
    pub padding: Option<i32>,
    #[graphql(name = "resetPeriod")]
    pub reset_period: Option<ResetPeriod>,
}

#[derive(InputObject, Clone)]
pub struct UpdateDocumentTypeInput {
    pub id: ID,
    pub name: Option<String>,
    /// Empty string removes the prefix and turns numbering off.
    pub prefix: Option<String>,
    pub separator: Option<String>,
    pub padding: Option<i32>,
    #[graphql(name = "resetPeriod")]
    pub reset_period: Option<ResetPeriod>,
}

#[derive(InputObject, Clone)]
pub struct ReviewerInput {
    pub key: ID,
    pub kind: ReviewerKindGql,
    pub name: String,
}

#[derive(InputObject, Clone)]
pub struct CreateDocumentInput {
    #[graphql(name = "documentTypeId")]
    pub document_type_id: ID,
    #[graphql(name = "templateId")]
    pub template_id: Option<ID>,
    #[graphql(name = "employeeId")]
    pub employee_id: ID,
    pub title: Option<String>,
    pub content: Option<String>,
    #[graphql(default)]
    pub reviewers: Vec<ReviewerInput>,
    pub custom: Option<Json<serde_json::Value>>,
    #[graphql(default)]
    pub submit: bool,
}

#[derive(InputObject, Clone)]
pub struct EditDocumentInput {
    pub id: ID,
    pub title: Option<String>,
    pub content: Option<String>,
    pub reviewers: Option<Vec<ReviewerInput>>,
}

fn reviewers_from_input(inputs: Vec<ReviewerInput>) -> async_graphql::Result<Vec<Reviewer>> {
    let mut reviewers = Vec::with_capacity(inputs.len());
    for input in inputs {
        let key = parse_uuid(&input.key)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(validation_error("Reviewer name is required"));
        }
        if reviewers
            .iter()
            .any(|r: &Reviewer| r.key == key && r.kind == input.kind.into())
        {
            return Err(validation_error("Reviewer listed twice"));
        }
        reviewers.push(Reviewer::new(key, input.kind.into(), name));
    }
    Ok(reviewers)
}

fn check_body(body: &str) -> async_graphql::Result<()> {
    if body.chars().count() > MAX_BODY_LEN {
        return Err(validation_error(format!(
            "body must be at most {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(())
}

pub(super) fn numbering_error(err: NumberingError) -> Error {
    match err {
        NumberingError::UnknownType => not_found("Document type not found"),
        NumberingError::MissingPrefix(code) => {
            validation_error(format!("Document type {code} has no numbering prefix"))
        }
        NumberingError::Contention => conflict("Document number allocation is busy, retry"),
        NumberingError::PeriodClosed { requested, current } => conflict(format!(
            "Numbering period {requested} is closed; the counter is already in {current}"
        )),
        NumberingError::Db(e) => db_error(e),
    }
}

pub(super) fn review_error(err: ReviewError) -> Error {
    match err {
        ReviewError::NotFound => not_found("Document not found"),
        ReviewError::InvalidTransition { from, action } => conflict(format!(
            "Cannot {action} a document in status {:?}",
            DocumentStatus::from(from)
        )),
        ReviewError::NoReviewers => validation_error("At least one reviewer is required"),
        ReviewError::NotAReviewer => {
            error_with_code("FORBIDDEN", "You are not a reviewer of this document")
        }
        ReviewError::AlreadyDecided => conflict("You have already decided on this document"),
        ReviewError::ReasonRequired => validation_error("A reason is required"),
        ReviewError::CommentRequired => validation_error("Comment must not be empty"),
        ReviewError::ReasonTooLong => validation_error("Reason is too long"),
        ReviewError::Malformed(e) => {
            error_with_code("INTERNAL", format!("Stored reviewers are malformed: {e}"))
        }
        ReviewError::Db(e) => db_error(e),
    }
}

pub(super) fn document_error(err: DocumentError) -> Error {
    match err {
        DocumentError::TypeNotFound => not_found("Document type not found"),
        DocumentError::TemplateNotFound => not_found("Template not found"),
        DocumentError::EmployeeNotFound => not_found("Employee not found"),
        DocumentError::Validation(message) => validation_error(message),
        DocumentError::Numbering(e) => numbering_error(e),
        DocumentError::Review(e) => review_error(e),
        DocumentError::Db(e) => db_error(e),
    }
}

async fn template_body(
    ctx: &Context<'_>,
    template_id: Option<ID>,
    body: Option<String>,
) -> async_graphql::Result<String> {
    match (template_id, body) {
        (Some(id), _) => {
            let db = database(ctx)?;
            let template_id = parse_uuid(&id)?;
            let found = er_template::Entity::find_by_id(template_id)
                .one(db.as_ref())
                .await
                .map_err(db_error)?
                .ok_or_else(|| not_found("Template not found"))?;
            Ok(found.body)
        }
        (None, Some(body)) => {
            check_body(&body)?;
            Ok(body)
        }
        (None, None) => Err(validation_error("templateId or body is required")),
    }
}

#[derive(Default)]
pub struct DocumentQuery;

#[Object]
impl DocumentQuery {
    async fn document_types(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<DocumentTypeNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let rows = document_type::Entity::find()
            .order_by_asc(document_type::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(DocumentTypeNode::from).collect())
    }

    async fn templates(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "documentTypeId")] document_type_id: Option<ID>,
    ) -> async_graphql::Result<Vec<TemplateNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let mut query = er_template::Entity::find();
        if let Some(type_id) = parse_optional_id("documentTypeId", document_type_id.as_ref())? {
            query = query.filter(er_template::Column::DocumentTypeId.eq(type_id));
        }
        let rows = query
            .order_by_asc(er_template::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(TemplateNode::from).collect())
    }

    async fn template_markers(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "templateId")] template_id: Option<ID>,
        body: Option<String>,
    ) -> async_graphql::Result<Vec<String>> {
        require_viewer(ctx)?;
        let body = template_body(ctx, template_id, body).await?;
        Ok(template::markers(&body))
    }

    async fn preview_template(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "templateId")] template_id: Option<ID>,
        body: Option<String>,
        #[graphql(name = "employeeId")] employee_id: ID,
        custom: Option<Json<serde_json::Value>>,
    ) -> async_graphql::Result<TemplatePreview> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let company = company_profile(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        let body = template_body(ctx, template_id, body).await?;
        let rendered = documents::render_for_employee(
            db.as_ref(),
            &body,
            employee_id,
            company.as_ref(),
            Utc::now(),
            None,
            custom.map(|c| c.0),
        )
        .await
        .map_err(document_error)?;
        Ok(TemplatePreview {
            markers: template::markers(&body),
            text: rendered.text,
            unresolved: rendered.unresolved,
        })
    }

    async fn documents(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: Option<ID>,
        status: Option<DocumentStatus>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<DocumentNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let limit = enforce_page(first)?;
        let skip = offset.unwrap_or(0).max(0) as u64;
        let mut query = er_document::Entity::find();
        if let Some(employee_id) = parse_optional_id("employeeId", employee_id.as_ref())? {
            query = query.filter(er_document::Column::EmployeeId.eq(employee_id));
        }
        if let Some(status) = status {
            query = query.filter(er_document::Column::Status.eq(er_document::Status::from(status)));
        }
        let rows = query
            .order_by_desc(er_document::Column::CreatedAt)
            .limit(limit)
            .offset(skip)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        rows.into_iter().map(DocumentNode::try_from).collect()
    }

    async fn document(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<DocumentNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let found = er_document::Entity::find_by_id(document_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        found.map(DocumentNode::try_from).transpose()
    }

    async fn document_history(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "documentId")] document_id: ID,
    ) -> async_graphql::Result<Vec<DocumentHistoryNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&document_id)?;
        let rows = er_document_history::Entity::find()
            .filter(er_document_history::Column::DocumentId.eq(document_id))
            .order_by_asc(er_document_history::Column::Seq)
            .order_by_asc(er_document_history::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(DocumentHistoryNode::from).collect())
    }
}

#[derive(Default)]
pub struct DocumentMutation;

#[Object]
impl DocumentMutation {
    async fn create_document_type(
        &self,
        ctx: &Context<'_>,
        input: DocumentTypeInput,
    ) -> async_graphql::Result<DocumentTypeNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let new_type = NewDocumentType {
            code: input.code,
            name: input.name,
            prefix: input.prefix,
            separator: input.separator,
            padding: input.padding,
            reset_period: input.reset_period.map(Into::into),
        };
        let created = documents::create_document_type(db.as_ref(), new_type)
            .await
            .map_err(document_error)?;
        Ok(created.into())
    }

    async fn update_document_type(
        &self,
        ctx: &Context<'_>,
        input: UpdateDocumentTypeInput,
    ) -> async_graphql::Result<DocumentTypeNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let id = parse_uuid(&input.id)?;
        let changes = DocumentTypeChanges {
            name: input.name,
            prefix: input.prefix,
            separator: input.separator,
            padding: input.padding,
            reset_period: input.reset_period.map(Into::into),
        };
        let updated = documents::update_document_type(db.as_ref(), id, changes)
            .await
            .map_err(document_error)?;
        Ok(updated.into())
    }

    /// Hands out the next number without creating a document, for paperwork
    /// registered outside the system.
    async fn allocate_document_number(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "documentTypeId")] document_type_id: ID,
        date: Option<NaiveDate>,
    ) -> async_graphql::Result<DocumentNumberPayload> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let type_id = parse_uuid(&document_type_id)?;
        let today = date.unwrap_or_else(|| Utc::now().date_naive());
        let number = numbering::allocate_number(db.as_ref(), type_id, today)
            .instrument(info_span!("hr.documents.allocate_number", %type_id))
            .await
            .map_err(numbering_error)?;
        Ok(DocumentNumberPayload {
            code: number.code,
            sequence: number.sequence,
            period: number.period,
        })
    }

    async fn create_template(
        &self,
        ctx: &Context<'_>,
        name: String,
        #[graphql(name = "documentTypeId")] document_type_id: ID,
        body: String,
    ) -> async_graphql::Result<TemplateNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        check_body(&body)?;
        let type_id = parse_uuid(&document_type_id)?;
        let created = documents::create_template(db.as_ref(), &name, type_id, &body)
            .await
            .map_err(document_error)?;
        Ok(created.into())
    }

    async fn update_template(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: Option<String>,
        body: Option<String>,
    ) -> async_graphql::Result<TemplateNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        if let Some(body) = body.as_deref() {
            check_body(body)?;
        }
        let template_id = parse_uuid(&id)?;
        let updated = documents::update_template(db.as_ref(), template_id, name, body)
            .await
            .map_err(document_error)?;
        Ok(updated.into())
    }

    async fn create_document(
        &self,
        ctx: &Context<'_>,
        input: CreateDocumentInput,
    ) -> async_graphql::Result<CreateDocumentPayload> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let company = company_profile(ctx)?;
        if let Some(content) = input.content.as_deref() {
            check_body(content)?;
        }
        let new_document = NewDocument {
            document_type_id: parse_uuid(&input.document_type_id)?,
            template_id: parse_optional_id("templateId", input.template_id.as_ref())?,
            employee_id: parse_uuid(&input.employee_id)?,
            title: input.title,
            content: input.content,
            reviewers: reviewers_from_input(input.reviewers)?,
            custom: input.custom.map(|c| c.0),
            submit: input.submit,
        };
        let span = info_span!(
            "hr.documents.create",
            document_type_id = %new_document.document_type_id,
            employee_id = %new_document.employee_id,
            submit = new_document.submit
        );
        let created =
            documents::create_document(db.as_ref(), new_document, company.as_ref(), Some(current.user_id))
                .instrument(span)
                .await
                .map_err(document_error)?;
        Ok(CreateDocumentPayload {
            document: DocumentNode::try_from(created.document)?,
            unresolved: created.unresolved,
        })
    }

    async fn edit_document(
        &self,
        ctx: &Context<'_>,
        input: EditDocumentInput,
    ) -> async_graphql::Result<DocumentNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&input.id)?;
        if let Some(content) = input.content.as_deref() {
            check_body(content)?;
        }
        let title = match input.title {
            Some(title) if title.trim().is_empty() => {
                return Err(validation_error("Title cannot be empty"))
            }
            other => other.map(|t| t.trim().to_string()),
        };
        let reviewers = input.reviewers.map(reviewers_from_input).transpose()?;
        let updated = review::edit_document(
            db.as_ref(),
            document_id,
            current.user_id,
            title,
            input.content,
            reviewers,
        )
        .await
        .map_err(review_error)?;
        DocumentNode::try_from(updated)
    }

    async fn submit_document(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<DocumentNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let updated = review::submit_document(db.as_ref(), document_id, current.user_id)
            .instrument(info_span!("hr.documents.submit", %document_id))
            .await
            .map_err(review_error)?;
        DocumentNode::try_from(updated)
    }

    async fn review_document(
        &self,
        ctx: &Context<'_>,
        id: ID,
        verdict: ReviewVerdict,
        comment: Option<String>,
    ) -> async_graphql::Result<DocumentNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let verdict = match verdict {
            ReviewVerdict::Approve => Verdict::Approve { comment },
            ReviewVerdict::Reject => Verdict::Reject {
                reason: comment.unwrap_or_default(),
            },
        };
        let actor = ReviewActor {
            user_id: current.user_id,
            position_id: current.position_id,
        };
        let updated = review::decide_document(db.as_ref(), document_id, actor, verdict)
            .instrument(info_span!("hr.documents.review", %document_id))
            .await
            .map_err(review_error)?;
        DocumentNode::try_from(updated)
    }

    async fn approve_document(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<DocumentNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let updated = review::approve_document(db.as_ref(), document_id, current.user_id)
            .instrument(info_span!("hr.documents.approve", %document_id))
            .await
            .map_err(review_error)?;
        DocumentNode::try_from(updated)
    }

    async fn sign_document(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<DocumentNode> {
        let current = require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let updated = review::sign_document(db.as_ref(), document_id, current.user_id)
            .instrument(info_span!("hr.documents.sign", %document_id))
            .await
            .map_err(review_error)?;
        DocumentNode::try_from(updated)
    }

    async fn comment_document(
        &self,
        ctx: &Context<'_>,
        id: ID,
        comment: String,
    ) -> async_graphql::Result<DocumentHistoryNode> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let document_id = parse_uuid(&id)?;
        let entry = review::comment_document(db.as_ref(), document_id, current.user_id, comment)
            .await
            .map_err(review_error)?;
        Ok(entry.into())
    }
}
