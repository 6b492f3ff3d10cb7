//! Review and sign-off workflow for employment-relations documents.
//!
//! `DRAFT → (PENDING) → IN_REVIEW → REVIEWED → APPROVED → SIGNED`, with a
//! reviewer rejection sending the document back to `DRAFT`. The pure state
//! machine lives in [`ReviewState`]; the `*_document` functions persist a
//! transition together with its history rows in one transaction.

use chrono::{DateTime, Utc};
use entity::er_document::{self, Status};
use entity::er_document_history::{self, Action};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const MAX_REASON_LEN: usize = 2000;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("document not found")]
    NotFound,
    #[error("cannot {action} a document in status {from:?}")]
    InvalidTransition { from: Status, action: &'static str },
    #[error("at least one reviewer is required")]
    NoReviewers,
    #[error("caller is not a reviewer of this document")]
    NotAReviewer,
    #[error("caller has already decided on this document")]
    AlreadyDecided,
    #[error("a rejection reason is required")]
    ReasonRequired,
    #[error("comment must not be empty")]
    CommentRequired,
    #[error("reason is too long")]
    ReasonTooLong,
    #[error("stored reviewer list is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewerKind {
    User,
    Position,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    /// User id for `USER` reviewers, position id for `POSITION` reviewers.
    pub key: Uuid,
    pub kind: ReviewerKind,
    pub name: String,
    #[serde(default)]
    pub decision: Decision,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Reviewer {
    pub fn new(key: Uuid, kind: ReviewerKind, name: impl Into<String>) -> Self {
        Self {
            key,
            kind,
            name: name.into(),
            decision: Decision::Pending,
            decided_at: None,
            comment: None,
        }
    }

    fn matches(&self, actor: &ReviewActor) -> bool {
        match self.kind {
            ReviewerKind::User => self.key == actor.user_id,
            ReviewerKind::Position => actor.position_id == Some(self.key),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReviewActor {
    pub user_id: Uuid,
    pub position_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Approve { comment: Option<String> },
    Reject { reason: String },
}

/// One history row worth of change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub from: Status,
    pub to: Status,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewState {
    pub status: Status,
    pub reviewers: Vec<Reviewer>,
    pub rejection_reason: Option<String>,
}

pub fn parse_reviewers(value: &serde_json::Value) -> Result<Vec<Reviewer>, ReviewError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value.clone())?)
}

pub fn reviewers_json(reviewers: &[Reviewer]) -> serde_json::Value {
    serde_json::to_value(reviewers).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
}

pub fn can_edit(status: Status) -> bool {
    status == Status::Draft
}

impl ReviewState {
    pub fn from_model(model: &er_document::Model) -> Result<Self, ReviewError> {
        Ok(Self {
            status: model.status,
            reviewers: parse_reviewers(&model.reviewers)?,
            rejection_reason: model.rejection_reason.clone(),
        })
    }

    fn move_to(&mut self, action: Action, to: Status, comment: Option<String>) -> Transition {
        let from = self.status;
        self.status = to;
        Transition {
            action,
            from,
            to,
            comment,
        }
    }

    fn reset_decisions(&mut self) {
        for reviewer in &mut self.reviewers {
            reviewer.decision = Decision::Pending;
            reviewer.decided_at = None;
            reviewer.comment = None;
        }
        self.rejection_reason = None;
    }

    /// Hands the document to its reviewers without opening the review yet.
    pub fn park(&mut self) -> Result<Transition, ReviewError> {
        if self.status != Status::Draft {
            return Err(ReviewError::InvalidTransition {
                from: self.status,
                action: "submit",
            });
        }
        if self.reviewers.is_empty() {
            return Err(ReviewError::NoReviewers);
        }
        self.reset_decisions();
        Ok(self.move_to(Action::Submitted, Status::Pending, None))
    }

    pub fn submit(&mut self) -> Result<Transition, ReviewError> {
        if self.status != Status::Draft {
            return Err(ReviewError::InvalidTransition {
                from: self.status,
                action: "submit",
            });
        }
        if self.reviewers.is_empty() {
            return Err(ReviewError::NoReviewers);
        }
        self.reset_decisions();
        Ok(self.move_to(Action::Submitted, Status::InReview, None))
    }

    pub fn all_approved(&self) -> bool {
        !self.reviewers.is_empty()
            && self
                .reviewers
                .iter()
                .all(|r| r.decision == Decision::Approved)
    }

    pub fn decide(
        &mut self,
        actor: &ReviewActor,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transition>, ReviewError> {
        if !matches!(self.status, Status::Pending | Status::InReview) {
            return Err(ReviewError::InvalidTransition {
                from: self.status,
                action: "review",
            });
        }
        let matching: Vec<usize> = self
            .reviewers
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matches(actor))
            .map(|(idx, _)| idx)
            .collect();
        if matching.is_empty() {
            return Err(ReviewError::NotAReviewer);
        }
        let open: Vec<usize> = matching
            .into_iter()
            .filter(|idx| self.reviewers[*idx].decision == Decision::Pending)
            .collect();
        if open.is_empty() {
            return Err(ReviewError::AlreadyDecided);
        }

        match verdict {
            Verdict::Approve { comment } => {
                let comment = normalize_comment(comment)?;
                for idx in &open {
                    let reviewer = &mut self.reviewers[*idx];
                    reviewer.decision = Decision::Approved;
                    reviewer.decided_at = Some(now);
                    reviewer.comment = comment.clone();
                }
                let mut transitions =
                    vec![self.move_to(Action::ReviewerApproved, Status::InReview, comment)];
                if self.all_approved() {
                    transitions.push(self.move_to(Action::Reviewed, Status::Reviewed, None));
                }
                Ok(transitions)
            }
            Verdict::Reject { reason } => {
                let reason = normalize_comment(Some(reason))?.ok_or(ReviewError::ReasonRequired)?;
                for idx in &open {
                    let reviewer = &mut self.reviewers[*idx];
                    reviewer.decision = Decision::Rejected;
                    reviewer.decided_at = Some(now);
                    reviewer.comment = Some(reason.clone());
                }
                self.rejection_reason = Some(reason.clone());
                Ok(vec![self.move_to(
                    Action::ReviewerRejected,
                    Status::Draft,
                    Some(reason),
                )])
            }
        }
    }

    pub fn approve(&mut self) -> Result<Transition, ReviewError> {
        if self.status != Status::Reviewed {
            return Err(ReviewError::InvalidTransition {
                from: self.status,
                action: "approve",
            });
        }
        Ok(self.move_to(Action::Approved, Status::Approved, None))
    }

    pub fn sign(&mut self) -> Result<Transition, ReviewError> {
        if self.status != Status::Approved {
            return Err(ReviewError::InvalidTransition {
                from: self.status,
                action: "sign",
            });
        }
        Ok(self.move_to(Action::Signed, Status::Signed, None))
    }
}

fn normalize_comment(value: Option<String>) -> Result<Option<String>, ReviewError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_REASON_LEN {
        return Err(ReviewError::ReasonTooLong);
    }
    Ok(Some(trimmed.to_string()))
}

pub(crate) async fn insert_history<C: ConnectionTrait>(
    conn: &C,
    document_id: Uuid,
    action: Action,
    from: Option<Status>,
    to: Option<Status>,
    actor_id: Option<Uuid>,
    comment: Option<String>,
) -> Result<er_document_history::Model, DbErr> {
    let written = er_document_history::Entity::find()
        .filter(er_document_history::Column::DocumentId.eq(document_id))
        .count(conn)
        .await?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let row = er_document_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        document_id: Set(document_id),
        seq: Set(written as i32 + 1),
        action: Set(action),
        from_status: Set(from),
        to_status: Set(to),
        actor_id: Set(actor_id),
        comment: Set(comment),
        created_at: Set(now),
    };
    row.insert(conn).await
}

/// Loads the document, applies `step` to its review state and writes the
/// result plus one history row per transition, all in one transaction.
async fn apply_transition<F>(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Option<Uuid>,
    step: F,
) -> Result<er_document::Model, ReviewError>
where
    F: FnOnce(&mut ReviewState) -> Result<Vec<Transition>, ReviewError>,
{
    let txn = db.begin().await?;
    let existing = er_document::Entity::find_by_id(document_id)
        .one(&txn)
        .await?
        .ok_or(ReviewError::NotFound)?;
    let mut state = ReviewState::from_model(&existing)?;
    let transitions = step(&mut state)?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut active: er_document::ActiveModel = existing.into();
    active.status = Set(state.status);
    active.reviewers = Set(reviewers_json(&state.reviewers));
    active.rejection_reason = Set(state.rejection_reason.clone());
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;

    for transition in transitions {
        info!(
            %document_id,
            action = ?transition.action,
            from = ?transition.from,
            to = ?transition.to,
            "document transition"
        );
        insert_history(
            &txn,
            document_id,
            transition.action,
            Some(transition.from),
            Some(transition.to),
            actor_id,
            transition.comment,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(updated)
}

pub async fn submit_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Uuid,
) -> Result<er_document::Model, ReviewError> {
    apply_transition(db, document_id, Some(actor_id), |state| {
        Ok(vec![state.submit()?])
    })
    .await
}

pub async fn decide_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor: ReviewActor,
    verdict: Verdict,
) -> Result<er_document::Model, ReviewError> {
    apply_transition(db, document_id, Some(actor.user_id), |state| {
        state.decide(&actor, verdict, Utc::now())
    })
    .await
}

pub async fn approve_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Uuid,
) -> Result<er_document::Model, ReviewError> {
    apply_transition(db, document_id, Some(actor_id), |state| {
        Ok(vec![state.approve()?])
    })
    .await
}

pub async fn sign_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Uuid,
) -> Result<er_document::Model, ReviewError> {
    apply_transition(db, document_id, Some(actor_id), |state| {
        Ok(vec![state.sign()?])
    })
    .await
}

/// Rewrites title and/or content of a draft.
pub async fn edit_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Uuid,
    title: Option<String>,
    content: Option<String>,
    reviewers: Option<Vec<Reviewer>>,
) -> Result<er_document::Model, ReviewError> {
    let txn = db.begin().await?;
    let existing = er_document::Entity::find_by_id(document_id)
        .one(&txn)
        .await?
        .ok_or(ReviewError::NotFound)?;
    if !can_edit(existing.status) {
        return Err(ReviewError::InvalidTransition {
            from: existing.status,
            action: "edit",
        });
    }
    let status = existing.status;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut active: er_document::ActiveModel = existing.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(content) = content {
        active.content = Set(content);
    }
    if let Some(reviewers) = reviewers {
        active.reviewers = Set(reviewers_json(&reviewers));
    }
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;
    insert_history(
        &txn,
        document_id,
        Action::Edited,
        Some(status),
        Some(status),
        Some(actor_id),
        None,
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

pub async fn comment_document(
    db: &DatabaseConnection,
    document_id: Uuid,
    actor_id: Uuid,
    comment: String,
) -> Result<er_document_history::Model, ReviewError> {
    let comment = normalize_comment(Some(comment))?.ok_or(ReviewError::CommentRequired)?;
    let existing = er_document::Entity::find_by_id(document_id)
        .one(db)
        .await?
        .ok_or(ReviewError::NotFound)?;
    let entry = insert_history(
        db,
        document_id,
        Action::Comment,
        Some(existing.status),
        Some(existing.status),
        Some(actor_id),
        Some(comment),
    )
    .await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_reviewer(id: Uuid) -> Reviewer {
        Reviewer::new(id, ReviewerKind::User, "Reviewer")
    }

    fn state(status: Status, reviewers: Vec<Reviewer>) -> ReviewState {
        ReviewState {
            status,
            reviewers,
            rejection_reason: None,
        }
    }

    fn actor(user_id: Uuid) -> ReviewActor {
        ReviewActor {
            user_id,
            position_id: None,
        }
    }

    #[test]
    fn submit_requires_reviewers_and_resets_decisions() {
        let mut empty = state(Status::Draft, vec![]);
        assert!(matches!(empty.submit(), Err(ReviewError::NoReviewers)));

        let mut reviewer = user_reviewer(Uuid::new_v4());
        reviewer.decision = Decision::Rejected;
        let mut doc = state(Status::Draft, vec![reviewer]);
        doc.rejection_reason = Some("typo".into());
        let transition = doc.submit().unwrap();
        assert_eq!(transition.from, Status::Draft);
        assert_eq!(transition.to, Status::InReview);
        assert_eq!(doc.reviewers[0].decision, Decision::Pending);
        assert!(doc.rejection_reason.is_none());
    }

    #[test]
    fn last_approval_completes_review() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut approved = user_reviewer(a);
        approved.decision = Decision::Approved;
        let mut doc = state(Status::InReview, vec![approved, user_reviewer(b)]);

        let transitions = doc
            .decide(&actor(b), Verdict::Approve { comment: None }, Utc::now())
            .unwrap();
        assert_eq!(doc.status, Status::Reviewed);
        assert_eq!(
            transitions.iter().map(|t| t.action).collect::<Vec<_>>(),
            vec![Action::ReviewerApproved, Action::Reviewed]
        );
    }

    #[test]
    fn partial_approval_moves_pending_into_review() {
        let a = Uuid::new_v4();
        let mut doc = state(
            Status::Pending,
            vec![user_reviewer(a), user_reviewer(Uuid::new_v4())],
        );
        doc.decide(&actor(a), Verdict::Approve { comment: None }, Utc::now())
            .unwrap();
        assert_eq!(doc.status, Status::InReview);
        assert!(matches!(
            doc.decide(&actor(a), Verdict::Approve { comment: None }, Utc::now()),
            Err(ReviewError::AlreadyDecided)
        ));
    }

    #[test]
    fn position_reviewers_match_by_position() {
        let position = Uuid::new_v4();
        let mut doc = state(
            Status::InReview,
            vec![Reviewer::new(position, ReviewerKind::Position, "Head of HR")],
        );
        let outsider = actor(Uuid::new_v4());
        assert!(matches!(
            doc.decide(&outsider, Verdict::Approve { comment: None }, Utc::now()),
            Err(ReviewError::NotAReviewer)
        ));
        let holder = ReviewActor {
            user_id: Uuid::new_v4(),
            position_id: Some(position),
        };
        doc.decide(&holder, Verdict::Approve { comment: None }, Utc::now())
            .unwrap();
        assert_eq!(doc.status, Status::Reviewed);
    }

    #[test]
    fn rejection_needs_reason_and_returns_to_draft() {
        let a = Uuid::new_v4();
        let mut doc = state(Status::InReview, vec![user_reviewer(a)]);
        assert!(matches!(
            doc.decide(
                &actor(a),
                Verdict::Reject {
                    reason: "   ".into()
                },
                Utc::now()
            ),
            Err(ReviewError::ReasonRequired)
        ));
        doc.decide(
            &actor(a),
            Verdict::Reject {
                reason: "Wrong salary".into(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(doc.status, Status::Draft);
        assert_eq!(doc.rejection_reason.as_deref(), Some("Wrong salary"));
        assert_eq!(doc.reviewers[0].decision, Decision::Rejected);
    }

    #[test]
    fn sign_off_follows_the_sequence() {
        let mut doc = state(Status::InReview, vec![]);
        assert!(doc.approve().is_err());
        assert!(doc.sign().is_err());
        doc.status = Status::Reviewed;
        assert!(doc.sign().is_err());
        doc.approve().unwrap();
        assert_eq!(doc.status, Status::Approved);
        doc.sign().unwrap();
        assert_eq!(doc.status, Status::Signed);
        assert!(!can_edit(doc.status));
    }

    #[test]
    fn reviewer_json_uses_wire_names() {
        let reviewer = Reviewer::new(Uuid::nil(), ReviewerKind::Position, "CFO");
        let value = reviewers_json(&[reviewer.clone()]);
        assert_eq!(value[0]["kind"], "POSITION");
        assert_eq!(value[0]["decision"], "PENDING");
        assert_eq!(parse_reviewers(&value).unwrap(), vec![reviewer]);
    }
}
