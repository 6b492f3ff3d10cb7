//! Sequential, human-readable document numbers.
//!
//! Each document type carries its own counter and the period the counter was
//! last reset in. Allocation is a single read-modify-write on that row, guarded
//! by the values that were read so two concurrent callers can never hand out
//! the same number.

use chrono::{Datelike, NaiveDate, Utc};
use entity::document_type::{self, ResetPeriod};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("document type not found")]
    UnknownType,
    #[error("document type {0} has no numbering prefix")]
    MissingPrefix(String),
    #[error("numbering period {requested} is closed; the counter is already in {current}")]
    PeriodClosed { requested: String, current: String },
    #[error("document number allocation kept colliding with concurrent writers")]
    Contention,
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentNumber {
    pub code: String,
    pub sequence: i64,
    pub period: Option<String>,
}

/// Key of the numbering period `today` falls into.
pub fn period_key(reset: ResetPeriod, today: NaiveDate) -> Option<String> {
    match reset {
        ResetPeriod::Yearly => Some(format!("{:04}", today.year())),
        ResetPeriod::Monthly => Some(format!("{:04}-{:02}", today.year(), today.month())),
        ResetPeriod::Never => None,
    }
}

/// The sequence to hand out next. Restarts at 1 when a later period begins;
/// a period earlier than the one the counter is in can no longer be numbered.
pub fn next_sequence(
    counter: i64,
    last_period: Option<&str>,
    current_period: Option<&str>,
) -> Result<i64, NumberingError> {
    match (last_period, current_period) {
        (Some(last), Some(current)) if last == current => Ok(counter.max(0) + 1),
        (Some(last), Some(current)) if current < last && !last.starts_with(current) => {
            Err(NumberingError::PeriodClosed {
                requested: current.to_string(),
                current: last.to_string(),
            })
        }
        (None, None) => Ok(counter.max(0) + 1),
        _ => Ok(1),
    }
}

pub fn format_number(
    prefix: &str,
    separator: &str,
    padding: i32,
    period: Option<&str>,
    sequence: i64,
) -> String {
    let width = padding.clamp(1, 12) as usize;
    match period {
        Some(period) => format!("{prefix}{separator}{period}{separator}{sequence:0width$}"),
        None => format!("{prefix}{separator}{sequence:0width$}"),
    }
}

fn configured_prefix(model: &document_type::Model) -> Result<String, NumberingError> {
    model
        .prefix
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NumberingError::MissingPrefix(model.code.clone()))
}

/// Allocates the next number for `document_type_id`, as of `today`.
pub async fn allocate_number(
    db: &DatabaseConnection,
    document_type_id: Uuid,
    today: NaiveDate,
) -> Result<DocumentNumber, NumberingError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let txn = db.begin().await?;
        let current = document_type::Entity::find_by_id(document_type_id)
            .one(&txn)
            .await?
            .ok_or(NumberingError::UnknownType)?;
        let prefix = configured_prefix(&current)?;
        let period = period_key(current.reset_period, today);
        let sequence = match next_sequence(
            current.counter,
            current.last_reset_period.as_deref(),
            period.as_deref(),
        ) {
            Ok(sequence) => sequence,
            Err(err) => {
                txn.rollback().await?;
                return Err(err);
            }
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut update = document_type::Entity::update_many()
            .col_expr(document_type::Column::Counter, Expr::value(sequence))
            .col_expr(
                document_type::Column::LastResetPeriod,
                Expr::value(period.clone()),
            )
            .col_expr(document_type::Column::UpdatedAt, Expr::value(now))
            .filter(document_type::Column::Id.eq(document_type_id))
            .filter(document_type::Column::Counter.eq(current.counter));
        update = match current.last_reset_period.as_deref() {
            Some(last) => update.filter(document_type::Column::LastResetPeriod.eq(last)),
            None => update.filter(document_type::Column::LastResetPeriod.is_null()),
        };
        let result = update.exec(&txn).await?;

        if result.rows_affected == 1 {
            txn.commit().await?;
            let code = format_number(
                &prefix,
                &current.separator,
                current.padding,
                period.as_deref(),
                sequence,
            );
            debug!(%document_type_id, code = %code, "document number allocated");
            return Ok(DocumentNumber {
                code,
                sequence,
                period,
            });
        }

        txn.rollback().await?;
        debug!(%document_type_id, attempt, "document counter changed during allocation; retrying");
    }
    Err(NumberingError::Contention)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_keys_follow_reset_policy() {
        let today = date(2026, 3, 14);
        assert_eq!(period_key(ResetPeriod::Yearly, today).as_deref(), Some("2026"));
        assert_eq!(period_key(ResetPeriod::Monthly, today).as_deref(), Some("2026-03"));
        assert_eq!(period_key(ResetPeriod::Never, today), None);
    }

    #[test]
    fn sequence_increments_within_period() {
        assert_eq!(next_sequence(0, Some("2026"), Some("2026")).unwrap(), 1);
        assert_eq!(next_sequence(41, Some("2026"), Some("2026")).unwrap(), 42);
        assert_eq!(next_sequence(7, None, None).unwrap(), 8);
    }

    #[test]
    fn sequence_resets_when_period_rolls_over() {
        assert_eq!(next_sequence(118, Some("2026"), Some("2027")).unwrap(), 1);
        assert_eq!(next_sequence(3, None, Some("2026")).unwrap(), 1);
        assert_eq!(next_sequence(9, Some("2026-12"), Some("2027-01")).unwrap(), 1);
    }

    #[test]
    fn earlier_period_is_closed() {
        assert!(matches!(
            next_sequence(1, Some("2027"), Some("2026")),
            Err(NumberingError::PeriodClosed { requested, current })
                if requested == "2026" && current == "2027"
        ));
        assert!(matches!(
            next_sequence(4, Some("2026-03"), Some("2026-02")),
            Err(NumberingError::PeriodClosed { .. })
        ));
        // Switching a monthly type to yearly within the same year starts afresh.
        assert_eq!(next_sequence(4, Some("2026-03"), Some("2026")).unwrap(), 1);
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(
            format_number("ГЭР", "-", 4, Some("2026"), 1),
            "ГЭР-2026-0001"
        );
        assert_eq!(format_number("ORD", "/", 3, None, 12), "ORD/012");
        assert_eq!(format_number("X", "-", 2, Some("2026"), 1234), "X-2026-1234");
    }

    #[test]
    fn blank_prefix_is_treated_as_missing() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = document_type::Model {
            id: Uuid::new_v4(),
            code: "contract".into(),
            name: "Contract".into(),
            prefix: Some("  ".into()),
            separator: "-".into(),
            padding: 4,
            reset_period: ResetPeriod::Yearly,
            counter: 0,
            last_reset_period: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            configured_prefix(&model),
            Err(NumberingError::MissingPrefix(code)) if code == "contract"
        ));
    }
}
