//! Onboarding/offboarding checklists: stages of tasks with derived progress.

use chrono::{DateTime, Utc};
use entity::{employee, hr_process};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("process not found")]
    ProcessNotFound,
    #[error("employee not found")]
    EmployeeNotFound,
    #[error("unknown stage {0}")]
    UnknownStage(String),
    #[error("unknown task {0}")]
    UnknownTask(String),
    #[error("stored checklist is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_by: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<ChecklistTask>,
    #[serde(default)]
    pub progress: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checklist {
    pub stages: Vec<Stage>,
    pub progress: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub stage_progress: i32,
    pub progress: i32,
    /// Set when this toggle moved the checklist from below 100 to 100.
    pub became_complete: bool,
}

/// round(100 · completed / total); a stage without tasks reports 0.
pub fn stage_progress(tasks: &[ChecklistTask]) -> i32 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks.iter().filter(|t| t.completed).count();
    (100.0 * done as f64 / tasks.len() as f64).round() as i32
}

/// round(mean of stage progress); no stages reports 0.
pub fn overall_progress(stages: &[Stage]) -> i32 {
    if stages.is_empty() {
        return 0;
    }
    let sum: i32 = stages.iter().map(|s| s.progress).sum();
    (sum as f64 / stages.len() as f64).round() as i32
}

impl Checklist {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut checklist = Self {
            stages,
            progress: 0,
        };
        checklist.recompute();
        checklist
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, ProgressError> {
        let stages: Vec<Stage> = serde_json::from_value(value.clone())?;
        Ok(Self::new(stages))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.stages).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
    }

    pub fn recompute(&mut self) {
        for stage in &mut self.stages {
            stage.progress = stage_progress(&stage.tasks);
        }
        self.progress = overall_progress(&self.stages);
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }

    pub fn toggle_task(
        &mut self,
        stage_id: &str,
        task_id: &str,
        completed: bool,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome, ProgressError> {
        let was_complete = self.is_complete();
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.id == stage_id)
            .ok_or_else(|| ProgressError::UnknownStage(stage_id.to_string()))?;
        let task = stage
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| ProgressError::UnknownTask(task_id.to_string()))?;

        task.completed = completed;
        if completed {
            task.completed_at = Some(now);
            task.completed_by = actor;
        } else {
            task.completed_at = None;
            task.completed_by = None;
        }

        self.recompute();
        let stage_progress = self
            .stages
            .iter()
            .find(|s| s.id == stage_id)
            .map(|s| s.progress)
            .unwrap_or_default();
        Ok(ToggleOutcome {
            stage_progress,
            progress: self.progress,
            became_complete: !was_complete && self.is_complete(),
        })
    }
}

fn task(id: &str, title: &str) -> ChecklistTask {
    ChecklistTask {
        id: id.to_string(),
        title: title.to_string(),
        completed: false,
        completed_at: None,
        completed_by: None,
    }
}

fn stage(id: &str, title: &str, tasks: Vec<ChecklistTask>) -> Stage {
    Stage {
        id: id.to_string(),
        title: title.to_string(),
        tasks,
        progress: 0,
    }
}

pub fn default_stages(kind: hr_process::Kind) -> Vec<Stage> {
    match kind {
        hr_process::Kind::Onboarding => vec![
            stage(
                "workplace",
                "Подготовка рабочего места",
                vec![
                    task("accounts", "Оформить доступы и учётные записи"),
                    task("equipment", "Подготовить оборудование"),
                ],
            ),
            stage(
                "first-day",
                "Первый день",
                vec![
                    task("briefing", "Провести вводный инструктаж"),
                    task("team", "Познакомить с командой"),
                    task("documents", "Подписать кадровые документы"),
                ],
            ),
            stage(
                "probation",
                "Испытательный срок",
                vec![
                    task("plan", "Согласовать план адаптации"),
                    task("midpoint", "Провести промежуточную встречу"),
                    task("result", "Подвести итоги испытательного срока"),
                ],
            ),
        ],
        hr_process::Kind::Offboarding => vec![
            stage(
                "handover",
                "Передача дел",
                vec![
                    task("plan", "Составить план передачи дел"),
                    task("tasks", "Передать текущие задачи"),
                ],
            ),
            stage(
                "assets",
                "Возврат имущества",
                vec![
                    task("equipment", "Вернуть оборудование"),
                    task("access", "Отозвать доступы"),
                ],
            ),
            stage(
                "settlement",
                "Окончательный расчёт",
                vec![
                    task("clearance", "Подписать обходной лист"),
                    task("interview", "Провести выходное интервью"),
                ],
            ),
        ],
    }
}

/// Lifecycle stage an employee moves to once the process is complete.
pub fn completion_stage(kind: hr_process::Kind) -> employee::LifecycleStage {
    match kind {
        hr_process::Kind::Onboarding => employee::LifecycleStage::Development,
        hr_process::Kind::Offboarding => employee::LifecycleStage::Alumni,
    }
}

/// Starts the checklist for `employee_id`, or returns the one already running.
pub async fn start_process(
    db: &DatabaseConnection,
    employee_id: Uuid,
    kind: hr_process::Kind,
) -> Result<hr_process::Model, ProgressError> {
    if let Some(existing) = find_process(db, employee_id, kind).await? {
        return Ok(existing);
    }
    employee::Entity::find_by_id(employee_id)
        .one(db)
        .await?
        .ok_or(ProgressError::EmployeeNotFound)?;

    let checklist = Checklist::new(default_stages(kind));
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = hr_process::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee_id),
        kind: Set(kind),
        stages: Set(checklist.to_json()),
        progress: Set(checklist.progress),
        status: Set(hr_process::Status::InProgress),
        started_at: Set(now),
        completed_at: Set(None),
        updated_at: Set(now),
    };
    let inserted = model.insert(db).await?;
    info!(%employee_id, kind = ?kind, process_id = %inserted.id, "hr process started");
    Ok(inserted)
}

pub async fn find_process(
    db: &DatabaseConnection,
    employee_id: Uuid,
    kind: hr_process::Kind,
) -> Result<Option<hr_process::Model>, DbErr> {
    hr_process::Entity::find()
        .filter(hr_process::Column::EmployeeId.eq(employee_id))
        .filter(hr_process::Column::Kind.eq(kind))
        .one(db)
        .await
}

/// Flips one task and writes the whole tree back. Completing the checklist
/// moves the employee's lifecycle stage in the same transaction.
pub async fn toggle_process_task(
    db: &DatabaseConnection,
    process_id: Uuid,
    stage_id: &str,
    task_id: &str,
    completed: bool,
    actor: Option<Uuid>,
) -> Result<(hr_process::Model, ToggleOutcome), ProgressError> {
    let txn = db.begin().await?;
    let process = hr_process::Entity::find_by_id(process_id)
        .one(&txn)
        .await?
        .ok_or(ProgressError::ProcessNotFound)?;

    let now = Utc::now();
    let mut checklist = Checklist::from_json(&process.stages)?;
    let outcome = checklist.toggle_task(stage_id, task_id, completed, actor, now)?;

    let kind = process.kind;
    let employee_id = process.employee_id;
    let previously_completed_at = process.completed_at;
    let stamp: DateTimeWithTimeZone = now.into();
    let mut active: hr_process::ActiveModel = process.into();
    active.stages = Set(checklist.to_json());
    active.progress = Set(checklist.progress);
    if checklist.is_complete() {
        active.status = Set(hr_process::Status::Completed);
        active.completed_at = Set(previously_completed_at.or(Some(stamp)));
    } else {
        active.status = Set(hr_process::Status::InProgress);
        active.completed_at = Set(None);
    }
    active.updated_at = Set(stamp);
    let updated = active.update(&txn).await?;

    if outcome.became_complete {
        let employee = employee::Entity::find_by_id(employee_id)
            .one(&txn)
            .await?
            .ok_or(ProgressError::EmployeeNotFound)?;
        let next_stage = completion_stage(kind);
        let mut emp: employee::ActiveModel = employee.into();
        emp.lifecycle_stage = Set(next_stage);
        emp.updated_at = Set(stamp);
        emp.update(&txn).await?;
        info!(%employee_id, stage = ?next_stage, "lifecycle stage advanced after checklist completion");
    }

    txn.commit().await?;
    Ok((updated, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(total: usize, done: usize) -> Vec<ChecklistTask> {
        (0..total)
            .map(|i| ChecklistTask {
                completed: i < done,
                ..task(&format!("t{i}"), "task")
            })
            .collect()
    }

    #[test]
    fn stage_progress_rounds_completed_share() {
        assert_eq!(stage_progress(&tasks(4, 2)), 50);
        assert_eq!(stage_progress(&tasks(3, 1)), 33);
        assert_eq!(stage_progress(&tasks(3, 2)), 67);
        assert_eq!(stage_progress(&tasks(0, 0)), 0);
    }

    #[test]
    fn overall_progress_is_mean_of_stages() {
        let checklist = Checklist::new(vec![
            stage("a", "A", tasks(4, 2)),
            stage("b", "B", tasks(3, 3)),
            stage("c", "C", tasks(3, 0)),
        ]);
        // (50 + 100 + 0) / 3 = 50
        assert_eq!(checklist.progress, 50);
        assert_eq!(overall_progress(&[]), 0);
    }

    #[test]
    fn toggling_recomputes_and_reports_completion() {
        let mut checklist = Checklist::new(vec![
            stage("a", "A", tasks(2, 2)),
            stage("b", "B", tasks(2, 1)),
        ]);
        assert_eq!(checklist.progress, 75);

        let actor = Uuid::new_v4();
        let outcome = checklist
            .toggle_task("b", "t1", true, Some(actor), Utc::now())
            .unwrap();
        assert_eq!(outcome.stage_progress, 100);
        assert_eq!(outcome.progress, 100);
        assert!(outcome.became_complete);
        let done = &checklist.stages[1].tasks[1];
        assert_eq!(done.completed_by, Some(actor));
        assert!(done.completed_at.is_some());

        let outcome = checklist
            .toggle_task("a", "t0", false, None, Utc::now())
            .unwrap();
        assert_eq!(outcome.stage_progress, 50);
        assert_eq!(outcome.progress, 75);
        assert!(!outcome.became_complete);
        assert!(checklist.stages[0].tasks[0].completed_at.is_none());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut checklist = Checklist::new(default_stages(hr_process::Kind::Onboarding));
        assert!(matches!(
            checklist.toggle_task("nope", "accounts", true, None, Utc::now()),
            Err(ProgressError::UnknownStage(_))
        ));
        assert!(matches!(
            checklist.toggle_task("workplace", "nope", true, None, Utc::now()),
            Err(ProgressError::UnknownTask(_))
        ));
    }

    #[test]
    fn stored_tree_survives_json() {
        let checklist = Checklist::new(default_stages(hr_process::Kind::Offboarding));
        let restored = Checklist::from_json(&checklist.to_json()).unwrap();
        assert_eq!(restored, checklist);
    }
}
