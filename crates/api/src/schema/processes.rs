use async_graphql::{Context, Error, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use entity::hr_process;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{info_span, Instrument};

use super::{
    database, db_error, error_with_code, id_of, not_found, parse_uuid, require_role,
    require_viewer, validation_error, ProcessKind, ProcessStatus,
};
use crate::auth::UserRole;
use crate::progress::{self, Checklist, ChecklistTask, ProgressError, Stage};

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "ChecklistTask")]
pub struct ChecklistTaskNode {
    pub id: String,
    pub title: String,
    pub completed: bool,
    #[graphql(name = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[graphql(name = "completedBy")]
    pub completed_by: Option<ID>,
}

impl From<ChecklistTask> for ChecklistTaskNode {
    fn from(task: ChecklistTask) -> Self {
        Self {
            id: task.id,
            title: task.title,
            completed: task.completed,
            completed_at: task.completed_at,
            completed_by: task.completed_by.map(id_of),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "ProcessStage")]
pub struct StageNode {
    pub id: String,
    pub title: String,
    pub progress: i32,
    pub tasks: Vec<ChecklistTaskNode>,
}

impl From<Stage> for StageNode {
    fn from(stage: Stage) -> Self {
        Self {
            id: stage.id,
            title: stage.title,
            progress: stage.progress,
            tasks: stage.tasks.into_iter().map(ChecklistTaskNode::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "HrProcess")]
pub struct ProcessNode {
    pub id: ID,
    #[graphql(name = "employeeId")]
    pub employee_id: ID,
    pub kind: ProcessKind,
    pub status: ProcessStatus,
    pub progress: i32,
    pub stages: Vec<StageNode>,
    #[graphql(name = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[graphql(name = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<hr_process::Model> for ProcessNode {
    type Error = Error;

    fn try_from(model: hr_process::Model) -> Result<Self, Self::Error> {
        let checklist = Checklist::from_json(&model.stages).map_err(progress_error)?;
        Ok(Self {
            id: id_of(model.id),
            employee_id: id_of(model.employee_id),
            kind: model.kind.into(),
            status: model.status.into(),
            progress: model.progress,
            stages: checklist.stages.into_iter().map(StageNode::from).collect(),
            started_at: model.started_at.into(),
            completed_at: model.completed_at.map(|d| d.into()),
        })
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct TogglePayload {
    pub process: ProcessNode,
    #[graphql(name = "stageProgress")]
    pub stage_progress: i32,
    /// True when this toggle completed the whole checklist.
    #[graphql(name = "becameComplete")]
    pub became_complete: bool,
}

pub(super) fn progress_error(err: ProgressError) -> Error {
    match err {
        ProgressError::ProcessNotFound => not_found("Process not found"),
        ProgressError::EmployeeNotFound => not_found("Employee not found"),
        ProgressError::UnknownStage(id) => not_found(format!("Unknown stage {id}")),
        ProgressError::UnknownTask(id) => not_found(format!("Unknown task {id}")),
        ProgressError::Malformed(e) => {
            error_with_code("INTERNAL", format!("Stored checklist is malformed: {e}"))
        }
        ProgressError::Db(e) => db_error(e),
    }
}

#[derive(Default)]
pub struct ProcessQuery;

#[Object]
impl ProcessQuery {
    async fn process(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: ID,
        kind: ProcessKind,
    ) -> async_graphql::Result<Option<ProcessNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        let found = progress::find_process(db.as_ref(), employee_id, kind.into())
            .await
            .map_err(db_error)?;
        found.map(ProcessNode::try_from).transpose()
    }

    async fn processes(
        &self,
        ctx: &Context<'_>,
        status: Option<ProcessStatus>,
    ) -> async_graphql::Result<Vec<ProcessNode>> {
        require_role(ctx, UserRole::Manager)?;
        let db = database(ctx)?;
        let mut query = hr_process::Entity::find();
        if let Some(status) = status {
            query = query.filter(hr_process::Column::Status.eq(hr_process::Status::from(status)));
        }
        let rows = query.all(db.as_ref()).await.map_err(db_error)?;
        rows.into_iter().map(ProcessNode::try_from).collect()
    }
}

#[derive(Default)]
pub struct ProcessMutation;

#[Object]
impl ProcessMutation {
    async fn start_process(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "employeeId")] employee_id: ID,
        kind: ProcessKind,
    ) -> async_graphql::Result<ProcessNode> {
        require_role(ctx, UserRole::Hr)?;
        let db = database(ctx)?;
        let employee_id = parse_uuid(&employee_id)?;
        let process = progress::start_process(db.as_ref(), employee_id, kind.into())
            .instrument(info_span!("hr.processes.start", %employee_id, kind = ?kind))
            .await
            .map_err(progress_error)?;
        ProcessNode::try_from(process)
    }

    async fn toggle_process_task(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "processId")] process_id: ID,
        #[graphql(name = "stageId")] stage_id: String,
        #[graphql(name = "taskId")] task_id: String,
        completed: bool,
    ) -> async_graphql::Result<TogglePayload> {
        let current = require_role(ctx, UserRole::Manager)?;
        let db = database(ctx)?;
        let process_id = parse_uuid(&process_id)?;
        if stage_id.trim().is_empty() || task_id.trim().is_empty() {
            return Err(validation_error("stageId and taskId are required"));
        }
        let (process, outcome) = progress::toggle_process_task(
            db.as_ref(),
            process_id,
            &stage_id,
            &task_id,
            completed,
            Some(current.user_id),
        )
        .instrument(info_span!("hr.processes.toggle_task", %process_id, completed))
        .await
        .map_err(progress_error)?;
        Ok(TogglePayload {
            process: ProcessNode::try_from(process)?,
            stage_progress: outcome.stage_progress,
            became_complete: outcome.became_complete,
        })
    }
}
