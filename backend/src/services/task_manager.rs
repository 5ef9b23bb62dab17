//! Background task bookkeeping.
//!
//! A task row is created before the work starts so clients can poll it
//! immediately. The work runs on the tokio runtime; its outcome and
//! per-item progress are written back to the row.

use crate::database::models::{Task, TaskProgress, TaskStatus, TaskType};
use crate::database::queries;
use crate::database::Database;
use crate::errors::AppResult;
use crate::utils::{new_id, now};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct TaskManager {
    db: Database,
}

impl TaskManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a `PENDING` task covering `total` items.
    pub async fn create(&self, project_id: &str, task_type: TaskType, total: u32) -> AppResult<Task> {
        let task = Task {
            id: new_id(),
            project_id: project_id.to_string(),
            task_type,
            status: TaskStatus::Pending,
            progress: TaskProgress::new(total),
            error_message: None,
            created_at: now(),
            completed_at: None,
        };
        let row = task.clone();
        self.db.call(move |conn| queries::insert_task(conn, &row)).await?;
        Ok(task)
    }

    pub fn tracker(&self, task: &Task) -> ProgressTracker {
        ProgressTracker {
            db: self.db.clone(),
            task_id: Arc::from(task.id.as_str()),
            progress: Arc::new(Mutex::new(task.progress)),
        }
    }

    /// Runs `work` in the background. The task is `PROCESSING` while it
    /// runs, then `COMPLETED`, or `FAILED` when the work errors or every
    /// item failed.
    pub fn spawn<Fut>(&self, task_id: String, work: Fut)
    where
        Fut: Future<Output = AppResult<TaskProgress>> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::spawn(async move {
            let id = task_id.clone();
            if let Err(err) = db
                .call(move |conn| queries::set_task_status(conn, &id, TaskStatus::Processing, None))
                .await
            {
                error!(task_id = %task_id, "Failed to mark task as processing: {err}");
            }

            let (status, message) = match work.await {
                Ok(progress) if progress.total > 0 && progress.failed == progress.total => {
                    warn!(task_id = %task_id, "Every item of the task failed");
                    (TaskStatus::Failed, Some("All items failed".to_string()))
                }
                Ok(progress) => {
                    info!(
                        task_id = %task_id,
                        completed = progress.completed,
                        failed = progress.failed,
                        "Task finished"
                    );
                    (TaskStatus::Completed, None)
                }
                Err(err) => {
                    error!(task_id = %task_id, "Task failed: {err}");
                    (TaskStatus::Failed, Some(err.to_string()))
                }
            };

            let id = task_id.clone();
            if let Err(err) = db
                .call(move |conn| queries::set_task_status(conn, &id, status, message.as_deref()))
                .await
            {
                error!(task_id = %task_id, "Failed to record task outcome: {err}");
            }
        });
    }
}

/// Shared progress counter for the workers of one task.
#[derive(Clone)]
pub struct ProgressTracker {
    db: Database,
    task_id: Arc<str>,
    progress: Arc<Mutex<TaskProgress>>,
}

impl ProgressTracker {
    /// Counts one finished item and persists the new progress.
    pub async fn record(&self, success: bool) -> TaskProgress {
        let snapshot = {
            let mut progress = self.progress.lock().await;
            if success {
                progress.completed += 1;
            } else {
                progress.failed += 1;
            }
            *progress
        };

        let task_id = Arc::clone(&self.task_id);
        if let Err(err) = self
            .db
            .call(move |conn| queries::update_task_progress(conn, &task_id, &snapshot))
            .await
        {
            warn!(task_id = %self.task_id, "Failed to persist task progress: {err}");
        }
        snapshot
    }

    pub async fn snapshot(&self) -> TaskProgress {
        *self.progress.lock().await
    }
}
