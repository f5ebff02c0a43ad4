//! Task persistence backed by the `tasks` table.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde::Deserialize;
use thiserror::Error;

use crate::db::Database;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(i64),

    #[error("task {0} belongs to another user")]
    Forbidden(i64),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A dated to-do item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub text: String,
    pub due_date: NaiveDate,
    pub complete: bool,
    /// Owning user, fixed at creation
    pub user_id: i64,
}

impl Task {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            due_date: row.get(2)?,
            complete: row.get(3)?,
            user_id: row.get(4)?,
        })
    }

    pub fn ensure_owned_by(&self, user_id: i64) -> Result<(), TaskError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(TaskError::Forbidden(self.id))
        }
    }
}

/// Listing order for a user's tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrder {
    /// Order of creation
    #[default]
    Insertion,
    /// Earliest due date first, creation order among equal dates
    DueDate,
}

impl TaskOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::Insertion => "ORDER BY id ASC",
            Self::DueDate => "ORDER BY due_date ASC, id ASC",
        }
    }
}

/// Partial update of the editable fields.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub due_date: Option<NaiveDate>,
}

const SELECT_TASK: &str = "SELECT id, text, due_date, complete, user_id FROM tasks";

#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Tasks owned by `owner`, nobody else's.
    pub async fn list(&self, owner: i64, order: TaskOrder) -> Result<Vec<Task>, TaskError> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 {}",
            SELECT_TASK,
            order.sql()
        ))?;
        let tasks = stmt
            .query_map(params![owner], Task::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    pub async fn add(&self, owner: i64, text: &str, due_date: NaiveDate) -> Result<Task, TaskError> {
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO tasks (text, due_date, complete, user_id) VALUES (?1, ?2, 0, ?3)",
            params![text, due_date, owner],
        )?;
        let task = Task {
            id: conn.last_insert_rowid(),
            text: text.to_string(),
            due_date,
            complete: false,
            user_id: owner,
        };
        tracing::debug!("Added task {} for user {}", task.id, owner);
        Ok(task)
    }

    pub async fn get(&self, id: i64) -> Result<Task, TaskError> {
        let conn = self.db.lock().await;
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_TASK),
            params![id],
            Task::from_row,
        )
        .optional()?
        .ok_or(TaskError::NotFound(id))
    }

    /// Fetch a task on behalf of `requester`, failing with `Forbidden` when
    /// it belongs to someone else.
    pub async fn get_owned(&self, id: i64, requester: i64) -> Result<Task, TaskError> {
        let task = self.get(id).await?;
        task.ensure_owned_by(requester)?;
        Ok(task)
    }

    pub async fn update(&self, task: &Task, update: TaskUpdate) -> Result<Task, TaskError> {
        let updated = Task {
            text: update.text.unwrap_or_else(|| task.text.clone()),
            due_date: update.due_date.unwrap_or(task.due_date),
            ..task.clone()
        };
        let conn = self.db.lock().await;
        let changed = conn.execute(
            "UPDATE tasks SET text = ?1, due_date = ?2 WHERE id = ?3",
            params![updated.text, updated.due_date, task.id],
        )?;
        if changed == 0 {
            return Err(TaskError::NotFound(task.id));
        }
        Ok(updated)
    }

    pub async fn delete(&self, task: &Task) -> Result<(), TaskError> {
        let conn = self.db.lock().await;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task.id])?;
        if changed == 0 {
            return Err(TaskError::NotFound(task.id));
        }
        tracing::debug!("Deleted task {}", task.id);
        Ok(())
    }

    /// Flip the completion flag in place and return the stored state.
    pub async fn toggle_complete(&self, task: &Task) -> Result<Task, TaskError> {
        let conn = self.db.lock().await;
        let changed = conn.execute(
            "UPDATE tasks SET complete = NOT complete WHERE id = ?1",
            params![task.id],
        )?;
        if changed == 0 {
            return Err(TaskError::NotFound(task.id));
        }
        let complete: bool = conn.query_row(
            "SELECT complete FROM tasks WHERE id = ?1",
            params![task.id],
            |row| row.get(0),
        )?;
        Ok(Task {
            complete,
            ..task.clone()
        })
    }
}
