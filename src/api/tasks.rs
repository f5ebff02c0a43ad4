//! Task routes. All of them run behind `require_auth`; the ones addressed by
//! task id also check that the task belongs to the caller.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};

use super::auth::CurrentUser;
use super::error::AppError;
use super::forms::{FormErrors, TaskForm, DATE_FORMAT};
use super::routes::AppState;
use super::session::{FlashKind, Session};
use super::views;
use crate::todo::TaskUpdate;

const ADD_LEGEND: &str = "Add Task";
const EDIT_LEGEND: &str = "Edit Task";

/// The `:task_id` path segment. Anything that is not an integer cannot name a
/// task, so it is a 404 rather than a bad request.
pub struct TaskId(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TaskId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(task_id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound(parts.uri.path().to_string()))?;
        Ok(Self(task_id))
    }
}

/// GET /add_task
pub async fn add_task_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
) -> Response {
    let flashes = session.take_flashes().await;
    views::task_form(
        &user,
        &flashes,
        ADD_LEGEND,
        "/add_task",
        "",
        "",
        &FormErrors::default(),
    )
    .into_response()
}

/// POST /add_task
pub async fn add_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
    Form(form): Form<TaskForm>,
) -> Result<Response, AppError> {
    match form.validate() {
        Ok(valid) => {
            state.tasks.add(user.id, &valid.text, valid.due_date).await?;
            session.flash(FlashKind::Success, "Task Added!").await;
            Ok(Redirect::to("/home").into_response())
        }
        Err(errors) => {
            let flashes = session.take_flashes().await;
            Ok(views::task_form(
                &user,
                &flashes,
                ADD_LEGEND,
                "/add_task",
                &form.task,
                &form.due_date,
                &errors,
            )
            .into_response())
        }
    }
}

/// GET /edit_task/:task_id - form prefilled with the current values.
pub async fn edit_task_page(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
    TaskId(task_id): TaskId,
) -> Result<Response, AppError> {
    let task = state.tasks.get_owned(task_id, user.id).await?;
    let flashes = session.take_flashes().await;
    Ok(views::task_form(
        &user,
        &flashes,
        EDIT_LEGEND,
        &format!("/edit_task/{}", task.id),
        &task.text,
        &task.due_date.format(DATE_FORMAT).to_string(),
        &FormErrors::default(),
    )
    .into_response())
}

/// POST /edit_task/:task_id
pub async fn edit_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
    TaskId(task_id): TaskId,
    Form(form): Form<TaskForm>,
) -> Result<Response, AppError> {
    let task = state.tasks.get_owned(task_id, user.id).await?;
    match form.validate() {
        Ok(valid) => {
            state
                .tasks
                .update(
                    &task,
                    TaskUpdate {
                        text: Some(valid.text),
                        due_date: Some(valid.due_date),
                    },
                )
                .await?;
            session
                .flash(FlashKind::Success, "Your task has been updated!")
                .await;
            Ok(Redirect::to("/home").into_response())
        }
        Err(errors) => {
            let flashes = session.take_flashes().await;
            Ok(views::task_form(
                &user,
                &flashes,
                EDIT_LEGEND,
                &format!("/edit_task/{}", task.id),
                &form.task,
                &form.due_date,
                &errors,
            )
            .into_response())
        }
    }
}

/// GET or POST /delete_task/:task_id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
    TaskId(task_id): TaskId,
) -> Result<Response, AppError> {
    let task = state.tasks.get_owned(task_id, user.id).await?;
    state.tasks.delete(&task).await?;
    session
        .flash(FlashKind::Success, "Your task has been deleted!")
        .await;
    Ok(Redirect::to("/home").into_response())
}

/// GET /toggle_status/:task_id
pub async fn toggle_status(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    TaskId(task_id): TaskId,
) -> Result<Response, AppError> {
    let task = state.tasks.get_owned(task_id, user.id).await?;
    let task = state.tasks.toggle_complete(&task).await?;
    tracing::debug!("Task {} complete={}", task.id, task.complete);
    Ok(Redirect::to("/").into_response())
}
