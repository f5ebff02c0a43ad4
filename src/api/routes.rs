//! Router, shared state, and the home page.

use std::sync::Arc;

use anyhow::Context;
use axum::middleware;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::accounts::{ResetTokens, User, UserStore};
use crate::config::Config;
use crate::db::Database;
use crate::notify::{self, Mailer};
use crate::todo::{TaskOrder, TaskStore};

use super::auth;
use super::error::AppError;
use super::forms::HomeAction;
use super::session::{Session, SessionStore, SharedSessionStore};
use super::tasks;
use super::views;

/// Shared application state, built once at startup and handed to every handler.
pub struct AppState {
    pub config: Config,
    /// Credential store
    pub users: UserStore,
    /// Task store
    pub tasks: TaskStore,
    /// Server-side session records
    pub sessions: SharedSessionStore,
    /// Outgoing mail
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, db: Database, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = ResetTokens::new(config.secret_key.clone(), config.reset_token_ttl_secs);
        Self {
            users: UserStore::new(db.clone(), tokens, config.password_rounds),
            tasks: TaskStore::new(db),
            sessions: Arc::new(SessionStore::new(config.session.max_sessions)),
            mailer,
            config,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(home).post(home_action))
        .route("/home", get(home).post(home_action))
        .route("/health", get(health))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route(
            "/reset_password",
            get(auth::reset_request_page).post(auth::reset_request),
        )
        .route(
            "/reset_password/:token",
            get(auth::reset_token_page).post(auth::reset_token),
        );

    let protected_routes = Router::new()
        .route("/add_task", get(tasks::add_task_page).post(tasks::add_task))
        .route(
            "/edit_task/:task_id",
            get(tasks::edit_task_page).post(tasks::edit_task),
        )
        .route(
            "/delete_task/:task_id",
            get(tasks::delete_task).post(tasks::delete_task),
        )
        .route("/toggle_status/:task_id", get(tasks::toggle_status))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database_path.display()
        )
    })?;
    let mailer = notify::from_config(&config).context("Failed to set up outgoing mail")?;
    let state = Arc::new(AppState::new(config.clone(), db, mailer));

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    if config.dev_mode {
        tracing::warn!("DEV_MODE is enabled; do not use this configuration in production");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Default, Deserialize)]
struct HomeQuery {
    #[serde(default)]
    sort: Option<TaskOrder>,
}

/// GET / - the signed-in user's tasks.
async fn home(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Query(query): Query<HomeQuery>,
) -> Result<Response, AppError> {
    let Some(user) = session.current_user(&state.users).await? else {
        return Ok(Redirect::to("/login").into_response());
    };
    render_home(&state, &mut session, &user, query.sort.unwrap_or_default()).await
}

/// POST / - the "Add Task" and "Sort by date" buttons.
async fn home_action(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(action): Form<HomeAction>,
) -> Result<Response, AppError> {
    let Some(user) = session.current_user(&state.users).await? else {
        return Ok(Redirect::to("/login").into_response());
    };
    if action.add_task.is_some() {
        return Ok(Redirect::to("/add_task").into_response());
    }
    let order = if action.sort_task.is_some() {
        TaskOrder::DueDate
    } else {
        TaskOrder::Insertion
    };
    render_home(&state, &mut session, &user, order).await
}

async fn render_home(
    state: &AppState,
    session: &mut Session,
    user: &User,
    order: TaskOrder,
) -> Result<Response, AppError> {
    let tasks = state.tasks.list(user.id, order).await?;
    let flashes = session.take_flashes().await;
    Ok(views::home(user, &flashes, &tasks, order).into_response())
}
