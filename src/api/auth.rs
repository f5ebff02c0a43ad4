//! Account routes: registration, login/logout, and password reset by email.
//!
//! Pages that only make sense for anonymous visitors (register, login, reset)
//! send signed-in users back home. Protected routes sit behind
//! `require_auth`, which binds the user to the request as `CurrentUser`.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form,
};

use super::error::AppError;
use super::forms::{FormErrors, LoginForm, RegistrationForm, RequestResetForm, ResetPasswordForm};
use super::routes::AppState;
use super::session::{FlashKind, Session};
use super::views;
use crate::accounts::{AccountError, User};

/// The authenticated user, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Middleware for routes that need a signed-in user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    mut req: Request,
    next: Next,
) -> Response {
    match session.require_user(&state.users).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(AppError::Unauthenticated) => {
            session
                .flash(FlashKind::Info, "Please log in to access this page.")
                .await;
            AppError::Unauthenticated.into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn signed_in(state: &AppState, session: &Session) -> Result<bool, AppError> {
    Ok(session.current_user(&state.users).await?.is_some())
}

fn home() -> Response {
    Redirect::to("/home").into_response()
}

/// GET /register
pub async fn register_page(
    State(state): State<Arc<AppState>>,
    mut session: Session,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }
    let flashes = session.take_flashes().await;
    Ok(views::register(&flashes, "", "", &FormErrors::default()).into_response())
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }

    let mut errors = form.validate().err().unwrap_or_default();
    if errors.is_empty() {
        match state
            .users
            .register(&form.username, &form.email, &form.password)
            .await
        {
            Ok(_) => {
                session
                    .flash(
                        FlashKind::Success,
                        "Your account has been created! You are now able to log in!",
                    )
                    .await;
                return Ok(Redirect::to("/login").into_response());
            }
            Err(AccountError::DuplicateUsername) => errors.add(
                "username",
                "That username is taken. Please choose a different one.",
            ),
            Err(AccountError::DuplicateEmail) => errors.add(
                "email",
                "That email is taken. Please choose a different one.",
            ),
            Err(e) => return Err(e.into()),
        }
    }

    let flashes = session.take_flashes().await;
    Ok(views::register(&flashes, &form.username, &form.email, &errors).into_response())
}

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    mut session: Session,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }
    let flashes = session.take_flashes().await;
    Ok(views::login(&flashes, "", &FormErrors::default()).into_response())
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }

    let errors = form.validate().err().unwrap_or_default();
    if errors.is_empty() {
        match state.users.authenticate(&form.email, &form.password).await? {
            Some(user) => {
                session.login(&user, form.remember()).await;
                return Ok(home());
            }
            None => {
                tracing::info!("Failed login attempt");
                session
                    .flash(
                        FlashKind::Danger,
                        "Login Unsuccessful. Please check email and password",
                    )
                    .await;
            }
        }
    }

    let flashes = session.take_flashes().await;
    Ok(views::login(&flashes, &form.email, &errors).into_response())
}

/// GET /logout
pub async fn logout(mut session: Session) -> Response {
    session.logout().await;
    home()
}

/// Absolute link to the reset page for `token`.
fn reset_link(public_url: &str, token: &str) -> Result<String, url::ParseError> {
    let mut base = public_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(url::Url::parse(&base)?
        .join(&format!("reset_password/{}", token))?
        .to_string())
}

async fn send_reset_email(state: &AppState, user: &User) -> Result<(), AppError> {
    let token = state.users.issue_reset_token(user)?;
    let link = match reset_link(&state.config.public_url, &token) {
        Ok(link) => link,
        Err(e) => {
            tracing::error!("Cannot build reset link from PUBLIC_URL: {}", e);
            return Ok(());
        }
    };
    let body = format!(
        "To reset your password, visit the following link:\n{}\n\n\
         If you did not make this request then simply ignore this email and no changes will be made.\n",
        link
    );

    if let Err(e) = state
        .mailer
        .send(&user.email, "Password Reset Request", &body)
        .await
    {
        tracing::warn!("Failed to send reset email to user {}: {}", user.id, e);
    } else {
        tracing::info!("Sent password reset email to user {}", user.id);
    }
    Ok(())
}

/// GET /reset_password
pub async fn reset_request_page(
    State(state): State<Arc<AppState>>,
    mut session: Session,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }
    let flashes = session.take_flashes().await;
    Ok(views::reset_request(&flashes, "", &FormErrors::default()).into_response())
}

/// POST /reset_password
///
/// The confirmation message is the same whether or not the address belongs
/// to an account; mail is only attempted for a real one.
pub async fn reset_request(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Form(form): Form<RequestResetForm>,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }

    if let Err(errors) = form.validate() {
        let flashes = session.take_flashes().await;
        return Ok(views::reset_request(&flashes, &form.email, &errors).into_response());
    }

    match state.users.find_by_email(&form.email).await? {
        Some(user) => send_reset_email(&state, &user).await?,
        None => tracing::debug!("Password reset requested for unknown address"),
    }

    session
        .flash(
            FlashKind::Info,
            "An email has been sent with instructions to reset your password.",
        )
        .await;
    Ok(Redirect::to("/login").into_response())
}

async fn invalid_token(session: &mut Session) -> Response {
    session
        .flash(FlashKind::Warning, "That is an invalid or expired token")
        .await;
    Redirect::to("/reset_password").into_response()
}

/// GET /reset_password/:token
pub async fn reset_token_page(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }
    if state.users.verify_reset_token(&token).await?.is_none() {
        return Ok(invalid_token(&mut session).await);
    }
    let flashes = session.take_flashes().await;
    Ok(views::reset_token(&flashes, &token, &FormErrors::default()).into_response())
}

/// POST /reset_password/:token
pub async fn reset_token(
    State(state): State<Arc<AppState>>,
    mut session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    if signed_in(&state, &session).await? {
        return Ok(home());
    }
    let Some(user) = state.users.verify_reset_token(&token).await? else {
        return Ok(invalid_token(&mut session).await);
    };

    if let Err(errors) = form.validate() {
        let flashes = session.take_flashes().await;
        return Ok(views::reset_token(&flashes, &token, &errors).into_response());
    }

    state.users.set_password(&user, &form.password).await?;
    session
        .flash(
            FlashKind::Success,
            "Your password has been updated! You are now able to log in!",
        )
        .await;
    Ok(Redirect::to("/login").into_response())
}
