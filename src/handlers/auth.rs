//! Handler builders for the demo application.
//!
//! Each function takes the services it needs and returns the request handler,
//! so that [`Muxi`](crate::web::muxi::Muxi) can build it from the injector.

use std::sync::Arc;

use axum::{
    Form, Json,
    http::StatusCode,
    response::IntoResponse,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    models::user::User,
    services::{
        session::{SESSION_COOKIE_NAME, SessionManager},
        users::UserDirectory,
    },
    web::{context::RequestContext, muxi::HandlerFuture},
};

const MAX_USERNAME_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// The form payload for user login.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.username.len() > MAX_USERNAME_LEN {
            return Err(AppError::Validation("Invalid username".to_string()));
        }
        if self.password.is_empty() || self.password.len() > MAX_PASSWORD_LEN {
            return Err(AppError::Validation("Invalid password".to_string()));
        }
        Ok(())
    }
}

/// The form payload for changing the current user's password.
#[derive(Deserialize)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Serialize)]
struct CsrfResponse {
    csrf_token: Option<String>,
}

fn current_user(ctx: RequestContext) -> Result<User> {
    ctx.user
        .ok_or_else(|| AppError::Authentication("Not logged in".to_string()))
}

/// Hands out the anti-forgery token issued for this request.
pub fn csrf_token() -> impl FnOnce(RequestContext) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |ctx: RequestContext| {
        async move {
            let response = CsrfResponse {
                csrf_token: ctx.csrf_token,
            };
            Ok(Json(response).into_response())
        }
        .boxed()
    }
}

/// Checks the credentials and opens a session.
pub fn login(
    sessions: Arc<SessionManager>,
    users: Arc<UserDirectory>,
) -> impl FnOnce(Cookies, Form<LoginForm>) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |cookies: Cookies, Form(form): Form<LoginForm>| {
        async move {
            form.validate()?;
            tracing::info!("🔐 Login attempt: {}", form.username);

            let user = users.authenticate_user(&form.username, &form.password).await?;
            let cookie = sessions.create_session(user.clone()).await?;
            cookies.add(cookie);
            tracing::info!("✅ Session created for user: {}", user.id);

            let response = AuthResponse {
                success: true,
                message: "Login successful".to_string(),
                user: Some(user),
            };
            Ok(Json(response).into_response())
        }
        .boxed()
    }
}

/// Closes the current session. Succeeds even when it was already gone.
pub fn logout(
    sessions: Arc<SessionManager>,
) -> impl FnOnce(Cookies) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |cookies: Cookies| {
        async move {
            let value = cookies
                .get(SESSION_COOKIE_NAME)
                .map(|cookie| cookie.value().to_string());

            let removal = match sessions.destroy_session(value.as_deref()).await {
                Ok(removal) => removal,
                Err(e) if e.is_unauthenticated() => {
                    tracing::debug!("Logout without a live session: {}", e);
                    sessions.removal_cookie()
                }
                Err(e) => return Err(e.into()),
            };
            cookies.add(removal);
            tracing::info!("✅ Logout successful");

            let response = AuthResponse {
                success: true,
                message: "Logout successful".to_string(),
                user: None,
            };
            Ok(Json(response).into_response())
        }
        .boxed()
    }
}

/// Returns the authenticated principal.
pub fn me() -> impl FnOnce(RequestContext) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |ctx: RequestContext| async move { Ok(Json(current_user(ctx)?).into_response()) }.boxed()
}

pub fn admin() -> impl FnOnce(RequestContext) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |ctx: RequestContext| {
        async move {
            let user = current_user(ctx)?;
            let response = AuthResponse {
                success: true,
                message: format!("Welcome, administrator {}", user.name),
                user: Some(user),
            };
            Ok(Json(response).into_response())
        }
        .boxed()
    }
}

/// Changes the password of the authenticated principal.
pub fn change_password(
    users: Arc<UserDirectory>,
) -> impl FnOnce(RequestContext, Form<ChangePasswordForm>) -> HandlerFuture + Clone + Send + Sync + 'static {
    move |ctx: RequestContext, Form(form): Form<ChangePasswordForm>| {
        async move {
            let user = current_user(ctx)?;
            if form.new_password.len() < MIN_PASSWORD_LEN || form.new_password.len() > MAX_PASSWORD_LEN {
                return Err(AppError::Validation(format!(
                    "Password must be between {} and {} characters long",
                    MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
                )));
            }

            users
                .change_password(user.id, &form.old_password, &form.new_password)
                .await?;
            tracing::info!("✅ Password changed for user: {}", user.id);

            let response = AuthResponse {
                success: true,
                message: "Password changed".to_string(),
                user: None,
            };
            Ok((StatusCode::OK, Json(response)).into_response())
        }
        .boxed()
    }
}
