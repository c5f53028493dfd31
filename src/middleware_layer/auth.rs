use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::user::{Role, User},
    services::session::{SESSION_COOKIE_NAME, SessionManager},
    web::context::RequestContext,
};

/// Access rule enforced by [`require_session`].
#[derive(Clone)]
pub struct AuthGuard {
    sessions: Arc<SessionManager>,
    redirect_to: Option<String>,
    roles: Vec<Role>,
}

impl AuthGuard {
    /// Any authenticated principal passes.
    pub fn authorize(sessions: Arc<SessionManager>, redirect_to: Option<String>) -> Self {
        Self {
            sessions,
            redirect_to,
            roles: Vec::new(),
        }
    }

    /// The principal must hold at least one of `roles`.
    pub fn roles(sessions: Arc<SessionManager>, redirect_to: Option<String>, roles: Vec<Role>) -> Self {
        Self {
            sessions,
            redirect_to,
            roles,
        }
    }

    pub fn admin(sessions: Arc<SessionManager>, redirect_to: Option<String>) -> Self {
        Self::roles(sessions, redirect_to, vec![Role::Admin])
    }

    fn admits(&self, user: &User) -> bool {
        self.roles.is_empty() || user.has_any_role(&self.roles)
    }

    fn reject(&self, error: AppError) -> Response {
        match &self.redirect_to {
            Some(url) => Redirect::temporary(url).into_response(),
            None => error.into_response(),
        }
    }
}

/// A middleware that requires a valid session, and optionally a role.
///
/// On success the principal is stored in the [`RequestContext`] and as a
/// `User` extension. On failure the client is redirected to the login URL
/// when one is configured, or gets 401 (403 for a missing role).
pub async fn require_session(
    State(guard): State<AuthGuard>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let cookie_value = cookies
        .get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string());

    let user = match guard.sessions.read_session(cookie_value.as_deref()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("❌ Cannot read session: {}", e);
            if e.is_unauthenticated() {
                return guard.reject(AppError::Session(e));
            }
            return AppError::Session(e).into_response();
        }
    };

    if !guard.admits(&user) {
        tracing::warn!("❌ User {} lacks roles {:?}", user.id, guard.roles);
        return guard.reject(AppError::Unauthorized);
    }

    tracing::debug!("✅ User authenticated: {}", user.id);

    RequestContext::of_mut(request.extensions_mut()).user = Some(user.clone());
    request.extensions_mut().insert(user);

    next.run(request).await
}
