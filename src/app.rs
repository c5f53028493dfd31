use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, middleware::from_fn_with_state};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
    config::MAX_BODY_BYTES,
    crypto::csrf::Csrf,
    error::InjectorError,
    handlers,
    injector::Injector,
    middleware_layer::{
        auth::{AuthGuard, require_session},
        csrf::verify_csrf,
    },
    services::{session::SessionManager, users::UserDirectory},
    state::AppState,
    web::muxi::Muxi,
};

/// Registers the shared services of `state`.
pub fn injector(state: &AppState) -> Injector {
    let sessions = state.sessions.clone();
    let users = state.users.clone();
    let csrf = state.csrf.clone();

    let mut injector = Injector::new();
    injector
        .add(move || -> Arc<SessionManager> { sessions.clone() })
        .add(move || -> Arc<UserDirectory> { users.clone() })
        .add(move || -> Arc<Csrf> { csrf.clone() });
    injector
}

/// Builds the application router.
///
/// `/csrf`, `/login` and `/logout` are public, `/me` and `/password` need a
/// session, `/admin` needs the admin role. Every route is CSRF-protected.
pub fn router(state: &AppState) -> Result<Router, InjectorError> {
    let injector = injector(state);
    injector.verify()?;

    let root = Muxi::new(injector);
    let login_url = state.config.login_url.clone();

    let authenticated = root
        .sub_mux("/")
        .get("/me", handlers::auth::me)?
        .post("/password", handlers::auth::change_password)?
        .route_layer(from_fn_with_state(
            AuthGuard::authorize(state.sessions.clone(), login_url.clone()),
            require_session,
        ));

    let admin = root
        .sub_mux("/admin")
        .get("", handlers::auth::admin)?
        .route_layer(from_fn_with_state(
            AuthGuard::admin(state.sessions.clone(), login_url),
            require_session,
        ));

    let app = root
        .get("/csrf", handlers::auth::csrf_token)?
        .post("/login", handlers::auth::login)?
        .post("/logout", handlers::auth::logout)?
        .merge(authenticated)
        .merge(admin)
        .route_layer(from_fn_with_state(state.csrf.clone(), verify_csrf))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Ok(app.into_router())
}

/// Spawns a task collecting expired sessions every `every`.
pub fn spawn_session_collector(sessions: Arc<SessionManager>, every: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            tracing::debug!("🧹 Collecting expired sessions...");
            if let Err(e) = sessions.recollect_garbage().await {
                tracing::error!("❌ Session collection failed: {}", e);
            }
        }
    });
}
