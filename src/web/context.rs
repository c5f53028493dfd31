use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;

use crate::models::user::User;

/// Per-request values produced by the middlewares and read by handlers.
///
/// Each field is set at most once per request, by the middleware owning it,
/// and read downstream.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The authenticated principal, set by the session middleware.
    pub user: Option<User>,
    /// A fresh anti-forgery token, set by the CSRF middleware.
    pub csrf_token: Option<String>,
}

impl RequestContext {
    /// The context stored in `extensions`, inserted empty if missing.
    pub fn of_mut(extensions: &mut Extensions) -> &mut RequestContext {
        extensions.get_or_insert_default::<RequestContext>()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
