use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form,
    body::{Body, Bytes, to_bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;

use crate::{
    config::MAX_BODY_BYTES,
    crypto::csrf::{CSRF_HEADER, CSRF_HEADER_NAME, Csrf},
    error::AppError,
    web::context::RequestContext,
};

/// A middleware that verifies the anti-forgery token of unsafe requests.
///
/// GET, HEAD and OPTIONS pass through. Other methods must carry a valid token
/// in the `X-Csrf-Token` header, or in a field of that name in an
/// `application/x-www-form-urlencoded` or `multipart/form-data` body, or are
/// refused with 403. Form bodies over [`MAX_BODY_BYTES`] are refused with 413.
/// Every request that gets through receives a fresh token, both in its
/// [`RequestContext`] and in the `x-csrf-token` response header.
pub async fn verify_csrf(State(csrf): State<Arc<Csrf>>, req: Request<Body>, next: Next) -> Response {
    let mut req = if Csrf::is_safe_method(req.method()) {
        tracing::debug!("✅ CSRF exemption: {} request", req.method());
        req
    } else {
        match check_unsafe_request(&csrf, req).await {
            Ok(req) => req,
            Err(e) => return e.into_response(),
        }
    };

    let token = match csrf.generate() {
        Ok(token) => token,
        Err(e) => return AppError::Cypher(e).into_response(),
    };
    RequestContext::of_mut(req.extensions_mut()).csrf_token = Some(token.clone());

    let mut response = next.run(req).await;
    match HeaderValue::from_str(&token) {
        Ok(value) => {
            response.headers_mut().insert(CSRF_HEADER, value);
        }
        Err(e) => tracing::error!("❌ CSRF token is not a valid header value: {}", e),
    }
    response
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FormKind {
    UrlEncoded,
    Multipart,
}

async fn check_unsafe_request(csrf: &Csrf, req: Request<Body>) -> Result<Request<Body>, AppError> {
    let (req, form_token) = match form_kind(req.headers()) {
        Some(kind) => {
            let (parts, body) = req.into_parts();
            let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(body_error)?;

            let form_token = form_field(kind, &parts.headers, &bytes, CSRF_HEADER_NAME).await;
            (Request::from_parts(parts, Body::from(bytes)), form_token)
        }
        None => (req, None),
    };

    if !csrf.check_request(req.method(), req.headers(), form_token.as_deref()) {
        tracing::warn!("❌ CSRF: invalid token for {} {}", req.method(), req.uri());
        return Err(AppError::Csrf);
    }

    tracing::debug!("✅ CSRF token valid");
    Ok(req)
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if content_type.starts_with("multipart/form-data") {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

fn body_error(err: axum::Error) -> AppError {
    if err.into_inner().downcast_ref::<LengthLimitError>().is_some() {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation("Cannot read form body".into())
    }
}

/// Reads the text field `name` out of a buffered form body.
async fn form_field(kind: FormKind, headers: &HeaderMap, bytes: &Bytes, name: &str) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.clone();
    let req = axum::http::Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes.clone()))
        .ok()?;

    match kind {
        FormKind::UrlEncoded => {
            let Form(mut fields) = Form::<HashMap<String, String>>::from_request(req, &())
                .await
                .ok()?;
            fields.remove(name)
        }
        FormKind::Multipart => {
            let mut multipart = Multipart::from_request(req, &()).await.ok()?;
            while let Ok(Some(field)) = multipart.next_field().await {
                if field.name() == Some(name) {
                    return field.text().await.ok();
                }
            }
            None
        }
    }
}
