use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use owl::{
    app,
    config::Config,
    crypto::{csrf::CSRF_HEADER, hash::Argon2Hasher},
    models::user::Role,
    services::session::SESSION_COOKIE_NAME,
    state::AppState,
};

const ADMIN_PASSWORD: &str = "admin-password";

async fn setup(configure: impl FnOnce(&mut Config)) -> (AppState, Router) {
    let mut config = Config {
        cookie_secure: false,
        admin_password: Some(ADMIN_PASSWORD.to_string().into()),
        ..Config::default()
    };
    configure(&mut config);

    let hasher = Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap());
    let state = AppState::with_hasher(&config, hasher).await.unwrap();
    let router = app::router(&state).unwrap();
    (state, router)
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{}=", SESSION_COOKIE_NAME)))
        .map(str::to_string)
}

fn cookie_value(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap().1.to_string()
}

async fn csrf_token(router: &Router) -> String {
    let response = send(router, Request::get("/csrf").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["csrf_token"].as_str().unwrap().to_string()
}

async fn login(router: &Router, username: &str, password: &str) -> Response<Body> {
    let token = csrf_token(router).await;
    let form = format!("username={}&password={}", username, password);
    send(
        router,
        Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CSRF_HEADER, token)
            .body(Body::from(form))
            .unwrap(),
    )
    .await
}

fn get_with_session(uri: &str, session: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE_NAME, session))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn login_me_logout_round_trip() {
    let (_, router) = setup(|_| {}).await;

    let response = login(&router, "admin", ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(&CSRF_HEADER));

    let cookie = set_cookie(&response).expect("session cookie not set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"));
    let session = cookie_value(&cookie);

    let body = json_body(response).await;
    assert_eq!(body["user"]["name"], "Administrator");

    let response = send(&router, get_with_session("/me", &session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = response.headers().get(&CSRF_HEADER).unwrap().to_str().unwrap().to_string();
    assert_eq!(json_body(response).await["name"], "Administrator");

    let response = send(&router, get_with_session("/admin", &session)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &router,
        Request::post("/logout")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE_NAME, session))
            .header(CSRF_HEADER, token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let removal = set_cookie(&response).unwrap();
    assert!(removal.contains("Max-Age=0"));

    let response = send(&router, get_with_session("/me", &session)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_without_a_session_are_unauthorized() {
    let (_, router) = setup(|_| {}).await;

    let response = send(&router, Request::get("/me").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Unauthorized");

    let response = send(&router, get_with_session("/me", "not-a-sealed-value")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unauthenticated_requests_are_redirected_when_a_login_url_is_set() {
    let (_, router) = setup(|config| config.login_url = Some("/login-page".to_string())).await;

    let response = send(&router, Request::get("/me").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/login-page");
}

#[tokio::test]
async fn login_requires_a_csrf_token() {
    let (_, router) = setup(|_| {}).await;

    let response = send(
        &router,
        Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username=admin&password={}", ADMIN_PASSWORD)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn csrf_token_is_accepted_as_a_form_field() {
    let (_, router) = setup(|_| {}).await;
    let token = csrf_token(&router).await;

    let form = format!("X-Csrf-Token={}&username=admin&password={}", token, ADMIN_PASSWORD);
    let response = send(
        &router,
        Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_some());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (_, router) = setup(|_| {}).await;

    let response = login(&router, "admin", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn admin_route_requires_the_admin_role() {
    let (state, router) = setup(|_| {}).await;
    state
        .users
        .create_user("Ana", "ana", "ana-password", vec![Role::User])
        .await
        .unwrap();

    let response = login(&router, "ana", "ana-password").await;
    let session = cookie_value(&set_cookie(&response).unwrap());

    let response = send(&router, get_with_session("/me", &session)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, get_with_session("/admin", &session)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn a_new_login_invalidates_previous_sessions() {
    let (_, router) = setup(|_| {}).await;

    let first = cookie_value(&set_cookie(&login(&router, "admin", ADMIN_PASSWORD).await).unwrap());
    let second = cookie_value(&set_cookie(&login(&router, "admin", ADMIN_PASSWORD).await).unwrap());

    let response = send(&router, get_with_session("/me", &first)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&router, get_with_session("/me", &second)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn previous_sessions_survive_when_renewal_is_disabled() {
    let (_, router) = setup(|config| config.session_renewal = false).await;

    let first = cookie_value(&set_cookie(&login(&router, "admin", ADMIN_PASSWORD).await).unwrap());
    let _second = login(&router, "admin", ADMIN_PASSWORD).await;

    let response = send(&router, get_with_session("/me", &first)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn password_change_needs_the_old_password() {
    let (_, router) = setup(|_| {}).await;
    let response = login(&router, "admin", ADMIN_PASSWORD).await;
    let token = response.headers().get(&CSRF_HEADER).unwrap().to_str().unwrap().to_string();
    let session = cookie_value(&set_cookie(&response).unwrap());

    let response = send(
        &router,
        Request::post("/password")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE_NAME, session))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CSRF_HEADER, token)
            .body(Body::from(format!(
                "old_password={}&new_password=brand-new-password",
                ADMIN_PASSWORD
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = login(&router, "admin", ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = login(&router, "admin", "brand-new-password").await;
    assert_eq!(response.status(), StatusCode::OK);
}
