//! End-to-end request flows against an in-process Discord stand-in.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use htlab::{
    api::{SessionSettings, SiteConfig, router},
    discord::{DiscordClient, DiscordConfig, Token},
    session::{self, SESSION_COOKIE_NAME, SessionKey, SessionState},
};
use secrecy::SecretString;
use serde_json::json;
use std::{collections::HashMap, path::PathBuf};
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

const SESSION_SECRET: &str = "integration-secret";
const TTL: i64 = 3600;

async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").map(String::as_str);
    match grant {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("good-code") => {
            Json(json!({
                "access_token": "access-1",
                "token_type": "Bearer",
                "expires_in": 604_800,
                "refresh_token": "refresh-1",
                "scope": "identify",
            }))
            .into_response()
        }
        // exchanges fine, but the profile endpoint refuses the token
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("nouser-code") => {
            Json(json!({
                "access_token": "access-x",
                "token_type": "Bearer",
                "expires_in": 604_800,
                "refresh_token": "refresh-x",
            }))
            .into_response()
        }
        Some("refresh_token")
            if form.get("refresh_token").map(String::as_str) == Some("refresh-1") =>
        {
            Json(json!({
                "access_token": "access-2",
                "token_type": "Bearer",
                "expires_in": 604_800,
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn me_endpoint(headers: HeaderMap) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match auth {
        "Bearer access-1" | "Bearer access-2" => Json(json!({
            "id": "80351110224678912",
            "username": "tree",
            "discriminator": "0005",
            "avatar": null,
        }))
        .into_response(),
        "Bearer no-discriminator" => Json(json!({
            "id": "80351110224678912",
            "username": "tree",
            "avatar": null,
        }))
        .into_response(),
        "Bearer flaky" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "upstream unavailable" })),
        )
            .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "401: Unauthorized" })),
        )
            .into_response(),
    }
}

/// Start the fake provider and return its API base URL.
async fn spawn_provider() -> String {
    let app = Router::new()
        .route("/api/oauth2/token", post(token_endpoint))
        .route("/api/users/@me", get(me_endpoint));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn key() -> SessionKey {
    SessionKey::new(SecretString::from(SESSION_SECRET))
}

async fn site() -> Router {
    site_with(&spawn_provider().await)
}

fn site_with(api_url: &str) -> Router {
    let config = DiscordConfig::new(
        "1234",
        SecretString::from("client-secret"),
        Url::parse("http://localhost:5000/auth/callback").unwrap(),
        api_url,
    )
    .unwrap();

    router(SiteConfig {
        discord: DiscordClient::new(config).unwrap(),
        session: SessionSettings::new(key(), TTL, false),
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
    })
}

async fn get_page(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` pair from the response's Set-Cookie, ready to send back.
fn cookie_pair(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn cookie_state(pair: &str) -> SessionState {
    let value = pair
        .strip_prefix(&format!("{SESSION_COOKIE_NAME}="))
        .unwrap();
    session::decode(value, &key(), Utc::now().timestamp()).unwrap()
}

fn seal(state: &SessionState) -> String {
    let value = session::encode(state, &key(), Utc::now().timestamp(), TTL).unwrap();
    format!("{SESSION_COOKIE_NAME}={value}")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
}

fn token(access: &str, expires_at: i64) -> Token {
    Token {
        access_token: access.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(expires_at),
        scope: Some("identify".to_string()),
    }
}

#[tokio::test]
async fn anonymous_visitor_sees_login_link() {
    let app = site().await;

    let response = get_page(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = cookie_pair(&response).unwrap();
    let state = cookie_state(&cookie);
    assert_eq!(state.last_page.as_deref(), Some("/"));
    assert!(state.oauth_token.is_none());

    let body = body_text(response).await;
    assert!(body.contains("<title>메인 | HTLab</title>"));
    assert!(body.contains("href=\"/login\""));
}

#[tokio::test]
async fn login_returns_to_last_page() {
    let app = site().await;

    let response = get_page(&app, "/service/happytreebot", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response).unwrap();

    let response = get_page(&app, "/login", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response).unwrap();
    let pending = cookie_state(&cookie);
    assert_eq!(pending.last_page.as_deref(), Some("/service/happytreebot"));
    let nonce = pending.oauth_state.clone().unwrap();

    let body = body_text(response).await;
    assert!(body.contains(&format!("state={nonce}")));
    assert!(body.contains("client_id=1234"));

    let response = get_page(
        &app,
        &format!("/auth/callback?code=good-code&state={nonce}"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/service/happytreebot");

    let cookie = cookie_pair(&response).unwrap();
    let state = cookie_state(&cookie);
    assert!(state.oauth_state.is_none());
    let stored = state.oauth_token.unwrap();
    assert_eq!(stored.access_token, "access-1");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

    let body = body_text(get_page(&app, "/", Some(&cookie)).await).await;
    assert!(body.contains("tree#0005"));
    assert!(body.contains("href=\"/logout\""));
}

#[tokio::test]
async fn mismatched_state_is_rejected() {
    let app = site().await;

    let cookie = cookie_pair(&get_page(&app, "/login", None).await).unwrap();

    let response = get_page(
        &app,
        "/auth/callback?code=good-code&state=forged",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_pair(&response).is_none());
    assert_eq!(body_text(response).await, "Invalid state");
}

#[tokio::test]
async fn callback_without_login_is_rejected() {
    let app = site().await;

    let response = get_page(&app, "/auth/callback?code=good-code&state=abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_error_is_shown_verbatim() {
    let app = site().await;

    let cookie = cookie_pair(&get_page(&app, "/login", None).await).unwrap();
    let response = get_page(&app, "/auth/callback?error=access_denied", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(cookie_pair(&response).is_none());
    assert_eq!(body_text(response).await, "access_denied");
}

#[tokio::test]
async fn failed_exchange_sends_back_to_login() {
    let app = site().await;

    let response = get_page(&app, "/login", None).await;
    let cookie = cookie_pair(&response).unwrap();
    let nonce = cookie_state(&cookie).oauth_state.unwrap();

    let response = get_page(
        &app,
        &format!("/auth/callback?code=bad-code&state={nonce}"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(cookie_pair(&response).is_none());
}

#[tokio::test]
async fn profile_failure_after_exchange_sends_back_to_login() {
    let app = site().await;

    let response = get_page(&app, "/login", None).await;
    let cookie = cookie_pair(&response).unwrap();
    let nonce = cookie_state(&cookie).oauth_state.unwrap();

    let response = get_page(
        &app,
        &format!("/auth/callback?code=nouser-code&state={nonce}"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(cookie_pair(&response).is_none());
}

#[tokio::test]
async fn provider_outage_renders_anonymous_and_keeps_token() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: Some("/".to_string()),
        oauth_state: None,
        oauth_token: Some(token("flaky", Utc::now().timestamp() + 3600)),
    });

    let response = get_page(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    // nothing changed, so the cookie (and its token) is left alone
    assert!(cookie_pair(&response).is_none());
    assert!(body_text(response).await.contains("href=\"/login\""));

    let response = get_page(&app, "/discord", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert_eq!(state.last_page.as_deref(), Some("/discord"));
    assert_eq!(state.oauth_token.unwrap().access_token, "flaky");
}

#[tokio::test]
async fn unreachable_provider_still_renders_pages() {
    // nothing listens on port 9
    let app = site_with("http://127.0.0.1:9/api");
    let stale = token("stale", Utc::now().timestamp() - 100);
    let cookie = seal(&SessionState {
        last_page: Some("/".to_string()),
        oauth_state: None,
        oauth_token: Some(stale.clone()),
    });

    let response = get_page(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_pair(&response).is_none());
    assert!(body_text(response).await.contains("href=\"/login\""));

    let response = get_page(&app, "/service/happytreebot", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert_eq!(state.oauth_token, Some(stale));
}

#[tokio::test]
async fn profile_without_discriminator_renders_anonymous() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: Some("/discord".to_string()),
        oauth_state: None,
        oauth_token: Some(token("no-discriminator", Utc::now().timestamp() + 3600)),
    });

    let response = get_page(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert_eq!(
        state.oauth_token.map(|t| t.access_token).as_deref(),
        Some("no-discriminator")
    );

    let body = body_text(response).await;
    assert!(body.contains("href=\"/login\""));
    assert!(!body.contains("tree#"));
}

#[tokio::test]
async fn expired_token_is_refreshed_and_saved() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: Some("/".to_string()),
        oauth_state: None,
        oauth_token: Some(token("stale", Utc::now().timestamp() - 100)),
    });

    let response = get_page(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let state = cookie_state(&cookie_pair(&response).unwrap());
    let stored = state.oauth_token.unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

    assert!(body_text(response).await.contains("tree#0005"));
}

#[tokio::test]
async fn rejected_token_is_dropped() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: Some("/".to_string()),
        oauth_state: None,
        oauth_token: Some(token("revoked", Utc::now().timestamp() + 3600)),
    });

    let response = get_page(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert!(state.oauth_token.is_none());
    assert!(body_text(response).await.contains("href=\"/login\""));
}

#[tokio::test]
async fn logout_returns_to_last_page() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: Some("/discord".to_string()),
        oauth_state: None,
        oauth_token: Some(token("access-1", Utc::now().timestamp() + 3600)),
    });

    let response = get_page(&app, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/discord");

    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert!(state.oauth_token.is_none());
    assert_eq!(state.last_page.as_deref(), Some("/discord"));
}

#[tokio::test]
async fn tampered_cookie_is_a_fresh_session() {
    let app = site().await;
    let mut cookie = seal(&SessionState {
        last_page: Some("/discord".to_string()),
        oauth_state: None,
        oauth_token: Some(token("access-1", Utc::now().timestamp() + 3600)),
    });
    cookie.push('x');

    let response = get_page(&app, "/", Some(&cookie)).await;
    let state = cookie_state(&cookie_pair(&response).unwrap());
    assert!(state.oauth_token.is_none());
    assert_eq!(state.last_page.as_deref(), Some("/"));
}

#[tokio::test]
async fn service_pages() {
    let app = site().await;

    let body = body_text(get_page(&app, "/service/happytreebot", None).await).await;
    assert!(body.contains("url=https://htb.htlab.kr"));
    assert!(body.contains("서비스: 해피트리봇"));

    let response = get_page(&app, "/service/unknown123", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_page(&app, "/service/herbbot", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_page(&app, "/service/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/service");

    let response = get_page(&app, "/nowhere", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn discord_page_redirects_to_invite() {
    let app = site().await;

    let body = body_text(get_page(&app, "/discord", None).await).await;
    assert!(body.contains("url=https://discord.gg/TD9BvMxhP6"));
    assert!(body.contains("디스코드 이동하기"));
}

#[tokio::test]
async fn static_assets() {
    let app = site().await;

    let response = get_page(&app, "/favicon.ico", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/vnd.microsoft.icon")
    );
    assert!(cookie_pair(&response).is_none());

    let response = get_page(&app, "/static/css/site.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_pair(&response).is_none());
}

#[tokio::test]
async fn health_reports_build() {
    let app = site().await;

    let response = get_page(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-App").is_some());

    let body: serde_json::Value =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["name"], "htlab");
}

#[tokio::test]
async fn logout_without_history_clears_cookie() {
    let app = site().await;
    let cookie = seal(&SessionState {
        last_page: None,
        oauth_state: None,
        oauth_token: Some(token("access-1", Utc::now().timestamp() + 3600)),
    });

    let response = get_page(&app, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=;")));
    assert!(set_cookie.contains("Max-Age=0"));
}
