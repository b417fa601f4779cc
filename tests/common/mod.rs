//! In-process stand-ins for every upstream the pipeline talks to.
//!
//! One axum router imitates the World Bank, ReliefWeb, GNews, ACLED and
//! Ollama endpoints, so tests exercise the real HTTP and parsing code
//! without network access.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Token the mock GNews endpoint accepts.
pub const GNEWS_TOKEN: &str = "test-token";

pub const CANNED_REPORT: &str = "\
**Executive Summary**
Kenya faced severe flooding in April and May 2024 (ReliefWeb) while GDP growth held at 5.6% (World Bank).

**Key Events**
- Floods displaced more than 200,000 people (ReliefWeb).
- Protests over the finance bill spread to several cities (Google News).

**Trends**
- GDP growth of 5.6% in 2024 (World Bank).

**Risks**
- Renewed flooding during the short rains (ReliefWeb).
";

/// How the mock ACLED OAuth endpoint answers.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenReply {
    #[default]
    Granted,
    Unauthorized,
    MissingToken,
}

#[derive(Clone, Default)]
pub struct Mock {
    pub fail_chat: bool,
    /// Delay before every World Bank response.
    pub worldbank_delay_ms: u64,
    /// When set, GNews serves this many generated articles, paged by `max`.
    pub news_total: Option<usize>,
    pub acled_token: TokenReply,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub worldbank_countries: Arc<Mutex<Vec<String>>>,
    pub news_pages: Arc<Mutex<Vec<usize>>>,
    pub acled_reads: Arc<Mutex<usize>>,
}

// ============ Mock upstreams ============

async fn worldbank(
    State(mock): State<Mock>,
    Path((alpha3, code)): Path<(String, String)>,
) -> Json<Value> {
    mock.worldbank_countries.lock().unwrap().push(alpha3);
    if mock.worldbank_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(mock.worldbank_delay_ms)).await;
    }
    let value = if code == "NY.GDP.MKTP.KD.ZG" { 5.6 } else { 1000.0 };
    Json(json!([
        {"page": 1, "pages": 1, "per_page": 1000, "total": 2},
        [
            {"indicator": {"id": code}, "date": "2024", "value": value},
            {"indicator": {"id": code}, "date": "2023", "value": null}
        ]
    ]))
}

async fn reliefweb() -> Json<Value> {
    Json(json!({
        "totalCount": 2,
        "data": [
            {
                "id": 1,
                "fields": {
                    "title": "Kenya: Floods - Flash Update No. 3",
                    "date": {"original": "2024-05-10T00:00:00+00:00"},
                    "source": [{"name": "OCHA"}],
                    "body-html": "<p>Floods displaced more than 200,000 people across 40 counties.</p>"
                }
            },
            {
                "id": 2,
                "fields": {
                    "title": "Kenya: Cholera Outbreak",
                    "date": {"created": "2024-03-02T08:00:00+00:00"},
                    "source": [{"name": "WHO"}, {"name": "UNICEF"}],
                    "body": "A cholera outbreak was declared in Garissa."
                }
            }
        ]
    }))
}

async fn gnews(
    State(mock): State<Mock>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("token").map(String::as_str) != Some(GNEWS_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"errors": ["invalid token"]})),
        );
    }

    if let Some(total) = mock.news_total {
        let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let max: usize = params.get("max").and_then(|m| m.parse().ok()).unwrap_or(10);
        mock.news_pages.lock().unwrap().push(page);
        let first = (page.saturating_sub(1) * max).min(total);
        let last = (page * max).min(total);
        let articles: Vec<Value> = (first..last)
            .map(|i| {
                json!({
                    "title": format!("Story {}", i),
                    "description": format!("Report number {} from Nairobi.", i),
                    "publishedAt": format!("2024-06-{:02}T08:00:00Z", i % 28 + 1),
                    "source": {"name": "Daily Nation"}
                })
            })
            .collect();
        return (
            StatusCode::OK,
            Json(json!({"totalArticles": total, "articles": articles})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "totalArticles": 1,
            "articles": [{
                "title": "Finance bill protests spread across Kenya",
                "description": "Protests over the finance bill spread to several cities.",
                "content": "Longer article text.",
                "publishedAt": "2024-06-25T10:00:00Z",
                "source": {"name": "Reuters", "url": "https://www.reuters.com"}
            }]
        })),
    )
}

async fn acled_token(State(mock): State<Mock>) -> impl IntoResponse {
    match mock.acled_token {
        TokenReply::Granted => (
            StatusCode::OK,
            Json(json!({"access_token": "acled-token", "token_type": "Bearer", "expires_in": 86400})),
        ),
        TokenReply::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_grant", "message": "The user credentials were incorrect."})),
        ),
        TokenReply::MissingToken => (
            StatusCode::OK,
            Json(json!({"token_type": "Bearer", "expires_in": 86400})),
        ),
    }
}

async fn acled_read(State(mock): State<Mock>) -> Json<Value> {
    *mock.acled_reads.lock().unwrap() += 1;
    Json(json!({"success": true, "count": 0, "data": []}))
}

async fn ollama_chat(State(mock): State<Mock>, Json(body): Json<Value>) -> impl IntoResponse {
    if mock.fail_chat {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "model crashed"})),
        );
    }
    let user = body["messages"][1]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    mock.prompts.lock().unwrap().push(user);
    (
        StatusCode::OK,
        Json(json!({
            "model": "llama3.2:3b",
            "message": {"role": "assistant", "content": CANNED_REPORT},
            "done": true
        })),
    )
}

pub fn upstream(mock: Mock) -> Router {
    Router::new()
        .route("/v2/country/{alpha3}/indicator/{code}", get(worldbank))
        .route("/v1/reports", post(reliefweb))
        .route("/api/v4/search", get(gnews))
        .route("/oauth/token", post(acled_token))
        .route("/api/acled/read", get(acled_read))
        .route("/api/chat", post(ollama_chat))
        .with_state(mock)
}

/// An upstream where every endpoint fails.
pub fn broken_upstream() -> Router {
    Router::new().fallback(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") })
}

pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
