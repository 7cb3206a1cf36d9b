use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiEndpoints {
    pub auth: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiRoot {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: ApiEndpoints,
}

async fn api_root() -> Json<ApiRoot> {
    Json(ApiRoot {
        message: "Dr. Exys Medical Platform API",
        version: "v1",
        endpoints: ApiEndpoints {
            auth: "/api/v1/auth/",
            health: "/api/v1/auth/health/",
        },
    })
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/", get(api_root))
        .nest("/api/v1/auth", auth::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
