use crate::app::{AppError, AppService, SearchRequest, SearchResponse};
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
struct SharedState {
    app: Arc<AppService>,
}

pub fn router(app: Arc<AppService>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/search", get(search))
        .route("/load_data", get(load_data))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(app: Arc<AppService>, listen_addr: String) -> anyhow::Result<()> {
    let router = router(app);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    log::info!("listening on {listen_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(app: Arc<AppService>, listen_addr: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(app, listen_addr.to_string()))
}

#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            log::error!("{self:?}");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(json!({"status": "error", "message": self.0.to_string()})),
        )
            .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Query string of `/search`.
///
/// Numbers stay strings here so a malformed value falls back to its
/// default instead of rejecting the request.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub approach: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl SearchParams {
    /// Collect known keys from raw query pairs. The first occurrence of a
    /// repeated key wins and unknown keys are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "q" => &mut params.q,
                "approach" => &mut params.approach,
                "page" => &mut params.page,
                "per_page" => &mut params.per_page,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

fn parse_int(value: Option<String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResponse>, HttpError> {
    let app = state.app.clone();
    let params = SearchParams::from_pairs(pairs);

    log::debug!("params: {params:?}");

    let request = SearchRequest {
        query: params.q,
        approach: params.approach,
        page: parse_int(params.page),
        per_page: parse_int(params.per_page),
    };

    tokio::task::block_in_place(move || app.search(request))
        .map(Json)
        .map_err(Into::into)
}

async fn load_data(State(state): State<Arc<SharedState>>) -> Result<Json<Value>, HttpError> {
    let app = state.app.clone();

    let summary = tokio::task::block_in_place(move || app.load_data())?;

    Ok(Json(json!({
        "status": "success",
        "message": summary.message(),
    })))
}
