#![forbid(unsafe_code)]

//! HTTP front end for channel and video metadata lookups.
//!
//! `POST /channelId` resolves the channel that owns a video. `POST /channel`
//! pulls every listed channel plus the metadata of each recent upload and
//! appends the results to `channels.csv` and `videos.csv` under the data
//! directory. Upstream calls are blocking and run on tokio's blocking pool.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::Deserialize;
use tokio::signal;
use trendtube_tools::api::YouTubeApi;
use trendtube_tools::channel::{channel_id_for_video, fetch_channel_batch};
use trendtube_tools::config::{RuntimeOverrides, resolve_service_config};
use trendtube_tools::logging::init_logging;

#[derive(Debug, Clone, Parser)]
#[command(name = "backend", version, about = "Channel and video metadata service")]
struct BackendArgs {
    /// Address to listen on.
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Directory that receives channels.csv and videos.csv.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Path of the .env file to read.
    #[arg(long = "env-file")]
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_file,
            host: self.host,
            port: self.port,
            data_dir: self.data_dir,
            ..RuntimeOverrides::default()
        }
    }
}

#[derive(Clone)]
struct AppState {
    api: YouTubeApi,
    data_dir: Arc<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ChannelIdRequest {
    vid: String,
}

#[derive(Debug, Deserialize)]
struct ChannelRequest {
    #[serde(rename = "channelId")]
    channel_ids: Vec<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("request failed: {err:#}");
        Self::internal(format!("{err:#}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("installing TLS crypto provider"))?;
    init_logging();

    let config = resolve_service_config(BackendArgs::parse().overrides())?;
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid listen host {}", config.host))?;

    let state = AppState {
        api: YouTubeApi::new(&config.api),
        data_dir: Arc::new(config.data_dir),
    };
    let app = router(state);

    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(%addr, "metadata service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running metadata service")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/channelId", post(channel_id))
        .route("/channel", post(channel))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!("failed to install Ctrl+C handler: {err}");
    }
}

async fn hello() -> &'static str {
    "Hello, World!"
}

/// Responds with the bare channel id of the video's owner.
async fn channel_id(
    State(state): State<AppState>,
    payload: Result<Json<ChannelIdRequest>, JsonRejection>,
) -> ApiResult<String> {
    let Json(payload) = payload?;
    let vid = payload.vid.trim().to_string();
    if vid.is_empty() {
        return Err(ApiError::bad_request("vid must not be empty"));
    }
    let api = state.api.clone();
    let channel = run_blocking(move || channel_id_for_video(&api, &vid)).await?;
    Ok(channel)
}

async fn channel(
    State(state): State<AppState>,
    payload: Result<Json<ChannelRequest>, JsonRejection>,
) -> ApiResult<String> {
    let Json(payload) = payload?;
    let api = state.api.clone();
    let data_dir = state.data_dir.clone();
    let ids = payload.channel_ids;
    let summary = run_blocking(move || {
        let batch = fetch_channel_batch(&api, &ids)?;
        batch.append_to(&data_dir)?;
        Ok(batch.summary())
    })
    .await?;
    Ok(summary)
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("request worker panicked")?
}
