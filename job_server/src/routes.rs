// HTTP surface of the job server.
//
//   GET  /api/videos                 .mp4 files in the video directory
//   GET  /thumbnail/:filename        first frame of a video as JPEG
//   POST /process/:filename          ?targetColor=<hex>&threshold=<int>, 202 + job id
//   GET  /process/:jobId/status      processing | done (+ result path) | error
//   GET  /jobs                       every known job
//   GET  /results/...                the output directory, served as files
//
// Jobs run on tokio's blocking pool through the sequential sampler; the request
// that starts one returns as soon as its metadata is persisted.

use crate::jobs::{Job, JobStore, JobStoreError, RESULT_FILE, RESULTS_ROUTE, StatusReport};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use centroid_finder::{FrameSource, PipelineConfig, SamplingConfig};
use image::ImageFormat;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::path::{self as fs_path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir};
use uuid::Uuid;
use video_summary::{frame_source, parse_target_color, summarize};

const VIDEO_EXTENSION: &str = "mp4";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub video_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Playback rate for inputs that are directories of still frames.
    pub frames_per_second: f64,
}

pub struct AppState {
    pub config: ServerConfig,
    pub jobs: JobStore,
}

impl AppState {
    /// Creates the output directory if needed and loads its job metadata.
    pub async fn open(config: ServerConfig) -> Result<Self, JobStoreError> {
        tokio::fs::create_dir_all(&config.output_dir).await?;
        let jobs = JobStore::open(&config.output_dir).await?;
        Ok(Self { config, jobs })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/videos", get(list_videos))
        .route("/thumbnail/:filename", get(thumbnail))
        .route("/process/:id", post(start_job))
        .route("/process/:id/status", get(job_status))
        .route("/jobs", get(list_jobs))
        .nest_service(RESULTS_ROUTE, ServeDir::new(&state.config.output_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// An error answered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<JobStoreError> for ApiError {
    fn from(e: JobStoreError) -> Self {
        error!("Job metadata update failed: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Error saving job metadata")
    }
}

fn is_video_file_name(name: &str) -> bool {
    fs_path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Joins a client-supplied name onto the video directory, refusing anything
/// that could leave it.
fn resolve_video(config: &ServerConfig, filename: &str) -> Result<PathBuf, ApiError> {
    if filename.is_empty() || filename == "." || filename == ".." || filename.contains(['/', '\\']) {
        return Err(ApiError::bad_request("Invalid video file name"));
    }
    Ok(config.video_dir.join(filename))
}

async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let unreadable = |e: std::io::Error| {
        error!("Cannot read video directory {:?}: {}", state.config.video_dir, e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error reading video directory")
    };

    let mut entries = tokio::fs::read_dir(&state.config.video_dir).await.map_err(unreadable)?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_video_file_name(&name) {
            videos.push(name);
        }
    }
    videos.sort();
    Ok(Json(videos))
}

fn first_frame_jpeg(input: &fs_path::Path, frames_per_second: f64) -> anyhow::Result<Vec<u8>> {
    let mut source = frame_source::open(input, frames_per_second)?;
    source.seek(Duration::ZERO)?;
    let frame = source
        .grab_frame()?
        .ok_or_else(|| anyhow::anyhow!("{:?} has no frames", input))?;

    let mut jpeg = Cursor::new(Vec::new());
    frame.to_rgb_image().write_to(&mut jpeg, ImageFormat::Jpeg)?;
    Ok(jpeg.into_inner())
}

async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let input = resolve_video(&state.config, &filename)?;
    if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Video not found"));
    }

    let frames_per_second = state.config.frames_per_second;
    let encoded = match tokio::task::spawn_blocking(move || first_frame_jpeg(&input, frames_per_second)).await {
        Ok(encoded) => encoded,
        Err(e) => Err(e.into()),
    };
    match encoded {
        Ok(jpeg) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response()),
        Err(e) => {
            warn!("Thumbnail for {} failed: {:#}", filename, e);
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error generating thumbnail"))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessParams {
    pub target_color: Option<String>,
    pub threshold: Option<String>,
}

async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    Query(params): Query<ProcessParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (Some(target_color), Some(threshold)) = (params.target_color, params.threshold) else {
        return Err(ApiError::bad_request("Missing targetColor or threshold query parameter"));
    };
    let color = parse_target_color(&target_color).map_err(|e| ApiError::bad_request(format!("Invalid targetColor: {}", e)))?;
    let threshold: u32 = threshold
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid threshold: expected a non-negative integer"))?;
    let input = resolve_video(&state.config, &filename)?;

    let job = Job::new(Uuid::new_v4(), filename, target_color, threshold);
    let job_id = job.job_id;
    let job_dir = state.config.output_dir.join(job_id.to_string());
    tokio::fs::create_dir_all(&job_dir).await.map_err(JobStoreError::from)?;
    info!(
        "Job {} started for {} (color {:06X}, threshold {})",
        job_id, job.video_file_name, color, threshold
    );
    state.jobs.insert(job).await?;

    let pipeline = PipelineConfig {
        target_color: color,
        threshold,
        ..Default::default()
    };
    tokio::spawn(run_job(Arc::clone(&state), job_id, input, job_dir.join(RESULT_FILE), pipeline));

    Ok((StatusCode::ACCEPTED, Json(json!({ "jobId": job_id }))))
}

async fn run_job(state: Arc<AppState>, job_id: Uuid, input: PathBuf, output: PathBuf, pipeline: PipelineConfig) {
    let frames_per_second = state.config.frames_per_second;
    let run = tokio::task::spawn_blocking(move || {
        summarize(&input, &output, pipeline, SamplingConfig::default(), frames_per_second)
    })
    .await;

    let outcome = match run {
        Ok(Ok(summary)) => {
            info!(
                "Job {} done: {} samples, {} with a detection, {} skipped",
                job_id, summary.sampled, summary.detected, summary.skipped
            );
            Ok(())
        }
        Ok(Err(e)) => {
            warn!("Job {} failed: {:#}", job_id, e);
            Err(format!("{:#}", e))
        }
        Err(e) => {
            error!("Job {} worker stopped: {}", job_id, e);
            Err(format!("worker stopped: {}", e))
        }
    };

    if let Err(e) = state.jobs.complete(job_id, outcome).await {
        error!("Could not record the outcome of job {}: {}", job_id, e);
    }
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusReport>, ApiError> {
    let job = match Uuid::parse_str(&id) {
        Ok(job_id) => state.jobs.get(job_id).await,
        Err(_) => None,
    };
    job.map(|job| Json(job.status_report()))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Job ID not found"))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    Json(state.jobs.list().await)
}
