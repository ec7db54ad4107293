// Job metadata lives in one `jobs.json` file in the output directory, keyed by
// job id. Every change rewrites the whole file through a staging file and a
// rename, with the in-memory map locked for the duration.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const JOBS_FILE: &str = "jobs.json";
pub const RESULT_FILE: &str = "result.csv";
/// Public prefix under which the output directory is served.
pub const RESULTS_ROUTE: &str = "/results";

const INTERRUPTED: &str = "Server stopped before the job finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Result path relative to the output directory.
    pub output_file_name: String,
    pub video_file_name: String,
    /// The color as the client sent it.
    pub target_color: String,
    pub threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(job_id: Uuid, video_file_name: String, target_color: String, threshold: u32) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            output_file_name: format!("{}/{}", job_id, RESULT_FILE),
            video_file_name,
            target_color,
            threshold,
            error: None,
        }
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: self.status,
            result: (self.status == JobStatus::Done).then(|| format!("{}/{}", RESULTS_ROUTE, self.output_file_name)),
            error: match self.status {
                JobStatus::Error => Some(self.error.clone().unwrap_or_else(|| "Unknown error occurred".into())),
                _ => None,
            },
        }
    }
}

/// Body of `GET /process/:id/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job metadata I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("job metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown job {0}")]
    UnknownJob(Uuid),
}

pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<BTreeMap<Uuid, Job>>,
}

impl JobStore {
    /// Loads `jobs.json` from `output_dir`, or starts empty when there is none.
    /// Jobs still marked as processing belonged to a previous server run and
    /// are marked as failed.
    pub async fn open(output_dir: &Path) -> Result<Self, JobStoreError> {
        let path = output_dir.join(JOBS_FILE);
        let mut jobs: BTreeMap<Uuid, Job> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut interrupted = 0;
        for job in jobs.values_mut().filter(|job| job.status == JobStatus::Processing) {
            job.status = JobStatus::Error;
            job.error = Some(INTERRUPTED.into());
            interrupted += 1;
        }
        info!("Loaded {} jobs from {:?}", jobs.len(), path);

        let store = Self {
            path,
            jobs: Mutex::new(jobs),
        };
        if interrupted > 0 {
            warn!("{} jobs were interrupted by a restart", interrupted);
            let jobs = store.jobs.lock().await;
            store.persist(&jobs).await?;
        }
        Ok(store)
    }

    async fn persist(&self, jobs: &BTreeMap<Uuid, Job>) -> Result<(), JobStoreError> {
        let json = serde_json::to_vec_pretty(jobs)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    pub async fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.job_id, job);
        self.persist(&jobs).await
    }

    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.lock().await.get(&job_id).cloned()
    }

    /// All jobs, ordered by id.
    pub async fn list(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// Records how a job ended: `Ok` marks it done, `Err` carries the reason.
    pub async fn complete(&self, job_id: Uuid, outcome: Result<(), String>) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::UnknownJob(job_id))?;
        match outcome {
            Ok(()) => {
                job.status = JobStatus::Done;
                job.error = None;
            }
            Err(reason) => {
                job.status = JobStatus::Error;
                job.error = Some(reason);
            }
        }
        let job = job.clone();
        self.persist(&jobs).await?;
        Ok(job)
    }
}
