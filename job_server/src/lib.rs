// Background job API around `video_summary`: clients list videos, start a
// summary job, poll its status and fetch the CSV once it is done. Job metadata
// is persisted so finished results stay listed across restarts.

pub mod jobs;
pub mod routes;

pub use jobs::{Job, JobStatus, JobStore, JobStoreError, StatusReport};
pub use routes::{AppState, ServerConfig, router};
