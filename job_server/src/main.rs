use anyhow::Context;
use clap::Parser;
use job_server::{AppState, ServerConfig, router};
use log::info;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

/// Serves the video summary job API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the videos clients may process.
    #[arg(long, env = "VIDEO_DIR", default_value = "videos")]
    video_dir: PathBuf,

    /// Directory receiving `jobs.json` and one result folder per job.
    #[arg(long, env = "OUTPUT_DIR", default_value = "results")]
    output_dir: PathBuf,

    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Frame rate used for inputs that are directories of still frames.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let state = AppState::open(ServerConfig {
        video_dir: args.video_dir,
        output_dir: args.output_dir.clone(),
        frames_per_second: args.fps,
    })
    .await
    .with_context(|| format!("loading job metadata from {:?}", args.output_dir))?;
    let app = router(Arc::new(state));

    let address = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
