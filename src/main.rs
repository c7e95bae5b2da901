use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use earshot::services::{ConversationProcessor, InMemoryLocationStore, NotificationService};
use earshot::{create_router, AppState, CaptureRegistry, Config, NatsPublisher, TaskQueue, TaskWorker};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "earshot", about = "Wearable audio capture and conversation segmentation service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/earshot")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);
    info!("Capture root: {}", cfg.captures.capture_dir);

    let registry = Arc::new(CaptureRegistry::new(
        cfg.captures.capture_dir.clone(),
        cfg.captures.sample_rate,
        cfg.detection.clone(),
    ));

    let nats = Arc::new(NatsPublisher::connect(&cfg.nats.url).await?);

    let (task_queue, task_rx) = TaskQueue::new();
    let worker = TaskWorker::new(
        task_rx,
        nats.clone() as Arc<dyn ConversationProcessor>,
        nats as Arc<dyn NotificationService>,
    );
    tokio::spawn(worker.run());

    let state = AppState::new(registry, task_queue, Arc::new(InMemoryLocationStore::new()));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
