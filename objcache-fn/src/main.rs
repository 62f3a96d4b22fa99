use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use libobjcache::config::{StorageArgs, TraceArgs};
use libobjcache::handler::{Handler, PutGetEvent};
use libobjcache::storage::driver::StorageKind;
use libobjcache::TraceHeader;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Runs the put/get function handler once against an invocation event.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON event file: {"bucket_name", "bucket_key", "body"}. Reads stdin when absent
    #[arg(short, long, env = "OBJCACHE_EVENT")]
    event: Option<PathBuf>,

    /// Function name, used for the root trace segment
    #[arg(long, env = "FUNCTION_NAME", default_value = Handler::DEFAULT_NAME)]
    function_name: String,

    /// Trace context propagated by the caller
    #[arg(long, env = "_X_AMZN_TRACE_ID")]
    trace_header: Option<String>,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    trace: TraceArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let raw = match &args.event {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read event file `{}`", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let event = PutGetEvent::from_json(&raw)?;

    let backend = args.storage.backend_config(StorageKind::S3).build().await;
    let recorder = args.trace.recorder()?;
    let handler = Handler::new(backend, recorder).with_name(args.function_name.clone());

    let parent = args.trace_header.as_deref().and_then(TraceHeader::parse);
    handler.handle(event, parent.as_ref()).await?;
    tracing::info!(function = %args.function_name, "invocation complete");
    Ok(())
}
