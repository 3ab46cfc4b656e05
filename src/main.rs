use anyhow::Context;
use clap::Parser;
use davserver::backend::{ManagerRegistry, serializer};
use davserver::server::{DEFAULT_PORT, RequestLogger, ServerOptions, WebDavServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Serve an in-memory WebDAV tree
#[derive(Parser, Debug)]
#[command(name = "davserver", version, about)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Always buffer request bodies instead of streaming them to methods
    #[arg(long)]
    no_chunk: bool,

    /// Restore the tree from a JSON snapshot before serving
    #[arg(long, value_name = "FILE")]
    load: Option<PathBuf>,

    /// Write a JSON snapshot of the tree on shutdown
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut options = ServerOptions {
        hostname: args.host.clone(),
        port: args.port,
        can_chunk: !args.no_chunk,
        ..ServerOptions::default()
    };
    if let Some(path) = &args.load {
        options.root_resource = serializer::load_from_file(path, &ManagerRegistry::new())
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    let mut server = WebDavServer::new(options);
    server.add_after_middleware(Arc::new(RequestLogger));
    let addr = server
        .start()
        .await
        .with_context(|| format!("failed to listen on {}:{}", args.host, args.port))?;
    info!(%addr, "serving, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;

    if let Some(path) = &args.save {
        serializer::save_to_file(&server.root_resource(), path)
            .await
            .with_context(|| format!("failed to save {}", path.display()))?;
    }
    server.stop().await;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
