//! PDF merge server
//!
//! Serves a small upload page and the JSON API behind it. Merged files are
//! written to the output directory, the user's downloads folder by default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdfmerge_core::config::{default_output_dir, DEFAULT_UPLOAD_DIR};
use pdfmerge_core::MergeConfig;
use pdfmerge_server::{router, AppState};

/// Command-line arguments for the merge server
#[derive(Parser, Debug)]
#[command(name = "pdfmerge-server")]
#[command(about = "Upload, order and merge PDF files from the browser")]
struct Args {
    /// Host address to bind to
    #[arg(long, env = "PDFMERGE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PDFMERGE_PORT", default_value = "5000")]
    port: u16,

    /// Scratch directory for uploaded files
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Directory merged files are written to [default: your downloads folder]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MergeConfig::new(
        args.upload_dir,
        args.output_dir.unwrap_or_else(default_output_dir),
    );
    let state = Arc::new(AppState::new(config).await?);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
