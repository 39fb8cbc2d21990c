use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mapdex::config::MapConfig;
use mapdex::error::Result;
use mapdex::server::{AppContext, router};
use mapdex::services::DataServices;

#[derive(Parser)]
#[command(name = "mapdex")]
#[command(about = "Loads, indexes and searches map initiatives")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "mapdex.toml")]
    config: PathBuf,

    /// Print the initiatives matching this text and exit
    #[arg(short, long)]
    search: Option<String>,

    /// Serve the HTTP API on the configured address
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mapdex=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MapConfig::from_file(&cli.config)?;
    let bind = config.bind.clone();
    let services = Arc::new(DataServices::new(config)?);
    services.load_data().await?;
    for (dataset, status) in services.dataset_statuses()? {
        info!(%dataset, ?status, "dataset status");
    }

    if let Some(text) = cli.search.as_deref() {
        for initiative in services.search(text)? {
            println!("{}\t{}\t{}", initiative.name(), initiative.uri(), initiative.dataset());
        }
    }

    if cli.serve {
        let app = router(Arc::new(AppContext::new(Arc::clone(&services))?));
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        info!(%bind, "serving");
        axum::serve(listener, app).await?;
    }
    Ok(())
}
