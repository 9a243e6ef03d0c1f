mod config;
mod render;
mod seed;
mod server;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigError, StatsdConfig};
use mapstore::audit::MemoryAuditSink;
use mapstore::repair::RedirectChainRepair;
use mapstore::snapshot::{FilesystemSnapshotProvider, SnapshotError, SnapshotProvider};
use mapstore::{MapService, MemoryCache, MemoryStore, Slot, StoreError};
use render::{StaticSiteRenderer, StaticStatusPage};
use router::{Handler, HandlerRegistry, RegistryError, Router, SitemapEntry, SitemapProjector};
use server::App;

#[derive(Parser)]
#[command(name = "urlographer", about = "URL routing and redirect management service")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "urlographer.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the routing layer
    Serve,
    /// Collapse two-hop redirect chains once and exit
    Repair,
    /// Import a YAML fixture into the store
    Import { fixture: PathBuf },
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Handlers(#[from] RegistryError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Seed(#[from] seed::SeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(error) = run(cli).await {
        tracing::error!(error = %error, "exiting");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(&cli.config)?;
    if let Some(statsd) = &config.statsd {
        install_statsd(statsd)?;
    }

    let snapshots = config
        .snapshot
        .as_ref()
        .map(|snapshot| FilesystemSnapshotProvider::new(&snapshot.base_dir, &snapshot.filename));

    let store = Arc::new(load_store(&snapshots)?);
    let cache: Arc<MemoryCache<Slot>> = Arc::new(MemoryCache::new(None));
    let maps = Arc::new(MapService::new(
        store.clone(),
        cache,
        config.mapstore.clone(),
    ));

    if let Some(seed_path) = &config.seed
        && store.is_empty()
    {
        let summary = seed::import_file(&maps, seed_path).await?;
        tracing::info!(
            sites = summary.sites,
            content_maps = summary.content_maps,
            url_maps = summary.url_maps,
            "seeded the store"
        );
    }

    match cli.command {
        CliCommand::Serve => {
            let renderer = Arc::new(StaticSiteRenderer::new(config.views.clone()));
            let handlers = build_handler_registry(&config)?;
            let router = Router::new(maps.clone(), renderer, handlers);
            let sitemap_cache: Arc<MemoryCache<Arc<[SitemapEntry]>>> =
                Arc::new(MemoryCache::new(None));
            let projector = SitemapProjector::new(maps.clone(), sitemap_cache);
            let app = Arc::new(App {
                router,
                projector,
                maps: maps.clone(),
                trust_forwarded_proto: config.trust_forwarded_proto,
            });
            server::serve(&config.listener, app).await?;
        }
        CliCommand::Repair => {
            let audit = Arc::new(MemoryAuditSink::new());
            let job = RedirectChainRepair::new(maps.clone(), audit.clone());
            let summary = job.run().await?;
            for entry in audit.entries() {
                tracing::info!(url_map = ?entry.url_map, message = %entry.message, "repair audit");
            }
            tracing::info!(
                examined = summary.examined,
                collapsed = summary.collapsed,
                failed = summary.failed,
                "repair pass complete"
            );
            persist_snapshot(&snapshots, &store)?;
        }
        CliCommand::Import { fixture } => {
            let summary = seed::import_file(&maps, &fixture).await?;
            tracing::info!(
                sites = summary.sites,
                content_maps = summary.content_maps,
                url_maps = summary.url_maps,
                "import complete"
            );
            persist_snapshot(&snapshots, &store)?;
        }
    }

    Ok(())
}

fn load_store(snapshots: &Option<FilesystemSnapshotProvider>) -> Result<MemoryStore, AppError> {
    let Some(provider) = snapshots else {
        return Ok(MemoryStore::new());
    };
    match provider.load() {
        Ok(snapshot) => Ok(MemoryStore::from_snapshot(snapshot)),
        Err(SnapshotError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = ?provider.path(), "no snapshot yet, starting empty");
            Ok(MemoryStore::new())
        }
        Err(error) => Err(error.into()),
    }
}

fn persist_snapshot(
    snapshots: &Option<FilesystemSnapshotProvider>,
    store: &MemoryStore,
) -> Result<(), SnapshotError> {
    if let Some(provider) = snapshots {
        provider.store(&store.snapshot())?;
        tracing::info!(path = ?provider.path(), "snapshot written");
    }
    Ok(())
}

fn build_handler_registry(config: &Config) -> Result<HandlerRegistry, RegistryError> {
    let mut builder = HandlerRegistry::builder();
    for (name, body) in &config.status_pages {
        builder = builder.register_named(name.clone(), Arc::new(StaticStatusPage::new(body.clone())));
    }
    for (&status, name) in &config.handlers {
        builder = builder.handler(status, Handler::Named(name.clone()));
    }
    builder.build()
}

fn install_statsd(config: &StatsdConfig) -> Result<(), AppError> {
    let recorder = StatsdBuilder::from(config.host.as_str(), config.port)
        .with_queue_size(5000)
        .with_buffer_size(1024)
        .build(Some(&config.prefix))
        .map_err(|error| AppError::Metrics(error.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|error| AppError::Metrics(error.to_string()))?;
    Ok(())
}
