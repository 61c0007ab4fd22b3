//! rawcache binary.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rawcache_server::{
    AppState, CachePolicy, CliArgs, HttpUpstream, Settings, StorageBackend, config, run_server,
};
use rawcache_storage::{FsStore, MemoryStore, ObjectStore, S3Store};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let settings = config::load(&cli).context("loading configuration")?;

    init_tracing(&settings);

    tracing::info!("Starting rawcache v{}", rawcache_server::version());
    tracing::info!(
        ttl_default = settings.cache.ttl_default,
        ttl_404 = settings.cache.ttl_404,
        serve_if_present = settings.cache.serve_if_present,
        "cache policy"
    );

    let store = open_store(&settings).await?;
    tracing::info!(backend = store.name(), "object store ready");

    let upstream = HttpUpstream::new(&settings.upstream).context("building upstream client")?;

    let state = AppState::from_parts(store, Arc::new(upstream), CachePolicy::from(&settings));

    let addr = settings.listen_addr()?;
    run_server(addr, state).await?;

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match settings.storage.backend {
        StorageBackend::S3 => {
            let store = S3Store::connect(&settings.storage.s3)
                .await
                .context("connecting to S3 store")?;
            tracing::info!(bucket = store.bucket(), "using S3 bucket");
            Arc::new(store)
        },
        StorageBackend::Fs => {
            let store = FsStore::open(settings.storage.fs.root.clone())
                .await
                .context("opening filesystem store")?;
            tracing::info!(root = %store.root().display(), "using filesystem store");
            Arc::new(store)
        },
        StorageBackend::Memory => {
            tracing::warn!("memory store selected, cached content is lost on exit");
            Arc::new(MemoryStore::new())
        },
    };
    Ok(store)
}
