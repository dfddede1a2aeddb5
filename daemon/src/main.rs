//! Overlay daemon: entry point for running an overlay services node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use overlay_discovery::{AdvertisementLookupService, AdvertisementTopicManager, PushDropAdvertiser};
use overlay_engine::{init_logging, Engine, EngineConfig, ShutdownController};
use overlay_kvstore::{KvStoreLookupService, KvStoreTopicManager};
use overlay_network::{ArcBroadcaster, ArcConfig, WhatsOnChainTracker};
use overlay_rpc::RpcServer;
use overlay_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use overlay_types::{AdvertisementProtocol, NetworkId};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "overlay-daemon", about = "Overlay services node daemon")]
struct Cli {
    /// Chain merkle proofs are checked against: "main" or "test".
    /// When a config file is provided, defaults to the file's value.
    #[arg(long, env = "OVERLAY_NETWORK")]
    network: Option<String>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "OVERLAY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP server port.
    #[arg(long, env = "OVERLAY_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Public URL advertised in SHIP/SLAP tokens.
    #[arg(long, env = "OVERLAY_HOSTING_URL")]
    hosting_url: Option<String>,

    /// Hex compressed public key advertisements are issued under.
    #[arg(long, env = "OVERLAY_IDENTITY_KEY")]
    identity_key: Option<String>,

    /// ARC endpoint transactions are relayed to.
    #[arg(long, env = "OVERLAY_ARC_URL")]
    arc_url: Option<String>,

    #[arg(long, env = "OVERLAY_ARC_API_KEY", hide_env_values = true)]
    arc_api_key: Option<String>,

    /// URL ARC delivers merkle proofs to (normally `{hosting_url}/arc-ingest`).
    #[arg(long, env = "OVERLAY_ARC_CALLBACK_URL")]
    arc_callback_url: Option<String>,

    /// Do not relay admitted transactions.
    #[arg(long, env = "OVERLAY_DISABLE_BROADCAST")]
    disable_broadcast: bool,

    /// Reconcile SHIP/SLAP advertisements once the node is up.
    #[arg(long, env = "OVERLAY_SYNC_ADVERTISEMENTS")]
    sync_advertisements: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "OVERLAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "OVERLAY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node.
    Run,
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// File settings (or defaults) with CLI flags and env vars layered on top.
    fn resolve_config(&self) -> anyhow::Result<EngineConfig> {
        let base = match &self.config {
            Some(path) => EngineConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => EngineConfig::default(),
        };
        Ok(EngineConfig {
            network: self
                .network
                .as_deref()
                .map(NetworkId::parse_lossy)
                .unwrap_or(base.network),
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            hosting_url: self.hosting_url.clone().unwrap_or(base.hosting_url),
            identity_key: self.identity_key.clone().or(base.identity_key),
            arc_url: self.arc_url.clone().unwrap_or(base.arc_url),
            arc_api_key: self.arc_api_key.clone().or(base.arc_api_key),
            arc_callback_url: self.arc_callback_url.clone().or(base.arc_callback_url),
            enable_broadcast: base.enable_broadcast && !self.disable_broadcast,
            sync_advertisements_on_start: self.sync_advertisements
                || base.sync_advertisements_on_start,
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            ..base
        })
    }
}

/// Register the KVStore and SHIP/SLAP protocols over LMDB and attach the
/// chain tracker, broadcaster and advertiser the config asks for.
fn build_engine(config: &EngineConfig, lmdb: &LmdbEnvironment) -> anyhow::Result<Engine> {
    let storage = Arc::new(lmdb.coin_store());
    let kv_storage = Arc::new(lmdb.kvstore_storage());
    let ad_storage = Arc::new(lmdb.advertisement_storage());
    let chain_tracker = Arc::new(WhatsOnChainTracker::with_timeout(
        config.network,
        config.chain_tracker_timeout(),
    ));

    let mut builder = Engine::builder(storage, chain_tracker)
        .configure(config)
        .topic_manager(overlay_kvstore::TOPIC, Arc::new(KvStoreTopicManager))
        .lookup_service(
            overlay_kvstore::LOOKUP_SERVICE,
            Arc::new(KvStoreLookupService::new(kv_storage)),
        );
    for protocol in [AdvertisementProtocol::Ship, AdvertisementProtocol::Slap] {
        builder = builder
            .topic_manager(
                protocol.topic(),
                Arc::new(AdvertisementTopicManager::new(protocol)),
            )
            .lookup_service(
                protocol.lookup_service(),
                Arc::new(AdvertisementLookupService::new(protocol, ad_storage.clone())),
            );
    }

    if config.enable_broadcast {
        let arc = ArcBroadcaster::with_timeout(
            ArcConfig {
                url: config.arc_url.clone(),
                api_key: config.arc_api_key.clone(),
                callback_url: config.arc_callback_url.clone(),
                callback_token: config.arc_callback_token.clone(),
                deployment_id: config.arc_deployment_id.clone(),
            },
            config.broadcast_timeout(),
        );
        info!(endpoint = %arc.endpoint(), "relaying admitted transactions");
        builder = builder.broadcaster(Arc::new(arc));
    } else {
        info!("broadcast disabled");
    }

    if let Some(key) = &config.identity_key {
        let advertiser = PushDropAdvertiser::new(key, &config.hosting_url)
            .context("building SHIP/SLAP advertiser")?;
        builder = builder.advertiser(Arc::new(advertiser));
    }

    Ok(builder.build())
}

async fn run(config: EngineConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!(
        network = config.network.as_str(),
        rpc_port = config.rpc_port,
        hosting_url = %config.hosting_url,
        "starting overlay node"
    );

    check_data_dir(&config.data_dir)?;
    let lmdb = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)
        .with_context(|| format!("opening LMDB at {}", config.data_dir.display()))?;
    let report = check_integrity(lmdb.env())?;
    if !report.is_healthy() {
        for e in &report.errors {
            error!(error = %e, "integrity check");
        }
        anyhow::bail!("LMDB integrity check failed");
    }
    info!(
        databases = report.databases_checked(),
        coins = report.count("coins"),
        kvstore_records = report.count("kvstore_records"),
        entries = report.total_entries(),
        "integrity check passed"
    );

    let engine = Arc::new(build_engine(&config, &lmdb)?);
    let shutdown = Arc::new(ShutdownController::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_signal().await });
    }

    if config.sync_advertisements_on_start {
        if config.identity_key.is_none() {
            warn!("advertisement sync requested but no identity key is configured");
        } else {
            let engine = engine.clone();
            tokio::spawn(async move {
                match engine.sync_advertisements().await {
                    Ok(summary) => info!(
                        published = summary.published.len(),
                        revoked = summary.revoked.len(),
                        failed = summary.failures.len(),
                        "startup advertisement sync finished"
                    ),
                    Err(e) => warn!(error = %e, "startup advertisement sync failed"),
                }
            });
        }
    }

    RpcServer::new(config.rpc_port, engine)
        .start(shutdown.signalled())
        .await?;

    info!("shutdown signal received, flushing storage");
    lmdb.sync()?;
    info!("overlay daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Run => {
            init_logging(config.log_format(), &config.log_level)?;
            run(config).await
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
