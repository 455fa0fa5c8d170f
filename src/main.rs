mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Commands};
use matchcast_core::simulation::{LifecycleDriver, TickScheduler};
use matchcast_core::{
    load_match_detail, Config, ConfigLoader, InMemoryStore, MatchStore, NotificationBus, SqliteStore,
};
use matchcast_gateway::{GatewayServer, MatchHandlers, SessionManager};
use matchcast_presence::MemoryPresenceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("matchcast=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    // Handle ConfigSample immediately without loading config
    if let Commands::ConfigSample { output } = &cli.command {
        let path = output
            .clone()
            .unwrap_or_else(|| PathBuf::from("./matchcast.sample.yaml"));
        Config::sample().save(&path)?;
        println!("✅ Sample config written to {:?}", path);
        return Ok(());
    }

    let config = ConfigLoader::load_or_default(cli.config_path.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            in_memory,
        } => serve(config, host, port, in_memory).await,
        Commands::Seed => {
            let store = open_store(&config)?;
            let seeded = store.seed_defaults().await?;
            if seeded.is_empty() {
                println!("Database already seeded: {:?}", config.store.db_path);
            } else {
                println!("Seeded {} live matches into {:?}", seeded.len(), config.store.db_path);
            }
            Ok(())
        }
        Commands::List => {
            let store = open_store(&config)?;
            let matches = store.list_matches().await?;
            if matches.is_empty() {
                println!("No matches. Run `matchcast seed` first.");
            }
            for m in matches {
                println!(
                    "{}  {} {}-{} {}  {} {}'",
                    m.id,
                    m.home_team.short_code,
                    m.home_score,
                    m.away_score,
                    m.away_team.short_code,
                    m.status,
                    m.minute
                );
            }
            Ok(())
        }
        Commands::Show { match_id } => {
            let store = open_store(&config)?;
            let detail = load_match_detail(&store, &match_id).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(())
        }
        Commands::ConfigSample { .. } => Ok(()),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(config.store.db_path.clone())
        .with_context(|| format!("Failed to open database {:?}", config.store.db_path))
}

async fn serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    in_memory: bool,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let store: Arc<dyn MatchStore> = if in_memory {
        let store = InMemoryStore::new();
        let seeded = store.seed_defaults().await;
        info!("Using in-memory store with {} live matches", seeded.len());
        Arc::new(store)
    } else {
        let store = open_store(&config)?;
        let seeded = store.seed_defaults().await?;
        info!(
            "Using database {:?} ({} matches seeded)",
            config.store.db_path,
            seeded.len()
        );
        Arc::new(store)
    };

    let bus = NotificationBus::new();
    let driver = LifecycleDriver::new(store.clone(), bus.clone(), &config.simulation);
    let scheduler = TickScheduler::new(store, driver, &config.simulation);

    let presence = Arc::new(MemoryPresenceStore::new());
    let handlers = Arc::new(MatchHandlers::new(
        Arc::new(SessionManager::new()),
        presence,
        &config.presence,
        &config.gateway,
    ));
    let server = GatewayServer::new(config.gateway.clone(), handlers, bus);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let simulation = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let mut gateway = tokio::spawn(server.start(shutdown_rx));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
        }
        result = &mut gateway => {
            // The gateway stopped on its own, most likely a bind failure
            let _ = shutdown_tx.send(true);
            simulation.await?;
            return result?;
        }
    }

    let _ = shutdown_tx.send(true);
    simulation.await?;
    gateway.await??;
    Ok(())
}
