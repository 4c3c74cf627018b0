use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::signal;
use tracing::{error, info, warn};

use ads_filter::api::{start_api_server, ApiState};
use ads_filter::config::Config;
use ads_filter::engine::{BlockMode, BlocklistUpdater, DecisionEngine, HttpFetcher};
use ads_filter::init::{build_rule_set, setup_logging, updater_options};
use ads_filter::logger::QueryLogger;
use ads_filter::server::DnsHandler;
use ads_filter::stats::StatsCollector;
use ads_filter::store::create_store;
use hickory_server::ServerFuture;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "config.toml".to_string()),
    );
    let config_exists = config_path.exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting ads-filter...");

    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // 3. Rules & Store
    let rules = build_rule_set(&config.rules).context("Invalid [rules] section")?;
    let store = create_store(&config.store, rules);

    // 4. Stats & QueryLogger
    let stats = StatsCollector::new(config.stats.log_interval_seconds);
    if config.stats.enable {
        stats.spawn_logger();
    }
    let logger = QueryLogger::new(config.logging.clone());

    // 5. Blocklist Updater, warm started from the stored snapshot
    let updater = if config.blocklists.is_empty() {
        warn!("No blocklist sources configured; only rules will block queries");
        let _ = store.init().await;
        None
    } else {
        let fetcher = Arc::new(HttpFetcher::new()?);
        let (updater, trigger_rx) = BlocklistUpdater::new(
            updater_options(&config),
            fetcher,
            store.clone(),
            Some(stats.clone()),
        );
        let refresh_now = updater.warm_start().await;
        tokio::spawn(updater.clone().run(trigger_rx, refresh_now));
        Some(updater)
    };

    // 6. Decision Engine & Upstream
    let engine = Arc::new(DecisionEngine::new(
        store.clone(),
        BlockMode::from(&config.response),
    ));
    let upstream_resolver = ads_filter::resolver::create_resolver(&config)?;

    // 7. Build Handler
    let handler = DnsHandler::new(
        engine.clone(),
        upstream_resolver,
        stats.clone(),
        logger,
    );

    // 8. Start API Server
    if config.api.enable {
        let api_addr = SocketAddr::new(
            config
                .api
                .host
                .parse::<IpAddr>()
                .context("Invalid api.host")?,
            config.api.port,
        );
        let api_state = Arc::new(ApiState {
            engine,
            store,
            updater,
            stats,
            config_path,
        });
        tokio::spawn(async move {
            if let Err(e) = start_api_server(api_state, api_addr).await {
                error!("{:#}", e);
            }
        });
    }

    // 9. Start Server
    let mut server = ServerFuture::new(handler);
    let addr = SocketAddr::new(
        config.host.parse::<IpAddr>().context("Invalid host")?,
        config.port,
    );

    // UDP
    let udp_socket = UdpSocket::bind(addr).await?;
    server.register_socket(udp_socket);

    // TCP
    let tcp_listener = TcpListener::bind(addr).await?;
    server.register_listener(tcp_listener, Duration::from_secs(5));

    info!("DNS Server listening on {}", addr);

    // 10. Graceful Shutdown
    tokio::select! {
        _ = server.block_until_done() => {},
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
