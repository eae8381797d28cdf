//! The `run` command: drive one bootstrap session in the terminal.

use bootstrap_lifecycle::{
    BootstrapConfig, BootstrapDeps, BootstrapSession, ChannelNavigator, GateConfig, Route,
};
use bridge_relay::{BridgeHttpClient, RetryPolicy, WebSocketConnector};
use console_config_and_utils::{Config, Paths};
use contact_cache::{ContactCache, FileCacheStorage};
use contact_store_client::{RestContactStore, StoreCredentials};
use contact_sync_pipeline::CachePolicy;
use session_state::{ConnectionStatus, SessionState, SyncPhase};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RunOptions {
    pub user_id: String,
    pub tenant_id: String,
    pub access_token: String,
    pub phone: Option<String>,
}

pub fn bootstrap_config(config: &Config, user_id: &str, tenant_id: &str) -> BootstrapConfig {
    BootstrapConfig {
        user_id: user_id.to_string(),
        tenant_id: tenant_id.to_string(),
        bridge_ws_url: config.bridge_ws_url.clone(),
        retry: RetryPolicy {
            max_attempts: config.max_reconnect_attempts,
            delay: config.reconnect_delay(),
        },
        cache: CachePolicy {
            max_age: config.cache_max_age(),
        },
        gate: GateConfig {
            settle_delay: config.settle_delay(),
        },
    }
}

pub fn bridge_client(config: &Config, access_token: Option<&str>) -> BridgeHttpClient {
    let client = BridgeHttpClient::new(&config.bridge_url);
    match access_token.filter(|token| !token.is_empty()) {
        Some(token) => client.with_access_token(token),
        None => client,
    }
}

/// Run until the readiness gate enters the main application, the session is
/// sent back to login, or the user interrupts.
pub async fn run_bootstrap(
    config: &Config,
    paths: &Paths,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = RestContactStore::new(
        config.store_url.clone(),
        StoreCredentials {
            api_key: config.store_api_key.clone(),
            access_token: options.access_token.clone(),
        },
    )?;
    let cache = ContactCache::new(Box::new(FileCacheStorage::new(paths.cache_dir())?));
    let bridge_api = bridge_client(config, Some(&options.access_token));
    let (navigator, mut routes) = ChannelNavigator::new();

    let deps = BootstrapDeps {
        store: Arc::new(store),
        cache: Arc::new(cache),
        connector: Arc::new(WebSocketConnector),
        bridge_api: Arc::new(bridge_api),
        navigator: Arc::new(navigator),
    };

    let session = BootstrapSession::start(
        bootstrap_config(config, &options.user_id, &options.tenant_id),
        deps,
    )
    .await?;
    let reporter = tokio::spawn(report_progress(session.state().clone()));

    if let Some(phone) = options.phone.as_deref() {
        match session.pairing().request_pairing_code(phone).await {
            Ok(code) => println!("Pairing code: {}  (enter it on your phone)", code),
            Err(e) => warn!(error = %e, "Pairing code request failed"),
        }
    }

    let route = tokio::select! {
        route = routes.recv() => route,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            session.logout().await;
            reporter.abort();
            println!("Logged out.");
            return Ok(());
        }
    };

    let contacts = session.state().contacts().len();
    session.dispose().await;
    reporter.abort();

    match route {
        Some(Route::Main) => {
            println!("Ready: {} contacts synchronized.", contacts);
            Ok(())
        }
        Some(Route::Login) | None => Err("session ended before the console was ready".into()),
    }
}

/// Print connection and sync changes as they are published.
async fn report_progress(state: SessionState) {
    let mut connection = state.watch_connection();
    let mut sync = state.watch_sync();
    let mut notice = state.watch_notice();
    let mut last_qr: Option<String> = None;
    let mut last_status = ConnectionStatus::Disconnected;
    let mut last_phase = SyncPhase::Initializing;

    loop {
        tokio::select! {
            _ = state.lifetime().disposed() => return,
            changed = connection.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = connection.borrow_and_update().clone();
                if snapshot.status != last_status {
                    println!("Connection: {}", snapshot.status.as_str());
                    last_status = snapshot.status;
                }
                if snapshot.status == ConnectionStatus::Qr && snapshot.qr_code != last_qr {
                    if let Some(qr) = snapshot.qr_code.as_deref() {
                        println!("Scan this code with your phone:\n{}", qr);
                    }
                    last_qr = snapshot.qr_code;
                }
            }
            changed = sync.changed() => {
                if changed.is_err() {
                    return;
                }
                let progress = sync.borrow_and_update().clone();
                if progress.phase != last_phase {
                    println!("Sync: {} ({}%)", progress.phase, progress.percent);
                    last_phase = progress.phase;
                }
            }
            changed = notice.changed() => {
                if changed.is_err() {
                    return;
                }
                if let Some(message) = notice.borrow_and_update().clone() {
                    eprintln!("! {}", message);
                }
            }
        }
    }
}
