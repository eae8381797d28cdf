//! One bootstrap session: from sign-in to the main application.

use crate::error::{BootstrapError, BootstrapResult};
use crate::gate::{GateConfig, GateHandle, ReadinessGate};
use crate::navigator::{Navigator, Route};
use bridge_relay::{
    BridgeApi, BridgeConnector, ChannelConfig, ConnectionHandle, ConnectionManager, RetryPolicy,
};
use chrono::Utc;
use contact_cache::ContactCache;
use contact_store_client::ContactStore;
use contact_sync_pipeline::{CachePolicy, SyncPipeline, SyncSupervisor};
use device_pairing::PairingController;
use session_state::SessionState;
use std::sync::Arc;
use tracing::{info, warn};

/// Who is bootstrapping and how.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub user_id: String,
    pub tenant_id: String,
    /// Bridge WebSocket URL.
    pub bridge_ws_url: String,
    pub retry: RetryPolicy,
    pub cache: CachePolicy,
    pub gate: GateConfig,
}

/// External services the session talks to.
#[derive(Clone)]
pub struct BootstrapDeps {
    pub store: Arc<dyn ContactStore>,
    pub cache: Arc<ContactCache>,
    pub connector: Arc<dyn BridgeConnector>,
    pub bridge_api: Arc<dyn BridgeApi>,
    pub navigator: Arc<dyn Navigator>,
}

/// Running bootstrap: connection manager, sync supervisor, readiness gate
/// and pairing controller over one shared [`SessionState`].
pub struct BootstrapSession {
    state: SessionState,
    connection: ConnectionHandle,
    sync: SyncSupervisor,
    gate: GateHandle,
    pairing: PairingController,
    navigator: Arc<dyn Navigator>,
}

impl BootstrapSession {
    /// Start every component.
    ///
    /// A missing user or tenant is an authorization failure: the session
    /// navigates to [`Route::Login`] and nothing is started.
    pub async fn start(config: BootstrapConfig, deps: BootstrapDeps) -> BootstrapResult<Self> {
        if let Err(e) = check_linkage(&config) {
            warn!(error = %e, "Bootstrap refused");
            deps.navigator.navigate(Route::Login);
            return Err(e);
        }

        info!(user_id = %config.user_id, tenant_id = %config.tenant_id, "Starting bootstrap");
        let (state, writers) = SessionState::new(config.retry.max_attempts);

        let channel = ChannelConfig {
            ws_url: config.bridge_ws_url.clone(),
            user_id: config.user_id.clone(),
            tenant_id: config.tenant_id.clone(),
            retry: config.retry,
        };
        let connection = ConnectionManager::new(channel, deps.connector, writers.connection)
            .with_status_probe(deps.bridge_api.clone())
            .with_notice(writers.notice.clone())
            .start()?;

        let pipeline = SyncPipeline::new(
            config.user_id.clone(),
            config.tenant_id.clone(),
            deps.store,
            deps.cache,
            writers.sync,
            writers.contacts,
            writers.notice.clone(),
        )
        .with_bulk_sync_signal(Arc::new(connection.clone()));

        if pipeline.restore_from_cache(config.cache, Utc::now()).await {
            info!("Showing cached contacts while the bridge connects");
        }
        writers.loading.set(false);

        let sync = SyncSupervisor::spawn(pipeline, state.watch_connection());
        let gate = ReadinessGate::spawn(&state, deps.navigator.clone(), config.gate);
        let pairing = PairingController::new(
            deps.bridge_api,
            config.tenant_id,
            writers.notice,
            state.lifetime().clone(),
        );

        Ok(Self {
            state,
            connection,
            sync,
            gate,
            pairing,
            navigator: deps.navigator,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn sync(&self) -> &SyncSupervisor {
        &self.sync
    }

    pub fn gate(&self) -> &GateHandle {
        &self.gate
    }

    pub fn pairing(&self) -> &PairingController {
        &self.pairing
    }

    /// Close the channel, drop the pairing attempt, stop every task and
    /// return to the login route.
    pub async fn logout(&self) {
        info!("Logging out");
        self.connection.close().await;
        self.pairing.clear();
        self.dispose().await;
        self.navigator.navigate(Route::Login);
    }

    /// Stop every task. State writes after this point are dropped.
    /// Idempotent.
    pub async fn dispose(&self) {
        self.state.lifetime().dispose();
        self.connection.close().await;
        self.sync.shutdown().await;
        self.gate.shutdown().await;
    }
}

impl std::fmt::Debug for BootstrapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSession")
            .field("connection", &self.state.connection().status)
            .field("sync", &self.state.sync().phase)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

fn check_linkage(config: &BootstrapConfig) -> BootstrapResult<()> {
    if config.user_id.trim().is_empty() {
        return Err(BootstrapError::Unauthorized("no signed-in user".to_string()));
    }
    if config.tenant_id.trim().is_empty() {
        return Err(BootstrapError::Unauthorized(
            "user is not linked to a tenant".to_string(),
        ));
    }
    Ok(())
}
