//! Supervised connection to the bridge with bounded automatic reconnect.

use crate::api::BridgeApi;
use crate::connector::{BridgeChannel, BridgeConnector};
use crate::lifecycle::{ConnectionLifecycle, LifecycleEvent, StatusSource};
use crate::messages::{BridgeStatus, InboundFrame, OutboundFrame, StatusReport};
use crate::{RelayError, RelayResult};
use session_state::{ConnectionWriter, NoticeWriter, SessionLifetime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures tolerated before the error becomes terminal.
    pub max_attempts: u32,
    /// Delay before each automatic reconnect.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Channel configuration for one (user, tenant) pair.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bridge WebSocket URL (e.g., wss://bridge.example.com/ws).
    pub ws_url: String,
    pub user_id: String,
    pub tenant_id: String,
    pub retry: RetryPolicy,
}

impl ChannelConfig {
    /// Channel URL with the user and tenant as query parameters.
    pub fn endpoint(&self) -> RelayResult<String> {
        let url = Url::parse_with_params(
            &self.ws_url,
            &[
                ("userId", self.user_id.as_str()),
                ("tenantId", self.tenant_id.as_str()),
            ],
        )?;
        Ok(url.into())
    }
}

enum Command {
    Reconnect,
    Close,
    Send(OutboundFrame, oneshot::Sender<RelayResult<()>>),
    Seed(StatusReport),
}

/// Why a connection attempt ended.
enum SessionEnd {
    Failed(String),
    Reconnect,
    Shutdown,
}

/// Builds and starts the connection supervisor.
pub struct ConnectionManager {
    config: ChannelConfig,
    connector: Arc<dyn BridgeConnector>,
    writer: ConnectionWriter,
    api: Option<Arc<dyn BridgeApi>>,
    notice: Option<NoticeWriter>,
}

impl ConnectionManager {
    pub fn new(
        config: ChannelConfig,
        connector: Arc<dyn BridgeConnector>,
        writer: ConnectionWriter,
    ) -> Self {
        Self {
            config,
            connector,
            writer,
            api: None,
            notice: None,
        }
    }

    /// Seed the initial status from a one-shot probe.
    pub fn with_status_probe(mut self, api: Arc<dyn BridgeApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Report terminal failures as a user-visible notice.
    pub fn with_notice(mut self, notice: NoticeWriter) -> Self {
        self.notice = Some(notice);
        self
    }

    /// Open the channel and supervise it until closed or disposed.
    pub fn start(self) -> RelayResult<ConnectionHandle> {
        let endpoint = self.config.endpoint()?;
        let lifetime = self.writer.lifetime().clone();
        let (commands_tx, commands_rx) = mpsc::channel(32);

        if let Some(api) = self.api {
            spawn_status_probe(
                api,
                self.config.tenant_id.clone(),
                lifetime.clone(),
                commands_tx.clone(),
            );
        }

        let supervisor = Supervisor {
            endpoint,
            retry_delay: self.config.retry.delay,
            lifecycle: ConnectionLifecycle::new(self.config.retry.max_attempts),
            connector: self.connector,
            writer: self.writer,
            notice: self.notice,
            commands: commands_rx,
            lifetime,
        };
        let task = tokio::spawn(supervisor.run());

        Ok(ConnectionHandle {
            commands: commands_tx,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }
}

fn spawn_status_probe(
    api: Arc<dyn BridgeApi>,
    tenant_id: String,
    lifetime: SessionLifetime,
    commands: mpsc::Sender<Command>,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = lifetime.disposed() => {}
            result = api.probe_status(&tenant_id) => match result {
                Ok(report) => {
                    debug!(status = report.status.as_str(), "Status probe answered");
                    let _ = commands.send(Command::Seed(report)).await;
                }
                Err(e) => warn!(error = %e, "Status probe failed"),
            }
        }
    });
}

/// Control handle for a running connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConnectionHandle {
    /// Drop the current channel, restore the retry budget and connect again.
    pub async fn reconnect(&self) -> RelayResult<()> {
        self.commands
            .send(Command::Reconnect)
            .await
            .map_err(|_| RelayError::Stopped)
    }

    /// Send a frame on the open channel.
    pub async fn send(&self, frame: OutboundFrame) -> RelayResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Send(frame, reply_tx))
            .await
            .map_err(|_| RelayError::Stopped)?;
        reply_rx.await.map_err(|_| RelayError::Stopped)?
    }

    /// Close the channel and wait for the supervisor to stop. No reconnect
    /// happens afterwards. Idempotent.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Connection supervisor panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

struct Supervisor {
    endpoint: String,
    retry_delay: Duration,
    lifecycle: ConnectionLifecycle,
    connector: Arc<dyn BridgeConnector>,
    writer: ConnectionWriter,
    notice: Option<NoticeWriter>,
    commands: mpsc::Receiver<Command>,
    lifetime: SessionLifetime,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            self.apply(LifecycleEvent::Open);

            let reason = match self.connect_and_serve().await {
                SessionEnd::Shutdown => break,
                SessionEnd::Reconnect => {
                    self.restart();
                    continue;
                }
                SessionEnd::Failed(reason) => reason,
            };

            warn!(%reason, "Bridge connection failed");

            let next = if self.lifecycle.spend_retry() {
                self.apply(LifecycleEvent::Failed(reason));
                info!(
                    delay_ms = self.retry_delay.as_millis() as u64,
                    retries_remaining = self.lifecycle.snapshot().retries_remaining,
                    "Scheduling reconnect"
                );
                self.idle(Some(self.retry_delay)).await
            } else {
                let message = format!(
                    "Unable to connect to the messaging bridge after {} attempts: {}",
                    self.lifecycle.retry_budget(),
                    reason
                );
                error!("{}", message);
                self.apply(LifecycleEvent::Exhausted(message.clone()));
                if let Some(notice) = &self.notice {
                    notice.error(message);
                }
                self.idle(None).await
            };

            match next {
                None => {}
                Some(SessionEnd::Reconnect) => self.restart(),
                Some(_) => break,
            }
        }

        self.apply(LifecycleEvent::Close);
        info!("Connection supervisor stopped");
    }

    /// Manual reconnect: start over with a full budget.
    fn restart(&mut self) {
        info!("Reconnecting to bridge");
        self.apply(LifecycleEvent::Close);
        self.lifecycle.reset_budget();
        self.publish();
    }

    async fn connect_and_serve(&mut self) -> SessionEnd {
        let lifetime = self.lifetime.clone();
        let connector = self.connector.clone();
        let endpoint = self.endpoint.clone();
        let connect = async move { connector.connect(&endpoint).await };
        tokio::pin!(connect);

        let mut channel = loop {
            tokio::select! {
                _ = lifetime.disposed() => return SessionEnd::Shutdown,
                result = &mut connect => match result {
                    Ok(channel) => break channel,
                    Err(e) => return SessionEnd::Failed(e.to_string()),
                },
                command = self.commands.recv() => {
                    if let Some(end) = self.on_idle_command(command) {
                        return end;
                    }
                }
            }
        };

        info!("Bridge channel open");

        loop {
            tokio::select! {
                _ = lifetime.disposed() => {
                    channel.close().await;
                    return SessionEnd::Shutdown;
                }
                frame = channel.inbound.recv() => match frame {
                    Some(Ok(text)) => {
                        if let Some(end) = self.on_frame(&text) {
                            channel.close().await;
                            return end;
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Failed(e.to_string()),
                    None => return SessionEnd::Failed("bridge closed the channel".to_string()),
                },
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => {
                        channel.close().await;
                        return SessionEnd::Shutdown;
                    }
                    Some(Command::Reconnect) => {
                        channel.close().await;
                        return SessionEnd::Reconnect;
                    }
                    Some(Command::Send(frame, reply)) => {
                        let _ = reply.send(send_frame(&channel, frame).await);
                    }
                    Some(Command::Seed(report)) => self.seed(report),
                }
            }
        }
    }

    /// Wait out a retry delay (or forever when `delay` is `None`).
    /// Returns `None` when the delay elapsed.
    async fn idle(&mut self, delay: Option<Duration>) -> Option<SessionEnd> {
        let lifetime = self.lifetime.clone();
        let timer = async move {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = lifetime.disposed() => return Some(SessionEnd::Shutdown),
                _ = &mut timer => return None,
                command = self.commands.recv() => {
                    if let Some(end) = self.on_idle_command(command) {
                        return Some(end);
                    }
                }
            }
        }
    }

    /// Handle a command while no channel is open.
    fn on_idle_command(&mut self, command: Option<Command>) -> Option<SessionEnd> {
        match command {
            None | Some(Command::Close) => Some(SessionEnd::Shutdown),
            Some(Command::Reconnect) => Some(SessionEnd::Reconnect),
            Some(Command::Send(_, reply)) => {
                let _ = reply.send(Err(RelayError::NotConnected));
                None
            }
            Some(Command::Seed(report)) => {
                self.seed(report);
                None
            }
        }
    }

    fn on_frame(&mut self, text: &str) -> Option<SessionEnd> {
        match InboundFrame::from_json(text) {
            Ok(InboundFrame::AuthStatus { status, qr_code }) => match status {
                BridgeStatus::Error | BridgeStatus::Disconnected => Some(SessionEnd::Failed(
                    format!("bridge reported status {}", status.as_str()),
                )),
                BridgeStatus::Unknown => {
                    debug!("Ignoring unknown bridge status");
                    None
                }
                _ => {
                    info!(status = status.as_str(), "Bridge status");
                    self.apply(LifecycleEvent::Status {
                        status,
                        qr_code,
                        source: StatusSource::Live,
                    });
                    if self.lifecycle.status().is_linked() {
                        if let Some(notice) = &self.notice {
                            notice.clear();
                        }
                    }
                    None
                }
            },
            Ok(InboundFrame::Other) => {
                debug!("Ignoring bridge frame");
                None
            }
            Err(e) => {
                warn!(error = %e, "Malformed frame from bridge");
                Some(SessionEnd::Failed(RelayError::MalformedFrame(e.to_string()).to_string()))
            }
        }
    }

    fn seed(&mut self, report: StatusReport) {
        if self.lifecycle.live_event_seen() {
            debug!("Discarding status probe, live status already known");
            return;
        }
        self.apply(LifecycleEvent::Status {
            status: report.status,
            qr_code: report.qr_code,
            source: StatusSource::Probe,
        });
    }

    fn apply(&mut self, event: LifecycleEvent) {
        if self.lifecycle.apply(event) {
            let snapshot = self.lifecycle.snapshot();
            debug!(
                status = %snapshot.status,
                retries_remaining = snapshot.retries_remaining,
                should_sync = snapshot.should_sync,
                "Connection state changed"
            );
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.lifecycle.snapshot().clone();
        self.writer.update(|current| *current = snapshot);
    }
}

async fn send_frame(channel: &BridgeChannel, frame: OutboundFrame) -> RelayResult<()> {
    let text = frame.to_json()?;
    channel.send(text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use session_state::{ConnectionStatus, SessionState};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    enum Plan {
        Accept,
        Refuse,
    }

    /// Remote end of an accepted test channel.
    struct Peer {
        inbound: mpsc::Sender<RelayResult<String>>,
        outbound: mpsc::Receiver<String>,
    }

    impl Peer {
        async fn push(&self, text: &str) {
            self.inbound.send(Ok(text.to_string())).await.unwrap();
        }
    }

    struct ScriptedConnector {
        attempts: AtomicU32,
        plans: StdMutex<VecDeque<Plan>>,
        peers: mpsc::UnboundedSender<Peer>,
    }

    impl ScriptedConnector {
        fn new(plans: Vec<Plan>) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
            let (peers, peers_rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                attempts: AtomicU32::new(0),
                plans: StdMutex::new(plans.into()),
                peers,
            });
            (connector, peers_rx)
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BridgeConnector for ScriptedConnector {
        async fn connect(&self, endpoint: &str) -> RelayResult<BridgeChannel> {
            assert!(endpoint.contains("tenantId=t1"));
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let plan = self.plans.lock().unwrap().pop_front().unwrap_or(Plan::Refuse);
            match plan {
                Plan::Refuse => Err(RelayError::Connection("connection refused".to_string())),
                Plan::Accept => {
                    let (inbound_tx, inbound_rx) = mpsc::channel(16);
                    let (outbound_tx, outbound_rx) = mpsc::channel(16);
                    let _ = self.peers.send(Peer {
                        inbound: inbound_tx,
                        outbound: outbound_rx,
                    });
                    Ok(BridgeChannel::new(inbound_rx, outbound_tx))
                }
            }
        }
    }

    struct FixedProbe(StatusReport);

    #[async_trait]
    impl BridgeApi for FixedProbe {
        async fn probe_status(&self, _tenant_id: &str) -> RelayResult<StatusReport> {
            Ok(self.0.clone())
        }

        async fn request_pairing_code(&self, _: &str, _: &str) -> RelayResult<String> {
            Err(RelayError::NotConnected)
        }
    }

    fn config() -> ChannelConfig {
        ChannelConfig {
            ws_url: "ws://bridge.test/ws".to_string(),
            user_id: "u1".to_string(),
            tenant_id: "t1".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    async fn wait_for_attempts(connector: &ScriptedConnector, attempts: u32) {
        for _ in 0..600 {
            if connector.attempts() >= attempts {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected {} attempts, saw {}", attempts, connector.attempts());
    }

    #[test]
    fn test_endpoint_carries_user_and_tenant() {
        let endpoint = config().endpoint().unwrap();
        assert_eq!(endpoint, "ws://bridge.test/ws?userId=u1&tenantId=t1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_then_ready() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let peer = peers.recv().await.unwrap();
        let mut rx = state.watch_connection();

        peer.push(r#"{"type":"auth_status","status":"qr","qrCode":"2@abc"}"#)
            .await;
        rx.wait_for(|s| s.status == ConnectionStatus::Qr).await.unwrap();
        assert_eq!(state.connection().qr_code.as_deref(), Some("2@abc"));
        assert!(!state.connection().should_sync);

        peer.push(r#"{"type":"auth_status","status":"ready"}"#).await;
        rx.wait_for(|s| s.status == ConnectionStatus::Ready).await.unwrap();
        let snapshot = state.connection();
        assert!(snapshot.should_sync);
        assert_eq!(snapshot.qr_code, None);
        assert_eq!(snapshot.retries_remaining, 3);

        handle.close().await;
        assert_eq!(state.connection().status, ConnectionStatus::Disconnected);
        assert!(!handle.is_running());
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_become_terminal() {
        let (state, writers) = SessionState::new(3);
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let _handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .with_notice(writers.notice)
            .start()
            .unwrap();

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Error && s.retries_remaining == 0)
            .await
            .unwrap();

        assert_eq!(connector.attempts(), 3);
        let snapshot = state.connection();
        assert!(snapshot
            .last_error
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert!(state.notice().is_some());

        // No further timer is scheduled.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reconnect_restores_budget() {
        let (state, writers) = SessionState::new(3);
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.retries_remaining == 0).await.unwrap();
        assert_eq!(connector.attempts(), 3);

        handle.reconnect().await.unwrap();
        wait_for_attempts(&connector, 6).await;
        rx.wait_for(|s| s.status == ConnectionStatus::Error && s.retries_remaining == 0)
            .await
            .unwrap();
        assert_eq!(connector.attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_error_triggers_retry() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept, Plan::Accept]);
        let _handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let first = peers.recv().await.unwrap();
        first
            .push(r#"{"type":"auth_status","status":"error"}"#)
            .await;

        let second = peers.recv().await.unwrap();
        assert_eq!(connector.attempts(), 2);
        second
            .push(r#"{"type":"auth_status","status":"authenticated"}"#)
            .await;

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Authenticated)
            .await
            .unwrap();
        assert_eq!(state.connection().retries_remaining, 3);
        assert_eq!(state.connection().last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_ends_channel() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let _handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let peer = peers.recv().await.unwrap();
        peer.push("{not json").await;

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Error).await.unwrap();
        assert!(state
            .connection()
            .last_error
            .as_deref()
            .unwrap()
            .contains("Malformed frame"));
        wait_for_attempts(&connector, 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_frames_are_ignored() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let peer = peers.recv().await.unwrap();
        peer.push(r#"{"type":"chat_update","chatId":"1"}"#).await;
        peer.push(r#"{"type":"auth_status","status":"qr","qrCode":"x"}"#)
            .await;

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Qr).await.unwrap();
        assert_eq!(connector.attempts(), 1);
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_reaches_bridge() {
        let (_state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let handle = ConnectionManager::new(config(), connector, writers.connection)
            .start()
            .unwrap();

        let mut peer = peers.recv().await.unwrap();
        handle.send(OutboundFrame::FetchChats).await.unwrap();
        assert_eq!(
            peer.outbound.recv().await.as_deref(),
            Some(r#"{"action":"fetch_chats"}"#)
        );

        handle.close().await;
        assert!(matches!(
            handle.send(OutboundFrame::FetchChats).await,
            Err(RelayError::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_without_channel_is_not_connected() {
        let (state, writers) = SessionState::new(3);
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let handle = ConnectionManager::new(config(), connector, writers.connection)
            .start()
            .unwrap();

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.retries_remaining == 0).await.unwrap();
        assert!(matches!(
            handle.send(OutboundFrame::FetchChats).await,
            Err(RelayError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_seeds_initial_status() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let probe = Arc::new(FixedProbe(StatusReport {
            status: BridgeStatus::Qr,
            qr_code: Some("seeded".to_string()),
        }));
        let _handle = ConnectionManager::new(config(), connector, writers.connection)
            .with_status_probe(probe)
            .start()
            .unwrap();

        let _peer = peers.recv().await.unwrap();
        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Qr).await.unwrap();
        assert_eq!(state.connection().qr_code.as_deref(), Some("seeded"));
        assert!(!state.connection().should_sync);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnect_or_writes_after_disposal() {
        let (state, writers) = SessionState::new(3);
        let (connector, mut peers) = ScriptedConnector::new(vec![Plan::Accept]);
        let _handle = ConnectionManager::new(config(), connector.clone(), writers.connection)
            .start()
            .unwrap();

        let peer = peers.recv().await.unwrap();
        drop(peer);

        let mut rx = state.watch_connection();
        rx.wait_for(|s| s.status == ConnectionStatus::Error).await.unwrap();
        let before = state.connection();

        // Dispose while the reconnect timer is pending.
        state.lifetime().dispose();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(state.connection(), before);
    }
}
