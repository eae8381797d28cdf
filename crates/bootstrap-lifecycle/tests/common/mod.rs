//! Test doubles for the bridge service.

#![allow(dead_code)]

use async_trait::async_trait;
use bootstrap_lifecycle::{BootstrapConfig, BootstrapDeps, ChannelNavigator, GateConfig, Route};
use bridge_relay::{
    BridgeApi, BridgeChannel, BridgeConnector, RelayError, RelayResult, RetryPolicy, StatusReport,
};
use contact_cache::{ContactCache, MemoryCacheStorage};
use contact_store_client::MemoryContactStore;
use contact_sync_pipeline::CachePolicy;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bridge side of one accepted channel.
pub struct Peer {
    pub inbound: mpsc::Sender<RelayResult<String>>,
    pub outbound: mpsc::Receiver<String>,
}

impl Peer {
    pub async fn status(&self, status: &str) {
        let frame = format!(r#"{{"type":"auth_status","status":"{}"}}"#, status);
        self.inbound.send(Ok(frame)).await.unwrap();
    }

    pub async fn qr(&self, code: &str) {
        let frame = format!(
            r#"{{"type":"auth_status","status":"qr","qrCode":"{}"}}"#,
            code
        );
        self.inbound.send(Ok(frame)).await.unwrap();
    }
}

pub struct FakeBridge {
    attempts: AtomicU32,
    refuse: AtomicBool,
    peers: mpsc::UnboundedSender<Peer>,
}

impl FakeBridge {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(Self {
            attempts: AtomicU32::new(0),
            refuse: AtomicBool::new(false),
            peers,
        });
        (bridge, peers_rx)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl BridgeConnector for FakeBridge {
    async fn connect(&self, _endpoint: &str) -> RelayResult<BridgeChannel> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RelayError::Connection("connection refused".to_string()));
        }
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let _ = self.peers.send(Peer {
            inbound: inbound_tx,
            outbound: outbound_rx,
        });
        Ok(BridgeChannel::new(inbound_rx, outbound_tx))
    }
}

#[async_trait]
impl BridgeApi for FakeBridge {
    async fn probe_status(&self, _tenant_id: &str) -> RelayResult<StatusReport> {
        Err(RelayError::Bridge {
            status: 503,
            message: "probe unavailable".to_string(),
        })
    }

    async fn request_pairing_code(&self, _tenant_id: &str, _phone: &str) -> RelayResult<String> {
        Ok("4821-7730".to_string())
    }
}

pub struct Harness {
    pub bridge: Arc<FakeBridge>,
    pub peers: mpsc::UnboundedReceiver<Peer>,
    pub store: Arc<MemoryContactStore>,
    pub cache: Arc<ContactCache>,
    pub routes: mpsc::UnboundedReceiver<Route>,
    pub deps: BootstrapDeps,
}

impl Harness {
    pub fn new() -> Self {
        let (bridge, peers) = FakeBridge::new();
        let store = Arc::new(MemoryContactStore::new());
        let cache = Arc::new(ContactCache::new(Box::new(MemoryCacheStorage::new())));
        let (navigator, routes) = ChannelNavigator::new();

        let deps = BootstrapDeps {
            store: store.clone(),
            cache: cache.clone(),
            connector: bridge.clone(),
            bridge_api: bridge.clone(),
            navigator: Arc::new(navigator),
        };

        Self {
            bridge,
            peers,
            store,
            cache,
            routes,
            deps,
        }
    }
}

pub fn config(user_id: &str, tenant_id: &str) -> BootstrapConfig {
    BootstrapConfig {
        user_id: user_id.to_string(),
        tenant_id: tenant_id.to_string(),
        bridge_ws_url: "ws://bridge.test/ws".to_string(),
        retry: RetryPolicy::default(),
        cache: CachePolicy {
            max_age: Duration::from_secs(300),
        },
        gate: GateConfig::default(),
    }
}

pub fn contact_doc(id: &str, epoch: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "chatId": format!("chat-{}", id),
        "lastMessage": { "text": "hi", "timestamp": epoch }
    })
}
