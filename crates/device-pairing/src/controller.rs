use crate::{PairingError, PairingResult};
use bridge_relay::BridgeApi;
use serde::Serialize;
use session_state::{NoticeWriter, SessionLifetime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The transient state of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingAttempt {
    #[serde(skip)]
    id: u64,
    pub phone_number: String,
    pub code: Option<String>,
    pub is_pending: bool,
}

impl PairingAttempt {
    fn new(id: u64, phone_number: String) -> Self {
        Self {
            id,
            phone_number,
            code: None,
            is_pending: true,
        }
    }
}

/// Requests pairing codes from the bridge for one tenant.
pub struct PairingController {
    api: Arc<dyn BridgeApi>,
    tenant_id: String,
    notice: NoticeWriter,
    lifetime: SessionLifetime,
    next_id: AtomicU64,
    attempt: watch::Sender<Option<PairingAttempt>>,
}

impl PairingController {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        tenant_id: impl Into<String>,
        notice: NoticeWriter,
        lifetime: SessionLifetime,
    ) -> Self {
        let (attempt, _) = watch::channel(None);
        Self {
            api,
            tenant_id: tenant_id.into(),
            notice,
            lifetime,
            next_id: AtomicU64::new(1),
            attempt,
        }
    }

    /// Current attempt, if any.
    pub fn attempt(&self) -> Option<PairingAttempt> {
        self.attempt.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<PairingAttempt>> {
        self.attempt.subscribe()
    }

    /// Submit `phone_number` and wait for the pairing code.
    ///
    /// Replaces any pending attempt. Failures are reported through the
    /// session notice; nothing is retried automatically.
    pub async fn request_pairing_code(&self, phone_number: &str) -> PairingResult<String> {
        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            self.notice.error(PairingError::EmptyPhoneNumber.to_string());
            return Err(PairingError::EmptyPhoneNumber);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if !self.lifetime.is_disposed() {
            self.attempt
                .send_replace(Some(PairingAttempt::new(id, phone_number.to_string())));
        }
        info!(tenant_id = %self.tenant_id, attempt = id, "Requesting pairing code");

        let result = self
            .api
            .request_pairing_code(&self.tenant_id, phone_number)
            .await;

        let code = result.as_ref().ok().cloned();
        if !self.finish(id, code) {
            debug!(attempt = id, "Dropping result of superseded pairing request");
            return Err(PairingError::Superseded);
        }

        match result {
            Ok(code) => {
                self.notice.clear();
                Ok(code)
            }
            Err(e) => {
                warn!(error = %e, "Pairing code request failed");
                self.notice
                    .error(format!("Could not get a pairing code: {}", e));
                Err(e.into())
            }
        }
    }

    /// Forget the current attempt; an in-flight request becomes superseded.
    pub fn clear(&self) {
        self.attempt.send_replace(None);
    }

    /// Settle attempt `id`. Returns false if it is no longer current.
    fn finish(&self, id: u64, code: Option<String>) -> bool {
        if self.lifetime.is_disposed() {
            return false;
        }
        let mut current = false;
        self.attempt.send_if_modified(|slot| match slot {
            Some(attempt) if attempt.id == id => {
                attempt.code = code;
                attempt.is_pending = false;
                current = true;
                true
            }
            _ => false,
        });
        current
    }
}

impl std::fmt::Debug for PairingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingController")
            .field("tenant_id", &self.tenant_id)
            .field("attempt", &*self.attempt.borrow())
            .finish_non_exhaustive()
    }
}
