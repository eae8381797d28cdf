//! The synchronization pipeline.

use crate::phase::PhaseTracker;
use crate::pins::{derive_pins, write_back_pins, PinWriteReport};
use crate::signal::BulkSyncSignal;
use crate::sort::sort_contacts;
use crate::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use contact_cache::ContactCache;
use contact_store_client::{ContactDocument, ContactStore};
use contact_types::{Contact, ContactBundle};
use session_state::{ContactsWriter, NoticeWriter, SessionLifetime, SyncPhase, SyncWriter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long a cached bundle may be used instead of a fresh fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct SyncReport {
    pub contacts: usize,
    pub pinned: usize,
    pub pin_writes: PinWriteReport,
    pub bulk_sync_started: bool,
    pub elapsed: Duration,
}

/// Fetches, repairs, sorts and caches one user's contacts.
///
/// Sole writer of the session's sync progress and contacts view.
pub struct SyncPipeline {
    user_id: String,
    tenant_id: String,
    store: Arc<dyn ContactStore>,
    cache: Arc<ContactCache>,
    signal: Option<Arc<dyn BulkSyncSignal>>,
    progress: SyncWriter,
    contacts: ContactsWriter,
    notice: NoticeWriter,
}

impl SyncPipeline {
    pub fn new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        store: Arc<dyn ContactStore>,
        cache: Arc<ContactCache>,
        progress: SyncWriter,
        contacts: ContactsWriter,
        notice: NoticeWriter,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            store,
            cache,
            signal: None,
            progress,
            contacts,
            notice,
        }
    }

    /// Signal sent once a run completes.
    pub fn with_bulk_sync_signal(mut self, signal: Arc<dyn BulkSyncSignal>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn lifetime(&self) -> &SessionLifetime {
        self.progress.lifetime()
    }

    /// Publish the cached bundle if it is fresh at `now`.
    ///
    /// Returns true when contacts were restored. Cache failures are logged
    /// and treated as a miss.
    pub async fn restore_from_cache(&self, policy: CachePolicy, now: DateTime<Utc>) -> bool {
        let cache = self.cache.clone();
        let user_id = self.user_id.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            cache.load_fresh(&user_id, policy.max_age, now)
        })
        .await;

        let bundle = match loaded {
            Ok(Ok(Some(bundle))) => bundle,
            Ok(Ok(None)) => {
                debug!(user_id = %self.user_id, "No fresh cached contacts");
                return false;
            }
            Ok(Err(e)) => {
                warn!(user_id = %self.user_id, error = %e, "Failed to read contact cache");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Cache read task failed");
                return false;
            }
        };

        info!(
            user_id = %self.user_id,
            contacts = bundle.len(),
            captured_at = %bundle.captured_at,
            "Restored contacts from cache"
        );
        self.contacts.replace(bundle.contacts);
        self.progress.update(|p| {
            p.contacts_fetched = true;
            p.cache_fresh = true;
        })
    }

    /// Run every phase once.
    ///
    /// On failure the phase becomes `error`, the contacts published so far
    /// are kept, and a retryable notice is raised.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();

        if self.lifetime().is_disposed() {
            return Err(SyncError::Disposed);
        }
        self.progress.update(|p| {
            p.phase = SyncPhase::Initializing;
            p.percent = 0;
            p.last_error = None;
        });
        info!(user_id = %self.user_id, tenant_id = %self.tenant_id, "Starting contact synchronization");

        match self.run_phases(&mut tracker, started).await {
            Ok(report) => {
                info!(
                    contacts = report.contacts,
                    pinned = report.pinned,
                    pin_writes_failed = report.pin_writes.attempted() - report.pin_writes.succeeded(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Contact synchronization complete"
                );
                Ok(report)
            }
            Err(SyncError::Disposed) => {
                debug!("Synchronization abandoned, session disposed");
                Err(SyncError::Disposed)
            }
            Err(e) => {
                let failed_in = tracker.phase();
                tracker.fail();
                error!(phase = %failed_in, error = %e, "Contact synchronization failed");

                let message = format!("Could not synchronize contacts: {}. Please retry.", e);
                self.progress.update(|p| {
                    p.phase = SyncPhase::Error;
                    p.last_error = Some(message.clone());
                });
                self.notice.error(message);
                Err(e)
            }
        }
    }

    async fn run_phases(&self, tracker: &mut PhaseTracker, started: Instant) -> SyncResult<SyncReport> {
        self.enter(tracker, SyncPhase::FetchingContacts, 10)?;
        let documents = self.store.fetch_contacts(&self.tenant_id).await?;
        let mut contacts = self.parse_contacts(documents)?;
        self.contacts.replace(contacts.clone());

        self.enter(tracker, SyncPhase::ProcessingPinned, 50)?;
        let markers = self.store.fetch_pin_markers(&self.user_id).await?;
        debug!(markers = markers.len(), "Fetched pin markers");

        self.enter(tracker, SyncPhase::UpdatingPins, 60)?;
        let repairs = derive_pins(&mut contacts, &markers);
        let pin_writes = write_back_pins(self.store.as_ref(), &self.tenant_id, repairs).await;
        self.progress.update(|p| p.percent = 75);

        self.enter(tracker, SyncPhase::SortingContacts, 80)?;
        let contacts = sort_contacts(contacts);
        let pinned = contacts.iter().filter(|c| c.pinned).count();
        self.contacts.replace(contacts.clone());

        self.enter(tracker, SyncPhase::Caching, 90)?;
        let total = contacts.len();
        self.write_cache(ContactBundle::capture(contacts)).await?;
        self.progress.update(|p| {
            p.contacts_fetched = true;
            p.cache_fresh = true;
        });

        self.enter(tracker, SyncPhase::Complete, 100)?;
        let bulk_sync_started = self.start_bulk_sync().await;
        self.notice.clear();

        Ok(SyncReport {
            contacts: total,
            pinned,
            pin_writes,
            bulk_sync_started,
            elapsed: started.elapsed(),
        })
    }

    fn enter(&self, tracker: &mut PhaseTracker, phase: SyncPhase, percent: u8) -> SyncResult<()> {
        if self.lifetime().is_disposed() {
            return Err(SyncError::Disposed);
        }
        tracker.advance_to(phase)?;
        debug!(%phase, percent, "Sync phase");
        self.progress.update(|p| {
            p.phase = phase;
            p.percent = percent;
        });
        Ok(())
    }

    /// Parse documents in fetch order, reporting progress from 10 to 50%.
    ///
    /// On the first malformed record the records parsed so far are
    /// published and the run fails.
    fn parse_contacts(&self, documents: Vec<ContactDocument>) -> SyncResult<Vec<Contact>> {
        let total = documents.len();
        let mut contacts = Vec::with_capacity(total);

        for (index, document) in documents.into_iter().enumerate() {
            let id = document
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            match Contact::from_document(document) {
                Ok(contact) => contacts.push(contact),
                Err(source) => {
                    warn!(index, id = ?id, error = %source, "Malformed contact record");
                    self.contacts.replace(contacts);
                    return Err(SyncError::MalformedDocument { index, id, source });
                }
            }

            let percent = 10 + (40 * (index + 1) / total) as u8;
            self.progress.update(|p| p.percent = percent);
        }

        debug!(contacts = contacts.len(), "Fetched contacts");
        Ok(contacts)
    }

    async fn write_cache(&self, bundle: ContactBundle) -> SyncResult<()> {
        let cache = self.cache.clone();
        let user_id = self.user_id.clone();
        tokio::task::spawn_blocking(move || cache.store(&user_id, &bundle))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;
        Ok(())
    }

    async fn start_bulk_sync(&self) -> bool {
        let Some(signal) = &self.signal else {
            return false;
        };
        match signal.start_bulk_sync().await {
            Ok(()) => {
                debug!("Bulk chat synchronization requested");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to request bulk chat synchronization");
                false
            }
        }
    }
}

impl std::fmt::Debug for SyncPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPipeline")
            .field("user_id", &self.user_id)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}
