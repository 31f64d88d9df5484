use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::info;

use shared::{
    domain::{ObjectId, TxDigest},
    error::{ErrorRecord, QueryError, TransactionError},
    protocol::{BookmarkRecord, ObjectEnvelope, ProgrammableCall, TransactionEffects},
};

pub mod config;
mod fetcher;
mod orchestrator;
mod ref_store;

pub use config::{load_settings, Settings};
pub use fetcher::{FetchState, StateFetcher};
pub use orchestrator::{TransactionLifecycle, TxOrchestrator, TxStateView};
pub use ref_store::{DetachedShareLocation, MemoryShareLocation, RefStore, ShareLocation};

/// Read access to the ledger's object store.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Fetch an object's payload. `Ok(None)` means the node answered and the
    /// object does not exist; errors are reserved for transport and
    /// malformed-response failures.
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectEnvelope>, QueryError>;
}

pub struct MissingLedgerQuery;

#[async_trait]
impl LedgerQuery for MissingLedgerQuery {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectEnvelope>, QueryError> {
        Err(QueryError::Transport(format!(
            "ledger query backend is unavailable for object {id}"
        )))
    }
}

/// Signing and execution service for submitted operations.
#[async_trait]
pub trait LedgerExecutor: Send + Sync {
    /// Sign and submit a call; resolves with the digest once the operation
    /// is accepted for execution.
    async fn sign_and_execute(&self, call: ProgrammableCall) -> anyhow::Result<TxDigest>;
    /// Wait until the operation's effects are observable.
    async fn wait_for_transaction(&self, digest: &TxDigest) -> anyhow::Result<TransactionEffects>;
}

pub struct MissingLedgerExecutor;

#[async_trait]
impl LedgerExecutor for MissingLedgerExecutor {
    async fn sign_and_execute(&self, call: ProgrammableCall) -> anyhow::Result<TxDigest> {
        Err(anyhow::anyhow!(
            "transaction executor is unavailable for {}",
            call.target
        ))
    }

    async fn wait_for_transaction(&self, digest: &TxDigest) -> anyhow::Result<TransactionEffects> {
        Err(anyhow::anyhow!(
            "transaction executor is unavailable for digest {digest}"
        ))
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    ReferenceChanged(Option<ObjectId>),
    RecordUpdated(Option<BookmarkRecord>),
    LifecycleChanged(TransactionLifecycle),
}

/// One consistent view of the controller for a presentation layer.
#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    pub data: Option<BookmarkRecord>,
    pub object_id: Option<ObjectId>,
    pub lifecycle: TransactionLifecycle,
    pub digest: Option<TxDigest>,
    pub is_loading: bool,
    pub is_pending: bool,
    pub is_confirmed: bool,
    pub error: Option<ErrorRecord>,
    pub is_owner: bool,
    pub object_exists: bool,
    pub has_valid_data: bool,
}

/// Composes the reference store, the record fetcher and the transaction
/// orchestrator over caller-supplied ledger backends. Each instance owns its
/// binding and its in-flight operation outright, so independent instances
/// (one per tab, one per account) coexist without cross-talk.
pub struct BookmarkController {
    settings: Settings,
    refs: Arc<RefStore>,
    fetcher: Arc<StateFetcher>,
    orchestrator: Arc<TxOrchestrator>,
    events: broadcast::Sender<ControllerEvent>,
    refetch_task: JoinHandle<()>,
}

impl BookmarkController {
    pub fn new(
        settings: Settings,
        query: Arc<dyn LedgerQuery>,
        executor: Arc<dyn LedgerExecutor>,
        share: Arc<dyn ShareLocation>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let refs = Arc::new(RefStore::new(share));
        let fetcher = Arc::new(StateFetcher::new(query, Arc::clone(&refs), events.clone()));
        let orchestrator = Arc::new(TxOrchestrator::new(
            executor,
            Arc::clone(&refs),
            Arc::clone(&fetcher),
            settings.package_id.clone(),
            events.clone(),
        ));

        // The fetch follows the binding: every change, including the one
        // recovered at startup, triggers a refresh; an absent binding
        // disables the query.
        let refetch_task = {
            let fetcher = Arc::clone(&fetcher);
            let mut bindings = WatchStream::new(refs.subscribe());
            tokio::spawn(async move {
                while let Some(binding) = bindings.next().await {
                    if let Some(object_id) = &binding {
                        info!(object_id = %object_id, "bound object changed; refreshing record");
                    }
                    fetcher.refetch().await;
                }
            })
        };

        Arc::new(Self {
            settings,
            refs,
            fetcher,
            orchestrator,
            events,
            refetch_task,
        })
    }

    /// Controller with no ledger backends attached: every action fails with
    /// a clear message until a wallet/node connection supplies real ones,
    /// and the binding lives in-memory only.
    pub fn detached(settings: Settings) -> Arc<Self> {
        Self::new(
            settings,
            Arc::new(MissingLedgerQuery),
            Arc::new(MissingLedgerExecutor),
            Arc::new(DetachedShareLocation),
        )
    }

    pub async fn create_object(&self) -> Result<(), TransactionError> {
        self.orchestrator.create_object().await
    }

    pub async fn add_bookmark(&self) -> Result<(), TransactionError> {
        self.orchestrator.add_bookmark().await
    }

    pub async fn remove_bookmark(&self) -> Result<(), TransactionError> {
        self.orchestrator.remove_bookmark().await
    }

    pub async fn clear_object(&self) {
        self.orchestrator.clear_object().await;
    }

    /// Bind to an existing object, e.g. one received through a shared link.
    pub fn bind_object(&self, object_id: ObjectId) {
        self.refs.set(object_id);
    }

    pub async fn refresh(&self) {
        self.fetcher.refetch().await;
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        self.refs.get()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let fetch = self.fetcher.state().await;
        let tx = self.orchestrator.state().await;
        let object_id = self.refs.get();

        let in_flight = matches!(
            tx.lifecycle,
            TransactionLifecycle::Submitting | TransactionLifecycle::AwaitingEffects
        );
        let is_pending = matches!(tx.lifecycle, TransactionLifecycle::Submitting);
        let is_owner = match (&self.settings.account_address, &fetch.record) {
            (Some(address), Some(record)) => record.owner.matches_ignore_case(address),
            _ => false,
        };
        // Fetch errors win the display slot by convention; the transaction
        // error stays observable through the lifecycle.
        let error = fetch
            .error
            .clone()
            .map(ErrorRecord::Fetch)
            .or_else(|| tx.error.clone().map(ErrorRecord::Transaction));

        ControllerSnapshot {
            has_valid_data: fetch.record.is_some(),
            is_loading: (in_flight && object_id.is_none()) || is_pending || fetch.is_loading,
            is_pending,
            is_confirmed: tx.digest.is_some() && !in_flight,
            data: fetch.record,
            object_id,
            lifecycle: tx.lifecycle,
            digest: tx.digest,
            error,
            is_owner,
            object_exists: fetch.object_exists,
        }
    }
}

impl Drop for BookmarkController {
    fn drop(&mut self) {
        self.refetch_task.abort();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
