//! Transaction submission and the confirmation state machine.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use shared::{
    domain::TxDigest,
    error::TransactionError,
    protocol::{
        call_target, CallArg, ExecutionStatus, ProgrammableCall, METHOD_ADD_BOOKMARK,
        METHOD_CREATE, METHOD_REMOVE_BOOKMARK,
    },
};

use crate::{fetcher::StateFetcher, ref_store::RefStore, ControllerEvent, LedgerExecutor};

/// Progress of the current mutating action.
///
/// `Confirmed` and `Failed` are resting states; a new action resets either
/// to `Submitting`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransactionLifecycle {
    #[default]
    Idle,
    Submitting,
    AwaitingEffects,
    Confirmed,
    Failed(TransactionError),
}

#[derive(Debug, Clone, Default)]
pub struct TxStateView {
    pub lifecycle: TransactionLifecycle,
    pub digest: Option<TxDigest>,
    pub error: Option<TransactionError>,
}

struct TxState {
    lifecycle: TransactionLifecycle,
    digest: Option<TxDigest>,
    error: Option<TransactionError>,
    latest_attempt: u64,
}

pub struct TxOrchestrator {
    executor: Arc<dyn LedgerExecutor>,
    refs: Arc<RefStore>,
    fetcher: Arc<StateFetcher>,
    package_id: String,
    state: Mutex<TxState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl TxOrchestrator {
    pub fn new(
        executor: Arc<dyn LedgerExecutor>,
        refs: Arc<RefStore>,
        fetcher: Arc<StateFetcher>,
        package_id: String,
        events: broadcast::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            executor,
            refs,
            fetcher,
            package_id,
            state: Mutex::new(TxState {
                lifecycle: TransactionLifecycle::Idle,
                digest: None,
                error: None,
                latest_attempt: 0,
            }),
            events,
        }
    }

    pub async fn state(&self) -> TxStateView {
        let state = self.state.lock().await;
        TxStateView {
            lifecycle: state.lifecycle.clone(),
            digest: state.digest.clone(),
            error: state.error.clone(),
        }
    }

    /// Submit the reference-establishing `create` call and, once its effects
    /// report a created object, bind the store to it. Effects that report no
    /// created object still confirm; the caller sees "still no object" and
    /// may retry.
    pub async fn create_object(&self) -> Result<(), TransactionError> {
        let attempt = self.begin_attempt(true).await;
        if self.package_id.is_empty() {
            return self
                .fail(
                    attempt,
                    TransactionError::Submission("package id is not configured".into()),
                )
                .await;
        }

        let call = ProgrammableCall {
            target: call_target(&self.package_id, METHOD_CREATE),
            arguments: Vec::new(),
        };
        let digest = match self.executor.sign_and_execute(call).await {
            Ok(digest) => digest,
            Err(err) => {
                return self
                    .fail(attempt, TransactionError::Submission(err.to_string()))
                    .await
            }
        };
        self.record_submission(attempt, &digest).await;

        let effects = match self.executor.wait_for_transaction(&digest).await {
            Ok(effects) => effects,
            Err(err) => {
                return self
                    .fail(attempt, TransactionError::ConfirmationWait(err.to_string()))
                    .await
            }
        };
        if let ExecutionStatus::Failure { error } = effects.status {
            return self.fail(attempt, TransactionError::Execution(error)).await;
        }

        let created = effects.created_object_id().cloned();
        if created.is_none() {
            warn!(digest = %digest, "create confirmed without a created object; binding stays unset");
        }
        self.apply_if_current(attempt, |state| {
            if let Some(object_id) = created {
                info!(object_id = %object_id, digest = %digest, "created object bound");
                self.refs.set(object_id.clone());
                let _ = self
                    .events
                    .send(ControllerEvent::ReferenceChanged(Some(object_id)));
            }
            state.lifecycle = TransactionLifecycle::Confirmed;
        })
        .await;
        Ok(())
    }

    pub async fn add_bookmark(&self) -> Result<(), TransactionError> {
        self.mutate_bookmarks(METHOD_ADD_BOOKMARK).await
    }

    pub async fn remove_bookmark(&self) -> Result<(), TransactionError> {
        self.mutate_bookmarks(METHOD_REMOVE_BOOKMARK).await
    }

    /// Detach the bound reference and drop any pending transaction error.
    /// In-flight work is not cancelled; its completions apply unless a newer
    /// action has superseded them.
    pub async fn clear_object(&self) {
        self.refs.clear();
        let lifecycle = {
            let mut state = self.state.lock().await;
            state.error = None;
            if matches!(state.lifecycle, TransactionLifecycle::Failed(_)) {
                state.lifecycle = TransactionLifecycle::Idle;
            }
            state.lifecycle.clone()
        };
        let _ = self.events.send(ControllerEvent::ReferenceChanged(None));
        let _ = self.events.send(ControllerEvent::LifecycleChanged(lifecycle));
    }

    // Counts are never adjusted locally: a confirmed mutation refreshes the
    // fetched record so the observed value stays authoritative.
    async fn mutate_bookmarks(&self, method: &str) -> Result<(), TransactionError> {
        let attempt = self.begin_attempt(false).await;
        let Some(object_id) = self.refs.get() else {
            return self
                .fail(
                    attempt,
                    TransactionError::Submission("no bookmark manager is bound".into()),
                )
                .await;
        };
        if self.package_id.is_empty() {
            return self
                .fail(
                    attempt,
                    TransactionError::Submission("package id is not configured".into()),
                )
                .await;
        }

        let call = ProgrammableCall {
            target: call_target(&self.package_id, method),
            arguments: vec![CallArg::Object(object_id)],
        };
        let digest = match self.executor.sign_and_execute(call).await {
            Ok(digest) => digest,
            Err(err) => {
                return self
                    .fail(attempt, TransactionError::Submission(err.to_string()))
                    .await
            }
        };
        self.record_submission(attempt, &digest).await;

        let effects = match self.executor.wait_for_transaction(&digest).await {
            Ok(effects) => effects,
            Err(err) => {
                return self
                    .fail(attempt, TransactionError::ConfirmationWait(err.to_string()))
                    .await
            }
        };
        if let ExecutionStatus::Failure { error } = effects.status {
            return self.fail(attempt, TransactionError::Execution(error)).await;
        }

        self.fetcher.refetch().await;
        self.apply_if_current(attempt, |state| {
            state.lifecycle = TransactionLifecycle::Confirmed;
        })
        .await;
        info!(digest = %digest, method, "bookmark mutation confirmed");
        Ok(())
    }

    async fn begin_attempt(&self, reset_digest: bool) -> u64 {
        let mut state = self.state.lock().await;
        state.latest_attempt += 1;
        state.error = None;
        if reset_digest {
            state.digest = None;
        }
        state.lifecycle = TransactionLifecycle::Submitting;
        let _ = self
            .events
            .send(ControllerEvent::LifecycleChanged(state.lifecycle.clone()));
        state.latest_attempt
    }

    async fn record_submission(&self, attempt: u64, digest: &TxDigest) {
        self.apply_if_current(attempt, |state| {
            state.digest = Some(digest.clone());
            state.lifecycle = TransactionLifecycle::AwaitingEffects;
        })
        .await;
    }

    async fn fail(&self, attempt: u64, err: TransactionError) -> Result<(), TransactionError> {
        warn!(%err, attempt, "transaction attempt failed");
        self.apply_if_current(attempt, |state| {
            state.error = Some(err.clone());
            state.lifecycle = TransactionLifecycle::Failed(err.clone());
        })
        .await;
        Err(err)
    }

    // Every transition is tagged with the attempt that produced it; a
    // completion arriving after a newer attempt has started must not
    // overwrite that attempt's state.
    async fn apply_if_current(&self, attempt: u64, update: impl FnOnce(&mut TxState)) -> bool {
        let mut state = self.state.lock().await;
        if state.latest_attempt != attempt {
            debug!(
                attempt,
                latest = state.latest_attempt,
                "discarding completion from superseded attempt"
            );
            return false;
        }
        update(&mut state);
        let _ = self
            .events
            .send(ControllerEvent::LifecycleChanged(state.lifecycle.clone()));
        true
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
