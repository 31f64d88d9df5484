//! Authoritative record fetching, keyed on the current object binding.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use shared::{
    error::QueryError,
    protocol::{parse_record, BookmarkRecord},
};

use crate::{ref_store::RefStore, ControllerEvent, LedgerQuery};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub record: Option<BookmarkRecord>,
    pub object_exists: bool,
    pub is_loading: bool,
    pub error: Option<QueryError>,
}

struct FetchInner {
    state: FetchState,
    generation: u64,
}

pub struct StateFetcher {
    query: Arc<dyn LedgerQuery>,
    refs: Arc<RefStore>,
    inner: Mutex<FetchInner>,
    events: broadcast::Sender<ControllerEvent>,
}

impl StateFetcher {
    pub fn new(
        query: Arc<dyn LedgerQuery>,
        refs: Arc<RefStore>,
        events: broadcast::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            query,
            refs,
            inner: Mutex::new(FetchInner {
                state: FetchState::default(),
                generation: 0,
            }),
            events,
        }
    }

    pub async fn state(&self) -> FetchState {
        self.inner.lock().await.state.clone()
    }

    /// Re-read the remote record for the current binding.
    ///
    /// With no binding the query is disabled: the state resets and no network
    /// call is made. A result is applied only if no newer fetch has started
    /// since, so a slow response can never overwrite a fresher one. The
    /// record is replaced wholesale on every applied result; a payload that
    /// fails to parse as a record is published as absent, not as an error.
    pub async fn refetch(&self) {
        let Some(object_id) = self.refs.get() else {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.state = FetchState::default();
            let _ = self.events.send(ControllerEvent::RecordUpdated(None));
            return;
        };

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.state.is_loading = true;
            inner.state.error = None;
            inner.generation
        };

        let result = self.query.get_object(&object_id).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(object_id = %object_id, "discarding superseded fetch result");
            return;
        }
        inner.state = match result {
            Ok(Some(envelope)) => FetchState {
                record: parse_record(&envelope),
                object_exists: true,
                is_loading: false,
                error: None,
            },
            Ok(None) => FetchState {
                record: None,
                object_exists: false,
                is_loading: false,
                error: None,
            },
            Err(err) => {
                warn!(object_id = %object_id, %err, "object query failed");
                FetchState {
                    record: None,
                    object_exists: false,
                    is_loading: false,
                    error: Some(err),
                }
            }
        };
        let _ = self
            .events
            .send(ControllerEvent::RecordUpdated(inner.state.record.clone()));
    }
}

#[cfg(test)]
#[path = "tests/fetcher_tests.rs"]
mod tests;
