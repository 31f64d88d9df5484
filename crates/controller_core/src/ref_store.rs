//! The session's binding to its remote object, mirrored to a shareable location.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use shared::domain::ObjectId;

/// External location the bound object identifier is mirrored to so a session
/// can be resumed or shared (for a browser embedding, the URL fragment).
pub trait ShareLocation: Send + Sync {
    /// Read the persisted identifier. Consulted once, at startup.
    fn read(&self) -> Option<String>;
    /// Mirror the current binding; `None` clears it.
    fn write(&self, value: Option<&str>) -> Result<()>;
}

/// In-process share location for embedders and tests.
#[derive(Default)]
pub struct MemoryShareLocation {
    slot: Mutex<Option<String>>,
}

impl MemoryShareLocation {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(value.into())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl ShareLocation for MemoryShareLocation {
    fn read(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn write(&self, value: Option<&str>) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("share location slot poisoned"))?;
        *slot = value.map(str::to_string);
        Ok(())
    }
}

/// Share location for environments without a shareable surface: nothing to
/// recover, writes go nowhere.
pub struct DetachedShareLocation;

impl ShareLocation for DetachedShareLocation {
    fn read(&self) -> Option<String> {
        None
    }

    fn write(&self, _value: Option<&str>) -> Result<()> {
        Ok(())
    }
}

pub struct RefStore {
    share: Arc<dyn ShareLocation>,
    binding: watch::Sender<Option<ObjectId>>,
}

impl RefStore {
    pub fn new(share: Arc<dyn ShareLocation>) -> Self {
        let recovered = share.read().filter(|value| !value.is_empty()).map(ObjectId);
        if let Some(object_id) = &recovered {
            info!(object_id = %object_id, "recovered object binding from share location");
        }
        let (binding, _) = watch::channel(recovered);
        Self { share, binding }
    }

    pub fn get(&self) -> Option<ObjectId> {
        self.binding.borrow().clone()
    }

    pub fn set(&self, object_id: ObjectId) {
        self.write_share(Some(object_id.as_str()));
        self.binding.send_replace(Some(object_id));
    }

    pub fn clear(&self) {
        self.write_share(None);
        self.binding.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ObjectId>> {
        self.binding.subscribe()
    }

    // The binding keeps working in-memory when the share location cannot be
    // written; identifiers are validated downstream by the fetch, not here.
    fn write_share(&self, value: Option<&str>) {
        if let Err(err) = self.share.write(value) {
            warn!(%err, "share location write failed; keeping in-memory binding only");
        }
    }
}

#[cfg(test)]
#[path = "tests/ref_store_tests.rs"]
mod tests;
