//! HTTP implementations of the ledger query and executor seams, for nodes
//! (or signing gateways) exposing a plain REST surface.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use controller_core::{LedgerExecutor, LedgerQuery};
use shared::{
    domain::{ObjectId, TxDigest},
    error::QueryError,
    protocol::{ObjectEnvelope, ProgrammableCall, TransactionEffects},
};

pub struct HttpLedgerClient {
    http: Client,
    base_url: Url,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref()).context("invalid node url")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path {path}"))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    digest: TxDigest,
}

#[async_trait]
impl LedgerQuery for HttpLedgerClient {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<ObjectEnvelope>, QueryError> {
        let url = self
            .endpoint(&format!("objects/{id}"))
            .map_err(|err| QueryError::Transport(err.to_string()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(object_id = %id, "object not found on node");
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|err| QueryError::Transport(err.to_string()))?;
        response
            .json::<ObjectEnvelope>()
            .await
            .map(Some)
            .map_err(|err| QueryError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl LedgerExecutor for HttpLedgerClient {
    async fn sign_and_execute(&self, call: ProgrammableCall) -> Result<TxDigest> {
        let url = self.endpoint("transactions")?;
        let response: SubmitResponse = self
            .http
            .post(url)
            .json(&call)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(digest = %response.digest, target = %call.target, "transaction submitted");
        Ok(response.digest)
    }

    async fn wait_for_transaction(&self, digest: &TxDigest) -> Result<TransactionEffects> {
        // The node holds this request until the effects are observable;
        // retry and backoff policy is its concern, not ours.
        let url = self.endpoint(&format!("transactions/{digest}/effects"))?;
        let effects = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<TransactionEffects>()
            .await?;
        Ok(effects)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
