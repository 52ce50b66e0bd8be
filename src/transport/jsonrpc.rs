// JSON-RPC transport layer implementation
// This file implements the probe executor used by the service binary: sampler
// operations are posted as one JSON-RPC call to a simulation endpoint and the
// per-op results decoded from decimal strings
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::sampler::ops::SamplerOp;
use crate::venues::adapter::{ProbeExecutor, ProbeOutcome};
use async_trait::async_trait;
use num::BigUint;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::Url;

const EXECUTE_METHOD: &str = "sampler_execute";

#[derive(Debug)]
pub struct JsonRpcProbeExecutor {
    http: Client,
    url: Url,
    next_id: AtomicU64,
}

/// One op's result: `null` when the simulation reverted.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawOutcome(Option<Vec<String>>);

impl JsonRpcProbeExecutor {
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }
}

fn decode(raw: RawOutcome) -> ProbeOutcome {
    raw.0?
        .iter()
        .map(|v| BigUint::from_str(v.trim()).ok())
        .collect()
}

#[async_trait]
impl ProbeExecutor for JsonRpcProbeExecutor {
    async fn execute(&self, ops: &[SamplerOp]) -> Result<Vec<ProbeOutcome>, AggrError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": EXECUTE_METHOD,
            "params": [ops],
        });
        let resp = self
            .http
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AggrError::Transport(format!("jsonrpc send: {e}")))?;
        if !resp.status().is_success() {
            return Err(AggrError::Provider(format!("http {}", resp.status())));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AggrError::Transport(format!("json parse: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(AggrError::Provider(err.to_string()));
        }
        let raw: Vec<RawOutcome> = serde_json::from_value(body["result"].clone())
            .map_err(|e| AggrError::Provider(format!("decode result: {e}")))?;
        debug!(ops = ops.len(), results = raw.len(), "sampler batch executed");
        Ok(raw.into_iter().map(decode).collect())
    }
}
