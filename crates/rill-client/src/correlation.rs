//! Request/response correlation.
//!
//! Every in-flight call owns exactly one entry here until it settles by
//! response, error or timeout. Batches are correlated separately, keyed
//! by the canonical (sorted) list of their non-notification ids: the
//! protocol defines no batch correlation identifier, so the exact id set
//! of the outgoing requests is the key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use rill_jsonrpc::{ErrorResponse, Response};

use crate::error::{ClientError, ClientResult};

/// Settlement of a single pending call.
pub type CallResult = Result<Response, ClientError>;
/// Settlement of a pending batch: the raw response array.
pub type BatchResult = Result<Vec<Value>, ClientError>;

#[derive(Default)]
struct Inner {
    calls: HashMap<i64, oneshot::Sender<CallResult>>,
    batches: HashMap<Vec<i64>, oneshot::Sender<BatchResult>>,
}

impl Inner {
    fn claims(&self, id: i64) -> bool {
        self.calls.contains_key(&id) || self.batches.keys().any(|ids| ids.contains(&id))
    }
}

/// Pending-call and pending-batch table.
///
/// One mutex guards both maps: the insert-then-write and
/// match-then-remove sequences must be atomic with respect to each
/// other. Settlement is idempotent; whichever of response, error or
/// timer removes the entry first wins, later settlements are no-ops.
#[derive(Default)]
pub struct CorrelationTable {
    inner: Mutex<Inner>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending call and arm its timeout. On expiry the entry is
    /// settled with the synthetic `-32000` rejection (null id) and
    /// removed; a late real response is then dropped silently.
    pub fn register(self: &Arc<Self>, id: i64, timeout: Duration) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().calls.insert(id, tx);

        let table = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tx) = table.inner.lock().calls.remove(&id) {
                let _ = tx.send(Err(ClientError::Rpc(ErrorResponse::request_timeout())));
            }
        });

        rx
    }

    /// Insert a pending batch keyed by its sorted id list. Rejects ids
    /// already claimed by a live call or batch; overlapping concurrent
    /// batches would make set matching ambiguous.
    pub fn register_batch(
        self: &Arc<Self>,
        ids: Vec<i64>,
        timeout: Duration,
    ) -> ClientResult<oneshot::Receiver<BatchResult>> {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must be sorted");
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            if ids.iter().any(|id| inner.claims(*id)) {
                return Err(ClientError::OverlappingBatch);
            }
            inner.batches.insert(ids.clone(), tx);
        }

        let table = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tx) = table.inner.lock().batches.remove(&ids) {
                let _ = tx.send(Err(ClientError::Rpc(ErrorResponse::request_timeout())));
            }
        });

        Ok(rx)
    }

    /// Settle a call with its response. Returns false when no entry was
    /// live (already settled or timed out).
    pub fn resolve(&self, id: i64, response: Response) -> bool {
        match self.inner.lock().calls.remove(&id) {
            Some(tx) => tx.send(Ok(response)).is_ok(),
            None => {
                debug!(id, "dropping late response for settled call");
                false
            }
        }
    }

    /// Settle a call with a peer error response.
    pub fn reject(&self, id: i64, error: ErrorResponse) -> bool {
        match self.inner.lock().calls.remove(&id) {
            Some(tx) => tx.send(Err(ClientError::Rpc(error))).is_ok(),
            None => {
                debug!(id, "dropping late error response for settled call");
                false
            }
        }
    }

    /// Remove an entry without settling it (write failed before the
    /// request ever reached the wire; the caller reports the failure).
    pub fn discard(&self, id: i64) {
        self.inner.lock().calls.remove(&id);
    }

    pub fn discard_batch(&self, ids: &[i64]) {
        self.inner.lock().batches.remove(ids);
    }

    /// Match a response array against the pending batches: the batch
    /// whose id set equals the response id set (symmetric difference
    /// empty) settles. Any error entry rejects the whole batch with the
    /// batch value. Returns false when nothing matched.
    pub fn match_batch(&self, items: Vec<Value>) -> bool {
        let mut ids: Vec<i64> = items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_i64))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let tx = match self.inner.lock().batches.remove(&ids) {
            Some(tx) => tx,
            None => {
                debug!(?ids, "dropping batch response with no pending batch");
                return false;
            }
        };

        let failed = items
            .iter()
            .any(|item| item.get("error").map(|e| !e.is_null()).unwrap_or(false));
        let settlement = if failed {
            Err(ClientError::Batch(items))
        } else {
            Ok(items)
        };
        tx.send(settlement).is_ok()
    }

    /// Settle everything with `Closed`. Used on local teardown; a remote
    /// close leaves entries to their individual deadlines.
    pub fn abort_all(&self) {
        let mut inner = self.inner.lock();
        for (_, tx) in inner.calls.drain() {
            let _ = tx.send(Err(ClientError::Closed));
        }
        for (_, tx) in inner.batches.drain() {
            let _ = tx.send(Err(ClientError::Closed));
        }
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn pending_batches(&self) -> usize {
        self.inner.lock().batches.len()
    }
}
