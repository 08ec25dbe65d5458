//! Correlation of responses with the requests awaiting them.
//!
//! Every outbound request registers a oneshot sender under its id. The
//! dispatch loop resolves entries as responses arrive; the requester removes
//! its own entry when its deadline passes. Both paths go through the same
//! mutex, so a response and a timeout can never both settle one request.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use toolbridge_core::error::{BridgeError, BridgeResult};
use toolbridge_core::protocol::{RequestId, Response};
use tracing::{debug, trace, warn};

/// How many timed-out ids are remembered to recognise late responses.
pub const EXPIRED_HISTORY: usize = 256;

/// Receiver half handed to the requester.
pub type ResponseReceiver = oneshot::Receiver<BridgeResult<Value>>;

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Handed to the waiting requester.
    Delivered,
    /// The request had already timed out.
    Late,
    /// No request with this id was ever waiting, or it was already answered.
    Unknown,
}

struct Entry {
    method: String,
    tx: oneshot::Sender<BridgeResult<Value>>,
}

#[derive(Default)]
struct Table {
    waiting: HashMap<RequestId, Entry>,
    expired: VecDeque<RequestId>,
}

/// The table of requests awaiting a response.
#[derive(Default)]
pub struct PendingRequests {
    table: Mutex<Table>,
}

impl PendingRequests {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start waiting for the response to `id`.
    pub fn register(&self, id: RequestId, method: impl Into<String>) -> ResponseReceiver {
        let (tx, rx) = oneshot::channel();
        let entry = Entry {
            method: method.into(),
            tx,
        };
        if self.lock().waiting.insert(id.clone(), entry).is_some() {
            warn!(%id, "Replaced a pending request with a reused id");
        }
        rx
    }

    /// Route a response to its requester.
    pub fn resolve(&self, response: Response) -> Resolution {
        let id = response.id.clone();
        let entry = {
            let mut table = self.lock();
            match table.waiting.remove(&id) {
                Some(entry) => entry,
                None if table.expired.contains(&id) => {
                    debug!(%id, "Discarding response that arrived after its timeout");
                    return Resolution::Late;
                }
                None => {
                    warn!(%id, "Discarding response for an unknown request id");
                    return Resolution::Unknown;
                }
            }
        };

        let result = response
            .into_result()
            .map_err(|error| BridgeError::from_rpc(&entry.method, error));
        if entry.tx.send(result).is_err() {
            trace!(%id, method = %entry.method, "Requester stopped waiting before the response arrived");
        }
        Resolution::Delivered
    }

    /// Give up on `id` after its deadline.
    ///
    /// Returns `false` when the response won the race and was already
    /// delivered; the requester should then take it from its receiver.
    pub fn expire(&self, id: &RequestId) -> bool {
        let mut table = self.lock();
        if table.waiting.remove(id).is_none() {
            return false;
        }
        if table.expired.len() == EXPIRED_HISTORY {
            table.expired.pop_front();
        }
        table.expired.push_back(id.clone());
        true
    }

    /// Forget `id` without recording it as timed out.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.lock().waiting.remove(id).is_some()
    }

    /// Fail every waiting request and empty the table.
    ///
    /// Returns how many requests were rejected.
    pub fn reject_all(&self, make_error: impl Fn() -> BridgeError) -> usize {
        let drained: Vec<(RequestId, Entry)> = self.lock().waiting.drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.tx.send(Err(make_error()));
        }
        count
    }

    /// Number of requests still waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Whether no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the entry for `id` when the returned guard drops.
    ///
    /// Keeps the table clean when a requester's future is dropped mid-flight.
    pub(crate) fn guard(&self, id: RequestId) -> PendingGuard<'_> {
        PendingGuard { table: self, id }
    }
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.lock();
        f.debug_struct("PendingRequests")
            .field("waiting", &table.waiting.len())
            .field("expired", &table.expired.len())
            .finish()
    }
}

pub(crate) struct PendingGuard<'a> {
    table: &'a PendingRequests,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.cancel(&self.id);
    }
}
