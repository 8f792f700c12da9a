// Enrichment coordinator: owns the selection state and guarantees the
// displayed text always belongs to the most recent selection.
//
// Every selection change advances a generation counter. The post-increment
// value is captured into the spawned request task and travels with the
// settlement; a settlement whose generation no longer matches the live
// counter is discarded without touching state. Cancellation is logical:
// the previous task is also aborted as an optimization, but the fence alone
// carries the guarantee.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::enrich::client::EnrichmentSource;
use crate::protocol::{EnrichEvent, EnrichStatus, EnrichmentResult};

/// Coordinates asynchronous enrichment for a single selection stream.
pub struct Coordinator {
    source: Arc<dyn EnrichmentSource>,
    /// Settlements from spawned request tasks come back through this channel;
    /// the owning event loop feeds them to [`Coordinator::handle_event`].
    tx: mpsc::Sender<EnrichEvent>,
    /// Monotonically non-decreasing; incremented exactly once per selection
    /// change, including re-selecting the current key and including the
    /// empty selection. u64 overflow is not a practical concern.
    generation: u64,
    current_key: String,
    text: String,
    status: EnrichStatus,
    in_flight: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub fn new(source: Arc<dyn EnrichmentSource>, tx: mpsc::Sender<EnrichEvent>) -> Self {
        Self {
            source,
            tx,
            generation: 0,
            current_key: String::new(),
            text: String::new(),
            status: EnrichStatus::Idle,
            in_flight: None,
        }
    }

    /// React to a selection change. An empty key is a first-class transition
    /// to Idle and never issues a network call. A non-empty key moves to
    /// Pending with cleared text before the request task is spawned, so an
    /// observer can never see Pending carrying the previous key's text.
    pub fn on_selection_changed(&mut self, key: &str) {
        // Advance the fence first. The empty transition advances it too, so
        // an in-flight settlement can never overwrite Idle.
        self.generation += 1;
        self.cancel_in_flight();

        if key.is_empty() {
            self.current_key.clear();
            self.text.clear();
            self.status = EnrichStatus::Idle;
            info!(generation = self.generation, "selection cleared");
            return;
        }

        self.current_key = key.to_string();
        self.text.clear();
        self.status = EnrichStatus::Pending;

        let generation = self.generation;
        let subject = key.to_string();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            let outcome = source.request_enrichment(&subject).await;
            // Receiver dropped means the event loop is gone; nothing to do.
            let _ = tx.send(EnrichEvent::Settled { generation, outcome }).await;
        });
        self.in_flight = Some(handle);
        info!(key, generation, "enrichment requested");
    }

    /// Apply a settlement. A stale settlement, one whose generation differs
    /// from the live counter, is discarded unconditionally: no state
    /// mutation, no notification.
    pub fn handle_event(&mut self, event: EnrichEvent) {
        let EnrichEvent::Settled { generation, outcome } = event;

        if generation != self.generation {
            debug!(
                event_generation = generation,
                live_generation = self.generation,
                "discarding stale settlement"
            );
            return;
        }

        self.in_flight = None;
        match outcome {
            Ok(text) => {
                self.text = text;
                self.status = EnrichStatus::Resolved;
            }
            Err(e) => {
                warn!(key = %self.current_key, error = %e, "enrichment failed");
                self.text.clear();
                self.status = EnrichStatus::Failed;
            }
        }
    }

    /// The state a display layer is allowed to see. The generation tag stays
    /// internal.
    pub fn current_result(&self) -> EnrichmentResult {
        EnrichmentResult {
            key: self.current_key.clone(),
            text: self.text.clone(),
            status: self.status,
        }
    }

    /// True while a request task is outstanding. Used by the event loop for
    /// shutdown decisions, not for correctness.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn cancel_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            debug!("aborted superseded enrichment task");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
