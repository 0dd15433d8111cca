//! Ordered reconciliation of asynchronous model loads
//!
//! An [`ImportSession`] walks a snapshot's records front to back, issuing one
//! model load per record through an [`AssetSource`]. At most `max_in_flight`
//! loads are outstanding at once. Completions are matched to their record by
//! [`LoadRequestId`]; results that arrive early are held until every earlier
//! record has settled, so listener callbacks always follow list order.
//!
//! The session is single-threaded: it is driven by whoever delivers asset
//! events, and the snapshot must not be mutated by anyone else meanwhile.

use std::collections::VecDeque;
use std::sync::Arc;

use void_asset::{AssetEvent, AssetSource, ImportSettings, LoadError, LoadRequestId, ModelAsset};

use crate::graph::{NodeHandle, Renderable, SceneGraph};
use crate::listener::{ImportReport, RecordOutcome, SceneLoadListener};
use crate::record::RecordId;
use crate::snapshot::SceneSnapshot;

enum SlotState {
    InFlight(LoadRequestId),
    Loaded(Arc<ModelAsset>),
    Failed(LoadError),
    /// Record already dropped; name and source kept for the outcome
    NotIssued {
        name: String,
        source_path: String,
        error: LoadError,
    },
}

struct Slot {
    record: RecordId,
    state: SlotState,
    texture_errors: usize,
}

impl Slot {
    fn request(&self) -> Option<LoadRequestId> {
        match self.state {
            SlotState::InFlight(request) => Some(request),
            _ => None,
        }
    }
}

/// State of one running import
pub struct ImportSession {
    target: NodeHandle,
    /// Records not yet issued, in list order
    pending: VecDeque<RecordId>,
    /// Issued records whose outcome has not been delivered, in list order
    window: VecDeque<Slot>,
    max_in_flight: usize,
    settings: ImportSettings,
    cache_enabled: bool,
    report: ImportReport,
    finished: bool,
}

impl ImportSession {
    pub(crate) fn new(
        target: NodeHandle,
        snapshot: &SceneSnapshot,
        settings: ImportSettings,
        cache_enabled: bool,
        max_in_flight: usize,
    ) -> Self {
        Self {
            target,
            pending: snapshot.nodes().iter().map(|r| r.id()).collect(),
            window: VecDeque::new(),
            max_in_flight: max_in_flight.max(1),
            settings,
            cache_enabled,
            report: ImportReport::default(),
            finished: false,
        }
    }

    /// Whether the session has delivered its last callback
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Loads issued and not yet completed
    pub fn in_flight(&self) -> usize {
        self.window.iter().filter(|s| s.request().is_some()).count()
    }

    /// Records not yet issued
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    /// Whether `request` belongs to this session and is still outstanding
    pub fn owns(&self, request: LoadRequestId) -> bool {
        self.window.iter().any(|s| s.request() == Some(request))
    }

    /// Issue loads until the window is full or every record has been tried.
    ///
    /// A record whose load cannot be issued is removed from the snapshot and
    /// the next one is tried straight away.
    pub(crate) fn advance(
        &mut self,
        snapshot: &mut SceneSnapshot,
        graph: &mut SceneGraph,
        assets: &dyn AssetSource,
        listener: &mut dyn SceneLoadListener,
    ) {
        while !self.finished && self.in_flight() < self.max_in_flight {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let Some(record) = snapshot.record(id) else {
                log::debug!("Record {:?} vanished before its load was issued", id);
                continue;
            };

            match assets.load_model(&record.source_path, &self.settings, self.cache_enabled) {
                Ok(request) => {
                    log::debug!("{} issued for {} ({})", request, record.name, record.source_path);
                    self.window.push_back(Slot {
                        record: id,
                        state: SlotState::InFlight(request),
                        texture_errors: 0,
                    });
                }
                Err(error) => {
                    log::warn!(
                        "Could not issue load for {} ({}): {}",
                        record.name,
                        record.source_path,
                        error
                    );
                    let Some(record) = snapshot.remove_record(id) else {
                        continue;
                    };
                    self.window.push_back(Slot {
                        record: id,
                        state: SlotState::NotIssued {
                            name: record.name,
                            source_path: record.source_path,
                            error,
                        },
                        texture_errors: 0,
                    });
                }
            }
        }

        self.flush(snapshot, graph, listener);
        self.check_finished(listener);
    }

    /// Apply an asset event. Returns false if the event is not ours.
    pub(crate) fn handle_event(
        &mut self,
        event: &AssetEvent,
        snapshot: &mut SceneSnapshot,
        graph: &mut SceneGraph,
        assets: &dyn AssetSource,
        listener: &mut dyn SceneLoadListener,
    ) -> bool {
        if self.finished {
            return false;
        }
        let request = event.request();
        let Some(slot) = self.window.iter_mut().find(|s| s.request() == Some(request)) else {
            return false;
        };

        match event {
            AssetEvent::TextureFailed { texture_path, error, .. } => {
                log::warn!("{}: texture {} failed: {}", request, texture_path, error);
                slot.texture_errors += 1;
            }
            AssetEvent::ModelLoaded { model, .. } => {
                slot.state = SlotState::Loaded(Arc::clone(model));
            }
            AssetEvent::ModelFailed { path, error, .. } => {
                log::warn!("{}: model {} failed: {}", request, path, error);
                slot.state = SlotState::Failed(error.clone());
            }
        }

        self.flush(snapshot, graph, listener);
        self.advance(snapshot, graph, assets, listener);
        true
    }

    /// Stop the import. Undelivered records stay in the snapshot untouched.
    pub(crate) fn cancel(
        &mut self,
        snapshot: &SceneSnapshot,
        listener: &mut dyn SceneLoadListener,
    ) {
        if self.finished {
            return;
        }

        let window: Vec<Slot> = self.window.drain(..).collect();
        for slot in window {
            match slot.state {
                SlotState::NotIssued { name, source_path, error } => {
                    self.deliver(listener, &name, &source_path, RecordOutcome::NotIssued(error));
                }
                _ => self.deliver_cancelled(snapshot, slot.record, listener),
            }
        }
        let pending: Vec<RecordId> = self.pending.drain(..).collect();
        for id in pending {
            self.deliver_cancelled(snapshot, id, listener);
        }

        self.report.cancelled = true;
        self.check_finished(listener);
    }

    /// Deliver settled slots from the front of the window
    fn flush(
        &mut self,
        snapshot: &mut SceneSnapshot,
        graph: &mut SceneGraph,
        listener: &mut dyn SceneLoadListener,
    ) {
        while let Some(slot) = self.window.pop_front() {
            match slot.state {
                SlotState::InFlight(_) => {
                    self.window.push_front(slot);
                    break;
                }
                SlotState::NotIssued { name, source_path, error } => {
                    self.deliver(listener, &name, &source_path, RecordOutcome::NotIssued(error));
                }
                SlotState::Failed(error) => {
                    if let Some(record) = snapshot.remove_record(slot.record) {
                        self.deliver(
                            listener,
                            &record.name,
                            &record.source_path,
                            RecordOutcome::LoadFailed(error),
                        );
                    }
                }
                SlotState::Loaded(model) => {
                    let (record, texture_errors) = (slot.record, slot.texture_errors);
                    self.reconcile(snapshot, graph, listener, record, model, texture_errors);
                }
            }
        }
    }

    /// Create the live node for a loaded record and restore its persisted state
    fn reconcile(
        &mut self,
        snapshot: &mut SceneSnapshot,
        graph: &mut SceneGraph,
        listener: &mut dyn SceneLoadListener,
        id: RecordId,
        model: Arc<ModelAsset>,
        texture_errors: usize,
    ) {
        let Some(record) = snapshot.record_mut(id) else {
            log::warn!("Record {:?} removed while its model was loading", id);
            return;
        };

        let node = graph.create_node(record.name.clone());
        graph.set_transform(node, record.transform());
        if let Some(n) = graph.get_mut(node) {
            n.renderable = Some(Renderable::Model(model));
        }
        record.associate(node);

        if !graph.add_child(self.target, node) {
            log::warn!(
                "Import target {:?} is gone; attaching {} to the root",
                self.target,
                record.name
            );
            let root = graph.root();
            graph.add_child(root, node);
        }

        let name = record.name.clone();
        let source_path = record.source_path.clone();
        log::info!("Loaded {} from {}", name, source_path);

        listener.on_node_loaded(graph, node);
        self.deliver(listener, &name, &source_path, RecordOutcome::Loaded { node, texture_errors });
    }

    fn deliver_cancelled(
        &mut self,
        snapshot: &SceneSnapshot,
        id: RecordId,
        listener: &mut dyn SceneLoadListener,
    ) {
        if let Some(record) = snapshot.record(id) {
            let (name, source_path) = (record.name.clone(), record.source_path.clone());
            self.deliver(listener, &name, &source_path, RecordOutcome::Cancelled);
        }
    }

    fn deliver(
        &mut self,
        listener: &mut dyn SceneLoadListener,
        name: &str,
        source_path: &str,
        outcome: RecordOutcome,
    ) {
        self.report.record(&outcome);
        listener.on_record_outcome(name, source_path, &outcome);
    }

    fn check_finished(&mut self, listener: &mut dyn SceneLoadListener) {
        if self.finished || !self.pending.is_empty() || !self.window.is_empty() {
            return;
        }
        self.finished = true;
        log::info!(
            "Scene import finished: {} loaded, {} failed, {} not issued, {} texture errors{}",
            self.report.loaded,
            self.report.failed,
            self.report.not_issued,
            self.report.texture_errors,
            if self.report.cancelled { " (cancelled)" } else { "" }
        );
        listener.on_import_finished(&self.report);
    }
}
