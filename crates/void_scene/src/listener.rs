//! Import notifications

use void_asset::LoadError;

use crate::graph::{NodeHandle, SceneGraph};

/// What became of one persisted record during an import
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    /// The model loaded and the node is attached to the target scene
    Loaded {
        node: NodeHandle,
        /// Textures replaced by placeholders
        texture_errors: usize,
    },
    /// The loader reported an error; the record was dropped from the snapshot
    LoadFailed(LoadError),
    /// The load could not be issued; the record was dropped from the snapshot
    NotIssued(LoadError),
    /// The import was cancelled first; the record stays in the snapshot
    Cancelled,
}

/// Totals for a finished import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub loaded: usize,
    pub failed: usize,
    pub not_issued: usize,
    pub texture_errors: usize,
    pub cancelled: bool,
}

impl ImportReport {
    pub(crate) fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Loaded { texture_errors, .. } => {
                self.loaded += 1;
                self.texture_errors += texture_errors;
            }
            RecordOutcome::LoadFailed(_) => self.failed += 1,
            RecordOutcome::NotIssued(_) => self.not_issued += 1,
            RecordOutcome::Cancelled => self.cancelled = true,
        }
    }
}

/// Receives import progress.
///
/// Callbacks arrive on the thread that drives the import, in snapshot list
/// order. `on_environment_loaded` fires once per import, before any node.
pub trait SceneLoadListener {
    /// The environment was attached, or there was none to load
    fn on_environment_loaded(&mut self, graph: &mut SceneGraph, environment: Option<NodeHandle>);

    /// A record's node was created and attached
    fn on_node_loaded(&mut self, graph: &mut SceneGraph, node: NodeHandle);

    /// Final outcome for one record
    fn on_record_outcome(&mut self, _name: &str, _source_path: &str, _outcome: &RecordOutcome) {}

    /// No further callbacks will follow for this import
    fn on_import_finished(&mut self, _report: &ImportReport) {}
}

/// Listener that ignores everything
#[derive(Debug, Default)]
pub struct NullListener;

impl SceneLoadListener for NullListener {
    fn on_environment_loaded(
        &mut self,
        _graph: &mut SceneGraph,
        _environment: Option<NodeHandle>,
    ) {
    }

    fn on_node_loaded(&mut self, _graph: &mut SceneGraph, _node: NodeHandle) {}
}
