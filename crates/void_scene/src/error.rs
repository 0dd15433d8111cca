//! Scene persistence errors

use thiserror::Error;

use crate::graph::NodeHandle;

/// Scene serialization errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Malformed scene document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Operation needs a node list and none exists yet
    #[error("No scene data: add a node or import a scene first")]
    NoSceneData,
    /// Handle does not refer to a live node
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeHandle),
    /// Invalid configuration file
    #[error("Config error: {0}")]
    Config(String),
}
