//! # void_asset - Asynchronous Asset Loading
//!
//! Model and texture loading used by scene import:
//! - Request tokens returned at issuance and carried by every completion event
//! - Threaded model decoding (OBJ, glTF, GLB) with an optional model cache
//! - Synchronous texture and cubemap decoding for scene environments
//!
//! ## Example
//!
//! ```ignore
//! use void_asset::prelude::*;
//!
//! let server = AssetServer::default_config()?;
//! let request = server.load_model("models/box.obj", &ImportSettings::default(), true)?;
//!
//! // Later, once per frame
//! for event in server.poll_events() {
//!     if event.request() == request && event.is_terminal() {
//!         // ...
//!     }
//! }
//! ```

pub mod error;
pub mod handle;
pub mod loader;
pub mod model;
pub mod server;
pub mod texture;

pub use error::{LoadError, LoadResult};
pub use handle::{LoadRequestId, RequestIdAllocator};
pub use loader::{is_cubemap_path, validate_path, AssetSource, ImportSettings, ModelFormat};
pub use model::{
    Bounds, LoadedModel, Material, Mesh, ModelAsset, ModelLoader, TextureFailure, Vertex,
};
pub use server::{AssetEvent, AssetServer, AssetServerConfig};
pub use texture::{CubemapAsset, TextureAsset, TextureLoader, CUBEMAP_FACES};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::error::{LoadError, LoadResult};
    pub use crate::handle::LoadRequestId;
    pub use crate::loader::{AssetSource, ImportSettings};
    pub use crate::server::{AssetEvent, AssetServer, AssetServerConfig};
}
