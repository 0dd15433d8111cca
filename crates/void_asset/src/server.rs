//! Asset Server - threaded model loading
//!
//! The AssetServer owns a small pool of worker threads. Model requests are
//! validated on the caller's thread, queued on a channel and decoded by a
//! worker; results come back as [`AssetEvent`]s that the owner drains with
//! [`AssetServer::poll_events`] (typically once per frame).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

use crate::error::{LoadError, LoadResult};
use crate::handle::{LoadRequestId, RequestIdAllocator};
use crate::loader::{validate_path, AssetSource, ImportSettings, ModelFormat};
use crate::model::{ModelAsset, ModelLoader};
use crate::texture::{CubemapAsset, TextureAsset, TextureLoader};

/// Event from the asset server
#[derive(Clone, Debug)]
pub enum AssetEvent {
    /// Model finished loading
    ModelLoaded {
        request: LoadRequestId,
        path: String,
        model: Arc<ModelAsset>,
    },
    /// Model failed to load; no further events follow for this request
    ModelFailed {
        request: LoadRequestId,
        path: String,
        error: LoadError,
    },
    /// A texture of the model failed; the model still completes
    TextureFailed {
        request: LoadRequestId,
        path: String,
        texture_path: String,
        error: LoadError,
    },
}

impl AssetEvent {
    /// Request this event belongs to
    pub fn request(&self) -> LoadRequestId {
        match self {
            AssetEvent::ModelLoaded { request, .. }
            | AssetEvent::ModelFailed { request, .. }
            | AssetEvent::TextureFailed { request, .. } => *request,
        }
    }

    /// Resolved path of the model
    pub fn path(&self) -> &str {
        match self {
            AssetEvent::ModelLoaded { path, .. }
            | AssetEvent::ModelFailed { path, .. }
            | AssetEvent::TextureFailed { path, .. } => path,
        }
    }

    /// Whether this is the last event for its request
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AssetEvent::TextureFailed { .. })
    }
}

/// Asset server configuration
#[derive(Clone, Debug)]
pub struct AssetServerConfig {
    /// Base asset directory for relative paths
    pub asset_dir: PathBuf,
    /// Number of decoding threads
    pub worker_threads: usize,
    /// Keep decoded models for reuse
    pub cache_models: bool,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            worker_threads: 2,
            cache_models: true,
        }
    }
}

type ModelCache = RwLock<HashMap<(PathBuf, ImportSettings), Arc<ModelAsset>>>;

struct Job {
    request: LoadRequestId,
    resolved: PathBuf,
    settings: ImportSettings,
    use_cache: bool,
}

/// The main asset server
pub struct AssetServer {
    config: AssetServerConfig,
    ids: RequestIdAllocator,
    jobs: Option<Sender<Job>>,
    events_tx: Sender<AssetEvent>,
    events_rx: Receiver<AssetEvent>,
    cache: Arc<ModelCache>,
    textures: TextureLoader,
    workers: Vec<JoinHandle<()>>,
}

impl AssetServer {
    /// Create a new asset server and start its workers
    pub fn new(config: AssetServerConfig) -> LoadResult<Self> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let cache: Arc<ModelCache> = Arc::new(RwLock::new(HashMap::new()));

        let mut workers = Vec::new();
        for i in 0..config.worker_threads.max(1) {
            let jobs = jobs_rx.clone();
            let events = events_tx.clone();
            let cache = Arc::clone(&cache);
            let worker = std::thread::Builder::new()
                .name(format!("void-asset-{}", i))
                .spawn(move || worker_loop(jobs, events, cache))
                .map_err(|e| LoadError::Io(format!("Failed to spawn asset worker: {}", e)))?;
            workers.push(worker);
        }

        log::info!(
            "Asset server started: {} worker(s), asset dir {:?}",
            workers.len(),
            config.asset_dir
        );

        Ok(Self {
            config,
            ids: RequestIdAllocator::new(),
            jobs: Some(jobs_tx),
            events_tx,
            events_rx,
            cache,
            textures: TextureLoader::default(),
            workers,
        })
    }

    /// Create with default configuration
    pub fn default_config() -> LoadResult<Self> {
        Self::new(AssetServerConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &AssetServerConfig {
        &self.config
    }

    /// Resolve a path against the asset directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config.asset_dir.join(p)
        }
    }

    /// Drain every event that has arrived so far
    pub fn poll_events(&self) -> Vec<AssetEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Block until an event arrives or the timeout expires
    pub fn wait_event(&self, timeout: Duration) -> Option<AssetEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    /// Requests queued but not yet picked up by a worker
    pub fn pending_count(&self) -> usize {
        self.jobs.as_ref().map(|j| j.len()).unwrap_or(0)
    }

    /// Number of cached models
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Drop all cached models
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn read(&self, path: &str) -> LoadResult<(Vec<u8>, String)> {
        validate_path(path)?;
        let resolved = self.resolve(path);
        let resolved_str = resolved.to_string_lossy().to_string();
        let data = std::fs::read(&resolved).map_err(|e| LoadError::from_io(&resolved_str, &e))?;
        Ok((data, resolved_str))
    }
}

impl AssetSource for AssetServer {
    fn load_model(
        &self,
        path: &str,
        settings: &ImportSettings,
        cache_enabled: bool,
    ) -> LoadResult<LoadRequestId> {
        validate_path(path)?;
        if ModelFormat::from_path(path).is_none() {
            return Err(LoadError::UnsupportedFormat(path.to_string()));
        }

        let jobs = self.jobs.as_ref().ok_or(LoadError::Disconnected)?;
        let request = self.ids.allocate();
        let resolved = self.resolve(path);
        let use_cache = cache_enabled && self.config.cache_models;

        if use_cache {
            let key = (resolved.clone(), settings.clone());
            if let Some(model) = self.cache.read().get(&key).cloned() {
                log::debug!("{} served {} from cache", request, path);
                let _ = self.events_tx.send(AssetEvent::ModelLoaded {
                    request,
                    path: resolved.to_string_lossy().to_string(),
                    model,
                });
                return Ok(request);
            }
        }

        jobs.send(Job {
            request,
            resolved,
            settings: settings.clone(),
            use_cache,
        })
        .map_err(|_| LoadError::Disconnected)?;

        log::debug!("{} queued {}", request, path);
        Ok(request)
    }

    fn load_texture(&self, path: &str) -> LoadResult<Arc<TextureAsset>> {
        let (data, resolved) = self.read(path)?;
        self.textures.load(&data, &resolved).map(Arc::new)
    }

    fn load_cubemap_texture(&self, path: &str) -> LoadResult<Arc<CubemapAsset>> {
        let (data, resolved) = self.read(path)?;
        self.textures.load_cubemap(&data, &resolved).map(Arc::new)
    }
}

impl Drop for AssetServer {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Asset worker panicked");
            }
        }
    }
}

fn worker_loop(jobs: Receiver<Job>, events: Sender<AssetEvent>, cache: Arc<ModelCache>) {
    while let Ok(job) = jobs.recv() {
        let path = job.resolved.to_string_lossy().to_string();
        let key = (job.resolved.clone(), job.settings.clone());

        if job.use_cache {
            if let Some(model) = cache.read().get(&key).cloned() {
                let _ = events.send(AssetEvent::ModelLoaded {
                    request: job.request,
                    path,
                    model,
                });
                continue;
            }
        }

        let loader = ModelLoader::new(job.settings);
        let event = match loader.load_file(&job.resolved) {
            Ok(loaded) => {
                for failure in loaded.texture_failures {
                    let _ = events.send(AssetEvent::TextureFailed {
                        request: job.request,
                        path: path.clone(),
                        texture_path: failure.texture_path,
                        error: failure.error,
                    });
                }

                let model = Arc::new(loaded.model);
                if job.use_cache {
                    cache.write().insert(key, Arc::clone(&model));
                }
                AssetEvent::ModelLoaded {
                    request: job.request,
                    path,
                    model,
                }
            }
            Err(error) => AssetEvent::ModelFailed {
                request: job.request,
                path,
                error,
            },
        };

        if events.send(event).is_err() {
            break;
        }
    }
}
