//! Engine context: the composition root.
//!
//! `EngineContext` owns what elevation models share (the tile store, the
//! runtime executing fetches, the HTTP clients) and builds a model per
//! configured dataset.

use std::path::Path;
use std::sync::Arc;

use ini::Ini;
use tokio::runtime::{Handle, Runtime};
use tracing::info;

use super::config::{ContextConfig, ENGINE_SECTION};
use super::error::AppError;
use crate::cache::{FileTileStore, TileStore};
use crate::elevation::{ElevationModel, ElevationModelConfig, ModelServices, COMPOSE_CONNECT_TIMEOUT};
use crate::provider::{HttpClient, ReqwestClient};
use crate::retrieve::{PooledRetrievalService, RetrievalService};

/// Where a context gets retrieval and composite clients from.
enum Services {
    /// A private runtime; each model gets its own pooled service whose
    /// client honours the model's connect timeout.
    Owned(Runtime),
    /// Caller-provided services shared by every model.
    Injected {
        retrieval: Arc<dyn RetrievalService>,
        compose_client: Arc<dyn HttpClient>,
    },
}

/// Shared infrastructure and dataset configurations.
///
/// # Example
///
/// ```ignore
/// use globeterrain::app::EngineContext;
///
/// let context = EngineContext::from_ini_file(Path::new("globeterrain.ini"))?;
/// let model = context.model("srtm30")?;
/// let meters = model.get_elevation(27.99, 86.93)?;
/// ```
pub struct EngineContext {
    config: ContextConfig,
    datasets: Vec<ElevationModelConfig>,
    store: Arc<dyn TileStore>,
    services: Services,
}

impl EngineContext {
    /// Start a context with its own Tokio runtime for background fetches.
    ///
    /// Call from synchronous code; the runtime lives as long as the context.
    pub fn start(config: ContextConfig, datasets: Vec<ElevationModelConfig>) -> Result<Self, AppError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("globeterrain-fetch")
            .enable_all()
            .build()
            .map_err(|e| AppError::RuntimeCreation(e.to_string()))?;

        std::fs::create_dir_all(&config.cache_root)?;
        info!(
            cache_root = %config.cache_root.display(),
            datasets = datasets.len(),
            max_concurrent_fetches = config.max_concurrent_fetches,
            "Engine context started"
        );

        Ok(Self {
            store: Arc::new(FileTileStore::new(config.cache_root.clone())),
            config,
            datasets,
            services: Services::Owned(runtime),
        })
    }

    /// Create a context over injected services. No runtime is created.
    pub fn with_services(
        config: ContextConfig,
        datasets: Vec<ElevationModelConfig>,
        store: Arc<dyn TileStore>,
        retrieval: Arc<dyn RetrievalService>,
        compose_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            datasets,
            store,
            services: Services::Injected {
                retrieval,
                compose_client,
            },
        }
    }

    /// Read a configuration file and start a context from it.
    pub fn from_ini_file(path: &Path) -> Result<Self, AppError> {
        let (config, datasets) = load_ini_file(path)?;
        Self::start(config, datasets)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn datasets(&self) -> &[ElevationModelConfig] {
        &self.datasets
    }

    /// Dataset configuration by section or dataset name.
    pub fn dataset(&self, name: &str) -> Option<&ElevationModelConfig> {
        self.datasets
            .iter()
            .find(|d| d.section == name || d.dataset_name == name)
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    /// Handle of the owned runtime, if the context created one.
    pub fn runtime_handle(&self) -> Option<Handle> {
        match &self.services {
            Services::Owned(runtime) => Some(runtime.handle().clone()),
            Services::Injected { .. } => None,
        }
    }

    /// Build the model for a named dataset.
    pub fn model(&self, name: &str) -> Result<ElevationModel, AppError> {
        let dataset = self.dataset(name).ok_or_else(|| AppError::UnknownDataset {
            name: name.to_string(),
            available: self
                .datasets
                .iter()
                .map(|d| d.section.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        self.model_for(dataset.clone())
    }

    /// Build the model for the first configured dataset.
    pub fn default_model(&self) -> Result<ElevationModel, AppError> {
        let dataset = self.datasets.first().ok_or(AppError::NoDatasets)?;
        self.model_for(dataset.clone())
    }

    /// Build a model for any configuration using this context's services.
    pub fn model_for(&self, config: ElevationModelConfig) -> Result<ElevationModel, AppError> {
        let services = self.model_services(&config)?;
        Ok(ElevationModel::new(config, services)?)
    }

    fn model_services(&self, dataset: &ElevationModelConfig) -> Result<ModelServices, AppError> {
        let (retrieval, compose_client): (Arc<dyn RetrievalService>, Arc<dyn HttpClient>) =
            match &self.services {
                Services::Owned(runtime) => {
                    let client = Arc::new(ReqwestClient::with_connect_timeout(dataset.connect_timeout)?);
                    let retrieval = PooledRetrievalService::new(
                        runtime.handle().clone(),
                        client,
                        self.config.max_concurrent_fetches,
                    );
                    let compose = ReqwestClient::with_connect_timeout(COMPOSE_CONNECT_TIMEOUT)?;
                    (Arc::new(retrieval), Arc::new(compose))
                }
                Services::Injected {
                    retrieval,
                    compose_client,
                } => (Arc::clone(retrieval), Arc::clone(compose_client)),
            };

        Ok(ModelServices {
            store: Arc::clone(&self.store),
            retrieval,
            compose_client,
            memory_cache_bytes: self.config.memory_cache_bytes,
        })
    }
}

/// Parse a configuration document into engine and dataset settings.
pub fn load_ini_str(text: &str) -> Result<(ContextConfig, Vec<ElevationModelConfig>), AppError> {
    let ini = Ini::load_from_str(text).map_err(|e| AppError::ConfigFile {
        path: "<string>".to_string(),
        reason: e.to_string(),
    })?;
    parse_ini(&ini)
}

/// Read and parse a configuration file.
pub fn load_ini_file(path: &Path) -> Result<(ContextConfig, Vec<ElevationModelConfig>), AppError> {
    let ini = Ini::load_from_file(path).map_err(|e| AppError::ConfigFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_ini(&ini)
}

fn parse_ini(ini: &Ini) -> Result<(ContextConfig, Vec<ElevationModelConfig>), AppError> {
    let config = ContextConfig::from_ini(ini)?;
    let datasets = ElevationModelConfig::all_from_ini(ini, &[ENGINE_SECTION])?;
    Ok((config, datasets))
}
