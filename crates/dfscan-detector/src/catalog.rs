//! Model catalog: known detectors, their weights and loaded instances.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dfscan_models::{ModelInfo, DEFAULT_MODEL};
use tracing::info;

use crate::adapter::{Detector, ModelAdapter};
use crate::error::{DetectorError, DetectorResult};
use crate::onnx::OnnxModel;
use crate::preprocess::PixelNormalization;

/// A model known to the catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub input_size: u32,
    pub normalization: PixelNormalization,
}

impl CatalogEntry {
    pub fn weights_file(&self) -> String {
        format!("{}.onnx", self.key)
    }
}

const fn entry(key: &'static str, name: &'static str, input_size: u32, normalization: PixelNormalization) -> CatalogEntry {
    CatalogEntry {
        key,
        name,
        input_size,
        normalization,
    }
}

/// Every model the service knows how to load.
pub const CATALOG: &[CatalogEntry] = &[
    entry("xception", "Xception", 299, PixelNormalization::SYMMETRIC),
    entry("meso4", "MesoNet-4", 256, PixelNormalization::SYMMETRIC),
    entry("meso4Inception", "MesoInception-4", 256, PixelNormalization::SYMMETRIC),
    entry("f3net", "F3Net", 224, PixelNormalization::SYMMETRIC),
    entry("efficientnetb4", "EfficientNet-B4", 380, PixelNormalization::IMAGENET),
    entry("capsule_net", "Capsule-Net", 128, PixelNormalization::IMAGENET),
    entry("srm", "SRM", 299, PixelNormalization::SYMMETRIC),
    entry("recce", "RECCE", 224, PixelNormalization::SYMMETRIC),
    entry("spsl", "SPSL", 224, PixelNormalization::SYMMETRIC),
    entry("ffd", "FFD", 224, PixelNormalization::SYMMETRIC),
    entry("ucf", "UCF", 224, PixelNormalization::SYMMETRIC),
    entry("multi_attention", "Multi-Attention", 224, PixelNormalization::IMAGENET),
    entry("core", "CORE", 224, PixelNormalization::SYMMETRIC),
];

/// Look up a catalog entry by key.
pub fn find_entry(key: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.key == key)
}

/// Resolves model keys to ready detectors.
pub trait DetectorLoader: Send + Sync {
    /// Load (or reuse) the detector for `model`.
    fn load(&self, model: &str) -> DetectorResult<Arc<dyn Detector>>;

    /// Every model this loader knows, with availability.
    fn list(&self) -> Vec<ModelInfo>;
}

/// Catalog configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Directory holding `<key>.onnx` weight files
    pub weights_dir: PathBuf,
    pub default_model: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("models/weights"),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            weights_dir: std::env::var("MODEL_WEIGHTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/weights")),
            default_model: std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }
}

/// ONNX-backed [`DetectorLoader`] over [`CATALOG`].
///
/// Loaded detectors are cached for the life of the catalog.
pub struct ModelCatalog {
    config: CatalogConfig,
    loaded: Mutex<HashMap<String, Arc<dyn Detector>>>,
}

impl ModelCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn weights_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.config.weights_dir.join(entry.weights_file())
    }

    pub fn is_available(&self, entry: &CatalogEntry) -> bool {
        self.weights_path(entry).is_file()
    }
}

impl DetectorLoader for ModelCatalog {
    fn load(&self, model: &str) -> DetectorResult<Arc<dyn Detector>> {
        let entry = find_entry(model).ok_or_else(|| DetectorError::UnknownModel(model.to_string()))?;

        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| DetectorError::runtime("Model cache lock poisoned"))?;
        if let Some(detector) = loaded.get(entry.key) {
            return Ok(Arc::clone(detector));
        }

        let path = self.weights_path(entry);
        let model = OnnxModel::load(entry.key, &path, entry.input_size, entry.normalization)?;
        let detector: Arc<dyn Detector> = Arc::new(ModelAdapter::new(model));
        loaded.insert(entry.key.to_string(), Arc::clone(&detector));

        info!(model = %entry.key, name = %entry.name, "Detector ready");
        Ok(detector)
    }

    fn list(&self) -> Vec<ModelInfo> {
        CATALOG
            .iter()
            .map(|entry| ModelInfo {
                key: entry.key.to_string(),
                name: entry.name.to_string(),
                input_size: entry.input_size,
                weights_file: entry.weights_file(),
                available: self.is_available(entry),
            })
            .collect()
    }
}
