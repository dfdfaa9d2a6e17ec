//! Detection model catalog entries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A detection model known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelInfo {
    /// Catalog key (e.g. `xception`)
    pub key: String,
    /// Display name
    pub name: String,
    /// Square input edge in pixels
    pub input_size: u32,
    /// Weights file name inside the weights directory
    pub weights_file: String,
    /// Whether the weights file is present
    pub available: bool,
}
