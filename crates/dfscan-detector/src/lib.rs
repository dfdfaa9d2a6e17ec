//! Manipulation detectors.
//!
//! This crate provides:
//! - The [`Detector`] capability the analysis pipeline scores frames with
//! - [`ModelAdapter`], which feeds frames to a backend [`Model`] and
//!   normalizes whatever it returns to a probability
//! - An ONNX Runtime backend and the model catalog

pub mod adapter;
pub mod catalog;
pub mod error;
pub mod onnx;
pub mod output;
pub mod preprocess;

pub use adapter::{CallConvention, Detector, Model, ModelAdapter};
pub use catalog::{CatalogConfig, DetectorLoader, ModelCatalog, CATALOG};
pub use error::{DetectorError, DetectorResult};
pub use onnx::OnnxModel;
pub use output::{OutputKind, OutputTensor, RawOutput};
pub use preprocess::{preprocess, FrameTensor, PixelNormalization};
