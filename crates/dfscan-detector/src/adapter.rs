//! Detector abstraction and the adapter that normalizes backend models.

use std::sync::OnceLock;

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::error::{DetectorError, DetectorResult};
use crate::output::{OutputKind, RawOutput};
use crate::preprocess::{preprocess, FrameTensor, PixelNormalization};

/// Scores frames for manipulation. This is all the pipeline sees of a model.
pub trait Detector: Send + Sync {
    /// Catalog key of the model.
    fn name(&self) -> &str;

    /// Square input edge expected by the model.
    fn input_size(&self) -> u32;

    /// Whether the detector can score frames.
    fn available(&self) -> bool {
        true
    }

    /// Run one throwaway inference so first-frame latency and output
    /// resolution happen before the frame loop.
    fn warmup(&self) -> DetectorResult<()>;

    /// Probability in `[0, 1]` that `frame` is manipulated.
    fn score(&self, frame: &RgbImage) -> DetectorResult<f64>;
}

/// Ways of feeding a frame to a model, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConvention {
    /// Named `image` input plus a dummy `label`, inference mode
    StructuredWithLabel,
    /// Named `image` input only
    Structured,
    /// The tensor as the sole positional input
    Bare,
}

impl CallConvention {
    pub const ALL: [CallConvention; 3] = [
        CallConvention::StructuredWithLabel,
        CallConvention::Structured,
        CallConvention::Bare,
    ];
}

/// An inference backend.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    fn input_size(&self) -> u32;

    fn normalization(&self) -> PixelNormalization {
        PixelNormalization::default()
    }

    fn invoke(&self, input: &FrameTensor, convention: CallConvention) -> DetectorResult<RawOutput>;
}

/// Wraps a [`Model`] as a [`Detector`].
///
/// The first call convention that succeeds and the output normalization
/// rule are both resolved on first use and reused for every later frame.
pub struct ModelAdapter<M: Model> {
    model: M,
    convention: OnceLock<CallConvention>,
    output_kind: OnceLock<OutputKind>,
}

impl<M: Model> ModelAdapter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            convention: OnceLock::new(),
            output_kind: OnceLock::new(),
        }
    }

    /// Call convention in use, once resolved.
    pub fn convention(&self) -> Option<CallConvention> {
        self.convention.get().copied()
    }

    pub fn output_kind(&self) -> Option<&OutputKind> {
        self.output_kind.get()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn invoke(&self, input: &FrameTensor) -> DetectorResult<RawOutput> {
        if let Some(convention) = self.convention.get() {
            return self.model.invoke(input, *convention).map_err(|e| {
                DetectorError::invocation(format!("{} ({:?}): {}", self.model.name(), convention, e))
            });
        }

        let mut failures = Vec::with_capacity(CallConvention::ALL.len());
        for convention in CallConvention::ALL {
            match self.model.invoke(input, convention) {
                Ok(output) => {
                    let _ = self.convention.set(convention);
                    info!(model = %self.model.name(), ?convention, "Resolved model call convention");
                    return Ok(output);
                }
                Err(e) => {
                    debug!(model = %self.model.name(), ?convention, error = %e, "Call convention rejected");
                    failures.push(format!("{:?}: {}", convention, e));
                }
            }
        }

        Err(DetectorError::invocation(format!(
            "{} rejected every call convention [{}]",
            self.model.name(),
            failures.join("; ")
        )))
    }

    fn output_kind_for(&self, output: &RawOutput) -> DetectorResult<&OutputKind> {
        if let Some(kind) = self.output_kind.get() {
            return Ok(kind);
        }
        let kind = OutputKind::resolve(output)?;
        debug!(model = %self.model.name(), ?kind, "Resolved model output kind");
        Ok(self.output_kind.get_or_init(|| kind))
    }
}

impl<M: Model> Detector for ModelAdapter<M> {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn input_size(&self) -> u32 {
        self.model.input_size()
    }

    fn warmup(&self) -> DetectorResult<()> {
        let size = self.model.input_size();
        let frame = RgbImage::from_pixel(size, size, Rgb([128, 128, 128]));
        self.score(&frame).map(|_| ())
    }

    fn score(&self, frame: &RgbImage) -> DetectorResult<f64> {
        let input = preprocess(frame, self.model.input_size(), &self.model.normalization())?;
        let output = self.invoke(&input)?;
        self.output_kind_for(&output)?.probability(&output)
    }
}
