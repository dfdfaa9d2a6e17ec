//! Raw model outputs and their normalization to a probability.
//!
//! Detection models disagree on what they return: some expose a ready
//! probability, others binary logits, a single logit, or a multi-class
//! score tensor, either alone or inside a named output map. The shape is
//! inspected once per model ([`OutputKind::resolve`]) and the resulting
//! rule is applied to every later frame.

use ndarray::{ArrayD, Axis, IxDyn};

use crate::error::{DetectorError, DetectorResult};

/// Output names treated as a ready fake probability.
pub const PROBABILITY_KEYS: &[&str] = &["prob", "probability", "fake_prob"];

/// Output names searched, in order, for logits.
pub const LOGIT_KEYS: &[&str] = &["cls", "logits", "pred"];

/// A dense f32 tensor returned by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl OutputTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Rank-0 tensor holding one value.
    pub fn scalar(value: f32) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    /// First batch row; the whole tensor when rank < 2.
    fn first_row(&self) -> DetectorResult<(Vec<usize>, &[f32])> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(DetectorError::invalid_output(format!(
                "shape {:?} does not match {} values",
                self.shape,
                self.data.len()
            )));
        }
        if self.data.is_empty() {
            return Err(DetectorError::invalid_output("empty output tensor"));
        }
        if self.shape.len() < 2 {
            return Ok((vec![self.data.len()], &self.data));
        }
        let row_shape = self.shape[1..].to_vec();
        let row_len: usize = row_shape.iter().product();
        Ok((row_shape, &self.data[..row_len]))
    }
}

/// What a model returned for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// Named outputs, in model order
    Named(Vec<(String, OutputTensor)>),
    /// A single unnamed tensor
    Tensor(OutputTensor),
}

impl RawOutput {
    fn get(&self, key: &str) -> Option<&OutputTensor> {
        match self {
            RawOutput::Named(outputs) => outputs.iter().find(|(k, _)| k == key).map(|(_, t)| t),
            RawOutput::Tensor(_) => None,
        }
    }

    fn first(&self) -> Option<&OutputTensor> {
        match self {
            RawOutput::Named(outputs) => outputs.first().map(|(_, t)| t),
            RawOutput::Tensor(t) => Some(t),
        }
    }
}

/// Which tensor of a [`RawOutput`] carries the score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorSelector {
    Key(String),
    First,
}

/// How the selected tensor maps to a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Value is already a probability
    Direct,
    /// Two logits: softmax, take index 1
    BinarySoftmax,
    /// One logit: logistic
    Sigmoid,
    /// Softmax over the last axis, take the last class
    MulticlassSoftmax,
}

/// Normalization rule for one model's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputKind {
    pub selector: TensorSelector,
    pub normalization: Normalization,
}

impl OutputKind {
    /// Inspect an output and decide how to read it.
    pub fn resolve(output: &RawOutput) -> DetectorResult<Self> {
        if let Some(key) = PROBABILITY_KEYS.iter().find(|k| output.get(k).is_some()) {
            return Ok(Self {
                selector: TensorSelector::Key((*key).to_string()),
                normalization: Normalization::Direct,
            });
        }

        let (selector, tensor) = match LOGIT_KEYS
            .iter()
            .find_map(|k| output.get(k).map(|t| (TensorSelector::Key((*k).to_string()), t)))
        {
            Some(found) => found,
            None => {
                let tensor = output
                    .first()
                    .ok_or_else(|| DetectorError::invalid_output("model returned no tensors"))?;
                (TensorSelector::First, tensor)
            }
        };

        let (row_shape, _) = tensor.first_row()?;
        let row_len: usize = row_shape.iter().product();
        let normalization = match row_len {
            1 => Normalization::Sigmoid,
            2 if row_shape.len() == 1 => Normalization::BinarySoftmax,
            _ => Normalization::MulticlassSoftmax,
        };

        Ok(Self {
            selector,
            normalization,
        })
    }

    /// Apply the rule to an output, yielding a probability in `[0, 1]`.
    pub fn probability(&self, output: &RawOutput) -> DetectorResult<f64> {
        let tensor = match &self.selector {
            TensorSelector::Key(key) => output
                .get(key)
                .ok_or_else(|| DetectorError::invalid_output(format!("output '{}' missing", key)))?,
            TensorSelector::First => output
                .first()
                .ok_or_else(|| DetectorError::invalid_output("model returned no tensors"))?,
        };

        let (row_shape, row) = tensor.first_row()?;
        if row.iter().any(|v| !v.is_finite()) {
            return Err(DetectorError::invalid_output("non-finite value in model output"));
        }

        let p = match self.normalization {
            Normalization::Direct => row[0] as f64,
            Normalization::Sigmoid => sigmoid(row[0] as f64),
            Normalization::BinarySoftmax => {
                if row.len() != 2 {
                    return Err(DetectorError::invalid_output(format!(
                        "expected 2 logits, got {}",
                        row.len()
                    )));
                }
                softmax(&[row[0] as f64, row[1] as f64])[1]
            }
            Normalization::MulticlassSoftmax => last_class_probability(row_shape, row)?,
        };

        Ok(p.clamp(0.0, 1.0))
    }
}

fn last_class_probability(shape: Vec<usize>, row: &[f32]) -> DetectorResult<f64> {
    let array = ArrayD::from_shape_vec(IxDyn(&shape), row.to_vec())
        .map_err(|e| DetectorError::invalid_output(format!("failed to reshape output: {}", e)))?;
    let last_axis = Axis(array.ndim() - 1);
    let lane = array
        .lanes(last_axis)
        .into_iter()
        .next()
        .ok_or_else(|| DetectorError::invalid_output("empty class axis"))?;
    let logits: Vec<f64> = lane.iter().map(|v| *v as f64).collect();
    softmax(&logits)
        .last()
        .copied()
        .ok_or_else(|| DetectorError::invalid_output("empty class axis"))
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
