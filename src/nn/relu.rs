use super::Layer;
use crate::error::Result;
use crate::graph::Tensor;

/// Rectified linear activation as a layer; it owns no parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relu;

impl Layer for Relu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.relu())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}
