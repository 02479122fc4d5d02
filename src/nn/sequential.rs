use super::Layer;
use crate::error::Result;
use crate::graph::Tensor;
use core::fmt;

/// An ordered chain of layers, applied first to last.
///
/// The container owns no tensors of its own. Its parameters are its layers'
/// parameters, concatenated in layer order.
///
/// # Example
/// ```rust
/// use minigrad::nn::{Dense, Layer, Relu, Sequential};
/// use minigrad::{tensor, Tensor};
///
/// let model = Sequential::new()
///     .with(Dense::new(2, 4))
///     .with(Relu)
///     .with(Dense::new(4, 1));
/// let y = model.forward(&Tensor::constant(tensor!([[1.0, 2.0]]))).unwrap();
/// assert_eq!(y.shape(), vec![1, 1]);
/// assert_eq!(model.parameters().len(), 4);
/// ```
#[derive(Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    /// An empty model; its forward pass returns the input unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer.
    pub fn add(&mut self, layer: impl Layer + 'static) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Builder form of [`Sequential::add`].
    #[must_use]
    pub fn with(mut self, layer: impl Layer + 'static) -> Self {
        self.add(layer);
        self
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when there are no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer for Sequential {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.layers
            .iter()
            .try_fold(input.clone(), |x, layer| layer.forward(&x))
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.layers.iter().flat_map(|layer| layer.parameters()).collect()
    }

    fn zero_grad(&self) {
        for layer in &self.layers {
            layer.zero_grad();
        }
    }
}

impl fmt::Debug for Sequential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequential")
            .field("layers", &self.layers.len())
            .finish()
    }
}
