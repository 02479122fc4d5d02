//! The training protocol: `zero_grad → forward → loss → backward → step`.
//!
//! [`train_step`] performs exactly one iteration of that protocol and is all a
//! hand-written loop needs. [`Trainer`] repeats it over a set of batches for a
//! configured number of epochs and reports the mean loss of each epoch.
//!
//! ```rust
//! use minigrad::config::TrainConfig;
//! use minigrad::loss::Mse;
//! use minigrad::nn::{Dense, Layer};
//! use minigrad::optim::Sgd;
//! use minigrad::train::{Batch, Trainer};
//! use minigrad::tensor;
//!
//! let model = Dense::new(1, 1);
//! let batch = Batch::new(tensor!([[0.0], [1.0], [2.0]]), tensor!([[1.0], [3.0], [5.0]]));
//! let config = TrainConfig::default().with_learning_rate(0.05).with_epochs(200);
//! let mut trainer = Trainer::new(config, Sgd::new(model.parameters(), 0.0), Mse).unwrap();
//! let report = trainer.fit(&model, &[batch]).unwrap();
//! assert!(report.final_loss().unwrap() < report.epoch_losses[0]);
//! ```

use crate::config::TrainConfig;
use crate::error::{GradError, Result};
use crate::graph::Tensor;
use crate::loss::Loss;
use crate::nn::Layer;
use crate::optim::Optimizer;
use crate::tensors::Array;
use log::{debug, info};

/// One set of inputs and the targets they should map to.
///
/// Both tensors are constants: they never receive gradients.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Model inputs, one example per row.
    pub inputs: Tensor,
    /// Expected outputs, one example per row.
    pub targets: Tensor,
}

impl Batch {
    /// Wraps raw inputs and targets as constant tensors.
    #[must_use]
    pub fn new(inputs: Array, targets: Array) -> Self {
        Self {
            inputs: Tensor::constant(inputs),
            targets: Tensor::constant(targets),
        }
    }
}

/// Runs one training iteration and returns the loss before the update.
///
/// When `check_finite` is set the loss and every parameter (value and
/// gradient) are validated between `backward` and the optimizer step; on
/// failure the step is skipped and the parameters keep their values.
///
/// # Errors
/// Shape errors from the model or the loss, and
/// [`GradError::NonFinite`] when validation is on and a value diverged.
pub fn train_step<M, O, L>(
    model: &M,
    optimizer: &mut O,
    loss: &L,
    batch: &Batch,
    check_finite: bool,
) -> Result<f64>
where
    M: Layer + ?Sized,
    O: Optimizer + ?Sized,
    L: Loss + ?Sized,
{
    model.zero_grad();
    let prediction = model.forward(&batch.inputs)?;
    let value = loss.loss(&prediction, &batch.targets)?;
    value.backward()?;

    if check_finite {
        value.check_finite()?;
        for param in model.parameters() {
            param.check_finite()?;
        }
    }
    optimizer.step();

    let loss_value = value.item().unwrap_or(f64::NAN);
    debug!("train step: {} = {loss_value}", loss.name());
    Ok(loss_value)
}

/// Mean loss of `model` over `batches`, leaving every gradient untouched.
///
/// # Errors
/// [`GradError::Empty`] if there are no batches, plus shape errors.
pub fn evaluate<M, L>(model: &M, loss: &L, batches: &[Batch]) -> Result<f64>
where
    M: Layer + ?Sized,
    L: Loss + ?Sized,
{
    if batches.is_empty() {
        return Err(GradError::Empty { op: "evaluate" });
    }
    let mut total = 0.0;
    for batch in batches {
        let prediction = model.forward(&batch.inputs)?;
        total += loss
            .loss(&prediction, &batch.targets)?
            .item()
            .unwrap_or(f64::NAN);
    }
    Ok(total / batches.len() as f64)
}

/// Per-epoch results of [`Trainer::fit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Mean training loss of each epoch, in order.
    pub epoch_losses: Vec<f64>,
}

impl TrainReport {
    /// Mean loss of the last epoch.
    #[must_use]
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Repeats [`train_step`] over a dataset according to a [`TrainConfig`].
#[derive(Debug)]
pub struct Trainer<O, L> {
    config: TrainConfig,
    optimizer: O,
    loss: L,
}

impl<O: Optimizer, L: Loss> Trainer<O, L> {
    /// Validates `config` and applies its learning rate to `optimizer`.
    ///
    /// # Errors
    /// [`GradError::InvalidConfig`] from [`TrainConfig::validate`].
    pub fn new(config: TrainConfig, mut optimizer: O, loss: L) -> Result<Self> {
        config.validate()?;
        optimizer.set_learning_rate(config.learning_rate);
        Ok(Self {
            config,
            optimizer,
            loss,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// The wrapped optimizer.
    #[must_use]
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Trains `model` for the configured number of epochs.
    ///
    /// # Errors
    /// [`GradError::Empty`] if there are no batches; otherwise the first
    /// error of any step, which aborts training.
    pub fn fit<M: Layer + ?Sized>(&mut self, model: &M, batches: &[Batch]) -> Result<TrainReport> {
        if batches.is_empty() {
            return Err(GradError::Empty { op: "fit" });
        }

        let mut report = TrainReport::default();
        for epoch in 1..=self.config.epochs {
            let mut total = 0.0;
            for batch in batches {
                total += train_step(
                    model,
                    &mut self.optimizer,
                    &self.loss,
                    batch,
                    self.config.check_finite,
                )?;
            }
            let mean = total / batches.len() as f64;
            report.epoch_losses.push(mean);

            if epoch % self.config.log_every == 0 || epoch == self.config.epochs {
                info!(
                    "epoch {epoch}/{}: {} {mean:.6}",
                    self.config.epochs,
                    self.loss.name()
                );
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::Mse;
    use crate::nn::Dense;
    use crate::optim::Sgd;
    use crate::tensor;

    fn unit_layer() -> Dense {
        Dense::from_parameters(tensor!([[1.0], [1.0]]), tensor!([[0.0]])).unwrap()
    }

    #[test]
    fn train_step_returns_pre_update_loss() {
        let model = unit_layer();
        let mut sgd = Sgd::new(model.parameters(), 0.1);
        let batch = Batch::new(tensor!([[1.0, 2.0]]), tensor!([[4.0]]));

        let first = train_step(&model, &mut sgd, &Mse, &batch, true).unwrap();
        assert_eq!(first, 1.0);
        let after = evaluate(&model, &Mse, &[batch]).unwrap();
        assert!((after - 0.04).abs() < 1e-12);
    }

    #[test]
    fn finite_checks_catch_divergence() {
        let model =
            Dense::from_parameters(tensor!([[1.0]]), tensor!([[0.0]])).unwrap();
        let mut sgd = Sgd::new(model.parameters(), 1e300);
        let batch = Batch::new(tensor!([[1e200]]), tensor!([[0.0]]));
        assert!(matches!(
            train_step(&model, &mut sgd, &Mse, &batch, true),
            Err(GradError::NonFinite { .. })
        ));
        assert_eq!(model.weights().value().data(), &[1.0]);
        assert_eq!(model.bias().value().data(), &[0.0]);
    }

    #[test]
    fn nan_input_leaves_parameters_untouched() {
        let model = unit_layer();
        let mut sgd = Sgd::new(model.parameters(), 0.1);
        let batch = Batch::new(tensor!([[f64::NAN, 1.0]]), tensor!([[0.0]]));
        assert!(train_step(&model, &mut sgd, &Mse, &batch, true).is_err());
        assert_eq!(model.weights().value().data(), &[1.0, 1.0]);
        assert_eq!(model.bias().value().data(), &[0.0]);
    }

    #[test]
    fn trainer_applies_config_and_rejects_empty_data() {
        let model = unit_layer();
        let config = TrainConfig::default().with_learning_rate(0.05).with_epochs(3);
        let mut trainer = Trainer::new(config, Sgd::new(model.parameters(), 1.0), Mse).unwrap();
        assert_eq!(trainer.optimizer().learning_rate(), 0.05);
        assert_eq!(
            trainer.fit(&model, &[]).unwrap_err(),
            GradError::Empty { op: "fit" }
        );

        let batch = Batch::new(tensor!([[1.0, 2.0]]), tensor!([[4.0]]));
        let report = trainer.fit(&model, &[batch]).unwrap();
        assert_eq!(report.epoch_losses.len(), 3);
        assert!(report.final_loss().unwrap() < report.epoch_losses[0]);
    }

    #[test]
    fn trainer_rejects_invalid_config() {
        let config = TrainConfig::default().with_epochs(0);
        assert!(Trainer::new(config, Sgd::new(Vec::new(), 0.1), Mse).is_err());
    }
}
