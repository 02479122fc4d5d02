//! Training configuration.

use crate::error::{GradError, Result};

/// Knobs for [`Trainer`](crate::train::Trainer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// SGD step size.
    pub learning_rate: f64,
    /// Full passes over the batches.
    pub epochs: usize,
    /// Validate the loss and every parameter after each step.
    pub check_finite: bool,
    /// Log a progress line every this many epochs.
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            epochs: 100,
            check_finite: false,
            log_every: 10,
        }
    }
}

impl TrainConfig {
    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the number of epochs.
    #[must_use]
    pub const fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Turns finite-value validation on or off.
    #[must_use]
    pub const fn with_finite_checks(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    /// Sets the logging cadence in epochs.
    #[must_use]
    pub const fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    /// Rejects settings that cannot train.
    ///
    /// # Errors
    /// [`GradError::InvalidConfig`] for a learning rate that is not a finite
    /// positive number, zero epochs, or a zero logging cadence.
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(GradError::InvalidConfig(format!(
                "learning rate must be finite and positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(GradError::InvalidConfig("epochs must be at least 1".into()));
        }
        if self.log_every == 0 {
            return Err(GradError::InvalidConfig(
                "log_every must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
