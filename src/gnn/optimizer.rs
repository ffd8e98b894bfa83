//! Adam optimizer.

use crate::core::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

/// Adam hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam with bias-corrected first and second moments.
///
/// Moment buffers are created on the first step to match the parameter
/// shapes, and are part of the persisted optimizer state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Adam {
    config: AdamConfig,
    step: u64,
    first_moment: Vec<ArrayD<f64>>,
    second_moment: Vec<ArrayD<f64>>,
}

impl Adam {
    /// Create an optimizer with no state.
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    /// Hyper-parameters.
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of steps taken.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Apply one update. `params` and `grads` must line up one to one.
    pub fn step(&mut self, params: Vec<ArrayViewMutD<'_, f64>>, grads: Vec<ArrayViewD<'_, f64>>) -> Result<()> {
        if params.len() != grads.len() {
            return Err(Error::Training(format!(
                "{} parameters but {} gradients",
                params.len(),
                grads.len()
            )));
        }
        if self.first_moment.is_empty() {
            self.first_moment = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.second_moment = self.first_moment.clone();
        }
        if self.first_moment.len() != params.len() {
            return Err(Error::Training(format!(
                "optimizer state holds {} tensors, model has {}",
                self.first_moment.len(),
                params.len()
            )));
        }

        self.step += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let correction1 = 1.0 - beta1.powi(self.step as i32);
        let correction2 = 1.0 - beta2.powi(self.step as i32);

        for (((mut param, grad), m), v) in params
            .into_iter()
            .zip(grads)
            .zip(self.first_moment.iter_mut())
            .zip(self.second_moment.iter_mut())
        {
            if param.shape() != grad.shape() || m.shape() != grad.shape() {
                return Err(Error::Training(format!(
                    "shape mismatch: parameter {:?}, gradient {:?}, state {:?}",
                    param.shape(),
                    grad.shape(),
                    m.shape()
                )));
            }

            Zip::from(&mut param)
                .and(&grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
                });
        }

        Ok(())
    }
}
