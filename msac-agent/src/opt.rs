//! Optimizers.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },

    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs an optimizer over the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars, params)?;
                Ok(Optimizer::AdamW(opt))
            }
            OptimizerConfig::Adam { lr } => {
                let params = ParamsAdam {
                    lr: *lr,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars, params)?;
                Ok(Optimizer::Adam(opt))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::AdamW {
                lr: _,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam { lr: _ } => Self::Adam { lr },
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let params = ParamsAdamW::default();
        Self::AdamW {
            lr: params.lr,
            beta1: params.beta1,
            beta2: params.beta2,
            eps: params.eps,
            weight_decay: params.weight_decay,
        }
    }
}

/// Optimizers.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW),

    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
        }
    }

    /// Overrides the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Self::AdamW(opt) => opt.set_learning_rate(lr),
            Self::Adam(opt) => opt.set_learning_rate(lr),
        }
    }
}

/// Linear schedule of the learning rate in optimization steps.
///
/// The learning rate is interpolated from `lr_0` to `lr_final` over
/// `n_opts_final` optimization steps and stays at `lr_final` afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LrScheduler {
    /// Initial learning rate.
    pub lr_0: f64,

    /// Final learning rate.
    pub lr_final: f64,

    /// The number of optimization steps when reaching `lr_final`.
    pub n_opts_final: usize,
}

impl LrScheduler {
    /// Creates a schedule from `lr_0` to `lr_final` over `n_opts_final` steps.
    pub fn new(lr_0: f64, lr_final: f64, n_opts_final: usize) -> Self {
        Self {
            lr_0,
            lr_final,
            n_opts_final,
        }
    }

    /// Returns the learning rate at the given optimization step.
    pub fn lr(&self, n_opts: usize) -> f64 {
        if n_opts >= self.n_opts_final {
            self.lr_final
        } else {
            let ratio = n_opts as f64 / self.n_opts_final as f64;
            self.lr_0 + ratio * (self.lr_final - self.lr_0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LrScheduler;

    #[test]
    fn test_lr_scheduler() {
        let scheduler = LrScheduler::new(1e-3, 1e-4, 100);
        assert_eq!(scheduler.lr(0), 1e-3);
        assert_eq!(scheduler.lr(100), 1e-4);
        assert_eq!(scheduler.lr(1000), 1e-4);
        let mid = scheduler.lr(50);
        assert!(mid < 1e-3 && mid > 1e-4);
    }
}
