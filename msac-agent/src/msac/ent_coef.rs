//! Entropy coefficient of M-SAC.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mode of the entropy coefficient of M-SAC.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EntCoefMode {
    /// Use a constant as alpha.
    Fix(f64),

    /// Automatic tuning of alpha towards a target entropy.
    Auto {
        /// Target entropy of the policy.
        target_entropy: f64,

        /// Learning rate of the optimizer for `log_alpha`.
        learning_rate: f64,

        /// Initial value of alpha. When `None`, alpha starts at 1.
        init_alpha: Option<f64>,
    },
}

/// The entropy coefficient of M-SAC.
///
/// The coefficient is parameterized as `alpha = exp(log_alpha)` with
/// `log_alpha` being a trainable variable when auto-tuned.
pub struct EntCoef {
    varmap: VarMap,
    log_alpha: Tensor,
    target_entropy: Option<f64>,
    opt: Option<Optimizer>,
}

impl EntCoef {
    /// Constructs an instance of `EntCoef`.
    pub fn new(mode: EntCoefMode, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let (log_alpha, target_entropy, opt) = match mode {
            EntCoefMode::Fix(alpha) => {
                let init = Init::Const(alpha.ln());
                let log_alpha = vb.get_with_hints(1, "log_alpha", init)?;
                (log_alpha, None, None)
            }
            EntCoefMode::Auto {
                target_entropy,
                learning_rate,
                init_alpha,
            } => {
                let init = Init::Const(init_alpha.map(|a| a.ln()).unwrap_or(0.0));
                let log_alpha = vb.get_with_hints(1, "log_alpha", init)?;
                let opt = OptimizerConfig::default()
                    .learning_rate(learning_rate)
                    .build(varmap.all_vars())?;
                (log_alpha, Some(target_entropy), Some(opt))
            }
        };

        Ok(Self {
            varmap,
            log_alpha,
            opt,
            target_entropy,
        })
    }

    /// Returns the entropy coefficient, detached from the computation graph.
    pub fn alpha(&self) -> Result<Tensor> {
        Ok(self.log_alpha.detach().exp()?)
    }

    /// Returns the target entropy when alpha is auto-tuned.
    pub fn target_entropy(&self) -> Option<f64> {
        self.target_entropy
    }

    /// Does an optimization step given a loss.
    pub fn backward_step(&mut self, loss: &Tensor) {
        if let Some(opt) = &mut self.opt {
            opt.backward_step(loss).unwrap();
        }
    }

    /// Overrides the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        if let Some(opt) = &mut self.opt {
            opt.set_learning_rate(lr);
        }
    }

    /// Updates `log_alpha` given log probabilities of actions.
    ///
    /// Returns the loss when alpha is auto-tuned.
    pub fn update(&mut self, logp: &Tensor) -> Result<Option<f32>> {
        if let Some(target_entropy) = &self.target_entropy {
            let loss = {
                let tmp = (logp + *target_entropy)?.detach();
                ((self.log_alpha.broadcast_mul(&tmp))? * -1f64)?.mean(0)?
            };
            self.backward_step(&loss);
            Ok(Some(loss.to_scalar::<f32>()?))
        } else {
            Ok(None)
        }
    }

    /// Save the parameter into a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save entropy coefficient to {:?}", path.as_ref());
        Ok(())
    }

    /// Load the parameter from a file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load entropy coefficient from {:?}", path.as_ref());
        Ok(())
    }
}
