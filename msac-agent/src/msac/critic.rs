//! The action-value network wrapper of the M-SAC agent.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Critic`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CriticConfig<Q> {
    pub q_config: Option<Q>,
    pub opt_config: OptimizerConfig,
}

impl<Q> Default for CriticConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> CriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets the configuration of the action-value network.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`CriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// An action-value function of the M-SAC agent.
///
/// Owns the variables of one Q-network and the optimizer stepping them.
/// The agent holds several of these, plus target copies created through
/// [`Clone`], and regresses each one towards the shared soft target.
pub struct Critic<Q>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    varmap: VarMap,

    q_config: Q::Config,
    q: Q,

    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl<Q> Critic<Q>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`Critic`].
    pub fn build(config: CriticConfig<Q::Config>, device: Device) -> Result<Critic<Q>> {
        let q_config = config.q_config.context("q_config is not set.")?;
        Ok(Self::new(q_config, config.opt_config, device, None))
    }

    fn new(
        q_config: Q::Config,
        opt_config: OptimizerConfig,
        device: Device,
        varmap_src: Option<&VarMap>,
    ) -> Self {
        let mut varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config.clone())
        };
        let opt = opt_config.build(varmap.all_vars()).unwrap();

        if let Some(varmap_src) = varmap_src {
            varmap.clone_from(varmap_src);
        }

        Self {
            device,
            varmap,
            q_config,
            q,
            opt_config,
            opt,
        }
    }

    /// Outputs the action-value given an observation and an action.
    pub fn forward(&self, obs: &Q::Input1, act: &Q::Input2) -> Tensor {
        self.q.forward(obs, act)
    }

    /// Does an optimization step given a loss.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Overrides the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_learning_rate(lr);
    }

    /// Returns the variables of the network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters of the action-value network.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save critic to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of the action-value network.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load critic from {:?}", path.as_ref());
        Ok(())
    }
}

impl<Q> Clone for Critic<Q>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Clones the critic with a fresh variable store copying the source
    /// variables, e.g. for target-network construction.
    fn clone(&self) -> Self {
        Self::new(
            self.q_config.clone(),
            self.opt_config.clone(),
            self.device.clone(),
            Some(&self.varmap),
        )
    }
}
