//! The policy network wrapper of the M-SAC agent.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
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

/// Configuration of [`Actor`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ActorConfig<P: OutDim> {
    pi_config: Option<P>,
    opt_config: OptimizerConfig,
}

impl<P: OutDim> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            pi_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P> ActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the policy network.
    pub fn pi_config(mut self, v: P) -> Self {
        self.pi_config = Some(v);
        self
    }

    /// Sets the action dimension on the policy network configuration.
    pub fn out_dim(mut self, v: i64) -> Self {
        if let Some(pi_config) = &mut self.pi_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// The stochastic policy of the M-SAC agent.
///
/// Owns the variables of the policy network and the optimizer stepping
/// them. The network maps an observation to the mean and log standard
/// deviation of a Gaussian over pre-squash actions; sampling and the
/// tanh squash live in the agent, which only needs these two heads.
pub struct Actor<P>
where
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Action dimension, for the forward shape check.
    out_dim: i64,

    pi_config: P::Config,
    pi: P,

    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl<P> Actor<P>
where
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig<P::Config>, device: Device) -> Result<Actor<P>> {
        let pi_config = config.pi_config.context("pi_config is not set.")?;
        Ok(Self::new(pi_config, config.opt_config, device, None))
    }

    fn new(
        pi_config: P::Config,
        opt_config: OptimizerConfig,
        device: Device,
        varmap_src: Option<&VarMap>,
    ) -> Self {
        let out_dim = pi_config.get_out_dim();
        let mut varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, pi_config.clone())
        };
        let opt = opt_config.build(varmap.all_vars()).unwrap();

        if let Some(varmap_src) = varmap_src {
            varmap.clone_from(varmap_src);
        }

        Self {
            device,
            varmap,
            out_dim,
            pi_config,
            pi,
            opt_config,
            opt,
        }
    }

    /// Outputs the parameters of the Gaussian distribution given an observation.
    pub fn forward(&self, x: &P::Input) -> (Tensor, Tensor) {
        let (mean, lstd) = self.pi.forward(x);
        debug_assert_eq!(mean.dims()[1], self.out_dim as usize);
        debug_assert_eq!(lstd.dims()[1], self.out_dim as usize);
        (mean, lstd)
    }

    /// Does an optimization step given a loss.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Overrides the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_learning_rate(lr);
    }

    /// Saves the parameters of the policy network.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save actor to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of the policy network.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load actor from {:?}", path.as_ref());
        Ok(())
    }
}

impl<P> Clone for Actor<P>
where
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Clones the actor with a fresh variable store copying the source
    /// variables, e.g. for target-network construction.
    fn clone(&self) -> Self {
        Self::new(
            self.pi_config.clone(),
            self.opt_config.clone(),
            self.device.clone(),
            Some(&self.varmap),
        )
    }
}
