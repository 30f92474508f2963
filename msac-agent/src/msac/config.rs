//! Configuration of M-SAC agent.
use super::{ActorConfig, CriticConfig, EntCoefMode, MunchausenConfig};
use crate::{
    model::{SubModel1, SubModel2},
    opt::LrScheduler,
    util::{CriticLoss, OutDim},
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Msac`](super::Msac).
#[derive(Deserialize, Serialize)]
pub struct MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub(super) actor_config: ActorConfig<P::Config>,
    pub(super) critic_config: CriticConfig<Q::Config>,
    pub(super) gamma: f64,
    pub(super) tau: f64,
    pub(super) target_update_interval: usize,
    pub(super) ent_coef_mode: EntCoefMode,
    pub(super) munchausen: MunchausenConfig,
    pub(super) lr_scheduler: Option<LrScheduler>,
    pub(super) epsilon: f64,
    pub(super) min_lstd: f64,
    pub(super) max_lstd: f64,
    pub(super) n_updates_per_opt: usize,
    pub(super) batch_size: usize,
    pub(super) train: bool,
    pub(super) critic_loss: CriticLoss,
    pub(super) reward_scale: f32,
    pub(super) n_critics: usize,
    pub device: Option<Device>,
}

impl<Q, P> Debug for MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsacConfig")
            .field("actor_config", &self.actor_config)
            .field("critic_config", &self.critic_config)
            .field("gamma", &self.gamma)
            .field("tau", &self.tau)
            .field("target_update_interval", &self.target_update_interval)
            .field("ent_coef_mode", &self.ent_coef_mode)
            .field("munchausen", &self.munchausen)
            .field("lr_scheduler", &self.lr_scheduler)
            .field("epsilon", &self.epsilon)
            .field("min_lstd", &self.min_lstd)
            .field("max_lstd", &self.max_lstd)
            .field("n_updates_per_opt", &self.n_updates_per_opt)
            .field("batch_size", &self.batch_size)
            .field("train", &self.train)
            .field("critic_loss", &self.critic_loss)
            .field("reward_scale", &self.reward_scale)
            .field("n_critics", &self.n_critics)
            .field("device", &self.device)
            .finish()
    }
}

impl<Q, P> PartialEq for MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.actor_config == other.actor_config
            && self.critic_config == other.critic_config
            && self.gamma == other.gamma
            && self.tau == other.tau
            && self.target_update_interval == other.target_update_interval
            && self.ent_coef_mode == other.ent_coef_mode
            && self.munchausen == other.munchausen
            && self.lr_scheduler == other.lr_scheduler
            && self.epsilon == other.epsilon
            && self.min_lstd == other.min_lstd
            && self.max_lstd == other.max_lstd
            && self.n_updates_per_opt == other.n_updates_per_opt
            && self.batch_size == other.batch_size
            && self.train == other.train
            && self.critic_loss == other.critic_loss
            && self.reward_scale == other.reward_scale
            && self.n_critics == other.n_critics
            && self.device == other.device
    }
}

impl<Q, P> Clone for MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            gamma: self.gamma,
            tau: self.tau,
            target_update_interval: self.target_update_interval,
            ent_coef_mode: self.ent_coef_mode.clone(),
            munchausen: self.munchausen.clone(),
            lr_scheduler: self.lr_scheduler.clone(),
            epsilon: self.epsilon,
            min_lstd: self.min_lstd,
            max_lstd: self.max_lstd,
            n_updates_per_opt: self.n_updates_per_opt,
            batch_size: self.batch_size,
            train: self.train,
            critic_loss: self.critic_loss.clone(),
            reward_scale: self.reward_scale,
            n_critics: self.n_critics,
            device: self.device,
        }
    }
}

impl<Q, P> Default for MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.005,
            target_update_interval: 1,
            ent_coef_mode: EntCoefMode::Fix(1.0),
            munchausen: MunchausenConfig::default(),
            lr_scheduler: None,
            epsilon: 1e-4,
            min_lstd: -20.0,
            max_lstd: 2.0,
            n_updates_per_opt: 1,
            batch_size: 1,
            train: false,
            critic_loss: CriticLoss::Mse,
            reward_scale: 1.0,
            n_critics: 2,
            device: None,
        }
    }
}

impl<Q, P> MsacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Sets the number of parameter update steps per optimization step.
    pub fn n_updates_per_opt(mut self, v: usize) -> Self {
        self.n_updates_per_opt = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the interval of target network updates in gradient steps.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Mode of the entropy coefficient.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
        self
    }

    /// Configuration of the Munchausen bonus.
    pub fn munchausen(mut self, v: MunchausenConfig) -> Self {
        self.munchausen = v;
        self
    }

    /// Sets the learning rate schedule of all optimizers.
    pub fn lr_scheduler(mut self, v: LrScheduler) -> Self {
        self.lr_scheduler = Some(v);
        self
    }

    /// Reward scale.
    ///
    /// It works for obtaining target values, not the values in logs.
    pub fn reward_scale(mut self, v: f32) -> Self {
        self.reward_scale = v;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: ActorConfig<P::Config>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: CriticConfig<Q::Config>) -> Self {
        self.critic_config = critic_config;
        self
    }

    /// The number of critics.
    pub fn n_critics(mut self, n_critics: usize) -> Self {
        self.n_critics = n_critics;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Constructs [`MsacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MsacConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::{Mlp, Mlp2, MlpConfig},
        msac::MunchausenMode,
    };
    use tempdir::TempDir;

    #[test]
    fn test_serde_msac_config() -> Result<()> {
        let config = MsacConfig::<Mlp, Mlp2>::default()
            .batch_size(256)
            .discount_factor(0.99)
            .tau(0.005)
            .munchausen(
                MunchausenConfig::default()
                    .mode(MunchausenMode::DynamicShift)
                    .scaling(0.9),
            )
            .ent_coef_mode(EntCoefMode::Auto {
                target_entropy: -1.0,
                learning_rate: 3e-4,
                init_alpha: None,
            })
            .actor_config(
                ActorConfig::default().pi_config(MlpConfig::new(3, vec![64, 64], 1, false)),
            )
            .critic_config(
                CriticConfig::default().q_config(MlpConfig::new(4, vec![64, 64], 1, false)),
            )
            .device(Device::Cpu);

        let dir = TempDir::new("msac_config")?;
        let path = dir.path().join("msac_config.yaml");

        config.save(&path)?;
        let config_ = MsacConfig::<Mlp, Mlp2>::load(&path)?;
        assert_eq!(config, config_);

        Ok(())
    }
}
