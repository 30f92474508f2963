use super::{
    munchausen_bonus, Actor, Critic, EntCoef, LogProbBounds, MsacConfig, MunchausenConfig,
};
use crate::{
    model::{SubModel1, SubModel2},
    opt::LrScheduler,
    util::{smooth_l1_loss, track, CriticLoss, OutDim},
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use log::trace;
use msac_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, Policy, ReplayBufferBase, TransitionBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

type ActionValue = Tensor;
type ActMean = Tensor;
type ActLogStd = Tensor;

/// Stored actions sit arbitrarily close to the tanh saturation points.
const ATANH_EPS: f64 = 1e-6;

fn normal_logp(x: &Tensor) -> Result<Tensor> {
    let tmp: Tensor =
        ((-0.5 * (2.0 * std::f32::consts::PI).ln() as f64) - (0.5 * x.powf(2.0)?)?)?;
    Ok(tmp.sum(D::Minus1)?)
}

fn atanh(x: &Tensor) -> Result<Tensor> {
    let num = (1f64 + x.clone())?;
    let den = (1f64 - x.clone())?;
    Ok(((num / den)?.log()? * 0.5)?)
}

/// Munchausen soft actor-critic (M-SAC) agent.
///
/// M-SAC extends SAC by adding a scaled log policy bonus to the critic
/// regression target, computed from the actions stored in the replay
/// buffer. See [`munchausen_bonus`] for the supported shaping modes.
pub struct Msac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Output = ActionValue>,
    P: SubModel1<Output = (ActMean, ActLogStd)>,
    R: ReplayBufferBase,
    E::Obs: Into<Q::Input1> + Into<P::Input>,
    E::Act: Into<Q::Input2>,
    Q::Input2: From<ActMean>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Q::Input1> + Into<P::Input> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Q::Input2> + Into<Tensor> + Clone,
{
    pub(super) qnets: Vec<Critic<Q>>,
    pub(super) qnets_tgt: Vec<Critic<Q>>,
    pub(super) pi: Actor<P>,
    pub(super) gamma: f64,
    pub(super) tau: f64,
    pub(super) target_update_interval: usize,
    pub(super) ent_coef: EntCoef,
    pub(super) munchausen: MunchausenConfig,
    pub(super) log_prob_bounds: LogProbBounds,
    pub(super) lr_scheduler: Option<LrScheduler>,
    pub(super) epsilon: f64,
    pub(super) min_lstd: f64,
    pub(super) max_lstd: f64,
    pub(super) n_updates_per_opt: usize,
    pub(super) batch_size: usize,
    pub(super) train: bool,
    pub(super) reward_scale: f32,
    pub(super) n_opts: usize,
    pub(super) critic_loss: CriticLoss,
    pub(super) phantom: PhantomData<(E, R)>,
    pub(super) device: Device,
}

impl<E, Q, P, R> Msac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Output = ActionValue>,
    P: SubModel1<Output = (ActMean, ActLogStd)>,
    R: ReplayBufferBase,
    E::Obs: Into<Q::Input1> + Into<P::Input>,
    E::Act: Into<Q::Input2>,
    Q::Input2: From<ActMean>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Q::Input1> + Into<P::Input> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Q::Input2> + Into<Tensor> + Clone,
{
    /// Samples an action and returns it with its log probability.
    ///
    /// The action is a tanh-squashed sample of the Gaussian policy; its
    /// log probability includes the squashing correction.
    fn action_logp(&self, o: &P::Input) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.pi.forward(o);
        let std = lstd.clamp(self.min_lstd, self.max_lstd)?.exp()?;
        let z = Tensor::randn(0f32, 1f32, mean.dims(), &self.device)?;
        let a = (&std * &z + &mean)?.tanh()?;
        let log_p = ((normal_logp(&z)? - std.log()?.sum(D::Minus1)?)?
            - ((1f64 - a.powf(2.0)?)? + self.epsilon)?
                .log()?
                .sum(D::Minus1)?)?;

        debug_assert_eq!(a.dims()[0], self.batch_size);
        debug_assert_eq!(log_p.dims(), [self.batch_size]);

        Ok((a, log_p))
    }

    /// Returns the log probability the current policy assigns to actions
    /// taken from the replay buffer.
    ///
    /// The result is detached; it feeds the critic target only.
    fn replay_logp(&self, obs: &P::Input, act: &Tensor) -> Result<Tensor> {
        let (mean, lstd) = self.pi.forward(obs);
        let std = lstd.clamp(self.min_lstd, self.max_lstd)?.exp()?;
        let a = act
            .to_device(&self.device)?
            .clamp(-1.0 + ATANH_EPS, 1.0 - ATANH_EPS)?;
        let z = ((atanh(&a)? - &mean)? / &std)?;
        let log_p = ((normal_logp(&z)? - std.log()?.sum(D::Minus1)?)?
            - ((1f64 - a.powf(2.0)?)? + self.epsilon)?
                .log()?
                .sum(D::Minus1)?)?;

        debug_assert_eq!(log_p.dims(), [self.batch_size]);

        Ok(log_p.detach())
    }

    fn qvals(&self, qnets: &[Critic<Q>], obs: &Q::Input1, act: &Q::Input2) -> Vec<Tensor> {
        qnets
            .iter()
            .map(|qnet| qnet.forward(obs, act).squeeze(D::Minus1).unwrap())
            .collect()
    }

    /// Returns the minimum values of q values over critics
    fn qvals_min(&self, qnets: &[Critic<Q>], obs: &Q::Input1, act: &Q::Input2) -> Result<Tensor> {
        let qvals = self.qvals(qnets, obs, act);
        let qvals = Tensor::stack(&qvals, 0)?;
        let qvals_min = qvals.min(0)?.squeeze(D::Minus1)?;

        debug_assert_eq!(qvals_min.dims(), [self.batch_size]);

        Ok(qvals_min)
    }

    /// Regresses all critics towards the Munchausen target.
    ///
    /// `alpha` is the entropy coefficient read at the start of the
    /// gradient step, shape `[1]`, detached.
    fn update_critic(&mut self, alpha: &Tensor, batch: R::Batch) -> Result<(f32, Record)> {
        let (obs, act, next_obs, reward, is_done) = batch.unpack();
        let batch_size = reward.len();
        let reward = Tensor::from_slice(&reward[..], (batch_size,), &self.device)?;
        let is_done = {
            let is_done = is_done.iter().map(|e| *e as f32).collect::<Vec<_>>();
            Tensor::from_slice(&is_done[..], (batch_size,), &self.device)?
        };

        let preds = self.qvals(&self.qnets, &obs.clone().into(), &act.clone().into());
        let obs: P::Input = obs.into();
        let act: Tensor = act.into();

        let (tgt, record) = {
            let (next_a, next_log_p) = self.action_logp(&next_obs.clone().into())?;
            let next_q = (self.qvals_min(&self.qnets_tgt, &next_obs.into(), &next_a.into())?
                - alpha.broadcast_mul(&next_log_p)?)?;

            let replay_log_p = self.replay_logp(&obs, &act)?;
            let alpha_scalar = alpha.to_vec1::<f32>()?[0] as f64;
            let target_entropy = self.ent_coef.target_entropy().unwrap_or(0.0);
            let (m, mut record) = munchausen_bonus(
                &self.munchausen,
                alpha_scalar,
                &replay_log_p,
                target_entropy,
                &mut self.log_prob_bounds,
            )?;

            let not_done = (1f64 - &is_done)?;
            let tgt = (((self.reward_scale as f64) * reward)? + &m)?;
            let tgt = (tgt + ((not_done * self.gamma)? * &next_q)?)?.detach();

            record.insert(
                "munchausen/next_munchausen_values",
                RecordValue::Scalar(m.mean_all()?.to_scalar::<f32>()?),
            );
            record.insert(
                "munchausen/munchausen_fraction",
                RecordValue::Scalar((m.abs()? / &tgt)?.mean_all()?.to_scalar::<f32>()?),
            );
            record.insert(
                "munchausen/entropy_scalamean",
                RecordValue::Scalar(
                    alpha
                        .broadcast_mul(&next_log_p)?
                        .neg()?
                        .mean_all()?
                        .to_scalar::<f32>()?,
                ),
            );
            record.insert(
                "munchausen/entropy_mean",
                RecordValue::Scalar(next_log_p.neg()?.mean_all()?.to_scalar::<f32>()?),
            );
            record.insert(
                "munchausen/next_q_values",
                RecordValue::Scalar(next_q.mean_all()?.to_scalar::<f32>()?),
            );

            (tgt, record)
        };

        debug_assert_eq!(tgt.dims(), [self.batch_size]);

        let losses: Vec<_> = match self.critic_loss {
            CriticLoss::Mse => preds.iter().map(|pred| mse(pred, &tgt).unwrap()).collect(),
            CriticLoss::SmoothL1 => preds
                .iter()
                .map(|pred| smooth_l1_loss(pred, &tgt).unwrap())
                .collect(),
        };

        // Half the sum over the ensemble; each critic steps on the joint loss.
        let loss = {
            let mut loss = losses[0].clone();
            for l in &losses[1..] {
                loss = (loss + l)?;
            }
            (0.5 * loss)?
        };
        for qnet in self.qnets.iter_mut() {
            qnet.backward_step(&loss)?;
        }

        Ok((loss.to_scalar::<f32>()?, record))
    }

    /// One policy gradient step with the freshly sampled action.
    ///
    /// The critics are evaluated but not updated; only the actor's
    /// optimizer steps.
    fn update_actor(
        &mut self,
        alpha: &Tensor,
        obs: <R::Batch as TransitionBatch>::ObsBatch,
        a_pi: Tensor,
        log_p: &Tensor,
    ) -> Result<f32> {
        let qval = self.qvals_min(&self.qnets, &obs.into(), &a_pi.into())?;
        let loss = (alpha.broadcast_mul(log_p)? - &qval)?.mean_all()?;
        self.pi.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    fn soft_update(&mut self) -> Result<()> {
        for (qnet_tgt, qnet) in self.qnets_tgt.iter().zip(&mut self.qnets) {
            track(qnet_tgt.get_varmap(), qnet.get_varmap(), self.tau)?;
        }
        Ok(())
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let mut loss_critic = 0f32;
        let mut loss_actor = 0f32;
        let mut loss_ent_coef = 0f32;
        let mut n_ent_coef_losses = 0;
        let mut alpha_mean = 0f32;
        let mut munchausen_record = Record::empty();

        for gradient_step in 0..self.n_updates_per_opt {
            if let Some(scheduler) = &self.lr_scheduler {
                let lr = scheduler.lr(self.n_opts);
                self.pi.set_learning_rate(lr);
                for qnet in self.qnets.iter_mut() {
                    qnet.set_learning_rate(lr);
                }
                self.ent_coef.set_learning_rate(lr);
            }

            trace!("batch()");
            let batch = buffer.batch(self.batch_size)?;
            let obs = batch.obs().clone();

            // alpha is read once per gradient step; the entropy coefficient
            // update below takes effect from the next step on
            let alpha = self.ent_coef.alpha()?;
            alpha_mean += alpha.to_vec1::<f32>()?[0];

            trace!("action_logp()");
            let (a_pi, log_p) = self.action_logp(&obs.clone().into())?;

            if let Some(loss) = self.ent_coef.update(&log_p)? {
                loss_ent_coef += loss;
                n_ent_coef_losses += 1;
            }

            trace!("update_critic()");
            let (loss, record) = self.update_critic(&alpha, batch)?;
            loss_critic += loss;
            munchausen_record = record;

            trace!("update_actor()");
            loss_actor += self.update_actor(&alpha, obs, a_pi, &log_p)?;

            if gradient_step % self.target_update_interval == 0 {
                trace!("soft_update()");
                self.soft_update()?;
            }

            self.n_opts += 1;
        }

        loss_critic /= self.n_updates_per_opt as f32;
        loss_actor /= self.n_updates_per_opt as f32;
        alpha_mean /= self.n_updates_per_opt as f32;

        let mut record = Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic)),
            ("loss_actor", RecordValue::Scalar(loss_actor)),
            ("ent_coef", RecordValue::Scalar(alpha_mean)),
            ("n_opts", RecordValue::Scalar(self.n_opts as f32)),
        ]);
        if n_ent_coef_losses > 0 {
            record.insert(
                "loss_ent_coef",
                RecordValue::Scalar(loss_ent_coef / n_ent_coef_losses as f32),
            );
        }
        record.merge_inplace(munchausen_record);

        Ok(record)
    }
}

impl<E, Q, P, R> Policy<E> for Msac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Output = ActionValue>,
    P: SubModel1<Output = (ActMean, ActLogStd)>,
    R: ReplayBufferBase,
    E::Obs: Into<Q::Input1> + Into<P::Input>,
    E::Act: Into<Q::Input2> + From<Tensor>,
    Q::Input2: From<ActMean>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Q::Input1> + Into<P::Input> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Q::Input2> + Into<Tensor> + Clone,
{
    /// Samples an action.
    ///
    /// In training mode the action is a stochastic sample of the policy;
    /// in evaluation mode it is the squashed mean.
    fn sample(&mut self, obs: &E::Obs) -> E::Act {
        let obs = obs.clone().into();
        let (mean, lstd) = self.pi.forward(&obs);
        let std = lstd
            .clamp(self.min_lstd, self.max_lstd)
            .unwrap()
            .exp()
            .unwrap();
        let act = if self.train {
            ((std * mean.randn_like(0., 1.).unwrap()).unwrap() + mean).unwrap()
        } else {
            mean
        };
        act.tanh().unwrap().into()
    }
}

impl<E, Q, P, R> Configurable for Msac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Output = ActionValue>,
    P: SubModel1<Output = (ActMean, ActLogStd)>,
    R: ReplayBufferBase,
    E::Obs: Into<Q::Input1> + Into<P::Input>,
    E::Act: Into<Q::Input2> + From<Tensor>,
    Q::Input2: From<ActMean>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Q::Input1> + Into<P::Input> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Q::Input2> + Into<Tensor> + Clone,
{
    type Config = MsacConfig<Q, P>;

    /// Constructs [`Msac`] agent.
    fn build(config: Self::Config) -> Self {
        let device = config
            .device
            .expect("No device is given for the M-SAC agent");
        let n_critics = config.n_critics;
        let pi = Actor::build(config.actor_config, device.into()).unwrap();
        let mut qnets = vec![];
        for _ in 0..n_critics {
            qnets.push(Critic::build(config.critic_config.clone(), device.into()).unwrap());
        }
        // Target critics start as exact copies of the live critics
        let qnets_tgt = qnets.iter().map(|qnet| qnet.clone()).collect();

        Msac {
            qnets,
            qnets_tgt,
            pi,
            gamma: config.gamma,
            tau: config.tau,
            target_update_interval: config.target_update_interval,
            ent_coef: EntCoef::new(config.ent_coef_mode, device.into()).unwrap(),
            munchausen: config.munchausen,
            log_prob_bounds: LogProbBounds::default(),
            lr_scheduler: config.lr_scheduler,
            epsilon: config.epsilon,
            min_lstd: config.min_lstd,
            max_lstd: config.max_lstd,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            train: config.train,
            reward_scale: config.reward_scale,
            critic_loss: config.critic_loss,
            n_opts: 0,
            device: device.into(),
            phantom: PhantomData,
        }
    }
}

impl<E, Q, P, R> Agent<E, R> for Msac<E, Q, P, R>
where
    E: Env,
    Q: SubModel2<Output = ActionValue>,
    P: SubModel1<Output = (ActMean, ActLogStd)>,
    R: ReplayBufferBase,
    E::Obs: Into<Q::Input1> + Into<P::Input>,
    E::Act: Into<Q::Input2> + From<Tensor>,
    Q::Input2: From<ActMean>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Q::Input1> + Into<P::Input> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Q::Input2> + Into<Tensor> + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Record {
        self.opt_(buffer).expect("Failed in Msac::opt_()")
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        for (i, (qnet, qnet_tgt)) in self.qnets.iter().zip(&self.qnets_tgt).enumerate() {
            qnet.save(path.join(format!("qnet_{}.pt", i)).as_path())?;
            qnet_tgt.save(path.join(format!("qnet_tgt_{}.pt", i)).as_path())?;
        }
        self.pi.save(path.join("pi.pt").as_path())?;
        self.ent_coef.save(path.join("ent_coef.pt").as_path())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        for (i, (qnet, qnet_tgt)) in self.qnets.iter_mut().zip(&mut self.qnets_tgt).enumerate() {
            qnet.load(path.join(format!("qnet_{}.pt", i)).as_path())?;
            qnet_tgt.load(path.join(format!("qnet_tgt_{}.pt", i)).as_path())?;
        }
        self.pi.load(path.join("pi.pt").as_path())?;
        self.ent_coef.load(path.join("ent_coef.pt").as_path())?;
        Ok(())
    }
}
