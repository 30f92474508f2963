//! Runs the M-SAC agent against a small synthetic control problem.
use anyhow::Result;
use candle_core::Tensor;
use msac_agent::{
    mlp::{Mlp, Mlp2, MlpConfig},
    msac::{
        ActorConfig, CriticConfig, EntCoefMode, Msac, MsacConfig, MunchausenConfig, MunchausenMode,
    },
    opt::{LrScheduler, OptimizerConfig},
    Device, TensorBatch,
};
use msac_core::{
    record::{AggregateRecorder, NullRecorder, Record},
    replay_buffer::{
        SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    Act, Agent, Configurable, DefaultEvaluator, Env as EnvTrait, Obs, ReplayBufferBase, Sampler,
    Step, StepProcessor, Trainer, TrainerConfig,
};
use tempdir::TempDir;

const DIM_OBS: usize = 3;
const DIM_ACT: usize = 1;
const EPISODE_LEN: usize = 10;
const BATCH_SIZE: usize = 8;
const LR: f64 = 3e-4;

/// A point mass drifting towards the origin under a scalar control input.
#[derive(Clone)]
struct PointMassConfig {}

struct PointMass {
    state: Vec<f32>,
    steps: usize,
}

#[derive(Clone, Debug)]
struct PointMassObs(Vec<f32>);

impl Obs for PointMassObs {
    fn len(&self) -> usize {
        1
    }
}

impl From<PointMassObs> for Tensor {
    fn from(o: PointMassObs) -> Tensor {
        Tensor::from_slice(&o.0[..], (1, DIM_OBS), &candle_core::Device::Cpu).unwrap()
    }
}

impl From<PointMassObs> for TensorBatch {
    fn from(o: PointMassObs) -> TensorBatch {
        TensorBatch::from_tensor(o.into())
    }
}

#[derive(Clone, Debug)]
struct PointMassAct(Vec<f32>);

impl Act for PointMassAct {
    fn len(&self) -> usize {
        1
    }
}

impl From<PointMassAct> for Tensor {
    fn from(a: PointMassAct) -> Tensor {
        Tensor::from_slice(&a.0[..], (1, DIM_ACT), &candle_core::Device::Cpu).unwrap()
    }
}

impl From<Tensor> for PointMassAct {
    fn from(t: Tensor) -> PointMassAct {
        PointMassAct(t.flatten_all().unwrap().to_vec1::<f32>().unwrap())
    }
}

impl From<PointMassAct> for TensorBatch {
    fn from(a: PointMassAct) -> TensorBatch {
        TensorBatch::from_tensor(a.into())
    }
}

impl EnvTrait for PointMass {
    type Config = PointMassConfig;
    type Obs = PointMassObs;
    type Act = PointMassAct;
    type Info = ();

    fn build(_config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            state: vec![0.5; DIM_OBS],
            steps: 0,
        })
    }

    fn step(&mut self, a: &Self::Act) -> (Step<Self>, Record) {
        self.steps += 1;
        for s in self.state.iter_mut() {
            *s = 0.9 * *s + 0.1 * a.0[0];
        }
        let reward = -self.state.iter().map(|s| s.abs()).sum::<f32>();
        let is_done = if self.steps >= EPISODE_LEN { 1 } else { 0 };
        let obs = PointMassObs(self.state.clone());
        let step = Step::new(
            obs.clone(),
            a.clone(),
            vec![reward],
            vec![is_done],
            (),
            obs,
        );
        (step, Record::empty())
    }

    fn reset(&mut self, _is_done: Option<&Vec<i8>>) -> Result<Self::Obs> {
        self.state = vec![0.5; DIM_OBS];
        self.steps = 0;
        Ok(PointMassObs(self.state.clone()))
    }

    fn step_with_reset(&mut self, a: &Self::Act) -> (Step<Self>, Record) {
        let (mut step, record) = self.step(a);
        if step.is_done() {
            step.init_obs = self.reset(None).unwrap();
        }
        (step, record)
    }

    fn reset_with_index(&mut self, _ix: usize) -> Result<Self::Obs> {
        self.reset(None)
    }
}

type Env = PointMass;
type StepProc = SimpleStepProcessor<Env, TensorBatch, TensorBatch>;
type ReplayBuffer = SimpleReplayBuffer<TensorBatch, TensorBatch>;
type Agent_ = Msac<Env, Mlp, Mlp2, ReplayBuffer>;

fn create_agent_config(mode: MunchausenMode) -> MsacConfig<Mlp, Mlp2> {
    let actor_config = ActorConfig::default()
        .opt_config(OptimizerConfig::Adam { lr: LR })
        .pi_config(MlpConfig::new(DIM_OBS as i64, vec![16, 16], DIM_ACT as i64, false));
    let critic_config = CriticConfig::default()
        .opt_config(OptimizerConfig::Adam { lr: LR })
        .q_config(MlpConfig::new((DIM_OBS + DIM_ACT) as i64, vec![16, 16], 1, false));
    MsacConfig::default()
        .batch_size(BATCH_SIZE)
        .actor_config(actor_config)
        .critic_config(critic_config)
        .munchausen(MunchausenConfig::default().mode(mode))
        .ent_coef_mode(EntCoefMode::Auto {
            target_entropy: -(DIM_ACT as f64),
            learning_rate: LR,
            init_alpha: Some(0.1),
        })
        .device(Device::Cpu)
}

fn fill_buffer(agent: &mut Agent_, buffer: &mut ReplayBuffer, n_steps: usize) -> Result<()> {
    let env = Env::build(&PointMassConfig {}, 0)?;
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    let mut sampler = Sampler::new(env, step_proc);
    for _ in 0..n_steps {
        sampler.sample_and_push(agent, buffer)?;
    }
    Ok(())
}

#[test]
fn test_opt_records_losses_and_diagnostics() -> Result<()> {
    let mut agent = Agent_::build(create_agent_config(MunchausenMode::DynamicShift));
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(100));
    agent.train();
    fill_buffer(&mut agent, &mut buffer, 64)?;

    let record = agent.opt_with_record(&mut buffer);

    for key in [
        "loss_critic",
        "loss_actor",
        "ent_coef",
        "loss_ent_coef",
        "munchausen/munchausen_scaling",
        "munchausen/log_policy",
        "munchausen/next_munchausen_values",
        "munchausen/munchausen_fraction",
        "munchausen/entropy_scalamean",
        "munchausen/entropy_mean",
        "munchausen/next_q_values",
    ] {
        let v = record.get_scalar(key)?;
        assert!(v.is_finite(), "{} is not finite: {}", key, v);
    }

    // Mean shifting produces no clip bound diagnostics
    assert!(record.get("munchausen/munchausen_clipping_low").is_none());
    assert!(record.get("munchausen/munchausen_clipping_high").is_none());

    assert_eq!(record.get_scalar("n_opts")?, 1.0);
    let record = agent.opt_with_record(&mut buffer);
    assert_eq!(record.get_scalar("n_opts")?, 2.0);

    Ok(())
}

#[test]
fn test_opt_records_clip_bounds_in_default_mode() -> Result<()> {
    let mut agent = Agent_::build(create_agent_config(MunchausenMode::Default));
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(100));
    agent.train();
    fill_buffer(&mut agent, &mut buffer, 64)?;

    let record = agent.opt_with_record(&mut buffer);

    assert_eq!(record.get_scalar("munchausen/munchausen_clipping_low")?, -1.0);
    assert_eq!(record.get_scalar("munchausen/munchausen_clipping_high")?, 0.0);

    Ok(())
}

#[test]
fn test_save_and_load_params() -> Result<()> {
    let mut agent = Agent_::build(create_agent_config(MunchausenMode::Default));
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(100));
    agent.train();
    fill_buffer(&mut agent, &mut buffer, 64)?;
    agent.opt_with_record(&mut buffer);

    let dir = TempDir::new("msac_learner")?;
    agent.save_params(dir.path())?;
    agent.load_params(dir.path())?;

    // The loaded agent still runs gradient steps
    let record = agent.opt_with_record(&mut buffer);
    assert!(record.get_scalar("loss_critic")?.is_finite());

    Ok(())
}

#[test]
fn test_train_loop() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = TrainerConfig::default()
        .max_opts(5)
        .opt_interval(1)
        .warmup_period(16)
        .eval_interval(5)
        .flush_record_interval(5)
        .record_agent_info_interval(1);
    let mut trainer = Trainer::<Env, StepProc, ReplayBuffer>::build(
        config,
        PointMassConfig {},
        SimpleStepProcessorConfig::default(),
        SimpleReplayBufferConfig::default().capacity(100),
    );
    let mut agent = Agent_::build(
        create_agent_config(MunchausenMode::DynamicShiftNormalized)
            .lr_scheduler(LrScheduler::new(LR, LR * 0.1, 5)),
    );
    let mut recorder: Box<dyn AggregateRecorder> = Box::new(NullRecorder {});
    let mut evaluator = DefaultEvaluator::<Env>::new(&PointMassConfig {}, 0, 2)?;

    trainer.train(&mut agent, &mut recorder, &mut evaluator)?;

    Ok(())
}
