//! Train [`Agent`].
mod config;
mod sampler;
use std::time::{Duration, SystemTime};

use crate::{
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    Agent, Env, Evaluator, ExperienceBufferBase, ReplayBufferBase, StepProcessor,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
pub use sampler::Sampler;

/// Manages the training loop and related objects.
///
/// The loop interleaves environment steps, in which [`Sampler`] pushes
/// transitions into the replay buffer, with optimization steps of the agent.
/// Evaluation, model saving and record flushing happen at configurable
/// intervals of optimization steps.
pub struct Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    /// Configuration of the environment for training.
    env_config_train: E::Config,

    /// Configuration of the transition producer.
    step_proc_config: P::Config,

    /// Configuration of the replay buffer.
    replay_buffer_config: R::Config,

    /// Where to save the trained model.
    model_dir: Option<String>,

    /// Interval of optimization in environment steps.
    opt_interval: usize,

    /// Interval of recording agent information in optimization steps.
    record_agent_info_interval: usize,

    /// Interval of flushing records in optimization steps.
    flush_records_interval: usize,

    /// Interval of evaluation in optimization steps.
    eval_interval: usize,

    /// Interval of saving the model in optimization steps.
    save_interval: usize,

    /// The maximal number of optimization steps.
    max_opts: usize,

    /// Warmup period, for filling the replay buffer, in environment steps.
    warmup_period: usize,

    /// Optimization steps since the timer was reset.
    opt_steps_for_ops: usize,

    /// Timer for optimization steps per second.
    timer_for_ops: Duration,
}

impl<E, P, R> Trainer<E, P, R>
where
    E: Env,
    P: StepProcessor<E>,
    R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
{
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config_train: E::Config,
        step_proc_config: P::Config,
        replay_buffer_config: R::Config,
    ) -> Self {
        Self {
            env_config_train,
            step_proc_config,
            replay_buffer_config,
            model_dir: config.model_dir,
            opt_interval: config.opt_interval,
            record_agent_info_interval: config.record_agent_info_interval,
            flush_records_interval: config.flush_record_interval,
            eval_interval: config.eval_interval,
            save_interval: config.save_interval,
            max_opts: config.max_opts,
            warmup_period: config.warmup_period,
            opt_steps_for_ops: 0,
            timer_for_ops: Duration::new(0, 0),
        }
    }

    fn save_model<A: Agent<E, R>>(agent: &A, model_dir: String) {
        match agent.save_params(model_dir.as_ref()) {
            Ok(()) => info!("Saved the model in {:?}.", &model_dir),
            Err(_) => info!("Failed to save model in {:?}.", &model_dir),
        }
    }

    fn save_best_model<A: Agent<E, R>>(agent: &A, model_dir: String) {
        let model_dir = model_dir + "/best";
        Self::save_model(agent, model_dir);
    }

    fn save_model_with_steps<A: Agent<E, R>>(agent: &A, model_dir: String, steps: usize) {
        let model_dir = model_dir + format!("/{}", steps).as_str();
        Self::save_model(agent, model_dir);
    }

    /// Returns optimization steps per second, then resets the internal counter.
    fn opt_steps_per_sec(&mut self) -> f32 {
        let osps = 1000. * self.opt_steps_for_ops as f32 / (self.timer_for_ops.as_millis() as f32);
        self.opt_steps_for_ops = 0;
        self.timer_for_ops = Duration::new(0, 0);
        osps
    }

    /// Performs a training step.
    ///
    /// It performs an environment step once and pushes a transition into the
    /// given buffer with [`Sampler`]. Then, if the number of environment steps
    /// reaches the optimization interval, performs an optimization step.
    ///
    /// The second return value in the tuple tells if an optimization step was
    /// done.
    pub fn train_step<A: Agent<E, R>>(
        &mut self,
        agent: &mut A,
        buffer: &mut R,
        sampler: &mut Sampler<E, P>,
        env_steps: &mut usize,
        opt_steps: &mut usize,
    ) -> Result<(Record, bool)> {
        // Sample transition and push it into the replay buffer
        let mut record = sampler.sample_and_push(agent, buffer)?;
        *env_steps += 1;

        if *env_steps < self.warmup_period {
            Ok((record, false))
        } else if *env_steps % self.opt_interval != 0 {
            // skip optimization step
            Ok((record, false))
        } else if (*opt_steps + 1) % self.record_agent_info_interval == 0 {
            // Do optimization step with record
            let timer = SystemTime::now();
            let record_agent = agent.opt_with_record(buffer);
            *opt_steps += 1;
            self.timer_for_ops += timer.elapsed()?;
            self.opt_steps_for_ops += 1;
            record = record.merge(record_agent);
            Ok((record, true))
        } else {
            // Do optimization step without record
            let timer = SystemTime::now();
            agent.opt(buffer);
            *opt_steps += 1;
            self.timer_for_ops += timer.elapsed()?;
            self.opt_steps_for_ops += 1;
            Ok((record, true))
        }
    }

    /// Trains the agent.
    pub fn train<A, D>(
        &mut self,
        agent: &mut A,
        recorder: &mut Box<dyn AggregateRecorder>,
        evaluator: &mut D,
    ) -> Result<()>
    where
        A: Agent<E, R>,
        D: Evaluator<E>,
    {
        let env = E::build(&self.env_config_train, 0)?;
        let producer = P::build(&self.step_proc_config);
        let mut buffer = R::build(&self.replay_buffer_config);
        let mut sampler = Sampler::new(env, producer);
        let mut max_eval_reward = f32::MIN;
        let mut env_steps: usize = 0;
        let mut opt_steps: usize = 0;
        agent.train();

        loop {
            let (mut record, is_opt) = self.train_step(
                agent,
                &mut buffer,
                &mut sampler,
                &mut env_steps,
                &mut opt_steps,
            )?;

            // Postprocessing after each training step
            if is_opt {
                if opt_steps % self.record_agent_info_interval == 0 {
                    record.insert("opt_steps_per_sec", Scalar(self.opt_steps_per_sec()));
                }

                // Evaluation
                if opt_steps % self.eval_interval == 0 {
                    info!("Starts evaluation of the trained model");
                    agent.eval();
                    let eval_reward = evaluator.evaluate(agent)?;
                    agent.train();
                    record.insert("eval_reward", Scalar(eval_reward));

                    // Save the best model up to the current iteration
                    if eval_reward > max_eval_reward {
                        if let Some(model_dir) = self.model_dir.as_ref() {
                            max_eval_reward = eval_reward;
                            Self::save_best_model(agent, model_dir.clone())
                        }
                    }
                };

                // Save the current model
                if (self.save_interval > 0) && (opt_steps % self.save_interval == 0) {
                    if let Some(model_dir) = self.model_dir.as_ref() {
                        Self::save_model_with_steps(agent, model_dir.clone(), opt_steps);
                    }
                }

                // End loop
                if opt_steps == self.max_opts {
                    break;
                }
            }

            // Store record to the recorder
            if !record.is_empty() {
                recorder.store(record);
            }

            // Flush records
            if is_opt && ((opt_steps - 1) % self.flush_records_interval == 0) {
                recorder.flush(opt_steps as _);
            }
        }

        Ok(())
    }
}
