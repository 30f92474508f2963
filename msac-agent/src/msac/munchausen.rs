//! The Munchausen bonus added to the critic regression target.
//!
//! The bonus is a scaled, optionally clipped or shifted, log probability
//! that the current policy assigns to the action stored in the replay
//! buffer. [`munchausen_bonus`] dispatches on [`MunchausenMode`] and
//! emits mode-specific diagnostics as a [`Record`].
use anyhow::Result;
use candle_core::Tensor;
use msac_core::record::{Record, RecordValue::Scalar};
use serde::{Deserialize, Serialize};

/// Guards the normalized variant against a zero-width running range.
const MIN_RANGE: f32 = f32::EPSILON;

/// Shaping mode of the Munchausen bonus.
///
/// Exactly one mode is active per gradient step. Unknown mode names are
/// mapped to [`Default`](Self::Default) by [`MunchausenMode::from_name`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum MunchausenMode {
    /// Scaled log policy, clipped to `[clip_low, clip_high]`.
    Default,

    /// Scaled log policy without clipping.
    NoClipping,

    /// Clipped log policy, without the entropy coefficient.
    FixScale,

    /// Log policy shifted by a fixed empirical offset, then clipped.
    Shift,

    /// Log policy shifted by its batch mean.
    DynamicShift,

    /// Interpolation between mean shift and extremum shift, controlled by
    /// the shift hyperparameter in `[-1, 1]`.
    DynamicShiftHyper,

    /// Batch-mean shift with an additive hyperparameter offset.
    DynamicMeanHyper,

    /// Log policy shifted by its batch median.
    DynamicShiftMedian,

    /// Log policy shifted by the magnitude of the target entropy.
    DynamicShiftTargetEntropy,

    /// Log policy shifted by its batch maximum.
    DynamicShiftMax,

    /// Log policy normalized into `[-1, 0]` with all-time running bounds.
    DynamicShiftNormalized,
}

impl MunchausenMode {
    /// Parses a mode name.
    ///
    /// Unrecognized names fall back to [`Default`](Self::Default).
    pub fn from_name(name: &str) -> Self {
        match name {
            "no_clipping" => Self::NoClipping,
            "fix_scale" => Self::FixScale,
            "shift" => Self::Shift,
            "dynamicshift" => Self::DynamicShift,
            "dynamicshift_hyper" => Self::DynamicShiftHyper,
            "dynamicmean_hyper" => Self::DynamicMeanHyper,
            "dynamicshift_median" => Self::DynamicShiftMedian,
            "dynamicshift_target_entropy" => Self::DynamicShiftTargetEntropy,
            "dynamicshift_max" => Self::DynamicShiftMax,
            "dynamicshift_normalized" => Self::DynamicShiftNormalized,
            _ => Self::Default,
        }
    }
}

/// Configuration of the Munchausen bonus.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MunchausenConfig {
    /// Shaping mode of the bonus.
    pub mode: MunchausenMode,

    /// Scaling coefficient of the log policy term, in `[0, 1]`.
    pub scaling: f64,

    /// Lower clipping bound of the log policy term.
    pub clip_low: f64,

    /// Upper clipping bound of the log policy term.
    pub clip_high: f64,

    /// Shift hyperparameter in `[-1, 1]`, used by the hyper variants.
    pub hyper_param: f64,
}

impl Default for MunchausenConfig {
    fn default() -> Self {
        Self {
            mode: MunchausenMode::Default,
            scaling: 0.9,
            clip_low: -1.0,
            clip_high: 0.0,
            hyper_param: 0.0,
        }
    }
}

impl MunchausenConfig {
    /// Sets the shaping mode.
    pub fn mode(mut self, v: MunchausenMode) -> Self {
        self.mode = v;
        self
    }

    /// Sets the scaling coefficient.
    pub fn scaling(mut self, v: f64) -> Self {
        self.scaling = v;
        self
    }

    /// Sets the clipping bounds.
    pub fn clip(mut self, low: f64, high: f64) -> Self {
        self.clip_low = low;
        self.clip_high = high;
        self
    }

    /// Sets the shift hyperparameter.
    pub fn hyper_param(mut self, v: f64) -> Self {
        self.hyper_param = v;
        self
    }
}

/// Running bounds of the replay log probability.
///
/// Used only by [`MunchausenMode::DynamicShiftNormalized`]. The bounds
/// start at the infinity sentinels, tighten monotonically over the run
/// and are never reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogProbBounds {
    /// All-time minimum of observed replay log probabilities.
    pub min: f32,

    /// All-time maximum of observed replay log probabilities.
    pub max: f32,
}

impl Default for LogProbBounds {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl LogProbBounds {
    /// Tightens the bounds with the given batch of log probabilities.
    pub fn update(&mut self, log_prob: &Tensor) -> Result<()> {
        let batch_min = log_prob.min(0)?.to_scalar::<f32>()?;
        let batch_max = log_prob.max(0)?.to_scalar::<f32>()?;
        if batch_min < self.min {
            self.min = batch_min;
        }
        if batch_max > self.max {
            self.max = batch_max;
        }
        Ok(())
    }
}

fn batch_mean(t: &Tensor) -> Result<f64> {
    Ok(t.mean_all()?.to_scalar::<f32>()? as f64)
}

fn batch_min(t: &Tensor) -> Result<f64> {
    Ok(t.min(0)?.to_scalar::<f32>()? as f64)
}

fn batch_max(t: &Tensor) -> Result<f64> {
    Ok(t.max(0)?.to_scalar::<f32>()? as f64)
}

/// Lower median, matching the median of an even-sized batch in common
/// tensor libraries.
fn batch_median(t: &Tensor) -> Result<f64> {
    let mut v = t.to_vec1::<f32>()?;
    v.sort_by(f32::total_cmp);
    Ok(v[(v.len() - 1) / 2] as f64)
}

fn mean_scalar(t: &Tensor) -> Result<f32> {
    Ok(t.mean_all()?.to_scalar::<f32>()?)
}

/// Computes the Munchausen bonus of a batch of replay log probabilities.
///
/// * `alpha` - The current entropy coefficient.
/// * `log_prob` - Log probabilities the current policy assigns to the
///   stored actions, shape `[batch_size]`, detached.
/// * `target_entropy` - Target entropy of the policy, used by
///   [`MunchausenMode::DynamicShiftTargetEntropy`].
/// * `bounds` - Running bounds, tightened in place by
///   [`MunchausenMode::DynamicShiftNormalized`].
///
/// Returns the bonus, shape `[batch_size]`, and a [`Record`] of
/// mode-specific diagnostics. The clipping bounds appear in the record
/// only for the modes that clip; their absence stands for the bounds
/// being undefined.
pub fn munchausen_bonus(
    config: &MunchausenConfig,
    alpha: f64,
    log_prob: &Tensor,
    target_entropy: f64,
    bounds: &mut LogProbBounds,
) -> Result<(Tensor, Record)> {
    let mut record = Record::empty();
    record.insert(
        "munchausen/munchausen_scaling",
        Scalar(config.scaling as f32),
    );
    record.insert("munchausen/log_policy", Scalar(mean_scalar(log_prob)?));

    let scaling = config.scaling;
    let bonus = match &config.mode {
        MunchausenMode::Default => {
            record_clip_bounds(&mut record, config);
            ((log_prob * alpha)?.clamp(config.clip_low, config.clip_high)? * scaling)?
        }
        MunchausenMode::NoClipping => ((log_prob * alpha)? * scaling)?,
        MunchausenMode::FixScale => {
            record_clip_bounds(&mut record, config);
            (log_prob.clamp(config.clip_low, config.clip_high)? * scaling)?
        }
        MunchausenMode::Shift => {
            record_clip_bounds(&mut record, config);
            let shift = 30.0;
            (((log_prob - shift)? * alpha)?.clamp(config.clip_low, config.clip_high)? * scaling)?
        }
        MunchausenMode::DynamicShift => {
            let mean = batch_mean(log_prob)?;
            (((log_prob - mean)? * alpha)? * scaling)?
        }
        MunchausenMode::DynamicShiftHyper => {
            // h = -1 shifts by the batch maximum, h = 0 by the mean and
            // h = 1 by the minimum.
            let h = config.hyper_param;
            let mean = batch_mean(log_prob)?;
            let shifted = if h <= 0.0 {
                let max = batch_max(log_prob)?;
                (log_prob - ((1.0 + h) * mean - h * max))?
            } else {
                let min = batch_min(log_prob)?;
                (log_prob + ((h - 1.0) * mean - h * min))?
            };
            record.insert(
                "munchausen/log_policy_shifted",
                Scalar(mean_scalar(&shifted)?),
            );
            ((shifted * alpha)? * scaling)?
        }
        MunchausenMode::DynamicMeanHyper => {
            let mean = batch_mean(log_prob)?;
            let shifted = (log_prob - (mean - config.hyper_param))?;
            record.insert(
                "munchausen/log_policy_shifted",
                Scalar(mean_scalar(&shifted)?),
            );
            ((shifted * alpha)? * scaling)?
        }
        MunchausenMode::DynamicShiftMedian => {
            let median = batch_median(log_prob)?;
            let bonus = (((log_prob - median)? * alpha)? * scaling)?;
            record.insert(
                "munchausen/log_policy_shifted_median",
                Scalar(mean_scalar(&bonus)?),
            );
            bonus
        }
        MunchausenMode::DynamicShiftTargetEntropy => {
            let bonus = (((log_prob - target_entropy.abs())? * alpha)? * scaling)?;
            record.insert("munchausen/target_entropy", Scalar(target_entropy as f32));
            record.insert(
                "munchausen/log_policy_shifted_target_entropy",
                Scalar(mean_scalar(&bonus)?),
            );
            bonus
        }
        MunchausenMode::DynamicShiftMax => {
            let max = batch_max(log_prob)?;
            let shifted = (log_prob - max)?;
            record.insert(
                "munchausen/log_policy_shifted",
                Scalar(mean_scalar(&shifted)?),
            );
            ((shifted * alpha)? * scaling)?
        }
        MunchausenMode::DynamicShiftNormalized => {
            bounds.update(log_prob)?;
            let range = (bounds.max - bounds.min).max(MIN_RANGE) as f64;
            let normalized = (((log_prob - bounds.min as f64)? * (1.0 / range))? - 1.0)?;
            record.insert(
                "munchausen/log_policy_normalized",
                Scalar(mean_scalar(&normalized)?),
            );
            record.insert("munchausen/log_prob_min", Scalar(bounds.min));
            record.insert("munchausen/log_prob_max", Scalar(bounds.max));
            ((normalized * alpha)? * scaling)?
        }
    };

    Ok((bonus, record))
}

fn record_clip_bounds(record: &mut Record, config: &MunchausenConfig) {
    record.insert(
        "munchausen/munchausen_clipping_low",
        Scalar(config.clip_low as f32),
    );
    record.insert(
        "munchausen/munchausen_clipping_high",
        Scalar(config.clip_high as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn log_prob(v: &[f32]) -> Tensor {
        Tensor::from_slice(v, (v.len(),), &Device::Cpu).unwrap()
    }

    fn bonus_values(
        config: &MunchausenConfig,
        alpha: f64,
        v: &[f32],
        bounds: &mut LogProbBounds,
    ) -> Vec<f32> {
        let (bonus, _) = munchausen_bonus(config, alpha, &log_prob(v), -1.0, bounds).unwrap();
        bonus.to_vec1::<f32>().unwrap()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_dynamicshift_scenario() {
        // mean of the batch is -2.5, so the bonus is
        // 0.9 * 0.2 * ([-2, -3, -1, -4] + 2.5)
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShift);
        let bonus = bonus_values(
            &config,
            0.2,
            &[-2.0, -3.0, -1.0, -4.0],
            &mut LogProbBounds::default(),
        );
        assert_close(&bonus, &[0.09, -0.09, 0.27, -0.27]);
    }

    #[test]
    fn test_fix_scale_scenario() {
        let config = MunchausenConfig::default().mode(MunchausenMode::FixScale);
        let bonus = bonus_values(
            &config,
            0.2,
            &[-0.5, -2.0, 0.3],
            &mut LogProbBounds::default(),
        );
        assert_close(&bonus, &[-0.45, -0.9, 0.0]);
    }

    #[test]
    fn test_fix_scale_clipping_invariant() {
        let config = MunchausenConfig::default().mode(MunchausenMode::FixScale);
        let low = (config.scaling * config.clip_low) as f32;
        let high = (config.scaling * config.clip_high) as f32;
        let bonus = bonus_values(
            &config,
            3.0,
            &[-100.0, 100.0, -0.3, 0.0, 7.5],
            &mut LogProbBounds::default(),
        );
        for b in bonus {
            assert!(b >= low && b <= high);
        }
    }

    #[test]
    fn test_unknown_mode_falls_back_to_default() {
        assert_eq!(MunchausenMode::from_name("bogus"), MunchausenMode::Default);
        assert_eq!(
            MunchausenMode::from_name("dynamicshift_median"),
            MunchausenMode::DynamicShiftMedian
        );

        let v = [-0.5, -2.0, 0.3, -1.2];
        let config = MunchausenConfig::default().mode(MunchausenMode::from_name("bogus"));
        let b1 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        let config = MunchausenConfig::default();
        let b2 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        assert_close(&b1, &b2);
    }

    #[test]
    fn test_alpha_proportionality() {
        // Doubling alpha doubles the bonus for every mode that multiplies
        // alpha in without saturating a clipping bound.
        let modes = [
            MunchausenMode::NoClipping,
            MunchausenMode::DynamicShift,
            MunchausenMode::DynamicShiftHyper,
            MunchausenMode::DynamicMeanHyper,
            MunchausenMode::DynamicShiftMedian,
            MunchausenMode::DynamicShiftTargetEntropy,
            MunchausenMode::DynamicShiftMax,
            MunchausenMode::DynamicShiftNormalized,
        ];
        let v = [-2.0, -3.0, -1.0, -4.0];

        for mode in modes {
            let config = MunchausenConfig::default()
                .mode(mode)
                .hyper_param(0.5);
            let b1 = bonus_values(&config, 0.1, &v, &mut LogProbBounds::default());
            let b2 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
            let b1_doubled: Vec<f32> = b1.iter().map(|x| 2.0 * x).collect();
            assert_close(&b1_doubled, &b2);
        }
    }

    #[test]
    fn test_fix_scale_ignores_alpha() {
        let config = MunchausenConfig::default().mode(MunchausenMode::FixScale);
        let v = [-0.5, -2.0, 0.3];
        let b1 = bonus_values(&config, 0.1, &v, &mut LogProbBounds::default());
        let b2 = bonus_values(&config, 10.0, &v, &mut LogProbBounds::default());
        assert_close(&b1, &b2);
    }

    #[test]
    fn test_dynamicshift_hyper_zero_matches_dynamicshift() {
        let v = [-2.0, -3.0, -1.0, -4.0];
        let config = MunchausenConfig::default()
            .mode(MunchausenMode::DynamicShiftHyper)
            .hyper_param(0.0);
        let b1 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShift);
        let b2 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        assert_close(&b1, &b2);
    }

    #[test]
    fn test_dynamicshift_hyper_minus_one_matches_dynamicshift_max() {
        let v = [-2.0, -3.0, -1.0, -4.0];
        let config = MunchausenConfig::default()
            .mode(MunchausenMode::DynamicShiftHyper)
            .hyper_param(-1.0);
        let b1 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShiftMax);
        let b2 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
        assert_close(&b1, &b2);
    }

    #[test]
    fn test_running_bounds_are_monotone() {
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShiftNormalized);
        let mut bounds = LogProbBounds::default();
        let batches: [&[f32]; 4] = [
            &[-2.0, -1.0],
            &[-0.5, -0.7],
            &[-5.0, -4.0],
            &[-3.0, -2.5],
        ];

        let mut prev = bounds;
        for batch in batches {
            let _ = bonus_values(&config, 0.2, batch, &mut bounds);
            assert!(bounds.min <= prev.min);
            assert!(bounds.max >= prev.max);
            prev = bounds;
        }
        assert_eq!(bounds.min, -5.0);
        assert_eq!(bounds.max, -0.5);
    }

    #[test]
    fn test_normalized_bonus_range() {
        // With the running bounds tightened by the batch itself, the
        // normalized log policy lies in [-1, 0].
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShiftNormalized);
        let bonus = bonus_values(
            &config,
            1.0,
            &[-2.0, -3.0, -1.0, -4.0],
            &mut LogProbBounds::default(),
        );
        let low = (config.scaling * -1.0) as f32;
        for b in bonus {
            assert!(b >= low && b <= 0.0);
        }
    }

    #[test]
    fn test_normalized_zero_width_bounds() {
        // A constant batch collapses the running range; the epsilon guard
        // keeps the bonus finite.
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShiftNormalized);
        let bonus = bonus_values(
            &config,
            0.2,
            &[-1.5, -1.5, -1.5],
            &mut LogProbBounds::default(),
        );
        for b in bonus {
            assert!(b.is_finite());
        }
    }

    #[test]
    fn test_bonus_is_idempotent() {
        let v = [-2.0, -3.0, -1.0, -4.0];
        for mode in [
            MunchausenMode::Default,
            MunchausenMode::Shift,
            MunchausenMode::DynamicShiftMedian,
        ] {
            let config = MunchausenConfig::default().mode(mode);
            let b1 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
            let b2 = bonus_values(&config, 0.2, &v, &mut LogProbBounds::default());
            assert_close(&b1, &b2);
        }
    }

    #[test]
    fn test_clip_bounds_recorded_only_when_clipping() {
        let v = [-2.0, -3.0];
        for (mode, clipped) in [
            (MunchausenMode::Default, true),
            (MunchausenMode::FixScale, true),
            (MunchausenMode::Shift, true),
            (MunchausenMode::NoClipping, false),
            (MunchausenMode::DynamicShift, false),
            (MunchausenMode::DynamicShiftMax, false),
        ] {
            let config = MunchausenConfig::default().mode(mode);
            let (_, record) = munchausen_bonus(
                &config,
                0.2,
                &log_prob(&v),
                -1.0,
                &mut LogProbBounds::default(),
            )
            .unwrap();
            assert_eq!(
                record.get("munchausen/munchausen_clipping_low").is_some(),
                clipped
            );
            assert_eq!(
                record.get("munchausen/munchausen_clipping_high").is_some(),
                clipped
            );
        }
    }

    #[test]
    fn test_shift_mode_saturates_low_bound() {
        // Log probabilities near zero are far below the fixed shift, so
        // the clipped term sits at the lower bound.
        let config = MunchausenConfig::default().mode(MunchausenMode::Shift);
        let bonus = bonus_values(
            &config,
            0.2,
            &[-0.1, -0.2],
            &mut LogProbBounds::default(),
        );
        assert_close(&bonus, &[-0.9, -0.9]);
    }

    #[test]
    fn test_median_uses_lower_median() {
        // Batch of four, sorted [-4, -3, -2, -1]: the lower median is -3.
        let config = MunchausenConfig::default().mode(MunchausenMode::DynamicShiftMedian);
        let bonus = bonus_values(
            &config,
            1.0,
            &[-2.0, -3.0, -1.0, -4.0],
            &mut LogProbBounds::default(),
        );
        assert_close(&bonus, &[0.9, 0.0, 1.8, -0.9]);
    }
}
