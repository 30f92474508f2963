use super::{forward_relu, hidden_layers, MlpConfig};
use crate::model::SubModel1;
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// A fully connected trunk with two output heads of the same size.
///
/// The heads read the activated output of the last hidden layer. For
/// the M-SAC policy they produce the mean and the log standard
/// deviation of the pre-squash action distribution.
pub struct Mlp2 {
    _config: MlpConfig,
    device: Device,
    hidden: Vec<Linear>,
    head1: Linear,
    head2: Linear,
}

impl SubModel1 for Mlp2 {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        let device = vs.device().clone();
        let hidden = hidden_layers(&vs.pp("mlp"), config.in_dim, &config.units).unwrap();
        let in_dim = *config.units.last().unwrap();
        let head1 = linear(in_dim as _, config.out_dim as _, vs.pp("mean")).unwrap();
        let head2 = linear(in_dim as _, config.out_dim as _, vs.pp("lstd")).unwrap();

        Self {
            _config: config,
            device,
            hidden,
            head1,
            head2,
        }
    }

    fn forward(&self, xs: &Self::Input) -> Self::Output {
        let xs = xs.to_device(&self.device).unwrap();
        let h = forward_relu(xs, &self.hidden);
        let mean = self.head1.forward(&h).unwrap();
        let lstd = self.head2.forward(&h).unwrap();
        (mean, lstd)
    }
}
