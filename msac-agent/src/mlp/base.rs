use super::{forward_relu, hidden_layers, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// A fully connected network with a single output layer.
///
/// With one input the network maps it straight through the hidden
/// layers; with two inputs (observation and action, for a critic) they
/// are concatenated along the last dimension first. The output layer
/// carries no activation unless `activation_out` is set in the config.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    hidden: Vec<Linear>,
    out: Linear,
}

impl Mlp {
    fn new(vs: VarBuilder, config: MlpConfig) -> Self {
        let device = vs.device().clone();
        let vs = vs.pp("mlp");
        let hidden = hidden_layers(&vs, config.in_dim, &config.units).unwrap();
        let out = {
            let in_dim = *config.units.last().unwrap();
            let name = format!("ln{}", config.units.len());
            linear(in_dim as _, config.out_dim as _, vs.pp(name)).unwrap()
        };

        Self {
            config,
            device,
            hidden,
            out,
        }
    }

    fn output(&self, xs: Tensor) -> Tensor {
        let h = forward_relu(xs, &self.hidden);
        let y = self.out.forward(&h).unwrap();
        match self.config.activation_out {
            false => y,
            true => y.relu().unwrap(),
        }
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        Self::new(vs, config)
    }

    fn forward(&self, xs: &Self::Input) -> Tensor {
        self.output(xs.to_device(&self.device).unwrap())
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        Self::new(vs, config)
    }

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1 = input1.to_device(&self.device).unwrap();
        let input2 = input2.to_device(&self.device).unwrap();
        let xs = Tensor::cat(&[input1, input2], D::Minus1).unwrap();
        self.output(xs)
    }
}
