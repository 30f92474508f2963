//! MLP submodels of the M-SAC networks.
//!
//! [`Mlp`] is the single-output network used for the critics (and, with
//! one input, for plain value heads), [`Mlp2`] the two-headed trunk of
//! the Gaussian policy. Both share the hidden-layer construction and
//! forward pass below.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Builds the hidden layers, `in_dim` into each entry of `units` in turn.
fn hidden_layers(vs: &VarBuilder, in_dim: i64, units: &[i64]) -> Result<Vec<Linear>> {
    let mut layers = Vec::with_capacity(units.len());
    let mut in_dim = in_dim;
    for (i, &out_dim) in units.iter().enumerate() {
        layers.push(linear(in_dim as _, out_dim as _, vs.pp(format!("ln{}", i)))?);
        in_dim = out_dim;
    }
    Ok(layers)
}

/// Applies the layers in turn, each followed by a ReLU.
fn forward_relu(xs: Tensor, layers: &[Linear]) -> Tensor {
    layers
        .iter()
        .fold(xs, |xs, layer| layer.forward(&xs).unwrap().relu().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubModel1, SubModel2};
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    #[test]
    fn test_mlp_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = <Mlp as SubModel1>::build(vb, MlpConfig::new(3, vec![8, 8], 2, false));

        let x = Tensor::zeros((4, 3), DType::F32, &Device::Cpu).unwrap();
        let y = SubModel1::forward(&mlp, &x);
        assert_eq!(y.dims(), [4, 2]);
    }

    #[test]
    fn test_mlp_two_input_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = <Mlp as SubModel2>::build(vb, MlpConfig::new(4, vec![8, 8], 1, false));

        let obs = Tensor::zeros((4, 3), DType::F32, &Device::Cpu).unwrap();
        let act = Tensor::zeros((4, 1), DType::F32, &Device::Cpu).unwrap();
        let y = SubModel2::forward(&mlp, &obs, &act);
        assert_eq!(y.dims(), [4, 1]);
    }

    #[test]
    fn test_mlp2_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp2 = Mlp2::build(vb, MlpConfig::new(3, vec![8, 8], 2, false));

        let x = Tensor::zeros((4, 3), DType::F32, &Device::Cpu).unwrap();
        let (mean, lstd) = mlp2.forward(&x);
        assert_eq!(mean.dims(), [4, 2]);
        assert_eq!(lstd.dims(), [4, 2]);
    }
}
