use crate::util::OutDim;
use serde::{Deserialize, Serialize};

/// Shape of an [`Mlp`](super::Mlp) or [`Mlp2`](super::Mlp2).
///
/// `units` lists the hidden-layer widths. For [`Mlp2`](super::Mlp2) the
/// output dimension applies to each head.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MlpConfig {
    pub(super) in_dim: i64,
    pub(super) units: Vec<i64>,
    pub(super) out_dim: i64,
    pub(super) activation_out: bool,
}

impl MlpConfig {
    /// Creates a configuration with the given layer dimensions.
    ///
    /// When `activation_out` is set, a ReLU follows the output layer.
    pub fn new(in_dim: i64, units: Vec<i64>, out_dim: i64, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
        }
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: i64) {
        self.out_dim = out_dim;
    }
}
