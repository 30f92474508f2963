//! Network building blocks of the M-SAC agent.
//!
//! The actor and critic wrappers own a `VarMap` and an optimizer; the
//! networks themselves are submodels built from a [`VarBuilder`] handed
//! down by the wrapper. Splitting construction this way lets a wrapper
//! clone its network into a target copy sharing the same configuration
//! but a fresh variable store.
use candle_nn::VarBuilder;

/// A network taking a single input, e.g. the policy trunk.
pub trait SubModel1 {
    /// Configuration describing the network shape.
    type Config;

    /// Input of the network.
    type Input;

    /// Output of the network.
    type Output;

    /// Builds the network, registering its variables through `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// Applies the network.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}

/// A network taking two inputs, e.g. a critic over observation-action
/// pairs.
pub trait SubModel2 {
    /// Configuration describing the network shape.
    type Config;

    /// First input of the network.
    type Input1;

    /// Second input of the network.
    type Input2;

    /// Output of the network.
    type Output;

    /// Builds the network, registering its variables through `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// Applies the network.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output;
}
