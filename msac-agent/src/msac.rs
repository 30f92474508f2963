//! Munchausen soft actor-critic (M-SAC) agent.
mod actor;
mod base;
mod config;
mod critic;
mod ent_coef;
mod munchausen;
pub use actor::{Actor, ActorConfig};
pub use base::Msac;
pub use config::MsacConfig;
pub use critic::{Critic, CriticConfig};
pub use ent_coef::{EntCoef, EntCoefMode};
pub use munchausen::{munchausen_bonus, LogProbBounds, MunchausenConfig, MunchausenMode};
