#![allow(missing_docs)]

pub mod actions;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod providers;

pub use config::StepwiseConfig;
