pub mod configuration;
pub mod endpoint;
pub mod execution;
pub mod judgement;
pub mod ruleset;
pub mod scoring;
pub mod stats;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
